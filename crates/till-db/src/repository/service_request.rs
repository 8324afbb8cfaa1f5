//! # Service Request Repository
//!
//! Service requests belong to the clinic application; the ledger only
//! creates them for callers/tests and writes their paid state.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{PaymentStatus, ServiceRequest};

/// Repository for service request database operations.
#[derive(Debug, Clone)]
pub struct ServiceRequestRepository {
    pool: SqlitePool,
}

impl ServiceRequestRepository {
    /// Creates a new ServiceRequestRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ServiceRequestRepository { pool }
    }

    /// Gets a service request by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ServiceRequest>> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Inserts a service request.
    pub async fn insert(&self, request: &ServiceRequest) -> DbResult<()> {
        debug!(id = %request.id, total_cents = request.total_cents, "Inserting service request");

        sqlx::query(
            r#"
            INSERT INTO service_requests (
                id, patient_id, professional_id, description,
                total_cents, paid_cents, payment_status,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&request.id)
        .bind(&request.patient_id)
        .bind(&request.professional_id)
        .bind(&request.description)
        .bind(request.total_cents)
        .bind(request.paid_cents)
        .bind(request.payment_status)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // =========================================================================
    // Transactional reads and writes
    // =========================================================================

    /// Gets a service request by ID on the caller's connection.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<ServiceRequest>> {
        let request = sqlx::query_as::<_, ServiceRequest>(
            "SELECT * FROM service_requests WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(request)
    }

    /// Writes the new paid amount and status, returning the updated row.
    pub async fn update_paid(
        conn: &mut SqliteConnection,
        id: &str,
        paid_cents: i64,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> DbResult<ServiceRequest> {
        debug!(id = %id, paid_cents, status = %status, "Updating service request paid state");

        let updated = sqlx::query_as::<_, ServiceRequest>(
            r#"
            UPDATE service_requests
            SET paid_cents = ?2, payment_status = ?3, updated_at = ?4
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(paid_cents)
        .bind(status)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        updated.ok_or_else(|| DbError::not_found("ServiceRequest", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn request(id: &str, total: i64) -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: id.to_string(),
            patient_id: Some("pat-1".to_string()),
            professional_id: Some("pro-1".to_string()),
            description: "Limpieza dental".to_string(),
            total_cents: total,
            paid_cents: 0,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_get_update() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.service_requests();
        repo.insert(&request("req-1", 15_000)).await.unwrap();

        let stored = repo.get_by_id("req-1").await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 15_000);
        assert_eq!(stored.payment_status, PaymentStatus::Pending);

        let mut tx = db.begin().await.unwrap();
        let updated = ServiceRequestRepository::update_paid(
            &mut tx,
            "req-1",
            6_000,
            PaymentStatus::Partial,
            Utc::now(),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        assert_eq!(updated.paid_cents, 6_000);
        assert_eq!(updated.remaining().cents(), 9_000);
    }

    #[tokio::test]
    async fn test_overpaid_state_rejected_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.service_requests()
            .insert(&request("req-1", 10_000))
            .await
            .unwrap();

        let mut tx = db.begin().await.unwrap();
        let err = ServiceRequestRepository::update_paid(
            &mut tx,
            "req-1",
            10_001,
            PaymentStatus::Paid,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_missing_request() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.begin().await.unwrap();
        let err = ServiceRequestRepository::update_paid(
            &mut tx,
            "missing",
            0,
            PaymentStatus::Pending,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
