//! # Audit Log Repository
//!
//! Append-only store for ledger events. Written by the audit listener after
//! each committed operation; never read by the ledger itself.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use till_core::AuditRecord;

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    /// Creates a new AuditLogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends one record.
    pub async fn insert(&self, record: &AuditRecord) -> DbResult<()> {
        debug!(
            event_type = %record.event_type,
            entity_id = %record.entity_id,
            "Writing audit record"
        );

        sqlx::query(
            r#"
            INSERT INTO audit_log (
                id, event_type, entity_type, entity_id, user_id, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&record.id)
        .bind(&record.event_type)
        .bind(&record.entity_type)
        .bind(&record.entity_id)
        .bind(&record.user_id)
        .bind(&record.payload)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records for one entity, oldest first.
    pub async fn list_for_entity(&self, entity_id: &str) -> DbResult<Vec<AuditRecord>> {
        let records = sqlx::query_as::<_, AuditRecord>(
            "SELECT * FROM audit_log WHERE entity_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Most recent records first.
    pub async fn recent(&self, limit: i64) -> DbResult<Vec<AuditRecord>> {
        let records = sqlx::query_as::<_, AuditRecord>(
            "SELECT * FROM audit_log ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Total number of records.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Utc;

    fn record(id: &str, entity_id: &str) -> AuditRecord {
        AuditRecord {
            id: id.to_string(),
            event_type: "session_opened".to_string(),
            entity_type: "cash_session".to_string(),
            entity_id: entity_id.to_string(),
            user_id: "cashier-1".to_string(),
            payload: "{}".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.audit_log();

        repo.insert(&record("a-1", "s-1")).await.unwrap();
        repo.insert(&record("a-2", "s-1")).await.unwrap();
        repo.insert(&record("a-3", "s-2")).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 3);
        assert_eq!(repo.list_for_entity("s-1").await.unwrap().len(), 2);

        let recent = repo.recent(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "a-3");
    }
}
