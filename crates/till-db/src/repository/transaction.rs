//! # Cash Transaction Repository
//!
//! Database operations for the append-only ledger.
//!
//! ## Ledger Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  insert          → new row, status = active, seq assigned by SQLite    │
//! │  mark_cancelled  → status = cancelled + reason/actor/time              │
//! │  (no UPDATE of amounts, no DELETE: a trigger rejects deletes)          │
//! │                                                                         │
//! │  Refund = new EXPENSE row with original_transaction_id → payment       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::CashTransaction;

const REFUNDED_TOTAL_SQL: &str = r#"
    SELECT COALESCE(SUM(amount_cents), 0) FROM cash_transactions
    WHERE original_transaction_id = ?1 AND status = 'active'
"#;

/// Repository for cash transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashTransaction>> {
        let tx = sqlx::query_as::<_, CashTransaction>(
            "SELECT * FROM cash_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tx)
    }

    /// All transactions of a session in posting order, any status.
    pub async fn list_for_session(&self, session_id: &str) -> DbResult<Vec<CashTransaction>> {
        debug!(session_id = %session_id, "Listing session transactions");

        let txs = sqlx::query_as::<_, CashTransaction>(
            "SELECT * FROM cash_transactions WHERE session_id = ?1 ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// All transactions linked to a service request in posting order.
    pub async fn list_for_request(&self, request_id: &str) -> DbResult<Vec<CashTransaction>> {
        let txs = sqlx::query_as::<_, CashTransaction>(
            "SELECT * FROM cash_transactions WHERE service_request_id = ?1 ORDER BY seq",
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }

    /// Sum of active refunds referencing `original_id`, in cents.
    pub async fn refunded_total(&self, original_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(REFUNDED_TOTAL_SQL)
            .bind(original_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    // =========================================================================
    // Transactional reads and writes
    // =========================================================================

    /// Gets a transaction by ID on the caller's connection.
    pub async fn get_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<CashTransaction>> {
        let tx = sqlx::query_as::<_, CashTransaction>(
            "SELECT * FROM cash_transactions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(tx)
    }

    /// [`Self::list_for_session`] on the caller's connection.
    pub async fn list_for_session_in(
        conn: &mut SqliteConnection,
        session_id: &str,
    ) -> DbResult<Vec<CashTransaction>> {
        let txs = sqlx::query_as::<_, CashTransaction>(
            "SELECT * FROM cash_transactions WHERE session_id = ?1 ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(txs)
    }

    /// [`Self::refunded_total`] on the caller's connection.
    pub async fn refunded_total_in(conn: &mut SqliteConnection, original_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(REFUNDED_TOTAL_SQL)
            .bind(original_id)
            .fetch_one(&mut *conn)
            .await?;

        Ok(total)
    }

    /// Appends a transaction and returns the stored row (with its `seq`).
    ///
    /// The `seq` of the argument is ignored.
    pub async fn insert(
        conn: &mut SqliteConnection,
        tx: &CashTransaction,
    ) -> DbResult<CashTransaction> {
        debug!(
            id = %tx.id,
            session_id = %tx.session_id,
            amount_cents = tx.amount_cents,
            "Inserting cash transaction"
        );

        let stored = sqlx::query_as::<_, CashTransaction>(
            r#"
            INSERT INTO cash_transactions (
                id, session_id, transaction_type, category, amount_cents,
                concept, payment_method, patient_id, professional_id,
                liquidation_id, service_request_id, original_transaction_id,
                user_id, status, cancellation_reason, cancelled_by,
                cancelled_at, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15, ?16,
                ?17, ?18
            )
            RETURNING *
            "#,
        )
        .bind(&tx.id)
        .bind(&tx.session_id)
        .bind(tx.transaction_type)
        .bind(tx.category)
        .bind(tx.amount_cents)
        .bind(&tx.concept)
        .bind(tx.payment_method)
        .bind(&tx.patient_id)
        .bind(&tx.professional_id)
        .bind(&tx.liquidation_id)
        .bind(&tx.service_request_id)
        .bind(&tx.original_transaction_id)
        .bind(&tx.user_id)
        .bind(tx.status)
        .bind(&tx.cancellation_reason)
        .bind(&tx.cancelled_by)
        .bind(tx.cancelled_at)
        .bind(tx.created_at)
        .fetch_one(&mut *conn)
        .await?;

        Ok(stored)
    }

    /// Flips an active transaction to cancelled.
    ///
    /// Returns `None` when the transaction is missing or not active.
    pub async fn mark_cancelled(
        conn: &mut SqliteConnection,
        id: &str,
        reason: &str,
        cancelled_by: &str,
        at: DateTime<Utc>,
    ) -> DbResult<Option<CashTransaction>> {
        debug!(id = %id, cancelled_by = %cancelled_by, "Cancelling cash transaction");

        let cancelled = sqlx::query_as::<_, CashTransaction>(
            r#"
            UPDATE cash_transactions
            SET status = 'cancelled',
                cancellation_reason = ?2,
                cancelled_by = ?3,
                cancelled_at = ?4
            WHERE id = ?1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(cancelled_by)
        .bind(at)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(cancelled)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
