//! # Cash Session Repository
//!
//! Database operations for cash sessions.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SQLite has no SELECT ... FOR UPDATE. Every ledger write starts with   │
//! │                                                                         │
//! │    UPDATE cash_sessions SET updated_at = ? WHERE ... RETURNING *        │
//! │                                                                         │
//! │  which takes the database write lock for the rest of the transaction   │
//! │  and hands back the freshest row. Concurrent writers block on          │
//! │  busy_timeout, then see the committed totals.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads go through `&self` (pool). Writes are associated functions taking
//! the connection of the caller's transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::CashSession;

/// Repository for cash session database operations.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    /// Creates a new SessionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    /// Gets a session by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>("SELECT * FROM cash_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    /// The user's open session, if any.
    pub async fn find_open_for_user(&self, user_id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE user_id = ?1 AND status = 'open'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    /// The user's sessions, most recently opened first.
    pub async fn history_for_user(&self, user_id: &str, limit: i64) -> DbResult<Vec<CashSession>> {
        debug!(user_id = %user_id, limit, "Loading session history");

        let sessions = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT * FROM cash_sessions
            WHERE user_id = ?1
            ORDER BY opened_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    // =========================================================================
    // Transactional reads and writes
    // =========================================================================

    /// Gets a session by ID on the caller's connection.
    pub async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<CashSession>> {
        let session = sqlx::query_as::<_, CashSession>("SELECT * FROM cash_sessions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(session)
    }

    /// Inserts a freshly opened session.
    ///
    /// Fails with `UniqueViolation` on `cash_sessions.user_id` when the user
    /// already has an open session.
    pub async fn insert(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, user_id = %session.user_id, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, user_id, status, opened_at, closed_at,
                initial_cents, total_income_cents, total_expense_cents,
                calculated_balance_cents, final_cents, difference_cents,
                difference_justification, authorized_by,
                opening_notes, closing_notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13,
                ?14, ?15, ?16, ?17
            )
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.status)
        .bind(session.opened_at)
        .bind(session.closed_at)
        .bind(session.initial_cents)
        .bind(session.total_income_cents)
        .bind(session.total_expense_cents)
        .bind(session.calculated_balance_cents)
        .bind(session.final_cents)
        .bind(session.difference_cents)
        .bind(&session.difference_justification)
        .bind(&session.authorized_by)
        .bind(&session.opening_notes)
        .bind(&session.closing_notes)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Locks the session row and returns its current state.
    pub async fn lock(
        conn: &mut SqliteConnection,
        id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<CashSession>> {
        debug!(id = %id, "Locking cash session");

        let session = sqlx::query_as::<_, CashSession>(
            "UPDATE cash_sessions SET updated_at = ?2 WHERE id = ?1 RETURNING *",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Locks the user's open session, if any, and returns it.
    pub async fn lock_open_for_user(
        conn: &mut SqliteConnection,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<CashSession>> {
        debug!(user_id = %user_id, "Locking open cash session for user");

        let session = sqlx::query_as::<_, CashSession>(
            r#"
            UPDATE cash_sessions SET updated_at = ?2
            WHERE user_id = ?1 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(session)
    }

    /// Persists the running totals of an open session.
    pub async fn save_totals(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET total_income_cents = ?2,
                total_expense_cents = ?3,
                calculated_balance_cents = ?4,
                updated_at = ?5
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&session.id)
        .bind(session.total_income_cents)
        .bind(session.total_expense_cents)
        .bind(session.calculated_balance_cents)
        .bind(session.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open cash session", session.id.clone()));
        }

        Ok(())
    }

    /// Writes the closing fields and flips the status to `closed`.
    pub async fn close(conn: &mut SqliteConnection, session: &CashSession) -> DbResult<()> {
        debug!(id = %session.id, "Closing cash session");

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'closed',
                closed_at = ?2,
                final_cents = ?3,
                difference_cents = ?4,
                difference_justification = ?5,
                authorized_by = ?6,
                closing_notes = ?7,
                updated_at = ?8
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(&session.id)
        .bind(session.closed_at)
        .bind(session.final_cents)
        .bind(session.difference_cents)
        .bind(&session.difference_justification)
        .bind(&session.authorized_by)
        .bind(&session.closing_notes)
        .bind(session.updated_at)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Open cash session", session.id.clone()));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use till_core::{Money, SessionStatus, TransactionType};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn open(db: &Database, id: &str, user: &str) -> DbResult<()> {
        let session = CashSession::open(id, user, Money::from_cents(100_000), None, Utc::now());
        let mut tx = db.begin().await?;
        SessionRepository::insert(&mut tx, &session).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        open(&db, "s-1", "cashier-1").await.unwrap();

        let session = db.sessions().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(session.user_id, "cashier-1");
        assert_eq!(session.status, SessionStatus::Open);
        assert_eq!(session.calculated_balance_cents, 100_000);

        let open = db.sessions().find_open_for_user("cashier-1").await.unwrap();
        assert_eq!(open.map(|s| s.id), Some("s-1".to_string()));
        assert!(db.sessions().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_open_session_violates_unique_index() {
        let db = db().await;
        open(&db, "s-1", "cashier-1").await.unwrap();

        let err = open(&db, "s-2", "cashier-1").await.unwrap_err();
        assert!(err.is_unique_violation_on("cash_sessions.user_id"));

        // Other cashiers are unaffected.
        open(&db, "s-3", "cashier-2").await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_save_and_close() {
        let db = db().await;
        open(&db, "s-1", "cashier-1").await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let mut session = SessionRepository::lock_open_for_user(&mut tx, "cashier-1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        session
            .apply_posting(TransactionType::Income, Money::from_cents(50_000))
            .unwrap();
        SessionRepository::save_totals(&mut tx, &session).await.unwrap();

        session.status = SessionStatus::Closed;
        session.closed_at = Some(Utc::now());
        session.final_cents = Some(150_000);
        session.difference_cents = Some(0);
        SessionRepository::close(&mut tx, &session).await.unwrap();
        tx.commit().await.unwrap();

        let stored = db.sessions().get_by_id("s-1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Closed);
        assert_eq!(stored.calculated_balance_cents, 150_000);
        assert_eq!(stored.final_cents, Some(150_000));

        // A closed session cannot take totals or be closed again.
        let mut tx = db.begin().await.unwrap();
        assert!(SessionRepository::save_totals(&mut tx, &stored).await.is_err());
        assert!(SessionRepository::close(&mut tx, &stored).await.is_err());
        assert!(
            SessionRepository::lock_open_for_user(&mut tx, "cashier-1", Utc::now())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_history_most_recent_first() {
        let db = db().await;
        open(&db, "s-1", "cashier-1").await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let mut first = SessionRepository::lock(&mut tx, "s-1", Utc::now())
            .await
            .unwrap()
            .unwrap();
        first.status = SessionStatus::Closed;
        first.closed_at = Some(Utc::now());
        first.final_cents = Some(100_000);
        first.difference_cents = Some(0);
        SessionRepository::close(&mut tx, &first).await.unwrap();
        tx.commit().await.unwrap();

        open(&db, "s-2", "cashier-1").await.unwrap();

        let history = db.sessions().history_for_user("cashier-1", 10).await.unwrap();
        let ids: Vec<_> = history.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s-2", "s-1"]);

        let limited = db.sessions().history_for_user("cashier-1", 1).await.unwrap();
        assert_eq!(limited.len(), 1);
    }
}
