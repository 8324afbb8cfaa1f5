//! # Audit Sink
//!
//! Receives [`LedgerEvent`]s after commit and persists them to `audit_log`.
//!
//! ## Audit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Audit Flow                                      │
//! │                                                                         │
//! │  CashLedger::close_session                                             │
//! │       │  tx.commit()                                                    │
//! │       ▼                                                                 │
//! │  AuditSink::emit(SessionClosed { .. })      (never blocks, never fails) │
//! │       │                                                                 │
//! │       │  unbounded mpsc                                                 │
//! │       ▼                                                                 │
//! │  AuditListener::run  (background task)                                 │
//! │       │  LedgerEvent::to_audit_record                                   │
//! │       ▼                                                                 │
//! │  AuditLogRepository::insert → audit_log                                │
//! │       (failures logged with warn!, ledger state untouched)             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use till_core::LedgerEvent;
use till_db::Database;

use crate::error::{LedgerError, LedgerResult};

/// Receives ledger events after their database transaction committed.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: LedgerEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: LedgerEvent) {}
}

// =============================================================================
// Publisher (handle)
// =============================================================================

/// Sending half of the audit channel.
#[derive(Debug, Clone)]
pub struct AuditPublisher {
    events_tx: mpsc::UnboundedSender<LedgerEvent>,
    shutdown_tx: mpsc::Sender<()>,
}

impl AuditPublisher {
    /// Stops the listener once the events already queued are written.
    pub async fn shutdown(&self) -> LedgerResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| LedgerError::ChannelError("Audit listener already stopped".into()))
    }
}

impl AuditSink for AuditPublisher {
    fn emit(&self, event: LedgerEvent) {
        let event_type = event.event_type();
        if self.events_tx.send(event).is_err() {
            warn!(event_type, "Audit listener stopped; event dropped");
        }
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Background task writing events to `audit_log`.
pub struct AuditListener {
    db: Database,
    events_rx: mpsc::UnboundedReceiver<LedgerEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    written: u64,
}

impl AuditListener {
    /// Creates a listener and the publisher that feeds it.
    pub fn new(db: Database) -> (Self, AuditPublisher) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let listener = AuditListener {
            db,
            events_rx,
            shutdown_rx,
            written: 0,
        };
        let publisher = AuditPublisher {
            events_tx,
            shutdown_tx,
        };

        (listener, publisher)
    }

    /// Runs until shutdown or until every publisher is dropped.
    ///
    /// Returns the number of records written. Spawn as a background task.
    pub async fn run(mut self) -> u64 {
        info!("Audit listener starting");

        loop {
            tokio::select! {
                biased;

                event = self.events_rx.recv() => match event {
                    Some(event) => self.record(event).await,
                    None => break,
                },

                _ = self.shutdown_rx.recv() => {
                    debug!("Audit listener shutting down");
                    break;
                }
            }
        }

        // Whatever was emitted before shutdown still gets written.
        while let Ok(event) = self.events_rx.try_recv() {
            self.record(event).await;
        }

        info!(written = self.written, "Audit listener stopped");
        self.written
    }

    async fn record(&mut self, event: LedgerEvent) {
        let record = match event.to_audit_record(Uuid::new_v4().to_string(), Utc::now()) {
            Ok(record) => record,
            Err(e) => {
                warn!(event_type = event.event_type(), error = %e, "Failed to serialize audit event");
                return;
            }
        };

        match self.db.audit_log().insert(&record).await {
            Ok(()) => self.written += 1,
            Err(e) => warn!(
                event_type = %record.event_type,
                entity_id = %record.entity_id,
                error = %e,
                "Failed to write audit record"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::{CashSession, Money};
    use till_db::DbConfig;

    fn opened(id: &str) -> LedgerEvent {
        LedgerEvent::SessionOpened {
            session: CashSession::open(id, "cashier-1", Money::from_cents(100_000), None, Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_listener_writes_events() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (listener, publisher) = AuditListener::new(db.clone());
        let task = tokio::spawn(listener.run());

        publisher.emit(opened("s-1"));
        publisher.emit(opened("s-2"));
        publisher.shutdown().await.unwrap();

        assert_eq!(task.await.unwrap(), 2);
        assert_eq!(db.audit_log().count().await.unwrap(), 2);

        let records = db.audit_log().list_for_entity("s-1").await.unwrap();
        assert_eq!(records[0].event_type, "session_opened");
        assert_eq!(records[0].user_id, "cashier-1");
    }

    #[tokio::test]
    async fn test_listener_stops_when_publishers_dropped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (listener, publisher) = AuditListener::new(db.clone());
        let task = tokio::spawn(listener.run());

        publisher.emit(opened("s-1"));
        drop(publisher);

        assert_eq!(task.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_emit_after_stop_is_dropped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (listener, publisher) = AuditListener::new(db.clone());
        drop(listener);

        publisher.emit(opened("s-1"));
        assert!(publisher.shutdown().await.is_err());
        assert_eq!(db.audit_log().count().await.unwrap(), 0);
    }
}
