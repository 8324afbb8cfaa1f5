//! # Ledger Events
//!
//! One event per committed ledger operation. Services emit these after the
//! database transaction commits; sinks decide what to do with them (the
//! audit listener persists them as [`AuditRecord`]s).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reconcile::DiscrepancyClass;
use crate::types::{AuditRecord, CashSession, CashTransaction, RequestSummary};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    SessionOpened {
        session: CashSession,
    },
    TransactionPosted {
        transaction: CashTransaction,
        session: CashSession,
    },
    PaymentProcessed {
        transaction: CashTransaction,
        request: RequestSummary,
    },
    PaymentRefunded {
        transaction: CashTransaction,
        original_transaction_id: String,
        request: RequestSummary,
    },
    TransactionCancelled {
        transaction: CashTransaction,
        session: CashSession,
    },
    SessionClosed {
        session: CashSession,
        classification: DiscrepancyClass,
    },
}

impl LedgerEvent {
    /// Stable name stored in `audit_log.event_type`.
    pub fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::SessionOpened { .. } => "session_opened",
            LedgerEvent::TransactionPosted { .. } => "transaction_posted",
            LedgerEvent::PaymentProcessed { .. } => "payment_processed",
            LedgerEvent::PaymentRefunded { .. } => "payment_refunded",
            LedgerEvent::TransactionCancelled { .. } => "transaction_cancelled",
            LedgerEvent::SessionClosed { .. } => "session_closed",
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            LedgerEvent::SessionOpened { .. } | LedgerEvent::SessionClosed { .. } => "cash_session",
            _ => "cash_transaction",
        }
    }

    pub fn entity_id(&self) -> &str {
        match self {
            LedgerEvent::SessionOpened { session } | LedgerEvent::SessionClosed { session, .. } => {
                &session.id
            }
            LedgerEvent::TransactionPosted { transaction, .. }
            | LedgerEvent::PaymentProcessed { transaction, .. }
            | LedgerEvent::PaymentRefunded { transaction, .. }
            | LedgerEvent::TransactionCancelled { transaction, .. } => &transaction.id,
        }
    }

    /// The user who performed the operation.
    pub fn user_id(&self) -> &str {
        match self {
            LedgerEvent::SessionOpened { session } | LedgerEvent::SessionClosed { session, .. } => {
                &session.user_id
            }
            LedgerEvent::TransactionCancelled { transaction, .. } => transaction
                .cancelled_by
                .as_deref()
                .unwrap_or(&transaction.user_id),
            LedgerEvent::TransactionPosted { transaction, .. }
            | LedgerEvent::PaymentProcessed { transaction, .. }
            | LedgerEvent::PaymentRefunded { transaction, .. } => &transaction.user_id,
        }
    }

    /// Builds the audit row for this event.
    pub fn to_audit_record(
        &self,
        id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> serde_json::Result<AuditRecord> {
        Ok(AuditRecord {
            id: id.into(),
            event_type: self.event_type().to_string(),
            entity_type: self.entity_type().to_string(),
            entity_id: self.entity_id().to_string(),
            user_id: self.user_id().to_string(),
            payload: serde_json::to_string(self)?,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    #[test]
    fn test_session_opened_record() {
        let session =
            CashSession::open("s-1", "cashier-1", Money::from_cents(100_000), None, Utc::now());
        let event = LedgerEvent::SessionOpened { session };

        let record = event.to_audit_record("a-1", Utc::now()).unwrap();
        assert_eq!(record.event_type, "session_opened");
        assert_eq!(record.entity_type, "cash_session");
        assert_eq!(record.entity_id, "s-1");
        assert_eq!(record.user_id, "cashier-1");

        let payload: serde_json::Value = serde_json::from_str(&record.payload).unwrap();
        assert_eq!(payload["event"], "session_opened");
        assert_eq!(payload["session"]["initial_cents"], 100_000);
    }

    #[test]
    fn test_payload_round_trips() {
        let session =
            CashSession::open("s-1", "cashier-1", Money::from_cents(0), None, Utc::now());
        let event = LedgerEvent::SessionClosed {
            session,
            classification: DiscrepancyClass::Overage,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_type(), "session_closed");
    }
}
