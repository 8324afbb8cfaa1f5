//! Shared fixtures for ledger integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use till_core::{
    CashSession, LedgerEvent, Money, PaymentMethod, ServiceRequest, TransactionCategory,
    TransactionLinks, TransactionType,
};
use till_db::{Database, DbConfig};
use till_ledger::{
    AuditSink, CashLedger, CashSettings, LedgerResult, NewServiceRequest, OpenSession,
    PaymentReceipt, PostTransaction, ServicePayment, ServiceRefund,
};

/// Ledger over a private in-memory database.
pub async fn memory_ledger() -> CashLedger {
    memory_ledger_with(CashSettings::default()).await
}

pub async fn memory_ledger_with(settings: CashSettings) -> CashLedger {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    CashLedger::new(db, settings)
}

/// Ledger over a temp-file database with a real multi-connection pool.
///
/// Keep the returned directory alive for the duration of the test.
pub async fn file_ledger() -> (CashLedger, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = DbConfig::new(dir.path().join("till.db"))
        .max_connections(8)
        .busy_timeout(Duration::from_secs(15));
    let db = Database::new(config).await.unwrap();
    (CashLedger::new(db, CashSettings::default()), dir)
}

pub async fn open(ledger: &CashLedger, user: &str, initial_cents: i64) -> CashSession {
    ledger
        .open_session(OpenSession {
            user_id: user.to_string(),
            initial_amount: Money::from_cents(initial_cents),
            notes: None,
        })
        .await
        .unwrap()
}

pub async fn request(ledger: &CashLedger, total_cents: i64) -> ServiceRequest {
    ledger
        .create_service_request(NewServiceRequest {
            patient_id: Some("pat-1".to_string()),
            professional_id: Some("pro-1".to_string()),
            description: "Consulta general".to_string(),
            total: Money::from_cents(total_cents),
        })
        .await
        .unwrap()
}

pub async fn pay(
    ledger: &CashLedger,
    request_id: &str,
    user: &str,
    cents: i64,
) -> LedgerResult<PaymentReceipt> {
    ledger
        .process_service_payment(ServicePayment {
            service_request_id: request_id.to_string(),
            amount: Money::from_cents(cents),
            method: PaymentMethod::Cash,
            user_id: user.to_string(),
            notes: None,
        })
        .await
}

pub fn refund_input(request_id: &str, original_id: &str, user: &str, cents: i64) -> ServiceRefund {
    ServiceRefund {
        service_request_id: request_id.to_string(),
        original_transaction_id: original_id.to_string(),
        amount: Money::from_cents(cents),
        reason: "Cobro duplicado".to_string(),
        user_id: user.to_string(),
        cancel_service_request: false,
    }
}

pub fn post_input(
    session_id: &str,
    user: &str,
    transaction_type: TransactionType,
    category: TransactionCategory,
    cents: i64,
) -> PostTransaction {
    PostTransaction {
        session_id: session_id.to_string(),
        transaction_type,
        category,
        amount: Money::from_cents(cents),
        concept: format!("{} {}", transaction_type, category),
        payment_method: Some(PaymentMethod::Cash),
        links: TransactionLinks::default(),
        user_id: user.to_string(),
    }
}

/// Keeps every emitted event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingSink {
    pub fn event_types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(LedgerEvent::event_type)
            .collect()
    }

    pub fn last(&self) -> Option<LedgerEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

impl AuditSink for RecordingSink {
    fn emit(&self, event: LedgerEvent) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn recording(ledger: CashLedger) -> (CashLedger, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (ledger.with_audit(sink.clone()), sink)
}
