//! # till-ledger: Ledger Services for Clinic Till
//!
//! Cash-register sessions, service payments, refunds and cancellations,
//! each committed as one SQLite transaction.
//!
//! ## Module Organization
//!
//! - [`ledger`] - `CashLedger`, the operations
//! - [`audit`] - `AuditSink` and the background `AuditListener`
//! - [`config`] - `till.toml` + environment configuration
//! - [`error`] - `LedgerError` and its `ErrorKind` mapping
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use till_ledger::{AuditListener, CashLedger, LedgerConfig, OpenSession};
//!
//! let config = LedgerConfig::load(None)?;
//! let db = till_db::Database::new(config.db_config()).await?;
//! let (listener, publisher) = AuditListener::new(db.clone());
//! tokio::spawn(listener.run());
//!
//! let ledger = CashLedger::new(db, config.cash.clone()).with_audit(Arc::new(publisher));
//! let session = ledger
//!     .open_session(OpenSession {
//!         user_id: "cashier-1".into(),
//!         initial_amount: Money::from_major(1_000),
//!         notes: None,
//!     })
//!     .await?;
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod ledger;

pub use audit::{AuditListener, AuditPublisher, AuditSink, NoopAuditSink};
pub use config::{CashSettings, DatabaseSettings, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use ledger::{
    CashLedger, CloseSession, NewServiceRequest, OpenSession, PaymentReceipt, PostTransaction,
    ServicePayment, ServiceRefund,
};

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins; otherwise ledger crates log at debug and sqlx at warn.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,till=debug,till_ledger=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
