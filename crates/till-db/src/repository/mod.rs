//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CashLedger (till-ledger)                                              │
//! │       │                                                                 │
//! │       │  reads:  db.sessions().get_by_id(id)          (pool)           │
//! │       │  writes: SessionRepository::lock(&mut *tx, ..)  (transaction)  │
//! │       ▼                                                                 │
//! │  SessionRepository / TransactionRepository /                           │
//! │  ServiceRequestRepository / AuditLogRepository                         │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes that must commit together take `&mut SqliteConnection` so the
//! caller decides the transaction boundary.
//!
//! ## Available Repositories
//!
//! - [`SessionRepository`](session::SessionRepository) - Cash sessions and locking
//! - [`TransactionRepository`](transaction::TransactionRepository) - Ledger rows
//! - [`ServiceRequestRepository`](service_request::ServiceRequestRepository) - Paid state
//! - [`AuditLogRepository`](audit::AuditLogRepository) - Audit trail

pub mod audit;
pub mod service_request;
pub mod session;
pub mod transaction;
