//! # till-core: Pure Ledger Rules for Clinic Till
//!
//! This crate is the **heart** of the clinic cash register. It contains the
//! ledger rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Clinic Till Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Callers (clinic app, `till` CLI)                     │   │
//! │  │    open ──► pay / post / refund / cancel ──► close              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                till-ledger (CashLedger service)                 │   │
//! │  │        database transactions, audit emission, config            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────┐ ┌───────┐  │   │
//! │  │   │  types  │ │  money  │ │  payment  │ │reconcile│ │summary│  │   │
//! │  │   │ Session │ │  Money  │ │ status fn │ │ close   │ │replay │  │   │
//! │  │   │ Tx, Req │ │currency │ │  refunds  │ │ checks  │ │       │  │   │
//! │  │   └─────────┘ └─────────┘ └───────────┘ └─────────┘ └───────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (CashSession, CashTransaction, ServiceRequest)
//! - [`money`] - Money type with integer arithmetic
//! - [`currency`] - Display formatting for money
//! - [`payment`] - Payment status function, payment and refund checks
//! - [`reconcile`] - Discrepancy classification and close checks
//! - [`summary`] - Session summary from transactions
//! - [`events`] - Events emitted after each committed operation
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use till_core::{CashSession, Money, TransactionType};
//!
//! let mut session = CashSession::open("s-1", "cashier-1", Money::from_cents(100_000), None, Utc::now());
//! session.apply_posting(TransactionType::Income, Money::from_cents(50_000)).unwrap();
//! session.apply_posting(TransactionType::Expense, Money::from_cents(20_000)).unwrap();
//!
//! assert_eq!(session.calculated_balance().cents(), 130_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod currency;
pub mod error;
pub mod events;
pub mod money;
pub mod payment;
pub mod reconcile;
pub mod summary;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use events::LedgerEvent;
pub use money::Money;
pub use reconcile::{DiscrepancyClass, DiscrepancyReport};
pub use summary::SessionSummary;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default materiality threshold for cash differences: 10.00.
pub const DEFAULT_DISCREPANCY_THRESHOLD_CENTS: i64 = 1_000;

/// Largest amount accepted for a single posting or cash count:
/// 10,000,000,000.00.
///
/// Keeps running totals far inside `i64` range.
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000;

/// Maximum length of a transaction concept.
pub const MAX_CONCEPT_LEN: usize = 255;

/// Maximum length of reasons, justifications and notes.
pub const MAX_REASON_LEN: usize = 500;
