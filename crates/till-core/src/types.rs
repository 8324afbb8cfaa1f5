//! # Domain Types
//!
//! Records and enums of the cash-register ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1   * ┌──────────────────┐ *   0..1 ┌───────────┐ │
//! │  │  CashSession    │──────►│ CashTransaction  │─────────►│ Service   │ │
//! │  │  ─────────────  │       │  ──────────────  │          │ Request   │ │
//! │  │  user_id        │       │  seq (order)     │          │ total     │ │
//! │  │  status         │       │  type / category │          │ paid      │ │
//! │  │  initial        │       │  amount (> 0)    │          │ status    │ │
//! │  │  income/expense │       │  status          │          └───────────┘ │
//! │  │  balance        │       │  original_tx ──┐ │                        │
//! │  └─────────────────┘       └────────────────┼─┘                        │
//! │                                     ▲       │ (refund → payment)       │
//! │                                     └───────┘                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All amounts are stored as `*_cents: i64` (the column representation) and
//! exposed through [`Money`] accessors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Session Status
// =============================================================================

/// Lifecycle state of a cash session. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Open => "open",
            SessionStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Transaction Type / Category / Status
// =============================================================================

/// Direction of a ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "INCOME",
            TransactionType::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "in" => Ok(TransactionType::Income),
            "expense" | "out" => Ok(TransactionType::Expense),
            other => Err(ValidationError::InvalidFormat {
                field: "type".to_string(),
                reason: format!("unknown transaction type '{}'", other),
            }),
        }
    }
}

/// What a ledger movement is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionCategory {
    ServicePayment,
    SupplierPayment,
    CommissionLiquidation,
    CashDifference,
    Other,
}

impl TransactionCategory {
    pub const ALL: [TransactionCategory; 5] = [
        TransactionCategory::ServicePayment,
        TransactionCategory::SupplierPayment,
        TransactionCategory::CommissionLiquidation,
        TransactionCategory::CashDifference,
        TransactionCategory::Other,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::ServicePayment => "SERVICE_PAYMENT",
            TransactionCategory::SupplierPayment => "SUPPLIER_PAYMENT",
            TransactionCategory::CommissionLiquidation => "COMMISSION_LIQUIDATION",
            TransactionCategory::CashDifference => "CASH_DIFFERENCE",
            TransactionCategory::Other => "OTHER",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionCategory {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        TransactionCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "category".to_string(),
                reason: format!("unknown category '{}'", s.trim()),
            })
    }
}

/// Only `Active` transactions count toward balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Active,
    Pending,
    Cancelled,
}

impl TransactionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash into the drawer.
    Cash,
    /// Card on an external terminal.
    Card,
    /// Bank transfer.
    Transfer,
}

impl PaymentMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" | "efectivo" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            "transfer" | "bank_transfer" => Ok(PaymentMethod::Transfer),
            other => Err(ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown payment method '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Fulfillment state of a service request, derived from paid vs total.
///
/// See [`crate::payment::payment_status_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Partial,
    Paid,
    Cancelled,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cash Session
// =============================================================================

/// A cashier's open-to-close working period.
///
/// ## Running Totals
/// `calculated_balance_cents` is maintained incrementally by
/// [`CashSession::apply_posting`] / [`CashSession::revert_posting`] and is
/// always `initial + income − expense`. The summary recomputes the same
/// figure from the active transactions to prove it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    /// The cashier owning the session.
    pub user_id: String,
    pub status: SessionStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Physical cash in the drawer at open.
    pub initial_cents: i64,
    pub total_income_cents: i64,
    pub total_expense_cents: i64,
    pub calculated_balance_cents: i64,
    /// Physical cash counted at close.
    pub final_cents: Option<i64>,
    /// `final − calculated`, set at close.
    pub difference_cents: Option<i64>,
    pub difference_justification: Option<String>,
    pub authorized_by: Option<String>,
    pub opening_notes: Option<String>,
    pub closing_notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CashSession {
    /// Builds a freshly opened session. Ids and clocks come from the caller.
    pub fn open(
        id: impl Into<String>,
        user_id: impl Into<String>,
        initial: Money,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        CashSession {
            id: id.into(),
            user_id: user_id.into(),
            status: SessionStatus::Open,
            opened_at: now,
            closed_at: None,
            initial_cents: initial.cents(),
            total_income_cents: 0,
            total_expense_cents: 0,
            calculated_balance_cents: initial.cents(),
            final_cents: None,
            difference_cents: None,
            difference_justification: None,
            authorized_by: None,
            opening_notes: notes,
            closing_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    pub fn initial_amount(&self) -> Money {
        Money::from_cents(self.initial_cents)
    }

    #[inline]
    pub fn total_income(&self) -> Money {
        Money::from_cents(self.total_income_cents)
    }

    #[inline]
    pub fn total_expenses(&self) -> Money {
        Money::from_cents(self.total_expense_cents)
    }

    #[inline]
    pub fn calculated_balance(&self) -> Money {
        Money::from_cents(self.calculated_balance_cents)
    }

    #[inline]
    pub fn final_amount(&self) -> Option<Money> {
        self.final_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn difference(&self) -> Option<Money> {
        self.difference_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }

    /// Fails with a state error unless the session is open.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::SessionClosed {
                session_id: self.id.clone(),
            })
        }
    }

    /// Adds a posted amount to the running totals.
    ///
    /// Leaves the session untouched when a total would leave `i64` range.
    pub fn apply_posting(
        &mut self,
        transaction_type: TransactionType,
        amount: Money,
    ) -> CoreResult<()> {
        let (income, expense) = match transaction_type {
            TransactionType::Income => (
                self.total_income().checked_add(amount),
                Some(self.total_expenses()),
            ),
            TransactionType::Expense => (
                Some(self.total_income()),
                self.total_expenses().checked_add(amount),
            ),
        };
        self.set_totals(income, expense)
    }

    /// Removes a previously posted amount from the running totals.
    pub fn revert_posting(
        &mut self,
        transaction_type: TransactionType,
        amount: Money,
    ) -> CoreResult<()> {
        let (income, expense) = match transaction_type {
            TransactionType::Income => (
                self.total_income().checked_sub(amount),
                Some(self.total_expenses()),
            ),
            TransactionType::Expense => (
                Some(self.total_income()),
                self.total_expenses().checked_sub(amount),
            ),
        };
        self.set_totals(income, expense)
    }

    fn set_totals(&mut self, income: Option<Money>, expense: Option<Money>) -> CoreResult<()> {
        let balance = match (income, expense) {
            (Some(income), Some(expense)) => self
                .initial_amount()
                .checked_add(income)
                .and_then(|m| m.checked_sub(expense))
                .map(|balance| (income, expense, balance)),
            _ => None,
        };
        let (income, expense, balance) =
            balance.ok_or_else(|| ValidationError::out_of_range("session balance"))?;

        self.total_income_cents = income.cents();
        self.total_expense_cents = expense.cents();
        self.calculated_balance_cents = balance.cents();
        Ok(())
    }
}

// =============================================================================
// Cash Transaction
// =============================================================================

/// Optional foreign links carried by a transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TransactionLinks {
    pub patient_id: Option<String>,
    pub professional_id: Option<String>,
    pub liquidation_id: Option<String>,
    pub service_request_id: Option<String>,
}

/// A single posted monetary movement within a session.
///
/// Never deleted. Cancellation flips `status`; reversal is a new row whose
/// `original_transaction_id` points here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CashTransaction {
    /// Monotonic insertion order across the whole ledger.
    pub seq: i64,
    pub id: String,
    pub session_id: String,
    pub transaction_type: TransactionType,
    pub category: TransactionCategory,
    /// Always > 0.
    pub amount_cents: i64,
    pub concept: String,
    pub payment_method: Option<PaymentMethod>,
    pub patient_id: Option<String>,
    pub professional_id: Option<String>,
    pub liquidation_id: Option<String>,
    pub service_request_id: Option<String>,
    pub original_transaction_id: Option<String>,
    /// Acting user.
    pub user_id: String,
    pub status: TransactionStatus,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CashTransaction {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Positive for income, negative for expense.
    pub fn signed_amount(&self) -> Money {
        match self.transaction_type {
            TransactionType::Income => self.amount(),
            TransactionType::Expense => -self.amount(),
        }
    }

    /// A refund/reversal of another transaction.
    #[inline]
    pub fn is_reversal(&self) -> bool {
        self.original_transaction_id.is_some()
    }

    /// Income received for a service request (the only refundable kind).
    pub fn is_service_payment(&self) -> bool {
        self.transaction_type == TransactionType::Income
            && self.category == TransactionCategory::ServicePayment
            && !self.is_reversal()
    }

    /// Fails with a state error unless the transaction is active.
    pub fn ensure_active(&self) -> CoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(CoreError::TransactionNotActive {
                transaction_id: self.id.clone(),
                status: self.status.to_string(),
            })
        }
    }

    /// The link block of this transaction.
    pub fn links(&self) -> TransactionLinks {
        TransactionLinks {
            patient_id: self.patient_id.clone(),
            professional_id: self.professional_id.clone(),
            liquidation_id: self.liquidation_id.clone(),
            service_request_id: self.service_request_id.clone(),
        }
    }
}

// =============================================================================
// Service Request
// =============================================================================

/// The slice of a clinic service request the ledger reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ServiceRequest {
    pub id: String,
    pub patient_id: Option<String>,
    pub professional_id: Option<String>,
    pub description: String,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// `total − paid`, never negative.
    #[inline]
    pub fn remaining(&self) -> Money {
        self.total().saturating_sub_zero(self.paid())
    }

    /// Caller-facing view of the paid state.
    pub fn summary(&self) -> RequestSummary {
        RequestSummary {
            request_id: self.id.clone(),
            total_cents: self.total_cents,
            paid_cents: self.paid_cents,
            remaining_cents: self.remaining().cents(),
            payment_status: self.payment_status,
            fully_paid: self.payment_status == PaymentStatus::Paid,
        }
    }
}

/// Paid/remaining/status of a service request after an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RequestSummary {
    pub request_id: String,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    pub payment_status: PaymentStatus,
    /// Eligible for downstream fulfillment.
    pub fully_paid: bool,
}

// =============================================================================
// Audit Record
// =============================================================================

/// A persisted ledger event.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditRecord {
    pub id: String,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub user_id: String,
    /// The full event as JSON.
    pub payload: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
