//! # Error Types
//!
//! Domain-specific error types for till-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  till-core errors (this file)                                          │
//! │  ├── CoreError        - Ledger rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  till-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  till-ledger errors                                                    │
//! │  └── LedgerError      - What callers see (Core | Db | Config)          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → LedgerError → caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant maps onto one [`ErrorKind`], the taxonomy the surrounding
//! application uses to pick a response (409 for `Conflict`, 422 for `State`
//! and `Validation`, 404 for `NotFound`).

use serde::Serialize;
use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Error Kind
// =============================================================================

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// One-open-session-per-user violated.
    Conflict,
    /// Operation not valid for the current status.
    State,
    /// Input or amount rule violated.
    Validation,
    /// Referenced record missing or out of scope.
    NotFound,
    /// Infrastructure failure (never produced by till-core itself).
    Storage,
}

// =============================================================================
// Core Error
// =============================================================================

/// Ledger rule violations.
///
/// All of these are detected before any mutation happens, so returning one
/// means nothing was written.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The cashier already has an open session.
    ///
    /// ## When This Occurs
    /// ```text
    /// open_session(user-1)  ──► OK  (session A open)
    /// open_session(user-1)  ──► SessionAlreadyOpen { session_id: A }
    /// ```
    #[error("User {user_id} already has an open session ({session_id})")]
    SessionAlreadyOpen { user_id: String, session_id: String },

    /// Session exists but is closed.
    #[error("Session {session_id} is closed")]
    SessionClosed { session_id: String },

    /// Session is still open where a closed one is required.
    #[error("Session {session_id} is still open")]
    SessionStillOpen { session_id: String },

    /// The acting user has no open session to post into.
    #[error("No active session for user {user_id}")]
    NoActiveSession { user_id: String },

    /// Service request cannot accept another payment.
    #[error("Service request {request_id} is {status}, cannot accept payment")]
    RequestNotPayable { request_id: String, status: String },

    /// Transaction is not in a status that allows the operation.
    #[error("Transaction {transaction_id} is {status}, expected active")]
    TransactionNotActive {
        transaction_id: String,
        status: String,
    },

    /// Transaction cannot be refunded (wrong type/category or already a refund).
    #[error("Transaction {transaction_id} is not a refundable service payment")]
    NotRefundable { transaction_id: String },

    /// A payment with active refunds cannot be cancelled directly.
    #[error("Transaction {transaction_id} has active refunds; cancel them first")]
    HasActiveRefunds { transaction_id: String },

    /// Referenced record does not exist or belongs to another scope.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Returns the taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::SessionAlreadyOpen { .. } => ErrorKind::Conflict,
            CoreError::SessionClosed { .. }
            | CoreError::SessionStillOpen { .. }
            | CoreError::NoActiveSession { .. }
            | CoreError::RequestNotPayable { .. }
            | CoreError::TransactionNotActive { .. }
            | CoreError::NotRefundable { .. }
            | CoreError::HasActiveRefunds { .. } => ErrorKind::State,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::Validation(_) => ErrorKind::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input and amount validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Amount above the accepted maximum, or a total that would leave
    /// `i64` range.
    #[error("{field} is out of range")]
    AmountOutOfRange { field: String },

    /// Invalid format (e.g., unparsable amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Payment would push paid amount above the request total.
    #[error("Payment of {requested} exceeds remaining balance {remaining}")]
    Overpayment { requested: Money, remaining: Money },

    /// Refund exceeds what is still refundable on the original payment.
    #[error("Refund of {requested} exceeds refundable amount {refundable}")]
    RefundExceedsRefundable { requested: Money, refundable: Money },

    /// Refund would take paid amount below zero.
    #[error("Refund of {requested} exceeds paid amount {paid}")]
    RefundExceedsPaid { requested: Money, paid: Money },

    /// Cancelling the request needs a refund down to exactly zero.
    #[error("Service request can only be cancelled when refunded to zero ({left} would remain)")]
    CancelRequiresFullRefund { left: Money },

    /// Restoring a cancelled refund would overpay the request.
    #[error("Restoring {amount} would exceed request total (paid {paid}, total {total})")]
    RestoreExceedsTotal {
        amount: Money,
        paid: Money,
        total: Money,
    },

    /// A refund against a cancelled request cannot be restored.
    #[error("Service request {request_id} is cancelled; its refunds cannot be restored")]
    RequestCancelled { request_id: String },

    /// Material cash discrepancy without a written justification.
    #[error("Difference of {difference} exceeds threshold {threshold}; justification required")]
    JustificationRequired { difference: Money, threshold: Money },

    /// Material cash discrepancy without an authorizing user.
    #[error("Difference of {difference} exceeds threshold {threshold}; authorizing user required")]
    AuthorizerRequired { difference: Money, threshold: Money },
}

impl ValidationError {
    /// Creates a Required error for a field.
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Creates an AmountOutOfRange error for a field.
    pub fn out_of_range(field: impl Into<String>) -> Self {
        ValidationError::AmountOutOfRange {
            field: field.into(),
        }
    }

    /// Creates a MustBePositive error for a field.
    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::SessionAlreadyOpen {
            user_id: "cashier-1".to_string(),
            session_id: "s-1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "User cashier-1 already has an open session (s-1)"
        );

        let err = ValidationError::Overpayment {
            requested: Money::from_cents(6000),
            remaining: Money::from_cents(4000),
        };
        assert_eq!(
            err.to_string(),
            "Payment of 60.00 exceeds remaining balance 40.00"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CoreError::SessionAlreadyOpen {
                user_id: "u".into(),
                session_id: "s".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            CoreError::SessionClosed {
                session_id: "s".into()
            }
            .kind(),
            ErrorKind::State
        );
        assert_eq!(
            CoreError::NoActiveSession { user_id: "u".into() }.kind(),
            ErrorKind::State
        );
        assert_eq!(
            CoreError::not_found("Session", "x").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CoreError::from(ValidationError::must_be_positive("amount")).kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::required("reason");
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
