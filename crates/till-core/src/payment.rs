//! # Payment Rules
//!
//! Pure checks for payments, refunds and their undo paths against a
//! [`ServiceRequest`].
//!
//! ## Payment Status
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   paid == 0            ──► pending                                      │
//! │   0 < paid < total     ──► partial                                      │
//! │   paid == total        ──► paid                                         │
//! │                                                                         │
//! │   cancelled: only via a refund to zero with cancel_service_request      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every check returns the request's new paid amount and status so the
//! caller only has to persist what this module decided.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{CashTransaction, PaymentStatus, ServiceRequest};
use crate::validation::validate_amount;

/// Paid state of a service request after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaidUpdate {
    pub paid: Money,
    pub status: PaymentStatus,
}

/// Derives the payment status from paid vs total.
///
/// ```rust
/// use till_core::payment::payment_status_for;
/// use till_core::{Money, PaymentStatus};
///
/// let total = Money::from_cents(10_000);
/// assert_eq!(payment_status_for(Money::zero(), total), PaymentStatus::Pending);
/// assert_eq!(payment_status_for(Money::from_cents(6_000), total), PaymentStatus::Partial);
/// assert_eq!(payment_status_for(total, total), PaymentStatus::Paid);
/// ```
pub fn payment_status_for(paid: Money, total: Money) -> PaymentStatus {
    if !paid.is_positive() {
        PaymentStatus::Pending
    } else if paid < total {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Paid
    }
}

/// Checks a payment of `amount` against `request`.
///
/// Rejects overpayment rather than clamping it.
pub fn check_payment(request: &ServiceRequest, amount: Money) -> CoreResult<PaidUpdate> {
    validate_amount(amount)?;

    if matches!(
        request.payment_status,
        PaymentStatus::Paid | PaymentStatus::Cancelled
    ) {
        return Err(CoreError::RequestNotPayable {
            request_id: request.id.clone(),
            status: request.payment_status.to_string(),
        });
    }

    let remaining = request.remaining();
    if amount > remaining {
        return Err(ValidationError::Overpayment {
            requested: amount,
            remaining,
        }
        .into());
    }

    let paid = request
        .paid()
        .checked_add(amount)
        .ok_or_else(|| ValidationError::out_of_range("paid amount"))?;
    Ok(PaidUpdate {
        paid,
        status: payment_status_for(paid, request.total()),
    })
}

/// What is left to refund on `original` given the active refunds already
/// linked to it.
pub fn refundable_amount(original: &CashTransaction, already_refunded: Money) -> Money {
    original.amount().saturating_sub_zero(already_refunded)
}

/// Checks a refund of `amount` from `original` back out of `request`.
///
/// `already_refunded` is the sum of active refunds referencing `original`.
/// With `cancel_request` set the refund must bring the paid amount to zero
/// and the request ends `cancelled`.
pub fn check_refund(
    request: &ServiceRequest,
    original: &CashTransaction,
    already_refunded: Money,
    amount: Money,
    cancel_request: bool,
) -> CoreResult<PaidUpdate> {
    if original.service_request_id.as_deref() != Some(request.id.as_str()) {
        return Err(CoreError::not_found("Transaction", original.id.clone()));
    }
    if !original.is_service_payment() {
        return Err(CoreError::NotRefundable {
            transaction_id: original.id.clone(),
        });
    }
    original.ensure_active()?;
    validate_amount(amount)?;

    let refundable = refundable_amount(original, already_refunded);
    if amount > refundable {
        return Err(ValidationError::RefundExceedsRefundable {
            requested: amount,
            refundable,
        }
        .into());
    }

    if amount > request.paid() {
        return Err(ValidationError::RefundExceedsPaid {
            requested: amount,
            paid: request.paid(),
        }
        .into());
    }

    let paid = request.paid() - amount;
    if cancel_request {
        if !paid.is_zero() {
            return Err(ValidationError::CancelRequiresFullRefund { left: paid }.into());
        }
        return Ok(PaidUpdate {
            paid,
            status: PaymentStatus::Cancelled,
        });
    }

    Ok(PaidUpdate {
        paid,
        status: payment_status_for(paid, request.total()),
    })
}

/// Undoes a payment of `amount` (the payment transaction is being cancelled).
pub fn check_payment_reversal(request: &ServiceRequest, amount: Money) -> CoreResult<PaidUpdate> {
    if amount > request.paid() {
        return Err(ValidationError::RefundExceedsPaid {
            requested: amount,
            paid: request.paid(),
        }
        .into());
    }

    let paid = request.paid() - amount;
    let status = match request.payment_status {
        // A cancelled request already sits at zero; keep it cancelled.
        PaymentStatus::Cancelled => PaymentStatus::Cancelled,
        _ => payment_status_for(paid, request.total()),
    };
    Ok(PaidUpdate { paid, status })
}

/// Restores a refund of `amount` (the refund transaction is being cancelled).
pub fn check_refund_restore(request: &ServiceRequest, amount: Money) -> CoreResult<PaidUpdate> {
    if request.payment_status == PaymentStatus::Cancelled {
        return Err(ValidationError::RequestCancelled {
            request_id: request.id.clone(),
        }
        .into());
    }

    let paid = request
        .paid()
        .checked_add(amount)
        .ok_or_else(|| ValidationError::out_of_range("paid amount"))?;
    if paid > request.total() {
        return Err(ValidationError::RestoreExceedsTotal {
            amount,
            paid: request.paid(),
            total: request.total(),
        }
        .into());
    }

    Ok(PaidUpdate {
        paid,
        status: payment_status_for(paid, request.total()),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::{TransactionCategory, TransactionStatus, TransactionType};
    use chrono::Utc;

    fn request(total: i64, paid: i64) -> ServiceRequest {
        let now = Utc::now();
        ServiceRequest {
            id: "req-1".to_string(),
            patient_id: Some("pat-1".to_string()),
            professional_id: Some("pro-1".to_string()),
            description: "Consulta general".to_string(),
            total_cents: total,
            paid_cents: paid,
            payment_status: payment_status_for(Money::from_cents(paid), Money::from_cents(total)),
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(amount: i64) -> CashTransaction {
        CashTransaction {
            seq: 1,
            id: "tx-1".to_string(),
            session_id: "s-1".to_string(),
            transaction_type: TransactionType::Income,
            category: TransactionCategory::ServicePayment,
            amount_cents: amount,
            concept: "Pago servicio".to_string(),
            payment_method: None,
            patient_id: None,
            professional_id: None,
            liquidation_id: None,
            service_request_id: Some("req-1".to_string()),
            original_transaction_id: None,
            user_id: "cashier-1".to_string(),
            status: TransactionStatus::Active,
            cancellation_reason: None,
            cancelled_by: None,
            cancelled_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_payment_status_for() {
        let total = Money::from_cents(15_000);
        assert_eq!(payment_status_for(Money::zero(), total), PaymentStatus::Pending);
        assert_eq!(
            payment_status_for(Money::from_cents(1), total),
            PaymentStatus::Partial
        );
        assert_eq!(payment_status_for(total, total), PaymentStatus::Paid);
    }

    #[test]
    fn test_partial_then_full_payment() {
        let req = request(10_000, 0);
        let update = check_payment(&req, Money::from_cents(6_000)).unwrap();
        assert_eq!(update.paid.cents(), 6_000);
        assert_eq!(update.status, PaymentStatus::Partial);

        let req = request(10_000, 6_000);
        let update = check_payment(&req, Money::from_cents(4_000)).unwrap();
        assert_eq!(update.status, PaymentStatus::Paid);
    }

    #[test]
    fn test_overpayment_rejected() {
        let req = request(10_000, 6_000);
        let err = check_payment(&req, Money::from_cents(6_000)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Overpayment { .. })
        ));
    }

    #[test]
    fn test_paid_request_not_payable() {
        let req = request(10_000, 10_000);
        let err = check_payment(&req, Money::from_cents(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_payment_amount_must_be_positive() {
        let req = request(10_000, 0);
        let err = check_payment(&req, Money::zero()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_full_refund_returns_to_pending() {
        let req = request(15_000, 15_000);
        let original = payment(15_000);
        let update =
            check_refund(&req, &original, Money::zero(), Money::from_cents(15_000), false)
                .unwrap();
        assert!(update.paid.is_zero());
        assert_eq!(update.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_refund_bounded_by_prior_refunds() {
        let req = request(15_000, 10_000);
        let original = payment(15_000);
        let err = check_refund(
            &req,
            &original,
            Money::from_cents(5_000),
            Money::from_cents(10_001),
            false,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::RefundExceedsRefundable { .. })
        ));
    }

    #[test]
    fn test_refund_bounded_by_paid() {
        let req = request(15_000, 3_000);
        let original = payment(15_000);
        let err = check_refund(&req, &original, Money::zero(), Money::from_cents(5_000), false)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::RefundExceedsPaid { .. })
        ));
    }

    #[test]
    fn test_refund_of_other_request_is_not_found() {
        let mut req = request(15_000, 15_000);
        req.id = "req-2".to_string();
        let err = check_refund(&req, &payment(15_000), Money::zero(), Money::from_cents(1), false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_refund_of_refund_rejected() {
        let req = request(15_000, 15_000);
        let mut original = payment(15_000);
        original.transaction_type = TransactionType::Expense;
        original.original_transaction_id = Some("tx-0".to_string());
        let err = check_refund(&req, &original, Money::zero(), Money::from_cents(1), false)
            .unwrap_err();
        assert!(matches!(err, CoreError::NotRefundable { .. }));
    }

    #[test]
    fn test_refund_of_cancelled_payment_rejected() {
        let req = request(15_000, 15_000);
        let mut original = payment(15_000);
        original.status = TransactionStatus::Cancelled;
        let err = check_refund(&req, &original, Money::zero(), Money::from_cents(1), false)
            .unwrap_err();
        assert!(matches!(err, CoreError::TransactionNotActive { .. }));
    }

    #[test]
    fn test_cancel_request_requires_zero() {
        let req = request(15_000, 15_000);
        let original = payment(15_000);

        let err = check_refund(&req, &original, Money::zero(), Money::from_cents(5_000), true)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::CancelRequiresFullRefund { .. })
        ));

        let update =
            check_refund(&req, &original, Money::zero(), Money::from_cents(15_000), true).unwrap();
        assert_eq!(update.status, PaymentStatus::Cancelled);
    }

    #[test]
    fn test_payment_reversal() {
        let req = request(10_000, 10_000);
        let update = check_payment_reversal(&req, Money::from_cents(4_000)).unwrap();
        assert_eq!(update.paid.cents(), 6_000);
        assert_eq!(update.status, PaymentStatus::Partial);
    }

    #[test]
    fn test_refund_restore() {
        let req = request(10_000, 0);
        let update = check_refund_restore(&req, Money::from_cents(10_000)).unwrap();
        assert_eq!(update.status, PaymentStatus::Paid);

        let req = request(10_000, 5_000);
        let err = check_refund_restore(&req, Money::from_cents(6_000)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::RestoreExceedsTotal { .. })
        ));

        let mut req = request(10_000, 0);
        req.payment_status = PaymentStatus::Cancelled;
        let err = check_refund_restore(&req, Money::from_cents(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let req = request(i64::MAX, i64::MAX - 1);
        let err = check_refund_restore(&req, Money::from_cents(2)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_refundable_amount() {
        let original = payment(15_000);
        assert_eq!(
            refundable_amount(&original, Money::from_cents(5_000)).cents(),
            10_000
        );
        assert!(refundable_amount(&original, Money::from_cents(20_000)).is_zero());
    }
}
