//! # Reconciliation
//!
//! Compares a physically counted drawer against the calculated balance.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  difference = counted − calculated                                      │
//! │                                                                         │
//! │    difference  < 0   ──► Shortage   (cash missing)                      │
//! │    difference == 0   ──► None                                           │
//! │    difference  > 0   ──► Overage    (extra cash)                        │
//! │                                                                         │
//! │  |difference| > threshold  ──► material: justification required         │
//! │                                (+ authorizer when policy demands it)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::CashSession;
use crate::validation::{validate_cash_count, validate_reason};
use crate::DEFAULT_DISCREPANCY_THRESHOLD_CENTS;

/// Direction of a cash difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyClass {
    None,
    Shortage,
    Overage,
}

/// Outcome of comparing counted cash to the calculated balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discrepancy {
    /// `counted − calculated`.
    pub difference: Money,
    pub class: DiscrepancyClass,
    /// `|difference| > threshold`.
    pub material: bool,
}

impl Discrepancy {
    /// Pure comparison used both before closing and when reporting.
    ///
    /// Fails with `AmountOutOfRange` when the difference leaves `i64` range.
    ///
    /// ```rust
    /// use till_core::reconcile::{Discrepancy, DiscrepancyClass};
    /// use till_core::Money;
    ///
    /// let d = Discrepancy::compute(
    ///     Money::from_cents(150_000),
    ///     Money::from_cents(145_000),
    ///     Money::from_cents(1_000),
    /// )
    /// .unwrap();
    /// assert_eq!(d.difference.cents(), -5_000);
    /// assert_eq!(d.class, DiscrepancyClass::Shortage);
    /// assert!(d.material);
    /// ```
    pub fn compute(calculated: Money, counted: Money, threshold: Money) -> CoreResult<Self> {
        let difference = counted
            .checked_sub(calculated)
            .ok_or_else(|| ValidationError::out_of_range("difference"))?;
        let class = if difference.is_zero() {
            DiscrepancyClass::None
        } else if difference.is_negative() {
            DiscrepancyClass::Shortage
        } else {
            DiscrepancyClass::Overage
        };

        Ok(Discrepancy {
            difference,
            class,
            material: difference.cents().unsigned_abs() > threshold.cents().max(0).unsigned_abs(),
        })
    }
}

/// Rules applied when closing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosePolicy {
    pub threshold: Money,
    pub require_authorizer: bool,
}

impl Default for ClosePolicy {
    fn default() -> Self {
        ClosePolicy {
            threshold: Money::from_cents(DEFAULT_DISCREPANCY_THRESHOLD_CENTS),
            require_authorizer: false,
        }
    }
}

/// Validated close decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseDecision {
    pub discrepancy: Discrepancy,
    pub justification: Option<String>,
    pub authorized_by: Option<String>,
}

/// Checks whether `session` may be closed with `counted` in the drawer.
///
/// Nothing is mutated; the caller persists the returned decision.
pub fn check_close(
    session: &CashSession,
    counted: Money,
    justification: Option<&str>,
    authorized_by: Option<&str>,
    policy: &ClosePolicy,
) -> CoreResult<CloseDecision> {
    session.ensure_open()?;
    validate_cash_count("final amount", counted)?;

    let discrepancy =
        Discrepancy::compute(session.calculated_balance(), counted, policy.threshold)?;

    let justification = match justification.map(str::trim) {
        None | Some("") => None,
        Some(text) => Some(validate_reason(text)?),
    };
    let authorized_by = authorized_by
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if discrepancy.material {
        if justification.is_none() {
            return Err(ValidationError::JustificationRequired {
                difference: discrepancy.difference,
                threshold: policy.threshold,
            }
            .into());
        }
        if policy.require_authorizer && authorized_by.is_none() {
            return Err(ValidationError::AuthorizerRequired {
                difference: discrepancy.difference,
                threshold: policy.threshold,
            }
            .into());
        }
    }

    Ok(CloseDecision {
        discrepancy,
        justification,
        authorized_by,
    })
}

/// Post-close discrepancy report for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscrepancyReport {
    pub session_id: String,
    pub calculated_balance_cents: i64,
    pub final_cents: i64,
    pub difference_cents: i64,
    pub threshold_cents: i64,
    pub has_discrepancy: bool,
    pub classification: DiscrepancyClass,
    pub justification: Option<String>,
    pub authorized_by: Option<String>,
}

impl DiscrepancyReport {
    /// Builds the report from a closed session.
    pub fn for_session(session: &CashSession, threshold: Money) -> CoreResult<Self> {
        let final_cents = match (session.is_open(), session.final_cents) {
            (false, Some(cents)) => cents,
            _ => {
                return Err(CoreError::SessionStillOpen {
                    session_id: session.id.clone(),
                })
            }
        };

        let discrepancy = Discrepancy::compute(
            session.calculated_balance(),
            Money::from_cents(final_cents),
            threshold,
        )?;

        Ok(DiscrepancyReport {
            session_id: session.id.clone(),
            calculated_balance_cents: session.calculated_balance_cents,
            final_cents,
            difference_cents: discrepancy.difference.cents(),
            threshold_cents: threshold.cents(),
            has_discrepancy: discrepancy.material,
            classification: discrepancy.class,
            justification: session.difference_justification.clone(),
            authorized_by: session.authorized_by.clone(),
        })
    }

    pub fn difference(&self) -> Money {
        Money::from_cents(self.difference_cents)
    }
}
