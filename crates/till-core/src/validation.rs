//! # Validation Module
//!
//! Input validation for ledger operations.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Caller (clinic app / `till` CLI)                             │
//! │  └── Parsing, authorization                                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Amounts positive / non-negative                                   │
//! │  └── Required text present and bounded                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (amount_cents > 0)                                          │
//! │  ├── CHECK (paid_cents <= total_cents)                                 │
//! │  └── Partial UNIQUE index on open sessions                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_amount, validate_concept};
//! use till_core::Money;
//!
//! validate_amount(Money::from_cents(5_000)).unwrap();
//! assert_eq!(validate_concept("  Consulta  ").unwrap(), "Consulta");
//! ```

use crate::error::ValidationError;
use crate::money::Money;
use crate::{MAX_AMOUNT_CENTS, MAX_CONCEPT_LEN, MAX_REASON_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Text Validators
// =============================================================================

/// Trims `value` and checks it is non-empty and at most `max` characters.
///
/// Returns the trimmed string.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Validates a transaction concept (free-text description).
///
/// ```rust
/// use till_core::validation::validate_concept;
///
/// assert!(validate_concept("Compra de guantes").is_ok());
/// assert!(validate_concept("   ").is_err());
/// ```
pub fn validate_concept(concept: &str) -> ValidationResult<String> {
    validate_text("concept", concept, MAX_CONCEPT_LEN)
}

/// Validates a refund or cancellation reason.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    validate_text("reason", reason, MAX_REASON_LEN)
}

/// Normalizes optional notes: blank becomes `None`.
pub fn normalize_notes(notes: Option<&str>) -> ValidationResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => validate_text("notes", text, MAX_REASON_LEN).map(Some),
    }
}

/// Validates that an identifier is present.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(())
}

// =============================================================================
// Amount Validators
// =============================================================================

/// A posted amount must be strictly positive and at most
/// [`MAX_AMOUNT_CENTS`].
///
/// ## Example
/// ```rust
/// use till_core::validation::validate_amount;
/// use till_core::Money;
///
/// assert!(validate_amount(Money::from_cents(1)).is_ok());
/// assert!(validate_amount(Money::zero()).is_err());
/// assert!(validate_amount(Money::from_cents(-100)).is_err());
/// assert!(validate_amount(Money::from_cents(i64::MAX)).is_err());
/// ```
pub fn validate_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::must_be_positive("amount"));
    }
    check_range("amount", amount)
}

/// Counted drawer amounts (opening float, closing count) may be zero.
pub fn validate_cash_count(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    check_range(field, amount)
}

fn check_range(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.cents() > MAX_AMOUNT_CENTS {
        return Err(ValidationError::out_of_range(field));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_concept() {
        assert_eq!(validate_concept(" Pago consulta ").unwrap(), "Pago consulta");
        assert!(matches!(
            validate_concept(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_concept(&"x".repeat(MAX_CONCEPT_LEN + 1)),
            Err(ValidationError::TooLong { .. })
        ));
        assert!(validate_concept(&"x".repeat(MAX_CONCEPT_LEN)).is_ok());
    }

    #[test]
    fn test_validate_reason_counts_chars_not_bytes() {
        let accented = "é".repeat(MAX_REASON_LEN);
        assert!(validate_reason(&accented).is_ok());
    }

    #[test]
    fn test_normalize_notes() {
        assert_eq!(normalize_notes(None).unwrap(), None);
        assert_eq!(normalize_notes(Some("   ")).unwrap(), None);
        assert_eq!(
            normalize_notes(Some(" turno mañana ")).unwrap(),
            Some("turno mañana".to_string())
        );
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::from_cents(50_000)).is_ok());
        assert!(validate_amount(Money::zero()).is_err());
        assert!(validate_amount(Money::from_cents(-1)).is_err());
        assert!(validate_amount(Money::from_cents(MAX_AMOUNT_CENTS)).is_ok());
        assert!(matches!(
            validate_amount(Money::from_cents(MAX_AMOUNT_CENTS + 1)),
            Err(ValidationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_cash_count() {
        assert!(validate_cash_count("initial amount", Money::zero()).is_ok());
        assert!(matches!(
            validate_cash_count("final amount", Money::from_cents(-1)),
            Err(ValidationError::MustNotBeNegative { .. })
        ));
        assert!(matches!(
            validate_cash_count("final amount", Money::from_cents(i64::MAX)),
            Err(ValidationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("user_id", "cashier-1").is_ok());
        assert!(validate_id("user_id", "  ").is_err());
    }
}
