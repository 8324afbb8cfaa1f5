//! # Currency Formatting
//!
//! Stateless rendering of [`Money`] for receipts, reports and the CLI.
//!
//! Nothing here is process-global: every call site holds a
//! [`CurrencyFormat`] (usually the one from `[currency]` in `till.toml`) and
//! passes money through it.
//!
//! ```rust
//! use till_core::currency::CurrencyFormat;
//! use till_core::Money;
//!
//! let cop = CurrencyFormat::default();
//! assert_eq!(cop.format(Money::from_cents(15_000_000)), "$150.000,00");
//!
//! let usd = CurrencyFormat::usd();
//! assert_eq!(usd.format(Money::from_cents(-550)), "-$5.50");
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Where the symbol goes relative to the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolPosition {
    #[default]
    Before,
    After,
}

/// When to print the minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecimalPolicy {
    /// `150.000,00`
    #[default]
    Always,
    /// `150.000` but `150.000,50`
    WhenFractional,
    /// Rounded to whole units, half away from zero.
    Never,
}

/// Currency rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    /// ISO 4217 code, informational.
    pub code: String,
    pub symbol: String,
    pub symbol_position: SymbolPosition,
    pub thousands_separator: char,
    pub decimal_separator: char,
    /// Number of minor digits the currency uses (0 or 2).
    pub decimals: u8,
    pub decimal_policy: DecimalPolicy,
}

impl Default for CurrencyFormat {
    /// Colombian peso style: `$150.000,00`.
    fn default() -> Self {
        CurrencyFormat {
            code: "COP".to_string(),
            symbol: "$".to_string(),
            symbol_position: SymbolPosition::Before,
            thousands_separator: '.',
            decimal_separator: ',',
            decimals: 2,
            decimal_policy: DecimalPolicy::Always,
        }
    }
}

impl CurrencyFormat {
    /// US dollar style: `$1,234.56`.
    pub fn usd() -> Self {
        CurrencyFormat {
            code: "USD".to_string(),
            thousands_separator: ',',
            decimal_separator: '.',
            ..CurrencyFormat::default()
        }
    }

    /// Formats an amount including symbol and sign.
    pub fn format(&self, amount: Money) -> String {
        let number = self.format_number(amount.abs());
        let sign = if amount.is_negative() { "-" } else { "" };

        match self.symbol_position {
            SymbolPosition::Before => format!("{}{}{}", sign, self.symbol, number),
            SymbolPosition::After => format!("{}{} {}", sign, number, self.symbol),
        }
    }

    /// Formats the absolute value without symbol or sign.
    pub fn format_number(&self, amount: Money) -> String {
        let cents = amount.abs().cents();
        let show_minor = self.decimals > 0
            && match self.decimal_policy {
                DecimalPolicy::Always => true,
                DecimalPolicy::WhenFractional => cents % 100 != 0,
                DecimalPolicy::Never => false,
            };

        let (major, minor) = if show_minor {
            (cents / 100, Some(cents % 100))
        } else {
            // Round half away from zero on the absolute value.
            (cents / 100 + i64::from(cents % 100 >= 50), None)
        };

        let grouped = group_thousands(major, self.thousands_separator);
        match minor {
            Some(minor) => format!("{}{}{:02}", grouped, self.decimal_separator, minor),
            None => grouped,
        }
    }
}

fn group_thousands(value: i64, separator: char) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_format() {
        let fmt = CurrencyFormat::default();
        assert_eq!(fmt.format(Money::from_cents(0)), "$0,00");
        assert_eq!(fmt.format(Money::from_cents(99)), "$0,99");
        assert_eq!(fmt.format(Money::from_cents(100_000)), "$1.000,00");
        assert_eq!(fmt.format(Money::from_cents(13_000_000)), "$130.000,00");
        assert_eq!(fmt.format(Money::from_cents(-500_000)), "-$5.000,00");
    }

    #[test]
    fn test_usd_format() {
        let fmt = CurrencyFormat::usd();
        assert_eq!(fmt.format(Money::from_cents(123_456)), "$1,234.56");
        assert_eq!(fmt.format(Money::from_cents(-550)), "-$5.50");
    }

    #[test]
    fn test_decimal_policies() {
        let mut fmt = CurrencyFormat::default();

        fmt.decimal_policy = DecimalPolicy::WhenFractional;
        assert_eq!(fmt.format(Money::from_cents(15_000)), "$150");
        assert_eq!(fmt.format(Money::from_cents(15_050)), "$150,50");

        fmt.decimal_policy = DecimalPolicy::Never;
        assert_eq!(fmt.format(Money::from_cents(15_049)), "$150");
        assert_eq!(fmt.format(Money::from_cents(15_050)), "$151");
        assert_eq!(fmt.format(Money::from_cents(-15_050)), "-$151");
        assert_eq!(
            fmt.format(Money::from_cents(i64::MAX)),
            "$92.233.720.368.547.758"
        );
    }

    #[test]
    fn test_zero_decimal_currency() {
        let fmt = CurrencyFormat {
            decimals: 0,
            ..CurrencyFormat::default()
        };
        assert_eq!(fmt.format(Money::from_cents(123_456_789)), "$1.234.568");
    }

    #[test]
    fn test_symbol_after() {
        let fmt = CurrencyFormat {
            code: "EUR".to_string(),
            symbol: "€".to_string(),
            symbol_position: SymbolPosition::After,
            ..CurrencyFormat::default()
        };
        assert_eq!(fmt.format(Money::from_cents(123_456)), "1.234,56 €");
        assert_eq!(fmt.format(Money::from_cents(-100)), "-1,00 €");
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0, ','), "0");
        assert_eq!(group_thousands(999, ','), "999");
        assert_eq!(group_thousands(1_000, ','), "1,000");
        assert_eq!(group_thousands(1_234_567, '.'), "1.234.567");
    }
}
