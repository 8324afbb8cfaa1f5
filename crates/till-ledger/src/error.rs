//! # Ledger Error Types
//!
//! One error type for every `CashLedger` operation.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        LedgerError                                      │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Core           │  │  Db             │  │  Configuration          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  CoreError      │  │  DbError        │  │  InvalidConfig          │ │
//! │  │  (rule checks)  │  │  (sqlx)         │  │  ConfigLoadFailed       │ │
//! │  │                 │  │                 │  │  ConfigSaveFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ChannelError: the audit listener is gone                              │
//! │                                                                         │
//! │  kind() folds everything into Conflict/State/Validation/NotFound/      │
//! │  Storage for callers that map errors to responses.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use till_core::{CoreError, ErrorKind, ValidationError};
use till_db::DbError;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger error type.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The database failed.
    #[error(transparent)]
    Db(#[from] DbError),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid ledger configuration.
    #[error("Invalid ledger configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Audit channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

impl LedgerError {
    /// Classifies the error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Core(err) => err.kind(),
            LedgerError::Db(DbError::NotFound { .. }) => ErrorKind::NotFound,
            LedgerError::Db(err) if err.is_unique_violation_on("cash_sessions.user_id") => {
                ErrorKind::Conflict
            }
            LedgerError::Db(_) | LedgerError::ChannelError(_) => ErrorKind::Storage,
            LedgerError::InvalidConfig(_)
            | LedgerError::ConfigLoadFailed(_)
            | LedgerError::ConfigSaveFailed(_) => ErrorKind::Validation,
        }
    }

    /// Returns the rule violation, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            LedgerError::Core(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LedgerError::InvalidConfig(_)
                | LedgerError::ConfigLoadFailed(_)
                | LedgerError::ConfigSaveFailed(_)
        )
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Db(DbError::from(err))
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for LedgerError {
    fn from(err: toml::ser::Error) -> Self {
        LedgerError::ConfigSaveFailed(err.to_string())
    }
}
