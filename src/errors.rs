//! Unified error types for the inventory core.
//!
//! Every operation returns structured error kinds carrying the identifying context
//! (which drug, which id). Callers translate them into user-facing responses.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors produced by the inventory core.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Input rejected before touching storage (malformed status, blank name, bad quantity)
    #[error("Validation error: {message}")]
    Validation {
        /// What was rejected
        message: String,
    },

    /// Referenced drug does not exist
    #[error("Drug not found: {name}")]
    DrugNotFound {
        /// Drug name (or id, for id lookups)
        name: String,
    },

    /// Referenced purchase does not exist
    #[error("Purchase not found: {id}")]
    PurchaseNotFound {
        /// Purchase id
        id: i64,
    },

    /// Referenced sale does not exist
    #[error("Sale not found: {id}")]
    SaleNotFound {
        /// Sale id
        id: i64,
    },

    /// Referenced catalog record (category, unit, supplier) does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Sale would take more stock than is on hand
    #[error("Insufficient stock for {drug}: available {available}, requested {requested}")]
    InsufficientStock {
        /// Drug name
        drug: String,
        /// On-hand quantity observed
        available: i64,
        /// Quantity requested
        requested: i64,
    },

    /// Duplicate invoice or duplicate drug/category/unit/supplier name
    #[error("Unique constraint violation: {message}")]
    UniqueConstraintViolation {
        /// Message reported by the store
        message: String,
    },

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// True for every "referenced record does not exist" kind.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DrugNotFound { .. }
                | Self::PurchaseNotFound { .. }
                | Self::SaleNotFound { .. }
                | Self::NotFound { .. }
        )
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => {
                Self::UniqueConstraintViolation { message }
            }
            _ => Self::Database(err),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

/// Trims `value`, rejecting it with `Validation` when nothing is left.
pub(crate) fn required_text(label: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(format!("{label} cannot be empty")));
    }
    Ok(trimmed.to_string())
}
