//! Unified error types for Finance Buddy.
//!
//! Every fallible function in the crate returns [`Result`]. Store errors from
//! `SeaORM` convert automatically; domain failures use named-field variants so
//! callers can match on them and surface the right message.

use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or was invalid
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Amount was negative, NaN or infinite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// A frequency string did not name a supported frequency
    #[error("Invalid frequency: '{value}'")]
    InvalidFrequency {
        /// The rejected value
        value: String,
    },

    /// A transaction kind string was neither income nor expense
    #[error("Invalid transaction kind: '{value}'")]
    InvalidKind {
        /// The rejected value
        value: String,
    },

    /// A stored or supplied date could not be parsed or left the calendar range
    #[error("Invalid date: '{value}'")]
    InvalidDate {
        /// The rejected value
        value: String,
    },

    /// Request input failed validation
    #[error("Validation failed: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// No transaction with this id belongs to the caller
    #[error("Transaction not found: {id}")]
    TransactionNotFound {
        /// Requested transaction id
        id: String,
    },

    /// No recurring rule with this id belongs to the caller
    #[error("Recurring rule not found: {id}")]
    RuleNotFound {
        /// Requested rule id
        id: String,
    },

    /// Missing or invalid credentials
    #[error("Unauthorized: {reason}")]
    Unauthorized {
        /// Why the credentials were rejected
        reason: String,
    },

    /// Valid identity without the required privilege
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Which privilege was missing
        reason: String,
    },

    /// I/O failure (config file, socket)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required environment variable missing
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// String formatting failed
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Serenity/Poise framework failure
    #[error("Discord framework error: {0}")]
    Discord(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
