//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// General utility commands
pub mod general;

/// Recurring rule commands and the recurring triggers
pub mod recurring;

/// Ledger commands
pub mod transaction;

pub use general::*;
pub use recurring::*;
pub use transaction::*;
