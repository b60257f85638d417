//! Core business logic - framework-agnostic ledger, rule and recurrence operations.
//!
//! Nothing in here knows about HTTP or Discord; both front-ends call into these
//! modules with an owner id they have already authenticated.

/// Recurrence engine
pub mod recurring;
/// Recurring rule store
pub mod rule;
/// Due-date calculator
pub mod schedule;
/// Ledger store
pub mod transaction;
/// Authorization and entry points for the three trigger surfaces
pub mod triggers;
