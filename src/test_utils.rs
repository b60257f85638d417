//! Shared test utilities for Finance Buddy.
//!
//! Helpers for setting up an in-memory database and creating test rules and
//! transactions with sensible defaults.

use crate::{
    core::{
        rule::{NewRule, create_rule},
        schedule::{Frequency, parse_date},
        transaction::{NewTransaction, TransactionKind},
    },
    entities::{self, Transaction},
    errors::Result,
};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Builds a manual expense for `owner` dated `occurred_at`.
///
/// # Defaults
/// * `category`: `"groceries"`
/// * `description`: `"Test transaction"`
pub fn new_expense(owner: &str, amount: f64, occurred_at: &str) -> NewTransaction {
    NewTransaction {
        owner_id: owner.to_string(),
        amount,
        kind: TransactionKind::Expense,
        category: "groceries".to_string(),
        description: "Test transaction".to_string(),
        occurred_at: occurred_at.to_string(),
        source_rule_id: None,
    }
}

/// Builds a rule template for `owner`.
///
/// # Defaults
/// * `kind`: expense
/// * `category`: `"housing"`
/// * `description`: `"Rent"`
/// * `amount`: 1200.0
///
/// # Panics
/// When `start_date` is not a valid ISO date.
#[allow(clippy::unwrap_used)]
pub fn new_rule(owner: &str, frequency: Frequency, start_date: &str) -> NewRule {
    NewRule {
        owner_id: owner.to_string(),
        kind: TransactionKind::Expense,
        category: "housing".to_string(),
        description: "Rent".to_string(),
        amount: 1200.0,
        frequency,
        start_date: parse_date(start_date).unwrap(),
    }
}

/// Creates an active rule for `owner` with default template fields.
pub async fn create_test_rule(
    db: &DatabaseConnection,
    owner: &str,
    frequency: Frequency,
    start_date: &str,
) -> Result<entities::recurring_rule::Model> {
    create_rule(db, new_rule(owner, frequency, start_date)).await
}

/// Counts every transaction in the ledger.
pub async fn count_transactions(db: &DatabaseConnection) -> Result<u64> {
    Ok(Transaction::find().count(db).await?)
}
