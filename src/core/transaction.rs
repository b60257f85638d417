//! Ledger business logic - create, query, edit and delete transactions.
//!
//! Every operation is scoped by owner: a caller can never read or modify
//! another user's entries. Deleting an entry that does not exist (or belongs to
//! someone else) is a no-op, while editing one is an explicit not-found error.
//! Timestamps are validated and normalized to RFC 3339 before they are stored.

use crate::{
    core::schedule::{format_instant, parse_instant},
    entities::{Transaction, transaction},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{Set, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Money coming in
    Income,
    /// Money going out
    Expense,
}

impl TransactionKind {
    /// Lowercase name as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(Error::InvalidKind {
                value: s.to_string(),
            }),
        }
    }
}

/// Fields for a new ledger entry
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    /// Owning user
    pub owner_id: String,
    /// Non-negative magnitude
    pub amount: f64,
    /// Income or expense
    pub kind: TransactionKind,
    /// Free-form label
    pub category: String,
    /// Free-form text
    pub description: String,
    /// Effective instant (ISO-8601 date or timestamp)
    pub occurred_at: String,
    /// Generating rule, if any
    pub source_rule_id: Option<String>,
}

/// In-place edit of a transaction; `None` fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    /// New amount
    pub amount: Option<f64>,
    /// New description
    pub description: Option<String>,
    /// New category
    pub category: Option<String>,
    /// New effective instant
    pub occurred_at: Option<String>,
}

/// Inclusive calendar-date window over `occurred_at`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First day included
    pub from: Option<NaiveDate>,
    /// Last day included
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Returns true when `instant` falls on a day inside the window.
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        let day = instant.date_naive();
        self.from.is_none_or(|from| day >= from) && self.to.is_none_or(|to| day <= to)
    }
}

/// Rejects negative, NaN and infinite amounts.
pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Inserts a new ledger entry with a fresh opaque id.
///
/// Generic over the connection so the recurrence engine can insert inside the
/// same database transaction that advances a rule's cursor.
///
/// # Arguments
/// * `db` - Database connection or open database transaction
/// * `new` - Entry fields; `occurred_at` may be a date or an RFC 3339 instant
///
/// # Returns
/// * `Ok(model)` - The stored entry, `occurred_at` normalized to RFC 3339
/// * `Err(InvalidAmount | InvalidDate)` - Rejected before touching the store
#[instrument(skip(db, new), fields(owner_id = %new.owner_id))]
pub async fn create_transaction<C>(db: &C, new: NewTransaction) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    validate_amount(new.amount)?;
    let occurred_at = format_instant(parse_instant(&new.occurred_at)?);

    let model = transaction::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        owner_id: Set(new.owner_id),
        amount: Set(new.amount),
        kind: Set(new.kind.as_str().to_string()),
        category: Set(new.category.trim().to_string()),
        description: Set(new.description.trim().to_string()),
        occurred_at: Set(occurred_at),
        source_rule_id: Set(new.source_rule_id),
        created_at: Set(format_instant(Utc::now())),
    };

    let result = model.insert(db).await?;
    debug!(
        "Created transaction {} ({} {:.2}) for {}",
        result.id, result.kind, result.amount, result.owner_id
    );
    Ok(result)
}

/// Lists an owner's transactions, newest first, optionally restricted to a date window.
///
/// Dates are compared after parsing, never as strings. Rows with an
/// unreadable date are logged and left out.
///
/// # Arguments
/// * `db` - Database connection
/// * `owner_id` - Owner whose ledger is read
/// * `range` - Inclusive calendar-day window, or `None` for everything
#[instrument(skip(db))]
pub async fn list_transactions(
    db: &DatabaseConnection,
    owner_id: &str,
    range: Option<DateRange>,
) -> Result<Vec<transaction::Model>> {
    let rows = Transaction::find()
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .all(db)
        .await?;

    let mut dated: Vec<(DateTime<Utc>, transaction::Model)> = rows
        .into_iter()
        .filter_map(|row| match parse_instant(&row.occurred_at) {
            Ok(instant) => Some((instant, row)),
            Err(e) => {
                warn!("Skipping transaction {} with unreadable date: {e}", row.id);
                None
            }
        })
        .filter(|(instant, _)| range.is_none_or(|r| r.contains(*instant)))
        .collect();

    dated.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.created_at.cmp(&a.1.created_at)));
    Ok(dated.into_iter().map(|(_, row)| row).collect())
}

/// Lists every transaction generated by a rule, regardless of owner.
pub async fn list_transactions_for_rule(
    db: &DatabaseConnection,
    rule_id: &str,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::SourceRuleId.eq(rule_id))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Fetches one of the owner's transactions by id.
pub async fn get_transaction(
    db: &DatabaseConnection,
    transaction_id: &str,
    owner_id: &str,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id.to_string())
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Applies a user edit to one of the owner's transactions.
///
/// # Errors
/// `TransactionNotFound` when the id does not belong to the owner, and
/// validation errors for a bad amount or date.
///
/// # Returns
/// * `Ok(model)` - The entry after the edit (unchanged when `update` is empty)
#[instrument(skip(db, update))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    transaction_id: &str,
    owner_id: &str,
    update: TransactionUpdate,
) -> Result<transaction::Model> {
    let existing = get_transaction(db, transaction_id, owner_id)
        .await?
        .ok_or_else(|| Error::TransactionNotFound {
            id: transaction_id.to_string(),
        })?;

    let mut active_model: transaction::ActiveModel = existing.clone().into();

    if let Some(amount) = update.amount {
        validate_amount(amount)?;
        active_model.amount = Set(amount);
    }
    if let Some(description) = update.description {
        active_model.description = Set(description.trim().to_string());
    }
    if let Some(category) = update.category {
        active_model.category = Set(category.trim().to_string());
    }
    if let Some(occurred_at) = update.occurred_at {
        active_model.occurred_at = Set(format_instant(parse_instant(&occurred_at)?));
    }
    if !active_model.is_changed() {
        return Ok(existing);
    }

    let updated = active_model.update(db).await?;
    info!("Updated transaction {} for {}", updated.id, owner_id);
    Ok(updated)
}

/// Deletes one of the owner's transactions.
///
/// # Returns
/// * `Ok(true)` - The entry was removed
/// * `Ok(false)` - No such entry for this owner, nothing changed
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    transaction_id: &str,
    owner_id: &str,
) -> Result<bool> {
    let result = Transaction::delete_many()
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::OwnerId.eq(owner_id))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!("Deleted transaction {transaction_id} for {owner_id}");
    }
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_create_transaction_validation() -> Result<()> {
        let db = setup_test_db().await?;

        for amount in [-1.0, f64::NAN, f64::INFINITY] {
            let result = create_transaction(&db, new_expense("alice", amount, "2024-01-01")).await;
            assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        }

        let result = create_transaction(&db, new_expense("alice", 5.0, "yesterday")).await;
        assert!(matches!(result, Err(Error::InvalidDate { .. })));

        assert!(list_transactions(&db, "alice", None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_transaction_normalizes_date() -> Result<()> {
        let db = setup_test_db().await?;

        let created = create_transaction(&db, new_expense("alice", 12.5, "2024-03-05")).await?;
        assert_eq!(created.occurred_at, "2024-03-05T00:00:00Z");
        assert_eq!(created.kind, "expense");
        assert!(created.source_rule_id.is_none());
        assert!(Uuid::parse_str(&created.id).is_ok());

        let zero = create_transaction(&db, new_expense("alice", 0.0, "2024-03-05")).await?;
        assert_eq!(zero.amount, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ids_are_unique() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_transaction(&db, new_expense("alice", 1.0, "2024-01-01")).await?;
        let b = create_transaction(&db, new_expense("alice", 1.0, "2024-01-01")).await?;
        assert_ne!(a.id, b.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_is_owner_scoped_and_sorted() -> Result<()> {
        let db = setup_test_db().await?;
        create_transaction(&db, new_expense("alice", 1.0, "2024-01-10")).await?;
        create_transaction(&db, new_expense("alice", 2.0, "2024-03-10")).await?;
        create_transaction(&db, new_expense("alice", 3.0, "2024-02-10")).await?;
        create_transaction(&db, new_expense("bob", 4.0, "2024-02-11")).await?;

        let listed = list_transactions(&db, "alice", None).await?;
        let amounts: Vec<f64> = listed.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![2.0, 3.0, 1.0]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_with_date_range() -> Result<()> {
        let db = setup_test_db().await?;
        create_transaction(&db, new_expense("alice", 1.0, "2024-01-31T23:59:59Z")).await?;
        create_transaction(&db, new_expense("alice", 2.0, "2024-02-01")).await?;
        create_transaction(&db, new_expense("alice", 3.0, "2024-02-29T12:00:00Z")).await?;
        create_transaction(&db, new_expense("alice", 4.0, "2024-03-01")).await?;

        let range = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 2, 1),
            to: NaiveDate::from_ymd_opt(2024, 2, 29),
        };
        let listed = list_transactions(&db, "alice", Some(range)).await?;
        let amounts: Vec<f64> = listed.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![3.0, 2.0]);

        let open_ended = DateRange {
            from: NaiveDate::from_ymd_opt(2024, 2, 29),
            to: None,
        };
        assert_eq!(list_transactions(&db, "alice", Some(open_ended)).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_transaction() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_transaction(&db, new_expense("alice", 10.0, "2024-01-01")).await?;

        let updated = update_transaction(
            &db,
            &created.id,
            "alice",
            TransactionUpdate {
                amount: Some(20.0),
                description: Some("  Dinner ".to_string()),
                category: None,
                occurred_at: Some("2024-01-02".to_string()),
            },
        )
        .await?;

        assert_eq!(updated.amount, 20.0);
        assert_eq!(updated.description, "Dinner");
        assert_eq!(updated.category, created.category);
        assert_eq!(updated.occurred_at, "2024-01-02T00:00:00Z");
        assert_eq!(updated.id, created.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_other_owner_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_transaction(&db, new_expense("alice", 10.0, "2024-01-01")).await?;

        let result = update_transaction(&db, &created.id, "bob", TransactionUpdate::default()).await;
        assert!(matches!(result, Err(Error::TransactionNotFound { .. })));

        let bad_amount = update_transaction(
            &db,
            &created.id,
            "alice",
            TransactionUpdate {
                amount: Some(-3.0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(bad_amount, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_is_owner_scoped_and_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let created = create_transaction(&db, new_expense("alice", 10.0, "2024-01-01")).await?;

        assert!(!delete_transaction(&db, &created.id, "bob").await?);
        assert!(get_transaction(&db, &created.id, "alice").await?.is_some());

        assert!(delete_transaction(&db, &created.id, "alice").await?);
        assert!(!delete_transaction(&db, &created.id, "alice").await?);
        assert!(get_transaction(&db, &created.id, "alice").await?.is_none());
        Ok(())
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("Income".parse::<TransactionKind>().unwrap(), TransactionKind::Income);
        assert!(matches!(
            "transfer".parse::<TransactionKind>(),
            Err(Error::InvalidKind { .. })
        ));
    }
}
