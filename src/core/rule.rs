//! Recurring rule business logic - the rule store.
//!
//! Rules are templates plus a due-date cursor. Users create, edit, toggle and
//! delete them here; only the recurrence engine moves the cursor, and it does
//! so through [`advance_cursor`], a conditional update that refuses to apply
//! when another run has already moved the cursor.

use crate::{
    core::{
        schedule::{Frequency, format_date, format_instant, parse_date, parse_instant},
        transaction::{TransactionKind, validate_amount},
    },
    entities::{RecurringRule, recurring_rule},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Which rules an operation covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleScope {
    /// Rules of a single owner
    Owner(String),
    /// Every rule in the system
    All,
}

impl RuleScope {
    /// Scope limited to `owner_id`
    #[must_use]
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self::Owner(owner_id.into())
    }
}

/// Fields for a new recurring rule
#[derive(Debug, Clone, PartialEq)]
pub struct NewRule {
    /// Owning user
    pub owner_id: String,
    /// Income or expense
    pub kind: TransactionKind,
    /// Template category
    pub category: String,
    /// Template description
    pub description: String,
    /// Template amount
    pub amount: f64,
    /// How often the rule fires
    pub frequency: Frequency,
    /// First occurrence; also the initial cursor
    pub start_date: NaiveDate,
}

/// Edit of a rule's template fields. The start date and the cursor are not editable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleUpdate {
    /// New kind
    pub kind: Option<TransactionKind>,
    /// New category
    pub category: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New amount
    pub amount: Option<f64>,
    /// New frequency, applies from the current cursor onwards
    pub frequency: Option<Frequency>,
}

/// Cursor fields as read before processing, used as the compare-and-swap guard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorState {
    /// Stored `next_due_date`
    pub next_due_date: String,
    /// Stored `last_processed`
    pub last_processed: Option<String>,
}

impl From<&recurring_rule::Model> for CursorState {
    fn from(model: &recurring_rule::Model) -> Self {
        Self {
            next_due_date: model.next_due_date.clone(),
            last_processed: model.last_processed.clone(),
        }
    }
}

/// Typed view of the scheduling fields of a stored rule
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSchedule {
    /// Parsed frequency
    pub frequency: Frequency,
    /// Parsed kind
    pub kind: TransactionKind,
    /// Parsed start date
    pub start_date: NaiveDate,
    /// Parsed cursor
    pub next_due_date: NaiveDate,
    /// Parsed settled-cycle marker
    pub last_processed: Option<DateTime<Utc>>,
}

impl RuleSchedule {
    /// Parses the stored strings of a rule.
    ///
    /// # Errors
    /// Any malformed field (unknown frequency or kind, unreadable date, cursor
    /// before the start date) rejects the whole rule.
    pub fn from_model(model: &recurring_rule::Model) -> Result<Self> {
        let frequency = model.frequency.parse()?;
        let kind = model.kind.parse()?;
        let start_date = parse_date(&model.start_date)?;
        let next_due_date = parse_date(&model.next_due_date)?;
        let last_processed = model
            .last_processed
            .as_deref()
            .map(parse_instant)
            .transpose()?;

        if next_due_date < start_date {
            return Err(Error::InvalidDate {
                value: format!(
                    "next due date {} precedes start date {}",
                    model.next_due_date, model.start_date
                ),
            });
        }

        Ok(Self {
            frequency,
            kind,
            start_date,
            next_due_date,
            last_processed,
        })
    }
}

/// Creates a new active rule whose cursor starts at `start_date`.
///
/// # Arguments
/// * `db` - Database connection
/// * `new` - Template fields, frequency and start date
///
/// # Returns
/// * `Ok(model)` - The stored rule, `next_due_date == start_date`, never processed
/// * `Err(InvalidAmount | Validation)` - Bad amount or empty description
#[instrument(skip(db, new), fields(owner_id = %new.owner_id))]
pub async fn create_rule(db: &DatabaseConnection, new: NewRule) -> Result<recurring_rule::Model> {
    validate_amount(new.amount)?;
    if new.description.trim().is_empty() {
        return Err(Error::Validation {
            message: "Rule description cannot be empty".to_string(),
        });
    }

    let start = format_date(new.start_date);
    let model = recurring_rule::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        owner_id: Set(new.owner_id),
        kind: Set(new.kind.as_str().to_string()),
        category: Set(new.category.trim().to_string()),
        description: Set(new.description.trim().to_string()),
        amount: Set(new.amount),
        frequency: Set(new.frequency.as_str().to_string()),
        start_date: Set(start.clone()),
        next_due_date: Set(start),
        active: Set(true),
        last_processed: Set(None),
        created_at: Set(format_instant(Utc::now())),
    };

    let result = model.insert(db).await?;
    info!(
        "Created {} rule {} for {} starting {}",
        result.frequency, result.id, result.owner_id, result.start_date
    );
    Ok(result)
}

/// Lists all of an owner's rules, active or not, oldest first.
pub async fn list_rules(
    db: &DatabaseConnection,
    owner_id: &str,
) -> Result<Vec<recurring_rule::Model>> {
    RecurringRule::find()
        .filter(recurring_rule::Column::OwnerId.eq(owner_id))
        .order_by_asc(recurring_rule::Column::CreatedAt)
        .order_by_asc(recurring_rule::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the active rules in `scope`. Due-ness is decided by the caller after
/// parsing each cursor.
///
/// # Arguments
/// * `db` - Database connection or open database transaction
/// * `scope` - One owner, or every owner for the scheduled job
#[instrument(skip(db))]
pub async fn list_active_rules<C>(db: &C, scope: &RuleScope) -> Result<Vec<recurring_rule::Model>>
where
    C: ConnectionTrait,
{
    let mut query = RecurringRule::find().filter(recurring_rule::Column::Active.eq(true));
    if let RuleScope::Owner(owner_id) = scope {
        query = query.filter(recurring_rule::Column::OwnerId.eq(owner_id.as_str()));
    }

    let rules = query
        .order_by_asc(recurring_rule::Column::CreatedAt)
        .order_by_asc(recurring_rule::Column::Id)
        .all(db)
        .await?;
    debug!("Found {} active rule(s)", rules.len());
    Ok(rules)
}

/// Fetches a rule by id regardless of owner.
pub async fn get_rule<C>(db: &C, rule_id: &str) -> Result<Option<recurring_rule::Model>>
where
    C: ConnectionTrait,
{
    RecurringRule::find_by_id(rule_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Fetches one of the owner's rules by id.
///
/// # Returns
/// * `Ok(Some(rule))` - The rule exists and belongs to `owner_id`
/// * `Ok(None)` - Unknown id, or another owner's rule
pub async fn get_rule_for_owner(
    db: &DatabaseConnection,
    rule_id: &str,
    owner_id: &str,
) -> Result<Option<recurring_rule::Model>> {
    RecurringRule::find_by_id(rule_id.to_string())
        .filter(recurring_rule::Column::OwnerId.eq(owner_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Edits the template fields of one of the owner's rules.
///
/// # Errors
/// `RuleNotFound` when the id does not belong to the owner.
#[instrument(skip(db, update))]
pub async fn update_rule(
    db: &DatabaseConnection,
    rule_id: &str,
    owner_id: &str,
    update: RuleUpdate,
) -> Result<recurring_rule::Model> {
    let existing = get_rule_for_owner(db, rule_id, owner_id)
        .await?
        .ok_or_else(|| Error::RuleNotFound {
            id: rule_id.to_string(),
        })?;

    let mut active_model: recurring_rule::ActiveModel = existing.clone().into();
    if let Some(kind) = update.kind {
        active_model.kind = Set(kind.as_str().to_string());
    }
    if let Some(category) = update.category {
        active_model.category = Set(category.trim().to_string());
    }
    if let Some(description) = update.description {
        if description.trim().is_empty() {
            return Err(Error::Validation {
                message: "Rule description cannot be empty".to_string(),
            });
        }
        active_model.description = Set(description.trim().to_string());
    }
    if let Some(amount) = update.amount {
        validate_amount(amount)?;
        active_model.amount = Set(amount);
    }
    if let Some(frequency) = update.frequency {
        active_model.frequency = Set(frequency.as_str().to_string());
    }

    if !active_model.is_changed() {
        return Ok(existing);
    }
    let updated = active_model.update(db).await?;
    info!("Updated rule {} for {}", updated.id, owner_id);
    Ok(updated)
}

/// Activates or deactivates one of the owner's rules without touching its cursor.
///
/// Returns the rule after the change, or `None` when it does not exist for
/// this owner (a no-op).
#[instrument(skip(db))]
pub async fn set_active(
    db: &DatabaseConnection,
    rule_id: &str,
    owner_id: &str,
    active: bool,
) -> Result<Option<recurring_rule::Model>> {
    let result = RecurringRule::update_many()
        .col_expr(recurring_rule::Column::Active, Expr::value(active))
        .filter(recurring_rule::Column::Id.eq(rule_id))
        .filter(recurring_rule::Column::OwnerId.eq(owner_id))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        debug!("Toggle of unknown rule {rule_id} for {owner_id} ignored");
        return Ok(None);
    }
    info!("Rule {rule_id} active={active}");
    get_rule_for_owner(db, rule_id, owner_id).await
}

/// Deletes one of the owner's rules. Transactions it generated are kept.
///
/// # Returns
/// * `Ok(true)` - The rule was removed
/// * `Ok(false)` - No such rule for this owner, nothing changed
#[instrument(skip(db))]
pub async fn delete_rule(db: &DatabaseConnection, rule_id: &str, owner_id: &str) -> Result<bool> {
    let result = RecurringRule::delete_many()
        .filter(recurring_rule::Column::Id.eq(rule_id))
        .filter(recurring_rule::Column::OwnerId.eq(owner_id))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!("Deleted rule {rule_id} for {owner_id}");
    }
    Ok(result.rows_affected > 0)
}

/// Moves a rule's cursor to `next_due_date` and stamps `last_processed`, but
/// only if the cursor still holds the values in `expected` and the rule is
/// still active.
///
/// Returns `false` when the guard did not match, meaning another run already
/// settled this cycle or the rule was deactivated in the meantime.
///
/// # Arguments
/// * `db` - The database transaction that also holds the cycle's ledger insert
/// * `rule_id` - Rule to move
/// * `expected` - Cursor values read before the cycle was settled
/// * `next_due_date` - New cursor
/// * `last_processed` - Occurrence instant of the cycle just settled
#[instrument(skip(db, expected))]
pub async fn advance_cursor<C>(
    db: &C,
    rule_id: &str,
    expected: &CursorState,
    next_due_date: NaiveDate,
    last_processed: DateTime<Utc>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = RecurringRule::update_many()
        .col_expr(
            recurring_rule::Column::NextDueDate,
            Expr::value(format_date(next_due_date)),
        )
        .col_expr(
            recurring_rule::Column::LastProcessed,
            Expr::value(format_instant(last_processed)),
        )
        .filter(recurring_rule::Column::Id.eq(rule_id))
        .filter(recurring_rule::Column::Active.eq(true))
        .filter(recurring_rule::Column::NextDueDate.eq(expected.next_due_date.as_str()));

    query = match expected.last_processed.as_deref() {
        Some(previous) => query.filter(recurring_rule::Column::LastProcessed.eq(previous)),
        None => query.filter(recurring_rule::Column::LastProcessed.is_null()),
    };

    let result = query.exec(db).await?;
    Ok(result.rows_affected == 1)
}
