//! Recurrence engine - materializes due recurring rules into the ledger.
//!
//! One entry point, [`process_due_rules`], serves every trigger. The caller
//! picks a scope (one owner or everyone) and a [`ProcessingStrategy`]:
//!
//! - `SingleFire` settles at most one cycle per rule per call. A rule that is
//!   several cycles behind catches up one cycle per scheduled run.
//! - `DrainToPresent` keeps settling cycles until the cursor is past `now`.
//!
//! Each cycle is its own database transaction: insert the ledger entry, then
//! move the cursor with a compare-and-swap on the values read. If the swap
//! misses, another run got there first and the insert is rolled back, so a
//! cycle is materialized at most once even under concurrent triggers. A crash
//! between cycles leaves every committed cycle durably advanced.
//!
//! `last_processed` holds the occurrence instant of the latest settled cycle.
//! A cycle whose date is not after it was already settled: the cursor moves on
//! without writing a duplicate entry.

use crate::{
    config::RecurringConfig,
    core::{
        rule::{CursorState, RuleSchedule, RuleScope, advance_cursor, list_active_rules},
        schedule::{
            advance_anchored, format_date, format_instant, is_due, parse_instant, start_of_day,
        },
        transaction::{NewTransaction, create_transaction},
    },
    entities::recurring_rule,
    errors::Result,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, instrument, warn};

/// How many cycles one invocation may settle per rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ProcessingStrategy {
    /// At most one cycle per rule per invocation
    SingleFire,
    /// Every elapsed cycle, until the cursor is in the future
    DrainToPresent,
}

impl fmt::Display for ProcessingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleFire => f.write_str("single-fire"),
            Self::DrainToPresent => f.write_str("drain-to-present"),
        }
    }
}

/// Tunables for a processing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Cap on cycles settled for one rule in one drain, `None` for no cap
    pub max_cycles_per_rule: Option<u32>,
    /// Appended to the rule description on generated transactions
    pub description_suffix: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from(&RecurringConfig::default())
    }
}

impl From<&RecurringConfig> for EngineOptions {
    fn from(config: &RecurringConfig) -> Self {
        Self {
            max_cycles_per_rule: config.max_catch_up_cycles.map(|cap| cap.max(1)),
            description_suffix: config.description_suffix.clone(),
        }
    }
}

/// Final state of one rule after a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    /// At least one cycle was settled
    Processed,
    /// Nothing done: a concurrent run moved the cursor first
    Skipped,
    /// The rule is malformed or a store write failed
    Failed,
}

/// Outcome of processing a single rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    /// Rule id
    pub rule_id: String,
    /// Rule owner
    pub owner_id: String,
    /// Rule description
    pub description: String,
    /// What happened
    pub status: RuleStatus,
    /// Ledger entries written for this rule
    pub transactions_created: usize,
    /// Cycles found already settled and stepped over
    pub cycles_skipped: usize,
    /// Cursor after the run, when known
    pub next_due_date: Option<String>,
    /// True when a drain stopped at the per-rule cycle cap
    pub reached_cycle_limit: bool,
    /// Failure or skip detail for operators
    pub error: Option<String>,
}

/// Summary of one invocation of the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingReport {
    /// Reference instant the run was evaluated against
    pub processed_at: String,
    /// Strategy used
    pub strategy: ProcessingStrategy,
    /// Total ledger entries created
    pub processed_count: usize,
    /// One entry per due or malformed rule
    pub per_rule_results: Vec<RuleResult>,
}

impl ProcessingReport {
    /// Number of rules that ended in failure
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.per_rule_results
            .iter()
            .filter(|r| r.status == RuleStatus::Failed)
            .count()
    }
}

enum CycleOutcome {
    Materialized(CursorState, NaiveDate),
    AlreadySettled(CursorState, NaiveDate),
    Conflict,
}

/// Processes every active rule in `scope` that is due at `now`.
///
/// Rules are handled one at a time and independently: a malformed rule or a
/// failed write is recorded in that rule's [`RuleResult`] and processing moves
/// on to the next rule.
///
/// # Arguments
/// * `db` - Database connection
/// * `scope` - One owner (catch-up) or everyone (scheduled and manual runs)
/// * `strategy` - One cycle per rule, or every cycle up to `now`
/// * `now` - Reference instant; a rule is due when its cursor's midnight UTC is not after it
/// * `options` - Optional drain cap and generated-description suffix
///
/// # Returns
/// * `Ok(report)` - Transactions created plus one result per due or malformed rule
///
/// # Errors
/// Only a failure to list the rules aborts the run.
#[instrument(skip(db, options))]
pub async fn process_due_rules(
    db: &DatabaseConnection,
    scope: &RuleScope,
    strategy: ProcessingStrategy,
    now: DateTime<Utc>,
    options: &EngineOptions,
) -> Result<ProcessingReport> {
    let rules = list_active_rules(db, scope).await?;
    let mut results = Vec::new();

    for rule in rules {
        let schedule = match RuleSchedule::from_model(&rule) {
            Ok(schedule) => schedule,
            Err(e) => {
                error!("Rule {} of {} is malformed: {e}", rule.id, rule.owner_id);
                results.push(RuleResult::failed(&rule, 0, e.to_string()));
                continue;
            }
        };

        if !is_due(schedule.next_due_date, now) {
            continue;
        }

        results.push(process_rule(db, &rule, &schedule, strategy, now, options).await);
    }

    let processed_count = results.iter().map(|r| r.transactions_created).sum();
    let report = ProcessingReport {
        processed_at: format_instant(now),
        strategy,
        processed_count,
        per_rule_results: results,
    };

    info!(
        "Recurring run ({strategy}) created {} transaction(s) across {} due rule(s), {} failure(s)",
        report.processed_count,
        report.per_rule_results.len(),
        report.failure_count()
    );
    Ok(report)
}

async fn process_rule(
    db: &DatabaseConnection,
    rule: &recurring_rule::Model,
    schedule: &RuleSchedule,
    strategy: ProcessingStrategy,
    now: DateTime<Utc>,
    options: &EngineOptions,
) -> RuleResult {
    let max_cycles = match strategy {
        ProcessingStrategy::SingleFire => Some(1),
        ProcessingStrategy::DrainToPresent => options.max_cycles_per_rule,
    };

    let mut cursor = CursorState::from(rule);
    let mut due = schedule.next_due_date;
    let mut created = 0;
    let mut skipped = 0;
    let mut cycles = 0;

    while max_cycles.is_none_or(|cap| cycles < cap) && is_due(due, now) {
        cycles += 1;
        match settle_cycle(db, rule, schedule, &cursor, due, options).await {
            Ok(CycleOutcome::Materialized(state, next)) => {
                created += 1;
                cursor = state;
                due = next;
            }
            Ok(CycleOutcome::AlreadySettled(state, next)) => {
                warn!(
                    "Rule {} cycle {} was already settled, stepping over it",
                    rule.id,
                    format_date(due)
                );
                skipped += 1;
                cursor = state;
                due = next;
            }
            Ok(CycleOutcome::Conflict) => {
                warn!(
                    "Rule {} cursor moved concurrently at {}, leaving it to the other run",
                    rule.id,
                    format_date(due)
                );
                let detail = "cursor advanced by a concurrent run".to_string();
                if created + skipped == 0 {
                    return RuleResult::skipped(rule, detail);
                }
                return RuleResult::processed(rule, created, skipped, &cursor, false)
                    .with_error(detail);
            }
            Err(e) => {
                error!(
                    "Rule {} of {} failed at cycle {}: {e}",
                    rule.id,
                    rule.owner_id,
                    format_date(due)
                );
                let mut result = RuleResult::failed(rule, created, e.to_string());
                result.cycles_skipped = skipped;
                result.next_due_date = Some(cursor.next_due_date.clone());
                return result;
            }
        }
    }

    let reached_limit = strategy == ProcessingStrategy::DrainToPresent && is_due(due, now);
    if reached_limit {
        warn!(
            "Rule {} still due after {cycles} cycle(s); the next run continues from {}",
            rule.id, cursor.next_due_date
        );
    }
    RuleResult::processed(rule, created, skipped, &cursor, reached_limit)
}

async fn settle_cycle(
    db: &DatabaseConnection,
    rule: &recurring_rule::Model,
    schedule: &RuleSchedule,
    cursor: &CursorState,
    due: NaiveDate,
    options: &EngineOptions,
) -> Result<CycleOutcome> {
    let next = advance_anchored(due, schedule.frequency, schedule.start_date.day())?;
    let occurrence = start_of_day(due);
    let last_processed = match cursor.last_processed.as_deref() {
        Some(stored) => Some(parse_instant(stored)?),
        None => None,
    };
    let already_settled = last_processed.is_some_and(|settled| settled >= occurrence);
    let stamp = last_processed.map_or(occurrence, |settled| settled.max(occurrence));

    let txn = db.begin().await?;
    let written = async {
        if !already_settled {
            create_transaction(
                &txn,
                NewTransaction {
                    owner_id: rule.owner_id.clone(),
                    amount: rule.amount,
                    kind: schedule.kind,
                    category: rule.category.clone(),
                    description: format!("{}{}", rule.description, options.description_suffix),
                    occurred_at: format_instant(occurrence),
                    source_rule_id: Some(rule.id.clone()),
                },
            )
            .await?;
        }
        advance_cursor(&txn, &rule.id, cursor, next, stamp).await
    }
    .await;

    match written {
        Ok(true) => txn.commit().await?,
        Ok(false) => {
            txn.rollback().await?;
            return Ok(CycleOutcome::Conflict);
        }
        Err(e) => {
            txn.rollback().await?;
            return Err(e);
        }
    }

    let state = CursorState {
        next_due_date: format_date(next),
        last_processed: Some(format_instant(stamp)),
    };
    Ok(if already_settled {
        CycleOutcome::AlreadySettled(state, next)
    } else {
        CycleOutcome::Materialized(state, next)
    })
}

impl RuleResult {
    fn base(rule: &recurring_rule::Model, status: RuleStatus) -> Self {
        Self {
            rule_id: rule.id.clone(),
            owner_id: rule.owner_id.clone(),
            description: rule.description.clone(),
            status,
            transactions_created: 0,
            cycles_skipped: 0,
            next_due_date: None,
            reached_cycle_limit: false,
            error: None,
        }
    }

    fn processed(
        rule: &recurring_rule::Model,
        created: usize,
        skipped: usize,
        cursor: &CursorState,
        reached_cycle_limit: bool,
    ) -> Self {
        Self {
            transactions_created: created,
            cycles_skipped: skipped,
            next_due_date: Some(cursor.next_due_date.clone()),
            reached_cycle_limit,
            ..Self::base(rule, RuleStatus::Processed)
        }
    }

    fn skipped(rule: &recurring_rule::Model, detail: String) -> Self {
        Self {
            next_due_date: Some(rule.next_due_date.clone()),
            error: Some(detail),
            ..Self::base(rule, RuleStatus::Skipped)
        }
    }

    fn failed(rule: &recurring_rule::Model, created: usize, detail: String) -> Self {
        Self {
            transactions_created: created,
            error: Some(detail),
            ..Self::base(rule, RuleStatus::Failed)
        }
    }

    fn with_error(mut self, detail: String) -> Self {
        self.error = Some(detail);
        self
    }
}

/// Formats a processing report into a human-readable summary.
///
/// # Arguments
/// * `report` - The report returned by [`process_due_rules`]
///
/// # Returns
/// * A header line followed by one line per rule
pub fn format_processing_summary(report: &ProcessingReport) -> Result<String> {
    use std::fmt::Write;

    let mut summary = format!(
        "Recurring run ({}) at {} - {} transaction(s) created\n",
        report.strategy, report.processed_at, report.processed_count
    );

    if report.per_rule_results.is_empty() {
        writeln!(summary, "  No rules were due.")?;
        return Ok(summary);
    }

    for result in &report.per_rule_results {
        let status = match result.status {
            RuleStatus::Processed => "OK",
            RuleStatus::Skipped => "SKIPPED",
            RuleStatus::Failed => "FAILED",
        };
        write!(
            summary,
            "  [{status}] {} | +{} entr{}",
            result.description,
            result.transactions_created,
            if result.transactions_created == 1 { "y" } else { "ies" }
        )?;
        if let Some(next) = &result.next_due_date {
            write!(summary, " | next due {next}")?;
        }
        if let Some(error) = &result.error {
            write!(summary, " | {error}")?;
        }
        writeln!(summary)?;
    }

    Ok(summary)
}
