//! Trigger surfaces for the recurrence engine.
//!
//! Three callers reach the engine: the external scheduler (shared secret,
//! every rule, single-fire), a signed-in user catching up their own rules
//! (drain-to-present), and an administrator re-running the scheduled job on
//! demand. Each one checks its authorization here before touching any data,
//! then funnels into [`process_due_rules`].

use crate::{
    config::{AppConfig, Environment, RecurringConfig},
    core::{
        recurring::{EngineOptions, ProcessingReport, ProcessingStrategy, process_due_rules},
        rule::RuleScope,
        transaction::list_transactions,
    },
    entities::transaction,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Result of a user-initiated catch-up
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchUpResult {
    /// Ledger entries created by this call
    pub new_transaction_count: usize,
    /// Rules that could not be processed
    pub failed_rules: usize,
    /// The caller's refreshed transaction list, newest first
    pub transactions: Vec<transaction::Model>,
}

/// Checks the shared secret presented by the external scheduler.
///
/// A configured secret is always required. Without one, scheduled calls are
/// refused in production and let through in development.
pub fn authorize_scheduled(config: &RecurringConfig, presented: Option<&str>) -> Result<()> {
    match (config.cron_secret.as_deref(), presented) {
        (Some(expected), Some(given)) if constant_time_eq(expected, given) => Ok(()),
        (Some(_), Some(_)) => Err(Error::Unauthorized {
            reason: "invalid scheduler secret".to_string(),
        }),
        (Some(_), None) => Err(Error::Unauthorized {
            reason: "missing scheduler secret".to_string(),
        }),
        (None, _) if config.environment == Environment::Production => Err(Error::Unauthorized {
            reason: "scheduler secret not configured".to_string(),
        }),
        (None, _) => {
            warn!("Scheduled trigger accepted without a secret (development mode)");
            Ok(())
        }
    }
}

/// Checks that `caller` may run the manual trigger.
pub fn authorize_admin(config: &AppConfig, caller: &str) -> Result<()> {
    if config.is_admin(caller) {
        Ok(())
    } else {
        Err(Error::Forbidden {
            reason: "administrator privileges required".to_string(),
        })
    }
}

/// Runs the scheduled job: every rule, one cycle each.
///
/// The caller must have passed [`authorize_scheduled`].
#[instrument(skip(db, config))]
pub async fn run_scheduled(
    db: &DatabaseConnection,
    config: &AppConfig,
    now: DateTime<Utc>,
) -> Result<ProcessingReport> {
    info!("Scheduled recurring run starting");
    process_due_rules(
        db,
        &RuleScope::All,
        ProcessingStrategy::SingleFire,
        now,
        &EngineOptions::from(&config.recurring),
    )
    .await
}

/// Runs the scheduled job on behalf of an administrator.
#[instrument(skip(db, config))]
pub async fn run_manual(
    db: &DatabaseConnection,
    config: &AppConfig,
    caller: &str,
    now: DateTime<Utc>,
) -> Result<ProcessingReport> {
    authorize_admin(config, caller)?;
    info!("Manual recurring run requested by {caller}");
    run_scheduled(db, config, now).await
}

/// Catches up every overdue cycle of the caller's own rules and returns the
/// refreshed transaction list.
#[instrument(skip(db, config))]
pub async fn catch_up_for_user(
    db: &DatabaseConnection,
    config: &AppConfig,
    owner_id: &str,
    now: DateTime<Utc>,
) -> Result<CatchUpResult> {
    let report = process_due_rules(
        db,
        &RuleScope::owner(owner_id),
        ProcessingStrategy::DrainToPresent,
        now,
        &EngineOptions::from(&config.recurring),
    )
    .await?;

    let transactions = list_transactions(db, owner_id, None).await?;
    Ok(CatchUpResult {
        new_transaction_count: report.processed_count,
        failed_rules: report.failure_count(),
        transactions,
    })
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
