//! Recurring rule Discord commands and the two chat-side recurring triggers:
//! `/catch_up` for a user's own rules and `/run_recurring` for administrators.

use crate::{
    core::rule::list_rules,
    entities::recurring_rule,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;

/// Finds one of the owner's rules by id or by its description (case-insensitive).
///
/// # Errors
/// `Validation` when several of the owner's rules share the description.
pub async fn resolve_rule(
    db: &DatabaseConnection,
    owner_id: &str,
    reference: &str,
) -> Result<Option<recurring_rule::Model>> {
    let reference = reference.trim();
    let rules = list_rules(db, owner_id).await?;
    if let Some(rule) = rules.iter().find(|r| r.id == reference) {
        return Ok(Some(rule.clone()));
    }

    let mut matches = rules
        .into_iter()
        .filter(|r| r.description.eq_ignore_ascii_case(reference));
    match (matches.next(), matches.next()) {
        (Some(_), Some(_)) => Err(Error::Validation {
            message: format!("several rules are named '{reference}', use the rule id instead"),
        }),
        (rule, _) => Ok(rule),
    }
}

mod inner {
    #![allow(missing_docs)]

    use super::resolve_rule;
    use crate::{
        bot::{BotData, format_transaction_line, handlers::autocomplete, truncate_message},
        core::{
            recurring::format_processing_summary,
            rule::{self, NewRule},
            schedule::{Frequency, parse_date},
            transaction::TransactionKind,
            triggers,
        },
        errors::{Error, Result},
    };
    use chrono::Utc;
    use std::fmt::Write;

    const RECENT_LIMIT: usize = 5;

    /// Creates a recurring income or expense.
    #[poise::command(slash_command, prefix_command)]
    pub async fn add_recurring(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "income or expense"]
        #[autocomplete = "autocomplete::autocomplete_kind"]
        kind: String,
        #[description = "Amount per occurrence"] amount: f64,
        #[description = "daily, weekly, monthly or yearly"]
        #[autocomplete = "autocomplete::autocomplete_frequency"]
        frequency: String,
        #[description = "What it is, e.g. Rent"] description: String,
        #[description = "Category"]
        #[autocomplete = "autocomplete::autocomplete_category"]
        category: Option<String>,
        #[description = "First occurrence (YYYY-MM-DD), defaults to today"]
        start_date: Option<String>,
    ) -> Result<()> {
        let start_date = match start_date.as_deref() {
            Some(date) => parse_date(date)?,
            None => Utc::now().date_naive(),
        };
        let frequency: Frequency = frequency.parse()?;

        let created = rule::create_rule(
            &ctx.data().database,
            NewRule {
                owner_id: ctx.author().id.to_string(),
                kind: kind.parse::<TransactionKind>()?,
                category: category.unwrap_or_default(),
                description,
                amount,
                frequency,
                start_date,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Created {} rule '{}' for ${:.2}, first due {} (ID: `{}`)",
            created.frequency, created.description, created.amount, created.next_due_date, created.id
        ))
        .await?;
        Ok(())
    }

    /// Lists your recurring rules.
    #[poise::command(slash_command, prefix_command)]
    pub async fn recurring(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let owner = ctx.author().id.to_string();
        let rules = rule::list_rules(&ctx.data().database, &owner).await?;
        if rules.is_empty() {
            ctx.say("You have no recurring rules. Create one with `/add_recurring`.")
                .await?;
            return Ok(());
        }

        let mut text = String::from("**Recurring rules**\n");
        for r in &rules {
            let state = if r.active { "active" } else { "paused" };
            writeln!(
                text,
                "• **{}** ${:.2} {} {} ({state}), next due {} `{}`",
                r.description, r.amount, r.kind, r.frequency, r.next_due_date, r.id
            )?;
        }

        ctx.say(truncate_message(&text)).await?;
        Ok(())
    }

    /// Pauses an active rule or resumes a paused one.
    #[poise::command(slash_command, prefix_command)]
    pub async fn toggle_recurring(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Rule description or id"]
        #[rename = "rule"]
        #[autocomplete = "autocomplete::autocomplete_rule"]
        rule_ref: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let owner = ctx.author().id.to_string();

        let Some(found) = resolve_rule(db, &owner, &rule_ref).await? else {
            ctx.say(format!("❌ Rule '{rule_ref}' not found. Use `/recurring` to list your rules."))
                .await?;
            return Ok(());
        };

        match rule::set_active(db, &found.id, &owner, !found.active).await? {
            Some(updated) if updated.active => {
                ctx.say(format!(
                    "▶️ Resumed '{}', next due {}",
                    updated.description, updated.next_due_date
                ))
                .await?;
            }
            Some(updated) => {
                ctx.say(format!("⏸️ Paused '{}'", updated.description)).await?;
            }
            None => {
                ctx.say(format!("❌ Rule '{rule_ref}' no longer exists.")).await?;
            }
        }
        Ok(())
    }

    /// Deletes a rule. Transactions it already recorded are kept.
    #[poise::command(slash_command, prefix_command)]
    pub async fn delete_recurring(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Rule description or id"]
        #[rename = "rule"]
        #[autocomplete = "autocomplete::autocomplete_rule"]
        rule_ref: String,
    ) -> Result<()> {
        let db = &ctx.data().database;
        let owner = ctx.author().id.to_string();

        let Some(found) = resolve_rule(db, &owner, &rule_ref).await? else {
            ctx.say(format!("❌ Rule '{rule_ref}' not found. Use `/recurring` to list your rules."))
                .await?;
            return Ok(());
        };

        rule::delete_rule(db, &found.id, &owner).await?;
        ctx.say(format!(
            "🗑️ Deleted '{}'. Its past transactions are still in your ledger.",
            found.description
        ))
        .await?;
        Ok(())
    }

    /// Records every overdue occurrence of your active rules.
    #[poise::command(slash_command, prefix_command)]
    pub async fn catch_up(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.defer().await?;
        let data = ctx.data();
        let owner = ctx.author().id.to_string();

        let result =
            triggers::catch_up_for_user(&data.database, &data.config, &owner, Utc::now()).await?;

        let mut text = match result.new_transaction_count {
            0 => "✅ You're all caught up, nothing was due.".to_string(),
            n => format!("✅ Recorded {n} recurring transaction(s)."),
        };
        if result.failed_rules > 0 {
            write!(
                text,
                "\n⚠️ {} rule(s) could not be processed. Please try again later.",
                result.failed_rules
            )?;
        }
        if !result.transactions.is_empty() {
            text.push_str("\n\n**Latest transactions**\n");
            for row in result.transactions.iter().take(RECENT_LIMIT) {
                writeln!(text, "{}", format_transaction_line(row))?;
            }
        }

        ctx.say(truncate_message(&text)).await?;
        Ok(())
    }

    /// Runs the scheduled recurring job now (administrators only).
    #[poise::command(slash_command, prefix_command)]
    pub async fn run_recurring(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let data = ctx.data();
        let caller = ctx.author().id.to_string();
        triggers::authorize_admin(&data.config, &caller)?;
        ctx.defer().await?;

        let report = triggers::run_manual(&data.database, &data.config, &caller, Utc::now()).await?;
        let summary = format_processing_summary(&report)?;

        ctx.say(truncate_message(&format!("```\n{summary}```"))).await?;
        Ok(())
    }
}

pub use inner::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{rule::create_rule, schedule::Frequency},
        test_utils::{new_rule, setup_test_db},
    };

    #[tokio::test]
    async fn test_resolve_rule_by_id_and_description() -> Result<()> {
        let db = setup_test_db().await?;
        let rent = create_rule(&db, new_rule("alice", Frequency::Monthly, "2024-01-01")).await?;
        let mut gym = new_rule("alice", Frequency::Weekly, "2024-01-01");
        gym.description = "Gym".to_string();
        let gym = create_rule(&db, gym).await?;

        let by_id = resolve_rule(&db, "alice", &gym.id).await?;
        assert_eq!(by_id.map(|r| r.id), Some(gym.id));

        let by_name = resolve_rule(&db, "alice", "  rent ").await?;
        assert_eq!(by_name.map(|r| r.id), Some(rent.id.clone()));

        assert!(resolve_rule(&db, "alice", "Netflix").await?.is_none());
        // Another owner's id does not resolve
        assert!(resolve_rule(&db, "bob", &rent.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_rule_ambiguous_description() -> Result<()> {
        let db = setup_test_db().await?;
        create_rule(&db, new_rule("alice", Frequency::Monthly, "2024-01-01")).await?;
        create_rule(&db, new_rule("alice", Frequency::Yearly, "2024-06-01")).await?;

        let result = resolve_rule(&db, "alice", "Rent").await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }
}
