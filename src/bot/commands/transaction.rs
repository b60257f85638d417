//! Ledger Discord commands - `add_transaction` and `transactions`.

mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, format_transaction_line, handlers::autocomplete, truncate_message},
        core::{
            schedule::{format_date, format_instant, parse_date},
            transaction::{self, DateRange, NewTransaction, TransactionKind},
        },
        errors::{Error, Result},
    };
    use chrono::Utc;
    use std::fmt::Write;

    const LIST_LIMIT: usize = 15;

    /// Records an income or expense in your ledger.
    #[poise::command(slash_command, prefix_command)]
    pub async fn add_transaction(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "income or expense"]
        #[autocomplete = "autocomplete::autocomplete_kind"]
        kind: String,
        #[description = "Amount (non-negative)"] amount: f64,
        #[description = "Category"]
        #[autocomplete = "autocomplete::autocomplete_category"]
        category: Option<String>,
        #[description = "Optional description"] description: Option<String>,
        #[description = "Date (YYYY-MM-DD), defaults to now"] date: Option<String>,
    ) -> Result<()> {
        let kind: TransactionKind = kind.parse()?;
        let occurred_at = match date.as_deref() {
            Some(date) => format_date(parse_date(date)?),
            None => format_instant(Utc::now()),
        };

        let created = transaction::create_transaction(
            &ctx.data().database,
            NewTransaction {
                owner_id: ctx.author().id.to_string(),
                amount,
                kind,
                category: category.unwrap_or_default(),
                description: description.unwrap_or_default(),
                occurred_at,
                source_rule_id: None,
            },
        )
        .await?;

        ctx.say(format!(
            "✅ Recorded {} of ${:.2} on {} (ID: `{}`)",
            created.kind, created.amount, created.occurred_at, created.id
        ))
        .await?;
        Ok(())
    }

    /// Lists your most recent transactions.
    #[poise::command(slash_command, prefix_command)]
    pub async fn transactions(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "First day (YYYY-MM-DD)"] from: Option<String>,
        #[description = "Last day (YYYY-MM-DD)"] to: Option<String>,
    ) -> Result<()> {
        let range = if from.is_some() || to.is_some() {
            Some(DateRange {
                from: from.as_deref().map(parse_date).transpose()?,
                to: to.as_deref().map(parse_date).transpose()?,
            })
        } else {
            None
        };

        let owner = ctx.author().id.to_string();
        let rows = transaction::list_transactions(&ctx.data().database, &owner, range).await?;
        if rows.is_empty() {
            ctx.say("No transactions found.").await?;
            return Ok(());
        }

        let mut text = format!("**Transactions** ({} total)\n", rows.len());
        for row in rows.iter().take(LIST_LIMIT) {
            writeln!(text, "{}", format_transaction_line(row))?;
        }
        if rows.len() > LIST_LIMIT {
            writeln!(text, "…and {} more", rows.len() - LIST_LIMIT)?;
        }

        ctx.say(truncate_message(&text)).await?;
        Ok(())
    }
}

pub use inner::*;
