//! Bot layer - Discord-specific interface and command handlers
//!
//! Discord authenticates the author of every interaction, so the author's user
//! id is the owner id for everything a command touches.

/// Discord command implementations (transactions, recurring rules, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, etc.)
pub mod handlers;

use crate::{
    config::AppConfig,
    core::transaction::TransactionKind,
    entities::transaction,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Discord rejects messages longer than this
const MESSAGE_LIMIT: usize = 1900;

/// Shared data available to all bot commands.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Application configuration, loaded once at startup
    pub config: Arc<AppConfig>,
}

impl BotData {
    /// Creates a new `BotData` instance.
    #[must_use]
    pub const fn new(database: DatabaseConnection, config: Arc<AppConfig>) -> Self {
        Self { database, config }
    }
}

/// True for errors caused by the user's input rather than by the service.
#[must_use]
pub const fn is_user_error(error: &Error) -> bool {
    matches!(
        error,
        Error::InvalidAmount { .. }
            | Error::InvalidFrequency { .. }
            | Error::InvalidKind { .. }
            | Error::InvalidDate { .. }
            | Error::Validation { .. }
            | Error::TransactionNotFound { .. }
            | Error::RuleNotFound { .. }
            | Error::Unauthorized { .. }
            | Error::Forbidden { .. }
    )
}

/// Cuts `text` to fit in one Discord message.
#[must_use]
pub fn truncate_message(text: &str) -> String {
    if text.len() <= MESSAGE_LIMIT {
        return text.to_string();
    }
    let mut end = MESSAGE_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n…", &text[..end])
}

/// One ledger entry as a bullet line: date, signed amount, category, description.
#[must_use]
pub fn format_transaction_line(row: &transaction::Model) -> String {
    let sign = if row.kind == TransactionKind::Income.as_str() {
        "+"
    } else {
        "-"
    };
    let day = row.occurred_at.get(..10).unwrap_or(&row.occurred_at);
    format!(
        "• {day} {sign}${:.2} {} {}",
        row.amount, row.category, row.description
    )
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = if is_user_error(&error) {
                format!("❌ {error}")
            } else {
                error!("Error in command `{}`: {error}", ctx.command().name);
                "❌ Something went wrong. Please try again later.".to_string()
            };
            if let Err(e) = ctx.say(message).await {
                error!("Failed to send error message: {e}");
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to Discord and serves slash commands until the client stops.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    database: DatabaseConnection,
) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::add_transaction(),
                commands::transactions(),
                commands::add_recurring(),
                commands::recurring(),
                commands::toggle_recurring(),
                commands::delete_recurring(),
                commands::catch_up(),
                commands::run_recurring(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} commands", framework.options().commands.len());
                Ok(BotData::new(database, config))
            })
        })
        .build();

    let mut client = serenity::Client::builder(&token, serenity::GatewayIntents::non_privileged())
        .framework(framework)
        .await?;

    info!("Starting Discord client");
    client.start().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message() {
        assert_eq!(truncate_message("short"), "short");

        let long = "é".repeat(MESSAGE_LIMIT);
        let cut = truncate_message(&long);
        assert!(cut.len() <= MESSAGE_LIMIT + "\n…".len());
        assert!(cut.ends_with('…'));
    }

    #[test]
    fn test_format_transaction_line() {
        let row = transaction::Model {
            id: "t1".to_string(),
            owner_id: "alice".to_string(),
            amount: 1200.0,
            kind: "expense".to_string(),
            category: "housing".to_string(),
            description: "Rent (Recurring)".to_string(),
            occurred_at: "2024-02-01T00:00:00Z".to_string(),
            source_rule_id: Some("r1".to_string()),
            created_at: "2024-02-01T08:00:00Z".to_string(),
        };
        assert_eq!(
            format_transaction_line(&row),
            "• 2024-02-01 -$1200.00 housing Rent (Recurring)"
        );
    }

    #[test]
    fn test_user_errors_are_shown() {
        assert!(is_user_error(&Error::InvalidAmount { amount: -1.0 }));
        assert!(is_user_error(&Error::Forbidden {
            reason: "admin".to_string()
        }));
        assert!(!is_user_error(&Error::Database(sea_orm::DbErr::Custom(
            "locked".to_string()
        ))));
    }
}
