//! General Discord commands - ping and help.

mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Finance Buddy Help**\n\n\
        **Ledger**\n\
        • `/add_transaction <kind> <amount> [category] [description] [date]` - Records income or an expense.\n\
        • `/transactions [from] [to]` - Lists your latest transactions.\n\n\
        **Recurring**\n\
        • `/add_recurring <kind> <amount> <frequency> <description> [category] [start_date]` - Creates a recurring rule.\n\
        • `/recurring` - Lists your recurring rules.\n\
        • `/toggle_recurring <rule>` - Pauses or resumes a rule.\n\
        • `/delete_recurring <rule>` - Deletes a rule (its transactions are kept).\n\
        • `/catch_up` - Records every overdue occurrence of your rules.\n\
        • `/run_recurring` - Runs the scheduled job now (admins only).\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

pub use inner::*;
