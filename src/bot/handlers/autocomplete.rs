//! Autocomplete handlers for Discord slash command parameters.

use crate::{
    bot::BotData,
    core::{rule, schedule::Frequency, transaction::TransactionKind},
    errors::Error,
};

/// Discord shows at most this many suggestions
const MAX_CHOICES: usize = 25;

fn matching<'a>(options: impl IntoIterator<Item = &'a str>, partial: &str) -> Vec<String> {
    let partial_lower = partial.to_lowercase();
    options
        .into_iter()
        .filter(|option| option.to_lowercase().contains(&partial_lower))
        .map(ToString::to_string)
        .take(MAX_CHOICES)
        .collect()
}

/// Suggests `income` / `expense`.
#[allow(clippy::unused_async)]
pub async fn autocomplete_kind(_ctx: poise::Context<'_, BotData, Error>, partial: &str) -> Vec<String> {
    matching(
        [TransactionKind::Income, TransactionKind::Expense].map(TransactionKind::as_str),
        partial,
    )
}

/// Suggests the supported frequencies.
#[allow(clippy::unused_async)]
pub async fn autocomplete_frequency(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    matching(Frequency::ALL.map(Frequency::as_str), partial)
}

/// Suggests common budget categories.
///
/// Poise awaits every autocomplete callback, hence `async` on the static lists.
#[allow(clippy::unused_async)]
pub async fn autocomplete_category(
    _ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let categories = [
        "Bills",
        "Entertainment",
        "Food",
        "Groceries",
        "Healthcare",
        "Housing",
        "Insurance",
        "Salary",
        "Savings",
        "Subscriptions",
        "Transportation",
        "Utilities",
        "Other",
    ];
    matching(categories, partial)
}

/// Suggests the descriptions of the author's rules.
pub async fn autocomplete_rule(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let owner = ctx.author().id.to_string();
    let Ok(rules) = rule::list_rules(&ctx.data().database, &owner).await else {
        return Vec::new();
    };

    let mut names = matching(rules.iter().map(|r| r.description.as_str()), partial);
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(matching(["Rent", "Gym", "Rental car"], "REN"), vec!["Rent", "Rental car"]);
        assert_eq!(matching(["daily", "weekly"], ""), vec!["daily", "weekly"]);
        assert!(matching(["daily"], "x").is_empty());
    }
}
