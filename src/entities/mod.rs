//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod recurring_rule;
pub mod transaction;

pub use recurring_rule::{
    Column as RecurringRuleColumn, Entity as RecurringRule, Model as RecurringRuleModel,
};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
};
