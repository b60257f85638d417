//! Transaction entity - Represents a single ledger entry.
//!
//! Each transaction belongs to exactly one owner and records an amount, a kind
//! (`"income"` or `"expense"`), a category, a description and the ISO-8601
//! instant at which it takes effect. Transactions generated by the recurrence
//! engine carry the id of the rule that produced them in `source_rule_id`.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Opaque unique identifier (UUID v4), never reused
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Identity of the owning user; every query is scoped by it
    pub owner_id: String,
    /// Non-negative magnitude; direction comes from `kind`
    pub amount: f64,
    /// `"income"` or `"expense"`
    pub kind: String,
    /// Free-form label
    pub category: String,
    /// Free-form text
    pub description: String,
    /// When the financial event takes effect (ISO-8601), not the creation time
    pub occurred_at: String,
    /// Rule that generated this entry, absent for manual entries
    pub source_rule_id: Option<String>,
    /// When the row was written (ISO-8601)
    pub created_at: String,
}

/// Transactions keep no enforced relation to rules: deleting a rule never
/// cascades into the ledger.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
