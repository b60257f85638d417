//! Recurring rule entity - A template for a periodic transaction plus its cursor.
//!
//! `next_due_date` is the next occurrence that has not been materialized into
//! the ledger yet. It only ever moves forward, and only together with the
//! ledger insert for the cycle it leaves behind.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Recurring rule database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "recurring_rules")]
pub struct Model {
    /// Opaque unique identifier (UUID v4)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Identity of the owning user
    pub owner_id: String,
    /// `"income"` or `"expense"`, copied into generated transactions
    pub kind: String,
    /// Copied into generated transactions
    pub category: String,
    /// Copied into generated transactions, decorated with a suffix
    pub description: String,
    /// Copied into generated transactions
    pub amount: f64,
    /// `"daily"`, `"weekly"`, `"monthly"` or `"yearly"`
    pub frequency: String,
    /// First occurrence (ISO date); immutable after creation
    pub start_date: String,
    /// Cursor: next occurrence not yet materialized (ISO date)
    pub next_due_date: String,
    /// Inactive rules are skipped by every processing path
    pub active: bool,
    /// Occurrence instant of the most recently settled cycle (ISO-8601)
    pub last_processed: Option<String>,
    /// When the rule was created (ISO-8601)
    pub created_at: String,
}

/// Rules have no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
