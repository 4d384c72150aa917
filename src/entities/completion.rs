//! Completion entity - One account's attempt to earn one task's reward.
//!
//! At most one row exists per `(task_id, account_id)` pair; a composite
//! unique index enforces this at the store level. A `Verified` row snapshots
//! the reward and starts the retention clock; the `retention_checked` /
//! `deducted` pair doubles as the claim mechanism that keeps overlapping
//! retention sweeps from double-deducting.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a completion.
///
/// `Pending` is reserved for a future review flow; the current verification
/// path only ever writes `Verified` or `Failed`. `Verified` is terminal,
/// `Failed` may be retried.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum CompletionStatus {
    /// Reserved; unused by the current flow
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Membership confirmed and reward credited
    #[sea_orm(string_value = "verified")]
    Verified,
    /// Membership denied on the last attempt; retriable
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Completion database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "completions")]
pub struct Model {
    /// Unique identifier for the completion
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Task being attempted
    pub task_id: i64,
    /// Account attempting it
    pub account_id: i64,
    /// Current lifecycle state
    pub status: CompletionStatus,
    /// Reward credited at verification time; survives later task edits
    pub reward_amount: Option<f64>,
    /// When verification succeeded; starts the retention clock
    pub verified_at: Option<DateTimeUtc>,
    /// True once the retention auditor has ruled on this completion
    pub retention_checked: bool,
    /// True once a clawback was applied (or waived for lack of funds)
    pub deducted: bool,
    /// When the first attempt was recorded
    pub created_at: DateTimeUtc,
}

/// Task/account ids on other entities are weak references resolved at read
/// time; the store enforces no relational constraints.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
