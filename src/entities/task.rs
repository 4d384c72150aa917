//! Task entity - A funded channel-join campaign.
//!
//! A task pays `reward_per_member` for each verified join of `channel`, up to
//! `total_budget`. `remaining_budget` only ever decreases and `completed_count`
//! only ever increases; `remaining_budget = total_budget - completed_count *
//! reward_per_member` holds at all times absent manual edits.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Task database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    /// Unique identifier for the task
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account that funded the task and is accountable for its budget
    pub creator_id: i64,
    /// Human-readable campaign title
    pub title: String,
    /// Handle of the channel members must join (with or without `@`)
    pub channel: String,
    /// Invite link shown to users
    pub channel_link: String,
    /// Reward paid per verified join
    pub reward_per_member: f64,
    /// Budget fixed at creation
    pub total_budget: f64,
    /// Budget still available for rewards; monotonically non-increasing
    pub remaining_budget: f64,
    /// Number of verified joins; monotonically non-decreasing
    pub completed_count: i32,
    /// `floor(total_budget / reward_per_member)`, computed once at creation
    pub max_members: i32,
    /// False once the remaining budget can no longer cover one reward
    pub is_active: bool,
    /// When the task was created
    pub created_at: DateTimeUtc,
}

/// Task/account ids on other entities are weak references resolved at read
/// time; the store enforces no relational constraints.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
