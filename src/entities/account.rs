//! Account entity - The balance-holding identity record of a platform user.
//!
//! Accounts are keyed internally by `id` and externally by `telegram_id`.
//! The `balance` column is only ever mutated through [`crate::core::ledger`];
//! the referral flag pair tracks the one-time referrer payout.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    /// Unique identifier for the account
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Numeric messaging-platform identity, stored as text
    #[sea_orm(unique)]
    pub telegram_id: String,
    /// Optional platform handle
    pub username: Option<String>,
    /// Display name
    pub first_name: String,
    /// Optional display name suffix
    pub last_name: Option<String>,
    /// Optional avatar URL
    pub photo_url: Option<String>,
    /// Current balance; non-negative on every admin-bypass-free path
    pub balance: f64,
    /// This account's own shareable referral code
    #[sea_orm(unique)]
    pub referral_code: String,
    /// Account id of the referrer, if signed up through a code.
    /// Weak back-reference kept for lookup only.
    pub referred_by: Option<i64>,
    /// True while the referrer's bonus awaits the official-channel join
    pub referral_bonus_pending: bool,
    /// True once the referrer's bonus has been paid (terminal)
    pub referral_bonus_credited: bool,
    /// Last successful daily-bonus claim, None before the first claim
    pub daily_checkin_last_claimed: Option<DateTimeUtc>,
    /// Administrative capability flag
    pub is_admin: bool,
    /// When the account was created
    pub created_at: DateTimeUtc,
}

/// Task/account ids on other entities are weak references resolved at read
/// time; the store enforces no relational constraints.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
