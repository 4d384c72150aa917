//! App settings entity - Singleton row of configurable economic parameters.
//!
//! Exactly one row exists (fixed id), written at process startup by
//! [`crate::core::settings::init_settings`] and thereafter only through the
//! administrative update path.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// App settings database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "app_settings")]
pub struct Model {
    /// Fixed singleton id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    /// One-time payout to a referrer on the referred account's first
    /// verified official-channel join
    pub referral_bonus_amount: f64,
    /// Smallest withdrawal request accepted
    pub min_withdraw_amount: f64,
    /// Smallest deposit request accepted
    pub min_deposit_amount: f64,
    /// Reward paid per daily check-in claim
    pub daily_checkin_reward: f64,
    /// When the settings were last modified
    pub updated_at: DateTimeUtc,
}

/// `AppSettings` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
