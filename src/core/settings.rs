//! Runtime-tunable platform settings.
//!
//! A single `app_settings` row (fixed id) holds the amounts an admin can adjust
//! without redeploying: the referral bonus, withdrawal and deposit minimums, and
//! the daily check-in reward. The row is created explicitly at startup via
//! [`init_settings`]; read paths fail loudly when it is missing instead of
//! falling back to silent defaults.

use crate::{
    entities::{AppSettings, app_settings},
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, Set, SqlErr, prelude::*};

/// Fixed primary key of the singleton settings row.
const SETTINGS_ID: i32 = 1;

/// Default referral bonus credited when a referred user joins the official channel.
pub const DEFAULT_REFERRAL_BONUS: f64 = 5.0;
/// Default minimum withdrawal amount.
pub const DEFAULT_MIN_WITHDRAW: f64 = 50.0;
/// Default minimum deposit amount.
pub const DEFAULT_MIN_DEPOSIT: f64 = 10.0;
/// Default daily check-in reward.
pub const DEFAULT_DAILY_REWARD: f64 = 1.0;

/// A partial settings update; `None` fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct SettingsUpdate {
    /// New referral bonus amount
    pub referral_bonus_amount: Option<f64>,
    /// New minimum withdrawal amount
    pub min_withdraw_amount: Option<f64>,
    /// New minimum deposit amount
    pub min_deposit_amount: Option<f64>,
    /// New daily check-in reward
    pub daily_checkin_reward: Option<f64>,
}

/// Creates the settings row with default amounts if it does not exist yet.
///
/// Safe to call on every startup. When two processes race on first init, the
/// loser of the insert re-reads the winner's row.
pub async fn init_settings(db: &DatabaseConnection) -> Result<app_settings::Model> {
    if let Some(existing) = AppSettings::find_by_id(SETTINGS_ID).one(db).await? {
        return Ok(existing);
    }

    let defaults = app_settings::ActiveModel {
        id: Set(SETTINGS_ID),
        referral_bonus_amount: Set(DEFAULT_REFERRAL_BONUS),
        min_withdraw_amount: Set(DEFAULT_MIN_WITHDRAW),
        min_deposit_amount: Set(DEFAULT_MIN_DEPOSIT),
        daily_checkin_reward: Set(DEFAULT_DAILY_REWARD),
        updated_at: Set(chrono::Utc::now()),
    };

    match defaults.insert(db).await {
        Ok(created) => {
            tracing::info!("initialized platform settings with defaults");
            Ok(created)
        }
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            AppSettings::find_by_id(SETTINGS_ID)
                .one(db)
                .await?
                .ok_or_else(|| Error::Config {
                    message: "settings row vanished during initialization".to_string(),
                })
        }
        Err(err) => Err(err.into()),
    }
}

/// Returns the current settings row.
///
/// # Errors
/// Returns [`Error::Config`] when [`init_settings`] has not run yet.
pub async fn get_settings<C>(db: &C) -> Result<app_settings::Model>
where
    C: ConnectionTrait,
{
    AppSettings::find_by_id(SETTINGS_ID)
        .one(db)
        .await?
        .ok_or_else(|| Error::Config {
            message: "app settings not initialized; call init_settings at startup".to_string(),
        })
}

/// Applies a partial settings update and returns the new row.
///
/// Every provided amount must be a finite number greater than zero; the update
/// is rejected wholesale otherwise so the row never holds a half-applied mix.
pub async fn update_settings(
    db: &DatabaseConnection,
    update: SettingsUpdate,
) -> Result<app_settings::Model> {
    for amount in [
        update.referral_bonus_amount,
        update.min_withdraw_amount,
        update.min_deposit_amount,
        update.daily_checkin_reward,
    ]
    .into_iter()
    .flatten()
    {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidAmount { amount });
        }
    }

    let current = get_settings(db).await?;
    let mut row: app_settings::ActiveModel = current.into();

    if let Some(amount) = update.referral_bonus_amount {
        row.referral_bonus_amount = Set(amount);
    }
    if let Some(amount) = update.min_withdraw_amount {
        row.min_withdraw_amount = Set(amount);
    }
    if let Some(amount) = update.min_deposit_amount {
        row.min_deposit_amount = Set(amount);
    }
    if let Some(amount) = update.daily_checkin_reward {
        row.daily_checkin_reward = Set(amount);
    }
    row.updated_at = Set(chrono::Utc::now());

    row.update(db).await.map_err(Into::into)
}
