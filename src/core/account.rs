//! Account business logic - registration, referral linking, daily bonus, leaderboard.
//!
//! Registration is get-or-create keyed on the Telegram id, mirroring the
//! platform's auto-login: the first request creates the account, every later
//! one returns it unchanged. Each account carries a unique six-character
//! referral code generated at creation.

use crate::{
    config::app::PlatformConfig,
    core::ledger::{self, TransactionMeta},
    core::referral,
    entities::{Account, TransactionKind, account, transaction},
    errors::{Error, Result},
};
use rand::{Rng, distributions::Alphanumeric};
use sea_orm::{
    Condition, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait, prelude::*,
};

/// Length of generated referral codes.
const REFERRAL_CODE_LEN: usize = 6;
/// How many fresh codes to try before giving up on a unique one.
const CODE_RETRY_LIMIT: usize = 5;
/// Hours between daily bonus claims.
const DAILY_BONUS_COOLDOWN_HOURS: i64 = 24;

/// Profile data for registering an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Stable Telegram user id, the external identity key
    pub telegram_id: String,
    /// Display name
    pub first_name: String,
    /// Optional last name
    pub last_name: Option<String>,
    /// Optional Telegram username
    pub username: Option<String>,
    /// Optional avatar URL
    pub photo_url: Option<String>,
    /// Referral code the user arrived with, if any
    pub referral_code_used: Option<String>,
}

fn generate_referral_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Registers an account, or returns the existing one for this Telegram id.
///
/// A valid referral code links the new account to its referrer and marks the
/// one-time bonus as pending; the bonus itself is released later by the
/// verification flow. Admin status comes from the deployment's configured
/// allow-list. Referral code collisions retry with a fresh code a bounded
/// number of times before surfacing [`Error::ReferralCodeExhausted`].
pub async fn register_account(
    db: &DatabaseConnection,
    new_account: NewAccount,
    platform: &PlatformConfig,
) -> Result<account::Model> {
    let telegram_id = new_account.telegram_id.trim().to_string();
    if telegram_id.is_empty() {
        return Err(Error::Config {
            message: "Telegram id cannot be empty".to_string(),
        });
    }

    if let Some(existing) = account_by_telegram_id(db, &telegram_id).await? {
        return Ok(existing);
    }

    let referrer = match &new_account.referral_code_used {
        Some(code) => referral::resolve_referrer(db, code).await?,
        None => None,
    };
    // An account must never refer itself
    let referrer = referrer.filter(|candidate| candidate.telegram_id != telegram_id);

    let is_admin = platform.is_admin(&telegram_id);

    for attempt in 1..=CODE_RETRY_LIMIT {
        let fresh = account::ActiveModel {
            telegram_id: Set(telegram_id.clone()),
            first_name: Set(new_account.first_name.clone()),
            last_name: Set(new_account.last_name.clone()),
            username: Set(new_account.username.clone()),
            photo_url: Set(new_account.photo_url.clone()),
            balance: Set(0.0),
            referral_code: Set(generate_referral_code()),
            referred_by: Set(referrer.as_ref().map(|r| r.id)),
            referral_bonus_pending: Set(referrer.is_some()),
            referral_bonus_credited: Set(false),
            daily_checkin_last_claimed: Set(None),
            is_admin: Set(is_admin),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        match fresh.insert(db).await {
            Ok(created) => {
                tracing::info!(
                    account_id = created.id,
                    telegram_id = %created.telegram_id,
                    referred = referrer.is_some(),
                    "account registered"
                );
                return Ok(created);
            }
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                // Either this telegram id registered concurrently (return the
                // winner) or the generated code collided (try another)
                if let Some(existing) = account_by_telegram_id(db, &telegram_id).await? {
                    return Ok(existing);
                }
                tracing::debug!(attempt, "referral code collision, regenerating");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(Error::ReferralCodeExhausted)
}

/// Finds an account by its internal id.
pub async fn account_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<account::Model>> {
    Account::find_by_id(id).one(db).await.map_err(Into::into)
}

/// Finds an account by its Telegram id.
pub async fn account_by_telegram_id(
    db: &DatabaseConnection,
    telegram_id: &str,
) -> Result<Option<account::Model>> {
    Account::find()
        .filter(account::Column::TelegramId.eq(telegram_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Claims the daily check-in bonus, enforcing the 24-hour cooldown.
///
/// The cooldown is a conditional timestamp claim:
/// `UPDATE accounts SET daily_checkin_last_claimed = now WHERE id = ? AND
/// (daily_checkin_last_claimed IS NULL OR daily_checkin_last_claimed <= ?)`.
/// Claim and credit commit in one store transaction, so two concurrent claims
/// can never both pay out.
pub async fn claim_daily_bonus(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<transaction::Model> {
    let reward = crate::core::settings::get_settings(db)
        .await?
        .daily_checkin_reward;

    let now = chrono::Utc::now();
    let cutoff = now - chrono::Duration::hours(DAILY_BONUS_COOLDOWN_HOURS);

    let txn = db.begin().await?;

    let claimed = Account::update_many()
        .set(account::ActiveModel {
            daily_checkin_last_claimed: Set(Some(now)),
            ..Default::default()
        })
        .filter(account::Column::Id.eq(account_id))
        .filter(
            Condition::any()
                .add(account::Column::DailyCheckinLastClaimed.is_null())
                .add(account::Column::DailyCheckinLastClaimed.lte(cutoff)),
        )
        .exec(&txn)
        .await?;

    if claimed.rows_affected == 0 {
        let existing = Account::find_by_id(account_id)
            .one(&txn)
            .await?
            .ok_or_else(|| Error::AccountNotFound {
                id: account_id.to_string(),
            })?;
        let last = existing
            .daily_checkin_last_claimed
            .ok_or(Error::ConcurrentModification)?;
        return Err(Error::DailyBonusNotReady {
            next_claim_at: last + chrono::Duration::hours(DAILY_BONUS_COOLDOWN_HOURS),
        });
    }

    let row = ledger::credit(
        &txn,
        account_id,
        reward,
        TransactionKind::DailyBonus,
        TransactionMeta::note("Daily check-in"),
    )
    .await?;

    txn.commit().await?;
    Ok(row)
}

/// Lists the accounts with the highest balances, for the leaderboard view.
pub async fn top_earners(db: &DatabaseConnection, limit: u64) -> Result<Vec<account::Model>> {
    Account::find()
        .order_by_desc(account::Column::Balance)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}
