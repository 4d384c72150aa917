//! Referral bonus release.
//!
//! Referral linking happens at registration (`core::account`); the payout
//! waits until the referred user proves they joined the platform's official
//! channel. Release rides inside the verification store transaction and is
//! de-duplicated by a single conditional flip of the
//! `referral_bonus_pending -> referral_bonus_credited` pair, so at most one
//! `ReferralBonus` transaction can ever exist per referred account.

use crate::{
    core::ledger::{self, TransactionMeta},
    entities::{Account, TransactionKind, account},
    errors::Result,
};
use sea_orm::{ConnectionTrait, Set, prelude::*};

/// Releases the referred account's pending bonus to its referrer.
///
/// Returns `true` when a bonus was credited. The flip
/// `UPDATE accounts SET referral_bonus_pending = 0, referral_bonus_credited = 1
/// WHERE id = ? AND referral_bonus_pending AND NOT referral_bonus_credited`
/// is the sole de-duplication guard: zero rows affected means there is nothing
/// to release (no referral, already credited, or a concurrent release won).
/// A dangling referrer id consumes the flip without crediting anyone.
pub async fn release_referral_bonus<C>(db: &C, referred: &account::Model) -> Result<bool>
where
    C: ConnectionTrait,
{
    let Some(referrer_id) = referred.referred_by else {
        return Ok(false);
    };

    let flipped = Account::update_many()
        .set(account::ActiveModel {
            referral_bonus_pending: Set(false),
            referral_bonus_credited: Set(true),
            ..Default::default()
        })
        .filter(account::Column::Id.eq(referred.id))
        .filter(account::Column::ReferralBonusPending.eq(true))
        .filter(account::Column::ReferralBonusCredited.eq(false))
        .exec(db)
        .await?;

    if flipped.rows_affected == 0 {
        return Ok(false);
    }

    let Some(referrer) = Account::find_by_id(referrer_id).one(db).await? else {
        tracing::warn!(
            referred_id = referred.id,
            referrer_id,
            "referrer no longer exists, forfeiting referral bonus"
        );
        return Ok(false);
    };

    let bonus = crate::core::settings::get_settings(db)
        .await?
        .referral_bonus_amount;

    ledger::credit(
        db,
        referrer.id,
        bonus,
        TransactionKind::ReferralBonus,
        TransactionMeta::note(format!("Referral bonus for {}", referred.first_name)),
    )
    .await?;

    tracing::info!(
        referrer_id = referrer.id,
        referred_id = referred.id,
        bonus,
        "referral bonus released"
    );

    Ok(true)
}

/// Looks up an account by its referral code, ignoring case and whitespace.
pub async fn resolve_referrer(
    db: &DatabaseConnection,
    code: &str,
) -> Result<Option<account::Model>> {
    let normalized = code.trim().to_uppercase();
    if normalized.is_empty() {
        return Ok(None);
    }

    Account::find()
        .filter(account::Column::ReferralCode.eq(normalized))
        .one(db)
        .await
        .map_err(Into::into)
}
