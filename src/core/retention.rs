//! Retention auditor - claws back rewards from members who left early.
//!
//! A reward only becomes final after the member stays in the channel for the
//! grace period. The auditor periodically sweeps verified completions older
//! than the grace period that were never audited, re-checks membership through
//! the oracle, and either finalizes the reward or deducts it back. Completions
//! on the official referral channel deduct from the referrer instead, since
//! the referrer was the one paid for that join. Each completion is claimed
//! with a conditional update before any money moves, so overlapping sweeps
//! can never deduct the same completion twice.

use crate::{
    config::app::PlatformConfig,
    core::ledger::{self, TransactionMeta},
    entities::{
        Account, Completion, CompletionStatus, Task, TransactionKind, account, completion, task,
    },
    errors::{Error, Result},
    oracle::{Membership, MembershipOracle, Notifier, is_same_channel},
};
use sea_orm::{ConnectionTrait, Set, TransactionTrait, prelude::*};
use std::sync::Arc;
use std::time::Duration;

/// How long a member must stay joined before their reward is final.
pub const GRACE_PERIOD_HOURS: i64 = 48;

/// Counters describing one retention sweep.
///
/// `retained + deducted + insufficient_balance` completions were fully
/// dispositioned (see [`RetentionSweepSummary::checked`]); the remaining
/// counters cover items that were skipped or deferred.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetentionSweepSummary {
    /// Completions past the grace period that this sweep examined
    pub candidates: usize,
    /// Member stayed; reward finalized
    pub retained: usize,
    /// Member left; reward deducted
    pub deducted: usize,
    /// Member left but the debit target could not cover the reward; the loss
    /// is accepted and the completion is never reprocessed
    pub insufficient_balance: usize,
    /// Task or account no longer exists; marked checked without any debit
    pub orphaned: usize,
    /// Oracle unreachable; left unclaimed for the next sweep
    pub oracle_unavailable: usize,
    /// Claim lost to a concurrent sweep; skipped
    pub contested: usize,
    /// Unexpected per-item failures, logged and skipped
    pub failed: usize,
}

impl RetentionSweepSummary {
    /// Completions fully dispositioned by this sweep.
    #[must_use]
    pub fn checked(&self) -> usize {
        self.retained + self.deducted + self.insufficient_balance
    }
}

/// Per-item audit verdict, tallied into the sweep summary.
enum AuditOutcome {
    Retained,
    Deducted,
    InsufficientBalance,
    Orphaned,
    OracleUnavailable,
    Contested,
}

/// Runs one retention sweep over every auditable completion.
///
/// The sweep always runs to completion over its candidate set: a failure on
/// one item is logged and counted, never allowed to abort the rest.
pub async fn run_retention_sweep(
    db: &DatabaseConnection,
    oracle: &dyn MembershipOracle,
    notifier: &dyn Notifier,
    platform: &PlatformConfig,
) -> Result<RetentionSweepSummary> {
    let cutoff = chrono::Utc::now() - chrono::Duration::hours(GRACE_PERIOD_HOURS);

    let candidates = Completion::find()
        .filter(completion::Column::Status.eq(CompletionStatus::Verified))
        .filter(completion::Column::RetentionChecked.eq(false))
        .filter(completion::Column::Deducted.eq(false))
        .filter(completion::Column::VerifiedAt.is_not_null())
        .filter(completion::Column::VerifiedAt.lte(cutoff))
        .all(db)
        .await?;

    let mut summary = RetentionSweepSummary {
        candidates: candidates.len(),
        ..RetentionSweepSummary::default()
    };

    for row in candidates {
        match audit_completion(db, oracle, notifier, platform, &row).await {
            Ok(AuditOutcome::Retained) => summary.retained += 1,
            Ok(AuditOutcome::Deducted) => summary.deducted += 1,
            Ok(AuditOutcome::InsufficientBalance) => summary.insufficient_balance += 1,
            Ok(AuditOutcome::Orphaned) => summary.orphaned += 1,
            Ok(AuditOutcome::OracleUnavailable) => summary.oracle_unavailable += 1,
            Ok(AuditOutcome::Contested) => summary.contested += 1,
            Err(err) => {
                summary.failed += 1;
                tracing::error!(
                    completion_id = row.id,
                    error = %err,
                    "retention audit failed for completion"
                );
            }
        }
    }

    tracing::info!(
        candidates = summary.candidates,
        retained = summary.retained,
        deducted = summary.deducted,
        insufficient_balance = summary.insufficient_balance,
        orphaned = summary.orphaned,
        oracle_unavailable = summary.oracle_unavailable,
        "retention sweep complete"
    );

    Ok(summary)
}

/// Audits one completion: re-checks membership and settles the outcome.
async fn audit_completion(
    db: &DatabaseConnection,
    oracle: &dyn MembershipOracle,
    notifier: &dyn Notifier,
    platform: &PlatformConfig,
    row: &completion::Model,
) -> Result<AuditOutcome> {
    let audited_task = Task::find_by_id(row.task_id).one(db).await?;
    let member = Account::find_by_id(row.account_id).one(db).await?;

    let (Some(audited_task), Some(member)) = (audited_task, member) else {
        tracing::warn!(
            completion_id = row.id,
            task_id = row.task_id,
            account_id = row.account_id,
            "orphaned completion, marking checked without any debit"
        );
        return Ok(if mark_checked(db, row.id).await? {
            AuditOutcome::Orphaned
        } else {
            AuditOutcome::Contested
        });
    };

    // Oracle outages defer the item - no claim, no verdict. The next sweep
    // will pick it up again.
    let membership = match oracle
        .is_member(&audited_task.channel, &member.telegram_id)
        .await
    {
        Ok(verdict) => verdict,
        Err(Error::OracleUnavailable { reason }) => {
            tracing::warn!(
                completion_id = row.id,
                channel = %audited_task.channel,
                reason = %reason,
                "oracle unavailable, deferring retention check"
            );
            return Ok(AuditOutcome::OracleUnavailable);
        }
        Err(other) => return Err(other),
    };

    if membership == Membership::Member {
        return Ok(if mark_checked(db, row.id).await? {
            AuditOutcome::Retained
        } else {
            AuditOutcome::Contested
        });
    }

    clawback(db, notifier, platform, row, &audited_task, &member).await
}

/// Deducts a leaver's reward, redirecting to the referrer for the official channel.
async fn clawback(
    db: &DatabaseConnection,
    notifier: &dyn Notifier,
    platform: &PlatformConfig,
    row: &completion::Model,
    audited_task: &task::Model,
    member: &account::Model,
) -> Result<AuditOutcome> {
    // Older rows may predate the reward snapshot
    let amount = row.reward_amount.unwrap_or(audited_task.reward_per_member);

    let referral_leaver = is_same_channel(&audited_task.channel, &platform.referral_channel)
        && member.referred_by.is_some();

    let (target_id, note) = if referral_leaver {
        (
            member.referred_by.unwrap_or(member.id),
            format!(
                "Referral {} left {} early",
                member.first_name, audited_task.channel
            ),
        )
    } else {
        (member.id, format!("Left {} early", audited_task.channel))
    };

    let target = Account::find_by_id(target_id).one(db).await?;

    let txn = db.begin().await?;

    // The claim is the double-deduct guard: re-checked at write time, so two
    // overlapping sweeps cannot both pass this point for the same row.
    if !claim_for_deduction(&txn, row.id).await? {
        return Ok(AuditOutcome::Contested);
    }

    let Some(target) = target else {
        // The debit target no longer exists; keep the claim so the row is
        // never reprocessed, and accept the loss.
        txn.commit().await?;
        tracing::warn!(
            completion_id = row.id,
            target_id,
            "deduction target missing, accepting loss"
        );
        return Ok(AuditOutcome::InsufficientBalance);
    };

    match ledger::debit(
        &txn,
        target.id,
        amount,
        TransactionKind::Deduction,
        TransactionMeta::note(note.clone()),
    )
    .await
    {
        Ok(_) => {
            txn.commit().await?;

            tracing::info!(
                completion_id = row.id,
                target_id = target.id,
                amount,
                channel = %audited_task.channel,
                redirected = referral_leaver,
                "reward deducted"
            );

            let text = format!(
                "{amount} was deducted from your balance. Reason: {note}. \
                 Stay in channels for at least {GRACE_PERIOD_HOURS} hours to keep your rewards."
            );
            if let Err(err) = notifier.send(&target.telegram_id, &text).await {
                tracing::warn!(
                    account_id = target.id,
                    error = %err,
                    "failed to send deduction notification"
                );
            }

            Ok(AuditOutcome::Deducted)
        }
        Err(Error::InsufficientBalance {
            available,
            required,
        }) => {
            // Accept the loss: keep the claim, move no money, never revisit
            txn.commit().await?;
            tracing::warn!(
                completion_id = row.id,
                target_id = target.id,
                available,
                required,
                "deduction target cannot cover the reward, accepting loss"
            );
            Ok(AuditOutcome::InsufficientBalance)
        }
        Err(other) => Err(other),
    }
}

/// Conditionally marks a completion as retention-checked. Returns whether this
/// caller won the claim.
async fn mark_checked<C>(db: &C, completion_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let claimed = Completion::update_many()
        .set(completion::ActiveModel {
            retention_checked: Set(true),
            ..Default::default()
        })
        .filter(completion::Column::Id.eq(completion_id))
        .filter(completion::Column::RetentionChecked.eq(false))
        .exec(db)
        .await?;

    Ok(claimed.rows_affected > 0)
}

/// Conditionally claims a completion for deduction, marking it checked and
/// deducted in one write. Returns whether this caller won the claim.
async fn claim_for_deduction<C>(db: &C, completion_id: i64) -> Result<bool>
where
    C: ConnectionTrait,
{
    let claimed = Completion::update_many()
        .set(completion::ActiveModel {
            retention_checked: Set(true),
            deducted: Set(true),
            ..Default::default()
        })
        .filter(completion::Column::Id.eq(completion_id))
        .filter(completion::Column::RetentionChecked.eq(false))
        .filter(completion::Column::Deducted.eq(false))
        .exec(db)
        .await?;

    Ok(claimed.rows_affected > 0)
}

/// Runs retention sweeps forever on the configured interval.
///
/// The first sweep fires immediately; a failed sweep logs its error and waits
/// for the next tick.
pub async fn run_retention_loop(
    db: DatabaseConnection,
    oracle: Arc<dyn MembershipOracle>,
    notifier: Arc<dyn Notifier>,
    platform: PlatformConfig,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(platform.sweep_interval_secs));

    tracing::info!(
        interval_secs = platform.sweep_interval_secs,
        "retention loop started"
    );

    loop {
        ticker.tick().await;
        if let Err(err) = run_retention_sweep(&db, oracle.as_ref(), notifier.as_ref(), &platform).await
        {
            tracing::error!(error = %err, "retention sweep failed");
        }
    }
}
