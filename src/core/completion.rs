//! Completion state machine - membership verification and reward claims.
//!
//! A completion tracks one `(task, account)` pair through verification. The
//! happy path asks the membership oracle whether the account joined the task's
//! channel, then settles everything in one store transaction: claim a payout
//! slot on the task, flip the completion to `Verified` with a snapshot of the
//! reward, credit the member, and release the referral bonus when the task
//! points at the platform's official channel. A unique index on
//! `(task_id, account_id)` plus conditional updates make the settlement safe
//! against concurrent verification attempts from multiple devices.

use crate::{
    config::app::PlatformConfig,
    core::ledger::{self, TransactionMeta},
    core::{referral, task as task_core},
    entities::{
        Account, Completion, CompletionStatus, Task, TransactionKind, completion, task,
    },
    errors::{Error, Result},
    oracle::{Membership, MembershipOracle, is_same_channel},
};
use sea_orm::{ConnectionTrait, QueryOrder, Set, SqlErr, TransactionTrait, prelude::*};

/// How many times a verification retries after losing a write race before
/// surfacing [`Error::ConcurrentModification`].
const VERIFY_RETRY_LIMIT: usize = 3;

/// Verifies that an account joined a task's channel and settles the reward.
///
/// The oracle is consulted before any state changes, so an oracle outage
/// aborts with [`Error::OracleUnavailable`] and zero side effects - an
/// unreachable oracle is never treated as a membership verdict. A negative
/// verdict records a retriable `Failed` completion and surfaces
/// [`Error::NotMember`]. A positive verdict settles atomically; races with
/// concurrent verifications are retried a bounded number of times.
pub async fn verify_task(
    db: &DatabaseConnection,
    oracle: &dyn MembershipOracle,
    task_id: i64,
    account_id: i64,
    platform: &PlatformConfig,
) -> Result<completion::Model> {
    for attempt in 1..=VERIFY_RETRY_LIMIT {
        match try_verify(db, oracle, task_id, account_id, platform).await {
            Err(Error::ConcurrentModification) if attempt < VERIFY_RETRY_LIMIT => {
                tracing::debug!(task_id, account_id, attempt, "verification contended, retrying");
            }
            other => return other,
        }
    }

    Err(Error::ConcurrentModification)
}

/// One verification attempt. Returns [`Error::ConcurrentModification`] when a
/// concurrent writer invalidated this attempt's view after the oracle call.
async fn try_verify(
    db: &DatabaseConnection,
    oracle: &dyn MembershipOracle,
    task_id: i64,
    account_id: i64,
    platform: &PlatformConfig,
) -> Result<completion::Model> {
    let claimed_task = Task::find_by_id(task_id)
        .one(db)
        .await?
        .ok_or(Error::TaskNotFound { id: task_id })?;

    if !claimed_task.is_active || claimed_task.remaining_budget < claimed_task.reward_per_member {
        return Err(Error::TaskNotAvailable { id: task_id });
    }

    let account = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })?;

    if let Some(existing) = completion_for(db, task_id, account_id).await? {
        if existing.status == CompletionStatus::Verified {
            return Err(Error::AlreadyCompleted {
                task_id,
                account_id,
            });
        }
    }

    // The oracle call happens outside any store transaction: it can take
    // seconds and must never hold locks while it waits.
    let membership = oracle
        .is_member(&claimed_task.channel, &account.telegram_id)
        .await?;

    if membership == Membership::NotMember {
        record_failed_attempt(db, task_id, account_id).await?;
        return Err(Error::NotMember {
            channel: claimed_task.channel,
        });
    }

    let txn = db.begin().await?;

    // Losing the last payout slot to a concurrent claim is terminal, not
    // retriable: the task is simply gone.
    task_core::claim_slot(&txn, &claimed_task).await?;

    let verified = mark_verified(&txn, &claimed_task, account_id).await?;

    ledger::credit(
        &txn,
        account_id,
        claimed_task.reward_per_member,
        TransactionKind::TaskEarning,
        TransactionMeta::note(format!("Joined {}", claimed_task.channel)),
    )
    .await?;

    if is_same_channel(&claimed_task.channel, &platform.referral_channel) {
        referral::release_referral_bonus(&txn, &account).await?;
    }

    txn.commit().await?;

    tracing::info!(
        task_id,
        account_id,
        reward = claimed_task.reward_per_member,
        channel = %claimed_task.channel,
        "task verified"
    );

    Ok(verified)
}

/// Upserts the completion for `(task, account)` to `Verified`.
///
/// Inserts a fresh row, or conditionally flips an earlier `Failed` attempt.
/// Both paths detect concurrent writers - via the unique index or via the
/// conditional update - and surface [`Error::ConcurrentModification`] so the
/// enclosing store transaction rolls back the already-claimed task slot.
async fn mark_verified<C>(
    db: &C,
    claimed_task: &task::Model,
    account_id: i64,
) -> Result<completion::Model>
where
    C: ConnectionTrait,
{
    let now = chrono::Utc::now();

    let existing = Completion::find()
        .filter(completion::Column::TaskId.eq(claimed_task.id))
        .filter(completion::Column::AccountId.eq(account_id))
        .one(db)
        .await?;

    match existing {
        Some(row) if row.status == CompletionStatus::Verified => Err(Error::AlreadyCompleted {
            task_id: claimed_task.id,
            account_id,
        }),
        Some(row) => {
            let flipped = Completion::update_many()
                .set(completion::ActiveModel {
                    status: Set(CompletionStatus::Verified),
                    reward_amount: Set(Some(claimed_task.reward_per_member)),
                    verified_at: Set(Some(now)),
                    ..Default::default()
                })
                .filter(completion::Column::Id.eq(row.id))
                .filter(completion::Column::Status.eq(CompletionStatus::Failed))
                .exec(db)
                .await?;

            if flipped.rows_affected == 0 {
                return Err(Error::ConcurrentModification);
            }

            Completion::find_by_id(row.id)
                .one(db)
                .await?
                .ok_or(Error::ConcurrentModification)
        }
        None => {
            let fresh = completion::ActiveModel {
                task_id: Set(claimed_task.id),
                account_id: Set(account_id),
                status: Set(CompletionStatus::Verified),
                reward_amount: Set(Some(claimed_task.reward_per_member)),
                verified_at: Set(Some(now)),
                retention_checked: Set(false),
                deducted: Set(false),
                created_at: Set(now),
                ..Default::default()
            };

            match fresh.insert(db).await {
                Ok(created) => Ok(created),
                Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                    Err(Error::ConcurrentModification)
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

/// Records a `Failed` completion after a negative membership verdict.
///
/// An existing row always wins: a `Verified` completion is never downgraded,
/// and a prior `Failed` row already says everything this one would.
async fn record_failed_attempt(db: &DatabaseConnection, task_id: i64, account_id: i64) -> Result<()> {
    if completion_for(db, task_id, account_id).await?.is_some() {
        return Ok(());
    }

    let attempt = completion::ActiveModel {
        task_id: Set(task_id),
        account_id: Set(account_id),
        status: Set(CompletionStatus::Failed),
        reward_amount: Set(None),
        verified_at: Set(None),
        retention_checked: Set(false),
        deducted: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    match attempt.insert(db).await {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Finds the completion for a `(task, account)` pair, if any.
pub async fn completion_for<C>(
    db: &C,
    task_id: i64,
    account_id: i64,
) -> Result<Option<completion::Model>>
where
    C: ConnectionTrait,
{
    Completion::find()
        .filter(completion::Column::TaskId.eq(task_id))
        .filter(completion::Column::AccountId.eq(account_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists all completions recorded for an account, newest first.
pub async fn completions_for_account(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Vec<completion::Model>> {
    Completion::find()
        .filter(completion::Column::AccountId.eq(account_id))
        .order_by_desc(completion::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::account::register_account;
    use crate::core::ledger::{get_balance, get_transactions_for_account};
    use crate::core::task::get_task;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_verify_missing_task() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let member = create_test_account(&db, "3001").await?;

        let result = verify_task(&db, &oracle, 999, member.id, &test_platform_config()).await;
        assert!(matches!(result.unwrap_err(), Error::TaskNotFound { id: 999 }));

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_missing_account() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let result = verify_task(&db, &oracle, offered.id, 999, &test_platform_config()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::AccountNotFound { id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_inactive_task() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let member = create_test_account(&db, "3002").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let mut retire: task::ActiveModel = offered.clone().into();
        retire.is_active = Set(false);
        retire.update(&db).await?;

        let result = verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::TaskNotAvailable { id: _ }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_member_settles_reward() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let member = create_test_account(&db, "3003").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let verified =
            verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await?;

        assert_eq!(verified.status, CompletionStatus::Verified);
        assert_eq!(verified.reward_amount, Some(2.5));
        assert!(verified.verified_at.is_some());
        assert!(!verified.retention_checked);
        assert!(!verified.deducted);

        assert_eq!(get_balance(&db, member.id).await?, 2.5);

        let history = get_transactions_for_account(&db, member.id).await?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, TransactionKind::TaskEarning);
        assert_eq!(history[0].amount, 2.5);

        let claimed = get_task(&db, offered.id).await?.unwrap();
        assert_eq!(claimed.remaining_budget, 57.5);
        assert_eq!(claimed.completed_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_not_member_records_failed_attempt() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::not_member();
        let member = create_test_account(&db, "3004").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let result = verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await;
        assert!(matches!(result.unwrap_err(), Error::NotMember { channel: _ }));

        let attempt = completion_for(&db, offered.id, member.id).await?.unwrap();
        assert_eq!(attempt.status, CompletionStatus::Failed);
        assert_eq!(attempt.reward_amount, None);

        // Nothing was paid and no slot was claimed
        assert_eq!(get_balance(&db, member.id).await?, 0.0);
        let untouched = get_task(&db, offered.id).await?.unwrap();
        assert_eq!(untouched.remaining_budget, 60.0);
        assert_eq!(untouched.completed_count, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_attempt_is_retriable() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::not_member();
        let member = create_test_account(&db, "3005").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let first = verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await;
        assert!(first.is_err());
        let failed = completion_for(&db, offered.id, member.id).await?.unwrap();

        // The user joins the channel and retries
        oracle.set(FakeVerdict::Member);
        let verified =
            verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await?;

        // The same row was flipped, not a second one inserted
        assert_eq!(verified.id, failed.id);
        assert_eq!(verified.status, CompletionStatus::Verified);
        assert_eq!(get_balance(&db, member.id).await?, 2.5);

        Ok(())
    }

    #[tokio::test]
    async fn test_verify_twice_pays_once() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let member = create_test_account(&db, "3006").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await?;
        let second =
            verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await;

        assert!(matches!(
            second.unwrap_err(),
            Error::AlreadyCompleted { .. }
        ));

        assert_eq!(get_balance(&db, member.id).await?, 2.5);
        let claimed = get_task(&db, offered.id).await?.unwrap();
        assert_eq!(claimed.completed_count, 1);
        assert_eq!(claimed.remaining_budget, 57.5);

        Ok(())
    }

    #[tokio::test]
    async fn test_oracle_outage_fails_closed() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::unavailable();
        let member = create_test_account(&db, "3007").await?;
        let offered = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let result = verify_task(&db, &oracle, offered.id, member.id, &test_platform_config()).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::OracleUnavailable { reason: _ }
        ));

        // An outage is not a verdict: no completion row, no payment, no claim
        assert!(completion_for(&db, offered.id, member.id).await?.is_none());
        assert_eq!(get_balance(&db, member.id).await?, 0.0);
        let untouched = get_task(&db, offered.id).await?.unwrap();
        assert_eq!(untouched.remaining_budget, 60.0);

        Ok(())
    }

    #[tokio::test]
    async fn test_last_slot_pays_exactly_one_member() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let first = create_test_account(&db, "3008").await?;
        let second = create_test_account(&db, "3009").await?;
        // Budget covers a single payout
        let offered = create_test_task(&db, "@daily_news", 5.0, 5.0).await?;

        verify_task(&db, &oracle, offered.id, first.id, &test_platform_config()).await?;

        let lost = verify_task(&db, &oracle, offered.id, second.id, &test_platform_config()).await;
        assert!(matches!(
            lost.unwrap_err(),
            Error::TaskNotAvailable { id: _ }
        ));

        // The loser's rolled-back attempt left no trace
        assert!(completion_for(&db, offered.id, second.id).await?.is_none());
        assert_eq!(get_balance(&db, second.id).await?, 0.0);

        let drained = get_task(&db, offered.id).await?.unwrap();
        assert_eq!(drained.remaining_budget, 0.0);
        assert!(!drained.is_active);
        assert_eq!(drained.completed_count, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_official_channel_verify_releases_referral_bonus() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let platform = test_platform_config();

        let referrer = create_test_account(&db, "3010").await?;
        let referred = register_account(
            &db,
            test_new_account("3011", Some(referrer.referral_code.clone())),
            &platform,
        )
        .await?;
        assert!(referred.referral_bonus_pending);

        // The official channel task releases the pending bonus on verify
        let offered = create_test_task(&db, &platform.referral_channel, 2.0, 20.0).await?;
        verify_task(&db, &oracle, offered.id, referred.id, &platform).await?;

        assert_eq!(get_balance(&db, referred.id).await?, 2.0);
        assert_eq!(get_balance(&db, referrer.id).await?, 5.0);

        let referrer_history = get_transactions_for_account(&db, referrer.id).await?;
        assert_eq!(referrer_history.len(), 1);
        assert_eq!(referrer_history[0].kind, TransactionKind::ReferralBonus);

        let flags = crate::core::account::account_by_id(&db, referred.id)
            .await?
            .unwrap();
        assert!(!flags.referral_bonus_pending);
        assert!(flags.referral_bonus_credited);

        Ok(())
    }

    #[tokio::test]
    async fn test_ordinary_channel_verify_leaves_referral_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let platform = test_platform_config();

        let referrer = create_test_account(&db, "3012").await?;
        let referred = register_account(
            &db,
            test_new_account("3013", Some(referrer.referral_code.clone())),
            &platform,
        )
        .await?;

        let offered = create_test_task(&db, "@daily_news", 2.0, 20.0).await?;
        verify_task(&db, &oracle, offered.id, referred.id, &platform).await?;

        assert_eq!(get_balance(&db, referrer.id).await?, 0.0);
        let flags = crate::core::account::account_by_id(&db, referred.id)
            .await?
            .unwrap();
        assert!(flags.referral_bonus_pending);
        assert!(!flags.referral_bonus_credited);

        Ok(())
    }

    #[tokio::test]
    async fn test_completions_for_account_lists_own_rows() -> Result<()> {
        let db = setup_test_db().await?;
        let oracle = FakeOracle::member();
        let member = create_test_account(&db, "3014").await?;
        let other = create_test_account(&db, "3015").await?;
        let first_task = create_test_task(&db, "@daily_news", 2.5, 60.0).await?;
        let second_task = create_test_task(&db, "@movie_club", 1.0, 10.0).await?;

        verify_task(&db, &oracle, first_task.id, member.id, &test_platform_config()).await?;
        verify_task(&db, &oracle, second_task.id, member.id, &test_platform_config()).await?;
        verify_task(&db, &oracle, first_task.id, other.id, &test_platform_config()).await?;

        let mine = completions_for_account(&db, member.id).await?;
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|row| row.account_id == member.id));

        Ok(())
    }
}
