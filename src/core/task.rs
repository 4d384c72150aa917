//! Task business logic - funded channel-join offers.
//!
//! A task escrows its whole budget from the creator's balance at creation time
//! and pays it back out one verified member at a time. The budget accounting
//! invariant `reward_per_member * completed_count + remaining_budget ==
//! total_budget` is maintained by claiming payout slots with a conditional
//! decrement, so concurrent verifications can never overdraw the budget.

use crate::{
    core::ledger::{self, TransactionMeta},
    entities::{Account, Task, TransactionKind, task},
    errors::{Error, Result},
    oracle::normalize_channel,
};
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};

/// Smallest payout a task may offer per member.
pub const MIN_REWARD_PER_MEMBER: f64 = 0.5;
/// Smallest total budget a task may carry.
pub const MIN_TOTAL_BUDGET: f64 = 1.0;

/// Payload for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Short human-readable offer title
    pub title: String,
    /// Channel the member must join, with or without the `@` prefix
    pub channel: String,
    /// Invite link shown to members
    pub channel_link: String,
    /// Amount paid per verified member
    pub reward_per_member: f64,
    /// Total amount escrowed from the creator
    pub total_budget: f64,
}

/// Creates a new task, escrowing its budget from the creator in one store transaction.
///
/// The creator is debited `total_budget` with a `TaskCreation` audit row before
/// the task row is inserted. Admin accounts use the named balance-check bypass
/// and may fund tasks past their balance; everyone else gets
/// [`Error::InsufficientBalance`] before anything is mutated.
pub async fn create_task(
    db: &DatabaseConnection,
    creator_id: i64,
    new_task: NewTask,
) -> Result<task::Model> {
    let title = new_task.title.trim().to_string();
    if title.chars().count() < 3 {
        return Err(Error::Config {
            message: "Task title must be at least 3 characters".to_string(),
        });
    }

    if new_task.channel.trim().is_empty() {
        return Err(Error::Config {
            message: "Task channel cannot be empty".to_string(),
        });
    }
    let channel = normalize_channel(&new_task.channel);

    let channel_link = new_task.channel_link.trim().to_string();
    if !(channel_link.starts_with("https://") || channel_link.starts_with("http://")) {
        return Err(Error::Config {
            message: "Channel link must be an http(s) URL".to_string(),
        });
    }

    let reward = new_task.reward_per_member;
    if !reward.is_finite() || reward < MIN_REWARD_PER_MEMBER {
        return Err(Error::InvalidAmount { amount: reward });
    }

    let budget = new_task.total_budget;
    if !budget.is_finite() || budget < MIN_TOTAL_BUDGET {
        return Err(Error::InvalidAmount { amount: budget });
    }

    if budget < reward {
        return Err(Error::Config {
            message: "Total budget must cover at least one reward".to_string(),
        });
    }

    let txn = db.begin().await?;

    let creator = Account::find_by_id(creator_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: creator_id.to_string(),
        })?;

    let meta = TransactionMeta::note(format!("Funded task: {title}"));
    if creator.is_admin {
        ledger::debit_unchecked(&txn, creator_id, budget, TransactionKind::TaskCreation, meta)
            .await?;
    } else {
        ledger::debit(&txn, creator_id, budget, TransactionKind::TaskCreation, meta).await?;
    }

    let max_members = (budget / reward).floor() as i32;
    let created = task::ActiveModel {
        creator_id: Set(creator_id),
        title: Set(title),
        channel: Set(channel),
        channel_link: Set(channel_link),
        reward_per_member: Set(reward),
        total_budget: Set(budget),
        remaining_budget: Set(budget),
        completed_count: Set(0),
        max_members: Set(max_members),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    tracing::info!(
        task_id = created.id,
        creator_id,
        channel = %created.channel,
        budget,
        "task created"
    );

    Ok(created)
}

/// Lists tasks that can still pay out: active with budget remaining, newest first.
pub async fn active_tasks(db: &DatabaseConnection) -> Result<Vec<task::Model>> {
    Task::find()
        .filter(task::Column::IsActive.eq(true))
        .filter(task::Column::RemainingBudget.gt(0.0))
        .order_by_desc(task::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finds a task by its unique ID.
pub async fn get_task(db: &DatabaseConnection, task_id: i64) -> Result<Option<task::Model>> {
    Task::find_by_id(task_id).one(db).await.map_err(Into::into)
}

/// Claims one payout slot on an active task.
///
/// The decrement only succeeds while the task is active and still holds at
/// least one full reward:
/// `UPDATE tasks SET remaining_budget = remaining_budget - ?, completed_count =
/// completed_count + 1 WHERE id = ? AND is_active AND remaining_budget >= ?`.
/// Zero rows affected means a concurrent claim took the last slot. A follow-up
/// conditional update in the same store transaction retires the task once the
/// budget is exhausted.
pub(crate) async fn claim_slot<C>(db: &C, claimed_task: &task::Model) -> Result<()>
where
    C: ConnectionTrait,
{
    let reward = claimed_task.reward_per_member;

    let claimed = Task::update_many()
        .col_expr(
            task::Column::RemainingBudget,
            Expr::col(task::Column::RemainingBudget).sub(reward),
        )
        .col_expr(
            task::Column::CompletedCount,
            Expr::col(task::Column::CompletedCount).add(1),
        )
        .filter(task::Column::Id.eq(claimed_task.id))
        .filter(task::Column::IsActive.eq(true))
        .filter(task::Column::RemainingBudget.gte(reward))
        .exec(db)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(Error::TaskNotAvailable {
            id: claimed_task.id,
        });
    }

    // Retire the task once nothing is left to pay out
    Task::update_many()
        .set(task::ActiveModel {
            is_active: Set(false),
            ..Default::default()
        })
        .filter(task::Column::Id.eq(claimed_task.id))
        .filter(task::Column::RemainingBudget.lte(0.0))
        .exec(db)
        .await?;

    Ok(())
}
