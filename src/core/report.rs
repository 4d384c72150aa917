//! Platform-wide statistics for the admin dashboard.

use crate::{
    entities::{
        Account, Task, Transaction, TransactionKind, TransactionStatus, task, transaction,
    },
    errors::Result,
};
use sea_orm::{Condition, PaginatorTrait, prelude::*};

/// Headline numbers for the admin dashboard.
///
/// Money fields sum settled rows only; pending requests are counted, not
/// summed, because their amounts are not yet real.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminStats {
    pub total_users: u64,
    /// Sum of approved deposit amounts
    pub total_deposits: f64,
    /// Sum of approved withdrawal amounts
    pub total_withdrawals: f64,
    pub pending_deposits: u64,
    pub pending_withdrawals: u64,
    pub active_tasks: u64,
}

/// Computes the current platform statistics.
pub async fn admin_stats(db: &DatabaseConnection) -> Result<AdminStats> {
    let total_users = Account::find().count(db).await?;

    // Sums stay in application code; the approved wallet rows are few
    // compared to earning and deduction traffic.
    let settled = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Approved))
        .filter(
            Condition::any()
                .add(transaction::Column::Kind.eq(TransactionKind::Deposit))
                .add(transaction::Column::Kind.eq(TransactionKind::Withdraw)),
        )
        .all(db)
        .await?;

    let total_deposits = settled
        .iter()
        .filter(|row| row.kind == TransactionKind::Deposit)
        .map(|row| row.amount)
        .sum();
    let total_withdrawals = settled
        .iter()
        .filter(|row| row.kind == TransactionKind::Withdraw)
        .map(|row| row.amount)
        .sum();

    let pending_deposits = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .filter(transaction::Column::Kind.eq(TransactionKind::Deposit))
        .count(db)
        .await?;
    let pending_withdrawals = Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .filter(transaction::Column::Kind.eq(TransactionKind::Withdraw))
        .count(db)
        .await?;

    let active_tasks = Task::find()
        .filter(task::Column::IsActive.eq(true))
        .count(db)
        .await?;

    Ok(AdminStats {
        total_users,
        total_deposits,
        total_withdrawals,
        pending_deposits,
        pending_withdrawals,
        active_tasks,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::ledger::{
        TransactionMeta, approve_transaction, reject_transaction, request_deposit,
        request_withdraw,
    };
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_stats_on_empty_platform() -> Result<()> {
        let db = setup_test_db().await?;

        let stats = admin_stats(&db).await?;

        assert_eq!(
            stats,
            AdminStats {
                total_users: 0,
                total_deposits: 0.0,
                total_withdrawals: 0.0,
                pending_deposits: 0,
                pending_withdrawals: 0,
                active_tasks: 0,
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_stats_counts_and_sums() -> Result<()> {
        let db = setup_test_db().await?;
        let saver = create_funded_account(&db, "7001", 200.0).await?;
        let spender = create_test_account(&db, "7002").await?;

        // Settled deposit of 40 plus one still pending
        let deposit = request_deposit(&db, spender.id, 40.0, TransactionMeta::default()).await?;
        approve_transaction(&db, deposit.id).await?;
        request_deposit(&db, spender.id, 15.0, TransactionMeta::default()).await?;

        // Settled withdrawal of 50 plus one still pending
        let withdraw = request_withdraw(&db, saver.id, 50.0, TransactionMeta::default()).await?;
        approve_transaction(&db, withdraw.id).await?;
        request_withdraw(&db, saver.id, 60.0, TransactionMeta::default()).await?;

        // Brings its own funded creator, so the user count rises by one
        create_test_task(&db, "@daily_news", 2.5, 60.0).await?;

        let stats = admin_stats(&db).await?;

        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.total_deposits, 40.0);
        assert_eq!(stats.total_withdrawals, 50.0);
        assert_eq!(stats.pending_deposits, 1);
        assert_eq!(stats.pending_withdrawals, 1);
        assert_eq!(stats.active_tasks, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_stats_ignore_rejected_requests() -> Result<()> {
        let db = setup_test_db().await?;
        let account = create_funded_account(&db, "7003", 100.0).await?;

        let deposit = request_deposit(&db, account.id, 30.0, TransactionMeta::default()).await?;
        reject_transaction(&db, deposit.id).await?;
        let withdraw = request_withdraw(&db, account.id, 70.0, TransactionMeta::default()).await?;
        reject_transaction(&db, withdraw.id).await?;

        let stats = admin_stats(&db).await?;

        assert_eq!(stats.total_deposits, 0.0);
        assert_eq!(stats.total_withdrawals, 0.0);
        assert_eq!(stats.pending_deposits, 0);
        assert_eq!(stats.pending_withdrawals, 0);

        Ok(())
    }
}
