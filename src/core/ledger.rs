//! Ledger business logic - the single place account balances change.
//!
//! Every balance mutation in the platform flows through this module and leaves an
//! audit row in the `transactions` table, so the transaction history fully explains
//! the current balance of every account. Debits are guarded at the store level with
//! a conditional `UPDATE ... WHERE balance >= amount`, which keeps balances
//! non-negative even under concurrent verification, withdrawal, and clawback
//! traffic. Deposit and withdrawal requests settle asynchronously: they are
//! recorded as pending rows and an admin approves or rejects them later.

use crate::{
    entities::{Account, Transaction, TransactionKind, TransactionStatus, account, transaction},
    errors::{Error, Result},
};
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};

/// Optional context attached to an audit row.
///
/// Deposits and withdrawals carry payment details; internal mutations such as
/// retention deductions use `note` to explain themselves in the history view.
#[derive(Debug, Default, Clone)]
pub struct TransactionMeta {
    /// Payment channel chosen by the user (e.g. "bkash", "nagad", "usdt")
    pub method: Option<String>,
    /// Destination wallet for withdrawals
    pub wallet_address: Option<String>,
    /// Reference supplied by the payment provider
    pub external_ref: Option<String>,
    /// Free-form explanation shown in the transaction history
    pub note: Option<String>,
}

impl TransactionMeta {
    /// Convenience constructor for internal mutations that only carry a note.
    #[must_use]
    pub fn note(text: impl Into<String>) -> Self {
        Self {
            note: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Rejects zero, negative, and non-finite amounts.
///
/// Ledger amounts are always positive; the transaction kind decides the
/// direction of the balance change.
fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

/// Inserts an audit row. Callers are responsible for the matching balance change.
async fn record<C>(
    db: &C,
    account_id: i64,
    kind: TransactionKind,
    amount: f64,
    status: TransactionStatus,
    meta: TransactionMeta,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    let row = transaction::ActiveModel {
        account_id: Set(account_id),
        kind: Set(kind),
        amount: Set(amount),
        status: Set(status),
        method: Set(meta.method),
        wallet_address: Set(meta.wallet_address),
        external_ref: Set(meta.external_ref),
        note: Set(meta.note),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    row.insert(db).await.map_err(Into::into)
}

/// Atomically adds `delta` to an account balance.
///
/// Uses a single `UPDATE accounts SET balance = balance + delta WHERE id = ?`
/// statement so concurrent mutations never lose updates. The caller must only
/// pass negative deltas when the decrement has already been guarded.
async fn adjust_balance<C>(db: &C, account_id: i64, delta: f64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let updated = Account::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).add(delta),
        )
        .filter(account::Column::Id.eq(account_id))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::AccountNotFound {
            id: account_id.to_string(),
        });
    }

    Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })
}

/// Atomically subtracts `amount` from an account balance, refusing to go negative.
///
/// The decrement only succeeds when the row still holds enough funds at write
/// time: `UPDATE accounts SET balance = balance - ? WHERE id = ? AND balance >= ?`.
/// When no row matches, the account is re-read to distinguish a missing account
/// from insufficient funds.
async fn debit_guarded<C>(db: &C, account_id: i64, amount: f64) -> Result<account::Model>
where
    C: ConnectionTrait,
{
    let updated = Account::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).sub(amount),
        )
        .filter(account::Column::Id.eq(account_id))
        .filter(account::Column::Balance.gte(amount))
        .exec(db)
        .await?;

    if updated.rows_affected == 0 {
        let existing = Account::find_by_id(account_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::AccountNotFound {
                id: account_id.to_string(),
            })?;
        return Err(Error::InsufficientBalance {
            available: existing.balance,
            required: amount,
        });
    }

    Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })
}

/// Credits an account and records a settled audit row.
///
/// This is the instant-settlement path used for task earnings, referral bonuses,
/// and daily check-in rewards. Generic over the connection so callers can compose
/// it inside a store transaction together with their own conditional writes.
pub async fn credit<C>(
    db: &C,
    account_id: i64,
    amount: f64,
    kind: TransactionKind,
    meta: TransactionMeta,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;

    adjust_balance(db, account_id, amount).await?;
    record(db, account_id, kind, amount, TransactionStatus::Approved, meta).await
}

/// Debits an account and records a settled audit row.
///
/// Fails with [`Error::InsufficientBalance`] instead of driving the balance
/// negative. Used for task funding and retention deductions.
pub async fn debit<C>(
    db: &C,
    account_id: i64,
    amount: f64,
    kind: TransactionKind,
    meta: TransactionMeta,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;

    debit_guarded(db, account_id, amount).await?;
    record(db, account_id, kind, amount, TransactionStatus::Approved, meta).await
}

/// Debits an account without the non-negative guard.
///
/// This is the one named administrative override: admin accounts may fund
/// tasks past their balance, so this path alone is allowed to take a balance
/// below zero. Every other debit goes through [`debit`].
pub async fn debit_unchecked<C>(
    db: &C,
    account_id: i64,
    amount: f64,
    kind: TransactionKind,
    meta: TransactionMeta,
) -> Result<transaction::Model>
where
    C: ConnectionTrait,
{
    validate_amount(amount)?;

    adjust_balance(db, account_id, -amount).await?;
    record(db, account_id, kind, amount, TransactionStatus::Approved, meta).await
}

/// Returns the current balance of an account.
pub async fn get_balance(db: &DatabaseConnection, account_id: i64) -> Result<f64> {
    let account = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })?;
    Ok(account.balance)
}

/// Records a pending deposit request.
///
/// The balance does not change here; it is credited when an admin approves the
/// request after confirming the payment arrived. The minimum deposit amount
/// comes from the runtime settings.
pub async fn request_deposit(
    db: &DatabaseConnection,
    account_id: i64,
    amount: f64,
    meta: TransactionMeta,
) -> Result<transaction::Model> {
    validate_amount(amount)?;

    let minimum = crate::core::settings::get_settings(db)
        .await?
        .min_deposit_amount;
    if amount < minimum {
        return Err(Error::AmountBelowMinimum { amount, minimum });
    }

    // A pending row must never point at a ghost account
    Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })?;

    record(
        db,
        account_id,
        TransactionKind::Deposit,
        amount,
        TransactionStatus::Pending,
        meta,
    )
    .await
}

/// Records a pending withdrawal request, holding the funds immediately.
///
/// The guarded debit and the pending audit row are committed in one store
/// transaction, so the requested amount can never be spent twice while the
/// payout is waiting for admin review. A rejected request refunds the hold.
pub async fn request_withdraw(
    db: &DatabaseConnection,
    account_id: i64,
    amount: f64,
    meta: TransactionMeta,
) -> Result<transaction::Model> {
    validate_amount(amount)?;

    let minimum = crate::core::settings::get_settings(db)
        .await?
        .min_withdraw_amount;
    if amount < minimum {
        return Err(Error::AmountBelowMinimum { amount, minimum });
    }

    let txn = db.begin().await?;

    debit_guarded(&txn, account_id, amount).await?;
    let row = record(
        &txn,
        account_id,
        TransactionKind::Withdraw,
        amount,
        TransactionStatus::Pending,
        meta,
    )
    .await?;

    txn.commit().await?;
    Ok(row)
}

/// Approves a pending deposit or withdrawal.
///
/// The status flip is conditional on the row still being pending, so a request
/// can settle exactly once no matter how many admins click approve. Approving a
/// deposit credits the balance; approving a withdrawal only marks the row, since
/// the funds were already held at request time.
pub async fn approve_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let row = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let flipped = Transaction::update_many()
        .set(transaction::ActiveModel {
            status: Set(TransactionStatus::Approved),
            ..Default::default()
        })
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(&txn)
        .await?;

    if flipped.rows_affected == 0 {
        return Err(Error::TransactionNotPending { id: transaction_id });
    }

    if row.kind == TransactionKind::Deposit {
        adjust_balance(&txn, row.account_id, row.amount).await?;
    }

    txn.commit().await?;

    tracing::info!(
        transaction_id,
        account_id = row.account_id,
        amount = row.amount,
        kind = ?row.kind,
        "transaction approved"
    );

    Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })
}

/// Rejects a pending deposit or withdrawal.
///
/// Rejecting a withdrawal returns the held funds to the account; the rejected
/// row itself stays in the history as the audit trail of the refund. Rejecting
/// a deposit only marks the row, since nothing was credited yet.
pub async fn reject_transaction(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<transaction::Model> {
    let txn = db.begin().await?;

    let row = Transaction::find_by_id(transaction_id)
        .one(&txn)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })?;

    let flipped = Transaction::update_many()
        .set(transaction::ActiveModel {
            status: Set(TransactionStatus::Rejected),
            ..Default::default()
        })
        .filter(transaction::Column::Id.eq(transaction_id))
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(&txn)
        .await?;

    if flipped.rows_affected == 0 {
        return Err(Error::TransactionNotPending { id: transaction_id });
    }

    if row.kind == TransactionKind::Withdraw {
        adjust_balance(&txn, row.account_id, row.amount).await?;
    }

    txn.commit().await?;

    tracing::info!(
        transaction_id,
        account_id = row.account_id,
        amount = row.amount,
        kind = ?row.kind,
        "transaction rejected"
    );

    Transaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::TransactionNotFound { id: transaction_id })
}

/// Retrieves the full transaction history for an account, newest first.
pub async fn get_transactions_for_account(
    db: &DatabaseConnection,
    account_id: i64,
) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::AccountId.eq(account_id))
        .order_by_desc(transaction::Column::CreatedAt)
        .order_by_desc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Retrieves a specific transaction by its unique ID.
pub async fn get_transaction_by_id(
    db: &DatabaseConnection,
    transaction_id: i64,
) -> Result<Option<transaction::Model>> {
    Transaction::find_by_id(transaction_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Retrieves the admin settlement queue: all pending requests, oldest first.
pub async fn get_pending_transactions(db: &DatabaseConnection) -> Result<Vec<transaction::Model>> {
    Transaction::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .order_by_asc(transaction::Column::CreatedAt)
        .order_by_asc(transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
