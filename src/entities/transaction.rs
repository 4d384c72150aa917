//! Transaction entity - Append-only audit record of every balance mutation.
//!
//! Amounts are always stored positive; the direction of money movement is
//! implied by `kind`. Rows are immutable once created, with one exception:
//! deposit and withdraw rows start `Pending` and settle exactly once to
//! `Approved` or `Rejected`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What kind of balance mutation a transaction records.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
pub enum TransactionKind {
    /// Money in from an external payment, pending admin approval
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Money out to an external wallet, held immediately, pending approval
    #[sea_orm(string_value = "withdraw")]
    Withdraw,
    /// Reward for a verified channel join
    #[sea_orm(string_value = "task_earning")]
    TaskEarning,
    /// Budget taken from a creator to fund a task
    #[sea_orm(string_value = "task_creation")]
    TaskCreation,
    /// One-time payout to a referrer
    #[sea_orm(string_value = "referral_bonus")]
    ReferralBonus,
    /// Daily check-in reward
    #[sea_orm(string_value = "daily_bonus")]
    DailyBonus,
    /// Retention clawback for leaving a channel early
    #[sea_orm(string_value = "deduction")]
    Deduction,
}

/// Settlement state of a transaction. Only deposits and withdrawals ever
/// pass through `Pending`; every other kind is written `Approved`.
#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum TransactionStatus {
    /// Awaiting an administrative decision
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Settled in favour of the account
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Settled against the account
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Transaction database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    /// Unique identifier for the transaction
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Account whose balance this row documents
    pub account_id: i64,
    /// Kind of mutation; implies the direction of the amount
    pub kind: TransactionKind,
    /// Magnitude of the mutation, always positive
    pub amount: f64,
    /// Settlement state
    pub status: TransactionStatus,
    /// Payment method for deposits/withdrawals (e.g. a wallet provider)
    pub method: Option<String>,
    /// Destination wallet for withdrawals
    pub wallet_address: Option<String>,
    /// External payment-processor reference for deposits
    pub external_ref: Option<String>,
    /// Free-text audit note; deductions record their cause here
    pub note: Option<String>,
    /// When the transaction was created
    pub created_at: DateTimeUtc,
}

/// Task/account ids on other entities are weak references resolved at read
/// time; the store enforces no relational constraints.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
