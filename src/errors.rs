//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Variants carry
//! the context a caller needs to react: terminal answers (`NotMember`,
//! `InsufficientBalance`) are distinct from transient ones
//! (`OracleUnavailable`, `ConcurrentModification`), because "could not ask"
//! must never be treated as "asked and got no".

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: f64 },

    #[error("Amount {amount:.2} is below the minimum of {minimum:.2}")]
    AmountBelowMinimum { amount: f64, minimum: f64 },

    #[error("Insufficient balance: have {available:.2}, need {required:.2}")]
    InsufficientBalance { available: f64, required: f64 },

    #[error("Account not found: {id}")]
    AccountNotFound { id: String },

    #[error("Task not found: {id}")]
    TaskNotFound { id: i64 },

    /// The task is closed, out of budget, or lost its last slot to a
    /// concurrent verification.
    #[error("Task {id} is not available")]
    TaskNotAvailable { id: i64 },

    /// A second verification attempt after a verified completion. Idempotent
    /// no-op for the caller, not a fault.
    #[error("Task {task_id} already completed by account {account_id}")]
    AlreadyCompleted { task_id: i64, account_id: i64 },

    #[error("Not a member of {channel}")]
    NotMember { channel: String },

    /// The membership oracle could not be reached or gave an unusable
    /// answer. Transient; retry later.
    #[error("Membership oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    /// A conflicting write was detected and internal retries were exhausted.
    #[error("Concurrent modification detected")]
    ConcurrentModification,

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: i64 },

    /// Approval or rejection of a transaction that has already been settled.
    #[error("Transaction {id} is not pending")]
    TransactionNotPending { id: i64 },

    #[error("Daily bonus already claimed; next claim at {next_claim_at}")]
    DailyBonusNotReady { next_claim_at: DateTime<Utc> },

    #[error("Could not generate a unique referral code")]
    ReferralCodeExhausted,

    #[error("Notification error: {0}")]
    Notify(String),
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
