//! Shared test utilities for the rewards ledger.
//!
//! This module provides common helper functions for setting up test databases,
//! creating accounts and tasks with sensible defaults, and scriptable fakes for
//! the membership oracle and notifier seams.

#![allow(clippy::unwrap_used)]

use crate::{
    config::app::PlatformConfig,
    core::account::{NewAccount, register_account},
    core::settings::init_settings,
    core::task::{NewTask, create_task},
    entities::{Account, account, task},
    errors::{Error, Result},
    oracle::{Membership, MembershipOracle, Notifier},
};
use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection, Set, prelude::*};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

/// Creates an in-memory `SQLite` database with all tables and default settings
/// initialized. This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    init_settings(&db).await?;
    Ok(db)
}

/// Platform configuration used across tests.
///
/// # Defaults
/// * `referral_channel`: `"@rewards_official"`
/// * `admin_telegram_ids`: `["777000"]`
#[must_use]
pub fn test_platform_config() -> PlatformConfig {
    PlatformConfig {
        referral_channel: "@rewards_official".to_string(),
        admin_telegram_ids: vec!["777000".to_string()],
        sweep_interval_secs: 3600,
    }
}

/// Builds a registration payload with sensible defaults.
#[must_use]
pub fn test_new_account(telegram_id: &str, referral_code_used: Option<String>) -> NewAccount {
    NewAccount {
        telegram_id: telegram_id.to_string(),
        first_name: format!("User{telegram_id}"),
        last_name: None,
        username: None,
        photo_url: None,
        referral_code_used,
    }
}

/// Registers a fresh account with a zero balance.
pub async fn create_test_account(
    db: &DatabaseConnection,
    telegram_id: &str,
) -> Result<account::Model> {
    register_account(db, test_new_account(telegram_id, None), &test_platform_config()).await
}

/// Registers the account on the test admin allow-list (`"777000"`).
pub async fn create_admin_account(db: &DatabaseConnection) -> Result<account::Model> {
    create_test_account(db, "777000").await
}

/// Sets an account balance directly, bypassing the ledger and its audit rows.
/// Use this only to arrange test state.
pub async fn set_account_balance(
    db: &DatabaseConnection,
    account_id: i64,
    balance: f64,
) -> Result<()> {
    let mut row: account::ActiveModel = Account::find_by_id(account_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: account_id.to_string(),
        })?
        .into();
    row.balance = Set(balance);
    row.update(db).await?;
    Ok(())
}

/// Registers an account and arranges the given balance on it.
pub async fn create_funded_account(
    db: &DatabaseConnection,
    telegram_id: &str,
    balance: f64,
) -> Result<account::Model> {
    let created = create_test_account(db, telegram_id).await?;
    set_account_balance(db, created.id, balance).await?;
    Account::find_by_id(created.id)
        .one(db)
        .await?
        .ok_or_else(|| Error::AccountNotFound {
            id: created.id.to_string(),
        })
}

/// Sets up a complete test environment with one registered account.
/// Returns (db, account) for common test scenarios.
pub async fn setup_with_account() -> Result<(DatabaseConnection, account::Model)> {
    let db = setup_test_db().await?;
    let account = create_test_account(&db, "100001").await?;
    Ok((db, account))
}

// Distinguishes the creators backing test tasks from ids tests pick themselves
static TASK_CREATOR_SEQ: AtomicU32 = AtomicU32::new(0);

/// Creates an active task backed by its own freshly funded creator account.
///
/// The creator is funded with exactly `total_budget`, so its balance is zero
/// after the escrow.
pub async fn create_test_task(
    db: &DatabaseConnection,
    channel: &str,
    reward_per_member: f64,
    total_budget: f64,
) -> Result<task::Model> {
    let seq = TASK_CREATOR_SEQ.fetch_add(1, Ordering::Relaxed);
    let creator = create_funded_account(db, &format!("creator-{seq}"), total_budget).await?;

    create_task(
        db,
        creator.id,
        NewTask {
            title: format!("Join {channel}"),
            channel: channel.to_string(),
            channel_link: format!("https://t.me/{}", channel.trim_start_matches('@')),
            reward_per_member,
            total_budget,
        },
    )
    .await
}

/// What the fake oracle should answer next.
#[derive(Copy, Clone, Debug)]
pub enum FakeVerdict {
    Member,
    NotMember,
    Unavailable,
}

/// Scriptable membership oracle. Tests flip the verdict mid-scenario with
/// [`FakeOracle::set`], e.g. member at verification time, gone by the sweep.
pub struct FakeOracle {
    verdict: Mutex<FakeVerdict>,
}

impl FakeOracle {
    #[must_use]
    pub fn member() -> Self {
        Self {
            verdict: Mutex::new(FakeVerdict::Member),
        }
    }

    #[must_use]
    pub fn not_member() -> Self {
        Self {
            verdict: Mutex::new(FakeVerdict::NotMember),
        }
    }

    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            verdict: Mutex::new(FakeVerdict::Unavailable),
        }
    }

    pub fn set(&self, verdict: FakeVerdict) {
        *self.verdict.lock().unwrap() = verdict;
    }
}

#[async_trait]
impl MembershipOracle for FakeOracle {
    async fn is_member(&self, _channel: &str, _telegram_id: &str) -> Result<Membership> {
        match *self.verdict.lock().unwrap() {
            FakeVerdict::Member => Ok(Membership::Member),
            FakeVerdict::NotMember => Ok(Membership::NotMember),
            FakeVerdict::Unavailable => Err(Error::OracleUnavailable {
                reason: "scripted outage".to_string(),
            }),
        }
    }
}

/// Notifier that records every message instead of delivering it.
#[derive(Default)]
pub struct CountingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl CountingNotifier {
    /// Returns the (`telegram_id`, text) pairs sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn send(&self, telegram_id: &str, text: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((telegram_id.to_string(), text.to_string()));
        Ok(())
    }
}

/// Notifier whose every delivery fails, for exercising best-effort call sites.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _telegram_id: &str, _text: &str) -> Result<()> {
        Err(Error::Notify("scripted delivery failure".to_string()))
    }
}
