//! Database configuration module for the rewards ledger.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! It provides functions for establishing database connections and creating all necessary
//! tables based on the entity definitions. The module uses `SeaORM`'s
//! `Schema::create_table_from_entity` method to automatically generate SQL statements from
//! the entity models, so the database schema matches the Rust struct definitions without
//! requiring manual SQL. Table creation is idempotent and safe to run on every startup.

use crate::entities::{
    Account, AppSettings, Banner, Completion, CompletionColumn, Task, Transaction,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://data/rewards_ledger.sqlite".to_string())
}

/// Establishes a connection to the `SQLite` database using the `DATABASE_URL` environment variable.
///
/// Falls back to a default local `SQLite` file if no environment variable is set.
/// This function handles connection errors and provides a clean interface for database access
/// throughout the application.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();

    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Every statement carries `IF NOT EXISTS`, so this can run unconditionally on startup.
/// Besides the six tables, this creates the unique index on
/// `completions (task_id, account_id)` that guarantees at most one completion row
/// per account and task even under concurrent verification attempts.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let account_table = schema
        .create_table_from_entity(Account)
        .if_not_exists()
        .to_owned();
    let task_table = schema
        .create_table_from_entity(Task)
        .if_not_exists()
        .to_owned();
    let completion_table = schema
        .create_table_from_entity(Completion)
        .if_not_exists()
        .to_owned();
    let transaction_table = schema
        .create_table_from_entity(Transaction)
        .if_not_exists()
        .to_owned();
    let settings_table = schema
        .create_table_from_entity(AppSettings)
        .if_not_exists()
        .to_owned();
    let banner_table = schema
        .create_table_from_entity(Banner)
        .if_not_exists()
        .to_owned();

    db.execute(builder.build(&account_table)).await?;
    db.execute(builder.build(&task_table)).await?;
    db.execute(builder.build(&completion_table)).await?;
    db.execute(builder.build(&transaction_table)).await?;
    db.execute(builder.build(&settings_table)).await?;
    db.execute(builder.build(&banner_table)).await?;

    let completion_unique = Index::create()
        .if_not_exists()
        .name("idx_completions_task_account")
        .table(Completion)
        .col(CompletionColumn::TaskId)
        .col(CompletionColumn::AccountId)
        .unique()
        .to_owned();

    db.execute(builder.build(&completion_unique)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::{
        account::Model as AccountModel, app_settings::Model as AppSettingsModel,
        banner::Model as BannerModel, completion, completion::Model as CompletionModel,
        task::Model as TaskModel, transaction::Model as TransactionModel, CompletionStatus,
    };
    use sea_orm::{ActiveModelTrait, ActiveValue::NotSet, EntityTrait, QuerySelect, Set, SqlErr};

    /// Tests the database connection by executing a simple query
    async fn test_connection(db: &DatabaseConnection) -> Result<()> {
        let _: Vec<AccountModel> = Account::find().limit(1).all(db).await?;
        Ok(())
    }

    fn pending_completion(task_id: i64, account_id: i64) -> completion::ActiveModel {
        completion::ActiveModel {
            id: NotSet,
            task_id: Set(task_id),
            account_id: Set(account_id),
            status: Set(CompletionStatus::Pending),
            reward_amount: Set(None),
            verified_at: Set(None),
            retention_checked: Set(false),
            deducted: Set(false),
            created_at: Set(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn test_create_connection() -> Result<()> {
        // Use in-memory database for testing to avoid touching a real database file
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        test_connection(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<AccountModel> = Account::find().limit(1).all(&db).await?;
        let _: Vec<TaskModel> = Task::find().limit(1).all(&db).await?;
        let _: Vec<CompletionModel> = Completion::find().limit(1).all(&db).await?;
        let _: Vec<TransactionModel> = Transaction::find().limit(1).all(&db).await?;
        let _: Vec<AppSettingsModel> = AppSettings::find().limit(1).all(&db).await?;
        let _: Vec<BannerModel> = Banner::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        // Second run must not fail on already-existing tables or indexes
        create_tables(&db).await?;

        test_connection(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_completion_unique_index_rejects_duplicates() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        pending_completion(1, 1).insert(&db).await?;
        // Same account may complete a different task
        pending_completion(2, 1).insert(&db).await?;

        let duplicate = pending_completion(1, 1).insert(&db).await;
        let err = duplicate.unwrap_err();
        assert!(matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
        ));

        Ok(())
    }
}
