//! Entity module - Contains all SeaORM entity definitions for the database.
//! Each entity has a Model struct for data and an Entity struct for operations.
//!
//! Ids that point across tables (`creator_id`, `task_id`, `account_id`,
//! `referred_by`) are weak references: the schema carries no foreign key
//! constraints, matching the keyed-store model. Readers must tolerate
//! dangling ids; the retention auditor counts them as orphans and skips them.

pub mod account;
pub mod app_settings;
pub mod banner;
pub mod completion;
pub mod task;
pub mod transaction;

// Re-export specific types to avoid conflicts
pub use account::{Column as AccountColumn, Entity as Account, Model as AccountModel};
pub use app_settings::{
    Column as AppSettingsColumn, Entity as AppSettings, Model as AppSettingsModel,
};
pub use banner::{Column as BannerColumn, Entity as Banner, Model as BannerModel};
pub use completion::{
    Column as CompletionColumn, CompletionStatus, Entity as Completion, Model as CompletionModel,
};
pub use task::{Column as TaskColumn, Entity as Task, Model as TaskModel};
pub use transaction::{
    Column as TransactionColumn, Entity as Transaction, Model as TransactionModel,
    TransactionKind, TransactionStatus,
};
