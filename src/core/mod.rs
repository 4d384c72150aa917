/// Account registration, referral codes, daily bonus, and leaderboards
pub mod account;
/// Promotional banner management
pub mod banner;
/// Completion state machine - membership verification and reward claims
pub mod completion;
/// Balance mutations, audit trail, and deposit/withdrawal settlement
pub mod ledger;
/// Referral bonus release
pub mod referral;
/// Admin statistics aggregated across all collections
pub mod report;
/// Retention auditor - claws back rewards from members who left early
pub mod retention;
/// Runtime-tunable platform settings
pub mod settings;
/// Task lifecycle - funded channel-join offers
pub mod task;
