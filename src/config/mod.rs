/// Database configuration and connection management
pub mod database;

/// Platform configuration loading from config.toml
pub mod app;
