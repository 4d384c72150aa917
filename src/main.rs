//! Retention worker binary.
//!
//! Boots the platform services (tracing, configuration, database, settings),
//! builds the Telegram adapter, and runs retention sweeps forever.

use dotenvy::dotenv;
use rewards_ledger::{
    config,
    core::{retention, settings},
    errors::{Error, Result},
    telegram::TelegramClient,
};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the platform configuration
    let app_config = config::app::load_default_config()
        .inspect_err(|e| error!("Failed to load config.toml: {e}"))?;
    let platform = app_config.platform;
    info!(
        referral_channel = %platform.referral_channel,
        sweep_interval_secs = platform.sweep_interval_secs,
        "Platform configuration loaded."
    );

    // 4. Initialize the database and runtime settings
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    config::database::create_tables(&db).await?;
    settings::init_settings(&db).await?;
    info!("Database initialized.");

    // 5. Build the Telegram adapter. The token is read here, directly before
    //    use, and never stored in the configuration.
    let token = env::var("TELEGRAM_BOT_TOKEN").map_err(|_| Error::Config {
        message: "TELEGRAM_BOT_TOKEN is not set".to_string(),
    })?;
    let client = Arc::new(TelegramClient::new(&token)?);

    // 6. Run retention sweeps until the process is stopped
    retention::run_retention_loop(db, client.clone(), client, platform).await;

    Ok(())
}
