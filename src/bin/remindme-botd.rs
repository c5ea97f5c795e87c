use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use nostr_sdk::Keys;

use remindme::config::Config;
use remindme::daemon::Daemon;
use remindme::domains::identity::PublicKey;
use remindme::error::{RemindMeError, Result};
use remindme::interfaces::clock::SystemClock;
use remindme::reminders::ReminderStore;
use remindme::services::relay::RelayTransport;

#[derive(Parser, Debug)]
#[command(name = "remindme-botd")]
#[command(about = "Nostr reminder bot daemon")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("REMINDME_GIT_SHA"), ")"))]
struct Cli {
    /// Bot secret key, nsec or hex.
    #[arg(long, env = "REMINDME_NSEC", hide_env_values = true)]
    nsec: String,

    #[arg(long, env = "REMINDME_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "REMINDME_DB")]
    db: Option<String>,

    /// Replaces the configured relay list.
    #[arg(long = "relay")]
    relays: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    remindme::logging::init_tracing("remindme_botd");
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = Some(db);
    }
    if !cli.relays.is_empty() {
        config.relays = cli.relays;
    }
    config.validate()?;

    let keys = Keys::parse(cli.nsec.trim())
        .map_err(|e| RemindMeError::Identity(format!("invalid secret key: {e}")))?;
    let identity = PublicKey::from_hex(&keys.public_key().to_hex())?;
    let npub = identity.to_npub()?;
    tracing::info!(
        npub = %npub,
        build = env!("REMINDME_GIT_SHA"),
        "Starting reminder bot"
    );

    let store = Arc::new(ReminderStore::new(config.db_path()).await?);
    let transport = Arc::new(RelayTransport::new(keys));
    transport.connect(&config.relays).await?;
    tokio::time::sleep(config.startup_delay()).await;

    let mut daemon = Daemon::new(
        &config,
        identity,
        store,
        transport.clone(),
        Arc::new(SystemClock),
    );
    daemon.start();

    let intake = daemon.intake();
    tokio::select! {
        result = transport.listen(&identity, config.lookback_secs, intake) => {
            if let Err(err) = result {
                tracing::error!("Relay listener stopped: {}", err);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                tracing::warn!("Signal handler failed: {}", err);
            }
            tracing::info!("Shutdown requested");
        }
    }

    daemon.stop().await;
    transport.disconnect().await;
    Ok(())
}
