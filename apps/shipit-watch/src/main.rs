//! shipit-watch - user-context termination watcher
//!
//! The installer daemon may run with elevated privileges, where enumerating
//! GUI processes is unavailable. This helper runs in the logged-in user's
//! session instead: it reads the pending request, waits until every matching
//! instance of the target application has terminated, and writes the
//! sentinel file the daemon blocks on. The filesystem is the only channel
//! the two processes share.

use clap::Parser;
use shipit_config::{Config, DirectoryManager};
use shipit_errors::Result;
use shipit_installer::termination;
use shipit_state::StateStore;
use std::path::PathBuf;
use std::process;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "shipit-watch",
    version,
    about = "Signals target termination to the installer daemon"
)]
struct Cli {
    /// Application identifier the state directory is scoped by
    #[arg(long, env = "SHIPIT_APP_ID")]
    app_id: String,

    /// Override the state root directory
    #[arg(long, env = "SHIPIT_STATE_ROOT")]
    state_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("shipit-watch: {}: {e}", e.discriminator());
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let dirs = match cli.state_root {
        Some(root) => DirectoryManager::new(&cli.app_id, root),
        None => DirectoryManager::for_application(&cli.app_id)?,
    };

    let store = StateStore::new(dirs.clone());

    // The watch subject comes from whatever work is pending on disk.
    let request = if let Some(state) = store.load_state().await? {
        state.request
    } else if let Some(request) = store.load_request().await? {
        request
    } else {
        info!("no request or state present, nothing to watch");
        return Ok(());
    };

    let Some(identifier) = request.bundle_identifier.clone() else {
        info!("request names no bundle identifier, nothing to watch");
        return Ok(());
    };

    let config_path = dirs.state_directory().join("shipit.toml");
    let mut config = Config::load_or_default(&config_path).await?;
    config.merge_env()?;

    termination::watch_and_signal(&config, &dirs, &identifier, &request.target_bundle_path).await
}
