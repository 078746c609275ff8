//! shipit - crash-tolerant update installer daemon
//!
//! Launched with no arguments; the application identity comes from the
//! environment. The daemon looks for a request record at the well-known
//! per-application location, resumes any in-progress installation recorded
//! there, and exits 0 when there is nothing to do.

mod cli;
mod events;
mod logging;

use crate::cli::Cli;
use clap::Parser;
use shipit_config::{Config, DirectoryManager};
use shipit_errors::Result;
use shipit_installer::Installer;
use shipit_signature::CodesignVerifier;
use shipit_state::{InstanceLock, StateStore};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let dirs = match directories(&cli) {
        Ok(dirs) => dirs,
        Err(e) => {
            eprintln!("shipit: {}: {e}", e.discriminator());
            process::exit(1);
        }
    };

    let _log_guards = logging::init(&dirs, cli.debug);

    match run(&cli, dirs).await {
        Ok(true) => info!("installation finished"),
        Ok(false) => info!("no request or state present, nothing to do"),
        Err(e) => {
            // The discriminator line is part of the daemon's interface;
            // clients grep for it.
            error!(discriminator = e.discriminator(), "{e}");
            eprintln!("shipit: {}: {e}", e.discriminator());
            process::exit(1);
        }
    }
}

fn directories(cli: &Cli) -> Result<DirectoryManager> {
    match &cli.state_root {
        Some(root) => Ok(DirectoryManager::new(&cli.app_id, root)),
        None => DirectoryManager::for_application(&cli.app_id),
    }
}

async fn run(cli: &Cli, dirs: DirectoryManager) -> Result<bool> {
    info!(
        app_id = %dirs.app_identifier(),
        state_dir = %dirs.state_directory().display(),
        "shipit v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    dirs.ensure_directories().await?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| dirs.state_directory().join("shipit.toml"));
    let mut config = Config::load_or_default(&config_path).await?;
    config.merge_env()?;

    // One daemon per application; a concurrent invocation exits loudly
    // rather than racing the state records.
    let _lock = InstanceLock::acquire(&dirs.lock_file()).await?;

    let (tx, mut rx) = shipit_events::channel();
    let event_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            events::log_event(&event);
        }
    });

    let store = StateStore::new(dirs);
    let installer = Installer::new(store, Arc::new(CodesignVerifier::new()), config).with_events(tx);

    let result = installer.run_pending().await;

    // The sender inside the installer is dropped with it; drain the bridge.
    drop(installer);
    let _ = event_task.await;

    result
}
