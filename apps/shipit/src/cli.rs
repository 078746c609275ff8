//! Command-line interface for the daemon
//!
//! The daemon is designed to be launched by a job scheduler with no
//! arguments; everything here has an environment fallback so flags are only
//! needed for manual invocation and tests.

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "shipit", version, about = "Crash-tolerant update installer daemon")]
pub struct Cli {
    /// Application identifier the state directory is scoped by
    #[arg(long, env = "SHIPIT_APP_ID")]
    pub app_id: String,

    /// Override the state root directory
    #[arg(long, env = "SHIPIT_STATE_ROOT")]
    pub state_root: Option<PathBuf>,

    /// Path to a TOML config file (default: <state-dir>/shipit.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "SHIPIT_DEBUG")]
    pub debug: bool,
}
