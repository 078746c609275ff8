//! Daemon configuration

use serde::{Deserialize, Serialize};
use shipit_errors::{ConfigError, Error};
use std::path::Path;
use std::time::Duration;

/// Installer tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerConfig {
    /// Transient-error attempts permitted per phase before aborting.
    #[serde(default = "default_phase_attempt_cap")]
    pub phase_attempt_cap: u32,

    /// Poll interval, in milliseconds, while waiting for the target
    /// application to terminate.
    #[serde(default = "default_termination_poll_ms")]
    pub termination_poll_ms: u64,

    /// Poll interval, in milliseconds, while blocking on the termination
    /// sentinel.
    #[serde(default = "default_sentinel_poll_ms")]
    pub sentinel_poll_ms: u64,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            phase_attempt_cap: default_phase_attempt_cap(),
            termination_poll_ms: default_termination_poll_ms(),
            sentinel_poll_ms: default_sentinel_poll_ms(),
        }
    }
}

/// Network tunables for the downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overall request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Request retries inside the HTTP client.
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            retries: default_retries(),
        }
    }
}

/// Top-level configuration, loaded from TOML with environment overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub installer: InstallerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Config {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<Self, Error> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => toml::from_str(&contents).map_err(|e| {
                ConfigError::ParseFailed {
                    message: e.to_string(),
                }
                .into()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::io_with_path(&e, path)),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is present but unparseable.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(value) = std::env::var("SHIPIT_PHASE_ATTEMPT_CAP") {
            self.installer.phase_attempt_cap =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "SHIPIT_PHASE_ATTEMPT_CAP".into(),
                    message: format!("not an integer: {value}"),
                })?;
        }
        if let Ok(value) = std::env::var("SHIPIT_DOWNLOAD_TIMEOUT") {
            self.network.timeout = value.parse().map_err(|_| ConfigError::InvalidValue {
                field: "SHIPIT_DOWNLOAD_TIMEOUT".into(),
                message: format!("not an integer: {value}"),
            })?;
        }
        Ok(())
    }

    /// Termination poll interval as a `Duration`.
    #[must_use]
    pub fn termination_poll_interval(&self) -> Duration {
        Duration::from_millis(self.installer.termination_poll_ms)
    }

    /// Sentinel poll interval as a `Duration`.
    #[must_use]
    pub fn sentinel_poll_interval(&self) -> Duration {
        Duration::from_millis(self.installer.sentinel_poll_ms)
    }
}

fn default_phase_attempt_cap() -> u32 {
    3
}

fn default_termination_poll_ms() -> u64 {
    500
}

fn default_sentinel_poll_ms() -> u64 {
    250
}

fn default_timeout() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}
