//! Well-known file names inside the per-application state directory
//!
//! These names are part of the on-disk contract between client processes,
//! the watcher, and the installer daemon. They are deliberately not
//! configurable.

/// Serialized installer state record.
pub const STATE_FILE: &str = "shipit_state";

/// Serialized update request written by clients.
pub const REQUEST_FILE: &str = "shipit_request";

/// Single-instance lock file.
pub const LOCK_FILE: &str = "shipit.lock";

/// Sentinel written by the user-context watcher once the target application
/// has terminated.
pub const SENTINEL_FILE: &str = "shipit_target_terminated";

/// Directory holding resumable download records and partial files.
pub const DOWNLOADS_DIR: &str = "downloads";

/// Daemon log streams, append-only.
pub const STDOUT_LOG: &str = "shipit.stdout";
pub const STDERR_LOG: &str = "shipit.stderr";

/// Environment variable overriding the state root (used by tests and
/// embedders).
pub const STATE_ROOT_ENV: &str = "SHIPIT_STATE_ROOT";
