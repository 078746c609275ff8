//! Tracing setup for the daemon
//!
//! Three sinks: the process stderr for interactive runs, and the append-only
//! `shipit.stdout` / `shipit.stderr` streams in the state directory that
//! survive across invocations. Warnings and errors go to the stderr stream,
//! everything else to the stdout stream.

use shipit_config::DirectoryManager;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the subscriber. The returned guards flush the file streams on
/// drop and must live until process exit.
pub fn init(dirs: &DirectoryManager, debug: bool) -> Vec<WorkerGuard> {
    let state_dir = dirs.state_directory();
    let _ = std::fs::create_dir_all(&state_dir);

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(&state_dir, "shipit.stdout"),
    );
    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(
        tracing_appender::rolling::never(&state_dir, "shipit.stderr"),
    );

    let default_level = if debug { "debug" } else { "info" };
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(stdout_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::INFO),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(stderr_writer)
                .with_ansi(false)
                .with_filter(LevelFilter::WARN),
        )
        .init();

    vec![stdout_guard, stderr_guard]
}
