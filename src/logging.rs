//! Purpose: Route `tracing` events to the launcher's append-only log file.
//! Exports: `LogSink`, `init_logging`.
//! Role: Called once by `main` before any launch step runs.
//! Invariants: The log file is opened in append mode and never rotated or truncated.
//! Invariants: Failure to open the file falls back to stderr instead of aborting.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum LogSink {
    File(PathBuf),
    Stderr,
}

pub(crate) fn init_logging(path: &Path) -> LogSink {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(false)
        .with_target(false);

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let _ = builder.with_writer(Mutex::new(file)).try_init();
            LogSink::File(path.to_path_buf())
        }
        Err(err) => {
            let _ = builder.with_writer(std::io::stderr).try_init();
            tracing::warn!(path = %path.display(), error = %err, "unable to open log file; logging to stderr");
            LogSink::Stderr
        }
    }
}
