//! Purpose: Library crate behind the `rigclient-service` launcher binary and its tests.
//! Exports: `core` (config loading, search path, engine seam, bootstrap, service host).
//! Role: Holds every launch step so the binary stays a thin CLI shell.
//! Invariants: Launch state lives in explicit values passed between steps, never in globals.
//! Invariants: Each external resource (file, library, symbol) is attempted once per run.
pub mod core;

pub use crate::core::error::{Error, ErrorKind, to_exit_code};
