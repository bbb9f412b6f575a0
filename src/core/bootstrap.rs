//! Purpose: Bring the hosted runtime up and down through the engine seam.
//! Exports: `RuntimeHandle`, `start_runtime`, `stop_runtime`, `runtime_options`.
//! Role: Third step of the launch sequence and the whole shutdown path.
//! Invariants: Each step is attempted once; the first fatal failure aborts start.
//! Invariants: Start and stop resolve their entry point by name every time.
//! Invariants: Stop attaches the calling thread before resolving anything.
use std::ffi::OsString;
use std::sync::Arc;

use crate::core::config::LauncherConfig;
use crate::core::engine::{
    EngineError, EngineLibrary, EngineLoader, REDUCE_SIGNALS_FLAG, RuntimeInstance, START, STOP,
};
use crate::core::error::{Error, ErrorKind};
use crate::core::search_path::SearchPath;

/// The live runtime instance and the engine library it was created from.
///
/// Dropping the handle never unloads the engine; see `EngineLoader`.
pub struct RuntimeHandle {
    instance: Arc<dyn RuntimeInstance>,
    _library: Box<dyn EngineLibrary>,
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle").finish_non_exhaustive()
    }
}

/// Options passed to instance creation, in order.
pub fn runtime_options(search_path: &SearchPath) -> Vec<OsString> {
    vec![search_path.option(), OsString::from(REDUCE_SIGNALS_FLAG)]
}

pub fn start_runtime(
    loader: &dyn EngineLoader,
    config: &LauncherConfig,
    search_path: &SearchPath,
) -> Result<RuntimeHandle, Error> {
    let engine_path = config.engine_library();
    let library = loader.load(engine_path).map_err(|err| {
        tracing::error!(path = %engine_path.display(), error = %err, "unable to load engine library");
        bootstrap_error(ErrorKind::EngineLoadFailed, err)
            .with_path(engine_path)
            .with_hint("Check that JVM_Location names a runtime library for this architecture.")
    })?;

    let instance = library
        .create_instance(&runtime_options(search_path))
        .map_err(|err| {
            let kind = match err {
                EngineError::SymbolMissing { .. } => ErrorKind::EntryPointMissing,
                _ => ErrorKind::CreateFailed,
            };
            tracing::error!(error = %err, "failed to create runtime instance");
            bootstrap_error(kind, err).with_path(engine_path)
        })?;
    tracing::info!("created runtime instance");

    {
        let mut thread = instance.attach().map_err(|err| {
            tracing::error!(error = %err, "unable to attach to new runtime instance");
            bootstrap_error(ErrorKind::CreateFailed, err)
        })?;
        thread.call_static(&START).map_err(|err| {
            let kind = match err {
                EngineError::ClassNotFound { .. } => ErrorKind::ClassNotFound,
                EngineError::MethodNotFound { .. } | EngineError::SymbolMissing { .. } => {
                    ErrorKind::MethodNotFound
                }
                _ => ErrorKind::StartupFault,
            };
            tracing::error!(entry = %START, error = %err, "runtime start failed");
            bootstrap_error(kind, err)
        })?;
    }

    tracing::info!(entry = %START, "started up rig client");
    Ok(RuntimeHandle {
        instance,
        _library: library,
    })
}

/// Calls the shutdown entry point; failures are returned for reporting only.
pub fn stop_runtime(handle: &RuntimeHandle) -> Result<(), Error> {
    let mut thread = handle.instance.attach().map_err(|err| {
        tracing::error!(error = %err, "unable to attach to runtime for shutdown");
        bootstrap_error(ErrorKind::ShutdownFault, err)
    })?;

    tracing::info!(entry = %STOP, "calling shutdown");
    thread.call_static(&STOP).map_err(|err| {
        let kind = match err {
            EngineError::ClassNotFound { .. }
            | EngineError::MethodNotFound { .. }
            | EngineError::SymbolMissing { .. } => ErrorKind::MethodNotFound,
            _ => ErrorKind::ShutdownFault,
        };
        tracing::error!(entry = %STOP, error = %err, "runtime shutdown failed");
        bootstrap_error(kind, err)
    })
}

fn bootstrap_error(kind: ErrorKind, err: EngineError) -> Error {
    Error::new(kind).with_message(err.to_string()).with_source(err)
}
