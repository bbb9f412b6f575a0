//! Purpose: Hold top-level CLI command dispatch for `rigclient-service`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: The foreground run drives the same service state machine as service control.
//! Invariants: `check` never loads the engine library.

use std::ffi::OsString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use signal_hook::consts::{SIGINT, SIGTERM};

use rigclient_service::core::engine::JniEngineLoader;
use rigclient_service::core::service::{ControlCode, LogReporter, ServiceHost, prepare};

use super::*;

const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub(super) fn dispatch_command(
    command: Command,
    plan: LaunchPlan,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Run => run_foreground(plan),
        Command::Check => {
            let (config, search_path) = prepare(&plan)?;
            let report = CheckReport {
                workdir: plan.workdir.display().to_string(),
                engine_library: config.engine_library().display().to_string(),
                extra_libraries: lossy_all(config.extra_libraries()),
                search_path: lossy_all(search_path.entries()),
                option: search_path.option().to_string_lossy().into_owned(),
            };
            emit_json(&report)?;
            Ok(RunOutcome::ok())
        }
        Command::Install | Command::Uninstall => {
            let verb = if matches!(command, Command::Install) {
                "install"
            } else {
                "uninstall"
            };
            tracing::warn!(verb, service = SERVICE_NAME, "service registration requested");
            Err(Error::new(ErrorKind::ServiceInit)
                .with_message(format!("{verb} of the {SERVICE_NAME} service is not supported by this build"))
                .with_hint("Register the launcher with the platform service manager (sc.exe, systemd) instead."))
        }
    }
}

/// JSON view of a prepared launch; non-UTF-8 bytes show as U+FFFD.
#[derive(Serialize)]
struct CheckReport {
    workdir: String,
    engine_library: String,
    extra_libraries: Vec<String>,
    search_path: Vec<String>,
    option: String,
}

fn lossy_all(values: &[OsString]) -> Vec<String> {
    values
        .iter()
        .map(|value| value.to_string_lossy().into_owned())
        .collect()
}

fn run_foreground(plan: LaunchPlan) -> Result<RunOutcome, Error> {
    let stop = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&stop)).map_err(|err| {
            Error::new(ErrorKind::ServiceInit)
                .with_message("failed to install shutdown signal handler")
                .with_source(err)
        })?;
    }

    let mut host = ServiceHost::new(JniEngineLoader, LogReporter, plan);
    host.handle_control(ControlCode::Start)?;
    println!("Started up rig client...");

    // No timeout: the launcher lives as long as the hosted runtime.
    while !stop.load(Ordering::Acquire) {
        thread::sleep(SHUTDOWN_POLL);
    }
    tracing::info!("shutdown signal received");

    host.handle_control(ControlCode::Stop)?;
    Ok(RunOutcome::ok())
}
