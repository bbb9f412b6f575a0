//! Purpose: Service-host state machine driving the launch sequence from control codes.
//! Exports: `ServiceHost`, `ServiceState`, `ControlCode`, `StatusReporter`, `LogReporter`,
//! `LaunchPlan`, `prepare`.
//! Role: Shared entry point for OS service control and the foreground CLI run.
//! Invariants: Stopped is both the initial and the terminal state.
//! Invariants: Running is only entered after `start_runtime` succeeds.
//! Invariants: Stop always ends in Stopped, whatever the shutdown entry point does.
use std::path::{Path, PathBuf};

use crate::core::bootstrap::{RuntimeHandle, start_runtime, stop_runtime};
use crate::core::config::LauncherConfig;
use crate::core::engine::EngineLoader;
use crate::core::error::{Error, ErrorKind};
use crate::core::search_path::SearchPath;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServiceState {
    Stopped,
    StartPending,
    Running,
    StopPending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControlCode {
    Start,
    Stop,
}

/// Where the start transition runs from and what it loads.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LaunchPlan {
    pub workdir: PathBuf,
    pub config_path: PathBuf,
}

/// Status sink towards whatever controls the service.
pub trait StatusReporter {
    fn report(&mut self, state: ServiceState);
    fn report_start_failure(&mut self, err: &Error);
}

/// Reporter for runs without a service manager: status changes only go to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn report(&mut self, state: ServiceState) {
        tracing::info!(?state, "service state");
    }

    fn report_start_failure(&mut self, err: &Error) {
        tracing::error!(kind = ?err.kind(), error = %err, "service failed to start");
    }
}

/// Enters the plan's working directory, loads the config and builds the search path.
pub fn prepare(plan: &LaunchPlan) -> Result<(LauncherConfig, SearchPath), Error> {
    enter_directory(&plan.workdir)?;
    let config = LauncherConfig::load(&plan.config_path)?;
    let search_path = SearchPath::build(&config)?;
    Ok((config, search_path))
}

fn enter_directory(dir: &Path) -> Result<(), Error> {
    tracing::info!(dir = %dir.display(), "setting current working directory");
    std::env::set_current_dir(dir).map_err(|err| {
        Error::new(ErrorKind::ServiceInit)
            .with_message("unable to enter working directory")
            .with_path(dir)
            .with_source(err)
    })
}

pub struct ServiceHost<L, R> {
    loader: L,
    reporter: R,
    plan: LaunchPlan,
    state: ServiceState,
    runtime: Option<RuntimeHandle>,
}

impl<L: EngineLoader, R: StatusReporter> ServiceHost<L, R> {
    pub fn new(loader: L, reporter: R, plan: LaunchPlan) -> Self {
        Self {
            loader,
            reporter,
            plan,
            state: ServiceState::Stopped,
            runtime: None,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Applies one control code and returns the resulting state.
    pub fn handle_control(&mut self, code: ControlCode) -> Result<ServiceState, Error> {
        match (code, self.state) {
            (ControlCode::Start, ServiceState::Stopped) => self.start(),
            (ControlCode::Stop, ServiceState::Running) => Ok(self.stop()),
            (ControlCode::Stop, _) => Err(Error::new(ErrorKind::NotStarted)
                .with_message("stop requested but the runtime is not running")),
            (ControlCode::Start, state) => Err(Error::new(ErrorKind::InvalidTransition)
                .with_message(format!("start requested while {state:?}"))),
        }
    }

    fn transition(&mut self, state: ServiceState) {
        self.state = state;
        self.reporter.report(state);
    }

    fn start(&mut self) -> Result<ServiceState, Error> {
        self.transition(ServiceState::StartPending);
        let started = prepare(&self.plan).and_then(|(config, search_path)| {
            start_runtime(&self.loader, &config, &search_path)
        });
        match started {
            Ok(handle) => {
                self.runtime = Some(handle);
                self.transition(ServiceState::Running);
                Ok(self.state)
            }
            Err(err) => {
                self.reporter.report_start_failure(&err);
                self.transition(ServiceState::Stopped);
                Err(err)
            }
        }
    }

    fn stop(&mut self) -> ServiceState {
        self.transition(ServiceState::StopPending);
        let stopped = match self.runtime.as_ref() {
            Some(handle) => stop_runtime(handle),
            None => Ok(()),
        };
        if let Err(err) = stopped {
            // A missing stop entry point means a broken install, not a slow shutdown.
            if err.kind().is_fatal() {
                tracing::error!(kind = ?err.kind(), error = %err, "shutdown entry point unusable; stopping anyway");
            } else {
                tracing::warn!(kind = ?err.kind(), error = %err, "shutdown reported a problem; stopping anyway");
            }
        }
        self.transition(ServiceState::Stopped);
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bootstrap::testing::{Failure, ScriptedEngine};
    use std::sync::Mutex;

    // Tests here change the process working directory.
    static CWD_LOCK: Mutex<()> = Mutex::new(());

    #[derive(Default)]
    struct RecordingReporter {
        states: Vec<ServiceState>,
        failures: Vec<ErrorKind>,
    }

    impl StatusReporter for RecordingReporter {
        fn report(&mut self, state: ServiceState) {
            self.states.push(state);
        }

        fn report_start_failure(&mut self, err: &Error) {
            self.failures.push(err.kind());
        }
    }

    fn workdir(config: Option<&str>) -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = dir.path().join("libjvm.so");
        std::fs::write(&engine, b"").expect("engine");
        std::fs::create_dir(dir.path().join("config")).expect("config dir");
        let text = match config {
            Some(text) => text.to_string(),
            None => format!("JVM_Location {}\n", engine.display()),
        };
        std::fs::write(dir.path().join("config").join("rigclient_service.ini"), text)
            .expect("config");
        dir
    }

    fn host(
        engine: ScriptedEngine,
        dir: &Path,
    ) -> ServiceHost<ScriptedEngine, RecordingReporter> {
        let plan = LaunchPlan {
            workdir: dir.to_path_buf(),
            config_path: PathBuf::from(crate::core::config::CONFIG_FILE),
        };
        ServiceHost::new(engine, RecordingReporter::default(), plan)
    }

    #[test]
    fn start_then_stop_walks_every_state() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(None);
        let engine = ScriptedEngine::default();
        let mut host = host(engine.clone(), dir.path());

        assert_eq!(host.state(), ServiceState::Stopped);
        assert_eq!(
            host.handle_control(ControlCode::Start).expect("start"),
            ServiceState::Running
        );
        assert_eq!(
            host.handle_control(ControlCode::Stop).expect("stop"),
            ServiceState::Stopped
        );
        assert_eq!(
            host.reporter().states,
            [
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::StopPending,
                ServiceState::Stopped,
            ]
        );
        assert!(engine.calls().iter().any(|call| call == "call stop"));
    }

    #[test]
    fn stop_before_start_is_an_error() {
        let dir = workdir(None);
        let mut host = host(ScriptedEngine::default(), dir.path());
        let err = host.handle_control(ControlCode::Stop).expect_err("not started");
        assert_eq!(err.kind(), ErrorKind::NotStarted);
        assert_eq!(host.state(), ServiceState::Stopped);
        assert!(host.reporter().states.is_empty());
    }

    #[test]
    fn missing_startup_class_never_reaches_running() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(None);
        let mut host = host(ScriptedEngine::failing_start(Failure::Class), dir.path());

        let err = host.handle_control(ControlCode::Start).expect_err("class missing");
        assert_eq!(err.kind(), ErrorKind::ClassNotFound);
        assert_eq!(host.state(), ServiceState::Stopped);
        assert!(!host.reporter().states.contains(&ServiceState::Running));
        assert_eq!(host.reporter().failures, [ErrorKind::ClassNotFound]);
    }

    #[test]
    fn missing_engine_property_skips_the_engine() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(Some("Extra_Lib /opt/a.jar\n"));
        let engine = ScriptedEngine::default();
        let mut host = host(engine.clone(), dir.path());

        let err = host.handle_control(ControlCode::Start).expect_err("no engine");
        assert_eq!(err.kind(), ErrorKind::MissingEngine);
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn faulting_stop_still_ends_stopped() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(None);
        let mut host = host(ScriptedEngine::failing_stop(Failure::Fault), dir.path());

        host.handle_control(ControlCode::Start).expect("start");
        assert_eq!(
            host.handle_control(ControlCode::Stop).expect("stop"),
            ServiceState::Stopped
        );
    }

    #[test]
    fn missing_stop_method_still_ends_stopped() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(None);
        let engine = ScriptedEngine::failing_stop(Failure::Method);
        let mut host = host(engine.clone(), dir.path());

        host.handle_control(ControlCode::Start).expect("start");
        assert_eq!(
            host.handle_control(ControlCode::Stop).expect("stop"),
            ServiceState::Stopped
        );
        assert!(!engine.calls().iter().any(|call| call == "call stop"));
        assert!(host.reporter().failures.is_empty());
    }

    #[test]
    fn second_start_is_rejected() {
        let _guard = CWD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let dir = workdir(None);
        let mut host = host(ScriptedEngine::default(), dir.path());

        host.handle_control(ControlCode::Start).expect("start");
        let err = host.handle_control(ControlCode::Start).expect_err("already running");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(host.state(), ServiceState::Running);
    }
}
