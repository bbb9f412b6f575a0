//! Purpose: `rigclient-service` CLI entry point.
//! Role: Binary crate root; parses args, sets up logging, dispatches a command.
//! Invariants: Running with no command performs the foreground bootstrap.
//! Invariants: Errors are emitted as text on a TTY and as JSON on stderr otherwise.
//! Invariants: Process exit code is derived from `to_exit_code`.
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint, error::ErrorKind as ClapErrorKind};
use serde::Serialize;
use std::error::Error as StdError;

mod command_dispatch;
mod launch_paths;
mod logging;

use launch_paths::{LOG_FILE, absolutize, executable_dir, resolve_in};
use logging::init_logging;
use rigclient_service::core::config::CONFIG_FILE;
use rigclient_service::core::service::LaunchPlan;
use rigclient_service::{Error, ErrorKind, to_exit_code};

const SERVICE_NAME: &str = "RigClient";

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            tracing::error!(kind = ?err.kind(), error = %err, "launcher failed");
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse_from(normalize_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                return Ok(RunOutcome::ok());
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Run `rigclient-service help` for usage."));
            }
        },
    };

    let plan = launch_plan(&cli)?;

    let log_path = match &cli.log_file {
        Some(path) => absolutize(path)?,
        None => resolve_in(&plan.workdir, std::path::Path::new(LOG_FILE)),
    };
    let sink = init_logging(&log_path);
    tracing::debug!(?sink, "logging initialised");

    let command = cli.command.unwrap_or(Command::Run);
    command_dispatch::dispatch_command(command, plan).map_err(add_config_hint)
}

fn launch_plan(cli: &Cli) -> Result<LaunchPlan, Error> {
    let workdir = match &cli.workdir {
        Some(dir) => absolutize(dir)?,
        None => executable_dir()?,
    };
    let config_path = match &cli.config {
        Some(path) => absolutize(path)?,
        None => PathBuf::from(CONFIG_FILE),
    };
    Ok(LaunchPlan {
        workdir,
        config_path,
    })
}

/// Strips leading dashes from the first word and folds help spellings.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter().collect::<Vec<_>>();
    let replacement = args
        .get(1)
        .and_then(|arg| arg.to_str())
        .and_then(command_word);
    if let Some(word) = replacement {
        args[1] = OsString::from(word);
    }
    args
}

fn command_word(arg: &str) -> Option<&'static str> {
    let word = arg.trim_start_matches('-');
    match word {
        "" => None,
        "install" => Some("install"),
        "uninstall" => Some("uninstall"),
        _ if word.eq_ignore_ascii_case("help") || word.starts_with('h') => Some("help"),
        _ => None,
    }
}

#[derive(Parser)]
#[command(
    name = "rigclient-service",
    version,
    about = "Launch and supervise the rig client inside an embedded Java virtual machine",
    long_about = None,
    after_help = r#"COMMANDS
  With no command the rig client is started in the foreground and stopped
  again on Ctrl-C or SIGTERM.

SERVICE CONTROL
  Once the RigClient service is registered it can be started and stopped with:
    net start "RigClient"
    net stop "RigClient"
  or from Control Panel -> Administrative Tools -> Services.

FILES
  config/rigclient_service.ini   JVM_Location and Extra_Lib settings
  rigclientservice.log           append-only launcher log
  rigclient.jar, lib/*.jar       class path sources"#
)]
struct Cli {
    #[arg(
        long,
        global = true,
        help = "Configuration file (default: config/rigclient_service.ini in the working directory)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Log file (default: rigclientservice.log in the working directory)",
        value_hint = ValueHint::FilePath
    )]
    log_file: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Working directory to launch from (default: the executable's directory)",
        value_hint = ValueHint::DirPath
    )]
    workdir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Copy, Clone, Debug, Subcommand)]
enum Command {
    #[command(about = "Start the rig client in the foreground (default)")]
    Run,
    #[command(about = "Load the configuration and print the class path without starting the JVM")]
    Check,
    #[command(about = "Install the RigClient service (must not already be installed)")]
    Install,
    #[command(about = "Remove the RigClient service")]
    Uninstall,
}

fn clap_error_summary(err: &clap::Error) -> String {
    let rendered = err.to_string();
    rendered
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("error: ").to_string())
        .unwrap_or_else(|| "invalid arguments".to_string())
}

fn add_config_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::ConfigNotFound | ErrorKind::MissingEngine | ErrorKind::EngineNotFound => {
            err.with_hint("Check config/rigclient_service.ini or pass --config.")
        }
        ErrorKind::NoWorkingDirectory | ErrorKind::ServiceInit => {
            err.with_hint("Check that the working directory exists, or pass --workdir.")
        }
        _ => err,
    }
}

/// Prints `value` on stdout, pretty on a TTY and as one line otherwise.
fn emit_json(value: &impl Serialize) -> Result<(), Error> {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    let json = json.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode JSON output")
            .with_source(err)
    })?;
    println!("{json}");
    Ok(())
}

/// A launcher error flattened for stderr, as text on a TTY or as JSON.
#[derive(Debug, Serialize)]
struct ErrorReport {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    causes: Vec<String>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorReport,
}

impl ErrorReport {
    fn new(err: &Error) -> Self {
        let kind = format!("{:?}", err.kind());
        Self {
            message: err.message().map_or_else(|| kind.clone(), str::to_string),
            kind,
            hint: err.hint().map(str::to_string),
            path: err.path().map(|path| path.display().to_string()),
            causes: std::iter::successors(err.source(), |cause: &&dyn StdError| (*cause).source())
                .map(|cause| cause.to_string())
                .collect(),
        }
    }

    fn to_text(&self) -> String {
        let mut text = format!("error: {}", self.message);
        for (label, value) in [("hint", &self.hint), ("path", &self.path)] {
            if let Some(value) = value {
                text.push_str(&format!("\n{label}: {value}"));
            }
        }
        for cause in &self.causes {
            text.push_str(&format!("\ncaused by: {cause}"));
        }
        text
    }
}

fn emit_error(err: &Error) {
    let report = ErrorReport::new(err);
    if io::stderr().is_terminal() {
        eprintln!("{}", report.to_text());
        return;
    }
    let json = serde_json::to_string(&ErrorEnvelope { error: report }).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}
