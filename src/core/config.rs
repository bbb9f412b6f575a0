//! Purpose: Load the launcher configuration store (`key value` lines).
//! Exports: `LauncherConfig`, `CONFIG_FILE`, `MAX_LINE_BYTES`.
//! Role: First step of the launch sequence; yields the engine path and extra libraries.
//! Invariants: `JVM_Location` is verified to exist; first occurrence wins.
//! Invariants: `Extra_Lib` entries keep file order and are never verified.
//! Invariants: Unknown properties and value-less lines are logged, never fatal.
//! Invariants: At most `MAX_LINE_BYTES` of a line are ever buffered.
//! Invariants: Values keep their raw bytes on Unix.
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

/// Default location of the configuration store, relative to the working directory.
pub const CONFIG_FILE: &str = "config/rigclient_service.ini";

/// Data bytes kept per line; the remainder of a longer line is skipped.
pub const MAX_LINE_BYTES: usize = 200;

const ENGINE_PROPERTY: &[u8] = b"JVM_Location";
const EXTRA_LIB_PROPERTY: &[u8] = b"Extra_Lib";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LauncherConfig {
    engine_library: PathBuf,
    extra_libraries: Vec<OsString>,
}

impl LauncherConfig {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let file = File::open(path).map_err(|err| {
            tracing::error!(path = %path.display(), "unable to open configuration file");
            Error::new(ErrorKind::ConfigNotFound)
                .with_message("unable to open configuration file")
                .with_path(path)
                .with_hint("Create the file or point --config at an existing one.")
                .with_source(err)
        })?;
        tracing::info!(path = %path.display(), "opened configuration file");
        Self::parse(BufReader::new(file), path)
    }

    /// Parses a configuration store; `origin` only labels errors and log lines.
    pub fn parse<R: BufRead>(mut reader: R, origin: &Path) -> Result<Self, Error> {
        let mut engine_library: Option<PathBuf> = None;
        let mut extra_libraries = Vec::new();
        let mut raw = Vec::with_capacity(MAX_LINE_BYTES);
        let mut line_no = 0usize;

        loop {
            let truncated = match read_bounded_line(&mut reader, &mut raw) {
                Ok(Some(truncated)) => truncated,
                Ok(None) => break,
                Err(err) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to read configuration file")
                        .with_path(origin)
                        .with_source(err));
                }
            };
            line_no += 1;
            if truncated {
                tracing::warn!(
                    line = line_no,
                    limit = MAX_LINE_BYTES,
                    "configuration line too long; truncating"
                );
            }

            let line = raw.trim_ascii();
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }

            let Some((prop, value)) = split_property(line) else {
                tracing::warn!(
                    line = line_no,
                    prop = %String::from_utf8_lossy(line),
                    "no value for property"
                );
                continue;
            };
            let value = os_value(value);
            tracing::debug!(
                prop = %String::from_utf8_lossy(prop),
                value = %value.to_string_lossy(),
                "configuration property"
            );

            match prop {
                ENGINE_PROPERTY => {
                    if let Some(existing) = &engine_library {
                        tracing::warn!(
                            line = line_no,
                            ignored = %value.to_string_lossy(),
                            using = %existing.display(),
                            "repeated JVM_Location; keeping the first one"
                        );
                        continue;
                    }
                    let path = verify_engine_library(value)?;
                    tracing::info!(path = %path.display(), "using engine library");
                    engine_library = Some(path);
                }
                EXTRA_LIB_PROPERTY => {
                    tracing::info!(library = %value.to_string_lossy(), "adding extra library");
                    extra_libraries.push(value);
                }
                _ => {
                    tracing::warn!(
                        line = line_no,
                        prop = %String::from_utf8_lossy(prop),
                        "unknown property"
                    );
                }
            }
        }

        let Some(engine_library) = engine_library else {
            return Err(Error::new(ErrorKind::MissingEngine)
                .with_message("configuration does not set JVM_Location")
                .with_path(origin)
                .with_hint("Add a `JVM_Location /path/to/libjvm` line."));
        };

        Ok(Self {
            engine_library,
            extra_libraries,
        })
    }

    pub fn engine_library(&self) -> &Path {
        &self.engine_library
    }

    pub fn extra_libraries(&self) -> &[OsString] {
        &self.extra_libraries
    }
}

/// Reads one line into `buf` without its terminator, keeping at most
/// `MAX_LINE_BYTES`. Returns `None` at end of input, otherwise whether
/// bytes were dropped.
fn read_bounded_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<bool>> {
    buf.clear();
    let mut read_any = false;
    let mut truncated = false;

    loop {
        let available = match reader.fill_buf() {
            Ok(available) => available,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        if available.is_empty() {
            break;
        }
        read_any = true;

        let newline = available.iter().position(|byte| *byte == b'\n');
        let data = &available[..newline.unwrap_or(available.len())];
        let room = MAX_LINE_BYTES - buf.len();
        if data.len() > room {
            truncated = true;
        }
        buf.extend_from_slice(&data[..data.len().min(room)]);

        let used = newline.map_or(available.len(), |at| at + 1);
        reader.consume(used);
        if newline.is_some() {
            break;
        }
    }

    if !read_any {
        return Ok(None);
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(Some(truncated))
}

fn split_property(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let split = line.iter().position(u8::is_ascii_whitespace)?;
    let (prop, rest) = line.split_at(split);
    let value = rest.trim_ascii_start();
    if value.is_empty() {
        return None;
    }
    Some((prop, value))
}

#[cfg(unix)]
fn os_value(bytes: &[u8]) -> OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn os_value(bytes: &[u8]) -> OsString {
    OsString::from(String::from_utf8_lossy(bytes).into_owned())
}

fn verify_engine_library(value: OsString) -> Result<PathBuf, Error> {
    let path = PathBuf::from(value);
    let not_found = |path: &Path| {
        tracing::error!(
            path = %path.display(),
            "unable to use configured JVM location as the file does not exist"
        );
        Error::new(ErrorKind::EngineNotFound)
            .with_message("configured engine library does not exist")
            .with_path(path)
            .with_hint("Point JVM_Location at the runtime's libjvm (jvm.dll on Windows).")
    };

    let file = File::open(&path).map_err(|err| not_found(&path).with_source(err))?;
    let metadata = file
        .metadata()
        .map_err(|err| not_found(&path).with_source(err))?;
    if !metadata.is_file() {
        return Err(not_found(&path).with_message("configured engine library is not a file"));
    }
    Ok(path)
}
