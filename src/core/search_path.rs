//! Purpose: Assemble the runtime class path from the working directory and config.
//! Exports: `SearchPath`, `APPLICATION_ARCHIVE`, `PATH_LIST_DELIMITER`.
//! Role: Second step of the launch sequence; output feeds the engine options.
//! Invariants: Application archive first, then extra libraries, then `lib/*.jar`.
//! Invariants: Entries are never deduplicated or reordered.
//! Invariants: An unreadable `lib/` directory is logged and skipped.
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use crate::core::config::LauncherConfig;
use crate::core::error::{Error, ErrorKind};

/// Archive holding the startup class, resolved against the working directory.
pub const APPLICATION_ARCHIVE: &str = "rigclient.jar";

/// Directory (under the working directory) scanned for extra archives.
pub const LIBRARY_DIR: &str = "lib";

pub const ARCHIVE_SUFFIX: &str = ".jar";

/// Engine option prefix carrying the class path.
pub const SEARCH_PATH_OPTION: &str = "-Djava.class.path=";

#[cfg(windows)]
pub const PATH_LIST_DELIMITER: &str = ";";
#[cfg(not(windows))]
pub const PATH_LIST_DELIMITER: &str = ":";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SearchPath {
    entries: Vec<OsString>,
}

impl SearchPath {
    /// Builds against the process working directory.
    pub fn build(config: &LauncherConfig) -> Result<Self, Error> {
        let dir = std::env::current_dir().map_err(|err| {
            tracing::error!("unable to detect current working directory");
            Error::new(ErrorKind::NoWorkingDirectory)
                .with_message("unable to detect current working directory")
                .with_source(err)
        })?;
        Ok(Self::build_in(&dir, config))
    }

    pub fn build_in(dir: &Path, config: &LauncherConfig) -> Self {
        let mut entries = Vec::with_capacity(1 + config.extra_libraries().len());
        entries.push(dir.join(APPLICATION_ARCHIVE).into_os_string());
        entries.extend(config.extra_libraries().iter().cloned());

        let lib_dir = dir.join(LIBRARY_DIR);
        match fs::read_dir(&lib_dir) {
            Ok(listing) => {
                for entry in listing {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(err) => {
                            tracing::warn!(dir = %lib_dir.display(), error = %err, "skipping unreadable entry");
                            continue;
                        }
                    };
                    let name = entry.file_name();
                    if !name.as_encoded_bytes().ends_with(ARCHIVE_SUFFIX.as_bytes()) {
                        continue;
                    }
                    let path = lib_dir.join(&name);
                    tracing::info!(path = %path.display(), "adding archive");
                    entries.push(path.into_os_string());
                }
            }
            Err(err) => {
                tracing::warn!(
                    dir = %lib_dir.display(),
                    error = %err,
                    "unable to open library directory; not adding archives from it"
                );
            }
        }

        let search_path = Self { entries };
        tracing::info!(
            option = %search_path.option().to_string_lossy(),
            "class path argument for the engine"
        );
        search_path
    }

    pub fn entries(&self) -> &[OsString] {
        &self.entries
    }

    pub fn joined(&self) -> OsString {
        let mut joined = OsString::new();
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                joined.push(PATH_LIST_DELIMITER);
            }
            joined.push(entry);
        }
        joined
    }

    /// The `-Djava.class.path=...` option handed to the engine.
    pub fn option(&self) -> OsString {
        let mut option = OsString::from(SEARCH_PATH_OPTION);
        option.push(self.joined());
        option
    }
}
