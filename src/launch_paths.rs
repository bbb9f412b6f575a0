//! Purpose: Resolve the launcher's working directory and default file locations.
//! Exports: `LOG_FILE`, `executable_dir`, `resolve_in`, `absolutize`.
//! Role: Keep CLI path semantics in one place for every command.
//! Invariants: Default working directory is the directory holding the executable.
//! Invariants: Relative defaults resolve against the working directory, user paths against the caller's.

use std::path::{Path, PathBuf};

use rigclient_service::{Error, ErrorKind};

/// Append-only log file, relative to the working directory.
pub(crate) const LOG_FILE: &str = "rigclientservice.log";

/// Service managers start processes in an unrelated system directory; the
/// launcher runs from where its executable lives instead.
pub(crate) fn executable_dir() -> Result<PathBuf, Error> {
    let exe = std::env::current_exe().map_err(|err| {
        Error::new(ErrorKind::ServiceInit)
            .with_message("unable to determine executable location")
            .with_source(err)
    })?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        Error::new(ErrorKind::ServiceInit)
            .with_message("unable to determine current directory")
            .with_path(&exe)
            .with_hint("Pass --workdir to choose the directory explicitly.")
    })
}

pub(crate) fn resolve_in(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    dir.join(path)
}

pub(crate) fn absolutize(path: &Path) -> Result<PathBuf, Error> {
    std::path::absolute(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("unable to resolve path")
            .with_path(path)
            .with_source(err)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_resolve_in_dir() {
        let dir = Path::new("/srv/rig");
        assert_eq!(
            resolve_in(dir, Path::new(LOG_FILE)),
            PathBuf::from("/srv/rig/rigclientservice.log")
        );
        assert_eq!(
            resolve_in(dir, Path::new("/var/log/rig.log")),
            PathBuf::from("/var/log/rig.log")
        );
    }

    #[test]
    fn executable_dir_contains_the_test_binary() {
        let dir = executable_dir().expect("dir");
        let exe = std::env::current_exe().expect("exe");
        assert_eq!(exe.parent(), Some(dir.as_path()));
    }
}
