use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Io,
    ServiceInit,
    InvalidTransition,
    ConfigNotFound,
    EngineNotFound,
    MissingEngine,
    NoWorkingDirectory,
    EngineLoadFailed,
    EntryPointMissing,
    CreateFailed,
    ClassNotFound,
    MethodNotFound,
    StartupFault,
    ShutdownFault,
    NotStarted,
}

/// Lifecycle stage an error kind belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Service,
    Config,
    SearchPath,
    Bootstrap,
    Shutdown,
    Usage,
}

impl ErrorKind {
    pub fn stage(self) -> Stage {
        match self {
            ErrorKind::Internal
            | ErrorKind::Io
            | ErrorKind::ServiceInit
            | ErrorKind::InvalidTransition => Stage::Service,
            ErrorKind::ConfigNotFound | ErrorKind::EngineNotFound | ErrorKind::MissingEngine => {
                Stage::Config
            }
            ErrorKind::NoWorkingDirectory => Stage::SearchPath,
            ErrorKind::EngineLoadFailed
            | ErrorKind::EntryPointMissing
            | ErrorKind::CreateFailed
            | ErrorKind::ClassNotFound
            | ErrorKind::MethodNotFound
            | ErrorKind::StartupFault => Stage::Bootstrap,
            ErrorKind::ShutdownFault | ErrorKind::NotStarted => Stage::Shutdown,
            ErrorKind::Usage => Stage::Usage,
        }
    }

    /// Fatal kinds abort the start sequence; the rest are reported and survived.
    pub fn is_fatal(self) -> bool {
        !matches!(self.stage(), Stage::Shutdown | Stage::Usage)
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&std::path::Path> {
        self.path.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind.stage() {
        Stage::Service => 1,
        Stage::Config => 2,
        Stage::SearchPath => 3,
        Stage::Bootstrap => 4,
        Stage::Shutdown => 5,
        Stage::Usage => 64,
    }
}
