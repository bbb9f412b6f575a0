//! Purpose: Seam between the bootstrap sequence and a managed runtime engine.
//! Exports: `EngineLoader`, `EngineLibrary`, `RuntimeInstance`, `AttachedThread`,
//! `EntryPoint`, `EngineError`, `JniEngineLoader`, plus the fixed entry-point names.
//! Role: The bootstrap drives these traits; `jni` is the production backend.
//! Invariants: Entry points are resolved by name on every call; nothing is cached.
//! Invariants: A loaded engine library stays loaded until the process exits.
//! Invariants: A thread attached by `attach` is detached again when its guard drops.
use std::error::Error as StdError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod jni;
pub mod sys;

pub use jni::JniEngineLoader;

/// Instance-creation symbol exported by the engine library.
pub const CREATE_SYMBOL: &str = "JNI_CreateJavaVM";

/// Runtime flag that keeps the engine from claiming process signals.
pub const REDUCE_SIGNALS_FLAG: &str = "-Xrs";

/// Class carrying the startup and shutdown entry points.
pub const STARTUP_CLASS: &str = "au/edu/uts/eng/remotelabs/rigclient/main/RigClient";

/// No-argument, no-return static method signature.
pub const VOID_SIGNATURE: &str = "()V";

pub const START: EntryPoint = EntryPoint {
    class: STARTUP_CLASS,
    method: "start",
    signature: VOID_SIGNATURE,
};

pub const STOP: EntryPoint = EntryPoint {
    class: STARTUP_CLASS,
    method: "stop",
    signature: VOID_SIGNATURE,
};

/// A static method named by class, method and signature.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntryPoint {
    pub class: &'static str,
    pub method: &'static str,
    pub signature: &'static str,
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.class, self.method, self.signature)
    }
}

#[derive(Debug)]
pub enum EngineError {
    Load {
        path: PathBuf,
        source: Box<dyn StdError + Send + Sync>,
    },
    SymbolMissing {
        symbol: &'static str,
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
    InvalidOption(OsString),
    CreateRejected {
        code: i32,
    },
    AttachFailed {
        code: i32,
    },
    ClassNotFound {
        class: &'static str,
    },
    MethodNotFound {
        class: &'static str,
        method: &'static str,
    },
    Fault {
        class: &'static str,
        method: &'static str,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Load { path, .. } => {
                write!(f, "unable to load library {}", path.display())
            }
            EngineError::SymbolMissing { symbol, .. } => write!(f, "symbol {symbol} not found"),
            EngineError::InvalidOption(option) => {
                write!(f, "engine option contains a nul byte: {option:?}")
            }
            EngineError::CreateRejected { code } => {
                write!(f, "engine refused to create an instance (code {code})")
            }
            EngineError::AttachFailed { code } => {
                write!(f, "unable to attach thread to runtime (code {code})")
            }
            EngineError::ClassNotFound { class } => write!(f, "unable to find class {class}"),
            EngineError::MethodNotFound { class, method } => {
                write!(f, "unable to find method {method} in class {class}")
            }
            EngineError::Fault { class, method } => {
                write!(f, "exception thrown calling {method} on {class}")
            }
        }
    }
}

impl StdError for EngineError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            EngineError::Load { source, .. } => Some(source.as_ref() as &(dyn StdError + 'static)),
            EngineError::SymbolMissing {
                source: Some(source),
                ..
            } => Some(source.as_ref() as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

/// Opens engine libraries.
///
/// Runtime threads keep executing engine code after `stop`, so an opened
/// library is never unloaded.
pub trait EngineLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn EngineLibrary>, EngineError>;
}

/// A loaded engine library able to create a runtime instance.
pub trait EngineLibrary: Send + Sync {
    /// Resolves the creation symbol and creates an instance with `options`.
    fn create_instance(
        &self,
        options: &[OsString],
    ) -> Result<Arc<dyn RuntimeInstance>, EngineError>;
}

pub trait RuntimeInstance: Send + Sync {
    /// Attaches the calling thread; required before any resolution from that thread.
    ///
    /// A thread that was already attached stays attached when the returned
    /// guard drops; a thread attached here is detached.
    fn attach(&self) -> Result<Box<dyn AttachedThread + '_>, EngineError>;
}

pub trait AttachedThread {
    /// Resolves `entry` afresh by name and invokes it with no arguments.
    ///
    /// A fault raised by the callee is cleared and reported as
    /// `EngineError::Fault`; its contents are not inspected.
    fn call_static(&mut self, entry: &EntryPoint) -> Result<(), EngineError>;
}
