//! Fatal and non-fatal diagnostics.
//!
//! Fatal conditions (I/O failure, lexing, syntax) abort the operation and are
//! returned as [`KconfigError`]. Non-fatal conditions are collected as
//! [`Warning`]s: they never stop a parse or a config load, but they are both
//! handed back to the caller and logged through the `log` facade so a binary
//! embedding this crate sees them on stderr without the library dictating
//! the output stream.

use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

/// A source location used in diagnostics: the file that was being read and
/// the 1-based line number within it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Rc<str>,
    pub line: u32,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A fatal error. Propagates to the caller; a `Kconfig` whose construction
/// produced one of these must be discarded rather than used partially built.
#[derive(Debug, Error)]
pub enum KconfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: not found (searched srctree={srctree:?})")]
    NotFound { path: PathBuf, srctree: Option<PathBuf> },

    #[error("{location}: {message}")]
    Lex { location: Location, message: String },

    #[error("{location}: {message}")]
    Syntax { location: Location, message: String },
}

/// A non-fatal condition, suppressible at runtime via `Options::warnings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnknownOption {
        location: Location,
        option: String,
    },
    ModulesOptionOnWrongSymbol {
        location: Location,
        symbol: String,
    },
    DuplicateDefconfigList {
        location: Location,
    },
    UndefinedEnvVar {
        location: Location,
        var: String,
    },
    AssignUndefinedSymbol {
        location: Option<Location>,
        symbol: String,
    },
    InvalidAssignedValue {
        location: Option<Location>,
        symbol: String,
        value: String,
    },
    RangeClamped {
        symbol: String,
        value: String,
        low: String,
        high: String,
    },
    ReassignedInLoad {
        location: Option<Location>,
        symbol: String,
    },
    MalformedStringLiteral {
        location: Location,
        symbol: String,
    },
    InconsistentChoiceMode {
        symbol: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownOption { option, .. } => write!(f, "unknown option `{option}`"),
            Warning::ModulesOptionOnWrongSymbol { symbol, .. } => write!(
                f,
                "`option modules` on `{symbol}`: modules support is hardcoded to MODULES"
            ),
            Warning::DuplicateDefconfigList { .. } => {
                write!(f, "`option defconfig_list` redeclared, ignoring")
            }
            Warning::UndefinedEnvVar { var, .. } => {
                write!(f, "environment variable `{var}` is not set")
            }
            Warning::AssignUndefinedSymbol { symbol, .. } => {
                write!(f, "attempt to assign undefined symbol `{symbol}`")
            }
            Warning::InvalidAssignedValue { symbol, value, .. } => write!(
                f,
                "`{value}` is not a valid value for `{symbol}`, ignoring"
            ),
            Warning::RangeClamped {
                symbol,
                value,
                low,
                high,
            } => write!(
                f,
                "value `{value}` for `{symbol}` outside range [{low}, {high}], clamping"
            ),
            Warning::ReassignedInLoad { symbol, .. } => {
                write!(f, "`{symbol}` set more than once in this config")
            }
            Warning::MalformedStringLiteral { symbol, .. } => {
                write!(f, "malformed string literal for `{symbol}`, skipping")
            }
            Warning::InconsistentChoiceMode { symbol } => write!(
                f,
                "assignment to choice member `{symbol}` is inconsistent with the choice's current mode"
            ),
        }
    }
}

impl Warning {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Warning::UnknownOption { location, .. }
            | Warning::ModulesOptionOnWrongSymbol { location, .. }
            | Warning::DuplicateDefconfigList { location }
            | Warning::UndefinedEnvVar { location, .. }
            | Warning::MalformedStringLiteral { location, .. } => Some(location),
            Warning::AssignUndefinedSymbol { location, .. }
            | Warning::InvalidAssignedValue { location, .. }
            | Warning::ReassignedInLoad { location, .. } => location.as_ref(),
            Warning::RangeClamped { .. } | Warning::InconsistentChoiceMode { .. } => None,
        }
    }

    /// Emit through the `log` facade, prefixed with `file:line` when known.
    pub fn log(&self) {
        match self.location() {
            Some(loc) => log::warn!("{loc}: {self}"),
            None => log::warn!("{self}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, KconfigError>;
