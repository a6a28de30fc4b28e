//! Shell error type
//!
//! | Variant | Reported as | Aborts a script |
//! |---------|-------------|-----------------|
//! | `Validation`, `MalformedArgs` | warning + usage | no |
//! | `CommandNotRecognized` | warning | no |
//! | `StateConflict` | warning | no |
//! | `Engine` | `[category] error code: message` | yes |
//! | `Io`, `ScriptAborted` | error | yes |
//!
//! "Aborts a script" is overridden by ignore-errors mode.

use thiserror::Error;

/// Result type for command handlers
pub type Result<T> = std::result::Result<T, ShellError>;

/// Everything that can go wrong while running one command
#[derive(Debug, Error)]
pub enum ShellError {
    /// Arguments failed validation
    #[error("{message}")]
    Validation {
        /// What was wrong
        message: String,
        /// The command's usage line
        usage: String,
    },

    /// Arguments could not be tokenized, or were missing entirely
    #[error("{message}")]
    MalformedArgs {
        /// What was wrong
        message: String,
        /// The command's usage line
        usage: String,
    },

    /// The engine reported a failure
    #[error(transparent)]
    Engine(#[from] docshell_core::Error),

    /// No command matches the typed token
    #[error("Command not recognized: {0}")]
    CommandNotRecognized(String),

    /// A session precondition does not hold
    #[error("{0}")]
    StateConflict(String),

    /// A file the command needed could not be read or written
    #[error("{0}")]
    Io(String),

    /// A nested script stopped on an error
    #[error("script '{0}' aborted")]
    ScriptAborted(String),
}

impl ShellError {
    /// Whether this failure ends a running script (without ignore-errors)
    pub fn aborts_script(&self) -> bool {
        matches!(
            self,
            ShellError::Engine(_) | ShellError::Io(_) | ShellError::ScriptAborted(_)
        )
    }

    /// Usage line to print after the warning, if any
    pub fn usage(&self) -> Option<&str> {
        match self {
            ShellError::Validation { usage, .. } | ShellError::MalformedArgs { usage, .. } => {
                Some(usage)
            }
            _ => None,
        }
    }

    /// Wrap an I/O failure on `path`
    pub fn io(action: &str, path: impl std::fmt::Display, err: std::io::Error) -> Self {
        ShellError::Io(format!("cannot {} '{}': {}", action, path, err))
    }
}
