//! User-facing output records and their renderers.
//!
//! Handlers never print directly. They emit [`Record`]s through the session's
//! [`Reporter`]:
//! - `ConsoleReporter`: messages to stdout, `(warning) …` / `(error) …` to stderr
//! - `MemoryReporter`: collects records for tests

use std::io::Write;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use parking_lot::Mutex;

use crate::error::ShellError;

/// Severity of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Normal command output
    Message,
    /// Extra detail shown only in verbose mode
    Verbose,
    /// Recoverable problem
    Warning,
    /// Failed operation
    Error,
}

/// One line of user-facing output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Severity
    pub level: Level,
    /// Rendered text
    pub message: String,
}

impl Record {
    /// Build a record
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Sink for records
pub trait Reporter: Send {
    /// Deliver one record
    fn report(&mut self, record: Record);
}

/// Render a shell error as the records it produces.
///
/// Engine errors become `[category] error code: message`; argument errors add
/// the usage line.
pub fn error_records(err: &ShellError) -> Vec<Record> {
    match err {
        ShellError::Engine(e) => vec![Record::new(
            Level::Error,
            format!("[{}] error {}: {}", e.category(), e.code(), e),
        )],
        ShellError::Io(_) | ShellError::ScriptAborted(_) => {
            vec![Record::new(Level::Error, err.to_string())]
        }
        ShellError::Validation { .. } | ShellError::MalformedArgs { .. } => {
            let mut records = vec![Record::new(Level::Warning, err.to_string())];
            if let Some(usage) = err.usage() {
                records.push(Record::new(Level::Message, format!("Usage: {}", usage)));
            }
            records
        }
        ShellError::CommandNotRecognized(_) | ShellError::StateConflict(_) => {
            vec![Record::new(Level::Warning, err.to_string())]
        }
    }
}

// =========================================================================
// Console
// =========================================================================

/// Writes records to the terminal
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&mut self, record: Record) {
        match record.level {
            Level::Message | Level::Verbose => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", record.message);
            }
            Level::Warning => eprintln!("(warning) {}", record.message),
            Level::Error => eprintln!("(error) {}", record.message),
        }
    }
}

// =========================================================================
// Memory
// =========================================================================

/// Collects records in memory; clones share the same buffer
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    records: Arc<Mutex<Vec<Record>>>,
}

#[cfg(test)]
impl MemoryReporter {
    /// New empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().clone()
    }

    /// Message texts at the given level
    pub fn at(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .map(|r| r.message.clone())
            .collect()
    }

    /// Normal output lines
    pub fn messages(&self) -> Vec<String> {
        self.at(Level::Message)
    }

    /// True when any record's text contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.message.contains(needle))
    }

    /// Drop everything collected so far
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

#[cfg(test)]
impl Reporter for MemoryReporter {
    fn report(&mut self, record: Record) {
        self.records.lock().push(record);
    }
}
