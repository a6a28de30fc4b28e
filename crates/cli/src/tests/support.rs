//! Shared fixtures: a scratch home, an engine, a recording reporter.

use std::path::PathBuf;
use std::sync::Arc;

use docshell_engine::{Database, OpenOptions};
use tempfile::TempDir;

use crate::error::Result;
use crate::format::{Level, MemoryReporter};
use crate::repl::{Driver, Flow};
use crate::state::Session;

/// A driver over a fresh store in a temporary home
///
/// Fields drop in order, so the session is torn down before the home goes.
pub struct Shell {
    pub driver: Driver,
    pub out: MemoryReporter,
    pub home: TempDir,
}

impl Shell {
    pub fn new() -> Self {
        Self::with_options(OpenOptions::default())
    }

    pub fn transactional() -> Self {
        Self::with_options(OpenOptions {
            transactional: true,
            ..OpenOptions::default()
        })
    }

    fn with_options(options: OpenOptions) -> Self {
        let (home, out, session) = session_with(options);
        Self {
            driver: Driver::new(session),
            out,
            home,
        }
    }

    /// Dispatch one line
    pub fn run(&mut self, line: &str) -> Result<Flow> {
        self.driver.dispatch(line)
    }

    /// Dispatch one line that must succeed
    pub fn ok(&mut self, line: &str) {
        if let Err(e) = self.driver.dispatch(line) {
            panic!("'{}' failed: {}", line, e);
        }
    }

    /// Write a file into the home and return its path
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.home.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn messages(&self) -> Vec<String> {
        self.out.messages()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.out.at(Level::Warning)
    }

    pub fn errors(&self) -> Vec<String> {
        self.out.at(Level::Error)
    }
}

/// A session over a fresh store, with the reporter it writes to
pub fn session_with(options: OpenOptions) -> (TempDir, MemoryReporter, Session) {
    let home = TempDir::new().unwrap();
    let db = Database::open(home.path(), options).unwrap();
    let out = MemoryReporter::new();
    let session = Session::new(Arc::new(db), home.path(), Box::new(out.clone()));
    (home, out, session)
}
