//! Command definitions and the abbreviation-resolving registry.
//!
//! Every shell command is a [`Command`]: an immutable [`CommandSpec`] plus an
//! `execute` entry point. The [`Registry`] resolves what the user typed:
//!
//! 1. an exact, case-insensitive name match wins outright;
//! 2. otherwise commands are tried shortest name first, then alphabetically,
//!    and the first one the token is a prefix of wins;
//! 3. otherwise the token is not recognized.

use std::path::PathBuf;

use crate::error::{Result, ShellError};
use crate::state::Session;

/// Static description of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    /// Canonical lower-case name
    pub name: &'static str,
    /// Usage line shown after argument errors
    pub usage: &'static str,
    /// One-line summary for `help`
    pub summary: &'static str,
    /// Longer description for `help <command>`
    pub detail: &'static str,
    /// Fewest arguments accepted
    pub min_args: usize,
    /// Most arguments accepted
    pub max_args: usize,
}

/// What the driver should do after a command ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing further
    Continue,
    /// Run the given script file through the same driver
    RunScript(PathBuf),
    /// Switch ignore-errors mode
    IgnoreErrors(bool),
    /// Print text verbatim
    Echo(String),
    /// Dispatch the given line and report its run time
    Time(String),
    /// Show help, optionally for one command
    Help(Option<String>),
}

/// A shell command
pub trait Command {
    /// The command's static description
    fn spec(&self) -> &CommandSpec;

    /// Run the command with its raw (untokenized) argument string
    fn execute(&self, session: &mut Session, args: &str) -> Result<Outcome>;
}

/// Handler function signature used by [`FnCommand`]
pub type Handler = fn(&mut Session, &CommandSpec, &str) -> Result<Outcome>;

/// A command backed by a plain function
pub struct FnCommand {
    spec: CommandSpec,
    handler: Handler,
}

impl FnCommand {
    /// Pair a spec with its handler
    pub fn new(spec: CommandSpec, handler: Handler) -> Self {
        Self { spec, handler }
    }
}

impl Command for FnCommand {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    fn execute(&self, session: &mut Session, args: &str) -> Result<Outcome> {
        (self.handler)(session, &self.spec, args)
    }
}

// =========================================================================
// Registry
// =========================================================================

/// All known commands, ordered for abbreviation matching
#[derive(Default)]
pub struct Registry {
    commands: Vec<Box<dyn Command>>,
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every shell command
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::handlers::register_all(&mut registry);
        registry
    }

    /// Add a command, keeping (length, name) order
    pub fn register(&mut self, command: Box<dyn Command>) {
        let key = sort_key(command.spec().name);
        let pos = self
            .commands
            .partition_point(|c| sort_key(c.spec().name) <= key);
        self.commands.insert(pos, command);
    }

    /// Add a function-backed command
    pub fn register_fn(&mut self, spec: CommandSpec, handler: Handler) {
        self.register(Box::new(FnCommand::new(spec, handler)));
    }

    /// Resolve a typed token to a command
    ///
    /// # Errors
    ///
    /// [`ShellError::CommandNotRecognized`] when nothing matches.
    pub fn resolve(&self, token: &str) -> Result<&dyn Command> {
        let wanted = token.to_ascii_lowercase();
        if !wanted.is_empty() {
            if let Some(exact) = self.commands.iter().find(|c| c.spec().name == wanted) {
                return Ok(exact.as_ref());
            }
            if let Some(prefixed) = self
                .commands
                .iter()
                .find(|c| c.spec().name.starts_with(wanted.as_str()))
            {
                return Ok(prefixed.as_ref());
            }
        }
        Err(ShellError::CommandNotRecognized(token.to_string()))
    }

    /// Canonical names in resolution order
    pub fn names(&self) -> Vec<&'static str> {
        self.commands.iter().map(|c| c.spec().name).collect()
    }

    /// Specs sorted alphabetically, for help listings
    pub fn specs_sorted(&self) -> Vec<&CommandSpec> {
        let mut specs: Vec<&CommandSpec> = self.commands.iter().map(|c| c.spec()).collect();
        specs.sort_by_key(|s| s.name);
        specs
    }

    /// Number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn sort_key(name: &str) -> (usize, &str) {
    (name.len(), name)
}
