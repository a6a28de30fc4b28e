//! Line driver: REPL, script and pipe modes.
//!
//! All three modes share one loop, [`Driver::run_source`], over a
//! [`LineSource`]:
//! - **Interactive**: rustyline editor with history and TAB completion;
//!   errors never end the loop
//! - **Script** (`--script`, `run`): lines from a file; an engine or I/O
//!   failure ends the script unless ignore-errors is on
//! - **Pipe**: lines from stdin with script semantics
//!
//! `quit`/`exit` end the current source only, so a nested script returns to
//! the script or prompt that ran it.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::time::Instant;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{CompletionType, Config, Context, Editor, Helper};
use tracing::{debug, warn};

use crate::commands::{Outcome, Registry};
use crate::error::{Result, ShellError};
use crate::parse::{split_command, LineAssembler};
use crate::state::Session;

/// Primary prompt
pub const PROMPT: &str = "docshell> ";

/// Prompt shown while a `\` continuation is pending
pub const CONTINUATION_PROMPT: &str = "> ";

/// How deep `run` may nest scripts
pub const MAX_SCRIPT_DEPTH: usize = 16;

/// Whether the current source should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line
    Continue,
    /// `quit` or `exit` was entered
    Quit,
}

/// How a source stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// End of input
    Finished,
    /// `quit` or `exit`
    Quit,
    /// A failure stopped a script
    Aborted,
}

// =========================================================================
// Line sources
// =========================================================================

/// Where command lines come from
pub trait LineSource {
    /// Next physical line, `None` at end of input
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Lines from any buffered reader (script files, stdin)
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: BufRead> ReaderSource<R> {
    /// Wrap a reader
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

/// Lines typed at the terminal
pub struct EditorSource {
    editor: Editor<ShellHelper, DefaultHistory>,
    history: Option<String>,
}

impl EditorSource {
    /// Editor completing the given command names
    pub fn new(names: Vec<&'static str>) -> rustyline::Result<Self> {
        Self::with_history(names, history_file())
    }

    /// Editor keeping its history in `history`, when given
    ///
    /// A history file that cannot be read is logged and ignored.
    pub fn with_history(names: Vec<&'static str>, history: Option<String>) -> rustyline::Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
        editor.set_helper(Some(ShellHelper::new(names)));

        if let Some(path) = &history {
            if let Err(e) = editor.load_history(path) {
                debug!(target: "docshell::shell", path = %path, error = %e, "History not loaded");
            }
        }
        Ok(Self { editor, history })
    }

    /// Write the history file
    pub fn save_history(&mut self) {
        if let Some(path) = &self.history {
            if let Err(e) = self.editor.save_history(path) {
                warn!(target: "docshell::shell", path = %path, error = %e, "Failed to save history");
            }
        }
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = self.editor.add_history_entry(line.trim()) {
                        debug!(target: "docshell::shell", error = %e, "History entry not recorded");
                    }
                }
                Ok(Some(line))
            }
            // Ctrl-C abandons the line, not the shell
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }
}

fn history_file() -> Option<String> {
    std::env::var("HOME")
        .ok()
        .map(|h| format!("{}/.docshell_history", h))
}

// =========================================================================
// Driver
// =========================================================================

/// Reads, dispatches and reports commands against one session
pub struct Driver {
    registry: Registry,
    session: Session,
    ignore_errors: bool,
    time_next: bool,
    depth: usize,
}

impl Driver {
    /// Driver with every built-in command
    pub fn new(session: Session) -> Self {
        Self {
            registry: Registry::with_builtins(),
            session,
            ignore_errors: false,
            time_next: false,
            depth: 0,
        }
    }

    /// The session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The session, mutably
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Whether ignore-errors mode is on
    pub fn ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    /// Run one logical command line
    pub fn dispatch(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Flow::Continue);
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Ok(Flow::Quit);
        }

        let (token, args) = split_command(line);
        let command = self.registry.resolve(token)?;
        let name = command.spec().name;
        debug!(target: "docshell::shell", token, command = name, "Dispatching");

        let timed = std::mem::take(&mut self.time_next) || self.session.is_verbose();
        let started = Instant::now();
        let flow = command
            .execute(&mut self.session, args)
            .and_then(|outcome| self.apply(outcome));
        if timed {
            let elapsed = started.elapsed();
            let shown = format!("{} {}", name, args);
            self.session.message(format!(
                "command '{}' completed in {:.3} seconds ({} ms).",
                shown.trim(),
                elapsed.as_secs_f64(),
                elapsed.as_millis()
            ));
        }
        flow
    }

    fn apply(&mut self, outcome: Outcome) -> Result<Flow> {
        match outcome {
            Outcome::Continue => {}
            Outcome::Echo(text) => self.session.message(text),
            Outcome::IgnoreErrors(on) => {
                self.ignore_errors = on;
                self.session
                    .detail(format!("ignore errors {}.", if on { "on" } else { "off" }));
            }
            Outcome::Help(topic) => self.help(topic.as_deref()),
            Outcome::Time(line) => {
                self.time_next = true;
                let flow = self.dispatch(&line);
                self.time_next = false;
                return flow;
            }
            Outcome::RunScript(path) => {
                self.session
                    .message(format!("running script '{}'...", path.display()));
                self.run_script(&path)?;
            }
        }
        Ok(Flow::Continue)
    }

    fn help(&mut self, topic: Option<&str>) {
        let lines: Vec<String> = match topic {
            None => {
                let mut lines: Vec<String> = self
                    .registry
                    .specs_sorted()
                    .into_iter()
                    .map(|s| format!("{:<18}{}", s.name, s.summary))
                    .collect();
                lines.push(format!("{:<18}{}", "quit, exit", "Leave the shell or the current script"));
                lines
            }
            Some(t) => match self.registry.resolve(t) {
                Ok(command) => {
                    let spec = command.spec();
                    vec![
                        format!("{} - {}", spec.name, spec.summary),
                        format!("Usage: {}", spec.usage),
                        spec.detail.to_string(),
                    ]
                }
                Err(_) => {
                    self.session.warn(format!("command not found: {}", t));
                    return;
                }
            },
        };
        for line in lines {
            self.session.message(line);
        }
    }

    /// Feed one logical line; returns how the source ends, if it does
    fn step(&mut self, line: &str, script: bool) -> Option<RunEnd> {
        match self.dispatch(line) {
            Ok(Flow::Continue) => None,
            Ok(Flow::Quit) => Some(RunEnd::Quit),
            Err(e) => {
                self.session.report_error(&e);
                (script && e.aborts_script() && !self.ignore_errors).then_some(RunEnd::Aborted)
            }
        }
    }

    /// Read and run lines until the source ends
    pub fn run_source(&mut self, source: &mut dyn LineSource, script: bool) -> RunEnd {
        let mut assembler = LineAssembler::new();
        loop {
            let prompt = if assembler.is_continued() {
                CONTINUATION_PROMPT
            } else {
                PROMPT
            };
            let line = match source.read_line(prompt) {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    self.session
                        .report_error(&ShellError::Io(format!("cannot read input: {}", e)));
                    return if script {
                        RunEnd::Aborted
                    } else {
                        RunEnd::Finished
                    };
                }
            };
            if let Some(logical) = assembler.push(&line) {
                if let Some(end) = self.step(&logical, script) {
                    return end;
                }
            }
        }
        match assembler.finish() {
            Some(rest) => self.step(&rest, script).unwrap_or(RunEnd::Finished),
            None => RunEnd::Finished,
        }
    }

    /// Run a script file through this driver
    ///
    /// # Errors
    ///
    /// [`ShellError::Io`] when the file cannot be opened and
    /// [`ShellError::ScriptAborted`] when a failure stopped it.
    pub fn run_script(&mut self, path: &Path) -> Result<()> {
        if self.depth >= MAX_SCRIPT_DEPTH {
            return Err(ShellError::StateConflict(format!(
                "scripts may nest at most {} levels.",
                MAX_SCRIPT_DEPTH
            )));
        }
        let file = File::open(path).map_err(|e| ShellError::io("open", path.display(), e))?;
        let mut source = ReaderSource::new(BufReader::new(file));

        self.depth += 1;
        debug!(target: "docshell::shell", path = %path.display(), depth = self.depth, "Script started");
        let end = self.run_source(&mut source, true);
        self.depth -= 1;

        match end {
            RunEnd::Aborted => Err(ShellError::ScriptAborted(path.display().to_string())),
            RunEnd::Finished | RunEnd::Quit => Ok(()),
        }
    }

    /// Run stdin with script semantics; returns the process exit code
    pub fn run_pipe(&mut self) -> i32 {
        let stdin = io::stdin();
        let mut source = ReaderSource::new(stdin.lock());
        match self.run_source(&mut source, true) {
            RunEnd::Aborted => 1,
            RunEnd::Finished | RunEnd::Quit => 0,
        }
    }

    /// Run the interactive prompt; returns the process exit code
    pub fn run_interactive(&mut self) -> i32 {
        let mut editor = match EditorSource::new(self.registry.names()) {
            Ok(editor) => editor,
            Err(e) => {
                self.session
                    .report_error(&ShellError::Io(format!("cannot start line editor: {}", e)));
                return 1;
            }
        };
        self.run_source(&mut editor, false);
        editor.save_history();
        0
    }
}

// =========================================================================
// TAB Completion
// =========================================================================

/// Completes command names in the first word of a line
pub struct ShellHelper {
    names: Vec<&'static str>,
}

impl ShellHelper {
    fn new(mut names: Vec<&'static str>) -> Self {
        names.extend(["quit", "exit"]);
        names.sort_unstable();
        Self { names }
    }

    fn candidates(&self, prefix: &str) -> Vec<Pair> {
        let prefix = prefix.to_ascii_lowercase();
        self.names
            .iter()
            .filter(|n| n.starts_with(prefix.as_str()))
            .map(|n| Pair {
                display: n.to_string(),
                replacement: n.to_string(),
            })
            .collect()
    }
}

impl Helper for ShellHelper {}
impl Validator for ShellHelper {}
impl Highlighter for ShellHelper {}
impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_to_pos = &line[..pos];
        let leading = line_to_pos.len() - line_to_pos.trim_start().len();
        let word = &line_to_pos[leading..];
        if word.contains(char::is_whitespace) {
            // Only the command name is completed
            return Ok((pos, Vec::new()));
        }
        Ok((leading, self.candidates(word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_source_strips_line_endings() {
        let mut source = ReaderSource::new(io::Cursor::new("a b\r\nc\n"));
        assert_eq!(source.read_line(PROMPT).unwrap().as_deref(), Some("a b"));
        assert_eq!(source.read_line(PROMPT).unwrap().as_deref(), Some("c"));
        assert_eq!(source.read_line(PROMPT).unwrap(), None);
    }

    #[test]
    fn test_completion_candidates() {
        let helper = ShellHelper::new(vec!["print", "printnames", "prepare"]);
        let names: Vec<String> = helper
            .candidates("PRIN")
            .into_iter()
            .map(|p| p.replacement)
            .collect();
        assert_eq!(names, vec!["print", "printnames"]);
        assert_eq!(helper.candidates("q").len(), 1);
    }

    #[test]
    fn test_unreadable_history_is_not_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        // a directory cannot be read or written as a history file
        let path = dir.path().display().to_string();
        let mut editor = EditorSource::with_history(vec!["print"], Some(path)).unwrap();
        editor.save_history();
        assert!(dir.path().is_dir());
    }
}
