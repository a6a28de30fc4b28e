//! docshell: interactive command shell for a document store.
//!
//! Three modes:
//! - **Script mode**: `docshell -s FILE` runs the file and exits
//! - **REPL mode**: `docshell` with a terminal on stdin
//! - **Pipe mode**: `cat cmds.txt | docshell` reads stdin line by line with
//!   script semantics
//!
//! Exit code is 1 when startup fails or a script aborts, else 0.

mod commands;
mod cursor;
mod error;
mod format;
mod handlers;
mod options;
mod parse;
mod repl;
mod state;

#[cfg(test)]
mod tests;

use std::env;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use docshell_engine::{Database, OpenOptions};
use tracing_subscriber::EnvFilter;

use error::ShellError;
use format::{error_records, ConsoleReporter, Reporter};
use options::{build_cli, resolve_home, ShellOptions, HOME_ENV};
use repl::Driver;
use state::Session;

fn main() {
    let matches = build_cli().get_matches();
    let options = ShellOptions::from_matches(&matches);
    init_tracing(options.verbose);
    // `run` returns only after the session is torn down
    let code = run(options);
    process::exit(code);
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default filter
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn run(options: ShellOptions) -> i32 {
    let (mut driver, script) = match start(&options) {
        Ok(started) => started,
        Err(e) => {
            let mut console = ConsoleReporter;
            for record in error_records(&e) {
                console.report(record);
            }
            return 1;
        }
    };

    if let Some(script) = script {
        match driver.run_script(&script) {
            Ok(()) => 0,
            Err(e) => {
                driver.session_mut().report_error(&e);
                1
            }
        }
    } else if std::io::stdin().is_terminal() {
        driver.run_interactive()
    } else {
        driver.run_pipe()
    }
}

/// Resolve and enter the home directory, open the store, build the driver
///
/// Also returns the script to run, resolved against the starting directory.
fn start(options: &ShellOptions) -> Result<(Driver, Option<PathBuf>), ShellError> {
    let cwd = env::current_dir()
        .map_err(|e| ShellError::Io(format!("cannot read the current directory: {}", e)))?;
    let env_home = env::var(HOME_ENV).ok();
    let home = resolve_home(options.home.as_deref(), env_home.as_deref(), &cwd);
    prepare_home(&home, options.create)?;
    env::set_current_dir(&home).map_err(|e| ShellError::io("enter", home.display(), e))?;

    let db = Database::open(
        &home,
        OpenOptions {
            transactional: options.transactional,
            cache_size_mb: options.cache_size_mb,
        },
    )?;

    let mut session = Session::new(Arc::new(db), home, Box::new(ConsoleReporter));
    session.set_verbose(options.verbose);
    if options.password.is_some() && !session.capabilities().encryption {
        session.warn("encryption is not available in this store; continuing unencrypted.");
    }

    let script = options.script.as_deref().map(|s| script_path(&cwd, s));
    Ok((Driver::new(session), script))
}

fn prepare_home(home: &Path, create: bool) -> Result<(), ShellError> {
    if home.is_dir() {
        return Ok(());
    }
    if !create {
        return Err(ShellError::Io(format!(
            "home directory '{}' does not exist; use --create to create it.",
            home.display()
        )));
    }
    fs::create_dir_all(home).map_err(|e| ShellError::io("create", home.display(), e))
}

fn script_path(cwd: &Path, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        cwd.join(script)
    }
}
