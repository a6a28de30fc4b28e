//! Commands that steer the driver: help, echo, time, run.

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::{Result, ShellError};
use crate::handlers::spec;
use crate::parse::split_args;
use crate::state::Session;

const HELP: CommandSpec = spec(
    "help",
    "help [command]",
    "List commands or describe one",
    "Without an argument lists every command. Command names may be \
     abbreviated anywhere, including here.",
    0,
    1,
);

const ECHO: CommandSpec = spec(
    "echo",
    "echo <text>",
    "Print text",
    "Prints the rest of the line exactly as typed.",
    0,
    usize::MAX,
);

const TIME: CommandSpec = spec(
    "time",
    "time <command>",
    "Run a command and report how long it took",
    "Runs the command line that follows and reports its run time.",
    1,
    usize::MAX,
);

const RUN: CommandSpec = spec(
    "run",
    "run <scriptfile>",
    "Run a script file",
    "Runs each line of the file as a command. Scripts may run other scripts.",
    1,
    1,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(HELP, help);
    registry.register_fn(ECHO, echo);
    registry.register_fn(TIME, time);
    registry.register_fn(RUN, run);
}

fn help(_session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    Ok(Outcome::Help(args.into_iter().next()))
}

fn echo(_session: &mut Session, _spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    Ok(Outcome::Echo(raw.to_string()))
}

fn time(_session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    if raw.trim().is_empty() {
        return Err(ShellError::MalformedArgs {
            message: "missing parameters".to_string(),
            usage: spec.usage.to_string(),
        });
    }
    Ok(Outcome::Time(raw.trim().to_string()))
}

fn run(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    Ok(Outcome::RunScript(session.resolve_path(&args[0])))
}
