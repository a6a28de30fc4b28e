//! Query option and shell mode settings.

use docshell_core::{EvaluationMode, Value};

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::Result;
use crate::handlers::spec;
use crate::parse::{parse_bool_switch, parse_switch, split_args, validation};
use crate::state::Session;

const LAZY: CommandSpec = spec(
    "setlazy",
    "setlazy on|off",
    "Switch lazy query evaluation",
    "Lazy results are produced on demand and their count is only known after \
     a full scan. Eager results are computed up front.",
    1,
    1,
);

const PROJECTION: CommandSpec = spec(
    "setprojection",
    "setprojection on|off",
    "Switch document projection",
    "Enables or disables the document projection optimisation.",
    1,
    1,
);

const TIMEOUT: CommandSpec = spec(
    "setquerytimeout",
    "setquerytimeout <seconds>",
    "Set the query timeout",
    "Queries running longer than this fail. 0 disables the timeout.",
    1,
    1,
);

const VARIABLE: CommandSpec = spec(
    "setvariable",
    "setvariable <name> <value>",
    "Bind an external query variable",
    "Binds $name for later queries. A leading '$' on the name is optional.",
    2,
    2,
);

const NAMESPACE: CommandSpec = spec(
    "setnamespace",
    "setnamespace <prefix> <uri>",
    "Bind a namespace prefix",
    "Binds the prefix to the URI for later queries.",
    2,
    2,
);

const BASE_URI: CommandSpec = spec(
    "setbaseuri",
    "setbaseuri [uri]",
    "Show or set the base URI",
    "Without an argument shows the current base URI.",
    0,
    1,
);

const VERBOSE: CommandSpec = spec(
    "setverbose",
    "setverbose on|off",
    "Switch verbose output",
    "Verbose output shows extra detail and times every command.",
    1,
    1,
);

const IGNORE: CommandSpec = spec(
    "setignore",
    "setignore on|off|true|false",
    "Switch ignore-errors mode for scripts",
    "When on, a failing command does not stop the running script.",
    1,
    1,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(LAZY, set_lazy);
    registry.register_fn(PROJECTION, set_projection);
    registry.register_fn(TIMEOUT, set_query_timeout);
    registry.register_fn(VARIABLE, set_variable);
    registry.register_fn(NAMESPACE, set_namespace);
    registry.register_fn(BASE_URI, set_base_uri);
    registry.register_fn(VERBOSE, set_verbose);
    registry.register_fn(IGNORE, set_ignore);
}

fn set_lazy(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let mode = if parse_switch(spec, &args[0])? {
        EvaluationMode::Lazy
    } else {
        EvaluationMode::Eager
    };
    session.query_mut().mode = mode;
    session.message(format!("Evaluation type set to {}.", mode));
    Ok(Outcome::Continue)
}

fn set_projection(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let on = parse_switch(spec, &args[0])?;
    session.query_mut().projection = on;
    session.message(if on {
        "Document projection enabled."
    } else {
        "Document projection disabled."
    });
    Ok(Outcome::Continue)
}

fn set_query_timeout(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let secs = args[0]
        .parse::<u32>()
        .map_err(|_| validation(spec, format!("invalid timeout '{}'.", args[0])))?;
    session.query_mut().timeout_secs = secs;
    session.message(format!("Setting query timeout to {} seconds", secs));
    Ok(Outcome::Continue)
}

fn set_variable(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let name = args[0].strip_prefix('$').unwrap_or(&args[0]);
    if name.is_empty() {
        return Err(validation(spec, "variable name is empty."));
    }
    session
        .query_mut()
        .variables
        .insert(name.to_string(), Value::from(args[1].as_str()));
    session.message(format!("Setting ${} = {}", name, args[1]));
    Ok(Outcome::Continue)
}

fn set_namespace(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session
        .query_mut()
        .namespaces
        .insert(args[0].clone(), args[1].clone());
    session.message(format!(
        "Namespace prefix '{}' bound to '{}'.",
        args[0], args[1]
    ));
    Ok(Outcome::Continue)
}

fn set_base_uri(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    match args.first() {
        None => {
            let current = session.query().base_uri.clone();
            session.message(format!("Base URI = '{}'", current));
        }
        Some(uri) => {
            session.query_mut().base_uri = uri.clone();
            session.message(format!("Current Base URI: '{}'.", uri));
        }
    }
    Ok(Outcome::Continue)
}

fn set_verbose(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let on = parse_switch(spec, &args[0])?;
    session.set_verbose(on);
    session.detail("Verbose output enabled.");
    Ok(Outcome::Continue)
}

fn set_ignore(_session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    Ok(Outcome::IgnoreErrors(parse_bool_switch(spec, &args[0])?))
}
