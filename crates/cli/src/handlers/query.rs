//! Query commands: ad hoc and prepared queries, plans, context queries,
//! printing the current results.

use std::fs::{self, File};
use std::io::{BufWriter, Write};

use docshell_core::{EvaluationMode, QueryContext};

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::cursor::PrintMode;
use crate::error::{Result, ShellError};
use crate::handlers::spec;
use crate::parse::{expect_literal, split_args};
use crate::state::Session;

const QUERY: CommandSpec = spec(
    "query",
    "query [expr] [f]",
    "Run a query",
    "Evaluates the expression and keeps the results for print. Without an \
     expression the prepared one runs. With 'f' the expression is read from \
     the named file.",
    0,
    2,
);

const CQUERY: CommandSpec = spec(
    "cquery",
    "cquery <expr>",
    "Run a query eagerly and report the count",
    "Evaluates the expression in eager mode regardless of setlazy.",
    1,
    1,
);

const PREPARE: CommandSpec = spec(
    "prepare",
    "prepare <expr>",
    "Prepare a query for repeated use",
    "Compiles the expression; 'query' without arguments runs it. Preparing \
     again replaces the previous expression.",
    1,
    1,
);

const CONTEXT_QUERY: CommandSpec = spec(
    "contextquery",
    "contextquery <expr>",
    "Run a query against each current result",
    "Evaluates the expression once per item of the current results, with the \
     item as the context item '.', and replaces the results with everything \
     produced.",
    1,
    1,
);

const QUERY_PLAN: CommandSpec = spec(
    "queryplan",
    "queryplan [expr] [path]",
    "Show or save a query plan",
    "Prepares the expression (or uses the prepared one) and shows its plan. \
     With a path the plan is written to that file instead.",
    0,
    2,
);

const PRINT: CommandSpec = spec(
    "print",
    "print [count] [path]",
    "Print the current results",
    "Prints documents as content and values as text. A count of 0 prints \
     every result, a negative count prints until the results run out. With a \
     path the output is also written to that file.",
    0,
    2,
);

const PRINT_NAMES: CommandSpec = spec(
    "printnames",
    "printnames [count] [path]",
    "Print the names of the current result documents",
    "Like print, but shows document names.",
    0,
    2,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(QUERY, query);
    registry.register_fn(CQUERY, cquery);
    registry.register_fn(PREPARE, prepare);
    registry.register_fn(CONTEXT_QUERY, context_query);
    registry.register_fn(QUERY_PLAN, query_plan);
    registry.register_fn(PRINT, print);
    registry.register_fn(PRINT_NAMES, print_names);
}

fn results_phrase(n: usize) -> &'static str {
    if n == 1 {
        "result"
    } else {
        "result(s)"
    }
}

fn query(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;

    let Some(first) = args.first() else {
        let text = session
            .expression()
            .map(|e| e.text().to_string())
            .ok_or_else(|| ShellError::StateConflict("No query provided or prepared.".to_string()))?;
        let stream = session.execute_prepared()?.ok_or_else(|| {
            ShellError::StateConflict("No query provided or prepared.".to_string())
        })?;
        let n = session.install_results(stream).count()?;
        session.message(format!(
            "prepared query '{}' returned {} {}.",
            text,
            n,
            results_phrase(n)
        ));
        return Ok(Outcome::Continue);
    };

    let text = match args.get(1) {
        Some(flag) => {
            expect_literal(spec, flag, &["f"])?;
            let path = session.resolve_path(first);
            fs::read_to_string(&path).map_err(|e| ShellError::io("read", path.display(), e))?
        }
        None => first.clone(),
    };
    let stream = session.store().query(session.txn(), &text, session.query())?;
    let n = session.install_results(stream).count()?;
    session.message(format!(
        "query '{}' returned {} {}.",
        text.trim(),
        n,
        results_phrase(n)
    ));
    Ok(Outcome::Continue)
}

fn cquery(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let eager = QueryContext {
        mode: EvaluationMode::Eager,
        ..session.query().clone()
    };
    let stream = session.store().query(session.txn(), &args[0], &eager)?;
    let n = session.install_results(stream).count()?;
    session.message(format!(
        "{} objects returned for eager expression '{}'.",
        n, args[0]
    ));
    Ok(Outcome::Continue)
}

fn prepare(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.prepare(&args[0])?;
    let kind = match session.expression() {
        Some(e) if e.is_update() => "update",
        _ => "query",
    };
    session.detail(format!("{} expression '{}' prepared.", kind, args[0]));
    Ok(Outcome::Continue)
}

fn context_query(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let n = session.context_query(&args[0])?;
    session.message(format!("query returned {} results.", n));
    Ok(Outcome::Continue)
}

fn query_plan(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    if let Some(expr) = args.first().filter(|e| !e.is_empty()) {
        session.prepare(expr)?;
    }
    let plan = session
        .expression()
        .map(|e| e.plan())
        .ok_or_else(|| ShellError::StateConflict("No query provided or prepared.".to_string()))?;

    let Some(target) = args.get(1) else {
        session.message("Query Plan:");
        session.message(plan);
        return Ok(Outcome::Continue);
    };
    session.detail("Query Plan:");
    session.detail(plan.clone());
    let path = session.resolve_path(target);
    fs::write(&path, plan).map_err(|e| ShellError::io("write", path.display(), e))?;
    session.message(format!("Query plan saved to '{}'.", path.display()));
    Ok(Outcome::Continue)
}

/// `[count] [path]`: a lone argument is a count when it parses as one
fn print_args(args: &[String]) -> std::result::Result<(i64, Option<&str>), String> {
    match args {
        [] => Ok((0, None)),
        [one] => match one.parse::<i64>() {
            Ok(n) => Ok((n, None)),
            Err(_) => Ok((0, Some(one.as_str()))),
        },
        [count, path, ..] => count
            .parse::<i64>()
            .map(|n| (n, Some(path.as_str())))
            .map_err(|_| format!("invalid count '{}'.", count)),
    }
}

fn print_with(
    session: &mut Session,
    spec: &CommandSpec,
    raw: &str,
    mode: PrintMode,
) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let (limit, path) = print_args(&args).map_err(|m| crate::parse::validation(spec, m))?;

    let printable = session
        .cursor_mut()
        .is_some_and(|c| c.known_count() != Some(0));
    if !printable {
        session.warn("No results to print.");
        return Ok(Outcome::Continue);
    }
    let Some(cursor) = session.cursor_mut() else {
        return Ok(Outcome::Continue);
    };
    let rendered = cursor.render(limit, mode)?;

    let mut tee = match path {
        Some(p) => {
            let resolved = session.resolve_path(p);
            let file = File::create(&resolved)
                .map_err(|e| ShellError::io("create", resolved.display(), e))?;
            Some((resolved, BufWriter::new(file)))
        }
        None => None,
    };

    for line in &rendered.lines {
        session.message(line.clone());
        if let Some((resolved, writer)) = tee.as_mut() {
            writeln!(writer, "{}", line)
                .map_err(|e| ShellError::io("write", resolved.display(), e))?;
        }
    }
    if rendered.values_without_names {
        session.warn("result set holds values - no names are available");
    }
    if let Some((resolved, mut writer)) = tee {
        writer
            .flush()
            .map_err(|e| ShellError::io("write", resolved.display(), e))?;
        session.message(format!("output written to {}.", resolved.display()));
    }
    Ok(Outcome::Continue)
}

fn print(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    print_with(session, spec, raw, PrintMode::Content)
}

fn print_names(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    print_with(session, spec, raw, PrintMode::Names)
}
