//! Transaction commands.

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::Result;
use crate::handlers::spec;
use crate::parse::split_args;
use crate::state::Session;

const BEGIN: CommandSpec = spec(
    "transaction",
    "transaction",
    "Begin a transaction",
    "Later commands run inside the transaction until commit or abort. An \
     active transaction is committed first. Requires --transactional.",
    0,
    0,
);

const COMMIT: CommandSpec = spec(
    "commit",
    "commit",
    "Commit the active transaction",
    "Makes the transaction's changes visible.",
    0,
    0,
);

const ABORT: CommandSpec = spec(
    "abort",
    "abort",
    "Abort the active transaction",
    "Discards the transaction's changes.",
    0,
    0,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(BEGIN, begin);
    registry.register_fn(COMMIT, commit);
    registry.register_fn(ABORT, abort);
}

fn begin(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    split_args(spec, raw)?;
    session.begin()?;
    Ok(Outcome::Continue)
}

fn commit(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    split_args(spec, raw)?;
    session.commit()?;
    Ok(Outcome::Continue)
}

fn abort(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    split_args(spec, raw)?;
    session.abort()?;
    Ok(Outcome::Continue)
}
