//! Index commands: declare, remove, list, look up, statistics.

use docshell_core::{IndexDescriptor, IndexLookup, LookupOperation, Value};

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::Result;
use crate::handlers::spec;
use crate::parse::{looks_like_uri, parse_descriptor, parse_switch, split_args, validation};
use crate::state::Session;

const ADD: CommandSpec = spec(
    "addindex",
    "addindex [uri] [node] <descriptor>...",
    "Add indexes to the active container",
    "Declares one or more indexes on a node. A leading URI selects the \
     node's namespace. Descriptors follow \
     [unique-]{node|edge}-{element|attribute|metadata}-{presence|equality|substring}-{syntax}.",
    1,
    usize::MAX,
);

const DELETE: CommandSpec = spec(
    "delindex",
    "delindex [uri] [node] <descriptor>...",
    "Delete indexes from the active container",
    "Removes one or more index declarations from a node.",
    1,
    usize::MAX,
);

const LIST: CommandSpec = spec(
    "listindexes",
    "listindexes",
    "List the active container's indexes",
    "Shows every declared index with the node it applies to.",
    0,
    0,
);

const LOOKUP: CommandSpec = spec(
    "lookupindex",
    "lookupindex <descriptor> <uri> <node> [op] [value]",
    "Retrieve documents through an index",
    "Looks up documents carrying the node, optionally restricted to keys \
     satisfying 'op value' where op is one of =, <, <=, >, >=. Use \"\" for \
     an empty URI.",
    3,
    5,
);

const LOOKUP_EDGE: CommandSpec = spec(
    "lookupedgeindex",
    "lookupedgeindex <descriptor> <uri> <node> <parent-uri> <parent-node> [op value]",
    "Retrieve documents through an edge index",
    "Like lookupindex, but the node must appear beneath the given parent.",
    5,
    7,
);

const STATS: CommandSpec = spec(
    "lookupstats",
    "lookupstats <descriptor> <uri> <node> [parent-uri parent-node value]",
    "Show key statistics for an index",
    "Reports the number of indexed keys, unique keys and the total key size. \
     With six arguments the parent restricts an edge index and a non-empty \
     value restricts the statistics to that key.",
    3,
    6,
);

const AUTO_INDEXING: CommandSpec = spec(
    "setautoindexing",
    "setautoindexing on|off",
    "Switch auto-indexing for the active container",
    "Turns automatic index creation on or off.",
    1,
    1,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(ADD, add_index);
    registry.register_fn(DELETE, delete_index);
    registry.register_fn(LIST, list_indexes);
    registry.register_fn(LOOKUP, lookup_index);
    registry.register_fn(LOOKUP_EDGE, lookup_edge_index);
    registry.register_fn(STATS, lookup_stats);
    registry.register_fn(AUTO_INDEXING, set_auto_indexing);
}

/// Parsed `[uri] [node] <descriptor>...`
#[derive(Debug, PartialEq)]
pub(crate) struct IndexTarget {
    pub uri: String,
    pub node: String,
    pub descriptors: Vec<IndexDescriptor>,
}

pub(crate) fn parse_index_target(spec: &CommandSpec, args: &[String]) -> Result<IndexTarget> {
    let mut rest = args;
    let mut uri = String::new();
    let mut node = String::new();

    if let Some(first) = rest.first() {
        if looks_like_uri(first) && !IndexDescriptor::is_valid(first) {
            uri = first.clone();
            rest = &rest[1..];
        }
    }
    if let Some(next) = rest.first() {
        if !IndexDescriptor::is_valid(next) && rest.len() > 1 {
            node = next.clone();
            rest = &rest[1..];
        }
    }
    if rest.is_empty() {
        return Err(validation(spec, "at least one index descriptor is required."));
    }
    let descriptors = rest
        .iter()
        .map(|d| parse_descriptor(spec, d))
        .collect::<Result<Vec<_>>>()?;
    Ok(IndexTarget {
        uri,
        node,
        descriptors,
    })
}

fn or_none(text: &str) -> &str {
    if text.is_empty() {
        "(none)"
    } else {
        text
    }
}

fn add_index(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let target = parse_index_target(spec, &args)?;
    let handle = session.active()?;
    for descriptor in &target.descriptors {
        session
            .store()
            .add_index(session.txn(), &handle, &target.uri, &target.node, descriptor)?;
        session.message(format!(
            "Added {} index: node type {}, key type {}, path type {}, node '{}', uri '{}'.",
            descriptor.uniqueness,
            descriptor.node,
            descriptor.key,
            descriptor.path,
            or_none(&target.node),
            or_none(&target.uri)
        ));
    }
    Ok(Outcome::Continue)
}

fn delete_index(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let target = parse_index_target(spec, &args)?;
    let handle = session.active()?;
    for descriptor in &target.descriptors {
        session
            .store()
            .delete_index(session.txn(), &handle, &target.uri, &target.node, descriptor)?;
        session.message(format!(
            "index {} deleted from container {}.",
            descriptor,
            handle.display_name()
        ));
    }
    Ok(Outcome::Continue)
}

fn list_indexes(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    split_args(spec, raw)?;
    let handle = session.active()?;
    let entries = session.store().list_indexes(session.txn(), &handle)?;
    session.message("===");
    for entry in &entries {
        session.message(format!(
            "Index:   {}\n\tfor node ({}):{}",
            entry.descriptor, entry.uri, entry.node
        ));
    }
    session.message(format!(
        "{} indexes found in {}.",
        entries.len(),
        handle.display_name()
    ));
    Ok(Outcome::Continue)
}

/// Optional `op value` pair; an empty op with a value means equality
fn condition(
    spec: &CommandSpec,
    op: &str,
    value: &str,
) -> Result<Option<(LookupOperation, Value)>> {
    if value.is_empty() {
        return Ok(None);
    }
    let op = if op.trim().is_empty() {
        LookupOperation::Equal
    } else {
        op.parse::<LookupOperation>()
            .map_err(|_| validation(spec, format!("invalid lookup operation '{}'.", op)))?
    };
    Ok(Some((op, Value::from(value))))
}

fn build_lookup(
    descriptor: IndexDescriptor,
    uri: &str,
    node: &str,
    cond: Option<(LookupOperation, Value)>,
) -> IndexLookup {
    let lookup = IndexLookup::new(descriptor, uri, node);
    match cond {
        Some((op, value)) => lookup.with_condition(op, value),
        None => lookup,
    }
}

fn lookup_index(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    if args.len() == 4 {
        return Err(validation(spec, "invalid number of arguments."));
    }
    let descriptor = parse_descriptor(spec, &args[0])?;
    let cond = match args.len() {
        5 => condition(spec, &args[3], &args[4])?,
        _ => None,
    };
    let handle = session.active()?;
    let lookup = build_lookup(descriptor, &args[1], &args[2], cond);
    let stream = session
        .store()
        .lookup_index(session.txn(), &handle, &lookup, session.query())?;

    let known = session.install_results(stream).known_count();
    match known {
        Some(n) => session.message(format!(
            "objects returned for eager index lookup '{}': {} objects",
            args[0], n
        )),
        None => session.message(format!("lazy index lookup '{}' completed.", args[0])),
    }
    Ok(Outcome::Continue)
}

fn lookup_edge_index(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    if args.len() == 6 {
        return Err(validation(spec, "invalid number of arguments."));
    }
    let descriptor = parse_descriptor(spec, &args[0])?;
    let cond = match args.len() {
        7 => condition(spec, &args[5], &args[6])?,
        _ => None,
    };
    let handle = session.active()?;
    let lookup =
        build_lookup(descriptor, &args[1], &args[2], cond).with_parent(&args[3], &args[4]);
    let stream = session
        .store()
        .lookup_index(session.txn(), &handle, &lookup, session.query())?;
    let n = session.install_results(stream).count()?;
    session.message(format!("lookup retrieved {} records.", n));
    Ok(Outcome::Continue)
}

fn lookup_stats(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    if args.len() != 3 && args.len() != 6 {
        return Err(validation(spec, "invalid number of arguments."));
    }
    let descriptor = parse_descriptor(spec, &args[0])?;
    let handle = session.active()?;
    let mut lookup = IndexLookup::new(descriptor, args[1].as_str(), args[2].as_str());
    if args.len() == 6 {
        if !args[4].is_empty() {
            lookup = lookup.with_parent(args[3].as_str(), args[4].as_str());
        }
        if !args[5].is_empty() {
            lookup = lookup.with_condition(LookupOperation::Equal, Value::from(args[5].as_str()));
        }
    }
    let stats = session
        .store()
        .lookup_statistics(session.txn(), &handle, &lookup)?;
    session.message(format!(
        "Number of indexed keys: {} Number of unique keys: {} Sum key value size: {}",
        stats.indexed_keys, stats.unique_keys, stats.sum_key_value_size
    ));
    Ok(Outcome::Continue)
}

fn set_auto_indexing(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let enabled = parse_switch(spec, &args[0])?;
    let handle = session.active()?;
    let shown = if enabled { "on" } else { "off" };
    if session.store().auto_indexing(session.txn(), &handle)? == enabled {
        session.message(format!(
            "auto-indexing for container '{}' already set to {}",
            handle.display_name(),
            shown
        ));
        return Ok(Outcome::Continue);
    }
    session
        .store()
        .set_auto_indexing(session.txn(), &handle, enabled)?;
    session.message(format!(
        "auto-indexing for container '{}' now set to {}",
        handle.display_name(),
        shown
    ));
    Ok(Outcome::Continue)
}
