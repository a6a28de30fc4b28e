//! Container lifecycle commands: create, open, close, aliases, maintenance.

use docshell_core::{ContainerConfig, ContainerHandle, ReindexMode};

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::{Result, ShellError};
use crate::handlers::{plural, spec};
use crate::parse::{expect_literal, split_args, validation};
use crate::state::Session;

const CREATE: CommandSpec = spec(
    "createcontainer",
    "createcontainer [path] [n|in|d|id] [validate|novalidate]",
    "Create a new container and make it active",
    "Creates and opens a container. Without arguments an unnamed in-memory \
     container with indexed node storage is created. The type selects node \
     storage (n), indexed node storage (in), whole document storage (d) or \
     indexed whole document storage (id).",
    0,
    3,
);

const OPEN: CommandSpec = spec(
    "opencontainer",
    "opencontainer <path> [validate|novalidate]",
    "Open an existing container and make it active",
    "Opens the container and pushes it on the container stack.",
    1,
    2,
);

const PRELOAD: CommandSpec = spec(
    "preload",
    "preload <container>",
    "Open a container beneath the active one",
    "Opens the container so collection() can reach it by name, while the \
     active container stays on top of the stack.",
    1,
    1,
);

const CLOSE: CommandSpec = spec(
    "close",
    "close [name]",
    "Close containers",
    "Without a name every open container is closed. With a name only the \
     containers with that name are closed; the rest keep their order.",
    0,
    1,
);

const REMOVE: CommandSpec = spec(
    "removecontainer",
    "removecontainer <name>",
    "Delete a container",
    "Closes any open handle to the container, then deletes it.",
    1,
    1,
);

const COMPACT: CommandSpec = spec(
    "compactcontainer",
    "compactcontainer <name>",
    "Compact a closed container",
    "Rewrites the container's storage. The container must not be open.",
    1,
    1,
);

const REINDEX: CommandSpec = spec(
    "reindexcontainer",
    "reindexcontainer <name> <n|d>",
    "Rebuild a closed container's indexes",
    "Re-indexes the container with node (n) or whole document (d) indexing. \
     The container must not be open.",
    2,
    2,
);

const UPGRADE: CommandSpec = spec(
    "upgradecontainer",
    "upgradecontainer <name>",
    "Upgrade a container's storage format",
    "Upgrades the on-disk format of a closed container.",
    1,
    1,
);

const ADD_ALIAS: CommandSpec = spec(
    "addalias",
    "addalias <alias> [container]",
    "Add an alias to a container",
    "Attaches an alias usable in collection(). The container defaults to the \
     active one and must be open.",
    1,
    2,
);

const REMOVE_ALIAS: CommandSpec = spec(
    "removealias",
    "removealias <alias>",
    "Remove an alias",
    "Removes the alias from the first open container carrying it, searching \
     from the top of the stack.",
    1,
    1,
);

const INFO: CommandSpec = spec(
    "info",
    "info [all]",
    "Describe open containers",
    "Shows the settings of the active container, or of every open container \
     with 'all'.",
    0,
    1,
);

const SYNC: CommandSpec = spec(
    "sync",
    "sync",
    "Flush open containers to storage",
    "Writes every open container to durable storage.",
    0,
    0,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(CREATE, create_container);
    registry.register_fn(OPEN, open_container);
    registry.register_fn(PRELOAD, preload);
    registry.register_fn(CLOSE, close);
    registry.register_fn(REMOVE, remove_container);
    registry.register_fn(COMPACT, compact_container);
    registry.register_fn(REINDEX, reindex_container);
    registry.register_fn(UPGRADE, upgrade_container);
    registry.register_fn(ADD_ALIAS, add_alias);
    registry.register_fn(REMOVE_ALIAS, remove_alias);
    registry.register_fn(INFO, info);
    registry.register_fn(SYNC, sync);
}

fn validate_flag(spec: &CommandSpec, token: Option<&String>) -> Result<bool> {
    match token {
        Some(t) => Ok(expect_literal(spec, t, &["validate", "novalidate"])? == "validate"),
        None => Ok(false),
    }
}

fn create_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let (name, config) = match args.first() {
        None => (String::new(), ContainerConfig::from_type_flag("in", false)),
        Some(name) => {
            let validate = validate_flag(spec, args.get(2))?;
            let config = match args.get(1) {
                Some(flag) => {
                    let flag = expect_literal(spec, flag, &["n", "in", "d", "id"])?;
                    ContainerConfig::from_type_flag(flag, validate)
                }
                None => Some(ContainerConfig {
                    validate,
                    ..ContainerConfig::default()
                }),
            };
            (name.clone(), config)
        }
    };
    let config = config.ok_or_else(|| validation(spec, "invalid container type."))?;

    session.create_container(&name, &config)?;
    let shown = if name.is_empty() {
        "in-memory container"
    } else {
        name.as_str()
    };
    session.message(format!("{} created and opened.", shown));
    let open = session.containers().len();
    session.detail(format!(
        "You have {} open.",
        plural(open, "container", "containers")
    ));
    Ok(Outcome::Continue)
}

fn open_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let config = ContainerConfig {
        validate: validate_flag(spec, args.get(1))?,
        ..ContainerConfig::default()
    };
    session.open_container(&args[0], &config)?;
    session.message(format!("container {} opened.", args[0]));
    Ok(Outcome::Continue)
}

fn preload(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.preload(&args[0])?;
    session.message(format!("preloaded {}", args[0]));
    Ok(Outcome::Continue)
}

fn close(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.close(args.first().map(String::as_str))?;
    Ok(Outcome::Continue)
}

fn remove_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.close_quietly(&args[0])?;
    session.store().remove_container(session.txn(), &args[0])?;
    session.message(format!("Container removed: {}", args[0]));
    Ok(Outcome::Continue)
}

fn compact_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.store().compact_container(session.txn(), &args[0])?;
    session.message(format!("Container compacted: {}", args[0]));
    Ok(Outcome::Continue)
}

fn reindex_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let mode = match expect_literal(spec, &args[1], &["n", "d"])? {
        "n" => ReindexMode::IndexNodes,
        _ => ReindexMode::NoIndexNodes,
    };
    session
        .store()
        .reindex_container(session.txn(), &args[0], mode)?;
    session.message(format!("Container reindexed: {}", args[0]));
    Ok(Outcome::Continue)
}

fn upgrade_container(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    session.store().upgrade_container(&args[0])?;
    session.message(format!("container {} upgraded.", args[0]));
    Ok(Outcome::Continue)
}

fn add_alias(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = match args.get(1) {
        Some(name) => session.find_open(name).ok_or_else(|| {
            ShellError::StateConflict(format!("Container {} not found in the stack.", name))
        })?,
        None => session.active()?,
    };
    session.store().add_alias(&handle, &args[0])?;
    session.message(format!(
        "alias '{}' added to container '{}'.",
        args[0],
        handle.display_name()
    ));
    Ok(Outcome::Continue)
}

fn remove_alias(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let alias = &args[0];
    let stack: Vec<ContainerHandle> = session.containers().iter().rev().cloned().collect();
    for handle in stack {
        if session.store().remove_alias(&handle, alias)? {
            session.message(format!(
                "removed alias '{}' from container '{}'.",
                alias,
                handle.display_name()
            ));
            return Ok(Outcome::Continue);
        }
    }
    session.warn(format!("alias '{}' does not exist on any container.", alias));
    Ok(Outcome::Continue)
}

fn describe(session: &mut Session, handle: &ContainerHandle) -> Result<()> {
    let info = session.store().container_info(handle)?;
    let aliases = if info.aliases.is_empty() {
        "(none)".to_string()
    } else {
        info.aliases.join(", ")
    };
    session.message(format!("Container name: {}", handle.display_name()));
    session.message(format!("  container type: {}", info.kind));
    session.message(format!("  index nodes: {}", info.index_nodes));
    session.message(format!("  transactional: {}", info.transactional));
    session.message(format!("  alias: {}", aliases));
    session.message(format!("  allow validation: {}", info.validate));
    session.message(format!("  auto-indexing: {}", info.auto_indexing));
    session.message(format!("  documents: {}", info.document_count));
    session.message(format!("  indexes: {}", info.index_count));
    Ok(())
}

fn info(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let all = match args.first() {
        Some(t) => {
            expect_literal(spec, t, &["all"])?;
            true
        }
        None => false,
    };

    if !all {
        let handle = session.active()?;
        describe(session, &handle)?;
        return Ok(Outcome::Continue);
    }

    let stack: Vec<ContainerHandle> = session.containers().iter().rev().cloned().collect();
    if stack.is_empty() {
        return Err(ShellError::StateConflict(
            crate::state::NO_CONTAINER.to_string(),
        ));
    }
    for handle in stack {
        session.message("==========================");
        describe(session, &handle)?;
    }
    Ok(Outcome::Continue)
}

fn sync(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    split_args(spec, raw)?;
    let stack: Vec<ContainerHandle> = session.containers().to_vec();
    for handle in stack.iter().rev() {
        session.detail(format!("syncing {}...", handle.display_name()));
        session.store().sync_container(handle)?;
    }
    session.message("containers synced.");
    Ok(Outcome::Continue)
}
