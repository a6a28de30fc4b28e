//! Document commands: insert, bulk insert, fetch, metadata, delete.

use std::fs;

use docshell_core::{
    Document, IndexDescriptor, IndexLookup, Item, LookupOperation, MetadataKey, Value,
    NAME_METADATA_NODE, NAME_METADATA_URI,
};
use tracing::debug;

use crate::commands::{CommandSpec, Outcome, Registry};
use crate::error::{Result, ShellError};
use crate::handlers::{plural, spec};
use crate::parse::{expect_literal, glob_to_regex, split_args, validation};
use crate::state::Session;

const PUT: CommandSpec = spec(
    "putdocument",
    "putdocument <name> <content|file|query> [f|s|q]",
    "Insert a document into the active container",
    "Stores a document under the given name. The second argument is the \
     document text (s, the default), a file to read (f), or a query whose \
     results are stored (q). An empty name generates one.",
    1,
    3,
);

const PUT_MANY: CommandSpec = spec(
    "putdocuments",
    "putdocuments <dirpath> [pattern]",
    "Insert every matching file in a directory",
    "Stores each file in the directory whose name matches the pattern \
     (default *.xml) as a document named after the file, then syncs the \
     active container.",
    1,
    2,
);

const GET: CommandSpec = spec(
    "getdocuments",
    "getdocuments [name]",
    "Retrieve documents from the active container",
    "Fetches every document, or the one with the given name, into the \
     current results.",
    0,
    1,
);

const GET_METADATA: CommandSpec = spec(
    "getmetadata",
    "getmetadata <document>",
    "Show a document's metadata",
    "Lists every metadata entry of the document, the built-in name first.",
    1,
    1,
);

const SET_METADATA: CommandSpec = spec(
    "setmetadata",
    "setmetadata <document> <uri> <name> <value>",
    "Set a metadata item on a document",
    "Adds or replaces the metadata item {uri}:name on the document.",
    4,
    4,
);

const REMOVE: CommandSpec = spec(
    "removedocument",
    "removedocument <name>",
    "Delete a document from the active container",
    "Deletes the named document.",
    1,
    1,
);

pub(crate) fn register(registry: &mut Registry) {
    registry.register_fn(PUT, put_document);
    registry.register_fn(PUT_MANY, put_documents);
    registry.register_fn(GET, get_documents);
    registry.register_fn(GET_METADATA, get_metadata);
    registry.register_fn(SET_METADATA, set_metadata);
    registry.register_fn(REMOVE, remove_document);
}

fn put_document(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    let name = args[0].as_str();
    let source = args.get(1).map(String::as_str).unwrap_or("");
    let mode = match args.get(2) {
        Some(m) => expect_literal(spec, m, &["f", "s", "q"])?,
        None => "s",
    };

    let mut stored = Vec::new();
    match mode {
        "f" => {
            let path = session.resolve_path(source);
            let content =
                fs::read_to_string(&path).map_err(|e| ShellError::io("read", path.display(), e))?;
            let doc = Document::new(name, content);
            stored.push(
                session
                    .store()
                    .put_document(session.txn(), &handle, doc, name.is_empty())?,
            );
        }
        "q" => {
            let mut results = session.store().query(session.txn(), source, session.query())?;
            let mut items = Vec::new();
            while let Some(item) = results.next_item()? {
                items.push(item);
            }
            session.message(format!("Query returned {} results.", items.len()));
            let generate = name.is_empty() || items.len() > 1;
            for item in items {
                let content = match item {
                    Item::Document(doc) => doc.content,
                    Item::Value(v) => v.to_string(),
                };
                let doc = Document::new(name, content);
                stored.push(session.store().put_document(session.txn(), &handle, doc, generate)?);
            }
        }
        _ => {
            let doc = Document::new(name, source);
            stored.push(
                session
                    .store()
                    .put_document(session.txn(), &handle, doc, name.is_empty())?,
            );
        }
    }

    for doc_name in stored {
        session.message(format!(
            "document '{}' added to container '{}'.",
            doc_name,
            handle.display_name()
        ));
    }
    Ok(Outcome::Continue)
}

fn put_documents(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    let dir = session.resolve_path(&args[0]);
    if !dir.is_dir() {
        return Err(validation(spec, format!("Directory doesn't exist: {}", args[0])));
    }
    let pattern = args.get(1).map(String::as_str).unwrap_or("*.xml");
    let matcher = glob_to_regex(pattern)
        .map_err(|e| validation(spec, format!("invalid pattern '{}': {}", pattern, e)))?;

    let entries = fs::read_dir(&dir).map_err(|e| ShellError::io("read", dir.display(), e))?;
    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| matcher.is_match(n))
        })
        .collect();
    files.sort();

    let mut inserted = 0;
    for path in files {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&file_name)
            .to_string();
        session.detail(format!("inserting document {}...", stem));
        let content =
            fs::read_to_string(&path).map_err(|e| ShellError::io("read", path.display(), e))?;
        session
            .store()
            .put_document(session.txn(), &handle, Document::new(file_name, content), false)?;
        inserted += 1;
    }
    debug!(target: "docshell::shell", dir = %dir.display(), inserted, "Bulk insert finished");

    session.detail(format!("syncing container {}...", handle.display_name()));
    session.store().sync_container(&handle)?;
    session.message(format!(
        "{} documents inserted into {} container.",
        inserted,
        handle.display_name()
    ));
    Ok(Outcome::Continue)
}

/// Descriptor of the index every container keeps on document names
fn name_index() -> Result<IndexDescriptor> {
    "unique-node-metadata-equality-string"
        .parse::<IndexDescriptor>()
        .map_err(ShellError::from)
}

fn get_documents(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    let stream = match args.first() {
        None => session
            .store()
            .all_documents(session.txn(), &handle, session.query())?,
        Some(name) => {
            let lookup = IndexLookup::new(name_index()?, NAME_METADATA_URI, NAME_METADATA_NODE)
                .with_condition(LookupOperation::Equal, Value::from(name.as_str()));
            session
                .store()
                .lookup_index(session.txn(), &handle, &lookup, session.query())?
        }
    };
    let n = session.install_results(stream).count()?;
    session.message(format!("{} retrieved.", plural(n, "document", "documents")));
    Ok(Outcome::Continue)
}

fn get_metadata(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    let doc = session
        .store()
        .get_document(session.txn(), &handle, &args[0])?;
    session.message(format!("Metadata for document {}:", doc.name));
    for (key, value) in doc.metadata_entries() {
        session.message(format!("{{{}}}:{}\t{}", key.uri, key.name, value));
    }
    Ok(Outcome::Continue)
}

fn set_metadata(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    let (doc_name, uri, name, value) = (&args[0], &args[1], &args[2], &args[3]);
    if uri == NAME_METADATA_URI && name == NAME_METADATA_NODE {
        return Err(validation(spec, "the built-in name metadata item cannot be set."));
    }
    let mut doc = session
        .store()
        .get_document(session.txn(), &handle, doc_name)?;
    doc.metadata
        .insert(MetadataKey::new(uri.as_str(), name.as_str()), Value::from(value.as_str()));
    session.store().update_document(session.txn(), &handle, doc)?;
    session.message(format!(
        "Metadata item '{}:{}' added to document {}",
        uri, name, doc_name
    ));
    Ok(Outcome::Continue)
}

fn remove_document(session: &mut Session, spec: &CommandSpec, raw: &str) -> Result<Outcome> {
    let args = split_args(spec, raw)?;
    let handle = session.active()?;
    session
        .store()
        .delete_document(session.txn(), &handle, &args[0])?;
    session.message(format!(
        "document '{}' deleted from container '{}'.",
        args[0],
        handle.display_name()
    ));
    Ok(Outcome::Continue)
}
