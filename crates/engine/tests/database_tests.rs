//! Integration tests for the reference document store
//!
//! These tests drive `Database` through the `DocumentStore` trait:
//! - Container create/open/close/remove and persistence across reopen
//! - Documents, metadata and unique indexes
//! - Queries in eager and lazy mode, prepared expressions
//! - Index lookups and statistics
//! - Snapshot transactions

use docshell_core::{
    ContainerConfig, Document, DocumentStore, Error, EvaluationMode, IndexLookup, Item,
    LookupOperation, MetadataKey, QueryContext, ReindexMode, ResultStream, Value,
    NAME_METADATA_NODE, NAME_METADATA_URI,
};
use docshell_engine::{Database, OpenOptions};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    Database::open(dir.path(), OpenOptions::default()).expect("Failed to open database")
}

fn open_transactional(dir: &TempDir) -> Database {
    Database::open(
        dir.path(),
        OpenOptions {
            transactional: true,
            cache_size_mb: None,
        },
    )
    .expect("Failed to open database")
}

fn drain(mut results: Box<dyn ResultStream>) -> Vec<Item> {
    let mut items = Vec::new();
    while let Some(item) = results.next_item().unwrap() {
        items.push(item);
    }
    items
}

fn names(items: &[Item]) -> Vec<String> {
    items
        .iter()
        .filter_map(|i| i.as_document().map(|d| d.name.clone()))
        .collect()
}

fn context_for(handle: &docshell_core::ContainerHandle) -> QueryContext {
    QueryContext {
        default_collection: Some(handle.clone()),
        ..QueryContext::default()
    }
}

const BOOKS: [(&str, &str); 3] = [
    ("dune", r#"<book id="1"><title>Dune</title><price>9.50</price></book>"#),
    ("emma", r#"<book id="2"><title>Emma</title><price>12</price></book>"#),
    ("ulysses", r#"<book id="3"><title>Ulysses</title><price>30</price></book>"#),
];

// ============================================================================
// Containers
// ============================================================================

#[test]
fn test_open_writes_default_config() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    assert!(dir.path().join("docshell.toml").exists());
    assert_eq!(db.config().cache_size_mb, 64);
}

#[test]
fn test_cache_size_override() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(
        dir.path(),
        OpenOptions {
            transactional: false,
            cache_size_mb: Some(256),
        },
    )
    .unwrap();
    assert_eq!(db.config().cache_size_mb, 256);
}

#[test]
fn test_open_missing_home_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");
    assert!(matches!(
        Database::open(&missing, OpenOptions::default()),
        Err(Error::Io { .. })
    ));
}

#[test]
fn test_container_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        let h = db
            .create_container(None, "books.dbxml", &ContainerConfig::default())
            .unwrap();
        for (name, content) in BOOKS {
            db.put_document(None, &h, Document::new(name, content), false)
                .unwrap();
        }
        db.add_alias(&h, "books").unwrap();
        db.close_container(&h).unwrap();
    }

    let db = open(&dir);
    let h = db
        .open_container(None, "books.dbxml", &ContainerConfig::default())
        .unwrap();
    let info = db.container_info(&h).unwrap();
    assert_eq!(info.document_count, 3);
    assert_eq!(info.aliases, vec!["books".to_string()]);
}

#[test]
fn test_create_existing_container_fails() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    db.create_container(None, "c.dbxml", &ContainerConfig::default())
        .unwrap();
    assert!(matches!(
        db.create_container(None, "c.dbxml", &ContainerConfig::default()),
        Err(Error::ContainerExists { .. })
    ));
}

#[test]
fn test_open_missing_container_fails() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    assert!(matches!(
        db.open_container(None, "missing.dbxml", &ContainerConfig::default()),
        Err(Error::ContainerNotFound { .. })
    ));
}

#[test]
fn test_in_memory_containers_are_independent() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let a = db.create_container(None, "", &ContainerConfig::default()).unwrap();
    let b = db.create_container(None, "", &ContainerConfig::default()).unwrap();
    assert!(a.is_in_memory());
    db.put_document(None, &a, Document::new("x", "<x/>"), false)
        .unwrap();
    assert_eq!(db.container_info(&a).unwrap().document_count, 1);
    assert_eq!(db.container_info(&b).unwrap().document_count, 0);
    db.close_container(&a).unwrap();
    assert!(db.container_info(&a).is_err());
}

#[test]
fn test_remove_container_requires_closed() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db
        .create_container(None, "gone.dbxml", &ContainerConfig::default())
        .unwrap();
    assert!(matches!(
        db.remove_container(None, "gone.dbxml"),
        Err(Error::ContainerOpen { .. })
    ));
    db.close_container(&h).unwrap();
    db.remove_container(None, "gone.dbxml").unwrap();
    assert!(!dir.path().join("gone.dbxml").exists());
    assert!(matches!(
        db.remove_container(None, "gone.dbxml"),
        Err(Error::ContainerNotFound { .. })
    ));
}

#[test]
fn test_reindex_compact_upgrade_closed_container() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db
        .create_container(None, "r.dbxml", &ContainerConfig::default())
        .unwrap();
    db.close_container(&h).unwrap();

    db.reindex_container(None, "r.dbxml", ReindexMode::IndexNodes)
        .unwrap();
    db.compact_container(None, "r.dbxml").unwrap();
    db.upgrade_container("r.dbxml").unwrap();

    let h = db
        .open_container(None, "r.dbxml", &ContainerConfig::default())
        .unwrap();
    assert!(db.container_info(&h).unwrap().index_nodes);
}

#[test]
fn test_sync_without_close() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db
        .create_container(None, "s.dbxml", &ContainerConfig::default())
        .unwrap();
    db.put_document(None, &h, Document::new("a", "<a/>"), false)
        .unwrap();
    db.sync_container(&h).unwrap();
    let text = std::fs::read_to_string(dir.path().join("s.dbxml")).unwrap();
    assert!(text.contains("\"a\""));
}

// ============================================================================
// Documents
// ============================================================================

#[test]
fn test_document_crud_and_metadata() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db.create_container(None, "", &ContainerConfig::default()).unwrap();

    db.put_document(None, &h, Document::new("a", "<a/>"), false)
        .unwrap();
    assert!(matches!(
        db.put_document(None, &h, Document::new("a", "<a/>"), false),
        Err(Error::DocumentExists { .. })
    ));

    let mut doc = db.get_document(None, &h, "a").unwrap();
    doc.metadata
        .insert(MetadataKey::new("urn:m", "author"), Value::from("ann"));
    db.update_document(None, &h, doc).unwrap();
    let doc = db.get_document(None, &h, "a").unwrap();
    assert_eq!(doc.metadata_value("urn:m", "author"), Some(Value::from("ann")));

    db.delete_document(None, &h, "a").unwrap();
    assert!(matches!(
        db.get_document(None, &h, "a"),
        Err(Error::DocumentNotFound { .. })
    ));
}

#[test]
fn test_generated_document_names_are_unique() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db.create_container(None, "", &ContainerConfig::default()).unwrap();
    let a = db
        .put_document(None, &h, Document::new("", "<a/>"), true)
        .unwrap();
    let b = db
        .put_document(None, &h, Document::new("", "<b/>"), true)
        .unwrap();
    assert_ne!(a, b);
    assert!(db
        .put_document(None, &h, Document::new("", "<c/>"), false)
        .is_err());
}

#[test]
fn test_validating_container_rejects_plain_text() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let config = ContainerConfig {
        validate: true,
        ..ContainerConfig::default()
    };
    let h = db.create_container(None, "", &config).unwrap();
    assert!(matches!(
        db.put_document(None, &h, Document::new("t", "just text"), false),
        Err(Error::InvalidInput { .. })
    ));
}

#[test]
fn test_unique_index_enforced_on_put() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let h = db.create_container(None, "", &ContainerConfig::default()).unwrap();
    let d = "unique-node-attribute-equality-string".parse().unwrap();
    db.add_index(None, &h, "", "id", &d).unwrap();
    db.put_document(None, &h, Document::new("a", r#"<b id="1"/>"#), false)
        .unwrap();
    assert!(matches!(
        db.put_document(None, &h, Document::new("b", r#"<b id="1"/>"#), false),
        Err(Error::UniqueConstraint { .. })
    ));
}

// ============================================================================
// Queries
// ============================================================================

fn books_db(dir: &TempDir) -> (Database, docshell_core::ContainerHandle) {
    let db = open(dir);
    let h = db
        .create_container(None, "books.dbxml", &ContainerConfig::default())
        .unwrap();
    for (name, content) in BOOKS {
        db.put_document(None, &h, Document::new(name, content), false)
            .unwrap();
    }
    (db, h)
}

#[test]
fn test_query_eager_and_lazy() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);

    let mut ctx = context_for(&h);
    let eager = db.query(None, "collection()", &ctx).unwrap();
    assert_eq!(eager.size(), Some(3));

    ctx.mode = EvaluationMode::Lazy;
    let lazy = db.query(None, "collection('books.dbxml')", &ctx).unwrap();
    assert_eq!(lazy.size(), None);
    assert_eq!(names(&drain(lazy)), vec!["dune", "emma", "ulysses"]);
}

#[test]
fn test_query_syntax_error() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    assert!(matches!(
        db.query(None, "collection(", &context_for(&h)),
        Err(Error::QuerySyntax { .. })
    ));
}

#[test]
fn test_prepared_expression_with_context_item() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let ctx = context_for(&h);

    let expr = db.prepare(None, "contains(., 'Emma')", &ctx).unwrap();
    assert_eq!(expr.text(), "contains(., 'Emma')");
    assert!(expr.plan().starts_with("<QueryPlan>"));
    assert!(!expr.is_update());

    let emma = Item::Document(db.get_document(None, &h, "emma").unwrap());
    let dune = Item::Document(db.get_document(None, &h, "dune").unwrap());
    assert_eq!(drain(expr.execute(None, Some(&emma), &ctx).unwrap()).len(), 1);
    assert_eq!(drain(expr.execute(None, Some(&dune), &ctx).unwrap()).len(), 0);
}

#[test]
fn test_prepared_expression_sees_later_writes() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let ctx = context_for(&h);
    let expr = db.prepare(None, "count(collection())", &ctx).unwrap();
    db.put_document(None, &h, Document::new("new", "<book/>"), false)
        .unwrap();
    let items = drain(expr.execute(None, None, &ctx).unwrap());
    assert_eq!(items, vec![Item::Value(Value::Int(4))]);
}

#[test]
fn test_variables_reach_queries() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let mut ctx = context_for(&h);
    ctx.variables.insert("t".to_string(), Value::from("Ulysses"));
    let items = drain(db.query(None, "name(contains(collection(), $t))", &ctx).unwrap());
    assert_eq!(items, vec![Item::Value(Value::from("ulysses"))]);
}

// ============================================================================
// Index lookup
// ============================================================================

#[test]
fn test_lookup_requires_declared_index() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let lookup = IndexLookup::new("node-element-equality-string".parse().unwrap(), "", "title");
    assert!(matches!(
        db.lookup_index(None, &h, &lookup, &QueryContext::default()),
        Err(Error::IndexNotFound { .. })
    ));
}

#[test]
fn test_lookup_by_builtin_name_index() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let lookup = IndexLookup::new(
        "node-metadata-equality-string".parse().unwrap(),
        NAME_METADATA_URI,
        NAME_METADATA_NODE,
    )
    .with_condition(LookupOperation::Equal, Value::from("emma"));
    let items = drain(db.lookup_index(None, &h, &lookup, &QueryContext::default()).unwrap());
    assert_eq!(names(&items), vec!["emma"]);
}

#[test]
fn test_lookup_numeric_range() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let d = "node-element-equality-decimal".parse().unwrap();
    db.add_index(None, &h, "", "price", &d).unwrap();

    let lookup = IndexLookup::new(d, "", "price")
        .with_condition(LookupOperation::GreaterThanOrEqual, Value::from("12"));
    let items = drain(db.lookup_index(None, &h, &lookup, &QueryContext::default()).unwrap());
    assert_eq!(names(&items), vec!["emma", "ulysses"]);
}

#[test]
fn test_edge_lookup_checks_parent() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let d = "edge-element-presence-none".parse().unwrap();
    db.add_index(None, &h, "", "title", &d).unwrap();

    let with_parent = IndexLookup::new(d, "", "title").with_parent("", "book");
    assert_eq!(
        drain(db.lookup_index(None, &h, &with_parent, &QueryContext::default()).unwrap()).len(),
        3
    );
    let wrong_parent = IndexLookup::new(d, "", "title").with_parent("", "magazine");
    assert!(drain(db.lookup_index(None, &h, &wrong_parent, &QueryContext::default()).unwrap())
        .is_empty());
}

#[test]
fn test_lookup_statistics() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let d = "node-attribute-equality-string".parse().unwrap();
    db.add_index(None, &h, "", "id", &d).unwrap();

    let stats = db
        .lookup_statistics(None, &h, &IndexLookup::new(d, "", "id"))
        .unwrap();
    assert_eq!(stats.indexed_keys, 3);
    assert_eq!(stats.unique_keys, 3);
    assert_eq!(stats.sum_key_value_size, 3);

    let one = IndexLookup::new(d, "", "id").with_condition(LookupOperation::Equal, Value::from("2"));
    let stats = db.lookup_statistics(None, &h, &one).unwrap();
    assert_eq!(stats.indexed_keys, 1);
}

#[test]
fn test_delete_index() {
    let dir = TempDir::new().unwrap();
    let (db, h) = books_db(&dir);
    let d = "node-element-equality-string".parse().unwrap();
    db.add_index(None, &h, "", "title", &d).unwrap();
    assert_eq!(db.list_indexes(None, &h).unwrap().len(), 1);
    db.delete_index(None, &h, "", "title", &d).unwrap();
    assert!(db.list_indexes(None, &h).unwrap().is_empty());
    assert!(matches!(
        db.delete_index(None, &h, "", "title", &d),
        Err(Error::IndexNotFound { .. })
    ));
}

// ============================================================================
// Transactions
// ============================================================================

#[test]
fn test_transactions_require_capability() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    assert!(!db.capabilities().transactions);
    assert!(matches!(
        db.begin_transaction(),
        Err(Error::TransactionsUnsupported)
    ));
}

#[test]
fn test_commit_makes_writes_visible() {
    let dir = TempDir::new().unwrap();
    let db = open_transactional(&dir);
    let h = db.create_container(None, "", &ContainerConfig::default()).unwrap();

    let txn = db.begin_transaction().unwrap();
    db.put_document(Some(txn), &h, Document::new("a", "<a/>"), false)
        .unwrap();
    assert!(db.get_document(None, &h, "a").is_err());
    assert!(db.get_document(Some(txn), &h, "a").is_ok());

    db.commit_transaction(txn).unwrap();
    assert!(db.get_document(None, &h, "a").is_ok());
    assert!(matches!(
        db.commit_transaction(txn),
        Err(Error::TransactionNotActive)
    ));
}

#[test]
fn test_abort_discards_writes() {
    let dir = TempDir::new().unwrap();
    let db = open_transactional(&dir);
    let h = db.create_container(None, "", &ContainerConfig::default()).unwrap();

    let txn = db.begin_transaction().unwrap();
    db.put_document(Some(txn), &h, Document::new("a", "<a/>"), false)
        .unwrap();
    db.abort_transaction(txn).unwrap();
    assert!(db.get_document(None, &h, "a").is_err());
}

#[test]
fn test_container_created_inside_transaction() {
    let dir = TempDir::new().unwrap();
    let db = open_transactional(&dir);
    let txn = db.begin_transaction().unwrap();
    let h = db
        .create_container(Some(txn), "t.dbxml", &ContainerConfig::default())
        .unwrap();
    db.put_document(Some(txn), &h, Document::new("a", "<a/>"), false)
        .unwrap();
    db.commit_transaction(txn).unwrap();
    assert_eq!(db.container_info(&h).unwrap().document_count, 1);
}

#[test]
fn test_container_created_inside_aborted_transaction_is_gone() {
    let dir = TempDir::new().unwrap();
    let db = open_transactional(&dir);
    let txn = db.begin_transaction().unwrap();
    let h = db
        .create_container(Some(txn), "t.dbxml", &ContainerConfig::default())
        .unwrap();
    assert!(dir.path().join("t.dbxml").is_file());
    assert!(db.get_document(None, &h, "a").is_err());

    db.abort_transaction(txn).unwrap();
    assert!(!dir.path().join("t.dbxml").exists());
    assert!(matches!(
        db.container_info(&h),
        Err(Error::ContainerNotFound { .. })
    ));
    assert!(matches!(
        db.open_container(None, "t.dbxml", &ContainerConfig::default()),
        Err(Error::ContainerNotFound { .. })
    ));
    // the name is free again
    db.create_container(None, "t.dbxml", &ContainerConfig::default())
        .unwrap();
}
