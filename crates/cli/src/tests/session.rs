//! Session state: the container stack and the transaction lifecycle.

use docshell_core::{ContainerConfig, Document};
use docshell_engine::OpenOptions;
use proptest::prelude::*;

use crate::error::ShellError;
use crate::format::Level;
use crate::state::NO_CONTAINER;
use crate::tests::support::session_with;

fn names(session: &crate::state::Session) -> Vec<String> {
    session.containers().iter().map(|h| h.name.clone()).collect()
}

// =============================================================================
// Container stack
// =============================================================================

#[test]
fn test_active_requires_a_container() {
    let (_home, _out, session) = session_with(OpenOptions::default());
    match session.active() {
        Err(ShellError::StateConflict(m)) => assert_eq!(m, NO_CONTAINER),
        other => panic!("unexpected: {:?}", other.map(|h| h.name)),
    }
}

#[test]
fn test_newest_container_is_active() {
    let (_home, _out, mut session) = session_with(OpenOptions::default());
    let config = ContainerConfig::default();
    session.create_container("a.dbxml", &config).unwrap();
    session.create_container("b.dbxml", &config).unwrap();
    assert_eq!(session.active().unwrap().name, "b.dbxml");
    assert_eq!(
        session.query().default_collection.as_ref().map(|h| h.name.as_str()),
        Some("b.dbxml")
    );
}

#[test]
fn test_preload_goes_beneath_the_top() {
    let (_home, _out, mut session) = session_with(OpenOptions::default());
    let config = ContainerConfig::default();
    session.create_container("a.dbxml", &config).unwrap();
    session.close(None).unwrap();
    session.create_container("b.dbxml", &config).unwrap();

    session.preload("a.dbxml").unwrap();
    assert_eq!(names(&session), vec!["a.dbxml", "b.dbxml"]);
    assert_eq!(session.active().unwrap().name, "b.dbxml");
}

#[test]
fn test_close_all_reports_count() {
    let (_home, out, mut session) = session_with(OpenOptions::default());
    let config = ContainerConfig::default();
    session.create_container("a.dbxml", &config).unwrap();
    session.create_container("", &config).unwrap();
    session.close(None).unwrap();
    assert!(session.containers().is_empty());
    assert!(out.contains("closed 2 containers."));

    out.clear();
    session.close(None).unwrap();
    assert_eq!(out.messages(), vec!["no containers to close."]);
}

#[test]
fn test_close_unknown_name_warns() {
    let (_home, out, mut session) = session_with(OpenOptions::default());
    session
        .create_container("a.dbxml", &ContainerConfig::default())
        .unwrap();
    session.close(Some("zzz.dbxml")).unwrap();
    assert_eq!(out.at(Level::Warning), vec!["container zzz.dbxml is not open."]);
    assert!(out.contains("You have 1 containers open."));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_close_named_keeps_relative_order(n in 2usize..6, pick in 0usize..6) {
        let (_home, _out, mut session) = session_with(OpenOptions::default());
        let all: Vec<String> = (0..n).map(|i| format!("c{}.dbxml", i)).collect();
        for name in &all {
            session.create_container(name, &ContainerConfig::default()).unwrap();
        }
        let target = &all[pick % n];

        session.close(Some(target)).unwrap();

        let expected: Vec<String> = all.iter().filter(|n| *n != target).cloned().collect();
        prop_assert_eq!(names(&session), expected);
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[test]
fn test_transactions_need_the_capability() {
    let (_home, _out, mut session) = session_with(OpenOptions::default());
    assert!(matches!(session.begin(), Err(ShellError::StateConflict(_))));
    assert!(session.txn().is_none());
}

#[test]
fn test_commit_without_transaction() {
    let (_home, _out, mut session) = session_with(OpenOptions {
        transactional: true,
        ..OpenOptions::default()
    });
    match session.commit() {
        Err(ShellError::StateConflict(m)) => assert_eq!(m, "No transaction exists!"),
        other => panic!("unexpected: {:?}", other.is_ok()),
    }
    assert!(matches!(session.abort(), Err(ShellError::StateConflict(_))));
}

#[test]
fn test_begin_twice_commits_the_first_once() {
    let (_home, out, mut session) = session_with(OpenOptions {
        transactional: true,
        ..OpenOptions::default()
    });
    session.set_verbose(true);
    let handle = session
        .create_container("t.dbxml", &ContainerConfig::default())
        .unwrap();

    let first = session.begin().unwrap();
    session
        .store()
        .put_document(Some(first), &handle, Document::new("kept", "<a/>"), false)
        .unwrap();

    let second = session.begin().unwrap();
    assert_ne!(first, second);
    session
        .store()
        .put_document(Some(second), &handle, Document::new("dropped", "<b/>"), false)
        .unwrap();
    session.abort().unwrap();

    let store = session.store();
    assert!(store.get_document(None, &handle, "kept").is_ok());
    assert!(store.get_document(None, &handle, "dropped").is_err());
    let commits = out
        .at(Level::Verbose)
        .iter()
        .filter(|m| m.starts_with("Committing transaction"))
        .count();
    assert_eq!(commits, 1);
}

#[test]
fn test_begin_keeps_transaction_when_commit_fails() {
    let (_home, _out, mut session) = session_with(OpenOptions {
        transactional: true,
        ..OpenOptions::default()
    });
    let txn = session.begin().unwrap();
    // end it behind the session's back so the implicit commit fails
    session.store().abort_transaction(txn).unwrap();

    assert!(matches!(session.begin(), Err(ShellError::Engine(_))));
    assert_eq!(session.txn(), Some(txn));
}

#[test]
fn test_abort_forgets_containers_created_inside() {
    let (home, _out, mut session) = session_with(OpenOptions {
        transactional: true,
        ..OpenOptions::default()
    });
    let config = ContainerConfig::default();
    session.create_container("kept.dbxml", &config).unwrap();
    session.begin().unwrap();
    session.create_container("gone.dbxml", &config).unwrap();
    assert_eq!(names(&session), vec!["kept.dbxml", "gone.dbxml"]);

    session.abort().unwrap();
    assert_eq!(names(&session), vec!["kept.dbxml"]);
    assert_eq!(
        session.query().default_collection.as_ref().map(|h| h.name.as_str()),
        Some("kept.dbxml")
    );
    assert!(!home.path().join("gone.dbxml").exists());
}

#[test]
fn test_teardown_aborts_open_transaction() {
    let (_home, _out, mut session) = session_with(OpenOptions {
        transactional: true,
        ..OpenOptions::default()
    });
    session.begin().unwrap();
    session.teardown();
    assert!(session.txn().is_none());
    assert!(session.containers().is_empty());
}
