//! Snapshot persistence of the memory store

use pretty_assertions::assert_eq;
use repo_fs::{NormalizedPath, RepoPath};
use repo_store::{Iri, Literal, MemoryStore, Repository, Statement};
use tempfile::TempDir;

fn statement(subject: &str, label: &str) -> Statement {
    Statement::new(Iri::new(subject), Iri::new("urn:p"), Literal::new(label))
        .in_context(Iri::new("urn:graph"))
}

fn persistent_store(dir: &NormalizedPath) -> MemoryStore {
    let store = MemoryStore::new(true);
    store.set_data_dir(dir.clone());
    store.initialize().unwrap();
    store
}

#[test]
fn test_committed_data_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let dir = NormalizedPath::new(temp.path()).join("store");

    {
        let store = persistent_store(&dir);
        let mut conn = store.connection().unwrap();
        conn.begin().unwrap();
        conn.add(statement("urn:a", "1")).unwrap();
        conn.add(statement("urn:b", "2")).unwrap();
        conn.set_namespace("ex", "urn:example#").unwrap();
        conn.commit().unwrap();
        store.shut_down().unwrap();
    }

    assert!(dir.join(RepoPath::StoreSnapshot.as_str()).is_file());

    let reopened = persistent_store(&dir);
    let conn = reopened.connection().unwrap();
    let mut statements = conn.statements(None, None, None, &[]).unwrap();
    statements.sort();
    assert_eq!(statements, vec![statement("urn:a", "1"), statement("urn:b", "2")]);
    assert_eq!(
        conn.namespaces().unwrap().get("ex").map(String::as_str),
        Some("urn:example#")
    );
}

#[test]
fn test_rolled_back_data_is_not_persisted() {
    let temp = TempDir::new().unwrap();
    let dir = NormalizedPath::new(temp.path()).join("store");

    {
        let store = persistent_store(&dir);
        let mut conn = store.connection().unwrap();
        conn.add(statement("urn:kept", "1")).unwrap();
        conn.begin().unwrap();
        conn.add(statement("urn:dropped", "2")).unwrap();
        conn.rollback().unwrap();
    }

    let reopened = persistent_store(&dir);
    assert_eq!(reopened.connection().unwrap().size(&[]).unwrap(), 1);
}

#[test]
fn test_volatile_store_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let dir = NormalizedPath::new(temp.path()).join("store");

    let store = MemoryStore::new(false);
    store.set_data_dir(dir.clone());
    store.initialize().unwrap();
    store
        .connection()
        .unwrap()
        .add(statement("urn:a", "1"))
        .unwrap();

    assert!(!dir.exists());
}

#[test]
fn test_reinitialize_after_shutdown_reloads() {
    let temp = TempDir::new().unwrap();
    let dir = NormalizedPath::new(temp.path()).join("store");

    let store = persistent_store(&dir);
    store
        .connection()
        .unwrap()
        .add(statement("urn:a", "1"))
        .unwrap();
    store.shut_down().unwrap();
    assert!(store.connection().is_err());

    store.initialize().unwrap();
    assert_eq!(store.connection().unwrap().size(&[]).unwrap(), 1);
}
