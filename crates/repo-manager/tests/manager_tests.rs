//! Manager-level behaviour over a local backend

use std::collections::BTreeMap;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use repo_manager::config::records;
use repo_manager::{
    Error, ImplConfig, Manager, MemoryFactory, ProxyFactory, ReadOnlyFactory, RepositoryConfig,
    RepositoryManager, SYSTEM_ID, TypeFilteringManager,
};
use repo_store::{Iri, Literal, Repository, Statement};
use rstest::rstest;
use tempfile::TempDir;

fn open() -> (TempDir, Arc<RepositoryManager>) {
    let temp = TempDir::new().unwrap();
    let manager = RepositoryManager::open_local(temp.path()).unwrap();
    (temp, manager)
}

fn memory(id: &str) -> RepositoryConfig {
    RepositoryConfig::new(id, ImplConfig::new(MemoryFactory::KIND))
}

fn statement(label: &str) -> Statement {
    Statement::new(Iri::new("urn:s"), Iri::new("urn:p"), Literal::new(label))
}

#[test]
fn test_config_round_trip_replaces_instead_of_merging() {
    let (_temp, manager) = open();
    let first = RepositoryConfig::new(
        "notes",
        ImplConfig::new(MemoryFactory::KIND).with_param("persist", "false"),
    )
    .with_title("Notes");
    manager.add_repository_config(&first).unwrap();
    assert_eq!(manager.get_repository_config("notes").unwrap(), Some(first));

    let second = RepositoryConfig::new(
        "notes",
        ImplConfig::new(ReadOnlyFactory::KIND).with_delegate(ImplConfig::new(MemoryFactory::KIND)),
    );
    manager.add_repository_config(&second).unwrap();
    assert_eq!(manager.get_repository_config("notes").unwrap(), Some(second));
}

#[test]
fn test_repository_is_built_once_and_cached() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("notes")).unwrap();

    let first = manager.get_repository("notes").unwrap().unwrap();
    let second = manager.get_repository("notes").unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.is_initialized());
    assert_eq!(manager.initialized_repository_ids(), vec!["SYSTEM", "notes"]);
}

#[test]
fn test_missing_config_is_not_found() {
    let (_temp, manager) = open();
    assert!(manager.get_repository("absent").unwrap().is_none());
    assert!(manager.get_repository_info("absent").unwrap().is_none());
    assert!(!manager.has_repository_config("absent").unwrap());
}

#[test]
fn test_removal_evicts_shuts_down_and_cleans_up() {
    let (temp, manager) = open();
    manager.add_repository_config(&memory("notes")).unwrap();
    let handle = manager.get_repository("notes").unwrap().unwrap();
    handle.connection().unwrap().add(statement("x")).unwrap();
    let data_dir = temp.path().join("repositories").join("notes");
    assert!(data_dir.exists());

    assert!(manager.remove_repository_config("notes").unwrap());

    assert!(!handle.is_initialized());
    assert!(!data_dir.exists());
    assert!(manager.get_repository("notes").unwrap().is_none());
    assert!(!manager.remove_repository_config("notes").unwrap());
}

#[test]
fn test_cleanup_failure_is_reported_after_removal_commits() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("manager.toml"),
        "[cleanup]\ninitial_interval_ms = 1\nmax_elapsed_ms = 20\n",
    )
    .unwrap();
    let manager = RepositoryManager::open_local(temp.path()).unwrap();
    let volatile = RepositoryConfig::new(
        "notes",
        ImplConfig::new(MemoryFactory::KIND).with_param("persist", "false"),
    );
    manager.add_repository_config(&volatile).unwrap();
    let handle = manager.get_repository("notes").unwrap().unwrap();
    // A plain file where the data directory belongs cannot be removed as one.
    let data_path = temp.path().join("repositories").join("notes");
    std::fs::write(&data_path, "not a directory").unwrap();

    let result = manager.remove_repository_config("notes");

    assert!(matches!(result, Err(Error::Cleanup { ref id, .. }) if id == "notes"));
    assert!(!manager.has_repository_config("notes").unwrap());
    assert!(!handle.is_initialized());
    assert!(manager.get_repository("notes").unwrap().is_none());
    assert!(data_path.is_file());
    manager.shut_down().unwrap();
}

#[test]
fn test_unreadable_system_repository_fails_open() {
    let temp = TempDir::new().unwrap();
    let system_dir = temp.path().join("repositories").join(SYSTEM_ID);
    std::fs::create_dir_all(&system_dir).unwrap();
    std::fs::write(system_dir.join("memorystore.json"), "{ truncated").unwrap();

    let result = RepositoryManager::open_local(temp.path());

    assert!(matches!(result, Err(Error::Store(_))));
}

#[test]
fn test_system_repository_describes_itself() {
    let (_temp, manager) = open();

    let info = manager.get_repository_info(SYSTEM_ID).unwrap().unwrap();
    assert_eq!(info.id, SYSTEM_ID);
    assert!(info.title.is_some());

    manager.add_repository_config(&memory("notes")).unwrap();
    let all: Vec<String> = manager
        .get_all_repository_infos(false)
        .unwrap()
        .into_iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(all, vec!["SYSTEM", "notes"]);

    let user: Vec<String> = manager
        .get_all_repository_infos(true)
        .unwrap()
        .into_iter()
        .map(|info| info.id)
        .collect();
    assert_eq!(user, vec!["notes"]);
}

#[test]
fn test_info_does_not_initialize() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("notes")).unwrap();

    let info = manager.get_repository_info("notes").unwrap().unwrap();
    assert!(info.readable);
    assert!(info.writable);
    assert!(info.location.is_some());
    assert_eq!(manager.initialized_repository_ids(), vec!["SYSTEM"]);
}

#[rstest]
#[case(SYSTEM_ID)]
#[case("system")]
#[case("System")]
fn test_system_id_is_reserved_in_any_case(#[case] id: &str) {
    let (temp, manager) = open();
    let result = manager.add_repository_config(&memory(id));
    assert!(result.unwrap_err().is_config());
    assert_eq!(manager.has_repository_config(id).unwrap(), id == SYSTEM_ID);
    assert!(manager.remove_repository_config(id).unwrap_err().is_config());
    assert!(!manager.is_safe_to_remove(id).unwrap());

    assert!(temp.path().join("repositories").join(SYSTEM_ID).exists());
    assert!(manager.get_repository(SYSTEM_ID).unwrap().is_some());
    assert!(manager.get_repository_info(SYSTEM_ID).unwrap().is_some());
}

#[test]
fn test_new_repository_id_skips_taken_ids() {
    let (_temp, manager) = open();
    for expected in ["my-store", "my-store-2", "my-store-3"] {
        let id = manager.new_repository_id("My Store").unwrap();
        assert_eq!(id, expected);
        manager.add_repository_config(&memory(&id)).unwrap();
    }
}

#[test]
fn test_unknown_type_is_rejected_before_storing() {
    let (_temp, manager) = open();
    let config = RepositoryConfig::new("odd", ImplConfig::new("no-such-type"));

    assert!(manager.add_repository_config(&config).unwrap_err().is_config());
    assert!(!manager.has_repository_config("odd").unwrap());
}

#[test]
fn test_failed_construction_is_not_cached() {
    let (_temp, manager) = open();
    // Bypass validation by writing straight into the system repository.
    let config = RepositoryConfig::new("odd", ImplConfig::new("no-such-type"));
    {
        let mut conn = manager.system_repository().connection().unwrap();
        conn.begin().unwrap();
        records::write_config(conn.as_mut(), &config).unwrap();
        conn.commit().unwrap();
    }

    for _ in 0..2 {
        let result = manager.get_repository("odd");
        assert!(result.err().is_some_and(|e| e.is_config()));
    }
    assert_eq!(manager.initialized_repository_ids(), vec!["SYSTEM"]);
}

#[test]
fn test_refresh_rebuilds_user_repositories() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("notes")).unwrap();
    let before = manager.get_repository("notes").unwrap().unwrap();

    manager.refresh().unwrap();

    assert!(!before.is_initialized());
    assert!(manager.system_repository().is_initialized());
    let after = manager.get_repository("notes").unwrap().unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn test_connection_to_removed_repository_cannot_resurrect_data() {
    let (temp, manager) = open();
    manager.add_repository_config(&memory("x")).unwrap();
    let mut stale = manager.get_repository("x").unwrap().unwrap().connection().unwrap();
    stale.add(statement("before")).unwrap();

    assert!(manager.remove_repository_config("x").unwrap());

    let result = stale.add(statement("after"));
    assert!(matches!(result, Err(repo_store::Error::NotInitialized)));
    assert!(!temp.path().join("repositories").join("x").exists());

    manager.add_repository_config(&memory("x")).unwrap();
    let fresh = manager.get_repository("x").unwrap().unwrap();
    assert_eq!(fresh.connection().unwrap().size(&[]).unwrap(), 0);
}

#[test]
fn test_connection_from_before_refresh_cannot_overwrite_new_handle() {
    let (temp, manager) = open();
    manager.add_repository_config(&memory("x")).unwrap();
    let mut stale = manager.get_repository("x").unwrap().unwrap().connection().unwrap();

    manager.refresh().unwrap();
    let fresh = manager.get_repository("x").unwrap().unwrap();
    fresh.connection().unwrap().add(statement("new")).unwrap();
    assert!(stale.add(statement("stale")).is_err());
    manager.shut_down().unwrap();

    let reopened = RepositoryManager::open_local(temp.path()).unwrap();
    let x = reopened.get_repository("x").unwrap().unwrap();
    let kept = x.connection().unwrap().statements(None, None, None, &[]).unwrap();
    assert_eq!(kept, vec![statement("new")]);
    reopened.shut_down().unwrap();
}

#[test]
fn test_shut_down_deactivates_manager() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("notes")).unwrap();
    let handle = manager.get_repository("notes").unwrap().unwrap();

    manager.shut_down().unwrap();

    assert!(!manager.is_active());
    assert!(!handle.is_initialized());
    assert!(!manager.system_repository().is_initialized());
    assert!(matches!(manager.get_repository("notes"), Err(Error::NotActive)));
    assert!(matches!(manager.repository_ids(), Err(Error::NotActive)));
    manager.shut_down().unwrap();
}

#[test]
fn test_proxied_repositories_are_not_safe_to_remove() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("target")).unwrap();
    manager
        .add_repository_config(&RepositoryConfig::new(
            "alias",
            ImplConfig::new(ProxyFactory::KIND).with_param(ProxyFactory::PROXIED_ID, "target"),
        ))
        .unwrap();

    assert!(!manager.is_safe_to_remove("target").unwrap());
    assert!(manager.is_safe_to_remove("alias").unwrap());
    assert!(!manager.is_safe_to_remove(SYSTEM_ID).unwrap());
}

#[test]
fn test_proxy_forwards_to_target() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("target")).unwrap();
    manager
        .add_repository_config(&RepositoryConfig::new(
            "alias",
            ImplConfig::new(ProxyFactory::KIND).with_param(ProxyFactory::PROXIED_ID, "target"),
        ))
        .unwrap();

    let alias = manager.get_repository("alias").unwrap().unwrap();
    alias.connection().unwrap().add(statement("via proxy")).unwrap();

    let target = manager.get_repository("target").unwrap().unwrap();
    assert_eq!(target.connection().unwrap().size(&[]).unwrap(), 1);
}

#[test]
fn test_read_only_stack_rejects_writes() {
    let (_temp, manager) = open();
    manager
        .add_repository_config(&RepositoryConfig::new(
            "frozen",
            ImplConfig::new(ReadOnlyFactory::KIND)
                .with_delegate(ImplConfig::new(MemoryFactory::KIND)),
        ))
        .unwrap();

    let frozen = manager.get_repository("frozen").unwrap().unwrap();
    assert!(!frozen.is_writable());
    let result = frozen.connection().unwrap().add(statement("nope"));
    assert!(matches!(result, Err(repo_store::Error::ReadOnly)));
}

#[test]
fn test_configs_and_data_survive_restart() {
    let temp = TempDir::new().unwrap();
    {
        let manager = RepositoryManager::open_local(temp.path()).unwrap();
        manager.add_repository_config(&memory("notes")).unwrap();
        let notes = manager.get_repository("notes").unwrap().unwrap();
        notes.connection().unwrap().add(statement("kept")).unwrap();
        manager.shut_down().unwrap();
    }

    let manager = RepositoryManager::open_local(temp.path()).unwrap();
    assert_eq!(manager.repository_ids().unwrap(), vec!["SYSTEM", "notes"]);
    let notes = manager.get_repository("notes").unwrap().unwrap();
    assert_eq!(notes.connection().unwrap().size(&[]).unwrap(), 1);
}

#[test]
fn test_type_filtering_view() {
    let (_temp, manager) = open();
    manager.add_repository_config(&memory("plain")).unwrap();
    let frozen = RepositoryConfig::new(
        "frozen",
        ImplConfig::new(ReadOnlyFactory::KIND).with_delegate(ImplConfig::new(MemoryFactory::KIND)),
    );
    manager.add_repository_config(&frozen).unwrap();

    let inner: Arc<dyn Manager> = manager.clone();
    let view = TypeFilteringManager::new(inner, MemoryFactory::KIND);

    assert_eq!(view.repository_ids().unwrap(), vec!["plain"]);
    assert!(view.get_repository("frozen").unwrap().is_none());
    assert!(view.get_repository("plain").unwrap().is_some());
    assert!(matches!(
        view.add_repository_config(&frozen),
        Err(Error::Unsupported { .. })
    ));
    assert!(!view.remove_repository_config("frozen").unwrap());
    assert!(manager.has_repository_config("frozen").unwrap());
}

#[test]
fn test_builtin_template_instantiates() {
    let (_temp, manager) = open();
    let templates = manager.templates().unwrap();
    let values = BTreeMap::from([("id".to_string(), "from-template".to_string())]);

    let config = templates
        .get("memory")
        .unwrap()
        .instantiate(&values)
        .unwrap();
    manager.add_repository_config(&config).unwrap();

    let stored = manager.get_repository_config("from-template").unwrap().unwrap();
    assert_eq!(stored.implementation.kind, MemoryFactory::KIND);
    assert_eq!(stored.title.as_deref(), Some("Memory store"));
}
