//! Provider, proxy and restart scenarios across crates

use std::path::Path;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use repo_manager::{Manager, RepositoryProvider};
use repo_store::Repository;
use repo_test_utils::{memory_config, proxy_config, sample_statement};
use rstest::rstest;
use tempfile::TempDir;
use url::Url;

fn location_url(dir: &Path) -> Url {
    Url::from_directory_path(std::fs::canonicalize(dir).unwrap()).unwrap()
}

fn size(repository: &Arc<dyn Repository>) -> usize {
    repository.connection().unwrap().size(&[]).unwrap()
}

#[rstest]
#[case("")]
#[case("/")]
#[case("//")]
#[case("/./")]
fn test_location_spellings_share_one_manager(#[case] suffix: &str) {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let plain = temp.path().to_string_lossy().to_string();

    let canonical = provider
        .get_repository_manager(location_url(temp.path()).as_str())
        .unwrap();
    let variant = provider
        .get_repository_manager(&format!("{plain}{suffix}"))
        .unwrap();

    assert!(Arc::ptr_eq(&canonical, &variant));
    assert_eq!(provider.manager_count(), 1);
    provider.shutdown_all();
}

#[test]
fn test_distinct_locations_get_distinct_managers() {
    let first = TempDir::new().unwrap();
    let second = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();

    let a = provider
        .get_repository_manager(&first.path().to_string_lossy())
        .unwrap();
    let b = provider
        .get_repository_manager(&second.path().to_string_lossy())
        .unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(provider.manager_count(), 2);
}

#[test]
fn test_repository_url_resolves_through_manager() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();
    let base = location_url(temp.path());

    let manager = provider.get_repository_manager(base.as_str()).unwrap();
    manager.add_repository_config(&memory_config("notes")).unwrap();

    let via_url = provider
        .get_repository(&format!("{base}repositories/notes/"))
        .unwrap()
        .unwrap();
    let direct = manager.get_repository("notes").unwrap().unwrap();
    assert!(Arc::ptr_eq(&via_url, &direct));

    let missing = provider
        .get_repository(&format!("{base}repositories/absent"))
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn test_shutdown_all_then_reopen_keeps_configs_and_data() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let location = temp.path().to_string_lossy().to_string();

    let manager = provider.get_repository_manager(&location).unwrap();
    manager.add_repository_config(&memory_config("notes")).unwrap();
    let notes = manager.get_repository("notes").unwrap().unwrap();
    notes.connection().unwrap().add(sample_statement("kept")).unwrap();

    provider.shutdown_all();
    assert!(!manager.is_active());
    assert!(!notes.is_initialized());
    assert_eq!(provider.manager_count(), 0);

    let reopened = provider.get_repository_manager(&location).unwrap();
    assert!(!Arc::ptr_eq(&manager, &reopened));
    assert_eq!(reopened.repository_ids().unwrap(), vec!["SYSTEM", "notes"]);
    let notes = reopened.get_repository("notes").unwrap().unwrap();
    assert_eq!(size(&notes), 1);
    provider.shutdown_all();
}

#[test]
fn test_proxy_survives_restart() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let location = temp.path().to_string_lossy().to_string();

    let manager = provider.get_repository_manager(&location).unwrap();
    manager.add_repository_config(&memory_config("target")).unwrap();
    manager
        .add_repository_config(&proxy_config("alias", "target"))
        .unwrap();
    let alias = manager.get_repository("alias").unwrap().unwrap();
    alias.connection().unwrap().add(sample_statement("through alias")).unwrap();
    provider.shutdown_all();

    let manager = provider.get_repository_manager(&location).unwrap();
    let alias = manager.get_repository("alias").unwrap().unwrap();
    assert_eq!(size(&alias), 1);
    provider.shutdown_all();
}

#[test]
fn test_proxy_follows_rebuilt_target() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();
    let manager = provider
        .get_repository_manager(&temp.path().to_string_lossy())
        .unwrap();
    manager.add_repository_config(&memory_config("target")).unwrap();
    manager
        .add_repository_config(&proxy_config("alias", "target"))
        .unwrap();

    let alias = manager.get_repository("alias").unwrap().unwrap();
    alias.connection().unwrap().add(sample_statement("one")).unwrap();
    let old_target = manager.get_repository("target").unwrap().unwrap();

    // Rewriting the target's config evicts and shuts down its handle.
    manager
        .add_repository_config(&memory_config("target").with_title("Target"))
        .unwrap();
    let new_target = manager.get_repository("target").unwrap().unwrap();
    assert!(!old_target.is_initialized());
    assert!(!Arc::ptr_eq(&old_target, &new_target));

    alias.connection().unwrap().add(sample_statement("two")).unwrap();
    assert_eq!(size(&new_target), 2);
}

#[test]
fn test_proxy_to_missing_target_fails_on_use() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();
    let manager = provider
        .get_repository_manager(&temp.path().to_string_lossy())
        .unwrap();
    manager
        .add_repository_config(&proxy_config("alias", "ghost"))
        .unwrap();

    let alias = manager.get_repository("alias").unwrap().unwrap();
    assert!(matches!(
        alias.connection(),
        Err(repo_store::Error::Config { .. })
    ));
}

#[test]
fn test_proxy_cycle_is_reported() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();
    let manager = provider
        .get_repository_manager(&temp.path().to_string_lossy())
        .unwrap();
    manager.add_repository_config(&proxy_config("a", "b")).unwrap();
    manager.add_repository_config(&proxy_config("b", "a")).unwrap();

    let a = manager.get_repository("a").unwrap().unwrap();
    assert!(matches!(a.connection(), Err(repo_store::Error::Config { .. })));
}

#[test]
fn test_externally_shut_down_manager_is_replaced() {
    let temp = TempDir::new().unwrap();
    let provider = RepositoryProvider::new();
    let _guard = provider.shutdown_guard();
    let location = temp.path().to_string_lossy().to_string();

    let first = provider.get_repository_manager(&location).unwrap();
    first.shut_down().unwrap();

    let second = provider.get_repository_manager(&location).unwrap();
    assert!(second.is_active());
    assert!(second.get_repository(repo_manager::SYSTEM_ID).unwrap().is_some());
}
