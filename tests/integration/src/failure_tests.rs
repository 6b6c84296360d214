//! Best-effort teardown when individual repositories fail to shut down

use pretty_assertions::assert_eq;
use repo_store::Repository;
use repo_manager::{Error, FactoryRegistry, ImplConfig, Manager, RepositoryConfig};
use repo_test_utils::{FailingShutdownFactory, TestManager, memory_config};

fn fixture() -> TestManager {
    let mut registry = FactoryRegistry::with_builtins();
    registry.register(FailingShutdownFactory::new("failing"));
    let fixture = TestManager::with_registry(registry);
    fixture
        .manager()
        .add_repository_config(&RepositoryConfig::new("bad", ImplConfig::new("failing")))
        .unwrap();
    fixture
        .manager()
        .add_repository_config(&memory_config("good"))
        .unwrap();
    fixture
}

fn failed_ids(error: Error) -> Vec<String> {
    match error {
        Error::Shutdown { failures } => failures
            .iter()
            .map(|failure| failure.split(':').next().unwrap_or_default().to_string())
            .collect(),
        other => panic!("expected a shutdown error, got {other}"),
    }
}

#[test]
fn test_refresh_continues_past_failed_shutdown() {
    let fixture = fixture();
    let manager = fixture.manager();
    let bad = manager.get_repository("bad").unwrap().unwrap();
    let good = manager.get_repository("good").unwrap().unwrap();

    let error = manager.refresh().unwrap_err();

    assert_eq!(failed_ids(error), vec!["bad"]);
    assert!(!bad.is_initialized());
    assert!(!good.is_initialized());
    assert!(manager.is_active());
    assert!(manager.get_repository("good").unwrap().unwrap().is_initialized());
}

#[test]
fn test_shut_down_continues_past_failed_shutdown() {
    let fixture = fixture();
    let manager = fixture.manager();
    let bad = manager.get_repository("bad").unwrap().unwrap();
    let good = manager.get_repository("good").unwrap().unwrap();

    let error = manager.shut_down().unwrap_err();

    assert_eq!(failed_ids(error), vec!["bad"]);
    assert!(!bad.is_initialized());
    assert!(!good.is_initialized());
    assert!(!manager.system_repository().is_initialized());
    assert!(!manager.is_active());
}
