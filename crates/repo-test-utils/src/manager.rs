//! [`TestManager`] fixture for repository-manager test scenarios.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repo_manager::{
    FactoryRegistry, ImplConfig, LocalBackend, Manager, MemoryFactory, ProxyFactory,
    ReadOnlyFactory, RepositoryConfig, RepositoryManager,
};
use repo_store::{Iri, Literal, Repository, Statement};
use tempfile::TempDir;

/// A local repository manager rooted in a temporary directory.
///
/// The manager is shut down when the fixture is dropped; the directory is
/// removed afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use repo_manager::Manager;
/// use repo_test_utils::{TestManager, memory_config};
///
/// let mut fixture = TestManager::new();
/// fixture.manager().add_repository_config(&memory_config("notes")).unwrap();
/// fixture.restart();
/// assert!(fixture.manager().has_repository_config("notes").unwrap());
/// ```
pub struct TestManager {
    temp_dir: TempDir,
    registry: FactoryRegistry,
    manager: Arc<RepositoryManager>,
}

impl Default for TestManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TestManager {
    /// A manager with the built-in factories.
    pub fn new() -> Self {
        Self::with_registry(FactoryRegistry::with_builtins())
    }

    /// A manager building repositories with `registry`.
    ///
    /// Also routes manager logs through the test harness.
    pub fn with_registry(registry: FactoryRegistry) -> Self {
        repo_manager::logging::init_for_tests();
        let temp_dir = TempDir::new().expect("TestManager: failed to create temp dir");
        let manager = open(temp_dir.path(), registry.clone());
        Self {
            temp_dir,
            registry,
            manager,
        }
    }

    pub fn manager(&self) -> &Arc<RepositoryManager> {
        &self.manager
    }

    /// Base directory of the manager.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// `{root}/repositories/{id}`
    pub fn repository_dir(&self, id: &str) -> PathBuf {
        self.root().join("repositories").join(id)
    }

    /// Shut the manager down and open a new one over the same directory.
    pub fn restart(&mut self) {
        self.manager
            .shut_down()
            .expect("TestManager::restart: shutdown failed");
        self.manager = open(self.temp_dir.path(), self.registry.clone());
    }

    /// Add a config and return the repository built from it.
    pub fn add(&self, config: &RepositoryConfig) -> Arc<dyn Repository> {
        self.manager
            .add_repository_config(config)
            .expect("TestManager::add: failed to store config");
        self.manager
            .get_repository(&config.id)
            .expect("TestManager::add: failed to build repository")
            .expect("TestManager::add: config vanished")
    }
}

impl Drop for TestManager {
    fn drop(&mut self) {
        let _ = self.manager.shut_down();
    }
}

fn open(base: &Path, registry: FactoryRegistry) -> Arc<RepositoryManager> {
    let backend = LocalBackend::open(base)
        .expect("TestManager: failed to open backend")
        .with_registry(registry);
    RepositoryManager::open(Arc::new(backend)).expect("TestManager: failed to open manager")
}

/// A persistent in-memory repository config.
pub fn memory_config(id: &str) -> RepositoryConfig {
    RepositoryConfig::new(id, ImplConfig::new(MemoryFactory::KIND))
}

/// A read-only layer over a persistent in-memory store.
pub fn readonly_config(id: &str) -> RepositoryConfig {
    RepositoryConfig::new(
        id,
        ImplConfig::new(ReadOnlyFactory::KIND).with_delegate(ImplConfig::new(MemoryFactory::KIND)),
    )
}

/// A proxy to `target`.
pub fn proxy_config(id: &str, target: &str) -> RepositoryConfig {
    RepositoryConfig::new(
        id,
        ImplConfig::new(ProxyFactory::KIND).with_param(ProxyFactory::PROXIED_ID, target),
    )
}

/// A throwaway statement distinguishable by `label`.
pub fn sample_statement(label: &str) -> Statement {
    Statement::new(
        Iri::new("urn:test:subject"),
        Iri::new("urn:test:label"),
        Literal::new(label),
    )
}
