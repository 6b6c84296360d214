//! Manager backend abstraction
//!
//! The [`RepositoryManager`](crate::RepositoryManager) owns the handle cache
//! and the invalidation protocol; everything that depends on where
//! repositories physically live is delegated to a [`ManagerBackend`].

mod local;

pub use local::LocalBackend;

use std::sync::{Arc, Weak};

use repo_store::{Repository, RepositoryResolver};
use url::Url;

use crate::Result;
use crate::config::{RepositoryConfig, TemplateRegistry};
use crate::manager::RepositoryInfo;
use crate::system::SystemRepository;

/// Storage-specific operations of a repository manager.
pub trait ManagerBackend: Send + Sync {
    /// Location URL of the manager.
    fn location(&self) -> Result<Url>;

    /// Construct the (uninitialized) system repository.
    fn create_system_repository(&self) -> Result<Arc<SystemRepository>>;

    /// Check that `config` can be built by this backend.
    fn validate(&self, config: &RepositoryConfig) -> Result<()>;

    /// Build and initialize the repository stack described by `config`.
    ///
    /// Repositories that resolve other repositories are wired to
    /// `resolver`.
    fn create_repository(
        &self,
        config: &RepositoryConfig,
        resolver: Weak<dyn RepositoryResolver>,
    ) -> Result<Arc<dyn Repository>>;

    /// Describe the repository `config` configures without building it.
    fn repository_info(&self, config: &RepositoryConfig) -> Result<RepositoryInfo>;

    /// Delete the persistent data of a repository whose config was removed.
    fn clean_up_repository(&self, id: &str) -> Result<()>;

    /// Config templates available to users of this backend.
    fn templates(&self) -> Result<TemplateRegistry> {
        Ok(TemplateRegistry::with_builtins())
    }
}
