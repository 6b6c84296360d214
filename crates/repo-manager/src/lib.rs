//! Repository manager control plane
//!
//! Discovers, instantiates, caches and tears down repositories described by
//! configuration records stored in a self-describing system repository.
//!
//! # Layout
//!
//! - [`config`]: the repository configuration model, its statement
//!   encoding, manager settings and config templates
//! - [`factory`]: builds repository stacks from configs, keyed by type
//! - [`system`]: the system repository
//! - [`manager`]: the handle cache, the change listener and the
//!   type-filtering view
//! - [`backend`]: where repositories physically live
//! - [`provider`]: one shared manager per canonical location
//! - [`proxy`]: a repository that forwards to another managed repository
//!
//! # Example
//!
//! ```no_run
//! use repo_manager::{ImplConfig, Manager, MemoryFactory, RepositoryConfig, RepositoryManager};
//!
//! # fn main() -> repo_manager::Result<()> {
//! let manager = RepositoryManager::open_local("/var/lib/rdf")?;
//! let id = manager.new_repository_id("My Store")?;
//! manager.add_repository_config(&RepositoryConfig::new(&id, ImplConfig::new(MemoryFactory::KIND)))?;
//! let repository = manager.get_repository(&id)?;
//! # let _ = repository;
//! manager.shut_down()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod manager;
pub mod provider;
pub mod proxy;
pub mod system;

mod sync;

pub use backend::{LocalBackend, ManagerBackend};
pub use config::{ImplConfig, RepositoryConfig, TemplateRegistry};
pub use error::{Error, Result};
pub use factory::{
    BuildContext, FactoryRegistry, MemoryFactory, ProxyFactory, ReadOnlyFactory, RepositoryFactory,
};
pub use manager::{Manager, RepositoryInfo, RepositoryManager, TypeFilteringManager};
pub use provider::{
    LocalManagerFactory, ManagerFactory, RepositoryProvider, ShutdownGuard, default_location,
};
pub use proxy::ProxyRepository;
pub use system::{SYSTEM_ID, SystemRepository, is_reserved_id};
