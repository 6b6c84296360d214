//! Repository manager core
//!
//! The manager maps repository ids to live handles. Handles are built
//! lazily from the configs stored in the system repository and cached, at
//! most one per id. Changes committed to the system repository are picked
//! up through its event channel and evict the affected handles, so the
//! next access rebuilds them from the current config.
//!
//! # Locking
//!
//! - `cache` guards the id → handle map. Lookup, construction and
//!   insertion of a missing handle all happen while holding it, which
//!   serializes first access across all ids. Evictions and the shutdown of
//!   evicted handles also happen under it.
//! - `changes` guards the event receiver together with the listener's
//!   per-connection bookkeeping, so events are folded in order. It is never
//!   held while the cache lock is taken.
//! - Writes to the system repository are committed without holding either
//!   lock.

mod filter;
mod id;
mod listener;

pub use filter::TypeFilteringManager;
pub use id::{DEFAULT_ID_PREFIX, generate_id, sanitize_id};
pub use listener::{ConfigChangeListener, Invalidation};

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, Weak};

use repo_store::{Repository, RepositoryConnection, RepositoryResolver, StoreEvent};
use url::Url;

use crate::backend::{LocalBackend, ManagerBackend};
use crate::config::{RepositoryConfig, TemplateRegistry, records};
use crate::factory::ProxyFactory;
use crate::sync::lock;
use crate::system::{SYSTEM_ID, SystemRepository, is_reserved_id};
use crate::{Error, Result};

/// Read-only description of a configured repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub id: String,
    pub title: Option<String>,
    pub location: Option<Url>,
    pub readable: bool,
    pub writable: bool,
}

/// The public surface of a repository manager.
pub trait Manager: RepositoryResolver {
    fn location(&self) -> Result<Url>;

    fn is_active(&self) -> bool;

    /// The handle for `id`, built on first access. `Ok(None)` when no
    /// config exists for `id`.
    fn get_repository(&self, id: &str) -> Result<Option<Arc<dyn Repository>>>;

    /// Ids of every stored config, sorted. Includes the system repository.
    fn repository_ids(&self) -> Result<Vec<String>>;

    fn has_repository_config(&self, id: &str) -> Result<bool> {
        Ok(self.get_repository_config(id)?.is_some())
    }

    fn get_repository_config(&self, id: &str) -> Result<Option<RepositoryConfig>>;

    /// Store `config`, replacing (not merging with) any config for the
    /// same id. A live handle for the id is invalidated.
    fn add_repository_config(&self, config: &RepositoryConfig) -> Result<()>;

    /// Remove the config of `id`, shut down its handle and delete its data.
    /// Returns `false` when there was no config.
    fn remove_repository_config(&self, id: &str) -> Result<bool>;

    /// A fresh id derived from `base_name`; see [`generate_id`].
    fn new_repository_id(&self, base_name: &str) -> Result<String> {
        let taken: HashSet<String> = self.repository_ids()?.into_iter().collect();
        Ok(generate_id(base_name, |id| taken.contains(id)))
    }

    fn get_repository_info(&self, id: &str) -> Result<Option<RepositoryInfo>>;

    fn get_all_repository_infos(&self, skip_system: bool) -> Result<Vec<RepositoryInfo>> {
        let mut infos = Vec::new();
        for id in self.repository_ids()? {
            if skip_system && id == SYSTEM_ID {
                continue;
            }
            if let Some(info) = self.get_repository_info(&id)? {
                infos.push(info);
            }
        }
        Ok(infos)
    }

    /// Ids with a live handle, sorted.
    fn initialized_repository_ids(&self) -> Vec<String>;

    /// Handles for every configured repository, building missing ones.
    fn get_all_repositories(&self) -> Result<Vec<Arc<dyn Repository>>> {
        let mut repositories = Vec::new();
        for id in self.repository_ids()? {
            if let Some(repository) = self.get_repository(&id)? {
                repositories.push(repository);
            }
        }
        Ok(repositories)
    }

    /// False when another repository proxies to `id`.
    fn is_safe_to_remove(&self, id: &str) -> Result<bool> {
        if is_reserved_id(id) {
            return Ok(false);
        }
        for other in self.repository_ids()? {
            if other == id {
                continue;
            }
            let Some(config) = self.get_repository_config(&other)? else {
                continue;
            };
            let proxies_to_id = config.implementation.layers().any(|layer| {
                layer.kind == ProxyFactory::KIND
                    && layer.param(ProxyFactory::PROXIED_ID).map(str::trim) == Some(id)
            });
            if proxies_to_id {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evict and shut down every non-system handle.
    fn refresh(&self) -> Result<()>;

    /// Shut down every handle, the system repository last. Afterwards the
    /// manager is inactive.
    fn shut_down(&self) -> Result<()>;
}

struct ChangeFeed {
    events: Receiver<StoreEvent>,
    listener: ConfigChangeListener,
}

/// A repository manager over a [`ManagerBackend`].
pub struct RepositoryManager {
    backend: Arc<dyn ManagerBackend>,
    system: Arc<SystemRepository>,
    cache: Mutex<HashMap<String, Arc<dyn Repository>>>,
    changes: Mutex<ChangeFeed>,
    active: AtomicBool,
    this: Weak<RepositoryManager>,
}

impl RepositoryManager {
    /// Create a manager and bring up its system repository.
    ///
    /// Failing to initialize the system repository fails the whole manager.
    pub fn open(backend: Arc<dyn ManagerBackend>) -> Result<Arc<Self>> {
        let system = backend.create_system_repository()?;
        let events = system.subscribe();
        if let Err(e) = system.initialize() {
            tracing::error!(error = %e, "System repository failed to initialize");
            return Err(e.into());
        }

        let manager = Arc::new_cyclic(|this| Self {
            backend,
            system,
            cache: Mutex::new(HashMap::new()),
            changes: Mutex::new(ChangeFeed {
                events,
                listener: ConfigChangeListener::new(),
            }),
            active: AtomicBool::new(true),
            this: this.clone(),
        });
        // Consume the bootstrap events.
        manager.process_config_changes()?;
        tracing::info!(location = ?manager.backend.location().ok(), "Repository manager opened");
        Ok(manager)
    }

    /// Open a manager over a [`LocalBackend`] rooted at `base_dir`.
    pub fn open_local(base_dir: impl AsRef<Path>) -> Result<Arc<Self>> {
        Self::open(Arc::new(LocalBackend::open(base_dir)?))
    }

    pub fn system_repository(&self) -> Arc<SystemRepository> {
        Arc::clone(&self.system)
    }

    pub fn templates(&self) -> Result<TemplateRegistry> {
        self.backend.templates()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.active.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::NotActive)
        }
    }

    fn resolver(&self) -> Weak<dyn RepositoryResolver> {
        self.this.clone()
    }

    fn system_connection(&self) -> Result<Box<dyn RepositoryConnection>> {
        Ok(self.system.connection()?)
    }

    /// Apply the invalidations implied by transactions committed to the
    /// system repository since the last call.
    ///
    /// Runs on entry to every cache operation, so callers only need it to
    /// make evictions happen before the next access.
    pub fn process_config_changes(&self) -> Result<()> {
        let decisions: Vec<Invalidation> = {
            let mut feed = lock(&self.changes);
            let events: Vec<StoreEvent> = feed.events.try_iter().collect();
            events
                .into_iter()
                .flat_map(|event| feed.listener.observe(event))
                .collect()
        };
        if decisions.is_empty() {
            return Ok(());
        }

        if decisions.contains(&Invalidation::RefreshAll) {
            tracing::debug!("Wildcard change to system repository, refreshing all repositories");
            return self.refresh_handles();
        }

        let conn = self.system_connection()?;
        let mut ids = Vec::new();
        for decision in decisions {
            if let Invalidation::Context(context) = decision {
                // Checked without the cache lock: this opens a connection.
                if let Some(id) = records::context_repository_id(conn.as_ref(), &context)? {
                    ids.push(id);
                }
            }
        }
        drop(conn);

        for id in ids.iter().filter(|id| id.as_str() != SYSTEM_ID) {
            let mut cache = lock(&self.cache);
            if let Some(handle) = cache.remove(id) {
                tracing::debug!(id = %id, "Configuration changed, evicting repository");
                if let Err(e) = handle.shut_down() {
                    tracing::warn!(id = %id, error = %e, "Failed to shut down invalidated repository");
                }
            }
        }
        Ok(())
    }

    fn refresh_handles(&self) -> Result<()> {
        let mut failures = Vec::new();
        let mut cache = lock(&self.cache);
        let conn = self.system_connection()?;

        for (id, handle) in cache.drain() {
            if let Err(e) = handle.shut_down() {
                tracing::error!(id = %id, error = %e, "Repository shutdown failed");
                failures.push(format!("{id}: {e}"));
            }
            match records::find_context(conn.as_ref(), &id) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if let Err(e) = self.backend.clean_up_repository(&id) {
                        tracing::error!(id = %id, error = %e, "Cleanup of removed repository failed");
                        failures.push(format!("{id}: {e}"));
                    }
                }
                Err(e) => failures.push(format!("{id}: {e}")),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown { failures })
        }
    }
}

impl Manager for RepositoryManager {
    fn location(&self) -> Result<Url> {
        self.backend.location()
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn get_repository(&self, id: &str) -> Result<Option<Arc<dyn Repository>>> {
        self.ensure_active()?;
        if id == SYSTEM_ID {
            let system: Arc<dyn Repository> = self.system.clone();
            return Ok(Some(system));
        }
        self.process_config_changes()?;

        let mut cache = lock(&self.cache);
        if let Some(handle) = cache.get(id) {
            return Ok(Some(Arc::clone(handle)));
        }

        let config = {
            let conn = self.system_connection()?;
            records::read_config(conn.as_ref(), id)?
        };
        let Some(config) = config else {
            return Ok(None);
        };

        tracing::debug!(id, kind = %config.implementation.kind, "Creating repository");
        let handle = self.backend.create_repository(&config, self.resolver())?;
        cache.insert(id.to_string(), Arc::clone(&handle));
        Ok(Some(handle))
    }

    fn repository_ids(&self) -> Result<Vec<String>> {
        self.ensure_active()?;
        let conn = self.system_connection()?;
        records::repository_ids(conn.as_ref())
    }

    fn get_repository_config(&self, id: &str) -> Result<Option<RepositoryConfig>> {
        self.ensure_active()?;
        let conn = self.system_connection()?;
        records::read_config(conn.as_ref(), id)
    }

    fn add_repository_config(&self, config: &RepositoryConfig) -> Result<()> {
        self.ensure_active()?;
        if is_reserved_id(&config.id) {
            return Err(Error::config(format!(
                "'{}' is reserved for the system repository",
                config.id
            )));
        }
        config.validate()?;
        self.backend.validate(config)?;

        {
            let mut conn = self.system_connection()?;
            conn.begin()?;
            if let Err(e) = records::write_config(conn.as_mut(), config) {
                conn.rollback()?;
                return Err(e);
            }
            conn.commit()?;
        }
        tracing::info!(id = %config.id, kind = %config.implementation.kind, "Stored repository configuration");

        self.process_config_changes()
    }

    fn remove_repository_config(&self, id: &str) -> Result<bool> {
        self.ensure_active()?;
        if is_reserved_id(id) {
            return Err(Error::config(format!(
                "'{id}' is reserved for the system repository and cannot be removed"
            )));
        }

        let removed = {
            let mut conn = self.system_connection()?;
            conn.begin()?;
            match records::remove_config(conn.as_mut(), id) {
                Ok(removed) => {
                    conn.commit()?;
                    removed
                }
                Err(e) => {
                    conn.rollback()?;
                    return Err(e);
                }
            }
        };
        self.process_config_changes()?;
        if !removed {
            return Ok(false);
        }

        let mut cache = lock(&self.cache);
        if let Some(handle) = cache.remove(id) {
            if let Err(e) = handle.shut_down() {
                tracing::warn!(id, error = %e, "Failed to shut down removed repository");
            }
        }
        self.backend
            .clean_up_repository(id)
            .map_err(|e| Error::Cleanup {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!(id, "Removed repository");
        Ok(true)
    }

    fn get_repository_info(&self, id: &str) -> Result<Option<RepositoryInfo>> {
        match self.get_repository_config(id)? {
            Some(config) => self.backend.repository_info(&config).map(Some),
            None => Ok(None),
        }
    }

    fn initialized_repository_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.cache).keys().cloned().collect();
        if self.system.is_initialized() {
            ids.push(SYSTEM_ID.to_string());
        }
        ids.sort();
        ids
    }

    fn refresh(&self) -> Result<()> {
        self.ensure_active()?;
        self.process_config_changes()?;
        tracing::info!("Refreshing all repositories");
        self.refresh_handles()
    }

    fn shut_down(&self) -> Result<()> {
        if !self.active.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures = Vec::new();
        let handles: Vec<(String, Arc<dyn Repository>)> = lock(&self.cache).drain().collect();
        for (id, handle) in handles {
            if let Err(e) = handle.shut_down() {
                tracing::error!(id = %id, error = %e, "Repository shutdown failed");
                failures.push(format!("{id}: {e}"));
            }
        }
        if let Err(e) = self.system.shut_down() {
            tracing::error!(error = %e, "System repository shutdown failed");
            failures.push(format!("{SYSTEM_ID}: {e}"));
        }
        tracing::info!(location = ?self.backend.location().ok(), "Repository manager shut down");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown { failures })
        }
    }
}

impl RepositoryResolver for RepositoryManager {
    fn resolve(&self, id: &str) -> repo_store::Result<Option<Arc<dyn Repository>>> {
        self.get_repository(id)
            .map_err(|e| repo_store::Error::config(format!("Cannot resolve repository '{id}': {e}")))
    }
}
