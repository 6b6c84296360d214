//! The self-describing repository that stores every configuration

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use repo_fs::{NormalizedPath, RepoPath};
use repo_store::vocab;
use repo_store::{
    DelegatingRepository, MemoryStore, Repository, RepositoryConnection, StoreEvent,
};

use crate::config::{ImplConfig, RepositoryConfig, records};
use crate::sync::lock;

type StoreResult<T> = repo_store::Result<T>;

/// Reserved id of the system repository.
pub const SYSTEM_ID: &str = RepoPath::SystemRepository.as_str();

/// Whether `id` names the system repository's data directory.
///
/// Compared case-insensitively, since `SYSTEM` and `system` share a
/// directory on case-insensitive filesystems.
pub fn is_reserved_id(id: &str) -> bool {
    id.eq_ignore_ascii_case(SYSTEM_ID)
}

/// Implementation type recorded in the system repository's own config.
pub const SYSTEM_TYPE: &str = "system";

/// Persistent store holding the configuration of all repositories,
/// including its own.
///
/// The first `initialize()` of an empty store seeds the namespace
/// declarations and the system repository's own config in one
/// transaction before returning. Its storage is fixed at construction;
/// attempts to swap it fail.
pub struct SystemRepository {
    store: MemoryStore,
    init: Mutex<()>,
}

impl SystemRepository {
    pub fn new(data_dir: NormalizedPath) -> Self {
        let store = MemoryStore::new(true);
        store.set_data_dir(data_dir);
        Self {
            store,
            init: Mutex::new(()),
        }
    }

    /// The config the system repository describes itself with.
    pub fn config() -> RepositoryConfig {
        RepositoryConfig::new(SYSTEM_ID, ImplConfig::new(SYSTEM_TYPE))
            .with_title("System configuration repository")
    }

    /// Change events of every connection to this repository.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.store.subscribe()
    }

    fn seed(conn: &mut dyn RepositoryConnection) -> crate::Result<()> {
        conn.begin()?;
        for (prefix, name) in vocab::default_namespaces() {
            conn.set_namespace(prefix, name)?;
        }
        records::write_config(conn, &Self::config())?;
        conn.commit()?;
        Ok(())
    }
}

impl Repository for SystemRepository {
    fn set_data_dir(&self, dir: NormalizedPath) {
        self.store.set_data_dir(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        self.store.data_dir()
    }

    fn initialize(&self) -> StoreResult<()> {
        let _guard = lock(&self.init);
        if self.store.is_initialized() {
            return Ok(());
        }
        self.store.initialize()?;

        let mut conn = self.store.connection()?;
        if conn.size(&[])? == 0 {
            tracing::info!(data_dir = ?self.store.data_dir(), "Bootstrapping system repository");
            if let Err(e) = Self::seed(conn.as_mut()) {
                let _ = conn.rollback();
                let _ = self.store.shut_down();
                return Err(repo_store::Error::config(format!(
                    "Failed to bootstrap system repository: {e}"
                )));
            }
        }
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    fn shut_down(&self) -> StoreResult<()> {
        self.store.shut_down()
    }

    fn connection(&self) -> StoreResult<Box<dyn RepositoryConnection>> {
        self.store.connection()
    }

    fn is_writable(&self) -> bool {
        true
    }

    fn as_delegating(&self) -> Option<&dyn DelegatingRepository> {
        Some(self)
    }
}

impl DelegatingRepository for SystemRepository {
    fn set_delegate(&self, _delegate: Arc<dyn Repository>) -> StoreResult<()> {
        Err(repo_store::Error::unsupported(
            "replacing the storage of the system repository",
        ))
    }

    fn delegate(&self) -> Option<Arc<dyn Repository>> {
        None
    }
}
