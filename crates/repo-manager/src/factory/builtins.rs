//! Built-in repository factories

use std::sync::Arc;

use repo_store::{MemoryStore, ReadOnlyRepository, Repository};

use super::{BuildContext, RepositoryFactory};
use crate::config::ImplConfig;
use crate::proxy::ProxyRepository;
use crate::{Error, Result};

/// `memory`: an in-memory store.
///
/// Parameters:
/// - `persist` (`true`/`false`, default `true`): snapshot into the data dir
/// - `dataDir`: overrides the data dir; relative paths resolve against the
///   manager's base directory
pub struct MemoryFactory;

impl MemoryFactory {
    pub const KIND: &'static str = "memory";

    fn persist(config: &ImplConfig) -> Result<bool> {
        match config.param("persist") {
            None => Ok(true),
            Some(value) => value.trim().parse().map_err(|_| {
                Error::config(format!("Invalid value for 'persist': {value}"))
            }),
        }
    }
}

impl RepositoryFactory for MemoryFactory {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn validate(&self, config: &ImplConfig) -> Result<()> {
        Self::persist(config).map(|_| ())
    }

    fn create(&self, config: &ImplConfig, context: &BuildContext) -> Result<Arc<dyn Repository>> {
        let store = MemoryStore::new(Self::persist(config)?);
        let data_dir = match config.param("dataDir") {
            Some(path) => context.resolve_path(path),
            None => context.data_dir.clone(),
        };
        store.set_data_dir(data_dir);
        Ok(Arc::new(store))
    }
}

/// `read-only`: rejects writes to its delegate.
pub struct ReadOnlyFactory;

impl ReadOnlyFactory {
    pub const KIND: &'static str = "read-only";
}

impl RepositoryFactory for ReadOnlyFactory {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn is_delegating(&self) -> bool {
        true
    }

    fn is_writable(&self, _config: &ImplConfig) -> bool {
        false
    }

    fn create(&self, _config: &ImplConfig, _context: &BuildContext) -> Result<Arc<dyn Repository>> {
        Ok(Arc::new(ReadOnlyRepository::new()))
    }
}

/// `proxy`: forwards to another repository of the same manager.
///
/// Parameters:
/// - `proxiedID` (required): id of the target repository
pub struct ProxyFactory;

impl ProxyFactory {
    pub const KIND: &'static str = "proxy";
    pub const PROXIED_ID: &'static str = "proxiedID";

    fn proxied_id(config: &ImplConfig) -> Result<&str> {
        config
            .param(Self::PROXIED_ID)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::config("No id specified for proxied repository"))
    }
}

impl RepositoryFactory for ProxyFactory {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn validate(&self, config: &ImplConfig) -> Result<()> {
        Self::proxied_id(config).map(|_| ())
    }

    fn create(&self, config: &ImplConfig, context: &BuildContext) -> Result<Arc<dyn Repository>> {
        let target = Self::proxied_id(config)?;
        if target == context.id {
            return Err(Error::config(format!(
                "Repository '{}' cannot proxy itself",
                context.id
            )));
        }
        let proxy = ProxyRepository::new();
        proxy.set_proxied_id(target);
        proxy.set_data_dir(context.data_dir.clone());
        Ok(Arc::new(proxy))
    }
}
