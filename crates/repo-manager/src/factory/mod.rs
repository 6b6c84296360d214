//! Repository factories keyed by implementation type
//!
//! A [`FactoryRegistry`] turns an [`ImplConfig`] chain into a repository
//! stack: each layer is created by the factory registered for its type,
//! delegating layers receive the stack built from their delegate config,
//! and repositories that resolve other repositories get the manager's
//! resolver injected.

mod builtins;

pub use builtins::{MemoryFactory, ProxyFactory, ReadOnlyFactory};

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use repo_fs::NormalizedPath;
use repo_store::{Repository, RepositoryResolver};

use crate::config::ImplConfig;
use crate::{Error, Result};

/// Everything a factory may need besides the layer config.
#[derive(Clone)]
pub struct BuildContext {
    /// Id of the repository being built
    pub id: String,
    /// Root that relative paths in the config resolve against
    pub base_dir: NormalizedPath,
    /// Default data directory of the repository
    pub data_dir: NormalizedPath,
    pub resolver: Weak<dyn RepositoryResolver>,
}

impl BuildContext {
    /// Resolve a path from the config against the base directory.
    pub fn resolve_path(&self, path: &str) -> NormalizedPath {
        if std::path::Path::new(path).is_absolute() {
            NormalizedPath::new(path)
        } else {
            self.base_dir.join(path)
        }
    }
}

/// Creates one layer of a repository stack.
pub trait RepositoryFactory: Send + Sync {
    /// The implementation type this factory handles.
    fn kind(&self) -> &str;

    /// Check the layer's parameters without building anything.
    fn validate(&self, _config: &ImplConfig) -> Result<()> {
        Ok(())
    }

    /// Whether layers of this type wrap a delegate. Delegating layers must
    /// have a delegate config; other layers must not.
    fn is_delegating(&self) -> bool {
        false
    }

    /// Whether a repository built from `config` accepts writes.
    fn is_writable(&self, _config: &ImplConfig) -> bool {
        true
    }

    fn create(&self, config: &ImplConfig, context: &BuildContext) -> Result<Arc<dyn Repository>>;
}

/// Registry of factories by type.
#[derive(Clone)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn RepositoryFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the `memory`, `read-only` and `proxy` factories.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(MemoryFactory);
        registry.register(ReadOnlyFactory);
        registry.register(ProxyFactory);
        registry
    }

    /// Register a factory, replacing any factory for the same type.
    pub fn register(&mut self, factory: impl RepositoryFactory + 'static) {
        self.factories
            .insert(factory.kind().to_string(), Arc::new(factory));
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn RepositoryFactory>> {
        self.factories.get(kind)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered types, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.factories.keys().map(String::as_str).collect();
        kinds.sort();
        kinds
    }

    fn require(&self, kind: &str) -> Result<&Arc<dyn RepositoryFactory>> {
        self.get(kind)
            .ok_or_else(|| Error::config(format!("Unsupported repository type: {kind}")))
    }

    /// Check every layer of `config` against the registered factories.
    pub fn validate(&self, config: &ImplConfig) -> Result<()> {
        for layer in config.layers() {
            let factory = self.require(&layer.kind)?;
            factory.validate(layer)?;
            match (factory.is_delegating(), layer.delegate.is_some()) {
                (true, false) => {
                    return Err(Error::config(format!(
                        "Repository type '{}' requires a delegate",
                        layer.kind
                    )));
                }
                (false, true) => {
                    return Err(Error::config(format!(
                        "Delegate specified for repository type '{}', which does not delegate",
                        layer.kind
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether every layer of `config` accepts writes. Unknown types are
    /// assumed writable.
    pub fn is_writable(&self, config: &ImplConfig) -> bool {
        config.layers().all(|layer| {
            self.get(&layer.kind)
                .is_none_or(|factory| factory.is_writable(layer))
        })
    }

    /// Build the (uninitialized) repository stack for `config`.
    pub fn build(&self, config: &ImplConfig, context: &BuildContext) -> Result<Arc<dyn Repository>> {
        let factory = self.require(&config.kind)?;
        factory.validate(config)?;
        let repository = factory.create(config, context)?;

        match (&config.delegate, repository.as_delegating()) {
            (Some(delegate_config), Some(delegating)) => {
                let delegate = self.build(delegate_config, context)?;
                delegating.set_delegate(delegate)?;
            }
            (Some(_), None) => {
                return Err(Error::config(format!(
                    "Delegate specified for repository type '{}', which does not delegate",
                    config.kind
                )));
            }
            (None, Some(_)) => {
                return Err(Error::config(format!(
                    "Repository type '{}' requires a delegate",
                    config.kind
                )));
            }
            (None, None) => {}
        }

        if let Some(client) = repository.as_resolver_client() {
            client.set_resolver(context.resolver.clone());
        }

        Ok(repository)
    }
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
