//! A manager view restricted to one repository type

use std::sync::Arc;

use repo_store::{Repository, RepositoryResolver};
use url::Url;

use super::{Manager, RepositoryInfo};
use crate::config::RepositoryConfig;
use crate::{Error, Result};

/// Exposes only the repositories of `inner` whose outermost layer has the
/// given implementation type.
///
/// Lifecycle operations (`refresh`, `shut_down`) act on the whole inner
/// manager.
pub struct TypeFilteringManager {
    inner: Arc<dyn Manager>,
    kind: String,
}

impl TypeFilteringManager {
    pub fn new(inner: Arc<dyn Manager>, kind: impl Into<String>) -> Self {
        Self {
            inner,
            kind: kind.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    fn accepts(&self, config: &RepositoryConfig) -> bool {
        config.implementation.kind == self.kind
    }

    fn accepts_id(&self, id: &str) -> Result<bool> {
        Ok(self
            .inner
            .get_repository_config(id)?
            .is_some_and(|config| self.accepts(&config)))
    }
}

impl Manager for TypeFilteringManager {
    fn location(&self) -> Result<Url> {
        self.inner.location()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn get_repository(&self, id: &str) -> Result<Option<Arc<dyn Repository>>> {
        if self.accepts_id(id)? {
            self.inner.get_repository(id)
        } else {
            Ok(None)
        }
    }

    fn repository_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for id in self.inner.repository_ids()? {
            if self.accepts_id(&id)? {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    fn get_repository_config(&self, id: &str) -> Result<Option<RepositoryConfig>> {
        Ok(self
            .inner
            .get_repository_config(id)?
            .filter(|config| self.accepts(config)))
    }

    fn add_repository_config(&self, config: &RepositoryConfig) -> Result<()> {
        if !self.accepts(config) {
            return Err(Error::unsupported(format!(
                "adding a '{}' repository to a manager of '{}' repositories",
                config.implementation.kind, self.kind
            )));
        }
        self.inner.add_repository_config(config)
    }

    fn remove_repository_config(&self, id: &str) -> Result<bool> {
        if self.accepts_id(id)? {
            self.inner.remove_repository_config(id)
        } else {
            Ok(false)
        }
    }

    fn new_repository_id(&self, base_name: &str) -> Result<String> {
        // Ids are unique across the inner manager, not just this view.
        self.inner.new_repository_id(base_name)
    }

    fn get_repository_info(&self, id: &str) -> Result<Option<RepositoryInfo>> {
        if self.accepts_id(id)? {
            self.inner.get_repository_info(id)
        } else {
            Ok(None)
        }
    }

    fn initialized_repository_ids(&self) -> Vec<String> {
        self.inner
            .initialized_repository_ids()
            .into_iter()
            .filter(|id| self.accepts_id(id).unwrap_or(false))
            .collect()
    }

    fn refresh(&self) -> Result<()> {
        self.inner.refresh()
    }

    fn shut_down(&self) -> Result<()> {
        self.inner.shut_down()
    }
}

impl RepositoryResolver for TypeFilteringManager {
    fn resolve(&self, id: &str) -> repo_store::Result<Option<Arc<dyn Repository>>> {
        self.get_repository(id)
            .map_err(|e| repo_store::Error::config(format!("Cannot resolve repository '{id}': {e}")))
    }
}
