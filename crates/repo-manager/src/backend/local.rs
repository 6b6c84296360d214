//! Filesystem-backed manager backend

use std::path::Path;
use std::sync::{Arc, Weak};

use repo_fs::{NormalizedPath, RepoPath, io};
use repo_store::{Repository, RepositoryResolver};
use url::Url;

use super::ManagerBackend;
use crate::config::{ManagerSettings, RepositoryConfig, TemplateRegistry};
use crate::factory::{BuildContext, FactoryRegistry};
use crate::manager::RepositoryInfo;
use crate::system::{SYSTEM_ID, SystemRepository};
use crate::{Error, Result};

/// Backend keeping every repository under one base directory.
///
/// ```text
/// {base}/
/// ├── manager.toml
/// ├── templates/*.toml
/// └── repositories/
///     ├── SYSTEM/
///     └── {id}/
/// ```
pub struct LocalBackend {
    base_dir: NormalizedPath,
    registry: FactoryRegistry,
    settings: ManagerSettings,
}

impl LocalBackend {
    /// Open (creating if needed) the base directory and read its settings.
    ///
    /// Relative paths are resolved against the current working directory.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = NormalizedPath::absolute(base_dir)?;
        let native = base_dir.to_native();
        std::fs::create_dir_all(&native).map_err(|e| repo_fs::Error::io(&native, e))?;
        let settings = ManagerSettings::load(&base_dir)?;

        Ok(Self {
            base_dir,
            registry: FactoryRegistry::with_builtins(),
            settings,
        })
    }

    /// Default base directory in the user's local data directory.
    pub fn default_base_dir() -> Option<NormalizedPath> {
        dirs::data_local_dir().map(|dir| NormalizedPath::new(dir).join("rdf-repository-manager"))
    }

    pub fn with_registry(mut self, registry: FactoryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn base_dir(&self) -> &NormalizedPath {
        &self.base_dir
    }

    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    /// `{base}/repositories/{id}`
    pub fn repository_dir(&self, id: &str) -> Result<NormalizedPath> {
        repo_fs::validate_path_identifier(id)?;
        Ok(self
            .base_dir
            .join(RepoPath::RepositoriesDir.as_str())
            .join(id))
    }
}

impl ManagerBackend for LocalBackend {
    fn location(&self) -> Result<Url> {
        Url::from_directory_path(self.base_dir.to_native()).map_err(|_| {
            Error::invalid_location(self.base_dir.as_str(), "not an absolute path")
        })
    }

    fn create_system_repository(&self) -> Result<Arc<SystemRepository>> {
        Ok(Arc::new(SystemRepository::new(
            self.repository_dir(SYSTEM_ID)?,
        )))
    }

    fn validate(&self, config: &RepositoryConfig) -> Result<()> {
        self.registry.validate(&config.implementation)
    }

    fn create_repository(
        &self,
        config: &RepositoryConfig,
        resolver: Weak<dyn RepositoryResolver>,
    ) -> Result<Arc<dyn Repository>> {
        let context = BuildContext {
            id: config.id.clone(),
            base_dir: self.base_dir.clone(),
            data_dir: self.repository_dir(&config.id)?,
            resolver,
        };
        let repository = self.registry.build(&config.implementation, &context)?;

        if let Err(e) = repository.initialize() {
            if let Err(shutdown) = repository.shut_down() {
                tracing::warn!(id = %config.id, error = %shutdown, "Shutdown after failed initialization failed");
            }
            return Err(e.into());
        }
        Ok(repository)
    }

    fn repository_info(&self, config: &RepositoryConfig) -> Result<RepositoryInfo> {
        let dir = self.repository_dir(&config.id)?;
        let location = Url::from_directory_path(dir.to_native()).ok();
        Ok(RepositoryInfo {
            id: config.id.clone(),
            title: config.title.clone(),
            location,
            readable: true,
            writable: self.registry.is_writable(&config.implementation),
        })
    }

    fn clean_up_repository(&self, id: &str) -> Result<()> {
        let dir = self.repository_dir(id)?;
        if io::remove_dir_all(&dir, self.settings.cleanup.robustness())? {
            tracing::debug!(id, dir = %dir, "Removed repository data");
        }
        Ok(())
    }

    fn templates(&self) -> Result<TemplateRegistry> {
        let mut templates = TemplateRegistry::with_builtins();
        templates.load_dir(&self.base_dir.join(&self.settings.templates_dir))?;
        Ok(templates)
    }
}
