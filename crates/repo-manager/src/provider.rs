//! Shared managers keyed by canonical location
//!
//! A [`RepositoryProvider`] hands out one [`Manager`] per location, so URL
//! spellings that canonicalize identically share one manager and one
//! handle cache. The provider is an ordinary value: applications create one
//! at their entry point and call [`RepositoryProvider::shutdown_all`] (or
//! hold a [`ShutdownGuard`]) on exit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use repo_fs::NormalizedPath;
use repo_store::Repository;
use url::Url;

use crate::backend::LocalBackend;
use crate::manager::{Manager, RepositoryManager};
use crate::sync::lock;
use crate::{Error, Result};

const REPOSITORIES_SEGMENT: &str = "/repositories/";

/// Builds the manager for a canonical location.
pub trait ManagerFactory: Send + Sync {
    fn create_manager(&self, location: &Url) -> Result<Arc<dyn Manager>>;
}

/// Opens local managers for `file:` locations.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalManagerFactory;

impl ManagerFactory for LocalManagerFactory {
    fn create_manager(&self, location: &Url) -> Result<Arc<dyn Manager>> {
        if location.scheme() != "file" {
            return Err(Error::unsupported(format!(
                "remote repository manager at {location}"
            )));
        }
        let path = location
            .to_file_path()
            .map_err(|()| Error::invalid_location(location.as_str(), "not a local path"))?;
        let manager: Arc<dyn Manager> = RepositoryManager::open_local(path)?;
        Ok(manager)
    }
}

/// Registry of live managers, one per canonical location.
pub struct RepositoryProvider {
    factory: Box<dyn ManagerFactory>,
    managers: Mutex<HashMap<Url, Arc<dyn Manager>>>,
}

impl RepositoryProvider {
    pub fn new() -> Self {
        Self::with_factory(LocalManagerFactory)
    }

    pub fn with_factory(factory: impl ManagerFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            managers: Mutex::new(HashMap::new()),
        }
    }

    /// The manager for `location`, created on first use.
    ///
    /// A cached manager that was shut down elsewhere is replaced by a new
    /// one.
    pub fn get_repository_manager(&self, location: &str) -> Result<Arc<dyn Manager>> {
        let key = canonicalize_location(location)?;
        let mut managers = lock(&self.managers);

        if let Some(manager) = managers.get(&key) {
            if manager.is_active() {
                return Ok(Arc::clone(manager));
            }
            tracing::debug!(location = %key, "Replacing inactive repository manager");
            managers.remove(&key);
        }

        let manager = self.factory.create_manager(&key)?;
        tracing::info!(location = %key, "Created repository manager");
        managers.insert(key, Arc::clone(&manager));
        Ok(manager)
    }

    /// The manager in the user's local data directory, see
    /// [`default_location`].
    pub fn get_default_manager(&self) -> Result<Arc<dyn Manager>> {
        self.get_repository_manager(default_location()?.as_str())
    }

    /// The repository addressed by `repository_url`
    /// (`{manager location}/repositories/{id}`).
    pub fn get_repository(&self, repository_url: &str) -> Result<Option<Arc<dyn Repository>>> {
        let location = repository_manager_location(repository_url)?;
        let id = repository_id(repository_url)?;
        self.get_repository_manager(location.as_str())?
            .get_repository(&id)
    }

    /// Shut down and forget every manager. Failures are logged and do not
    /// stop the remaining shutdowns.
    pub fn shutdown_all(&self) {
        let managers: Vec<(Url, Arc<dyn Manager>)> = lock(&self.managers).drain().collect();
        for (location, manager) in managers {
            match manager.shut_down() {
                Ok(()) => tracing::debug!(location = %location, "Repository manager shut down"),
                Err(e) => {
                    tracing::error!(location = %location, error = %e, "Repository manager shutdown failed")
                }
            }
        }
    }

    /// A guard that calls [`shutdown_all`](Self::shutdown_all) when dropped.
    pub fn shutdown_guard(&self) -> ShutdownGuard<'_> {
        ShutdownGuard { provider: self }
    }

    pub fn manager_count(&self) -> usize {
        lock(&self.managers).len()
    }
}

impl Default for RepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[must_use = "the managers are shut down when the guard is dropped"]
pub struct ShutdownGuard<'a> {
    provider: &'a RepositoryProvider,
}

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.provider.shutdown_all();
    }
}

/// Canonical form of a manager location.
///
/// Local paths (absolute, relative or Windows drive paths) become `file:`
/// URLs of the absolute directory. Scheme and host are lower-cased, empty
/// and `.` path segments dropped, the fragment removed and a trailing
/// slash enforced.
pub fn canonicalize_location(location: &str) -> Result<Url> {
    let location = location.trim();
    if location.is_empty() {
        return Err(Error::invalid_location(location, "empty location"));
    }

    let mut url = match Url::parse(location) {
        // Single-letter schemes are drive letters.
        Ok(url) if url.scheme().len() > 1 => url,
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => local_url(location)?,
        Err(e) => return Err(Error::invalid_location(location, e.to_string())),
    };
    if url.cannot_be_a_base() {
        return Err(Error::invalid_location(location, "not a hierarchical URL"));
    }

    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        if !host.is_empty() {
            url.set_host(Some(&host))
                .map_err(|e| Error::invalid_location(location, e.to_string()))?;
        }
    }

    let mut path = String::from("/");
    for segment in url.path().split('/').filter(|s| !s.is_empty() && *s != ".") {
        path.push_str(segment);
        path.push('/');
    }
    url.set_path(&path);
    url.set_fragment(None);
    Ok(url)
}

fn local_url(location: &str) -> Result<Url> {
    let path = NormalizedPath::absolute(location)?;
    Url::from_directory_path(path.to_native())
        .map_err(|()| Error::invalid_location(location, "not an absolute path"))
}

/// `file:` URL of [`LocalBackend::default_base_dir`].
pub fn default_location() -> Result<Url> {
    let dir = LocalBackend::default_base_dir()
        .ok_or_else(|| Error::invalid_location("", "no local data directory for this user"))?;
    Url::from_directory_path(dir.to_native())
        .map_err(|()| Error::invalid_location(dir.as_str(), "not an absolute path"))
}

/// The manager location of a repository URL: everything up to and
/// including the `/` before `repositories/`.
pub fn repository_manager_location(repository_url: &str) -> Result<Url> {
    let mut url = canonicalize_location(repository_url)?;
    let index = repositories_index(&url, repository_url)?;
    let path = url.path()[..=index].to_string();
    url.set_path(&path);
    url.set_query(None);
    Ok(url)
}

/// The repository id of a repository URL: the path segment following
/// `repositories/`.
pub fn repository_id(repository_url: &str) -> Result<String> {
    let url = canonicalize_location(repository_url)?;
    let index = repositories_index(&url, repository_url)?;
    let rest = url.path()[index + REPOSITORIES_SEGMENT.len()..].trim_end_matches('/');
    let id = rest.split('/').next().unwrap_or_default();
    if id.is_empty() {
        return Err(Error::invalid_location(repository_url, "missing repository id"));
    }
    Ok(id.to_string())
}

fn repositories_index(url: &Url, original: &str) -> Result<usize> {
    url.path()
        .rfind(REPOSITORIES_SEGMENT)
        .ok_or_else(|| Error::invalid_location(original, "not a repository URL"))
}
