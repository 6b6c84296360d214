//! Repository handle lifecycle

use std::sync::Arc;

use repo_fs::NormalizedPath;

use crate::Result;
use crate::connection::RepositoryConnection;
use crate::resolver::ResolverClient;

/// A live, openable repository.
///
/// Handles are shared across threads, so every method takes `&self`.
/// Construction is done by a factory; the data directory is assigned before
/// `initialize()` and stays fixed afterwards.
pub trait Repository: Send + Sync {
    fn set_data_dir(&self, dir: NormalizedPath);

    fn data_dir(&self) -> Option<NormalizedPath>;

    /// Bring the repository up. Calling it on an initialized repository
    /// is a no-op.
    fn initialize(&self) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Release resources. New connections fail afterwards; connections that
    /// are already open keep working until closed.
    fn shut_down(&self) -> Result<()>;

    fn connection(&self) -> Result<Box<dyn RepositoryConnection>>;

    fn is_writable(&self) -> bool;

    /// Capability query for layers that wrap another repository.
    fn as_delegating(&self) -> Option<&dyn DelegatingRepository> {
        None
    }

    /// Capability query for repositories that look up other repositories.
    fn as_resolver_client(&self) -> Option<&dyn ResolverClient> {
        None
    }
}

/// A repository layered on top of another one.
pub trait DelegatingRepository {
    fn set_delegate(&self, delegate: Arc<dyn Repository>) -> Result<()>;

    fn delegate(&self) -> Option<Arc<dyn Repository>>;
}
