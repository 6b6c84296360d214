//! Lookup of repositories by id, used by repositories that refer to others.

use std::sync::{Arc, Weak};

use crate::Result;
use crate::repository::Repository;

/// Something that can map a repository id to a live handle.
pub trait RepositoryResolver: Send + Sync {
    /// `Ok(None)` when no repository with `id` is configured.
    fn resolve(&self, id: &str) -> Result<Option<Arc<dyn Repository>>>;
}

/// A repository that needs a resolver injected before first use.
///
/// The resolver is held weakly: the manager owns its repositories, not the
/// other way around.
pub trait ResolverClient {
    fn set_resolver(&self, resolver: Weak<dyn RepositoryResolver>);
}
