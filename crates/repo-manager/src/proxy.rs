//! Deferred indirection to another managed repository

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use repo_fs::NormalizedPath;
use repo_store::{Repository, RepositoryConnection, RepositoryResolver, ResolverClient};

use crate::sync::lock;

type StoreResult<T> = repo_store::Result<T>;

thread_local! {
    // Ids being resolved on this thread; guards against proxy cycles.
    static RESOLVING: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

#[derive(Default)]
struct ProxyState {
    resolver: Option<Weak<dyn RepositoryResolver>>,
    proxied_id: Option<String>,
    target: Option<Arc<dyn Repository>>,
}

/// A repository that owns no data and forwards to the repository with a
/// given id, looked up through its resolver on first use.
///
/// The resolved target is cached until the resolver or the id changes, or
/// until the target itself is shut down (for instance because its manager
/// evicted it), in which case the next use resolves again. The target is
/// owned by its manager: shutting the proxy down leaves it running.
#[derive(Default)]
pub struct ProxyRepository {
    state: Mutex<ProxyState>,
    data_dir: Mutex<Option<NormalizedPath>>,
    initialized: AtomicBool,
}

impl ProxyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_proxied_id(&self, id: impl Into<String>) {
        let mut state = lock(&self.state);
        state.proxied_id = Some(id.into());
        state.target = None;
    }

    pub fn proxied_id(&self) -> Option<String> {
        lock(&self.state).proxied_id.clone()
    }

    /// The target, resolving it if no live resolution is cached.
    pub fn target(&self) -> StoreResult<Arc<dyn Repository>> {
        // The state lock is released before resolving: resolution takes
        // the manager's cache lock, which may be held by a thread that is
        // shutting this proxy down.
        let (resolver, id) = {
            let state = lock(&self.state);
            if let Some(target) = state.target.as_ref().filter(|t| t.is_initialized()) {
                return Ok(Arc::clone(target));
            }
            match (&state.resolver, &state.proxied_id) {
                (Some(resolver), Some(id)) => (resolver.clone(), id.clone()),
                (None, _) => {
                    return Err(repo_store::Error::config(
                        "Proxy repository has no resolver",
                    ));
                }
                (_, None) => {
                    return Err(repo_store::Error::config(
                        "No id specified for proxied repository",
                    ));
                }
            }
        };

        let resolver = resolver.upgrade().ok_or_else(|| {
            repo_store::Error::config(format!(
                "Manager of proxied repository '{id}' is gone"
            ))
        })?;
        let target = resolver.resolve(&id)?.ok_or_else(|| {
            repo_store::Error::config(format!("Proxied repository '{id}' does not exist"))
        })?;
        tracing::debug!(target_id = %id, "Resolved proxied repository");

        let mut state = lock(&self.state);
        // Only cache if nobody retargeted the proxy meanwhile.
        if state.proxied_id.as_deref() == Some(id.as_str()) {
            state.target = Some(Arc::clone(&target));
        }
        Ok(target)
    }
}

impl Repository for ProxyRepository {
    fn set_data_dir(&self, dir: NormalizedPath) {
        *lock(&self.data_dir) = Some(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        lock(&self.data_dir).clone()
    }

    fn initialize(&self) -> StoreResult<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn shut_down(&self) -> StoreResult<()> {
        self.initialized.store(false, Ordering::Release);
        lock(&self.state).target = None;
        Ok(())
    }

    fn connection(&self) -> StoreResult<Box<dyn RepositoryConnection>> {
        if !self.is_initialized() {
            return Err(repo_store::Error::NotInitialized);
        }
        let id = self.proxied_id().unwrap_or_default();
        let cyclic = RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&id) {
                true
            } else {
                stack.push(id.clone());
                false
            }
        });
        if cyclic {
            return Err(repo_store::Error::config(format!(
                "Proxy cycle through repository '{id}'"
            )));
        }

        let result = self.target().and_then(|target| target.connection());
        RESOLVING.with(|stack| {
            stack.borrow_mut().pop();
        });
        result
    }

    fn is_writable(&self) -> bool {
        self.target().is_ok_and(|target| target.is_writable())
    }

    fn as_resolver_client(&self) -> Option<&dyn ResolverClient> {
        Some(self)
    }
}

impl ResolverClient for ProxyRepository {
    fn set_resolver(&self, resolver: Weak<dyn RepositoryResolver>) {
        let mut state = lock(&self.state);
        state.resolver = Some(resolver);
        state.target = None;
    }
}
