//! Instrumented repository factories.
//!
//! All factories build volatile in-memory stores; they differ in what they
//! let a test observe or control.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use repo_fs::NormalizedPath;
use repo_manager::{BuildContext, ImplConfig, RepositoryFactory};
use repo_store::{MemoryStore, Repository, RepositoryConnection};

/// Counts how many repositories it creates.
///
/// Clones share the counter, so a test keeps one clone and registers the
/// other.
#[derive(Clone)]
pub struct CountingFactory {
    kind: String,
    created: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingFactory {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            created: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` inside every construction, widening race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl RepositoryFactory for CountingFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create(
        &self,
        _config: &ImplConfig,
        context: &BuildContext,
    ) -> repo_manager::Result<Arc<dyn Repository>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let store = MemoryStore::new(false);
        store.set_data_dir(context.data_dir.clone());
        Ok(Arc::new(store))
    }
}

#[derive(Default)]
struct GateState {
    entered: usize,
    open: bool,
}

/// A barrier that repositories built by [`BlockingFactory`] wait on during
/// `initialize()` until the test opens it.
#[derive(Default)]
pub struct Gate {
    state: Mutex<GateState>,
    changed: Condvar,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Release every current and future waiter.
    pub fn open(&self) {
        self.state.lock().unwrap().open = true;
        self.changed.notify_all();
    }

    /// Number of initializations that reached the gate.
    pub fn entered(&self) -> usize {
        self.state.lock().unwrap().entered
    }

    /// Wait until at least `count` initializations reached the gate.
    pub fn wait_entered(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap();
        while state.entered < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            state = self.changed.wait_timeout(state, remaining).unwrap().0;
        }
        true
    }

    fn pass(&self) {
        let mut state = self.state.lock().unwrap();
        state.entered += 1;
        self.changed.notify_all();
        while !state.open {
            state = self.changed.wait(state).unwrap();
        }
    }
}

/// Builds repositories whose `initialize()` blocks on a [`Gate`].
pub struct BlockingFactory {
    kind: String,
    gate: Arc<Gate>,
}

impl BlockingFactory {
    pub fn new(kind: impl Into<String>, gate: Arc<Gate>) -> Self {
        Self {
            kind: kind.into(),
            gate,
        }
    }
}

impl RepositoryFactory for BlockingFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create(
        &self,
        _config: &ImplConfig,
        context: &BuildContext,
    ) -> repo_manager::Result<Arc<dyn Repository>> {
        let store = MemoryStore::new(false);
        store.set_data_dir(context.data_dir.clone());
        Ok(Arc::new(GatedRepository {
            store,
            gate: Arc::clone(&self.gate),
        }))
    }
}

struct GatedRepository {
    store: MemoryStore,
    gate: Arc<Gate>,
}

impl Repository for GatedRepository {
    fn set_data_dir(&self, dir: NormalizedPath) {
        self.store.set_data_dir(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        self.store.data_dir()
    }

    fn initialize(&self) -> repo_store::Result<()> {
        self.gate.pass();
        self.store.initialize()
    }

    fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    fn shut_down(&self) -> repo_store::Result<()> {
        self.store.shut_down()
    }

    fn connection(&self) -> repo_store::Result<Box<dyn RepositoryConnection>> {
        self.store.connection()
    }

    fn is_writable(&self) -> bool {
        true
    }
}

/// Builds repositories whose `shut_down()` stops the store but still
/// reports a storage failure.
pub struct FailingShutdownFactory {
    kind: String,
}

impl FailingShutdownFactory {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl RepositoryFactory for FailingShutdownFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn create(
        &self,
        _config: &ImplConfig,
        context: &BuildContext,
    ) -> repo_manager::Result<Arc<dyn Repository>> {
        let store = MemoryStore::new(false);
        store.set_data_dir(context.data_dir.clone());
        Ok(Arc::new(FailingShutdownRepository { store }))
    }
}

struct FailingShutdownRepository {
    store: MemoryStore,
}

impl Repository for FailingShutdownRepository {
    fn set_data_dir(&self, dir: NormalizedPath) {
        self.store.set_data_dir(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        self.store.data_dir()
    }

    fn initialize(&self) -> repo_store::Result<()> {
        self.store.initialize()
    }

    fn is_initialized(&self) -> bool {
        self.store.is_initialized()
    }

    fn shut_down(&self) -> repo_store::Result<()> {
        self.store.shut_down()?;
        let path = self.store.data_dir().map(|dir| dir.to_native()).unwrap_or_default();
        Err(repo_fs::Error::io(path, std::io::Error::other("storage detached")).into())
    }

    fn connection(&self) -> repo_store::Result<Box<dyn RepositoryConnection>> {
        self.store.connection()
    }

    fn is_writable(&self) -> bool {
        true
    }
}
