//! In-memory statement store with optional snapshot persistence.
//!
//! A persistent store writes its full dataset to
//! `{data_dir}/memorystore.json` after every commit and reloads it on
//! `initialize()`. Commits are applied to a copy of the dataset first, so a
//! failed snapshot write leaves the store unchanged.
//!
//! Connections belong to one initialization of the store: after
//! `shut_down()` every operation on them fails with
//! [`Error::NotInitialized`], even once the store is initialized again.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock};

use repo_fs::{NormalizedPath, RepoPath, io};
use serde::{Deserialize, Serialize};

use crate::connection::RepositoryConnection;
use crate::event::{ConnectionId, EventHub, StoreEvent};
use crate::model::{Context, Iri, Resource, Statement, Term};
use crate::repository::Repository;
use crate::sync::{read, write};
use crate::{Error, Result};

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Dataset {
    statements: BTreeSet<Statement>,
    #[serde(default)]
    namespaces: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
enum Op {
    Add(Statement),
    Remove {
        subject: Option<Resource>,
        predicate: Option<Iri>,
        object: Option<Term>,
        contexts: Vec<Context>,
    },
    Clear(Vec<Context>),
    SetNamespace(String, String),
}

impl Dataset {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::Add(statement) => {
                self.statements.insert(statement.clone());
            }
            Op::Remove {
                subject,
                predicate,
                object,
                contexts,
            } => self.statements.retain(|st| {
                !st.matches(subject.as_ref(), predicate.as_ref(), object.as_ref(), contexts)
            }),
            Op::Clear(contexts) => self
                .statements
                .retain(|st| !st.matches(None, None, None, contexts)),
            Op::SetNamespace(prefix, name) => {
                self.namespaces.insert(prefix.clone(), name.clone());
            }
        }
    }

    fn select(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Vec<Statement> {
        self.statements
            .iter()
            .filter(|st| st.matches(subject, predicate, object, contexts))
            .cloned()
            .collect()
    }
}

#[derive(Debug)]
struct Shared {
    persist: bool,
    data_dir: RwLock<Option<NormalizedPath>>,
    dataset: RwLock<Dataset>,
    initialized: AtomicBool,
    /// Bumped by every shutdown while holding the dataset write lock.
    generation: AtomicU64,
    events: EventHub,
}

impl Shared {
    fn snapshot_path(&self) -> Option<NormalizedPath> {
        if !self.persist {
            return None;
        }
        read(&self.data_dir)
            .as_ref()
            .map(|dir| dir.join(RepoPath::StoreSnapshot.as_str()))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.initialized.load(Ordering::Acquire)
            && self.generation.load(Ordering::Acquire) == generation
    }

    fn apply(&self, generation: u64, ops: &[Op]) -> Result<()> {
        let mut dataset = write(&self.dataset);
        if !self.is_current(generation) {
            return Err(Error::NotInitialized);
        }
        let mut next = dataset.clone();
        for op in ops {
            next.apply(op);
        }
        if let Some(path) = self.snapshot_path() {
            let content = serde_json::to_vec(&next)?;
            io::write_atomic(&path, &content)?;
        }
        *dataset = next;
        Ok(())
    }
}

/// A statement store kept in memory.
///
/// Cloning yields another handle to the same store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    /// Create a store. With `persist` set, the store snapshots itself into
    /// its data directory; without a data directory it stays volatile.
    pub fn new(persist: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                persist,
                data_dir: RwLock::new(None),
                dataset: RwLock::new(Dataset::default()),
                initialized: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events: EventHub::new(),
            }),
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.shared.persist
    }

    /// Receive the change events of every connection to this store.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        self.shared.events.subscribe()
    }

    fn load_snapshot(&self) -> Result<()> {
        let Some(path) = self.shared.snapshot_path() else {
            return Ok(());
        };
        let dataset = if path.is_file() {
            let content = io::read_text(&path)?;
            serde_json::from_str(&content)?
        } else {
            Dataset::default()
        };
        tracing::debug!(
            path = %path,
            statements = dataset.statements.len(),
            "Loaded store snapshot"
        );
        *write(&self.shared.dataset) = dataset;
        Ok(())
    }
}

impl Repository for MemoryStore {
    fn set_data_dir(&self, dir: NormalizedPath) {
        *write(&self.shared.data_dir) = Some(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        read(&self.shared.data_dir).clone()
    }

    fn initialize(&self) -> Result<()> {
        if self.shared.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.load_snapshot()?;
        self.shared.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    fn shut_down(&self) -> Result<()> {
        let _dataset = write(&self.shared.dataset);
        if self.shared.initialized.swap(false, Ordering::AcqRel) {
            self.shared.generation.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(data_dir = ?self.data_dir(), "Memory store shut down");
        }
        Ok(())
    }

    fn connection(&self) -> Result<Box<dyn RepositoryConnection>> {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if !self.shared.is_current(generation) {
            return Err(Error::NotInitialized);
        }
        Ok(Box::new(MemoryConnection {
            shared: Arc::clone(&self.shared),
            generation,
            id: NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed),
            pending: None,
            closed: false,
        }))
    }

    fn is_writable(&self) -> bool {
        true
    }
}

/// A connection to a [`MemoryStore`].
pub struct MemoryConnection {
    shared: Arc<Shared>,
    generation: u64,
    id: ConnectionId,
    pending: Option<Vec<Op>>,
    closed: bool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ConnectionClosed { connection: self.id })
        } else if !self.shared.is_current(self.generation) {
            Err(Error::NotInitialized)
        } else {
            Ok(())
        }
    }

    fn stage(&mut self, op: Op, event: StoreEvent) -> Result<()> {
        self.ensure_open()?;
        match &mut self.pending {
            Some(ops) => {
                ops.push(op);
                self.shared.events.publish(event);
            }
            None => {
                self.shared.apply(self.generation, std::slice::from_ref(&op))?;
                self.shared.events.publish(event);
                self.shared
                    .events
                    .publish(StoreEvent::Committed { connection: self.id });
            }
        }
        Ok(())
    }

    /// Run `f` against the dataset as this connection sees it.
    fn with_view<T>(&self, f: impl FnOnce(&Dataset) -> T) -> Result<T> {
        self.ensure_open()?;
        let committed = read(&self.shared.dataset);
        match &self.pending {
            Some(ops) if !ops.is_empty() => {
                let mut view = committed.clone();
                drop(committed);
                for op in ops {
                    view.apply(op);
                }
                Ok(f(&view))
            }
            _ => Ok(f(&committed)),
        }
    }
}

impl RepositoryConnection for MemoryConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn begin(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.pending.is_some() {
            return Err(Error::TransactionActive { connection: self.id });
        }
        self.pending = Some(Vec::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::ConnectionClosed { connection: self.id });
        }
        let ops = self.pending.take().ok_or(Error::NoActiveTransaction)?;
        if let Err(e) = self.shared.apply(self.generation, &ops) {
            self.shared
                .events
                .publish(StoreEvent::RolledBack { connection: self.id });
            return Err(e);
        }
        self.shared
            .events
            .publish(StoreEvent::Committed { connection: self.id });
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.pending.take().is_some() {
            self.shared
                .events
                .publish(StoreEvent::RolledBack { connection: self.id });
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    fn add(&mut self, statement: Statement) -> Result<()> {
        let event = StoreEvent::Added {
            connection: self.id,
            statement: statement.clone(),
        };
        self.stage(Op::Add(statement), event)
    }

    fn remove(
        &mut self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<()> {
        let event = StoreEvent::Removed {
            connection: self.id,
            subject: subject.cloned(),
            predicate: predicate.cloned(),
            object: object.cloned(),
            contexts: contexts.to_vec(),
        };
        let op = Op::Remove {
            subject: subject.cloned(),
            predicate: predicate.cloned(),
            object: object.cloned(),
            contexts: contexts.to_vec(),
        };
        self.stage(op, event)
    }

    fn clear(&mut self, contexts: &[Context]) -> Result<()> {
        let event = StoreEvent::Cleared {
            connection: self.id,
            contexts: contexts.to_vec(),
        };
        self.stage(Op::Clear(contexts.to_vec()), event)
    }

    fn statements(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<Vec<Statement>> {
        self.with_view(|dataset| dataset.select(subject, predicate, object, contexts))
    }

    fn namespaces(&self) -> Result<BTreeMap<String, String>> {
        self.with_view(|dataset| dataset.namespaces.clone())
    }

    fn set_namespace(&mut self, prefix: &str, name: &str) -> Result<()> {
        self.ensure_open()?;
        let op = Op::SetNamespace(prefix.to_string(), name.to_string());
        match &mut self.pending {
            Some(ops) => ops.push(op),
            None => self.shared.apply(self.generation, std::slice::from_ref(&op))?,
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.rollback()?;
        self.closed = true;
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        if self.pending.is_some() {
            tracing::debug!(connection = self.id, "Rolling back unfinished transaction");
            let _ = self.rollback();
        }
    }
}
