//! Folding system-repository change events into invalidation decisions

use std::collections::{BTreeSet, HashMap};

use repo_store::vocab::{config as rep, rdf};
use repo_store::{ConnectionId, Context, Iri, Resource, StoreEvent, Term};

/// What a committed transaction requires of the handle cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Evict every non-system handle.
    RefreshAll,
    /// Evict the handle configured by this context, if it still is a
    /// config context.
    Context(Resource),
}

#[derive(Debug, Default)]
struct PendingChanges {
    modified: BTreeSet<Resource>,
    removed: BTreeSet<Resource>,
    modified_all: bool,
}

impl PendingChanges {
    fn register(&mut self, contexts: &[Context]) {
        if contexts.is_empty() {
            self.modified_all = true;
        } else {
            // The default graph never holds a config, only markers.
            self.modified.extend(contexts.iter().flatten().cloned());
        }
    }
}

/// Tracks, per connection, which config contexts a transaction touched.
///
/// Writes accumulate until the connection commits or rolls back; only a
/// commit yields invalidations. Each connection is assumed to be used by
/// one thread at a time, so its events arrive in order.
#[derive(Debug, Default)]
pub struct ConfigChangeListener {
    pending: HashMap<ConnectionId, PendingChanges>,
}

impl ConfigChangeListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connections with uncommitted changes.
    pub fn pending_connections(&self) -> usize {
        self.pending.len()
    }

    pub fn observe(&mut self, event: StoreEvent) -> Vec<Invalidation> {
        match event {
            StoreEvent::Added {
                connection,
                statement,
            } => {
                if let Some(context) = statement.context {
                    self.entry(connection).modified.insert(context);
                }
                Vec::new()
            }
            StoreEvent::Removed {
                connection,
                subject,
                predicate,
                object,
                contexts,
            } => {
                let changes = self.entry(connection);
                if removes_marker(predicate.as_ref(), object.as_ref()) {
                    match subject {
                        Some(context) => {
                            changes.removed.insert(context);
                        }
                        // Every marker at once: no way to tell which
                        // configs survive.
                        None => changes.modified_all = true,
                    }
                }
                changes.register(&contexts);
                Vec::new()
            }
            StoreEvent::Cleared {
                connection,
                contexts,
            } => {
                self.entry(connection).register(&contexts);
                Vec::new()
            }
            StoreEvent::Committed { connection } => match self.pending.remove(&connection) {
                Some(changes) => Self::decide(changes),
                None => Vec::new(),
            },
            StoreEvent::RolledBack { connection } => {
                self.pending.remove(&connection);
                Vec::new()
            }
        }
    }

    fn entry(&mut self, connection: ConnectionId) -> &mut PendingChanges {
        self.pending.entry(connection).or_default()
    }

    fn decide(changes: PendingChanges) -> Vec<Invalidation> {
        if changes.modified_all {
            return vec![Invalidation::RefreshAll];
        }
        // A context that was modified and then lost its marker counts as
        // removed only.
        changes
            .modified
            .difference(&changes.removed)
            .cloned()
            .map(Invalidation::Context)
            .collect()
    }
}

fn removes_marker(predicate: Option<&Iri>, object: Option<&Term>) -> bool {
    let marker: Term = rep::repository_context().into();
    predicate.is_none_or(|p| *p == rdf::type_()) && object == Some(&marker)
}
