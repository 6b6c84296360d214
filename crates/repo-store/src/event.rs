//! Change notifications published by stores.
//!
//! Every write made through a connection is announced as it is staged, and
//! each transaction ends with either [`StoreEvent::Committed`] or
//! [`StoreEvent::RolledBack`]. Writes made outside an explicit transaction
//! are followed by their own `Committed` event.
//!
//! Events are delivered over channels rather than callbacks, so subscribers
//! never run inside a store's locks.

use std::sync::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::model::{Context, Iri, Resource, Statement, Term};
use crate::sync::lock;

/// Identifies the connection a batch of events came from.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added {
        connection: ConnectionId,
        statement: Statement,
    },
    /// A pattern removal. `None` positions are wildcards and an empty
    /// `contexts` list means "every context".
    Removed {
        connection: ConnectionId,
        subject: Option<Resource>,
        predicate: Option<Iri>,
        object: Option<Term>,
        contexts: Vec<Context>,
    },
    /// A context clear; an empty `contexts` list clears the whole store.
    Cleared {
        connection: ConnectionId,
        contexts: Vec<Context>,
    },
    Committed {
        connection: ConnectionId,
    },
    RolledBack {
        connection: ConnectionId,
    },
}

impl StoreEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::Added { connection, .. }
            | Self::Removed { connection, .. }
            | Self::Cleared { connection, .. }
            | Self::Committed { connection }
            | Self::RolledBack { connection } => *connection,
        }
    }
}

/// Fan-out of store events to any number of subscribers.
#[derive(Debug, Default)]
pub struct EventHub {
    subscribers: Mutex<Vec<Sender<StoreEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<StoreEvent> {
        let (tx, rx) = mpsc::channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn has_subscribers(&self) -> bool {
        !lock(&self.subscribers).is_empty()
    }

    /// Deliver `event` to every live subscriber, pruning disconnected ones.
    pub fn publish(&self, event: StoreEvent) {
        let mut subscribers = lock(&self.subscribers);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
