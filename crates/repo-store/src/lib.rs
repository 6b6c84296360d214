//! Statement storage for the RDF repository manager
//!
//! This crate holds everything a repository handle is made of:
//!
//! - **Model**: IRIs, blank nodes, literals and context-qualified statements
//! - **Connections**: the transactional, context-scoped read/write API
//! - **Events**: per-connection change notifications published on commit
//!   and rollback boundaries
//! - **Backends**: an in-memory store (optionally persisted to its data
//!   directory) and a delegating read-only layer
//!
//! Repositories are shared as `Arc<dyn Repository>`; all lifecycle methods
//! take `&self` so that a manager can hand out the same handle to many
//! callers.

pub mod connection;
pub mod error;
pub mod event;
pub mod memory;
pub mod model;
pub mod readonly;
pub mod repository;
pub mod resolver;
pub mod vocab;

mod sync;

pub use connection::RepositoryConnection;
pub use error::{Error, Result};
pub use event::{ConnectionId, EventHub, StoreEvent};
pub use memory::MemoryStore;
pub use model::{BlankNode, Context, Iri, Literal, Resource, Statement, Term};
pub use readonly::ReadOnlyRepository;
pub use repository::{DelegatingRepository, Repository};
pub use resolver::{RepositoryResolver, ResolverClient};
