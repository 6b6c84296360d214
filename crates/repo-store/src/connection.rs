//! The read/write API exposed by a repository handle.

use std::collections::BTreeMap;

use crate::Result;
use crate::event::ConnectionId;
use crate::model::{BlankNode, Context, Iri, Resource, Statement, Term};

/// A transactional, context-aware view of one repository.
///
/// Outside `begin()`/`commit()` every write commits on its own. Inside a
/// transaction, reads through the same connection see the pending writes;
/// other connections see them only after commit. Dropping a connection with
/// an active transaction rolls it back.
///
/// Wherever a `contexts` slice is accepted, an empty slice means "every
/// context" and `None` inside the slice names the default graph.
pub trait RepositoryConnection: Send {
    /// Identifier carried by the events this connection produces.
    fn id(&self) -> ConnectionId;

    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    /// Discard pending writes. A no-op when no transaction is active.
    fn rollback(&mut self) -> Result<()>;

    fn is_active(&self) -> bool;

    fn add(&mut self, statement: Statement) -> Result<()>;

    fn add_all(&mut self, statements: Vec<Statement>) -> Result<()> {
        for statement in statements {
            self.add(statement)?;
        }
        Ok(())
    }

    /// Remove every statement matching the pattern.
    fn remove(
        &mut self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<()>;

    /// Remove all statements in `contexts` (or the whole store when empty).
    fn clear(&mut self, contexts: &[Context]) -> Result<()>;

    fn statements(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<Vec<Statement>>;

    fn has_statement(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<bool> {
        Ok(!self.statements(subject, predicate, object, contexts)?.is_empty())
    }

    fn size(&self, contexts: &[Context]) -> Result<usize> {
        Ok(self.statements(None, None, None, contexts)?.len())
    }

    /// Distinct named contexts that hold at least one statement.
    fn context_ids(&self) -> Result<Vec<Resource>> {
        let mut contexts: Vec<Resource> = self
            .statements(None, None, None, &[])?
            .into_iter()
            .filter_map(|st| st.context)
            .collect();
        contexts.sort();
        contexts.dedup();
        Ok(contexts)
    }

    fn namespaces(&self) -> Result<BTreeMap<String, String>>;

    fn set_namespace(&mut self, prefix: &str, name: &str) -> Result<()>;

    fn new_blank_node(&self) -> BlankNode {
        BlankNode::generate()
    }

    /// Roll back any active transaction and release the connection.
    fn close(&mut self) -> Result<()>;
}
