//! A delegating layer that rejects writes.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use repo_fs::NormalizedPath;

use crate::connection::RepositoryConnection;
use crate::event::ConnectionId;
use crate::model::{BlankNode, Context, Iri, Resource, Statement, Term};
use crate::repository::{DelegatingRepository, Repository};
use crate::sync::{read, write};
use crate::{Error, Result};

/// Exposes its delegate for reading only.
///
/// Lifecycle calls are forwarded to the delegate, which is owned by this
/// layer once set.
#[derive(Default)]
pub struct ReadOnlyRepository {
    delegate: RwLock<Option<Arc<dyn Repository>>>,
    data_dir: RwLock<Option<NormalizedPath>>,
}

impl ReadOnlyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_delegate(&self) -> Result<Arc<dyn Repository>> {
        read(&self.delegate).clone().ok_or_else(|| Error::NoDelegate {
            layer: "read-only repository".to_string(),
        })
    }
}

impl Repository for ReadOnlyRepository {
    fn set_data_dir(&self, dir: NormalizedPath) {
        if let Some(delegate) = read(&self.delegate).as_ref() {
            delegate.set_data_dir(dir.clone());
        }
        *write(&self.data_dir) = Some(dir);
    }

    fn data_dir(&self) -> Option<NormalizedPath> {
        read(&self.data_dir).clone()
    }

    fn initialize(&self) -> Result<()> {
        self.require_delegate()?.initialize()
    }

    fn is_initialized(&self) -> bool {
        read(&self.delegate)
            .as_ref()
            .is_some_and(|delegate| delegate.is_initialized())
    }

    fn shut_down(&self) -> Result<()> {
        match read(&self.delegate).clone() {
            Some(delegate) => delegate.shut_down(),
            None => Ok(()),
        }
    }

    fn connection(&self) -> Result<Box<dyn RepositoryConnection>> {
        let inner = self.require_delegate()?.connection()?;
        Ok(Box::new(ReadOnlyConnection { inner }))
    }

    fn is_writable(&self) -> bool {
        false
    }

    fn as_delegating(&self) -> Option<&dyn DelegatingRepository> {
        Some(self)
    }
}

impl DelegatingRepository for ReadOnlyRepository {
    fn set_delegate(&self, delegate: Arc<dyn Repository>) -> Result<()> {
        if let Some(dir) = read(&self.data_dir).clone() {
            delegate.set_data_dir(dir);
        }
        *write(&self.delegate) = Some(delegate);
        Ok(())
    }

    fn delegate(&self) -> Option<Arc<dyn Repository>> {
        read(&self.delegate).clone()
    }
}

struct ReadOnlyConnection {
    inner: Box<dyn RepositoryConnection>,
}

impl RepositoryConnection for ReadOnlyConnection {
    fn id(&self) -> ConnectionId {
        self.inner.id()
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    fn add(&mut self, _statement: Statement) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn remove(
        &mut self,
        _subject: Option<&Resource>,
        _predicate: Option<&Iri>,
        _object: Option<&Term>,
        _contexts: &[Context],
    ) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn clear(&mut self, _contexts: &[Context]) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn statements(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> Result<Vec<Statement>> {
        self.inner.statements(subject, predicate, object, contexts)
    }

    fn namespaces(&self) -> Result<BTreeMap<String, String>> {
        self.inner.namespaces()
    }

    fn set_namespace(&mut self, _prefix: &str, _name: &str) -> Result<()> {
        Err(Error::ReadOnly)
    }

    fn new_blank_node(&self) -> BlankNode {
        self.inner.new_blank_node()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}
