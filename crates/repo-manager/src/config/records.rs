//! Repository configs stored as statements.
//!
//! Each config lives in its own context (a named graph) of the system
//! repository:
//!
//! ```text
//! ctx  rdf:type            rep:RepositoryContext     # default graph
//!
//! _:r  rdf:type            rep:Repository            # all in ctx
//! _:r  rep:repositoryID    "id"
//! _:r  rdfs:label          "title"
//! _:r  rep:repositoryImpl  _:i
//! _:i  rep:repositoryType  "memory"
//! _:i  param:persist       "true"
//! _:i  rep:delegate        _:d
//! ```
//!
//! The functions that write expect the caller to manage the transaction.

use std::collections::{BTreeMap, HashSet};

use repo_store::vocab::{config as rep, rdf, rdfs};
use repo_store::{BlankNode, Iri, Literal, RepositoryConnection, Resource, Statement, Term};

use super::{ImplConfig, MAX_DELEGATION_DEPTH, RepositoryConfig};
use crate::{Error, Result};

/// Encode `config` as the statements of `context`.
pub fn to_statements(
    config: &RepositoryConfig,
    context: &Resource,
    mut new_node: impl FnMut() -> BlankNode,
) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut push = |subject: &Resource, predicate: Iri, object: Term| {
        statements.push(Statement::new(subject.clone(), predicate, object).in_context(context.clone()));
    };

    let repository = Resource::Blank(new_node());
    push(&repository, rdf::type_(), rep::repository().into());
    push(&repository, rep::repository_id(), Term::literal(&config.id));
    if let Some(title) = &config.title {
        push(&repository, rdfs::label(), Term::literal(title));
    }

    let mut parent = repository;
    let mut link = rep::repository_impl();
    for layer in config.implementation.layers() {
        let node = Resource::Blank(new_node());
        push(&parent, link, node.clone().into());
        push(&node, rep::repository_type(), Term::literal(&layer.kind));
        for (key, value) in &layer.params {
            push(&node, rep::param(key), Term::literal(value));
        }
        parent = node;
        link = rep::delegate();
    }

    statements
}

/// Decode the statements of one config context.
pub fn from_statements(statements: &[Statement]) -> Result<RepositoryConfig> {
    let repository = single(
        statements
            .iter()
            .filter(|st| st.predicate == rep::repository_id())
            .map(|st| &st.subject),
        "repository node",
    )?;

    let id = literal_value(statements, repository, &rep::repository_id())?
        .ok_or_else(|| Error::config("Repository node has no id"))?;
    let title = literal_value(statements, repository, &rdfs::label())?;

    let root = object_resource(statements, repository, &rep::repository_impl())?
        .ok_or_else(|| Error::config(format!("Repository '{id}' has no implementation")))?;

    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(root);
    while let Some(node) = next {
        if !visited.insert(node.clone()) {
            return Err(Error::config(format!("Delegation cycle in repository '{id}'")));
        }
        if chain.len() == MAX_DELEGATION_DEPTH {
            return Err(Error::config(format!(
                "Delegation chain of '{id}' exceeds {MAX_DELEGATION_DEPTH} layers"
            )));
        }
        chain.push(impl_layer(statements, &node, &id)?);
        next = object_resource(statements, &node, &rep::delegate())?;
    }

    let implementation = chain
        .into_iter()
        .rev()
        .reduce(|inner, outer| outer.with_delegate(inner))
        .ok_or_else(|| Error::config(format!("Repository '{id}' has no implementation")))?;

    Ok(RepositoryConfig {
        id,
        title,
        implementation,
    })
}

fn impl_layer(statements: &[Statement], node: &Resource, id: &str) -> Result<ImplConfig> {
    let kind = literal_value(statements, node, &rep::repository_type())?.ok_or_else(|| {
        Error::config(format!("Implementation of repository '{id}' has no type"))
    })?;

    let mut params = BTreeMap::new();
    for st in statements.iter().filter(|st| st.subject == *node) {
        if let Some(key) = rep::param_key(&st.predicate) {
            let value = st.object.as_literal().ok_or_else(|| {
                Error::config(format!("Parameter '{key}' of repository '{id}' is not a literal"))
            })?;
            params.insert(key.to_string(), value.label().to_string());
        }
    }

    Ok(ImplConfig {
        kind,
        params,
        delegate: None,
    })
}

fn single<'a, T: PartialEq + 'a>(items: impl Iterator<Item = &'a T>, what: &str) -> Result<&'a T> {
    let mut found: Option<&T> = None;
    for item in items {
        match found {
            Some(existing) if existing != item => {
                return Err(Error::config(format!("Multiple {what}s found")));
            }
            _ => found = Some(item),
        }
    }
    found.ok_or_else(|| Error::config(format!("No {what} found")))
}

fn literal_value(statements: &[Statement], subject: &Resource, predicate: &Iri) -> Result<Option<String>> {
    let mut values = statements
        .iter()
        .filter(|st| st.subject == *subject && st.predicate == *predicate)
        .map(|st| &st.object);
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.any(|other| other != first) {
        return Err(Error::config(format!("Multiple values for {predicate}")));
    }
    first
        .as_literal()
        .map(|literal| Some(literal.label().to_string()))
        .ok_or_else(|| Error::config(format!("Value of {predicate} is not a literal")))
}

fn object_resource(statements: &[Statement], subject: &Resource, predicate: &Iri) -> Result<Option<Resource>> {
    let mut values = statements
        .iter()
        .filter(|st| st.subject == *subject && st.predicate == *predicate)
        .map(|st| &st.object);
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.any(|other| other != first) {
        return Err(Error::config(format!("Multiple values for {predicate}")));
    }
    first
        .as_resource()
        .map(Some)
        .ok_or_else(|| Error::config(format!("Value of {predicate} is not a resource")))
}

fn is_config_context(conn: &dyn RepositoryConnection, context: &Resource) -> Result<bool> {
    Ok(conn.has_statement(
        Some(context),
        Some(&rdf::type_()),
        Some(&rep::repository_context().into()),
        &[None],
    )?)
}

/// Ids of every stored config, sorted.
pub fn repository_ids(conn: &dyn RepositoryConnection) -> Result<Vec<String>> {
    let markers = conn.statements(
        None,
        Some(&rdf::type_()),
        Some(&rep::repository_context().into()),
        &[None],
    )?;
    let contexts: Vec<Option<Resource>> = markers.into_iter().map(|st| Some(st.subject)).collect();
    if contexts.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<String> = conn
        .statements(None, Some(&rep::repository_id()), None, &contexts)?
        .into_iter()
        .filter_map(|st| st.object.as_literal().map(|l| l.label().to_string()))
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// The context holding the config of `id`.
pub fn find_context(conn: &dyn RepositoryConnection, id: &str) -> Result<Option<Resource>> {
    let id_term = Term::Literal(Literal::new(id));
    let mut found: Option<Resource> = None;
    for st in conn.statements(None, Some(&rep::repository_id()), Some(&id_term), &[])? {
        let Some(context) = st.context else {
            continue;
        };
        if !is_config_context(conn, &context)? {
            continue;
        }
        match &found {
            Some(existing) if *existing != context => {
                return Err(Error::config(format!(
                    "Multiple configuration contexts found for repository '{id}'"
                )));
            }
            _ => found = Some(context),
        }
    }
    Ok(found)
}

/// If `context` is still a config context, the id it configures.
pub fn context_repository_id(conn: &dyn RepositoryConnection, context: &Resource) -> Result<Option<String>> {
    if !is_config_context(conn, context)? {
        return Ok(None);
    }
    let statements = conn.statements(
        None,
        Some(&rep::repository_id()),
        None,
        &[Some(context.clone())],
    )?;
    match statements.as_slice() {
        [] => Ok(None),
        [st] => Ok(st.object.as_literal().map(|l| l.label().to_string())),
        _ => Err(Error::config(format!(
            "Multiple repository ids in configuration context {context}"
        ))),
    }
}

pub fn read_config(conn: &dyn RepositoryConnection, id: &str) -> Result<Option<RepositoryConfig>> {
    let Some(context) = find_context(conn, id)? else {
        return Ok(None);
    };
    let statements = conn.statements(None, None, None, &[Some(context)])?;
    from_statements(&statements).map(Some)
}

/// Store `config`, replacing any previous config for the same id.
///
/// The previous context is cleared and reused, so the replacement is seen
/// as a single modification of that context.
pub fn write_config(conn: &mut dyn RepositoryConnection, config: &RepositoryConfig) -> Result<()> {
    let context = match find_context(conn, &config.id)? {
        Some(context) => {
            conn.clear(&[Some(context.clone())])?;
            context
        }
        None => {
            let context = Resource::Blank(conn.new_blank_node());
            conn.add(Statement::new(
                context.clone(),
                rdf::type_(),
                rep::repository_context(),
            ))?;
            context
        }
    };

    let statements = to_statements(config, &context, || conn.new_blank_node());
    conn.add_all(statements)?;
    Ok(())
}

/// Delete the config of `id`. Returns `false` when there was none.
pub fn remove_config(conn: &mut dyn RepositoryConnection, id: &str) -> Result<bool> {
    let Some(context) = find_context(conn, id)? else {
        return Ok(false);
    };
    conn.clear(&[Some(context.clone())])?;
    conn.remove(
        Some(&context),
        Some(&rdf::type_()),
        Some(&rep::repository_context().into()),
        &[None],
    )?;
    Ok(true)
}
