//! RDF terms and context-qualified statements

use std::fmt;

use serde::{Deserialize, Serialize};

/// An absolute IRI.
///
/// No syntax validation is performed beyond what callers choose to do;
/// IRIs are compared as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part of the IRI after `namespace`, if it starts with it.
    pub fn local_name<'a>(&'a self, namespace: &str) -> Option<&'a str> {
        self.0.strip_prefix(namespace)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// A blank node, identified by a store-local label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlankNode(String);

impl BlankNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a blank node with a fresh, globally unique label.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// A literal value with an optional datatype or language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    datatype: Option<Iri>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

impl Literal {
    /// A plain string literal.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn typed(label: impl Into<String>, datatype: Iri) -> Self {
        Self {
            label: label.into(),
            datatype: Some(datatype),
            language: None,
        }
    }

    pub fn with_language(label: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            datatype: None,
            language: Some(language.into().to_lowercase()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn datatype(&self) -> Option<&Iri> {
        self.datatype.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.label)?;
        if let Some(language) = &self.language {
            write!(f, "@{}", language)
        } else if let Some(datatype) = &self.datatype {
            write!(f, "^^{}", datatype)
        } else {
            Ok(())
        }
    }
}

/// A term that may appear in subject or context position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Iri(Iri),
    Blank(BlankNode),
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::Blank(node) => node.fmt(f),
        }
    }
}

impl From<Iri> for Resource {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Resource {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

/// Any RDF term, usable in object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Term {
    /// Shorthand for a plain string literal term.
    pub fn literal(label: impl Into<String>) -> Self {
        Self::Literal(Literal::new(label))
    }

    pub fn as_resource(&self) -> Option<Resource> {
        match self {
            Self::Iri(iri) => Some(Resource::Iri(iri.clone())),
            Self::Blank(node) => Some(Resource::Blank(node.clone())),
            Self::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => iri.fmt(f),
            Self::Blank(node) => node.fmt(f),
            Self::Literal(literal) => literal.fmt(f),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Self::Iri(iri)
    }
}

impl From<BlankNode> for Term {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl From<Resource> for Term {
    fn from(resource: Resource) -> Self {
        match resource {
            Resource::Iri(iri) => Self::Iri(iri),
            Resource::Blank(node) => Self::Blank(node),
        }
    }
}

/// The graph a statement lives in. `None` is the default graph.
pub type Context = Option<Resource>;

/// A subject-predicate-object triple qualified by its context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Resource,
    pub predicate: Iri,
    pub object: Term,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Context,
}

impl Statement {
    /// A statement in the default graph.
    pub fn new(subject: impl Into<Resource>, predicate: Iri, object: impl Into<Term>) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
            context: None,
        }
    }

    /// Move this statement into `context`.
    pub fn in_context(mut self, context: impl Into<Resource>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check this statement against a pattern.
    ///
    /// `None` in subject, predicate or object position matches anything. An
    /// empty `contexts` slice matches every context, including the default
    /// graph; otherwise the statement's context must be one of the listed
    /// ones (`None` in the list selects the default graph).
    pub fn matches(
        &self,
        subject: Option<&Resource>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
        contexts: &[Context],
    ) -> bool {
        subject.is_none_or(|s| *s == self.subject)
            && predicate.is_none_or(|p| *p == self.predicate)
            && object.is_none_or(|o| *o == self.object)
            && (contexts.is_empty() || contexts.contains(&self.context))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(context) = &self.context {
            write!(f, " {}", context)?;
        }
        write!(f, " .")
    }
}
