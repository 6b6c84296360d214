//! IRIs of the vocabularies the manager reads and writes.
//!
//! Repository configurations are stored as statements using the `config`
//! vocabulary. Implementation parameters use one predicate per parameter
//! key, minted under [`config::PARAM_NAMESPACE`].

use crate::model::Iri;

pub mod rdf {
    use super::Iri;

    pub const NAMESPACE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const PREFIX: &str = "rdf";

    pub fn type_() -> Iri {
        Iri::new(format!("{NAMESPACE}type"))
    }
}

pub mod rdfs {
    use super::Iri;

    pub const NAMESPACE: &str = "http://www.w3.org/2000/01/rdf-schema#";
    pub const PREFIX: &str = "rdfs";

    pub fn label() -> Iri {
        Iri::new(format!("{NAMESPACE}label"))
    }
}

pub mod xsd {
    use super::Iri;

    pub const NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const PREFIX: &str = "xsd";

    pub fn string() -> Iri {
        Iri::new(format!("{NAMESPACE}string"))
    }
}

pub mod config {
    use super::Iri;

    pub const NAMESPACE: &str = "urn:repository-manager:config#";
    pub const PREFIX: &str = "rep";

    pub const PARAM_NAMESPACE: &str = "urn:repository-manager:config:param#";
    pub const PARAM_PREFIX: &str = "param";

    /// Class of the node describing one repository.
    pub fn repository() -> Iri {
        Iri::new(format!("{NAMESPACE}Repository"))
    }

    /// Class of a named graph holding one repository configuration. The
    /// marker `(ctx rdf:type RepositoryContext)` lives in the default graph.
    pub fn repository_context() -> Iri {
        Iri::new(format!("{NAMESPACE}RepositoryContext"))
    }

    pub fn repository_id() -> Iri {
        Iri::new(format!("{NAMESPACE}repositoryID"))
    }

    pub fn repository_impl() -> Iri {
        Iri::new(format!("{NAMESPACE}repositoryImpl"))
    }

    pub fn repository_type() -> Iri {
        Iri::new(format!("{NAMESPACE}repositoryType"))
    }

    pub fn delegate() -> Iri {
        Iri::new(format!("{NAMESPACE}delegate"))
    }

    pub fn param(key: &str) -> Iri {
        Iri::new(format!("{PARAM_NAMESPACE}{key}"))
    }

    /// The parameter key encoded in `predicate`, if it is a parameter IRI.
    pub fn param_key(predicate: &Iri) -> Option<&str> {
        predicate.local_name(PARAM_NAMESPACE)
    }
}

/// Prefix bindings a fresh system repository starts with.
pub fn default_namespaces() -> [(&'static str, &'static str); 5] {
    [
        (rdf::PREFIX, rdf::NAMESPACE),
        (rdfs::PREFIX, rdfs::NAMESPACE),
        (xsd::PREFIX, xsd::NAMESPACE),
        (config::PREFIX, config::NAMESPACE),
        (config::PARAM_PREFIX, config::PARAM_NAMESPACE),
    ]
}
