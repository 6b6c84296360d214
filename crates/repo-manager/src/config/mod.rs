//! Repository configuration records
//!
//! A [`RepositoryConfig`] names a repository and describes how to build its
//! storage stack: an implementation layer tagged with a type, carrying
//! string parameters and optionally wrapping a delegate layer.
//!
//! - [`records`]: reading and writing configs as statements in the system
//!   repository
//! - [`template`]: parameterized TOML templates that render to configs
//! - [`settings`]: manager-level settings from `manager.toml`

pub mod records;
pub mod settings;
pub mod template;

pub use settings::{CleanupSettings, ManagerSettings};
pub use template::{ConfigTemplate, TemplateRegistry};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Delegation chains deeper than this are rejected as malformed.
pub const MAX_DELEGATION_DEPTH: usize = 16;

/// The configuration of one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub implementation: ImplConfig,
}

impl RepositoryConfig {
    pub fn new(id: impl Into<String>, implementation: ImplConfig) -> Self {
        Self {
            id: id.into(),
            title: None,
            implementation,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Structural validation that does not depend on which repository
    /// types are registered.
    pub fn validate(&self) -> Result<()> {
        repo_fs::validate_path_identifier(&self.id)
            .map_err(|e| Error::config(format!("Invalid repository id: {e}")))?;

        let mut depth = 0;
        for layer in self.implementation.layers() {
            depth += 1;
            if depth > MAX_DELEGATION_DEPTH {
                return Err(Error::config(format!(
                    "Delegation chain of '{}' exceeds {} layers",
                    self.id, MAX_DELEGATION_DEPTH
                )));
            }
            if layer.kind.trim().is_empty() {
                return Err(Error::config(format!(
                    "Repository '{}' has a layer without a type",
                    self.id
                )));
            }
            if let Some(key) = layer.params.keys().find(|key| !is_valid_param_key(key)) {
                return Err(Error::config(format!(
                    "Invalid parameter name '{}' in repository '{}'",
                    key, self.id
                )));
            }
        }
        Ok(())
    }
}

/// One layer of a repository's storage stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplConfig {
    /// Discriminator used to look up the factory for this layer
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegate: Option<Box<ImplConfig>>,
}

impl ImplConfig {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
            delegate: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_delegate(mut self, delegate: ImplConfig) -> Self {
        self.delegate = Some(Box::new(delegate));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// This layer followed by each delegate, outermost first.
    pub fn layers(&self) -> impl Iterator<Item = &ImplConfig> {
        std::iter::successors(Some(self), |layer| layer.delegate.as_deref())
    }
}

fn is_valid_param_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
