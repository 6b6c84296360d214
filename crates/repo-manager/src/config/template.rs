//! Parameterized config templates.
//!
//! A template is a TOML document describing a [`RepositoryConfig`] with
//! `{{name}}` and `{{name|default}}` placeholders. Placeholders are meant to
//! sit inside TOML basic strings; substituted values are escaped
//! accordingly.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use repo_fs::{NormalizedPath, io};

use super::RepositoryConfig;
use crate::{Error, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_.-]*)\s*(?:\|([^}]*))?\}\}")
        .expect("placeholder pattern is valid")
});

const MEMORY: &str = r#"id = "{{id}}"
title = "{{title|Memory store}}"

[implementation]
type = "memory"

[implementation.params]
persist = "{{persist|true}}"
"#;

const READONLY_MEMORY: &str = r#"id = "{{id}}"
title = "{{title|Read-only memory store}}"

[implementation]
type = "read-only"

[implementation.delegate]
type = "memory"

[implementation.delegate.params]
persist = "{{persist|true}}"
"#;

const PROXY: &str = r#"id = "{{id}}"
title = "{{title|Proxy}}"

[implementation]
type = "proxy"

[implementation.params]
proxiedID = "{{proxiedID}}"
"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTemplate {
    name: String,
    source: String,
}

impl ConfigTemplate {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Placeholder names mapped to their default, in order of first use.
    pub fn variables(&self) -> Vec<(String, Option<String>)> {
        let mut seen: Vec<(String, Option<String>)> = Vec::new();
        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let name = caps[1].to_string();
            if !seen.iter().any(|(existing, _)| *existing == name) {
                seen.push((name, caps.get(2).map(|m| m.as_str().to_string())));
            }
        }
        seen
    }

    /// Substitute placeholders. A placeholder without a value and without a
    /// default is an error.
    pub fn render(&self, values: &BTreeMap<String, String>) -> Result<String> {
        let mut missing = Vec::new();
        let rendered = PLACEHOLDER.replace_all(&self.source, |caps: &Captures<'_>| {
            let name = &caps[1];
            match values.get(name).map(String::as_str).or(caps.get(2).map(|m| m.as_str())) {
                Some(value) => escape(value),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        });

        if missing.is_empty() {
            Ok(rendered.into_owned())
        } else {
            missing.dedup();
            Err(Error::Template {
                name: self.name.clone(),
                message: format!("no value for {}", missing.join(", ")),
            })
        }
    }

    pub fn instantiate(&self, values: &BTreeMap<String, String>) -> Result<RepositoryConfig> {
        let rendered = self.render(values)?;
        let config: RepositoryConfig = toml::from_str(&rendered).map_err(|e| Error::Template {
            name: self.name.clone(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Templates by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, ConfigTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `memory`, `readonly-memory` and `proxy` templates.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ConfigTemplate::new("memory", MEMORY));
        registry.register(ConfigTemplate::new("readonly-memory", READONLY_MEMORY));
        registry.register(ConfigTemplate::new("proxy", PROXY));
        registry
    }

    /// Register a template, replacing one with the same name.
    pub fn register(&mut self, template: ConfigTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&ConfigTemplate> {
        self.templates.get(name)
    }

    /// Template names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    /// Register every `*.toml` file in `dir`, named after its file stem.
    /// A missing directory registers nothing.
    pub fn load_dir(&mut self, dir: &NormalizedPath) -> Result<usize> {
        if !dir.is_dir() {
            return Ok(0);
        }
        let native = dir.to_native();
        let entries = std::fs::read_dir(&native).map_err(|e| repo_fs::Error::io(&native, e))?;

        let mut loaded = 0;
        for entry in entries {
            let entry = entry.map_err(|e| repo_fs::Error::io(&native, e))?;
            let path = NormalizedPath::new(entry.path());
            if !path.is_file() || path.extension() != Some("toml") {
                continue;
            }
            let Some(stem) = path.file_name().and_then(|name| name.strip_suffix(".toml")) else {
                continue;
            };
            let source = io::read_text(&path)?;
            tracing::debug!(template = stem, path = %path, "Loaded config template");
            self.register(ConfigTemplate::new(stem, source));
            loaded += 1;
        }
        Ok(loaded)
    }
}
