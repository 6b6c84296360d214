//! Settings files in TOML, JSON or YAML, chosen by extension

use serde::de::DeserializeOwned;

use crate::{Error, NormalizedPath, Result, io};

/// Serialization format of a settings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &NormalizedPath) -> Result<Self> {
        let extension = path.extension().unwrap_or("");
        match extension.to_ascii_lowercase().as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    fn parse<T: DeserializeOwned>(self, content: &str) -> std::result::Result<T, String> {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

/// Reads settings files.
#[derive(Debug, Default)]
pub struct ConfigStore;

impl ConfigStore {
    pub fn new() -> Self {
        Self
    }

    /// Parse the file at `path` in the format its extension names.
    pub fn load<T: DeserializeOwned>(&self, path: &NormalizedPath) -> Result<T> {
        let format = ConfigFormat::from_path(path)?;
        let content = io::read_text(path)?;
        format.parse(&content).map_err(|message| Error::ConfigParse {
            path: path.to_native(),
            format: format.name().into(),
            message,
        })
    }

    /// Like [`load`](Self::load), but a missing file yields `T::default()`.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, path: &NormalizedPath) -> Result<T> {
        if path.is_file() {
            self.load(path)
        } else {
            tracing::debug!(path = %path, "No settings file, using defaults");
            Ok(T::default())
        }
    }
}
