//! Manager-level settings read from `{base}/manager.toml`

use std::time::Duration;

use repo_fs::{ConfigStore, NormalizedPath, RepoPath, RobustnessConfig};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings of a local manager. A missing file means defaults.
///
/// ```toml
/// templates_dir = "templates"
///
/// [cleanup]
/// initial_interval_ms = 50
/// max_elapsed_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Directory with user config templates, relative to the base dir
    pub templates_dir: String,
    pub cleanup: CleanupSettings,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            templates_dir: RepoPath::TemplatesDir.as_str().to_string(),
            cleanup: CleanupSettings::default(),
        }
    }
}

impl ManagerSettings {
    pub fn load(base_dir: &NormalizedPath) -> Result<Self> {
        let path = base_dir.join(RepoPath::ManagerConfig.as_str());
        Ok(ConfigStore::new().load_or_default(&path)?)
    }
}

/// Retry policy for deleting the data directory of a removed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    pub initial_interval_ms: u64,
    pub max_elapsed_ms: u64,
}

impl Default for CleanupSettings {
    fn default() -> Self {
        let defaults = RobustnessConfig::default();
        Self {
            initial_interval_ms: defaults.initial_interval.as_millis() as u64,
            max_elapsed_ms: defaults.max_elapsed.as_millis() as u64,
        }
    }
}

impl CleanupSettings {
    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            max_elapsed: Duration::from_millis(self.max_elapsed_ms),
        }
    }
}
