//! Reserved names inside a manager's base directory.

use std::path::Path;

/// Reserved filesystem names used by a local repository manager.
///
/// ```text
/// {base}/
/// ├── manager.toml        # Optional manager settings
/// ├── templates/          # User config templates
/// └── repositories/
///     ├── SYSTEM/         # System repository data
///     └── {id}/           # One data directory per repository
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoPath {
    /// The `repositories` directory holding one subdirectory per id
    RepositoriesDir,
    /// The reserved id (and directory name) of the system repository
    SystemRepository,
    /// The `templates` directory with user-provided config templates
    TemplatesDir,
    /// The optional `manager.toml` settings file
    ManagerConfig,
    /// The snapshot file a persistent memory store writes into its data dir
    StoreSnapshot,
}

impl RepoPath {
    /// Get the string representation of the path.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RepositoriesDir => "repositories",
            Self::SystemRepository => "SYSTEM",
            Self::TemplatesDir => "templates",
            Self::ManagerConfig => "manager.toml",
            Self::StoreSnapshot => "memorystore.json",
        }
    }
}

impl AsRef<Path> for RepoPath {
    fn as_ref(&self) -> &Path {
        Path::new(self.as_str())
    }
}

impl AsRef<str> for RepoPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
