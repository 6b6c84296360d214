//! Filesystem layer for the RDF repository manager
//!
//! Provides normalized path handling, the reserved directory layout of a
//! manager's base directory, and safe I/O operations.

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod path;

pub use config::{ConfigFormat, ConfigStore};
pub use constants::RepoPath;
pub use error::{Error, Result};
pub use io::RobustnessConfig;
pub use path::{NormalizedPath, validate_path_identifier};
