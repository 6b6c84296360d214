//! Normalized path handling for cross-platform compatibility

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// A path normalized to use forward slashes internally.
///
/// Normalization is purely lexical: backslashes become forward slashes,
/// empty and `.` components are dropped and `..` pops the previous
/// component. A `..` that would climb above the start of the path is
/// discarded rather than preserved, so a normalized path never escapes its
/// root. A leading `//` (UNC / network share) is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath {
    /// Internal representation always uses forward slashes
    inner: String,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let raw = path.as_ref().to_string_lossy().replace('\\', "/");
        Self {
            inner: clean(&raw),
        }
    }

    /// Resolve `path` to an absolute normalized path.
    ///
    /// Relative paths are resolved against the current working directory.
    /// Existing paths are canonicalized (symlinks resolved, no `\\?\`
    /// prefixes on Windows); paths that do not exist yet are only cleaned
    /// lexically.
    pub fn absolute(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|e| Error::io(path, e))?;
            cwd.join(path)
        };

        match dunce::canonicalize(&joined) {
            Ok(canonical) => Ok(Self::new(canonical)),
            Err(_) => Ok(Self::new(joined)),
        }
    }

    /// Get the internal normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        PathBuf::from(&self.inner)
    }

    /// Join this path with a segment, normalizing the result.
    pub fn join(&self, segment: &str) -> Self {
        if self.inner.is_empty() {
            return Self::new(segment);
        }
        let segment = segment.replace('\\', "/");
        Self {
            inner: clean(&format!("{}/{}", self.inner, segment.trim_start_matches('/'))),
        }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        match self.inner.rfind('/') {
            Some(0) if self.inner.len() > 1 => Some(Self {
                inner: "/".to_string(),
            }),
            Some(idx) if idx > 0 && !self.is_network_root(idx) => Some(Self {
                inner: self.inner[..idx].to_string(),
            }),
            _ => None,
        }
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.rsplit('/').next().filter(|name| !name.is_empty())
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.to_native().exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.to_native().is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.to_native().is_file()
    }

    /// Check if this appears to be a network path.
    pub fn is_network_path(&self) -> bool {
        self.inner.starts_with("//")
    }

    /// Get the extension if present.
    pub fn extension(&self) -> Option<&str> {
        self.file_name().and_then(|name| {
            let idx = name.rfind('.')?;
            if idx == 0 {
                None
            } else {
                Some(&name[idx + 1..])
            }
        })
    }

    fn is_network_root(&self, idx: usize) -> bool {
        self.is_network_path() && idx == 1
    }
}

fn clean(raw: &str) -> String {
    let network = raw.starts_with("//") && !raw.starts_with("///");
    let absolute = raw.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // A drive prefix such as `C:` acts as a root.
                if parts.last().is_some_and(|last| !is_drive(last)) {
                    parts.pop();
                }
            }
            other => parts.push(other),
        }
    }

    let body = parts.join("/");
    if network {
        format!("//{}", body)
    } else if absolute {
        format!("/{}", body)
    } else {
        body
    }
}

fn is_drive(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Validate that `value` can be used verbatim as a single directory name.
///
/// Repository ids double as data directory names, so they must not be
/// empty, must not be `.` or `..`, and must not contain path separators or
/// NUL bytes.
pub fn validate_path_identifier(value: &str) -> Result<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative directory reference")
    } else if value.contains(['/', '\\']) {
        Some("must not contain path separators")
    } else if value.contains('\0') {
        Some("must not contain NUL bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidIdentifier {
            value: value.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.inner)
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}
