//! Atomic I/O operations with file locking

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use fs2::FileExt;

use crate::{Error, NormalizedPath, Result};

/// Retry policy for filesystem operations that can fail transiently, such
/// as deleting a directory whose files are still briefly held open by a
/// store that is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RobustnessConfig {
    /// Delay before the first retry.
    pub initial_interval: Duration,
    /// Give up once this much time has passed since the first attempt.
    pub max_elapsed: Duration,
}

impl Default for RobustnessConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(50),
            max_elapsed: Duration::from_secs(2),
        }
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Write content atomically to a file with locking.
///
/// Uses write-to-temp-then-rename strategy to prevent partial writes.
/// Acquires an advisory lock to prevent concurrent access.
pub fn write_atomic(path: &NormalizedPath, content: &[u8]) -> Result<()> {
    let native_path = path.to_native();

    if let Some(parent) = native_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    // Temp file in the same directory keeps the rename on one filesystem
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        native_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let temp_path = native_path.with_file_name(&temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| Error::io(&temp_path, e))?;

    temp_file.lock_exclusive().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    temp_file
        .write_all(content)
        .map_err(|e| Error::io(&temp_path, e))?;
    temp_file.sync_all().map_err(|e| Error::io(&temp_path, e))?;

    temp_file.unlock().map_err(|_| Error::LockFailed {
        path: native_path.clone(),
    })?;

    fs::rename(&temp_path, &native_path).map_err(|e| Error::io(&native_path, e))?;

    Ok(())
}

/// Read text content from a file.
pub fn read_text(path: &NormalizedPath) -> Result<String> {
    let native_path = path.to_native();
    fs::read_to_string(&native_path).map_err(|e| Error::io(&native_path, e))
}

/// Write text content to a file atomically.
pub fn write_text(path: &NormalizedPath, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes())
}

/// Recursively delete a directory, retrying transient failures with
/// exponential backoff.
///
/// Returns `Ok(false)` if the directory did not exist.
pub fn remove_dir_all(path: &NormalizedPath, robustness: RobustnessConfig) -> Result<bool> {
    let native_path = path.to_native();
    if !native_path.exists() {
        return Ok(false);
    }

    let policy = ExponentialBackoffBuilder::new()
        .with_initial_interval(robustness.initial_interval)
        .with_max_elapsed_time(Some(robustness.max_elapsed))
        .build();

    let attempt = || match fs::remove_dir_all(&native_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::debug!(path = %path, error = %e, "Directory removal failed, retrying");
            Err(backoff::Error::transient(e))
        }
    };

    backoff::retry(policy, attempt).map_err(|e| match e {
        backoff::Error::Permanent(err) | backoff::Error::Transient { err, .. } => {
            Error::io(&native_path, err)
        }
    })?;

    Ok(true)
}
