//! Scoped temporary files and directories.
//!
//! A [`TempResource`] owns exactly one path on disk and deletes it when it is
//! released or dropped, whichever happens first. Names come from a
//! [`TempNameSource`] held by a [`TempSpace`], so sessions running side by side
//! never pick the same path and tests can swap in [`SequentialNames`].

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{RegistrationError, RegistrationResult};

/// Default prefix for every generated temporary name.
pub const DEFAULT_PREFIX: &str = "regbridge-";

/// Kind of filesystem entry owned by a [`TempResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempKind {
    File,
    Dir,
}

/// A temporary file or directory that is removed exactly once.
#[derive(Debug)]
pub struct TempResource {
    path: PathBuf,
    kind: TempKind,
    released: bool,
}

impl TempResource {
    /// Returns the owned path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether this resource is a file or a directory.
    pub fn kind(&self) -> TempKind {
        self.kind
    }

    /// Returns true once the resource has been released.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Deletes the owned path.
    ///
    /// Calling this more than once is a no-op. Deletion failures are logged
    /// and swallowed so they never mask the outcome of the enclosing operation.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let result = match self.kind {
            TempKind::File => fs::remove_file(&self.path),
            TempKind::Dir => fs::remove_dir_all(&self.path),
        };

        match result {
            Ok(()) => tracing::trace!(path = %self.path.display(), "released temporary resource"),
            // Already gone, e.g. the file was moved out by the caller.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove temporary resource"
            ),
        }
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Source of unique names for temporary resources.
pub trait TempNameSource: fmt::Debug + Send + Sync {
    /// Returns a fresh name built from `prefix` and `suffix`.
    fn unique_name(&self, prefix: &str, suffix: &str) -> String;
}

/// Random names backed by UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidNames;

impl TempNameSource for UuidNames {
    fn unique_name(&self, prefix: &str, suffix: &str) -> String {
        format!("{}{}{}", prefix, uuid::Uuid::new_v4().simple(), suffix)
    }
}

/// Deterministic counter-based names, `<prefix><tag>-<n><suffix>`.
///
/// Only unique within one instance; meant for tests that need predictable
/// paths.
#[derive(Debug, Default)]
pub struct SequentialNames {
    tag: String,
    next: AtomicU64,
}

impl SequentialNames {
    /// Creates a generator whose names carry `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl TempNameSource for SequentialNames {
    fn unique_name(&self, prefix: &str, suffix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}-{}{}", prefix, self.tag, n, suffix)
    }
}

/// Where temporary resources are created and how they are named.
#[derive(Debug, Clone)]
pub struct TempSpace {
    root: PathBuf,
    prefix: String,
    names: Arc<dyn TempNameSource>,
}

impl Default for TempSpace {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

impl TempSpace {
    /// Creates a temp space rooted at `root` with random names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            prefix: DEFAULT_PREFIX.to_string(),
            names: Arc::new(UuidNames),
        }
    }

    /// Replaces the name source.
    pub fn with_names(mut self, names: impl TempNameSource + 'static) -> Self {
        self.names = Arc::new(names);
        self
    }

    /// Sets the prefix of generated names.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Returns the directory new resources are created in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates an empty temporary file whose name ends with `suffix`.
    pub fn acquire_temp_file(&self, suffix: &str) -> RegistrationResult<TempResource> {
        let path = self.next_path(suffix);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| RegistrationError::TempResource {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), "acquired temporary file");
        Ok(TempResource {
            path,
            kind: TempKind::File,
            released: false,
        })
    }

    /// Creates an empty temporary directory.
    pub fn acquire_temp_dir(&self) -> RegistrationResult<TempResource> {
        let path = self.next_path("");
        // `create_dir` rather than `create_dir_all`: an existing entry is a collision.
        fs::create_dir(&path).map_err(|source| RegistrationError::TempResource {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "acquired temporary directory");
        Ok(TempResource {
            path,
            kind: TempKind::Dir,
            released: false,
        })
    }

    fn next_path(&self, suffix: &str) -> PathBuf {
        self.root.join(self.names.unique_name(&self.prefix, suffix))
    }
}
