//! Shared-storage root and logical path translation.
//!
//! Scene files live on storage shared by every submitter and worker, but
//! the mount point differs per machine. Paths cross the queue in logical
//! form: the machine-local root prefix is replaced by the `$RENDERQ_ROOT`
//! token at submit time and expanded back on the worker.

use std::path::{Component, Path, PathBuf};

use crate::error::QueueError;

/// Token substituted for the storage root in logical paths.
pub const ROOT_TOKEN: &str = "$RENDERQ_ROOT";

/// A validated shared-storage root directory.
#[derive(Debug, Clone)]
pub struct StorageRoot {
    root: PathBuf,
}

impl StorageRoot {
    /// Validate and wrap a root directory.
    ///
    /// The root must be a non-empty, absolute path to an existing
    /// directory; anything else is a configuration error raised before
    /// any queue traffic.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            return Err(QueueError::Configuration(
                "Storage root not specified. You must specify the path to the shared storage directory for this machine.".to_string(),
            ));
        }
        if !root.is_absolute() {
            return Err(QueueError::Configuration(format!(
                "Storage root must be an absolute path, got {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(QueueError::Configuration(format!(
                "Storage root does not exist or is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// The underlying root directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Translate an absolute path inside the root to its logical form.
    ///
    /// Rejects relative paths and paths outside the root with a
    /// validation error, before anything is queued. The root itself maps
    /// to the bare token.
    ///
    /// `strip_prefix` matches lexically, so a `..` component in the
    /// remainder would let a path that resolves outside the root masquerade
    /// as one inside it. Such paths are rejected rather than normalised.
    pub fn to_logical(&self, path: &Path) -> Result<String, QueueError> {
        if !path.is_absolute() {
            return Err(QueueError::Validation(format!(
                "Path must be absolute, got {}",
                path.display()
            )));
        }
        let relative = path.strip_prefix(&self.root).map_err(|_| {
            QueueError::Validation(format!(
                "File stored outside the shared storage root: {} is not under {}",
                path.display(),
                self.root.display()
            ))
        })?;
        if relative.as_os_str().is_empty() {
            return Ok(ROOT_TOKEN.to_string());
        }
        let mut logical = String::from(ROOT_TOKEN);
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    logical.push('/');
                    logical.push_str(&part.to_string_lossy());
                }
                _ => {
                    return Err(QueueError::Validation(format!(
                        "Path must not contain . or .. components: {}",
                        path.display()
                    )));
                }
            }
        }
        Ok(logical)
    }

    /// Expand a logical path back to a machine-local absolute path.
    pub fn to_absolute(&self, logical: &str) -> PathBuf {
        match logical.strip_prefix(ROOT_TOKEN) {
            Some(rest) => {
                let rest = rest.trim_start_matches('/');
                if rest.is_empty() {
                    self.root.clone()
                } else {
                    self.root.join(rest)
                }
            }
            // Not rooted: take the path as-is.
            None => PathBuf::from(logical),
        }
    }
}
