//! Handle to a fetched artifact on disk.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;

/// A successfully fetched artifact.
///
/// Cloneable and cheap to pass between threads. When the artifact is
/// backed by a temporary file, the file stays on disk until the last clone
/// is dropped; callers that want to keep the bytes copy them out first.
#[derive(Clone)]
pub struct Artifact {
    path: PathBuf,
    compressed: bool,
    _temp: Option<Arc<TempPath>>,
}

impl Artifact {
    /// Wraps an existing file that the caller owns.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            compressed: false,
            _temp: None,
        }
    }

    /// Wraps a temporary file, keeping it alive for the artifact's
    /// lifetime.
    pub fn from_temp(temp: TempPath) -> Self {
        Self {
            path: temp.to_path_buf(),
            compressed: false,
            _temp: Some(Arc::new(temp)),
        }
    }

    /// Marks whether the payload is stored compressed.
    ///
    /// The pipeline never decompresses; the flag merely tells consumers
    /// what they are holding.
    pub fn with_compressed(mut self, compressed: bool) -> Self {
        self.compressed = compressed;
        self
    }

    /// Where the artifact's bytes live.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the payload is stored compressed.
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }
}

impl fmt::Debug for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifact")
            .field("path", &self.path)
            .field("compressed", &self.compressed)
            .field("temporary", &self._temp.is_some())
            .finish()
    }
}
