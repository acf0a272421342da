//! Read-only package metadata boundary and data-source lifecycle.
//!
//! The pipeline never owns package metadata; it consumes it through the
//! narrow [`MetadataStore`] query interface. Likewise, candidate discovery
//! checks for already-installed release notes only through [`LocalProbe`],
//! never by opening files itself.
//!
//! [`StoreLifecycle`] is the hub for the two external lifecycle signals
//! (`source_available` / `source_unavailable`) that gate the background
//! preparation worker: discovery reads store state that is only safe while
//! the data source is open, so the worker runs exactly between those two
//! signals.

mod lifecycle;

pub use lifecycle::StoreLifecycle;

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by metadata store queries.
///
/// Discovery converts any of these into a failure outcome for the affected
/// request; they never terminate the worker thread.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying data source is closed or being reconfigured.
    #[error("metadata store is not open")]
    NotOpen,

    /// A query failed for a store-specific reason.
    #[error("metadata query failed: {0}")]
    Query(String),
}

/// A source package record: the source name and the binary packages built
/// from it.
#[derive(Clone, Debug)]
pub struct SourceRecord {
    /// Name of the source package.
    pub source_package: String,

    /// Binary packages built from this source.
    pub binaries: Vec<String>,
}

/// Installed-state information for one binary package.
#[derive(Clone, Debug)]
pub struct InstalledPackage {
    /// Binary package name.
    pub name: String,

    /// Installed version string.
    pub version: String,

    /// Source package the installed version was built from.
    pub source_package: String,

    /// Source version the installed version was built from.
    pub source_version: String,

    /// Archive section, possibly `archive/section` qualified.
    pub section: String,

    /// Whether the installed version is listed in at least one archive
    /// index. Versions installed from nowhere have no fetchable notes.
    pub from_archive: bool,
}

/// Read-only query interface over the package/version metadata store.
///
/// All methods may fail while the data source is closed; callers treat any
/// error as "this request cannot be prepared right now".
pub trait MetadataStore: Send + Sync {
    /// Whether any source-package records exist at all.
    ///
    /// Discovery skips local probing entirely when this is false, which
    /// also suppresses spurious "no record" noise on stores without source
    /// indexes.
    fn has_source_records(&self) -> Result<bool, StoreError>;

    /// Looks up the record for a source package.
    fn source_record(&self, source_package: &str) -> Result<Option<SourceRecord>, StoreError>;

    /// Looks up installed-state information for a binary package.
    ///
    /// Returns `Ok(None)` for packages that are unknown or not installed.
    fn installed(&self, package: &str) -> Result<Option<InstalledPackage>, StoreError>;
}

/// Existence probe for local candidate paths.
///
/// Used only by candidate discovery; the authoritative fetch always goes
/// through the transfer boundary.
pub trait LocalProbe: Send + Sync {
    /// Whether a regular file exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// [`LocalProbe`] over the real filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsProbe;

impl LocalProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// In-memory [`MetadataStore`] for tests, the CLI, and embedders that
/// already hold their metadata in memory.
#[derive(Debug, Default)]
pub struct TableStore {
    sources: HashMap<String, SourceRecord>,
    installed: HashMap<String, InstalledPackage>,
}

impl TableStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a source record.
    pub fn insert_source(&mut self, record: SourceRecord) {
        self.sources.insert(record.source_package.clone(), record);
    }

    /// Inserts (or replaces) installed-state information.
    pub fn insert_installed(&mut self, package: InstalledPackage) {
        self.installed.insert(package.name.clone(), package);
    }
}

impl MetadataStore for TableStore {
    fn has_source_records(&self) -> Result<bool, StoreError> {
        Ok(!self.sources.is_empty())
    }

    fn source_record(&self, source_package: &str) -> Result<Option<SourceRecord>, StoreError> {
        Ok(self.sources.get(source_package).cloned())
    }

    fn installed(&self, package: &str) -> Result<Option<InstalledPackage>, StoreError> {
        Ok(self.installed.get(package).cloned())
    }
}
