//! Request identity for a release-notes fetch.
//!
//! A [`NotesRequest`] names the artifact to retrieve: the source package and
//! version whose release notes are wanted, the archive section the package
//! lives in, and the name shown to the user while the fetch is in flight.
//! The identity is immutable once constructed; discovery and logging read
//! it, nothing mutates it.

use std::fmt;
use tracing::trace;

use crate::store::{MetadataStore, StoreError};

/// Identifies the release notes to be fetched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NotesRequest {
    source_package: String,
    source_version: String,
    section: String,
    display_name: String,
}

impl NotesRequest {
    /// Creates a request from already-known source coordinates.
    pub fn new(
        source_package: impl Into<String>,
        source_version: impl Into<String>,
        section: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            source_package: source_package.into(),
            source_version: source_version.into(),
            section: section.into(),
            display_name: display_name.into(),
        }
    }

    /// Resolves the request for a binary package via the metadata store.
    ///
    /// Maps the package to its source package and version, the way the
    /// archive metadata records them. Returns `Ok(None)` when the package
    /// is unknown or its installed version is not available from any
    /// archive (there is nothing meaningful to fetch for such packages).
    pub fn resolve(
        store: &dyn MetadataStore,
        package: &str,
    ) -> Result<Option<NotesRequest>, StoreError> {
        let Some(installed) = store.installed(package)? else {
            trace!(package, "no release-notes information: unknown package");
            return Ok(None);
        };

        if !installed.from_archive {
            trace!(
                package,
                "no release-notes information: not available from any archive"
            );
            return Ok(None);
        }

        trace!(
            package,
            version = %installed.version,
            source_package = %installed.source_package,
            source_version = %installed.source_version,
            "resolved release-notes request to the source package"
        );

        Ok(Some(NotesRequest {
            source_package: installed.source_package,
            source_version: installed.source_version,
            section: installed.section,
            display_name: package.to_string(),
        }))
    }

    /// The source package whose release notes are fetched.
    pub fn source_package(&self) -> &str {
        &self.source_package
    }

    /// The source version whose release notes are fetched.
    pub fn source_version(&self) -> &str {
        &self.source_version
    }

    /// The archive section the package belongs to.
    pub fn section(&self) -> &str {
        &self.section
    }

    /// The name shown to the user for this request.
    ///
    /// The binary package name the caller selected is a good choice.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl fmt::Display for NotesRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.source_package, self.source_version)
    }
}
