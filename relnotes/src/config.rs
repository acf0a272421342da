//! Pipeline configuration.

use std::path::PathBuf;

/// Default root URL of the remote release-notes archive.
///
/// Candidate URIs synthesized by discovery are rooted here unless the
/// embedding application overrides [`PipelineConfig::server_root`].
pub const DEFAULT_SERVER_ROOT: &str = "http://metadata.ftp-master.debian.org/changelogs";

/// Default directory scanned for release notes shipped with installed packages.
pub const DEFAULT_DOC_ROOT: &str = "/usr/share/doc";

/// Settings consumed by candidate discovery.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Root URL under which remote release notes are published.
    pub server_root: String,

    /// Directory probed for locally installed release notes.
    pub doc_root: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            server_root: DEFAULT_SERVER_ROOT.to_string(),
            doc_root: PathBuf::from(DEFAULT_DOC_ROOT),
        }
    }
}

impl PipelineConfig {
    /// Returns a config with a different remote archive root.
    pub fn with_server_root(mut self, server_root: impl Into<String>) -> Self {
        self.server_root = server_root.into();
        self
    }

    /// Returns a config with a different local documentation root.
    pub fn with_doc_root(mut self, doc_root: impl Into<PathBuf>) -> Self {
        self.doc_root = doc_root.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.server_root, DEFAULT_SERVER_ROOT);
        assert_eq!(config.doc_root, PathBuf::from(DEFAULT_DOC_ROOT));
    }

    #[test]
    fn test_with_server_root() {
        let config = PipelineConfig::default().with_server_root("http://localhost:8080/cl");
        assert_eq!(config.server_root, "http://localhost:8080/cl");
    }

    #[test]
    fn test_with_doc_root() {
        let config = PipelineConfig::default().with_doc_root("/tmp/doc");
        assert_eq!(config.doc_root, PathBuf::from("/tmp/doc"));
    }
}
