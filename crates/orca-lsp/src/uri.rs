//! Canonical document identities.
//!
//! Clients may spell the same file in different ways (percent-encoding,
//! trailing slashes, symlinked directories). Every URI entering the server is
//! canonicalized here once, so that the rest of the server can compare
//! document identities and translation-unit URIs by plain string equality.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use url::Url;

use crate::error::LspError;

/// The canonical URI of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentUri(Arc<str>);

impl DocumentUri {
    /// Canonicalize `uri`.
    ///
    /// `file` URIs are resolved to the canonical path of the file when it
    /// exists; other schemes are only normalized syntactically.
    pub fn parse(uri: &str) -> Result<Self, LspError> {
        let url = Url::parse(uri).map_err(|_| LspError::InvalidUri(uri.to_string()))?;
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|()| LspError::InvalidUri(uri.to_string()))?;
            return Self::from_path(&path);
        }
        if url.cannot_be_a_base() && url.path().is_empty() {
            return Err(LspError::InvalidUri(uri.to_string()));
        }
        let mut canonical = url.to_string();
        while canonical.ends_with('/') && !canonical.ends_with("//") {
            canonical.pop();
        }
        Ok(Self(canonical.into()))
    }

    /// The URI of an absolute path.
    pub fn from_path(path: &Path) -> Result<Self, LspError> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        orca_core::file_uri(&path)
            .map(|uri| Self(uri.into()))
            .ok_or_else(|| LspError::InvalidUri(path.display().to_string()))
    }

    /// Canonicalize a URI received from the client.
    pub fn from_lsp(uri: &lsp_types::Uri) -> Result<Self, LspError> {
        Self::parse(uri.as_str())
    }

    /// Convert back into a protocol URI.
    pub fn to_lsp(&self) -> Result<lsp_types::Uri, LspError> {
        lsp_types::Uri::from_str(&self.0).map_err(|_| LspError::InvalidUri(self.0.to_string()))
    }

    /// The URI as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path of a `file` URI.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        let url = Url::parse(&self.0).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }

    /// A module name for the document: its file stem, or `document`.
    pub fn module_name(&self) -> String {
        self.to_file_path()
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(|s| s.to_str())
            .map_or_else(|| "document".to_string(), str::to_string)
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentUri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_uri_is_invalid() {
        assert!(matches!(
            DocumentUri::parse("main.orca"),
            Err(LspError::InvalidUri(_))
        ));
        assert!(DocumentUri::parse("").is_err());
    }

    #[test]
    fn test_percent_encoding_is_normalized() {
        let a = DocumentUri::parse("file:///tmp/orca%20docs/main.orca").unwrap();
        let b = DocumentUri::parse("file:///tmp/orca docs/main.orca").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.module_name(), "main");
    }

    #[test]
    fn test_existing_files_are_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let file = dir.path().join("src/main.orca");
        std::fs::write(&file, "let x = 1").unwrap();

        let direct = DocumentUri::from_path(&file).unwrap();
        let dotted = DocumentUri::from_path(&dir.path().join("src/../src/main.orca")).unwrap();
        assert_eq!(direct, dotted);
        assert_eq!(
            direct.to_file_path().unwrap(),
            std::fs::canonicalize(&file).unwrap()
        );
    }

    #[test]
    fn test_other_schemes_are_kept() {
        let uri = DocumentUri::parse("untitled:Untitled-1").unwrap();
        assert_eq!(uri.as_str(), "untitled:Untitled-1");
        assert!(uri.to_file_path().is_none());
        assert_eq!(uri.module_name(), "document");
        assert_eq!(uri.to_lsp().unwrap().as_str(), "untitled:Untitled-1");
    }
}
