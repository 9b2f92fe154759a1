//! Parse error types.

use orca_core::{Diagnostic, SourceFile, SourceRange};
use std::path::PathBuf;

/// The kind of a syntax error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    /// A token that does not fit the grammar.
    #[error("unexpected token `{0}`")]
    UnexpectedToken(String),
    /// The file ended in the middle of a construct.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A character the lexer does not recognize.
    #[error("invalid character `{0}`")]
    InvalidCharacter(String),
}

impl ParseErrorKind {
    /// Get the stable code of this error.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnexpectedToken(_) => "P0001",
            Self::UnexpectedEof => "P0002",
            Self::InvalidCharacter(_) => "P0003",
        }
    }
}

/// A syntax error with its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Byte offsets (start, end).
    pub span: (usize, usize),
}

impl ParseError {
    /// Create a new parse error.
    pub const fn new(kind: ParseErrorKind, span: (usize, usize)) -> Self {
        Self { kind, span }
    }

    /// Convert to a diagnostic located in `file`.
    pub fn into_diagnostic(self, file: &SourceFile) -> Diagnostic {
        let site = SourceRange::new(file.clone(), self.span.0, self.span.1);
        Diagnostic::error(self.kind.code(), site, self.kind.to_string())
    }
}

/// An error building the AST of a shared library.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    /// The library root does not exist or is not a directory.
    #[error("library root {} is not a directory", .0.display())]
    NotFound(PathBuf),

    /// A library file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A path has no `file://` URI.
    #[error("cannot represent {} as a URI", .0.display())]
    InvalidPath(PathBuf),

    /// The library sources do not compile.
    #[error("library {} contains errors:\n{diagnostics}", root.display())]
    Diagnostics {
        /// The library root.
        root: PathBuf,
        /// What is wrong.
        diagnostics: orca_core::DiagnosticSet,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(ParseErrorKind::UnexpectedToken("x".into()).code(), "P0001");
        assert_eq!(ParseErrorKind::UnexpectedEof.code(), "P0002");
        assert_eq!(ParseErrorKind::InvalidCharacter("#".into()).code(), "P0003");
    }

    #[test]
    fn test_into_diagnostic() {
        let file = SourceFile::new("file:///a.orca", "let = 1");
        let diagnostic = ParseError::new(ParseErrorKind::UnexpectedToken("=".into()), (4, 5))
            .into_diagnostic(&file);
        assert_eq!(diagnostic.code, "P0001");
        assert_eq!(diagnostic.site.text(), "=");
        assert_eq!(diagnostic.message, "unexpected token `=`");
    }
}
