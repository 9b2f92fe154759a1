//! Semantic error codes.

use orca_core::{Diagnostic, SourceRange};

/// Semantic error codes.
///
/// Codes are stable; clients may filter on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// E1001: A name or type name that is not declared in any visible scope.
    UndefinedName,
    /// E1002: A member that the domain's type does not declare.
    UndefinedMember,
    /// E1003: A value of one type used where another is expected.
    TypeMismatch,
    /// E1004: A call with the wrong number of arguments.
    ArityMismatch,
    /// E1005: A call whose callee is not a function or a type.
    NotCallable,
    /// E1006: Two declarations of the same name in one scope.
    DuplicateDeclaration,
}

impl ErrorCode {
    /// Get the error code string.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UndefinedName => "E1001",
            Self::UndefinedMember => "E1002",
            Self::TypeMismatch => "E1003",
            Self::ArityMismatch => "E1004",
            Self::NotCallable => "E1005",
            Self::DuplicateDeclaration => "E1006",
        }
    }

    /// Build an error diagnostic with this code.
    pub fn at(self, site: &SourceRange, message: impl Into<String>) -> Diagnostic {
        Diagnostic::error(self.code(), site.clone(), message)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
