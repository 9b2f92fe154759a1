//! Error types of the language server.

use lsp_server::ErrorCode;
use orca_core::DiagnosticSet;
use thiserror::Error;

use crate::uri::DocumentUri;

/// A failure answering a request.
#[derive(Debug, Error)]
pub enum LspError {
    /// The document identifier is not an absolute URI with a scheme.
    #[error("invalid document URI `{0}`")]
    InvalidUri(String),

    /// No document is registered under this URI.
    #[error("document not found: {0}")]
    DocumentNotFound(DocumentUri),

    /// The request parameters could not be used.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// An unexpected failure of the language engine or the server.
    #[error("internal error: {0}")]
    Internal(String),

    /// The request method is not supported.
    #[error("unhandled method: {0}")]
    MethodNotFound(String),

    /// A request arrived after `shutdown`.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl LspError {
    /// The JSON-RPC error code for this error.
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidUri(_) | Self::InvalidParams(_) => ErrorCode::InvalidParams,
            // Only reaches the client when the implicit open failed as well.
            Self::DocumentNotFound(_) => ErrorCode::InvalidParams,
            Self::Internal(_) => ErrorCode::InternalError,
            Self::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Self::ShuttingDown => ErrorCode::InvalidRequest,
        }
    }
}

impl From<serde_json::Error> for LspError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidParams(e.to_string())
    }
}

impl From<AnalysisError> for LspError {
    fn from(e: AnalysisError) -> Self {
        Self::Internal(e.to_string())
    }
}

/// The outcome of a failed analysis.
///
/// Cloned to every observer of a shared analysis handle.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// The document has parse or type errors.
    #[error("{0}")]
    Diagnostics(DiagnosticSet),

    /// The analysis could not run, e.g. because the library failed to build.
    #[error("{0}")]
    Internal(String),
}

impl AnalysisError {
    /// Wrap any displayable failure as an internal error.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self::Internal(e.to_string())
    }
}
