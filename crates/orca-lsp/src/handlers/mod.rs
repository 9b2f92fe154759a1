//! LSP request handlers.
//!
//! Each handler answers one request type from an immutable AST or typed
//! program produced by the document cache.

pub mod utils;

pub mod definition;
pub mod diagnostics;
pub mod semantic_tokens;
pub mod symbols;
