//! Core types for the orca language toolchain.
//!
//! This crate holds the data model shared by the parser, the type checker and
//! the language server:
//!
//! - [`SourceFile`], [`SourceRange`] and [`LineIndex`] for locations
//! - [`Ast`], an append-only node arena whose nodes are a closed [`NodeKind`] sum type
//! - [`TypedProgram`], the result of type checking, with its reference table
//! - [`Diagnostic`] and [`DiagnosticSet`] for user-facing errors
//!
//! # Sharing
//!
//! An [`Ast`] can extend another one held in an [`std::sync::Arc`]. Node
//! identities of the base stay valid in the extension, so a library AST can be
//! reused by many documents without being copied or mutated.
//!
//! # Example
//!
//! ```ignore
//! use orca_core::{Ast, SourceFile};
//! use std::sync::Arc;
//!
//! let library = Arc::new(Ast::new());
//! let mut document = Ast::extending(library.clone());
//! assert_eq!(document.len(), library.len());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ast;
mod diagnostic;
mod program;
mod source;

pub use ast::{Ast, Identifier, Node, NodeId, NodeKind};
pub use diagnostic::{Diagnostic, DiagnosticSet, RelatedNote, Severity};
pub use program::{BuiltinType, DeclReference, Type, TypedProgram};
pub use source::{
    file_uri, LineColumn, LineIndex, SourceFile, SourcePosition, SourceRange, SYNTHESIZED_URI,
};
