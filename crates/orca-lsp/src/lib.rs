//! Language Server Protocol implementation for orca.
//!
//! This crate provides the analysis layer of an LSP server, enabling IDE
//! features like:
//! - Go-to-definition backed by the type checker's name resolution
//! - Document symbols (outline view)
//! - Semantic tokens for highlighting
//! - Pull diagnostics for parse and type errors
//!
//! # Architecture
//!
//! - **Pipeline**: parses a document against its shared library and type
//!   checks the result, through the [`LanguageEngine`] trait
//! - **Document cache**: tracks open documents and memoizes their analyses
//!   behind single-flight handles that edits discard
//! - **Queries and handlers**: pure functions over an immutable AST or typed
//!   program
//! - **Router and main loop**: decode protocol messages, apply notifications
//!   in order and answer requests concurrently
//!
//! # Example
//!
//! ```ignore
//! use orca_lsp::Server;
//! use lsp_server::Connection;
//!
//! let (connection, io_threads) = Connection::stdio();
//! Server::new(connection).run()?;
//! io_threads.join()?;
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod main_loop;
pub mod pipeline;
pub mod query;
pub mod router;
pub mod uri;

mod server;
mod vfs;

pub use cache::{AnalysisHandle, DocumentCache, LibraryCache, SyntaxHandle};
pub use config::ServerConfig;
pub use context::ServerContext;
pub use error::{AnalysisError, LspError};
pub use main_loop::run_main_loop;
pub use pipeline::{Analysis, AnalysisPipeline, LanguageEngine, Metrics, OrcaEngine, Syntax};
pub use router::{Flow, RequestRouter};
pub use server::{
    initialize_result, start_stdio, LogLevelHook, Server, ServerError, SERVER_NAME,
};
pub use uri::DocumentUri;
pub use vfs::Document;

/// LSP server version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
