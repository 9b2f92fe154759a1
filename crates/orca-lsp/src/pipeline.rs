//! The analysis pipeline: library resolution, parsing and type checking.
//!
//! The pipeline is a pure function of a document's text and its library.
//! It reaches the language through the [`LanguageEngine`] trait and runs the
//! CPU-bound stages on tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use orca_core::{Ast, DiagnosticSet, SourceFile, TypedProgram};
use orca_parser::{LibraryError, LIBRARY_MARKER};
use tracing::debug;

use crate::cache::LibraryCache;
use crate::error::AnalysisError;
use crate::uri::DocumentUri;

/// The parser and type checker the server analyzes documents with.
pub trait LanguageEngine: Send + Sync + 'static {
    /// Parse every source file below `root` into one library module.
    fn parse_library(&self, root: &Path) -> Result<Ast, LibraryError>;

    /// Parse `files` into a module named `name`, extending `base`.
    fn parse_module(
        &self,
        base: Arc<Ast>,
        name: &str,
        files: &[SourceFile],
    ) -> Result<Ast, DiagnosticSet>;

    /// Resolve names and types of every module of `ast`.
    fn type_check(&self, ast: Arc<Ast>) -> Result<TypedProgram, DiagnosticSet>;
}

/// The orca parser and type checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrcaEngine;

impl LanguageEngine for OrcaEngine {
    fn parse_library(&self, root: &Path) -> Result<Ast, LibraryError> {
        orca_parser::parse_library(root)
    }

    fn parse_module(
        &self,
        base: Arc<Ast>,
        name: &str,
        files: &[SourceFile],
    ) -> Result<Ast, DiagnosticSet> {
        orca_parser::parse_module(base, name, files)
    }

    fn type_check(&self, ast: Arc<Ast>) -> Result<TypedProgram, DiagnosticSet> {
        orca_sema::type_check(ast)
    }
}

/// Time spent in each stage of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Waiting for the library, zero when it was already built.
    pub library: Duration,
    /// Parsing the document.
    pub parse: Duration,
    /// Type checking the document and its library.
    pub type_check: Duration,
}

/// The parsed form of a document.
#[derive(Debug)]
pub struct Syntax {
    /// The document.
    pub uri: DocumentUri,
    /// The library extended with the document's module.
    pub ast: Arc<Ast>,
    /// Whether the document is part of its library.
    pub is_library: bool,
    /// Time spent so far.
    pub metrics: Metrics,
}

/// The type-checked form of a document.
#[derive(Debug)]
pub struct Analysis {
    /// The parse this analysis was built from.
    pub syntax: Arc<Syntax>,
    /// The typed program.
    pub program: Arc<TypedProgram>,
    /// Time spent in each stage.
    pub metrics: Metrics,
}

impl Analysis {
    /// The analyzed AST.
    pub fn ast(&self) -> &Ast {
        self.program.ast()
    }
}

/// Find the library a document belongs to by walking up from its directory.
pub fn find_library_root(document: &Path) -> Option<PathBuf> {
    document
        .parent()?
        .ancestors()
        .find(|dir| dir.join(LIBRARY_MARKER).is_file())
        .map(Path::to_path_buf)
}

/// Turns document text into typed programs.
pub struct AnalysisPipeline {
    engine: Arc<dyn LanguageEngine>,
    libraries: LibraryCache,
    default_library: Option<PathBuf>,
    empty_library: Arc<Ast>,
}

impl AnalysisPipeline {
    /// Create a pipeline using `default_library` for documents outside any
    /// marked library.
    pub fn new(engine: Arc<dyn LanguageEngine>, default_library: Option<PathBuf>) -> Self {
        Self {
            libraries: LibraryCache::new(engine.clone()),
            engine,
            default_library,
            empty_library: Arc::new(Ast::new()),
        }
    }

    /// The library root for `uri`: the nearest marked directory above it,
    /// else the default library.
    pub fn library_root_for(&self, uri: &DocumentUri) -> Option<PathBuf> {
        uri.to_file_path()
            .as_deref()
            .and_then(find_library_root)
            .or_else(|| self.default_library.clone())
    }

    /// The library cache.
    pub fn libraries(&self) -> &LibraryCache {
        &self.libraries
    }

    /// Parse `text` as the document `uri` on top of the library at `library_root`.
    pub async fn parse(
        &self,
        uri: &DocumentUri,
        text: Arc<str>,
        library_root: Option<&Path>,
    ) -> Result<Arc<Syntax>, AnalysisError> {
        let (library, library_time) = match library_root {
            Some(root) => match self.libraries.peek(root) {
                Some(built) => (built?, Duration::ZERO),
                None => {
                    let start = Instant::now();
                    let library = self.libraries.get(root).await?;
                    (library, start.elapsed())
                }
            },
            None => (self.empty_library.clone(), Duration::ZERO),
        };

        let is_library = match (uri.to_file_path(), library_root) {
            (Some(path), Some(root)) => path.starts_with(root),
            _ => false,
        };

        let start = Instant::now();
        let ast = if is_library {
            debug!("{} is part of its library", uri);
            library
        } else {
            let engine = self.engine.clone();
            let name = uri.module_name();
            let file = SourceFile::new(uri.as_str(), text);
            let ast = tokio::task::spawn_blocking(move || {
                engine.parse_module(library, &name, std::slice::from_ref(&file))
            })
            .await
            .map_err(AnalysisError::internal)?
            .map_err(AnalysisError::Diagnostics)?;
            Arc::new(ast)
        };

        Ok(Arc::new(Syntax {
            uri: uri.clone(),
            ast,
            is_library,
            metrics: Metrics {
                library: library_time,
                parse: start.elapsed(),
                type_check: Duration::ZERO,
            },
        }))
    }

    /// Type check a parsed document.
    pub async fn check(&self, syntax: Arc<Syntax>) -> Result<Arc<Analysis>, AnalysisError> {
        let start = Instant::now();
        let engine = self.engine.clone();
        let ast = syntax.ast.clone();
        let program = tokio::task::spawn_blocking(move || engine.type_check(ast))
            .await
            .map_err(AnalysisError::internal)?
            .map_err(AnalysisError::Diagnostics)?;

        let metrics = Metrics {
            type_check: start.elapsed(),
            ..syntax.metrics
        };
        debug!(
            library = ?metrics.library,
            parse = ?metrics.parse,
            type_check = ?metrics.type_check,
            "Analyzed {}",
            syntax.uri
        );
        Ok(Arc::new(Analysis {
            syntax,
            program: Arc::new(program),
            metrics,
        }))
    }

    /// Parse and type check a document.
    pub async fn analyze(
        &self,
        uri: &DocumentUri,
        text: Arc<str>,
        library_root: Option<&Path>,
    ) -> Result<Arc<Analysis>, AnalysisError> {
        let syntax = self.parse(uri, text, library_root).await?;
        self.check(syntax).await
    }
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("default_library", &self.default_library)
            .finish_non_exhaustive()
    }
}
