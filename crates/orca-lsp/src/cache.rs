//! Memoized analyses of open documents.
//!
//! Each open document owns at most one syntax handle and one analysis handle.
//! A handle is a shared future: the first caller to await it drives the
//! computation and every other caller receives a clone of the same result.
//! Handles are created lazily under the cache lock, which makes creation
//! single-flight, and are dropped from the document on every change.
//!
//! Dropping a handle does not cancel work already running on the blocking
//! pool; a stale analysis runs to completion and its result is discarded.
//!
//! Library ASTs are memoized per root in a [`LibraryCache`] and never evicted.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{BoxFuture, FutureExt, Shared};
use lsp_types::TextDocumentContentChangeEvent;
use orca_core::Ast;
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{AnalysisError, LspError};
use crate::pipeline::{Analysis, AnalysisPipeline, LanguageEngine, Syntax};
use crate::uri::DocumentUri;
use crate::vfs::Document;

type SharedResult<T> = Shared<BoxFuture<'static, Result<Arc<T>, AnalysisError>>>;

/// A memoized, single-flight computation.
pub struct Handle<T> {
    id: u64,
    future: SharedResult<T>,
}

/// A handle on the parse of a document.
pub type SyntaxHandle = Handle<Syntax>;

/// A handle on the full analysis of a document.
pub type AnalysisHandle = Handle<Analysis>;

impl<T> Handle<T> {
    /// The identity of this handle, unique within its cache.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the result.
    pub async fn get(&self) -> Result<Arc<T>, AnalysisError> {
        self.future.clone().await
    }

    /// The result, if the computation has finished.
    pub fn peek(&self) -> Option<Result<Arc<T>, AnalysisError>> {
        self.future.peek().cloned()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            future: self.future.clone(),
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").field("id", &self.id).finish()
    }
}

/// Library ASTs by root directory.
pub struct LibraryCache {
    engine: Arc<dyn LanguageEngine>,
    entries: Mutex<HashMap<PathBuf, SharedResult<Ast>>>,
}

impl LibraryCache {
    /// Create an empty cache.
    pub fn new(engine: Arc<dyn LanguageEngine>) -> Self {
        Self {
            engine,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the library at `root`, building it on first use.
    ///
    /// Failures are memoized too; a library that fails to build stays failed
    /// for the lifetime of the server.
    pub async fn get(&self, root: &Path) -> Result<Arc<Ast>, AnalysisError> {
        let future = {
            let mut entries = self.entries.lock();
            entries
                .entry(root.to_path_buf())
                .or_insert_with(|| build_library(self.engine.clone(), root.to_path_buf()))
                .clone()
        };
        future.await
    }

    /// The library at `root`, if it has finished building.
    pub fn peek(&self, root: &Path) -> Option<Result<Arc<Ast>, AnalysisError>> {
        self.entries.lock().get(root).and_then(|f| f.peek().cloned())
    }

    /// The number of library roots seen so far.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no library was requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn build_library(engine: Arc<dyn LanguageEngine>, root: PathBuf) -> SharedResult<Ast> {
    parse_library(engine, root).boxed().shared()
}

async fn parse_library(
    engine: Arc<dyn LanguageEngine>,
    root: PathBuf,
) -> Result<Arc<Ast>, AnalysisError> {
    let start = Instant::now();
    let path = root.clone();
    let result = tokio::task::spawn_blocking(move || engine.parse_library(&path))
        .await
        .map_err(AnalysisError::internal)?;
    match result {
        Ok(ast) => {
            info!(
                "Built library {} ({} nodes) in {:?}",
                root.display(),
                ast.len(),
                start.elapsed()
            );
            Ok(Arc::new(ast))
        }
        Err(e) => {
            error!("Failed to build library {}: {}", root.display(), e);
            Err(AnalysisError::Internal(format!(
                "failed to build library {}: {e}",
                root.display()
            )))
        }
    }
}

impl fmt::Debug for LibraryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryCache")
            .field("roots", &self.entries.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An open document and its memoized results.
#[derive(Debug)]
struct Entry {
    document: Document,
    syntax: Option<SyntaxHandle>,
    analysis: Option<AnalysisHandle>,
}

impl Entry {
    fn new(document: Document) -> Self {
        Self {
            document,
            syntax: None,
            analysis: None,
        }
    }

    fn invalidate(&mut self) {
        self.syntax = None;
        self.analysis = None;
    }
}

/// The open documents of the server.
pub struct DocumentCache {
    pipeline: Arc<AnalysisPipeline>,
    documents: Mutex<HashMap<DocumentUri, Entry>>,
    next_id: AtomicU64,
}

impl DocumentCache {
    /// Create an empty cache analyzing documents with `pipeline`.
    pub fn new(pipeline: Arc<AnalysisPipeline>) -> Self {
        Self {
            pipeline,
            documents: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The pipeline used for analyses.
    pub fn pipeline(&self) -> &Arc<AnalysisPipeline> {
        &self.pipeline
    }

    /// Register a document. Reopening a document replaces it.
    pub fn open(&self, uri: DocumentUri, text: &str, version: i32) {
        debug!("Opened {} (version {})", uri, version);
        self.documents
            .lock()
            .insert(uri, Entry::new(Document::new(text, version)));
    }

    /// Register a document with its text read from disk.
    pub fn open_from_disk(&self, uri: &DocumentUri) -> Result<(), LspError> {
        let path = uri
            .to_file_path()
            .ok_or_else(|| LspError::InvalidParams(format!("{uri} is not a file")))?;
        let text = std::fs::read_to_string(&path)
            .map_err(|e| LspError::InvalidParams(format!("cannot read {}: {e}", path.display())))?;
        info!("Implicitly opened {}", uri);
        self.documents
            .lock()
            .entry(uri.clone())
            .or_insert_with(|| Entry::new(Document::new(&text, 0)));
        Ok(())
    }

    /// Apply `changes` to a document and drop its memoized results.
    pub fn change(
        &self,
        uri: &DocumentUri,
        changes: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> Result<(), LspError> {
        let mut documents = self.documents.lock();
        let entry = documents
            .get_mut(uri)
            .ok_or_else(|| LspError::DocumentNotFound(uri.clone()))?;
        entry.document.apply_changes(changes, version);
        entry.invalidate();
        debug!("Changed {} (version {})", uri, version);
        Ok(())
    }

    /// Forget a document. Returns whether it was open.
    pub fn close(&self, uri: &DocumentUri) -> bool {
        debug!("Closed {}", uri);
        self.documents.lock().remove(uri).is_some()
    }

    /// Whether a document is open.
    pub fn contains(&self, uri: &DocumentUri) -> bool {
        self.documents.lock().contains_key(uri)
    }

    /// The current text of a document.
    pub fn text(&self, uri: &DocumentUri) -> Option<String> {
        self.documents.lock().get(uri).map(|e| e.document.text())
    }

    /// The current version of a document.
    pub fn version(&self, uri: &DocumentUri) -> Option<i32> {
        self.documents.lock().get(uri).map(|e| e.document.version())
    }

    /// The number of open documents.
    pub fn len(&self) -> usize {
        self.documents.lock().len()
    }

    /// Whether no document is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The parse handle of a document, created if needed.
    pub fn syntax(&self, uri: &DocumentUri) -> Result<SyntaxHandle, LspError> {
        let mut documents = self.documents.lock();
        let entry = documents
            .get_mut(uri)
            .ok_or_else(|| LspError::DocumentNotFound(uri.clone()))?;
        Ok(self.syntax_handle(uri, entry))
    }

    /// The analysis handle of a document, created if needed.
    ///
    /// Shares the parse with the syntax handle of the same version.
    pub fn analysis(&self, uri: &DocumentUri) -> Result<AnalysisHandle, LspError> {
        let mut documents = self.documents.lock();
        let entry = documents
            .get_mut(uri)
            .ok_or_else(|| LspError::DocumentNotFound(uri.clone()))?;
        if let Some(handle) = &entry.analysis {
            return Ok(handle.clone());
        }

        let syntax = self.syntax_handle(uri, entry);
        let pipeline = self.pipeline.clone();
        let future = async move {
            let syntax = syntax.get().await?;
            pipeline.check(syntax).await
        }
        .boxed()
        .shared();

        let handle = Handle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            future,
        };
        debug!("New analysis handle {} for {}", handle.id, uri);
        entry.analysis = Some(handle.clone());
        Ok(handle)
    }

    fn syntax_handle(&self, uri: &DocumentUri, entry: &mut Entry) -> SyntaxHandle {
        if let Some(handle) = &entry.syntax {
            return handle.clone();
        }

        let pipeline = self.pipeline.clone();
        let uri = uri.clone();
        let text: Arc<str> = entry.document.text().into();
        let library_root = pipeline.library_root_for(&uri);
        let future = async move { pipeline.parse(&uri, text, library_root.as_deref()).await }
            .boxed()
            .shared();

        let handle = Handle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            future,
        };
        entry.syntax = Some(handle.clone());
        handle
    }
}

impl fmt::Debug for DocumentCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCache")
            .field("documents", &self.documents.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::OrcaEngine;
    use orca_core::{DiagnosticSet, SourceFile, TypedProgram};
    use orca_parser::LibraryError;
    use std::sync::atomic::AtomicUsize;

    /// Counts the calls made into the engine.
    #[derive(Default)]
    struct CountingEngine {
        libraries: AtomicUsize,
        parses: AtomicUsize,
        checks: AtomicUsize,
    }

    impl LanguageEngine for CountingEngine {
        fn parse_library(&self, root: &Path) -> Result<Ast, LibraryError> {
            self.libraries.fetch_add(1, Ordering::SeqCst);
            OrcaEngine.parse_library(root)
        }

        fn parse_module(
            &self,
            base: Arc<Ast>,
            name: &str,
            files: &[SourceFile],
        ) -> Result<Ast, DiagnosticSet> {
            self.parses.fetch_add(1, Ordering::SeqCst);
            OrcaEngine.parse_module(base, name, files)
        }

        fn type_check(&self, ast: Arc<Ast>) -> Result<TypedProgram, DiagnosticSet> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            OrcaEngine.type_check(ast)
        }
    }

    fn cache(engine: Arc<CountingEngine>, library: Option<PathBuf>) -> DocumentCache {
        DocumentCache::new(Arc::new(AnalysisPipeline::new(engine, library)))
    }

    fn uri(name: &str) -> DocumentUri {
        DocumentUri::parse(&format!("untitled:{name}")).unwrap()
    }

    fn full_change(text: &str) -> Vec<TextDocumentContentChangeEvent> {
        vec![TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text: text.to_string(),
        }]
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_share_one_analysis() {
        let engine = Arc::new(CountingEngine::default());
        let cache = Arc::new(cache(engine.clone(), None));
        let doc = uri("main");
        cache.open(doc.clone(), "let x = 1\nlet y = x", 1);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                let doc = doc.clone();
                tokio::spawn(async move { cache.analysis(&doc).unwrap().get().await })
            })
            .collect();
        let results: Vec<_> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(engine.parses.load(Ordering::SeqCst), 1);
        assert_eq!(engine.checks.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[tokio::test]
    async fn test_change_replaces_completed_handle() {
        let engine = Arc::new(CountingEngine::default());
        let cache = cache(engine.clone(), None);
        let doc = uri("main");
        cache.open(doc.clone(), "let x = 1", 1);

        let first = cache.analysis(&doc).unwrap();
        first.get().await.unwrap();
        assert_eq!(cache.analysis(&doc).unwrap().id(), first.id());

        cache.change(&doc, &full_change("let x = 2"), 2).unwrap();
        let second = cache.analysis(&doc).unwrap();
        assert_ne!(second.id(), first.id());
        second.get().await.unwrap();
        assert_eq!(engine.checks.load(Ordering::SeqCst), 2);
        assert_eq!(cache.version(&doc), Some(2));
    }

    #[tokio::test]
    async fn test_syntax_and_analysis_share_the_parse() {
        let engine = Arc::new(CountingEngine::default());
        let cache = cache(engine.clone(), None);
        let doc = uri("main");
        cache.open(doc.clone(), "fun f() {}", 1);

        let syntax = cache.syntax(&doc).unwrap().get().await.unwrap();
        let analysis = cache.analysis(&doc).unwrap().get().await.unwrap();
        assert!(Arc::ptr_eq(&syntax, &analysis.syntax));
        assert_eq!(engine.parses.load(Ordering::SeqCst), 1);
        assert_eq!(engine.checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_terminal_until_changed() {
        let engine = Arc::new(CountingEngine::default());
        let cache = cache(engine.clone(), None);
        let doc = uri("main");
        cache.open(doc.clone(), "let x = y", 1);

        let handle = cache.analysis(&doc).unwrap();
        assert!(matches!(
            handle.get().await,
            Err(AnalysisError::Diagnostics(_))
        ));
        assert!(handle.peek().is_some());
        assert!(cache.analysis(&doc).unwrap().get().await.is_err());
        assert_eq!(engine.checks.load(Ordering::SeqCst), 1);

        cache.change(&doc, &full_change("let y = 1\nlet x = y"), 2).unwrap();
        assert!(cache.analysis(&doc).unwrap().get().await.is_ok());
    }

    #[test]
    fn test_unknown_documents() {
        let cache = cache(Arc::new(CountingEngine::default()), None);
        let doc = uri("missing");
        assert!(matches!(
            cache.analysis(&doc),
            Err(LspError::DocumentNotFound(_))
        ));
        assert!(matches!(
            cache.change(&doc, &full_change(""), 1),
            Err(LspError::DocumentNotFound(_))
        ));
        assert!(!cache.close(&doc));
        assert!(matches!(
            cache.open_from_disk(&doc),
            Err(LspError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.orca");
        std::fs::write(&path, "let x = 1").unwrap();
        let doc = DocumentUri::from_path(&path).unwrap();

        let cache = cache(Arc::new(CountingEngine::default()), None);
        cache.open_from_disk(&doc).unwrap();
        assert_eq!(cache.text(&doc).as_deref(), Some("let x = 1"));
        assert!(cache.close(&doc));
        assert!(cache.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_library_is_built_once_per_root() {
        let library = tempfile::tempdir().unwrap();
        std::fs::write(
            library.path().join("math.orca"),
            "fun twice(n: Int) -> Int { return n * 2 }",
        )
        .unwrap();
        let root = std::fs::canonicalize(library.path()).unwrap();

        let engine = Arc::new(CountingEngine::default());
        let cache = Arc::new(cache(engine.clone(), Some(root)));
        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let doc = uri(&format!("doc{i}"));
                    cache.open(doc.clone(), "let x = twice(1)", 1);
                    cache.analysis(&doc).unwrap().get().await
                })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(engine.libraries.load(Ordering::SeqCst), 1);
        assert_eq!(engine.parses.load(Ordering::SeqCst), 4);
        assert_eq!(cache.pipeline().libraries().len(), 1);
    }

    /// Holds the build of one library root until released.
    struct GatedEngine {
        gated: PathBuf,
        release: crossbeam_channel::Receiver<()>,
    }

    impl LanguageEngine for GatedEngine {
        fn parse_library(&self, root: &Path) -> Result<Ast, LibraryError> {
            if root == self.gated {
                // A closed channel releases the build as well.
                let _ = self.release.recv();
            }
            OrcaEngine.parse_library(root)
        }

        fn parse_module(
            &self,
            base: Arc<Ast>,
            name: &str,
            files: &[SourceFile],
        ) -> Result<Ast, DiagnosticSet> {
            OrcaEngine.parse_module(base, name, files)
        }

        fn type_check(&self, ast: Arc<Ast>) -> Result<TypedProgram, DiagnosticSet> {
            OrcaEngine.type_check(ast)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_library_build_does_not_block_other_roots() {
        let slow = tempfile::tempdir().unwrap();
        let fast = tempfile::tempdir().unwrap();
        let mut docs = Vec::new();
        for dir in [&slow, &fast] {
            std::fs::write(dir.path().join(orca_parser::LIBRARY_MARKER), "").unwrap();
            let path = dir.path().join("math.orca");
            std::fs::write(&path, "fun twice(n: Int) -> Int { return n * 2 }").unwrap();
            docs.push(DocumentUri::from_path(&path).unwrap());
        }
        let slow_root = std::fs::canonicalize(slow.path()).unwrap();

        let (release, gate) = crossbeam_channel::unbounded();
        let engine = Arc::new(GatedEngine {
            gated: slow_root.clone(),
            release: gate,
        });
        let cache = DocumentCache::new(Arc::new(AnalysisPipeline::new(engine, None)));
        for doc in &docs {
            cache.open_from_disk(doc).unwrap();
        }

        let blocked = cache.analysis(&docs[0]).unwrap();
        let pending = tokio::spawn({
            let blocked = blocked.clone();
            async move { blocked.get().await }
        });

        let analysis = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            cache.analysis(&docs[1]).unwrap().get(),
        )
        .await
        .expect("the other root was blocked")
        .unwrap();
        assert!(analysis.syntax.is_library);
        assert!(blocked.peek().is_none());
        assert!(!pending.is_finished());
        assert!(cache.pipeline().libraries().peek(&slow_root).is_none());

        release.send(()).unwrap();
        pending.await.unwrap().unwrap();
        assert_eq!(cache.pipeline().libraries().len(), 2);
    }

    #[tokio::test]
    async fn test_library_failure_is_internal_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(CountingEngine::default());
        let cache = cache(engine.clone(), Some(dir.path().join("missing")));

        for name in ["a", "b"] {
            let doc = uri(name);
            cache.open(doc.clone(), "let x = 1", 1);
            assert!(matches!(
                cache.analysis(&doc).unwrap().get().await,
                Err(AnalysisError::Internal(_))
            ));
        }
        assert_eq!(engine.libraries.load(Ordering::SeqCst), 1);
    }
}
