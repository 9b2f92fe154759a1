//! State shared by every part of the server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lsp_types::WorkspaceFolder;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cache::{AnalysisHandle, DocumentCache, SyntaxHandle};
use crate::config::ServerConfig;
use crate::error::LspError;
use crate::pipeline::{AnalysisPipeline, LanguageEngine};
use crate::uri::DocumentUri;

/// The server's configuration and caches.
///
/// Created once after `initialize` and shared by the router and the main loop.
#[derive(Debug)]
pub struct ServerContext {
    config: ServerConfig,
    documents: DocumentCache,
    workspace_folders: RwLock<Vec<WorkspaceFolder>>,
    shutdown: AtomicBool,
}

impl ServerContext {
    /// Create the context of a server analyzing documents with `engine`.
    pub fn new(config: ServerConfig, engine: Arc<dyn LanguageEngine>) -> Self {
        let pipeline = AnalysisPipeline::new(engine, config.default_library_root());
        Self {
            config,
            documents: DocumentCache::new(Arc::new(pipeline)),
            workspace_folders: RwLock::new(Vec::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// The server configuration.
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The open documents.
    pub const fn documents(&self) -> &DocumentCache {
        &self.documents
    }

    /// The parse handle of a document, opening it from disk if needed.
    pub fn syntax(&self, uri: &DocumentUri) -> Result<SyntaxHandle, LspError> {
        match self.documents.syntax(uri) {
            Err(LspError::DocumentNotFound(_)) => {
                self.documents.open_from_disk(uri)?;
                self.documents.syntax(uri)
            }
            result => result,
        }
    }

    /// The analysis handle of a document, opening it from disk if needed.
    pub fn analysis(&self, uri: &DocumentUri) -> Result<AnalysisHandle, LspError> {
        match self.documents.analysis(uri) {
            Err(LspError::DocumentNotFound(_)) => {
                self.documents.open_from_disk(uri)?;
                self.documents.analysis(uri)
            }
            result => result,
        }
    }

    /// Replace the workspace folders.
    pub fn set_workspace_folders(&self, folders: Vec<WorkspaceFolder>) {
        for folder in &folders {
            info!("Workspace folder: {}", folder.uri.as_str());
        }
        *self.workspace_folders.write() = folders;
    }

    /// Add and remove workspace folders.
    pub fn update_workspace_folders(
        &self,
        added: Vec<WorkspaceFolder>,
        removed: &[WorkspaceFolder],
    ) {
        let mut folders = self.workspace_folders.write();
        folders.retain(|f| !removed.iter().any(|r| r.uri == f.uri));
        for folder in added {
            if !folders.iter().any(|f| f.uri == folder.uri) {
                info!("Added workspace folder: {}", folder.uri.as_str());
                folders.push(folder);
            }
        }
        debug!("{} workspace folders", folders.len());
    }

    /// The current workspace folders.
    pub fn workspace_folders(&self) -> Vec<WorkspaceFolder> {
        self.workspace_folders.read().clone()
    }

    /// Record that the client asked the server to shut down.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Whether `shutdown` was received.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
