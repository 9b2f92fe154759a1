//! Main LSP server implementation.

use std::sync::Arc;

use lsp_server::Connection;
use lsp_types::{
    DiagnosticOptions, DiagnosticServerCapabilities, InitializeParams, InitializeResult, OneOf,
    SaveOptions, ServerCapabilities, ServerInfo, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, WorkspaceFoldersServerCapabilities,
    WorkspaceServerCapabilities,
};

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::handlers::diagnostics::SOURCE;
use crate::handlers::semantic_tokens::get_capabilities as get_semantic_tokens_capabilities;
use crate::main_loop::run_main_loop;
use crate::pipeline::{LanguageEngine, OrcaEngine};
use crate::router::RequestRouter;

/// The name the server reports to clients.
pub const SERVER_NAME: &str = "orca-lsp";

/// Error type of the server entry points.
pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Called with the `logLevel` initialization option.
pub type LogLevelHook = Box<dyn Fn(&str) + Send + Sync>;

/// The LSP server.
pub struct Server {
    /// Connection to the LSP client.
    connection: Connection,
    /// The language the server analyzes.
    engine: Arc<dyn LanguageEngine>,
    /// Applies the client's log level.
    log_level_hook: Option<LogLevelHook>,
}

impl Server {
    /// Create a server for the orca language on a connection.
    pub fn new(connection: Connection) -> Self {
        Self::with_engine(connection, Arc::new(OrcaEngine))
    }

    /// Create a server analyzing documents with `engine`.
    pub fn with_engine(connection: Connection, engine: Arc<dyn LanguageEngine>) -> Self {
        Self {
            connection,
            engine,
            log_level_hook: None,
        }
    }

    /// Apply the client's `logLevel` option with `hook`.
    pub fn on_log_level(mut self, hook: LogLevelHook) -> Self {
        self.log_level_hook = Some(hook);
        self
    }

    /// Complete the initialize handshake and run until the client exits.
    pub fn run(self) -> Result<(), ServerError> {
        let (id, params) = self.connection.initialize_start()?;
        let init_params: InitializeParams = serde_json::from_value(params)?;

        let config =
            ServerConfig::from_initialization_options(init_params.initialization_options.as_ref());
        if let (Some(hook), Some(level)) = (&self.log_level_hook, &config.log_level) {
            hook(level);
        }
        if let Some(root) = config.default_library_root() {
            tracing::info!("Default library: {}", root.display());
        }

        let ctx = Arc::new(ServerContext::new(config, self.engine));
        if let Some(folders) = init_params.workspace_folders {
            ctx.set_workspace_folders(folders);
        }

        self.connection
            .initialize_finish(id, serde_json::to_value(initialize_result())?)?;
        tracing::info!("LSP initialized successfully");

        let Connection { sender, receiver } = self.connection;
        run_main_loop(RequestRouter::new(ctx), receiver, sender)?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// The answer to `initialize`: what the server supports.
pub fn initialize_result() -> InitializeResult {
    let capabilities = ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::FULL),
                save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                    include_text: Some(true),
                })),
                ..Default::default()
            },
        )),
        definition_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        semantic_tokens_provider: Some(get_semantic_tokens_capabilities()),
        diagnostic_provider: Some(DiagnosticServerCapabilities::Options(DiagnosticOptions {
            identifier: Some(SOURCE.to_string()),
            inter_file_dependencies: true,
            workspace_diagnostics: false,
            work_done_progress_options: Default::default(),
        })),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..Default::default()
    };

    InitializeResult {
        capabilities,
        server_info: Some(ServerInfo {
            name: SERVER_NAME.to_string(),
            version: Some(crate::VERSION.to_string()),
        }),
    }
}

/// Start the LSP server using stdio transport.
pub fn start_stdio(log_level_hook: Option<LogLevelHook>) -> Result<(), ServerError> {
    tracing::info!("Starting LSP server on stdio");

    let (connection, io_threads) = Connection::stdio();

    let mut server = Server::new(connection);
    if let Some(hook) = log_level_hook {
        server = server.on_log_level(hook);
    }
    server.run()?;

    io_threads.join()?;
    Ok(())
}
