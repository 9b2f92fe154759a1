//! Request and notification dispatch.
//!
//! The router decodes protocol parameters, asks the document cache for the
//! syntax or analysis of a document, and converts the result with the
//! handlers. Notifications mutate the cache and must be applied in arrival
//! order; requests only read it and may run concurrently.

use std::sync::Arc;

use lsp_types::notification::{
    Cancel, DidChangeTextDocument, DidChangeWorkspaceFolders, DidCloseTextDocument,
    DidOpenTextDocument, DidSaveTextDocument, Exit, Initialized, Notification,
};
use lsp_types::request::{
    DocumentDiagnosticRequest, DocumentSymbolRequest, GotoDefinition, Request,
    SemanticTokensFullRequest, Shutdown,
};
use lsp_types::{
    CancelParams, DidChangeTextDocumentParams, DidChangeWorkspaceFoldersParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentDiagnosticParams, DocumentDiagnosticReportResult, DocumentSymbolParams,
    DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse, SemanticTokensParams,
    SemanticTokensResult, TextDocumentContentChangeEvent,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::context::ServerContext;
use crate::error::{AnalysisError, LspError};
use crate::handlers::definition::handle_goto_definition;
use crate::handlers::diagnostics::{diagnostics_for, full_report};
use crate::handlers::semantic_tokens::handle_semantic_tokens;
use crate::handlers::symbols::handle_document_symbols;
use crate::uri::DocumentUri;

/// Whether the server keeps running after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading messages.
    Continue,
    /// The client sent `exit`.
    Exit,
}

/// Dispatches protocol messages to the document cache and the handlers.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    ctx: Arc<ServerContext>,
}

impl RequestRouter {
    /// Create a router over `ctx`.
    pub const fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// The shared server state.
    pub const fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Answer a request.
    pub async fn handle_request(&self, req: lsp_server::Request) -> lsp_server::Response {
        let id = req.id.clone();
        let method = req.method.clone();

        match self.dispatch(req).await {
            Ok(value) => lsp_server::Response::new_ok(id, value),
            Err(e) => {
                if matches!(e, LspError::Internal(_)) {
                    error!("Request {} failed: {}", method, e);
                } else {
                    debug!("Request {} failed: {}", method, e);
                }
                lsp_server::Response::new_err(id, e.code() as i32, e.to_string())
            }
        }
    }

    async fn dispatch(&self, req: lsp_server::Request) -> Result<Value, LspError> {
        if self.ctx.is_shutting_down() {
            return Err(LspError::ShuttingDown);
        }

        match req.method.as_str() {
            Shutdown::METHOD => {
                info!("Shutdown requested");
                self.ctx.request_shutdown();
                Ok(Value::Null)
            }
            GotoDefinition::METHOD => to_json(self.goto_definition(params(req.params)?).await?),
            DocumentSymbolRequest::METHOD => {
                to_json(self.document_symbols(params(req.params)?).await?)
            }
            SemanticTokensFullRequest::METHOD => {
                to_json(self.semantic_tokens(params(req.params)?).await?)
            }
            DocumentDiagnosticRequest::METHOD => to_json(self.diagnostic(params(req.params)?).await?),
            _ => {
                warn!("Unhandled request: {}", req.method);
                Err(LspError::MethodNotFound(req.method.clone()))
            }
        }
    }

    /// Handle the textDocument/definition request.
    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>, LspError> {
        let position = params.text_document_position_params;
        let uri = DocumentUri::from_lsp(&position.text_document.uri)?;
        match self.ctx.analysis(&uri)?.get().await {
            Ok(analysis) => Ok(handle_goto_definition(
                &analysis.program,
                uri.as_str(),
                position.position,
            )),
            Err(e) => unavailable(&uri, e),
        }
    }

    /// Handle the textDocument/documentSymbol request.
    async fn document_symbols(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>, LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        match self.ctx.syntax(&uri)?.get().await {
            Ok(syntax) => Ok(handle_document_symbols(&syntax.ast, uri.as_str())),
            Err(e) => unavailable(&uri, e),
        }
    }

    /// Handle the textDocument/semanticTokens/full request.
    async fn semantic_tokens(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>, LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        match self.ctx.syntax(&uri)?.get().await {
            Ok(syntax) => Ok(handle_semantic_tokens(&syntax.ast, uri.as_str())),
            Err(e) => unavailable(&uri, e),
        }
    }

    /// Handle the textDocument/diagnostic request.
    async fn diagnostic(
        &self,
        params: DocumentDiagnosticParams,
    ) -> Result<DocumentDiagnosticReportResult, LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        let items = match self.ctx.analysis(&uri)?.get().await {
            Ok(_) => Vec::new(),
            Err(AnalysisError::Diagnostics(set)) => diagnostics_for(&set, uri.as_str()),
            Err(AnalysisError::Internal(e)) => return Err(LspError::Internal(e)),
        };
        debug!("Reporting {} diagnostics for {}", items.len(), uri);
        Ok(full_report(items))
    }

    /// Apply a notification.
    ///
    /// Failures are logged; a notification has no response to carry them.
    pub fn handle_notification(&self, notif: lsp_server::Notification) -> Flow {
        let method = notif.method.clone();
        let result = match notif.method.as_str() {
            DidOpenTextDocument::METHOD => params(notif.params).and_then(|p| self.on_did_open(p)),
            DidChangeTextDocument::METHOD => params(notif.params).and_then(|p| self.on_did_change(p)),
            DidCloseTextDocument::METHOD => params(notif.params).and_then(|p| self.on_did_close(p)),
            DidSaveTextDocument::METHOD => params(notif.params).and_then(|p| self.on_did_save(p)),
            DidChangeWorkspaceFolders::METHOD => {
                params(notif.params).map(|p: DidChangeWorkspaceFoldersParams| {
                    self.ctx
                        .update_workspace_folders(p.event.added, &p.event.removed);
                })
            }
            Cancel::METHOD => params(notif.params).map(|p: CancelParams| {
                debug!("Ignoring cancellation of request {:?}", p.id);
            }),
            Initialized::METHOD => {
                info!("Client initialized");
                Ok(())
            }
            Exit::METHOD => {
                if !self.ctx.is_shutting_down() {
                    warn!("Exit notification received before shutdown");
                }
                info!("Exit notification received");
                return Flow::Exit;
            }
            _ => {
                debug!("Unhandled notification: {}", method);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Failed to handle {}: {}", method, e);
        }
        Flow::Continue
    }

    /// Handle textDocument/didOpen notification.
    fn on_did_open(&self, params: DidOpenTextDocumentParams) -> Result<(), LspError> {
        let document = params.text_document;
        let uri = DocumentUri::from_lsp(&document.uri)?;
        info!("Document opened: {}", uri);
        self.ctx
            .documents()
            .open(uri, &document.text, document.version);
        Ok(())
    }

    /// Handle textDocument/didChange notification.
    ///
    /// A change to a document that was never opened registers it from disk
    /// first.
    fn on_did_change(&self, params: DidChangeTextDocumentParams) -> Result<(), LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        let version = params.text_document.version;
        let documents = self.ctx.documents();
        match documents.change(&uri, &params.content_changes, version) {
            Err(LspError::DocumentNotFound(_)) => {
                warn!("Change to unopened document {}", uri);
                documents.open_from_disk(&uri)?;
                documents.change(&uri, &params.content_changes, version)
            }
            result => result,
        }
    }

    /// Handle textDocument/didClose notification.
    fn on_did_close(&self, params: DidCloseTextDocumentParams) -> Result<(), LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        if self.ctx.documents().close(&uri) {
            info!("Document closed: {}", uri);
        } else {
            debug!("Closed unopened document {}", uri);
        }
        Ok(())
    }

    /// Handle textDocument/didSave notification.
    ///
    /// Saved text, when the client includes it, replaces the document.
    fn on_did_save(&self, params: DidSaveTextDocumentParams) -> Result<(), LspError> {
        let uri = DocumentUri::from_lsp(&params.text_document.uri)?;
        let Some(text) = params.text else {
            debug!("Document saved: {}", uri);
            return Ok(());
        };
        let documents = self.ctx.documents();
        let version = documents.version(&uri).unwrap_or_default();
        let change = TextDocumentContentChangeEvent {
            range: None,
            range_length: None,
            text,
        };
        match documents.change(&uri, std::slice::from_ref(&change), version) {
            Err(LspError::DocumentNotFound(_)) => {
                documents.open(uri, &change.text, version);
                Ok(())
            }
            result => result,
        }
    }
}

fn params<P: DeserializeOwned>(params: Value) -> Result<P, LspError> {
    Ok(serde_json::from_value(params)?)
}

fn to_json(value: impl Serialize) -> Result<Value, LspError> {
    serde_json::to_value(value).map_err(|e| LspError::Internal(e.to_string()))
}

/// The answer to a query on a document that could not be analyzed.
///
/// Compile errors leave the query without a result; anything else fails it.
fn unavailable<T>(uri: &DocumentUri, e: AnalysisError) -> Result<Option<T>, LspError> {
    match e {
        AnalysisError::Diagnostics(set) => {
            debug!("{} has {} diagnostics", uri, set.len());
            Ok(None)
        }
        AnalysisError::Internal(e) => Err(LspError::Internal(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::pipeline::OrcaEngine;
    use lsp_server::{ErrorCode, RequestId};
    use serde_json::json;

    const URI: &str = "file:///main.orca";

    fn router(config: ServerConfig) -> RequestRouter {
        RequestRouter::new(Arc::new(ServerContext::new(config, Arc::new(OrcaEngine))))
    }

    fn request(method: &str, params: Value) -> lsp_server::Request {
        lsp_server::Request::new(RequestId::from(1), method.to_string(), params)
    }

    fn notify(router: &RequestRouter, method: &str, params: Value) -> Flow {
        router.handle_notification(lsp_server::Notification::new(method.to_string(), params))
    }

    fn open(router: &RequestRouter, uri: &str, text: &str) {
        notify(
            router,
            DidOpenTextDocument::METHOD,
            json!({
                "textDocument": { "uri": uri, "languageId": "orca", "version": 1, "text": text }
            }),
        );
    }

    fn document(uri: &str) -> Value {
        json!({ "textDocument": { "uri": uri } })
    }

    async fn symbols(router: &RequestRouter, uri: &str) -> lsp_server::Response {
        router
            .handle_request(request(DocumentSymbolRequest::METHOD, document(uri)))
            .await
    }

    fn error_code(response: &lsp_server::Response) -> Option<i32> {
        response.error.as_ref().map(|e| e.code)
    }

    #[tokio::test]
    async fn test_open_then_symbols() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1");
        let response = symbols(&router, URI).await;
        let result = response.result.unwrap();
        assert_eq!(result[0]["name"], "x");
        assert_eq!(result.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_change_replaces_text() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1");
        notify(
            &router,
            DidChangeTextDocument::METHOD,
            json!({
                "textDocument": { "uri": URI, "version": 2 },
                "contentChanges": [{ "text": "let y = 2\nlet z = y" }]
            }),
        );
        let result = symbols(&router, URI).await.result.unwrap();
        let names: Vec<_> = result
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["y", "z"]);
    }

    #[tokio::test]
    async fn test_change_to_unopened_document_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.orca");
        std::fs::write(&path, "let x = 1").unwrap();
        let uri = DocumentUri::from_path(&path).unwrap();

        let router = router(ServerConfig::default());
        notify(
            &router,
            DidChangeTextDocument::METHOD,
            json!({
                "textDocument": { "uri": uri.as_str(), "version": 3 },
                "contentChanges": [{
                    "range": { "start": { "line": 0, "character": 4 }, "end": { "line": 0, "character": 5 } },
                    "text": "renamed"
                }]
            }),
        );
        let documents = router.context().documents();
        assert_eq!(documents.text(&uri).as_deref(), Some("let renamed = 1"));
        assert_eq!(documents.version(&uri), Some(3));
    }

    #[tokio::test]
    async fn test_save_with_text_replaces_document() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1");
        notify(
            &router,
            DidSaveTextDocument::METHOD,
            json!({ "textDocument": { "uri": URI }, "text": "let saved = 1" }),
        );
        let result = symbols(&router, URI).await.result.unwrap();
        assert_eq!(result[0]["name"], "saved");
    }

    #[tokio::test]
    async fn test_close_forgets_document() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1");
        notify(&router, DidCloseTextDocument::METHOD, document(URI));
        assert!(router.context().documents().is_empty());

        // Reading the missing file fails the implicit open.
        let response = symbols(&router, URI).await;
        assert_eq!(error_code(&response), Some(ErrorCode::InvalidParams as i32));
    }

    #[tokio::test]
    async fn test_diagnostics_of_broken_document() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1\nlet y = missing");
        let response = router
            .handle_request(request(DocumentDiagnosticRequest::METHOD, document(URI)))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["kind"], "full");
        let items = result["items"].as_array().unwrap();
        assert!(!items.is_empty());
        assert_eq!(items[0]["severity"], 1);
        assert_eq!(items[0]["code"], "E1001");

        open(&router, "file:///ok.orca", "let x = 1");
        let response = router
            .handle_request(request(
                DocumentDiagnosticRequest::METHOD,
                document("file:///ok.orca"),
            ))
            .await;
        assert_eq!(response.result.unwrap()["items"], json!([]));
    }

    #[tokio::test]
    async fn test_library_failure_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            library_path: Some(dir.path().join("missing")),
            ..ServerConfig::default()
        };
        let router = router(config);
        open(&router, URI, "let x = 1");
        let response = router
            .handle_request(request(DocumentDiagnosticRequest::METHOD, document(URI)))
            .await;
        assert_eq!(error_code(&response), Some(ErrorCode::InternalError as i32));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let router = router(ServerConfig::default());
        let response = router
            .handle_request(request("textDocument/hover", json!({})))
            .await;
        assert_eq!(error_code(&response), Some(ErrorCode::MethodNotFound as i32));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let router = router(ServerConfig::default());
        let response = router
            .handle_request(request(GotoDefinition::METHOD, json!({ "bogus": true })))
            .await;
        assert_eq!(error_code(&response), Some(ErrorCode::InvalidParams as i32));
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_are_rejected() {
        let router = router(ServerConfig::default());
        open(&router, URI, "let x = 1");
        let response = router
            .handle_request(request(Shutdown::METHOD, Value::Null))
            .await;
        assert_eq!(response.result, Some(Value::Null));

        let response = symbols(&router, URI).await;
        assert_eq!(error_code(&response), Some(ErrorCode::InvalidRequest as i32));
        assert_eq!(notify(&router, Exit::METHOD, Value::Null), Flow::Exit);
    }

    #[test]
    fn test_notifications_keep_running() {
        let router = router(ServerConfig::default());
        assert_eq!(notify(&router, Initialized::METHOD, json!({})), Flow::Continue);
        assert_eq!(
            notify(&router, Cancel::METHOD, json!({ "id": 7 })),
            Flow::Continue
        );
        assert_eq!(
            notify(&router, "$/unknown", json!({})),
            Flow::Continue
        );
        // Malformed parameters are logged, not fatal.
        assert_eq!(
            notify(&router, DidOpenTextDocument::METHOD, json!({})),
            Flow::Continue
        );
    }
}
