//! End-to-end tests driving the server through an in-memory connection.

use std::thread::JoinHandle;
use std::time::Duration;

use lsp_server::{Connection, Message, RequestId, Response};
use orca_lsp::{DocumentUri, Server};
use serde_json::{json, Value};

const TIMEOUT: Duration = Duration::from_secs(30);

/// A client connected to a server running on another thread.
struct Client {
    connection: Connection,
    server: JoinHandle<Result<(), String>>,
    next_id: i32,
}

impl Client {
    /// Start a server and complete the initialize handshake.
    fn start(options: Value) -> Self {
        let (server, connection) = Connection::memory();
        let handle = std::thread::spawn(move || Server::new(server).run().map_err(|e| e.to_string()));
        let mut client = Self {
            connection,
            server: handle,
            next_id: 0,
        };

        let result = client.request(
            "initialize",
            json!({ "processId": null, "capabilities": {}, "initializationOptions": options }),
        );
        assert!(result.error.is_none());
        client.notify("initialized", json!({}));
        client
    }

    fn notify(&self, method: &str, params: Value) {
        let notif = lsp_server::Notification::new(method.to_string(), params);
        self.connection
            .sender
            .send(Message::Notification(notif))
            .unwrap();
    }

    fn request(&mut self, method: &str, params: Value) -> Response {
        self.next_id += 1;
        let id = RequestId::from(self.next_id);
        let req = lsp_server::Request::new(id.clone(), method.to_string(), params);
        self.connection.sender.send(Message::Request(req)).unwrap();
        loop {
            match self.connection.receiver.recv_timeout(TIMEOUT).unwrap() {
                Message::Response(response) if response.id == id => return response,
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    fn result(&mut self, method: &str, params: Value) -> Value {
        let response = self.request(method, params);
        assert!(response.error.is_none(), "{method} failed: {:?}", response.error);
        response.result.unwrap_or(Value::Null)
    }

    fn open(&self, uri: &str, text: &str) {
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": uri, "languageId": "orca", "version": 1, "text": text }
            }),
        );
    }

    fn close(&self, uri: &str) {
        self.notify("textDocument/didClose", json!({ "textDocument": { "uri": uri } }));
    }

    fn symbols(&mut self, uri: &str) -> Value {
        self.result(
            "textDocument/documentSymbol",
            json!({ "textDocument": { "uri": uri } }),
        )
    }

    fn tokens(&mut self, uri: &str) -> Value {
        self.result(
            "textDocument/semanticTokens/full",
            json!({ "textDocument": { "uri": uri } }),
        )
    }

    fn diagnostics(&mut self, uri: &str) -> Value {
        self.result(
            "textDocument/diagnostic",
            json!({ "textDocument": { "uri": uri } }),
        )
    }

    fn definition(&mut self, uri: &str, line: u32, character: u32) -> Value {
        self.result(
            "textDocument/definition",
            json!({
                "textDocument": { "uri": uri },
                "position": { "line": line, "character": character }
            }),
        )
    }

    fn shutdown(mut self) {
        assert_eq!(self.result("shutdown", Value::Null), Value::Null);
        self.notify("exit", Value::Null);
        self.server.join().unwrap().unwrap();
    }
}

const URI: &str = "file:///main.orca";

#[test]
fn test_single_binding_outline() {
    let mut client = Client::start(Value::Null);
    client.open(URI, "let x = 1");

    let symbols = client.symbols(URI);
    let symbols = symbols.as_array().unwrap();
    assert_eq!(symbols.len(), 1);
    let x = &symbols[0];
    assert_eq!(x["name"], "x");
    assert_eq!(x["kind"], 13); // SymbolKind::VARIABLE
    assert_eq!(
        x["range"],
        json!({ "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 9 } })
    );
    assert_eq!(
        x["selectionRange"],
        json!({ "start": { "line": 0, "character": 4 }, "end": { "line": 0, "character": 5 } })
    );

    client.shutdown();
}

#[test]
fn test_undefined_name() {
    let mut client = Client::start(Value::Null);
    client.open(URI, "let x = 1\nlet y = missing");

    let report = client.diagnostics(URI);
    assert_eq!(report["kind"], "full");
    let items = report["items"].as_array().unwrap();
    let error = items
        .iter()
        .find(|d| d["severity"] == 1)
        .expect("an error diagnostic");
    let range = &error["range"];
    assert_eq!(range["start"], json!({ "line": 1, "character": 8 }));
    assert_eq!(range["end"], json!({ "line": 1, "character": 15 }));
    assert_eq!(error["source"], "orca");

    // Not an error, just no location.
    assert_eq!(client.definition(URI, 1, 10), Value::Null);

    client.shutdown();
}

#[test]
fn test_reopen_gives_equal_results() {
    let text = "type Point { let x: Int; let y: Int }
fun norm(p: Point) -> Int { return p.x * p.x + p.y * p.y }
let origin = Point(x: 0, y: 0)";
    let mut client = Client::start(Value::Null);

    client.open(URI, text);
    let symbols = client.symbols(URI);
    let tokens = client.tokens(URI);
    assert!(!tokens["data"].as_array().unwrap().is_empty());

    client.close(URI);
    client.open(URI, text);
    assert_eq!(client.symbols(URI), symbols);
    assert_eq!(client.tokens(URI), tokens);

    client.shutdown();
}

#[test]
fn test_definition_within_document() {
    let mut client = Client::start(Value::Null);
    client.open(URI, "fun double(n: Int) -> Int { return n * 2 }\nlet x = double(21)");

    let location = client.definition(URI, 1, 9);
    assert_eq!(location["uri"], URI);
    assert_eq!(location["range"]["start"], json!({ "line": 0, "character": 4 }));

    let location = client.definition(URI, 0, 35);
    assert_eq!(location["range"]["start"], json!({ "line": 0, "character": 11 }));

    client.shutdown();
}

#[test]
fn test_definition_in_library() {
    let dir = tempfile::tempdir().unwrap();
    let library = dir.path().join("lib");
    std::fs::create_dir(&library).unwrap();
    std::fs::write(library.join("orca-library.toml"), "").unwrap();
    std::fs::write(
        library.join("math.orca"),
        "fun double(n: Int) -> Int { return n * 2 }",
    )
    .unwrap();
    let main = dir.path().join("main.orca");
    std::fs::write(&main, "let x = double(21)").unwrap();

    let main_uri = DocumentUri::from_path(&main).unwrap();
    let library_uri = DocumentUri::from_path(&library.join("math.orca")).unwrap();

    let mut client = Client::start(json!({ "libraryPath": library }));
    client.open(main_uri.as_str(), "let x = double(21)");

    let report = client.diagnostics(main_uri.as_str());
    assert_eq!(report["items"], json!([]));

    let location = client.definition(main_uri.as_str(), 0, 9);
    assert_eq!(location["uri"], library_uri.as_str());
    assert_eq!(location["range"]["start"], json!({ "line": 0, "character": 4 }));

    // A library document is analyzed as the library itself.
    client.open(library_uri.as_str(), "this text is ignored");
    let symbols = client.symbols(library_uri.as_str());
    assert_eq!(symbols[0]["name"], "double");

    client.shutdown();
}

#[test]
fn test_edits_are_visible_to_later_requests() {
    let mut client = Client::start(Value::Null);
    client.open(URI, "let a = 1");
    for (version, name) in ["b", "c", "d"].iter().enumerate() {
        client.notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": URI, "version": version + 2 },
                "contentChanges": [{ "text": format!("let {name} = 1") }]
            }),
        );
        assert_eq!(client.symbols(URI)[0]["name"], *name);
    }
    client.shutdown();
}

#[test]
fn test_requests_after_shutdown_fail() {
    let mut client = Client::start(Value::Null);
    client.open(URI, "let x = 1");
    assert_eq!(client.result("shutdown", Value::Null), Value::Null);

    let response = client.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": URI } }),
    );
    assert_eq!(
        response.error.map(|e| e.code),
        Some(lsp_server::ErrorCode::InvalidRequest as i32)
    );

    client.notify("exit", Value::Null);
    client.server.join().unwrap().unwrap();
}
