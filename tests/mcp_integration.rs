//! MCP server integration tests.
//!
//! These tests spawn `forkarcade serve` as a subprocess and communicate via
//! JSON-RPC 2.0 over stdin/stdout, verifying the handshake, tool listing,
//! tool invocation and error handling.

#![cfg(feature = "mcp")]

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

/// A lightweight MCP client that talks to a `forkarcade serve` subprocess.
struct McpClient {
    child: std::process::Child,
    stdin: std::process::ChildStdin,
    reader: BufReader<std::process::ChildStdout>,
    next_id: u64,
}

impl McpClient {
    fn spawn(cwd: &Path) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_forkarcade"))
            .current_dir(cwd)
            .arg("--games-dir")
            .arg(cwd.join("games"))
            .arg("serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn forkarcade serve");

        let stdin = child.stdin.take().expect("no stdin");
        let stdout = child.stdout.take().expect("no stdout");
        let reader = BufReader::new(stdout);

        McpClient { child, stdin, reader, next_id: 1 }
    }

    fn send(&mut self, msg: &Value) {
        let line = serde_json::to_string(msg).unwrap();
        writeln!(self.stdin, "{}", line).expect("write to stdin failed");
        self.stdin.flush().expect("flush stdin failed");
    }

    /// Send a JSON-RPC request and return the parsed response.
    fn request(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        }));

        let mut buf = String::new();
        self.reader.read_line(&mut buf).expect("read from stdout failed");
        serde_json::from_str(&buf)
            .unwrap_or_else(|e| panic!("failed to parse response JSON: {}\nraw: {}", e, buf))
    }

    /// Send the initialize handshake and return the result.
    fn initialize(&mut self) -> Value {
        let resp = self.request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "0.1.0"}
            }),
        );
        self.send(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        std::thread::sleep(Duration::from_millis(50));
        resp
    }

    fn call_tool(&mut self, name: &str, args: Value) -> Value {
        self.request("tools/call", json!({"name": name, "arguments": args}))
    }

    /// Shut down by closing stdin, which causes the server to exit.
    fn shutdown(mut self) {
        drop(self.stdin);
        let _ = self.child.wait();
    }
}

fn setup() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("games/cave")).unwrap();
    temp
}

#[test]
fn test_mcp_initialize_handshake() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    let resp = client.initialize();

    let result = resp.get("result").expect("initialize should return result");
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], "forkarcade");
    assert!(result["capabilities"].get("tools").is_some());

    client.shutdown();
}

#[test]
fn test_mcp_tools_list() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    client.initialize();

    let resp = client.request("tools/list", json!({}));
    let tools = resp["result"]["tools"].as_array().expect("tools should be an array");
    assert_eq!(tools.len(), 17, "expected 17 tools, got {}", tools.len());

    let sprite = tools.iter().find(|t| t["name"] == "create_sprite").expect("create_sprite");
    let required = sprite["inputSchema"]["required"].as_array().unwrap();
    assert!(required.contains(&json!("pixels")));

    client.shutdown();
}

#[test]
fn test_mcp_sdk_docs() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    client.initialize();

    let resp = client.call_tool("get_sdk_docs", json!({}));
    let result = &resp["result"];
    assert_ne!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("ForkArcade.submitScore"));

    client.shutdown();
}

#[test]
fn test_mcp_thumbnail_returns_image() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    client.initialize();

    let resp = client.call_tool(
        "create_thumbnail",
        json!({
            "path": "games/cave",
            "w": 8, "h": 4,
            "layers": [{"ops": [{"fill": "#ff8800"}]}],
            "commit": false
        }),
    );
    let content = resp["result"]["content"].as_array().expect("content");
    assert_eq!(content.len(), 2);
    let body: Value = serde_json::from_str(content[0]["text"].as_str().unwrap()).unwrap();
    assert_eq!(body["size"], json!([8, 4]));
    assert_eq!(content[1]["type"], "image");
    assert_eq!(content[1]["mimeType"], "image/png");
    assert!(temp.path().join("games/cave/_thumbnail.png").exists());

    client.shutdown();
}

#[test]
fn test_mcp_tool_error_is_flagged() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    client.initialize();

    let resp = client.call_tool("get_versions", json!({"path": "/etc"}));
    let result = &resp["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("Path must be inside"));

    client.shutdown();
}

#[test]
fn test_mcp_error_invalid_tool_name() {
    let temp = setup();
    let mut client = McpClient::spawn(temp.path());
    client.initialize();

    let resp = client.call_tool("summon_dragon", json!({}));
    assert!(resp.get("error").is_some(), "unknown tool should be a protocol error: {}", resp);

    client.shutdown();
}
