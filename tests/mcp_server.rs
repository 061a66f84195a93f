// SPDX-License-Identifier: MIT OR Apache-2.0

use serde_json::{json, Value};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Stdio};
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound on waiting for one response line. Routing is CPU-bound and
/// fast; hitting this means the server hung, which is a different failure
/// from a protocol error.
const READ_TIMEOUT: Duration = Duration::from_secs(10);

fn write_file(path: &std::path::Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

fn seed_corpus(root: &std::path::Path) {
    write_file(
        &root.join(".iroute/instructions/learning/learning_loop.instructions.md"),
        r#"+++
title = "Learning loop protocol"
priority = "P1"
keywords = ["learning_loop", "retrospective"]
includes = ["work_logging"]
description = "Run a learning loop after completing work"
+++
Conduct a retrospective and record lessons learned.
"#,
    );
    write_file(
        &root.join(".iroute/instructions/learning/work_logging.instructions.md"),
        r#"+++
title = "Work logging"
priority = "P2"
keywords = ["work_log"]
+++
Log what you worked on.
"#,
    );
    write_file(
        &root.join(".iroute/instructions/core/core_rules.instructions.md"),
        r#"+++
title = "Core rules"
priority = "P0"
always_include = true
+++
Always applicable rules.
"#,
    );
}

struct McpProc {
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::Receiver<String>,
}

impl McpProc {
    fn spawn(cwd: &std::path::Path) -> Self {
        let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin!("iroute"))
            .current_dir(cwd)
            .args(["mcp", "serve"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("spawn mcp");
        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in stdout.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        Self {
            child,
            stdin,
            lines: rx,
        }
    }

    /// Next response line, or None on EOF. Panics on timeout.
    fn next_line(&mut self) -> Option<String> {
        match self.lines.recv_timeout(READ_TIMEOUT) {
            Ok(line) => Some(line),
            Err(mpsc::RecvTimeoutError::Disconnected) => None,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                panic!("timed out waiting for server response")
            }
        }
    }

    fn call(&mut self, req: Value) -> Value {
        let line = serde_json::to_string(&req).expect("encode");
        writeln!(self.stdin, "{}", line).expect("write req");
        self.stdin.flush().expect("flush");

        let resp_line = self.next_line().expect("server closed the stream");
        serde_json::from_str(&resp_line).expect("parse resp")
    }

    fn initialize(&mut self) -> Value {
        self.call(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {}
        }))
    }

    fn stop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn tool_call(id: u64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments }
    })
}

fn tool_text(resp: &Value) -> Value {
    let text = resp["result"]["content"][0]["text"]
        .as_str()
        .expect("text content block");
    serde_json::from_str(text).expect("tool output json")
}

#[test]
fn initialize_and_list_tools() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());

    let init = mcp.initialize();
    assert_eq!(init["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["result"]["serverInfo"]["name"], "iroute");

    let tools = mcp.call(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {}
    }));
    let names: Vec<String> = tools["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|t| t.get("name").and_then(Value::as_str))
        .map(ToOwned::to_owned)
        .collect();
    assert_eq!(
        names,
        vec!["route_instructions", "get_instructions", "search_instructions"]
    );

    mcp.stop();
}

#[test]
fn tool_calls_rejected_before_initialize() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());

    let resp = mcp.call(tool_call(1, "route_instructions", json!({ "message": "x" })));
    assert_eq!(resp["error"]["code"], -32002);

    let list = mcp.call(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "tools/list",
        "params": {}
    }));
    assert_eq!(list["error"]["code"], -32002);

    mcp.stop();
}

#[test]
fn route_tool_ranks_and_injects() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());
    mcp.initialize();

    let resp = mcp.call(tool_call(
        2,
        "route_instructions",
        json!({ "message": "how do I conduct a learning loop?" }),
    ));
    let output = tool_text(&resp);
    let docs = output["documents"].as_array().expect("documents");
    let ids: Vec<&str> = docs.iter().map(|d| d["id"].as_str().unwrap()).collect();

    assert!(ids.contains(&"learning_loop"));
    assert!(ids.contains(&"core_rules"));
    // include expansion pulled in the referenced document
    let work_logging = docs
        .iter()
        .find(|d| d["id"] == "work_logging")
        .expect("included doc");
    assert_eq!(work_logging["included_by"], "learning_loop");

    // the phrase keyword is reported as matched-term evidence
    let loop_doc = docs.iter().find(|d| d["id"] == "learning_loop").unwrap();
    assert!(loop_doc["matched_terms"]
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t == "learning_loop"));

    mcp.stop();
}

#[test]
fn slash_command_routes_like_natural_language() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());
    mcp.initialize();

    let natural = tool_text(&mcp.call(tool_call(
        2,
        "route_instructions",
        json!({ "message": "conduct a learning loop" }),
    )));
    let slash = tool_text(&mcp.call(tool_call(
        3,
        "route_instructions",
        json!({ "message": "/learning_loop" }),
    )));

    // compare the top keyword-scored document, skipping the injected one
    let top_scored = |v: &Value| {
        v["documents"]
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["bonus_score"].as_u64() == Some(0))
            .cloned()
            .expect("scored document")
    };
    let natural_top = top_scored(&natural);
    let slash_top = top_scored(&slash);
    assert_eq!(natural_top["id"], "learning_loop");
    assert_eq!(slash_top["id"], "learning_loop");
    assert_eq!(natural_top["score"], slash_top["score"]);

    mcp.stop();
}

#[test]
fn validation_and_unknown_tool_errors() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());
    mcp.initialize();

    let missing = mcp.call(tool_call(2, "route_instructions", json!({})));
    assert_eq!(missing["error"]["code"], -32602);

    let bad_limit = mcp.call(tool_call(
        3,
        "route_instructions",
        json!({ "message": "x", "limit": -1 }),
    ));
    assert_eq!(bad_limit["error"]["code"], -32602);

    let unknown = mcp.call(tool_call(4, "bogus_tool", json!({})));
    assert_eq!(unknown["error"]["code"], -32601);

    let bad_method = mcp.call(json!({
        "jsonrpc": "2.0",
        "id": 5,
        "method": "no/such/method",
        "params": {}
    }));
    assert_eq!(bad_method["error"]["code"], -32601);

    mcp.stop();
}

#[test]
fn parse_error_keeps_stream_alive() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());

    writeln!(mcp.stdin, "this is not json").expect("write garbage");
    mcp.stdin.flush().expect("flush");
    let line = mcp.next_line().expect("parse error response");
    let resp: Value = serde_json::from_str(&line).expect("parse");
    assert_eq!(resp["error"]["code"], -32700);

    // the stream still serves requests afterwards
    let init = mcp.initialize();
    assert!(init["result"]["protocolVersion"].is_string());

    mcp.stop();
}

#[test]
fn shutdown_closes_the_stream() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());
    mcp.initialize();

    let resp = mcp.call(json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "shutdown",
        "params": {}
    }));
    assert!(resp["error"].is_null());

    // stdout reaches EOF once the server closes
    assert!(mcp.next_line().is_none());

    let status = mcp.child.wait().expect("wait");
    assert!(status.success());
}

#[test]
fn empty_message_returns_always_include_only() {
    let dir = TempDir::new().expect("tempdir");
    seed_corpus(dir.path());
    let mut mcp = McpProc::spawn(dir.path());
    mcp.initialize();

    let output = tool_text(&mcp.call(tool_call(
        2,
        "route_instructions",
        json!({ "message": "" }),
    )));
    let ids: Vec<&str> = output["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["core_rules"]);

    mcp.stop();
}
