// SPDX-License-Identifier: MIT OR Apache-2.0

//! MCP server support for iroute (stdio JSON-RPC).
//!
//! Line-delimited requests over stdin, one response line per request.
//! Lifecycle: `initialize` must be accepted before any tool call; `shutdown`
//! or EOF closes the stream.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use crate::corpus::Corpus;
use crate::errors::ValidationError;
use crate::query::{self, GetQuery, RouteRequest};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i32 = -32700;
const METHOD_NOT_FOUND: i32 = -32601;
const INVALID_PARAMS: i32 = -32602;
const INTERNAL_ERROR: i32 = -32603;
const NOT_INITIALIZED: i32 = -32002;

// Routing guidance shipped to every MCP host.
const HARNESS_INSTRUCTIONS: &str = "\
iroute MCP server (instruction routing).\n\
\n\
Call route_instructions with the user's message at the start of a task to\n\
get the instruction documents relevant to it. Use get_instructions to fetch\n\
a known document by topic/category, and search_instructions for free-text\n\
lookup across the corpus.\n\
\n\
Routing is deterministic: the same corpus and message always produce the\n\
same ranked result. This server never mutates files.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerState {
    Uninitialized,
    Initialized,
    Closed,
}

/// Stateful MCP server over an immutable corpus snapshot.
pub struct McpServer {
    corpus: Arc<Corpus>,
    capabilities: Vec<String>,
    default_limit: usize,
    state: ServerState,
}

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    _jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Tool-level failure mapped onto a stable JSON-RPC error code.
enum ToolError {
    NotFound(String),
    InvalidParams(String),
    Internal(String),
}

impl ToolError {
    fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => METHOD_NOT_FOUND,
            Self::InvalidParams(_) => INVALID_PARAMS,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::NotFound(m) | Self::InvalidParams(m) | Self::Internal(m) => m,
        }
    }
}

impl From<ValidationError> for ToolError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidParams(err.to_string())
    }
}

impl McpServer {
    pub fn new(corpus: Arc<Corpus>, capabilities: Vec<String>, default_limit: usize) -> Self {
        Self {
            corpus,
            capabilities,
            default_limit,
            state: ServerState::Uninitialized,
        }
    }

    /// Serve line-delimited JSON-RPC until EOF or `shutdown`.
    pub fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        let mut stdout = stdout.lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let req = match serde_json::from_str::<JsonRpcRequest>(&line) {
                Ok(req) => req,
                Err(err) => {
                    let resp = error_response(None, PARSE_ERROR, &format!("parse error: {err}"));
                    write_response(&mut stdout, &resp)?;
                    continue;
                }
            };

            // JSON-RPC notifications have no id; no response needed.
            if req.id.is_none() {
                continue;
            }

            let resp = self.handle_request(&req);
            write_response(&mut stdout, &resp)?;

            if self.state == ServerState::Closed {
                break;
            }
        }

        self.state = ServerState::Closed;
        Ok(())
    }

    fn handle_request(&mut self, req: &JsonRpcRequest) -> JsonRpcResponse {
        match req.method.as_str() {
            "initialize" => {
                // Idempotent: a second initialize returns the same result.
                self.state = ServerState::Initialized;
                ok_response(
                    req.id.clone(),
                    json!({
                        "protocolVersion": PROTOCOL_VERSION,
                        "capabilities": {
                            "tools": {}
                        },
                        "serverInfo": {
                            "name": "iroute",
                            "version": env!("CARGO_PKG_VERSION")
                        },
                        "instructions": HARNESS_INSTRUCTIONS
                    }),
                )
            }
            "ping" => ok_response(req.id.clone(), json!({})),
            "shutdown" => {
                self.state = ServerState::Closed;
                ok_response(req.id.clone(), json!({}))
            }
            "tools/list" => {
                if self.state != ServerState::Initialized {
                    return error_response(
                        req.id.clone(),
                        NOT_INITIALIZED,
                        "server not initialized",
                    );
                }
                ok_response(req.id.clone(), json!({ "tools": tool_definitions() }))
            }
            "tools/call" => {
                if self.state != ServerState::Initialized {
                    return error_response(
                        req.id.clone(),
                        NOT_INITIALIZED,
                        "server not initialized",
                    );
                }
                self.handle_tool_call(req)
            }
            _ => error_response(
                req.id.clone(),
                METHOD_NOT_FOUND,
                &format!("method not found: {}", req.method),
            ),
        }
    }

    fn handle_tool_call(&self, req: &JsonRpcRequest) -> JsonRpcResponse {
        let tool_name = req
            .params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let args = req.params.get("arguments").unwrap_or(&Value::Null);

        match self.dispatch_tool(tool_name, args) {
            Ok(output) => ok_response(
                req.id.clone(),
                json!({
                    "content": [{
                        "type": "text",
                        "text": output
                    }]
                }),
            ),
            Err(err) => error_response(req.id.clone(), err.code(), err.message()),
        }
    }

    fn dispatch_tool(&self, tool: &str, args: &Value) -> Result<String, ToolError> {
        match tool {
            "route_instructions" => self.tool_route(args),
            "get_instructions" => self.tool_get(args),
            "search_instructions" => self.tool_search(args),
            _ => Err(ToolError::NotFound(format!("unknown tool: {tool}"))),
        }
    }

    fn tool_route(&self, args: &Value) -> Result<String, ToolError> {
        let message = required_str(args, "message")?;
        let limit = positive_limit(args, self.default_limit)?;
        let context = match args.get("context") {
            None | Some(Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
                ValidationError::MalformedParameter {
                    name: "context",
                    message: e.to_string(),
                }
            })?),
        };

        let request = RouteRequest {
            message: message.to_string(),
            context,
            limit: Some(limit),
        };
        let result = query::route(&self.corpus, &request, &self.capabilities);
        serde_json::to_string(&result).map_err(|e| ToolError::Internal(e.to_string()))
    }

    fn tool_get(&self, args: &Value) -> Result<String, ToolError> {
        let lookup = GetQuery {
            topic: opt_str(args, "topic").map(ToOwned::to_owned),
            category: opt_str(args, "category").map(ToOwned::to_owned),
            exact_match: args
                .get("exact_match")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        };
        let hits = query::get(&self.corpus, &lookup);
        let count = hits.len();
        let output = json!({
            "instructions": hits,
            "count": count,
            "query": {
                "topic": lookup.topic,
                "category": lookup.category,
                "exact_match": lookup.exact_match
            }
        });
        serde_json::to_string(&output).map_err(|e| ToolError::Internal(e.to_string()))
    }

    fn tool_search(&self, args: &Value) -> Result<String, ToolError> {
        let search_query = required_str(args, "query")?;
        let limit = positive_limit(args, 10)?;
        let hits = query::search(&self.corpus, search_query, limit);
        let count = hits.len();
        let output = json!({
            "results": hits,
            "count": count
        });
        serde_json::to_string(&output).map_err(|e| ToolError::Internal(e.to_string()))
    }
}

fn write_response(stdout: &mut impl Write, resp: &JsonRpcResponse) -> io::Result<()> {
    serde_json::to_writer(&mut *stdout, resp)?;
    stdout.write_all(b"\n")?;
    stdout.flush()
}

fn ok_response(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: Some(result),
        error: None,
    }
}

fn error_response(id: Option<Value>, code: i32, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message: message.to_string(),
            data: None,
        }),
    }
}

fn required_str<'a>(args: &'a Value, key: &'static str) -> Result<&'a str, ValidationError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or(ValidationError::MissingParameter(key))
}

fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn positive_limit(args: &Value, default: usize) -> Result<usize, ValidationError> {
    match args.get("limit") {
        None | Some(Value::Null) => Ok(default),
        Some(value) => {
            let limit = value.as_i64().ok_or(ValidationError::MalformedParameter {
                name: "limit",
                message: "must be a positive integer".to_string(),
            })?;
            if limit <= 0 {
                return Err(ValidationError::NonPositiveLimit(limit));
            }
            Ok(limit as usize)
        }
    }
}

fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": "route_instructions",
            "description": "Route a message to the most relevant instruction documents.",
            "inputSchema": {
                "type": "object",
                "required": ["message"],
                "properties": {
                    "message": { "type": "string" },
                    "context": {
                        "type": "object",
                        "properties": {
                            "files": { "type": "array", "items": { "type": "string" } },
                            "capabilities": { "type": "array", "items": { "type": "string" } }
                        }
                    },
                    "limit": { "type": "integer", "default": 5 }
                }
            }
        }),
        json!({
            "name": "get_instructions",
            "description": "Fetch instruction documents by topic, category, or exact id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "topic": { "type": "string" },
                    "category": { "type": "string" },
                    "exact_match": { "type": "boolean", "default": false }
                }
            }
        }),
        json!({
            "name": "search_instructions",
            "description": "Free-text search across instruction metadata and content.",
            "inputSchema": {
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "default": 10 }
                }
            }
        }),
    ]
}
