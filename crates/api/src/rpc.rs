//! Line-delimited JSON-RPC 2.0 over a byte stream (MCP stdio framing).
//!
//! Requests are handled one at a time in arrival order. Notifications get no
//! reply. EOF on the reader ends the loop.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as Json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::{catalogue, ToolServer};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "kmeta-agent-tools";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Json>,
    method: String,
    #[serde(default)]
    params: Json,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Json,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn ok(id: Json, result: Json) -> Self { Self { jsonrpc: "2.0", id, result: Some(result), error: None } }

    fn err(id: Json, code: i64, message: impl Into<String>) -> Self {
        Self { jsonrpc: "2.0", id, result: None, error: Some(RpcError { code, message: message.into() }) }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Json>>,
}

/// Serve requests from `reader`, writing one response line per request to `writer`.
///
/// Only I/O failures end the loop early; undecodable lines get a parse error.
pub async fn serve<R, W>(server: &ToolServer, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!(namespace = %server.namespace(), tools = server.tools().len(), "rpc: serving");
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let resp = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(server, line).await,
            Err(e) => {
                warn!(error = %e, "rpc: message is not UTF-8");
                Some(Response::err(Json::Null, PARSE_ERROR, format!("Parse error: {e}")))
            }
        };
        if let Some(resp) = resp {
            let mut out = serde_json::to_vec(&resp)?;
            out.push(b'\n');
            writer.write_all(&out).await?;
            writer.flush().await?;
        }
    }
    info!("rpc: input closed");
    Ok(())
}

async fn handle_line(server: &ToolServer, line: &str) -> Option<Response> {
    let raw: Json = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "rpc: malformed message");
            return Some(Response::err(Json::Null, PARSE_ERROR, format!("Parse error: {e}")));
        }
    };
    let req: Request = match serde_json::from_value(raw) {
        Ok(r) => r,
        Err(e) => return Some(Response::err(Json::Null, INVALID_REQUEST, format!("Invalid request: {e}"))),
    };
    debug!(method = %req.method, has_id = req.id.is_some(), "rpc: request");
    // Notifications (no id) never get a reply, whatever the method.
    let id = req.id?;
    Some(match dispatch(server, &req.method, req.params).await {
        Ok(result) => Response::ok(id, result),
        Err(e) => Response::err(id, e.code, e.message),
    })
}

async fn dispatch(server: &ToolServer, method: &str, params: Json) -> Result<Json, RpcError> {
    match method {
        "initialize" => {
            let requested = params.get("protocolVersion").and_then(Json::as_str).unwrap_or(PROTOCOL_VERSION);
            Ok(json!({
                "protocolVersion": requested,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
            }))
        }
        "ping" => Ok(json!({})),
        "tools/list" => {
            let tools: Vec<Json> = server
                .tools()
                .iter()
                .map(|t| json!({ "name": t.name, "description": t.description, "inputSchema": t.input_schema() }))
                .collect();
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => {
            let call: CallParams = serde_json::from_value(params)
                .map_err(|e| RpcError { code: INVALID_PARAMS, message: format!("Invalid params: {e}") })?;
            if catalogue::find(&call.name).is_none() {
                return Err(RpcError { code: INVALID_PARAMS, message: format!("Unknown tool: {}", call.name) });
            }
            let args = call.arguments.unwrap_or_default();
            let res = server.call(&call.name, &args).await;
            Ok(json!({ "content": [{ "type": "text", "text": res.text }], "isError": res.is_error }))
        }
        other => Err(RpcError { code: METHOD_NOT_FOUND, message: format!("Method not found: {other}") }),
    }
}
