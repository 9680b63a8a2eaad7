//! MCP over HTTP: one JSON-RPC message per POST.

use super::types::{
    CallToolResult, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, McpToolDescriptor, MCP_PROTOCOL_VERSION,
};
use crate::tools::error::ToolError;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Header carrying the server-assigned session id
const SESSION_HEADER: &str = "Mcp-Session-Id";

/// Upper bound on `tools/list` pages followed during one discovery
const MAX_LIST_PAGES: usize = 50;

/// Wire access to an MCP server. Tests substitute a scripted transport.
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Run the `initialize` handshake. Implementations talk to each server
    /// at most once and return the cached result afterwards.
    async fn initialize(&self, server_url: &str) -> Result<InitializeResult, ToolError>;

    /// Fetch one page of `tools/list`
    async fn list_tools(
        &self,
        server_url: &str,
        cursor: Option<&str>,
    ) -> Result<ListToolsResult, ToolError>;

    async fn call_tool(
        &self,
        server_url: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ToolError>;
}

#[derive(Debug, Clone)]
struct Session {
    id: Option<String>,
    info: InitializeResult,
}

struct RpcReply {
    result: Value,
    session_id: Option<String>,
}

pub struct HttpMcpTransport {
    client: reqwest::Client,
    next_id: AtomicU64,
    sessions: RwLock<HashMap<String, Session>>,
}

impl HttpMcpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        HttpMcpTransport {
            client,
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    async fn post<T: Serialize>(&self, server_url: &str, body: &T) -> Result<reqwest::Response, String> {
        let session_id = self
            .sessions
            .read()
            .get(server_url)
            .and_then(|s| s.id.clone());

        let mut request = self
            .client
            .post(server_url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(id) = session_id {
            request = request.header(SESSION_HEADER, id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| format!("request to {} failed: {}", server_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(format!("{} returned HTTP {}: {}", server_url, status.as_u16(), snippet));
        }
        Ok(response)
    }

    async fn rpc(&self, server_url: &str, method: &str, params: Option<Value>) -> Result<RpcReply, String> {
        let request = JsonRpcRequest::new(self.next_id.fetch_add(1, Ordering::Relaxed), method, params);
        log::debug!("[MCP] -> {} {} (id {})", server_url, method, request.id);

        let response = self.post(server_url, &request).await?;
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let is_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response from {}: {}", server_url, e))?;

        let envelope = decode_envelope(&body, is_stream)
            .map_err(|e| format!("invalid JSON-RPC response from {}: {}", server_url, e))?;

        if let Some(err) = envelope.error {
            return Err(format!("{} error {}: {}", method, err.code, err.message));
        }
        let result = envelope
            .result
            .ok_or_else(|| format!("{} response from {} has no result", method, server_url))?;
        Ok(RpcReply { result, session_id })
    }

    async fn notify(&self, server_url: &str, method: &str) -> Result<(), String> {
        log::debug!("[MCP] -> {} {} (notification)", server_url, method);
        self.post(server_url, &JsonRpcNotification::new(method))
            .await
            .map(|_| ())
    }
}

/// Parse a JSON-RPC response body. Streamable HTTP servers may answer with
/// a server-sent event stream; the first `data:` line holding a response wins.
fn decode_envelope(body: &str, is_stream: bool) -> Result<JsonRpcResponse, String> {
    if !is_stream {
        return serde_json::from_str(body).map_err(|e| e.to_string());
    }
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .find_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
        .ok_or_else(|| "event stream carried no JSON-RPC response".to_string())
}

#[async_trait]
impl McpTransport for HttpMcpTransport {
    async fn initialize(&self, server_url: &str) -> Result<InitializeResult, ToolError> {
        let existing = self.sessions.read().get(server_url).map(|s| s.info.clone());
        if let Some(info) = existing {
            return Ok(info);
        }

        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "swarm-backend",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });
        let reply = self
            .rpc(server_url, "initialize", Some(params))
            .await
            .map_err(ToolError::Configuration)?;
        let info: InitializeResult = serde_json::from_value(reply.result)
            .map_err(|e| ToolError::Configuration(format!("malformed initialize result: {}", e)))?;

        self.sessions.write().insert(
            server_url.to_string(),
            Session {
                id: reply.session_id,
                info: info.clone(),
            },
        );
        self.notify(server_url, "notifications/initialized")
            .await
            .map_err(ToolError::Configuration)?;

        log::info!(
            "[MCP] Session open with {} ({}, protocol {})",
            server_url,
            info.server_info
                .as_ref()
                .map(|s| s.name.as_str())
                .unwrap_or("unnamed server"),
            info.protocol_version
        );
        Ok(info)
    }

    async fn list_tools(
        &self,
        server_url: &str,
        cursor: Option<&str>,
    ) -> Result<ListToolsResult, ToolError> {
        let params = cursor.map(|c| json!({ "cursor": c }));
        let reply = self
            .rpc(server_url, "tools/list", params)
            .await
            .map_err(ToolError::Configuration)?;
        serde_json::from_value(reply.result)
            .map_err(|e| ToolError::Configuration(format!("malformed tools/list result: {}", e)))
    }

    async fn call_tool(
        &self,
        server_url: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ToolError> {
        let reply = self
            .rpc(
                server_url,
                "tools/call",
                Some(json!({ "name": tool_name, "arguments": arguments })),
            )
            .await
            .map_err(|reason| ToolError::execution(tool_name, reason))?;
        serde_json::from_value(reply.result).map_err(|e| {
            ToolError::execution(tool_name, format!("malformed tools/call result: {}", e))
        })
    }
}

/// Check that a server URL is an absolute http(s) URL
pub fn validate_server_url(server_url: &str) -> Result<url::Url, ToolError> {
    let parsed = url::Url::parse(server_url).map_err(|e| {
        ToolError::Configuration(format!("invalid MCP server URL '{}': {}", server_url, e))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ToolError::Configuration(format!(
            "MCP server URL '{}' must use http or https, not '{}'",
            server_url, other
        ))),
    }
}

fn as_configuration(err: ToolError) -> ToolError {
    match err {
        ToolError::Configuration(_) => err,
        other => ToolError::Configuration(other.to_string()),
    }
}

/// Handshake with a server, then list every tool across all pages. Any
/// network or protocol failure is a configuration error.
pub async fn discover_tools(
    transport: &dyn McpTransport,
    server_url: &str,
) -> Result<Vec<McpToolDescriptor>, ToolError> {
    validate_server_url(server_url)?;
    transport
        .initialize(server_url)
        .await
        .map_err(as_configuration)?;

    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;
    for _ in 0..MAX_LIST_PAGES {
        let page = transport
            .list_tools(server_url, cursor.as_deref())
            .await
            .map_err(as_configuration)?;
        tools.extend(page.tools);

        match page.next_cursor.filter(|next| !next.is_empty()) {
            None => {
                log::info!("[MCP] Discovered {} tools at {}", tools.len(), server_url);
                return Ok(tools);
            }
            Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                return Err(ToolError::Configuration(format!(
                    "{} repeated tools/list cursor '{}'",
                    server_url, next
                )));
            }
            Some(next) => cursor = Some(next),
        }
    }
    Err(ToolError::Configuration(format!(
        "{} returned more than {} pages of tools",
        server_url, MAX_LIST_PAGES
    )))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mcp::types::{McpContent, ServerInfo};
    use parking_lot::Mutex;

    /// Scripted transport: fixed discovery result, echoes calls back.
    /// Listing before `initialize` fails, like a strict server.
    pub(crate) struct FakeTransport {
        pub tools: Result<Vec<McpToolDescriptor>, ToolError>,
        pub page_size: Option<usize>,
        pub calls: Mutex<Vec<(String, Value)>>,
        pub initialize_count: Mutex<usize>,
        pub list_count: Mutex<usize>,
        pub cursors: Mutex<Vec<Option<String>>>,
        pub fail_calls: bool,
    }

    impl FakeTransport {
        pub fn with_tools(tools: Vec<McpToolDescriptor>) -> Self {
            FakeTransport {
                tools: Ok(tools),
                page_size: None,
                calls: Mutex::new(Vec::new()),
                initialize_count: Mutex::new(0),
                list_count: Mutex::new(0),
                cursors: Mutex::new(Vec::new()),
                fail_calls: false,
            }
        }

        pub fn unreachable() -> Self {
            FakeTransport {
                tools: Err(ToolError::Configuration("connection refused".to_string())),
                ..FakeTransport::with_tools(vec![])
            }
        }

        pub fn paged(mut self, page_size: usize) -> Self {
            self.page_size = Some(page_size);
            self
        }

        pub fn failing_calls(mut self) -> Self {
            self.fail_calls = true;
            self
        }
    }

    pub(crate) fn descriptor(name: &str, schema: Value) -> McpToolDescriptor {
        McpToolDescriptor {
            name: name.to_string(),
            description: Some(format!("{} tool", name)),
            input_schema: schema,
        }
    }

    #[async_trait]
    impl McpTransport for FakeTransport {
        async fn initialize(&self, _server_url: &str) -> Result<InitializeResult, ToolError> {
            *self.initialize_count.lock() += 1;
            self.tools.as_ref().map_err(|e| e.clone())?;
            Ok(InitializeResult {
                protocol_version: MCP_PROTOCOL_VERSION.to_string(),
                capabilities: json!({"tools": {}}),
                server_info: Some(ServerInfo {
                    name: "fake".to_string(),
                    version: None,
                }),
            })
        }

        async fn list_tools(
            &self,
            _server_url: &str,
            cursor: Option<&str>,
        ) -> Result<ListToolsResult, ToolError> {
            *self.list_count.lock() += 1;
            self.cursors.lock().push(cursor.map(|c| c.to_string()));
            tokio::time::sleep(Duration::from_millis(10)).await;
            if *self.initialize_count.lock() == 0 {
                return Err(ToolError::Configuration("tools/list before initialize".to_string()));
            }

            let tools = self.tools.clone()?;
            let Some(size) = self.page_size else {
                return Ok(ListToolsResult {
                    tools,
                    next_cursor: None,
                });
            };
            let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
            let end = (start + size).min(tools.len());
            Ok(ListToolsResult {
                tools: tools[start.min(end)..end].to_vec(),
                next_cursor: (end < tools.len()).then(|| end.to_string()),
            })
        }

        async fn call_tool(
            &self,
            _server_url: &str,
            tool_name: &str,
            arguments: Value,
        ) -> Result<CallToolResult, ToolError> {
            self.calls.lock().push((tool_name.to_string(), arguments.clone()));
            Ok(CallToolResult {
                content: vec![McpContent::text(format!("{} -> {}", tool_name, arguments))],
                is_error: self.fail_calls,
            })
        }
    }

    /// Always hands back the same cursor
    struct LoopingTransport;

    #[async_trait]
    impl McpTransport for LoopingTransport {
        async fn initialize(&self, server_url: &str) -> Result<InitializeResult, ToolError> {
            FakeTransport::with_tools(vec![]).initialize(server_url).await
        }

        async fn list_tools(&self, _: &str, _: Option<&str>) -> Result<ListToolsResult, ToolError> {
            Ok(ListToolsResult {
                tools: vec![descriptor("echo", json!({"type": "object"}))],
                next_cursor: Some("again".to_string()),
            })
        }

        async fn call_tool(&self, _: &str, tool_name: &str, _: Value) -> Result<CallToolResult, ToolError> {
            Err(ToolError::execution(tool_name, "not scripted"))
        }
    }

    #[test]
    fn test_validate_server_url() {
        assert!(validate_server_url("https://mcp.example.com/rpc").is_ok());
        assert!(matches!(
            validate_server_url("ftp://mcp.example.com"),
            Err(ToolError::Configuration(_))
        ));
        assert!(validate_server_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_discover_tools_initializes_first() {
        let transport = FakeTransport::with_tools(vec![descriptor("search", json!({"type": "object"}))]);
        let tools = discover_tools(&transport, "http://localhost:9000").await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(*transport.initialize_count.lock(), 1);
        assert_eq!(*transport.list_count.lock(), 1);
        assert_eq!(*transport.cursors.lock(), vec![None]);
    }

    #[tokio::test]
    async fn test_listing_without_handshake_is_refused() {
        let transport = FakeTransport::with_tools(vec![descriptor("search", json!({"type": "object"}))]);
        let err = transport.list_tools("http://localhost:9000", None).await.unwrap_err();
        assert!(err.to_string().contains("initialize"));
    }

    #[tokio::test]
    async fn test_discover_tools_follows_cursors() {
        let names = ["a", "b", "c", "d", "e"];
        let transport = FakeTransport::with_tools(
            names
                .iter()
                .map(|n| descriptor(n, json!({"type": "object"})))
                .collect(),
        )
        .paged(2);

        let tools = discover_tools(&transport, "http://localhost:9000").await.unwrap();
        let found: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(found, names);
        assert_eq!(
            *transport.cursors.lock(),
            vec![None, Some("2".to_string()), Some("4".to_string())]
        );
        assert_eq!(*transport.initialize_count.lock(), 1);
    }

    #[tokio::test]
    async fn test_repeated_cursor_is_configuration_error() {
        let err = discover_tools(&LoopingTransport, "http://localhost:9000")
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Configuration(ref m) if m.contains("repeated")));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_configuration_error() {
        let transport = FakeTransport::unreachable();
        let err = discover_tools(&transport, "http://localhost:9000").await.unwrap_err();
        assert!(matches!(err, ToolError::Configuration(_)));

        let err = discover_tools(&transport, "localhost").await.unwrap_err();
        assert!(matches!(err, ToolError::Configuration(_)));
        assert_eq!(*transport.initialize_count.lock(), 1);
        assert_eq!(*transport.list_count.lock(), 0);
    }

    #[test]
    fn test_decode_envelope_plain_and_event_stream() {
        let plain = decode_envelope(r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#, false).unwrap();
        assert_eq!(plain.result, Some(json!({"tools": []})));

        let stream = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{\"ok\":true}}\n\n";
        let decoded = decode_envelope(stream, true).unwrap();
        assert_eq!(decoded.result, Some(json!({"ok": true})));

        assert!(decode_envelope("event: ping\n\n", true).is_err());
    }

    #[tokio::test]
    async fn test_http_initialize_failure_is_configuration_error() {
        let transport = HttpMcpTransport::new(Duration::from_secs(1));
        let err = transport.initialize("http://127.0.0.1:9/mcp").await.unwrap_err();
        assert!(matches!(err, ToolError::Configuration(_)));
    }
}
