// MCP server: line-delimited JSON-RPC 2.0 over stdio

use crate::mcp::protocol::{
    CallToolParams, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, ServerCapabilities, ServerInfo, ToolsCapability,
    DEFAULT_PROTOCOL_VERSION,
};
use crate::mcp::tools::ToolRegistry;
use crate::utils::error::{LicenseError, Result};
use serde::Serialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

pub const SERVER_NAME: &str = "thunderclient-license-manager";

#[derive(Clone)]
pub struct McpServer {
    registry: Arc<ToolRegistry>,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }

    /// Serves stdin/stdout until EOF or Ctrl-C.
    pub async fn run_stdio(&self) -> Result<()> {
        tracing::info!(
            "{} running on stdio with {} tools",
            self.info.name,
            self.registry.len()
        );

        tokio::select! {
            result = self.serve(tokio::io::stdin(), tokio::io::stdout()) => {
                tracing::info!("Input closed, shutting down");
                result
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("Received interrupt, shutting down");
                Ok(())
            }
        }
    }

    /// Reads one request per line and writes one response per line.
    ///
    /// Each request runs as its own task, so a slow listing does not hold up
    /// other calls; responses are written in completion order. Returns once
    /// the input is exhausted and every in-flight request has answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(message) = rx.recv().await {
                writer.write_all(message.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        let mut in_flight = JoinSet::new();

        loop {
            buffer.clear();
            if reader.read_until(b'\n', &mut buffer).await? == 0 {
                break;
            }

            let line = match std::str::from_utf8(&buffer) {
                Ok(line) => line.trim().to_string(),
                Err(e) => {
                    tracing::warn!("Skipping line that is not valid UTF-8: {}", e);
                    let response =
                        JsonRpcResponse::error(serde_json::Value::Null, JsonRpcError::parse_error(e));
                    if let Ok(text) = serde_json::to_string(&response) {
                        let _ = tx.send(text);
                    }
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            in_flight.spawn(async move {
                let Some(response) = server.handle_line(&line).await else {
                    return;
                };
                match serde_json::to_string(&response) {
                    Ok(text) => {
                        // Only fails when the writer is gone; nothing left to report to.
                        let _ = tx.send(text);
                    }
                    Err(e) => tracing::error!("Failed to serialize response: {}", e),
                }
            });

            while in_flight.try_join_next().is_some() {}
        }

        while in_flight.join_next().await.is_some() {}
        drop(tx);

        writer_task
            .await
            .map_err(|e| LicenseError::IoError(std::io::Error::other(e)))??;
        Ok(())
    }

    /// Handles one raw protocol line. Returns `None` for notifications.
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Unparseable message: {}", e);
                return Some(JsonRpcResponse::error(
                    serde_json::Value::Null,
                    JsonRpcError::parse_error(e),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(serde_json::Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!("Invalid Request: {}", e)),
            )),
        }
    }

    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!("Notification: {}", request.method);
            return None;
        };

        tracing::debug!("Request {}: {}", id, request.method);
        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => to_result(&ListToolsResult {
                tools: self.registry.list_schemas(),
            }),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(JsonRpcError::method_not_found(format!(
                "Method not found: {}",
                other
            ))),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::warn!("Request {} failed: {}", id, error.message);
                JsonRpcResponse::error(id, error)
            }
        })
    }

    fn initialize(
        &self,
        params: Option<serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, JsonRpcError> {
        let params: InitializeParams = params
            .and_then(|p| serde_json::from_value(p).ok())
            .unwrap_or_default();

        if let Some(client) = &params.client_info {
            tracing::info!("Client connected: {} {}", client.name, client.version);
        }

        let result = InitializeResult {
            protocol_version: params
                .protocol_version
                .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string()),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: false,
                },
            },
            server_info: self.info.clone(),
        };

        to_result(&result)
    }

    async fn call_tool(
        &self,
        params: Option<serde_json::Value>,
    ) -> std::result::Result<serde_json::Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool call parameters"))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| {
                    JsonRpcError::invalid_params(format!("Invalid tool call parameters: {}", e))
                })
            })?;

        let tool = self.registry.get(&params.name).ok_or_else(|| {
            JsonRpcError::method_not_found(format!("Unknown tool: {}", params.name))
        })?;

        let arguments = match params.arguments {
            Some(serde_json::Value::Null) | None => serde_json::json!({}),
            Some(arguments) => arguments,
        };

        tracing::info!("Calling tool {}", params.name);
        match tool.execute(arguments).await {
            Ok(result) => to_result(&result),
            Err(LicenseError::InvalidParams(message)) => Err(JsonRpcError::invalid_params(message)),
            Err(e) => Err(JsonRpcError::internal_error(format!(
                "Tool execution failed: {}",
                e
            ))),
        }
    }
}

fn to_result<T: Serialize>(value: &T) -> std::result::Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{AggregateResult, LicenseListing, OperationResult};
    use crate::domain::ports::LicenseApi;
    use serde_json::json;

    struct StaticApi;

    #[async_trait::async_trait]
    impl LicenseApi for StaticApi {
        async fn add_license(&self, emails: &[String]) -> OperationResult<serde_json::Value> {
            OperationResult::success(json!({}), format!("added {}", emails.len()))
        }

        async fn remove_license(&self, emails: &[String]) -> OperationResult<serde_json::Value> {
            OperationResult::success(json!({}), format!("removed {}", emails.len()))
        }

        async fn get_licenses(&self, page: Option<u32>) -> OperationResult<LicenseListing> {
            match page {
                Some(page) => OperationResult::failure(&LicenseError::page_fetch(
                    page,
                    LicenseError::Transport("down".into()),
                )),
                None => OperationResult::success(
                    LicenseListing::All(AggregateResult::default()),
                    "Retrieved 0 licenses across 0 page(s)",
                ),
            }
        }
    }

    fn server() -> McpServer {
        McpServer::new(ToolRegistry::for_license_api(Arc::new(StaticApi)))
    }

    #[tokio::test]
    async fn test_initialize_echoes_protocol_version() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","capabilities":{},"clientInfo":{"name":"test","version":"0.1"}}}"#)
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], json!("2025-03-26"));
        assert_eq!(result["serverInfo"]["name"], json!(SERVER_NAME));
        assert_eq!(result["capabilities"]["tools"]["listChanged"], json!(false));
    }

    #[tokio::test]
    async fn test_initialize_without_params_uses_default_version() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"initialize"}"#)
            .await
            .unwrap();
        assert_eq!(
            response.result.unwrap()["protocolVersion"],
            json!(DEFAULT_PROTOCOL_VERSION)
        );
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_parse_error_has_null_id() {
        let response = server().handle_line("{not json").await.unwrap();
        assert_eq!(response.id, serde_json::Value::Null);
        assert_eq!(response.error.unwrap().code, JsonRpcError::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_missing_method_is_invalid_request() {
        let response = server().handle_line(r#"{"jsonrpc":"2.0","id":9}"#).await.unwrap();
        assert_eq!(response.id, json!(9));
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_method_and_tool() {
        let server = server();
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"nope","arguments":{}}}"#)
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(error.message, "Unknown tool: nope");
    }

    #[tokio::test]
    async fn test_invalid_arguments_map_to_invalid_params() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"thunderclient_add_license","arguments":{"emails":[]}}}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_failed_operation_is_tool_error_not_rpc_error() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"thunderclient_get_licenses","arguments":{"pageNumber":2}}}"#)
            .await
            .unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], json!(true));
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Failed to fetch page 2"));
    }

    #[tokio::test]
    async fn test_empty_full_listing_is_not_a_tool_error() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"thunderclient_get_licenses"}}"#)
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert!(result.get("isError").is_none());
        let payload: serde_json::Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["data"]["pagesFetched"], json!(0));
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_session() {
        let (client_io, server_io) = tokio::io::duplex(1 << 16);
        let (server_read, server_write) = tokio::io::split(server_io);
        let serving = tokio::spawn(async move { server().serve(server_read, server_write).await });

        let (client_read, mut client_write) = tokio::io::split(client_io);
        client_write.write_all(b"\xff\xfe\n").await.unwrap();
        client_write
            .write_all(b"{\"jsonrpc\":\"2.0\",\"id\":8,\"method\":\"ping\"}\n")
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();
        serving.await.unwrap().unwrap();

        let mut lines = BufReader::new(client_read).lines();
        let mut responses = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            responses.push(serde_json::from_str::<serde_json::Value>(&line).unwrap());
        }
        assert_eq!(responses.len(), 2);
        assert!(responses
            .iter()
            .any(|r| r["id"].is_null() && r["error"]["code"] == json!(JsonRpcError::PARSE_ERROR)));
        assert!(responses.iter().any(|r| r["id"] == json!(8) && r["result"] == json!({})));
    }

    #[tokio::test]
    async fn test_ping() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":6,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.result, Some(json!({})));
    }
}
