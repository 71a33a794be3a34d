use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

use crate::app::App;
use crate::config::Config;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::catalog::{tool_catalog, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "meta-ads-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Renders a ToolError as the JSON-RPC error for a tools/call. The details
/// payload is redacted once more on the way out; managers already strip
/// credential keys at the source.
fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let kind = serde_json::to_value(error.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", error.kind).to_lowercase());
    let mut lines = vec![
        "MetaAdsError".to_string(),
        format!("tool: {}", tool),
        format!("kind: {}", kind),
        format!("code: {}", error.code),
        format!("message: {}", error.message),
    ];
    if let Some(hint) = &error.hint {
        lines.push(format!("hint: {}", hint));
    }
    if let Some(details) = &error.details {
        let sanitized = redact_object(details);
        lines.push(format!(
            "details: {}",
            serde_json::to_string(&sanitized).unwrap_or_default()
        ));
    }
    let message = lines.join("\n");

    match error.kind {
        ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
        ToolErrorKind::Timeout => McpError::new(ErrorCode::RequestTimeout, message),
        ToolErrorKind::NotFound => McpError::new(ErrorCode::InvalidRequest, message),
        ToolErrorKind::Remote | ToolErrorKind::Transport | ToolErrorKind::Internal => {
            McpError::new(ErrorCode::InternalError, message)
        }
    }
}

fn success_envelope(tool: &str, action: Option<&str>, result: &Value, duration_ms: u64) -> Value {
    json!({
        "success": true,
        "tool": tool,
        "action": action,
        "result": redact_object(result),
        "duration_ms": duration_ms,
    })
}

pub struct McpServer {
    app: Arc<App>,
    logger: Logger,
}

impl McpServer {
    pub fn new(config: Config) -> Result<Self, ToolError> {
        let app = App::initialize(config)?;
        Ok(Self {
            app: Arc::new(app),
            logger: Logger::new("mcp"),
        })
    }

    fn handle_initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"list": true, "call": true}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        json!({ "tools": tool_catalog() })
    }

    async fn handle_tools_call(&self, name: &str, args: Value) -> Result<Value, McpError> {
        validate_tool_args(name, &args)?;
        let action = args
            .get("action")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let started = Instant::now();
        let result = self
            .app
            .dispatch(name, args)
            .await
            .map_err(|err| map_tool_error(name, &err))?;
        let envelope = success_envelope(
            name,
            action.as_deref(),
            &result,
            started.elapsed().as_millis() as u64,
        );
        let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
        Ok(json!({"content": [{"type": "text", "text": text}]}))
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        self.logger.info(
            "listening on stdio",
            Some(&json!({"server": SERVER_NAME, "version": SERVER_VERSION})),
        );
        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin).lines();
        let mut writer = BufWriter::new(stdout);

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        ErrorCode::ParseError.as_i32(),
                        "Parse error".to_string(),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let request: JsonRpcRequest = match serde_json::from_value(parsed) {
                Ok(req) => req,
                Err(_) => {
                    let response = JsonRpcResponse::failure(
                        Value::Null,
                        ErrorCode::InvalidRequest.as_i32(),
                        "Invalid request".to_string(),
                    );
                    write_response(&mut writer, &response).await?;
                    continue;
                }
            };

            let response = match request.method.as_str() {
                "notifications/initialized" => request
                    .id
                    .clone()
                    .map(|id| JsonRpcResponse::success(id, json!({}))),
                _ if request.method.starts_with("notifications/") && request.id.is_none() => None,
                "initialize" => request
                    .id
                    .clone()
                    .map(|id| JsonRpcResponse::success(id, self.handle_initialize())),
                "tools/list" => request
                    .id
                    .clone()
                    .map(|id| JsonRpcResponse::success(id, self.handle_tools_list())),
                "tools/call" => match request.id.clone() {
                    Some(id) => {
                        let params = request.params.as_object().cloned().unwrap_or_default();
                        let name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
                        if name.is_empty() {
                            Some(JsonRpcResponse::failure(
                                id,
                                ErrorCode::InvalidParams.as_i32(),
                                "Missing tool name".to_string(),
                            ))
                        } else {
                            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                            let call = match self.handle_tools_call(name, args).await {
                                Ok(result) => JsonRpcResponse::success(id, result),
                                Err(err) => {
                                    JsonRpcResponse::failure(id, err.code.as_i32(), err.message)
                                }
                            };
                            Some(call)
                        }
                    }
                    None => None,
                },
                _ => request.id.clone().map(|id| {
                    JsonRpcResponse::failure(
                        id,
                        ErrorCode::MethodNotFound.as_i32(),
                        "Method not found".to_string(),
                    )
                }),
            };

            if let Some(response) = response {
                write_response(&mut writer, &response).await?;
            }
        }

        Ok(())
    }
}

async fn write_response<W>(writer: &mut BufWriter<W>, response: &JsonRpcResponse) -> Result<(), ToolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let payload = serde_json::to_string(response).unwrap_or_default();
    writer.write_all(payload.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

pub async fn run_stdio(config: Config) -> Result<(), ToolError> {
    let server = McpServer::new(config)?;
    server.run_stdio().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn tool_errors_map_to_jsonrpc_codes() {
        let err = map_tool_error("campaigns", &ToolError::invalid_params("No name provided"));
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("No name provided"));
        let err = map_tool_error("insights", &ToolError::timeout("timed out"));
        assert_eq!(err.code, ErrorCode::RequestTimeout);
        let err = map_tool_error("ads", &ToolError::remote("rejected"));
        assert_eq!(err.code, ErrorCode::InternalError);
    }

    #[test]
    fn error_details_are_redacted_in_the_rendered_message() {
        let err = ToolError::remote("rejected")
            .with_details(json!({"payload_sent": {"fields": "id"}, "page_token": "EAAxyz"}));
        let mapped = map_tool_error("ads", &err);
        assert!(!mapped.message.contains("EAAxyz"));
        assert!(mapped.message.contains("fields"));
    }

    #[test]
    fn success_envelope_carries_tool_action_and_redacted_result() {
        let result = json!({"id": "123", "access_token": "EAAabc"});
        let envelope = success_envelope("campaigns", Some("get"), &result, 42);
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["tool"], "campaigns");
        assert_eq!(envelope["action"], "get");
        assert_eq!(envelope["duration_ms"], 42);
        assert_eq!(envelope["result"]["access_token"], "[REDACTED]");
    }

    #[tokio::test]
    async fn tools_call_surfaces_validation_failures() {
        let server = McpServer::new(test_config()).unwrap();
        let err = server
            .handle_tools_call("campaigns", json!({"action": "create_cb"}))
            .await
            .expect_err("must fail");
        assert_eq!(err.code, ErrorCode::InvalidParams);
    }
}
