//! MCP request handling and the stdio entry point.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};
use trellis_github::RelationStore;

use crate::protocol::{
    methods, CallToolParams, Implementation, InitializeParams, InitializeResult, ListToolsResult,
    RpcError, ServerCapabilities, ToolsCapability, PROTOCOL_VERSION,
};
use crate::registry::ToolRegistry;
use crate::session::{RequestHandler, Session};

/// The trellis MCP server: the registry plus protocol-method plumbing.
pub struct TrellisServer {
    registry: ToolRegistry,
}

impl TrellisServer {
    /// Build a server over a relation store.
    #[must_use]
    pub fn new(store: Arc<dyn RelationStore>) -> Self {
        Self {
            registry: ToolRegistry::new(store),
        }
    }

    /// The registry backing this server.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    fn initialize_result() -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: Some(false),
                },
            },
            server_info: Implementation {
                name: "trellis-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: Some(
                "Inspect and edit GitHub issue relationships: blocking dependencies and \
                 sub-issues. The issue being linked or unlinked is always identified by its \
                 global id, not its display number."
                    .to_string(),
            ),
        }
    }
}

#[async_trait]
impl RequestHandler for TrellisServer {
    async fn handle_request(&self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            methods::INITIALIZE => {
                let params: InitializeParams = decode_params(params)?;
                debug!(
                    client = %params.client_info.name,
                    version = %params.client_info.version,
                    "client connected"
                );
                if params.protocol_version != PROTOCOL_VERSION {
                    // Accept anyway; the reply names the version we speak.
                    warn!(
                        theirs = %params.protocol_version,
                        ours = PROTOCOL_VERSION,
                        "protocol version mismatch"
                    );
                }
                encode_result(&Self::initialize_result())
            }
            methods::TOOLS_LIST => encode_result(&ListToolsResult {
                tools: self.registry.descriptors(),
            }),
            methods::TOOLS_CALL => {
                let params: CallToolParams = decode_params(params)?;
                let result = self.registry.call(&params.name, params.arguments).await;
                encode_result(&result)
            }
            other => Err(RpcError::method_not_found(other)),
        }
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn encode_result<T: serde::Serialize>(result: &T) -> Result<Value, RpcError> {
    serde_json::to_value(result).map_err(|e| RpcError::internal(e.to_string()))
}

/// Serve one session over the process's standard streams.
///
/// Returns when the peer closes the stream; all pending waiters are
/// rejected by the session on the way out.
pub async fn serve_stdio(server: TrellisServer) {
    let session = Session::connect(
        tokio::io::stdin(),
        tokio::io::stdout(),
        Arc::new(server) as Arc<dyn RequestHandler>,
    );
    session.wait_closed().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_github::InMemoryRelations;

    fn server() -> TrellisServer {
        TrellisServer::new(Arc::new(InMemoryRelations::new()))
    }

    fn initialize_params() -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "0.0.0"}
        })
    }

    #[tokio::test]
    async fn initialize_reports_version_and_capabilities() {
        let value = server()
            .handle_request(methods::INITIALIZE, Some(initialize_params()))
            .await
            .unwrap();
        assert_eq!(value["protocolVersion"], json!(PROTOCOL_VERSION));
        assert_eq!(value["serverInfo"]["name"], json!("trellis-mcp"));
        assert!(value.get("capabilities").is_some());
        assert!(value.get("instructions").is_some());
    }

    #[tokio::test]
    async fn initialize_without_params_is_invalid() {
        let err = server()
            .handle_request(methods::INITIALIZE, None)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::protocol::error_codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn tools_list_returns_the_registry() {
        let value = server()
            .handle_request(methods::TOOLS_LIST, None)
            .await
            .unwrap();
        let tools = value["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 9);
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let err = server()
            .handle_request("resources/list", None)
            .await
            .unwrap_err();
        assert_eq!(err.code, crate::protocol::error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn tools_call_surfaces_tool_level_errors_in_result() {
        let value = server()
            .handle_request(
                methods::TOOLS_CALL,
                Some(json!({"name": "no_such_tool", "arguments": {}})),
            )
            .await
            .unwrap();
        assert_eq!(value["isError"], json!(true));
    }
}
