//! JSON-RPC 2.0 frames and MCP payload types.
//!
//! One frame is one JSON value on one line. Frames are classified by
//! field shape: a `method` with an `id` is a request, a `method` without
//! an `id` is a notification, an `id` without a `method` is a response.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC version string carried by every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision implemented by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names understood by the session and server.
pub mod methods {
    /// Two-phase handshake, step one (request).
    pub const INITIALIZE: &str = "initialize";

    /// Two-phase handshake, step two (fire-and-forget notification).
    pub const INITIALIZED: &str = "notifications/initialized";

    /// Liveness check, answered in any session state.
    pub const PING: &str = "ping";

    /// Enumerate the tool surface.
    pub const TOOLS_LIST: &str = "tools/list";

    /// Invoke a tool by name.
    pub const TOOLS_CALL: &str = "tools/call";
}

/// JSON-RPC error codes used by this crate.
pub mod error_codes {
    /// Frame was not parseable JSON.
    pub const PARSE_ERROR: i64 = -32700;

    /// Frame was JSON but not a valid request, or arrived in the wrong
    /// session state.
    pub const INVALID_REQUEST: i64 = -32600;

    /// No handler for the requested method.
    pub const METHOD_NOT_FOUND: i64 = -32601;

    /// Request parameters failed to decode.
    pub const INVALID_PARAMS: i64 = -32602;

    /// Handler failed internally.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// The session closed with the request still pending.
    pub const CONNECTION_CLOSED: i64 = -32000;

    /// No response arrived within the request timeout.
    pub const REQUEST_TIMEOUT: i64 = -32001;
}

/// A request frame: expects exactly one response with the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,

    /// Caller-assigned numeric id, monotonically increasing per session.
    pub id: i64,

    /// Method name.
    pub method: String,

    /// Method parameters, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A notification frame: fire-and-forget, no response expected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,

    /// Method name.
    pub method: String,

    /// Notification parameters, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A response frame carrying either a result or an error.
///
/// The id is a raw JSON value so error responses can echo `null` when the
/// offending frame's id was unreadable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always [`JSONRPC_VERSION`].
    pub jsonrpc: String,

    /// Id of the request being answered, or `null`.
    pub id: Value,

    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Build a success response.
    #[must_use]
    pub fn result(id: impl Into<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: impl Into<Value>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code (see [`error_codes`]).
    pub code: i64,

    /// Human-readable explanation.
    pub message: String,

    /// Optional structured detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Error for an unparseable frame.
    #[must_use]
    pub fn parse_error(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::PARSE_ERROR,
            message: detail.into(),
            data: None,
        }
    }

    /// Error for a structurally invalid or mistimed request.
    #[must_use]
    pub fn invalid_request(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INVALID_REQUEST,
            message: detail.into(),
            data: None,
        }
    }

    /// Error for an unknown method.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: error_codes::METHOD_NOT_FOUND,
            message: format!("method not found: {method}"),
            data: None,
        }
    }

    /// Error for undecodable parameters.
    #[must_use]
    pub fn invalid_params(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INVALID_PARAMS,
            message: detail.into(),
            data: None,
        }
    }

    /// Error for a handler-side failure.
    #[must_use]
    pub fn internal(detail: impl Into<String>) -> Self {
        Self {
            code: error_codes::INTERNAL_ERROR,
            message: detail.into(),
            data: None,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug)]
pub enum Frame {
    /// A request expecting a response.
    Request(RpcRequest),

    /// A fire-and-forget notification.
    Notification(RpcNotification),

    /// A response to one of our requests.
    Response(RpcResponse),
}

/// Why an inbound line could not be decoded into a [`Frame`].
#[derive(Debug)]
pub enum FrameError {
    /// The line was not valid JSON.
    Unparseable(String),

    /// The line was JSON but not a usable frame. Carries the frame id
    /// when one was readable, so the rejection can be correlated.
    Invalid {
        /// Echoed request id, or `Value::Null`.
        id: Value,
        /// What was wrong.
        reason: String,
    },
}

impl Frame {
    /// Classify and decode one line.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Unparseable`] for non-JSON input and
    /// [`FrameError::Invalid`] for JSON that is not a valid frame
    /// (notably: requests with non-numeric ids).
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| FrameError::Unparseable(e.to_string()))?;

        let has_method = value.get("method").is_some();
        let id = value.get("id").cloned();

        match (has_method, id) {
            (true, Some(id_value)) => serde_json::from_value::<RpcRequest>(value)
                .map(Frame::Request)
                .map_err(|e| FrameError::Invalid {
                    id: id_value,
                    reason: format!("invalid request frame: {e}"),
                }),
            (true, None) => serde_json::from_value::<RpcNotification>(value)
                .map(Frame::Notification)
                .map_err(|e| FrameError::Invalid {
                    id: Value::Null,
                    reason: format!("invalid notification frame: {e}"),
                }),
            (false, Some(_)) => serde_json::from_value::<RpcResponse>(value)
                .map(Frame::Response)
                .map_err(|e| FrameError::Invalid {
                    id: Value::Null,
                    reason: format!("invalid response frame: {e}"),
                }),
            (false, None) => Err(FrameError::Invalid {
                id: Value::Null,
                reason: "frame has neither method nor id".to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// MCP payloads
// ---------------------------------------------------------------------------

/// Name/version pair identifying one side of the handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Implementation name.
    pub name: String,

    /// Implementation version.
    pub version: String,
}

/// Parameters of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Protocol revision the caller speaks.
    pub protocol_version: String,

    /// Caller capability declaration (opaque here).
    #[serde(default)]
    pub capabilities: Value,

    /// Caller identity.
    pub client_info: Implementation,
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Protocol revision this server speaks.
    pub protocol_version: String,

    /// Server capability declaration.
    pub capabilities: ServerCapabilities,

    /// Server identity.
    pub server_info: Implementation,

    /// Usage hint surfaced to the calling agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Capabilities advertised during the handshake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    /// Tool-calling support.
    pub tools: ToolsCapability,
}

/// Tool-related capability flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether the tool list can change mid-session (it cannot here).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_changed: Option<bool>,
}

/// One entry in the advertised tool surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within the registry.
    pub name: String,

    /// What the tool does, written for the calling agent.
    pub description: String,

    /// JSON Schema of the argument record.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,

    /// Behavioral hints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<ToolAnnotations>,
}

/// Behavioral hints for the calling agent.
///
/// Four independent axes: whether the tool only reads, whether it can
/// destroy data, whether repeating it with identical arguments is safe,
/// and whether it touches state outside its own bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    /// The tool does not modify anything.
    pub read_only_hint: bool,

    /// The tool can delete or detach existing data.
    pub destructive_hint: bool,

    /// Repeating the call with the same arguments is safe.
    pub idempotent_hint: bool,

    /// The tool interacts with external state.
    pub open_world_hint: bool,
}

/// Parameters of a `tools/call` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name.
    pub name: String,

    /// Argument record, validated against the tool's input schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Result of a `tools/list` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// The full tool surface.
    pub tools: Vec<ToolDescriptor>,
}

/// One content block in a tool result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text.
    Text {
        /// The text body.
        text: String,
    },
}

/// Result of a `tools/call` request.
///
/// Tool-level failures are carried here with `is_error` set; JSON-RPC
/// error objects are reserved for protocol-level failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Primary content, first block being the human-readable text.
    pub content: Vec<Content>,

    /// Machine-readable mirror of the same data, when the tool has one.
    #[serde(
        rename = "structuredContent",
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<Value>,

    /// Whether this result reports a tool-level failure.
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Successful result with a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            structured_content: None,
            is_error: false,
        }
    }

    /// Tool-level failure with a diagnostic text block.
    #[must_use]
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![Content::Text { text: text.into() }],
            structured_content: None,
            is_error: true,
        }
    }

    /// Attach a structured payload.
    #[must_use]
    pub fn with_structured(mut self, structured: Value) -> Self {
        self.structured_content = Some(structured);
        self
    }

    /// The first text block, when present.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().map(|c| match c {
            Content::Text { text } => text.as_str(),
        }).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_with_method_and_id_is_a_request() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        match frame {
            Frame::Request(req) => {
                assert_eq!(req.id, 1);
                assert_eq!(req.method, "ping");
                assert!(req.params.is_none());
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn frame_with_method_only_is_a_notification() {
        let frame =
            Frame::parse(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(frame, Frame::Notification(_)));
    }

    #[test]
    fn frame_with_id_only_is_a_response() {
        let frame = Frame::parse(r#"{"jsonrpc":"2.0","id":3,"result":{}}"#).unwrap();
        match frame {
            Frame::Response(resp) => {
                assert_eq!(resp.id, json!(3));
                assert!(resp.error.is_none());
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn non_json_line_is_unparseable() {
        assert!(matches!(
            Frame::parse("not json at all"),
            Err(FrameError::Unparseable(_))
        ));
    }

    #[test]
    fn request_with_string_id_is_invalid_and_echoes_id() {
        match Frame::parse(r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#) {
            Err(FrameError::Invalid { id, .. }) => assert_eq!(id, json!("abc")),
            other => panic!("expected invalid frame, got {other:?}"),
        }
    }

    #[test]
    fn empty_object_is_invalid() {
        assert!(matches!(
            Frame::parse("{}"),
            Err(FrameError::Invalid { .. })
        ));
    }

    #[test]
    fn tool_descriptor_serializes_camel_case_schema_key() {
        let descriptor = ToolDescriptor {
            name: "get_blocked_by".to_string(),
            description: "d".to_string(),
            input_schema: json!({"type": "object"}),
            annotations: Some(ToolAnnotations {
                read_only_hint: true,
                destructive_hint: false,
                idempotent_hint: true,
                open_world_hint: true,
            }),
        };
        let value = serde_json::to_value(&descriptor).unwrap();
        assert!(value.get("inputSchema").is_some());
        assert_eq!(value["annotations"]["readOnlyHint"], json!(true));
        assert_eq!(value["annotations"]["openWorldHint"], json!(true));
    }

    #[test]
    fn call_tool_result_error_round_trips() {
        let result = CallToolResult::error("boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], json!(true));
        assert!(value.get("structuredContent").is_none());

        let back: CallToolResult = serde_json::from_value(value).unwrap();
        assert!(back.is_error);
        assert_eq!(back.first_text(), Some("boom"));
    }

    #[test]
    fn initialize_result_uses_camel_case() {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation {
                name: "trellis-mcp".to_string(),
                version: "0.1.0".to_string(),
            },
            instructions: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("protocolVersion").is_some());
        assert!(value.get("serverInfo").is_some());
        assert!(value.get("instructions").is_none());
    }
}
