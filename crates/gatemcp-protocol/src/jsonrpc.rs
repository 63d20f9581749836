//! JSON-RPC 2.0 message types and one-or-batch parsing.

use gatemcp_core::{McpError, McpResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The protocol version string carried by every message.
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC request ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer ID.
    Number(i64),
    /// String ID.
    String(String),
}

impl RequestId {
    /// The ID used on error responses when no request ID could be read.
    #[must_use]
    pub fn zero() -> Self {
        RequestId::Number(0)
    }
}

impl From<i64> for RequestId {
    fn from(id: i64) -> Self {
        RequestId::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        RequestId::String(id.to_owned())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC 2.0 request or notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version (always "2.0").
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Request ID (absent for notifications).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl JsonRpcRequest {
    /// Creates a new request with the given method and parameters.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Option<Value>, id: impl Into<RequestId>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id: Some(id.into()),
        }
    }

    /// Creates a notification (request without ID).
    #[must_use]
    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Returns true if this is a notification (no ID).
    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Returns a named string field out of `params`, if present.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key)?.as_str()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code.
    pub code: i32,
    /// Error message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<McpError> for JsonRpcError {
    fn from(err: McpError) -> Self {
        Self {
            code: err.code.into(),
            message: err.message,
            data: err.data,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version (always "2.0").
    pub jsonrpc: String,
    /// Request ID this is responding to.
    pub id: Option<RequestId>,
    /// Result (present on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (present on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Creates an error response.
    #[must_use]
    pub fn error(id: RequestId, error: impl Into<JsonRpcError>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_owned(),
            id: Some(id),
            result: None,
            error: Some(error.into()),
        }
    }

    /// Returns true if this is an error response.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A JSON-RPC message (request, response, or notification).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request or notification.
    Request(JsonRpcRequest),
    /// A response.
    Response(JsonRpcResponse),
}

/// One element of an incoming message, classified.
///
/// Batches may mix valid and invalid elements; an element that parses as
/// JSON but not as a JSON-RPC message becomes [`IncomingMessage::Invalid`]
/// so the dispatcher can emit a structured per-element error instead of
/// aborting the whole batch.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    /// A request or notification.
    Request(JsonRpcRequest),
    /// A response (servers drop these silently).
    Response(JsonRpcResponse),
    /// JSON that is not a JSON-RPC message.
    Invalid {
        /// The element's `id` field, when one could be read.
        id: Option<RequestId>,
        /// The error to report for this element.
        error: McpError,
    },
}

impl IncomingMessage {
    /// Returns the contained request, if this element is one.
    #[must_use]
    pub fn as_request(&self) -> Option<&JsonRpcRequest> {
        match self {
            IncomingMessage::Request(req) => Some(req),
            _ => None,
        }
    }
}

/// A parsed incoming message: either one message or a batch.
#[derive(Debug, Clone)]
pub struct IncomingBatch {
    /// The classified elements, in wire order.
    pub messages: Vec<IncomingMessage>,
    /// True when the input was a top-level array.
    pub batched: bool,
}

impl IncomingBatch {
    /// Returns the first request in wire order, if any.
    #[must_use]
    pub fn first_request(&self) -> Option<&JsonRpcRequest> {
        self.messages.iter().find_map(IncomingMessage::as_request)
    }
}

/// Parses raw bytes into one message or a batch.
///
/// # Errors
///
/// Returns `ParseError` when the input is not valid JSON at all. Invalid
/// elements inside an otherwise-valid batch do NOT fail the parse; they
/// surface as [`IncomingMessage::Invalid`].
pub fn parse_incoming(raw: &[u8]) -> McpResult<IncomingBatch> {
    let value: Value = serde_json::from_slice(raw).map_err(|_| McpError::parse_error())?;

    match value {
        Value::Array(elements) => Ok(IncomingBatch {
            messages: elements.into_iter().map(classify).collect(),
            batched: true,
        }),
        other => Ok(IncomingBatch {
            messages: vec![classify(other)],
            batched: false,
        }),
    }
}

/// Classifies one JSON value as a request, response, or invalid element.
///
/// The shape is checked before deserializing: every `JsonRpcResponse`
/// field except `jsonrpc` is optional, so untagged deserialization alone
/// would absorb a method-less object like `{"jsonrpc":"2.0","id":5}` into
/// the response arm and the dispatcher would silently drop it. An object
/// with no `method` and no `result`/`error` is not a message; it gets a
/// structured invalid-request error instead.
fn classify(value: Value) -> IncomingMessage {
    // Remember the id before the value is consumed, for error reporting.
    let id = value
        .get("id")
        .cloned()
        .and_then(|id| serde_json::from_value::<RequestId>(id).ok());

    let (has_method, has_result_or_error) = match value.as_object() {
        Some(obj) => (
            obj.contains_key("method"),
            obj.contains_key("result") || obj.contains_key("error"),
        ),
        None => return invalid_element(id),
    };

    if has_method {
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(req) => IncomingMessage::Request(req),
            Err(_) => invalid_element(id),
        }
    } else if has_result_or_error {
        match serde_json::from_value::<JsonRpcResponse>(value) {
            Ok(resp) => IncomingMessage::Response(resp),
            Err(_) => invalid_element(id),
        }
    } else {
        invalid_element(id)
    }
}

fn invalid_element(id: Option<RequestId>) -> IncomingMessage {
    IncomingMessage::Invalid {
        id,
        error: McpError::invalid_request("Not a valid JSON-RPC message"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialization() {
        let req = JsonRpcRequest::new("list_tools", None, 1i64);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"list_tools\""));
        assert!(!json.contains("params"));
    }

    #[test]
    fn notification_has_no_id() {
        let notif = JsonRpcRequest::notification("ping", None);
        assert!(notif.is_notification());
        let json = serde_json::to_string(&notif).unwrap();
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn parse_single_request() {
        let batch = parse_incoming(br#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#).unwrap();
        assert!(!batch.batched);
        assert_eq!(batch.messages.len(), 1);
        let req = batch.first_request().unwrap();
        assert_eq!(req.method, "ping");
        assert_eq!(req.id, Some(RequestId::Number(1)));
    }

    #[test]
    fn parse_batch_preserves_order() {
        let raw = br#"[{"jsonrpc":"2.0","method":"ping"},{"jsonrpc":"2.0","id":7,"method":"list_tools"}]"#;
        let batch = parse_incoming(raw).unwrap();
        assert!(batch.batched);
        assert_eq!(batch.messages.len(), 2);
        assert!(batch.messages[0].as_request().unwrap().is_notification());
        assert_eq!(batch.messages[1].as_request().unwrap().method, "list_tools");
    }

    #[test]
    fn parse_empty_batch_yields_no_messages() {
        let batch = parse_incoming(b"[]").unwrap();
        assert!(batch.batched);
        assert!(batch.messages.is_empty());
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let err = parse_incoming(b"{not json").unwrap_err();
        assert_eq!(err.code, gatemcp_core::McpErrorCode::ParseError);
    }

    #[test]
    fn invalid_batch_element_is_classified_not_fatal() {
        let raw = br#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"id":2,"bogus":true}]"#;
        let batch = parse_incoming(raw).unwrap();
        assert_eq!(batch.messages.len(), 2);
        match &batch.messages[1] {
            IncomingMessage::Invalid { id, error } => {
                assert_eq!(*id, Some(RequestId::Number(2)));
                assert_eq!(error.code, gatemcp_core::McpErrorCode::InvalidRequest);
            }
            other => panic!("expected invalid element, got {other:?}"),
        }
    }

    #[test]
    fn response_elements_are_recognized() {
        let raw = br#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let batch = parse_incoming(raw).unwrap();
        assert!(matches!(batch.messages[0], IncomingMessage::Response(_)));
    }

    #[test]
    fn method_less_object_is_invalid_not_a_response() {
        // Missing `method` and missing `result`/`error`: not a message,
        // even though every response field is optional.
        let batch = parse_incoming(br#"{"jsonrpc":"2.0","id":5}"#).unwrap();
        match &batch.messages[0] {
            IncomingMessage::Invalid { id, error } => {
                assert_eq!(*id, Some(RequestId::Number(5)));
                assert_eq!(error.code, gatemcp_core::McpErrorCode::InvalidRequest);
            }
            other => panic!("expected invalid element, got {other:?}"),
        }
    }

    #[test]
    fn method_less_object_without_id_is_invalid() {
        let batch = parse_incoming(br#"{"jsonrpc":"2.0"}"#).unwrap();
        match &batch.messages[0] {
            IncomingMessage::Invalid { id, error } => {
                assert!(id.is_none());
                assert_eq!(error.code, gatemcp_core::McpErrorCode::InvalidRequest);
            }
            other => panic!("expected invalid element, got {other:?}"),
        }
    }

    #[test]
    fn param_str_reads_nested_field() {
        let req = JsonRpcRequest::new(
            "read_resource",
            Some(serde_json::json!({"uri": "example://a"})),
            1i64,
        );
        assert_eq!(req.param_str("uri"), Some("example://a"));
        assert_eq!(req.param_str("missing"), None);
    }
}
