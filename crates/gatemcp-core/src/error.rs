//! Error types for MCP operations.
//!
//! Every failure the server can report to a client maps onto one
//! [`McpErrorCode`]. Handlers return [`McpResult`]; the dispatcher turns
//! errors into JSON-RPC error responses and never panics.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error codes used in JSON-RPC error responses.
///
/// The first five are the standard JSON-RPC 2.0 codes; the rest occupy the
/// implementation-defined `-32000..-32099` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum McpErrorCode {
    /// Invalid JSON was received.
    ParseError,
    /// The message is not a valid request object (or the batch is empty).
    InvalidRequest,
    /// The method does not exist.
    MethodNotFound,
    /// Invalid method parameters.
    InvalidParams,
    /// Internal server error.
    InternalError,
    /// A transport-level failure (gateway send/receive).
    TransportError,
    /// The requested resource does not exist.
    ResourceNotFound,
    /// The caller is not permitted to access the resource or tool.
    Forbidden,
    /// The caller exceeded its rate limit.
    TooManyRequests,
    /// The server is shutting down and accepts no new work.
    ServerShuttingDown,
}

impl McpErrorCode {
    /// Returns the canonical message for this code.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            McpErrorCode::ParseError => "Parse error",
            McpErrorCode::InvalidRequest => "Invalid request",
            McpErrorCode::MethodNotFound => "Method not found",
            McpErrorCode::InvalidParams => "Invalid params",
            McpErrorCode::InternalError => "Internal error",
            McpErrorCode::TransportError => "Transport error",
            McpErrorCode::ResourceNotFound => "Resource not found",
            McpErrorCode::Forbidden => "Access denied",
            McpErrorCode::TooManyRequests => "Rate limit exceeded",
            McpErrorCode::ServerShuttingDown => "Server is shutting down",
        }
    }
}

impl From<McpErrorCode> for i32 {
    fn from(code: McpErrorCode) -> Self {
        match code {
            McpErrorCode::ParseError => -32700,
            McpErrorCode::InvalidRequest => -32600,
            McpErrorCode::MethodNotFound => -32601,
            McpErrorCode::InvalidParams => -32602,
            McpErrorCode::InternalError => -32603,
            McpErrorCode::TransportError => -32001,
            McpErrorCode::ResourceNotFound => -32002,
            McpErrorCode::Forbidden => -32003,
            McpErrorCode::TooManyRequests => -32004,
            McpErrorCode::ServerShuttingDown => -32005,
        }
    }
}

/// An MCP error: a code, a human-readable message, optional payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    /// Error code.
    pub code: McpErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Additional error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    /// Creates a new error with the given code and message.
    #[must_use]
    pub fn new(code: McpErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attaches a data payload to the error.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Invalid JSON on the wire.
    #[must_use]
    pub fn parse_error() -> Self {
        Self::new(McpErrorCode::ParseError, McpErrorCode::ParseError.message())
    }

    /// Malformed request object or empty batch.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidRequest, message)
    }

    /// Unknown method.
    #[must_use]
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            McpErrorCode::MethodNotFound,
            McpErrorCode::MethodNotFound.message(),
        )
        .with_data(serde_json::json!({ "method": method }))
    }

    /// Invalid method parameters.
    #[must_use]
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InvalidParams, message)
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::InternalError, message)
    }

    /// Gateway transport failure.
    #[must_use]
    pub fn transport_error(message: impl Into<String>) -> Self {
        Self::new(McpErrorCode::TransportError, message)
    }

    /// The URI names no known resource.
    #[must_use]
    pub fn resource_not_found(uri: &str) -> Self {
        Self::new(
            McpErrorCode::ResourceNotFound,
            format!("Resource not found: {uri}"),
        )
    }

    /// Permission check failed for a resource read.
    #[must_use]
    pub fn forbidden_resource() -> Self {
        Self::new(McpErrorCode::Forbidden, "Access denied to resource")
    }

    /// Permission check failed for a tool call.
    #[must_use]
    pub fn forbidden_tool() -> Self {
        Self::new(McpErrorCode::Forbidden, "Access denied to tool")
    }

    /// The caller exceeded its rate limit.
    #[must_use]
    pub fn too_many_requests() -> Self {
        Self::new(
            McpErrorCode::TooManyRequests,
            McpErrorCode::TooManyRequests.message(),
        )
    }

    /// The server no longer accepts new messages.
    #[must_use]
    pub fn shutting_down() -> Self {
        Self::new(
            McpErrorCode::ServerShuttingDown,
            McpErrorCode::ServerShuttingDown.message(),
        )
    }
}

impl std::fmt::Display for McpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, i32::from(self.code))
    }
}

impl std::error::Error for McpError {}

impl From<serde_json::Error> for McpError {
    fn from(err: serde_json::Error) -> Self {
        McpError::internal_error(format!("JSON serialization failed: {err}"))
    }
}

/// Result alias used throughout the server.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes() {
        assert_eq!(i32::from(McpErrorCode::ParseError), -32700);
        assert_eq!(i32::from(McpErrorCode::InvalidRequest), -32600);
        assert_eq!(i32::from(McpErrorCode::MethodNotFound), -32601);
        assert_eq!(i32::from(McpErrorCode::InvalidParams), -32602);
        assert_eq!(i32::from(McpErrorCode::InternalError), -32603);
        assert_eq!(i32::from(McpErrorCode::Forbidden), -32003);
    }

    #[test]
    fn constructor_messages() {
        assert_eq!(McpError::forbidden_tool().message, "Access denied to tool");
        assert_eq!(
            McpError::forbidden_resource().message,
            "Access denied to resource"
        );
        assert_eq!(McpError::parse_error().message, "Parse error");
        assert!(
            McpError::resource_not_found("demo://x")
                .message
                .contains("demo://x")
        );
    }

    #[test]
    fn display_includes_code() {
        let err = McpError::method_not_found("frobnicate");
        let rendered = err.to_string();
        assert!(rendered.contains("-32601"));
        assert!(rendered.contains("Method not found"));
    }
}
