//! MCP method params and results.
//!
//! Wire types for the canonical method surface: `ping`, `list_resources`,
//! `list_resource_templates`, `read_resource`, `list_tools`, `call_tool`,
//! and the metrics methods.

use gatemcp_core::{ContentItem, ContentType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Tool;

// ============================================================================
// Ping
// ============================================================================

/// `ping` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    /// Always "pong".
    pub message: String,
}

impl PingResult {
    /// The canonical pong.
    #[must_use]
    pub fn pong() -> Self {
        Self {
            message: "pong".to_owned(),
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// `list_resources` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourcesResult {
    /// Registered resources.
    pub resources: Vec<crate::types::Resource>,
}

/// `list_resource_templates` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResourceTemplatesResult {
    /// Registered resource templates.
    #[serde(rename = "resourceTemplates")]
    pub resource_templates: Vec<crate::types::ResourceTemplate>,
}

/// `read_resource` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    /// Resource URI to read.
    pub uri: String,
}

/// One content element of a `read_resource` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceContents {
    /// URI the content belongs to.
    pub uri: String,
    /// MIME type.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// UTF-8 text payload; present only for text items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ResourceContents {
    /// Builds the wire form of one content item read from `uri`.
    #[must_use]
    pub fn from_item(uri: &str, item: &ContentItem) -> Self {
        Self {
            uri: uri.to_owned(),
            mime_type: (!item.mime_type().is_empty()).then(|| item.mime_type().to_owned()),
            text: item.as_text().map(str::to_owned),
        }
    }
}

/// `read_resource` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceResult {
    /// Resource contents, one element per content item.
    pub contents: Vec<ResourceContents>,
}

// ============================================================================
// Tools
// ============================================================================

/// Wire descriptor for one tool in `list_tools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON-Schema for the tool's arguments, if it declares parameters.
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}

impl From<&Tool> for ToolDescriptor {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: tool.input_schema(),
        }
    }
}

/// `list_tools` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    /// Registered tools.
    pub tools: Vec<ToolDescriptor>,
}

/// `call_tool` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    /// Tool name to call.
    pub name: String,
    /// Tool arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// One content element of a `call_tool` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolContent {
    /// Content kind: "text", "json", or "binary".
    #[serde(rename = "type")]
    pub content_type: ContentType,
    /// MIME type.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// UTF-8 text payload; present only for text items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ToolContent {
    /// Builds the wire form of one tool output item.
    #[must_use]
    pub fn from_item(item: &ContentItem) -> Self {
        Self {
            content_type: item.content_type(),
            mime_type: (!item.mime_type().is_empty()).then(|| item.mime_type().to_owned()),
            text: item.as_text().map(str::to_owned),
        }
    }

    /// A plain-text content element.
    #[must_use]
    pub fn plain_text(text: impl Into<String>) -> Self {
        Self {
            content_type: ContentType::Text,
            mime_type: Some("text/plain".to_owned()),
            text: Some(text.into()),
        }
    }
}

/// `call_tool` result.
///
/// `isError` is always serialized: tool-level failures are reported as
/// content with `isError: true`, not as JSON-RPC errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResult {
    /// Tool output content.
    pub content: Vec<ToolContent>,
    /// Whether the tool call failed.
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful result wrapping the given content.
    #[must_use]
    pub fn ok(content: Vec<ToolContent>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    /// A failed result carrying the error text as content.
    #[must_use]
    pub fn tool_error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::plain_text(message)],
            is_error: true,
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// `reset_performance_metrics` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetMetricsResult {
    /// Always true.
    pub success: bool,
}

impl ResetMetricsResult {
    /// The canonical success acknowledgement.
    #[must_use]
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatemcp_core::ObjectPool;
    use serde_json::json;

    #[test]
    fn ping_result_shape() {
        let value = serde_json::to_value(PingResult::pong()).unwrap();
        assert_eq!(value, json!({"message": "pong"}));
    }

    #[test]
    fn call_tool_result_always_carries_is_error() {
        let result = CallToolResult::ok(vec![ToolContent::plain_text("hi")]);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "content": [{"type": "text", "mimeType": "text/plain", "text": "hi"}],
                "isError": false
            })
        );
    }

    #[test]
    fn tool_error_result() {
        let result = CallToolResult::tool_error("boom");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["content"][0]["text"], "boom");
    }

    #[test]
    fn resource_contents_text_only_for_text_items() {
        let pool = ObjectPool::new();
        let text = pool
            .acquire_filled(ContentType::Text, "text/plain", b"hello")
            .unwrap();
        let binary = pool
            .acquire_filled(ContentType::Binary, "application/octet-stream", b"\x00\x01")
            .unwrap();

        let wire_text = ResourceContents::from_item("example://a", &text);
        assert_eq!(wire_text.text.as_deref(), Some("hello"));
        assert_eq!(wire_text.mime_type.as_deref(), Some("text/plain"));

        let wire_binary = ResourceContents::from_item("example://a", &binary);
        assert!(wire_binary.text.is_none());
    }

    #[test]
    fn tool_descriptor_includes_schema() {
        use crate::types::{ParamType, ToolParam};
        let tool = Tool::new("echo").with_param(ToolParam::required("text", ParamType::String));
        let descriptor = ToolDescriptor::from(&tool);
        let value = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "echo",
                "inputSchema": {
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }
            })
        );
    }

    #[test]
    fn read_resource_params_roundtrip() {
        let params: ReadResourceParams =
            serde_json::from_value(json!({"uri": "example://a"})).unwrap();
        assert_eq!(params.uri, "example://a");
    }
}
