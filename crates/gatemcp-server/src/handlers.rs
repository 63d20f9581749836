//! Local method handlers.
//!
//! The `read_resource` pipeline: permission check, cache lookup, template
//! routing, default producer, cache populate, response build. `call_tool`
//! validates arguments against the tool's schema (through the schema
//! cache) before invoking the handler; tool failures become content with
//! `isError: true`, not JSON-RPC errors.

use std::time::Duration;

use gatemcp_core::logging::{debug, targets, warn};
use gatemcp_core::{AuthContext, ContentType, McpError, McpResult, PooledContent};
use gatemcp_protocol::{
    CallToolParams, CallToolResult, JsonRpcRequest, ListResourceTemplatesResult,
    ListResourcesResult, ListToolsResult, PingResult, ReadResourceParams, ReadResourceResult,
    ResetMetricsResult, ResourceContents, ToolContent, ToolDescriptor,
};
use serde_json::Value;

use crate::ServerInner;
use crate::cache::Ttl;
use crate::router::LocalMethod;

/// TTL applied to cached text resources.
const TEXT_RESOURCE_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL applied to cached binary (or mixed) resources.
const BINARY_RESOURCE_TTL: Duration = Duration::from_secs(60 * 60);

impl ServerInner {
    /// Dispatches one local method.
    pub(crate) fn dispatch_local(
        &self,
        method: LocalMethod,
        request: &JsonRpcRequest,
        auth: &AuthContext,
    ) -> McpResult<Value> {
        debug!(target: targets::DISPATCH, "Dispatching '{}'", method.name());
        match method {
            // `ping` skips permission checks entirely.
            LocalMethod::Ping => Ok(serde_json::to_value(PingResult::pong())?),
            LocalMethod::ListResources => {
                let registry = self.registry.read().expect("registry lock poisoned");
                Ok(serde_json::to_value(ListResourcesResult {
                    resources: registry.list_resources(),
                })?)
            }
            LocalMethod::ListResourceTemplates => {
                let registry = self.registry.read().expect("registry lock poisoned");
                Ok(serde_json::to_value(ListResourceTemplatesResult {
                    resource_templates: registry.list_templates(),
                })?)
            }
            LocalMethod::ListTools => {
                let registry = self.registry.read().expect("registry lock poisoned");
                Ok(serde_json::to_value(ListToolsResult {
                    tools: registry
                        .list_tools()
                        .iter()
                        .map(ToolDescriptor::from)
                        .collect(),
                })?)
            }
            LocalMethod::ReadResource => self.read_resource(request, auth),
            LocalMethod::CallTool => self.call_tool(request, auth),
            LocalMethod::GetPerformanceMetrics => self.metrics_result(),
            LocalMethod::ResetPerformanceMetrics => {
                self.metrics.reset();
                Ok(serde_json::to_value(ResetMetricsResult::ok())?)
            }
        }
    }

    fn read_resource(&self, request: &JsonRpcRequest, auth: &AuthContext) -> McpResult<Value> {
        let params: ReadResourceParams = parse_params(request.params.clone())?;

        if !auth.can_read_resource(&params.uri) {
            return Err(McpError::forbidden_resource());
        }

        // Cache lookup; hits skip the producers entirely.
        if let Some(items) = self.resource_cache.get(&params.uri, &self.content_pool)? {
            debug!(target: targets::CACHE, "Cache hit: {}", params.uri);
            return build_read_result(&params.uri, &items);
        }

        // Resolve a producer under the registry lock, run it outside.
        let (template_hit, fallback, is_static) = {
            let registry = self.registry.read().expect("registry lock poisoned");
            (
                registry.match_template(&params.uri),
                registry.default_producer(),
                registry.resource(&params.uri).is_some(),
            )
        };

        let produced: Vec<PooledContent> = if let Some((producer, vars)) = template_hit {
            producer.produce(&params.uri, &vars, &self.content_pool)?
        } else if let Some(producer) = fallback {
            producer.produce(&params.uri, &self.content_pool)?
        } else if is_static {
            return Err(McpError::internal_error("Resource has no content handler"));
        } else {
            return Err(McpError::resource_not_found(&params.uri));
        };

        // Populate the cache with freshly produced items. A failed put is
        // not fatal; the response is served either way.
        let ttl = Ttl::For(ttl_for_items(&produced));
        if let Err(err) = self
            .resource_cache
            .put(&params.uri, &self.content_pool, &produced, ttl)
        {
            warn!(target: targets::CACHE, "Cache populate failed for {}: {err}", params.uri);
        }

        build_read_result(&params.uri, &produced)
        // `produced` drops here, releasing every item to the pool.
    }

    fn call_tool(&self, request: &JsonRpcRequest, auth: &AuthContext) -> McpResult<Value> {
        let params: CallToolParams = parse_params(request.params.clone())?;

        if !auth.can_call_tool(&params.name) {
            return Err(McpError::forbidden_tool());
        }

        let found = {
            let registry = self.registry.read().expect("registry lock poisoned");
            registry.find_tool(&params.name)
        };
        let Some((tool, handler)) = found else {
            return Err(McpError::new(
                gatemcp_core::McpErrorCode::MethodNotFound,
                format!("Tool not found: {}", params.name),
            ));
        };

        // MCP tool arguments are always objects; default to empty.
        let arguments = params.arguments.unwrap_or_else(|| serde_json::json!({}));
        if let Some(schema) = tool.input_schema() {
            self.schema_cache.validate(&schema, &arguments)?;
        }

        let result = match handler.call(&arguments, auth, &self.content_pool) {
            Ok(items) => {
                let content = items.iter().map(|item| ToolContent::from_item(item)).collect();
                CallToolResult::ok(content)
                // `items` drop here, releasing to the pool.
            }
            Err(err) => {
                debug!(target: targets::DISPATCH, "Tool '{}' failed: {err}", params.name);
                CallToolResult::tool_error(err.message)
            }
        };
        Ok(serde_json::to_value(result)?)
    }

    fn metrics_result(&self) -> McpResult<Value> {
        let mut value = serde_json::to_value(self.metrics.snapshot())?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "resourceCache".to_owned(),
                serde_json::to_value(self.resource_cache.stats())?,
            );
            obj.insert(
                "schemaCache".to_owned(),
                serde_json::to_value(self.schema_cache.stats())?,
            );
            obj.insert(
                "contentPool".to_owned(),
                serde_json::to_value(self.content_pool.stats())?,
            );
        }
        Ok(value)
    }
}

fn build_read_result(uri: &str, items: &[PooledContent]) -> McpResult<Value> {
    let contents: Vec<ResourceContents> = items
        .iter()
        .map(|item| ResourceContents::from_item(uri, item))
        .collect();
    Ok(serde_json::to_value(ReadResourceResult { contents })?)
}

/// Picks the cache TTL for freshly produced items: text resources are
/// short-lived, anything with binary or JSON payloads keeps longer.
fn ttl_for_items(items: &[PooledContent]) -> Duration {
    let all_text = items
        .iter()
        .all(|item| item.content_type() == ContentType::Text);
    if all_text {
        TEXT_RESOURCE_TTL
    } else {
        BINARY_RESOURCE_TTL
    }
}

/// Parses required parameters from JSON.
fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = params.ok_or_else(|| McpError::invalid_params("Missing required parameters"))?;
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}
