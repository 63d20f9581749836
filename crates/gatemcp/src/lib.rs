//! GateMCP: an MCP server runtime.
//!
//! This facade crate re-exports the public surface of the workspace:
//! the server core (dispatcher, caches, pools, gateway), the protocol
//! types, and the stream transports.
//!
//! # Quick start
//!
//! ```ignore
//! use gatemcp::prelude::*;
//!
//! struct Echo;
//!
//! impl ToolHandler for Echo {
//!     fn call(
//!         &self,
//!         arguments: &serde_json::Value,
//!         _ctx: &AuthContext,
//!         pool: &ObjectPool,
//!     ) -> McpResult<Vec<PooledContent>> {
//!         let text = arguments["text"].as_str().unwrap_or_default();
//!         Ok(vec![pool.acquire_filled(ContentType::Text, "text/plain", text.as_bytes())?])
//!     }
//! }
//!
//! fn main() {
//!     let server = Server::builder(ServerConfig::default())
//!         .tool(
//!             Tool::new("echo").with_param(ToolParam::required("text", ParamType::String)),
//!             Echo,
//!         )
//!         .build();
//!     server.serve(gatemcp_transport::stdio());
//! }
//! ```

#![forbid(unsafe_code)]

pub use gatemcp_core;
pub use gatemcp_protocol;
pub use gatemcp_server;
pub use gatemcp_transport;

/// Commonly used items, re-exported flat.
pub mod prelude {
    pub use gatemcp_core::{
        AuthContext, AuthKind, ContentItem, ContentType, McpError, McpErrorCode, McpResult,
        ObjectPool, PooledContent, ThreadPool,
    };
    pub use gatemcp_protocol::{
        JsonRpcRequest, JsonRpcResponse, ParamType, RequestId, Resource, ResourceTemplate, Tool,
        ToolParam,
    };
    pub use gatemcp_server::{
        BackendConfig, ResourceProducer, Server, ServerBuilder, ServerConfig, TemplateProducer,
        ToolHandler, Ttl, UriParams,
    };
    pub use gatemcp_transport::{Transport, stdio, tcp};
}
