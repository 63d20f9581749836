//! MCP protocol types and JSON-RPC implementation.
//!
//! This crate provides:
//! - JSON-RPC 2.0 message types and one-or-batch parsing
//! - MCP method params/results (tools, resources, templates, metrics)
//! - Registry value types ([`Resource`], [`ResourceTemplate`], [`Tool`])
//! - JSON-Schema compilation and validation for tool arguments
//!
//! # Wire Format
//!
//! Requests carry `{jsonrpc:"2.0", id, method, params?}`; responses carry
//! `{jsonrpc:"2.0", id, result | error:{code,message}}`. Batches are
//! top-level arrays; notifications omit `id` and receive no response.

#![forbid(unsafe_code)]

mod jsonrpc;
mod messages;
pub mod schema;
mod types;

pub use jsonrpc::{
    JSONRPC_VERSION, IncomingBatch, IncomingMessage, JsonRpcError, JsonRpcMessage, JsonRpcRequest,
    JsonRpcResponse, RequestId, parse_incoming,
};
pub use messages::*;
pub use schema::{CompiledSchema, SchemaError, ValidationError, ValidationResult};
pub use types::*;
