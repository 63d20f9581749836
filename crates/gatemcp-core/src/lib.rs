//! Core types and shared infrastructure for GateMCP.
//!
//! This crate provides the fundamental building blocks:
//! - Error taxonomy ([`McpError`], [`McpErrorCode`])
//! - Authentication context with trailing-`*` permission matching
//! - Content items and the process-wide [`ObjectPool`]
//! - The fixed-size [`ThreadPool`] runtime
//!
//! # Design Principles
//!
//! - All shared types are `Send + Sync`
//! - Every ownership transfer is visible in the type: pool acquisition
//!   returns an RAII guard, never a raw pointer-style handle
//! - No global state; pools and caches are explicit members of the server

#![forbid(unsafe_code)]

mod auth;
mod content;
mod error;
pub mod logging;
mod pool;
mod runtime;

pub use auth::{AuthContext, AuthKind, wildcard_match};
pub use content::{ContentItem, ContentType};
pub use error::{McpError, McpErrorCode, McpResult};
pub use pool::{ObjectPool, PoolStats, PooledContent};
pub use runtime::{ShutdownMode, ThreadPool, ThreadPoolError};
