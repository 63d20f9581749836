//! MCP server runtime.
//!
//! This crate provides the server core:
//! - Top-level message dispatch (parse, authenticate, route, respond)
//! - Resource and schema caches backed by the content pool
//! - Gateway mode with per-backend connection pools
//! - Registry, builder, and cooperative shutdown
//!
//! # Example
//!
//! ```ignore
//! use gatemcp_server::{Server, ServerConfig};
//!
//! let server = Server::builder(ServerConfig::default())
//!     .tool(echo_tool(), EchoHandler)
//!     .build();
//! server.serve(gatemcp_transport::stdio());
//! ```

#![forbid(unsafe_code)]

mod auth;
mod builder;
mod cache;
mod config;
mod dispatcher;
pub mod gateway;
mod handlers;
mod metrics;
mod rate_limit;
mod registry;
mod router;
mod schema_cache;


pub use auth::Authenticator;
pub use builder::ServerBuilder;
pub use cache::{CacheStats, ResourceCache, Ttl};
pub use config::{BackendConfig, ConfigError, ServerConfig};
pub use gateway::{Backend, ConnectionPool, PoolError};
pub use metrics::{MetricsSnapshot, PerformanceMetrics};
pub use rate_limit::RateLimiter;
pub use registry::{
    ResourceProducer, ServerRegistry, TemplateProducer, ToolHandler, UriParams,
};
pub use router::LocalMethod;
pub use schema_cache::{SchemaCache, SchemaCacheStats};

use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use gatemcp_core::logging::{debug, error, info, targets, warn};
use gatemcp_core::{McpError, ObjectPool, PoolStats, ShutdownMode, ThreadPool};
use gatemcp_protocol::{JsonRpcResponse, RequestId, Resource, ResourceTemplate, Tool};
use gatemcp_transport::{Transport, TransportError};

/// An MCP server instance.
///
/// Cloning is cheap; all clones share the same state, so a clone can be
/// moved onto a worker thread per connection.
pub struct Server {
    pub(crate) inner: Arc<ServerInner>,
}

impl Clone for Server {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct ServerInner {
    pub(crate) config: ServerConfig,
    pub(crate) registry: RwLock<ServerRegistry>,
    pub(crate) resource_cache: ResourceCache,
    pub(crate) schema_cache: SchemaCache,
    pub(crate) content_pool: ObjectPool,
    pub(crate) authenticator: Authenticator,
    pub(crate) metrics: PerformanceMetrics,
    pub(crate) limiter: Option<RateLimiter>,
    pub(crate) backends: Vec<Backend>,
    pub(crate) workers: ThreadPool,
    pub(crate) lifecycle: Lifecycle,
}

impl Server {
    /// Creates a builder for the given configuration.
    #[must_use]
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Handles one raw message from `client`, returning response bytes.
    ///
    /// Returns `None` when the message produced nothing to send (all
    /// notifications, or only dropped elements).
    #[must_use]
    pub fn handle_message(&self, raw: &[u8], client: &str) -> Option<Vec<u8>> {
        self.inner.handle_message(raw, client)
    }

    /// Serves one transport until it closes or the server stops.
    pub fn serve<T: Transport>(&self, mut transport: T) {
        let client = transport.client_identity().to_owned();
        debug!(target: targets::SERVER, "Serving client '{client}'");
        loop {
            if self.is_shutting_down() {
                break;
            }
            match transport.recv() {
                Ok(frame) => {
                    if let Some(response) = self.handle_message(&frame, &client) {
                        if let Err(e) = transport.send(&response) {
                            error!(target: targets::TRANSPORT, "Send failed for '{client}': {e}");
                            break;
                        }
                    }
                }
                Err(TransportError::Closed) => {
                    debug!(target: targets::TRANSPORT, "Client '{client}' disconnected");
                    break;
                }
                Err(TransportError::FrameTooLarge(size)) => {
                    warn!(target: targets::TRANSPORT, "Oversized frame from '{client}': {size} bytes");
                    let response = JsonRpcResponse::error(
                        RequestId::zero(),
                        McpError::invalid_request("Message exceeds maximum size"),
                    );
                    if let Ok(bytes) = serde_json::to_vec(&response) {
                        let _ = transport.send(&bytes);
                    }
                }
                Err(TransportError::Io(e)) => {
                    error!(target: targets::TRANSPORT, "Transport error for '{client}': {e}");
                    break;
                }
            }
        }
    }

    /// Accepts TCP connections and serves each on a pool worker.
    ///
    /// Returns when the server stops or the worker pool shuts down.
    pub fn serve_tcp(&self, listener: TcpListener) -> std::io::Result<()> {
        info!(
            target: targets::SERVER,
            "Listening on {}",
            listener.local_addr()?
        );
        for stream in listener.incoming() {
            if self.is_shutting_down() {
                break;
            }
            match stream {
                Ok(stream) => match gatemcp_transport::tcp(stream) {
                    Ok(transport) => {
                        let server = self.clone();
                        if self
                            .inner
                            .workers
                            .submit(move || server.serve(transport))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(target: targets::TRANSPORT, "Failed to set up connection: {e}");
                    }
                },
                Err(e) => {
                    warn!(target: targets::TRANSPORT, "Accept failed: {e}");
                }
            }
        }
        Ok(())
    }

    /// Begins shutdown: new messages fail fast, in-flight ones finish.
    ///
    /// Calling `stop` more than once is equivalent to calling it once.
    pub fn stop(&self) {
        if !self.inner.lifecycle.stop() {
            return;
        }
        info!(target: targets::SERVER, "Shutdown requested");
    }

    /// Returns true once shutdown has begun.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.lifecycle.is_shutting_down()
    }

    /// Waits until no messages are in flight.
    ///
    /// Returns `false` when the timeout expires first.
    pub fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        self.inner.lifecycle.wait_idle(timeout)
    }

    /// Stops the server, waits for in-flight messages, then winds down
    /// the worker pool. Returns `false` when the wait timed out.
    pub fn shutdown(&self, timeout: Option<Duration>) -> bool {
        self.stop();
        let drained = self.wait_idle(timeout);
        self.inner.workers.shutdown(ShutdownMode::Graceful);
        drained
    }

    /// Returns a snapshot of the performance counters.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Returns resource cache statistics.
    #[must_use]
    pub fn resource_cache_stats(&self) -> CacheStats {
        self.inner.resource_cache.stats()
    }

    /// Returns schema cache statistics.
    #[must_use]
    pub fn schema_cache_stats(&self) -> SchemaCacheStats {
        self.inner.schema_cache.stats()
    }

    /// Returns content pool statistics.
    #[must_use]
    pub fn content_pool_stats(&self) -> PoolStats {
        self.inner.content_pool.stats()
    }

    // ------------------------------------------------------------------
    // Registry administration.
    //
    // Registries are read-mostly: these writes are meant for use before
    // serving starts or from an embedding application's admin path, and
    // they serialize against request handling on the registry lock.
    // ------------------------------------------------------------------

    /// Installs (or replaces) a static resource.
    pub fn add_resource(&self, resource: Resource) {
        self.registry_mut().add_resource(resource);
    }

    /// Removes a static resource.
    pub fn remove_resource(&self, uri: &str) {
        self.registry_mut().remove_resource(uri);
    }

    /// Installs a resource template with a producer.
    pub fn add_template<P: TemplateProducer + 'static>(
        &self,
        template: ResourceTemplate,
        producer: P,
    ) {
        self.registry_mut()
            .add_template(template, Some(Arc::new(producer)));
    }

    /// Installs (or replaces) a tool.
    pub fn add_tool<H: ToolHandler + 'static>(&self, tool: Tool, handler: H) {
        self.registry_mut().add_tool(tool, Arc::new(handler));
    }

    /// Removes a tool.
    pub fn remove_tool(&self, name: &str) {
        self.registry_mut().remove_tool(name);
    }

    /// Invalidates one cached resource.
    pub fn invalidate_resource(&self, uri: &str) {
        self.inner.resource_cache.invalidate(uri);
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, ServerRegistry> {
        self.inner.registry.write().expect("registry lock poisoned")
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &ServerInner {
        &self.inner
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("name", &self.inner.config.name)
            .field("gateway", &!self.inner.backends.is_empty())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}

/// Shutdown barrier: an atomic flag plus an active-message counter with a
/// condition variable signalled when the counter reaches zero.
pub(crate) struct Lifecycle {
    shutting_down: AtomicBool,
    active: Mutex<u64>,
    idle: Condvar,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            active: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    /// Sets the flag; returns `false` when shutdown was already requested.
    pub(crate) fn stop(&self) -> bool {
        let first = !self.shutting_down.swap(true, Ordering::SeqCst);
        if first {
            // Wake waiters so an already-idle server observes the stop.
            self.idle.notify_all();
        }
        first
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub(crate) fn message_started(&self) {
        let mut active = self.active.lock().expect("lifecycle lock poisoned");
        *active += 1;
    }

    pub(crate) fn message_finished(&self) {
        let mut active = self.active.lock().expect("lifecycle lock poisoned");
        *active -= 1;
        if *active == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn wait_idle(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut active = self.active.lock().expect("lifecycle lock poisoned");
        while *active > 0 {
            match deadline {
                Some(at) => {
                    let remaining = at.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    let (guard, _) = self
                        .idle
                        .wait_timeout(active, remaining)
                        .expect("lifecycle lock poisoned");
                    active = guard;
                }
                None => {
                    active = self.idle.wait(active).expect("lifecycle lock poisoned");
                }
            }
        }
        true
    }
}
