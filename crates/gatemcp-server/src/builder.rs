//! Server builder.
//!
//! Registers resources, templates, tools, and backends, then wires up the
//! caches, pools, authenticator, and metrics in [`ServerBuilder::build`].

use std::sync::{Arc, RwLock};

use gatemcp_core::{ObjectPool, ThreadPool};
use gatemcp_protocol::{Resource, ResourceTemplate, Tool};

use crate::auth::Authenticator;
use crate::cache::ResourceCache;
use crate::config::{BackendConfig, ServerConfig};
use crate::gateway::Backend;
use crate::metrics::PerformanceMetrics;
use crate::rate_limit::RateLimiter;
use crate::registry::{ResourceProducer, ServerRegistry, TemplateProducer, ToolHandler};
use crate::schema_cache::SchemaCache;
use crate::{Lifecycle, Server, ServerInner};

/// Builder for configuring a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    registry: ServerRegistry,
}

impl ServerBuilder {
    /// Creates a builder from a configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            registry: ServerRegistry::new(),
        }
    }

    /// Registers a static resource.
    #[must_use]
    pub fn resource(mut self, resource: Resource) -> Self {
        self.registry.add_resource(resource);
        self
    }

    /// Registers a resource template without a producer (descriptive only).
    #[must_use]
    pub fn template(mut self, template: ResourceTemplate) -> Self {
        self.registry.add_template(template, None);
        self
    }

    /// Registers a resource template routed to `producer`.
    #[must_use]
    pub fn template_producer<P: TemplateProducer + 'static>(
        mut self,
        template: ResourceTemplate,
        producer: P,
    ) -> Self {
        self.registry.add_template(template, Some(Arc::new(producer)));
        self
    }

    /// Registers a tool with its handler.
    #[must_use]
    pub fn tool<H: ToolHandler + 'static>(mut self, tool: Tool, handler: H) -> Self {
        self.registry.add_tool(tool, Arc::new(handler));
        self
    }

    /// Sets the fallback producer for URIs no template matches.
    #[must_use]
    pub fn default_producer<P: ResourceProducer + 'static>(mut self, producer: P) -> Self {
        self.registry.set_default_producer(Arc::new(producer));
        self
    }

    /// Appends a backend (enables gateway mode).
    #[must_use]
    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backends.push(backend);
        self
    }

    /// Builds the server.
    #[must_use]
    pub fn build(self) -> Server {
        let config = self.config;

        let resource_cache =
            ResourceCache::new(config.cache_capacity, config.cache_default_ttl());
        let schema_cache = SchemaCache::new(config.schema_cache_capacity);
        let authenticator = Authenticator::from_config(config.api_key.as_deref());
        let limiter = (config.rate_limit_max > 0)
            .then(|| RateLimiter::new(config.rate_limit_max, config.rate_limit_window()));
        let backends = config.backends.iter().cloned().map(Backend::new).collect();
        let workers = ThreadPool::new(config.worker_count, config.queue_capacity);

        Server {
            inner: Arc::new(ServerInner {
                config,
                registry: RwLock::new(self.registry),
                resource_cache,
                schema_cache,
                content_pool: ObjectPool::new(),
                authenticator,
                metrics: PerformanceMetrics::new(),
                limiter,
                backends,
                workers,
                lifecycle: Lifecycle::new(),
            }),
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}
