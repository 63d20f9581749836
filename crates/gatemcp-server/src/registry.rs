//! Server registry: resources, resource templates, and tools.
//!
//! The registry is read-mostly. The embedding application installs entries
//! through the builder before serving (or later under the server's admin
//! lock); request handling only reads.

use std::collections::HashMap;
use std::sync::Arc;

use gatemcp_core::{AuthContext, McpResult, ObjectPool, PooledContent};
use gatemcp_protocol::{Resource, ResourceTemplate, Tool};
use serde_json::Value;

/// Variables extracted from a URI template match.
pub type UriParams = HashMap<String, String>;

/// Handler for a registered tool.
pub trait ToolHandler: Send + Sync {
    /// Invokes the tool with validated arguments.
    ///
    /// Output items are acquired from `pool`; the caller releases them
    /// after serializing the response.
    fn call(
        &self,
        arguments: &Value,
        ctx: &AuthContext,
        pool: &ObjectPool,
    ) -> McpResult<Vec<PooledContent>>;
}

/// Producer invoked when a URI matches a registered template.
pub trait TemplateProducer: Send + Sync {
    /// Produces content for `uri`, with `params` holding the expanded
    /// template variables.
    fn produce(
        &self,
        uri: &str,
        params: &UriParams,
        pool: &ObjectPool,
    ) -> McpResult<Vec<PooledContent>>;
}

/// Fallback producer consulted when no template matches.
pub trait ResourceProducer: Send + Sync {
    /// Produces content for `uri`.
    fn produce(&self, uri: &str, pool: &ObjectPool) -> McpResult<Vec<PooledContent>>;
}

struct TemplateEntry {
    template: ResourceTemplate,
    matcher: UriTemplate,
    producer: Option<Arc<dyn TemplateProducer>>,
}

struct ToolEntry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Holds the mappings of resources, templates, and tools.
pub struct ServerRegistry {
    resources: HashMap<String, Resource>,
    templates: Vec<TemplateEntry>,
    tools: Vec<ToolEntry>,
    default_producer: Option<Arc<dyn ResourceProducer>>,
}

impl ServerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            resources: HashMap::new(),
            templates: Vec::new(),
            tools: Vec::new(),
            default_producer: None,
        }
    }

    /// Installs (or replaces) a static resource entry.
    pub fn add_resource(&mut self, resource: Resource) {
        self.resources.insert(resource.uri.clone(), resource);
    }

    /// Removes a static resource entry.
    pub fn remove_resource(&mut self, uri: &str) -> Option<Resource> {
        self.resources.remove(uri)
    }

    /// Installs a resource template, optionally with a producer.
    ///
    /// Templates are matched in installation order; first match wins.
    pub fn add_template(
        &mut self,
        template: ResourceTemplate,
        producer: Option<Arc<dyn TemplateProducer>>,
    ) {
        let matcher = UriTemplate::new(&template.uri_template);
        if let Some(existing) = self
            .templates
            .iter_mut()
            .find(|entry| entry.template.uri_template == template.uri_template)
        {
            existing.template = template;
            existing.matcher = matcher;
            existing.producer = producer;
        } else {
            self.templates.push(TemplateEntry {
                template,
                matcher,
                producer,
            });
        }
    }

    /// Removes a template by its URI pattern.
    pub fn remove_template(&mut self, uri_template: &str) {
        self.templates
            .retain(|entry| entry.template.uri_template != uri_template);
    }

    /// Installs (or replaces) a tool with its handler.
    pub fn add_tool(&mut self, tool: Tool, handler: Arc<dyn ToolHandler>) {
        if let Some(existing) = self.tools.iter_mut().find(|entry| entry.tool.name == tool.name) {
            existing.tool = tool;
            existing.handler = handler;
        } else {
            self.tools.push(ToolEntry { tool, handler });
        }
    }

    /// Removes a tool by name.
    pub fn remove_tool(&mut self, name: &str) {
        self.tools.retain(|entry| entry.tool.name != name);
    }

    /// Sets the fallback producer for URIs no template matches.
    pub fn set_default_producer(&mut self, producer: Arc<dyn ResourceProducer>) {
        self.default_producer = Some(producer);
    }

    /// Returns the static resource registered under `uri`.
    #[must_use]
    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    /// Lists static resources, ordered by URI.
    #[must_use]
    pub fn list_resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.resources.values().cloned().collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    /// Lists templates in installation order.
    #[must_use]
    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        self.templates
            .iter()
            .map(|entry| entry.template.clone())
            .collect()
    }

    /// Lists tools in installation order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(|entry| entry.tool.clone()).collect()
    }

    /// Finds a tool and its handler by name.
    #[must_use]
    pub fn find_tool(&self, name: &str) -> Option<(Tool, Arc<dyn ToolHandler>)> {
        self.tools
            .iter()
            .find(|entry| entry.tool.name == name)
            .map(|entry| (entry.tool.clone(), Arc::clone(&entry.handler)))
    }

    /// Matches `uri` against installed templates, first match wins.
    ///
    /// Only templates with a producer participate in routing; listed
    /// templates without one are descriptive.
    #[must_use]
    pub fn match_template(&self, uri: &str) -> Option<(Arc<dyn TemplateProducer>, UriParams)> {
        for entry in &self.templates {
            let Some(producer) = entry.producer.as_ref() else {
                continue;
            };
            if let Some(params) = entry.matcher.matches(uri) {
                return Some((Arc::clone(producer), params));
            }
        }
        None
    }

    /// Returns the fallback producer, if one is installed.
    #[must_use]
    pub fn default_producer(&self) -> Option<Arc<dyn ResourceProducer>> {
        self.default_producer.clone()
    }
}

impl Default for ServerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerRegistry")
            .field("resources", &self.resources.len())
            .field("templates", &self.templates.len())
            .field("tools", &self.tools.len())
            .field("has_default_producer", &self.default_producer.is_some())
            .finish()
    }
}

/// A compiled `{var}` URI template (RFC-6570 level 1).
#[derive(Debug, Clone)]
struct UriTemplate {
    segments: Vec<UriSegment>,
}

#[derive(Debug, Clone)]
enum UriSegment {
    Literal(String),
    Param(String),
}

impl UriTemplate {
    fn new(pattern: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = pattern.chars();

        while let Some(ch) = chars.next() {
            if ch == '{' {
                if !literal.is_empty() {
                    segments.push(UriSegment::Literal(std::mem::take(&mut literal)));
                }

                let mut name = String::new();
                for next in chars.by_ref() {
                    if next == '}' {
                        break;
                    }
                    name.push(next);
                }

                if name.is_empty() {
                    // `{}` is not a variable; keep it literal.
                    literal.push('{');
                    literal.push('}');
                } else {
                    segments.push(UriSegment::Param(name));
                }
            } else {
                literal.push(ch);
            }
        }

        if !literal.is_empty() {
            segments.push(UriSegment::Literal(literal));
        }

        Self { segments }
    }

    fn matches(&self, uri: &str) -> Option<UriParams> {
        let mut params = UriParams::new();
        let mut remainder = uri;
        let mut iter = self.segments.iter().peekable();

        while let Some(segment) = iter.next() {
            match segment {
                UriSegment::Literal(lit) => {
                    remainder = remainder.strip_prefix(lit.as_str())?;
                }
                UriSegment::Param(name) => {
                    let next_literal = iter.peek().and_then(|next| match next {
                        UriSegment::Literal(lit) => Some(lit.as_str()),
                        UriSegment::Param(_) => None,
                    });

                    // Adjacent params are ambiguous; refuse the match.
                    if next_literal.is_none() && iter.peek().is_some() {
                        return None;
                    }

                    if let Some(literal) = next_literal {
                        let idx = remainder.find(literal)?;
                        params.insert(name.clone(), remainder[..idx].to_owned());
                        remainder = &remainder[idx..];
                    } else {
                        params.insert(name.clone(), remainder.to_owned());
                        remainder = "";
                    }
                }
            }
        }

        if remainder.is_empty() { Some(params) } else { None }
    }
}
