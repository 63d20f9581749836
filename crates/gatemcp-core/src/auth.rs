//! Authentication context and permission matching.
//!
//! An [`AuthContext`] is created once per incoming message and handed to
//! handlers by read-only reference. Permission lists are pattern strings
//! where a trailing `*` matches any suffix; there is no other glob syntax.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The credential mechanism a context was established with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthKind {
    /// No credentials required or presented.
    None,
    /// A pre-shared API key.
    ApiKey,
    /// A bearer token (not implemented).
    Token,
    /// A client certificate (not implemented).
    Cert,
}

/// Authentication context for one message.
///
/// Owned by the dispatcher for the lifetime of the message; handlers
/// receive it by reference and consult the permission lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// How the caller authenticated.
    pub kind: AuthKind,
    /// Subject identifier (`anonymous`, `authenticated_client`, ...).
    pub identifier: String,
    /// Expiry instant; `None` means the context never expires.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Resource URI patterns this caller may read.
    pub allowed_resources: Vec<String>,
    /// Tool name patterns this caller may invoke.
    pub allowed_tools: Vec<String>,
}

impl AuthContext {
    /// Creates an anonymous context with wildcard permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            kind: AuthKind::None,
            identifier: "anonymous".to_owned(),
            expires_at: None,
            allowed_resources: vec!["*".to_owned()],
            allowed_tools: vec!["*".to_owned()],
        }
    }

    /// Creates an authenticated context with wildcard permissions.
    #[must_use]
    pub fn authenticated(kind: AuthKind, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            identifier: identifier.into(),
            expires_at: None,
            allowed_resources: vec!["*".to_owned()],
            allowed_tools: vec!["*".to_owned()],
        }
    }

    /// Restricts the resource patterns this context may read.
    #[must_use]
    pub fn with_resource_patterns(mut self, patterns: Vec<String>) -> Self {
        self.allowed_resources = patterns;
        self
    }

    /// Restricts the tool patterns this context may invoke.
    #[must_use]
    pub fn with_tool_patterns(mut self, patterns: Vec<String>) -> Self {
        self.allowed_tools = patterns;
        self
    }

    /// Sets an expiry instant.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns true once the context's expiry has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Checks whether this caller may read the given resource URI.
    ///
    /// Expired contexts deny everything.
    #[must_use]
    pub fn can_read_resource(&self, uri: &str) -> bool {
        !self.is_expired()
            && self
                .allowed_resources
                .iter()
                .any(|p| wildcard_match(p, uri))
    }

    /// Checks whether this caller may invoke the given tool.
    ///
    /// Expired contexts deny everything.
    #[must_use]
    pub fn can_call_tool(&self, name: &str) -> bool {
        !self.is_expired() && self.allowed_tools.iter().any(|p| wildcard_match(p, name))
    }
}

/// Matches a permission pattern against a candidate string.
///
/// A pattern ending in `*` matches any candidate sharing the pattern's
/// prefix; any other pattern matches only itself. `*` elsewhere in the
/// pattern has no special meaning.
#[must_use]
pub fn wildcard_match(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => candidate.starts_with(prefix),
        None => pattern == candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_everything() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
    }

    #[test]
    fn prefix_wildcard_matches_prefix_only() {
        assert!(wildcard_match("p*", "p"));
        assert!(wildcard_match("p*", "prefix"));
        assert!(!wildcard_match("p*", "other"));
    }

    #[test]
    fn bare_pattern_is_exact() {
        assert!(wildcard_match("p", "p"));
        assert!(!wildcard_match("p", "pq"));
        assert!(!wildcard_match("p", ""));
    }

    #[test]
    fn interior_star_is_literal() {
        assert!(!wildcard_match("a*b", "axb"));
        assert!(wildcard_match("a*b", "a*b"));
    }

    #[test]
    fn anonymous_allows_all() {
        let ctx = AuthContext::anonymous();
        assert!(ctx.can_read_resource("example://a"));
        assert!(ctx.can_call_tool("echo"));
    }

    #[test]
    fn restricted_tools() {
        let ctx = AuthContext::anonymous().with_tool_patterns(vec!["echo*".to_owned()]);
        assert!(ctx.can_call_tool("echo"));
        assert!(ctx.can_call_tool("echo_v2"));
        assert!(!ctx.can_call_tool("admin"));
    }

    #[test]
    fn expired_context_denies_everything() {
        let ctx = AuthContext::anonymous()
            .with_expiry(Utc::now() - chrono::Duration::seconds(1));
        assert!(ctx.is_expired());
        assert!(!ctx.can_read_resource("example://a"));
        assert!(!ctx.can_call_tool("echo"));
    }
}
