//! Request routing.
//!
//! A request goes either to a backend (gateway mode, rules evaluated in
//! declared order, first match wins) or to a local handler matched by
//! exact method name. Gateway rules are checked first, so a backend can
//! shadow a local method.

use gatemcp_protocol::JsonRpcRequest;

use crate::gateway::Backend;

/// The local method table, matched case-sensitively by exact name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalMethod {
    /// Connection-establishment probe.
    Ping,
    /// List registered resources.
    ListResources,
    /// List registered resource templates.
    ListResourceTemplates,
    /// Read one resource by URI.
    ReadResource,
    /// List registered tools.
    ListTools,
    /// Invoke a tool.
    CallTool,
    /// Snapshot the performance counters.
    GetPerformanceMetrics,
    /// Zero the performance counters.
    ResetPerformanceMetrics,
}

impl LocalMethod {
    /// Looks up a method by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ping" => Some(LocalMethod::Ping),
            "list_resources" => Some(LocalMethod::ListResources),
            "list_resource_templates" => Some(LocalMethod::ListResourceTemplates),
            "read_resource" => Some(LocalMethod::ReadResource),
            "list_tools" => Some(LocalMethod::ListTools),
            "call_tool" => Some(LocalMethod::CallTool),
            "get_performance_metrics" => Some(LocalMethod::GetPerformanceMetrics),
            "reset_performance_metrics" => Some(LocalMethod::ResetPerformanceMetrics),
            _ => None,
        }
    }

    /// Returns the wire name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            LocalMethod::Ping => "ping",
            LocalMethod::ListResources => "list_resources",
            LocalMethod::ListResourceTemplates => "list_resource_templates",
            LocalMethod::ReadResource => "read_resource",
            LocalMethod::ListTools => "list_tools",
            LocalMethod::CallTool => "call_tool",
            LocalMethod::GetPerformanceMetrics => "get_performance_metrics",
            LocalMethod::ResetPerformanceMetrics => "reset_performance_metrics",
        }
    }
}

/// Where a request is dispatched.
#[derive(Debug)]
pub enum Route<'a> {
    /// Forward to an upstream backend.
    Backend(&'a Backend),
    /// Handle locally.
    Local(LocalMethod),
    /// No backend rule and no local method match.
    Unknown,
}

/// Routes a request against the backend rules, then the local table.
#[must_use]
pub fn route<'a>(backends: &'a [Backend], request: &JsonRpcRequest) -> Route<'a> {
    for backend in backends {
        if backend.matches(request) {
            return Route::Backend(backend);
        }
    }
    match LocalMethod::from_name(&request.method) {
        Some(method) => Route::Local(method),
        None => Route::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn backend(name: &str, method_prefix: &str) -> Backend {
        Backend::new(BackendConfig {
            name: name.to_owned(),
            method_prefixes: vec![method_prefix.to_owned()],
            ..BackendConfig::default()
        })
    }

    #[test]
    fn local_table_is_exact_and_case_sensitive() {
        assert_eq!(LocalMethod::from_name("ping"), Some(LocalMethod::Ping));
        assert_eq!(LocalMethod::from_name("Ping"), None);
        assert_eq!(LocalMethod::from_name("list_tools_v2"), None);
        assert_eq!(LocalMethod::from_name(""), None);
    }

    #[test]
    fn names_roundtrip() {
        for method in [
            LocalMethod::Ping,
            LocalMethod::ListResources,
            LocalMethod::ListResourceTemplates,
            LocalMethod::ReadResource,
            LocalMethod::ListTools,
            LocalMethod::CallTool,
            LocalMethod::GetPerformanceMetrics,
            LocalMethod::ResetPerformanceMetrics,
        ] {
            assert_eq!(LocalMethod::from_name(method.name()), Some(method));
        }
    }

    #[test]
    fn first_matching_backend_wins() {
        let backends = vec![backend("first", "remote_"), backend("second", "remote_extra_")];
        let request = JsonRpcRequest::new("remote_extra_call", None, 1i64);
        match route(&backends, &request) {
            Route::Backend(chosen) => assert_eq!(chosen.name(), "first"),
            other => panic!("expected backend route, got {other:?}"),
        }
    }

    #[test]
    fn backend_rules_shadow_local_methods() {
        let backends = vec![backend("proxy", "list_")];
        let request = JsonRpcRequest::new("list_tools", None, 1i64);
        assert!(matches!(route(&backends, &request), Route::Backend(_)));
    }

    #[test]
    fn unmatched_method_is_unknown() {
        let backends = vec![backend("proxy", "remote_")];
        let request = JsonRpcRequest::new("frobnicate", None, 1i64);
        assert!(matches!(route(&backends, &request), Route::Unknown));
    }
}
