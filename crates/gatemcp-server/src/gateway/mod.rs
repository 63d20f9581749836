//! Gateway mode: routing rules and request forwarding.
//!
//! In gateway mode, selected requests are forwarded verbatim to upstream
//! MCP backends over pooled TCP connections. The backend's response bytes
//! are relayed as-is, so the id the backend echoes is exactly what the
//! client sees. There is no automatic retry; a failed exchange closes the
//! socket and the client may resubmit.

mod pool;

pub use pool::{BackendConn, ConnectionPool, PoolError};

use gatemcp_core::logging::{debug, targets, warn};
use gatemcp_core::{McpError, McpResult};
use gatemcp_protocol::{JsonRpcMessage, JsonRpcRequest};

use crate::config::BackendConfig;

/// One configured upstream backend with its routing rule and pool.
pub struct Backend {
    config: BackendConfig,
    pool: Option<ConnectionPool>,
}

impl Backend {
    /// Builds a backend from configuration.
    ///
    /// A backend configured with `max_connections == 0` gets no pool;
    /// routing to it reports a gateway configuration error.
    #[must_use]
    pub fn new(config: BackendConfig) -> Self {
        let pool = (config.max_connections > 0).then(|| ConnectionPool::new(&config));
        Self { config, pool }
    }

    /// Returns the backend's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the backend's connection pool, if it has one.
    #[must_use]
    pub fn pool(&self) -> Option<&ConnectionPool> {
        self.pool.as_ref()
    }

    /// Evaluates this backend's routing rule against a request.
    ///
    /// A rule matches on method prefix, or on the `uri` parameter prefix
    /// for `read_resource`.
    #[must_use]
    pub fn matches(&self, request: &JsonRpcRequest) -> bool {
        if self
            .config
            .method_prefixes
            .iter()
            .any(|prefix| request.method.starts_with(prefix.as_str()))
        {
            return true;
        }

        if request.method == "read_resource" {
            if let Some(uri) = request.param_str("uri") {
                return self
                    .config
                    .resource_prefixes
                    .iter()
                    .any(|prefix| uri.starts_with(prefix.as_str()));
            }
        }

        false
    }

    /// Forwards a request and relays the backend's raw response bytes.
    ///
    /// The socket is returned to the pool as valid only after a complete,
    /// well-formed exchange; send failures, receive failures, clean
    /// closes, and malformed responses all close it.
    pub fn forward(&self, request: &JsonRpcRequest) -> McpResult<Vec<u8>> {
        let Some(pool) = self.pool.as_ref() else {
            warn!(target: targets::GATEWAY, "Backend '{}' has no pool", self.config.name);
            return Err(McpError::internal_error("Gateway configuration error"));
        };

        let mut conn = pool.acquire(pool.request_timeout()).map_err(|e| {
            warn!(target: targets::GATEWAY, "Backend '{}' acquire failed: {e}", self.config.name);
            McpError::internal_error("Failed to connect to backend service")
        })?;

        // Same id, method, and raw params; only the framing is ours.
        let payload = serde_json::to_vec(request)?;

        if let Err(e) = conn.send_frame(&payload) {
            warn!(target: targets::GATEWAY, "Backend '{}' send failed: {e}", self.config.name);
            pool.release(conn, false);
            return Err(McpError::transport_error("Failed to send request to backend"));
        }

        let response = match conn.recv_frame() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(target: targets::GATEWAY, "Backend '{}' receive failed: {e}", self.config.name);
                pool.release(conn, false);
                return Err(McpError::transport_error(
                    "Failed to receive response from backend",
                ));
            }
        };

        // Sanity-check the framing only; the bytes are relayed untouched.
        if serde_json::from_slice::<JsonRpcMessage>(&response).is_err() {
            warn!(target: targets::GATEWAY, "Backend '{}' sent a malformed response", self.config.name);
            pool.release(conn, false);
            return Err(McpError::internal_error("Invalid response from backend"));
        }

        pool.release(conn, true);
        debug!(
            target: targets::GATEWAY,
            "Forwarded '{}' to backend '{}' ({} bytes back)",
            request.method,
            self.config.name,
            response.len()
        );
        Ok(response)
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.config.name)
            .field("address", &format!("{}:{}", self.config.host, self.config.port))
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatemcp_core::McpErrorCode;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::time::Duration;

    fn backend_config(port: u16) -> BackendConfig {
        BackendConfig {
            name: "upstream".to_owned(),
            host: "127.0.0.1".to_owned(),
            port,
            method_prefixes: vec!["remote_".to_owned()],
            resource_prefixes: vec!["remote://".to_owned()],
            max_connections: 2,
            connect_timeout_ms: 500,
            request_timeout_ms: 500,
            ..BackendConfig::default()
        }
    }

    /// A fake backend that answers each request line with `response`.
    fn spawn_backend(response: &'static str, exchanges: usize) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            for _ in 0..exchanges {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    return;
                }
                writer.write_all(response.as_bytes()).unwrap();
                writer.write_all(b"\n").unwrap();
            }
        });
        port
    }

    #[test]
    fn routing_rule_matches_method_and_uri_prefix() {
        let backend = Backend::new(backend_config(1));
        assert!(backend.matches(&JsonRpcRequest::new("remote_call", None, 1i64)));
        assert!(!backend.matches(&JsonRpcRequest::new("list_tools", None, 1i64)));

        let read = JsonRpcRequest::new(
            "read_resource",
            Some(serde_json::json!({"uri": "remote://data"})),
            2i64,
        );
        assert!(backend.matches(&read));

        let local_read = JsonRpcRequest::new(
            "read_resource",
            Some(serde_json::json!({"uri": "local://data"})),
            3i64,
        );
        assert!(!backend.matches(&local_read));
    }

    #[test]
    fn forward_relays_response_bytes_verbatim() {
        let response = r#"{"jsonrpc":"2.0","id":42,"result":{"ok":true}}"#;
        let port = spawn_backend(response, 1);
        let backend = Backend::new(backend_config(port));

        let request = JsonRpcRequest::new("remote_call", None, 42i64);
        let bytes = backend.forward(&request).unwrap();
        assert_eq!(bytes, response.as_bytes());

        // Successful exchange: the socket went back to the pool.
        assert_eq!(backend.pool().unwrap().idle_count(), 1);
    }

    #[test]
    fn malformed_response_closes_the_socket() {
        let port = spawn_backend("this is not json-rpc", 1);
        let backend = Backend::new(backend_config(port));

        let request = JsonRpcRequest::new("remote_call", None, 1i64);
        let err = backend.forward(&request).unwrap_err();
        assert_eq!(err.code, McpErrorCode::InternalError);
        assert_eq!(backend.pool().unwrap().total(), 0);
    }

    #[test]
    fn clean_close_is_a_transport_error() {
        // The backend accepts and immediately closes.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let backend = Backend::new(backend_config(port));
        let request = JsonRpcRequest::new("remote_call", None, 1i64);
        let err = backend.forward(&request).unwrap_err();
        assert_eq!(err.code, McpErrorCode::TransportError);
        assert_eq!(backend.pool().unwrap().total(), 0);
    }

    #[test]
    fn unreachable_backend_reports_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let backend = Backend::new(backend_config(port));
        let request = JsonRpcRequest::new("remote_call", None, 1i64);
        let err = backend.forward(&request).unwrap_err();
        assert_eq!(err.code, McpErrorCode::InternalError);
        assert!(err.message.contains("Failed to connect"));
    }

    #[test]
    fn backend_without_pool_is_a_configuration_error() {
        let mut config = backend_config(1);
        config.max_connections = 0;
        let backend = Backend::new(config);
        assert!(backend.pool().is_none());

        let request = JsonRpcRequest::new("remote_call", None, 1i64);
        let err = backend.forward(&request).unwrap_err();
        assert_eq!(err.message, "Gateway configuration error");
    }

    #[test]
    fn sequential_exchanges_reuse_one_socket() {
        let response = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let port = spawn_backend(response, 3);
        let backend = Backend::new(backend_config(port));

        for _ in 0..3 {
            let request = JsonRpcRequest::new("remote_call", None, 1i64);
            backend.forward(&request).unwrap();
        }
        assert_eq!(backend.pool().unwrap().total(), 1);
    }

    #[test]
    fn timeout_waiting_for_response_marks_socket_invalid() {
        // Accepts a request but never answers.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            let _ = reader.read_line(&mut line);
            std::thread::sleep(Duration::from_millis(900));
        });

        let backend = Backend::new(backend_config(port));
        let request = JsonRpcRequest::new("remote_call", None, 1i64);
        let err = backend.forward(&request).unwrap_err();
        assert_eq!(err.code, McpErrorCode::TransportError);
        assert_eq!(backend.pool().unwrap().total(), 0);
    }
}
