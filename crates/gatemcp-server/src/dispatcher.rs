//! Top-level message handling.
//!
//! One `handle_message` call covers the whole lifecycle of one wire
//! message: parse one-or-batch, rate-limit, authenticate once, dispatch
//! each element in order, and assemble the output (a single object for a
//! single message, a JSON array for a batch, nothing at all when every
//! element was a notification or dropped).

use gatemcp_core::logging::{debug, targets, trace};
use gatemcp_core::{AuthContext, McpError};
use gatemcp_protocol::{
    IncomingBatch, IncomingMessage, JsonRpcRequest, JsonRpcResponse, RequestId, parse_incoming,
};

use crate::ServerInner;
use crate::router::{self, Route};

impl ServerInner {
    /// Handles one raw message and returns the bytes to send back, if any.
    ///
    /// `client` is the transport-provided identity used for rate limiting.
    pub(crate) fn handle_message(&self, raw: &[u8], client: &str) -> Option<Vec<u8>> {
        let _guard = MessageGuard::enter(self);
        self.metrics.add_bytes_received(raw.len() as u64);

        // Fail fast during shutdown; the guard above keeps the active
        // count accurate either way.
        if self.lifecycle.is_shutting_down() {
            return Some(self.finish(error_bytes(RequestId::zero(), &McpError::shutting_down())));
        }

        if raw.len() > self.config.max_message_size {
            debug!(
                target: targets::DISPATCH,
                "Rejecting oversized message: {} > {} bytes",
                raw.len(),
                self.config.max_message_size
            );
            return Some(self.finish(error_bytes(
                RequestId::zero(),
                &McpError::invalid_request("Message exceeds maximum size"),
            )));
        }

        let batch = match parse_incoming(raw) {
            Ok(batch) => batch,
            Err(err) => return Some(self.finish(error_bytes(RequestId::zero(), &err))),
        };

        if batch.batched && batch.messages.is_empty() {
            return Some(self.finish(error_bytes(
                RequestId::zero(),
                &McpError::invalid_request("Empty batch"),
            )));
        }

        if let Some(limiter) = &self.limiter {
            if !limiter.try_acquire(client) {
                self.metrics.record_rate_limited();
                debug!(target: targets::DISPATCH, "Rate limited client '{client}'");
                return Some(self.finish(error_bytes(
                    first_request_id(&batch),
                    &McpError::too_many_requests(),
                )));
            }
        }

        // Authenticate once per message, from the first request's
        // credentials. A failed authentication on a ping-first message
        // falls back to an anonymous context so connection probes work
        // without credentials.
        let first = batch.first_request();
        let auth = match self.authenticator.authenticate(first) {
            Ok(ctx) => ctx,
            Err(_) if first.is_some_and(|req| req.method == "ping") => {
                debug!(target: targets::AUTH, "Unauthenticated ping allowed");
                AuthContext::anonymous()
            }
            Err(_) => {
                return Some(self.finish(error_bytes(
                    first_request_id(&batch),
                    &McpError::invalid_request("Authentication failed"),
                )));
            }
        };

        // Per-message processing is strictly sequential; responses keep
        // the input order.
        let mut chunks: Vec<Vec<u8>> = Vec::new();
        for message in &batch.messages {
            match message {
                IncomingMessage::Request(request) if request.is_notification() => {
                    self.metrics.record_notification();
                    let _ = self.handle_request(request, &auth);
                }
                IncomingMessage::Request(request) => {
                    chunks.push(self.handle_request(request, &auth));
                }
                IncomingMessage::Response(_) => {
                    trace!(target: targets::DISPATCH, "Dropping response message");
                }
                IncomingMessage::Invalid { id, error } => {
                    self.metrics.record_invalid_message();
                    chunks.push(error_bytes(
                        id.clone().unwrap_or_else(RequestId::zero),
                        error,
                    ));
                }
            }
        }

        if chunks.is_empty() {
            // All notifications (or dropped elements): no bytes, not "[]".
            return None;
        }

        let out = if batch.batched {
            join_batch(&chunks)
        } else {
            chunks.into_iter().next().expect("one chunk for one message")
        };
        Some(self.finish(out))
    }

    /// Handles one request element and returns its serialized response.
    ///
    /// Gateway responses are relayed as raw bytes; local responses are
    /// serialized here. Either way the element's id is echoed.
    fn handle_request(&self, request: &JsonRpcRequest, auth: &AuthContext) -> Vec<u8> {
        let id = request.id.clone().unwrap_or_else(RequestId::zero);

        match router::route(&self.backends, request) {
            Route::Backend(backend) => match backend.forward(request) {
                Ok(bytes) => {
                    self.metrics.record_gateway_forward(true);
                    bytes
                }
                Err(err) => {
                    self.metrics.record_gateway_forward(false);
                    error_bytes(id, &err)
                }
            },
            Route::Local(method) => {
                let result = self.dispatch_local(method, request, auth);
                self.metrics.record_request(result.is_ok());
                match result {
                    Ok(value) => response_bytes(&JsonRpcResponse::success(id, value)),
                    Err(err) => error_bytes(id, &err),
                }
            }
            Route::Unknown => {
                self.metrics.record_request(false);
                error_bytes(id, &McpError::method_not_found(&request.method))
            }
        }
    }

    fn finish(&self, out: Vec<u8>) -> Vec<u8> {
        self.metrics.add_bytes_sent(out.len() as u64);
        out
    }
}

/// Tracks one in-flight message: bumps the active count on entry and, on
/// exit, decrements it and signals the shutdown barrier at zero.
struct MessageGuard<'a> {
    server: &'a ServerInner,
}

impl<'a> MessageGuard<'a> {
    fn enter(server: &'a ServerInner) -> Self {
        server.lifecycle.message_started();
        server.metrics.message_started();
        Self { server }
    }
}

impl Drop for MessageGuard<'_> {
    fn drop(&mut self) {
        self.server.metrics.message_finished();
        self.server.lifecycle.message_finished();
    }
}

fn first_request_id(batch: &IncomingBatch) -> RequestId {
    batch
        .first_request()
        .and_then(|req| req.id.clone())
        .unwrap_or_else(RequestId::zero)
}

fn response_bytes(response: &JsonRpcResponse) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|_| {
        // Last-resort frame; the dispatcher must always produce bytes.
        br#"{"jsonrpc":"2.0","id":0,"error":{"code":-32603,"message":"Internal error"}}"#.to_vec()
    })
}

fn error_bytes(id: RequestId, error: &McpError) -> Vec<u8> {
    response_bytes(&JsonRpcResponse::error(id, error.clone()))
}

fn join_batch(chunks: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = chunks.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total + chunks.len() + 1);
    out.push(b'[');
    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 {
            out.push(b',');
        }
        out.extend_from_slice(chunk);
    }
    out.push(b']');
    out
}
