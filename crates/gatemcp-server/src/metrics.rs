//! Performance counters.
//!
//! All counters are relaxed atomics updated inline on the request path;
//! `get_performance_metrics` serializes a snapshot and
//! `reset_performance_metrics` zeroes the counters (the start timestamp is
//! kept so uptime survives a reset).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Runtime counters for the request path.
#[derive(Debug)]
pub struct PerformanceMetrics {
    requests_total: AtomicU64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    notifications_received: AtomicU64,
    invalid_messages: AtomicU64,
    rate_limited: AtomicU64,
    gateway_forwards: AtomicU64,
    gateway_errors: AtomicU64,
    bytes_received: AtomicU64,
    bytes_sent: AtomicU64,
    active_requests: AtomicU64,
    started_at_instant: Instant,
    started_at: DateTime<Utc>,
}

/// Serialized form of the counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Locally dispatched requests (notifications included).
    pub requests_total: u64,
    /// Requests that produced a success response.
    pub requests_succeeded: u64,
    /// Requests that produced an error response.
    pub requests_failed: u64,
    /// Notifications consumed.
    pub notifications_received: u64,
    /// Batch elements that were not valid JSON-RPC messages.
    pub invalid_messages: u64,
    /// Messages rejected by the rate limiter.
    pub rate_limited: u64,
    /// Requests forwarded to a backend.
    pub gateway_forwards: u64,
    /// Forwarded requests that failed.
    pub gateway_errors: u64,
    /// Raw bytes received.
    pub bytes_received: u64,
    /// Raw bytes sent.
    pub bytes_sent: u64,
    /// Messages currently in flight.
    pub active_requests: u64,
    /// Server start time (RFC 3339).
    pub started_at: String,
    /// Seconds since start.
    pub uptime_secs: u64,
}

impl PerformanceMetrics {
    /// Creates zeroed counters stamped with the current time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_succeeded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            notifications_received: AtomicU64::new(0),
            invalid_messages: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            gateway_forwards: AtomicU64::new(0),
            gateway_errors: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            active_requests: AtomicU64::new(0),
            started_at_instant: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn record_request(&self, succeeded: bool) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_notification(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_message(&self) {
        self.invalid_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_gateway_forward(&self, succeeded: bool) {
        self.gateway_forwards.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.gateway_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_bytes_received(&self, bytes: u64) {
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn add_bytes_sent(&self, bytes: u64) {
        self.bytes_sent.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn message_started(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_finished(&self) {
        self.active_requests.fetch_sub(1, Ordering::Relaxed);
    }

    /// Returns the number of messages currently in flight.
    #[must_use]
    pub fn active_requests(&self) -> u64 {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Takes a point-in-time snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_succeeded: self.requests_succeeded.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            notifications_received: self.notifications_received.load(Ordering::Relaxed),
            invalid_messages: self.invalid_messages.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            gateway_forwards: self.gateway_forwards.load(Ordering::Relaxed),
            gateway_errors: self.gateway_errors.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            active_requests: self.active_requests.load(Ordering::Relaxed),
            started_at: self.started_at.to_rfc3339(),
            uptime_secs: self.started_at_instant.elapsed().as_secs(),
        }
    }

    /// Zeroes the counters. The start timestamp and the in-flight gauge
    /// are preserved.
    pub fn reset(&self) {
        self.requests_total.store(0, Ordering::Relaxed);
        self.requests_succeeded.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.notifications_received.store(0, Ordering::Relaxed);
        self.invalid_messages.store(0, Ordering::Relaxed);
        self.rate_limited.store(0, Ordering::Relaxed);
        self.gateway_forwards.store(0, Ordering::Relaxed);
        self.gateway_errors.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
    }
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::new()
    }
}
