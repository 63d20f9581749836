//! Structured logging for GateMCP.
//!
//! Built on the standard [`log`] facade. All GateMCP crates log through
//! these targets; no log implementation is bundled, so embedding
//! applications pick their own backend.
//!
//! # Log Levels
//!
//! - **error**: unrecoverable failures, transport breakdowns
//! - **warn**: recoverable issues (rejected messages, evictions under load)
//! - **info**: server lifecycle (start, stop, backend registration)
//! - **debug**: request/response flow, cache and pool activity
//! - **trace**: wire-level payloads
//!
//! # Log Targets
//!
//! Example filter: `RUST_LOG=gatemcp::dispatch=debug,gatemcp::gateway=trace`

// Re-export log macros for ergonomic use
pub use log::{debug, error, info, trace, warn};

// Re-export log level types for programmatic use
pub use log::{Level, LevelFilter};

/// Log targets used by GateMCP components.
///
/// Use these constants with the `target:` argument to log macros
/// for consistent filtering.
pub mod targets {
    /// Root target for all GateMCP logs.
    pub const GATEMCP: &str = "gatemcp";

    /// Server lifecycle: startup, shutdown, configuration.
    pub const SERVER: &str = "gatemcp::server";

    /// Message parsing, batching, and per-request dispatch.
    pub const DISPATCH: &str = "gatemcp::dispatch";

    /// Resource and schema cache activity.
    pub const CACHE: &str = "gatemcp::cache";

    /// Backend routing, connection pools, forwarding.
    pub const GATEWAY: &str = "gatemcp::gateway";

    /// Transport layer (stdio, TCP framing).
    pub const TRANSPORT: &str = "gatemcp::transport";

    /// Authentication and permission checks.
    pub const AUTH: &str = "gatemcp::auth";
}

/// Returns whether logging is enabled at the given level for the given target.
///
/// Useful for conditionally computing expensive log message data.
#[inline]
#[must_use]
pub fn is_enabled(level: Level, target: &str) -> bool {
    log::log_enabled!(target: target, level)
}
