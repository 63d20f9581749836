//! Per-backend connection pool.
//!
//! Keeps a free list of connected sockets under a mutex; a condition
//! variable wakes acquirers when a socket is released. Sockets idle longer
//! than the backend's idle timeout are dropped lazily on acquire, down to
//! the configured minimum. Only a caller that completed a successful
//! exchange returns its socket as still valid; everything else closes it.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use gatemcp_core::logging::{debug, targets, warn};
use gatemcp_transport::{Codec, TransportError};

use crate::config::BackendConfig;

/// Read chunk size for backend responses.
const READ_CHUNK: usize = 8 * 1024;

/// Errors from pool operations.
#[derive(Debug)]
pub enum PoolError {
    /// No socket became available before the deadline.
    Timeout,
    /// Opening a new socket failed.
    Connect(std::io::Error),
}

impl std::fmt::Display for PoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolError::Timeout => write!(f, "timed out waiting for a backend connection"),
            PoolError::Connect(e) => write!(f, "failed to connect to backend: {e}"),
        }
    }
}

impl std::error::Error for PoolError {}

/// One pooled backend connection with its framing state.
///
/// The codec persists across requests on the same socket, so bytes the
/// backend sends ahead of the next request are not lost.
pub struct BackendConn {
    stream: TcpStream,
    codec: Codec,
}

impl BackendConn {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            codec: Codec::new(),
        }
    }

    /// Sends one framed request payload.
    pub fn send_frame(&mut self, payload: &[u8]) -> std::io::Result<()> {
        let encoded = self.codec.encode(payload);
        self.stream.write_all(&encoded)?;
        self.stream.flush()
    }

    /// Receives one framed response, bounded by the stream's read timeout.
    pub fn recv_frame(&mut self) -> Result<Vec<u8>, TransportError> {
        loop {
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk)?;
            if n == 0 {
                return Err(TransportError::Closed);
            }
            let mut frames = self.codec.decode(&chunk[..n])?;
            if let Some(frame) = frames.pop() {
                // One response per exchange; extra frames would mean a
                // misbehaving backend, so surface the last one and let
                // validity marking close the socket upstream.
                if !frames.is_empty() {
                    warn!(target: targets::GATEWAY, "Backend sent multiple frames for one request");
                }
                return Ok(frame);
            }
        }
    }
}

struct IdleConn {
    conn: BackendConn,
    idle_since: Instant,
}

struct PoolState {
    idle: Vec<IdleConn>,
    /// Live sockets: idle plus borrowed.
    total: usize,
}

/// Pool of outbound sockets for one backend.
pub struct ConnectionPool {
    host: String,
    port: u16,
    min: usize,
    max: usize,
    connect_timeout: Duration,
    idle_timeout: Duration,
    request_timeout: Duration,
    state: Mutex<PoolState>,
    available: Condvar,
}

impl ConnectionPool {
    /// Creates a pool from a backend's configuration.
    ///
    /// `max_connections` must be non-zero; the builder does not create a
    /// pool for backends configured without one.
    #[must_use]
    pub fn new(config: &BackendConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            min: config.min_connections,
            max: config.max_connections.max(1),
            connect_timeout: config.connect_timeout(),
            idle_timeout: config.idle_timeout(),
            request_timeout: config.request_timeout(),
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                total: 0,
            }),
            available: Condvar::new(),
        }
    }

    /// Acquires a connected socket, waiting up to `deadline`.
    ///
    /// An idle socket is reused when available; otherwise a new one is
    /// opened while under the pool maximum, and the caller blocks for a
    /// released socket when at it.
    pub fn acquire(&self, deadline: Duration) -> Result<BackendConn, PoolError> {
        let deadline_at = Instant::now() + deadline;
        let mut state = self.state.lock().expect("connection pool lock poisoned");
        loop {
            self.evict_idle(&mut state);

            if let Some(idle) = state.idle.pop() {
                return Ok(idle.conn);
            }

            if state.total < self.max {
                state.total += 1;
                drop(state);
                return match self.connect() {
                    Ok(conn) => Ok(conn),
                    Err(e) => {
                        let mut state =
                            self.state.lock().expect("connection pool lock poisoned");
                        state.total -= 1;
                        self.available.notify_one();
                        Err(PoolError::Connect(e))
                    }
                };
            }

            let remaining = deadline_at.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(PoolError::Timeout);
            }
            let (guard, _timed_out) = self
                .available
                .wait_timeout(state, remaining)
                .expect("connection pool lock poisoned");
            state = guard;
        }
    }

    /// Returns a socket to the pool.
    ///
    /// Invalid sockets are closed; either way a waiting acquirer is woken,
    /// since an invalid release frees a slot for a fresh connection.
    pub fn release(&self, conn: BackendConn, still_valid: bool) {
        {
            let mut state = self.state.lock().expect("connection pool lock poisoned");
            if still_valid {
                state.idle.push(IdleConn {
                    conn,
                    idle_since: Instant::now(),
                });
            } else {
                state.total -= 1;
                debug!(target: targets::GATEWAY, "Closed invalid backend socket ({}:{})", self.host, self.port);
                // `conn` drops here, closing the socket.
            }
        }
        self.available.notify_one();
    }

    /// Returns the number of idle sockets.
    #[must_use]
    pub fn idle_count(&self) -> usize {
        self.state
            .lock()
            .expect("connection pool lock poisoned")
            .idle
            .len()
    }

    /// Returns the number of live sockets (idle plus borrowed).
    #[must_use]
    pub fn total(&self) -> usize {
        self.state
            .lock()
            .expect("connection pool lock poisoned")
            .total
    }

    /// Per-request send/receive timeout for sockets from this pool.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn connect(&self) -> std::io::Result<BackendConn> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::NotFound, "backend address resolution")
            })?;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.request_timeout))?;
        stream.set_write_timeout(Some(self.request_timeout))?;
        stream.set_nodelay(true)?;
        debug!(target: targets::GATEWAY, "Opened backend socket {}:{}", self.host, self.port);
        Ok(BackendConn::new(stream))
    }

    /// Drops sockets idle past the threshold, keeping at least `min` live.
    fn evict_idle(&self, state: &mut PoolState) {
        let threshold = self.idle_timeout;
        let min = self.min;
        let mut index = 0;
        while index < state.idle.len() {
            if state.total <= min {
                break;
            }
            if state.idle[index].idle_since.elapsed() > threshold {
                state.idle.remove(index);
                state.total -= 1;
            } else {
                index += 1;
            }
        }
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("backend", &format!("{}:{}", self.host, self.port))
            .field("total", &self.total())
            .field("idle", &self.idle_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn test_config(port: u16) -> BackendConfig {
        BackendConfig {
            name: "test".to_owned(),
            host: "127.0.0.1".to_owned(),
            port,
            max_connections: 2,
            connect_timeout_ms: 500,
            idle_timeout_ms: 10_000,
            request_timeout_ms: 500,
            ..BackendConfig::default()
        }
    }

    /// Accepts connections and keeps them open until the test ends.
    fn spawn_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn acquire_opens_and_release_reuses() {
        let (listener, port) = spawn_listener();
        let accept = std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().take(1) {
                held.push(stream.unwrap());
            }
            std::thread::sleep(Duration::from_millis(200));
        });

        let pool = ConnectionPool::new(&test_config(port));
        let conn = pool.acquire(Duration::from_millis(500)).unwrap();
        assert_eq!(pool.total(), 1);

        pool.release(conn, true);
        assert_eq!(pool.idle_count(), 1);

        // Reuse: still exactly one live socket.
        let conn = pool.acquire(Duration::from_millis(500)).unwrap();
        assert_eq!(pool.total(), 1);
        assert_eq!(pool.idle_count(), 0);
        pool.release(conn, true);
        accept.join().unwrap();
    }

    #[test]
    fn invalid_release_closes_the_socket() {
        let (listener, port) = spawn_listener();
        let accept = std::thread::spawn(move || {
            let _stream = listener.incoming().next().unwrap().unwrap();
            std::thread::sleep(Duration::from_millis(100));
        });

        let pool = ConnectionPool::new(&test_config(port));
        let conn = pool.acquire(Duration::from_millis(500)).unwrap();
        pool.release(conn, false);
        assert_eq!(pool.total(), 0);
        assert_eq!(pool.idle_count(), 0);
        accept.join().unwrap();
    }

    #[test]
    fn acquire_times_out_at_max() {
        let (listener, port) = spawn_listener();
        let accept = std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().take(2) {
                held.push(stream.unwrap());
            }
            std::thread::sleep(Duration::from_millis(400));
        });

        let pool = ConnectionPool::new(&test_config(port));
        let _a = pool.acquire(Duration::from_millis(500)).unwrap();
        let _b = pool.acquire(Duration::from_millis(500)).unwrap();

        let started = Instant::now();
        let result = pool.acquire(Duration::from_millis(100));
        assert!(matches!(result, Err(PoolError::Timeout)));
        assert!(started.elapsed() >= Duration::from_millis(90));
        accept.join().unwrap();
    }

    #[test]
    fn connect_failure_is_reported_and_slot_freed() {
        // Nothing listens on this port.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let pool = ConnectionPool::new(&test_config(port));
        let result = pool.acquire(Duration::from_millis(500));
        assert!(matches!(result, Err(PoolError::Connect(_))));
        assert_eq!(pool.total(), 0);
    }

    #[test]
    fn idle_sockets_are_evicted_down_to_min() {
        let (listener, port) = spawn_listener();
        let accept = std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().take(2) {
                held.push(stream.unwrap());
            }
            std::thread::sleep(Duration::from_millis(400));
        });

        let mut config = test_config(port);
        config.idle_timeout_ms = 20;
        let pool = ConnectionPool::new(&config);

        let a = pool.acquire(Duration::from_millis(500)).unwrap();
        let b = pool.acquire(Duration::from_millis(500)).unwrap();
        pool.release(a, true);
        pool.release(b, true);
        assert_eq!(pool.idle_count(), 2);

        std::thread::sleep(Duration::from_millis(60));
        // Next acquire prunes both stale sockets and opens a fresh one...
        // except the listener accepted only two; use the eviction effect
        // on counters instead of a live connect.
        {
            let mut state = pool.state.lock().unwrap();
            pool.evict_idle(&mut state);
            assert_eq!(state.idle.len(), 0);
            assert_eq!(state.total, 0);
        }
        accept.join().unwrap();
    }
}
