//! Resource content cache: LRU with TTL, backed by the object pool.
//!
//! One `RwLock` guards both the key map and the LRU index, so a lookup and
//! its recency touch are a single atomic step. The LRU index is a
//! `BTreeMap` keyed by a monotonic touch counter: the smallest key is the
//! least recently used entry, and every cache entry owns exactly one index
//! slot.
//!
//! Stored items are deep copies acquired from the caller's [`ObjectPool`];
//! `get` hands back fresh copies, so callers never alias cache-owned
//! buffers. Dropping an entry releases its items back to the pool.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use gatemcp_core::logging::{debug, targets};
use gatemcp_core::{McpResult, ObjectPool, PooledContent};
use serde::Serialize;

/// Time-to-live for a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Use the cache's configured default.
    Default,
    /// The entry never expires.
    Never,
    /// Expire after the given duration.
    For(Duration),
}

struct CacheEntry {
    items: Vec<PooledContent>,
    expires_at: Option<Instant>,
    touch: u64,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// touch counter -> URI; smallest counter is least recently used.
    lru: BTreeMap<u64, String>,
    tick: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    /// Entries currently stored.
    pub size: usize,
    /// Maximum entries.
    pub capacity: usize,
    /// Lookup hits.
    pub hits: u64,
    /// Lookup misses (including expired entries).
    pub misses: u64,
}

/// Bounded, thread-safe LRU-with-TTL cache of content items keyed by URI.
pub struct ResourceCache {
    state: RwLock<CacheState>,
    capacity: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResourceCache {
    /// Creates a cache bounded at `capacity` entries.
    ///
    /// A `capacity` of 0 disables the cache: `put` succeeds without
    /// recording anything and `get` always misses. A zero `default_ttl`
    /// means default-TTL entries never expire.
    #[must_use]
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            state: RwLock::new(CacheState {
                entries: HashMap::new(),
                lru: BTreeMap::new(),
                tick: 0,
            }),
            capacity,
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up `uri`, returning fresh copies of the stored items.
    ///
    /// An expired entry is removed eagerly and reported as a miss. On a
    /// hit the entry moves to the most-recently-used position.
    ///
    /// # Errors
    ///
    /// Fails when copies cannot be acquired from `pool`; any partially
    /// acquired copies are released and the stored entry is unaffected.
    pub fn get(&self, uri: &str, pool: &ObjectPool) -> McpResult<Option<Vec<PooledContent>>> {
        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let mut guard = self.state.write().expect("resource cache lock poisoned");
        let state = &mut *guard;

        let expired = match state.entries.get(uri) {
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
            Some(entry) => entry.expires_at.is_some_and(|at| at <= Instant::now()),
        };

        if expired {
            if let Some(entry) = state.entries.remove(uri) {
                state.lru.remove(&entry.touch);
                // Dropping the entry releases its items to the pool.
            }
            debug!(target: targets::CACHE, "Expired entry removed: {uri}");
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let entry = state.entries.get_mut(uri).expect("entry checked above");

        let mut copies = Vec::with_capacity(entry.items.len());
        for item in &entry.items {
            // On failure the partial `copies` vector drops, releasing
            // everything acquired so far; the stored entry is untouched.
            copies.push(pool.acquire_copy(item)?);
        }

        state.lru.remove(&entry.touch);
        state.tick += 1;
        entry.touch = state.tick;
        state.lru.insert(state.tick, uri.to_owned());

        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(copies))
    }

    /// Stores deep copies of `items` under `uri`, replacing any previous
    /// entry. At capacity, the least recently used entry is evicted first.
    ///
    /// # Errors
    ///
    /// Fails when copies cannot be acquired from `pool`; in that case the
    /// copies made so far are released and the cache is left untouched.
    pub fn put(
        &self,
        uri: &str,
        pool: &ObjectPool,
        items: &[PooledContent],
        ttl: Ttl,
    ) -> McpResult<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        let expires_at = self.expiry_for(ttl);

        // Acquire all copies before touching the map, so failure cannot
        // leave a half-built entry behind.
        let mut copies = Vec::with_capacity(items.len());
        for item in items {
            copies.push(pool.acquire_copy(item)?);
        }

        let mut guard = self.state.write().expect("resource cache lock poisoned");
        let state = &mut *guard;

        if let Some(old) = state.entries.remove(uri) {
            state.lru.remove(&old.touch);
        } else if state.entries.len() >= self.capacity {
            if let Some((_, tail_uri)) = state.lru.pop_first() {
                state.entries.remove(&tail_uri);
                debug!(target: targets::CACHE, "Evicted LRU entry: {tail_uri}");
            }
        }

        state.tick += 1;
        state.lru.insert(state.tick, uri.to_owned());
        state.entries.insert(
            uri.to_owned(),
            CacheEntry {
                items: copies,
                expires_at,
                touch: state.tick,
            },
        );
        Ok(())
    }

    /// Removes the entry for `uri`, releasing its items to the pool.
    pub fn invalidate(&self, uri: &str) {
        let mut guard = self.state.write().expect("resource cache lock poisoned");
        let state = &mut *guard;
        if let Some(entry) = state.entries.remove(uri) {
            state.lru.remove(&entry.touch);
        }
    }

    /// Removes all expired entries. Returns how many were removed.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.state.write().expect("resource cache lock poisoned");
        let state = &mut *guard;

        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.expires_at.is_some_and(|at| at <= now))
            .map(|(uri, _)| uri.clone())
            .collect();

        for uri in &expired {
            if let Some(entry) = state.entries.remove(uri) {
                state.lru.remove(&entry.touch);
            }
        }
        expired.len()
    }

    /// Removes everything, releasing all items to the pool.
    pub fn clear(&self) {
        let mut guard = self.state.write().expect("resource cache lock poisoned");
        guard.entries.clear();
        guard.lru.clear();
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state
            .read()
            .expect("resource cache lock poisoned")
            .entries
            .len()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns hit/miss statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.size(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn expiry_for(&self, ttl: Ttl) -> Option<Instant> {
        match ttl {
            Ttl::Never => None,
            Ttl::For(duration) => Some(Instant::now() + duration),
            Ttl::Default => {
                if self.default_ttl.is_zero() {
                    None
                } else {
                    Some(Instant::now() + self.default_ttl)
                }
            }
        }
    }

    /// Checks the map/LRU bijection: every entry has exactly one index
    /// slot and vice versa.
    #[cfg(test)]
    fn lru_consistent(&self) -> bool {
        let guard = self.state.read().expect("resource cache lock poisoned");
        if guard.entries.len() != guard.lru.len() {
            return false;
        }
        guard.entries.iter().all(|(uri, entry)| {
            guard
                .lru
                .get(&entry.touch)
                .is_some_and(|indexed| indexed == uri)
        })
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ResourceCache")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .finish()
    }
}
