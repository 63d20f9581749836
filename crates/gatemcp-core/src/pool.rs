//! Object pool for content items.
//!
//! Handlers and caches acquire [`ContentItem`]s from a shared pool instead
//! of allocating per request. Acquisition returns a [`PooledContent`] RAII
//! guard; dropping the guard recycles the item's buffers and returns it to
//! the free list. The pair of atomic counters makes the acquire/release
//! pairing observable in tests.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::content::{ContentItem, ContentType};
use crate::error::{McpError, McpResult};

/// Default cap on the free list.
const DEFAULT_MAX_IDLE: usize = 256;

/// Thread-safe pool of reusable [`ContentItem`]s.
///
/// Cloning the pool clones a handle to the same underlying free list.
#[derive(Clone)]
pub struct ObjectPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    free: Mutex<Vec<ContentItem>>,
    /// Free-list cap; items released beyond this are dropped.
    max_idle: usize,
    /// Optional bound on simultaneously outstanding items.
    max_live: Option<usize>,
    live: AtomicUsize,
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Point-in-time pool accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct PoolStats {
    /// Total successful acquisitions.
    pub acquired: u64,
    /// Total releases (guard drops).
    pub released: u64,
    /// Items currently held by guards.
    pub outstanding: usize,
    /// Items on the free list.
    pub idle: usize,
}

impl ObjectPool {
    /// Creates a pool with the default free-list cap and no live bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_IDLE, None)
    }

    /// Creates a pool with explicit limits.
    ///
    /// `max_idle` caps the free list; `max_live` (if set) bounds the number
    /// of simultaneously outstanding items, making `acquire` fallible.
    #[must_use]
    pub fn with_limits(max_idle: usize, max_live: Option<usize>) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                max_idle,
                max_live,
                live: AtomicUsize::new(0),
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
            }),
        }
    }

    /// Acquires an empty item from the pool.
    ///
    /// # Errors
    ///
    /// Returns `InternalError` when the pool's live bound is reached. The
    /// server treats this as a recoverable allocation failure.
    pub fn acquire(&self) -> McpResult<PooledContent> {
        let inner = &self.inner;
        if let Some(max) = inner.max_live {
            // Reserve a slot optimistically; roll back on overshoot.
            let prev = inner.live.fetch_add(1, Ordering::SeqCst);
            if prev >= max {
                inner.live.fetch_sub(1, Ordering::SeqCst);
                return Err(McpError::internal_error("Content pool exhausted"));
            }
        } else {
            inner.live.fetch_add(1, Ordering::SeqCst);
        }

        let item = {
            let mut free = inner.free.lock().expect("object pool lock poisoned");
            free.pop().unwrap_or_default()
        };
        inner.acquired.fetch_add(1, Ordering::Relaxed);

        Ok(PooledContent {
            item: Some(item),
            pool: Arc::clone(inner),
        })
    }

    /// Acquires an item and fills it in one step.
    pub fn acquire_filled(
        &self,
        content_type: ContentType,
        mime_type: &str,
        data: &[u8],
    ) -> McpResult<PooledContent> {
        let mut item = self.acquire()?;
        item.set(content_type, mime_type, data);
        Ok(item)
    }

    /// Acquires a deep copy of an existing item.
    pub fn acquire_copy(&self, source: &ContentItem) -> McpResult<PooledContent> {
        let mut item = self.acquire()?;
        item.copy_from(source);
        Ok(item)
    }

    /// Returns current accounting counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let idle = self
            .inner
            .free
            .lock()
            .expect("object pool lock poisoned")
            .len();
        PoolStats {
            acquired: self.inner.acquired.load(Ordering::Relaxed),
            released: self.inner.released.load(Ordering::Relaxed),
            outstanding: self.inner.live.load(Ordering::SeqCst),
            idle,
        }
    }
}

impl Default for ObjectPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ObjectPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ObjectPool")
            .field("outstanding", &stats.outstanding)
            .field("idle", &stats.idle)
            .finish()
    }
}

/// RAII guard over a pooled [`ContentItem`].
///
/// Dropping the guard recycles the item and returns it to the pool; the
/// release is unconditional, so every acquire pairs with exactly one
/// release on every path including early returns.
pub struct PooledContent {
    item: Option<ContentItem>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledContent {
    type Target = ContentItem;

    fn deref(&self) -> &ContentItem {
        self.item.as_ref().expect("pooled item present until drop")
    }
}

impl DerefMut for PooledContent {
    fn deref_mut(&mut self) -> &mut ContentItem {
        self.item.as_mut().expect("pooled item present until drop")
    }
}

impl Drop for PooledContent {
    fn drop(&mut self) {
        let Some(mut item) = self.item.take() else {
            return;
        };
        item.recycle();
        {
            let mut free = self.pool.free.lock().expect("object pool lock poisoned");
            if free.len() < self.pool.max_idle {
                free.push(item);
            }
        }
        self.pool.live.fetch_sub(1, Ordering::SeqCst);
        self.pool.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for PooledContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledContent")
            .field("content_type", &self.content_type())
            .field("size", &self.size())
            .finish()
    }
}
