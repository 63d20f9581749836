//! Cache of compiled JSON-Schemas.
//!
//! Tool argument validation compiles each distinct schema once and reuses
//! the compiled form. Entries are keyed by a hash of the schema's
//! canonical JSON text and evicted LRU, mirroring the resource cache's
//! map-plus-index structure under one lock.

use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use gatemcp_core::logging::{debug, targets};
use gatemcp_core::{McpError, McpResult};
use gatemcp_protocol::CompiledSchema;
use serde::Serialize;
use serde_json::Value;

struct SchemaEntry {
    schema: Arc<CompiledSchema>,
    compiled_at: DateTime<Utc>,
    use_count: u64,
    touch: u64,
}

struct SchemaCacheState {
    entries: HashMap<u64, SchemaEntry>,
    lru: BTreeMap<u64, u64>,
    tick: u64,
}

/// Point-in-time schema cache statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SchemaCacheStats {
    /// Compiled schemas currently stored.
    pub size: usize,
    /// Maximum entries.
    pub capacity: usize,
    /// Lookups served from cache.
    pub hits: u64,
    /// Lookups that required compilation.
    pub misses: u64,
}

/// LRU cache of compiled JSON-Schemas keyed by schema-text hash.
pub struct SchemaCache {
    state: RwLock<SchemaCacheState>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SchemaCache {
    /// Creates a cache bounded at `capacity` compiled schemas.
    ///
    /// A `capacity` of 0 disables caching; validation still works but
    /// compiles on every call.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(SchemaCacheState {
                entries: HashMap::new(),
                lru: BTreeMap::new(),
                tick: 0,
            }),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Validates `instance` against `schema`, compiling and caching the
    /// schema as needed.
    ///
    /// # Errors
    ///
    /// `InternalError` when the schema itself does not compile;
    /// `InvalidParams` when the instance fails validation.
    pub fn validate(&self, schema: &Value, instance: &Value) -> McpResult<()> {
        let compiled = self.compiled(schema)?;
        match compiled.validate(instance) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.path, e.message))
                    .collect();
                Err(McpError::invalid_params(format!(
                    "Input validation failed: {}",
                    messages.join("; ")
                )))
            }
        }
    }

    /// Returns the compiled form of `schema`, from cache or freshly built.
    pub fn compiled(&self, schema: &Value) -> McpResult<Arc<CompiledSchema>> {
        let key = schema_key(schema);

        if self.capacity == 0 {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return compile(schema);
        }

        {
            let mut guard = self.state.write().expect("schema cache lock poisoned");
            let state = &mut *guard;
            if let Some(entry) = state.entries.get_mut(&key) {
                state.lru.remove(&entry.touch);
                state.tick += 1;
                entry.touch = state.tick;
                entry.use_count += 1;
                state.lru.insert(state.tick, key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(Arc::clone(&entry.schema));
            }
        }

        // Compile outside the lock; concurrent compiles of the same
        // schema are wasted work, not a correctness problem.
        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = compile(schema)?;

        let mut guard = self.state.write().expect("schema cache lock poisoned");
        let state = &mut *guard;
        if !state.entries.contains_key(&key) {
            if state.entries.len() >= self.capacity {
                if let Some((_, tail_key)) = state.lru.pop_first() {
                    state.entries.remove(&tail_key);
                    debug!(target: targets::CACHE, "Evicted compiled schema {tail_key:#x}");
                }
            }
            state.tick += 1;
            state.lru.insert(state.tick, key);
            state.entries.insert(
                key,
                SchemaEntry {
                    schema: Arc::clone(&compiled),
                    compiled_at: Utc::now(),
                    use_count: 1,
                    touch: state.tick,
                },
            );
        }
        Ok(compiled)
    }

    /// Returns the number of cached schemas.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state
            .read()
            .expect("schema cache lock poisoned")
            .entries
            .len()
    }

    /// Returns hit/miss statistics.
    #[must_use]
    pub fn stats(&self) -> SchemaCacheStats {
        SchemaCacheStats {
            size: self.size(),
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Returns how often the given schema has been served from cache.
    #[must_use]
    pub fn use_count(&self, schema: &Value) -> u64 {
        let key = schema_key(schema);
        self.state
            .read()
            .expect("schema cache lock poisoned")
            .entries
            .get(&key)
            .map_or(0, |entry| entry.use_count)
    }

    /// Returns when the given schema was compiled, if cached.
    #[must_use]
    pub fn compiled_at(&self, schema: &Value) -> Option<DateTime<Utc>> {
        let key = schema_key(schema);
        self.state
            .read()
            .expect("schema cache lock poisoned")
            .entries
            .get(&key)
            .map(|entry| entry.compiled_at)
    }
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("SchemaCache")
            .field("size", &stats.size)
            .field("capacity", &stats.capacity)
            .finish()
    }
}

fn compile(schema: &Value) -> McpResult<Arc<CompiledSchema>> {
    CompiledSchema::compile(schema)
        .map(Arc::new)
        .map_err(|e| McpError::internal_error(format!("Schema compilation failed: {e}")))
}

/// Hashes a schema's canonical JSON text.
///
/// `serde_json` serializes object keys in sorted order, so equal schemas
/// hash equally regardless of how their maps were built.
fn schema_key(schema: &Value) -> u64 {
    let text = schema.to_string();
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_schema() -> Value {
        json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }

    #[test]
    fn validate_accepts_and_rejects() {
        let cache = SchemaCache::new(8);
        let schema = echo_schema();
        assert!(cache.validate(&schema, &json!({"text": "hi"})).is_ok());

        let err = cache.validate(&schema, &json!({})).unwrap_err();
        assert_eq!(err.code, gatemcp_core::McpErrorCode::InvalidParams);
        assert!(err.message.contains("Input validation failed"));
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = SchemaCache::new(8);
        let schema = echo_schema();
        cache.validate(&schema, &json!({"text": "a"})).unwrap();
        cache.validate(&schema, &json!({"text": "b"})).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.size, 1);
        assert_eq!(cache.use_count(&schema), 2);
        assert!(cache.compiled_at(&schema).is_some());
    }

    #[test]
    fn lru_eviction_at_capacity() {
        let cache = SchemaCache::new(2);
        let a = json!({"type": "string"});
        let b = json!({"type": "number"});
        let c = json!({"type": "boolean"});

        cache.validate(&a, &json!("x")).unwrap();
        cache.validate(&b, &json!(1)).unwrap();
        // Touch `a`, making `b` the tail.
        cache.validate(&a, &json!("y")).unwrap();
        cache.validate(&c, &json!(true)).unwrap();

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.use_count(&b), 0);
        assert!(cache.use_count(&a) > 0);
    }

    #[test]
    fn zero_capacity_still_validates() {
        let cache = SchemaCache::new(0);
        let schema = echo_schema();
        assert!(cache.validate(&schema, &json!({"text": "hi"})).is_ok());
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn bad_schema_is_internal_error() {
        let cache = SchemaCache::new(8);
        let err = cache.validate(&json!(42), &json!({})).unwrap_err();
        assert_eq!(err.code, gatemcp_core::McpErrorCode::InternalError);
    }

    #[test]
    fn equal_schemas_share_one_entry() {
        let cache = SchemaCache::new(8);
        // Built differently, same canonical text.
        let first = json!({"type": "object", "required": ["a"]});
        let second = json!({"required": ["a"], "type": "object"});
        cache.validate(&first, &json!({"a": 1})).unwrap();
        cache.validate(&second, &json!({"a": 2})).unwrap();
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.stats().hits, 1);
    }
}
