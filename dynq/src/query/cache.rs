//! Compiled query cache
//!
//! Memoizes compiled predicate/ordering pairs keyed by the canonical serialization of
//! the submitted query. Entries are immutable and shared. Failed compiles are never
//! cached.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use super::engine::CompiledQuery;
use super::error::QueryError;
use crate::core::config::CacheConfig;

pub struct CompiledQueryCache<T> {
    cache: Cache<String, Arc<CompiledQuery<T>>>,
}

impl<T: 'static> CompiledQueryCache<T> {
    pub fn new(config: &CacheConfig) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(config.max_entries)
            // Set initial capacity to reduce rehashing during warmup
            .initial_capacity((config.max_entries as usize / 4).min(1_000));
        if config.ttl_secs > 0 {
            builder = builder.time_to_live(Duration::from_secs(config.ttl_secs));
        }

        tracing::debug!(
            max_entries = config.max_entries,
            ttl_secs = config.ttl_secs,
            "Compiled query cache enabled"
        );

        Self {
            cache: builder.build(),
        }
    }

    /// Return the cached entry for `key`, compiling and inserting it on a miss
    pub fn get_or_compile<F>(&self, key: String, compile: F) -> Result<Arc<CompiledQuery<T>>, QueryError>
    where
        F: FnOnce() -> Result<CompiledQuery<T>, QueryError>,
    {
        if let Some(hit) = self.cache.get(&key) {
            tracing::trace!(key = %key, "Compiled query cache hit");
            return Ok(hit);
        }

        self.cache
            .try_get_with(key, || compile().map(Arc::new))
            .map_err(|e: Arc<QueryError>| e.as_ref().clone())
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }
}
