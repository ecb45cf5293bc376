//! Query engine
//!
//! Binds a field registry, shape limits and an optional compiled-query cache, and
//! compiles a `DynamicQuery` into a `CompiledQuery` ready to run against records.

use std::fmt;
use std::sync::Arc;

use super::cache::CompiledQueryCache;
use super::error::QueryError;
use super::fields::{FieldAccessible, FieldRegistry};
use super::ordering::{RecordOrdering, compile_ordering};
use super::parser::QueryLimits;
use super::predicate::{Predicate, compile_filter};
use super::types::DynamicQuery;
use crate::core::config::CacheConfig;

/// Compiled filter and ordering for one dynamic query
pub struct CompiledQuery<T> {
    predicate: Predicate<T>,
    ordering: RecordOrdering<T>,
}

impl<T> CompiledQuery<T> {
    pub fn new(predicate: Predicate<T>, ordering: RecordOrdering<T>) -> Self {
        Self {
            predicate,
            ordering,
        }
    }

    pub fn predicate(&self) -> &Predicate<T> {
        &self.predicate
    }

    pub fn ordering(&self) -> &RecordOrdering<T> {
        &self.ordering
    }

    pub fn matches(&self, record: &T) -> bool {
        self.predicate.matches(record)
    }

    pub fn sort(&self, records: Vec<T>) -> Vec<T> {
        self.ordering.sort(records)
    }
}

impl<T> fmt::Debug for CompiledQuery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("predicate", &self.predicate)
            .field("ordering", &self.ordering)
            .finish()
    }
}

pub struct QueryEngine<T> {
    registry: Arc<FieldRegistry<T>>,
    limits: QueryLimits,
    cache: Option<CompiledQueryCache<T>>,
}

impl<T: 'static> QueryEngine<T> {
    pub fn new(registry: FieldRegistry<T>) -> Self {
        Self {
            registry: Arc::new(registry),
            limits: QueryLimits::default(),
            cache: None,
        }
    }

    pub fn with_limits(mut self, limits: QueryLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Attach a compiled-query cache when `config.enabled` is set
    pub fn with_cache(mut self, config: &CacheConfig) -> Self {
        self.cache = config.enabled.then(|| CompiledQueryCache::new(config));
        self
    }

    pub fn registry(&self) -> &FieldRegistry<T> {
        &self.registry
    }

    pub fn limits(&self) -> &QueryLimits {
        &self.limits
    }

    pub fn cache(&self) -> Option<&CompiledQueryCache<T>> {
        self.cache.as_ref()
    }

    /// Compile filter and sort. All-or-nothing: any invalid part fails the whole query.
    pub fn compile(&self, query: &DynamicQuery) -> Result<Arc<CompiledQuery<T>>, QueryError> {
        self.limits.check(query)?;

        match &self.cache {
            Some(cache) => cache.get_or_compile(query.canonical_key(), || self.compile_uncached(query)),
            None => self.compile_uncached(query).map(Arc::new),
        }
    }

    fn compile_uncached(&self, query: &DynamicQuery) -> Result<CompiledQuery<T>, QueryError> {
        let predicate = match &query.filter {
            Some(node) => compile_filter(node, &self.registry)?,
            None => Predicate::always(),
        };
        let ordering = compile_ordering(&query.sort, &self.registry)?;
        Ok(CompiledQuery::new(predicate, ordering))
    }
}

impl<T: FieldAccessible> QueryEngine<T> {
    /// Engine over the record type's own field table
    pub fn for_type() -> Self {
        Self::new(T::fields().clone())
    }
}

impl<T> fmt::Debug for QueryEngine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryEngine")
            .field("record", &self.registry.record_name())
            .field("limits", &self.limits)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
