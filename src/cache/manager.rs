//! Per-holder cache of permission and meta data keyed by query options

use dashmap::DashMap;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::data::{CachedMetaData, CachedPermissionData};
use super::metadata::CacheMetadata;
use crate::calculator::{CalculatorFactory, SourceMap};
use crate::context::QueryOptions;
use crate::error::Result;
use crate::meta::{MetaSnapshot, MetaStackDefinition};

/// Housekeeping threshold for unused entries
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(120);

/// Supplies the raw material for fresh cache entries
///
/// Implemented by the holder layer; everything it touches is already in
/// memory, so calls are synchronous and never fail.
pub trait CacheDataSource: Send + Sync + 'static {
    fn metadata(&self, query: &QueryOptions) -> CacheMetadata;

    /// Flattened, inheritance-resolved permission export
    fn resolve_permissions(&self, query: &QueryOptions) -> SourceMap;

    /// Walks the inheritance tree through a meta accumulator
    fn accumulate_meta(
        &self,
        query: &QueryOptions,
        prefix_stack: &MetaStackDefinition,
        suffix_stack: &MetaStackDefinition,
    ) -> MetaSnapshot;
}

/// Statistics about cache performance
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: usize,
    /// Number of cache misses
    pub misses: usize,
    /// Number of entries dropped by housekeeping
    pub evictions: usize,
    pub permission_entries: usize,
    pub meta_entries: usize,
}

impl CacheStats {
    /// Calculates the cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct ManagerInner {
    source: Arc<dyn CacheDataSource>,
    factory: Arc<dyn CalculatorFactory>,
    default_prefix_stack: MetaStackDefinition,
    default_suffix_stack: MetaStackDefinition,
    permission: DashMap<QueryOptions, Arc<CachedPermissionData>>,
    meta: DashMap<QueryOptions, Arc<CachedMetaData>>,
    /// Bumped before every invalidation
    generation: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
    evictions: AtomicUsize,
}

/// Holds a holder's cached data, one entry per distinct query
///
/// # Thread Safety
///
/// Entries live in concurrent maps and are computed without holding any
/// lock, so two threads missing the same key may both compute it. The last
/// insert wins and every returned entry is internally consistent. A value
/// whose computation overlapped an invalidation is returned to its caller
/// but never cached.
/// `recalculate_*` and `reload_*` run on Tokio's blocking pool and must be
/// called from within a runtime.
#[derive(Clone)]
pub struct CachedDataManager {
    inner: Arc<ManagerInner>,
}

impl CachedDataManager {
    pub fn new(
        source: Arc<dyn CacheDataSource>,
        factory: Arc<dyn CalculatorFactory>,
        default_prefix_stack: MetaStackDefinition,
        default_suffix_stack: MetaStackDefinition,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                source,
                factory,
                default_prefix_stack,
                default_suffix_stack,
                permission: DashMap::new(),
                meta: DashMap::new(),
                generation: AtomicU64::new(0),
                hits: AtomicUsize::new(0),
                misses: AtomicUsize::new(0),
                evictions: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the cached permission data for a query, computing it on a miss
    pub fn permission_data(&self, query: &QueryOptions) -> Arc<CachedPermissionData> {
        if let Some(entry) = self.inner.permission.get(query) {
            entry.touch();
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&entry);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Permission cache miss for {}", self.inner.source.metadata(query));
        let generation = self.inner.generation();
        let data = Arc::new(self.inner.calculate_permissions(query));
        self.inner.store(&self.inner.permission, generation, query, &data);
        data
    }

    /// Returns the cached meta data for a query, computing it on a miss
    pub fn meta_data(&self, query: &QueryOptions) -> Arc<CachedMetaData> {
        if let Some(entry) = self.inner.meta.get(query) {
            entry.touch();
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(&entry);
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Meta cache miss for {}", self.inner.source.metadata(query));
        let generation = self.inner.generation();
        let data = Arc::new(self.inner.calculate_meta(query));
        self.inner.store(&self.inner.meta, generation, query, &data);
        data
    }

    /// Drops every cached entry
    pub fn invalidate(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.permission.clear();
        self.inner.meta.clear();
        debug!("Invalidated all cached data");
    }

    /// Drops the entries for a single query
    pub fn invalidate_query(&self, query: &QueryOptions) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.permission.remove(query);
        self.inner.meta.remove(query);
    }

    /// Clears memoised permission lookups while keeping every snapshot
    ///
    /// Called from housekeeping so long-lived entries shed lookups of
    /// permissions that are no longer checked.
    pub fn invalidate_permission_calculators(&self) {
        for entry in self.inner.permission.iter() {
            entry.invalidate_cache();
        }
    }

    /// Recomputes permission data in the background
    ///
    /// The current entry keeps being served until the new one is stored.
    pub fn recalculate_permissions(&self, query: QueryOptions) -> JoinHandle<Arc<CachedPermissionData>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let generation = inner.generation();
            let data = Arc::new(inner.calculate_permissions(&query));
            inner.store(&inner.permission, generation, &query, &data);
            data
        })
    }

    /// Recomputes meta data in the background, replacing without a gap
    pub fn recalculate_meta(&self, query: QueryOptions) -> JoinHandle<Arc<CachedMetaData>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let generation = inner.generation();
            let data = Arc::new(inner.calculate_meta(&query));
            inner.store(&inner.meta, generation, &query, &data);
            data
        })
    }

    /// Removes then recomputes permission data in the background
    ///
    /// Unlike [`recalculate_permissions`](Self::recalculate_permissions),
    /// readers arriving in between compute the entry themselves.
    pub fn reload_permissions(&self, query: QueryOptions) -> JoinHandle<Arc<CachedPermissionData>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            inner.permission.remove(&query);
            let generation = inner.generation();
            let data = Arc::new(inner.calculate_permissions(&query));
            inner.store(&inner.permission, generation, &query, &data);
            data
        })
    }

    /// Removes then recomputes meta data in the background
    pub fn reload_meta(&self, query: QueryOptions) -> JoinHandle<Arc<CachedMetaData>> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            inner.meta.remove(&query);
            let generation = inner.generation();
            let data = Arc::new(inner.calculate_meta(&query));
            inner.store(&inner.meta, generation, &query, &data);
            data
        })
    }

    /// Recalculates every currently cached entry
    pub fn recalculate_all(&self) -> JoinHandle<Result<()>> {
        let permission: Vec<_> = self
            .permission_keys()
            .into_iter()
            .map(|query| self.recalculate_permissions(query))
            .collect();
        let meta: Vec<_> = self
            .meta_keys()
            .into_iter()
            .map(|query| self.recalculate_meta(query))
            .collect();
        tokio::spawn(await_all(permission, meta))
    }

    /// Reloads every currently cached entry
    pub fn reload_all(&self) -> JoinHandle<Result<()>> {
        let permission: Vec<_> = self
            .permission_keys()
            .into_iter()
            .map(|query| self.reload_permissions(query))
            .collect();
        let meta: Vec<_> = self
            .meta_keys()
            .into_iter()
            .map(|query| self.reload_meta(query))
            .collect();
        tokio::spawn(await_all(permission, meta))
    }

    /// Evicts entries unused for at least `expire`; returns how many went
    pub fn perform_cache_cleanup(&self, expire: Duration) -> usize {
        let before = self.inner.permission.len() + self.inner.meta.len();
        self.inner.permission.retain(|_, data| data.idle_for() < expire);
        self.inner.meta.retain(|_, data| data.idle_for() < expire);
        let evicted = before.saturating_sub(self.inner.permission.len() + self.inner.meta.len());

        if evicted > 0 {
            debug!("Evicted {} unused cache entries", evicted);
            self.inner.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        evicted
    }

    pub fn permission_keys(&self) -> Vec<QueryOptions> {
        self.inner.permission.iter().map(|e| e.key().clone()).collect()
    }

    pub fn meta_keys(&self) -> Vec<QueryOptions> {
        self.inner.meta.iter().map(|e| e.key().clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            evictions: self.inner.evictions.load(Ordering::Relaxed),
            permission_entries: self.inner.permission.len(),
            meta_entries: self.inner.meta.len(),
        }
    }
}

impl std::fmt::Debug for CachedDataManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDataManager")
            .field("permission_entries", &self.inner.permission.len())
            .field("meta_entries", &self.inner.meta.len())
            .finish()
    }
}

impl ManagerInner {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Caches `data` unless an invalidation started after `generation` was read
    fn store<V>(
        &self,
        map: &DashMap<QueryOptions, Arc<V>>,
        generation: u64,
        query: &QueryOptions,
        data: &Arc<V>,
    ) {
        if self.generation() != generation {
            debug!("Discarding entry computed across an invalidation");
            return;
        }
        map.insert(query.clone(), Arc::clone(data));

        // an invalidation may have cleared the map just before this insert
        if self.generation() != generation {
            map.remove_if(query, |_, cached| Arc::ptr_eq(cached, data));
        }
    }

    fn calculate_permissions(&self, query: &QueryOptions) -> CachedPermissionData {
        let metadata = self.source.metadata(query);
        let source = Arc::new(self.source.resolve_permissions(query));
        debug!("Calculated {} permissions for {}", source.len(), metadata);
        let calculator = self.factory.build(query, metadata, source);
        CachedPermissionData::new(query.clone(), calculator)
    }

    fn calculate_meta(&self, query: &QueryOptions) -> CachedMetaData {
        let prefix_stack = query.prefix_stack().unwrap_or(&self.default_prefix_stack);
        let suffix_stack = query.suffix_stack().unwrap_or(&self.default_suffix_stack);
        let snapshot = self.source.accumulate_meta(query, prefix_stack, suffix_stack);
        CachedMetaData::new(query.clone(), snapshot)
    }
}

async fn await_all(
    permission: Vec<JoinHandle<Arc<CachedPermissionData>>>,
    meta: Vec<JoinHandle<Arc<CachedMetaData>>>,
) -> Result<()> {
    for result in join_all(permission).await {
        result?;
    }
    for result in join_all(meta).await {
        result?;
    }
    Ok(())
}
