//! Permission calculator: runs a permission through the processor pipeline

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::processor::PermissionProcessor;
use super::tristate::TristateResult;
use super::SourceMap;
use crate::cache::CacheMetadata;
use crate::error::{PermsError, Result};

/// Where a permission check originated
///
/// Only used for diagnostics; never changes the computed result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckOrigin {
    /// Lookup performed by the hosting platform
    #[default]
    PlatformLookup,
    /// Call through the public API by a third party
    ThirdPartyApi,
    /// Internal lookup, e.g. command handling
    Internal,
}

/// Memoised lookups a calculator keeps by default
pub const DEFAULT_LOOKUP_CAPACITY: usize = 10_000;

/// Tri-state calculator over an immutable permission snapshot
///
/// Results are memoised per permission until
/// [`invalidate_cache`](PermissionCalculator::invalidate_cache) is called.
/// The memo holds at most `lookup_capacity` permissions; a full memo drops
/// a tenth of its entries before the next insert. A capacity of zero
/// disables memoisation.
pub struct PermissionCalculator {
    metadata: CacheMetadata,
    source: Arc<SourceMap>,
    processors: Vec<Box<dyn PermissionProcessor>>,
    lookup_cache: DashMap<String, TristateResult>,
    lookup_capacity: usize,
}

impl PermissionCalculator {
    /// Builds a calculator, refreshing every processor from the snapshot
    pub fn new(
        metadata: CacheMetadata,
        source: Arc<SourceMap>,
        mut processors: Vec<Box<dyn PermissionProcessor>>,
    ) -> Self {
        for processor in &mut processors {
            processor.refresh(&source);
        }

        Self {
            metadata,
            source,
            processors,
            lookup_cache: DashMap::new(),
            lookup_capacity: DEFAULT_LOOKUP_CAPACITY,
        }
    }

    pub fn with_lookup_capacity(mut self, capacity: usize) -> Self {
        self.lookup_capacity = capacity;
        self
    }

    /// Checks a permission
    ///
    /// The permission is lower-cased and run through each processor in
    /// order; the first defined result wins unless an override processor
    /// replaces it. No match yields `Undefined`.
    ///
    /// # Errors
    ///
    /// Returns `PermsError::EmptyPermission` for an empty permission.
    pub fn check_permission(&self, permission: &str, origin: CheckOrigin) -> Result<TristateResult> {
        if permission.trim().is_empty() {
            return Err(PermsError::EmptyPermission);
        }
        let permission = permission.to_lowercase();

        if let Some(cached) = self.lookup_cache.get(&permission) {
            trace!(
                holder = %self.metadata.holder_name(),
                ?origin,
                "{} -> {} (memoised)",
                permission,
                cached.result()
            );
            return Ok(cached.clone());
        }

        let result = self
            .processors
            .iter()
            .fold(TristateResult::undefined(), |previous, processor| {
                processor.check(previous, &permission)
            });

        trace!(
            holder = %self.metadata.holder_name(),
            ?origin,
            processor = ?result.processor(),
            "{} -> {}",
            permission,
            result.result()
        );

        self.memoise(permission, &result);
        Ok(result)
    }

    fn memoise(&self, permission: String, result: &TristateResult) {
        if self.lookup_capacity == 0 {
            return;
        }
        if self.lookup_cache.len() >= self.lookup_capacity {
            // Simple eviction: drop the first tenth encountered
            let count = (self.lookup_capacity / 10).max(1);
            let evicted: Vec<String> = self
                .lookup_cache
                .iter()
                .take(count)
                .map(|entry| entry.key().clone())
                .collect();
            for key in &evicted {
                self.lookup_cache.remove(key);
            }
            debug!(
                holder = %self.metadata.holder_name(),
                "Evicted {} memoised lookups",
                evicted.len()
            );
        }
        self.lookup_cache.insert(permission, result.clone());
    }

    /// Drops memoised results; the snapshot itself never changes
    pub fn invalidate_cache(&self) {
        self.lookup_cache.clear();
    }

    /// Number of memoised lookups
    pub fn memoised(&self) -> usize {
        self.lookup_cache.len()
    }

    pub fn metadata(&self) -> &CacheMetadata {
        &self.metadata
    }

    pub fn source(&self) -> &Arc<SourceMap> {
        &self.source
    }

    pub fn processor_kinds(&self) -> Vec<super::ProcessorKind> {
        self.processors.iter().map(|p| p.kind()).collect()
    }
}

impl std::fmt::Debug for PermissionCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionCalculator")
            .field("metadata", &self.metadata)
            .field("permissions", &self.source.len())
            .field("processors", &self.processor_kinds())
            .finish()
    }
}
