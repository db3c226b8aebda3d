//! Cached permission and meta data entries

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::calculator::{CheckOrigin, PermissionCalculator, SourceMap, TristateResult};
use crate::context::QueryOptions;
use crate::error::Result;
use crate::meta::{MetaSnapshot, MetaValue};

/// Last-access tracking shared by both entry kinds
#[derive(Debug)]
struct Usage {
    last_used: Mutex<Instant>,
}

impl Usage {
    fn new() -> Self {
        Self {
            last_used: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_used.lock().elapsed()
    }
}

/// Permission side of a holder's cached data for one query
#[derive(Debug)]
pub struct CachedPermissionData {
    query_options: QueryOptions,
    calculator: PermissionCalculator,
    usage: Usage,
}

impl CachedPermissionData {
    pub fn new(query_options: QueryOptions, calculator: PermissionCalculator) -> Self {
        Self {
            query_options,
            calculator,
            usage: Usage::new(),
        }
    }

    /// Checks a permission against the resolved snapshot
    ///
    /// # Errors
    ///
    /// Returns `PermsError::EmptyPermission` for an empty permission.
    pub fn check_permission(&self, permission: &str, origin: CheckOrigin) -> Result<TristateResult> {
        self.calculator.check_permission(permission, origin)
    }

    /// The flattened permission snapshot this entry was built from
    pub fn permission_map(&self) -> &Arc<SourceMap> {
        self.calculator.source()
    }

    pub fn calculator(&self) -> &PermissionCalculator {
        &self.calculator
    }

    pub fn query_options(&self) -> &QueryOptions {
        &self.query_options
    }

    /// Drops memoised lookups without recomputing the snapshot
    pub fn invalidate_cache(&self) {
        self.calculator.invalidate_cache();
    }

    pub(crate) fn touch(&self) {
        self.usage.touch();
    }

    pub fn idle_for(&self) -> Duration {
        self.usage.idle_for()
    }
}

/// Meta side of a holder's cached data for one query
#[derive(Debug)]
pub struct CachedMetaData {
    query_options: QueryOptions,
    snapshot: MetaSnapshot,
    usage: Usage,
}

impl CachedMetaData {
    pub fn new(query_options: QueryOptions, snapshot: MetaSnapshot) -> Self {
        Self {
            query_options,
            snapshot,
            usage: Usage::new(),
        }
    }

    pub fn prefix(&self) -> Option<&str> {
        self.snapshot.prefix()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.snapshot.suffix()
    }

    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.snapshot.meta_value(key)
    }

    pub fn meta_values(&self, key: &str) -> Vec<&str> {
        self.snapshot.meta_values(key)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (i32, &MetaValue)> {
        self.snapshot.prefixes()
    }

    pub fn suffixes(&self) -> impl Iterator<Item = (i32, &MetaValue)> {
        self.snapshot.suffixes()
    }

    pub fn weight(&self) -> Option<i32> {
        self.snapshot.weight()
    }

    pub fn primary_group(&self) -> Option<&str> {
        self.snapshot.primary_group()
    }

    pub fn snapshot(&self) -> &MetaSnapshot {
        &self.snapshot
    }

    pub fn query_options(&self) -> &QueryOptions {
        &self.query_options
    }

    pub(crate) fn touch(&self) {
        self.usage.touch();
    }

    pub fn idle_for(&self) -> Duration {
        self.usage.idle_for()
    }
}
