//! Cache module: per-holder cached data keyed by query options.
//!
//! Features:
//! - Reference-stable entries until invalidated
//! - Background recalculation (no gap) and reload (remove, then recompute)
//! - Usage tracking with idle-entry housekeeping
//! - Hit/miss statistics

mod data;
mod manager;
mod metadata;

pub use data::{CachedMetaData, CachedPermissionData};
pub use manager::{CacheDataSource, CacheStats, CachedDataManager, DEFAULT_CACHE_EXPIRY};
pub use metadata::CacheMetadata;
