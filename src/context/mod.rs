//! Context module for situational query scoping.
//!
//! This module provides:
//! - Immutable, hashable context sets used in queries and cache keys
//! - Mutable context sets used while composing a query
//! - Query options combining context, flags and meta stack overrides

mod query;
mod types;

pub use query::{QueryFlags, QueryMode, QueryOptions};
pub use types::{ContextSatisfyMode, ContextSet, MutableContextSet, SERVER_KEY, WORLD_KEY};
