use std::fmt;

use crate::context::QueryOptions;
use crate::holder::{HolderId, HolderType};

/// Describes which holder and query a cache entry was computed for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMetadata {
    holder_type: HolderType,
    holder_name: String,
    query_options: QueryOptions,
}

impl CacheMetadata {
    pub fn new(holder: &HolderId, query_options: QueryOptions) -> Self {
        Self::named(holder.holder_type(), holder.to_string(), query_options)
    }

    pub fn named(holder_type: HolderType, holder_name: impl Into<String>, query_options: QueryOptions) -> Self {
        Self {
            holder_type,
            holder_name: holder_name.into(),
            query_options,
        }
    }

    pub fn holder_type(&self) -> HolderType {
        self.holder_type
    }

    pub fn holder_name(&self) -> &str {
        &self.holder_name
    }

    pub fn query_options(&self) -> &QueryOptions {
        &self.query_options
    }
}

impl fmt::Display for CacheMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.holder_name, self.query_options.context())
    }
}
