//! Query options identifying a resolution request and its cache entry

use serde::{Deserialize, Serialize};

use super::types::{ContextSatisfyMode, ContextSet, SERVER_KEY, WORLD_KEY};
use crate::meta::MetaStackDefinition;
use crate::node::Node;

/// Whether a query is scoped to a context or sees every node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryMode {
    Contextual,
    NonContextual,
}

/// Behavioural flags carried by a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryFlags {
    /// Walk parent groups when resolving
    pub resolve_inheritance: bool,
    /// Nodes without a `server` context apply to server-scoped queries
    pub include_nodes_without_server_context: bool,
    /// Nodes without a `world` context apply to world-scoped queries
    pub include_nodes_without_world_context: bool,
    /// Same as above, for inheritance (`group.*`) nodes
    pub apply_inheritance_nodes_without_server_context: bool,
    pub apply_inheritance_nodes_without_world_context: bool,
}

impl Default for QueryFlags {
    fn default() -> Self {
        Self {
            resolve_inheritance: true,
            include_nodes_without_server_context: true,
            include_nodes_without_world_context: true,
            apply_inheritance_nodes_without_server_context: true,
            apply_inheritance_nodes_without_world_context: true,
        }
    }
}

/// Immutable description of a resolution request
///
/// Two equal `QueryOptions` always resolve to the same cached data, so the
/// type is hashable and used directly as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryOptions {
    mode: QueryMode,
    context: ContextSet,
    flags: QueryFlags,
    prefix_stack: Option<MetaStackDefinition>,
    suffix_stack: Option<MetaStackDefinition>,
}

impl QueryOptions {
    /// Creates a contextual query with default flags
    pub fn contextual(context: ContextSet) -> Self {
        Self {
            mode: QueryMode::Contextual,
            context,
            flags: QueryFlags::default(),
            prefix_stack: None,
            suffix_stack: None,
        }
    }

    /// Creates a query that ignores node contexts entirely
    pub fn non_contextual() -> Self {
        Self {
            mode: QueryMode::NonContextual,
            context: ContextSet::empty(),
            flags: QueryFlags::default(),
            prefix_stack: None,
            suffix_stack: None,
        }
    }

    pub fn with_flags(mut self, flags: QueryFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_prefix_stack(mut self, definition: MetaStackDefinition) -> Self {
        self.prefix_stack = Some(definition);
        self
    }

    pub fn with_suffix_stack(mut self, definition: MetaStackDefinition) -> Self {
        self.suffix_stack = Some(definition);
        self
    }

    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn flags(&self) -> &QueryFlags {
        &self.flags
    }

    pub fn prefix_stack(&self) -> Option<&MetaStackDefinition> {
        self.prefix_stack.as_ref()
    }

    pub fn suffix_stack(&self) -> Option<&MetaStackDefinition> {
        self.suffix_stack.as_ref()
    }

    /// Checks whether a node applies to this query
    ///
    /// Expired nodes never apply. Non-contextual queries accept every live
    /// node; contextual queries also require the node context to be satisfied
    /// and honour the server/world inclusion flags.
    pub fn applies(&self, node: &Node, mode: ContextSatisfyMode) -> bool {
        if node.has_expired() {
            return false;
        }
        if self.mode == QueryMode::NonContextual {
            return true;
        }

        let (include_global_server, include_global_world) = if node.is_inheritance() {
            (
                self.flags.apply_inheritance_nodes_without_server_context,
                self.flags.apply_inheritance_nodes_without_world_context,
            )
        } else {
            (
                self.flags.include_nodes_without_server_context,
                self.flags.include_nodes_without_world_context,
            )
        };

        let node_context = node.context();
        if !include_global_server && !node_context.contains_key(SERVER_KEY) {
            return false;
        }
        if !include_global_world && !node_context.contains_key(WORLD_KEY) {
            return false;
        }

        node_context.is_satisfied_by(&self.context, mode)
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::contextual(ContextSet::empty())
    }
}
