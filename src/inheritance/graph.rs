//! Traversal-time view of holder inheritance

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::traversal::Graph;
use crate::context::{ContextSatisfyMode, QueryOptions};
use crate::holder::{GroupRegistry, Holder, HolderId};

/// Weight lookup combining explicit `weight.<n>` nodes with a static table
#[derive(Debug, Clone, Default)]
pub struct GroupWeights {
    table: HashMap<String, i32>,
}

impl GroupWeights {
    pub fn new(table: &HashMap<String, i32>) -> Self {
        Self {
            table: table
                .iter()
                .map(|(name, weight)| (name.to_lowercase(), *weight))
                .collect(),
        }
    }

    /// Maximum of the group's own weight nodes and its table entry
    ///
    /// Users never carry a weight; `None` sorts as the lowest weight.
    pub fn weight_of(&self, holder: &Holder) -> Option<i32> {
        let name = holder.id().group_name()?;
        let configured = self.table.get(name).copied();
        match (holder.explicit_weight(), configured) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Lazily exposes the parents of holders for a single query
///
/// Nothing is materialised: edges are read from each holder's live,
/// context-matching inheritance nodes when the traversal asks for them.
pub struct InheritanceGraph<'a> {
    registry: &'a GroupRegistry,
    query: &'a QueryOptions,
    mode: ContextSatisfyMode,
    weights: &'a GroupWeights,
}

impl<'a> InheritanceGraph<'a> {
    pub fn new(
        registry: &'a GroupRegistry,
        query: &'a QueryOptions,
        mode: ContextSatisfyMode,
        weights: &'a GroupWeights,
    ) -> Self {
        Self {
            registry,
            query,
            mode,
            weights,
        }
    }

    /// Distinct loaded parents, in the order their nodes were declared
    pub fn parents_of(&self, holder: &Holder) -> Vec<Arc<Holder>> {
        let mut seen: HashSet<HolderId> = HashSet::new();
        holder
            .own_inheritance_nodes(self.query, self.mode)
            .iter()
            .filter_map(|node| node.inheritance_group())
            .filter_map(|name| self.registry.get(name))
            .filter(|group| seen.insert(group.id().clone()))
            .collect()
    }
}

impl Graph for InheritanceGraph<'_> {
    type Node = Arc<Holder>;
    type Key = HolderId;

    fn key(&self, node: &Self::Node) -> Self::Key {
        node.id().clone()
    }

    /// Parents ordered by descending weight, declaration order breaking ties
    fn successors(&self, node: &Self::Node) -> Vec<Self::Node> {
        let mut parents = self.parents_of(node);
        super::traversal::sort_by_weight(&mut parents, |group| self.weights.weight_of(group));
        parents
    }
}
