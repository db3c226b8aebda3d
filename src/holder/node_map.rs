//! Ordered node storage for a single holder data type

use indexmap::IndexMap;

use crate::context::{ContextSatisfyMode, ContextSet, QueryOptions};
use crate::node::Node;

/// Nodes are unique per (key, context); setting an existing pair replaces it
type NodeIdentity = (String, ContextSet);

/// Insertion-ordered node collection
///
/// Declaration order is preserved because it decides the order in which
/// parent groups are visited.
#[derive(Debug, Clone, Default)]
pub struct NodeMap {
    nodes: IndexMap<NodeIdentity, Node>,
}

impl NodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a node, returning true if the map changed
    pub fn set(&mut self, node: Node) -> bool {
        let identity = (node.key().to_string(), node.context().clone());
        match self.nodes.get(&identity) {
            Some(existing) if *existing == node => false,
            _ => {
                self.nodes.insert(identity, node);
                true
            }
        }
    }

    /// Removes the node with this key and context
    ///
    /// Prefix, suffix and meta keys keep their case, so the exact key is
    /// tried before its lower-cased form.
    pub fn unset(&mut self, key: &str, context: &ContextSet) -> Option<Node> {
        self.nodes
            .shift_remove(&(key.to_string(), context.clone()))
            .or_else(|| self.nodes.shift_remove(&(key.to_lowercase(), context.clone())))
    }

    pub fn clear(&mut self) -> bool {
        let changed = !self.nodes.is_empty();
        self.nodes.clear();
        changed
    }

    /// Removes every node matching the predicate, keeping order of the rest
    pub fn clear_matching(&mut self, predicate: impl Fn(&Node) -> bool) -> Vec<Node> {
        let mut removed = Vec::new();
        self.nodes.retain(|_, node| {
            if predicate(node) {
                removed.push(node.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drops expired nodes, returning them
    pub fn remove_expired(&mut self) -> Vec<Node> {
        self.clear_matching(Node::has_expired)
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    /// Nodes that apply to a query, in declaration order
    pub fn filtered(&self, query: &QueryOptions, mode: ContextSatisfyMode) -> Vec<Node> {
        self.nodes
            .values()
            .filter(|node| query.applies(node, mode))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn node(key: &str, value: bool) -> Node {
        Node::permission(key).value(value).build().unwrap()
    }

    #[test]
    fn test_set_replaces_same_identity() {
        let mut map = NodeMap::new();
        assert!(map.set(node("a.b", true)));
        assert!(!map.set(node("a.b", true)));
        assert!(map.set(node("a.b", false)));

        assert_eq!(map.len(), 1);
        assert!(!map.nodes()[0].value());
    }

    #[test]
    fn test_context_distinguishes_nodes() {
        let mut map = NodeMap::new();
        map.set(node("a.b", true));
        map.set(
            Node::permission("a.b")
                .context("server", "lobby")
                .build()
                .unwrap(),
        );
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_order_preserved_after_unset() {
        let mut map = NodeMap::new();
        map.set(node("group.a", true));
        map.set(node("group.b", true));
        map.set(node("group.c", true));
        map.unset("group.b", &ContextSet::empty());

        let keys: Vec<String> = map.nodes().iter().map(|n| n.key().to_string()).collect();
        assert_eq!(keys, vec!["group.a", "group.c"]);
    }

    #[test]
    fn test_remove_expired() {
        let mut map = NodeMap::new();
        map.set(
            Node::permission("temp")
                .expiry(Utc::now() - Duration::seconds(1))
                .build()
                .unwrap(),
        );
        map.set(node("perm", true));

        let removed = map.remove_expired();
        assert_eq!(removed.len(), 1);
        assert_eq!(map.len(), 1);
    }
}
