//! Permission holders: users and groups owning node collections

use parking_lot::RwLock;
use uuid::Uuid;

use super::node_map::NodeMap;
use super::types::{DataType, HolderId, DEFAULT_GROUP};
use crate::context::{ContextSatisfyMode, ContextSet, QueryOptions};
use crate::node::{Node, NodeKind};

/// A user or group owning normal and transient nodes
///
/// # Thread Safety
///
/// Each node collection sits behind its own `RwLock`, so concurrent
/// permission lookups only contend with writers of the same holder.
#[derive(Debug)]
pub struct Holder {
    id: HolderId,
    username: Option<String>,
    normal: RwLock<NodeMap>,
    transient: RwLock<NodeMap>,
    primary_group: RwLock<String>,
}

impl Holder {
    pub fn new_user(id: Uuid, username: Option<String>) -> Self {
        Self::new(HolderId::user(id), username)
    }

    pub fn new_group(name: &str) -> Self {
        Self::new(HolderId::group(name), None)
    }

    fn new(id: HolderId, username: Option<String>) -> Self {
        Self {
            id,
            username,
            normal: RwLock::new(NodeMap::new()),
            transient: RwLock::new(NodeMap::new()),
            primary_group: RwLock::new(DEFAULT_GROUP.to_string()),
        }
    }

    pub fn id(&self) -> &HolderId {
        &self.id
    }

    pub fn is_group(&self) -> bool {
        self.id.is_group()
    }

    /// Group name, or the user's unique id as a string
    pub fn object_name(&self) -> String {
        match &self.id {
            HolderId::Group(name) => name.clone(),
            HolderId::User(id) => id.to_string(),
        }
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Human readable name used in diagnostics
    pub fn formatted_name(&self) -> String {
        match (&self.id, &self.username) {
            (HolderId::User(_), Some(username)) => username.clone(),
            _ => self.object_name(),
        }
    }

    fn data(&self, data_type: DataType) -> &RwLock<NodeMap> {
        match data_type {
            DataType::Normal => &self.normal,
            DataType::Transient => &self.transient,
        }
    }

    pub fn set_node(&self, data_type: DataType, node: Node) -> bool {
        self.data(data_type).write().set(node)
    }

    pub fn unset_node(&self, data_type: DataType, key: &str, context: &ContextSet) -> bool {
        self.data(data_type).write().unset(key, context).is_some()
    }

    pub fn clear_nodes(&self, data_type: DataType) -> bool {
        self.data(data_type).write().clear()
    }

    /// Removes nodes of any kind matching the predicate from both collections
    pub fn clear_matching(&self, predicate: impl Fn(&Node) -> bool) -> usize {
        let normal = self.normal.write().clear_matching(&predicate).len();
        let transient = self.transient.write().clear_matching(&predicate).len();
        normal + transient
    }

    /// Expiry sweep; returns the number of nodes dropped
    pub fn remove_expired(&self) -> usize {
        self.normal.write().remove_expired().len() + self.transient.write().remove_expired().len()
    }

    pub fn nodes(&self, data_type: DataType) -> Vec<Node> {
        self.data(data_type).read().nodes()
    }

    /// Own nodes applying to a query
    ///
    /// Transient nodes come before normal ones, and nodes carrying more
    /// context pairs come before less specific ones. The sort is stable, so
    /// declaration order is kept otherwise.
    pub fn own_nodes(&self, query: &QueryOptions, mode: ContextSatisfyMode) -> Vec<Node> {
        let mut nodes = self.transient.read().filtered(query, mode);
        nodes.extend(self.normal.read().filtered(query, mode));
        nodes.sort_by(|a, b| b.context().len().cmp(&a.context().len()));
        nodes
    }

    /// Granting inheritance nodes applying to a query, in declaration order
    pub fn own_inheritance_nodes(&self, query: &QueryOptions, mode: ContextSatisfyMode) -> Vec<Node> {
        self.own_nodes(query, mode)
            .into_iter()
            .filter(|node| node.is_inheritance() && node.value())
            .collect()
    }

    /// Highest explicit `weight.<n>` node, ignoring context
    pub fn explicit_weight(&self) -> Option<i32> {
        self.normal
            .read()
            .filtered(&QueryOptions::non_contextual(), ContextSatisfyMode::default())
            .iter()
            .filter(|node| node.value())
            .filter_map(|node| match node.kind() {
                NodeKind::Weight(weight) => Some(*weight),
                _ => None,
            })
            .max()
    }

    /// Display name node applying to a query, if any
    pub fn display_name(&self, query: &QueryOptions, mode: ContextSatisfyMode) -> Option<String> {
        self.own_nodes(query, mode)
            .into_iter()
            .filter(|node| node.value())
            .find_map(|node| match node.kind() {
                NodeKind::DisplayName(name) => Some(name.clone()),
                _ => None,
            })
    }

    /// Stored primary group (users only; groups keep the default)
    pub fn stored_primary_group(&self) -> String {
        self.primary_group.read().clone()
    }

    pub fn set_stored_primary_group(&self, group: &str) {
        *self.primary_group.write() = group.to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_before_normal() {
        let holder = Holder::new_group("admin");
        holder.set_node(DataType::Normal, Node::permission("a").build().unwrap());
        holder.set_node(
            DataType::Transient,
            Node::permission("a").value(false).build().unwrap(),
        );

        let nodes = holder.own_nodes(&QueryOptions::non_contextual(), ContextSatisfyMode::default());
        assert_eq!(nodes.len(), 2);
        assert!(!nodes[0].value());
    }

    #[test]
    fn test_context_specific_first() {
        let holder = Holder::new_group("admin");
        holder.set_node(DataType::Normal, Node::permission("a").build().unwrap());
        holder.set_node(
            DataType::Normal,
            Node::permission("a")
                .value(false)
                .context("server", "lobby")
                .build()
                .unwrap(),
        );

        let query = QueryOptions::contextual(ContextSet::of("server", "lobby"));
        let nodes = holder.own_nodes(&query, ContextSatisfyMode::default());
        assert!(!nodes[0].value());
    }

    #[test]
    fn test_inheritance_nodes_exclude_negated() {
        let holder = Holder::new_user(Uuid::new_v4(), Some("alice".to_string()));
        holder.set_node(DataType::Normal, Node::inheritance("vip").build().unwrap());
        holder.set_node(
            DataType::Normal,
            Node::inheritance("banned").value(false).build().unwrap(),
        );

        let parents = holder.own_inheritance_nodes(&QueryOptions::non_contextual(), ContextSatisfyMode::default());
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].inheritance_group(), Some("vip"));
        assert_eq!(holder.formatted_name(), "alice");
    }

    #[test]
    fn test_explicit_weight_takes_max() {
        let holder = Holder::new_group("admin");
        holder.set_node(DataType::Normal, Node::weight(10).build().unwrap());
        holder.set_node(
            DataType::Normal,
            Node::weight(50).context("server", "lobby").build().unwrap(),
        );

        assert_eq!(holder.explicit_weight(), Some(50));
        assert_eq!(Holder::new_group("empty").explicit_weight(), None);
    }

    #[test]
    fn test_display_name() {
        let holder = Holder::new_group("mod");
        holder.set_node(DataType::Normal, Node::display_name("Moderator").build().unwrap());
        assert_eq!(
            holder.display_name(&QueryOptions::non_contextual(), ContextSatisfyMode::default()),
            Some("Moderator".to_string())
        );
    }

    #[test]
    fn test_primary_group_default() {
        let holder = Holder::new_user(Uuid::new_v4(), None);
        assert_eq!(holder.stored_primary_group(), DEFAULT_GROUP);
        holder.set_stored_primary_group("VIP");
        assert_eq!(holder.stored_primary_group(), "vip");
    }
}
