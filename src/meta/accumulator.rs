//! Meta accumulation while walking an inheritance tree

use indexmap::IndexMap;
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashSet};

use super::stack::{MetaStackAccumulator, MetaStackDefinition};
use crate::holder::HolderId;
use crate::node::{ChatMetaType, Node, NodeKind};

/// Synthetic meta key carrying the resolved weight
pub const WEIGHT_KEY: &str = "weight";
/// Synthetic meta key carrying the primary group
pub const PRIMARY_GROUP_KEY: &str = "primarygroup";

/// A meta/prefix/suffix value and the node it came from
///
/// Synthetic entries injected on completion have no node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaValue {
    pub value: String,
    pub node: Option<Node>,
}

impl MetaValue {
    fn from_node(value: &str, node: &Node) -> Self {
        Self {
            value: value.to_string(),
            node: Some(node.clone()),
        }
    }

    fn synthetic(value: String) -> Self {
        Self { value, node: None }
    }
}

/// A weight fact and the holder it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightResult {
    pub weight: i32,
    pub origin: HolderId,
}

/// Single-use builder collecting meta during one inheritance walk
///
/// Nodes are processed at most once per key: the first copy offered wins,
/// so a closer holder's `false` node hides a farther holder's `true` one.
/// [`complete`](MetaAccumulator::complete) consumes the builder; reads only
/// exist on the resulting [`MetaSnapshot`].
#[derive(Debug)]
pub struct MetaAccumulator {
    root: HolderId,
    seen_keys: HashSet<String>,
    meta: IndexMap<String, Vec<MetaValue>>,
    prefixes: BTreeMap<Reverse<i32>, MetaValue>,
    suffixes: BTreeMap<Reverse<i32>, MetaValue>,
    weight: Option<WeightResult>,
    primary_group: Option<String>,
    prefix_stack: MetaStackAccumulator,
    suffix_stack: MetaStackAccumulator,
}

impl MetaAccumulator {
    pub fn new(root: HolderId, prefix_stack: MetaStackDefinition, suffix_stack: MetaStackDefinition) -> Self {
        Self {
            root,
            seen_keys: HashSet::new(),
            meta: IndexMap::new(),
            prefixes: BTreeMap::new(),
            suffixes: BTreeMap::new(),
            weight: None,
            primary_group: None,
            prefix_stack: MetaStackAccumulator::new(prefix_stack, ChatMetaType::Prefix),
            suffix_stack: MetaStackAccumulator::new(suffix_stack, ChatMetaType::Suffix),
        }
    }

    pub fn accumulate_node(&mut self, node: &Node) {
        if !self.seen_keys.insert(node.key().to_string()) {
            return;
        }
        if !node.value() {
            return;
        }

        match node.kind() {
            NodeKind::Meta { key, value } => {
                self.meta
                    .entry(key.clone())
                    .or_default()
                    .push(MetaValue::from_node(value, node));
            }
            NodeKind::ChatMeta {
                meta_type: ChatMetaType::Prefix,
                priority,
                value,
            } => {
                self.prefixes
                    .entry(Reverse(*priority))
                    .or_insert_with(|| MetaValue::from_node(value, node));
                self.prefix_stack.offer(&self.root, node);
            }
            NodeKind::ChatMeta {
                meta_type: ChatMetaType::Suffix,
                priority,
                value,
            } => {
                self.suffixes
                    .entry(Reverse(*priority))
                    .or_insert_with(|| MetaValue::from_node(value, node));
                self.suffix_stack.offer(&self.root, node);
            }
            NodeKind::Weight(weight) => {
                let origin = node.origin().unwrap_or(&self.root).clone();
                self.accumulate_weight(WeightResult { weight: *weight, origin });
            }
            _ => {}
        }
    }

    /// Keeps the running maximum; an equal weight never replaces the current one
    pub fn accumulate_weight(&mut self, weight: WeightResult) {
        match &self.weight {
            Some(current) if weight.weight <= current.weight => {}
            _ => self.weight = Some(weight),
        }
    }

    pub fn set_primary_group(&mut self, group: impl Into<String>) {
        self.primary_group = Some(group.into());
    }

    /// Finishes accumulation, injecting synthetic `weight` and
    /// `primarygroup` meta entries unless real ones exist
    pub fn complete(mut self) -> MetaSnapshot {
        if let Some(weight) = &self.weight {
            if !self.meta.contains_key(WEIGHT_KEY) {
                self.meta
                    .insert(WEIGHT_KEY.to_string(), vec![MetaValue::synthetic(weight.weight.to_string())]);
            }
        }
        if let Some(group) = &self.primary_group {
            if !self.meta.contains_key(PRIMARY_GROUP_KEY) {
                self.meta
                    .insert(PRIMARY_GROUP_KEY.to_string(), vec![MetaValue::synthetic(group.clone())]);
            }
        }

        MetaSnapshot {
            prefix: self.prefix_stack.render(),
            suffix: self.suffix_stack.render(),
            meta: self.meta,
            prefixes: self.prefixes,
            suffixes: self.suffixes,
            weight: self.weight,
            primary_group: self.primary_group,
        }
    }
}

/// Read-only result of a completed meta accumulation
#[derive(Debug, Clone, Default)]
pub struct MetaSnapshot {
    meta: IndexMap<String, Vec<MetaValue>>,
    prefixes: BTreeMap<Reverse<i32>, MetaValue>,
    suffixes: BTreeMap<Reverse<i32>, MetaValue>,
    prefix: Option<String>,
    suffix: Option<String>,
    weight: Option<WeightResult>,
    primary_group: Option<String>,
}

impl MetaSnapshot {
    /// Stacked prefix
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Stacked suffix
    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// First value recorded for a meta key
    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.meta
            .get(&key.to_lowercase())
            .and_then(|values| values.first())
            .map(|v| v.value.as_str())
    }

    /// Every value recorded for a meta key, first seen first
    pub fn meta_values(&self, key: &str) -> Vec<&str> {
        self.meta
            .get(&key.to_lowercase())
            .map(|values| values.iter().map(|v| v.value.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn meta(&self) -> &IndexMap<String, Vec<MetaValue>> {
        &self.meta
    }

    /// Prefix candidates, highest priority first
    pub fn prefixes(&self) -> impl Iterator<Item = (i32, &MetaValue)> {
        self.prefixes.iter().map(|(Reverse(priority), value)| (*priority, value))
    }

    /// Suffix candidates, highest priority first
    pub fn suffixes(&self) -> impl Iterator<Item = (i32, &MetaValue)> {
        self.suffixes.iter().map(|(Reverse(priority), value)| (*priority, value))
    }

    pub fn weight(&self) -> Option<i32> {
        self.weight.as_ref().map(|w| w.weight)
    }

    pub fn weight_result(&self) -> Option<&WeightResult> {
        self.weight.as_ref()
    }

    pub fn primary_group(&self) -> Option<&str> {
        self.primary_group.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator() -> MetaAccumulator {
        MetaAccumulator::new(
            HolderId::group("root"),
            MetaStackDefinition::default(),
            MetaStackDefinition::default(),
        )
    }

    fn from(builder: crate::node::NodeBuilder, origin: &str) -> Node {
        builder.build().unwrap().with_origin(HolderId::group(origin))
    }

    #[test]
    fn test_closer_meta_wins() {
        let mut acc = accumulator();
        acc.accumulate_node(&from(Node::meta("k", "close"), "mod"));
        acc.accumulate_node(&from(Node::meta("k", "close"), "admin"));
        acc.accumulate_node(&from(Node::meta("k", "far"), "admin"));

        let snapshot = acc.complete();
        assert_eq!(snapshot.meta_value("k"), Some("close"));
        // different values are different node keys, so both are recorded
        assert_eq!(snapshot.meta_values("k"), vec!["close", "far"]);
    }

    #[test]
    fn test_negated_node_cancels_farther_copy() {
        let mut acc = accumulator();
        acc.accumulate_node(&from(Node::prefix(10, "[X]").value(false), "close"));
        acc.accumulate_node(&from(Node::prefix(10, "[X]"), "far"));

        let snapshot = acc.complete();
        assert_eq!(snapshot.prefix(), None);
        assert_eq!(snapshot.prefixes().count(), 0);
    }

    #[test]
    fn test_prefix_priority_map_descending() {
        let mut acc = accumulator();
        acc.accumulate_node(&from(Node::prefix(5, "[Low]"), "a"));
        acc.accumulate_node(&from(Node::prefix(50, "[High]"), "b"));
        acc.accumulate_node(&from(Node::prefix(50, "[Other]"), "c"));

        let snapshot = acc.complete();
        let prefixes: Vec<(i32, &str)> = snapshot
            .prefixes()
            .map(|(priority, value)| (priority, value.value.as_str()))
            .collect();
        assert_eq!(prefixes, vec![(50, "[High]"), (5, "[Low]")]);
        assert_eq!(snapshot.prefix(), Some("[High]"));
    }

    #[test]
    fn test_weight_strict_maximum() {
        let mut acc = accumulator();
        acc.accumulate_weight(WeightResult { weight: 10, origin: HolderId::group("a") });
        acc.accumulate_weight(WeightResult { weight: 10, origin: HolderId::group("b") });
        acc.accumulate_weight(WeightResult { weight: 3, origin: HolderId::group("c") });

        let snapshot = acc.complete();
        assert_eq!(snapshot.weight(), Some(10));
        assert_eq!(snapshot.weight_result().map(|w| &w.origin), Some(&HolderId::group("a")));
        assert_eq!(snapshot.meta_value(WEIGHT_KEY), Some("10"));
    }

    #[test]
    fn test_synthetic_entries_do_not_replace_real_meta() {
        let mut acc = accumulator();
        acc.accumulate_node(&from(Node::meta("primarygroup", "custom"), "a"));
        acc.accumulate_node(&from(Node::weight(7), "a"));
        acc.set_primary_group("admin");

        let snapshot = acc.complete();
        assert_eq!(snapshot.meta_value(PRIMARY_GROUP_KEY), Some("custom"));
        assert_eq!(snapshot.primary_group(), Some("admin"));
        assert_eq!(snapshot.meta_value(WEIGHT_KEY), Some("7"));
    }

    #[test]
    fn test_empty_accumulator() {
        let snapshot = accumulator().complete();
        assert_eq!(snapshot.weight(), None);
        assert!(snapshot.meta().is_empty());
        assert_eq!(snapshot.suffix(), None);
    }
}
