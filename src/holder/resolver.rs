//! Inheritance-aware views of a holder: permission export, meta walk and
//! primary group

use std::sync::Arc;

use super::model::Holder;
use super::primary::PrimaryGroupCalculation;
use super::registry::GroupRegistry;
use crate::cache::{CacheDataSource, CacheMetadata};
use crate::calculator::SourceMap;
use crate::config::EngineConfig;
use crate::context::QueryOptions;
use crate::inheritance::{sort_by_weight, traverse, GroupWeights, InheritanceGraph};
use crate::meta::{MetaAccumulator, MetaSnapshot, MetaStackDefinition, WeightResult};
use crate::node::{expand_shorthand, Node, NodeKind};

/// Resolves holders against the group registry under one configuration
pub struct HolderResolver<'a> {
    registry: &'a GroupRegistry,
    config: &'a EngineConfig,
    weights: &'a GroupWeights,
}

impl<'a> HolderResolver<'a> {
    pub fn new(registry: &'a GroupRegistry, config: &'a EngineConfig, weights: &'a GroupWeights) -> Self {
        Self {
            registry,
            config,
            weights,
        }
    }

    fn graph<'q>(&'q self, query: &'q QueryOptions) -> InheritanceGraph<'q> {
        InheritanceGraph::new(self.registry, query, self.config.context_satisfy_mode, self.weights)
    }

    /// The holder followed by its flattened ancestors
    ///
    /// Ancestors come in the configured traversal order, optionally
    /// stable-sorted by descending weight. The holder itself always stays
    /// first. Without `resolve_inheritance` only the holder is returned.
    pub fn inheritance_tree(&self, holder: &Arc<Holder>, query: &QueryOptions) -> Vec<Arc<Holder>> {
        let mut tree = vec![Arc::clone(holder)];
        if !query.flags().resolve_inheritance {
            return tree;
        }

        let mut ancestors = traverse(
            &self.graph(query),
            self.config.inheritance_traversal_algorithm,
            holder,
        );
        if self.config.post_traversal_inheritance_sort {
            sort_by_weight(&mut ancestors, |group| self.weights.weight_of(group));
        }
        tree.extend(ancestors);
        tree
    }

    /// Every node applying to the query, tagged with the holder it came from
    pub fn resolve_inherited_nodes(&self, holder: &Arc<Holder>, query: &QueryOptions) -> Vec<Node> {
        self.inheritance_tree(holder, query)
            .iter()
            .flat_map(|member| {
                member
                    .own_nodes(query, self.config.context_satisfy_mode)
                    .into_iter()
                    .map(|node| node.with_origin(member.id().clone()))
            })
            .collect()
    }

    /// Flattened permission map; the first node seen for a key wins
    ///
    /// With `apply_shorthand`, shorthand expansions are added after every
    /// literal key, so an explicit node always beats an expansion.
    pub fn export_permissions(
        &self,
        holder: &Arc<Holder>,
        query: &QueryOptions,
        include_inherited: bool,
        apply_shorthand: bool,
    ) -> SourceMap {
        let nodes = if include_inherited {
            self.resolve_inherited_nodes(holder, query)
        } else {
            holder
                .own_nodes(query, self.config.context_satisfy_mode)
                .into_iter()
                .map(|node| node.with_origin(holder.id().clone()))
                .collect()
        };

        let mut permissions = SourceMap::with_capacity(nodes.len());
        for node in &nodes {
            permissions
                .entry(node.key().to_string())
                .or_insert_with(|| node.clone());
        }

        if apply_shorthand {
            let literal = nodes
                .iter()
                .filter(|node| !matches!(node.kind(), NodeKind::RegexPermission { .. }));
            for node in literal {
                for expanded in expand_shorthand(node.key()) {
                    permissions
                        .entry(expanded.clone())
                        .or_insert_with(|| node.with_key(expanded));
                }
            }
        }

        permissions
    }

    /// Walks the inheritance tree through a fresh accumulator
    pub fn accumulate_meta(
        &self,
        holder: &Arc<Holder>,
        query: &QueryOptions,
        prefix_stack: &MetaStackDefinition,
        suffix_stack: &MetaStackDefinition,
    ) -> MetaSnapshot {
        let mut accumulator = MetaAccumulator::new(
            holder.id().clone(),
            prefix_stack.clone(),
            suffix_stack.clone(),
        );

        for member in self.inheritance_tree(holder, query) {
            for node in member.own_nodes(query, self.config.context_satisfy_mode) {
                accumulator.accumulate_node(&node.with_origin(member.id().clone()));
            }
            if let Some(weight) = self.weights.weight_of(&member) {
                accumulator.accumulate_weight(WeightResult {
                    weight,
                    origin: member.id().clone(),
                });
            }
        }

        if let Some(group) = self.primary_group(holder, query) {
            accumulator.set_primary_group(group);
        }
        accumulator.complete()
    }

    /// Primary group of a user under the configured calculation
    ///
    /// Groups have no primary group.
    pub fn primary_group(&self, holder: &Arc<Holder>, query: &QueryOptions) -> Option<String> {
        if holder.is_group() {
            return None;
        }

        let stored = holder.stored_primary_group();
        let mut candidates = match self.config.primary_group_calculation {
            PrimaryGroupCalculation::Stored => return Some(stored),
            PrimaryGroupCalculation::ParentsByWeight => self.graph(query).parents_of(holder),
            PrimaryGroupCalculation::AllParentsByWeight => {
                let mut tree = self.inheritance_tree(holder, query);
                tree.remove(0);
                tree
            }
        };

        sort_by_weight(&mut candidates, |group| self.weights.weight_of(group));
        Some(
            candidates
                .first()
                .map(|group| group.object_name())
                .unwrap_or(stored),
        )
    }
}

/// Feeds a holder's resolved data into its cache manager
pub struct HolderDataSource {
    holder: Arc<Holder>,
    registry: Arc<GroupRegistry>,
    config: Arc<EngineConfig>,
    weights: Arc<GroupWeights>,
}

impl HolderDataSource {
    pub fn new(
        holder: Arc<Holder>,
        registry: Arc<GroupRegistry>,
        config: Arc<EngineConfig>,
        weights: Arc<GroupWeights>,
    ) -> Self {
        Self {
            holder,
            registry,
            config,
            weights,
        }
    }

    fn resolver(&self) -> HolderResolver<'_> {
        HolderResolver::new(&self.registry, &self.config, &self.weights)
    }
}

impl CacheDataSource for HolderDataSource {
    fn metadata(&self, query: &QueryOptions) -> CacheMetadata {
        CacheMetadata::named(
            self.holder.id().holder_type(),
            self.holder.formatted_name(),
            query.clone(),
        )
    }

    fn resolve_permissions(&self, query: &QueryOptions) -> SourceMap {
        self.resolver()
            .export_permissions(&self.holder, query, true, self.config.apply_shorthand)
    }

    fn accumulate_meta(
        &self,
        query: &QueryOptions,
        prefix_stack: &MetaStackDefinition,
        suffix_stack: &MetaStackDefinition,
    ) -> MetaSnapshot {
        self.resolver()
            .accumulate_meta(&self.holder, query, prefix_stack, suffix_stack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextSet, QueryFlags};
    use crate::holder::DataType;
    use crate::inheritance::TraversalAlgorithm;
    use uuid::Uuid;

    struct Fixture {
        registry: GroupRegistry,
        config: EngineConfig,
        weights: GroupWeights,
    }

    impl Fixture {
        fn new(config: EngineConfig) -> Self {
            let weights = GroupWeights::new(&config.group_weights);
            Self {
                registry: GroupRegistry::new(),
                config,
                weights,
            }
        }

        fn resolver(&self) -> HolderResolver<'_> {
            HolderResolver::new(&self.registry, &self.config, &self.weights)
        }

        fn group(&self, name: &str, weight: i32, parents: &[&str]) -> Arc<Holder> {
            let group = self.registry.get_or_create(name);
            group.set_node(DataType::Normal, Node::weight(weight).build().unwrap());
            for parent in parents {
                group.set_node(DataType::Normal, Node::inheritance(parent).build().unwrap());
            }
            group
        }
    }

    fn user_inheriting(parents: &[&str]) -> Arc<Holder> {
        let user = Arc::new(Holder::new_user(Uuid::new_v4(), Some("steve".to_string())));
        for parent in parents {
            user.set_node(DataType::Normal, Node::inheritance(parent).build().unwrap());
        }
        user
    }

    fn names(tree: &[Arc<Holder>]) -> Vec<String> {
        tree.iter().skip(1).map(|h| h.object_name()).collect()
    }

    #[test]
    fn test_tree_starts_with_holder() {
        let fixture = Fixture::new(EngineConfig::default());
        fixture.group("a", 1, &[]);
        let user = user_inheriting(&["a"]);

        let tree = fixture.resolver().inheritance_tree(&user, &QueryOptions::non_contextual());
        assert!(Arc::ptr_eq(&tree[0], &user));
        assert_eq!(names(&tree), vec!["a"]);
    }

    #[test]
    fn test_resolve_inheritance_flag() {
        let fixture = Fixture::new(EngineConfig::default());
        fixture.group("a", 1, &[]);
        let user = user_inheriting(&["a"]);
        let flags = QueryFlags {
            resolve_inheritance: false,
            ..QueryFlags::default()
        };
        let query = QueryOptions::non_contextual().with_flags(flags);

        assert_eq!(fixture.resolver().inheritance_tree(&user, &query).len(), 1);
    }

    #[test]
    fn test_post_sort_keeps_holder_first() {
        let mut config = EngineConfig::default();
        config.inheritance_traversal_algorithm = TraversalAlgorithm::DepthFirstPreOrder;
        config.post_traversal_inheritance_sort = true;
        let fixture = Fixture::new(config);
        fixture.group("low", 1, &["high"]);
        fixture.group("high", 9, &[]);
        let user = user_inheriting(&["low"]);

        let tree = fixture.resolver().inheritance_tree(&user, &QueryOptions::non_contextual());
        assert!(Arc::ptr_eq(&tree[0], &user));
        assert_eq!(names(&tree), vec!["high", "low"]);
    }

    #[test]
    fn test_export_first_wins_and_origin() {
        let fixture = Fixture::new(EngineConfig::default());
        let parent = fixture.group("parent", 1, &[]);
        parent.set_node(DataType::Normal, Node::permission("fly").value(true).build().unwrap());
        parent.set_node(DataType::Normal, Node::permission("build").build().unwrap());
        let user = user_inheriting(&["parent"]);
        user.set_node(DataType::Normal, Node::permission("fly").value(false).build().unwrap());

        let query = QueryOptions::non_contextual();
        let export = fixture.resolver().export_permissions(&user, &query, true, false);

        let fly = export.get("fly").unwrap();
        assert!(!fly.value());
        assert_eq!(fly.origin(), Some(user.id()));
        assert_eq!(export.get("build").and_then(|n| n.origin()), Some(parent.id()));

        let own = fixture.resolver().export_permissions(&user, &query, false, false);
        assert!(!own.contains_key("build"));
    }

    #[test]
    fn test_export_shorthand_loses_to_literal() {
        let fixture = Fixture::new(EngineConfig::default());
        let user = user_inheriting(&[]);
        user.set_node(DataType::Normal, Node::permission("kit.(a|b)").build().unwrap());
        user.set_node(DataType::Normal, Node::permission("kit.b").value(false).build().unwrap());

        let export = fixture
            .resolver()
            .export_permissions(&user, &QueryOptions::non_contextual(), true, true);
        assert!(export.get("kit.a").unwrap().value());
        assert!(!export.get("kit.b").unwrap().value());
    }

    #[test]
    fn test_contextual_nodes_filtered() {
        let fixture = Fixture::new(EngineConfig::default());
        let user = user_inheriting(&[]);
        user.set_node(
            DataType::Normal,
            Node::permission("lobby.only").context("server", "lobby").build().unwrap(),
        );

        let lobby = QueryOptions::contextual(ContextSet::of("server", "lobby"));
        let survival = QueryOptions::contextual(ContextSet::of("server", "survival"));
        let resolver = fixture.resolver();

        assert!(resolver.export_permissions(&user, &lobby, true, false).contains_key("lobby.only"));
        assert!(!resolver.export_permissions(&user, &survival, true, false).contains_key("lobby.only"));
    }

    #[test]
    fn test_primary_group_calculations() {
        let mut config = EngineConfig::default();
        config.primary_group_calculation = PrimaryGroupCalculation::ParentsByWeight;
        let fixture = Fixture::new(config);
        fixture.group("member", 1, &["staff"]);
        fixture.group("staff", 50, &[]);
        fixture.group("vip", 10, &[]);
        let user = user_inheriting(&["member", "vip"]);
        let query = QueryOptions::non_contextual();

        assert_eq!(fixture.resolver().primary_group(&user, &query), Some("vip".to_string()));

        let all = Fixture::new(EngineConfig {
            primary_group_calculation: PrimaryGroupCalculation::AllParentsByWeight,
            ..EngineConfig::default()
        });
        all.group("member", 1, &["staff"]);
        all.group("staff", 50, &[]);
        all.group("vip", 10, &[]);
        assert_eq!(all.resolver().primary_group(&user, &query), Some("staff".to_string()));

        let stored = Fixture::new(EngineConfig {
            primary_group_calculation: PrimaryGroupCalculation::Stored,
            ..EngineConfig::default()
        });
        user.set_stored_primary_group("Builders");
        assert_eq!(stored.resolver().primary_group(&user, &query), Some("builders".to_string()));

        let group = fixture.registry.get_or_create("vip");
        assert_eq!(fixture.resolver().primary_group(&group, &query), None);
    }

    #[test]
    fn test_parents_by_weight_falls_back_to_stored() {
        let fixture = Fixture::new(EngineConfig::default());
        let user = user_inheriting(&["missing"]);
        assert_eq!(
            fixture.resolver().primary_group(&user, &QueryOptions::non_contextual()),
            Some("default".to_string())
        );
    }

    #[test]
    fn test_accumulate_meta_walk() {
        let fixture = Fixture::new(EngineConfig::default());
        let admin = fixture.group("admin", 20, &[]);
        admin.set_node(DataType::Normal, Node::prefix(100, "[Admin]").build().unwrap());
        admin.set_node(DataType::Normal, Node::meta("color", "red").build().unwrap());
        let user = user_inheriting(&["admin"]);
        user.set_node(DataType::Normal, Node::meta("color", "blue").build().unwrap());

        let snapshot = fixture.resolver().accumulate_meta(
            &user,
            &QueryOptions::non_contextual(),
            &MetaStackDefinition::default(),
            &MetaStackDefinition::default(),
        );

        assert_eq!(snapshot.prefix(), Some("[Admin]"));
        assert_eq!(snapshot.meta_value("color"), Some("blue"));
        assert_eq!(snapshot.weight(), Some(20));
        assert_eq!(snapshot.primary_group(), Some("admin"));
        assert_eq!(snapshot.meta_value("primarygroup"), Some("admin"));
    }
}
