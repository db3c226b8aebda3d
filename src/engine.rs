//! Permission engine: holders, registry and per-holder caches behind one API

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CachedDataManager, CachedMetaData, CachedPermissionData};
use crate::calculator::{CalculatorFactory, CheckOrigin, DefaultCalculatorFactory, TristateResult};
use crate::config::EngineConfig;
use crate::context::{ContextSet, QueryOptions};
use crate::error::{PermsError, Result};
use crate::holder::{DataType, GroupRegistry, Holder, HolderDataSource, HolderId, HolderResolver};
use crate::inheritance::GroupWeights;
use crate::node::Node;

/// Main permission engine
///
/// Owns every loaded holder and one [`CachedDataManager`] per holder.
/// Mutations made through the engine invalidate the affected caches: a
/// user's own caches for user changes, every cache for group changes since
/// any holder may inherit from the group.
///
/// # Examples
///
/// ```
/// use permresolve::{CheckOrigin, DataType, EngineConfig, HolderId, Node, PermissionEngine, QueryOptions, Tristate};
///
/// let engine = PermissionEngine::new(EngineConfig::default());
/// engine.create_group("admin");
/// engine
///     .set_node(&HolderId::group("admin"), DataType::Normal, Node::permission("server.*").build().unwrap())
///     .unwrap();
///
/// let user = engine.create_user(uuid::Uuid::new_v4(), Some("alex".to_string()));
/// engine
///     .set_node(user.id(), DataType::Normal, Node::inheritance("admin").build().unwrap())
///     .unwrap();
///
/// let result = engine
///     .check_permission(user.id(), "server.restart", &QueryOptions::non_contextual(), CheckOrigin::Internal)
///     .unwrap();
/// assert_eq!(result.result(), Tristate::True);
/// ```
pub struct PermissionEngine {
    config: Arc<EngineConfig>,
    weights: Arc<GroupWeights>,
    groups: Arc<GroupRegistry>,
    users: DashMap<Uuid, Arc<Holder>>,
    managers: DashMap<HolderId, CachedDataManager>,
    factory: Arc<dyn CalculatorFactory>,
}

impl PermissionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let factory = Arc::new(DefaultCalculatorFactory::new(&config));
        Self::with_factory(config, factory)
    }

    /// Creates an engine with a custom calculator pipeline
    pub fn with_factory(config: EngineConfig, factory: Arc<dyn CalculatorFactory>) -> Self {
        info!(
            algorithm = ?config.inheritance_traversal_algorithm,
            post_sort = config.post_traversal_inheritance_sort,
            "Initializing permission engine"
        );

        Self {
            weights: Arc::new(GroupWeights::new(&config.group_weights)),
            config: Arc::new(config),
            groups: Arc::new(GroupRegistry::new()),
            users: DashMap::new(),
            managers: DashMap::new(),
            factory,
        }
    }

    /// Creates an engine from a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::new(EngineConfig::from_json_str(json)?))
    }

    /// Creates an engine from a JSON configuration file
    ///
    /// # Errors
    ///
    /// Returns `PermsError::InvalidConfig` if the file cannot be read, parsed
    /// or validated.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config = EngineConfig::load(path)
            .map_err(|e| PermsError::InvalidConfig(format!("{:#}", e)))?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Loads (or returns the already loaded) group
    pub fn create_group(&self, name: &str) -> Arc<Holder> {
        let group = self.groups.get_or_create(name);
        // existing holders may already reference this group
        self.invalidate_all();
        group
    }

    pub fn group(&self, name: &str) -> Option<Arc<Holder>> {
        self.groups.get(name)
    }

    /// Unloads a group; holders inheriting from it stop doing so
    pub fn delete_group(&self, name: &str) -> Option<Arc<Holder>> {
        let removed = self.groups.remove(name)?;
        self.managers.remove(removed.id());
        self.invalidate_all();
        Some(removed)
    }

    /// Loads (or returns the already loaded) user
    pub fn create_user(&self, id: Uuid, username: Option<String>) -> Arc<Holder> {
        self.users
            .entry(id)
            .or_insert_with(|| Arc::new(Holder::new_user(id, username)))
            .clone()
    }

    pub fn user(&self, id: Uuid) -> Option<Arc<Holder>> {
        self.users.get(&id).map(|user| Arc::clone(&user))
    }

    pub fn unload_user(&self, id: Uuid) -> Option<Arc<Holder>> {
        let (_, user) = self.users.remove(&id)?;
        self.managers.remove(user.id());
        Some(user)
    }

    /// Looks up any loaded holder
    ///
    /// # Errors
    ///
    /// Returns `PermsError::HolderNotFound` if the holder is not loaded.
    pub fn holder(&self, id: &HolderId) -> Result<Arc<Holder>> {
        let holder = match id {
            HolderId::User(uuid) => self.user(*uuid),
            HolderId::Group(name) => self.group(name),
        };
        holder.ok_or_else(|| PermsError::HolderNotFound {
            holder: id.to_string(),
        })
    }

    /// Adds or replaces a node; returns whether the holder changed
    pub fn set_node(&self, id: &HolderId, data_type: DataType, node: Node) -> Result<bool> {
        let changed = self.holder(id)?.set_node(data_type, node);
        if changed {
            self.invalidate_for(id);
        }
        Ok(changed)
    }

    /// Removes the node with the given key and context
    pub fn unset_node(&self, id: &HolderId, data_type: DataType, key: &str, context: &ContextSet) -> Result<bool> {
        let changed = self.holder(id)?.unset_node(data_type, key, context);
        if changed {
            self.invalidate_for(id);
        }
        Ok(changed)
    }

    pub fn clear_nodes(&self, id: &HolderId, data_type: DataType) -> Result<bool> {
        let changed = self.holder(id)?.clear_nodes(data_type);
        if changed {
            self.invalidate_for(id);
        }
        Ok(changed)
    }

    pub fn set_primary_group(&self, id: &HolderId, group: &str) -> Result<()> {
        self.holder(id)?.set_stored_primary_group(group);
        self.invalidate_for(id);
        Ok(())
    }

    /// Expiry sweep over every loaded holder; returns the nodes dropped
    pub fn remove_expired_nodes(&self) -> usize {
        let groups: usize = self.groups.all().iter().map(|group| group.remove_expired()).sum();
        let users: Vec<Arc<Holder>> = self.users.iter().map(|user| Arc::clone(user.value())).collect();
        let mut removed = groups;

        if groups > 0 {
            self.invalidate_all();
        }
        for user in users {
            let count = user.remove_expired();
            if count > 0 && groups == 0 {
                self.invalidate_for(user.id());
            }
            removed += count;
        }

        if removed > 0 {
            debug!("Removed {} expired nodes", removed);
        }
        removed
    }

    /// The cache manager of a loaded holder, created on first use
    pub fn cache_manager(&self, id: &HolderId) -> Result<CachedDataManager> {
        if let Some(manager) = self.managers.get(id) {
            return Ok(manager.clone());
        }

        let holder = self.holder(id)?;
        let manager = self
            .managers
            .entry(id.clone())
            .or_insert_with(|| {
                let source = HolderDataSource::new(
                    holder,
                    Arc::clone(&self.groups),
                    Arc::clone(&self.config),
                    Arc::clone(&self.weights),
                );
                CachedDataManager::new(
                    Arc::new(source),
                    Arc::clone(&self.factory),
                    self.config.prefix_stack.clone(),
                    self.config.suffix_stack.clone(),
                )
            })
            .clone();
        Ok(manager)
    }

    /// Checks a permission for a holder
    ///
    /// # Errors
    ///
    /// Returns `PermsError::EmptyPermission` for an empty permission and
    /// `PermsError::HolderNotFound` for an unknown holder.
    pub fn check_permission(
        &self,
        id: &HolderId,
        permission: &str,
        query: &QueryOptions,
        origin: CheckOrigin,
    ) -> Result<TristateResult> {
        if permission.trim().is_empty() {
            return Err(PermsError::EmptyPermission);
        }
        self.permission_data(id, query)?.check_permission(permission, origin)
    }

    pub fn permission_data(&self, id: &HolderId, query: &QueryOptions) -> Result<Arc<CachedPermissionData>> {
        Ok(self.cache_manager(id)?.permission_data(query))
    }

    pub fn meta_data(&self, id: &HolderId, query: &QueryOptions) -> Result<Arc<CachedMetaData>> {
        Ok(self.cache_manager(id)?.meta_data(query))
    }

    /// Flattened ancestors of a holder, nearest configuration first
    pub fn inheritance_tree(&self, id: &HolderId, query: &QueryOptions) -> Result<Vec<HolderId>> {
        let holder = self.holder(id)?;
        Ok(self
            .resolver()
            .inheritance_tree(&holder, query)
            .iter()
            .skip(1)
            .map(|member| member.id().clone())
            .collect())
    }

    /// Group weight from `weight.<n>` nodes or the configured table
    pub fn group_weight(&self, name: &str) -> Option<i32> {
        self.group(name).and_then(|group| self.weights.weight_of(&group))
    }

    /// Housekeeping hook for an external scheduler
    ///
    /// Evicts entries idle for longer than the configured expiry and clears
    /// the memoised lookups of the entries that remain.
    pub fn cleanup_caches(&self) -> usize {
        let expire = self.config.cache_expiry();
        self.managers
            .iter()
            .map(|manager| {
                let evicted = manager.perform_cache_cleanup(expire);
                manager.invalidate_permission_calculators();
                evicted
            })
            .sum()
    }

    /// Drops every cached entry of every holder
    pub fn invalidate_all(&self) {
        for manager in self.managers.iter() {
            manager.invalidate();
        }
    }

    /// Recomputes every cached entry of every holder in the background
    pub async fn recalculate_all(&self) -> Result<()> {
        let managers: Vec<CachedDataManager> = self.managers.iter().map(|m| m.value().clone()).collect();
        for manager in managers {
            manager.recalculate_all().await??;
        }
        Ok(())
    }

    fn resolver(&self) -> HolderResolver<'_> {
        HolderResolver::new(&self.groups, &self.config, &self.weights)
    }

    fn invalidate_for(&self, id: &HolderId) {
        if id.is_group() {
            self.invalidate_all();
        } else if let Some(manager) = self.managers.get(id) {
            manager.invalidate();
        }
    }
}

impl std::fmt::Debug for PermissionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionEngine")
            .field("groups", &self.groups.len())
            .field("users", &self.users.len())
            .field("managers", &self.managers.len())
            .finish()
    }
}
