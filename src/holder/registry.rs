//! Loaded group lookup used to resolve inheritance targets

use dashmap::DashMap;
use std::sync::Arc;

use super::model::Holder;

/// Thread-safe table of loaded groups keyed by lower-cased name
#[derive(Debug, Default)]
pub struct GroupRegistry {
    groups: DashMap<String, Arc<Holder>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the group if loaded; inheritance from unloaded groups is skipped
    pub fn get(&self, name: &str) -> Option<Arc<Holder>> {
        self.groups
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_or_create(&self, name: &str) -> Arc<Holder> {
        let name = name.to_lowercase();
        self.groups
            .entry(name.clone())
            .or_insert_with(|| Arc::new(Holder::new_group(&name)))
            .clone()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Holder>> {
        self.groups.remove(&name.to_lowercase()).map(|(_, group)| group)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(&name.to_lowercase())
    }

    pub fn all(&self) -> Vec<Arc<Holder>> {
        self.groups.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = GroupRegistry::new();
        let a = registry.get_or_create("Admin");
        let b = registry.get_or_create("admin");

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = GroupRegistry::new();
        registry.get_or_create("vip");
        assert!(registry.remove("VIP").is_some());
        assert!(registry.get("vip").is_none());
        assert!(registry.is_empty());
    }
}
