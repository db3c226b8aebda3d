//! Engine configuration

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::calculator::DEFAULT_LOOKUP_CAPACITY;
use crate::context::ContextSatisfyMode;
use crate::error::Result;
use crate::holder::PrimaryGroupCalculation;
use crate::inheritance::TraversalAlgorithm;
use crate::meta::MetaStackDefinition;

/// Resolution settings shared by every holder
///
/// Deserialised from kebab-case JSON; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use permresolve::config::EngineConfig;
/// use permresolve::inheritance::TraversalAlgorithm;
///
/// let config = EngineConfig::from_json_str(r#"{
///     "inheritance-traversal-algorithm": "depth-first-pre-order",
///     "post-traversal-inheritance-sort": true,
///     "group-weights": { "admin": 100 }
/// }"#).unwrap();
///
/// assert_eq!(config.inheritance_traversal_algorithm, TraversalAlgorithm::DepthFirstPreOrder);
/// assert_eq!(config.group_weights.get("admin"), Some(&100));
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    pub inheritance_traversal_algorithm: TraversalAlgorithm,
    /// Stable sort of the flattened tree by descending weight
    pub post_traversal_inheritance_sort: bool,
    pub context_satisfy_mode: ContextSatisfyMode,
    pub apply_wildcards: bool,
    pub apply_alternate_wildcards: bool,
    pub apply_regex: bool,
    pub apply_shorthand: bool,
    /// Lets `false` defaults beat `true` results obtained through wildcards
    pub override_wildcards: bool,
    pub default_permissions: HashMap<String, bool>,
    /// Weight fallback for groups without `weight.<n>` nodes
    pub group_weights: HashMap<String, i32>,
    pub primary_group_calculation: PrimaryGroupCalculation,
    pub prefix_stack: MetaStackDefinition,
    pub suffix_stack: MetaStackDefinition,
    pub cache_expiry_secs: u64,
    /// Memoised lookups per cached calculator; zero disables the memo
    pub lookup_cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inheritance_traversal_algorithm: TraversalAlgorithm::default(),
            post_traversal_inheritance_sort: false,
            context_satisfy_mode: ContextSatisfyMode::default(),
            apply_wildcards: true,
            apply_alternate_wildcards: false,
            apply_regex: true,
            apply_shorthand: true,
            override_wildcards: true,
            default_permissions: HashMap::new(),
            group_weights: HashMap::new(),
            primary_group_calculation: PrimaryGroupCalculation::default(),
            prefix_stack: MetaStackDefinition::default(),
            suffix_stack: MetaStackDefinition::default(),
            cache_expiry_secs: 120,
            lookup_cache_capacity: DEFAULT_LOOKUP_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON configuration document
    ///
    /// # Errors
    ///
    /// Returns `PermsError::InvalidConfig` for malformed JSON, unknown enum
    /// values or unparseable meta stack elements.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads and validates a JSON configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        let config = Self::from_json_str(&contents)
            .with_context(|| format!("Failed to parse configuration file {}", path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cache_expiry_secs == 0 {
            anyhow::bail!("cache-expiry-secs must be greater than zero");
        }

        if let Some(key) = self.default_permissions.keys().find(|key| key.trim().is_empty()) {
            anyhow::bail!("default-permissions contains an empty permission '{}'", key);
        }

        Ok(())
    }

    /// Idle time after which cache housekeeping evicts an entry
    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }
}
