//! Builds calculators according to engine configuration

use std::collections::HashMap;
use std::sync::Arc;

use super::calculator::PermissionCalculator;
use super::processor::{
    AlternateWildcardProcessor, DefaultsProcessor, DirectProcessor, PermissionProcessor,
    RegexProcessor, WildcardProcessor,
};
use super::SourceMap;
use crate::cache::CacheMetadata;
use crate::config::EngineConfig;
use crate::context::QueryOptions;

/// Creates the permission-side calculator for a cache entry
pub trait CalculatorFactory: Send + Sync {
    fn build(
        &self,
        query: &QueryOptions,
        metadata: CacheMetadata,
        source: Arc<SourceMap>,
    ) -> PermissionCalculator;
}

/// Standard pipeline: direct, then the enabled wildcard/regex stages, then
/// platform defaults
#[derive(Debug, Clone)]
pub struct DefaultCalculatorFactory {
    apply_wildcards: bool,
    apply_alternate_wildcards: bool,
    apply_regex: bool,
    override_wildcards: bool,
    defaults: Arc<HashMap<String, bool>>,
    lookup_capacity: usize,
}

impl DefaultCalculatorFactory {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            apply_wildcards: config.apply_wildcards,
            apply_alternate_wildcards: config.apply_alternate_wildcards,
            apply_regex: config.apply_regex,
            override_wildcards: config.override_wildcards,
            lookup_capacity: config.lookup_cache_capacity,
            defaults: Arc::new(
                config
                    .default_permissions
                    .iter()
                    .map(|(key, value)| (key.to_lowercase(), *value))
                    .collect(),
            ),
        }
    }

    fn processors(&self) -> Vec<Box<dyn PermissionProcessor>> {
        let mut processors: Vec<Box<dyn PermissionProcessor>> = vec![Box::new(DirectProcessor::new())];
        if self.apply_regex {
            processors.push(Box::new(RegexProcessor::new()));
        }
        if self.apply_wildcards {
            processors.push(Box::new(WildcardProcessor::new()));
        }
        if self.apply_alternate_wildcards {
            processors.push(Box::new(AlternateWildcardProcessor::new()));
        }
        if !self.defaults.is_empty() {
            processors.push(Box::new(DefaultsProcessor::new(
                Arc::clone(&self.defaults),
                self.override_wildcards,
            )));
        }
        processors
    }
}

impl CalculatorFactory for DefaultCalculatorFactory {
    fn build(
        &self,
        _query: &QueryOptions,
        metadata: CacheMetadata,
        source: Arc<SourceMap>,
    ) -> PermissionCalculator {
        PermissionCalculator::new(metadata, source, self.processors())
            .with_lookup_capacity(self.lookup_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::{CheckOrigin, ProcessorKind};
    use crate::holder::HolderId;

    #[test]
    fn test_pipeline_follows_config() {
        let mut config = EngineConfig::default();
        config.apply_regex = false;
        config.apply_alternate_wildcards = true;
        config.default_permissions.insert("Spawn.Use".to_string(), true);

        let factory = DefaultCalculatorFactory::new(&config);
        let query = QueryOptions::non_contextual();
        let calculator = factory.build(
            &query,
            CacheMetadata::new(&HolderId::group("g"), query.clone()),
            Arc::new(SourceMap::new()),
        );

        assert_eq!(
            calculator.processor_kinds(),
            vec![
                ProcessorKind::Direct,
                ProcessorKind::Wildcard,
                ProcessorKind::AlternateWildcard,
                ProcessorKind::Defaults,
            ]
        );
    }

    #[test]
    fn test_defaults_lowercased() {
        let mut config = EngineConfig::default();
        config.default_permissions.insert("Spawn.Use".to_string(), true);
        let factory = DefaultCalculatorFactory::new(&config);
        assert_eq!(factory.defaults.get("spawn.use"), Some(&true));
    }

    #[test]
    fn test_lookup_capacity_from_config() {
        let config = EngineConfig {
            lookup_cache_capacity: 0,
            ..EngineConfig::default()
        };
        let query = QueryOptions::non_contextual();
        let calculator = DefaultCalculatorFactory::new(&config).build(
            &query,
            CacheMetadata::new(&HolderId::group("g"), query.clone()),
            Arc::new(SourceMap::new()),
        );

        calculator.check_permission("spawn.use", CheckOrigin::Internal).unwrap();
        assert_eq!(calculator.memoised(), 0);
    }
}
