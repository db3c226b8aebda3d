//! Permission processors making up a calculator pipeline

use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use super::tristate::{ProcessorKind, TristateResult};
use super::SourceMap;
use crate::error::{PermsError, Result};
use crate::node::{Node, NodeKind, ROOT_WILDCARD, ROOT_WILDCARD_QUOTED};

/// One stage of the permission pipeline
///
/// Processors are rebuilt from a fresh source snapshot through
/// [`refresh`](PermissionProcessor::refresh) and never see a map change
/// underneath them.
pub trait PermissionProcessor: Send + Sync {
    fn kind(&self) -> ProcessorKind;

    /// Looks up a (lower-cased) permission against this processor's rules
    fn has_permission(&self, permission: &str) -> TristateResult;

    /// Pipeline step: the first defined result wins by default
    fn check(&self, previous: TristateResult, permission: &str) -> TristateResult {
        if previous.is_defined() {
            previous
        } else {
            self.has_permission(permission)
        }
    }

    /// Rebuilds any index derived from the source map
    fn refresh(&mut self, source: &Arc<SourceMap>);
}

/// Exact key lookup
#[derive(Debug, Default)]
pub struct DirectProcessor {
    source: Arc<SourceMap>,
}

impl DirectProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionProcessor for DirectProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Direct
    }

    fn has_permission(&self, permission: &str) -> TristateResult {
        match self.source.get(permission) {
            Some(node) => TristateResult::from_node(node, ProcessorKind::Direct),
            None => TristateResult::undefined(),
        }
    }

    fn refresh(&mut self, source: &Arc<SourceMap>) {
        self.source = Arc::clone(source);
    }
}

/// `<segment>.*` wildcard lookup with a root wildcard fallback
///
/// For `a.b.c` the index is probed for `a.b` then `a`, so the most specific
/// wildcard wins. `*` (or `'*'`) applies when no segment matches.
#[derive(Debug, Default)]
pub struct WildcardProcessor {
    wildcards: HashMap<String, Node>,
    root: Option<Node>,
}

impl WildcardProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionProcessor for WildcardProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Wildcard
    }

    fn has_permission(&self, permission: &str) -> TristateResult {
        let mut segment = permission;
        while let Some(index) = segment.rfind('.') {
            segment = &segment[..index];
            if let Some(node) = self.wildcards.get(segment) {
                return TristateResult::from_node(node, ProcessorKind::Wildcard);
            }
        }

        match &self.root {
            Some(node) => TristateResult::from_node(node, ProcessorKind::Wildcard),
            None => TristateResult::undefined(),
        }
    }

    fn refresh(&mut self, source: &Arc<SourceMap>) {
        self.wildcards = source
            .iter()
            .filter_map(|(key, node)| {
                key.strip_suffix(".*")
                    .filter(|prefix| !prefix.is_empty())
                    .map(|prefix| (prefix.to_string(), node.clone()))
            })
            .collect();
        self.root = source
            .get(ROOT_WILDCARD)
            .or_else(|| source.get(ROOT_WILDCARD_QUOTED))
            .cloned();
    }
}

/// Alternate wildcard dialect where `a.b` implicitly covers `a.b.c`
///
/// Parent segments are looked up as plain keys in the source map.
#[derive(Debug, Default)]
pub struct AlternateWildcardProcessor {
    source: Arc<SourceMap>,
}

impl AlternateWildcardProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionProcessor for AlternateWildcardProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::AlternateWildcard
    }

    fn has_permission(&self, permission: &str) -> TristateResult {
        let mut segment = permission;
        while let Some(index) = segment.rfind('.') {
            segment = &segment[..index];
            if let Some(node) = self.source.get(segment) {
                return TristateResult::from_node(node, ProcessorKind::AlternateWildcard);
            }
        }
        TristateResult::undefined()
    }

    fn refresh(&mut self, source: &Arc<SourceMap>) {
        self.source = Arc::clone(source);
    }
}

/// Matches permissions against `r=` regex nodes, in source order
#[derive(Debug, Default)]
pub struct RegexProcessor {
    patterns: Vec<(Regex, Node)>,
}

impl RegexProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PermissionProcessor for RegexProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Regex
    }

    fn has_permission(&self, permission: &str) -> TristateResult {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(permission))
            .map(|(_, node)| TristateResult::from_node(node, ProcessorKind::Regex))
            .unwrap_or_default()
    }

    fn refresh(&mut self, source: &Arc<SourceMap>) {
        self.patterns = source
            .values()
            .filter_map(|node| match node.kind() {
                NodeKind::RegexPermission { pattern } => match compile_regex(pattern) {
                    Ok(regex) => Some((regex, node.clone())),
                    Err(e) => {
                        warn!("Dropping regex permission '{}': {}", node.key(), e);
                        None
                    }
                },
                _ => None,
            })
            .collect();
    }
}

/// Compiles a regex permission pattern, anchored at both ends
///
/// Matching ignores case since checked permissions are lower-cased.
///
/// # Errors
///
/// Returns `PermsError::InvalidRegex` if the pattern does not compile.
pub fn compile_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|e| PermsError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// Platform default permissions that may override wildcard grants
///
/// Acts as a fallback when nothing earlier in the pipeline matched. With
/// `override_wildcards` enabled, an explicit `false` default for the exact
/// permission also beats a `true` result obtained through a wildcard.
#[derive(Debug)]
pub struct DefaultsProcessor {
    defaults: Arc<HashMap<String, bool>>,
    override_wildcards: bool,
}

impl DefaultsProcessor {
    pub fn new(defaults: Arc<HashMap<String, bool>>, override_wildcards: bool) -> Self {
        Self {
            defaults,
            override_wildcards,
        }
    }
}

impl PermissionProcessor for DefaultsProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Defaults
    }

    fn has_permission(&self, permission: &str) -> TristateResult {
        match self.defaults.get(permission) {
            Some(value) => TristateResult::from_value(*value, ProcessorKind::Defaults),
            None => TristateResult::undefined(),
        }
    }

    fn check(&self, previous: TristateResult, permission: &str) -> TristateResult {
        if !previous.is_defined() {
            return self.has_permission(permission);
        }

        let from_wildcard = previous.processor().is_some_and(ProcessorKind::is_wildcard);
        if self.override_wildcards && from_wildcard && previous.result().as_bool() == Some(true) {
            let own = self.has_permission(permission);
            if own.result().as_bool() == Some(false) {
                return own.overriding(previous);
            }
        }
        previous
    }

    fn refresh(&mut self, _source: &Arc<SourceMap>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::Tristate;

    fn source(entries: &[(&str, bool)]) -> Arc<SourceMap> {
        Arc::new(
            entries
                .iter()
                .map(|(key, value)| {
                    let node = Node::permission(*key).value(*value).build().unwrap();
                    (node.key().to_string(), node)
                })
                .collect(),
        )
    }

    fn refreshed<P: PermissionProcessor>(mut processor: P, map: &Arc<SourceMap>) -> P {
        processor.refresh(map);
        processor
    }

    #[test]
    fn test_direct() {
        let map = source(&[("a.b", true)]);
        let direct = refreshed(DirectProcessor::new(), &map);

        assert_eq!(direct.has_permission("a.b").result(), Tristate::True);
        assert_eq!(direct.has_permission("a.c").result(), Tristate::Undefined);
    }

    #[test]
    fn test_wildcard_most_specific_wins() {
        let map = source(&[("a.*", true), ("a.b.*", false)]);
        let wildcard = refreshed(WildcardProcessor::new(), &map);

        let result = wildcard.has_permission("a.b.c");
        assert_eq!(result.result(), Tristate::False);
        assert_eq!(result.node().map(|n| n.key()), Some("a.b.*"));
        assert_eq!(wildcard.has_permission("a.x").result(), Tristate::True);
        // the wildcard does not cover its own prefix
        assert_eq!(wildcard.has_permission("a").result(), Tristate::Undefined);
    }

    #[test]
    fn test_quoted_root_wildcard() {
        let map = source(&[("'*'", true)]);
        let wildcard = refreshed(WildcardProcessor::new(), &map);
        assert_eq!(wildcard.has_permission("anything").result(), Tristate::True);
    }

    #[test]
    fn test_alternate_wildcard() {
        let map = source(&[("a.b", false)]);
        let alternate = refreshed(AlternateWildcardProcessor::new(), &map);

        assert_eq!(alternate.has_permission("a.b.c.d").result(), Tristate::False);
        assert_eq!(alternate.has_permission("a.b").result(), Tristate::Undefined);
        assert_eq!(alternate.has_permission("x").result(), Tristate::Undefined);
    }

    #[test]
    fn test_regex_first_registered_wins() {
        let map: Arc<SourceMap> = Arc::new(
            [
                Node::builder("r=kit\\..*").value(false).build().unwrap(),
                Node::builder("r=kit\\.starter").build().unwrap(),
                Node::builder("r=bad(").build().unwrap(),
            ]
            .into_iter()
            .map(|node| (node.key().to_string(), node))
            .collect(),
        );
        let regex = refreshed(RegexProcessor::new(), &map);

        assert_eq!(regex.has_permission("kit.starter").result(), Tristate::False);
        assert_eq!(regex.has_permission("kitx").result(), Tristate::Undefined);
    }

    #[test]
    fn test_compile_regex_anchored() {
        let regex = compile_regex("a|b").unwrap();
        assert!(regex.is_match("a"));
        assert!(!regex.is_match("ab"));
        assert!(matches!(compile_regex("(("), Err(PermsError::InvalidRegex { .. })));
    }

    #[test]
    fn test_compile_regex_ignores_case() {
        let regex = compile_regex("Kit\\.Starter").unwrap();
        assert!(regex.is_match("kit.starter"));
        assert!(regex.is_match("KIT.STARTER"));
    }

    #[test]
    fn test_defaults_fill_undefined_only() {
        let defaults: HashMap<String, bool> = [("x.y".to_string(), false)].into_iter().collect();
        let processor = DefaultsProcessor::new(Arc::new(defaults), false);

        let direct = TristateResult::from_value(true, ProcessorKind::Direct);
        assert_eq!(processor.check(direct, "x.y").result(), Tristate::True);
        assert_eq!(
            processor.check(TristateResult::undefined(), "x.y").result(),
            Tristate::False
        );
    }

    #[test]
    fn test_defaults_override_wildcard() {
        let defaults: HashMap<String, bool> = [("x.y".to_string(), false)].into_iter().collect();
        let processor = DefaultsProcessor::new(Arc::new(defaults), true);
        let node = Node::permission("x.*").build().unwrap();
        let wildcard = TristateResult::from_node(&node, ProcessorKind::Wildcard);

        let result = processor.check(wildcard, "x.y");
        assert_eq!(result.result(), Tristate::False);
        assert_eq!(
            result.overridden_result().and_then(|r| r.processor()),
            Some(ProcessorKind::Wildcard)
        );
    }
}
