//! Tri-state permission results with provenance

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::node::Node;

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tristate {
    True,
    False,
    #[default]
    Undefined,
}

impl Tristate {
    /// `None` for `Undefined`; the default decision belongs to the caller
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Tristate::True => Some(true),
            Tristate::False => Some(false),
            Tristate::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        self != Tristate::Undefined
    }
}

impl From<bool> for Tristate {
    fn from(value: bool) -> Self {
        if value {
            Tristate::True
        } else {
            Tristate::False
        }
    }
}

impl fmt::Display for Tristate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tristate::True => write!(f, "true"),
            Tristate::False => write!(f, "false"),
            Tristate::Undefined => write!(f, "undefined"),
        }
    }
}

/// Identifies which processor produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorKind {
    /// Exact key lookup
    Direct,
    /// `<segment>.*` and root wildcard lookup
    Wildcard,
    /// Alternate dialect: plain parent segments grant their children
    AlternateWildcard,
    /// `r=` regular expression permissions
    Regex,
    /// Platform defaults, able to override wildcard grants
    Defaults,
}

impl ProcessorKind {
    /// Wildcard-class results are the ones an override processor may replace
    pub fn is_wildcard(self) -> bool {
        matches!(self, ProcessorKind::Wildcard | ProcessorKind::AlternateWildcard)
    }
}

/// A tri-state result plus where it came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TristateResult {
    result: Tristate,
    node: Option<Node>,
    processor: Option<ProcessorKind>,
    overridden: Option<Box<TristateResult>>,
}

impl TristateResult {
    pub fn undefined() -> Self {
        Self::default()
    }

    /// Result backed by a node
    pub fn from_node(node: &Node, processor: ProcessorKind) -> Self {
        Self {
            result: Tristate::from(node.value()),
            node: Some(node.clone()),
            processor: Some(processor),
            overridden: None,
        }
    }

    /// Result without a backing node (e.g. platform defaults)
    pub fn from_value(value: bool, processor: ProcessorKind) -> Self {
        Self {
            result: Tristate::from(value),
            node: None,
            processor: Some(processor),
            overridden: None,
        }
    }

    /// Records the result this one replaced
    pub fn overriding(mut self, previous: TristateResult) -> Self {
        self.overridden = Some(Box::new(previous));
        self
    }

    pub fn result(&self) -> Tristate {
        self.result
    }

    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    pub fn processor(&self) -> Option<ProcessorKind> {
        self.processor
    }

    pub fn overridden_result(&self) -> Option<&TristateResult> {
        self.overridden.as_deref()
    }

    pub fn is_defined(&self) -> bool {
        self.result.is_defined()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tristate_conversions() {
        assert_eq!(Tristate::from(true), Tristate::True);
        assert_eq!(Tristate::False.as_bool(), Some(false));
        assert_eq!(Tristate::Undefined.as_bool(), None);
        assert!(!Tristate::Undefined.is_defined());
    }

    #[test]
    fn test_undefined_has_no_provenance() {
        let result = TristateResult::undefined();
        assert!(!result.is_defined());
        assert!(result.node().is_none());
        assert!(result.processor().is_none());
    }

    #[test]
    fn test_overriding_keeps_previous() {
        let node = Node::permission("x.*").build().unwrap();
        let wildcard = TristateResult::from_node(&node, ProcessorKind::Wildcard);
        let result = TristateResult::from_value(false, ProcessorKind::Defaults).overriding(wildcard.clone());

        assert_eq!(result.result(), Tristate::False);
        assert_eq!(result.overridden_result(), Some(&wildcard));
    }
}
