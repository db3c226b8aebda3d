//! Meta stacking: composing a single prefix/suffix from several sources

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{PermsError, Result};
use crate::holder::HolderId;
use crate::node::{ChatMetaType, Node, NodeKind};

const LITERAL_PREFIX: &str = "literal_";
const FROM_GROUP: &str = "from_group_";
const NOT_FROM_GROUP: &str = "not_from_group_";

/// Which end of the priority range an element captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackPosition {
    Highest,
    Lowest,
}

/// Which holders an element accepts chat meta from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StackSource {
    Any,
    /// Nodes owned by the queried holder itself
    Own,
    /// Nodes resolved from any parent
    Inherited,
    FromGroup(String),
    NotFromGroup(String),
}

/// One element of a stack definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetaStackElement {
    Node {
        position: StackPosition,
        source: StackSource,
        /// Rendered when no accepted node was offered
        default: Option<String>,
    },
    /// Fixed text rendered as-is
    Literal(String),
}

impl MetaStackElement {
    /// Sets the fallback text of a node element; literals are unchanged
    pub fn with_default(self, text: impl Into<String>) -> Self {
        match self {
            MetaStackElement::Node { position, source, .. } => MetaStackElement::Node {
                position,
                source,
                default: Some(text.into()),
            },
            literal => literal,
        }
    }

    /// Whether this element is interested in the node at all
    fn accepts(&self, root: &HolderId, meta_type: ChatMetaType, node: &Node) -> bool {
        let MetaStackElement::Node { source, .. } = self else {
            return false;
        };
        match node.kind() {
            NodeKind::ChatMeta { meta_type: t, .. } if *t == meta_type => {}
            _ => return false,
        }

        // nodes without an origin belong to the queried holder
        let origin = node.origin().unwrap_or(root);
        match source {
            StackSource::Any => true,
            StackSource::Own => origin == root,
            StackSource::Inherited => origin != root,
            StackSource::FromGroup(group) => origin.group_name() == Some(group.as_str()),
            StackSource::NotFromGroup(group) => origin.group_name() != Some(group.as_str()),
        }
    }
}

impl FromStr for MetaStackElement {
    type Err = PermsError;

    /// Parses `highest`, `lowest_own`, `highest_from_group_<g>`,
    /// `literal_<text>` and friends
    fn from_str(element: &str) -> Result<Self> {
        let invalid = || PermsError::InvalidStackElement {
            element: element.to_string(),
        };

        // literal text keeps its surrounding whitespace
        let start = element.trim_start();
        if let Some(text) = start
            .get(..LITERAL_PREFIX.len())
            .filter(|p| p.eq_ignore_ascii_case(LITERAL_PREFIX))
            .map(|_| &start[LITERAL_PREFIX.len()..])
        {
            return Ok(MetaStackElement::Literal(text.to_string()));
        }

        let lower = element.trim().to_lowercase();
        let (position, rest) = if let Some(rest) = lower.strip_prefix("highest") {
            (StackPosition::Highest, rest)
        } else if let Some(rest) = lower.strip_prefix("lowest") {
            (StackPosition::Lowest, rest)
        } else {
            return Err(invalid());
        };

        let source = match rest {
            "" => StackSource::Any,
            "_own" => StackSource::Own,
            "_inherited" => StackSource::Inherited,
            other => {
                let other = other.strip_prefix('_').ok_or_else(invalid)?;
                if let Some(group) = other.strip_prefix(NOT_FROM_GROUP) {
                    StackSource::NotFromGroup(non_empty(group).ok_or_else(invalid)?)
                } else if let Some(group) = other.strip_prefix(FROM_GROUP) {
                    StackSource::FromGroup(non_empty(group).ok_or_else(invalid)?)
                } else {
                    return Err(invalid());
                }
            }
        };

        Ok(MetaStackElement::Node {
            position,
            source,
            default: None,
        })
    }
}

fn non_empty(group: &str) -> Option<String> {
    (!group.is_empty()).then(|| group.to_string())
}

impl fmt::Display for MetaStackElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaStackElement::Literal(text) => write!(f, "{}{}", LITERAL_PREFIX, text),
            MetaStackElement::Node { position, source, .. } => {
                match position {
                    StackPosition::Highest => write!(f, "highest")?,
                    StackPosition::Lowest => write!(f, "lowest")?,
                }
                match source {
                    StackSource::Any => Ok(()),
                    StackSource::Own => write!(f, "_own"),
                    StackSource::Inherited => write!(f, "_inherited"),
                    StackSource::FromGroup(g) => write!(f, "_{}{}", FROM_GROUP, g),
                    StackSource::NotFromGroup(g) => write!(f, "_{}{}", NOT_FROM_GROUP, g),
                }
            }
        }
    }
}

/// How repeated values are collapsed when rendering a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateRemoval {
    /// Keep every value
    None,
    /// Keep the first occurrence of each value
    #[default]
    FirstOnly,
    /// Keep the last occurrence of each value
    LastOnly,
}

impl DuplicateRemoval {
    fn apply(self, entries: Vec<String>) -> Vec<String> {
        match self {
            DuplicateRemoval::None => entries,
            DuplicateRemoval::FirstOnly => {
                let mut kept: Vec<String> = Vec::with_capacity(entries.len());
                for entry in entries {
                    if !kept.contains(&entry) {
                        kept.push(entry);
                    }
                }
                kept
            }
            DuplicateRemoval::LastOnly => {
                let mut kept = DuplicateRemoval::FirstOnly.apply(entries.into_iter().rev().collect());
                kept.reverse();
                kept
            }
        }
    }
}

/// One `format` entry: a bare element, or an element with fallback text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StackElementConfig {
    Element(String),
    WithDefault { element: String, default: String },
}

impl StackElementConfig {
    fn element(&self) -> &str {
        match self {
            StackElementConfig::Element(element) => element,
            StackElementConfig::WithDefault { element, .. } => element,
        }
    }
}

/// Raw stack definition as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MetaStackConfig {
    pub format: Vec<StackElementConfig>,
    pub duplicates: DuplicateRemoval,
    pub start_spacer: String,
    pub middle_spacer: String,
    pub end_spacer: String,
}

impl Default for MetaStackConfig {
    fn default() -> Self {
        Self {
            format: vec![StackElementConfig::Element("highest".to_string())],
            duplicates: DuplicateRemoval::FirstOnly,
            start_spacer: String::new(),
            middle_spacer: " ".to_string(),
            end_spacer: String::new(),
        }
    }
}

/// Ordered stack elements plus rendering options
///
/// Part of [`QueryOptions`](crate::context::QueryOptions), hence hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "MetaStackConfig")]
pub struct MetaStackDefinition {
    elements: Vec<MetaStackElement>,
    duplicates: DuplicateRemoval,
    start_spacer: String,
    middle_spacer: String,
    end_spacer: String,
}

impl MetaStackDefinition {
    pub fn new(
        elements: Vec<MetaStackElement>,
        duplicates: DuplicateRemoval,
        start_spacer: impl Into<String>,
        middle_spacer: impl Into<String>,
        end_spacer: impl Into<String>,
    ) -> Self {
        Self {
            elements,
            duplicates,
            start_spacer: start_spacer.into(),
            middle_spacer: middle_spacer.into(),
            end_spacer: end_spacer.into(),
        }
    }

    /// Parses element strings, failing on the first unknown element
    pub fn parse<S: AsRef<str>>(format: &[S]) -> Result<Self> {
        let elements = format
            .iter()
            .map(|element| element.as_ref().parse())
            .collect::<Result<Vec<MetaStackElement>>>()?;
        Ok(Self {
            elements,
            ..Self::default()
        })
    }

    pub fn with_duplicates(mut self, duplicates: DuplicateRemoval) -> Self {
        self.duplicates = duplicates;
        self
    }

    pub fn with_spacers(
        mut self,
        start: impl Into<String>,
        middle: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        self.start_spacer = start.into();
        self.middle_spacer = middle.into();
        self.end_spacer = end.into();
        self
    }

    pub fn elements(&self) -> &[MetaStackElement] {
        &self.elements
    }

    pub fn duplicates(&self) -> DuplicateRemoval {
        self.duplicates
    }
}

impl Default for MetaStackDefinition {
    fn default() -> Self {
        Self::new(
            vec![MetaStackElement::Node {
                position: StackPosition::Highest,
                source: StackSource::Any,
                default: None,
            }],
            DuplicateRemoval::FirstOnly,
            "",
            " ",
            "",
        )
    }
}

impl TryFrom<MetaStackConfig> for MetaStackDefinition {
    type Error = PermsError;

    fn try_from(config: MetaStackConfig) -> Result<Self> {
        let elements = config
            .format
            .iter()
            .map(|entry| -> Result<MetaStackElement> {
                let element: MetaStackElement = entry.element().parse().inspect_err(|_| {
                    warn!("Unknown meta stack element '{}'", entry.element());
                })?;
                Ok(match entry {
                    StackElementConfig::Element(_) => element,
                    StackElementConfig::WithDefault { default, .. } => {
                        element.with_default(default.clone())
                    }
                })
            })
            .collect::<Result<Vec<MetaStackElement>>>()?;

        Ok(Self::new(
            elements,
            config.duplicates,
            config.start_spacer,
            config.middle_spacer,
            config.end_spacer,
        ))
    }
}

/// Per-query stacking state for one chat meta type
///
/// Each element keeps the single node it currently holds. A node replaces
/// it only with a strictly higher (or lower) priority, so ties keep the
/// node offered first.
#[derive(Debug, Clone)]
pub struct MetaStackAccumulator {
    definition: MetaStackDefinition,
    meta_type: ChatMetaType,
    captured: Vec<Option<(i32, String)>>,
}

impl MetaStackAccumulator {
    pub fn new(definition: MetaStackDefinition, meta_type: ChatMetaType) -> Self {
        let captured = vec![None; definition.elements.len()];
        Self {
            definition,
            meta_type,
            captured,
        }
    }

    pub fn offer(&mut self, root: &HolderId, node: &Node) {
        let NodeKind::ChatMeta { priority, value, .. } = node.kind() else {
            return;
        };

        for (element, slot) in self.definition.elements.iter().zip(self.captured.iter_mut()) {
            if !element.accepts(root, self.meta_type, node) {
                continue;
            }
            let MetaStackElement::Node { position, .. } = element else {
                continue;
            };
            let replace = match (slot.as_ref(), position) {
                (None, _) => true,
                (Some((current, _)), StackPosition::Highest) => priority > current,
                (Some((current, _)), StackPosition::Lowest) => priority < current,
            };
            if replace {
                *slot = Some((*priority, value.clone()));
            }
        }
    }

    /// Renders the stack, or `None` when no node element has anything to show
    ///
    /// A node element shows its captured value, else its default.
    pub fn render(&self) -> Option<String> {
        let mut shown = false;
        let entries: Vec<String> = self
            .definition
            .elements
            .iter()
            .zip(&self.captured)
            .filter_map(|(element, slot)| match element {
                MetaStackElement::Literal(text) => Some(text.clone()),
                MetaStackElement::Node { default, .. } => {
                    let value = slot.as_ref().map(|(_, value)| value.clone()).or_else(|| default.clone());
                    shown |= value.is_some();
                    value
                }
            })
            .collect();
        if !shown {
            return None;
        }
        let entries = self.definition.duplicates.apply(entries);

        let mut rendered = self.definition.start_spacer.clone();
        rendered.push_str(&entries.join(&self.definition.middle_spacer));
        rendered.push_str(&self.definition.end_spacer);
        Some(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_from(priority: i32, value: &str, origin: &HolderId) -> Node {
        Node::prefix(priority, value)
            .build()
            .unwrap()
            .with_origin(origin.clone())
    }

    #[test]
    fn test_parse_elements() {
        assert_eq!(
            "highest".parse::<MetaStackElement>().unwrap(),
            MetaStackElement::Node {
                position: StackPosition::Highest,
                source: StackSource::Any,
                default: None,
            }
        );
        assert_eq!(
            "LOWEST_INHERITED".parse::<MetaStackElement>().unwrap(),
            MetaStackElement::Node {
                position: StackPosition::Lowest,
                source: StackSource::Inherited,
                default: None,
            }
        );
        assert_eq!(
            "highest_not_from_group_staff".parse::<MetaStackElement>().unwrap(),
            MetaStackElement::Node {
                position: StackPosition::Highest,
                source: StackSource::NotFromGroup("staff".to_string()),
                default: None,
            }
        );
        assert_eq!(
            "literal_ | ".parse::<MetaStackElement>().unwrap(),
            MetaStackElement::Literal(" | ".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for element in ["middle", "highest_from_group_", "highest_sideways", "highestown"] {
            assert!(
                matches!(
                    element.parse::<MetaStackElement>(),
                    Err(PermsError::InvalidStackElement { .. })
                ),
                "{} should be rejected",
                element
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        for element in ["highest", "lowest_own", "highest_from_group_vip", "literal_>>"] {
            let parsed: MetaStackElement = element.parse().unwrap();
            assert_eq!(parsed.to_string(), element);
        }
    }

    #[test]
    fn test_highest_keeps_first_on_tie() {
        let user = HolderId::group("user");
        let mut stack = MetaStackAccumulator::new(MetaStackDefinition::default(), ChatMetaType::Prefix);
        stack.offer(&user, &prefix_from(10, "[A]", &HolderId::group("a")));
        stack.offer(&user, &prefix_from(10, "[B]", &HolderId::group("b")));
        stack.offer(&user, &prefix_from(5, "[C]", &HolderId::group("c")));
        assert_eq!(stack.render(), Some("[A]".to_string()));
    }

    #[test]
    fn test_multi_element_render() {
        let root = HolderId::group("root");
        let definition = MetaStackDefinition::parse(&[
            "highest_from_group_staff",
            "literal_|",
            "highest_not_from_group_staff",
        ])
        .unwrap()
        .with_spacers("<", " ", ">");

        let mut stack = MetaStackAccumulator::new(definition, ChatMetaType::Prefix);
        stack.offer(&root, &prefix_from(100, "Admin", &HolderId::group("staff")));
        stack.offer(&root, &prefix_from(50, "VIP", &HolderId::group("vip")));
        stack.offer(&root, &prefix_from(70, "Own", &root));

        assert_eq!(stack.render(), Some("<Admin | Own>".to_string()));
    }

    #[test]
    fn test_empty_element_renders_default() {
        let root = HolderId::group("root");
        let definition = MetaStackDefinition::new(
            vec![
                "highest_from_group_staff".parse::<MetaStackElement>().unwrap().with_default("[Guest]"),
                "highest_own".parse().unwrap(),
            ],
            DuplicateRemoval::None,
            "",
            " ",
            "",
        );

        let mut stack = MetaStackAccumulator::new(definition, ChatMetaType::Prefix);
        assert_eq!(stack.render(), Some("[Guest]".to_string()));

        stack.offer(&root, &prefix_from(5, "[Own]", &root));
        assert_eq!(stack.render(), Some("[Guest] [Own]".to_string()));

        stack.offer(&root, &prefix_from(90, "[Staff]", &HolderId::group("staff")));
        assert_eq!(stack.render(), Some("[Staff] [Own]".to_string()));
    }

    #[test]
    fn test_literal_only_renders_nothing() {
        let definition = MetaStackDefinition::parse(&["literal_>", "highest"]).unwrap();
        let stack = MetaStackAccumulator::new(definition, ChatMetaType::Suffix);
        assert_eq!(stack.render(), None);
    }

    #[test]
    fn test_suffix_nodes_ignored_by_prefix_stack() {
        let root = HolderId::group("root");
        let mut stack = MetaStackAccumulator::new(MetaStackDefinition::default(), ChatMetaType::Prefix);
        stack.offer(&root, &Node::suffix(10, "!").build().unwrap());
        assert_eq!(stack.render(), None);
    }

    #[test]
    fn test_duplicate_removal() {
        let entries = || vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(DuplicateRemoval::None.apply(entries()), vec!["a", "b", "a"]);
        assert_eq!(DuplicateRemoval::FirstOnly.apply(entries()), vec!["a", "b"]);
        assert_eq!(DuplicateRemoval::LastOnly.apply(entries()), vec!["b", "a"]);
    }

    #[test]
    fn test_definition_from_config_json() {
        let definition: MetaStackDefinition = serde_json::from_str(
            r#"{"format": ["highest_own", "lowest"], "duplicates": "none", "middle-spacer": "-"}"#,
        )
        .unwrap();
        assert_eq!(definition.elements().len(), 2);
        assert_eq!(definition.duplicates(), DuplicateRemoval::None);

        let bad = serde_json::from_str::<MetaStackDefinition>(r#"{"format": ["nope"]}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_element_default_from_config_json() {
        let definition: MetaStackDefinition = serde_json::from_str(
            r#"{"format": [{"element": "highest_inherited", "default": "[New]"}, "literal_:"]}"#,
        )
        .unwrap();
        assert_eq!(
            definition.elements()[0],
            MetaStackElement::Node {
                position: StackPosition::Highest,
                source: StackSource::Inherited,
                default: Some("[New]".to_string()),
            }
        );

        let stack = MetaStackAccumulator::new(definition, ChatMetaType::Prefix);
        assert_eq!(stack.render(), Some("[New] :".to_string()));
    }
}
