//! Node types, key grammar and builder

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::context::{ContextSet, MutableContextSet};
use crate::error::{PermsError, Result};
use crate::holder::HolderId;

/// Root wildcard forms granting or denying every permission
pub const ROOT_WILDCARD: &str = "*";
pub const ROOT_WILDCARD_QUOTED: &str = "'*'";

/// Markers that flag a permission as a regular expression
pub const REGEX_MARKERS: [&str; 2] = ["r=", "R="];

const GROUP_PREFIX: &str = "group.";
const PREFIX_PREFIX: &str = "prefix.";
const SUFFIX_PREFIX: &str = "suffix.";
const META_PREFIX: &str = "meta.";
const WEIGHT_PREFIX: &str = "weight.";
const DISPLAY_NAME_PREFIX: &str = "displayname.";

/// Which chat meta a prefix/suffix node carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMetaType {
    Prefix,
    Suffix,
}

impl fmt::Display for ChatMetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatMetaType::Prefix => write!(f, "prefix"),
            ChatMetaType::Suffix => write!(f, "suffix"),
        }
    }
}

/// Typed interpretation of a node key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Plain permission string, possibly a wildcard
    Permission,
    /// `r=<pattern>` permission matched as a regular expression
    RegexPermission { pattern: String },
    /// `group.<name>`: inherit from another holder
    Inheritance { group: String },
    /// `prefix.<priority>.<text>` / `suffix.<priority>.<text>`
    ChatMeta {
        meta_type: ChatMetaType,
        priority: i32,
        value: String,
    },
    /// `meta.<key>.<value>`
    Meta { key: String, value: String },
    /// `weight.<n>`
    Weight(i32),
    /// `displayname.<name>`
    DisplayName(String),
}

/// An immutable permission/inheritance/meta fact owned by a holder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    key: String,
    value: bool,
    expiry: Option<DateTime<Utc>>,
    context: ContextSet,
    metadata: BTreeMap<String, String>,
    origin: Option<HolderId>,
    kind: NodeKind,
}

impl Node {
    /// Starts a builder for an arbitrary node key
    pub fn builder(key: impl Into<String>) -> NodeBuilder {
        NodeBuilder::new(key.into())
    }

    pub fn permission(permission: impl Into<String>) -> NodeBuilder {
        Self::builder(permission)
    }

    pub fn inheritance(group: &str) -> NodeBuilder {
        Self::builder(format!("{}{}", GROUP_PREFIX, group.to_lowercase()))
    }

    pub fn chat_meta(meta_type: ChatMetaType, priority: i32, value: &str) -> NodeBuilder {
        let prefix = match meta_type {
            ChatMetaType::Prefix => PREFIX_PREFIX,
            ChatMetaType::Suffix => SUFFIX_PREFIX,
        };
        Self::builder(format!("{}{}.{}", prefix, priority, escape_delimiters(value)))
    }

    pub fn prefix(priority: i32, value: &str) -> NodeBuilder {
        Self::chat_meta(ChatMetaType::Prefix, priority, value)
    }

    pub fn suffix(priority: i32, value: &str) -> NodeBuilder {
        Self::chat_meta(ChatMetaType::Suffix, priority, value)
    }

    pub fn meta(key: &str, value: &str) -> NodeBuilder {
        Self::builder(format!(
            "{}{}.{}",
            META_PREFIX,
            escape_delimiters(&key.to_lowercase()),
            escape_delimiters(value)
        ))
    }

    pub fn weight(weight: i32) -> NodeBuilder {
        Self::builder(format!("{}{}", WEIGHT_PREFIX, weight))
    }

    pub fn display_name(name: &str) -> NodeBuilder {
        Self::builder(format!("{}{}", DISPLAY_NAME_PREFIX, name))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> bool {
        self.value
    }

    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    pub fn has_expired(&self) -> bool {
        self.expiry.is_some_and(|at| at <= Utc::now())
    }

    pub fn context(&self) -> &ContextSet {
        &self.context
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// The holder this node was inherited from, set during resolution
    pub fn origin(&self) -> Option<&HolderId> {
        self.origin.as_ref()
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_inheritance(&self) -> bool {
        matches!(self.kind, NodeKind::Inheritance { .. })
    }

    pub fn inheritance_group(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Inheritance { group } => Some(group),
            _ => None,
        }
    }

    /// Returns true for `*`, `'*'` and keys of the form `<something>.*`
    pub fn is_wildcard(&self) -> bool {
        is_wildcard(&self.key)
    }

    /// Number of separators in a wildcard key; `None` for non-wildcards
    pub fn wildcard_level(&self) -> Option<usize> {
        if self.is_wildcard() {
            Some(self.key.matches('.').count())
        } else {
            None
        }
    }

    /// Returns a copy tagged with the holder it was resolved from
    pub fn with_origin(&self, origin: HolderId) -> Node {
        Node {
            origin: Some(origin),
            ..self.clone()
        }
    }

    /// Returns a copy with a different key and identical attributes
    pub fn with_key(&self, key: String) -> Node {
        Node {
            kind: parse_kind(&key),
            key,
            ..self.clone()
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)?;
        if !self.context.is_empty() {
            write!(f, " {}", self.context)?;
        }
        if let Some(expiry) = self.expiry {
            write!(f, " (expires {})", expiry.to_rfc3339())?;
        }
        Ok(())
    }
}

/// Builder for [`Node`]
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    key: String,
    value: bool,
    expiry: Option<DateTime<Utc>>,
    context: MutableContextSet,
    metadata: BTreeMap<String, String>,
}

impl NodeBuilder {
    fn new(key: String) -> Self {
        Self {
            key,
            value: true,
            expiry: None,
            context: MutableContextSet::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    pub fn expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.context.add(key, value);
        self
    }

    pub fn with_context(mut self, context: &ContextSet) -> Self {
        for (k, v) in context.iter() {
            self.context.add(k, v);
        }
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Normalises the key and derives the node kind
    ///
    /// # Errors
    ///
    /// Returns `PermsError::InvalidNodeKey` for blank keys.
    pub fn build(self) -> Result<Node> {
        let trimmed = self.key.trim();
        if trimmed.is_empty() {
            return Err(PermsError::InvalidNodeKey {
                key: self.key.clone(),
                reason: "node key cannot be empty".to_string(),
            });
        }

        let key = normalise_key(trimmed);
        Ok(Node {
            kind: parse_kind(&key),
            key,
            value: self.value,
            expiry: self.expiry,
            context: self.context.into_immutable(),
            metadata: self.metadata,
            origin: None,
        })
    }
}

/// Returns true for `*`, `'*'` and keys of the form `<something>.*`
pub fn is_wildcard(key: &str) -> bool {
    key == ROOT_WILDCARD || key == ROOT_WILDCARD_QUOTED || (key.len() > 2 && key.ends_with(".*"))
}

/// Strips a regex marker, returning the raw pattern
pub fn regex_pattern(key: &str) -> Option<&str> {
    REGEX_MARKERS
        .iter()
        .find_map(|marker| key.strip_prefix(marker))
        .filter(|pattern| !pattern.is_empty())
}

fn has_prefix_ignore_case(key: &str, prefix: &str) -> bool {
    key.len() >= prefix.len()
        && key.is_char_boundary(prefix.len())
        && key[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// Lower-cases keys except for case-sensitive payloads
fn normalise_key(key: &str) -> String {
    if regex_pattern(key).is_some() {
        return key.to_string();
    }
    for prefix in [PREFIX_PREFIX, SUFFIX_PREFIX, META_PREFIX, DISPLAY_NAME_PREFIX] {
        if has_prefix_ignore_case(key, prefix) {
            return format!("{}{}", prefix, &key[prefix.len()..]);
        }
    }
    key.to_lowercase()
}

fn parse_kind(key: &str) -> NodeKind {
    if let Some(pattern) = regex_pattern(key) {
        return NodeKind::RegexPermission {
            pattern: pattern.to_string(),
        };
    }
    if let Some(group) = key.strip_prefix(GROUP_PREFIX) {
        if !group.is_empty() && !is_wildcard(key) {
            return NodeKind::Inheritance {
                group: group.to_string(),
            };
        }
    }
    if let Some(rest) = key.strip_prefix(PREFIX_PREFIX) {
        if let Some(kind) = parse_chat_meta(ChatMetaType::Prefix, rest) {
            return kind;
        }
    }
    if let Some(rest) = key.strip_prefix(SUFFIX_PREFIX) {
        if let Some(kind) = parse_chat_meta(ChatMetaType::Suffix, rest) {
            return kind;
        }
    }
    if let Some(rest) = key.strip_prefix(META_PREFIX) {
        let parts = split_unescaped(rest, 2);
        if parts.len() == 2 && !parts[0].is_empty() {
            return NodeKind::Meta {
                key: unescape_delimiters(&parts[0]).to_lowercase(),
                value: unescape_delimiters(&parts[1]),
            };
        }
    }
    if let Some(rest) = key.strip_prefix(WEIGHT_PREFIX) {
        if let Ok(weight) = rest.parse::<i32>() {
            return NodeKind::Weight(weight);
        }
    }
    if let Some(rest) = key.strip_prefix(DISPLAY_NAME_PREFIX) {
        if !rest.is_empty() {
            return NodeKind::DisplayName(rest.to_string());
        }
    }
    NodeKind::Permission
}

fn parse_chat_meta(meta_type: ChatMetaType, rest: &str) -> Option<NodeKind> {
    let parts = split_unescaped(rest, 2);
    if parts.len() != 2 {
        return None;
    }
    let priority = parts[0].parse::<i32>().ok()?;
    Some(NodeKind::ChatMeta {
        meta_type,
        priority,
        value: unescape_delimiters(&parts[1]),
    })
}

/// Splits on `.` not preceded by a backslash, into at most `limit` parts
fn split_unescaped(input: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;

    for c in input.chars() {
        if escaped {
            current.push('\\');
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '.' && parts.len() + 1 < limit {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if escaped {
        current.push('\\');
    }
    parts.push(current);
    parts
}

fn escape_delimiters(input: &str) -> String {
    input.replace('\\', "\\\\").replace('.', "\\.")
}

fn unescape_delimiters(input: &str) -> String {
    input.replace("\\.", ".").replace("\\\\", "\\")
}
