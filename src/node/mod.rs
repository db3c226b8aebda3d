//! Node module: immutable permission, inheritance and meta facts.
//!
//! Node kinds are derived from the key:
//! - `group.<name>` inherits from another holder
//! - `prefix.<priority>.<text>` / `suffix.<priority>.<text>` carry chat meta
//! - `meta.<key>.<value>` carries arbitrary key/value meta
//! - `weight.<n>` and `displayname.<name>` describe groups
//! - `r=<pattern>` is a regex permission
//! - anything else is a plain (possibly wildcard) permission

mod shorthand;
mod types;

pub use shorthand::expand_shorthand;
pub use types::{
    is_wildcard, regex_pattern, ChatMetaType, Node, NodeBuilder, NodeKind, REGEX_MARKERS,
    ROOT_WILDCARD, ROOT_WILDCARD_QUOTED,
};
