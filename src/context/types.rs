//! Context set types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Well-known context key for the server a query originates from
pub const SERVER_KEY: &str = "server";

/// Well-known context key for the world a query originates from
pub const WORLD_KEY: &str = "world";

/// How a node's context is compared against a query context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextSatisfyMode {
    /// For every key on the node, the query must carry at least one of its values
    #[default]
    AtLeastOneValuePerKey,
    /// Every (key, value) pair on the node must be present in the query
    AllValuesPerKey,
}

/// Immutable set of (key, value) context pairs
///
/// Keys and values are lower-cased on insertion, so `Server=Lobby` and
/// `server=lobby` are the same pair. Ordered storage makes the set hashable,
/// which lets it participate in cache keys.
///
/// # Examples
///
/// ```
/// use permresolve::ContextSet;
///
/// let ctx = ContextSet::of("server", "lobby");
/// assert!(ctx.contains("server", "lobby"));
/// assert!(ContextSet::empty().is_satisfied_by(&ctx, Default::default()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ContextSet {
    pairs: BTreeSet<(String, String)>,
}

impl ContextSet {
    /// Returns the empty (global) context set
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a context set holding a single pair
    pub fn of(key: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        let mut set = MutableContextSet::new();
        set.add(key, value);
        set.into_immutable()
    }

    /// Returns true if the exact pair is present
    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.pairs
            .contains(&(key.to_lowercase(), value.to_lowercase()))
    }

    /// Returns true if any pair with the given key is present
    pub fn contains_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.pairs.iter().any(|(k, _)| *k == key)
    }

    /// Returns every value stored under a key, in sorted order
    pub fn values(&self, key: &str) -> Vec<&str> {
        let key = key.to_lowercase();
        self.pairs
            .iter()
            .filter(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Checks whether `other` (usually a query context) satisfies this set
    ///
    /// An empty set is satisfied by anything; a non-empty set is never
    /// satisfied by an empty one.
    pub fn is_satisfied_by(&self, other: &ContextSet, mode: ContextSatisfyMode) -> bool {
        if self.is_empty() {
            return true;
        }
        if other.is_empty() || self.len() > other.len() && mode == ContextSatisfyMode::AllValuesPerKey {
            return false;
        }

        match mode {
            ContextSatisfyMode::AllValuesPerKey => self.pairs.is_subset(&other.pairs),
            ContextSatisfyMode::AtLeastOneValuePerKey => {
                let mut keys: Vec<&str> = self.pairs.iter().map(|(k, _)| k.as_str()).collect();
                keys.dedup();
                keys.into_iter().all(|key| {
                    self.pairs
                        .iter()
                        .filter(|(k, _)| k == key)
                        .any(|pair| other.pairs.contains(pair))
                })
            }
        }
    }

    /// Returns a mutable copy for further composition
    pub fn mutable_copy(&self) -> MutableContextSet {
        MutableContextSet {
            pairs: self.pairs.clone(),
        }
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for ContextSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = MutableContextSet::new();
        for (k, v) in iter {
            set.add(k, v);
        }
        set.into_immutable()
    }
}

/// Mutable context set used while composing a query context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutableContextSet {
    pairs: BTreeSet<(String, String)>,
}

impl MutableContextSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair; blank keys or values are ignored
    pub fn add(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        let key = key.as_ref().trim().to_lowercase();
        let value = value.as_ref().trim().to_lowercase();
        if !key.is_empty() && !value.is_empty() {
            self.pairs.insert((key, value));
        }
        self
    }

    pub fn remove(&mut self, key: &str, value: &str) -> &mut Self {
        self.pairs.remove(&(key.to_lowercase(), value.to_lowercase()));
        self
    }

    /// Removes every pair stored under a key
    pub fn remove_all(&mut self, key: &str) -> &mut Self {
        let key = key.to_lowercase();
        self.pairs.retain(|(k, _)| *k != key);
        self
    }

    pub fn clear(&mut self) {
        self.pairs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn into_immutable(self) -> ContextSet {
        ContextSet { pairs: self.pairs }
    }
}
