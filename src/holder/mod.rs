//! Holder module: users, groups and their resolved views.
//!
//! This module provides:
//! - Users (by unique id) and groups (by name) owning normal and transient nodes
//! - A concurrent registry resolving inheritance targets
//! - Inheritance-aware permission export and meta accumulation
//! - Primary group calculation strategies

mod model;
mod node_map;
mod primary;
mod registry;
mod resolver;
mod types;

pub use model::Holder;
pub use node_map::NodeMap;
pub use primary::PrimaryGroupCalculation;
pub use registry::GroupRegistry;
pub use resolver::{HolderDataSource, HolderResolver};
pub use types::{DataType, HolderId, HolderType, DEFAULT_GROUP};
