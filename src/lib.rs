//! # permresolve
//!
//! Permission and metadata resolution engine for multi-tenant server platforms.
//!
//! ## Features
//!
//! - **Inheritance graphs** walked breadth-first or depth-first, cycle safe,
//!   with optional weight-based post sorting
//! - **Tri-state permission checks** through a processor pipeline: direct,
//!   wildcard, alternate wildcard, regex and override defaults
//! - **Meta accumulation** with prefix/suffix stacking and weight resolution
//! - **Per-context caches** keyed by query options, with background
//!   recalculation and idle-entry housekeeping
//!
//! ## Example
//!
//! ```rust
//! use permresolve::{
//!     CheckOrigin, ContextSet, DataType, EngineConfig, HolderId, Node, PermissionEngine,
//!     QueryOptions, Tristate,
//! };
//!
//! let engine = PermissionEngine::new(EngineConfig::default());
//! engine.create_group("moderator");
//! let moderator = HolderId::group("moderator");
//! engine.set_node(&moderator, DataType::Normal, Node::permission("chat.mute").build()?)?;
//! engine.set_node(&moderator, DataType::Normal, Node::prefix(50, "[Mod]").build()?)?;
//!
//! let user = engine.create_user(uuid::Uuid::new_v4(), Some("sam".to_string()));
//! engine.set_node(
//!     user.id(),
//!     DataType::Normal,
//!     Node::inheritance("moderator").context("server", "survival").build()?,
//! )?;
//!
//! let survival = QueryOptions::contextual(ContextSet::of("server", "survival"));
//! let result = engine.check_permission(user.id(), "chat.mute", &survival, CheckOrigin::PlatformLookup)?;
//! assert_eq!(result.result(), Tristate::True);
//!
//! let meta = engine.meta_data(user.id(), &survival)?;
//! assert_eq!(meta.prefix(), Some("[Mod]"));
//!
//! let lobby = QueryOptions::contextual(ContextSet::of("server", "lobby"));
//! let result = engine.check_permission(user.id(), "chat.mute", &lobby, CheckOrigin::PlatformLookup)?;
//! assert_eq!(result.result(), Tristate::Undefined);
//! # Ok::<(), permresolve::PermsError>(())
//! ```

pub mod cache;
pub mod calculator;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod holder;
pub mod inheritance;
pub mod logging;
pub mod meta;
pub mod node;

// Re-export commonly used types
pub use cache::{CacheStats, CachedDataManager, CachedMetaData, CachedPermissionData};
pub use calculator::{CheckOrigin, PermissionCalculator, ProcessorKind, Tristate, TristateResult};
pub use config::EngineConfig;
pub use context::{ContextSatisfyMode, ContextSet, MutableContextSet, QueryFlags, QueryOptions};
pub use engine::PermissionEngine;
pub use error::{PermsError, Result};
pub use holder::{DataType, Holder, HolderId, HolderType};
pub use inheritance::TraversalAlgorithm;
pub use meta::{MetaAccumulator, MetaSnapshot, MetaStackDefinition};
pub use node::{Node, NodeKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
