//! Permission calculator module.
//!
//! Turns a flat permission snapshot into tri-state decisions through an
//! ordered processor pipeline:
//! - **Direct**: exact key lookup
//! - **Regex**: `r=` regular expression nodes
//! - **Wildcard**: `<segment>.*` and root `*` nodes, most specific first
//! - **Alternate wildcard**: parent segments cover their children
//! - **Defaults**: platform defaults that may override wildcard grants
//!
//! Unmatched permissions are `Undefined`; the default decision belongs to
//! the caller.

#[allow(clippy::module_inception)]
mod calculator;
mod factory;
mod processor;
mod tristate;

use indexmap::IndexMap;

use crate::node::Node;

/// Resolved permission snapshot, in resolution order
pub type SourceMap = IndexMap<String, Node>;

pub use calculator::{CheckOrigin, PermissionCalculator, DEFAULT_LOOKUP_CAPACITY};
pub use factory::{CalculatorFactory, DefaultCalculatorFactory};
pub use processor::{
    compile_regex, AlternateWildcardProcessor, DefaultsProcessor, DirectProcessor, PermissionProcessor,
    RegexProcessor, WildcardProcessor,
};
pub use tristate::{ProcessorKind, Tristate, TristateResult};
