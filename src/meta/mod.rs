//! Meta module: meta accumulation and prefix/suffix stacking.
//!
//! - First-seen-wins de-duplication by node key across an inheritance walk
//! - Priority maps of every prefix/suffix candidate
//! - Configurable stacks composing one prefix and one suffix
//! - Strict running maximum for weight

mod accumulator;
mod stack;

pub use accumulator::{
    MetaAccumulator, MetaSnapshot, MetaValue, WeightResult, PRIMARY_GROUP_KEY, WEIGHT_KEY,
};
pub use stack::{
    DuplicateRemoval, MetaStackAccumulator, MetaStackConfig, MetaStackDefinition, MetaStackElement,
    StackElementConfig, StackPosition, StackSource,
};
