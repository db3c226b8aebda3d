//! Inheritance module: graph view and traversal algorithms.
//!
//! - Lazily computed parent edges filtered by context and expiry
//! - Breadth-first and depth-first (pre/post order) flattening
//! - Optional stable post-traversal sort by descending group weight
//! - Cycle safe on arbitrary graphs, including self references

mod graph;
mod traversal;

pub use graph::{GroupWeights, InheritanceGraph};
pub use traversal::{sort_by_weight, traverse, Graph, TraversalAlgorithm};
