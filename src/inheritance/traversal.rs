//! Traversal algorithms over an inheritance graph
//!
//! Every algorithm runs on an explicit worklist with an owned visited set,
//! terminates on arbitrary graphs (including self references), emits each
//! node at most once and never emits the start node.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// A directed graph whose successors are computed on demand
pub trait Graph {
    type Node: Clone;
    type Key: Eq + Hash;

    /// Identity used for cycle detection and de-duplication
    fn key(&self, node: &Self::Node) -> Self::Key;

    /// Direct successors, in the order they should be visited
    fn successors(&self, node: &Self::Node) -> Vec<Self::Node>;
}

/// Order in which an inheritance tree is flattened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalAlgorithm {
    /// Level by level: all parents, then all grandparents, ...
    #[default]
    BreadthFirst,
    /// Emit a holder, then fully walk each parent before the next sibling
    DepthFirstPreOrder,
    /// Fully walk each parent subtree before emitting the parent
    DepthFirstPostOrder,
}

/// Flattens the graph reachable from `start` using the given algorithm
pub fn traverse<G: Graph>(graph: &G, algorithm: TraversalAlgorithm, start: &G::Node) -> Vec<G::Node> {
    match algorithm {
        TraversalAlgorithm::BreadthFirst => breadth_first(graph, start),
        TraversalAlgorithm::DepthFirstPreOrder => depth_first_pre_order(graph, start),
        TraversalAlgorithm::DepthFirstPostOrder => depth_first_post_order(graph, start),
    }
}

fn breadth_first<G: Graph>(graph: &G, start: &G::Node) -> Vec<G::Node> {
    let mut visited: HashSet<G::Key> = HashSet::new();
    let mut queue: VecDeque<G::Node> = VecDeque::new();
    let mut result = Vec::new();

    visited.insert(graph.key(start));
    queue.push_back(start.clone());

    while let Some(current) = queue.pop_front() {
        for successor in graph.successors(&current) {
            if visited.insert(graph.key(&successor)) {
                result.push(successor.clone());
                queue.push_back(successor);
            }
        }
    }

    result
}

fn depth_first_pre_order<G: Graph>(graph: &G, start: &G::Node) -> Vec<G::Node> {
    let start_key = graph.key(start);
    let mut visited: HashSet<G::Key> = HashSet::new();
    let mut stack: Vec<G::Node> = vec![start.clone()];
    let mut result = Vec::new();

    while let Some(current) = stack.pop() {
        let key = graph.key(&current);
        if visited.contains(&key) {
            continue;
        }
        let is_start = key == start_key;
        visited.insert(key);

        // reversed so the first successor is popped first
        let successors = graph.successors(&current);
        for successor in successors.into_iter().rev() {
            if !visited.contains(&graph.key(&successor)) {
                stack.push(successor);
            }
        }

        if !is_start {
            result.push(current);
        }
    }

    result
}

fn depth_first_post_order<G: Graph>(graph: &G, start: &G::Node) -> Vec<G::Node> {
    struct Frame<N> {
        node: N,
        successors: Vec<N>,
        next: usize,
    }

    let mut visited: HashSet<G::Key> = HashSet::new();
    let mut result = Vec::new();

    visited.insert(graph.key(start));
    let mut stack = vec![Frame {
        successors: graph.successors(start),
        node: start.clone(),
        next: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        if frame.next < frame.successors.len() {
            let child = frame.successors[frame.next].clone();
            frame.next += 1;
            if visited.insert(graph.key(&child)) {
                stack.push(Frame {
                    successors: graph.successors(&child),
                    node: child,
                    next: 0,
                });
            }
        } else if let Some(done) = stack.pop() {
            // the start frame is always the last one popped
            if !stack.is_empty() {
                result.push(done.node);
            }
        }
    }

    result
}

/// Stable sort by descending weight; holders without weight sort last
///
/// Equal weights keep the order produced by the traversal algorithm.
pub fn sort_by_weight<N>(nodes: &mut [N], weight: impl Fn(&N) -> Option<i32>) {
    nodes.sort_by_cached_key(|node| std::cmp::Reverse(weight(node)));
}
