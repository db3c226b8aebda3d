//! Property tests for traversal termination and uniqueness on random graphs

use permresolve::inheritance::{sort_by_weight, traverse, Graph, TraversalAlgorithm};
use proptest::prelude::*;
use std::collections::HashSet;

/// Adjacency-list graph over node indices, cycles allowed
#[derive(Debug)]
struct AdjacencyGraph {
    edges: Vec<Vec<usize>>,
}

impl Graph for AdjacencyGraph {
    type Node = usize;
    type Key = usize;

    fn key(&self, node: &usize) -> usize {
        *node
    }

    fn successors(&self, node: &usize) -> Vec<usize> {
        self.edges[*node].clone()
    }
}

fn graph_strategy() -> impl Strategy<Value = AdjacencyGraph> {
    (1usize..12).prop_flat_map(|size| {
        prop::collection::vec(prop::collection::vec(0..size, 0..5), size)
            .prop_map(|edges| AdjacencyGraph { edges })
    })
}

fn reachable(graph: &AdjacencyGraph, start: usize) -> HashSet<usize> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for &next in &graph.edges[node] {
            if seen.insert(next) {
                stack.push(next);
            }
        }
    }
    seen.remove(&start);
    seen
}

const ALGORITHMS: [TraversalAlgorithm; 3] = [
    TraversalAlgorithm::BreadthFirst,
    TraversalAlgorithm::DepthFirstPreOrder,
    TraversalAlgorithm::DepthFirstPostOrder,
];

proptest! {
    #[test]
    fn prop_each_reachable_node_emitted_once(graph in graph_strategy()) {
        let expected = reachable(&graph, 0);
        for algorithm in ALGORITHMS {
            let order = traverse(&graph, algorithm, &0);
            let unique: HashSet<usize> = order.iter().copied().collect();

            prop_assert_eq!(unique.len(), order.len(), "{:?} emitted a duplicate", algorithm);
            prop_assert!(!unique.contains(&0), "{:?} emitted the start node", algorithm);
            prop_assert_eq!(&unique, &expected);
        }
    }

    #[test]
    fn prop_traversal_is_deterministic(graph in graph_strategy()) {
        for algorithm in ALGORITHMS {
            prop_assert_eq!(traverse(&graph, algorithm, &0), traverse(&graph, algorithm, &0));
        }
    }

    #[test]
    fn prop_weight_sort_is_stable(weights in prop::collection::vec(prop::option::of(0i32..4), 0..20)) {
        let mut indexed: Vec<(usize, Option<i32>)> = weights.iter().copied().enumerate().collect();
        sort_by_weight(&mut indexed, |(_, weight)| *weight);

        for pair in indexed.windows(2) {
            let ((a_index, a_weight), (b_index, b_weight)) = (pair[0], pair[1]);
            prop_assert!(a_weight >= b_weight);
            if a_weight == b_weight {
                prop_assert!(a_index < b_index);
            }
        }
    }
}
