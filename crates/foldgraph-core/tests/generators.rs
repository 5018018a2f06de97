//! Shared strategies and helpers for the integration suites.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use foldgraph_core::{
    Adjacency, BackingGraph, CollapsedGraph, EdgeKind, GraphEdge, NodeId, StaticGraph,
    VisibilityMap,
};
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use proptest::prelude::*;

/// A random DAG: node count and `(up, down)` edges with `up < down`.
#[derive(Debug, Clone)]
pub struct Dag {
    pub nodes: usize,
    pub edges: Vec<(usize, usize)>,
}

impl Dag {
    pub fn backing(&self) -> Arc<dyn BackingGraph> {
        Arc::new(StaticGraph::from_edges(self.nodes, &self.edges).expect("generated DAG is valid"))
    }
}

pub fn arb_dag(max_nodes: usize) -> impl Strategy<Value = Dag> {
    (1..=max_nodes)
        .prop_flat_map(|nodes| (Just(nodes), prop::collection::vec((0..nodes, 0..nodes), 0..nodes * 2)))
        .prop_map(|(nodes, pairs)| Dag {
            nodes,
            edges: pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect(),
        })
}

/// A DAG together with one visibility flag per node.
pub fn arb_dag_with_mask(max_nodes: usize) -> impl Strategy<Value = (Dag, Vec<bool>)> {
    arb_dag(max_nodes).prop_flat_map(|dag| {
        let nodes = dag.nodes;
        (Just(dag), prop::collection::vec(any::<bool>(), nodes))
    })
}

pub fn visibility(mask: &[bool]) -> VisibilityMap {
    mask.iter()
        .enumerate()
        .filter(|(_, visible)| **visible)
        .map(|(i, _)| NodeId(u32::try_from(i).expect("small graph")))
        .collect()
}

/// Every synthesized two-endpoint connector of `graph`, in backing indices.
pub fn dotted_pairs(graph: &CollapsedGraph) -> BTreeSet<(usize, usize)> {
    (0..graph.backing().node_count())
        .flat_map(|i| graph.synthetic_edges(i))
        .filter(|edge| edge.kind == EdgeKind::Dotted)
        .filter_map(|edge| Some((edge.up?, edge.down?)))
        .collect()
}

/// Every synthesized connector of `graph`, arrows included.
pub fn all_connectors(graph: &CollapsedGraph) -> BTreeSet<GraphEdge> {
    (0..graph.backing().node_count())
        .flat_map(|i| graph.synthetic_edges(i))
        .collect()
}

/// Visible pairs joined only through hidden nodes and not also joined
/// directly, computed by brute force.
pub fn expected_pairs(dag: &Dag, mask: &[bool]) -> BTreeSet<(usize, usize)> {
    let mut through_hidden = DiGraphMap::<usize, ()>::new();
    for node in 0..dag.nodes {
        through_hidden.add_node(node);
    }
    for &(up, down) in &dag.edges {
        if !mask[up] {
            through_hidden.add_edge(up, down, ());
        }
    }
    let direct: BTreeSet<(usize, usize)> = dag.edges.iter().copied().collect();

    let mut pairs = BTreeSet::new();
    for &(up, first) in &dag.edges {
        if !mask[up] || mask[first] {
            continue;
        }
        let mut dfs = Dfs::new(&through_hidden, first);
        while let Some(reached) = dfs.next(&through_hidden) {
            if mask[reached] && !direct.contains(&(up, reached)) {
                pairs.insert((up, reached));
            }
        }
    }
    pairs
}
