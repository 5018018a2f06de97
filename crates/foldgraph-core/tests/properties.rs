//! Property suites for compaction and connector synthesis.

use std::sync::Arc;

use foldgraph_core::{
    Adjacency, BackingGraph, CollapsedGraph, DottedEdgeSynthesizer, EdgeKind, LinearGraph, NodeId,
    VisibilityMap, apply_and_bridge,
};
use proptest::prelude::*;

#[path = "generators.rs"]
mod generators;
use generators::*;

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn compiled_indices_follow_backing_order((dag, mask) in arb_dag_with_mask(40)) {
        let backing = dag.backing();
        let graph = CollapsedGraph::new(Arc::clone(&backing), &visibility(&mask));
        let compiled = graph.compiled_graph().expect("readable");

        prop_assert_eq!(compiled.node_count(), mask.iter().filter(|v| **v).count());
        let order: Vec<usize> = (0..compiled.node_count())
            .map(|i| compiled.backing_index(i).expect("in range"))
            .collect();
        prop_assert!(order.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(order.iter().all(|&b| mask[b]));
    }

    #[test]
    fn visible_ids_round_trip((dag, mask) in arb_dag_with_mask(40)) {
        let backing = dag.backing();
        let graph = CollapsedGraph::new(Arc::clone(&backing), &visibility(&mask));
        let compiled = graph.compiled_graph().expect("readable");

        for (index, _) in mask.iter().enumerate().filter(|(_, v)| **v) {
            let id = backing.id_of(index);
            let compiled_index = compiled.index_of_id(id).expect("visible id");
            prop_assert_eq!(graph.convert_to_backing_index(compiled_index).expect("in range"), index);
            prop_assert_eq!(compiled.node_at(compiled_index).map(|n| n.id), Some(id));
        }
    }

    #[test]
    fn incremental_compaction_matches_a_fresh_build(
        (dag, mask) in arb_dag_with_mask(40),
        flips in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let backing = dag.backing();
        let mut graph = CollapsedGraph::new(Arc::clone(&backing), &visibility(&mask));
        let mut expected = mask.clone();

        let mut modification = graph.start_modification().expect("start");
        for flip in &flips {
            let index = flip.index(dag.nodes);
            expected[index] = !expected[index];
            if expected[index] {
                modification.show_node(index).expect("show");
            } else {
                modification.hide_node(index).expect("hide");
            }
        }
        modification.apply(&mut graph).expect("apply");

        let fresh = CollapsedGraph::new(Arc::clone(&backing), &visibility(&expected));
        let (ours, theirs) = (
            graph.compiled_graph().expect("readable"),
            fresh.compiled_graph().expect("readable"),
        );
        prop_assert_eq!(ours.node_count(), theirs.node_count());
        for i in 0..ours.node_count() {
            prop_assert_eq!(ours.backing_index(i), theirs.backing_index(i));
        }
    }

    #[test]
    fn connectors_match_hidden_path_reachability((dag, mask) in arb_dag_with_mask(30)) {
        let graph = CollapsedGraph::filtered(dag.backing(), &visibility(&mask)).expect("filtered");

        prop_assert_eq!(dotted_pairs(&graph), expected_pairs(&dag, &mask));
        prop_assert!(
            all_connectors(&graph).iter().all(|edge| edge.kind == EdgeKind::Dotted),
            "a full sweep never leaves the range"
        );
        for (index, visible) in mask.iter().enumerate() {
            if !visible {
                prop_assert!(graph.synthetic_edges(index).is_empty());
            }
        }
    }

    #[test]
    fn second_sweep_changes_nothing((dag, mask) in arb_dag_with_mask(30)) {
        let mut graph = CollapsedGraph::filtered(dag.backing(), &visibility(&mask)).expect("filtered");
        let before = all_connectors(&graph);
        let count = graph.edge_store().edge_count();

        DottedEdgeSynthesizer::update(&mut graph, 0..=dag.nodes - 1).expect("sweep");
        prop_assert_eq!(all_connectors(&graph), before);
        prop_assert_eq!(graph.edge_store().edge_count(), count);
    }

    #[test]
    fn incremental_bridging_equals_full_resynthesis(
        (dag, mask) in arb_dag_with_mask(30),
        flips in prop::collection::vec(any::<prop::sample::Index>(), 1..6),
        max_walk in prop_oneof![Just(2_usize), Just(500_usize)],
    ) {
        let backing = dag.backing();
        let mut graph = CollapsedGraph::filtered(Arc::clone(&backing), &visibility(&mask)).expect("filtered");
        let mut expected = mask.clone();

        let mut modification = graph.start_modification().expect("start");
        for flip in &flips {
            let index = flip.index(dag.nodes);
            expected[index] = !expected[index];
            if expected[index] {
                modification.show_node(index).expect("show");
            } else {
                modification.hide_node(index).expect("hide");
            }
        }
        apply_and_bridge(&mut graph, modification, max_walk).expect("apply");

        let full = CollapsedGraph::filtered(Arc::clone(&backing), &visibility(&expected)).expect("filtered");
        prop_assert_eq!(all_connectors(&graph), all_connectors(&full));
    }

    #[test]
    fn seed_is_copied_not_shared((dag, mask) in arb_dag_with_mask(20)) {
        let mut seed = visibility(&mask);
        let graph = CollapsedGraph::new(dag.backing(), &seed);
        seed.set(NodeId(0), !mask[0]);
        prop_assert_eq!(graph.is_visible(0), mask[0]);
        prop_assert_eq!(graph.seed().get(NodeId(0)), mask[0]);
    }
}

#[test]
fn empty_visibility_compiles_to_nothing() {
    let dag = Dag {
        nodes: 3,
        edges: vec![(0, 1), (1, 2)],
    };
    let graph = CollapsedGraph::filtered(dag.backing(), &VisibilityMap::new()).expect("filtered");
    let compiled = graph.compiled_graph().expect("readable");
    assert_eq!(compiled.node_count(), 0);
    assert!(all_connectors(&graph).is_empty());
}
