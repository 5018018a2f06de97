//! Known-topology scenarios for the collapsed view.

use std::sync::Arc;

use foldgraph_core::{
    Adjacency, BackingGraph, CollapsedGraph, EdgeFilter, EdgeKind, FragmentFinder, GraphEdge,
    GraphError, LinearGraph, NodeId, StaticGraph, VisibilityMap, apply_and_bridge,
};

fn chain(n: usize) -> Arc<dyn BackingGraph> {
    let edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
    Arc::new(StaticGraph::from_edges(n, &edges).expect("valid graph"))
}

fn all_visible(backing: &Arc<dyn BackingGraph>) -> CollapsedGraph {
    CollapsedGraph::new(Arc::clone(backing), &VisibilityMap::all_of(&**backing))
}

#[test]
fn hiding_the_middle_of_a_chain_leaves_one_dotted_edge() {
    let backing = chain(5);
    let mut graph = all_visible(&backing);

    let mut modification = graph.start_modification().expect("start");
    for index in 1..=3 {
        modification.hide_node(index).expect("hide");
    }
    apply_and_bridge(&mut graph, modification, 500).expect("apply");

    let compiled = graph.compiled_graph().expect("readable");
    assert_eq!(compiled.node_count(), 2);
    let top = compiled.index_of_id(NodeId(0)).expect("visible");
    let bottom = compiled.index_of_id(NodeId(4)).expect("visible");
    assert_eq!(
        compiled.adjacent_edges(top, EdgeFilter::ALL),
        vec![GraphEdge::dotted(top, bottom)]
    );
    assert!((1..=3).all(|i| !graph.is_visible(i)));
}

#[test]
fn showing_a_node_again_splits_the_connector() {
    // A -> B -> C -> D with B and C hidden, then C shown again.
    let backing = chain(4);
    let mut graph = all_visible(&backing);

    let mut modification = graph.start_modification().expect("start");
    modification.hide_node(1).expect("hide");
    modification.hide_node(2).expect("hide");
    apply_and_bridge(&mut graph, modification, 500).expect("apply");
    assert!(graph.is_synthetic_edge(0, 3));
    assert!(graph.synthetic_edges(1).is_empty());
    assert!(graph.synthetic_edges(2).is_empty());

    let mut modification = graph.start_modification().expect("start");
    modification.show_node(2).expect("show");
    apply_and_bridge(&mut graph, modification, 500).expect("apply");

    assert!(!graph.is_synthetic_edge(0, 3));
    assert!(graph.is_synthetic_edge(0, 2));
    let compiled = graph.compiled_graph().expect("readable");
    let c = compiled.index_of_id(NodeId(2)).expect("visible");
    let d = compiled.index_of_id(NodeId(3)).expect("visible");
    assert_eq!(
        compiled.adjacent_edges(c, EdgeFilter::DOWN_ONLY),
        vec![GraphEdge::normal(c, d)]
    );
}

#[test]
fn connectors_are_symmetric() {
    let backing = chain(3);
    let mut graph = all_visible(&backing);
    let mut modification = graph.start_modification().expect("start");
    modification.hide_node(1).expect("hide");
    apply_and_bridge(&mut graph, modification, 500).expect("apply");

    assert!(graph.is_synthetic_edge(0, 2));
    assert!(graph.is_synthetic_edge(2, 0));

    let mut modification = graph.start_modification().expect("start");
    modification.remove_edge(&GraphEdge::dotted(0, 2)).expect("remove");
    modification.apply(&mut graph).expect("apply");
    assert!(!graph.is_synthetic_edge(0, 2));
    assert!(!graph.is_synthetic_edge(2, 0));
}

#[test]
fn second_modification_is_rejected_until_the_first_applies() {
    let backing = chain(3);
    let mut graph = all_visible(&backing);
    let first = graph.start_modification().expect("start");
    let err = graph.start_modification().expect_err("second start");
    assert!(matches!(err, GraphError::ModificationInProgress));
    assert_eq!(err.code().code(), "E1001");

    first.apply(&mut graph).expect("apply");
    graph
        .start_modification()
        .expect("guard released")
        .apply(&mut graph)
        .expect("apply");
}

#[test]
fn branches_merge_through_hidden_nodes() {
    //   0
    //  / \
    // 1   2
    //  \ /
    //   3
    //   |
    //   4
    let backing: Arc<dyn BackingGraph> = Arc::new(
        StaticGraph::from_edges(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)])
            .expect("valid graph"),
    );
    let matched: VisibilityMap = [NodeId(0), NodeId(4)].into_iter().collect();
    let graph = CollapsedGraph::filtered(Arc::clone(&backing), &matched).expect("filtered");

    let compiled = graph.compiled_graph().expect("readable");
    assert_eq!(compiled.node_count(), 2);
    assert_eq!(
        compiled.adjacent_edges(0, EdgeFilter::ALL),
        vec![GraphEdge::dotted(0, 1)]
    );
    assert_eq!(compiled.adjacent(1, foldgraph_core::Direction::Up), vec![0]);
}

#[test]
fn fragment_between_pinned_nodes_collapses_to_one_connector() {
    let backing = chain(6);
    let mut graph = all_visible(&backing);
    let fragment = FragmentFinder::new(&*backing, |i| i == 0 || i == 5)
        .collapsible_fragment_around(2, 500);
    assert_eq!(fragment.boundaries(), Some((0, 5)));

    let mut modification = graph.start_modification().expect("start");
    for &index in &fragment.interior {
        modification.hide_node(index).expect("hide");
    }
    apply_and_bridge(&mut graph, modification, 500).expect("apply");

    let connectors: Vec<(usize, usize, EdgeKind)> = (0..6)
        .flat_map(|i| graph.synthetic_edges(i))
        .filter_map(|edge| Some((edge.up?, edge.down?, edge.kind)))
        .collect();
    assert_eq!(
        connectors,
        vec![(0, 5, EdgeKind::Dotted), (0, 5, EdgeKind::Dotted)]
    );
}

#[test]
fn rebuilt_backing_keeps_collapse_state() {
    let backing = chain(4);
    let mut graph = all_visible(&backing);
    let mut modification = graph.start_modification().expect("start");
    modification.hide_node(1).expect("hide");
    modification.hide_node(2).expect("hide");
    apply_and_bridge(&mut graph, modification, 500).expect("apply");

    // Same history with a new node 7 on top.
    let rebuilt: Arc<dyn BackingGraph> = Arc::new(
        StaticGraph::from_parents(&[
            (NodeId(7), vec![NodeId(0)]),
            (NodeId(0), vec![NodeId(1)]),
            (NodeId(1), vec![NodeId(2)]),
            (NodeId(2), vec![NodeId(3)]),
            (NodeId(3), vec![]),
        ])
        .expect("valid graph"),
    );
    let graph = graph.rebind(rebuilt).expect("rebind");
    let compiled = graph.compiled_graph().expect("readable");
    assert_eq!(compiled.node_count(), 2, "new node starts hidden");
    let top = compiled.index_of_id(NodeId(0)).expect("visible");
    let bottom = compiled.index_of_id(NodeId(3)).expect("visible");
    assert!(
        compiled
            .adjacent_edges(top, EdgeFilter::ALL)
            .contains(&GraphEdge::dotted(top, bottom))
    );
}
