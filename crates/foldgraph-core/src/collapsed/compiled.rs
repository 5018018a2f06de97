//! Read-only compiled view of a [`CollapsedGraph`].

use std::fmt;

use super::CollapsedGraph;
use crate::edges::{EdgeStoreView, IndexSpace};
use crate::error::Result;
use crate::graph::{
    Adjacency, BackingGraph, Direction, EdgeFilter, GraphEdge, GraphNode, LinearGraph, NodeId,
    StaticGraph,
};

/// The visible nodes of a [`CollapsedGraph`], densely renumbered.
///
/// Holds a shared borrow of its graph, so no modification can be applied
/// while a view is alive. The [`LinearGraph`] reads still panic with
/// "graph is under modification" if the graph is mid-apply; the `try_`
/// reads return [`GraphError::UnderModification`](crate::error::GraphError::UnderModification)
/// instead.
#[derive(Clone, Copy)]
pub struct CompiledGraph<'a> {
    graph: &'a CollapsedGraph,
}

impl fmt::Debug for CompiledGraph<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("node_count", &self.node_count())
            .finish()
    }
}

/// Compiled index space of a [`CollapsedGraph`].
#[derive(Debug, Clone, Copy)]
pub struct CompiledSpace<'a>(&'a CollapsedGraph);

impl IndexSpace for CompiledSpace<'_> {
    fn id_of(&self, index: usize) -> Option<NodeId> {
        self.0.to_backing(index).map(|b| self.0.backing.id_of(b))
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.0
            .backing
            .index_of(id)
            .and_then(|b| self.0.to_compiled(b))
    }
}

impl<'a> CompiledGraph<'a> {
    pub(super) const fn new(graph: &'a CollapsedGraph) -> Self {
        Self { graph }
    }

    /// Backing index of a compiled index.
    #[must_use]
    pub fn backing_index(&self, compiled: usize) -> Option<usize> {
        self.check_not_applying();
        self.graph.to_backing(compiled)
    }

    /// Compiled index of a backing index; `None` when hidden.
    #[must_use]
    pub fn compiled_index(&self, backing: usize) -> Option<usize> {
        self.check_not_applying();
        self.graph.to_compiled(backing)
    }

    /// Checked [`Adjacency::node_count`].
    ///
    /// # Errors
    ///
    /// [`GraphError::UnderModification`](crate::error::GraphError::UnderModification)
    /// while the graph is being applied to.
    pub fn try_node_count(&self) -> Result<usize> {
        self.graph.check_readable()?;
        Ok(self.graph.compactor.compiled_len())
    }

    /// Checked [`LinearGraph::adjacent_edges`].
    ///
    /// # Errors
    ///
    /// [`GraphError::UnderModification`](crate::error::GraphError::UnderModification)
    /// while the graph is being applied to.
    pub fn try_adjacent_edges(&self, index: usize, filter: EdgeFilter) -> Result<Vec<GraphEdge>> {
        self.graph.check_readable()?;
        Ok(self.collect_edges(index, filter))
    }

    /// Checked [`LinearGraph::node_at`].
    ///
    /// # Errors
    ///
    /// [`GraphError::UnderModification`](crate::error::GraphError::UnderModification)
    /// while the graph is being applied to.
    pub fn try_node_at(&self, index: usize) -> Result<Option<GraphNode>> {
        self.graph.check_readable()?;
        Ok(self.read_node(index))
    }

    /// Materialize this view as an owned graph: every visible node and every
    /// two-endpoint edge between visible nodes, dotted connectors included.
    ///
    /// # Errors
    ///
    /// Propagates validation errors from [`StaticGraph::with_ids`]; a
    /// consistent view never produces one.
    pub fn snapshot(&self) -> Result<StaticGraph> {
        let count = self.node_count();
        let ids = (0..count)
            .filter_map(|i| self.node_at(i).map(|node| node.id))
            .collect();
        let mut edges = Vec::new();
        for index in 0..count {
            edges.extend(
                self.adjacent_edges(index, EdgeFilter::DOWN_ONLY)
                    .iter()
                    .filter_map(|edge| Some((edge.up?, edge.down?))),
            );
        }
        StaticGraph::with_ids(ids, &edges)
    }

    fn space(&self) -> CompiledSpace<'a> {
        CompiledSpace(self.graph)
    }

    fn check_not_applying(&self) {
        assert!(
            self.graph.check_readable().is_ok(),
            "graph is under modification"
        );
    }

    /// Backing edges between visible nodes, followed by stored connectors.
    fn collect_edges(&self, index: usize, filter: EdgeFilter) -> Vec<GraphEdge> {
        let Some(backing_index) = self.graph.to_backing(index) else {
            return Vec::new();
        };
        let backing = &self.graph.backing;

        let mut edges = Vec::new();
        for (direction, wanted) in [(Direction::Up, filter.up), (Direction::Down, filter.down)] {
            if !wanted {
                continue;
            }
            edges.extend(
                backing
                    .adjacent(backing_index, direction)
                    .into_iter()
                    .filter_map(|n| self.graph.to_compiled(n))
                    .map(|other| GraphEdge::normal(index, other)),
            );
        }
        edges.extend(
            EdgeStoreView::new(&self.graph.edges, self.space()).adjacent_edges(index, filter),
        );
        edges
    }

    fn read_node(&self, index: usize) -> Option<GraphNode> {
        self.graph.to_backing(index).map(|b| GraphNode {
            index,
            id: self.graph.backing.id_of(b),
        })
    }
}

impl Adjacency for CompiledGraph<'_> {
    fn node_count(&self) -> usize {
        self.check_not_applying();
        self.graph.compactor.compiled_len()
    }

    fn adjacent(&self, index: usize, direction: Direction) -> Vec<usize> {
        let mut nodes: Vec<usize> = self
            .adjacent_edges(index, EdgeFilter::normal(direction))
            .iter()
            .filter_map(|edge| edge.other_end(index))
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }
}

impl LinearGraph for CompiledGraph<'_> {
    fn adjacent_edges(&self, index: usize, filter: EdgeFilter) -> Vec<GraphEdge> {
        self.check_not_applying();
        self.collect_edges(index, filter)
    }

    fn node_at(&self, index: usize) -> Option<GraphNode> {
        self.check_not_applying();
        self.read_node(index)
    }

    fn index_of_id(&self, id: NodeId) -> Option<usize> {
        self.check_not_applying();
        self.space().index_of(id)
    }
}
