//! In-memory [`BackingGraph`] built from an edge list.
//!
//! `StaticGraph` is immutable once built. A rebuild produces a new graph;
//! callers carry collapse state over with
//! [`CollapsedGraph::rebind`](crate::collapsed::CollapsedGraph::rebind).

use std::collections::HashMap;

use super::{Adjacency, BackingGraph, Direction, NodeId};
use crate::edges::store::NO_TARGET;
use crate::error::GraphError;

/// Adjacency-list DAG with topological indices and stable ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticGraph {
    ids: Vec<NodeId>,
    index_by_id: HashMap<NodeId, usize>,
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
}

impl StaticGraph {
    /// Build a graph whose ids equal its indices.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::IndexOutOfRange`] for an endpoint outside
    /// `0..node_count` and [`GraphError::NotTopological`] for an edge whose
    /// first index is not smaller than its second.
    pub fn from_edges(node_count: usize, edges: &[(usize, usize)]) -> Result<Self, GraphError> {
        let ids = (0..node_count)
            .map(|i| u32::try_from(i).map(NodeId).map_err(|_| GraphError::IdOverflow(u32::MAX)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_ids(ids, edges)
    }

    /// Build a graph from explicit ids (one per index) and `(up, down)`
    /// index pairs. Duplicate edges are collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::DuplicateId`] if two nodes share an id,
    /// [`GraphError::IdOverflow`] for the reserved id, and the errors of
    /// [`StaticGraph::from_edges`] for malformed edges.
    pub fn with_ids(ids: Vec<NodeId>, edges: &[(usize, usize)]) -> Result<Self, GraphError> {
        let len = ids.len();
        let mut index_by_id = HashMap::with_capacity(len);
        for (index, &id) in ids.iter().enumerate() {
            if id.0 == NO_TARGET {
                return Err(GraphError::IdOverflow(id.0));
            }
            if index_by_id.insert(id, index).is_some() {
                return Err(GraphError::DuplicateId(id));
            }
        }

        let mut up = vec![Vec::new(); len];
        let mut down = vec![Vec::new(); len];
        for &(a, b) in edges {
            for index in [a, b] {
                if index >= len {
                    return Err(GraphError::IndexOutOfRange { index, len });
                }
            }
            if a >= b {
                return Err(GraphError::NotTopological { up: a, down: b });
            }
            if !down[a].contains(&b) {
                down[a].push(b);
                up[b].push(a);
            }
        }
        for list in up.iter_mut().chain(down.iter_mut()) {
            list.sort_unstable();
        }

        Ok(Self {
            ids,
            index_by_id,
            up,
            down,
        })
    }

    /// Build a graph from history rows in display order: each row is a node
    /// id and the ids of its parents, which must appear later in the slice.
    ///
    /// Parents that do not appear in `rows` are ignored, as in a partially
    /// loaded history.
    ///
    /// # Errors
    ///
    /// Same as [`StaticGraph::with_ids`]; a parent listed before its child
    /// yields [`GraphError::NotTopological`].
    pub fn from_parents(rows: &[(NodeId, Vec<NodeId>)]) -> Result<Self, GraphError> {
        let ids: Vec<NodeId> = rows.iter().map(|(id, _)| *id).collect();
        let position: HashMap<NodeId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let edges: Vec<(usize, usize)> = rows
            .iter()
            .enumerate()
            .flat_map(|(child, (_, parents))| {
                parents
                    .iter()
                    .filter_map(|p| position.get(p).map(|&parent| (child, parent)))
                    .collect::<Vec<_>>()
            })
            .collect();

        Self::with_ids(ids, &edges)
    }

    /// Number of distinct edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.down.iter().map(Vec::len).sum()
    }

    /// Ids in index order.
    #[must_use]
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    /// All edges as `(up, down)` index pairs, sorted.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.down
            .iter()
            .enumerate()
            .flat_map(|(up, downs)| downs.iter().map(move |&down| (up, down)))
            .collect()
    }
}

impl Adjacency for StaticGraph {
    fn node_count(&self) -> usize {
        self.ids.len()
    }

    fn adjacent(&self, index: usize, direction: Direction) -> Vec<usize> {
        let lists = match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        };
        lists.get(index).cloned().unwrap_or_default()
    }
}

impl BackingGraph for StaticGraph {
    fn id_of(&self, index: usize) -> NodeId {
        self.ids[index]
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_has_symmetric_adjacency() {
        let graph = StaticGraph::from_edges(3, &[(0, 1), (1, 2)]).expect("valid chain");
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.adjacent(1, Direction::Up), vec![0]);
        assert_eq!(graph.adjacent(1, Direction::Down), vec![2]);
        assert!(graph.adjacent(0, Direction::Up).is_empty());
        assert!(graph.adjacent(9, Direction::Down).is_empty());
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let graph = StaticGraph::from_edges(2, &[(0, 1), (0, 1)]).expect("valid");
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn backwards_edge_is_rejected() {
        let err = StaticGraph::from_edges(3, &[(2, 1)]).expect_err("not topological");
        assert_eq!(err, GraphError::NotTopological { up: 2, down: 1 });
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let err = StaticGraph::from_edges(2, &[(0, 5)]).expect_err("out of range");
        assert_eq!(err, GraphError::IndexOutOfRange { index: 5, len: 2 });
    }

    #[test]
    fn duplicate_and_reserved_ids_are_rejected() {
        let dup = StaticGraph::with_ids(vec![NodeId(1), NodeId(1)], &[]);
        assert_eq!(dup, Err(GraphError::DuplicateId(NodeId(1))));

        let reserved = StaticGraph::with_ids(vec![NodeId(u32::MAX)], &[]);
        assert_eq!(reserved, Err(GraphError::IdOverflow(u32::MAX)));
    }

    #[test]
    fn from_parents_maps_ids_to_rows() {
        // 30 is a merge of 20 and 10; 10 is the root. 99 is not loaded.
        let graph = StaticGraph::from_parents(&[
            (NodeId(30), vec![NodeId(20), NodeId(10)]),
            (NodeId(20), vec![NodeId(10), NodeId(99)]),
            (NodeId(10), vec![]),
        ])
        .expect("valid history");

        assert_eq!(graph.index_of(NodeId(20)), Some(1));
        assert_eq!(graph.id_of(2), NodeId(10));
        assert_eq!(graph.adjacent(0, Direction::Down), vec![1, 2]);
        assert_eq!(graph.adjacent(2, Direction::Up), vec![0, 1]);
        assert_eq!(graph.index_of(NodeId(99)), None);
        assert_eq!(graph.edges(), vec![(0, 1), (0, 2), (1, 2)]);
    }
}
