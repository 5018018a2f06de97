//! Index-space view over an [`EdgeStore`].
//!
//! The store speaks stable ids; everything else in the engine speaks
//! indices. An [`EdgeStoreView`] pairs a store with an [`IndexSpace`] that
//! translates between the two, so the same store can be read in backing
//! index space (while applying a modification) or in compiled index space
//! (when answering adjacency queries).

use std::ops::{Deref, DerefMut};

use super::store::{EdgeStore, NO_TARGET};
use crate::graph::{BackingGraph, Direction, EdgeFilter, EdgeKind, GraphEdge, NodeId};

/// Translation between node indices and stable ids.
pub trait IndexSpace {
    fn id_of(&self, index: usize) -> Option<NodeId>;
    fn index_of(&self, id: NodeId) -> Option<usize>;
}

/// Index and id are the same number. Used for queued edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentitySpace;

impl IndexSpace for IdentitySpace {
    fn id_of(&self, index: usize) -> Option<NodeId> {
        u32::try_from(index)
            .ok()
            .filter(|&raw| raw != NO_TARGET)
            .map(NodeId)
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        usize::try_from(id.0).ok()
    }
}

/// Index space of a backing graph.
#[derive(Debug, Clone, Copy)]
pub struct BackingSpace<'a, G: ?Sized>(pub &'a G);

impl<G: BackingGraph + ?Sized> IndexSpace for BackingSpace<'_, G> {
    fn id_of(&self, index: usize) -> Option<NodeId> {
        (index < self.0.node_count()).then(|| self.0.id_of(index))
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.0.index_of(id)
    }
}

/// An [`EdgeStore`] read (and, through `&mut`, written) in an index space.
#[derive(Debug)]
pub struct EdgeStoreView<E, S> {
    store: E,
    space: S,
}

impl<E, S> EdgeStoreView<E, S>
where
    E: Deref<Target = EdgeStore>,
    S: IndexSpace,
{
    pub const fn new(store: E, space: S) -> Self {
        Self { store, space }
    }

    /// Stored edges of `index` passing `filter`.
    ///
    /// Two-endpoint edges whose far end does not resolve in this space
    /// (hidden, or dropped by a rebuild) are skipped.
    pub fn adjacent_edges(&self, index: usize, filter: EdgeFilter) -> Vec<GraphEdge> {
        let Some(id) = self.space.id_of(index) else {
            return Vec::new();
        };
        self.store
            .edges(id)
            .filter_map(|(target, kind)| self.materialize(index, target, kind))
            .filter(|edge| filter.matches(index, edge))
            .collect()
    }

    /// Whether a stored two-endpoint edge joins `a` and `b`.
    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        match (self.space.id_of(a), self.space.id_of(b)) {
            (Some(a), Some(b)) => self.store.has_edge(a, b),
            _ => false,
        }
    }

    fn materialize(&self, index: usize, target: Option<NodeId>, kind: EdgeKind) -> Option<GraphEdge> {
        match kind {
            EdgeKind::Normal | EdgeKind::Dotted => {
                let other = self.space.index_of(target?)?;
                Some(GraphEdge::between(index, other, kind))
            }
            EdgeKind::DottedArrowUp => Some(GraphEdge::arrow(index, Direction::Up)),
            EdgeKind::DottedArrowDown => Some(GraphEdge::arrow(index, Direction::Down)),
        }
    }

    /// Resolve an edge to `(owner, target)` ids. Arrows are owned by their
    /// only endpoint.
    fn ids_of(&self, edge: &GraphEdge) -> Option<(NodeId, Option<NodeId>)> {
        match edge.kind {
            EdgeKind::Normal | EdgeKind::Dotted => {
                let up = self.space.id_of(edge.up?)?;
                let down = self.space.id_of(edge.down?)?;
                Some((up, Some(down)))
            }
            EdgeKind::DottedArrowUp => Some((self.space.id_of(edge.down?)?, None)),
            EdgeKind::DottedArrowDown => Some((self.space.id_of(edge.up?)?, None)),
        }
    }
}

impl<E, S> EdgeStoreView<E, S>
where
    E: DerefMut<Target = EdgeStore>,
    S: IndexSpace,
{
    /// Store `edge`. Returns `false` if it was present or does not resolve.
    pub fn create_edge(&mut self, edge: &GraphEdge) -> bool {
        match self.ids_of(edge) {
            Some((owner, target)) => self.store.create(owner, target, edge.kind),
            None => false,
        }
    }

    /// Erase `edge`. Returns `false` if it was absent or does not resolve.
    pub fn remove_edge(&mut self, edge: &GraphEdge) -> bool {
        match self.ids_of(edge) {
            Some((owner, target)) => self.store.remove(owner, target, edge.kind),
            None => false,
        }
    }
}
