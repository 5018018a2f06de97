//! Graph vocabulary shared by every layer of the engine.
//!
//! # Index spaces
//!
//! Nodes are addressed two ways:
//!
//! - by **index**, a dense `0..N` position in display order. Indices are
//!   topological: every edge points from a smaller ("up") index to a larger
//!   ("down") index. Indices are reassigned when a graph is rebuilt.
//! - by [`NodeId`], a stable integer that survives rebuilds.
//!
//! A [`BackingGraph`] is the full history DAG. A [`LinearGraph`] is any
//! index-addressed view that also reports typed edges, such as the compiled
//! view of a [`crate::collapsed::CollapsedGraph`].
//!
//! # Edges
//!
//! [`GraphEdge`] is always expressed in the index space of the graph that
//! produced it. Two-endpoint edges carry both indices with `up < down`;
//! dangling arrows carry only the index of the node that owns them.

pub mod static_graph;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use static_graph::StaticGraph;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Stable identifier of a backing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of a node to look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards smaller indices (newer nodes in a history graph).
    Up,
    /// Towards larger indices.
    Down,
}

impl Direction {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

// ---------------------------------------------------------------------------
// EdgeKind
// ---------------------------------------------------------------------------

/// Kind of an edge in a compiled view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// Plain adjacency. Every backing edge has this kind.
    Normal,
    /// Stands in for a path through hidden nodes.
    Dotted,
    /// Dangling edge leaving its node upwards.
    DottedArrowUp,
    /// Dangling edge leaving its node downwards.
    DottedArrowDown,
}

impl EdgeKind {
    /// Two-endpoint kinds. These are stored at both endpoints.
    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal | Self::Dotted)
    }

    /// Dangling kinds with a single real endpoint.
    #[must_use]
    pub const fn is_arrow(self) -> bool {
        matches!(self, Self::DottedArrowUp | Self::DottedArrowDown)
    }

    /// Kinds produced by [`crate::dotted::DottedEdgeSynthesizer`].
    #[must_use]
    pub const fn is_synthesized_connector(self) -> bool {
        !matches!(self, Self::Normal)
    }
}

// ---------------------------------------------------------------------------
// GraphEdge / GraphNode / GraphElement
// ---------------------------------------------------------------------------

/// An edge expressed in the index space of the graph that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphEdge {
    pub up: Option<usize>,
    pub down: Option<usize>,
    pub kind: EdgeKind,
}

impl GraphEdge {
    /// Two-endpoint edge between `a` and `b`, ordered so that `up < down`.
    #[must_use]
    pub fn between(a: usize, b: usize, kind: EdgeKind) -> Self {
        debug_assert!(kind.is_normal(), "arrow kinds have a single endpoint");
        Self {
            up: Some(a.min(b)),
            down: Some(a.max(b)),
            kind,
        }
    }

    /// Plain edge, as found in a backing graph.
    #[must_use]
    pub fn normal(a: usize, b: usize) -> Self {
        Self::between(a, b, EdgeKind::Normal)
    }

    /// Dotted connector between `a` and `b`.
    #[must_use]
    pub fn dotted(a: usize, b: usize) -> Self {
        Self::between(a, b, EdgeKind::Dotted)
    }

    /// Dangling arrow owned by `node`, pointing in `direction`.
    #[must_use]
    pub const fn arrow(node: usize, direction: Direction) -> Self {
        match direction {
            Direction::Up => Self {
                up: None,
                down: Some(node),
                kind: EdgeKind::DottedArrowUp,
            },
            Direction::Down => Self {
                up: Some(node),
                down: None,
                kind: EdgeKind::DottedArrowDown,
            },
        }
    }

    /// The endpoint opposite to `node`, if the edge has one.
    #[must_use]
    pub fn other_end(&self, node: usize) -> Option<usize> {
        if self.up == Some(node) {
            self.down
        } else if self.down == Some(node) {
            self.up
        } else {
            None
        }
    }

    /// Indices of every real endpoint.
    pub fn endpoints(&self) -> impl Iterator<Item = usize> {
        self.up.into_iter().chain(self.down)
    }
}

impl fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |end: Option<usize>| end.map_or_else(|| "_".to_string(), |i| i.to_string());
        write!(f, "{}-{:?}-{}", show(self.up), self.kind, show(self.down))
    }
}

/// A node of a [`LinearGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphNode {
    pub index: usize,
    pub id: NodeId,
}

/// Something a user can point at in a rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphElement {
    Node(usize),
    Edge(GraphEdge),
}

// ---------------------------------------------------------------------------
// EdgeFilter
// ---------------------------------------------------------------------------

/// Which adjacent edges of a node to report.
///
/// "Up" and "down" refer to two-endpoint edges leading to a smaller or larger
/// index. Dangling arrows are "special" regardless of where they point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeFilter {
    pub up: bool,
    pub down: bool,
    pub special: bool,
}

impl EdgeFilter {
    pub const ALL: Self = Self {
        up: true,
        down: true,
        special: true,
    };
    pub const NORMAL_ALL: Self = Self {
        up: true,
        down: true,
        special: false,
    };
    pub const UP_ONLY: Self = Self {
        up: true,
        down: false,
        special: false,
    };
    pub const DOWN_ONLY: Self = Self {
        up: false,
        down: true,
        special: false,
    };
    pub const SPECIAL_ONLY: Self = Self {
        up: false,
        down: false,
        special: true,
    };

    /// Filter accepting two-endpoint edges in one direction.
    #[must_use]
    pub const fn normal(direction: Direction) -> Self {
        match direction {
            Direction::Up => Self::UP_ONLY,
            Direction::Down => Self::DOWN_ONLY,
        }
    }

    /// Whether `edge`, seen from `node`, passes this filter.
    #[must_use]
    pub fn matches(self, node: usize, edge: &GraphEdge) -> bool {
        if edge.kind.is_arrow() {
            return self.special;
        }
        if edge.down == Some(node) && self.up {
            return true;
        }
        edge.up == Some(node) && self.down
    }
}

// ---------------------------------------------------------------------------
// Graph traits
// ---------------------------------------------------------------------------

/// Index-addressed adjacency. The minimum the fragment search needs.
pub trait Adjacency {
    /// Number of nodes; valid indices are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Indices of the nodes joined to `index` by a two-endpoint edge on the
    /// given side.
    fn adjacent(&self, index: usize, direction: Direction) -> Vec<usize>;
}

/// The full, immutable history DAG this engine virtualizes.
///
/// Implementations must keep indices topological (`up < down` for every
/// edge) and must keep ids stable across rebuilds of the same logical node.
pub trait BackingGraph: Adjacency {
    /// Stable id of the node at `index`.
    fn id_of(&self, index: usize) -> NodeId;

    /// Current index of the node with the given id, if it exists.
    fn index_of(&self, id: NodeId) -> Option<usize>;
}

/// An index-addressed view reporting typed edges.
pub trait LinearGraph: Adjacency {
    /// Edges adjacent to `index` that pass `filter`.
    fn adjacent_edges(&self, index: usize, filter: EdgeFilter) -> Vec<GraphEdge>;

    /// The node at `index`, if it is in range.
    fn node_at(&self, index: usize) -> Option<GraphNode>;

    /// Index of the node with the given id, if it is part of this view.
    fn index_of_id(&self, id: NodeId) -> Option<usize>;
}
