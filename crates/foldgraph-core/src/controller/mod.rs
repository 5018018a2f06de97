//! Stacked view-transformation layers.
//!
//! Each layer owns the layer beneath it and exposes a graph of its own to
//! the layer above. Actions travel down the chain as [`GraphAction`]s; a
//! layer either answers one itself or translates the affected element into
//! its delegate's index space and passes it on. Changes travel back up as
//! the returned [`GraphAnswer`].

pub mod branch;
pub mod collapse;
pub mod permanent;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::Result;
use crate::graph::{BackingGraph, GraphEdge, GraphElement, NodeId};
use crate::visibility::VisibilityMap;

pub use branch::BranchFilterController;
pub use collapse::CollapseController;
pub use permanent::PermanentController;

/// Something a user (or a higher layer) asked the chain to do. Elements
/// are in the index space of the layer receiving the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphAction {
    /// Undo every collapse.
    ExpandAll,
    /// Collapse every linear run.
    CollapseAll,
    /// Collapse the linear run around a node or edge.
    Collapse(GraphElement),
    /// Show the nodes behind a dotted edge.
    Expand(GraphEdge),
    /// Restrict the view to nodes reachable from these heads; `None` shows
    /// everything.
    SetHeads(Option<Vec<NodeId>>),
    /// A plain click, answered by whichever layer cares about it.
    Click(GraphElement),
}

impl GraphAction {
    /// The element this action refers to, if any.
    #[must_use]
    pub fn element(&self) -> Option<GraphElement> {
        match self {
            Self::Collapse(element) | Self::Click(element) => Some(*element),
            Self::Expand(edge) => Some(GraphElement::Edge(*edge)),
            Self::ExpandAll | Self::CollapseAll | Self::SetHeads(_) => None,
        }
    }

    /// The same action aimed at `element`. Actions without an element are
    /// returned unchanged, and `Expand` keeps its target if `element` is a
    /// node.
    #[must_use]
    pub fn with_element(&self, element: GraphElement) -> Self {
        match (self, element) {
            (Self::Collapse(_), element) => Self::Collapse(element),
            (Self::Click(_), element) => Self::Click(element),
            (Self::Expand(_), GraphElement::Edge(edge)) => Self::Expand(edge),
            (other, _) => other.clone(),
        }
    }
}

/// Nodes that appeared in or left a layer's graph, by stable id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphChanges {
    pub added: BTreeSet<NodeId>,
    pub removed: BTreeSet<NodeId>,
}

impl GraphChanges {
    /// Difference between two visibility states.
    #[must_use]
    pub fn between(before: &VisibilityMap, after: &VisibilityMap) -> Self {
        Self {
            added: after.iter().filter(|&id| !before.get(id)).collect(),
            removed: before.iter().filter(|&id| !after.get(id)).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// `None` when nothing changed.
    #[must_use]
    pub fn non_empty(self) -> Option<Self> {
        (!self.is_empty()).then_some(self)
    }
}

/// A layer's reply to an action. The default answer means "nothing
/// happened".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphAnswer {
    /// Set when the answering layer's graph changed.
    pub changes: Option<GraphChanges>,
    /// Replacement pinned set for the layers above, if it changed.
    pub pinned: Option<BTreeSet<NodeId>>,
}

impl GraphAnswer {
    #[must_use]
    pub const fn changed(changes: Option<GraphChanges>) -> Self {
        Self {
            changes,
            pinned: None,
        }
    }

    /// Whether anything in the answer asks the layers above to react.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.changes.is_none() && self.pinned.is_none()
    }
}

/// One layer of the view chain.
pub trait GraphController {
    /// The graph this layer exposes upwards.
    fn graph(&self) -> Arc<dyn BackingGraph>;

    /// Map an element of [`GraphController::graph`] into the delegate's
    /// index space. `None` when the element exists only in this layer.
    fn translate_element_to_delegate_space(&self, element: &GraphElement) -> Option<GraphElement>;

    /// Answer `action` or pass it down.
    ///
    /// # Errors
    ///
    /// Propagates engine errors from this layer or the layers beneath it.
    fn perform_action(&mut self, action: &GraphAction) -> Result<GraphAnswer>;
}

/// `action` re-aimed at the delegate's index space, or `None` when it
/// refers to an element the delegate does not know.
pub(crate) fn translate_action<C: GraphController + ?Sized>(
    layer: &C,
    action: &GraphAction,
) -> Option<GraphAction> {
    match action.element() {
        Some(element) => layer
            .translate_element_to_delegate_space(&element)
            .map(|translated| action.with_element(translated)),
        None => Some(action.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;

    #[test]
    fn element_follows_action() {
        let edge = GraphEdge::dotted(0, 3);
        assert_eq!(GraphAction::Expand(edge).element(), Some(GraphElement::Edge(edge)));
        assert_eq!(
            GraphAction::Click(GraphElement::Node(4)).with_element(GraphElement::Node(7)),
            GraphAction::Click(GraphElement::Node(7))
        );
        assert_eq!(
            GraphAction::Expand(edge).with_element(GraphElement::Node(1)),
            GraphAction::Expand(edge)
        );
        assert_eq!(GraphAction::CollapseAll.element(), None);
        let arrow = GraphEdge::arrow(2, Direction::Up);
        assert_eq!(
            GraphAction::Collapse(GraphElement::Node(2)).with_element(GraphElement::Edge(arrow)),
            GraphAction::Collapse(GraphElement::Edge(arrow))
        );
    }

    #[test]
    fn changes_between_visibility_states() {
        let before: VisibilityMap = [NodeId(1), NodeId(2)].into_iter().collect();
        let after: VisibilityMap = [NodeId(2), NodeId(3)].into_iter().collect();
        let changes = GraphChanges::between(&before, &after);
        assert_eq!(changes.added, BTreeSet::from([NodeId(3)]));
        assert_eq!(changes.removed, BTreeSet::from([NodeId(1)]));
        assert!(GraphChanges::between(&before, &before).non_empty().is_none());
    }
}
