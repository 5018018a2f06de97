//! Restrict the view to selected branches.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{GraphAction, GraphAnswer, GraphChanges, GraphController, translate_action};
use crate::collapsed::CollapsedGraph;
use crate::error::Result;
use crate::fragment::reachable_from;
use crate::graph::{BackingGraph, GraphEdge, GraphElement, NodeId};

/// Shows the delegate's nodes reachable from a set of heads.
///
/// Reachable sets are closed downwards, so no hidden run ever sits between
/// two shown nodes and the layer needs no connectors.
pub struct BranchFilterController {
    delegate: Box<dyn GraphController>,
    heads: Option<Vec<NodeId>>,
    view: CollapsedGraph,
    exposed: Arc<dyn BackingGraph>,
}

impl fmt::Debug for BranchFilterController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchFilterController")
            .field("heads", &self.heads)
            .field("view", &self.view)
            .finish_non_exhaustive()
    }
}

impl BranchFilterController {
    /// Filter `delegate` down to what `heads` reach; `None` shows everything.
    ///
    /// # Errors
    ///
    /// Propagates snapshot errors from the filtered view.
    pub fn new(delegate: Box<dyn GraphController>, heads: Option<Vec<NodeId>>) -> Result<Self> {
        let backing = delegate.graph();
        let reached = reachable_from(&*backing, heads.as_deref());
        let view = CollapsedGraph::new(backing, &reached);
        let exposed = Arc::new(view.compiled_graph()?.snapshot()?);
        Ok(Self {
            delegate,
            heads,
            view,
            exposed,
        })
    }

    #[must_use]
    pub fn heads(&self) -> Option<&[NodeId]> {
        self.heads.as_deref()
    }

    /// Recompute the filter against the delegate's current graph.
    fn refilter(&mut self) -> Result<GraphChanges> {
        let backing = self.delegate.graph();
        let reached = reachable_from(&*backing, self.heads.as_deref());
        let changes = GraphChanges::between(self.view.visibility(), &reached);
        self.view = CollapsedGraph::new(backing, &reached);
        self.exposed = Arc::new(self.view.compiled_graph()?.snapshot()?);
        debug!(
            shown = self.view.visible_count(),
            added = changes.added.len(),
            removed = changes.removed.len(),
            "branch filter recomputed"
        );
        Ok(changes)
    }

    fn pinned_heads(&self) -> BTreeSet<NodeId> {
        self.heads.iter().flatten().copied().collect()
    }
}

impl GraphController for BranchFilterController {
    fn graph(&self) -> Arc<dyn BackingGraph> {
        Arc::clone(&self.exposed)
    }

    fn translate_element_to_delegate_space(&self, element: &GraphElement) -> Option<GraphElement> {
        let to_backing = |index: usize| self.view.convert_to_backing_index(index).ok();
        match *element {
            GraphElement::Node(index) => to_backing(index).map(GraphElement::Node),
            GraphElement::Edge(edge) => {
                let up = edge.up.map(to_backing);
                let down = edge.down.map(to_backing);
                Some(GraphElement::Edge(GraphEdge {
                    up: up.map_or(Some(None), |mapped| mapped.map(Some))?,
                    down: down.map_or(Some(None), |mapped| mapped.map(Some))?,
                    kind: edge.kind,
                }))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn perform_action(&mut self, action: &GraphAction) -> Result<GraphAnswer> {
        if let GraphAction::SetHeads(heads) = action {
            self.heads.clone_from(heads);
            let changes = self.refilter()?;
            return Ok(GraphAnswer {
                changes: changes.non_empty(),
                pinned: Some(self.pinned_heads()),
            });
        }

        let Some(forwarded) = translate_action(self, action) else {
            return Ok(GraphAnswer::default());
        };
        let answer = self.delegate.perform_action(&forwarded)?;
        if answer.changes.is_none() {
            return Ok(answer);
        }
        let changes = self.refilter()?;
        Ok(GraphAnswer {
            changes: changes.non_empty(),
            pinned: answer.pinned,
        })
    }
}
