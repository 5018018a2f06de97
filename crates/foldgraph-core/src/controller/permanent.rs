//! Bottom of the controller chain.

use std::sync::Arc;

use tracing::trace;

use super::{GraphAction, GraphAnswer, GraphController};
use crate::error::Result;
use crate::graph::{BackingGraph, GraphElement};

/// Exposes an immutable backing graph as-is. Answers no action.
#[derive(Clone)]
pub struct PermanentController {
    graph: Arc<dyn BackingGraph>,
}

impl std::fmt::Debug for PermanentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermanentController")
            .field("node_count", &self.graph.node_count())
            .finish()
    }
}

impl PermanentController {
    #[must_use]
    pub fn new(graph: Arc<dyn BackingGraph>) -> Self {
        Self { graph }
    }
}

impl GraphController for PermanentController {
    fn graph(&self) -> Arc<dyn BackingGraph> {
        Arc::clone(&self.graph)
    }

    fn translate_element_to_delegate_space(&self, _element: &GraphElement) -> Option<GraphElement> {
        None
    }

    fn perform_action(&mut self, action: &GraphAction) -> Result<GraphAnswer> {
        trace!(?action, "action reached the permanent graph");
        Ok(GraphAnswer::default())
    }
}
