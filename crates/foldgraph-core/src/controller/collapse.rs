//! The collapse layer: hides linear runs behind dotted connectors.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{GraphAction, GraphAnswer, GraphChanges, GraphController, translate_action};
use crate::collapsed::{CollapsedGraph, CompiledGraph};
use crate::config::EngineConfig;
use crate::dotted::apply_and_bridge;
use crate::error::Result;
use crate::fragment::{Fragment, FragmentFinder};
use crate::graph::{Adjacency, BackingGraph, Direction, GraphEdge, GraphElement, LinearGraph, NodeId};
use crate::visibility::VisibilityMap;

/// A fragment re-expressed in backing indices.
#[derive(Debug)]
struct Plan {
    up: usize,
    down: usize,
    interior: Vec<usize>,
}

impl Plan {
    fn from_compiled(compiled: &CompiledGraph<'_>, fragment: &Fragment) -> Option<Self> {
        let (up, down) = fragment.boundaries()?;
        Some(Self {
            up: compiled.backing_index(up)?,
            down: compiled.backing_index(down)?,
            interior: fragment
                .interior
                .iter()
                .filter_map(|&i| compiled.backing_index(i))
                .collect(),
        })
    }
}

/// Collapses and expands runs of the delegate's graph.
///
/// Everything the delegate shows starts visible. Pinned ids are never
/// hidden by a collapse.
pub struct CollapseController {
    delegate: Box<dyn GraphController>,
    graph: CollapsedGraph,
    config: EngineConfig,
    pinned: BTreeSet<NodeId>,
    exposed: Arc<dyn BackingGraph>,
}

impl fmt::Debug for CollapseController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollapseController")
            .field("graph", &self.graph)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl CollapseController {
    /// # Errors
    ///
    /// Propagates snapshot errors from the initial view.
    pub fn new(delegate: Box<dyn GraphController>, config: EngineConfig) -> Result<Self> {
        let backing = delegate.graph();
        let seed = VisibilityMap::all_of(&*backing);
        let graph = CollapsedGraph::with_config(backing, &seed, &config);
        let exposed = Arc::new(graph.compiled_graph()?.snapshot()?);
        Ok(Self {
            delegate,
            graph,
            config,
            pinned: BTreeSet::new(),
            exposed,
        })
    }

    /// The collapsed view this layer maintains.
    #[must_use]
    pub const fn collapsed(&self) -> &CollapsedGraph {
        &self.graph
    }

    #[must_use]
    pub const fn pinned(&self) -> &BTreeSet<NodeId> {
        &self.pinned
    }

    /// Replace the pinned set. Already collapsed runs are left alone.
    pub fn set_pinned(&mut self, pinned: BTreeSet<NodeId>) {
        self.pinned = pinned;
    }

    fn expand_all(&mut self) -> Result<()> {
        let mut modification = self.graph.start_modification()?;
        modification.reset_visibility_to_seed();
        modification.clear_all_synthetic_edges();
        apply_and_bridge(&mut self.graph, modification, self.config.max_walk)?;
        Ok(())
    }

    fn collapse_all(&mut self) -> Result<()> {
        let plans = {
            let compiled = self.graph.compiled_graph()?;
            let pinned = &self.pinned;
            let is_pinned = move |i: usize| compiled.node_at(i).is_some_and(|n| pinned.contains(&n.id));
            let finder = FragmentFinder::new(&compiled, is_pinned).with_config(&self.config);

            let mut absorbed = BTreeSet::new();
            let mut plans = Vec::new();
            for start in 0..compiled.node_count() {
                if absorbed.contains(&start) || is_pinned(start) {
                    continue;
                }
                let Some(fragment) = finder.maximal_linear_fragment(start, Direction::Down) else {
                    continue;
                };
                absorbed.extend(fragment.interior.iter().copied());
                plans.extend(Plan::from_compiled(&compiled, &fragment));
            }
            plans
        };
        self.hide(&plans)
    }

    fn collapse(&mut self, element: GraphElement) -> Result<()> {
        let plan = {
            let compiled = self.graph.compiled_graph()?;
            let start = match element {
                GraphElement::Node(index) => Some(index),
                GraphElement::Edge(edge) => edge.up.or(edge.down),
            };
            let Some(start) = start.filter(|&s| s < compiled.node_count()) else {
                return Ok(());
            };
            let pinned = &self.pinned;
            let is_pinned = move |i: usize| compiled.node_at(i).is_some_and(|n| pinned.contains(&n.id));
            let finder = FragmentFinder::new(&compiled, is_pinned).with_config(&self.config);
            fragment_around(&finder, start, is_pinned(start))
                .and_then(|fragment| Plan::from_compiled(&compiled, &fragment))
        };
        plan.map_or(Ok(()), |plan| self.hide(&[plan]))
    }

    /// Hide every plan's interior and join its boundaries with a dotted
    /// connector, in one modification.
    fn hide(&mut self, plans: &[Plan]) -> Result<()> {
        if plans.is_empty() {
            return Ok(());
        }
        let mut modification = self.graph.start_modification()?;
        for plan in plans {
            for &index in &plan.interior {
                for edge in self.graph.synthetic_edges(index) {
                    modification.remove_edge(&edge)?;
                }
                modification.hide_node(index)?;
            }
            modification.create_edge(&GraphEdge::dotted(plan.up, plan.down))?;
        }
        debug!(fragments = plans.len(), "collapsing fragments");
        apply_and_bridge(&mut self.graph, modification, self.config.max_walk)?;
        Ok(())
    }

    fn expand(&mut self, edge: &GraphEdge) -> Result<()> {
        let (Some(up), Some(down)) = (edge.up, edge.down) else {
            return Ok(());
        };
        let up = self.graph.convert_to_backing_index(up)?;
        let down = self.graph.convert_to_backing_index(down)?;
        if !self.graph.is_synthetic_edge(up, down) {
            return Ok(());
        }
        let middle = FragmentFinder::new(&**self.graph.backing(), |_| false).middle_nodes(up, down, true);

        let mut modification = self.graph.start_modification()?;
        for index in middle {
            modification.show_node(index)?;
        }
        modification.remove_edge(&GraphEdge::dotted(up, down))?;
        apply_and_bridge(&mut self.graph, modification, self.config.max_walk)?;
        Ok(())
    }

    /// Rebind to the delegate's new graph and show every node it added.
    #[tracing::instrument(skip_all, fields(added = changes.added.len(), removed = changes.removed.len()))]
    fn delegate_changed(&mut self, changes: &GraphChanges) -> Result<()> {
        let backing = self.delegate.graph();
        let previous = self.graph.backing();
        let mut added: BTreeSet<NodeId> = (0..backing.node_count())
            .map(|i| backing.id_of(i))
            .filter(|&id| previous.index_of(id).is_none())
            .collect();
        added.extend(
            changes
                .added
                .iter()
                .copied()
                .filter(|&id| backing.index_of(id).is_some()),
        );

        let mut graph = self.graph.rebind(Arc::clone(&backing))?;
        graph.extend_seed(added.iter().copied());
        let mut modification = graph.start_modification()?;
        modification.clear_all_synthetic_edges();
        for index in added.iter().filter_map(|&id| backing.index_of(id)) {
            modification.show_node(index)?;
        }
        apply_and_bridge(&mut graph, modification, self.config.max_walk)?;
        self.graph = graph;
        Ok(())
    }

    fn pass_down(&mut self, action: &GraphAction) -> Result<GraphAnswer> {
        let Some(forwarded) = translate_action(self, action) else {
            return Ok(GraphAnswer::default());
        };
        let answer = self.delegate.perform_action(&forwarded)?;
        if let Some(pinned) = &answer.pinned {
            self.pinned.clone_from(pinned);
        }
        let Some(changes) = &answer.changes else {
            return Ok(answer);
        };
        let before = self.graph.visibility().clone();
        self.delegate_changed(changes)?;
        self.refresh()?;
        Ok(GraphAnswer {
            changes: GraphChanges::between(&before, self.graph.visibility()).non_empty(),
            pinned: answer.pinned,
        })
    }

    fn refresh(&mut self) -> Result<()> {
        self.exposed = Arc::new(self.graph.compiled_graph()?.snapshot()?);
        Ok(())
    }
}

/// The linear fragment containing `start`: the run above it merged with
/// the run below it. A pinned start only bounds a run below itself.
fn fragment_around<G: Adjacency + ?Sized>(
    finder: &FragmentFinder<'_, G>,
    start: usize,
    start_pinned: bool,
) -> Option<Fragment> {
    let below = finder.maximal_linear_fragment(start, Direction::Down);
    if start_pinned {
        return below;
    }
    match (finder.maximal_linear_fragment(start, Direction::Up), below) {
        (Some(above), Some(below)) => {
            let mut interior = above.interior;
            interior.extend(below.interior);
            interior.insert(start);
            Some(Fragment {
                up: above.up,
                down: below.down,
                interior,
            })
        }
        (Some(only), None) | (None, Some(only)) => Some(only),
        (None, None) => None,
    }
}

impl GraphController for CollapseController {
    fn graph(&self) -> Arc<dyn BackingGraph> {
        Arc::clone(&self.exposed)
    }

    fn translate_element_to_delegate_space(&self, element: &GraphElement) -> Option<GraphElement> {
        match *element {
            GraphElement::Node(index) => self
                .graph
                .convert_to_backing_index(index)
                .ok()
                .map(GraphElement::Node),
            GraphElement::Edge(edge) => {
                let (up, down) = (edge.up?, edge.down?);
                let up = self.graph.convert_to_backing_index(up).ok()?;
                let down = self.graph.convert_to_backing_index(down).ok()?;
                if edge.kind.is_synthesized_connector() || self.graph.is_synthetic_edge(up, down) {
                    return None;
                }
                Some(GraphElement::Edge(GraphEdge::normal(up, down)))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn perform_action(&mut self, action: &GraphAction) -> Result<GraphAnswer> {
        let before = self.graph.visibility().clone();
        match action {
            GraphAction::ExpandAll => self.expand_all()?,
            GraphAction::CollapseAll => self.collapse_all()?,
            GraphAction::Collapse(element) => self.collapse(*element)?,
            GraphAction::Expand(edge) => self.expand(edge)?,
            GraphAction::SetHeads(_) | GraphAction::Click(_) => return self.pass_down(action),
        }
        self.refresh()?;
        let changes = GraphChanges::between(&before, self.graph.visibility());
        debug!(
            shown = changes.added.len(),
            hidden = changes.removed.len(),
            visible = self.graph.visible_count(),
            "collapse action applied"
        );
        Ok(GraphAnswer::changed(changes.non_empty()))
    }
}
