//! The collapsed-graph facade.
//!
//! A [`CollapsedGraph`] wraps a [`BackingGraph`] together with the state that
//! decides what is rendered:
//!
//! - the **seed** visibility it was created with (the "matched" set),
//! - the **live** visibility,
//! - an [`IndexCompactor`] mapping compiled indices to backing indices,
//! - an [`EdgeStore`] of synthesized connectors.
//!
//! Reads go through [`CollapsedGraph::compiled_graph`]. Writes go through a
//! [`Modification`] obtained from [`CollapsedGraph::start_modification`]; at
//! most one may be outstanding per graph.

pub mod compiled;
pub mod modification;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::debug;

use crate::compactor::{DEFAULT_BLOCK_SIZE, IndexCompactor};
use crate::config::EngineConfig;
use crate::dotted::DottedEdgeSynthesizer;
use crate::edges::{BackingSpace, EdgeStore, EdgeStoreView};
use crate::error::{GraphError, Result};
use crate::graph::{BackingGraph, EdgeFilter, GraphEdge, NodeId};
use crate::visibility::VisibilityMap;

pub use compiled::{CompiledGraph, CompiledSpace};
pub use modification::Modification;

/// Source of modification tickets. Zero means "no modification".
static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// Single-writer latch. `current` holds the ticket of the outstanding
/// modification; `applying` is raised for the duration of `apply`.
#[derive(Debug, Default)]
struct ModificationGuard {
    current: AtomicU64,
    applying: AtomicBool,
}

impl ModificationGuard {
    fn acquire(&self) -> Result<u64> {
        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        self.current
            .compare_exchange(0, ticket, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ticket)
            .map_err(|_| GraphError::ModificationInProgress)
    }

    fn holds(&self, ticket: u64) -> bool {
        self.current.load(Ordering::Acquire) == ticket
    }

    fn is_held(&self) -> bool {
        self.current.load(Ordering::Acquire) != 0
    }

    fn release(&self) {
        self.applying.store(false, Ordering::Release);
        self.current.store(0, Ordering::Release);
    }

    fn is_applying(&self) -> bool {
        self.applying.load(Ordering::Acquire)
    }
}

/// A backing graph with a subset of its nodes hidden and synthesized
/// connectors standing in for the hidden paths.
pub struct CollapsedGraph {
    backing: Arc<dyn BackingGraph>,
    seed: VisibilityMap,
    visibility: VisibilityMap,
    compactor: IndexCompactor,
    edges: EdgeStore,
    guard: ModificationGuard,
}

impl fmt::Debug for CollapsedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollapsedGraph")
            .field("backing_nodes", &self.backing.node_count())
            .field("visible_nodes", &self.compactor.compiled_len())
            .field("synthetic_edges", &self.edges.edge_count())
            .field("modification", &self.guard.current.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl CollapsedGraph {
    /// Wrap `backing`, showing exactly the nodes in `seed`. The seed is
    /// copied; later changes to the caller's map are not observed.
    #[must_use]
    pub fn new(backing: Arc<dyn BackingGraph>, seed: &VisibilityMap) -> Self {
        Self::with_block_size(backing, seed.clone(), seed.clone(), DEFAULT_BLOCK_SIZE)
    }

    /// Like [`CollapsedGraph::new`] with tuning taken from `config`.
    #[must_use]
    pub fn with_config(
        backing: Arc<dyn BackingGraph>,
        seed: &VisibilityMap,
        config: &EngineConfig,
    ) -> Self {
        Self::with_block_size(backing, seed.clone(), seed.clone(), config.block_size)
    }

    /// Wrap `backing` showing only `matched`, with dotted connectors across
    /// every hidden run.
    ///
    /// # Errors
    ///
    /// Propagates synthesis errors; none are expected on a fresh graph.
    pub fn filtered(backing: Arc<dyn BackingGraph>, matched: &VisibilityMap) -> Result<Self> {
        let mut graph = Self::new(backing, matched);
        let len = graph.backing.node_count();
        if len > 0 {
            DottedEdgeSynthesizer::update(&mut graph, 0..=len - 1)?;
        }
        Ok(graph)
    }

    fn with_block_size(
        backing: Arc<dyn BackingGraph>,
        seed: VisibilityMap,
        visibility: VisibilityMap,
        block_size: usize,
    ) -> Self {
        let compactor = IndexCompactor::new(backing.node_count(), block_size, |i| {
            visibility.get(backing.id_of(i))
        });
        Self {
            backing,
            seed,
            visibility,
            compactor,
            edges: EdgeStore::new(),
            guard: ModificationGuard::default(),
        }
    }

    /// Re-wrap a rebuilt backing graph around a copy of this view's state.
    ///
    /// Live and seed visibility are carried over for ids that still exist;
    /// new ids start hidden. Synthesized edges are kept as-is; those whose
    /// endpoints vanished simply stop resolving.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ModificationInProgress`] if a modification is
    /// outstanding.
    #[tracing::instrument(skip_all, fields(new_nodes = new_backing.node_count()))]
    pub fn rebind(&self, new_backing: Arc<dyn BackingGraph>) -> Result<Self> {
        if self.guard.is_held() {
            return Err(GraphError::ModificationInProgress);
        }
        let keep = |map: &VisibilityMap| -> VisibilityMap {
            map.iter()
                .filter(|&id| new_backing.index_of(id).is_some())
                .collect()
        };
        let seed = keep(&self.seed);
        let visibility = keep(&self.visibility);
        let mut graph = Self::with_block_size(
            Arc::clone(&new_backing),
            seed,
            visibility,
            self.compactor.block_size(),
        );
        graph.edges = self.edges.clone();
        debug!(
            visible = graph.compactor.compiled_len(),
            "rebound collapsed graph"
        );
        Ok(graph)
    }

    /// Add ids to the seed set, so a later reset shows them. Live
    /// visibility is unchanged.
    pub fn extend_seed(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        for id in ids {
            self.seed.set(id, true);
        }
    }

    /// Whether the backing node at `index` is shown. Out-of-range indices
    /// are not.
    #[must_use]
    pub fn is_visible(&self, index: usize) -> bool {
        index < self.backing.node_count() && self.visibility.get(self.backing.id_of(index))
    }

    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::ModificationInProgress`] while another
    /// modification of this graph has not been applied.
    pub fn start_modification(&self) -> Result<Modification> {
        let ticket = self.guard.acquire()?;
        Ok(Modification::new(ticket, self.backing.node_count()))
    }

    /// Whether a modification is outstanding.
    #[must_use]
    pub fn has_pending_modification(&self) -> bool {
        self.guard.is_held()
    }

    /// The rendered view.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnderModification`] while a modification is
    /// being applied.
    pub fn compiled_graph(&self) -> Result<CompiledGraph<'_>> {
        self.check_readable()?;
        Ok(CompiledGraph::new(self))
    }

    /// Backing index of a compiled index.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnderModification`] during apply,
    /// [`GraphError::IndexOutOfRange`] past the visible node count.
    pub fn convert_to_backing_index(&self, compiled: usize) -> Result<usize> {
        self.check_readable()?;
        self.to_backing(compiled).ok_or(GraphError::IndexOutOfRange {
            index: compiled,
            len: self.compactor.compiled_len(),
        })
    }

    /// Compiled index of a backing index, `None` when the node is hidden.
    ///
    /// # Errors
    ///
    /// [`GraphError::UnderModification`] during apply,
    /// [`GraphError::IndexOutOfRange`] past the backing node count.
    pub fn convert_to_compiled_index(&self, backing: usize) -> Result<Option<usize>> {
        self.check_readable()?;
        let len = self.backing.node_count();
        if backing >= len {
            return Err(GraphError::IndexOutOfRange {
                index: backing,
                len,
            });
        }
        Ok(self.to_compiled(backing))
    }

    /// Whether a synthesized two-endpoint edge joins two backing nodes.
    #[must_use]
    pub fn is_synthetic_edge(&self, up: usize, down: usize) -> bool {
        EdgeStoreView::new(&self.edges, BackingSpace(&*self.backing)).has_edge(up, down)
    }

    /// Synthesized edges at a backing node, in backing index space.
    #[must_use]
    pub fn synthetic_edges(&self, index: usize) -> Vec<GraphEdge> {
        EdgeStoreView::new(&self.edges, BackingSpace(&*self.backing))
            .adjacent_edges(index, EdgeFilter::ALL)
    }

    #[must_use]
    pub fn backing(&self) -> &Arc<dyn BackingGraph> {
        &self.backing
    }

    /// The visibility this graph was created with.
    #[must_use]
    pub const fn seed(&self) -> &VisibilityMap {
        &self.seed
    }

    #[must_use]
    pub const fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    #[must_use]
    pub const fn edge_store(&self) -> &EdgeStore {
        &self.edges
    }

    /// Number of visible nodes.
    #[must_use]
    pub fn visible_count(&self) -> usize {
        self.compactor.compiled_len()
    }

    fn check_readable(&self) -> Result<()> {
        if self.guard.is_applying() {
            return Err(GraphError::UnderModification);
        }
        Ok(())
    }

    fn to_backing(&self, compiled: usize) -> Option<usize> {
        self.compactor
            .to_backing(compiled, |i| self.visibility.get(self.backing.id_of(i)))
    }

    fn to_compiled(&self, backing: usize) -> Option<usize> {
        self.compactor
            .to_compiled(backing, |i| self.visibility.get(self.backing.id_of(i)))
    }

    /// Raise or lower the applying flag from outside `apply`.
    #[cfg(test)]
    pub(crate) fn simulate_applying(&self, applying: bool) {
        self.guard.applying.store(applying, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Adjacency, EdgeKind, LinearGraph, StaticGraph};

    fn chain(n: usize) -> Arc<dyn BackingGraph> {
        let edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        Arc::new(StaticGraph::from_edges(n, &edges).expect("valid chain"))
    }

    fn all_visible(graph: &Arc<dyn BackingGraph>) -> VisibilityMap {
        VisibilityMap::all_of(&**graph)
    }

    #[test]
    fn seed_is_copied_not_aliased() {
        let backing = chain(3);
        let mut seed = all_visible(&backing);
        let graph = CollapsedGraph::new(Arc::clone(&backing), &seed);
        seed.set(NodeId(1), false);
        assert!(graph.is_visible(1));
        assert!(graph.seed().get(NodeId(1)));
        assert_eq!(graph.visible_count(), 3);
    }

    #[test]
    fn out_of_range_is_not_visible() {
        let backing = chain(2);
        let graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        assert!(!graph.is_visible(2));
        assert!(matches!(
            graph.convert_to_compiled_index(2),
            Err(GraphError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            graph.convert_to_backing_index(5),
            Err(GraphError::IndexOutOfRange { index: 5, len: 2 })
        ));
    }

    #[test]
    fn second_modification_is_rejected() {
        let backing = chain(3);
        let mut graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let first = graph.start_modification().expect("first modification");
        assert_eq!(
            graph.start_modification().expect_err("second modification"),
            GraphError::ModificationInProgress
        );
        first.apply(&mut graph).expect("apply");
        assert!(!graph.has_pending_modification());
        let again = graph.start_modification().expect("guard released");
        again.apply(&mut graph).expect("apply");
    }

    #[test]
    fn reads_fail_while_applying() {
        let backing = chain(3);
        let graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        graph.simulate_applying(true);
        assert_eq!(
            graph.compiled_graph().expect_err("read during apply"),
            GraphError::UnderModification
        );
        assert_eq!(
            graph.convert_to_backing_index(0).expect_err("read during apply"),
            GraphError::UnderModification
        );
        graph.simulate_applying(false);
        assert_eq!(graph.compiled_graph().expect("readable").node_count(), 3);
    }

    #[test]
    fn reads_are_allowed_while_collecting() {
        let backing = chain(3);
        let graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let mut modification = graph.start_modification().expect("start");
        modification.hide_node(1).expect("queue hide");
        let compiled = graph.compiled_graph().expect("readable while collecting");
        assert_eq!(compiled.node_count(), 3);
    }

    #[test]
    fn modification_from_another_graph_is_rejected() {
        let backing = chain(3);
        let mut a = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let b = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let foreign = b.start_modification().expect("start on b");
        assert_eq!(
            foreign.apply(&mut a).expect_err("foreign"),
            GraphError::ForeignModification
        );
    }

    #[test]
    fn hiding_a_run_leaves_one_dotted_edge() {
        let backing = chain(5);
        let mut graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let mut modification = graph.start_modification().expect("start");
        for i in 1..=3 {
            modification.hide_node(i).expect("hide");
        }
        crate::dotted::apply_and_bridge(&mut graph, modification, 500).expect("apply");

        assert!((1..=3).all(|i| !graph.is_visible(i)));
        let compiled = graph.compiled_graph().expect("readable");
        assert_eq!(compiled.node_count(), 2);

        let top = compiled.index_of_id(NodeId(0)).expect("0 visible");
        let bottom = compiled.index_of_id(NodeId(4)).expect("4 visible");
        let edges = compiled.adjacent_edges(top, EdgeFilter::ALL);
        assert_eq!(edges, vec![GraphEdge::dotted(top, bottom)]);
        assert!(graph.is_synthetic_edge(0, 4));
        assert_eq!(graph.synthetic_edges(4)[0].kind, EdgeKind::Dotted);
    }

    #[test]
    fn rebind_carries_visibility_for_surviving_ids() {
        let old = chain(4);
        let mut seed = all_visible(&old);
        seed.set(NodeId(2), false);
        let graph = CollapsedGraph::new(Arc::clone(&old), &seed);

        // Node 1 dropped, node 9 added on top.
        let rebuilt: Arc<dyn BackingGraph> = Arc::new(
            StaticGraph::with_ids(
                vec![NodeId(9), NodeId(0), NodeId(2), NodeId(3)],
                &[(0, 1), (1, 2), (2, 3)],
            )
            .expect("valid graph"),
        );
        let graph = graph.rebind(rebuilt).expect("rebind");
        assert!(!graph.is_visible(0), "new ids start hidden");
        assert!(graph.is_visible(1));
        assert!(!graph.is_visible(2));
        assert!(graph.is_visible(3));
        assert_eq!(graph.visible_count(), 2);
        assert!(!graph.seed().get(NodeId(1)));
    }

    #[test]
    fn rebind_refuses_pending_modification() {
        let backing = chain(2);
        let graph = CollapsedGraph::new(Arc::clone(&backing), &all_visible(&backing));
        let pending = graph.start_modification().expect("start");
        assert!(matches!(
            graph.rebind(Arc::clone(&backing)),
            Err(GraphError::ModificationInProgress)
        ));
        drop(pending);
    }

    #[test]
    fn filtered_connects_matched_nodes() {
        let backing = chain(6);
        let matched: VisibilityMap = [NodeId(0), NodeId(5)].into_iter().collect();
        let graph = CollapsedGraph::filtered(Arc::clone(&backing), &matched).expect("filtered");
        let compiled = graph.compiled_graph().expect("readable");
        assert_eq!(compiled.node_count(), 2);
        assert_eq!(
            compiled.adjacent_edges(0, EdgeFilter::NORMAL_ALL),
            vec![GraphEdge::dotted(0, 1)]
        );
    }
}
