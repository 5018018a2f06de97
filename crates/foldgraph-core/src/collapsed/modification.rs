//! Batched, single-writer transactions against a [`CollapsedGraph`].
//!
//! A [`Modification`] collects operations without touching the graph. On
//! [`Modification::apply`] they take effect in a fixed order regardless of
//! the order they were queued in:
//!
//! 1. visibility reset to the seed set,
//! 2. wipe of the synthesized edge store,
//! 3. show/hide operations (last writer wins per node),
//! 4. queued edge removals, then queued edge creations,
//! 5. recount of the compactor over the touched index range.
//!
//! Every queued operation is expressed in backing index space.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use super::CollapsedGraph;
use crate::edges::{BackingSpace, EdgeStore, EdgeStoreView, IdentitySpace, IndexSpace};
use crate::error::{GraphError, Result};
use crate::graph::{BackingGraph, EdgeFilter, GraphEdge};

/// Pending changes to one [`CollapsedGraph`].
///
/// Dropping a modification without applying it leaves its graph locked
/// against further modifications.
#[derive(Debug)]
pub struct Modification {
    ticket: u64,
    node_count: usize,
    visibility: BTreeMap<usize, bool>,
    // Queued edges use the backing index as their id.
    to_create: EdgeStore,
    to_remove: EdgeStore,
    clear_edges: bool,
    reset_visibility: bool,
    touched: Option<(usize, usize)>,
    applied: bool,
}

impl Modification {
    pub(super) fn new(ticket: u64, node_count: usize) -> Self {
        Self {
            ticket,
            node_count,
            visibility: BTreeMap::new(),
            to_create: EdgeStore::new(),
            to_remove: EdgeStore::new(),
            clear_edges: false,
            reset_visibility: false,
            touched: None,
            applied: false,
        }
    }

    /// Queue showing the backing node at `index`.
    ///
    /// # Errors
    ///
    /// [`GraphError::IndexOutOfRange`] for an index past the backing graph.
    pub fn show_node(&mut self, index: usize) -> Result<()> {
        self.set_visible(index, true)
    }

    /// Queue hiding the backing node at `index`.
    ///
    /// # Errors
    ///
    /// [`GraphError::IndexOutOfRange`] for an index past the backing graph.
    pub fn hide_node(&mut self, index: usize) -> Result<()> {
        self.set_visible(index, false)
    }

    fn set_visible(&mut self, index: usize, visible: bool) -> Result<()> {
        self.check_index(index)?;
        self.visibility.insert(index, visible);
        self.touch(index);
        Ok(())
    }

    /// Queue creating a synthesized edge (backing index space).
    ///
    /// # Errors
    ///
    /// [`GraphError::IndexOutOfRange`] for an endpoint past the backing
    /// graph.
    pub fn create_edge(&mut self, edge: &GraphEdge) -> Result<()> {
        self.touch_edge(edge)?;
        EdgeStoreView::new(&mut self.to_create, IdentitySpace).create_edge(edge);
        Ok(())
    }

    /// Queue removing a synthesized edge (backing index space). Cancels a
    /// creation of the same edge queued earlier in this modification.
    ///
    /// # Errors
    ///
    /// [`GraphError::IndexOutOfRange`] for an endpoint past the backing
    /// graph.
    pub fn remove_edge(&mut self, edge: &GraphEdge) -> Result<()> {
        self.touch_edge(edge)?;
        EdgeStoreView::new(&mut self.to_create, IdentitySpace).remove_edge(edge);
        EdgeStoreView::new(&mut self.to_remove, IdentitySpace).create_edge(edge);
        Ok(())
    }

    /// Wipe every synthesized edge before queued creations are applied.
    pub fn clear_all_synthetic_edges(&mut self) {
        self.clear_edges = true;
        self.touch_all();
    }

    /// Restore the seed visibility before queued show/hide operations are
    /// applied.
    pub fn reset_visibility_to_seed(&mut self) {
        self.reset_visibility = true;
        self.touch_all();
    }

    /// Backing index range touched so far.
    #[must_use]
    pub fn touched(&self) -> Option<RangeInclusive<usize>> {
        self.touched.map(|(lo, hi)| lo..=hi)
    }

    /// Queued visibility of `index`, if an operation targets it.
    #[must_use]
    pub fn pending_visibility(&self, index: usize) -> Option<bool> {
        self.visibility.get(&index).copied()
    }

    /// Edges queued for creation at a backing index.
    #[must_use]
    pub fn pending_edges(&self, index: usize) -> Vec<GraphEdge> {
        EdgeStoreView::new(&self.to_create, IdentitySpace).adjacent_edges(index, EdgeFilter::ALL)
    }

    /// Whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.touched.is_none()
    }

    /// Apply every queued operation to `graph` and release its guard.
    ///
    /// Returns the touched backing range, `None` for an empty modification.
    ///
    /// # Errors
    ///
    /// [`GraphError::ForeignModification`] if `graph` did not issue this
    /// modification. `graph` is left unchanged in that case.
    #[tracing::instrument(skip_all, fields(ticket = self.ticket))]
    pub fn apply(mut self, graph: &mut CollapsedGraph) -> Result<Option<RangeInclusive<usize>>> {
        if !graph.guard.holds(self.ticket) {
            return Err(GraphError::ForeignModification);
        }
        graph.guard.applying.store(true, Ordering::Release);

        let CollapsedGraph {
            backing,
            seed,
            visibility,
            compactor,
            edges,
            guard,
        } = graph;
        let backing: &dyn BackingGraph = &**backing;
        let len = backing.node_count();

        if self.reset_visibility {
            *visibility = seed.clone();
        }
        if self.clear_edges {
            edges.clear();
        }
        for (&index, &visible) in self.visibility.iter().filter(|(i, _)| **i < len) {
            visibility.set(backing.id_of(index), visible);
        }

        let removed = replay(&self.to_remove, edges, backing, Replay::Remove);
        let created = replay(&self.to_create, edges, backing, Replay::Create);

        if let Some((lo, hi)) = self.touched {
            let visibility = &*visibility;
            compactor.update(lo..=hi, |i| visibility.get(backing.id_of(i)));
        }

        self.applied = true;
        guard.release();
        debug!(
            touched_min = self.touched.map(|(lo, _)| lo),
            touched_max = self.touched.map(|(_, hi)| hi),
            shown_or_hidden = self.visibility.len(),
            removed,
            created,
            reset = self.reset_visibility,
            cleared = self.clear_edges,
            "applied modification"
        );
        Ok(self.touched())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.node_count {
            return Err(GraphError::IndexOutOfRange {
                index,
                len: self.node_count,
            });
        }
        Ok(())
    }

    fn touch_edge(&mut self, edge: &GraphEdge) -> Result<()> {
        for index in edge.endpoints() {
            self.check_index(index)?;
        }
        for index in edge.endpoints() {
            self.touch(index);
        }
        Ok(())
    }

    fn touch(&mut self, index: usize) {
        self.touched = Some(match self.touched {
            Some((lo, hi)) => (lo.min(index), hi.max(index)),
            None => (index, index),
        });
    }

    fn touch_all(&mut self) {
        if self.node_count > 0 {
            self.touch(0);
            self.touch(self.node_count - 1);
        }
    }
}

#[derive(Clone, Copy)]
enum Replay {
    Create,
    Remove,
}

/// Replay every edge of a queue into the live store, translated from
/// backing indices to ids. Returns how many edges changed the store.
fn replay(queue: &EdgeStore, live: &mut EdgeStore, backing: &dyn BackingGraph, mode: Replay) -> usize {
    let queued = EdgeStoreView::new(queue, IdentitySpace);
    let mut live = EdgeStoreView::new(live, BackingSpace(backing));
    let mut changed = 0;
    for owner in queue.owners() {
        let Some(index) = IdentitySpace.index_of(owner) else {
            continue;
        };
        for edge in queued.adjacent_edges(index, EdgeFilter::ALL) {
            let done = match mode {
                Replay::Create => live.create_edge(&edge),
                Replay::Remove => live.remove_edge(&edge),
            };
            changed += usize::from(done);
        }
    }
    changed
}

impl Drop for Modification {
    fn drop(&mut self) {
        if !self.applied {
            warn!(
                ticket = self.ticket,
                "modification dropped without apply; graph stays locked"
            );
        }
    }
}
