//! Synthesis of dotted connectors across hidden runs.
//!
//! # Sweep
//!
//! [`DottedEdgeSynthesizer::update`] recomputes the connectors of a
//! contiguous backing range `[up, down]` in two passes:
//!
//! 1. **Down pass** (`up → down`). Every node inspects its up neighbours.
//!    A hidden node records the visible nodes it reaches upwards through
//!    hidden nodes only; a visible node emits a dotted edge to each such
//!    node that is not already a direct parent. A hidden neighbour above the
//!    range marks the run as leaving the range, and a visible node with such
//!    a run also gets a dangling up-arrow.
//! 2. **Cleanup**. The per-node numbers are reset.
//! 3. **Up pass** (`down → up`). The mirror image over down neighbours,
//!    emitting down-arrows.
//!
//! Existing connectors attached to nodes in the range are replaced in the
//! same [`Modification`](crate::collapsed::Modification), so running the
//! sweep twice over an unchanged range leaves the edge set unchanged.
//! A replaced dotted edge whose other end lies outside the range leaves an
//! arrow at that end pointing back into the range.
//!
//! # Incremental bridging
//!
//! A sweep over an arbitrary range can only see hidden runs that lie inside
//! it. [`bridge_range`] grows a touched range until every hidden run
//! reachable from it is enclosed, which makes the incremental result equal
//! to a full resynthesis. [`apply_and_bridge`] ties the two together.
//!
//! Only one modification can be outstanding per graph, so sweeps of one
//! graph never overlap.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use tracing::{debug, trace};

use crate::collapsed::{CollapsedGraph, Modification};
use crate::error::Result;
use crate::graph::{Adjacency, Direction, EdgeKind, GraphEdge};

/// Counts reported by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisStats {
    /// Dotted edges present in the range after the sweep.
    pub dotted: usize,
    /// Dangling arrows present in the range after the sweep.
    pub arrows: usize,
    /// Connectors that were attached to the range before the sweep.
    pub replaced: usize,
}

/// What a node reaches on one side through hidden nodes only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Reach {
    visible: BTreeSet<usize>,
    /// Some hidden path leaves the swept range.
    beyond: bool,
}

impl Reach {
    fn merge(&mut self, other: &Self) {
        self.visible.extend(other.visible.iter().copied());
        self.beyond |= other.beyond;
    }
}

/// Per-node sweep state for `[offset, offset + len)`.
#[derive(Debug)]
struct ShiftNumbers {
    offset: usize,
    slots: Vec<Option<Reach>>,
}

impl ShiftNumbers {
    fn new(range: &RangeInclusive<usize>) -> Self {
        Self {
            offset: *range.start(),
            slots: vec![None; range.end() - range.start() + 1],
        }
    }

    fn get(&self, index: usize) -> Option<&Reach> {
        self.slots
            .get(index.checked_sub(self.offset)?)
            .and_then(Option::as_ref)
    }

    fn set(&mut self, index: usize, reach: Reach) {
        if let Some(slot) = index
            .checked_sub(self.offset)
            .and_then(|i| self.slots.get_mut(i))
        {
            *slot = Some(reach);
        }
    }

    fn reset(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

/// Two-pass connector sweep over one backing range.
#[derive(Debug)]
pub struct DottedEdgeSynthesizer<'g> {
    graph: &'g CollapsedGraph,
    range: RangeInclusive<usize>,
    numbers: ShiftNumbers,
    emitted: BTreeSet<GraphEdge>,
}

impl<'g> DottedEdgeSynthesizer<'g> {
    fn new(graph: &'g CollapsedGraph, range: RangeInclusive<usize>) -> Self {
        let numbers = ShiftNumbers::new(&range);
        Self {
            graph,
            range,
            numbers,
            emitted: BTreeSet::new(),
        }
    }

    /// Replace the connectors attached to `range` with freshly synthesized
    /// ones. The range is clamped to the backing graph.
    ///
    /// # Errors
    ///
    /// [`GraphError::ModificationInProgress`](crate::error::GraphError::ModificationInProgress)
    /// if another modification of `graph` is outstanding.
    #[tracing::instrument(skip(graph))]
    pub fn update(graph: &mut CollapsedGraph, range: RangeInclusive<usize>) -> Result<SynthesisStats> {
        let len = graph.backing().node_count();
        if len == 0 || range.is_empty() || *range.start() >= len {
            return Ok(SynthesisStats::default());
        }
        let range = *range.start()..=(*range.end()).min(len - 1);

        let mut modification = graph.start_modification()?;
        let (stale, fresh) = {
            let mut sweep = DottedEdgeSynthesizer::new(graph, range.clone());
            let stale = sweep.stale_connectors();
            let mut fresh = sweep.run();
            fresh.extend(sweep.boundary_arrows(&stale));
            (stale, fresh)
        };
        let stats = SynthesisStats {
            dotted: fresh.iter().filter(|e| !e.kind.is_arrow()).count(),
            arrows: fresh.iter().filter(|e| e.kind.is_arrow()).count(),
            replaced: stale.len(),
        };
        queue(&mut modification, &stale, &fresh)?;
        modification.apply(graph)?;

        debug!(
            up = range.start(),
            down = range.end(),
            dotted = stats.dotted,
            arrows = stats.arrows,
            replaced = stats.replaced,
            "synthesized connectors"
        );
        Ok(stats)
    }

    /// Connectors currently attached to nodes in the range.
    fn stale_connectors(&self) -> BTreeSet<GraphEdge> {
        self.range
            .clone()
            .flat_map(|index| self.graph.synthetic_edges(index))
            .filter(|edge| edge.kind.is_synthesized_connector())
            .collect()
    }

    /// Arrows left at the outer end of removed connectors that cross the
    /// range boundary, so the far node keeps its path.
    fn boundary_arrows(&self, stale: &BTreeSet<GraphEdge>) -> Vec<GraphEdge> {
        let outside = |end: usize| !self.range.contains(&end) && self.graph.is_visible(end);
        stale
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Dotted)
            .filter_map(|edge| match (edge.up, edge.down) {
                (Some(_), Some(down)) if outside(down) => Some(GraphEdge::arrow(down, Direction::Up)),
                (Some(up), Some(_)) if outside(up) => Some(GraphEdge::arrow(up, Direction::Down)),
                _ => None,
            })
            .collect()
    }

    fn run(&mut self) -> BTreeSet<GraphEdge> {
        self.sweep(Direction::Up);
        self.numbers.reset();
        self.sweep(Direction::Down);
        std::mem::take(&mut self.emitted)
    }

    /// One pass inspecting neighbours on the `toward` side. Nodes are
    /// visited so that those neighbours are always visited first.
    fn sweep(&mut self, toward: Direction) {
        let order: Vec<usize> = match toward {
            Direction::Up => self.range.clone().collect(),
            Direction::Down => self.range.clone().rev().collect(),
        };
        let graph = self.graph;
        let backing = graph.backing();

        for node in order {
            let mut direct = BTreeSet::new();
            let mut through = Reach::default();
            for neighbour in backing.adjacent(node, toward) {
                if graph.is_visible(neighbour) {
                    direct.insert(neighbour);
                } else if !self.range.contains(&neighbour) {
                    through.beyond = true;
                } else if let Some(reach) = self.numbers.get(neighbour) {
                    through.merge(reach);
                }
            }

            if graph.is_visible(node) {
                for &far in through.visible.difference(&direct) {
                    self.emitted.insert(GraphEdge::dotted(far, node));
                }
                if through.beyond {
                    self.emitted.insert(GraphEdge::arrow(node, toward));
                }
            } else {
                through.visible.extend(direct);
                trace!(
                    node,
                    reached = through.visible.len(),
                    beyond = through.beyond,
                    "hidden node"
                );
                self.numbers.set(node, through);
            }
        }
    }
}

fn queue(
    modification: &mut Modification,
    stale: &BTreeSet<GraphEdge>,
    fresh: &BTreeSet<GraphEdge>,
) -> Result<()> {
    for edge in stale {
        modification.remove_edge(edge)?;
    }
    for edge in fresh {
        modification.create_edge(edge)?;
    }
    Ok(())
}

/// Grow `touched` until every hidden run it reaches lies inside it.
///
/// Every neighbour of a touched node is pulled in, every neighbour of a
/// hidden node is pulled in, and every hidden neighbour of a visible node is
/// pulled in. When more than `max_walk` nodes outside `touched` have to be
/// examined the whole backing range is returned.
#[must_use]
pub fn bridge_range(
    graph: &CollapsedGraph,
    touched: RangeInclusive<usize>,
    max_walk: usize,
) -> RangeInclusive<usize> {
    let len = graph.backing().node_count();
    if len == 0 || touched.is_empty() || *touched.start() >= len {
        return touched;
    }
    let backing = graph.backing();
    let touched = *touched.start()..=(*touched.end()).min(len - 1);
    let (mut lo, mut hi) = (*touched.start(), *touched.end());
    // Processed interval, half-open on the right.
    let (mut done_lo, mut done_hi) = (lo, lo);
    let mut steps = 0;

    while done_lo > lo || done_hi <= hi {
        let node = if done_hi <= hi {
            done_hi += 1;
            done_hi - 1
        } else {
            done_lo -= 1;
            done_lo
        };
        if !touched.contains(&node) {
            steps += 1;
            if steps > max_walk {
                debug!(max_walk, "bridge range exceeded walk budget, using full range");
                return 0..=len - 1;
            }
        }

        let take_all = touched.contains(&node) || !graph.is_visible(node);
        for direction in [Direction::Up, Direction::Down] {
            for neighbour in backing.adjacent(node, direction) {
                if take_all || !graph.is_visible(neighbour) {
                    lo = lo.min(neighbour);
                    hi = hi.max(neighbour);
                }
            }
        }
    }

    trace!(lo, hi, steps, "closed bridge range");
    lo..=hi
}

/// Apply `modification`, then resynthesize connectors over the closure of
/// the range it touched. Returns the range that was swept.
///
/// # Errors
///
/// Errors of [`Modification::apply`] and [`DottedEdgeSynthesizer::update`].
pub fn apply_and_bridge(
    graph: &mut CollapsedGraph,
    modification: Modification,
    max_walk: usize,
) -> Result<Option<RangeInclusive<usize>>> {
    let Some(touched) = modification.apply(graph)? else {
        return Ok(None);
    };
    let closed = bridge_range(graph, touched, max_walk);
    DottedEdgeSynthesizer::update(graph, closed.clone())?;
    Ok(Some(closed))
}
