//! Collapsible fragment search and branch reachability.
//!
//! The finder works on any [`Adjacency`]: the backing graph when seeding a
//! view, or a compiled view when a user collapses what is on screen. A
//! caller-supplied predicate marks **pinned** nodes, which are never
//! absorbed into a fragment but may bound one.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use tracing::trace;

use crate::config::EngineConfig;
use crate::graph::{Adjacency, BackingGraph, Direction, NodeId};
use crate::visibility::VisibilityMap;

/// A run of nodes that can be collapsed as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Upper boundary, if one was found.
    pub up: Option<usize>,
    /// Lower boundary, if one was found.
    pub down: Option<usize>,
    /// Nodes strictly between the boundaries.
    pub interior: BTreeSet<usize>,
}

impl Fragment {
    /// Both boundaries, when the fragment is closed on both sides.
    #[must_use]
    pub fn boundaries(&self) -> Option<(usize, usize)> {
        Some((self.up?, self.down?))
    }
}

/// Nodes reachable downwards from `heads`, or every node when `heads` is
/// `None`. Unknown ids are ignored.
#[must_use]
pub fn reachable_from<G: BackingGraph + ?Sized>(graph: &G, heads: Option<&[NodeId]>) -> VisibilityMap {
    let Some(heads) = heads else {
        return VisibilityMap::all_of(graph);
    };
    let mut reached = VisibilityMap::new();
    let mut stack: Vec<usize> = heads.iter().filter_map(|&id| graph.index_of(id)).collect();
    while let Some(index) = stack.pop() {
        let id = graph.id_of(index);
        if reached.get(id) {
            continue;
        }
        reached.set(id, true);
        stack.extend(graph.adjacent(index, Direction::Down));
    }
    reached
}

/// Fragment search over one graph.
pub struct FragmentFinder<'a, G: ?Sized> {
    graph: &'a G,
    pinned: Box<dyn Fn(usize) -> bool + 'a>,
    short_fragment_max_size: usize,
    max_linear_steps: usize,
}

impl<G: ?Sized> fmt::Debug for FragmentFinder<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentFinder")
            .field("short_fragment_max_size", &self.short_fragment_max_size)
            .field("max_linear_steps", &self.max_linear_steps)
            .finish_non_exhaustive()
    }
}

impl<'a, G: Adjacency + ?Sized> FragmentFinder<'a, G> {
    pub fn new(graph: &'a G, pinned: impl Fn(usize) -> bool + 'a) -> Self {
        let defaults = EngineConfig::default();
        Self {
            graph,
            pinned: Box::new(pinned),
            short_fragment_max_size: defaults.short_fragment_max_size,
            max_linear_steps: defaults.max_linear_steps,
        }
    }

    /// Take fragment size limits from `config`.
    #[must_use]
    pub const fn with_config(mut self, config: &EngineConfig) -> Self {
        self.short_fragment_max_size = config.short_fragment_max_size;
        self.max_linear_steps = config.max_linear_steps;
        self
    }

    fn is_pinned(&self, index: usize) -> bool {
        (self.pinned)(index)
    }

    /// Nodes on some path from `up` down to `down`. With `strict` the two
    /// boundaries themselves are left out.
    #[must_use]
    pub fn middle_nodes(&self, up: usize, down: usize, strict: bool) -> BTreeSet<usize> {
        if up > down || down >= self.graph.node_count() {
            return BTreeSet::new();
        }
        let below_up = self.bounded_walk(up, Direction::Down, |i| i <= down);
        let above_down = self.bounded_walk(down, Direction::Up, |i| i >= up);
        let mut middle: BTreeSet<usize> = below_up.intersection(&above_down).copied().collect();
        if strict {
            middle.remove(&up);
            middle.remove(&down);
        }
        middle
    }

    fn bounded_walk(&self, start: usize, direction: Direction, keep: impl Fn(usize) -> bool) -> HashSet<usize> {
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            for next in self.graph.adjacent(index, direction) {
                if keep(next) && seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    /// The pinned node nearest to `start` in `direction`, looking at no more
    /// than `max_walk` nodes. `start` itself is not considered.
    #[must_use]
    pub fn nearest_pinned_node(&self, start: usize, max_walk: usize, direction: Direction) -> Option<usize> {
        let mut frontier: BTreeSet<usize> = self.graph.adjacent(start, direction).into_iter().collect();
        let mut seen: HashSet<usize> = frontier.iter().copied().collect();
        let mut steps = 0;
        loop {
            let next = match direction {
                Direction::Up => frontier.pop_last(),
                Direction::Down => frontier.pop_first(),
            }?;
            if self.is_pinned(next) {
                return Some(next);
            }
            steps += 1;
            if steps >= max_walk {
                trace!(start, max_walk, "pinned search exhausted");
                return None;
            }
            for neighbour in self.graph.adjacent(next, direction) {
                if seen.insert(neighbour) {
                    frontier.insert(neighbour);
                }
            }
        }
    }

    /// Pinned boundaries around `start` and the nodes between them.
    ///
    /// A side without a pinned node within `max_walk` is left open; the
    /// interior then extends as far as the walk from the other boundary (or
    /// from `start`) reaches without crossing a pinned node.
    #[must_use]
    pub fn collapsible_fragment_around(&self, start: usize, max_walk: usize) -> Fragment {
        let up = self.nearest_pinned_node(start, max_walk, Direction::Up);
        let down = self.nearest_pinned_node(start, max_walk, Direction::Down);

        let interior = match (up, down) {
            (Some(up), Some(down)) => self.middle_nodes(up, down, true),
            (Some(up), None) => self.unpinned_walk(up, Direction::Down, max_walk),
            (None, Some(down)) => self.unpinned_walk(down, Direction::Up, max_walk),
            (None, None) => {
                let mut nodes = self.unpinned_walk(start, Direction::Up, max_walk);
                nodes.extend(self.unpinned_walk(start, Direction::Down, max_walk));
                if !self.is_pinned(start) {
                    nodes.insert(start);
                }
                nodes
            }
        };
        Fragment { up, down, interior }
    }

    /// Nodes reached from `start` without entering a pinned node, at most
    /// `max_walk` of them. `start` is not included.
    fn unpinned_walk(&self, start: usize, direction: Direction, max_walk: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(index) = stack.pop() {
            for next in self.graph.adjacent(index, direction) {
                if reached.len() >= max_walk {
                    return reached;
                }
                if next != start && !self.is_pinned(next) && reached.insert(next) {
                    stack.push(next);
                }
            }
        }
        reached
    }

    /// Smallest fragment that opens at `start` and closes again in
    /// `direction`, or `None` if it does not close within the size cap.
    ///
    /// Nodes are absorbed ("blackened") once all their neighbours on the
    /// `start` side are black; candidates wait in the gray set. The fragment
    /// closes when a single gray node remains and can be absorbed.
    #[must_use]
    pub fn short_fragment(&self, start: usize, direction: Direction) -> Option<Fragment> {
        let back = direction.reversed();
        let mut black = BTreeSet::from([start]);
        let mut gray: BTreeSet<usize> = self.graph.adjacent(start, direction).into_iter().collect();

        while black.len() <= self.short_fragment_max_size {
            let next = gray
                .iter()
                .copied()
                .find(|&g| self.graph.adjacent(g, back).iter().all(|n| black.contains(n)))?;
            if gray.len() == 1 {
                black.remove(&start);
                let (up, down) = match direction {
                    Direction::Down => (start, next),
                    Direction::Up => (next, start),
                };
                return Some(Fragment {
                    up: Some(up),
                    down: Some(down),
                    interior: black,
                });
            }
            if self.is_pinned(next) {
                return None;
            }
            gray.remove(&next);
            gray.extend(self.graph.adjacent(next, direction));
            black.insert(next);
        }
        None
    }

    /// Chain short fragments from `start` in `direction` while each closing
    /// node is unpinned, up to the configured number of steps.
    ///
    /// Returns `None` when the first step does not close or when the chain
    /// has no interior node. When the step cap runs out first, the chain
    /// built so far is returned, closed at the last node reached.
    #[must_use]
    pub fn maximal_linear_fragment(&self, start: usize, direction: Direction) -> Option<Fragment> {
        let mut end = start;
        let mut interior = BTreeSet::new();
        for step in 0..self.max_linear_steps {
            let Some(next) = self.short_fragment(end, direction) else {
                if step == 0 {
                    return None;
                }
                break;
            };
            let (up, down) = next.boundaries()?;
            let closing = if direction == Direction::Down { down } else { up };
            if step > 0 {
                interior.insert(end);
            }
            interior.extend(next.interior);
            end = closing;
            if self.is_pinned(end) {
                break;
            }
        }
        if interior.is_empty() {
            return None;
        }
        let (up, down) = match direction {
            Direction::Down => (start, end),
            Direction::Up => (end, start),
        };
        Some(Fragment {
            up: Some(up),
            down: Some(down),
            interior,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::StaticGraph;

    fn graph(n: usize, edges: &[(usize, usize)]) -> StaticGraph {
        StaticGraph::from_edges(n, edges).expect("valid graph")
    }

    fn chain(n: usize) -> StaticGraph {
        let edges: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        graph(n, &edges)
    }

    #[test]
    fn reachable_from_heads() {
        // 0 -> 2, 1 -> 3, 2 -> 3
        let g = graph(4, &[(0, 2), (1, 3), (2, 3)]);
        let reached = reachable_from(&g, Some(&[NodeId(1)][..]));
        assert_eq!(reached.iter().collect::<Vec<_>>(), vec![NodeId(1), NodeId(3)]);

        let all = reachable_from(&g, None);
        assert_eq!(all.count(), 4);

        let none = reachable_from(&g, Some(&[NodeId(99)][..]));
        assert!(none.is_empty());
    }

    #[test]
    fn middle_nodes_of_a_diamond() {
        // 0 -> 1 -> 3, 0 -> 2 -> 3, 3 -> 4, plus a side branch 1 -> 5
        let g = graph(6, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4), (1, 5)]);
        let finder = FragmentFinder::new(&g, |_| false);
        assert_eq!(finder.middle_nodes(0, 3, true), BTreeSet::from([1, 2]));
        assert_eq!(finder.middle_nodes(0, 3, false), BTreeSet::from([0, 1, 2, 3]));
        assert!(finder.middle_nodes(3, 0, true).is_empty());
    }

    #[test]
    fn nearest_pinned_respects_budget() {
        let g = chain(10);
        let pinned = [0, 9];
        let finder = FragmentFinder::new(&g, |i| pinned.contains(&i));
        assert_eq!(finder.nearest_pinned_node(4, 100, Direction::Down), Some(9));
        assert_eq!(finder.nearest_pinned_node(4, 100, Direction::Up), Some(0));
        assert_eq!(finder.nearest_pinned_node(4, 2, Direction::Down), None);
        assert_eq!(finder.nearest_pinned_node(9, 100, Direction::Down), None);
    }

    #[test]
    fn nearest_pinned_prefers_closer_index() {
        // 0 -> 1 -> 3 and 0 -> 2 -> 3; 2 and 3 pinned.
        let g = graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let finder = FragmentFinder::new(&g, |i| i >= 2);
        assert_eq!(finder.nearest_pinned_node(0, 10, Direction::Down), Some(2));
    }

    #[test]
    fn fragment_around_pinned_boundaries() {
        let g = chain(8);
        let finder = FragmentFinder::new(&g, |i| i == 1 || i == 6);
        let fragment = finder.collapsible_fragment_around(3, 100);
        assert_eq!(fragment.boundaries(), Some((1, 6)));
        assert_eq!(fragment.interior, BTreeSet::from([2, 3, 4, 5]));
    }

    #[test]
    fn fragment_around_with_open_side() {
        let g = chain(5);
        let finder = FragmentFinder::new(&g, |i| i == 1);
        let fragment = finder.collapsible_fragment_around(3, 100);
        assert_eq!(fragment.up, Some(1));
        assert_eq!(fragment.down, None);
        assert_eq!(fragment.interior, BTreeSet::from([2, 3, 4]));
    }

    #[test]
    fn short_fragment_closes_a_diamond() {
        let g = graph(5, &[(0, 1), (0, 2), (1, 3), (2, 3), (3, 4)]);
        let finder = FragmentFinder::new(&g, |_| false);
        let fragment = finder.short_fragment(0, Direction::Down).expect("closes");
        assert_eq!(fragment.boundaries(), Some((0, 3)));
        assert_eq!(fragment.interior, BTreeSet::from([1, 2]));

        let upward = finder.short_fragment(3, Direction::Up).expect("closes");
        assert_eq!(upward.boundaries(), Some((0, 3)));
        assert_eq!(upward.interior, BTreeSet::from([1, 2]));
    }

    #[test]
    fn short_fragment_rejects_open_branches() {
        // 1 has a second parent outside the fragment, so 0's branches never
        // rejoin.
        let g = graph(4, &[(0, 2), (0, 3), (1, 2)]);
        let finder = FragmentFinder::new(&g, |_| false);
        assert_eq!(finder.short_fragment(0, Direction::Down), None);
    }

    #[test]
    fn short_fragment_respects_size_cap() {
        // 0 fans out to 1..=12, which all merge into 13.
        let mut edges: Vec<(usize, usize)> = (1..=12).map(|i| (0, i)).collect();
        edges.extend((1..=12).map(|i| (i, 13)));
        let g = graph(14, &edges);
        let finder = FragmentFinder::new(&g, |_| false);
        assert_eq!(finder.short_fragment(0, Direction::Down), None);

        let roomy = EngineConfig {
            short_fragment_max_size: 20,
            ..EngineConfig::default()
        };
        let finder = FragmentFinder::new(&g, |_| false).with_config(&roomy);
        assert!(finder.short_fragment(0, Direction::Down).is_some());
    }

    #[test]
    fn linear_fragment_stops_at_pinned_node() {
        let g = chain(8);
        let finder = FragmentFinder::new(&g, |i| i == 5);
        let fragment = finder
            .maximal_linear_fragment(1, Direction::Down)
            .expect("fragment");
        assert_eq!(fragment.boundaries(), Some((1, 5)));
        assert_eq!(fragment.interior, BTreeSet::from([2, 3, 4]));

        let upward = finder
            .maximal_linear_fragment(4, Direction::Up)
            .expect("fragment");
        assert_eq!(upward.boundaries(), Some((0, 4)));
    }

    #[test]
    fn linear_fragment_is_cut_at_the_step_cap() {
        let g = chain(30);
        let finder = FragmentFinder::new(&g, |_| false);
        let fragment = finder
            .maximal_linear_fragment(0, Direction::Down)
            .expect("partial chain");
        assert_eq!(fragment.boundaries(), Some((0, 10)));
        assert_eq!(fragment.interior, (1..10).collect::<BTreeSet<_>>());

        let short = EngineConfig {
            max_linear_steps: 3,
            ..EngineConfig::default()
        };
        let finder = FragmentFinder::new(&g, |_| false).with_config(&short);
        let fragment = finder
            .maximal_linear_fragment(29, Direction::Up)
            .expect("partial chain");
        assert_eq!(fragment.boundaries(), Some((26, 29)));
    }

    #[test]
    fn linear_fragment_needs_an_interior() {
        let g = chain(3);
        let finder = FragmentFinder::new(&g, |i| i == 1);
        assert_eq!(finder.maximal_linear_fragment(0, Direction::Down), None);
        let leaf = graph(2, &[]);
        let finder = FragmentFinder::new(&leaf, |_| false);
        assert_eq!(finder.maximal_linear_fragment(0, Direction::Down), None);
    }
}
