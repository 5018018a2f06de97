//! Sparse visibility set keyed by [`NodeId`].
//!
//! Ids are grouped into fixed-width pages backed by [`FixedBitSet`]. A page
//! exists only while at least one of its ids is visible, so a mostly-hidden
//! view of a huge history costs memory proportional to what is shown.

use std::collections::BTreeMap;
use std::ops::Range;

use fixedbitset::FixedBitSet;

use crate::graph::{BackingGraph, NodeId};

const PAGE_BITS: u32 = 4096;

/// Which node ids are currently visible. Absent means hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityMap {
    pages: BTreeMap<u32, FixedBitSet>,
}

const fn split(id: NodeId) -> (u32, usize) {
    (id.0 / PAGE_BITS, (id.0 % PAGE_BITS) as usize)
}

impl VisibilityMap {
    /// An empty map: every id hidden.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every node of `graph` visible.
    #[must_use]
    pub fn all_of<G: BackingGraph + ?Sized>(graph: &G) -> Self {
        (0..graph.node_count()).map(|i| graph.id_of(i)).collect()
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> bool {
        let (page, bit) = split(id);
        self.pages.get(&page).is_some_and(|bits| bits.contains(bit))
    }

    pub fn set(&mut self, id: NodeId, visible: bool) {
        let (page, bit) = split(id);
        if visible {
            self.pages
                .entry(page)
                .or_insert_with(|| FixedBitSet::with_capacity(PAGE_BITS as usize))
                .insert(bit);
        } else if let Some(bits) = self.pages.get_mut(&page) {
            bits.set(bit, false);
            if bits.count_ones(..) == 0 {
                self.pages.remove(&page);
            }
        }
    }

    /// Set every id in `ids` to `visible`.
    pub fn fill(&mut self, ids: Range<u32>, visible: bool) {
        if ids.is_empty() {
            return;
        }
        let first_page = ids.start / PAGE_BITS;
        let last_page = (ids.end - 1) / PAGE_BITS;
        for page in first_page..=last_page {
            let page_start = page * PAGE_BITS;
            let lo = ids.start.max(page_start) - page_start;
            let hi = ids.end.min(page_start.saturating_add(PAGE_BITS)) - page_start;
            let span = lo as usize..hi as usize;

            if visible {
                self.pages
                    .entry(page)
                    .or_insert_with(|| FixedBitSet::with_capacity(PAGE_BITS as usize))
                    .set_range(span, true);
            } else if let Some(bits) = self.pages.get_mut(&page) {
                bits.set_range(span, false);
                if bits.count_ones(..) == 0 {
                    self.pages.remove(&page);
                }
            }
        }
    }

    /// Number of visible ids.
    #[must_use]
    pub fn count(&self) -> usize {
        self.pages.values().map(|bits| bits.count_ones(..)).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Visible ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pages.iter().flat_map(|(&page, bits)| {
            bits.ones().map(move |bit| {
                // `bit < PAGE_BITS`, so the cast is lossless.
                #[allow(clippy::cast_possible_truncation)]
                let bit = bit as u32;
                NodeId(page * PAGE_BITS + bit)
            })
        })
    }
}

impl FromIterator<NodeId> for VisibilityMap {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        let mut map = Self::new();
        for id in iter {
            map.set(id, true);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_ids_are_hidden() {
        let map = VisibilityMap::new();
        assert!(!map.get(NodeId(0)));
        assert!(!map.get(NodeId(u32::MAX - 1)));
        assert!(map.is_empty());
    }

    #[test]
    fn set_and_clear_drop_empty_pages() {
        let mut map = VisibilityMap::new();
        map.set(NodeId(5), true);
        map.set(NodeId(1_000_000), true);
        assert!(map.get(NodeId(5)));
        assert!(map.get(NodeId(1_000_000)));
        assert_eq!(map.count(), 2);

        map.set(NodeId(1_000_000), false);
        map.set(NodeId(5), false);
        assert!(map.is_empty());
        assert_eq!(map, VisibilityMap::new());
    }

    #[test]
    fn fill_spans_pages() {
        let mut map = VisibilityMap::new();
        map.fill(4000..9000, true);
        assert_eq!(map.count(), 5000);
        assert!(map.get(NodeId(4000)));
        assert!(map.get(NodeId(8999)));
        assert!(!map.get(NodeId(9000)));
        assert!(!map.get(NodeId(3999)));

        map.fill(4096..8192, false);
        assert_eq!(map.count(), 5000 - 4096);
        assert!(!map.get(NodeId(5000)));
    }

    #[test]
    fn fill_empty_range_is_noop() {
        let mut map = VisibilityMap::new();
        map.fill(10..10, true);
        assert!(map.is_empty());
    }

    #[test]
    fn iter_is_ascending() {
        let map: VisibilityMap = [NodeId(9000), NodeId(3), NodeId(70)].into_iter().collect();
        let ids: Vec<u32> = map.iter().map(|id| id.0).collect();
        assert_eq!(ids, vec![3, 70, 9000]);
    }
}
