//! Compact multimap of synthesized edges keyed by [`NodeId`].
//!
//! # Encoding
//!
//! Each stored edge is a single `u64` word:
//!
//! ```text
//!  63          34 33  32 31                    0
//! +--------------+------+-----------------------+
//! |   reserved   | kind |   target node id      |
//! +--------------+------+-----------------------+
//! ```
//!
//! The target field holds [`NO_TARGET`] for dangling arrows. Packed words
//! never leave this module: callers see `(Option<NodeId>, EdgeKind)`.
//!
//! Two-endpoint kinds are written at both endpoints on creation and erased
//! from both on removal, so either side can enumerate the edge without a
//! secondary index. Arrows live only at the node owning the dangling end.

use std::collections::HashMap;

use crate::graph::{EdgeKind, NodeId};

/// Target id marking "no far endpoint". Never a valid [`NodeId`].
pub const NO_TARGET: u32 = u32::MAX;

const KIND_SHIFT: u32 = 32;
const KIND_MASK: u64 = 0b11;
const TARGET_MASK: u64 = 0xFFFF_FFFF;

const fn kind_tag(kind: EdgeKind) -> u64 {
    match kind {
        EdgeKind::Normal => 0,
        EdgeKind::Dotted => 1,
        EdgeKind::DottedArrowUp => 2,
        EdgeKind::DottedArrowDown => 3,
    }
}

fn encode(target: Option<NodeId>, kind: EdgeKind) -> u64 {
    let target = target.map_or(NO_TARGET, |id| id.0);
    (kind_tag(kind) << KIND_SHIFT) | (u64::from(target) & TARGET_MASK)
}

fn decode(word: u64) -> (Option<NodeId>, EdgeKind) {
    let kind = match (word >> KIND_SHIFT) & KIND_MASK {
        0 => EdgeKind::Normal,
        1 => EdgeKind::Dotted,
        2 => EdgeKind::DottedArrowUp,
        _ => EdgeKind::DottedArrowDown,
    };
    // Masked to 32 bits above.
    #[allow(clippy::cast_possible_truncation)]
    let target = (word & TARGET_MASK) as u32;
    let target = (target != NO_TARGET).then_some(NodeId(target));
    (target, kind)
}

/// Synthesized edges keyed by the stable id of the owning node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeStore {
    edges: HashMap<NodeId, Vec<u64>>,
}

impl EdgeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an edge owned by `owner`.
    ///
    /// Two-endpoint kinds need `target` and are written at both ends.
    /// Arrow kinds ignore `target` and store the sentinel. Returns `false`
    /// when the edge was already present (creation is idempotent).
    pub fn create(&mut self, owner: NodeId, target: Option<NodeId>, kind: EdgeKind) -> bool {
        if kind.is_arrow() {
            return self.insert_word(owner, encode(None, kind));
        }
        let Some(target) = target else {
            debug_assert!(false, "{kind:?} edge at {owner} needs a target");
            return false;
        };
        let inserted = self.insert_word(owner, encode(Some(target), kind));
        self.insert_word(target, encode(Some(owner), kind));
        inserted
    }

    /// Erase an edge from every endpoint that holds it. Returns `false` if
    /// it was not stored.
    pub fn remove(&mut self, owner: NodeId, target: Option<NodeId>, kind: EdgeKind) -> bool {
        if kind.is_arrow() {
            return self.remove_word(owner, encode(None, kind));
        }
        let Some(target) = target else {
            return false;
        };
        let removed = self.remove_word(owner, encode(Some(target), kind));
        self.remove_word(target, encode(Some(owner), kind));
        removed
    }

    /// Edges stored at `owner`, decoded.
    pub fn edges(&self, owner: NodeId) -> impl Iterator<Item = (Option<NodeId>, EdgeKind)> + '_ {
        self.edges
            .get(&owner)
            .into_iter()
            .flat_map(|words| words.iter().copied().map(decode))
    }

    /// Whether a two-endpoint edge of any kind joins `a` and `b`.
    #[must_use]
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges(a)
            .any(|(target, kind)| kind.is_normal() && target == Some(b))
    }

    /// Drop every stored edge.
    pub fn clear(&mut self) {
        self.edges.clear();
    }

    /// Number of logical edges (a two-endpoint edge counts once).
    #[must_use]
    pub fn edge_count(&self) -> usize {
        let (normal_words, arrows) = self
            .edges
            .values()
            .flatten()
            .map(|&word| decode(word).1)
            .fold((0, 0), |(normal, arrow), kind| {
                if kind.is_arrow() {
                    (normal, arrow + 1)
                } else {
                    (normal + 1, arrow)
                }
            });
        normal_words / 2 + arrows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Ids that currently own at least one edge.
    pub fn owners(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.keys().copied()
    }

    fn insert_word(&mut self, owner: NodeId, word: u64) -> bool {
        let words = self.edges.entry(owner).or_default();
        if words.contains(&word) {
            return false;
        }
        words.push(word);
        true
    }

    fn remove_word(&mut self, owner: NodeId, word: u64) -> bool {
        let Some(words) = self.edges.get_mut(&owner) else {
            return false;
        };
        let Some(position) = words.iter().position(|&w| w == word) else {
            return false;
        };
        words.swap_remove(position);
        if words.is_empty() {
            self.edges.remove(&owner);
        }
        true
    }
}
