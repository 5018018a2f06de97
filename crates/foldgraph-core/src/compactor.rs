//! Order-preserving map between compiled indices and backing indices.
//!
//! # Layout
//!
//! Backing indices are split into blocks of `block_size`. For every block
//! the compactor keeps the running count of visible nodes up to and
//! including that block. A lookup finds the block by binary search over
//! the running counts and scans at most one block, so both directions cost
//! O(log(N / block_size) + block_size).
//!
//! # Incremental update
//!
//! [`IndexCompactor::update`] recounts only the blocks overlapping the
//! touched range and shifts the running counts of later blocks by the net
//! difference, so a modification touching a few nodes never rescans the
//! whole graph.
//!
//! The compactor does not own visibility. Every call takes the predicate
//! `is_visible(backing_index)`; callers must pass the same predicate the
//! counts were last computed with, outside the range being updated.

use std::ops::RangeInclusive;

/// Default block width.
pub const DEFAULT_BLOCK_SIZE: usize = 30;

/// Compiled index (`0..M`, visible nodes only) to backing index (`0..N`)
/// bijection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCompactor {
    len: usize,
    block_size: usize,
    running: Vec<usize>,
}

impl IndexCompactor {
    /// Count every block of a graph with `len` backing nodes.
    pub fn new(len: usize, block_size: usize, is_visible: impl Fn(usize) -> bool) -> Self {
        let block_size = block_size.max(1);
        let blocks = len.div_ceil(block_size);
        let mut compactor = Self {
            len,
            block_size,
            running: vec![0; blocks],
        };
        let mut total = 0;
        for block in 0..blocks {
            total += compactor.count_block(block, &is_visible);
            compactor.running[block] = total;
        }
        compactor
    }

    /// Number of backing nodes.
    #[must_use]
    pub const fn backing_len(&self) -> usize {
        self.len
    }

    /// Number of visible nodes, i.e. the compiled node count.
    #[must_use]
    pub fn compiled_len(&self) -> usize {
        self.running.last().copied().unwrap_or(0)
    }

    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Compiled index of a visible backing node; `None` when hidden or out
    /// of range.
    pub fn to_compiled(&self, backing: usize, is_visible: impl Fn(usize) -> bool) -> Option<usize> {
        if backing >= self.len || !is_visible(backing) {
            return None;
        }
        let block = backing / self.block_size;
        let before = (block * self.block_size..backing)
            .filter(|&i| is_visible(i))
            .count();
        Some(self.count_before(block) + before)
    }

    /// Backing index of the `compiled`-th visible node.
    pub fn to_backing(&self, compiled: usize, is_visible: impl Fn(usize) -> bool) -> Option<usize> {
        if compiled >= self.compiled_len() {
            return None;
        }
        let block = self.running.partition_point(|&count| count <= compiled);
        let mut seen = self.count_before(block);
        for index in self.block_span(block) {
            if is_visible(index) {
                if seen == compiled {
                    return Some(index);
                }
                seen += 1;
            }
        }
        None
    }

    /// Recount the blocks overlapping `touched` after visibility changed
    /// inside it. Indices past the end of the graph are ignored.
    pub fn update(&mut self, touched: RangeInclusive<usize>, is_visible: impl Fn(usize) -> bool) {
        if self.len == 0 || touched.is_empty() || *touched.start() >= self.len {
            return;
        }
        let first = *touched.start() / self.block_size;
        let last = (*touched.end()).min(self.len - 1) / self.block_size;

        let old_last = self.running[last];
        let mut total = self.count_before(first);
        for block in first..=last {
            total += self.count_block(block, &is_visible);
            self.running[block] = total;
        }

        if total >= old_last {
            let delta = total - old_last;
            for count in &mut self.running[last + 1..] {
                *count += delta;
            }
        } else {
            let delta = old_last - total;
            for count in &mut self.running[last + 1..] {
                *count -= delta;
            }
        }
    }

    fn count_before(&self, block: usize) -> usize {
        if block == 0 { 0 } else { self.running[block - 1] }
    }

    fn block_span(&self, block: usize) -> std::ops::Range<usize> {
        let start = block * self.block_size;
        start..(start + self.block_size).min(self.len)
    }

    fn count_block(&self, block: usize, is_visible: &impl Fn(usize) -> bool) -> usize {
        self.block_span(block).filter(|&i| is_visible(i)).count()
    }
}
