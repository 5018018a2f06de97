use serde::{Deserialize, Serialize};

/// Small seeded generator driving every random choice of a simulation.
///
/// A 64-bit LCG: reproducible across platforms and runs, which is all a
/// replayable seed needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    #[must_use]
    pub const fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        // High bits of an LCG are the well-mixed ones.
        self.state ^ (self.state >> 29)
    }

    /// Uniform-ish index in `0..len`; `0` when `len` is zero.
    #[must_use]
    pub fn next_index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let len = u64::try_from(len).unwrap_or(u64::MAX);
        usize::try_from(self.next_u64() % len).unwrap_or(0)
    }

    /// True with probability `percent` / 100.
    #[must_use]
    pub fn chance(&mut self, percent: u8) -> bool {
        match percent {
            0 => false,
            100.. => true,
            _ => self.next_u64() % 100 < u64::from(percent),
        }
    }
}
