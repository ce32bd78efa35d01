// twin-fabric-core/src/rng.rs
// ============================================================================
// Module: Deterministic RNG
// Description: Seeded random source shared by the router, twins, and corpus.
// Purpose: Keep every random draw reproducible from the session seed.
// Dependencies: rand
// ============================================================================

//! ## Overview
//! All randomness in the fabric flows through [`DeterministicRng`]: latency
//! jitter, fault sampling, vendor reply timing, and corpus synthesis. The
//! router owns one instance per session; twins only see it through the call
//! context, which keeps draw order (and therefore traces) reproducible.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

// ============================================================================
// SECTION: Deterministic RNG
// ============================================================================

/// Seeded random source with a draw surface tailored to fabric needs.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    /// Underlying seeded generator.
    inner: StdRng,
}

impl DeterministicRng {
    /// Creates a generator from a session seed.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Draws a float uniformly from `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.inner.gen_range(0.0..1.0)
    }

    /// Draws an integer uniformly from `[lo, hi]` inclusive.
    ///
    /// Returns `lo` when the range is empty.
    pub fn range_u64(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Draws a signed integer uniformly from `[lo, hi]` inclusive.
    pub fn range_i64(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Picks one element of the slice, or `None` when it is empty.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut self.inner)
    }

    /// Samples `count` distinct elements, clamped to the slice length.
    pub fn sample<'a, T>(&mut self, items: &'a [T], count: usize) -> Vec<&'a T> {
        let count = count.min(items.len());
        items.choose_multiple(&mut self.inner, count).collect()
    }

    /// Draws a sub-seed for a derived generator (corpus environments and
    /// scenarios each get independent streams).
    pub fn sub_seed(&mut self) -> u64 {
        self.inner.gen_range(1..=10_000_000)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
