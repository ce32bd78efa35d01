// twin-fabric-core/src/context.rs
// ============================================================================
// Module: Twin Call Context
// Description: Per-call handle granting twins clock reads, RNG draws, and
//              deferred scheduling.
// Purpose: Keep twins free of direct bus or RNG ownership.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Twins never hold the bus or the session RNG. Each call or delivery gets a
//! [`TwinContext`] carrying the frozen logical time, a borrow of the session
//! RNG, and a buffer of schedule requests the router applies to the bus after
//! the handler returns. Deferring the schedule writes is what lets the bus
//! snapshot-drain without reentrancy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::rng::DeterministicRng;

// ============================================================================
// SECTION: Schedule Request
// ============================================================================

/// A deferred `schedule` call produced by a twin handler.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    /// Delay relative to the clock at apply time.
    pub dt_ms: u64,
    /// Delivery target twin.
    pub target: String,
    /// Delivery payload.
    pub payload: Value,
}

// ============================================================================
// SECTION: Twin Context
// ============================================================================

/// Per-call capability handle passed into twin handlers.
#[derive(Debug)]
pub struct TwinContext<'a> {
    /// Logical time at which the call executes.
    pub now_ms: u64,
    /// Borrow of the session RNG.
    rng: &'a mut DeterministicRng,
    /// Deferred schedule requests.
    scheduled: Vec<ScheduleRequest>,
}

impl<'a> TwinContext<'a> {
    /// Creates a context for one handler invocation.
    #[must_use]
    pub fn new(now_ms: u64, rng: &'a mut DeterministicRng) -> Self {
        Self {
            now_ms,
            rng,
            scheduled: Vec::new(),
        }
    }

    /// Queues a bus schedule to be applied after the handler returns.
    pub fn schedule(&mut self, dt_ms: u64, target: impl Into<String>, payload: Value) {
        self.scheduled.push(ScheduleRequest {
            dt_ms,
            target: target.into(),
            payload,
        });
    }

    /// Draws a float uniformly from `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.rng.next_f64()
    }

    /// Draws an integer uniformly from `[lo, hi]` inclusive.
    pub fn range_u64(&mut self, lo: u64, hi: u64) -> u64 {
        self.rng.range_u64(lo, hi)
    }

    /// Takes the deferred schedule requests, leaving the buffer empty.
    pub fn take_scheduled(&mut self) -> Vec<ScheduleRequest> {
        std::mem::take(&mut self.scheduled)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
