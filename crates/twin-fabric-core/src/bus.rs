// twin-fabric-core/src/bus.rs
// ============================================================================
// Module: Event Bus & Logical Clock
// Description: Monotonic logical time with priority-ordered deliveries.
// Purpose: Provide the single deterministic time source for a session.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The bus holds a min-heap of scheduled events ordered by `(time_ms, seq)`,
//! where `seq` is a bus-global counter that preserves insertion order among
//! equal-time schedules. The clock only moves through [`EventBus::advance`];
//! there is no wall-clock anywhere in the fabric.
//!
//! Delivery is snapshot-drained: `advance` collects every event due at the
//! new clock before the caller dispatches any of them, so an event scheduled
//! while a batch is delivering always waits for the next advance. This keeps
//! step semantics total and rules out unbounded same-tick recursion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::collections::BinaryHeap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Event
// ============================================================================

/// A scheduled delivery to a twin target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Logical delivery time in milliseconds.
    pub time_ms: u64,
    /// Bus-global insertion counter; ties among equal times keep this order.
    pub seq: u64,
    /// Delivery target (a twin name, e.g. `mail`).
    pub target: String,
    /// Delivery payload handed to the twin.
    pub payload: Value,
}

/// Heap entry ordered by `(time_ms, seq)` only.
#[derive(Debug, Clone)]
struct QueuedEvent(Event);

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.0.time_ms == other.0.time_ms && self.0.seq == other.0.seq
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.0.time_ms, self.0.seq).cmp(&(other.0.time_ms, other.0.seq))
    }
}

// ============================================================================
// SECTION: Pending Summary
// ============================================================================

/// Per-target queue depth snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSummary {
    /// Queued event counts grouped by target.
    pub by_target: BTreeMap<String, u64>,
    /// Total queued events.
    pub total: u64,
}

impl PendingSummary {
    /// Renders the summary as the wire payload: per-target counts plus a
    /// `total` key.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut out = serde_json::Map::new();
        for (target, count) in &self.by_target {
            out.insert(target.clone(), json!(count));
        }
        out.insert("total".to_string(), json!(self.total));
        Value::Object(out)
    }

    /// Returns the queued count for one target.
    #[must_use]
    pub fn count_for(&self, target: &str) -> u64 {
        self.by_target.get(target).copied().unwrap_or(0)
    }
}

// ============================================================================
// SECTION: Event Bus
// ============================================================================

/// Single-threaded cooperative event bus and logical clock.
#[derive(Debug, Default)]
pub struct EventBus {
    /// Current logical time in milliseconds.
    clock_ms: u64,
    /// Next insertion counter value.
    next_seq: u64,
    /// Min-heap of queued events.
    queue: BinaryHeap<Reverse<QueuedEvent>>,
}

impl EventBus {
    /// Creates a bus with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time in milliseconds.
    #[must_use]
    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Schedules a delivery `dt_ms` ahead of the current clock and returns
    /// the assigned sequence number.
    pub fn schedule(&mut self, dt_ms: u64, target: impl Into<String>, payload: Value) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(QueuedEvent(Event {
            time_ms: self.clock_ms.saturating_add(dt_ms),
            seq,
            target: target.into(),
            payload,
        })));
        seq
    }

    /// Advances the clock by `dt_ms` and drains every event that was already
    /// queued and is due at the new clock, in `(time_ms, seq)` order.
    pub fn advance(&mut self, dt_ms: u64) -> Vec<Event> {
        self.clock_ms = self.clock_ms.saturating_add(dt_ms);
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.queue.peek() {
            if head.0.time_ms > self.clock_ms {
                break;
            }
            if let Some(Reverse(queued)) = self.queue.pop() {
                due.push(queued.0);
            }
        }
        due
    }

    /// Reports queue depth per target without advancing the clock.
    #[must_use]
    pub fn pending(&self) -> PendingSummary {
        let mut summary = PendingSummary::default();
        for Reverse(queued) in &self.queue {
            *summary.by_target.entry(queued.0.target.clone()).or_insert(0) += 1;
            summary.total += 1;
        }
        summary
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
