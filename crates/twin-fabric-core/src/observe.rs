// twin-fabric-core/src/observe.rs
// ============================================================================
// Module: Observation Types
// Description: Observation snapshot and action-menu entries.
// Purpose: Give agents a deterministic, compact view of the session.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An observation is the router's answer to "what can I do right now": the
//! logical time, a focus label, a one-line summary, a deterministic action
//! menu composed from per-twin suggestions, and pending event counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Menu Entry
// ============================================================================

/// One suggested action in the observation menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    /// Tool to invoke.
    pub tool: String,
    /// Suggested arguments.
    #[serde(default)]
    pub args: Value,
    /// Short human hint, when one helps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl MenuEntry {
    /// Creates an entry with arguments.
    #[must_use]
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
            hint: None,
        }
    }

    /// Attaches a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// SECTION: Observation
// ============================================================================

/// Snapshot returned by `observe`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    /// Logical time of the snapshot.
    pub time_ms: u64,
    /// Focus label (twin family).
    pub focus: String,
    /// One-line summary of visible state.
    pub summary: String,
    /// Deterministically ordered action suggestions.
    pub action_menu: Vec<MenuEntry>,
    /// Pending event counts (per target plus `total`).
    pub pending_events: Value,
}

impl Observation {
    /// Renders the observation as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
