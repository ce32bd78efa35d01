// twin-fabric-core/src/registry.rs
// ============================================================================
// Module: Tool Registry
// Description: Name → spec map plus the provider extension seam.
// Purpose: Keep the tool surface typed, unique, and searchable.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every tool the router can dispatch is described by an immutable
//! [`ToolSpec`] registered under a unique name. Providers claim prefix packs
//! (e.g. `okta.*`) and are consulted for any call whose name matches one of
//! their prefixes. A small set of names is reserved for the router's own
//! surface and can never be registered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::FabricError;
use crate::error::JsonMap;

/// Names reserved for the router's own operational surface.
pub const RESERVED_TOOL_NAMES: &[&str] = &[
    "observe",
    "tick",
    "pending",
    "state",
    "help",
    "tools.search",
    "act_and_observe",
    "call",
    "reset",
];

// ============================================================================
// SECTION: Tool Spec
// ============================================================================

/// Immutable description of one registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name (`service.operation`).
    pub name: String,
    /// Human-readable description used for discovery and ranking.
    pub description: String,
    /// Permission tags (e.g. `mail:write`).
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Side-effect tags (e.g. `mail_mutation`).
    #[serde(default)]
    pub side_effects: Vec<String>,
    /// Nominal latency charged per call, in milliseconds.
    pub default_latency_ms: u64,
    /// Symmetric jitter bound applied to the nominal latency.
    pub latency_jitter_ms: u64,
    /// Nominal cost unit for budget accounting.
    #[serde(default)]
    pub nominal_cost: f64,
    /// Probability of an injected fault per call.
    #[serde(default)]
    pub fault_probability: f64,
    /// Declared return shape (informational).
    pub returns: String,
}

impl ToolSpec {
    /// Creates a spec with fabric-wide defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            permissions: Vec::new(),
            side_effects: Vec::new(),
            default_latency_ms: 250,
            latency_jitter_ms: 50,
            nominal_cost: 0.0,
            fault_probability: 0.0,
            returns: "object".to_string(),
        }
    }

    /// Sets the nominal latency and jitter bound.
    #[must_use]
    pub fn with_latency(mut self, default_ms: u64, jitter_ms: u64) -> Self {
        self.default_latency_ms = default_ms;
        self.latency_jitter_ms = jitter_ms;
        self
    }

    /// Sets permission tags.
    #[must_use]
    pub fn with_permissions(mut self, permissions: &[&str]) -> Self {
        self.permissions = permissions.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets side-effect tags.
    #[must_use]
    pub fn with_side_effects(mut self, side_effects: &[&str]) -> Self {
        self.side_effects = side_effects.iter().map(ToString::to_string).collect();
        self
    }

    /// Sets the injected fault probability.
    #[must_use]
    pub fn with_fault_probability(mut self, probability: f64) -> Self {
        self.fault_probability = probability;
        self
    }

    /// Sets the declared return shape.
    #[must_use]
    pub fn with_returns(mut self, returns: impl Into<String>) -> Self {
        self.returns = returns.into();
        self
    }
}

// ============================================================================
// SECTION: Tool Provider
// ============================================================================

/// Extension seam for externally supplied tool packs.
///
/// Providers own a set of prefixes; the router routes any call whose name
/// matches one of them to [`ToolProvider::call`].
pub trait ToolProvider {
    /// Provider identity used in diagnostics.
    fn name(&self) -> &str;

    /// Name prefixes claimed by this provider (e.g. `ext.`).
    fn prefixes(&self) -> Vec<String>;

    /// Specs to register for this provider's tools.
    fn specs(&self) -> Vec<ToolSpec>;

    /// Whether this provider handles the given tool name.
    fn handles(&self, tool: &str) -> bool {
        self.prefixes().iter().any(|prefix| tool.starts_with(prefix))
    }

    /// Executes a tool owned by this provider.
    ///
    /// # Errors
    ///
    /// Returns a [`FabricError`] when the tool is unknown to the provider or
    /// the arguments are invalid.
    fn call(&mut self, tool: &str, args: &JsonMap) -> Result<Value, FabricError>;
}

// ============================================================================
// SECTION: Tool Registry
// ============================================================================

/// Mapping of unique tool names to immutable specs.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    /// Registered specs keyed by name.
    specs: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a spec.
    ///
    /// # Errors
    ///
    /// Returns `registry.reserved` for reserved names and
    /// `registry.duplicate` when the name is already taken.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), FabricError> {
        if RESERVED_TOOL_NAMES.contains(&spec.name.as_str()) {
            return Err(FabricError::new(
                "registry.reserved",
                format!("tool name is reserved: {}", spec.name),
            ));
        }
        if self.specs.contains_key(&spec.name) {
            return Err(FabricError::new(
                "registry.duplicate",
                format!("tool already registered: {}", spec.name),
            ));
        }
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Looks up a spec by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.get(name)
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// All specs in name order.
    #[must_use]
    pub fn list(&self) -> Vec<&ToolSpec> {
        self.specs.values().collect()
    }

    /// All names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    /// Ranks tools against a query: a name-prefix match dominates, then
    /// token overlap between the query and the description; ties break on
    /// name.
    #[must_use]
    pub fn search(&self, query: &str, top_k: usize) -> Vec<(String, String, f64)> {
        let needle = query.trim().to_lowercase();
        let tokens: Vec<&str> = needle.split_whitespace().collect();
        let mut ranked: Vec<(String, String, f64)> = self
            .specs
            .values()
            .filter_map(|spec| {
                let name = spec.name.to_lowercase();
                let description = spec.description.to_lowercase();
                let mut score = 0.0;
                if !needle.is_empty() && name.starts_with(&needle) {
                    score += 10.0;
                } else if !needle.is_empty() && name.contains(&needle) {
                    score += 4.0;
                }
                for token in &tokens {
                    if description.contains(token) {
                        score += 1.0;
                    }
                }
                if score > 0.0 {
                    Some((spec.name.clone(), spec.description.clone(), score))
                } else {
                    None
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        ranked.truncate(top_k);
        ranked
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::new("mail.compose", "Compose a message"))
            .unwrap();
        let err = registry
            .register(ToolSpec::new("mail.compose", "again"))
            .unwrap_err();
        assert_eq!(err.code, "registry.duplicate");
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut registry = ToolRegistry::new();
        for name in RESERVED_TOOL_NAMES {
            let err = registry.register(ToolSpec::new(*name, "nope")).unwrap_err();
            assert_eq!(err.code, "registry.reserved");
        }
    }

    #[test]
    fn search_prefers_name_prefix_over_description_overlap() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::new("okta.list_users", "List directory users"))
            .unwrap();
        registry
            .register(ToolSpec::new("db.query", "Query okta shadow tables"))
            .unwrap();
        let results = registry.search("okta", 10);
        assert_eq!(results[0].0, "okta.list_users");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn search_tiebreaks_on_name() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::new("tickets.get", "Fetch a ticket"))
            .unwrap();
        registry
            .register(ToolSpec::new("tickets.create", "Create a ticket"))
            .unwrap();
        let results = registry.search("tickets", 10);
        assert_eq!(results[0].0, "tickets.create");
        assert_eq!(results[1].0, "tickets.get");
    }
}
