// twin-fabric-world/src/manifest.rs
// ============================================================================
// Module: Scenario Manifest
// Description: Typed summaries of catalog scenarios.
// Purpose: Let hosts list worlds without materializing twin state.
// Dependencies: serde, crate::catalog, crate::scenario
// ============================================================================

//! ## Overview
//! A manifest is the shallow, listing-friendly view of a scenario: its type,
//! difficulty, expected step range, the tool families its seeds imply, and
//! entity counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_core::FabricError;

use crate::catalog::catalog_names;
use crate::catalog::get_catalog_scenario;
use crate::scenario::Scenario;

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Typed summary of a catalog scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioManifest {
    /// Catalog name.
    pub name: String,
    /// Scenario type tag.
    pub scenario_type: String,
    /// Difficulty tag.
    pub difficulty: String,
    /// Expected minimum step count, when declared.
    pub expected_steps_min: Option<u64>,
    /// Expected maximum step count, when declared.
    pub expected_steps_max: Option<u64>,
    /// Tool families the seeded world implies.
    pub tool_families: Vec<String>,
    /// Sorted metadata tags.
    pub tags: Vec<String>,
    /// Seeded document count.
    pub docs_count: usize,
    /// Seeded ticket count.
    pub tickets_count: usize,
    /// Seeded identity user count.
    pub identity_users_count: usize,
    /// Seeded incident count.
    pub servicedesk_incidents_count: usize,
    /// Seeded request count.
    pub servicedesk_requests_count: usize,
}

/// Builds the manifest for one scenario.
#[must_use]
pub fn build_scenario_manifest(name: &str, scenario: &Scenario) -> ScenarioManifest {
    let metadata = &scenario.metadata;
    let (expected_min, expected_max) = expected_steps_range(metadata.get("expected_steps"));
    let mut tags: Vec<String> = metadata
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();
    tags.sort();
    tags.dedup();

    ScenarioManifest {
        name: name.trim().to_lowercase(),
        scenario_type: metadata
            .get("scenario_type")
            .and_then(Value::as_str)
            .unwrap_or("core")
            .to_string(),
        difficulty: metadata
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or("standard")
            .to_string(),
        expected_steps_min: expected_min,
        expected_steps_max: expected_max,
        tool_families: infer_tool_families(scenario),
        tags,
        docs_count: scenario.documents.len(),
        tickets_count: scenario.tickets.len(),
        identity_users_count: scenario.identity_users.len(),
        servicedesk_incidents_count: scenario.service_incidents.len(),
        servicedesk_requests_count: scenario.service_requests.len(),
    }
}

/// Looks up a catalog scenario and builds its manifest.
///
/// # Errors
///
/// Returns `world.unknown_catalog` for names outside the catalog.
pub fn get_scenario_manifest(name: &str) -> Result<ScenarioManifest, FabricError> {
    let scenario = get_catalog_scenario(name)?;
    Ok(build_scenario_manifest(name, &scenario))
}

/// Manifests for every catalog scenario, sorted by name.
#[must_use]
pub fn list_scenario_manifests() -> Vec<ScenarioManifest> {
    let mut manifests: Vec<ScenarioManifest> = catalog_names()
        .into_iter()
        .filter_map(|name| get_scenario_manifest(name).ok())
        .collect();
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    manifests
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses `expected_steps: [lo, hi]` metadata.
fn expected_steps_range(raw: Option<&Value>) -> (Option<u64>, Option<u64>) {
    if let Some(Value::Array(items)) = raw
        && items.len() == 2
        && let (Some(lo), Some(hi)) = (items[0].as_u64(), items[1].as_u64())
    {
        return (Some(lo), Some(hi));
    }
    (None, None)
}

/// Infers the tool families a seeded world exercises.
fn infer_tool_families(scenario: &Scenario) -> Vec<String> {
    let mut families = Vec::new();
    let mut add = |family: &str, present: bool| {
        if present {
            families.push(family.to_string());
        }
    };
    add(
        "slack",
        !scenario.slack_channels.is_empty() || scenario.slack_initial_message.is_some(),
    );
    add(
        "mail",
        !scenario.vendors.is_empty() || !scenario.vendor_reply_variants.is_empty(),
    );
    add("browser", !scenario.browser_nodes.is_empty());
    add("docs", !scenario.documents.is_empty());
    add("calendar", !scenario.calendar_events.is_empty());
    add("tickets", !scenario.tickets.is_empty());
    add("db", !scenario.database_tables.is_empty());
    add(
        "okta",
        !scenario.identity_users.is_empty()
            || !scenario.identity_groups.is_empty()
            || !scenario.identity_applications.is_empty(),
    );
    add(
        "servicedesk",
        !scenario.service_incidents.is_empty() || !scenario.service_requests.is_empty(),
    );
    families.sort();
    families
}

// ============================================================================
// SECTION: Tests
// ============================================================================
