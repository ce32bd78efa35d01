// twin-fabric-world/src/compile.rs
// ============================================================================
// Module: World Compiler
// Description: Resolve a workflow `world` value into a Scenario.
// Purpose: Accept catalog references, inline scenario JSON, and generator
//          templates through one entry point.
// Dependencies: serde_json, crate::catalog, crate::scenario
// ============================================================================

//! ## Overview
//! Workflow specs and corpus environments describe their world in one of
//! three shapes: `{"catalog": "<name>"}`, an inline scenario object, or a
//! generator template (`budget_cap_usd`, `vendors`, `browser_nodes`,
//! `database_tables`, `derail_events`, a plain-string
//! `slack_initial_message`). The compiler normalizes all three onto the
//! baseline world so every session keeps the default population.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use twin_fabric_core::FabricError;
use twin_fabric_core::JsonMap;

use crate::catalog::baseline;
use crate::catalog::get_catalog_scenario;
use crate::scenario::Scenario;
use crate::scenario::SlackSeed;

// ============================================================================
// SECTION: World Compilation
// ============================================================================

/// Resolves a workflow `world` value into a [`Scenario`].
///
/// # Errors
///
/// Returns `world.unknown_catalog` for unknown catalog references and
/// `world.invalid` when the value cannot be interpreted as a scenario.
pub fn compile_world(world: &Value) -> Result<Scenario, FabricError> {
    let Some(map) = world.as_object() else {
        if world.is_null() {
            return Ok(baseline());
        }
        return Err(FabricError::new(
            "world.invalid",
            "world must be an object or null",
        ));
    };
    if map.is_empty() {
        return Ok(baseline());
    }
    if let Some(catalog) = map.get("catalog") {
        let name = catalog.as_str().ok_or_else(|| {
            FabricError::new("world.invalid", "catalog reference must be a string")
        })?;
        return get_catalog_scenario(name);
    }

    let normalized = normalize_world_object(map)?;
    let overlay: Scenario = serde_json::from_value(Value::Object(normalized))
        .map_err(|err| FabricError::new("world.invalid", format!("invalid world: {err}")))?;
    Ok(merge_onto_baseline(overlay))
}

/// Rewrites template-shaped keys into scenario-shaped keys.
fn normalize_world_object(map: &JsonMap) -> Result<JsonMap, FabricError> {
    let mut out = JsonMap::new();
    let mut metadata = match map.get("meta").or_else(|| map.get("metadata")) {
        Some(Value::Object(meta)) => meta.clone(),
        Some(_) => {
            return Err(FabricError::new(
                "world.invalid",
                "world metadata must be an object",
            ));
        }
        None => JsonMap::new(),
    };

    for (key, value) in map {
        match key.as_str() {
            "meta" | "metadata" => {}
            // Generator templates carry a budget under either name.
            "budget" | "budget_cap_usd" => {
                out.insert("budget_cap_usd".to_string(), value.clone());
            }
            // Template-only tuning knobs are preserved as metadata.
            "derail_prob" => {
                metadata.insert("derail_prob".to_string(), value.clone());
            }
            // Templates pass the kickoff message as a bare string.
            "slack_initial_message" => match value {
                Value::String(text) => {
                    let seed = SlackSeed {
                        channel: "#procurement".to_string(),
                        user: "system".to_string(),
                        text: text.clone(),
                        dt_ms: 0,
                    };
                    out.insert(
                        "slack_initial_message".to_string(),
                        serde_json::to_value(seed).unwrap_or(Value::Null),
                    );
                }
                other => {
                    out.insert("slack_initial_message".to_string(), other.clone());
                }
            },
            _ => {
                out.insert(key.clone(), value.clone());
            }
        }
    }
    if !metadata.is_empty() {
        out.insert("metadata".to_string(), Value::Object(metadata));
    }
    Ok(out)
}

/// Overlays an inline scenario on the baseline world: populated overlay
/// fields replace baseline fields wholesale; empty overlay fields keep the
/// defaults.
fn merge_onto_baseline(overlay: Scenario) -> Scenario {
    let mut world = baseline();

    if !overlay.metadata.is_empty() {
        world.metadata = overlay.metadata;
    }
    if overlay.budget_cap_usd.is_some() {
        world.budget_cap_usd = overlay.budget_cap_usd;
    }
    if !overlay.slack_channels.is_empty() {
        for channel in overlay.slack_channels {
            if !world.slack_channels.contains(&channel) {
                world.slack_channels.push(channel);
            }
        }
    }
    if overlay.slack_initial_message.is_some() {
        world.slack_initial_message = overlay.slack_initial_message;
    }
    if !overlay.vendors.is_empty() {
        world.vendors = overlay.vendors;
        // Replacement vendors invalidate the baseline reply rules.
        world.vendor_reply_variants.clear();
    }
    if !overlay.vendor_reply_variants.is_empty() {
        world.vendor_reply_variants.extend(overlay.vendor_reply_variants);
    }
    if !overlay.browser_nodes.is_empty() {
        world.browser_nodes = overlay.browser_nodes;
        world.browser_start = None;
    }
    if overlay.browser_start.is_some() {
        world.browser_start = overlay.browser_start;
    }
    if !overlay.documents.is_empty() {
        world.documents = overlay.documents;
    }
    if !overlay.tickets.is_empty() {
        world.tickets = overlay.tickets;
    }
    if !overlay.calendar_events.is_empty() {
        world.calendar_events = overlay.calendar_events;
    }
    if !overlay.identity_users.is_empty() {
        world.identity_users = overlay.identity_users;
    }
    if !overlay.identity_groups.is_empty() {
        world.identity_groups = overlay.identity_groups;
    }
    if !overlay.identity_applications.is_empty() {
        world.identity_applications = overlay.identity_applications;
    }
    if !overlay.service_incidents.is_empty() {
        world.service_incidents = overlay.service_incidents;
    }
    if !overlay.service_requests.is_empty() {
        world.service_requests = overlay.service_requests;
    }
    if !overlay.database_tables.is_empty() {
        for (name, rows) in overlay.database_tables {
            world.database_tables.insert(name, rows);
        }
    }
    if !overlay.derail_events.is_empty() {
        world.derail_events = overlay.derail_events;
    }
    world
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

    use serde_json::json;

    use super::*;

    #[test]
    fn empty_world_compiles_to_the_baseline() {
        let world = compile_world(&json!({})).unwrap();
        assert!(world.slack_channels.contains(&"#procurement".to_string()));
        assert!(world.database_tables.contains_key("approval_audit"));
    }

    #[test]
    fn catalog_reference_resolves_by_name() {
        let world = compile_world(&json!({"catalog": "multi_channel"})).unwrap();
        assert!(world.identity_users.contains_key("USR-2001"));

        let err = compile_world(&json!({"catalog": "missing"})).unwrap_err();
        assert_eq!(err.code, "world.unknown_catalog");
    }

    #[test]
    fn generator_template_shape_is_accepted() {
        let world = compile_world(&json!({
            "budget_cap_usd": 4200,
            "derail_prob": 0.05,
            "slack_initial_message": "Procurement run. Include budget in approvals.",
            "vendors": [
                {"name": "HP Enterprise", "price": [2100, 2500], "eta_days": [3, 5]}
            ],
            "database_tables": {
                "approval_audit": [
                    {"id": "APR-0001", "entity_type": "purchase_order",
                     "entity_id": "PO-0001", "status": "PENDING",
                     "approver": "finance@hp.example"}
                ]
            },
            "derail_events": [
                {"dt_ms": 5000, "target": "mail",
                 "payload": {"from": "sales@hp.example", "subj": "Requested Quote",
                             "body_text": "Pricing attached."}}
            ]
        }))
        .unwrap();

        assert_eq!(world.budget_cap_usd, Some(4_200));
        assert_eq!(world.vendors.len(), 1);
        assert_eq!(world.derail_events.len(), 1);
        let kickoff = world.slack_initial_message.unwrap();
        assert_eq!(kickoff.channel, "#procurement");
        assert_eq!(world.metadata["derail_prob"], json!(0.05));
        // Overlay tables merge with (not erase) the seeded defaults.
        assert!(world.database_tables.contains_key("procurement_orders"));
        assert_eq!(world.database_tables["approval_audit"].len(), 1);
    }

    #[test]
    fn non_object_worlds_are_rejected() {
        let err = compile_world(&json!("catalogname")).unwrap_err();
        assert_eq!(err.code, "world.invalid");
    }
}
