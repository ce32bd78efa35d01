// twin-fabric-router/tests/aliases_and_policy.rs
// ============================================================================
// Module: Alias & Policy Surface Tests
// Description: Alias packs, connector receipts, and live-mode gating seen
//              through the router.
// Purpose: Pin the policy contract at the tool-call surface.
// Dependencies: twin-fabric-router, twin-fabric-config, serde_json
// ============================================================================

//! ## Overview
//! Aliases execute against the canonical twins and inherit their specs;
//! live-mode policy refusals surface as structured errors with a receipt
//! behind them; snapshots expose connector mode and the last receipt.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::Value;
use serde_json::json;

use twin_fabric_config::ConnectorMode;
use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::JsonMap;
use twin_fabric_core::ToolProvider;
use twin_fabric_core::ToolSpec;
use twin_fabric_router::Router;
use twin_fabric_router::RouterOptions;

fn args(value: Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

fn router_with(runtime: RuntimeConfig) -> Router {
    Router::new(RouterOptions {
        seed: Some(880),
        artifacts_dir: None,
        scenario: None,
        runtime,
    })
    .unwrap()
}

#[test]
fn salesforce_alias_executes_against_the_crm_twin() {
    let mut router = router_with(RuntimeConfig::default());
    let created = router
        .call_and_step(
            "salesforce.opportunity.create",
            &args(json!({"name": "Renewal FY27", "amount": 125_000.0, "stage": "Qualification"})),
        )
        .unwrap();
    assert!(created["id"].as_str().unwrap().starts_with("D-"));

    let deals = router
        .call_and_step("crm.list_deals", &args(json!({"limit": 10})))
        .unwrap();
    assert!(
        deals["deals"]
            .as_array()
            .unwrap()
            .iter()
            .any(|deal| deal["id"] == created["id"])
    );

    let payload = router
        .act_and_observe(
            "salesforce.activity.log",
            &args(json!({"kind": "note", "note": "Approval context added"})),
        )
        .unwrap();
    assert_eq!(payload["observation"]["focus"], "crm");
}

#[test]
fn alias_specs_inherit_the_canonical_description() {
    let router = router_with(RuntimeConfig::default());
    let spec = router.registry().get("hubspot.deals.create").unwrap();
    assert!(spec.description.starts_with("Alias → crm.create_deal"));
    let canonical = router.registry().get("crm.create_deal").unwrap();
    assert_eq!(spec.default_latency_ms, canonical.default_latency_ms);
}

#[test]
fn live_mode_gates_safe_and_risky_writes() {
    let mut runtime = RuntimeConfig::default();
    runtime.connector_mode = ConnectorMode::Live;
    let mut router = router_with(runtime);

    let err = router
        .call_and_step(
            "mail.compose",
            &args(json!({"to": "sales@example.com", "subj": "Quote", "body_text": "Need quote"})),
        )
        .unwrap_err();
    assert_eq!(err.code, "policy.approval_required");

    let snapshot = router.state_snapshot(false, 5, true).unwrap();
    assert_eq!(snapshot["connectors"]["mode"], "live");
    let receipt = &snapshot["connectors"]["last_receipt"];
    assert_eq!(receipt["policy_action"], "REQUIRE_APPROVAL");
    assert_eq!(receipt["operation"], "compose");

    let err = router
        .call_and_step(
            "okta.deactivate_user",
            &args(json!({"user_id": "USR-9001"})),
        )
        .unwrap_err();
    assert_eq!(err.code, "policy.denied");
}

#[test]
fn live_mode_with_safe_allowance_executes_safe_writes() {
    let mut runtime = RuntimeConfig::default();
    runtime.connector_mode = ConnectorMode::Live;
    runtime.live_allow_write_safe = true;
    let mut router = router_with(runtime);
    let composed = router
        .call_and_step(
            "mail.compose",
            &args(json!({"to": "sales@example.com", "subj": "Quote", "body_text": "Need quote"})),
        )
        .unwrap();
    assert!(composed["id"].as_str().unwrap().starts_with('m'));
}

#[test]
fn connector_receipts_record_enterprise_services() {
    let mut router = router_with(RuntimeConfig::default());
    router
        .call_and_step(
            "erp.create_po",
            &args(json!({
                "vendor": "MacroCompute",
                "currency": "USD",
                "lines": [{"item_id": "LAPTOP-15", "qty": 1, "unit_price": 1200}],
            })),
        )
        .unwrap();
    let receipt = router.state_snapshot(false, 3, true).unwrap()["connectors"]["last_receipt"]
        .clone();
    assert_eq!(receipt["service"], "erp");
    assert_eq!(receipt["operation"], "create_po");

    router
        .call_and_step("okta.list_users", &args(json!({"limit": 1})))
        .unwrap();
    let receipt = router.state_snapshot(false, 3, true).unwrap()["connectors"]["last_receipt"]
        .clone();
    assert_eq!(receipt["service"], "okta");
    assert_eq!(receipt["operation"], "list_users");
}

#[test]
fn tool_search_finds_okta_tools_by_prefix() {
    let router = router_with(RuntimeConfig::default());
    let found = router.search_tools("okta", 20);
    let names: Vec<&str> = found["results"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["name"].as_str())
        .collect();
    assert!(names.contains(&"okta.list_users"));
    assert!(names.contains(&"okta.assign_group"));
}

/// Minimal external provider used by the registration test.
struct EchoProvider;

impl ToolProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo_provider"
    }

    fn prefixes(&self) -> Vec<String> {
        vec!["ext.".to_string()]
    }

    fn specs(&self) -> Vec<ToolSpec> {
        vec![ToolSpec::new("ext.echo", "Echo payload for contract tests.")]
    }

    fn call(&mut self, tool: &str, args: &JsonMap) -> Result<Value, twin_fabric_core::FabricError> {
        if tool == "ext.echo" {
            Ok(json!({"ok": true, "payload": Value::Object(args.clone())}))
        } else {
            Err(twin_fabric_core::FabricError::unknown_tool(tool))
        }
    }
}

#[test]
fn custom_providers_register_and_dispatch_by_prefix() {
    let mut router = router_with(RuntimeConfig::default());
    router.register_tool_provider(Box::new(EchoProvider)).unwrap();

    let result = router
        .call_and_step("ext.echo", &args(json!({"message": "hello"})))
        .unwrap();
    assert_eq!(result["ok"], true);
    assert_eq!(result["payload"]["message"], "hello");

    // Provider specs land in the registry and therefore in search.
    assert!(router.registry().contains("ext.echo"));
}

#[test]
fn duplicate_provider_specs_are_rejected() {
    let mut router = router_with(RuntimeConfig::default());
    router.register_tool_provider(Box::new(EchoProvider)).unwrap();
    let err = router
        .register_tool_provider(Box::new(EchoProvider))
        .unwrap_err();
    assert_eq!(err.code, "registry.duplicate");
}
