// twin-fabric-router/tests/error_semantics.rs
// ============================================================================
// Module: Router Error Semantics Tests
// Description: Structured error codes across the dispatch surface.
// Purpose: Pin the error taxonomy callers branch on.
// Dependencies: twin-fabric-router, serde_json
// ============================================================================

//! ## Overview
//! Every failure mode surfaces one structured error with a stable code, is
//! recorded in the trace, and never mutates twin state.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::Value;
use serde_json::json;

use twin_fabric_core::JsonMap;
use twin_fabric_core::TraceRecord;
use twin_fabric_router::Router;

fn args(value: Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

#[test]
fn unknown_entities_surface_their_scoped_codes() {
    let mut router = Router::from_seed(21).unwrap();
    let cases = [
        ("mail.reply", json!({"id": "m-does-not-exist", "body_text": "ping"}), "unknown_message"),
        ("erp.get_po", json!({"id": "PO-404"}), "unknown_po"),
        ("crm.get_contact", json!({"id": "C-404"}), "unknown_contact"),
        ("tickets.get", json!({"ticket_id": "TCK-404"}), "unknown_ticket"),
        ("okta.get_user", json!({"user_id": "USR-404"}), "okta.user_not_found"),
    ];
    for (tool, payload, code) in cases {
        let err = router.call_and_step(tool, &args(payload)).unwrap_err();
        assert_eq!(err.code, code, "{tool}");
    }
}

#[test]
fn unknown_tools_and_invalid_args_fail_fast() {
    let mut router = Router::from_seed(22).unwrap();
    let err = router
        .call_and_step("mail.unknown_operation", &JsonMap::new())
        .unwrap_err();
    assert_eq!(err.code, "unknown_tool");

    let err = router
        .call_and_step("mail.compose", &args(json!({"to": "x@example.com"})))
        .unwrap_err();
    assert_eq!(err.code, "invalid_args");
}

#[test]
fn failures_are_recorded_in_the_trace_without_latency() {
    let mut router = Router::from_seed(23).unwrap();
    let before = router.clock_ms();
    router
        .call_and_step("erp.get_po", &args(json!({"id": "PO-404"})))
        .unwrap_err();
    assert_eq!(router.clock_ms(), before, "failures charge no latency");

    let last_call = router
        .trace()
        .records()
        .iter()
        .rev()
        .find_map(|record| match record {
            TraceRecord::Call { tool, response, latency_ms, .. } => {
                Some((tool.clone(), response.clone(), *latency_ms))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(last_call.0, "erp.get_po");
    assert_eq!(last_call.1["error"]["code"], "unknown_po");
    assert_eq!(last_call.2, 0);
}

#[test]
fn invalid_cursors_do_not_mutate_state() {
    let mut router = Router::from_seed(24).unwrap();
    let before = router.state_snapshot(false, 0, false).unwrap()["state_head"].clone();
    let err = router
        .call_and_step("tickets.list", &args(json!({"cursor": "page:2"})))
        .unwrap_err();
    assert_eq!(err.code, "invalid_cursor");
    let after = router.state_snapshot(false, 0, false).unwrap()["state_head"].clone();
    assert_eq!(before, after);
}

#[test]
fn ticket_lifecycle_rejects_edges_outside_the_table() {
    let mut router = Router::from_seed(25).unwrap();
    let created = router
        .call_and_step("tickets.create", &args(json!({"title": "Lifecycle"})))
        .unwrap();
    let id = created["ticket_id"].as_str().unwrap().to_string();
    for status in ["in_progress", "resolved", "closed"] {
        router
            .call_and_step(
                "tickets.transition",
                &args(json!({"ticket_id": id, "status": status})),
            )
            .unwrap();
    }
    let err = router
        .call_and_step(
            "tickets.transition",
            &args(json!({"ticket_id": id, "status": "blocked"})),
        )
        .unwrap_err();
    assert_eq!(err.code, "invalid_transition");
}

#[test]
fn fault_overrides_inject_transient_failures() {
    let mut router = Router::from_seed(26).unwrap();
    router.set_fault_override("docs.create", 1.0);
    let err = router
        .call_and_step(
            "docs.create",
            &args(json!({"title": "Doomed", "body": "…"})),
        )
        .unwrap_err();
    assert_eq!(err.code, "transient_failure");

    router.set_fault_override("docs.create", 0.0);
    router
        .call_and_step(
            "docs.create",
            &args(json!({"title": "Fine", "body": "…"})),
        )
        .unwrap();
}
