// twin-fabric-router/tests/determinism.rs
// ============================================================================
// Module: Router Determinism Tests
// Description: Identical seeds and call sequences produce identical traces.
// Purpose: Pin the core reproducibility guarantee.
// Dependencies: twin-fabric-router, tempfile, serde_json
// ============================================================================

//! ## Overview
//! Two independent sessions with the same `(seed, scenario, call sequence)`
//! must write byte-identical trace files, identical receipts, and identical
//! state heads; trace times must be non-decreasing throughout.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::Path;

use serde_json::Value;
use serde_json::json;

use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::JsonMap;
use twin_fabric_router::Router;
use twin_fabric_router::RouterOptions;
use twin_fabric_world::catalog::multi_channel;

fn args(value: Value) -> JsonMap {
    value.as_object().cloned().unwrap_or_default()
}

/// Drives one scripted session and returns its final state head.
fn drive(artifacts: &Path, seed: u64) -> String {
    let mut router = Router::new(RouterOptions {
        seed: Some(seed),
        artifacts_dir: Some(artifacts.to_path_buf()),
        scenario: Some(multi_channel()),
        runtime: RuntimeConfig::default(),
    })
    .unwrap();

    router.call_and_step("browser.read", &JsonMap::new()).unwrap();
    router
        .call_and_step(
            "mail.compose",
            &args(json!({
                "to": "sales@macrocompute.example",
                "subj": "Quote request",
                "body_text": "Price and ETA please.",
            })),
        )
        .unwrap();
    router.tick(15_000).unwrap();
    router
        .call_and_step(
            "slack.send_message",
            &args(json!({"channel": "#procurement", "text": "Approve budget $3200?"})),
        )
        .unwrap();
    router
        .call_and_step(
            "erp.create_po",
            &args(json!({
                "vendor": "MacroCompute",
                "currency": "USD",
                "lines": [{"item_id": "LAPTOP-15", "qty": 2, "unit_price": 1000}],
            })),
        )
        .unwrap();
    router
        .call_and_step("db.query", &args(json!({"table": "approval_audit", "limit": 5})))
        .unwrap();

    router.state_snapshot(true, 0, false).unwrap()["state_head"]
        .as_str()
        .unwrap()
        .to_string()
}

#[test]
fn identical_sessions_write_identical_artifacts() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();

    let head_a = drive(dir_a.path(), 1234);
    let head_b = drive(dir_b.path(), 1234);
    assert_eq!(head_a, head_b);

    let trace_a = fs::read(dir_a.path().join("trace.jsonl")).unwrap();
    let trace_b = fs::read(dir_b.path().join("trace.jsonl")).unwrap();
    assert_eq!(trace_a, trace_b, "trace files must be byte-identical");

    let receipts_a = fs::read(dir_a.path().join("receipts.jsonl")).unwrap();
    let receipts_b = fs::read(dir_b.path().join("receipts.jsonl")).unwrap();
    assert_eq!(receipts_a, receipts_b, "receipt files must be byte-identical");
}

#[test]
fn different_seeds_diverge_in_sampled_latencies() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let _ = drive(dir_a.path(), 1);
    let _ = drive(dir_b.path(), 2);
    let trace_a = fs::read(dir_a.path().join("trace.jsonl")).unwrap();
    let trace_b = fs::read(dir_b.path().join("trace.jsonl")).unwrap();
    assert_ne!(trace_a, trace_b);
}

#[test]
fn trace_time_is_monotone_non_decreasing() {
    let dir = tempfile::tempdir().unwrap();
    drive(dir.path(), 77);
    let content = fs::read_to_string(dir.path().join("trace.jsonl")).unwrap();
    let mut last = 0_u64;
    for line in content.lines() {
        let record: Value = serde_json::from_str(line).unwrap();
        let time_ms = record["time_ms"].as_u64().unwrap();
        assert!(time_ms >= last, "time regressed: {time_ms} < {last}");
        last = time_ms;
    }
}
