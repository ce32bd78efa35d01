// twin-fabric-connectors/src/adapters.rs
// ============================================================================
// Module: Connector Adapters
// Description: Sim, replay, and live adapters over the twin population.
// Purpose: One triplet per service; all three execute through the twins.
// Dependencies: serde_json, twin-fabric-core, twin-fabric-twins
// ============================================================================

//! ## Overview
//! The sim adapter upgrades a weak reference to the router-owned twin set
//! and dispatches the requested operation. The replay adapter memoizes sim
//! results by canonical `(service, operation, payload)` key and stamps
//! `cache_hit`. The live adapter is a shell that delegates to sim and stamps
//! `live_backend: "simulated"` until a real backend exists.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Weak;

use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::TwinContext;
use twin_fabric_twins::ServiceName;
use twin_fabric_twins::TwinSet;

use crate::models::ConnectorRequest;
use crate::models::ConnectorResult;

// ============================================================================
// SECTION: Adapter Contract
// ============================================================================

/// Adapter contract implemented by the sim/replay/live triplet.
pub trait ConnectorAdapter {
    /// Executes one request.
    fn execute(&mut self, request: &ConnectorRequest, ctx: &mut TwinContext<'_>)
    -> ConnectorResult;
}

/// Canonical memoization key for one request.
fn request_key(request: &ConnectorRequest) -> String {
    // serde_json maps are BTree-backed, so serialization is key-sorted.
    let payload = serde_json::to_string(&request.payload).unwrap_or_default();
    format!("{}:{}:{payload}", request.service, request.operation)
}

// ============================================================================
// SECTION: Sim Adapter
// ============================================================================

/// Adapter executing against the in-memory twins.
#[derive(Debug, Clone)]
pub struct SimAdapter {
    /// Target service.
    service: ServiceName,
    /// Weak reference to the router-owned twin population.
    twins: Weak<RefCell<TwinSet>>,
}

impl SimAdapter {
    /// Creates a sim adapter for one service.
    #[must_use]
    pub fn new(service: ServiceName, twins: Weak<RefCell<TwinSet>>) -> Self {
        Self { service, twins }
    }
}

impl ConnectorAdapter for SimAdapter {
    fn execute(
        &mut self,
        request: &ConnectorRequest,
        ctx: &mut TwinContext<'_>,
    ) -> ConnectorResult {
        let Some(twins) = self.twins.upgrade() else {
            return ConnectorResult::failure(
                503,
                FabricError::new(
                    "service_unavailable",
                    format!("twin population dropped for service: {}", self.service),
                ),
            );
        };
        let outcome =
            twins
                .borrow_mut()
                .dispatch(self.service, &request.operation, &request.payload, ctx);
        let mut result = match outcome {
            Ok(data) => {
                let raw = canonical_raw(request, &data);
                ConnectorResult::success(data, raw)
            }
            Err(error) => ConnectorResult::failure(status_for(&error), error),
        };
        result.stamp("adapter", json!("sim"));
        result
    }
}

/// Maps twin error codes onto HTTP-flavored status codes.
fn status_for(error: &FabricError) -> u16 {
    if error.code == "unknown_operation" {
        404
    } else if error.code.starts_with("unknown_") || error.code.ends_with("_not_found") {
        404
    } else if error.code.starts_with("conflict.") {
        409
    } else {
        400
    }
}

/// Builds the provider-shaped raw envelope for a response.
fn canonical_raw(request: &ConnectorRequest, data: &Value) -> Value {
    match (request.service, request.operation.as_str()) {
        (ServiceName::Slack, "send_message") => json!({
            "ok": true,
            "channel": request.payload.get("channel"),
            "ts": data.get("ts"),
            "message": {
                "text": request.payload.get("text"),
                "thread_ts": request.payload.get("thread_ts"),
            },
        }),
        (ServiceName::Mail, "compose" | "reply") => json!({
            "ok": true,
            "id": data.get("id"),
            "to": request.payload.get("to"),
            "subject": request.payload.get("subj"),
            "queued": true,
        }),
        (ServiceName::Docs, "read") => json!({"ok": true, "document": data}),
        (ServiceName::Tickets, "get") => json!({"ok": true, "ticket": data}),
        (ServiceName::Okta, "get_user") => json!({"ok": true, "user": data}),
        (ServiceName::Db, "query") => json!({
            "ok": true,
            "table": request.payload.get("table"),
            "rows": data.get("rows"),
            "count": data.get("count"),
            "total": data.get("total"),
            "next_cursor": data.get("next_cursor"),
            "has_more": data.get("has_more"),
        }),
        _ => match data {
            Value::Object(map) => {
                let mut raw = map.clone();
                raw.insert("ok".to_string(), json!(true));
                Value::Object(raw)
            }
            other => json!({"ok": true, "result": other}),
        },
    }
}

// ============================================================================
// SECTION: Replay Adapter
// ============================================================================

/// Memoizing adapter for deterministic replay.
#[derive(Debug)]
pub struct ReplayAdapter {
    /// Delegate executed on cache misses.
    delegate: SimAdapter,
    /// Memoized results by canonical request key.
    memo: BTreeMap<String, ConnectorResult>,
}

impl ReplayAdapter {
    /// Creates a replay adapter over a sim delegate.
    #[must_use]
    pub fn new(delegate: SimAdapter) -> Self {
        Self {
            delegate,
            memo: BTreeMap::new(),
        }
    }
}

impl ConnectorAdapter for ReplayAdapter {
    fn execute(
        &mut self,
        request: &ConnectorRequest,
        ctx: &mut TwinContext<'_>,
    ) -> ConnectorResult {
        let key = request_key(request);
        if let Some(cached) = self.memo.get(&key) {
            let mut out = cached.clone();
            out.stamp("adapter", json!("replay"));
            out.stamp("cache_hit", json!(true));
            return out;
        }
        let result = self.delegate.execute(request, ctx);
        self.memo.insert(key, result.clone());
        let mut out = result;
        out.stamp("adapter", json!("replay"));
        out.stamp("cache_hit", json!(false));
        out
    }
}

// ============================================================================
// SECTION: Live Adapter
// ============================================================================

/// Live shell; delegates to sim until a real backend is wired in.
#[derive(Debug)]
pub struct LiveAdapter {
    /// Sim delegate.
    delegate: SimAdapter,
}

impl LiveAdapter {
    /// Creates a live adapter over a sim delegate.
    #[must_use]
    pub fn new(delegate: SimAdapter) -> Self {
        Self { delegate }
    }
}

impl ConnectorAdapter for LiveAdapter {
    fn execute(
        &mut self,
        request: &ConnectorRequest,
        ctx: &mut TwinContext<'_>,
    ) -> ConnectorResult {
        let mut result = self.delegate.execute(request, ctx);
        result.stamp("adapter", json!("live"));
        result.stamp("live_backend", json!("simulated"));
        if let Value::Object(raw) = &mut result.raw {
            raw.insert("live_backend".to_string(), json!("simulated"));
        }
        result
    }
}

// ============================================================================
// SECTION: Triplet
// ============================================================================

/// The sim/replay/live triplet bound to one service.
#[derive(Debug)]
pub struct AdapterTriplet {
    /// Direct sim adapter.
    sim: SimAdapter,
    /// Memoizing replay adapter.
    replay: ReplayAdapter,
    /// Live shell adapter.
    live: LiveAdapter,
}

impl AdapterTriplet {
    /// Builds the triplet for one service.
    #[must_use]
    pub fn new(service: ServiceName, twins: Weak<RefCell<TwinSet>>) -> Self {
        let sim = SimAdapter::new(service, twins);
        Self {
            replay: ReplayAdapter::new(sim.clone()),
            live: LiveAdapter::new(sim.clone()),
            sim,
        }
    }

    /// Selects the adapter for a mode.
    pub fn for_mode(
        &mut self,
        mode: twin_fabric_config::ConnectorMode,
    ) -> &mut dyn ConnectorAdapter {
        match mode {
            twin_fabric_config::ConnectorMode::Sim => &mut self.sim,
            twin_fabric_config::ConnectorMode::Replay => &mut self.replay,
            twin_fabric_config::ConnectorMode::Live => &mut self.live,
        }
    }
}
