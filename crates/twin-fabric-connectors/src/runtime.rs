// twin-fabric-connectors/src/runtime.rs
// ============================================================================
// Module: Connector Runtime
// Description: Policy-gated dispatcher over the adapter triplets.
// Purpose: Single entry point for every connector-managed tool call.
// Dependencies: serde_json, twin-fabric-config, twin-fabric-core,
//               twin-fabric-twins
// ============================================================================

//! ## Overview
//! `invoke` builds the typed request with a per-service monotonic id, runs
//! the policy gate, executes the mode-selected adapter on ALLOW, and always
//! appends a redacted receipt, refusals included. Policy refusals surface
//! as `policy.denied` / `policy.approval_required` before any adapter runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Weak;

use serde_json::Value;
use serde_json::json;

use twin_fabric_config::ConnectorMode;
use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::TwinContext;
use twin_fabric_twins::ServiceName;
use twin_fabric_twins::TwinSet;

use crate::adapters::AdapterTriplet;
use crate::adapters::ConnectorAdapter;
use crate::models::ConnectorReceipt;
use crate::models::ConnectorRequest;
use crate::models::ConnectorResult;
use crate::models::PolicyAction;
use crate::models::PolicyDecision;
use crate::policy::DefaultPolicyGate;
use crate::policy::PolicyGate;
use crate::receipts::ReceiptLog;
use crate::redaction::redact_value;
use crate::routes::route_for;

/// Services fronted by the connector runtime (browser is router-direct).
const MANAGED_SERVICES: &[ServiceName] = &[
    ServiceName::Slack,
    ServiceName::Mail,
    ServiceName::Docs,
    ServiceName::Calendar,
    ServiceName::Tickets,
    ServiceName::Crm,
    ServiceName::Erp,
    ServiceName::Db,
    ServiceName::Okta,
    ServiceName::Servicedesk,
];

// ============================================================================
// SECTION: Connector Runtime
// ============================================================================

/// Policy-gated dispatcher over the per-service adapter triplets.
pub struct ConnectorRuntime {
    /// Adapter mode for this session.
    mode: ConnectorMode,
    /// Per-service adapter triplets.
    adapters: BTreeMap<ServiceName, AdapterTriplet>,
    /// Policy gate consulted before execution.
    policy: Box<dyn PolicyGate>,
    /// Receipts log.
    receipts: ReceiptLog,
    /// Monotonic request counter.
    request_seq: u64,
}

impl std::fmt::Debug for ConnectorRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRuntime")
            .field("mode", &self.mode)
            .field("services", &self.adapters.keys().collect::<Vec<_>>())
            .field("request_seq", &self.request_seq)
            .finish_non_exhaustive()
    }
}

impl ConnectorRuntime {
    /// Builds the runtime for a session.
    ///
    /// # Errors
    ///
    /// Returns a `receipts.io` error when the receipts file cannot be
    /// opened.
    pub fn new(
        twins: Weak<RefCell<TwinSet>>,
        config: &RuntimeConfig,
        artifacts_dir: Option<&Path>,
    ) -> Result<Self, FabricError> {
        let mut adapters = BTreeMap::new();
        for service in MANAGED_SERVICES {
            adapters.insert(*service, AdapterTriplet::new(*service, twins.clone()));
        }
        Ok(Self {
            mode: config.connector_mode,
            adapters,
            policy: Box::new(DefaultPolicyGate::from_config(config)),
            receipts: ReceiptLog::new(artifacts_dir)?,
            request_seq: 0,
        })
    }

    /// Adapter mode for this session.
    #[must_use]
    pub fn mode(&self) -> ConnectorMode {
        self.mode
    }

    /// Whether a tool routes through this runtime.
    #[must_use]
    pub fn managed_tool(&self, tool: &str) -> bool {
        route_for(tool).is_some_and(|route| self.adapters.contains_key(&route.service))
    }

    /// The most recent receipt.
    #[must_use]
    pub fn last_receipt(&self) -> Option<Value> {
        self.receipts.last()
    }

    /// The last `n` receipts, oldest first.
    #[must_use]
    pub fn receipt_tail(&self, n: usize) -> Vec<Value> {
        self.receipts.tail(n)
    }

    /// Invokes a connector-managed tool.
    ///
    /// # Errors
    ///
    /// Returns `policy.denied` / `policy.approval_required` on refusal, the
    /// adapter's structured error on failure, and `unknown_tool` for names
    /// outside the route table.
    pub fn invoke(
        &mut self,
        tool: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let route = route_for(tool).ok_or_else(|| FabricError::unknown_tool(tool))?;
        self.request_seq += 1;
        let request = ConnectorRequest {
            request_id: format!("{}-{:06}", route.service, self.request_seq),
            service: route.service,
            operation: route.operation,
            operation_class: route.operation_class,
            payload: args.clone(),
            actor: "agent".to_string(),
            metadata: JsonMap::new(),
        };

        let decision = self.policy.evaluate(&request, self.mode);
        match decision.action {
            PolicyAction::Deny => {
                self.record(&request, &decision, None, ctx.now_ms)?;
                Err(FabricError::new("policy.denied", decision.reason)
                    .with_detail(json!({"tool": tool})))
            }
            PolicyAction::RequireApproval => {
                self.record(&request, &decision, None, ctx.now_ms)?;
                Err(
                    FabricError::new("policy.approval_required", decision.reason)
                        .with_detail(json!({"tool": tool})),
                )
            }
            PolicyAction::Allow => {
                let adapter = self
                    .adapters
                    .get_mut(&request.service)
                    .ok_or_else(|| {
                        FabricError::new(
                            "service_unavailable",
                            format!("no adapter registered for service: {}", request.service),
                        )
                    })?
                    .for_mode(self.mode);
                let result = adapter.execute(&request, ctx);
                self.record(&request, &decision, Some(&result), ctx.now_ms)?;
                if result.ok {
                    Ok(result.data)
                } else {
                    Err(result.error.unwrap_or_else(|| {
                        FabricError::new("connector.failed", "adapter call failed")
                    }))
                }
            }
        }
    }

    /// Appends one redacted receipt.
    fn record(
        &mut self,
        request: &ConnectorRequest,
        decision: &PolicyDecision,
        result: Option<&ConnectorResult>,
        time_ms: u64,
    ) -> Result<(), FabricError> {
        let mut metadata = JsonMap::new();
        metadata.insert("policy_reason".to_string(), json!(decision.reason));
        if let Some(result) = result {
            for (key, value) in &result.metadata {
                metadata.insert(key.clone(), value.clone());
            }
        }
        let response_payload = match result {
            Some(result) => redact_value(&result.raw),
            None => json!({"policy": decision.action.as_str()}),
        };
        let receipt = ConnectorReceipt {
            request_id: request.request_id.clone(),
            mode: self.mode,
            service: request.service,
            operation: request.operation.clone(),
            operation_class: request.operation_class,
            policy_action: decision.action,
            ok: result.is_none_or(|result| result.ok),
            status_code: result.map_or(200, |result| result.status_code),
            request_payload: redact_value(&Value::Object(request.payload.clone())),
            response_payload,
            latency_ms: result.map_or(0, |result| result.latency_ms),
            time_ms,
            metadata,
        };
        self.receipts.append(receipt)
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

    use std::rc::Rc;

    use serde_json::json;

    use twin_fabric_core::DeterministicRng;
    use twin_fabric_twins::TwinOptions;
    use twin_fabric_world::catalog::baseline;

    use super::*;

    fn setup(config: &RuntimeConfig) -> (Rc<RefCell<TwinSet>>, ConnectorRuntime) {
        let twins = Rc::new(RefCell::new(TwinSet::from_scenario(
            &baseline(),
            TwinOptions::default(),
        )));
        let runtime = ConnectorRuntime::new(Rc::downgrade(&twins), config, None).unwrap();
        (twins, runtime)
    }

    fn args(value: serde_json::Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn sim_invocation_executes_and_leaves_a_receipt() {
        let config = RuntimeConfig::default();
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let result = runtime
            .invoke(
                "slack.send_message",
                &args(json!({"channel": "#procurement", "text": "Request approval budget $2200"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(result["ts"], "1");

        let receipt = runtime.last_receipt().unwrap();
        assert_eq!(receipt["service"], "slack");
        assert_eq!(receipt["operation"], "send_message");
        assert_eq!(receipt["policy_action"], "ALLOW");
        assert_eq!(receipt["request_id"], "slack-000001");
    }

    #[test]
    fn live_safe_write_requires_approval_and_still_leaves_a_receipt() {
        let mut config = RuntimeConfig::default();
        config.connector_mode = ConnectorMode::Live;
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let err = runtime
            .invoke(
                "mail.compose",
                &args(json!({"to": "sales@example.com", "subj": "Quote", "body_text": "Need quote"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "policy.approval_required");

        let receipt = runtime.last_receipt().unwrap();
        assert_eq!(receipt["policy_action"], "REQUIRE_APPROVAL");
        // Policy refusals still scrub the request payload.
        assert_eq!(receipt["request_payload"]["to"], "[REDACTED_EMAIL]");
    }

    #[test]
    fn live_risky_write_is_denied_by_default() {
        let mut config = RuntimeConfig::default();
        config.connector_mode = ConnectorMode::Live;
        config.live_allow_write_safe = true;
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let created = runtime
            .invoke(
                "tickets.create",
                &args(json!({"title": "Close me", "description": "generated"})),
                &mut ctx,
            )
            .unwrap();
        let ticket_id = created["ticket_id"].as_str().unwrap().to_string();

        let err = runtime
            .invoke(
                "tickets.transition",
                &args(json!({"ticket_id": ticket_id, "status": "closed"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "policy.denied");
    }

    #[test]
    fn replay_mode_memoizes_by_canonical_request_key() {
        let mut config = RuntimeConfig::default();
        config.connector_mode = ConnectorMode::Replay;
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        runtime
            .invoke("db.list_tables", &args(json!({"limit": 5})), &mut ctx)
            .unwrap();
        let first = runtime.last_receipt().unwrap();
        assert_eq!(first["metadata"]["cache_hit"], false);

        runtime
            .invoke("db.list_tables", &args(json!({"limit": 5})), &mut ctx)
            .unwrap();
        let second = runtime.last_receipt().unwrap();
        assert_eq!(second["metadata"]["cache_hit"], true);
    }

    #[test]
    fn live_mode_marks_the_simulated_backend() {
        let mut config = RuntimeConfig::default();
        config.connector_mode = ConnectorMode::Live;
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        runtime
            .invoke("okta.list_users", &args(json!({"limit": 1})), &mut ctx)
            .unwrap();
        let receipt = runtime.last_receipt().unwrap();
        assert_eq!(receipt["metadata"]["live_backend"], "simulated");
        assert_eq!(receipt["policy_action"], "ALLOW");
    }

    #[test]
    fn twin_errors_pass_through_with_a_receipt() {
        let config = RuntimeConfig::default();
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let err = runtime
            .invoke("erp.get_po", &args(json!({"id": "PO-404"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "unknown_po");
        let receipt = runtime.last_receipt().unwrap();
        assert_eq!(receipt["ok"], false);
        assert_eq!(receipt["status_code"], 404);
    }

    #[test]
    fn request_ids_are_monotonic_per_session() {
        let config = RuntimeConfig::default();
        let (_twins, mut runtime) = setup(&config);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        runtime
            .invoke("db.list_tables", &args(json!({})), &mut ctx)
            .unwrap();
        runtime
            .invoke("okta.list_users", &args(json!({})), &mut ctx)
            .unwrap();
        let receipt = runtime.last_receipt().unwrap();
        assert_eq!(receipt["request_id"], "okta-000002");
    }
}
