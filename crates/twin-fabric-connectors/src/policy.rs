// twin-fabric-connectors/src/policy.rs
// ============================================================================
// Module: Policy Gate
// Description: Write-safety gate evaluated before any adapter runs.
// Purpose: Keep live writes behind explicit configuration.
// Dependencies: twin-fabric-config
// ============================================================================

//! ## Overview
//! The default gate is a small fixed ladder: blocklisted operations deny
//! first; non-live modes and live reads always pass; live safe writes pass
//! only with the safe-write allowance (otherwise they require approval);
//! live risky writes pass only with the risky allowance (otherwise they
//! deny).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use twin_fabric_config::ConnectorMode;
use twin_fabric_config::RuntimeConfig;

use crate::models::ConnectorRequest;
use crate::models::OperationClass;
use crate::models::PolicyAction;
use crate::models::PolicyDecision;

// ============================================================================
// SECTION: Policy Gate
// ============================================================================

/// Gate consulted before any adapter invocation.
pub trait PolicyGate {
    /// Evaluates one request under the given adapter mode.
    fn evaluate(&self, request: &ConnectorRequest, mode: ConnectorMode) -> PolicyDecision;
}

/// Default write-safety gate driven by runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicyGate {
    /// Whether live mode may execute safe writes.
    live_allow_write_safe: bool,
    /// Whether live mode may execute risky writes.
    live_allow_write_risky: bool,
    /// Blocked `service.operation` identifiers.
    blocked_operations: BTreeSet<String>,
}

impl DefaultPolicyGate {
    /// Builds the gate from runtime configuration.
    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            live_allow_write_safe: config.live_allow_write_safe,
            live_allow_write_risky: config.live_allow_write_risky,
            blocked_operations: config.blocked_operations.clone(),
        }
    }
}

impl PolicyGate for DefaultPolicyGate {
    fn evaluate(&self, request: &ConnectorRequest, mode: ConnectorMode) -> PolicyDecision {
        let operation_id = format!("{}.{}", request.service, request.operation);
        if self.blocked_operations.contains(&operation_id) {
            return PolicyDecision::new(
                PolicyAction::Deny,
                format!("blocked operation: {operation_id}"),
            );
        }
        if mode != ConnectorMode::Live {
            return PolicyDecision::new(PolicyAction::Allow, "non-live mode");
        }
        match request.operation_class {
            OperationClass::Read => PolicyDecision::new(PolicyAction::Allow, "live read allowed"),
            OperationClass::WriteSafe => {
                if self.live_allow_write_safe {
                    PolicyDecision::new(PolicyAction::Allow, "live safe-write allowed")
                } else {
                    PolicyDecision::new(
                        PolicyAction::RequireApproval,
                        "live safe-write requires approval",
                    )
                }
            }
            OperationClass::WriteRisky => {
                if self.live_allow_write_risky {
                    PolicyDecision::new(PolicyAction::Allow, "live risky-write allowed")
                } else {
                    PolicyDecision::new(PolicyAction::Deny, "live risky-write blocked")
                }
            }
        }
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

    use twin_fabric_core::JsonMap;
    use twin_fabric_twins::ServiceName;

    use super::*;

    fn request(service: ServiceName, operation: &str, class: OperationClass) -> ConnectorRequest {
        ConnectorRequest {
            request_id: format!("{service}-000001"),
            service,
            operation: operation.to_string(),
            operation_class: class,
            payload: JsonMap::new(),
            actor: "agent".to_string(),
            metadata: JsonMap::new(),
        }
    }

    #[test]
    fn non_live_modes_always_allow() {
        let gate = DefaultPolicyGate::default();
        let req = request(ServiceName::Erp, "post_payment", OperationClass::WriteRisky);
        for mode in [ConnectorMode::Sim, ConnectorMode::Replay] {
            assert_eq!(gate.evaluate(&req, mode).action, PolicyAction::Allow);
        }
    }

    #[test]
    fn live_mode_ladder_matches_the_contract() {
        let gate = DefaultPolicyGate::default();
        let read = request(ServiceName::Mail, "list", OperationClass::Read);
        assert_eq!(
            gate.evaluate(&read, ConnectorMode::Live).action,
            PolicyAction::Allow
        );

        let safe = request(ServiceName::Mail, "compose", OperationClass::WriteSafe);
        assert_eq!(
            gate.evaluate(&safe, ConnectorMode::Live).action,
            PolicyAction::RequireApproval
        );

        let risky = request(ServiceName::Erp, "post_payment", OperationClass::WriteRisky);
        assert_eq!(
            gate.evaluate(&risky, ConnectorMode::Live).action,
            PolicyAction::Deny
        );
    }

    #[test]
    fn allowances_open_the_corresponding_rungs() {
        let mut config = RuntimeConfig::default();
        config.live_allow_write_safe = true;
        config.live_allow_write_risky = true;
        let gate = DefaultPolicyGate::from_config(&config);

        let safe = request(ServiceName::Mail, "compose", OperationClass::WriteSafe);
        assert_eq!(
            gate.evaluate(&safe, ConnectorMode::Live).action,
            PolicyAction::Allow
        );
        let risky = request(ServiceName::Erp, "post_payment", OperationClass::WriteRisky);
        assert_eq!(
            gate.evaluate(&risky, ConnectorMode::Live).action,
            PolicyAction::Allow
        );
    }

    #[test]
    fn blocklist_denies_in_every_mode() {
        let mut config = RuntimeConfig::default();
        config
            .blocked_operations
            .insert("erp.post_payment".to_string());
        let gate = DefaultPolicyGate::from_config(&config);
        let risky = request(ServiceName::Erp, "post_payment", OperationClass::WriteRisky);
        assert_eq!(
            gate.evaluate(&risky, ConnectorMode::Sim).action,
            PolicyAction::Deny
        );
    }
}
