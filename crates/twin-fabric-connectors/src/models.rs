// twin-fabric-connectors/src/models.rs
// ============================================================================
// Module: Connector Models
// Description: Request, result, receipt, and policy decision records.
// Purpose: One typed wire model for every adapter invocation.
// Dependencies: serde, serde_json, twin-fabric-config, twin-fabric-core,
//               twin-fabric-twins
// ============================================================================

//! ## Overview
//! Connector records are plain value types. The receipt is the only one that
//! persists: a redacted echo of the request and response plus the policy
//! action and mode, appended once per invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_config::ConnectorMode;
use twin_fabric_core::FabricError;
use twin_fabric_core::JsonMap;
use twin_fabric_twins::ServiceName;

// ============================================================================
// SECTION: Operation Class
// ============================================================================

/// Risk class of a connector operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Pure read.
    Read,
    /// Reversible write.
    WriteSafe,
    /// Hard-to-reverse write.
    WriteRisky,
}

impl OperationClass {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::WriteSafe => "write_safe",
            Self::WriteRisky => "write_risky",
        }
    }
}

// ============================================================================
// SECTION: Request & Result
// ============================================================================

/// Typed request handed to an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorRequest {
    /// Per-service monotonic request id (`<service>-NNNNNN`).
    pub request_id: String,
    /// Target service.
    pub service: ServiceName,
    /// Operation name within the service.
    pub operation: String,
    /// Risk class of the operation.
    pub operation_class: OperationClass,
    /// Tool arguments.
    pub payload: JsonMap,
    /// Acting principal.
    pub actor: String,
    /// Free-form request metadata.
    pub metadata: JsonMap,
}

/// Typed result returned by an adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorResult {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// HTTP-flavored status code.
    pub status_code: u16,
    /// Caller-facing response payload.
    pub data: Value,
    /// Provider-shaped raw envelope (what a real API would have returned).
    pub raw: Value,
    /// Structured error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FabricError>,
    /// Adapter-observed latency.
    pub latency_ms: u64,
    /// Adapter metadata (adapter kind, cache hits, live backend).
    pub metadata: JsonMap,
}

impl ConnectorResult {
    /// Builds a successful result.
    #[must_use]
    pub fn success(data: Value, raw: Value) -> Self {
        Self {
            ok: true,
            status_code: 200,
            data,
            raw,
            error: None,
            latency_ms: 0,
            metadata: JsonMap::new(),
        }
    }

    /// Builds a failed result.
    #[must_use]
    pub fn failure(status_code: u16, error: FabricError) -> Self {
        Self {
            ok: false,
            status_code,
            data: Value::Null,
            raw: Value::Null,
            error: Some(error),
            latency_ms: 0,
            metadata: JsonMap::new(),
        }
    }

    /// Inserts one metadata key.
    pub fn stamp(&mut self, key: &str, value: Value) {
        self.metadata.insert(key.to_string(), value);
    }
}

// ============================================================================
// SECTION: Policy Decision
// ============================================================================

/// Action chosen by the policy gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyAction {
    /// Execute the operation.
    Allow,
    /// Refuse the operation.
    Deny,
    /// Refuse until a human approves.
    RequireApproval,
}

impl PolicyAction {
    /// Wire name used in receipts.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "ALLOW",
            Self::Deny => "DENY",
            Self::RequireApproval => "REQUIRE_APPROVAL",
        }
    }
}

/// Policy gate verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Chosen action.
    pub action: PolicyAction,
    /// Human-readable reason.
    pub reason: String,
}

impl PolicyDecision {
    /// Builds a decision.
    #[must_use]
    pub fn new(action: PolicyAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Receipt
// ============================================================================

/// Redacted, append-once record of one connector invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorReceipt {
    /// Request id.
    pub request_id: String,
    /// Adapter mode at invocation time.
    pub mode: ConnectorMode,
    /// Target service.
    pub service: ServiceName,
    /// Operation name.
    pub operation: String,
    /// Risk class.
    pub operation_class: OperationClass,
    /// Policy action taken.
    pub policy_action: PolicyAction,
    /// Whether the adapter succeeded (true for policy refusals, which never
    /// ran an adapter).
    pub ok: bool,
    /// Status code.
    pub status_code: u16,
    /// Redacted request payload.
    pub request_payload: Value,
    /// Redacted response payload.
    pub response_payload: Value,
    /// Adapter-observed latency.
    pub latency_ms: u64,
    /// Logical time of the invocation.
    pub time_ms: u64,
    /// Receipt metadata (policy reason, adapter stamps).
    pub metadata: JsonMap,
}
