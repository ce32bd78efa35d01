// twin-fabric-connectors/src/lib.rs
// ============================================================================
// Module: Twin Fabric Connectors Library
// Description: Connector runtime fronting the twins with a policy gate.
// Purpose: Expose the adapter triplets, route table, receipts, and policy.
// Dependencies: regex, serde, serde_json, twin-fabric-config,
//               twin-fabric-core, twin-fabric-twins
// ============================================================================

//! ## Overview
//! Every connector-managed tool call becomes a typed request, passes the
//! policy gate, executes through the mode-selected adapter, and leaves a
//! redacted receipt, even when policy refuses it. The `sim` adapter calls
//! the twins through a weak reference (the router owns them); `replay`
//! memoizes by canonical request key; `live` is a shell that delegates to
//! sim and marks itself as simulated.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod adapters;
pub mod models;
pub mod policy;
pub mod receipts;
pub mod redaction;
pub mod routes;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use adapters::AdapterTriplet;
pub use adapters::ConnectorAdapter;
pub use models::ConnectorReceipt;
pub use models::ConnectorRequest;
pub use models::ConnectorResult;
pub use models::OperationClass;
pub use models::PolicyAction;
pub use models::PolicyDecision;
pub use policy::DefaultPolicyGate;
pub use policy::PolicyGate;
pub use receipts::RECEIPTS_FILE_NAME;
pub use receipts::ReceiptLog;
pub use redaction::redact_text;
pub use redaction::redact_value;
pub use routes::ToolRoute;
pub use routes::route_for;
pub use runtime::ConnectorRuntime;
