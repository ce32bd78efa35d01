// twin-fabric-router/src/lib.rs
// ============================================================================
// Module: Twin Fabric Router Library
// Description: Session composition root and tool-call dispatcher.
// Purpose: Expose the router, its options, and the alias packs.
// Dependencies: serde, serde_json, twin-fabric-{config,connectors,core,
//               twins,world}
// ============================================================================

//! ## Overview
//! The router is the single canonical execution path for a session: it owns
//! the bus, the seeded RNG, the trace, the twin population, the connector
//! runtime, and the tool registry. Every tool call flows through
//! [`Router::call_and_step`], which gates, dispatches, traces, and charges a
//! bounded deterministic latency.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod aliases;
pub mod router;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aliases::crm_alias_pack;
pub use aliases::erp_alias_pack;
pub use aliases::focus_for_tool;
pub use router::Router;
pub use router::RouterOptions;
