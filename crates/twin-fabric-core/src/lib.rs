// twin-fabric-core/src/lib.rs
// ============================================================================
// Module: Twin Fabric Core Library
// Description: Kernel primitives shared by every Twin Fabric crate.
// Purpose: Expose the bus, clock, RNG, trace, registry, and error value.
// Dependencies: rand, serde, serde_jcs, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Twin Fabric core provides the deterministic kernel the rest of the fabric
//! is built on: a logical clock with a priority-ordered event bus, a seeded
//! RNG handle, an append-only trace log, the tool registry, and the single
//! structured error value every tool handler returns. Nothing in this crate
//! touches the network or wall-clock time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod bus;
pub mod context;
pub mod error;
pub mod hashing;
pub mod observe;
pub mod page;
pub mod registry;
pub mod rng;
pub mod trace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use bus::Event;
pub use bus::EventBus;
pub use bus::PendingSummary;
pub use context::ScheduleRequest;
pub use context::TwinContext;
pub use error::FabricError;
pub use error::FabricResult;
pub use error::JsonMap;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use observe::MenuEntry;
pub use observe::Observation;
pub use page::DEFAULT_PAGE_LIMIT;
pub use page::MAX_PAGE_LIMIT;
pub use registry::RESERVED_TOOL_NAMES;
pub use registry::ToolProvider;
pub use registry::ToolRegistry;
pub use registry::ToolSpec;
pub use rng::DeterministicRng;
pub use trace::TraceLog;
pub use trace::TraceRecord;
