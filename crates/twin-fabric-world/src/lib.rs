// twin-fabric-world/src/lib.rs
// ============================================================================
// Module: Twin Fabric World Library
// Description: Seeded world state a session starts from.
// Purpose: Expose the scenario model, the built-in catalog, and the world
//          compiler used by workflows and the corpus generator.
// Dependencies: serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! A [`Scenario`] is the complete seeded world a router session starts from:
//! vendors and their reply behavior, the browser node graph, documents,
//! tickets, calendar events, identity directory, service desk queues,
//! database tables, and scheduled derail events. Scenarios come from the
//! built-in catalog, from inline JSON, or from generator templates; the
//! compiler in [`compile`] accepts all three shapes.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod catalog;
pub mod compile;
pub mod manifest;
pub mod scenario;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use catalog::catalog_names;
pub use catalog::get_catalog_scenario;
pub use compile::compile_world;
pub use manifest::ScenarioManifest;
pub use manifest::build_scenario_manifest;
pub use manifest::list_scenario_manifests;
pub use scenario::AffordanceSeed;
pub use scenario::BrowserNodeSeed;
pub use scenario::CalendarEventSeed;
pub use scenario::DerailEventSeed;
pub use scenario::DocumentSeed;
pub use scenario::IdentityApplicationSeed;
pub use scenario::IdentityGroupSeed;
pub use scenario::IdentityUserSeed;
pub use scenario::IncidentSeed;
pub use scenario::MailReplySeed;
pub use scenario::RequestSeed;
pub use scenario::Scenario;
pub use scenario::SlackSeed;
pub use scenario::TicketSeed;
pub use scenario::VendorSeed;
