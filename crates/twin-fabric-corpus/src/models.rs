// twin-fabric-corpus/src/models.rs
// ============================================================================
// Module: Corpus Models
// Description: Generated environment and workflow records.
// Purpose: Serializable value types for corpus bundles.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Bundles pair generated environments (an enterprise profile plus a world
//! template) with the workflow specs synthesized inside them. Everything is
//! plain serde data so bundles round-trip to JSON byte-identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_core::JsonMap;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Synthetic enterprise identity for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterpriseProfile {
    /// Stable org id (`ORG-NNNN`).
    pub org_id: String,
    /// Org display name.
    pub org_name: String,
    /// Primary mail domain.
    pub primary_domain: String,
    /// Sampled departments, sorted.
    pub departments: Vec<String>,
    /// Procurement budget cap in whole dollars.
    pub budget_cap_usd: i64,
}

/// One generated environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEnvironment {
    /// Stable environment id (`ENV-NNNN`).
    pub env_id: String,
    /// Sub-seed the environment was generated from.
    pub seed: u64,
    /// Enterprise identity.
    pub profile: EnterpriseProfile,
    /// World template consumed by the world compiler.
    pub world_template: Value,
}

/// One generated workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedWorkflowSpec {
    /// Stable scenario id (`ENV-NNNN-SCN-NNNN`).
    pub scenario_id: String,
    /// Owning environment id.
    pub env_id: String,
    /// Sub-seed the workflow was generated from.
    pub seed: u64,
    /// The workflow spec JSON.
    pub spec: Value,
}

/// A generated corpus: environments plus their workflows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusBundle {
    /// Root seed.
    pub seed: u64,
    /// Generated environments in order.
    pub environments: Vec<GeneratedEnvironment>,
    /// Generated workflows in order.
    pub workflows: Vec<GeneratedWorkflowSpec>,
    /// Bundle metadata (counts).
    pub metadata: JsonMap,
}
