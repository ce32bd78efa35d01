// twin-fabric-corpus/src/lib.rs
// ============================================================================
// Module: Twin Fabric Corpus Library
// Description: Reproducible scenario-collection synthesis and quality gate.
// Purpose: Expose the generator and the fingerprint/novelty/realism filter.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-workflow
// ============================================================================

//! ## Overview
//! The corpus generator is a pure function of `(seed, environment_count,
//! scenarios_per_environment)` plus the alias-pack options: identical inputs
//! produce byte-identical bundles. The quality filter scores each generated
//! workflow (fingerprint, structural novelty, realism rubric, static
//! runnability) and accepts or rejects it with explicit reasons.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod generator;
pub mod models;
pub mod quality;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use generator::GeneratorOptions;
pub use generator::generate_corpus;
pub use models::CorpusBundle;
pub use models::EnterpriseProfile;
pub use models::GeneratedEnvironment;
pub use models::GeneratedWorkflowSpec;
pub use quality::QualityReport;
pub use quality::WorkflowQualityScore;
pub use quality::filter_workflow_corpus;
pub use quality::workflow_fingerprint;
