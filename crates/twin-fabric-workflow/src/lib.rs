// twin-fabric-workflow/src/lib.rs
// ============================================================================
// Module: Twin Fabric Workflow Library
// Description: Declarative scenarios compiled and run against the router.
// Purpose: Expose the workflow model, compiler, validator, and runner.
// Dependencies: serde, serde_json, twin-fabric-{config,core,router,world}
// ============================================================================

//! ## Overview
//! A workflow is a declarative list of tool steps with expectations and
//! failure routing. Compilation resolves the world (catalog reference,
//! inline scenario, or generator template) and freezes step order; the
//! runner executes against a fresh router per run, evaluating per-step and
//! final success assertions.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod compiler;
pub mod runner;
pub mod spec;
pub mod validator;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use compiler::CompiledStep;
pub use compiler::CompiledWorkflow;
pub use compiler::compile_workflow;
pub use runner::RunResult;
pub use runner::StepExecution;
pub use runner::run_compiled_workflow;
pub use spec::AssertionKind;
pub use spec::AssertionSpec;
pub use spec::WorkflowSpec;
pub use spec::WorkflowStepSpec;
pub use validator::ValidationIssue;
pub use validator::ValidationReport;
pub use validator::evaluate_assertions;
pub use validator::static_validate_workflow;
