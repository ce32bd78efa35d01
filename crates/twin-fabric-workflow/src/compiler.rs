// twin-fabric-workflow/src/compiler.rs
// ============================================================================
// Module: Workflow Compiler
// Description: Resolve the world and freeze steps for execution.
// Purpose: Turn a declarative spec into an executable plan.
// Dependencies: serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Compilation resolves the `world` value into a [`Scenario`], merges the
//! workflow's identity (name, objective, actors, constraints, approvals,
//! tags) into the scenario metadata, and freezes the step list with a
//! step-id lookup for `jump:` routing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::JsonMap;
use twin_fabric_world::Scenario;
use twin_fabric_world::compile_world;

use crate::spec::AssertionSpec;
use crate::spec::WorkflowSpec;

// ============================================================================
// SECTION: Compiled Forms
// ============================================================================

/// One frozen, executable step.
#[derive(Debug, Clone)]
pub struct CompiledStep {
    /// 1-based position in the plan.
    pub index: usize,
    /// Step id.
    pub step_id: String,
    /// Description.
    pub description: String,
    /// Tool to invoke.
    pub tool: String,
    /// Tool arguments.
    pub args: JsonMap,
    /// Post-step expectations.
    pub expect: Vec<AssertionSpec>,
    /// Failure routing.
    pub on_failure: String,
}

/// A compiled, executable workflow.
#[derive(Debug, Clone)]
pub struct CompiledWorkflow {
    /// The source spec.
    pub spec: WorkflowSpec,
    /// The resolved world.
    pub scenario: Scenario,
    /// Frozen steps in declaration order.
    pub steps: Vec<CompiledStep>,
    /// Step id → 0-based step index (for `jump:` routing).
    pub step_lookup: BTreeMap<String, usize>,
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiles a workflow value into an executable plan.
///
/// # Errors
///
/// Returns `workflow.*` errors for malformed specs and `world.*` errors for
/// unresolvable worlds.
pub fn compile_workflow(value: &Value) -> Result<CompiledWorkflow, FabricError> {
    let spec = WorkflowSpec::from_value(value)?;
    compile_workflow_spec(spec)
}

/// Compiles an already-loaded workflow spec.
///
/// # Errors
///
/// Returns `world.*` errors for unresolvable worlds.
pub fn compile_workflow_spec(spec: WorkflowSpec) -> Result<CompiledWorkflow, FabricError> {
    let mut scenario = compile_world(&spec.world)?;
    merge_metadata(&mut scenario, &spec);

    let steps: Vec<CompiledStep> = spec
        .steps
        .iter()
        .enumerate()
        .map(|(idx, step)| CompiledStep {
            index: idx + 1,
            step_id: step.step_id.clone(),
            description: step.description.clone(),
            tool: step.tool.clone(),
            args: step.args.clone(),
            expect: step.expect.clone(),
            on_failure: step.on_failure.clone(),
        })
        .collect();
    let step_lookup = steps
        .iter()
        .enumerate()
        .map(|(idx, step)| (step.step_id.clone(), idx))
        .collect();

    Ok(CompiledWorkflow {
        spec,
        scenario,
        steps,
        step_lookup,
    })
}

/// Merges the workflow identity into the scenario metadata.
fn merge_metadata(scenario: &mut Scenario, spec: &WorkflowSpec) {
    let mut metadata = scenario.metadata.clone();
    metadata.insert("workflow_name".to_string(), json!(spec.name));
    metadata.insert(
        "workflow_objective".to_string(),
        json!(spec.objective.statement),
    );
    metadata.insert(
        "workflow_success".to_string(),
        json!(spec.objective.success),
    );
    metadata.insert(
        "workflow_actors".to_string(),
        serde_json::to_value(&spec.actors).unwrap_or(Value::Null),
    );
    metadata.insert(
        "workflow_constraints".to_string(),
        serde_json::to_value(&spec.constraints).unwrap_or(Value::Null),
    );
    metadata.insert(
        "workflow_approvals".to_string(),
        serde_json::to_value(&spec.approvals).unwrap_or(Value::Null),
    );
    metadata.insert("workflow_tags".to_string(), json!(spec.tags));
    scenario.metadata = metadata;
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

    use serde_json::json;

    use super::*;

    #[test]
    fn compilation_preserves_step_order_and_lookup() {
        let compiled = compile_workflow(&json!({
            "name": "ordered",
            "objective": {"statement": "x"},
            "world": {"catalog": "multi_channel"},
            "steps": [
                {"step_id": "read", "description": "r", "tool": "browser.read", "args": {}},
                {"step_id": "mail", "description": "m", "tool": "mail.compose", "args": {}},
            ],
        }))
        .unwrap();
        assert_eq!(compiled.steps.len(), 2);
        assert_eq!(compiled.steps[0].index, 1);
        assert_eq!(compiled.step_lookup["mail"], 1);
        assert_eq!(
            compiled.scenario.metadata["workflow_name"],
            json!("ordered")
        );
    }

    #[test]
    fn unknown_catalog_worlds_fail_compilation() {
        let err = compile_workflow(&json!({
            "name": "bad-world",
            "objective": {"statement": "x"},
            "world": {"catalog": "missing"},
        }))
        .unwrap_err();
        assert_eq!(err.code, "world.unknown_catalog");
    }
}
