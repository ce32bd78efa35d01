// twin-fabric-workflow/src/runner.rs
// ============================================================================
// Module: Workflow Runner
// Description: Deterministic execution of compiled workflows.
// Purpose: One fresh router per run, loop-guarded stepping, failure routing.
// Dependencies: serde, serde_json, twin-fabric-{config,core,router}
// ============================================================================

//! ## Overview
//! The runner owns a router per run; routers are never shared across runs.
//! Steps
//! execute in order under a `3 × len(steps)` loop guard; each step captures
//! a post-step observation focused by its tool prefix and evaluates its
//! expectations. Failures route through `on_failure` (`fail`, `continue`,
//! `skip`, `jump:<step_id>`); after the last step the workflow's success
//! assertions run against the final observation and pending counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::FabricError;
use twin_fabric_router::Router;
use twin_fabric_router::RouterOptions;
use twin_fabric_router::focus_for_tool;

use crate::compiler::CompiledWorkflow;
use crate::validator::ValidationIssue;
use crate::validator::ValidationReport;
use crate::validator::evaluate_assertions;
use crate::validator::static_validate_workflow;

// ============================================================================
// SECTION: Run Records
// ============================================================================

/// Execution record for one step attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    /// Step id.
    pub step_id: String,
    /// Tool invoked.
    pub tool: String,
    /// Whether the step passed its expectations.
    pub ok: bool,
    /// Tool result, or an error payload on failure.
    pub result: Value,
    /// Post-step observation.
    pub observation: Value,
    /// Messages for violated expectations.
    pub assertion_failures: Vec<String>,
    /// Logical time after the step.
    pub time_ms: u64,
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Whether both validations passed.
    pub ok: bool,
    /// Workflow name.
    pub workflow_name: String,
    /// Pre-run static validation.
    pub static_validation: ValidationReport,
    /// Execution-time validation.
    pub dynamic_validation: ValidationReport,
    /// Step execution records.
    pub steps: Vec<StepExecution>,
    /// Artifacts directory, when one was used.
    pub artifacts_dir: Option<PathBuf>,
    /// Run metadata (mode, state head, final time, last receipt).
    pub metadata: Value,
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs a compiled workflow against a fresh router.
///
/// # Errors
///
/// Returns router construction failures; execution failures are captured in
/// the result, not raised.
pub fn run_compiled_workflow(
    workflow: &CompiledWorkflow,
    seed: u64,
    artifacts_dir: Option<PathBuf>,
    runtime: &RuntimeConfig,
) -> Result<RunResult, FabricError> {
    let mut router = Router::new(RouterOptions {
        seed: Some(seed),
        artifacts_dir: artifacts_dir.clone(),
        scenario: Some(workflow.scenario.clone()),
        runtime: runtime.clone(),
    })?;

    let available = router.registry().names();
    let static_report = static_validate_workflow(workflow, Some(&available));
    if !static_report.ok {
        return Ok(RunResult {
            ok: false,
            workflow_name: workflow.spec.name.clone(),
            static_validation: static_report,
            dynamic_validation: ValidationReport::from_issues(Vec::new()),
            steps: Vec::new(),
            artifacts_dir,
            metadata: json!({"reason": "static validation failed"}),
        });
    }

    let mut steps: Vec<StepExecution> = Vec::new();
    let mut issues: Vec<ValidationIssue> = Vec::new();
    let mut index = 0usize;
    let mut guard = 0usize;
    let max_guard = workflow.steps.len().saturating_mul(3).max(1);

    while index < workflow.steps.len() {
        guard += 1;
        if guard > max_guard {
            issues.push(ValidationIssue::error(
                "runner.loop_guard",
                "workflow execution exceeded loop guard budget".to_string(),
                None,
            ));
            break;
        }

        let step = &workflow.steps[index];
        match router.call_and_step(&step.tool, &step.args) {
            Ok(result) => {
                let observation = router.observe(Some(focus_for_tool(&step.tool))).to_value();
                let pending = router.pending_value();
                let failures =
                    evaluate_assertions(&step.expect, &result, &observation, &pending);
                let ok = failures.is_empty();
                steps.push(StepExecution {
                    step_id: step.step_id.clone(),
                    tool: step.tool.clone(),
                    ok,
                    result,
                    observation,
                    assertion_failures: failures.clone(),
                    time_ms: router.clock_ms(),
                });
                if !ok {
                    issues.push(ValidationIssue::error(
                        "assertion.failed",
                        failures.join("; "),
                        Some(step.step_id.clone()),
                    ));
                    match resolve_failure_target(workflow, &step.on_failure, index) {
                        Some(next) => {
                            index = next;
                            continue;
                        }
                        None => break,
                    }
                }
            }
            Err(err) => {
                steps.push(StepExecution {
                    step_id: step.step_id.clone(),
                    tool: step.tool.clone(),
                    ok: false,
                    result: err.payload(),
                    observation: Value::Null,
                    assertion_failures: vec![err.to_string()],
                    time_ms: router.clock_ms(),
                });
                issues.push(ValidationIssue::error(
                    "step.exception",
                    err.to_string(),
                    Some(step.step_id.clone()),
                ));
                match resolve_failure_target(workflow, &step.on_failure, index) {
                    Some(next) => {
                        index = next;
                        continue;
                    }
                    None => break,
                }
            }
        }
        index += 1;
    }

    // Success assertions run against the final observation and pending.
    if !workflow.spec.success_assertions.is_empty() {
        let final_observation = router.observe(Some("browser")).to_value();
        let final_pending = router.pending_value();
        let last_result = steps
            .last()
            .map(|step| step.result.clone())
            .unwrap_or(Value::Null);
        for failure in evaluate_assertions(
            &workflow.spec.success_assertions,
            &last_result,
            &final_observation,
            &final_pending,
        ) {
            issues.push(ValidationIssue::error(
                "success_assertion.failed",
                failure,
                None,
            ));
        }
    }

    let dynamic_report = ValidationReport::from_issues(issues);
    let metadata = json!({
        "connector_mode": runtime.connector_mode.as_str(),
        "state_head": router.state_snapshot(false, 0, false)?["state_head"],
        "time_ms": router.clock_ms(),
        "connector_last_receipt":
            router.state_snapshot(false, 0, true)?["connectors"]["last_receipt"],
    });

    Ok(RunResult {
        ok: static_report.ok && dynamic_report.ok,
        workflow_name: workflow.spec.name.clone(),
        static_validation: static_report,
        dynamic_validation: dynamic_report,
        steps,
        artifacts_dir,
        metadata,
    })
}

/// Resolves `on_failure` into the next 0-based step index; `None` ends the
/// run.
fn resolve_failure_target(
    workflow: &CompiledWorkflow,
    on_failure: &str,
    current_index: usize,
) -> Option<usize> {
    let behavior = on_failure.trim().to_lowercase();
    if behavior == "continue" || behavior == "skip" {
        return Some(current_index + 1);
    }
    if let Some(step_id) = behavior.strip_prefix("jump:") {
        return workflow.step_lookup.get(step_id).copied();
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================
