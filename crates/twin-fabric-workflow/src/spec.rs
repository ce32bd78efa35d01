// twin-fabric-workflow/src/spec.rs
// ============================================================================
// Module: Workflow Spec Model
// Description: Declarative workflow JSON model.
// Purpose: One serde model with structural validation at load time.
// Dependencies: serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! The workflow model mirrors the external JSON contract: an objective, a
//! world reference, actors, constraints, approvals, ordered steps with
//! expectations and `on_failure` routing, final success assertions, and
//! failure paths. Step ids must be unique; loading rejects duplicates.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_core::FabricError;
use twin_fabric_core::JsonMap;

// ============================================================================
// SECTION: Assertions
// ============================================================================

/// Supported assertion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    /// A dotted result field contains a substring.
    ResultContains,
    /// A dotted result field equals a string.
    ResultEquals,
    /// A dotted observation field contains a substring.
    ObservationContains,
    /// A pending-count field stays at or below a maximum.
    PendingMax,
}

/// One declarative assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionSpec {
    /// Assertion kind.
    pub kind: AssertionKind,
    /// Dotted field path into the result or pending counts.
    #[serde(default)]
    pub field: Option<String>,
    /// Substring for the `*_contains` kinds.
    #[serde(default)]
    pub contains: Option<String>,
    /// Expected string for `result_equals`.
    #[serde(default)]
    pub equals: Option<String>,
    /// Dotted observation path for `observation_contains`.
    #[serde(default)]
    pub focus: Option<String>,
    /// Ceiling for `pending_max`.
    #[serde(default)]
    pub max_value: Option<i64>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Workflow Parts
// ============================================================================

/// One acting principal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorSpec {
    /// Stable actor id.
    pub actor_id: String,
    /// Role label.
    pub role: String,
    /// Email, when the actor has one.
    #[serde(default)]
    pub email: Option<String>,
    /// Slack handle, when the actor has one.
    #[serde(default)]
    pub slack: Option<String>,
}

/// One declared constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSpec {
    /// Constraint name.
    pub name: String,
    /// What the constraint demands.
    pub description: String,
    /// Whether the constraint is mandatory.
    #[serde(default = "default_true")]
    pub required: bool,
}

/// One approval requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalSpec {
    /// Approval stage label.
    pub stage: String,
    /// Approving principal.
    pub approver: String,
    /// Whether the approval is mandatory.
    #[serde(default = "default_true")]
    pub required: bool,
    /// Expected evidence description.
    #[serde(default)]
    pub evidence: Option<String>,
}

/// One ordered workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStepSpec {
    /// Unique step id.
    pub step_id: String,
    /// What the step does.
    pub description: String,
    /// Tool to invoke.
    pub tool: String,
    /// Tool arguments.
    #[serde(default)]
    pub args: JsonMap,
    /// Post-step expectations.
    #[serde(default)]
    pub expect: Vec<AssertionSpec>,
    /// Failure routing: `fail` (default), `continue`, `skip`, or
    /// `jump:<step_id>`.
    #[serde(default = "default_on_failure")]
    pub on_failure: String,
}

/// One declared failure path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePathSpec {
    /// Path name.
    pub name: String,
    /// Step whose failure triggers the path.
    pub trigger_step: String,
    /// Steps that recover the workflow.
    #[serde(default)]
    pub recovery_steps: Vec<String>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Workflow objective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    /// Objective statement.
    pub statement: String,
    /// Success criteria descriptions.
    #[serde(default)]
    pub success: Vec<String>,
}

// ============================================================================
// SECTION: Workflow Spec
// ============================================================================

/// One declarative workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSpec {
    /// Workflow name.
    pub name: String,
    /// Objective and success criteria.
    pub objective: ObjectiveSpec,
    /// World reference: catalog name, inline scenario, or template.
    #[serde(default)]
    pub world: Value,
    /// Acting principals.
    #[serde(default)]
    pub actors: Vec<ActorSpec>,
    /// Declared constraints.
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    /// Approval requirements.
    #[serde(default)]
    pub approvals: Vec<ApprovalSpec>,
    /// Ordered steps.
    #[serde(default)]
    pub steps: Vec<WorkflowStepSpec>,
    /// Final success assertions.
    #[serde(default)]
    pub success_assertions: Vec<AssertionSpec>,
    /// Declared failure paths.
    #[serde(default)]
    pub failure_paths: Vec<FailurePathSpec>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: JsonMap,
}

impl WorkflowSpec {
    /// Loads a workflow from a JSON value, enforcing unique step ids.
    ///
    /// # Errors
    ///
    /// Returns `workflow.invalid` for malformed JSON and
    /// `workflow.duplicate_step` for repeated step ids.
    pub fn from_value(value: &Value) -> Result<Self, FabricError> {
        let spec: Self = serde_json::from_value(value.clone()).map_err(|err| {
            FabricError::new("workflow.invalid", format!("invalid workflow spec: {err}"))
        })?;
        let mut seen = BTreeSet::new();
        for step in &spec.steps {
            if !seen.insert(step.step_id.as_str()) {
                return Err(FabricError::new(
                    "workflow.duplicate_step",
                    format!("duplicate step_id: {}", step.step_id),
                ));
            }
        }
        Ok(spec)
    }
}

fn default_true() -> bool {
    true
}

fn default_on_failure() -> String {
    "fail".to_string()
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
    fn duplicate_step_ids_are_rejected_at_load() {
        let value = json!({
            "name": "dup",
            "objective": {"statement": "x", "success": []},
            "steps": [
                {"step_id": "a", "description": "one", "tool": "browser.read", "args": {}},
                {"step_id": "a", "description": "two", "tool": "browser.read", "args": {}},
            ],
        });
        let err = WorkflowSpec::from_value(&value).unwrap_err();
        assert_eq!(err.code, "workflow.duplicate_step");
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let value = json!({
            "name": "minimal",
            "objective": {"statement": "read the catalog"},
        });
        let spec = WorkflowSpec::from_value(&value).unwrap();
        assert!(spec.steps.is_empty());
        assert!(spec.world.is_null());
        assert!(spec.tags.is_empty());
    }

    #[test]
    fn on_failure_defaults_to_fail() {
        let value = json!({
            "name": "one-step",
            "objective": {"statement": "x"},
            "steps": [
                {"step_id": "s1", "description": "read", "tool": "browser.read"},
            ],
        });
        let spec = WorkflowSpec::from_value(&value).unwrap();
        assert_eq!(spec.steps[0].on_failure, "fail");
    }
}
