// twin-fabric-workflow/src/validator.rs
// ============================================================================
// Module: Workflow Validator
// Description: Static checks and declarative assertion evaluation.
// Purpose: Catch unrunnable workflows before execution and judge step
//          outcomes during it.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Static validation flags unknown tools, failure paths referencing missing
//! steps, and approval declarations with no approval-like step (a warning).
//! Assertion evaluation renders field values as text and checks the four
//! declarative kinds over dotted paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::compiler::CompiledWorkflow;
use crate::spec::AssertionKind;
use crate::spec::AssertionSpec;

// ============================================================================
// SECTION: Validation Report
// ============================================================================

/// One validation finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Finding code (e.g. `tool.unavailable`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Offending step, when one exists.
    #[serde(default)]
    pub step_id: Option<String>,
    /// `error` or `warning`.
    pub severity: String,
}

impl ValidationIssue {
    /// Builds an error-severity issue.
    #[must_use]
    pub fn error(code: &str, message: String, step_id: Option<String>) -> Self {
        Self {
            code: code.to_string(),
            message,
            step_id,
            severity: "error".to_string(),
        }
    }

    /// Builds a warning-severity issue.
    #[must_use]
    pub fn warning(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            step_id: None,
            severity: "warning".to_string(),
        }
    }
}

/// Aggregated validation outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no error-severity issue exists.
    pub ok: bool,
    /// All findings.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Builds the report from findings.
    #[must_use]
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let ok = !issues.iter().any(|issue| issue.severity == "error");
        Self { ok, issues }
    }
}

// ============================================================================
// SECTION: Static Validation
// ============================================================================

/// Statically validates a compiled workflow.
#[must_use]
pub fn static_validate_workflow(
    workflow: &CompiledWorkflow,
    available_tools: Option<&[String]>,
) -> ValidationReport {
    let mut issues = Vec::new();

    if let Some(tools) = available_tools {
        for step in &workflow.steps {
            if !tools.iter().any(|tool| tool == &step.tool) {
                issues.push(ValidationIssue::error(
                    "tool.unavailable",
                    format!("step {} uses unavailable tool: {}", step.step_id, step.tool),
                    Some(step.step_id.clone()),
                ));
            }
        }
    }

    for path in &workflow.spec.failure_paths {
        if !workflow.step_lookup.contains_key(&path.trigger_step) {
            issues.push(ValidationIssue::error(
                "failure_path.trigger_missing",
                format!(
                    "failure path '{}' references unknown trigger step {}",
                    path.name, path.trigger_step
                ),
                Some(path.trigger_step.clone()),
            ));
        }
        for recovery in &path.recovery_steps {
            if !workflow.step_lookup.contains_key(recovery) {
                issues.push(ValidationIssue::error(
                    "failure_path.recovery_missing",
                    format!(
                        "failure path '{}' references unknown recovery step {recovery}",
                        path.name
                    ),
                    Some(recovery.clone()),
                ));
            }
        }
    }

    if !workflow.spec.approvals.is_empty() {
        let has_approval_step = workflow.steps.iter().any(|step| {
            step.description.to_lowercase().contains("approv") || step.tool.contains("approv")
        });
        if !has_approval_step {
            issues.push(ValidationIssue::warning(
                "approval.unmapped",
                "workflow declares approvals but no approval-like step exists".to_string(),
            ));
        }
    }

    ValidationReport::from_issues(issues)
}

// ============================================================================
// SECTION: Assertion Evaluation
// ============================================================================

/// Evaluates assertions against a result, observation, and pending counts,
/// returning one failure message per violated assertion.
#[must_use]
pub fn evaluate_assertions(
    assertions: &[AssertionSpec],
    result: &Value,
    observation: &Value,
    pending: &Value,
) -> Vec<String> {
    assertions
        .iter()
        .filter_map(|assertion| assertion_failure(assertion, result, observation, pending))
        .collect()
}

/// Returns the failure message for one assertion, or `None` when it holds.
fn assertion_failure(
    assertion: &AssertionSpec,
    result: &Value,
    observation: &Value,
    pending: &Value,
) -> Option<String> {
    match assertion.kind {
        AssertionKind::ResultContains => {
            let value = resolve_field(result, assertion.field.as_deref());
            let needle = assertion.contains.clone().unwrap_or_default();
            if value_text(&value).contains(&needle) {
                None
            } else {
                Some(format!(
                    "expected result field '{}' to contain '{needle}'",
                    assertion.field.clone().unwrap_or_default()
                ))
            }
        }
        AssertionKind::ResultEquals => {
            let value = resolve_field(result, assertion.field.as_deref());
            let expected = assertion.equals.clone().unwrap_or_default();
            let actual = value_text(&value);
            if actual == expected {
                None
            } else {
                Some(format!(
                    "expected result field '{}' == '{expected}', got '{actual}'",
                    assertion.field.clone().unwrap_or_default()
                ))
            }
        }
        AssertionKind::ObservationContains => {
            let focus = assertion.focus.clone().unwrap_or_else(|| "summary".to_string());
            let value = resolve_field(observation, Some(&focus));
            let needle = assertion.contains.clone().unwrap_or_default();
            if value_text(&value).contains(&needle) {
                None
            } else {
                Some(format!("expected observation '{focus}' to contain '{needle}'"))
            }
        }
        AssertionKind::PendingMax => {
            let field = assertion.field.clone().unwrap_or_else(|| "total".to_string());
            let value = resolve_field(pending, Some(&field));
            let max_value = assertion.max_value.unwrap_or(0);
            match value.as_ref().and_then(Value::as_i64) {
                Some(numeric) if numeric <= max_value => None,
                Some(numeric) => Some(format!(
                    "expected pending '{field}' <= {max_value}, got {numeric}"
                )),
                None => Some(format!(
                    "pending field '{field}' is not numeric: {}",
                    value_text(&value)
                )),
            }
        }
    }
}

/// Resolves a dotted field path; `None`/empty path returns the whole value.
fn resolve_field(payload: &Value, field: Option<&str>) -> Option<Value> {
    let Some(path) = field.filter(|path| !path.is_empty()) else {
        return Some(payload.clone());
    };
    let mut current = payload;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current.clone())
}

/// Renders a field value as comparison text.
fn value_text(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
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

    use crate::compiler::compile_workflow;

    use super::*;

    fn assertion(kind: AssertionKind) -> AssertionSpec {
        AssertionSpec {
            kind,
            field: None,
            contains: None,
            equals: None,
            focus: None,
            max_value: None,
            description: None,
        }
    }

    #[test]
    fn dotted_paths_resolve_into_nested_objects() {
        let mut spec = assertion(AssertionKind::ResultContains);
        spec.field = Some("a.b.c".to_string());
        spec.contains = Some("deep".to_string());
        let result = json!({"a": {"b": {"c": "deep value"}}});
        assert!(evaluate_assertions(&[spec], &result, &json!({}), &json!({})).is_empty());
    }

    #[test]
    fn pending_max_flags_overflow_and_non_numeric_fields() {
        let mut spec = assertion(AssertionKind::PendingMax);
        spec.field = Some("total".to_string());
        spec.max_value = Some(2);
        let failures =
            evaluate_assertions(&[spec.clone()], &json!({}), &json!({}), &json!({"total": 5}));
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("<= 2"));

        let failures =
            evaluate_assertions(&[spec], &json!({}), &json!({}), &json!({"total": "x"}));
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn result_equals_compares_rendered_text() {
        let mut spec = assertion(AssertionKind::ResultEquals);
        spec.field = Some("status".to_string());
        spec.equals = Some("MATCH".to_string());
        assert!(
            evaluate_assertions(&[spec.clone()], &json!({"status": "MATCH"}), &json!({}), &json!({}))
                .is_empty()
        );
        assert_eq!(
            evaluate_assertions(&[spec], &json!({"status": "MISMATCH"}), &json!({}), &json!({}))
                .len(),
            1
        );
    }

    #[test]
    fn static_validation_flags_unknown_tools_and_missing_failure_steps() {
        let compiled = compile_workflow(&json!({
            "name": "invalid",
            "objective": {"statement": "x"},
            "world": {},
            "steps": [
                {"step_id": "read", "description": "r", "tool": "mail.unknown_op", "args": {}},
            ],
            "failure_paths": [
                {"name": "ghost", "trigger_step": "nope", "recovery_steps": ["read", "missing"]},
            ],
        }))
        .unwrap();
        let report = static_validate_workflow(
            &compiled,
            Some(&["browser.read".to_string(), "mail.compose".to_string()]),
        );
        assert!(!report.ok);
        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert!(codes.contains(&"tool.unavailable"));
        assert!(codes.contains(&"failure_path.trigger_missing"));
        assert!(codes.contains(&"failure_path.recovery_missing"));
    }

    #[test]
    fn approvals_without_approval_steps_warn_but_pass() {
        let compiled = compile_workflow(&json!({
            "name": "warned",
            "objective": {"statement": "x"},
            "world": {},
            "approvals": [{"stage": "finance", "approver": "cfo"}],
            "steps": [
                {"step_id": "read", "description": "read catalog", "tool": "browser.read", "args": {}},
            ],
        }))
        .unwrap();
        let report = static_validate_workflow(&compiled, None);
        assert!(report.ok);
        assert!(report.issues.iter().any(|i| i.code == "approval.unmapped"));
    }
}
