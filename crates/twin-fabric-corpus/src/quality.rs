// twin-fabric-corpus/src/quality.rs
// ============================================================================
// Module: Corpus Quality Filter
// Description: Fingerprint, novelty, realism, and runnability gate.
// Purpose: Keep only distinct, realistic, statically runnable workflows.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-workflow
// ============================================================================

//! ## Overview
//! Each workflow is scored on four axes: a canonical-JSON fingerprint (the
//! spec minus its `scenario_seed` metadata), structural novelty (one over
//! the occurrences of its per-step service sequence), a weighted realism
//! rubric in `[0, 1]`, and binary static runnability. A workflow is
//! accepted iff its fingerprint is unseen, realism clears the threshold,
//! runnability is 1, and novelty is at least 0.2.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_core::hash_canonical_json;
use twin_fabric_workflow::compile_workflow;
use twin_fabric_workflow::static_validate_workflow;

use crate::models::GeneratedWorkflowSpec;

/// Default realism acceptance threshold.
pub const DEFAULT_REALISM_THRESHOLD: f64 = 0.55;

/// Minimum structural novelty for acceptance.
const NOVELTY_FLOOR: f64 = 0.2;

// ============================================================================
// SECTION: Scores
// ============================================================================

/// Quality verdict for one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowQualityScore {
    /// Scenario id.
    pub scenario_id: String,
    /// Canonical fingerprint.
    pub fingerprint: String,
    /// Realism rubric score in `[0, 1]`.
    pub realism_score: f64,
    /// Structural novelty in `(0, 1]`.
    pub novelty_score: f64,
    /// Static runnability: 1.0 or 0.0.
    pub runnability_score: f64,
    /// Whether the workflow was accepted.
    pub accepted: bool,
    /// Rejection reasons, empty when accepted.
    pub reasons: Vec<String>,
}

/// Filter outcome over a workflow collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityReport {
    /// Accepted workflows in input order.
    pub accepted: Vec<WorkflowQualityScore>,
    /// Rejected workflows in input order.
    pub rejected: Vec<WorkflowQualityScore>,
}

// ============================================================================
// SECTION: Filter
// ============================================================================

/// Scores and filters a workflow collection.
#[must_use]
pub fn filter_workflow_corpus(
    workflows: &[GeneratedWorkflowSpec],
    realism_threshold: f64,
) -> QualityReport {
    let mut seen_fingerprints: BTreeSet<String> = BTreeSet::new();
    let mut structure_counter: BTreeMap<String, u64> = BTreeMap::new();
    let mut report = QualityReport::default();

    for workflow in workflows {
        let fingerprint = workflow_fingerprint(&workflow.spec);
        let structure = structure_key(&workflow.spec);
        let occurrences = structure_counter.entry(structure).or_insert(0);
        *occurrences += 1;
        let novelty = 1.0 / (*occurrences as f64);
        let realism = realism_score(&workflow.spec);
        let runnability = runnability_score(&workflow.spec);

        let mut reasons = Vec::new();
        if seen_fingerprints.contains(&fingerprint) {
            reasons.push("duplicate_fingerprint".to_string());
        }
        if realism < realism_threshold {
            reasons.push(format!("realism_below_threshold:{realism:.3}"));
        }
        if runnability < 1.0 {
            reasons.push("static_runnability_failed".to_string());
        }
        if novelty < NOVELTY_FLOOR {
            reasons.push(format!("low_structural_novelty:{novelty:.3}"));
        }

        let accepted = reasons.is_empty();
        let score = WorkflowQualityScore {
            scenario_id: workflow.scenario_id.clone(),
            fingerprint: fingerprint.clone(),
            realism_score: realism,
            novelty_score: novelty,
            runnability_score: runnability,
            accepted,
            reasons,
        };
        if accepted {
            seen_fingerprints.insert(fingerprint);
            report.accepted.push(score);
        } else {
            report.rejected.push(score);
        }
    }
    report
}

// ============================================================================
// SECTION: Axes
// ============================================================================

/// SHA-256 over the canonical spec minus its `scenario_seed` metadata.
#[must_use]
pub fn workflow_fingerprint(spec: &Value) -> String {
    let normalized = normalized_spec(spec);
    hash_canonical_json(&normalized).unwrap_or_default()
}

/// Weighted realism rubric over objective, step count, service breadth,
/// approvals, and constraints.
#[must_use]
pub fn realism_score(spec: &Value) -> f64 {
    let mut score: f64 = 0.0;
    let has_objective = spec["objective"]["statement"]
        .as_str()
        .is_some_and(|statement| !statement.is_empty());
    if has_objective {
        score += 0.2;
    }

    if let Some(steps) = spec["steps"].as_array() {
        let count = steps.len();
        if (4..=12).contains(&count) {
            score += 0.2;
        } else if count >= 3 {
            score += 0.1;
        }
        let services: BTreeSet<String> = steps
            .iter()
            .filter_map(|step| step["tool"].as_str())
            .map(tool_service)
            .filter(|service| !service.is_empty())
            .collect();
        score += (0.1 * services.len() as f64).min(0.3);
        let has = |name: &str| services.contains(name);
        if has("browser") && has("mail") && has("slack") {
            score += 0.15;
        }
        if has("tickets") || has("docs") {
            score += 0.1;
        }
        for bonus in ["db", "crm", "erp", "okta", "servicedesk"] {
            if has(bonus) {
                score += 0.05;
            }
        }
        if has("okta") && has("servicedesk") {
            score += 0.05;
        }
    }

    if spec["approvals"].as_array().is_some_and(|a| !a.is_empty()) {
        score += 0.05;
    }
    if spec["constraints"].as_array().is_some_and(|c| !c.is_empty()) {
        score += 0.05;
    }
    score.clamp(0.0, 1.0)
}

/// Binary static runnability via compile + static validation.
#[must_use]
pub fn runnability_score(spec: &Value) -> f64 {
    match compile_workflow(spec) {
        Ok(compiled) => {
            if static_validate_workflow(&compiled, None).ok {
                1.0
            } else {
                0.0
            }
        }
        Err(_) => 0.0,
    }
}

/// Pipe-joined per-step service families.
fn structure_key(spec: &Value) -> String {
    match spec["steps"].as_array() {
        Some(steps) => steps
            .iter()
            .filter_map(|step| step["tool"].as_str())
            .map(tool_service)
            .collect::<Vec<String>>()
            .join("|"),
        None => "none".to_string(),
    }
}

/// Maps a tool name (alias prefixes included) onto its service family.
fn tool_service(tool: &str) -> String {
    let Some((service, _)) = tool.split_once('.') else {
        return String::new();
    };
    match service {
        "salesforce" | "hubspot" => "crm".to_string(),
        "xero" | "netsuite" | "dynamics" | "quickbooks" => "erp".to_string(),
        other => other.to_string(),
    }
}

/// Drops `metadata.scenario_seed` from the spec before hashing.
fn normalized_spec(spec: &Value) -> Value {
    let mut normalized = spec.clone();
    if let Some(metadata) = normalized
        .as_object_mut()
        .and_then(|object| object.get_mut("metadata"))
        .and_then(Value::as_object_mut)
    {
        metadata.remove("scenario_seed");
    }
    normalized
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

    use crate::generator::GeneratorOptions;
    use crate::generator::generate_corpus;

    use super::*;

    #[test]
    fn duplicate_fingerprints_reject_exactly_one_entry() {
        let bundle = generate_corpus(123, 1, 2, &GeneratorOptions::default());
        let original = bundle.workflows[0].clone();
        let duplicate = GeneratedWorkflowSpec {
            scenario_id: "DUP-1".to_string(),
            env_id: original.env_id.clone(),
            seed: 999,
            spec: original.spec.clone(),
        };
        let report =
            filter_workflow_corpus(&[original, duplicate], DEFAULT_REALISM_THRESHOLD);
        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert!(
            report.rejected[0]
                .reasons
                .contains(&"duplicate_fingerprint".to_string())
        );
    }

    #[test]
    fn fingerprint_ignores_the_scenario_seed() {
        let bundle = generate_corpus(5, 1, 1, &GeneratorOptions::default());
        let spec = &bundle.workflows[0].spec;
        let mut reseeded = spec.clone();
        reseeded["metadata"]["scenario_seed"] = json!(999_999);
        assert_eq!(workflow_fingerprint(spec), workflow_fingerprint(&reseeded));

        let mut renamed = spec.clone();
        renamed["name"] = json!("other-name");
        assert_ne!(workflow_fingerprint(spec), workflow_fingerprint(&renamed));
    }

    #[test]
    fn accepted_fingerprints_are_pairwise_distinct() {
        let bundle = generate_corpus(42, 2, 7, &GeneratorOptions::default());
        let report = filter_workflow_corpus(&bundle.workflows, 0.0);
        let mut fingerprints: Vec<&str> = report
            .accepted
            .iter()
            .map(|score| score.fingerprint.as_str())
            .collect();
        let total = fingerprints.len();
        fingerprints.sort_unstable();
        fingerprints.dedup();
        assert_eq!(fingerprints.len(), total);
    }

    #[test]
    fn generated_workflows_clear_the_default_realism_bar() {
        let bundle = generate_corpus(7, 1, 7, &GeneratorOptions::default());
        for workflow in &bundle.workflows {
            let realism = realism_score(&workflow.spec);
            assert!(
                realism >= DEFAULT_REALISM_THRESHOLD,
                "{}: {realism}",
                workflow.scenario_id
            );
            assert!(
                (runnability_score(&workflow.spec) - 1.0).abs() < f64::EPSILON,
                "{}",
                workflow.scenario_id
            );
        }
    }

    #[test]
    fn repeated_structures_lose_novelty() {
        let bundle = generate_corpus(11, 1, 7, &GeneratorOptions::default());
        // Repeat the same workflow structure eight times: by the sixth copy
        // novelty falls below the floor.
        let copies: Vec<GeneratedWorkflowSpec> = (0..8)
            .map(|n| {
                let mut workflow = bundle.workflows[0].clone();
                workflow.scenario_id = format!("COPY-{n}");
                workflow.spec["name"] = json!(format!("COPY-{n}"));
                workflow
            })
            .collect();
        let report = filter_workflow_corpus(&copies, 0.0);
        assert!(
            report
                .rejected
                .iter()
                .any(|score| score.reasons.iter().any(|r| r.starts_with("low_structural_novelty")))
        );
    }

    #[test]
    fn unrunnable_specs_are_rejected() {
        let spec = json!({
            "name": "broken",
            "objective": {"statement": "x"},
            "world": {"catalog": "does-not-exist"},
            "steps": [],
        });
        assert!((runnability_score(&spec) - 0.0).abs() < f64::EPSILON);
    }
}
