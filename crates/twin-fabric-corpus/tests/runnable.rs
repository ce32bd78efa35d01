// twin-fabric-corpus/tests/runnable.rs
// ============================================================================
// Module: Generated-Corpus Runnability Tests
// Description: Every generated workflow executes cleanly in sim mode.
// Purpose: Keep the generator honest against the live tool surface.
// Dependencies: twin-fabric-corpus, twin-fabric-workflow, twin-fabric-config
// ============================================================================

//! ## Overview
//! Compiles and runs one scenario of every family end to end with no fault
//! injection; all steps and assertions must pass.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use twin_fabric_config::RuntimeConfig;
use twin_fabric_corpus::GeneratorOptions;
use twin_fabric_corpus::generate_corpus;
use twin_fabric_workflow::compile_workflow;
use twin_fabric_workflow::run_compiled_workflow;

#[test]
fn every_family_runs_clean_without_random_faults() {
    let bundle = generate_corpus(123, 1, 7, &GeneratorOptions::default());
    assert_eq!(bundle.workflows.len(), 7);

    for workflow in &bundle.workflows {
        let compiled = compile_workflow(&workflow.spec).unwrap();
        let result = run_compiled_workflow(
            &compiled,
            workflow.seed,
            None,
            &RuntimeConfig::default(),
        )
        .unwrap();
        assert!(
            result.ok,
            "{} failed: {:?}",
            workflow.scenario_id, result.dynamic_validation
        );
        assert!(result.steps.iter().all(|step| step.ok), "{}", workflow.scenario_id);
    }
}

#[test]
fn corpus_runs_are_reproducible_across_generations() {
    let options = GeneratorOptions::default();
    let first = generate_corpus(321, 1, 3, &options);
    let second = generate_corpus(321, 1, 3, &options);

    for (a, b) in first.workflows.iter().zip(second.workflows.iter()) {
        let result_a = run_compiled_workflow(
            &compile_workflow(&a.spec).unwrap(),
            a.seed,
            None,
            &RuntimeConfig::default(),
        )
        .unwrap();
        let result_b = run_compiled_workflow(
            &compile_workflow(&b.spec).unwrap(),
            b.seed,
            None,
            &RuntimeConfig::default(),
        )
        .unwrap();
        assert_eq!(result_a.metadata["state_head"], result_b.metadata["state_head"]);
        assert_eq!(result_a.metadata["time_ms"], result_b.metadata["time_ms"]);
    }
}
