// twin-fabric-sdk/src/lib.rs
// ============================================================================
// Module: Twin Fabric SDK
// Description: Stable high-level embedding API for fabric sessions.
// Purpose: One façade over sessions, hooks, workflows, corpora, and scoring.
// Dependencies: serde_json, twin-fabric-{config,core,corpus,router,score,
//               workflow,world}
// ============================================================================

//! ## Overview
//! Hosts embed the fabric through [`EnterpriseSession`]: construct from a
//! [`SessionConfig`], observe, call tools (with optional before/after
//! hooks), and register external tool providers. Free functions cover the
//! workflow pipeline (compile / validate / run), corpus generation and
//! filtering, scoring, and scenario manifests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;

use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::ToolProvider;
use twin_fabric_corpus::CorpusBundle;
use twin_fabric_corpus::GeneratorOptions;
use twin_fabric_corpus::QualityReport;
use twin_fabric_router::Router;
use twin_fabric_router::RouterOptions;
use twin_fabric_score::ScoreReport;
use twin_fabric_workflow::CompiledWorkflow;
use twin_fabric_workflow::RunResult;
use twin_fabric_workflow::ValidationReport;
use twin_fabric_workflow::compile_workflow;
use twin_fabric_workflow::run_compiled_workflow;
use twin_fabric_workflow::static_validate_workflow;
use twin_fabric_world::Scenario;
use twin_fabric_world::ScenarioManifest;
use twin_fabric_world::get_catalog_scenario;
use twin_fabric_world::list_scenario_manifests;

// ============================================================================
// SECTION: Session Config & Hooks
// ============================================================================

/// Construction options for an embedded session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session seed; falls back to the runtime default.
    pub seed: Option<u64>,
    /// Artifacts directory for trace/receipt files.
    pub artifacts_dir: Option<PathBuf>,
    /// Catalog scenario name, used when no explicit scenario is given.
    pub scenario_name: String,
    /// Explicit scenario override.
    pub scenario: Option<Scenario>,
    /// Host configuration.
    pub runtime: RuntimeConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: None,
            artifacts_dir: None,
            scenario_name: "multi_channel".to_string(),
            scenario: None,
            runtime: RuntimeConfig::default(),
        }
    }
}

/// Optional callbacks around each tool call.
pub trait SessionHook {
    /// Invoked before the tool executes.
    fn before_call(&mut self, tool: &str, args: &JsonMap);

    /// Invoked after the tool returns successfully.
    fn after_call(&mut self, tool: &str, args: &JsonMap, result: &Value);
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Stable high-level embedding API for fabric sessions.
pub struct EnterpriseSession {
    /// The owned router.
    router: Router,
    /// Registered hooks, invoked in registration order.
    hooks: Vec<Box<dyn SessionHook>>,
}

impl EnterpriseSession {
    /// Builds a session from configuration, resolving the catalog scenario
    /// when no explicit one is supplied.
    ///
    /// # Errors
    ///
    /// Returns catalog and router construction failures.
    pub fn new(config: SessionConfig) -> FabricResult<Self> {
        let scenario = match config.scenario {
            Some(scenario) => scenario,
            None => get_catalog_scenario(&config.scenario_name)?,
        };
        let router = Router::new(RouterOptions {
            seed: config.seed,
            artifacts_dir: config.artifacts_dir,
            scenario: Some(scenario),
            runtime: config.runtime,
        })?;
        Ok(Self {
            router,
            hooks: Vec::new(),
        })
    }

    /// The underlying router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Current observation as a JSON value.
    #[must_use]
    pub fn observe(&self, focus_hint: Option<&str>) -> Value {
        self.router.observe(focus_hint).to_value()
    }

    /// Calls a tool, running hooks around the call.
    ///
    /// # Errors
    ///
    /// Propagates the tool's structured error (after-hooks are skipped).
    pub fn call_tool(&mut self, tool: &str, args: &JsonMap) -> FabricResult<Value> {
        for hook in &mut self.hooks {
            hook.before_call(tool, args);
        }
        let result = self.router.call_and_step(tool, args)?;
        for hook in &mut self.hooks {
            hook.after_call(tool, args, &result);
        }
        Ok(result)
    }

    /// Calls a tool and returns `{result, observation}`.
    ///
    /// # Errors
    ///
    /// Propagates the tool's structured error.
    pub fn act_and_observe(&mut self, tool: &str, args: &JsonMap) -> FabricResult<Value> {
        for hook in &mut self.hooks {
            hook.before_call(tool, args);
        }
        let payload = self.router.act_and_observe(tool, args)?;
        for hook in &mut self.hooks {
            hook.after_call(tool, args, &payload);
        }
        Ok(payload)
    }

    /// Pending event counts.
    #[must_use]
    pub fn pending(&self) -> Value {
        self.router.pending_value()
    }

    /// Advances logical time.
    ///
    /// # Errors
    ///
    /// Returns trace I/O failures.
    pub fn tick(&mut self, dt_ms: u64) -> FabricResult<Value> {
        self.router.tick(dt_ms)
    }

    /// Registers an external tool provider.
    ///
    /// # Errors
    ///
    /// Returns registry errors for duplicate or reserved spec names.
    pub fn register_tool_provider(&mut self, provider: Box<dyn ToolProvider>) -> FabricResult<()> {
        self.router.register_tool_provider(provider)
    }

    /// Registers a session hook.
    pub fn register_hook(&mut self, hook: Box<dyn SessionHook>) {
        self.hooks.push(hook);
    }
}

// ============================================================================
// SECTION: Workflow Helpers
// ============================================================================

/// Compiles a workflow spec value.
///
/// # Errors
///
/// Returns workflow/world compilation failures.
pub fn compile_workflow_spec(spec: &Value) -> Result<CompiledWorkflow, FabricError> {
    compile_workflow(spec)
}

/// Compiles and statically validates a workflow spec value.
///
/// # Errors
///
/// Returns compilation failures; validation findings land in the report.
pub fn validate_workflow_spec(
    spec: &Value,
    available_tools: Option<&[String]>,
) -> Result<ValidationReport, FabricError> {
    let compiled = compile_workflow(spec)?;
    Ok(static_validate_workflow(&compiled, available_tools))
}

/// Compiles and runs a workflow spec value.
///
/// # Errors
///
/// Returns compilation and router construction failures.
pub fn run_workflow_spec(
    spec: &Value,
    seed: u64,
    artifacts_dir: Option<PathBuf>,
    runtime: &RuntimeConfig,
) -> Result<RunResult, FabricError> {
    let compiled = compile_workflow(spec)?;
    run_compiled_workflow(&compiled, seed, artifacts_dir, runtime)
}

// ============================================================================
// SECTION: Corpus & Scoring Helpers
// ============================================================================

/// Generates an enterprise corpus.
#[must_use]
pub fn generate_enterprise_corpus(
    seed: u64,
    environment_count: usize,
    scenarios_per_environment: usize,
    runtime: &RuntimeConfig,
) -> CorpusBundle {
    let options = GeneratorOptions {
        crm_alias_packs: runtime.crm_alias_packs.clone(),
    };
    twin_fabric_corpus::generate_corpus(
        seed,
        environment_count,
        scenarios_per_environment,
        &options,
    )
}

/// Filters a corpus with the quality gate.
#[must_use]
pub fn filter_enterprise_corpus(bundle: &CorpusBundle, realism_threshold: f64) -> QualityReport {
    twin_fabric_corpus::filter_workflow_corpus(&bundle.workflows, realism_threshold)
}

/// Scores the trace in an artifacts directory.
///
/// # Errors
///
/// Returns `score.*` failures for missing or malformed traces.
pub fn score_artifacts(artifacts_dir: &Path, success_mode: &str) -> Result<ScoreReport, FabricError> {
    twin_fabric_score::compute_score(artifacts_dir, success_mode)
}

/// Manifests for every catalog scenario.
#[must_use]
pub fn list_catalog_manifests() -> Vec<ScenarioManifest> {
    list_scenario_manifests()
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

    use twin_fabric_core::ToolSpec;

    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn workflow_value() -> Value {
        json!({
            "name": "sdk-contract-workflow",
            "objective": {
                "statement": "Read browser context and post approval note.",
                "success": ["context read", "approval posted"],
            },
            "world": {"catalog": "multi_channel"},
            "steps": [
                {
                    "step_id": "read",
                    "description": "Read browser state",
                    "tool": "browser.read",
                    "args": {},
                },
                {
                    "step_id": "approve",
                    "description": "Post approval in procurement channel",
                    "tool": "slack.send_message",
                    "args": {
                        "channel": "#procurement",
                        "text": "Approval request for budget $2400 with quote attached.",
                    },
                    "expect": [
                        {"kind": "result_contains", "field": "ts", "contains": ""},
                    ],
                },
            ],
            "success_assertions": [
                {"kind": "pending_max", "field": "total", "max_value": 20},
            ],
        })
    }

    #[test]
    fn session_supports_observe_and_tool_calls() {
        let mut session = EnterpriseSession::new(SessionConfig::default()).unwrap();
        let observation = session.observe(None);
        assert!(observation["action_menu"].is_array());

        let browser = session.call_tool("browser.read", &JsonMap::new()).unwrap();
        assert!(browser["url"].is_string());
        assert!(browser["title"].is_string());
    }

    /// Hook capturing call order for the hook test.
    struct RecordingHook {
        calls: std::rc::Rc<std::cell::RefCell<Vec<String>>>,
    }

    impl SessionHook for RecordingHook {
        fn before_call(&mut self, tool: &str, _args: &JsonMap) {
            self.calls.borrow_mut().push(format!("before:{tool}"));
        }

        fn after_call(&mut self, tool: &str, _args: &JsonMap, _result: &Value) {
            self.calls.borrow_mut().push(format!("after:{tool}"));
        }
    }

    #[test]
    fn hooks_run_around_every_call() {
        let calls = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mut session = EnterpriseSession::new(SessionConfig::default()).unwrap();
        session.register_hook(Box::new(RecordingHook { calls: calls.clone() }));
        session.call_tool("browser.read", &JsonMap::new()).unwrap();
        assert_eq!(
            calls.borrow().as_slice(),
            ["before:browser.read", "after:browser.read"]
        );
    }

    /// Minimal provider for the registration test.
    struct EchoProvider;

    impl ToolProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo_provider"
        }

        fn prefixes(&self) -> Vec<String> {
            vec!["ext.".to_string()]
        }

        fn specs(&self) -> Vec<ToolSpec> {
            vec![ToolSpec::new("ext.echo", "Echo payload for SDK contract tests.")]
        }

        fn call(&mut self, tool: &str, args: &JsonMap) -> FabricResult<Value> {
            if tool == "ext.echo" {
                Ok(json!({"ok": true, "payload": Value::Object(args.clone())}))
            } else {
                Err(FabricError::unknown_tool(tool))
            }
        }
    }

    #[test]
    fn custom_tool_providers_register_through_the_session() {
        let mut session = EnterpriseSession::new(SessionConfig::default()).unwrap();
        session.register_tool_provider(Box::new(EchoProvider)).unwrap();
        let result = session
            .call_tool("ext.echo", &args(json!({"message": "hello"})))
            .unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(result["payload"]["message"], "hello");
    }

    #[test]
    fn workflow_helpers_compile_validate_and_run() {
        let spec = workflow_value();
        let report = validate_workflow_spec(&spec, None).unwrap();
        assert!(report.ok);

        let result = run_workflow_spec(&spec, 7, None, &RuntimeConfig::default()).unwrap();
        assert!(result.ok);
        assert_eq!(result.steps.len(), 2);
    }

    #[test]
    fn validate_reports_unknown_tools() {
        let mut spec = workflow_value();
        spec["steps"][1]["tool"] = json!("unknown.tool");
        let report = validate_workflow_spec(
            &spec,
            Some(&["browser.read".to_string(), "slack.send_message".to_string()]),
        )
        .unwrap();
        assert!(!report.ok);
        assert!(report.issues.iter().any(|i| i.code == "tool.unavailable"));
    }

    #[test]
    fn corpus_helpers_generate_and_filter() {
        let runtime = RuntimeConfig::default();
        let bundle = generate_enterprise_corpus(42_042, 2, 3, &runtime);
        assert_eq!(bundle.workflows.len(), 6);
        let report = filter_enterprise_corpus(&bundle, 0.0);
        assert_eq!(
            report.accepted.len() + report.rejected.len(),
            bundle.workflows.len()
        );
    }

    #[test]
    fn manifest_listing_covers_the_catalog() {
        let manifests = list_catalog_manifests();
        assert!(manifests.iter().any(|m| m.name == "multi_channel"));
    }
}
