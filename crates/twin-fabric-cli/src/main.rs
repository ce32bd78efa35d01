// twin-fabric-cli/src/main.rs
// ============================================================================
// Module: Twin Fabric CLI
// Description: Deterministic pipeline commands over the SDK façade.
// Purpose: Generate and filter corpora, validate and run workflows, score
//          artifacts, and list catalog scenarios.
// Dependencies: clap, serde_json, twin-fabric-{config,core,sdk}
// ============================================================================

//! ## Overview
//! The CLI is the only place the process environment is read: every command
//! builds a [`RuntimeConfig`] via `from_env`, then layers its flags on top.
//! Output is JSON on stdout so the pipeline stays scriptable.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "The CLI's contract is JSON on stdout and diagnostics on stderr."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use serde_json::json;

use twin_fabric_config::RuntimeConfig;
use twin_fabric_core::FabricError;
use twin_fabric_sdk::filter_enterprise_corpus;
use twin_fabric_sdk::generate_enterprise_corpus;
use twin_fabric_sdk::list_catalog_manifests;
use twin_fabric_sdk::run_workflow_spec;
use twin_fabric_sdk::score_artifacts;
use twin_fabric_sdk::validate_workflow_spec;

// ============================================================================
// SECTION: Command Model
// ============================================================================

/// Deterministic enterprise-fabric pipeline.
#[derive(Debug, Parser)]
#[command(name = "twin-fabric", version, about = "Twin Fabric deterministic pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Corpus generation and filtering.
    Corpus {
        #[command(subcommand)]
        command: CorpusCommand,
    },
    /// Workflow validation and execution.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommand,
    },
    /// Score the trace in an artifacts directory.
    Score {
        /// Artifacts directory containing `trace.jsonl`.
        #[arg(long)]
        artifacts_dir: PathBuf,
        /// Success mode: `email` or `full`.
        #[arg(long, default_value = "email")]
        mode: String,
    },
    /// Catalog scenario listing.
    Scenarios {
        #[command(subcommand)]
        command: ScenariosCommand,
    },
}

/// Corpus subcommands.
#[derive(Debug, Subcommand)]
enum CorpusCommand {
    /// Generate a corpus bundle.
    Generate {
        /// Root seed; defaults to the configured seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Environment count.
        #[arg(long, default_value_t = 10)]
        environments: usize,
        /// Scenarios per environment.
        #[arg(long, default_value_t = 10)]
        scenarios_per_env: usize,
        /// Optional output file; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a corpus and run it through the quality filter.
    Filter {
        /// Root seed; defaults to the configured seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Environment count.
        #[arg(long, default_value_t = 10)]
        environments: usize,
        /// Scenarios per environment.
        #[arg(long, default_value_t = 10)]
        scenarios_per_env: usize,
        /// Realism acceptance threshold.
        #[arg(long, default_value_t = 0.55)]
        realism_threshold: f64,
    },
}

/// Workflow subcommands.
#[derive(Debug, Subcommand)]
enum WorkflowCommand {
    /// Statically validate a workflow spec file.
    Validate {
        /// Path to the workflow JSON.
        #[arg(long)]
        spec: PathBuf,
    },
    /// Compile and run a workflow spec file.
    Run {
        /// Path to the workflow JSON.
        #[arg(long)]
        spec: PathBuf,
        /// Run seed; defaults to the configured seed.
        #[arg(long)]
        seed: Option<u64>,
        /// Artifacts directory for trace/receipt files.
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
}

/// Scenario subcommands.
#[derive(Debug, Subcommand)]
enum ScenariosCommand {
    /// List catalog scenario manifests.
    List,
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", serde_json::to_string(&err.payload()).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FabricError> {
    // The CLI is the host edge: this is where the environment is read.
    let runtime = RuntimeConfig::from_env();
    runtime.validate()?;

    match cli.command {
        Command::Corpus { command } => match command {
            CorpusCommand::Generate {
                seed,
                environments,
                scenarios_per_env,
                out,
            } => {
                let bundle = generate_enterprise_corpus(
                    seed.unwrap_or(runtime.seed),
                    environments,
                    scenarios_per_env,
                    &runtime,
                );
                let rendered = to_pretty(&serde_json::to_value(&bundle))?;
                match out {
                    Some(path) => fs::write(&path, rendered).map_err(|err| {
                        FabricError::new("cli.io", format!("cannot write {}: {err}", path.display()))
                    })?,
                    None => println!("{rendered}"),
                }
                Ok(())
            }
            CorpusCommand::Filter {
                seed,
                environments,
                scenarios_per_env,
                realism_threshold,
            } => {
                let bundle = generate_enterprise_corpus(
                    seed.unwrap_or(runtime.seed),
                    environments,
                    scenarios_per_env,
                    &runtime,
                );
                let report = filter_enterprise_corpus(&bundle, realism_threshold);
                let summary = json!({
                    "generated": bundle.workflows.len(),
                    "accepted": report.accepted.len(),
                    "rejected": report.rejected.len(),
                    "report": report,
                });
                println!("{}", to_pretty(&Ok(summary))?);
                Ok(())
            }
        },
        Command::Workflow { command } => match command {
            WorkflowCommand::Validate { spec } => {
                let value = read_spec(&spec)?;
                let report = validate_workflow_spec(&value, None)?;
                println!("{}", to_pretty(&serde_json::to_value(&report))?);
                if report.ok { Ok(()) } else {
                    Err(FabricError::new(
                        "workflow.invalid",
                        "static validation failed",
                    ))
                }
            }
            WorkflowCommand::Run {
                spec,
                seed,
                artifacts_dir,
            } => {
                let value = read_spec(&spec)?;
                let artifacts = artifacts_dir.or_else(|| runtime.artifacts_dir.clone());
                let result = run_workflow_spec(
                    &value,
                    seed.unwrap_or(runtime.seed),
                    artifacts,
                    &runtime,
                )?;
                println!("{}", to_pretty(&serde_json::to_value(&result))?);
                if result.ok { Ok(()) } else {
                    Err(FabricError::new("workflow.run_failed", "workflow run failed"))
                }
            }
        },
        Command::Score { artifacts_dir, mode } => {
            let report = score_artifacts(&artifacts_dir, &mode)?;
            println!("{}", to_pretty(&serde_json::to_value(&report))?);
            Ok(())
        }
        Command::Scenarios { command } => match command {
            ScenariosCommand::List => {
                let manifests = list_catalog_manifests();
                println!("{}", to_pretty(&serde_json::to_value(&manifests))?);
                Ok(())
            }
        },
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads and parses a workflow spec file.
fn read_spec(path: &PathBuf) -> Result<Value, FabricError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        FabricError::new("cli.io", format!("cannot read {}: {err}", path.display()))
    })?;
    serde_json::from_str(&raw)
        .map_err(|err| FabricError::new("workflow.invalid", format!("invalid JSON: {err}")))
}

/// Renders a serialization result as pretty JSON.
fn to_pretty(value: &Result<Value, serde_json::Error>) -> Result<String, FabricError> {
    match value {
        Ok(value) => serde_json::to_string_pretty(value)
            .map_err(|err| FabricError::new("cli.serialization", err.to_string())),
        Err(err) => Err(FabricError::new("cli.serialization", err.to_string())),
    }
}
