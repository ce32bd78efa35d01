// twin-fabric-router/src/router.rs
// ============================================================================
// Module: Router
// Description: Deterministic tool dispatcher over bus, twins, and
//              connectors.
// Purpose: One canonical execution path per session.
// Dependencies: serde, serde_json, twin-fabric-{config,connectors,core,
//               twins,world}
// ============================================================================

//! ## Overview
//! The router owns everything a session needs: the logical clock and bus,
//! the seeded RNG, the append-only trace, the twin population (exclusively,
//! behind `Rc<RefCell<…>>` so the connector runtime can hold a weak
//! reference), the connector runtime, the tool registry, alias forwarding,
//! and any externally registered tool providers.
//!
//! A session is a single-threaded actor: tool calls are strictly serialized
//! and the clock only advances through an explicit `tick` or the bounded
//! latency charged after each successful call.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_config::RuntimeConfig;
use twin_fabric_connectors::ConnectorRuntime;
use twin_fabric_core::DeterministicRng;
use twin_fabric_core::EventBus;
use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::MenuEntry;
use twin_fabric_core::Observation;
use twin_fabric_core::PendingSummary;
use twin_fabric_core::RESERVED_TOOL_NAMES;
use twin_fabric_core::ToolProvider;
use twin_fabric_core::ToolRegistry;
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TraceLog;
use twin_fabric_core::TraceRecord;
use twin_fabric_core::TwinContext;
use twin_fabric_core::hash_canonical_json;
use twin_fabric_twins::ServiceName;
use twin_fabric_twins::TwinOptions;
use twin_fabric_twins::TwinSet;
use twin_fabric_world::Scenario;
use twin_fabric_world::catalog::baseline;

use crate::aliases::crm_alias_pack;
use crate::aliases::erp_alias_pack;
use crate::aliases::focus_for_tool;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Construction options for a router session.
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    /// Session seed; falls back to the runtime config default.
    pub seed: Option<u64>,
    /// Artifacts directory for trace/receipt files.
    pub artifacts_dir: Option<PathBuf>,
    /// Seeded world; falls back to the baseline scenario.
    pub scenario: Option<Scenario>,
    /// Host configuration.
    pub runtime: RuntimeConfig,
}

// ============================================================================
// SECTION: Reserved-Surface Arguments
// ============================================================================

/// Arguments for `observe`.
#[derive(Debug, Deserialize)]
struct ObserveArgs {
    #[serde(default)]
    focus: Option<String>,
}

/// Arguments for `tick`.
#[derive(Debug, Deserialize)]
struct TickArgs {
    #[serde(default = "default_tick_ms")]
    dt_ms: u64,
}

/// Arguments for `state`.
#[derive(Debug, Deserialize)]
struct StateArgs {
    #[serde(default)]
    include_state: bool,
    #[serde(default = "default_tool_tail")]
    tool_tail: usize,
    #[serde(default = "default_true")]
    include_receipts: bool,
}

/// Arguments for `tools.search`.
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
}

/// Arguments for `act_and_observe` and `call`.
#[derive(Debug, Deserialize)]
struct NestedCallArgs {
    tool: String,
    #[serde(default)]
    args: JsonMap,
}

/// Arguments for `reset`.
#[derive(Debug, Deserialize)]
struct ResetArgs {
    #[serde(default)]
    seed: Option<u64>,
}

fn default_tick_ms() -> u64 {
    1_000
}

fn default_tool_tail() -> usize {
    20
}

fn default_top_k() -> usize {
    10
}

fn default_true() -> bool {
    true
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Deterministic session router.
pub struct Router {
    /// Session seed.
    seed: u64,
    /// Host configuration (kept for `reset`).
    runtime: RuntimeConfig,
    /// Seeded world (kept for `reset`).
    scenario: Scenario,
    /// Artifacts directory (kept for `reset`).
    artifacts_dir: Option<PathBuf>,
    /// Logical clock and event queue.
    bus: EventBus,
    /// Session RNG; the only randomness source.
    rng: DeterministicRng,
    /// Append-only session trace.
    trace: TraceLog,
    /// The twin population; exclusively owned here.
    twins: Rc<RefCell<TwinSet>>,
    /// Policy-gated connector runtime (holds a weak twin reference).
    connectors: ConnectorRuntime,
    /// Tool registry.
    registry: ToolRegistry,
    /// Externally registered providers.
    providers: Vec<Box<dyn ToolProvider>>,
    /// Alias → canonical tool names.
    aliases: BTreeMap<String, String>,
    /// Per-tool fault probability overrides.
    fault_overrides: BTreeMap<String, f64>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("seed", &self.seed)
            .field("clock_ms", &self.bus.clock_ms())
            .field("tool_count", &self.registry.names().len())
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Builds a session from options, seeding twins, registry, aliases, and
    /// the initial schedule.
    ///
    /// # Errors
    ///
    /// Returns configuration, registry, or artifact I/O errors.
    pub fn new(options: RouterOptions) -> FabricResult<Self> {
        options.runtime.validate()?;
        let seed = options.seed.unwrap_or(options.runtime.seed);
        let scenario = options.scenario.unwrap_or_else(baseline);
        let artifacts_dir = options.artifacts_dir;

        let twins = Rc::new(RefCell::new(TwinSet::from_scenario(
            &scenario,
            TwinOptions {
                erp_error_rate: options.runtime.erp_error_rate,
                crm_error_rate: options.runtime.crm_error_rate,
            },
        )));
        let connectors = ConnectorRuntime::new(
            Rc::downgrade(&twins),
            &options.runtime,
            artifacts_dir.as_deref(),
        )?;
        let trace = TraceLog::new(artifacts_dir.as_deref())?;

        let mut registry = ToolRegistry::new();
        for spec in TwinSet::tool_specs() {
            registry.register(spec)?;
        }
        let mut aliases = BTreeMap::new();
        for pack in &options.runtime.erp_alias_packs {
            register_alias_pack(&mut registry, &mut aliases, erp_alias_pack(pack));
        }
        for pack in &options.runtime.crm_alias_packs {
            register_alias_pack(&mut registry, &mut aliases, crm_alias_pack(pack));
        }

        let mut bus = EventBus::new();
        for derail in &scenario.derail_events {
            bus.schedule(derail.dt_ms, derail.target.clone(), derail.payload.clone());
        }
        if let Some(kickoff) = &scenario.slack_initial_message {
            bus.schedule(
                kickoff.dt_ms,
                "slack",
                json!({
                    "channel": kickoff.channel,
                    "user": kickoff.user,
                    "text": kickoff.text,
                }),
            );
        }

        Ok(Self {
            seed,
            runtime: options.runtime,
            scenario,
            artifacts_dir,
            bus,
            rng: DeterministicRng::from_seed(seed),
            trace,
            twins,
            connectors,
            registry,
            providers: Vec::new(),
            aliases,
            fault_overrides: BTreeMap::new(),
        })
    }

    /// Builds a default session from a bare seed (tests and demos).
    ///
    /// # Errors
    ///
    /// Propagates [`Router::new`] failures.
    pub fn from_seed(seed: u64) -> FabricResult<Self> {
        Self::new(RouterOptions {
            seed: Some(seed),
            ..RouterOptions::default()
        })
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Current logical time.
    #[must_use]
    pub fn clock_ms(&self) -> u64 {
        self.bus.clock_ms()
    }

    /// Session seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The session trace.
    #[must_use]
    pub fn trace(&self) -> &TraceLog {
        &self.trace
    }

    /// The seeded world this session started from.
    #[must_use]
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Queue depth per target without advancing the clock.
    #[must_use]
    pub fn pending(&self) -> PendingSummary {
        self.bus.pending()
    }

    /// Pending counts as the wire payload, zero-filled for every service so
    /// drained targets still report `0`.
    #[must_use]
    pub fn pending_value(&self) -> Value {
        let summary = self.bus.pending();
        let mut map = serde_json::Map::new();
        for service in twin_fabric_twins::ALL_SERVICES {
            map.insert(
                service.as_str().to_string(),
                json!(summary.count_for(service.as_str())),
            );
        }
        for (target, count) in &summary.by_target {
            map.insert(target.clone(), json!(count));
        }
        map.insert("total".to_string(), json!(summary.total));
        Value::Object(map)
    }

    /// Overrides the fault probability for one tool.
    pub fn set_fault_override(&mut self, tool: &str, probability: f64) {
        self.fault_overrides.insert(tool.to_string(), probability);
    }

    /// Schedules a raw bus event (scenario tooling and tests).
    pub fn schedule_event(&mut self, dt_ms: u64, target: &str, payload: Value) -> u64 {
        self.bus.schedule(dt_ms, target, payload)
    }

    // ------------------------------------------------------------------
    // Tool-call surface
    // ------------------------------------------------------------------

    /// Executes a tool call, appends it to the trace, and charges a bounded
    /// deterministic latency on success.
    ///
    /// # Errors
    ///
    /// Returns the structured error for the failed call after recording it.
    pub fn call_and_step(&mut self, tool: &str, args: &JsonMap) -> FabricResult<Value> {
        let resolved = self
            .aliases
            .get(tool)
            .cloned()
            .unwrap_or_else(|| tool.to_string());

        if RESERVED_TOOL_NAMES.contains(&resolved.as_str()) {
            return self.dispatch_reserved(&resolved, args);
        }

        let Some(spec) = self.registry.get(&resolved).cloned() else {
            let err = FabricError::unknown_tool(tool);
            self.trace_call(tool, args, &err.payload(), 0)?;
            return Err(err);
        };

        let fault_rate = self
            .fault_overrides
            .get(&resolved)
            .copied()
            .unwrap_or(spec.fault_probability);
        if fault_rate > 0.0 && self.rng.next_f64() < fault_rate {
            let err = FabricError::new(
                "transient_failure",
                format!("injected fault for {resolved}"),
            );
            self.trace_call(tool, args, &err.payload(), 0)?;
            return Err(err);
        }

        let now = self.bus.clock_ms();
        let (outcome, scheduled) = {
            let mut ctx = TwinContext::new(now, &mut self.rng);
            let outcome = if self.connectors.managed_tool(&resolved) {
                self.connectors.invoke(&resolved, args, &mut ctx)
            } else if let Some(operation) = resolved.strip_prefix("browser.") {
                self.twins
                    .borrow_mut()
                    .dispatch(ServiceName::Browser, operation, args, &mut ctx)
            } else {
                match self
                    .providers
                    .iter_mut()
                    .find(|provider| provider.handles(&resolved))
                {
                    Some(provider) => provider.call(&resolved, args),
                    None => Err(FabricError::unknown_tool(tool)),
                }
            };
            let scheduled = ctx.take_scheduled();
            (outcome, scheduled)
        };
        for request in scheduled {
            self.bus.schedule(request.dt_ms, request.target, request.payload);
        }

        match outcome {
            Ok(data) => {
                let latency_ms = self.draw_latency(&spec);
                self.trace_call(tool, args, &data, latency_ms)?;
                self.advance_and_deliver(latency_ms)?;
                Ok(data)
            }
            Err(err) => {
                self.trace_call(tool, args, &err.payload(), 0)?;
                Err(err)
            }
        }
    }

    /// `call_and_step` followed by an observation focused by the tool
    /// prefix.
    ///
    /// # Errors
    ///
    /// Propagates the call failure without observing.
    pub fn act_and_observe(&mut self, tool: &str, args: &JsonMap) -> FabricResult<Value> {
        let result = self.call_and_step(tool, args)?;
        let observation = self.observe(Some(focus_for_tool(tool)));
        Ok(json!({"result": result, "observation": observation.to_value()}))
    }

    /// Advances the clock and delivers due events.
    ///
    /// # Errors
    ///
    /// Returns trace I/O failures.
    pub fn tick(&mut self, dt_ms: u64) -> FabricResult<Value> {
        let delivered = self.advance_and_deliver(dt_ms)?;
        Ok(json!({
            "delivered": delivered,
            "pending": self.pending_value(),
        }))
    }

    /// Builds the current observation without advancing time.
    #[must_use]
    pub fn observe(&self, focus_hint: Option<&str>) -> Observation {
        let twins = self.twins.borrow();
        let focus = focus_hint.unwrap_or("browser").to_string();
        let groups: Vec<(&str, Vec<MenuEntry>)> = vec![
            ("browser", twins.browser.menu_entries()),
            ("docs", twins.docs.menu_entries()),
            ("mail", twins.mail.menu_entries()),
            ("slack", twins.slack.menu_entries()),
            ("tickets", twins.tickets.menu_entries()),
        ];
        let mut action_menu: Vec<MenuEntry> = groups
            .iter()
            .filter(|(family, _)| *family == focus)
            .flat_map(|(_, entries)| entries.clone())
            .collect();
        let mut rest: Vec<MenuEntry> = groups
            .iter()
            .filter(|(family, _)| *family != focus)
            .flat_map(|(_, entries)| entries.clone())
            .collect();
        rest.sort_by(|a, b| a.tool.cmp(&b.tool));
        action_menu.extend(rest);

        let summary = format!(
            "{} | {} | {} | {}",
            twins.browser.summary(),
            twins.mail.summary(),
            twins.slack.summary(),
            twins.tickets.summary(),
        );
        Observation {
            time_ms: self.bus.clock_ms(),
            focus,
            summary,
            action_menu,
            pending_events: self.pending_value(),
        }
    }

    /// Ranks registered tools against a query.
    #[must_use]
    pub fn search_tools(&self, query: &str, top_k: usize) -> Value {
        let results: Vec<Value> = self
            .registry
            .search(query, top_k)
            .into_iter()
            .map(|(name, description, score)| {
                json!({"name": name, "description": description, "score": score})
            })
            .collect();
        json!({"query": query, "results": results})
    }

    /// Registers an external tool provider and its specs.
    ///
    /// # Errors
    ///
    /// Returns registry errors for duplicate or reserved spec names.
    pub fn register_tool_provider(&mut self, provider: Box<dyn ToolProvider>) -> FabricResult<()> {
        for spec in provider.specs() {
            self.registry.register(spec)?;
        }
        self.providers.push(provider);
        Ok(())
    }

    /// Snapshot of trace tail, receipts, and hashed twin state.
    ///
    /// # Errors
    ///
    /// Returns hashing failures.
    pub fn state_snapshot(
        &self,
        include_state: bool,
        tool_tail: usize,
        include_receipts: bool,
    ) -> FabricResult<Value> {
        let digests = self.twins.borrow().digests();
        let state_head = hash_canonical_json(&digests)?;
        let mut connectors = json!({
            "mode": self.connectors.mode().as_str(),
            "last_receipt": self.connectors.last_receipt(),
        });
        if include_receipts
            && let Some(object) = connectors.as_object_mut()
        {
            object.insert(
                "receipts".to_string(),
                Value::Array(self.connectors.receipt_tail(20)),
            );
        }
        let mut snapshot = json!({
            "time_ms": self.bus.clock_ms(),
            "seed": self.seed,
            "state_head": state_head,
            "tools": self.trace.call_tail(tool_tail),
            "connectors": connectors,
        });
        if include_state
            && let Some(object) = snapshot.as_object_mut()
        {
            object.insert("state".to_string(), digests);
        }
        Ok(snapshot)
    }

    /// Usage help for interactive callers.
    #[must_use]
    pub fn help_payload(&self) -> Value {
        json!({
            "name": "twin-fabric router",
            "instructions": "Call tools by name with JSON arguments; use \
                             observe for the action menu, tick to advance \
                             logical time, and state for receipts and trace.",
            "reserved_tools": RESERVED_TOOL_NAMES,
            "tool_count": self.registry.names().len(),
            "examples": [
                {"tool": "browser.read", "args": {}},
                {"tool": "mail.compose", "args": {
                    "to": "sales@macrocompute.example",
                    "subj": "Quote request",
                    "body_text": "Please send latest price and ETA.",
                }},
                {"tool": "tick", "args": {"dt_ms": 15000}},
            ],
        })
    }

    /// Rebuilds the session in place with the preserved scenario and an
    /// optional new seed.
    ///
    /// # Errors
    ///
    /// Propagates construction failures; on error the old session state is
    /// preserved.
    pub fn reset(&mut self, seed: Option<u64>) -> FabricResult<Value> {
        let next_seed = seed.unwrap_or(self.seed);
        let rebuilt = Self::new(RouterOptions {
            seed: Some(next_seed),
            artifacts_dir: self.artifacts_dir.clone(),
            scenario: Some(self.scenario.clone()),
            runtime: self.runtime.clone(),
        })?;
        *self = rebuilt;
        Ok(json!({"ok": true, "seed": next_seed, "time_ms": self.bus.clock_ms()}))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Handles the reserved router surface. Reserved operations are meta:
    /// they neither advance the clock nor append call records (except the
    /// nested call executed by `call`/`act_and_observe`).
    fn dispatch_reserved(&mut self, name: &str, args: &JsonMap) -> FabricResult<Value> {
        match name {
            "observe" => {
                let parsed: ObserveArgs = decode_args(args)?;
                Ok(self.observe(parsed.focus.as_deref()).to_value())
            }
            "tick" => {
                let parsed: TickArgs = decode_args(args)?;
                self.tick(parsed.dt_ms)
            }
            "pending" => Ok(self.pending_value()),
            "state" => {
                let parsed: StateArgs = decode_args(args)?;
                self.state_snapshot(
                    parsed.include_state,
                    parsed.tool_tail,
                    parsed.include_receipts,
                )
            }
            "help" => Ok(self.help_payload()),
            "tools.search" => {
                let parsed: SearchArgs = decode_args(args)?;
                Ok(self.search_tools(&parsed.query, parsed.top_k))
            }
            "act_and_observe" => {
                let parsed: NestedCallArgs = decode_args(args)?;
                self.act_and_observe(&parsed.tool, &parsed.args)
            }
            "call" => {
                let parsed: NestedCallArgs = decode_args(args)?;
                self.call_and_step(&parsed.tool, &parsed.args)
            }
            "reset" => {
                let parsed: ResetArgs = decode_args(args)?;
                self.reset(parsed.seed)
            }
            other => Err(FabricError::unknown_tool(other)),
        }
    }

    /// Draws the bounded deterministic latency for one spec.
    fn draw_latency(&mut self, spec: &ToolSpec) -> u64 {
        let lo = spec.default_latency_ms.saturating_sub(spec.latency_jitter_ms);
        let hi = spec.default_latency_ms.saturating_add(spec.latency_jitter_ms);
        self.rng.range_u64(lo, hi)
    }

    /// Appends one call record.
    fn trace_call(
        &mut self,
        tool: &str,
        args: &JsonMap,
        response: &Value,
        latency_ms: u64,
    ) -> FabricResult<()> {
        self.trace.append(TraceRecord::Call {
            time_ms: self.bus.clock_ms(),
            tool: tool.to_string(),
            args: Value::Object(args.clone()),
            response: response.clone(),
            latency_ms,
        })
    }

    /// Advances the clock and delivers the due batch, tracing each event.
    fn advance_and_deliver(&mut self, dt_ms: u64) -> FabricResult<BTreeMap<String, u64>> {
        let due = self.bus.advance(dt_ms);
        let mut delivered: BTreeMap<String, u64> = BTreeMap::new();
        for event in due {
            self.trace.append(TraceRecord::Event {
                time_ms: event.time_ms,
                target: event.target.clone(),
                payload: event.payload.clone(),
            })?;
            let (outcome, scheduled) = {
                let mut ctx = TwinContext::new(self.bus.clock_ms(), &mut self.rng);
                let outcome =
                    self.twins
                        .borrow_mut()
                        .deliver(&event.target, &event.payload, &mut ctx);
                (outcome, ctx.take_scheduled())
            };
            for request in scheduled {
                self.bus.schedule(request.dt_ms, request.target, request.payload);
            }
            *delivered.entry(event.target.clone()).or_insert(0) += 1;
            match outcome {
                None => {
                    self.trace.append(TraceRecord::Warning {
                        time_ms: event.time_ms,
                        code: "bus.unknown_target".to_string(),
                        target: Some(event.target),
                    })?;
                }
                Some(Err(_)) => {
                    self.trace.append(TraceRecord::Warning {
                        time_ms: event.time_ms,
                        code: "delivery.failed".to_string(),
                        target: Some(event.target),
                    })?;
                }
                Some(Ok(_)) => {}
            }
        }
        Ok(delivered)
    }
}

/// Registers one alias pack, skipping names that already exist.
fn register_alias_pack(
    registry: &mut ToolRegistry,
    aliases: &mut BTreeMap<String, String>,
    pack: &[(&str, &str)],
) {
    for (alias, canonical) in pack {
        let Some(base) = registry.get(canonical) else {
            continue;
        };
        let mut spec = base.clone();
        spec.name = (*alias).to_string();
        spec.description = format!("Alias → {canonical}. {}", base.description);
        if registry.register(spec).is_ok() {
            aliases.insert((*alias).to_string(), (*canonical).to_string());
        }
    }
}

/// Decodes reserved-surface arguments.
fn decode_args<T: serde::de::DeserializeOwned>(args: &JsonMap) -> FabricResult<T> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|err| FabricError::invalid_args(err.to_string()))
}
