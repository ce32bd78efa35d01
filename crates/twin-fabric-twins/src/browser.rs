// twin-fabric-twins/src/browser.rs
// ============================================================================
// Module: Browser Twin
// Description: Finite directed node graph standing in for the web.
// Purpose: Give agents citeable vendor evidence without an HTML engine.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! The browser is a finite graph: nodes carry a URL, title, excerpt, and a
//! set of affordances whose ids map to destination nodes through `next`.
//! Navigation is `click`/`back`/`open`; `find` scores nodes by query-token
//! hits over title and excerpt.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::MenuEntry;
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_world::BrowserNodeSeed;
use twin_fabric_world::Scenario;

use crate::ServiceName;
use crate::decode_args;
use crate::unknown_operation;

/// Maximum history depth kept by `back`.
const MAX_HISTORY: usize = 64;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `browser.open`.
#[derive(Debug, Deserialize)]
struct OpenArgs {
    url: String,
}

/// Arguments for `browser.click`.
#[derive(Debug, Deserialize)]
struct ClickArgs {
    node_id: String,
}

/// Arguments for `browser.find`.
#[derive(Debug, Deserialize)]
struct FindArgs {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: u64,
}

fn default_top_k() -> u64 {
    10
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Finite-graph browser twin.
#[derive(Debug)]
pub struct BrowserTwin {
    /// Node graph keyed by node key.
    nodes: BTreeMap<String, BrowserNodeSeed>,
    /// Current node key.
    current: Option<String>,
    /// Bounded back-stack of node keys.
    history: Vec<String>,
}

impl BrowserTwin {
    /// Loads the node graph from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let nodes = scenario.browser_nodes.clone();
        let current = scenario
            .browser_start
            .clone()
            .filter(|key| nodes.contains_key(key))
            .or_else(|| {
                if nodes.contains_key("home") {
                    Some("home".to_string())
                } else {
                    nodes.keys().next().cloned()
                }
            });
        Self {
            nodes,
            current,
            history: Vec::new(),
        }
    }

    /// Dispatches one browser operation.
    ///
    /// # Errors
    ///
    /// Returns `browser.*` errors for unknown nodes/urls and an empty graph.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        _ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "read" => self.read(),
            "open" => self.open(&decode_args::<OpenArgs>(args)?),
            "click" => self.click(&decode_args::<ClickArgs>(args)?),
            "back" => self.back(),
            "find" => self.find(&decode_args::<FindArgs>(args)?),
            other => Err(unknown_operation(ServiceName::Browser, other)),
        }
    }

    fn read(&self) -> FabricResult<Value> {
        let (key, node) = self.current_node()?;
        Ok(node_payload(key, node))
    }

    fn open(&mut self, args: &OpenArgs) -> FabricResult<Value> {
        let target = self
            .nodes
            .iter()
            .find(|(_, node)| node.url == args.url)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                FabricError::new("browser.unknown_url", format!("no page at: {}", args.url))
            })?;
        self.navigate_to(target);
        self.read()
    }

    fn click(&mut self, args: &ClickArgs) -> FabricResult<Value> {
        let (_, node) = self.current_node()?;
        let destination = node.next.get(&args.node_id).cloned().ok_or_else(|| {
            FabricError::new(
                "browser.unknown_node",
                format!("no affordance here: {}", args.node_id),
            )
        })?;
        if !self.nodes.contains_key(&destination) {
            return Err(FabricError::new(
                "browser.unknown_node",
                format!("dangling edge to: {destination}"),
            ));
        }
        self.navigate_to(destination);
        self.read()
    }

    fn back(&mut self) -> FabricResult<Value> {
        if let Some(previous) = self.history.pop() {
            self.current = Some(previous);
        }
        self.read()
    }

    fn find(&self, args: &FindArgs) -> FabricResult<Value> {
        let needle = args.query.trim().to_lowercase();
        let tokens: Vec<&str> = needle.split_whitespace().collect();
        let mut results: Vec<(u64, Value)> = Vec::new();
        if !tokens.is_empty() {
            for (key, node) in &self.nodes {
                let haystack =
                    format!("{} {}", node.title.to_lowercase(), node.excerpt.to_lowercase());
                let score = tokens
                    .iter()
                    .filter(|token| haystack.contains(**token))
                    .count() as u64;
                if score > 0 {
                    results.push((
                        score,
                        json!({
                            "node_id": key,
                            "url": node.url,
                            "title": node.title,
                            "score": score,
                        }),
                    ));
                }
            }
        }
        results.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| {
                a.1["node_id"]
                    .as_str()
                    .unwrap_or_default()
                    .cmp(b.1["node_id"].as_str().unwrap_or_default())
            })
        });
        let top: Vec<Value> = results
            .into_iter()
            .take(args.top_k as usize)
            .map(|(_, row)| row)
            .collect();
        Ok(json!({"query": args.query, "results": top, "count": top.len()}))
    }

    fn navigate_to(&mut self, target: String) {
        if let Some(current) = self.current.take() {
            self.history.push(current);
            if self.history.len() > MAX_HISTORY {
                self.history.remove(0);
            }
        }
        self.current = Some(target);
    }

    fn current_node(&self) -> FabricResult<(&String, &BrowserNodeSeed)> {
        let key = self.current.as_ref().ok_or_else(|| {
            FabricError::new("browser.no_page", "the browser graph is empty")
        })?;
        let node = self.nodes.get(key).ok_or_else(|| {
            FabricError::new("browser.no_page", format!("current node vanished: {key}"))
        })?;
        Ok((key, node))
    }

    /// Observation menu contribution: affordances at the current node.
    #[must_use]
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        match self.current_node() {
            Ok((_, node)) => node
                .affordances
                .iter()
                .map(|affordance| MenuEntry::new(affordance.tool.clone(), affordance.args.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.current_node() {
            Ok((_, node)) => format!("Browser: {}", node.title),
            Err(_) => "Browser: no page".to_string(),
        }
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        json!({
            "node_count": self.nodes.len(),
            "current": self.current,
            "history_depth": self.history.len(),
        })
    }
}

/// Full payload for one node.
fn node_payload(key: &str, node: &BrowserNodeSeed) -> Value {
    json!({
        "node_id": key,
        "url": node.url,
        "title": node.title,
        "excerpt": node.excerpt,
        "affordances": node.affordances,
    })
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the browser twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("browser.read", "Read the current page.")
            .with_permissions(&["web:read"])
            .with_latency(80, 20),
        ToolSpec::new("browser.open", "Open a URL in the node graph.")
            .with_permissions(&["web:read"])
            .with_latency(180, 60),
        ToolSpec::new("browser.click", "Follow an affordance on the current page.")
            .with_permissions(&["web:read"])
            .with_latency(160, 50),
        ToolSpec::new("browser.back", "Navigate back through bounded history.")
            .with_permissions(&["web:read"])
            .with_latency(90, 20),
        ToolSpec::new("browser.find", "Search page titles and excerpts.")
            .with_permissions(&["web:read"])
            .with_latency(130, 40),
    ]
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

    use twin_fabric_core::DeterministicRng;
    use twin_fabric_world::catalog::baseline;

    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn click_navigates_and_back_returns() {
        let mut twin = BrowserTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let home = twin.dispatch("read", &JsonMap::new(), &mut ctx).unwrap();
        assert_eq!(home["node_id"], "home");

        let vendor = twin
            .dispatch(
                "click",
                &args(json!({"node_id": "CLICK:open_vendor_1#0"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(vendor["node_id"], "vendor_1");
        assert!(vendor["excerpt"].as_str().unwrap().contains("$3,199"));

        let again = twin.dispatch("back", &JsonMap::new(), &mut ctx).unwrap();
        assert_eq!(again["node_id"], "home");
    }

    #[test]
    fn unknown_affordances_and_urls_are_rejected() {
        let mut twin = BrowserTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);

        let err = twin
            .dispatch("click", &args(json!({"node_id": "CLICK:nope#9"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "browser.unknown_node");

        let err = twin
            .dispatch("open", &args(json!({"url": "https://vweb.local/404"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "browser.unknown_url");
    }

    #[test]
    fn find_ranks_by_token_hits_with_stable_ties() {
        let mut twin = BrowserTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let found = twin
            .dispatch("find", &args(json!({"query": "macrobook pro"})), &mut ctx)
            .unwrap();
        let results = found["results"].as_array().unwrap();
        assert!(!results.is_empty());
        assert_eq!(results[0]["node_id"], "vendor_1");
    }

    #[test]
    fn back_on_empty_history_stays_put() {
        let mut twin = BrowserTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let page = twin.dispatch("back", &JsonMap::new(), &mut ctx).unwrap();
        assert_eq!(page["node_id"], "home");
    }
}
