// twin-fabric-twins/src/docs.rs
// ============================================================================
// Module: Docs Twin
// Description: Versioned knowledge-base documents with lifecycle status.
// Purpose: Capture quotes and policies with a monotone version history.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Documents carry `{DRAFT, ACTIVE, ARCHIVED}` status and a version that
//! strictly increases on every mutation alongside `updated_ms`. Search ranks
//! by query-token hit count over title and body with a stable title tiebreak.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::MenuEntry;
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_core::page;
use twin_fabric_world::Scenario;

use crate::ServiceName;
use crate::decode_args;
use crate::seeded_seq;
use crate::unknown_operation;

/// Valid document lifecycle states.
const VALID_STATUSES: &[&str] = &["DRAFT", "ACTIVE", "ARCHIVED"];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One knowledge-base document.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    /// Stable id (`DOC-…`).
    doc_id: String,
    /// Title.
    title: String,
    /// Body text.
    body: String,
    /// Tags.
    tags: Vec<String>,
    /// Owning user.
    owner: String,
    /// Lifecycle status.
    status: String,
    /// Monotone version, starting at 1.
    version: u64,
    /// Creation time.
    created_ms: u64,
    /// Last mutation time; strictly increases per mutation.
    updated_ms: u64,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `docs.list`.
#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
    #[serde(default)]
    legacy: bool,
}

/// Arguments for `docs.read`.
#[derive(Debug, Deserialize)]
struct ReadArgs {
    doc_id: String,
}

/// Arguments for `docs.search`.
#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Arguments for `docs.create`.
#[derive(Debug, Deserialize)]
struct CreateArgs {
    title: String,
    body: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Arguments for `docs.update`.
#[derive(Debug, Deserialize)]
struct UpdateArgs {
    doc_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Versioned document store twin.
#[derive(Debug)]
pub struct DocsTwin {
    /// Documents keyed by id.
    docs: BTreeMap<String, Document>,
    /// Next `DOC-` counter value.
    seq: u64,
}

impl DocsTwin {
    /// Seeds documents from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut docs = BTreeMap::new();
        for (doc_id, seed) in &scenario.documents {
            docs.insert(
                doc_id.clone(),
                Document {
                    doc_id: doc_id.clone(),
                    title: seed.title.clone(),
                    body: seed.body.clone(),
                    tags: seed.tags.clone(),
                    owner: seed.owner.clone().unwrap_or_else(|| "system".to_string()),
                    status: seed
                        .status
                        .clone()
                        .unwrap_or_else(|| "ACTIVE".to_string()),
                    version: 1,
                    created_ms: 0,
                    updated_ms: 0,
                },
            );
        }
        let seq = seeded_seq(docs.keys(), "DOC-");
        Self { docs, seq }
    }

    /// Dispatches one docs operation.
    ///
    /// # Errors
    ///
    /// Returns `unknown_document`, `invalid_args`, or `unknown_operation`.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list" => self.list(decode_args(args)?),
            "read" => self.read(&decode_args::<ReadArgs>(args)?),
            "search" => self.search(decode_args(args)?),
            "create" => self.create(decode_args(args)?, ctx),
            "update" => self.update(decode_args(args)?, ctx),
            other => Err(unknown_operation(ServiceName::Docs, other)),
        }
    }

    /// Applies a scheduled delivery: an explicit `op` is authoritative; a
    /// bare payload carrying a known `doc_id` updates, anything else creates.
    ///
    /// # Errors
    ///
    /// Returns `docs.invalid_event` for payloads that fit neither shape.
    pub fn deliver(&mut self, payload: &Value, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let object = payload
            .as_object()
            .ok_or_else(|| FabricError::new("docs.invalid_event", "payload must be an object"))?;
        let op = object.get("op").and_then(Value::as_str);
        let doc_id = object.get("doc_id").and_then(Value::as_str);
        let mut args = object.clone();
        args.remove("op");

        let is_update = match op {
            Some("update") => true,
            Some("create") => false,
            Some(other) => {
                return Err(FabricError::new(
                    "docs.invalid_event",
                    format!("unsupported docs delivery op: {other}"),
                ));
            }
            None => doc_id.is_some_and(|id| self.docs.contains_key(id)),
        };
        if is_update {
            if doc_id.is_none() {
                return Err(FabricError::new(
                    "docs.invalid_event",
                    "docs update delivery requires doc_id",
                ));
            }
            return self.update(decode_args(&args)?, ctx);
        }
        if !object.contains_key("title") || !object.contains_key("body") {
            return Err(FabricError::new(
                "docs.invalid_event",
                "docs delivery requires title/body for create",
            ));
        }
        args.remove("doc_id");
        self.create(decode_args(&args)?, ctx)
    }

    fn list(&self, args: ListArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let mut rows: Vec<Value> = self
            .docs
            .values()
            .filter(|doc| {
                (needle.is_empty()
                    || doc.title.to_lowercase().contains(&needle)
                    || doc.body.to_lowercase().contains(&needle))
                    && args
                        .tag
                        .as_ref()
                        .is_none_or(|tag| doc.tags.iter().any(|t| t == tag))
                    && wanted_status
                        .as_ref()
                        .is_none_or(|status| &doc.status == status)
                    && args.owner.as_ref().is_none_or(|owner| &doc.owner == owner)
            })
            .filter_map(|doc| serde_json::to_value(doc).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("created_ms" | "title" | "version")) => field,
            _ => "updated_ms",
        };
        let descending = args.sort_dir.as_deref() != Some("asc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "documents",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn read(&self, args: &ReadArgs) -> FabricResult<Value> {
        let doc = self
            .docs
            .get(&args.doc_id)
            .ok_or_else(|| unknown_document(&args.doc_id))?;
        serde_json::to_value(doc)
            .map_err(|err| FabricError::new("docs.serialization", err.to_string()))
    }

    fn search(&self, args: SearchArgs) -> FabricResult<Value> {
        let needle = args.query.trim().to_lowercase();
        let tokens: Vec<&str> = needle.split_whitespace().collect();
        let mut scored: Vec<(u64, Value)> = Vec::new();
        if !tokens.is_empty() {
            for doc in self.docs.values() {
                let haystack =
                    format!("{} {}", doc.title.to_lowercase(), doc.body.to_lowercase());
                let score = tokens
                    .iter()
                    .filter(|token| haystack.contains(**token))
                    .count() as u64;
                if score > 0 {
                    scored.push((
                        score,
                        json!({"doc_id": doc.doc_id, "title": doc.title, "score": score}),
                    ));
                }
            }
        }
        scored.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| {
                let ta = a.1["title"].as_str().unwrap_or_default();
                let tb = b.1["title"].as_str().unwrap_or_default();
                ta.cmp(tb).then_with(|| {
                    a.1["doc_id"]
                        .as_str()
                        .unwrap_or_default()
                        .cmp(b.1["doc_id"].as_str().unwrap_or_default())
                })
            })
        });
        let rows: Vec<Value> = scored.into_iter().map(|(_, row)| row).collect();
        page::paginate(
            rows,
            "hits",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn create(&mut self, args: CreateArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let status = normalize_status(args.status.as_deref().unwrap_or("DRAFT"))?;
        let doc_id = format!("DOC-{}", self.seq);
        self.seq += 1;
        let doc = Document {
            doc_id: doc_id.clone(),
            title: args.title.clone(),
            body: args.body,
            tags: args.tags,
            owner: args.owner.unwrap_or_else(|| "agent".to_string()),
            status,
            version: 1,
            created_ms: ctx.now_ms,
            updated_ms: ctx.now_ms,
        };
        self.docs.insert(doc_id.clone(), doc);
        Ok(json!({"doc_id": doc_id, "title": args.title, "version": 1}))
    }

    fn update(&mut self, args: UpdateArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let status = args
            .status
            .as_deref()
            .map(normalize_status)
            .transpose()?;
        let doc = self
            .docs
            .get_mut(&args.doc_id)
            .ok_or_else(|| unknown_document(&args.doc_id))?;
        if let Some(title) = args.title {
            doc.title = title;
        }
        if let Some(body) = args.body {
            doc.body = body;
        }
        if let Some(tags) = args.tags {
            doc.tags = tags;
        }
        if let Some(owner) = args.owner {
            doc.owner = owner;
        }
        if let Some(status) = status {
            doc.status = status;
        }
        doc.version += 1;
        doc.updated_ms = doc.updated_ms.saturating_add(1).max(ctx.now_ms);
        serde_json::to_value(&*doc)
            .map_err(|err| FabricError::new("docs.serialization", err.to_string()))
    }

    /// Observation menu contribution.
    #[must_use]
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        if self.docs.is_empty() {
            Vec::new()
        } else {
            vec![MenuEntry::new("docs.list", json!({}))]
        }
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("Docs: {} documents", self.docs.len())
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        let max_version = self.docs.values().map(|d| d.version).max().unwrap_or(0);
        json!({"doc_count": self.docs.len(), "next_seq": self.seq, "max_version": max_version})
    }
}

fn unknown_document(id: &str) -> FabricError {
    FabricError::new("unknown_document", format!("no such document: {id}"))
}

fn normalize_status(raw: &str) -> FabricResult<String> {
    let status = raw.trim().to_uppercase();
    if VALID_STATUSES.contains(&status.as_str()) {
        Ok(status)
    } else {
        Err(FabricError::invalid_args(format!(
            "invalid document status: {raw}"
        )))
    }
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the docs twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("docs.list", "List knowledge-base documents.")
            .with_permissions(&["docs:read"])
            .with_latency(150, 50),
        ToolSpec::new("docs.read", "Read a document by id.")
            .with_permissions(&["docs:read"])
            .with_latency(130, 40),
        ToolSpec::new("docs.search", "Search documents by token overlap.")
            .with_permissions(&["docs:read"])
            .with_latency(180, 60),
        ToolSpec::new("docs.create", "Create a document.")
            .with_permissions(&["docs:write"])
            .with_side_effects(&["docs_mutation"])
            .with_latency(260, 80),
        ToolSpec::new("docs.update", "Update a document, bumping its version.")
            .with_permissions(&["docs:write"])
            .with_side_effects(&["docs_mutation"])
            .with_latency(240, 80),
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
    use twin_fabric_world::catalog::multi_channel;

    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn create_then_update_bumps_version_and_updated_ms() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(1_000, &mut rng);
        let created = twin
            .dispatch(
                "create",
                &args(json!({"title": "Q1 Plan", "body": "Execution plan.", "tags": ["plan"]})),
                &mut ctx,
            )
            .unwrap();
        let doc_id = created["doc_id"].as_str().unwrap().to_string();

        let mut ctx2 = TwinContext::new(1_000, &mut rng);
        let updated = twin
            .dispatch(
                "update",
                &args(json!({"doc_id": doc_id, "status": "ACTIVE"})),
                &mut ctx2,
            )
            .unwrap();
        assert_eq!(updated["version"], 2);
        assert_eq!(updated["status"], "ACTIVE");
        assert!(updated["updated_ms"].as_u64().unwrap() > 1_000);
    }

    #[test]
    fn seeded_ids_advance_the_counter() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let created = twin
            .dispatch("create", &args(json!({"title": "New", "body": "x"})), &mut ctx)
            .unwrap();
        assert_eq!(created["doc_id"], "DOC-2");
    }

    #[test]
    fn list_filters_by_status_and_paginates() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        for n in 0..3 {
            twin.dispatch(
                "create",
                &args(json!({"title": format!("Draft {n}"), "body": "…"})),
                &mut ctx,
            )
            .unwrap();
        }
        let page = twin
            .dispatch(
                "list",
                &args(json!({"status": "DRAFT", "limit": 2, "sort_by": "title", "sort_dir": "asc"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(page["count"], 2);
        assert_eq!(page["total"], 3);
        assert!(page["has_more"].as_bool().unwrap());
    }

    #[test]
    fn invalid_cursor_is_rejected_without_mutation() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch("list", &args(json!({"cursor": "page:2"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "invalid_cursor");
    }

    #[test]
    fn delivery_with_known_id_updates_and_otherwise_creates() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(10, &mut rng);

        let updated = twin
            .deliver(&json!({"doc_id": "DOC-1", "body": "Amended policy."}), &mut ctx)
            .unwrap();
        assert_eq!(updated["doc_id"], "DOC-1");
        assert_eq!(updated["version"], 2);

        let created = twin
            .deliver(
                &json!({"title": "Policy update", "body": "v2", "tags": ["policy"]}),
                &mut ctx,
            )
            .unwrap();
        assert!(created["doc_id"].as_str().unwrap().starts_with("DOC-"));
    }

    #[test]
    fn explicit_update_op_without_doc_id_is_an_invalid_event() {
        let mut twin = DocsTwin::from_scenario(&multi_channel());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(10, &mut rng);
        let err = twin
            .deliver(&json!({"op": "update", "body": "no id"}), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "docs.invalid_event");
    }

    #[test]
    fn search_ranks_by_token_hits() {
        let twin = DocsTwin::from_scenario(&multi_channel());
        let found = twin
            .search(SearchArgs {
                query: "procurement policy".to_string(),
                limit: None,
                cursor: None,
            })
            .unwrap();
        let hits = found["hits"].as_array().unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0]["doc_id"], "DOC-1");
    }
}
