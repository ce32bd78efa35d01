// twin-fabric-twins/src/database.rs
// ============================================================================
// Module: Database Twin
// Description: In-memory relational store with a small filter DSL.
// Purpose: Back audit tables and enterprise query workflows.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Tables are named collections of row objects keyed by a configurable key
//! column (default `id`). `query` supports the
//! `eq/neq/contains/starts_with/gt/gte/lt/lte/in` filter DSL, column
//! projection, sorting, and offset/cursor pagination; `upsert` merges by key
//! and reports whether an existing row was updated.

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
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_core::page;
use twin_fabric_world::Scenario;

use crate::ServiceName;
use crate::decode_args;
use crate::unknown_operation;

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `db.list_tables`.
#[derive(Debug, Deserialize)]
struct ListTablesArgs {
    #[serde(default)]
    query: Option<String>,
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

/// Arguments for `db.describe_table`.
#[derive(Debug, Deserialize)]
struct DescribeArgs {
    table: String,
}

/// Arguments for `db.query`.
#[derive(Debug, Deserialize)]
struct QueryArgs {
    table: String,
    #[serde(default)]
    filters: Option<JsonMap>,
    #[serde(default)]
    columns: Option<Vec<String>>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    descending: bool,
}

/// Arguments for `db.upsert`.
#[derive(Debug, Deserialize)]
struct UpsertArgs {
    table: String,
    row: JsonMap,
    #[serde(default = "default_key")]
    key: String,
}

fn default_key() -> String {
    "id".to_string()
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// In-memory relational store twin.
#[derive(Debug)]
pub struct DatabaseTwin {
    /// Tables: name → ordered rows.
    tables: BTreeMap<String, Vec<JsonMap>>,
}

impl DatabaseTwin {
    /// Seeds tables from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self {
            tables: scenario.database_tables.clone(),
        }
    }

    /// Dispatches one database operation.
    ///
    /// # Errors
    ///
    /// Returns `db.table_not_found`, `db.invalid_cursor`, or
    /// `unknown_operation`.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        _ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list_tables" => self.list_tables(decode_args(args)?),
            "describe_table" => self.describe_table(&decode_args::<DescribeArgs>(args)?),
            "query" => self.query(decode_args(args)?),
            "upsert" => self.upsert(decode_args(args)?),
            other => Err(unknown_operation(ServiceName::Db, other)),
        }
    }

    /// Applies a scheduled delivery with `op ∈ {upsert, query}` (default
    /// `upsert`).
    ///
    /// # Errors
    ///
    /// Returns `db.invalid_event` for unsupported shapes.
    pub fn deliver(&mut self, payload: &Value, _ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let object = payload
            .as_object()
            .ok_or_else(|| FabricError::new("db.invalid_event", "payload must be an object"))?;
        let op = object
            .get("op")
            .and_then(Value::as_str)
            .unwrap_or("upsert")
            .to_lowercase();
        let mut args = object.clone();
        args.remove("op");
        match op.as_str() {
            "upsert" => {
                if !args.contains_key("row") {
                    return Err(FabricError::new(
                        "db.invalid_event",
                        "database upsert delivery requires row",
                    ));
                }
                args.entry("table".to_string())
                    .or_insert_with(|| json!("events"));
                self.upsert(decode_args(&args)?)
            }
            "query" => self.query(decode_args(&args)?),
            other => Err(FabricError::new(
                "db.invalid_event",
                format!("unsupported database delivery op: {other}"),
            )),
        }
    }

    fn list_tables(&self, args: ListTablesArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .tables
            .iter()
            .filter(|(name, _)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .map(|(name, rows)| json!({"table": name, "row_count": rows.len()}))
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some("row_count") => "row_count",
            _ => "table",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "tables",
            args.limit,
            args.cursor.as_deref(),
            "db.invalid_cursor",
        )
    }

    fn describe_table(&self, args: &DescribeArgs) -> FabricResult<Value> {
        let rows = self.table(&args.table)?;
        let mut columns: Vec<&String> = rows.iter().flat_map(JsonMap::keys).collect();
        columns.sort();
        columns.dedup();
        Ok(json!({
            "table": args.table,
            "columns": columns,
            "row_count": rows.len(),
        }))
    }

    fn query(&self, args: QueryArgs) -> FabricResult<Value> {
        let rows = self.table(&args.table)?;
        let mut selected: Vec<Value> = rows
            .iter()
            .filter(|row| match &args.filters {
                Some(filters) => matches_filters(row, filters),
                None => true,
            })
            .map(|row| Value::Object(row.clone()))
            .collect();
        if let Some(sort_by) = &args.sort_by {
            page::sort_rows(&mut selected, sort_by, args.descending);
        }
        let total = selected.len();
        let start = match &args.cursor {
            Some(cursor) => page::decode_cursor(Some(cursor), "db.invalid_cursor")?,
            None => args.offset.unwrap_or(0) as usize,
        };
        let limit = page::clamp_limit(args.limit.or(Some(20)));
        let end = start.saturating_add(limit).min(total);
        let mut sliced: Vec<Value> = if start >= total {
            Vec::new()
        } else {
            selected[start..end].to_vec()
        };
        if let Some(columns) = &args.columns {
            for row in &mut sliced {
                if let Some(object) = row.as_object_mut() {
                    object.retain(|key, _| columns.iter().any(|col| col == key));
                }
            }
        }
        let next_cursor = if end < total {
            Some(page::encode_cursor(end))
        } else {
            None
        };
        Ok(json!({
            "table": args.table,
            "rows": sliced.clone(),
            "count": sliced.len(),
            "total": total,
            "offset": start,
            "next_cursor": next_cursor,
            "has_more": next_cursor.is_some(),
        }))
    }

    fn upsert(&mut self, args: UpsertArgs) -> FabricResult<Value> {
        let table_rows = self.tables.entry(args.table.clone()).or_default();
        let mut row = args.row;
        let key_name = if args.key.trim().is_empty() {
            "id".to_string()
        } else {
            args.key
        };
        if !row.contains_key(&key_name) {
            row.insert(
                key_name.clone(),
                json!(format!(
                    "{}-{}",
                    args.table.to_uppercase(),
                    table_rows.len() + 1
                )),
            );
        }
        let row_id = row.get(&key_name).cloned().unwrap_or(Value::Null);
        let mut updated = false;
        for existing in table_rows.iter_mut() {
            if existing.get(&key_name) == Some(&row_id) {
                for (column, value) in &row {
                    existing.insert(column.clone(), value.clone());
                }
                updated = true;
                break;
            }
        }
        if !updated {
            table_rows.push(row);
        }
        Ok(json!({
            "ok": true,
            "table": args.table,
            "key": key_name,
            "id": row_id,
            "updated": updated,
        }))
    }

    fn table(&self, name: &str) -> FabricResult<&Vec<JsonMap>> {
        self.tables.get(name).ok_or_else(|| {
            FabricError::new("db.table_not_found", format!("unknown table: {name}"))
        })
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        let rows: usize = self.tables.values().map(Vec::len).sum();
        format!("DB: {} tables, {} rows", self.tables.len(), rows)
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        let per_table: BTreeMap<&String, usize> = self
            .tables
            .iter()
            .map(|(name, rows)| (name, rows.len()))
            .collect();
        json!({"table_count": self.tables.len(), "rows": per_table})
    }
}

// ============================================================================
// SECTION: Filter DSL
// ============================================================================

/// Applies the filter DSL to one row: a scalar filter means equality, an
/// object filter applies every operator it contains.
fn matches_filters(row: &JsonMap, filters: &JsonMap) -> bool {
    for (field, expected) in filters {
        let value = row.get(field);
        match expected {
            Value::Object(ops) => {
                if !matches_ops(value, ops) {
                    return false;
                }
            }
            scalar => {
                if value != Some(scalar) {
                    return false;
                }
            }
        }
    }
    true
}

fn matches_ops(value: Option<&Value>, ops: &JsonMap) -> bool {
    for (op, operand) in ops {
        let ok = match op.as_str() {
            "eq" => value == Some(operand),
            "neq" => value != Some(operand),
            "contains" => {
                let needle = operand.as_str().unwrap_or_default().to_lowercase();
                value_text(value).to_lowercase().contains(&needle)
            }
            "starts_with" => {
                let prefix = operand.as_str().unwrap_or_default().to_lowercase();
                value_text(value).to_lowercase().starts_with(&prefix)
            }
            "gt" => compare_numeric(value, operand, |a, b| a > b),
            "gte" => compare_numeric(value, operand, |a, b| a >= b),
            "lt" => compare_numeric(value, operand, |a, b| a < b),
            "lte" => compare_numeric(value, operand, |a, b| a <= b),
            "in" => operand
                .as_array()
                .is_some_and(|items| value.is_some_and(|v| items.contains(v))),
            _ => false,
        };
        if !ok {
            return false;
        }
    }
    true
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn compare_numeric(value: Option<&Value>, operand: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    let left = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    let right = match operand {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match (left, right) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the database twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("db.list_tables", "List enterprise database tables.")
            .with_permissions(&["db:read"])
            .with_latency(120, 40),
        ToolSpec::new("db.describe_table", "Describe columns and row count.")
            .with_permissions(&["db:read"])
            .with_latency(130, 40),
        ToolSpec::new("db.query", "Query rows with filters, projection, and paging.")
            .with_permissions(&["db:read"])
            .with_latency(200, 70),
        ToolSpec::new("db.upsert", "Insert or update a row by key.")
            .with_permissions(&["db:write"])
            .with_side_effects(&["db_mutation"])
            .with_latency(260, 80),
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
    fn filter_dsl_supports_every_operator() {
        let row = args(json!({"id": "PO-1001", "amount_usd": 3199, "status": "PENDING_APPROVAL"}));

        assert!(matches_filters(&row, &args(json!({"status": "PENDING_APPROVAL"}))));
        assert!(matches_filters(&row, &args(json!({"amount_usd": {"gt": 3000, "lte": 3199}}))));
        assert!(matches_filters(&row, &args(json!({"id": {"starts_with": "po-"}}))));
        assert!(matches_filters(&row, &args(json!({"status": {"contains": "approval"}}))));
        assert!(matches_filters(&row, &args(json!({"status": {"neq": "APPROVED"}}))));
        assert!(matches_filters(
            &row,
            &args(json!({"id": {"in": ["PO-1001", "PO-9999"]}}))
        ));
        assert!(!matches_filters(&row, &args(json!({"amount_usd": {"lt": 100}}))));
        assert!(!matches_filters(&row, &args(json!({"missing": {"eq": 1}}))));
    }

    #[test]
    fn query_pages_with_cursor_and_projects_columns() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        for n in 2..4 {
            twin.dispatch(
                "upsert",
                &args(json!({
                    "table": "approval_audit",
                    "row": {"id": format!("APR-{n}"), "status": "PENDING"},
                })),
                &mut ctx,
            )
            .unwrap();
        }
        let page1 = twin
            .dispatch(
                "query",
                &args(json!({"table": "approval_audit", "limit": 1, "sort_by": "id"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(page1["count"], 1);
        assert!(page1["next_cursor"].is_string());

        let page2 = twin
            .dispatch(
                "query",
                &args(json!({
                    "table": "approval_audit",
                    "limit": 1,
                    "cursor": page1["next_cursor"],
                    "sort_by": "id",
                    "columns": ["id"],
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(page2["count"], 1);
        let row = page2["rows"][0].as_object().unwrap();
        assert_eq!(row.len(), 1);
        assert!(row.contains_key("id"));
    }

    #[test]
    fn malformed_cursors_use_the_db_scoped_code() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch(
                "query",
                &args(json!({"table": "approval_audit", "cursor": "offset:1"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "db.invalid_cursor");
    }

    #[test]
    fn upsert_merges_existing_rows_and_reports_updated() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let inserted = twin
            .dispatch(
                "upsert",
                &args(json!({
                    "table": "approval_audit",
                    "row": {"id": "APR-NEW", "status": "REQUESTED"},
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(inserted["updated"], false);

        let merged = twin
            .dispatch(
                "upsert",
                &args(json!({
                    "table": "approval_audit",
                    "row": {"id": "APR-NEW", "status": "APPROVED"},
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(merged["updated"], true);

        let query = twin
            .dispatch(
                "query",
                &args(json!({"table": "approval_audit", "filters": {"id": {"eq": "APR-NEW"}}})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(query["rows"][0]["status"], "APPROVED");
    }

    #[test]
    fn upsert_without_key_synthesizes_a_table_scoped_id() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let inserted = twin
            .dispatch(
                "upsert",
                &args(json!({"table": "events", "row": {"kind": "audit"}})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(inserted["id"], "EVENTS-1");
    }

    #[test]
    fn unknown_tables_are_rejected() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch("query", &args(json!({"table": "ghost"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "db.table_not_found");
    }

    #[test]
    fn delivery_defaults_to_upsert() {
        let mut twin = DatabaseTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let result = twin
            .deliver(
                &json!({"table": "approval_audit", "row": {"id": "APR-D", "status": "PENDING"}}),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(result["ok"], true);
        assert_eq!(result["id"], "APR-D");
    }
}
