// twin-fabric-core/src/page.rs
// ============================================================================
// Module: Pagination Contract
// Description: Shared cursor, limit, and sort-key helpers for list tools.
// Purpose: Keep pagination semantics uniform across every twin.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Every list-style tool pages with opaque `ofs:<int>` cursors, limits
//! clamped to `[1, 200]` (default 25), and a uniform envelope
//! `{<rows_key>, count, total, next_cursor, has_more}`. Sorting uses a
//! total order over JSON scalars so heterogeneous columns cannot panic a
//! handler.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use serde_json::Value;
use serde_json::json;

use crate::error::FabricError;

/// Default page size when the caller omits `limit`.
pub const DEFAULT_PAGE_LIMIT: usize = 25;
/// Hard ceiling on page size.
pub const MAX_PAGE_LIMIT: usize = 200;

// ============================================================================
// SECTION: Limits & Cursors
// ============================================================================

/// Clamps a requested limit into `[1, 200]`, defaulting to 25.
#[must_use]
pub fn clamp_limit(limit: Option<u64>) -> usize {
    match limit {
        None => DEFAULT_PAGE_LIMIT,
        Some(0) => 1,
        Some(n) => (n as usize).min(MAX_PAGE_LIMIT),
    }
}

/// Decodes an `ofs:<int>` cursor into a row offset.
///
/// # Errors
///
/// Returns the service-scoped `error_code` for any cursor not matching
/// `^ofs:\d+$`.
pub fn decode_cursor(cursor: Option<&str>, error_code: &str) -> Result<usize, FabricError> {
    let Some(raw) = cursor else {
        return Ok(0);
    };
    let invalid = || {
        FabricError::new(
            error_code,
            format!("Cursor must use 'ofs:<offset>' format: {raw}"),
        )
    };
    let digits = raw.strip_prefix("ofs:").ok_or_else(invalid)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    digits.parse::<usize>().map_err(|_| invalid())
}

/// Encodes a row offset as an opaque cursor.
#[must_use]
pub fn encode_cursor(offset: usize) -> String {
    format!("ofs:{offset}")
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Slices sorted rows into the uniform paginated envelope.
///
/// # Errors
///
/// Propagates cursor decoding failures under the service-scoped code.
pub fn paginate(
    rows: Vec<Value>,
    rows_key: &str,
    limit: Option<u64>,
    cursor: Option<&str>,
    error_code: &str,
) -> Result<Value, FabricError> {
    let page_limit = clamp_limit(limit);
    let start = decode_cursor(cursor, error_code)?;
    let total = rows.len();
    let end = start.saturating_add(page_limit).min(total);
    let sliced: Vec<Value> = if start >= total {
        Vec::new()
    } else {
        rows[start..end].to_vec()
    };
    let next_cursor = if end < total {
        Some(encode_cursor(end))
    } else {
        None
    };
    let count = sliced.len();
    Ok(json!({
        rows_key: sliced,
        "count": count,
        "total": total,
        "next_cursor": next_cursor,
        "has_more": next_cursor.is_some(),
    }))
}

// ============================================================================
// SECTION: Sort Keys
// ============================================================================

/// Total order over JSON scalars used for row sorting.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// Numeric values (bools map to 0/1).
    Number(f64),
    /// Everything else as text; null maps to the empty string.
    Text(String),
}

impl SortKey {
    /// Builds the key for one field value.
    #[must_use]
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(n)) => Self::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::Bool(b)) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Some(Value::String(s)) => Self::Text(s.clone()),
            Some(other) => Self::Text(other.to_string()),
            None | Some(Value::Null) => Self::Text(String::new()),
        }
    }

    /// Compares two keys with numbers ordered before text.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

/// Stably sorts row objects by a field, optionally descending.
pub fn sort_rows(rows: &mut [Value], field: &str, descending: bool) {
    rows.sort_by(|a, b| {
        let ka = SortKey::from_value(a.get(field));
        let kb = SortKey::from_value(b.get(field));
        let ord = ka.compare(&kb);
        if descending { ord.reverse() } else { ord }
    });
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

    use proptest::prelude::*;

    use super::*;

    #[test]
    fn limits_clamp_into_bounds() {
        assert_eq!(clamp_limit(None), 25);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(7)), 7);
        assert_eq!(clamp_limit(Some(100_000)), 200);
    }

    #[test]
    fn malformed_cursors_raise_the_scoped_code() {
        for bad in ["ofs", "ofs:", "ofs:-1", "ofs:1x", "offset:3", "3"] {
            let err = decode_cursor(Some(bad), "db.invalid_cursor").unwrap_err();
            assert_eq!(err.code, "db.invalid_cursor", "cursor: {bad}");
        }
        assert_eq!(decode_cursor(Some("ofs:12"), "invalid_cursor").unwrap(), 12);
        assert_eq!(decode_cursor(None, "invalid_cursor").unwrap(), 0);
    }

    #[test]
    fn envelope_reports_count_total_and_next_cursor() {
        let rows: Vec<Value> = (0..5).map(|n| json!({"id": n})).collect();
        let page = paginate(rows, "rows", Some(2), None, "invalid_cursor").unwrap();
        assert_eq!(page["count"], 2);
        assert_eq!(page["total"], 5);
        assert_eq!(page["next_cursor"], "ofs:2");
        assert_eq!(page["has_more"], true);
    }

    #[test]
    fn mixed_scalar_sort_orders_numbers_before_text() {
        let mut rows = vec![json!({"v": "b"}), json!({"v": 2}), json!({"v": "a"})];
        sort_rows(&mut rows, "v", false);
        assert_eq!(rows[0]["v"], 2);
        assert_eq!(rows[1]["v"], "a");
    }

    proptest! {
        /// Walking `next_cursor` yields exactly `total` rows, no duplicates,
        /// no omissions, for any row count and limit.
        #[test]
        fn cursor_walk_is_total(total in 0usize..60, limit in 1u64..10) {
            let rows: Vec<Value> = (0..total).map(|n| json!({"id": n})).collect();
            let mut seen = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let page = paginate(
                    rows.clone(),
                    "rows",
                    Some(limit),
                    cursor.as_deref(),
                    "invalid_cursor",
                ).unwrap();
                for row in page["rows"].as_array().unwrap() {
                    seen.push(row["id"].as_u64().unwrap());
                }
                match page["next_cursor"].as_str() {
                    Some(next) => cursor = Some(next.to_string()),
                    None => break,
                }
            }
            let expected: Vec<u64> = (0..total as u64).collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
