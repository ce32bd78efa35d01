// twin-fabric-core/src/error.rs
// ============================================================================
// Module: Fabric Error Value
// Description: Structured error value returned by every tool handler.
// Purpose: Carry stable error codes across the tool-call boundary.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Tool handlers surface failures as a single structured value with a stable
//! machine-readable `code`, a human-readable `message`, and an optional JSON
//! `detail`. The workflow runner and external callers branch on the code, not
//! on Rust error types, so twins are free to mint service-scoped codes such
//! as `okta.invalid_state` without new variants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

/// Schemaless argument map crossing the tool-call boundary.
pub type JsonMap = serde_json::Map<String, Value>;

/// Result alias used by tool handlers.
pub type FabricResult<T> = Result<T, FabricError>;

// ============================================================================
// SECTION: Error Value
// ============================================================================

/// Structured failure returned from a tool call.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct FabricError {
    /// Stable machine-readable error code (e.g. `invalid_cursor`).
    pub code: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// Optional structured context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl FabricError {
    /// Creates an error with a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches structured detail to the error.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    /// Builds the standard `invalid_args` error.
    #[must_use]
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::new("invalid_args", message)
    }

    /// Builds the standard `unknown_tool` error.
    #[must_use]
    pub fn unknown_tool(tool: &str) -> Self {
        Self::new("unknown_tool", format!("no such tool: {tool}"))
    }

    /// Renders the error as the wire-format payload `{ "error": { ... } }`.
    #[must_use]
    pub fn payload(&self) -> Value {
        let mut body = json!({
            "code": self.code,
            "message": self.message,
        });
        if let (Some(detail), Some(obj)) = (self.detail.as_ref(), body.as_object_mut()) {
            obj.insert("detail".to_string(), detail.clone());
        }
        json!({ "error": body })
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

    use super::*;

    #[test]
    fn payload_includes_code_message_and_optional_detail() {
        let plain = FabricError::new("unknown_po", "Unknown PO: PO-404");
        assert_eq!(plain.payload()["error"]["code"], "unknown_po");
        assert!(plain.payload()["error"].get("detail").is_none());

        let detailed = FabricError::invalid_args("missing field")
            .with_detail(json!({"field": "to"}));
        assert_eq!(detailed.payload()["error"]["detail"]["field"], "to");
    }

    #[test]
    fn display_renders_code_and_message() {
        let err = FabricError::new("invalid_cursor", "Cursor must use 'ofs:<offset>' format");
        assert_eq!(
            err.to_string(),
            "invalid_cursor: Cursor must use 'ofs:<offset>' format"
        );
    }
}
