// twin-fabric-core/src/trace.rs
// ============================================================================
// Module: Session Trace Log
// Description: Append-only JSON-per-line record of calls and deliveries.
// Purpose: Make every session auditable and byte-for-byte reproducible.
// Dependencies: serde, serde_json, std::fs
// ============================================================================

//! ## Overview
//! The trace is the session-wide append-only record. Call records capture the
//! tool, arguments, response, and charged latency; event records capture bus
//! deliveries; warning records capture non-fatal conditions such as
//! `bus.unknown_target`. When an artifacts directory is configured, each
//! record is additionally written as one JSON object per line to
//! `trace.jsonl`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::error::FabricError;

/// File name of the trace log inside an artifacts directory.
pub const TRACE_FILE_NAME: &str = "trace.jsonl";

// ============================================================================
// SECTION: Trace Records
// ============================================================================

/// One line of the session trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A bus delivery into a twin.
    Event {
        /// Logical delivery time.
        time_ms: u64,
        /// Delivery target.
        target: String,
        /// Delivered payload.
        payload: Value,
    },
    /// A completed (or failed) tool call.
    Call {
        /// Logical time at which the call executed.
        time_ms: u64,
        /// Tool name as requested by the caller.
        tool: String,
        /// Arguments passed to the tool.
        args: Value,
        /// Handler response, or an error payload on failure.
        response: Value,
        /// Latency charged against the clock.
        latency_ms: u64,
    },
    /// A non-fatal condition worth keeping in the audit stream.
    Warning {
        /// Logical time of the warning.
        time_ms: u64,
        /// Warning code (e.g. `bus.unknown_target`).
        code: String,
        /// Subject of the warning, when one exists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
}

impl TraceRecord {
    /// Logical time of the record.
    #[must_use]
    pub fn time_ms(&self) -> u64 {
        match self {
            Self::Event { time_ms, .. }
            | Self::Call { time_ms, .. }
            | Self::Warning { time_ms, .. } => *time_ms,
        }
    }
}

// ============================================================================
// SECTION: Trace Log
// ============================================================================

/// Append-only trace for one session.
#[derive(Debug)]
pub struct TraceLog {
    /// All records, in execution order.
    records: Vec<TraceRecord>,
    /// Artifacts directory when file output is enabled.
    out_dir: Option<PathBuf>,
    /// Open trace file handle.
    file: Option<File>,
}

impl TraceLog {
    /// Creates a trace log, opening `trace.jsonl` for append when an
    /// artifacts directory is given.
    ///
    /// # Errors
    ///
    /// Returns a `trace.io` error when the directory or file cannot be
    /// created.
    pub fn new(artifacts_dir: Option<&Path>) -> Result<Self, FabricError> {
        let (out_dir, file) = match artifacts_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(io_error)?;
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(dir.join(TRACE_FILE_NAME))
                    .map_err(io_error)?;
                (Some(dir.to_path_buf()), Some(file))
            }
            None => (None, None),
        };
        Ok(Self {
            records: Vec::new(),
            out_dir,
            file,
        })
    }

    /// Artifacts directory when file output is enabled.
    #[must_use]
    pub fn out_dir(&self) -> Option<&Path> {
        self.out_dir.as_deref()
    }

    /// Appends a record, writing it through to the trace file when enabled.
    ///
    /// # Errors
    ///
    /// Returns a `trace.io` error when the write fails.
    pub fn append(&mut self, record: TraceRecord) -> Result<(), FabricError> {
        if let Some(file) = self.file.as_mut() {
            let line = serde_json::to_string(&record).map_err(|err| {
                FabricError::new("trace.io", format!("failed to serialize record: {err}"))
            })?;
            writeln!(file, "{line}").map_err(io_error)?;
        }
        self.records.push(record);
        Ok(())
    }

    /// All records, in execution order.
    #[must_use]
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Last `n` call records as JSON values, oldest first.
    #[must_use]
    pub fn call_tail(&self, n: usize) -> Vec<Value> {
        let calls: Vec<&TraceRecord> = self
            .records
            .iter()
            .filter(|record| matches!(record, TraceRecord::Call { .. }))
            .collect();
        let start = calls.len().saturating_sub(n);
        calls[start..]
            .iter()
            .filter_map(|record| serde_json::to_value(record).ok())
            .collect()
    }

    /// Flushes the trace file when one is open.
    ///
    /// # Errors
    ///
    /// Returns a `trace.io` error when the flush fails.
    pub fn flush(&mut self) -> Result<(), FabricError> {
        if let Some(file) = self.file.as_mut() {
            file.flush().map_err(io_error)?;
        }
        Ok(())
    }
}

/// Maps an I/O failure to the fabric error value.
fn io_error(err: std::io::Error) -> FabricError {
    FabricError::new("trace.io", err.to_string())
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

    use super::*;

    #[test]
    fn records_serialize_with_type_tags() {
        let call = TraceRecord::Call {
            time_ms: 10,
            tool: "mail.compose".to_string(),
            args: json!({"to": "sales@example.com"}),
            response: json!({"id": "m1"}),
            latency_ms: 120,
        };
        let line = serde_json::to_string(&call).unwrap();
        assert!(line.starts_with("{\"type\":\"call\""));

        let event = TraceRecord::Event {
            time_ms: 20,
            target: "mail".to_string(),
            payload: json!({"subj": "Re: Quote"}),
        };
        assert!(serde_json::to_string(&event).unwrap().contains("\"type\":\"event\""));
    }

    #[test]
    fn file_output_appends_one_json_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = TraceLog::new(Some(dir.path())).unwrap();
        trace
            .append(TraceRecord::Warning {
                time_ms: 0,
                code: "bus.unknown_target".to_string(),
                target: Some("ghost".to_string()),
            })
            .unwrap();
        trace
            .append(TraceRecord::Event {
                time_ms: 5,
                target: "mail".to_string(),
                payload: json!({}),
            })
            .unwrap();
        trace.flush().unwrap();

        let content = fs::read_to_string(dir.path().join(TRACE_FILE_NAME)).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["code"], "bus.unknown_target");
    }

    #[test]
    fn call_tail_returns_most_recent_calls() {
        let mut trace = TraceLog::new(None).unwrap();
        for idx in 0..5u64 {
            trace
                .append(TraceRecord::Call {
                    time_ms: idx,
                    tool: format!("tool.{idx}"),
                    args: json!({}),
                    response: json!({}),
                    latency_ms: 0,
                })
                .unwrap();
        }
        let tail = trace.call_tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0]["tool"], "tool.3");
        assert_eq!(tail[1]["tool"], "tool.4");
    }
}
