// twin-fabric-connectors/src/receipts.rs
// ============================================================================
// Module: Receipts Log
// Description: Append-once, redacted record of connector invocations.
// Purpose: Keep a bounded in-memory tail plus an optional JSONL file.
// Dependencies: serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! Receipts are written exactly once per invocation, refusals included,
//! after redaction. The in-memory tail is capped at 200 entries; with an
//! artifacts directory configured every receipt also lands in
//! `receipts.jsonl`, one JSON object per line.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::fs;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use twin_fabric_core::FabricError;

use crate::models::ConnectorReceipt;

/// File name of the receipts log inside an artifacts directory.
pub const RECEIPTS_FILE_NAME: &str = "receipts.jsonl";

/// Maximum receipts kept in memory.
const MEMORY_CAP: usize = 200;

// ============================================================================
// SECTION: Receipt Log
// ============================================================================

/// Bounded in-memory receipts with optional file write-through.
#[derive(Debug)]
pub struct ReceiptLog {
    /// Most recent receipts, oldest first, capped at [`MEMORY_CAP`].
    receipts: Vec<ConnectorReceipt>,
    /// Open receipts file handle.
    file: Option<File>,
}

impl ReceiptLog {
    /// Creates a receipt log, opening `receipts.jsonl` for append when an
    /// artifacts directory is given.
    ///
    /// # Errors
    ///
    /// Returns a `receipts.io` error when the directory or file cannot be
    /// created.
    pub fn new(artifacts_dir: Option<&Path>) -> Result<Self, FabricError> {
        let file = match artifacts_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(io_error)?;
                Some(
                    OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(dir.join(RECEIPTS_FILE_NAME))
                        .map_err(io_error)?,
                )
            }
            None => None,
        };
        Ok(Self {
            receipts: Vec::new(),
            file,
        })
    }

    /// Appends one receipt, writing it through when file output is enabled.
    ///
    /// # Errors
    ///
    /// Returns a `receipts.io` error when the write fails.
    pub fn append(&mut self, receipt: ConnectorReceipt) -> Result<(), FabricError> {
        if let Some(file) = self.file.as_mut() {
            let line = serde_json::to_string(&receipt).map_err(|err| {
                FabricError::new("receipts.io", format!("failed to serialize receipt: {err}"))
            })?;
            writeln!(file, "{line}").map_err(io_error)?;
        }
        self.receipts.push(receipt);
        if self.receipts.len() > MEMORY_CAP {
            let excess = self.receipts.len() - MEMORY_CAP;
            self.receipts.drain(0..excess);
        }
        Ok(())
    }

    /// The most recent receipt, as a JSON value.
    #[must_use]
    pub fn last(&self) -> Option<Value> {
        self.receipts
            .last()
            .and_then(|receipt| serde_json::to_value(receipt).ok())
    }

    /// The last `n` receipts, oldest first.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<Value> {
        let start = self.receipts.len().saturating_sub(n);
        self.receipts[start..]
            .iter()
            .filter_map(|receipt| serde_json::to_value(receipt).ok())
            .collect()
    }

    /// Number of receipts currently held in memory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    /// Whether no receipts have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

/// Maps an I/O failure to the fabric error value.
fn io_error(err: std::io::Error) -> FabricError {
    FabricError::new("receipts.io", err.to_string())
}
