// twin-fabric-score/src/lib.rs
// ============================================================================
// Module: Twin Fabric Scoring
// Description: Recompute subgoal and policy signals from a session trace.
// Purpose: Judge a run purely from its append-only artifacts.
// Dependencies: regex, serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! Scoring replays `trace.jsonl`: call records feed subgoal detection
//! (citations, approvals with amounts, outbound mail, quote parsing, doc and
//! ticket closeout, CRM logging) and policy findings (approval messages
//! without amounts, empty ticket updates, CRM notes missing pricing or ETA,
//! follow-up SLA latency). Success is judged under `email` mode (quote
//! parsed) or `full` mode (every subgoal).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;

/// Follow-up SLA between a parsed vendor reply and the CRM log.
const CRM_FOLLOWUP_SLA_MS: u64 = 60_000;

// ============================================================================
// SECTION: Signal Patterns
// ============================================================================

/// Money amounts: `$3,199`, `3200 USD`, `budget 3200`, …
fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "Pattern is a compile-time constant.")]
        Regex::new(
            r"(?ix)
            (?:
                \$\s*\d+(?:,\d{3})*(?:\.\d+)?
              | (?:usd|dollars?)\s*\d+(?:,\d{3})*(?:\.\d+)?
              | \d+(?:,\d{3})*(?:\.\d+)?\s*(?:usd|dollars?)
              | (?:budget|amount)\s*(?:is|=|:)?\s*\d+(?:,\d{3})*(?:\.\d+)?
            )",
        )
        .unwrap()
    })
}

/// Delivery estimates: `ETA 5-7 business days`, `delivery within 2 weeks`, …
fn eta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used, reason = "Pattern is a compile-time constant.")]
        Regex::new(
            r"(?ix)
            \b(?:eta|delivery|arriv(?:e|al))\b
            [:\s-]*
            (?:within\s*|approx\.?\s*|about\s*)?
            \d+(?:\s*-\s*\d+)?\s*(?:business\s*)?(?:day|days|hour|hours|week|weeks)\b",
        )
        .unwrap()
    })
}

fn has_amount(text: &str) -> bool {
    amount_re().is_match(text)
}

fn has_eta(text: &str) -> bool {
    eta_re().is_match(text)
}

fn approval_signal(text: &str) -> bool {
    let lowered = text.to_lowercase();
    ["approve", "approved", "approval"]
        .iter()
        .any(|token| lowered.contains(token))
}

// ============================================================================
// SECTION: Report Types
// ============================================================================

/// One policy finding derived from the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyFinding {
    /// Finding code (e.g. `slack.approval_missing_amount`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// `info`, `warning`, or `error`.
    pub severity: String,
    /// Offending tool, when one exists.
    #[serde(default)]
    pub tool: Option<String>,
    /// Logical time of the finding.
    pub time_ms: u64,
    /// Structured context.
    #[serde(default)]
    pub metadata: Value,
}

/// Scoring outcome for one artifacts directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Overall success under the requested mode.
    pub success: bool,
    /// Subgoal bits (0/1).
    pub subgoals: BTreeMap<String, u8>,
    /// Action count and final logical time.
    pub costs: Value,
    /// Policy findings plus severity counts.
    pub policy: Value,
    /// Per-tool call counts.
    pub usage: BTreeMap<String, u64>,
    /// Success judged under email-only mode.
    pub success_email_only: bool,
    /// Success judged under full-flow mode.
    pub success_full_flow: bool,
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Scores the trace in an artifacts directory.
///
/// # Errors
///
/// Returns `score.missing_trace` when no `trace.jsonl` exists and
/// `score.invalid_trace` for unparseable lines.
pub fn compute_score(artifacts_dir: &Path, success_mode: &str) -> Result<ScoreReport, FabricError> {
    let trace_path = artifacts_dir.join("trace.jsonl");
    if !trace_path.exists() {
        return Err(FabricError::new(
            "score.missing_trace",
            format!("no trace.jsonl in artifacts dir: {}", artifacts_dir.display()),
        ));
    }
    let content = fs::read_to_string(&trace_path)
        .map_err(|err| FabricError::new("score.invalid_trace", err.to_string()))?;

    let mut findings: Vec<PolicyFinding> = Vec::new();
    let mut usage: BTreeMap<String, u64> = BTreeMap::new();
    let mut max_time_ms = 0_u64;
    let mut action_count = 0_u64;

    let mut citations = false;
    let mut email_sent = false;
    let mut approval = false;
    let mut approval_with_amount = false;
    let mut email_parsed = false;
    let mut doc_logged = false;
    let mut ticket_updated = false;
    let mut crm_logged = false;
    let mut vendor_reply_time_ms: Option<u64> = None;
    let mut crm_log_time_ms: Option<u64> = None;

    for line in content.lines().filter(|line| !line.trim().is_empty()) {
        let record: Value = serde_json::from_str(line)
            .map_err(|err| FabricError::new("score.invalid_trace", err.to_string()))?;
        let time_ms = record["time_ms"].as_u64().unwrap_or(0);
        max_time_ms = max_time_ms.max(time_ms);

        match record["type"].as_str() {
            Some("call") => {
                action_count += 1;
                let tool = record["tool"].as_str().unwrap_or_default().to_string();
                let args = &record["args"];
                let count = usage.entry(tool.clone()).or_insert(0);
                *count += 1;
                if *count == 5 || *count == 10 {
                    findings.push(PolicyFinding {
                        code: "usage.repetition".to_string(),
                        message: format!("tool '{tool}' invoked {count} times in run"),
                        severity: "info".to_string(),
                        tool: Some(tool.clone()),
                        time_ms,
                        metadata: json!({"count": count}),
                    });
                }

                match tool.as_str() {
                    "browser.read" => citations = true,
                    "slack.send_message" => {
                        let text = args["text"].as_str().unwrap_or_default();
                        if approval_signal(text) {
                            approval = true;
                            if has_amount(text) {
                                approval_with_amount = true;
                            } else {
                                findings.push(PolicyFinding {
                                    code: "slack.approval_missing_amount".to_string(),
                                    message: "approval message lacks budget amount".to_string(),
                                    severity: "warning".to_string(),
                                    tool: Some(tool.clone()),
                                    time_ms,
                                    metadata: json!({"text": text}),
                                });
                            }
                        }
                    }
                    "mail.compose" => {
                        email_sent = true;
                        if *count == 3 || *count == 5 {
                            findings.push(PolicyFinding {
                                code: "mail.outbound_volume".to_string(),
                                message: "multiple outbound emails sent in this session"
                                    .to_string(),
                                severity: "info".to_string(),
                                tool: Some(tool.clone()),
                                time_ms,
                                metadata: json!({"count": count}),
                            });
                        }
                    }
                    "docs.create" | "docs.update" => {
                        doc_logged = true;
                        let doc_text = format!(
                            "{} {}",
                            args["title"].as_str().unwrap_or_default(),
                            args["body"].as_str().unwrap_or_default()
                        );
                        let trimmed = doc_text.trim();
                        if !trimmed.is_empty()
                            && !has_amount(trimmed)
                            && !trimmed.to_lowercase().contains("quote")
                        {
                            findings.push(PolicyFinding {
                                code: "docs.missing_quote_details".to_string(),
                                message: "quote document written without pricing context"
                                    .to_string(),
                                severity: "warning".to_string(),
                                tool: Some(tool.clone()),
                                time_ms,
                                metadata: json!({"title": args["title"]}),
                            });
                        }
                    }
                    "tickets.update" | "tickets.transition" => {
                        ticket_updated = true;
                        if args["ticket_id"].as_str().unwrap_or_default().is_empty() {
                            findings.push(PolicyFinding {
                                code: "tickets.missing_id".to_string(),
                                message: "ticket update missing ticket_id".to_string(),
                                severity: "error".to_string(),
                                tool: Some(tool.clone()),
                                time_ms,
                                metadata: json!({}),
                            });
                        }
                        if tool == "tickets.update"
                            && args["description"].as_str().unwrap_or_default().is_empty()
                            && args["assignee"].as_str().unwrap_or_default().is_empty()
                        {
                            findings.push(PolicyFinding {
                                code: "tickets.empty_update".to_string(),
                                message: "tickets.update invoked without description or \
                                          assignee payload"
                                    .to_string(),
                                severity: "warning".to_string(),
                                tool: Some(tool.clone()),
                                time_ms,
                                metadata: json!({"ticket_id": args["ticket_id"]}),
                            });
                        }
                    }
                    "crm.log_activity" => {
                        crm_logged = true;
                        crm_log_time_ms = Some(time_ms);
                        let note = args["note"].as_str().unwrap_or_default();
                        if note.is_empty() {
                            findings.push(PolicyFinding {
                                code: "crm.note_missing_body".to_string(),
                                message: "CRM note logged without content".to_string(),
                                severity: "error".to_string(),
                                tool: Some(tool.clone()),
                                time_ms,
                                metadata: json!({}),
                            });
                        } else {
                            if !has_amount(note) {
                                findings.push(PolicyFinding {
                                    code: "crm.note_missing_amount".to_string(),
                                    message: "CRM note lacks pricing detail".to_string(),
                                    severity: "warning".to_string(),
                                    tool: Some(tool.clone()),
                                    time_ms,
                                    metadata: json!({"note": note}),
                                });
                            }
                            if !has_eta(note) {
                                findings.push(PolicyFinding {
                                    code: "crm.note_missing_eta".to_string(),
                                    message: "CRM note missing ETA or delivery commitment"
                                        .to_string(),
                                    severity: "warning".to_string(),
                                    tool: Some(tool.clone()),
                                    time_ms,
                                    metadata: json!({"note": note}),
                                });
                            }
                        }
                    }
                    "mail.open" | "mail.list" => {
                        for text in extract_texts(&record["response"]) {
                            if has_amount(&text) && has_eta(&text) {
                                email_parsed = true;
                                vendor_reply_time_ms.get_or_insert(time_ms);
                                break;
                            }
                        }
                    }
                    _ => {}
                }
            }
            Some("event") => {
                let target = record["target"].as_str().unwrap_or_default();
                if target == "slack" {
                    let text = record["payload"]["text"].as_str().unwrap_or_default();
                    if text.contains(":white_check_mark:")
                        || text.to_lowercase().contains("approved")
                    {
                        approval = true;
                    }
                }
                if target == "mail" {
                    for text in extract_texts(&record["payload"]) {
                        if has_amount(&text) && has_eta(&text) {
                            email_parsed = true;
                            vendor_reply_time_ms.get_or_insert(time_ms);
                            break;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // Closeout findings.
    if !doc_logged {
        findings.push(PolicyFinding {
            code: "docs.quote_missing".to_string(),
            message: "no docs.create/docs.update call observed; quote was not captured"
                .to_string(),
            severity: "warning".to_string(),
            tool: None,
            time_ms: max_time_ms,
            metadata: json!({}),
        });
    }
    if !ticket_updated {
        findings.push(PolicyFinding {
            code: "tickets.update_missing".to_string(),
            message: "no tickets.update/transition call observed; tickets were left stale"
                .to_string(),
            severity: "warning".to_string(),
            tool: None,
            time_ms: max_time_ms,
            metadata: json!({}),
        });
    }
    if let Some(reply_ms) = vendor_reply_time_ms {
        match crm_log_time_ms {
            None => findings.push(PolicyFinding {
                code: "crm.note_absent".to_string(),
                message: "vendor quote arrived but no CRM log was recorded".to_string(),
                severity: "error".to_string(),
                tool: None,
                time_ms: max_time_ms,
                metadata: json!({"vendor_reply_ms": reply_ms}),
            }),
            Some(log_ms) => {
                let latency_ms = log_ms.saturating_sub(reply_ms);
                if latency_ms > CRM_FOLLOWUP_SLA_MS {
                    findings.push(PolicyFinding {
                        code: "sla.crm_followup_latency".to_string(),
                        message: format!(
                            "CRM note logged after {:.1}s (>60s SLA)",
                            latency_ms as f64 / 1000.0
                        ),
                        severity: "warning".to_string(),
                        tool: Some("crm.log_activity".to_string()),
                        time_ms: log_ms,
                        metadata: json!({"latency_ms": latency_ms}),
                    });
                }
            }
        }
    }

    let mut subgoals = BTreeMap::new();
    for (name, hit) in [
        ("citations", citations),
        ("approval", approval),
        ("approval_with_amount", approval_with_amount),
        ("email_sent", email_sent),
        ("email_parsed", email_parsed),
        ("doc_logged", doc_logged),
        ("ticket_updated", ticket_updated),
        ("crm_logged", crm_logged),
    ] {
        subgoals.insert(name.to_string(), u8::from(hit));
    }

    let success_email_only = email_parsed;
    let success_full_flow = subgoals.values().all(|bit| *bit == 1);
    let mode = match success_mode.trim().to_lowercase().as_str() {
        "full" => "full",
        _ => "email",
    };
    let success = if mode == "full" {
        success_full_flow
    } else {
        success_email_only
    };

    let warning_count = findings.iter().filter(|f| f.severity == "warning").count();
    let error_count = findings.iter().filter(|f| f.severity == "error").count();

    Ok(ScoreReport {
        success,
        subgoals,
        costs: json!({"actions": action_count, "time_ms": max_time_ms}),
        policy: json!({
            "findings": findings,
            "warning_count": warning_count,
            "error_count": error_count,
        }),
        usage,
        success_email_only,
        success_full_flow,
    })
}

/// Collects candidate text from a payload: known text fields plus nested
/// containers.
fn extract_texts(payload: &Value) -> Vec<String> {
    match payload {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items.iter().flat_map(extract_texts).collect(),
        Value::Object(map) => {
            let mut out = Vec::new();
            for key in ["body_text", "body", "text", "excerpt", "note", "subj", "subject"] {
                if let Some(Value::String(s)) = map.get(key)
                    && !s.trim().is_empty()
                {
                    out.push(s.clone());
                }
            }
            for key in ["result", "rows", "items", "messages", "value", "payload", "headers"] {
                if let Some(nested) = map.get(key) {
                    out.extend(extract_texts(nested));
                }
            }
            out
        }
        _ => Vec::new(),
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

    use std::io::Write;

    use super::*;

    fn write_trace(lines: &[Value]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fs::File::create(dir.path().join("trace.jsonl")).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        dir
    }

    fn call(time_ms: u64, tool: &str, args: Value, response: Value) -> Value {
        json!({
            "type": "call", "time_ms": time_ms, "tool": tool,
            "args": args, "response": response, "latency_ms": 100,
        })
    }

    #[test]
    fn signal_patterns_match_the_documented_shapes() {
        assert!(has_amount("Budget $3,199.50 approved"));
        assert!(has_amount("total 3200 USD"));
        assert!(has_amount("budget: 3200"));
        assert!(!has_amount("no numbers here"));

        assert!(has_eta("ETA 5-7 business days"));
        assert!(has_eta("delivery within 2 weeks"));
        assert!(!has_eta("arriving soon"));
    }

    #[test]
    fn full_flow_trace_scores_every_subgoal() {
        let dir = write_trace(&[
            call(100, "browser.read", json!({}), json!({"title": "Catalog"})),
            call(
                400,
                "mail.compose",
                json!({"to": "sales@v.example", "subj": "Quote", "body_text": "price?"}),
                json!({"id": "m1"}),
            ),
            json!({
                "type": "event", "time_ms": 9_000, "target": "mail",
                "payload": {"from": "sales@v.example", "subj": "Re: Quote",
                            "body_text": "$3,199 per unit. ETA 5-7 business days."},
            }),
            call(
                9_500,
                "slack.send_message",
                json!({"channel": "#procurement", "text": "Please approve budget $3,199"}),
                json!({"ts": "1"}),
            ),
            call(
                10_000,
                "docs.create",
                json!({"title": "Quote summary", "body": "Vendor quote $3,199"}),
                json!({"doc_id": "DOC-1"}),
            ),
            call(
                10_500,
                "tickets.update",
                json!({"ticket_id": "TCK-1", "description": "quote logged"}),
                json!({"ticket_id": "TCK-1"}),
            ),
            call(
                11_000,
                "crm.log_activity",
                json!({"kind": "note", "note": "Quote $3,199, ETA 5-7 days"}),
                json!({"ok": true}),
            ),
        ]);

        let report = compute_score(dir.path(), "full").unwrap();
        assert!(report.success, "{:?}", report.subgoals);
        assert!(report.success_email_only);
        assert!(report.success_full_flow);
        assert_eq!(report.subgoals["citations"], 1);
        assert_eq!(report.subgoals["approval_with_amount"], 1);
        assert_eq!(report.usage["mail.compose"], 1);
        assert_eq!(report.policy["error_count"], 0);
    }

    #[test]
    fn approval_without_amount_is_flagged() {
        let dir = write_trace(&[call(
            100,
            "slack.send_message",
            json!({"channel": "#procurement", "text": "please approve this"}),
            json!({"ts": "1"}),
        )]);
        let report = compute_score(dir.path(), "email").unwrap();
        assert_eq!(report.subgoals["approval"], 1);
        assert_eq!(report.subgoals["approval_with_amount"], 0);
        let findings = report.policy["findings"].as_array().unwrap();
        assert!(
            findings
                .iter()
                .any(|f| f["code"] == "slack.approval_missing_amount")
        );
    }

    #[test]
    fn late_crm_followup_breaches_the_sla() {
        let dir = write_trace(&[
            json!({
                "type": "event", "time_ms": 5_000, "target": "mail",
                "payload": {"subj": "Re: Quote",
                            "body_text": "$2,799 total. ETA 4-6 business days."},
            }),
            call(
                80_000,
                "crm.log_activity",
                json!({"kind": "note", "note": "Quote $2,799, ETA 4-6 days"}),
                json!({"ok": true}),
            ),
        ]);
        let report = compute_score(dir.path(), "email").unwrap();
        assert!(report.success);
        let findings = report.policy["findings"].as_array().unwrap();
        assert!(findings.iter().any(|f| f["code"] == "sla.crm_followup_latency"));
    }

    #[test]
    fn vendor_reply_without_crm_log_is_an_error() {
        let dir = write_trace(&[json!({
            "type": "event", "time_ms": 5_000, "target": "mail",
            "payload": {"subj": "Re: Quote",
                        "body_text": "$2,799 total. ETA 4-6 business days."},
        })]);
        let report = compute_score(dir.path(), "email").unwrap();
        let findings = report.policy["findings"].as_array().unwrap();
        assert!(findings.iter().any(|f| f["code"] == "crm.note_absent"));
        assert!(report.policy["error_count"].as_u64().unwrap() >= 1);
    }

    #[test]
    fn missing_trace_files_error_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let err = compute_score(dir.path(), "email").unwrap_err();
        assert_eq!(err.code, "score.missing_trace");
    }
}
