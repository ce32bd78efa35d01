// twin-fabric-twins/src/mail.rs
// ============================================================================
// Module: Mail Twin
// Description: INBOX/OUTBOX mailbox with scenario-driven vendor replies.
// Purpose: Drive the quote-request loop that most workflows hinge on.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Outbound mail to an address with a scenario reply rule schedules a vendor
//! reply onto the bus; the reply lands in INBOX on a later tick. Reply
//! timing comes from the rule when fixed, otherwise from a deterministic
//! 8–12 s draw through the call context.

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
use crate::unknown_operation;

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One mailbox message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MailMessage {
    /// Stable id (`m1`, `m2`, …).
    id: String,
    /// Sender address.
    from: String,
    /// Recipient address.
    to: String,
    /// Subject line.
    subj: String,
    /// Body text.
    body_text: String,
    /// Optional headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<Value>,
    /// Logical receive/send time.
    time_ms: u64,
    /// Folder (`INBOX` or `OUTBOX`).
    folder: String,
}

/// One canned vendor reply variant.
#[derive(Debug, Clone)]
struct ReplyVariant {
    /// Reply subject override.
    subj: Option<String>,
    /// Reply body.
    body_text: String,
    /// Fixed delay, when the scenario pins one.
    dt_ms: Option<u64>,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `mail.list`.
#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default = "default_inbox")]
    folder: String,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
    #[serde(default)]
    legacy: bool,
}

/// Arguments for `mail.open`.
#[derive(Debug, Deserialize)]
struct OpenArgs {
    id: String,
}

/// Arguments for `mail.compose`.
#[derive(Debug, Deserialize)]
struct ComposeArgs {
    to: String,
    subj: String,
    body_text: String,
}

/// Arguments for `mail.reply`.
#[derive(Debug, Deserialize)]
struct ReplyArgs {
    id: String,
    body_text: String,
}

/// Delivery payload for inbound mail.
#[derive(Debug, Deserialize)]
struct DeliveryPayload {
    from: String,
    subj: String,
    body_text: String,
    #[serde(default)]
    headers: Option<Value>,
    #[serde(default = "default_agent_address")]
    to: String,
}

fn default_inbox() -> String {
    "INBOX".to_string()
}

fn default_agent_address() -> String {
    "agent@fabric.local".to_string()
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic mailbox twin.
#[derive(Debug)]
pub struct MailTwin {
    /// Messages keyed by id.
    messages: BTreeMap<String, MailMessage>,
    /// Next message id counter.
    seq: u64,
    /// Reply rules keyed by lowercased recipient address.
    reply_rules: BTreeMap<String, Vec<ReplyVariant>>,
}

impl MailTwin {
    /// Builds the mailbox and reply rules from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut reply_rules: BTreeMap<String, Vec<ReplyVariant>> = BTreeMap::new();
        for (address, variants) in &scenario.vendor_reply_variants {
            reply_rules.insert(
                address.to_lowercase(),
                variants
                    .iter()
                    .map(|seed| ReplyVariant {
                        subj: seed.subj.clone(),
                        body_text: seed.body_text.clone(),
                        dt_ms: seed.dt_ms,
                    })
                    .collect(),
            );
        }
        // Vendors without explicit variants still answer with a quote.
        for vendor in &scenario.vendors {
            let address = vendor.contact_address().to_lowercase();
            reply_rules.entry(address).or_insert_with(|| {
                let mid = (vendor.price[0] + vendor.price[1]) / 2;
                vec![ReplyVariant {
                    subj: None,
                    body_text: format!(
                        "Thanks for the inquiry. {} can do ${mid} per unit. \
                         ETA {}-{} business days.",
                        vendor.name, vendor.eta_days[0], vendor.eta_days[1]
                    ),
                    dt_ms: None,
                }]
            });
        }
        Self {
            messages: BTreeMap::new(),
            seq: 1,
            reply_rules,
        }
    }

    /// Dispatches one mail operation.
    ///
    /// # Errors
    ///
    /// Returns `unknown_message` for bad ids and `unknown_operation` for
    /// unsupported operations.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list" => self.list(decode_args(args)?),
            "open" => self.open(&decode_args::<OpenArgs>(args)?),
            "compose" => self.compose(decode_args(args)?, ctx),
            "reply" => self.reply(decode_args(args)?, ctx),
            other => Err(unknown_operation(ServiceName::Mail, other)),
        }
    }

    /// Files an inbound message into INBOX.
    ///
    /// # Errors
    ///
    /// Returns `invalid_args` for payloads missing sender/subject/body.
    pub fn deliver(&mut self, payload: &Value, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let payload: DeliveryPayload = decode_args(
            payload
                .as_object()
                .ok_or_else(|| FabricError::invalid_args("mail delivery requires an object"))?,
        )?;
        let id = self.store(
            payload.from,
            payload.to,
            payload.subj,
            payload.body_text,
            payload.headers,
            ctx.now_ms,
            "INBOX",
        );
        Ok(json!({"id": id}))
    }

    fn list(&self, args: ListArgs) -> FabricResult<Value> {
        let folder = args.folder.trim().to_uppercase();
        let mut rows: Vec<Value> = self
            .messages
            .values()
            .filter(|message| message.folder == folder)
            .filter_map(|message| serde_json::to_value(message).ok())
            .collect();
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, "time_ms", descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "messages",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn open(&self, args: &OpenArgs) -> FabricResult<Value> {
        let message = self
            .messages
            .get(&args.id)
            .ok_or_else(|| unknown_message(&args.id))?;
        serde_json::to_value(message)
            .map_err(|err| FabricError::new("mail.serialization", err.to_string()))
    }

    fn compose(&mut self, args: ComposeArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let id = self.store(
            default_agent_address(),
            args.to.clone(),
            args.subj.clone(),
            args.body_text,
            None,
            ctx.now_ms,
            "OUTBOX",
        );
        self.maybe_schedule_reply(&args.to, &args.subj, ctx);
        Ok(json!({"id": id}))
    }

    fn reply(&mut self, args: ReplyArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let original = self
            .messages
            .get(&args.id)
            .ok_or_else(|| unknown_message(&args.id))?
            .clone();
        let subj = if original.subj.starts_with("Re: ") {
            original.subj.clone()
        } else {
            format!("Re: {}", original.subj)
        };
        let id = self.store(
            default_agent_address(),
            original.from.clone(),
            subj.clone(),
            args.body_text,
            None,
            ctx.now_ms,
            "OUTBOX",
        );
        self.maybe_schedule_reply(&original.from, &subj, ctx);
        Ok(json!({"id": id}))
    }

    /// Schedules a vendor reply when the recipient has a reply rule.
    fn maybe_schedule_reply(&mut self, to: &str, subj: &str, ctx: &mut TwinContext<'_>) {
        let Some(variants) = self.reply_rules.get(&to.trim().to_lowercase()) else {
            return;
        };
        if variants.is_empty() {
            return;
        }
        let index = if variants.len() > 1 {
            ctx.range_u64(0, (variants.len() - 1) as u64) as usize
        } else {
            0
        };
        let variant = &variants[index];
        let dt_ms = variant
            .dt_ms
            .unwrap_or_else(|| ctx.range_u64(8_000, 12_000));
        let reply_subj = variant
            .subj
            .clone()
            .unwrap_or_else(|| format!("Re: {subj}"));
        ctx.schedule(
            dt_ms,
            "mail",
            json!({
                "from": to,
                "subj": reply_subj,
                "body_text": variant.body_text,
            }),
        );
    }

    #[allow(clippy::too_many_arguments, reason = "Plain constructor for the message record.")]
    fn store(
        &mut self,
        from: String,
        to: String,
        subj: String,
        body_text: String,
        headers: Option<Value>,
        time_ms: u64,
        folder: &str,
    ) -> String {
        let id = format!("m{}", self.seq);
        self.seq += 1;
        self.messages.insert(
            id.clone(),
            MailMessage {
                id: id.clone(),
                from,
                to,
                subj,
                body_text,
                headers,
                time_ms,
                folder: folder.to_string(),
            },
        );
        id
    }

    /// Observation menu contribution: open entries for the first unread
    /// inbox messages.
    #[must_use]
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        let mut inbox: Vec<&MailMessage> = self
            .messages
            .values()
            .filter(|message| message.folder == "INBOX")
            .collect();
        inbox.sort_by_key(|message| (message.time_ms, message.id.clone()));
        inbox
            .iter()
            .take(5)
            .map(|message| {
                MenuEntry::new("mail.open", json!({"id": message.id}))
                    .with_hint(message.subj.clone())
            })
            .collect()
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        let inbox = self
            .messages
            .values()
            .filter(|message| message.folder == "INBOX")
            .count();
        if inbox == 0 {
            "Mail: INBOX empty".to_string()
        } else {
            format!("Mail: INBOX {inbox} messages")
        }
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        json!({"message_count": self.messages.len(), "next_seq": self.seq})
    }
}

fn unknown_message(id: &str) -> FabricError {
    FabricError::new("unknown_message", format!("no such message: {id}"))
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the mail twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("mail.list", "List messages in a mail folder.")
            .with_permissions(&["mail:read"])
            .with_latency(150, 50),
        ToolSpec::new("mail.open", "Open a message and read its full body.")
            .with_permissions(&["mail:read"])
            .with_latency(140, 40),
        ToolSpec::new("mail.compose", "Compose and send an outbound message.")
            .with_permissions(&["mail:write"])
            .with_side_effects(&["mail_mutation"])
            .with_latency(300, 80),
        ToolSpec::new("mail.reply", "Reply to an existing message.")
            .with_permissions(&["mail:write"])
            .with_side_effects(&["mail_mutation"])
            .with_latency(280, 80),
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
    fn compose_assigns_sequential_ids_and_schedules_a_vendor_reply() {
        let mut twin = MailTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let result = twin
            .dispatch(
                "compose",
                &args(json!({
                    "to": "sales@macrocompute.example",
                    "subj": "Quote request",
                    "body_text": "Please send latest price and ETA.",
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(result["id"], "m1");

        let scheduled = ctx.take_scheduled();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].target, "mail");
        assert!(scheduled[0].dt_ms >= 8_000 && scheduled[0].dt_ms <= 12_000);
        let subj = scheduled[0].payload["subj"].as_str().unwrap();
        assert!(subj.contains("Quote request"));
    }

    #[test]
    fn compose_to_unknown_recipient_schedules_nothing() {
        let mut twin = MailTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        twin.dispatch(
            "compose",
            &args(json!({"to": "noone@nowhere.example", "subj": "hi", "body_text": "x"})),
            &mut ctx,
        )
        .unwrap();
        assert!(ctx.take_scheduled().is_empty());
    }

    #[test]
    fn delivery_files_into_inbox_and_open_returns_the_body() {
        let mut twin = MailTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(9_000, &mut rng);
        let delivered = twin
            .deliver(
                &json!({
                    "from": "sales@macrocompute.example",
                    "subj": "Re: Quote request",
                    "body_text": "$3,199 per unit. ETA 5-7 business days.",
                }),
                &mut ctx,
            )
            .unwrap();
        let id = delivered["id"].as_str().unwrap();

        let opened = twin
            .dispatch("open", &args(json!({"id": id})), &mut ctx)
            .unwrap();
        assert_eq!(opened["folder"], "INBOX");
        assert!(opened["body_text"].as_str().unwrap().contains("$3,199"));

        let listing = twin
            .dispatch("list", &args(json!({"limit": 10})), &mut ctx)
            .unwrap();
        assert_eq!(listing["count"], 1);
    }

    #[test]
    fn open_unknown_id_fails_with_unknown_message() {
        let mut twin = MailTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch("open", &args(json!({"id": "m-404"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "unknown_message");
    }

    #[test]
    fn reply_threads_the_subject_and_targets_the_original_sender() {
        let mut twin = MailTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let delivered = twin
            .deliver(
                &json!({"from": "sales@macrocompute.example", "subj": "Quote", "body_text": "…"}),
                &mut ctx,
            )
            .unwrap();
        let id = delivered["id"].as_str().unwrap();
        let reply = twin
            .dispatch(
                "reply",
                &args(json!({"id": id, "body_text": "Please confirm warranty."})),
                &mut ctx,
            )
            .unwrap();
        let sent = twin
            .dispatch("open", &args(json!({"id": reply["id"]})), &mut ctx)
            .unwrap();
        assert_eq!(sent["to"], "sales@macrocompute.example");
        assert_eq!(sent["subj"], "Re: Quote");
        // The vendor answers replies too.
        assert_eq!(ctx.take_scheduled().len(), 1);
    }
}
