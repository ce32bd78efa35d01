// twin-fabric-twins/src/slack.rs
// ============================================================================
// Module: Slack Twin
// Description: Channel/thread chat twin with monotonic per-channel ts.
// Purpose: Host approval threads and scheduled chatter deterministically.
// Dependencies: serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! Channels hold ordered messages whose `ts` is a stringified per-channel
//! counter, so thread references stay stable across sessions with the same
//! call sequence. Deliveries append messages and may create channels;
//! direct sends require the channel to exist.

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

/// One reaction on a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reaction {
    /// Emoji shortname.
    emoji: String,
    /// Reacting user.
    user: String,
}

/// One chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SlackMessage {
    /// Owning channel.
    channel: String,
    /// Stringified per-channel monotonic counter.
    ts: String,
    /// Posting user.
    user: String,
    /// Message text.
    text: String,
    /// Thread root ts, when threaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<String>,
    /// Appended reactions.
    reactions: Vec<Reaction>,
    /// Logical post time.
    time_ms: u64,
}

/// One channel.
#[derive(Debug, Clone)]
struct Channel {
    /// Next ts counter value.
    next_ts: u64,
    /// Ordered messages.
    messages: Vec<SlackMessage>,
}

impl Channel {
    fn new() -> Self {
        Self {
            next_ts: 1,
            messages: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `slack.list_channels`.
#[derive(Debug, Deserialize)]
struct ListChannelsArgs {
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

/// Arguments for `slack.open_channel`.
#[derive(Debug, Deserialize)]
struct OpenChannelArgs {
    channel: String,
}

/// Arguments for `slack.send_message`.
#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    channel: String,
    text: String,
    #[serde(default)]
    thread_ts: Option<String>,
}

/// Arguments for `slack.react`.
#[derive(Debug, Deserialize)]
struct ReactArgs {
    channel: String,
    ts: String,
    emoji: String,
    #[serde(default = "default_agent_user")]
    user: String,
}

/// Arguments for `slack.fetch_thread`.
#[derive(Debug, Deserialize)]
struct FetchThreadArgs {
    channel: String,
    thread_ts: String,
}

/// Delivery payload for scheduled chatter.
#[derive(Debug, Deserialize)]
struct DeliveryPayload {
    #[serde(default = "default_procurement_channel")]
    channel: String,
    text: String,
    #[serde(default = "default_system_user")]
    user: String,
    #[serde(default)]
    thread_ts: Option<String>,
}

fn default_agent_user() -> String {
    "agent".to_string()
}

fn default_system_user() -> String {
    "system".to_string()
}

fn default_procurement_channel() -> String {
    "#procurement".to_string()
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic chat twin.
#[derive(Debug)]
pub struct SlackTwin {
    /// Channels keyed by name.
    channels: BTreeMap<String, Channel>,
}

impl SlackTwin {
    /// Seeds channels from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut channels = BTreeMap::new();
        for name in &scenario.slack_channels {
            channels.insert(name.clone(), Channel::new());
        }
        if channels.is_empty() {
            channels.insert("#procurement".to_string(), Channel::new());
        }
        Self { channels }
    }

    /// Dispatches one slack operation.
    ///
    /// # Errors
    ///
    /// Returns structured errors for unknown channels, messages, and
    /// operations.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list_channels" => self.list_channels(decode_args(args)?),
            "open_channel" => self.open_channel(&decode_args::<OpenChannelArgs>(args)?),
            "send_message" => self.send_message(decode_args(args)?, ctx),
            "react" => self.react(decode_args(args)?),
            "fetch_thread" => self.fetch_thread(&decode_args::<FetchThreadArgs>(args)?),
            other => Err(unknown_operation(ServiceName::Slack, other)),
        }
    }

    /// Applies a scheduled delivery: appends a message, creating the channel
    /// when needed.
    ///
    /// # Errors
    ///
    /// Returns `invalid_args` when the payload lacks message text.
    pub fn deliver(&mut self, payload: &Value, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let payload: DeliveryPayload = decode_args(
            payload
                .as_object()
                .ok_or_else(|| FabricError::invalid_args("slack delivery requires an object"))?,
        )?;
        self.channels
            .entry(payload.channel.clone())
            .or_insert_with(Channel::new);
        self.append_message(
            &payload.channel,
            &payload.user,
            &payload.text,
            payload.thread_ts,
            ctx.now_ms,
        )
    }

    fn list_channels(&self, args: ListChannelsArgs) -> FabricResult<Value> {
        let needle = args
            .query
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        let mut rows: Vec<Value> = self
            .channels
            .iter()
            .filter(|(name, _)| needle.is_empty() || name.to_lowercase().contains(&needle))
            .map(|(name, channel)| {
                json!({"channel": name, "message_count": channel.messages.len()})
            })
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some("message_count") => "message_count",
            _ => "channel",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            let names: Vec<Value> = rows
                .iter()
                .filter_map(|row| row.get("channel").cloned())
                .collect();
            return Ok(Value::Array(names));
        }
        page::paginate(
            rows,
            "channels",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn open_channel(&self, args: &OpenChannelArgs) -> FabricResult<Value> {
        let channel = self.channel(&args.channel)?;
        Ok(json!({
            "channel": args.channel,
            "messages": channel.messages,
            "message_count": channel.messages.len(),
        }))
    }

    fn send_message(
        &mut self,
        args: SendMessageArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        if !self.channels.contains_key(&args.channel) {
            return Err(unknown_channel(&args.channel));
        }
        self.append_message(&args.channel, "agent", &args.text, args.thread_ts, ctx.now_ms)
    }

    fn react(&mut self, args: ReactArgs) -> FabricResult<Value> {
        let channel = self
            .channels
            .get_mut(&args.channel)
            .ok_or_else(|| unknown_channel(&args.channel))?;
        let message = channel
            .messages
            .iter_mut()
            .find(|message| message.ts == args.ts)
            .ok_or_else(|| {
                FabricError::new(
                    "unknown_message",
                    format!("no message {} in {}", args.ts, args.channel),
                )
            })?;
        message.reactions.push(Reaction {
            emoji: args.emoji,
            user: args.user,
        });
        Ok(json!({"ok": true, "reaction_count": message.reactions.len()}))
    }

    fn fetch_thread(&self, args: &FetchThreadArgs) -> FabricResult<Value> {
        let channel = self.channel(&args.channel)?;
        let messages: Vec<&SlackMessage> = channel
            .messages
            .iter()
            .filter(|message| {
                message.ts == args.thread_ts
                    || message.thread_ts.as_deref() == Some(args.thread_ts.as_str())
            })
            .collect();
        Ok(json!({
            "channel": args.channel,
            "thread_ts": args.thread_ts,
            "messages": messages,
        }))
    }

    fn append_message(
        &mut self,
        channel_name: &str,
        user: &str,
        text: &str,
        thread_ts: Option<String>,
        now_ms: u64,
    ) -> FabricResult<Value> {
        let channel = self
            .channels
            .get_mut(channel_name)
            .ok_or_else(|| unknown_channel(channel_name))?;
        let ts = channel.next_ts.to_string();
        channel.next_ts += 1;
        channel.messages.push(SlackMessage {
            channel: channel_name.to_string(),
            ts: ts.clone(),
            user: user.to_string(),
            text: text.to_string(),
            thread_ts,
            reactions: Vec::new(),
            time_ms: now_ms,
        });
        Ok(json!({"ts": ts, "channel": channel_name}))
    }

    fn channel(&self, name: &str) -> FabricResult<&Channel> {
        self.channels.get(name).ok_or_else(|| unknown_channel(name))
    }

    /// Observation menu contribution: one open entry per channel.
    #[must_use]
    pub fn menu_entries(&self) -> Vec<MenuEntry> {
        self.channels
            .keys()
            .map(|name| MenuEntry::new("slack.open_channel", json!({"channel": name})))
            .collect()
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        let total: usize = self.channels.values().map(|c| c.messages.len()).sum();
        format!("Slack: {} channels, {} messages", self.channels.len(), total)
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        let total: usize = self.channels.values().map(|c| c.messages.len()).sum();
        json!({"channel_count": self.channels.len(), "message_count": total})
    }
}

fn unknown_channel(name: &str) -> FabricError {
    FabricError::new("unknown_channel", format!("no such channel: {name}"))
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the slack twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("slack.list_channels", "List chat channels.")
            .with_permissions(&["chat:read"])
            .with_latency(120, 40),
        ToolSpec::new("slack.open_channel", "Open a channel and read its messages.")
            .with_permissions(&["chat:read"])
            .with_latency(150, 50),
        ToolSpec::new("slack.send_message", "Send a message to a channel or thread.")
            .with_permissions(&["chat:write"])
            .with_side_effects(&["chat_mutation"])
            .with_latency(220, 80),
        ToolSpec::new("slack.react", "Add an emoji reaction to a message.")
            .with_permissions(&["chat:write"])
            .with_side_effects(&["chat_mutation"])
            .with_latency(140, 40),
        ToolSpec::new("slack.fetch_thread", "Fetch a thread by its root ts.")
            .with_permissions(&["chat:read"])
            .with_latency(160, 50),
    ]
}

// ============================================================================
// SECTION: Tests
// ============================================================================
