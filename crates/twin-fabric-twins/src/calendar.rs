// twin-fabric-twins/src/calendar.rs
// ============================================================================
// Module: Calendar Twin
// Description: Event lifecycle with attendee responses and cancellation.
// Purpose: Model invites whose cancelled state rejects every write.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Events carry `{CONFIRMED, TENTATIVE, CANCELED}` status, a monotone
//! version, and per-attendee responses. Cancellation is terminal for writes
//! and responses. Delivery routes on the explicit `op` field; the legacy
//! known-id heuristic applies only when `op` is absent.

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
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_core::page;
use twin_fabric_world::Scenario;

use crate::ServiceName;
use crate::decode_args;
use crate::seeded_seq;
use crate::unknown_operation;

/// Valid event lifecycle states.
const VALID_STATUSES: &[&str] = &["CONFIRMED", "TENTATIVE", "CANCELED"];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One calendar event.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CalendarEvent {
    /// Stable id (`EVT-…`).
    event_id: String,
    /// Title.
    title: String,
    /// Start time (ms).
    start_ms: u64,
    /// End time (ms).
    end_ms: u64,
    /// Attendees.
    attendees: Vec<String>,
    /// Location.
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Lifecycle status.
    status: String,
    /// Organizer.
    organizer: String,
    /// Monotone version.
    version: u64,
    /// Creation time.
    created_ms: u64,
    /// Last mutation time.
    updated_ms: u64,
    /// Cancellation reason, once cancelled.
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel_reason: Option<String>,
    /// Attendee → `accepted` | `declined`.
    responses: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `calendar.list_events`.
#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    attendee: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    starts_after_ms: Option<u64>,
    #[serde(default)]
    ends_before_ms: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
    #[serde(default)]
    legacy: bool,
}

/// Arguments for `calendar.create_event`.
#[derive(Debug, Deserialize)]
struct CreateArgs {
    title: String,
    start_ms: u64,
    end_ms: u64,
    #[serde(default)]
    attendees: Vec<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    organizer: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Arguments for `calendar.update_event`.
#[derive(Debug, Deserialize)]
struct UpdateArgs {
    event_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_ms: Option<u64>,
    #[serde(default)]
    end_ms: Option<u64>,
    #[serde(default)]
    attendees: Option<Vec<String>>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Arguments for `calendar.cancel_event`.
#[derive(Debug, Deserialize)]
struct CancelArgs {
    event_id: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Arguments for accept/decline.
#[derive(Debug, Deserialize)]
struct RespondArgs {
    event_id: String,
    attendee: String,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic calendar twin.
#[derive(Debug)]
pub struct CalendarTwin {
    /// Events keyed by id.
    events: BTreeMap<String, CalendarEvent>,
    /// Next `EVT-` counter value.
    seq: u64,
}

impl CalendarTwin {
    /// Seeds events from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let mut events = BTreeMap::new();
        let mut pending_seq = 1;
        for seed in &scenario.calendar_events {
            let event_id = seed.event_id.clone().unwrap_or_else(|| {
                let id = format!("EVT-{pending_seq}");
                pending_seq += 1;
                id
            });
            events.insert(
                event_id.clone(),
                CalendarEvent {
                    event_id,
                    title: seed.title.clone(),
                    start_ms: seed.start_ms,
                    end_ms: seed.end_ms,
                    attendees: seed.attendees.clone(),
                    location: seed.location.clone(),
                    description: seed.description.clone(),
                    status: "CONFIRMED".to_string(),
                    organizer: seed
                        .organizer
                        .clone()
                        .unwrap_or_else(|| "system".to_string()),
                    version: 1,
                    created_ms: 0,
                    updated_ms: 0,
                    cancel_reason: None,
                    responses: BTreeMap::new(),
                },
            );
        }
        let seq = seeded_seq(events.keys(), "EVT-").max(pending_seq);
        Self { events, seq }
    }

    /// Dispatches one calendar operation.
    ///
    /// # Errors
    ///
    /// Returns `unknown_event`, `invalid_state`, `invalid_args`, or
    /// `unknown_operation`.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list_events" => self.list_events(decode_args(args)?),
            "create_event" => self.create_event(decode_args(args)?, ctx),
            "update_event" => self.update_event(decode_args(args)?, ctx),
            "cancel_event" => self.cancel_event(decode_args(args)?, ctx),
            "accept" => self.respond(&decode_args::<RespondArgs>(args)?, "accepted"),
            "decline" => self.respond(&decode_args::<RespondArgs>(args)?, "declined"),
            other => Err(unknown_operation(ServiceName::Calendar, other)),
        }
    }

    /// Applies a scheduled delivery with `op ∈ {create, update, cancel}`.
    /// The explicit `op` field is authoritative; a bare payload with a known
    /// `event_id` routes to update, anything else creates.
    ///
    /// # Errors
    ///
    /// Returns `calendar.invalid_event` for payloads that fit no shape.
    pub fn deliver(&mut self, payload: &Value, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let object = payload.as_object().ok_or_else(|| {
            FabricError::new("calendar.invalid_event", "payload must be an object")
        })?;
        let mut args = object.clone();
        args.remove("op");
        match object.get("op").and_then(Value::as_str) {
            Some("update") => self.update_event(decode_args(&args)?, ctx),
            Some("cancel") => self.cancel_event(decode_args(&args)?, ctx),
            Some("create") => self.create_event(decode_args(&args)?, ctx),
            Some(other) => Err(FabricError::new(
                "calendar.invalid_event",
                format!("unsupported calendar delivery op: {other}"),
            )),
            None => {
                let known = object
                    .get("event_id")
                    .and_then(Value::as_str)
                    .is_some_and(|id| self.events.contains_key(id));
                if known {
                    self.update_event(decode_args(&args)?, ctx)
                } else {
                    args.remove("event_id");
                    self.create_event(decode_args(&args)?, ctx)
                }
            }
        }
    }

    fn list_events(&self, args: ListArgs) -> FabricResult<Value> {
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let wanted_attendee = args.attendee.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Value> = self
            .events
            .values()
            .filter(|event| {
                wanted_status
                    .as_ref()
                    .is_none_or(|status| &event.status == status)
                    && wanted_attendee.as_ref().is_none_or(|attendee| {
                        event
                            .attendees
                            .iter()
                            .any(|a| a.to_lowercase() == *attendee)
                    })
                    && args
                        .starts_after_ms
                        .is_none_or(|after| event.start_ms >= after)
                    && args
                        .ends_before_ms
                        .is_none_or(|before| event.end_ms <= before)
            })
            .filter_map(|event| serde_json::to_value(event).ok())
            .collect();
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, "start_ms", descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "events",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn create_event(&mut self, args: CreateArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let status = normalize_status(args.status.as_deref().unwrap_or("CONFIRMED"))?;
        let event_id = format!("EVT-{}", self.seq);
        self.seq += 1;
        self.events.insert(
            event_id.clone(),
            CalendarEvent {
                event_id: event_id.clone(),
                title: args.title,
                start_ms: args.start_ms,
                end_ms: args.end_ms,
                attendees: args.attendees,
                location: args.location,
                description: args.description,
                status: status.clone(),
                organizer: args.organizer.unwrap_or_else(|| "agent".to_string()),
                version: 1,
                created_ms: ctx.now_ms,
                updated_ms: ctx.now_ms,
                cancel_reason: None,
                responses: BTreeMap::new(),
            },
        );
        Ok(json!({"event_id": event_id, "status": status}))
    }

    fn update_event(&mut self, args: UpdateArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let status = args.status.as_deref().map(normalize_status).transpose()?;
        let event = self
            .events
            .get_mut(&args.event_id)
            .ok_or_else(|| unknown_event(&args.event_id))?;
        if event.status == "CANCELED" {
            return Err(FabricError::new(
                "invalid_state",
                format!("cannot update canceled event: {}", args.event_id),
            ));
        }
        if let Some(title) = args.title {
            event.title = title;
        }
        if let Some(start_ms) = args.start_ms {
            event.start_ms = start_ms;
        }
        if let Some(end_ms) = args.end_ms {
            event.end_ms = end_ms;
        }
        if let Some(attendees) = args.attendees {
            event.attendees = attendees;
        }
        if let Some(location) = args.location {
            event.location = Some(location);
        }
        if let Some(description) = args.description {
            event.description = Some(description);
        }
        if let Some(status) = status {
            event.status = status;
        }
        event.version += 1;
        event.updated_ms = event.updated_ms.saturating_add(1).max(ctx.now_ms);
        serde_json::to_value(&*event)
            .map_err(|err| FabricError::new("calendar.serialization", err.to_string()))
    }

    fn cancel_event(&mut self, args: CancelArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let event = self
            .events
            .get_mut(&args.event_id)
            .ok_or_else(|| unknown_event(&args.event_id))?;
        if event.status == "CANCELED" {
            return Ok(json!({
                "event_id": args.event_id,
                "status": "CANCELED",
                "changed": false,
            }));
        }
        event.status = "CANCELED".to_string();
        event.cancel_reason = Some(args.reason.unwrap_or_else(|| "manual_cancel".to_string()));
        event.version += 1;
        event.updated_ms = event.updated_ms.saturating_add(1).max(ctx.now_ms);
        Ok(json!({
            "event_id": args.event_id,
            "status": "CANCELED",
            "changed": true,
        }))
    }

    fn respond(&mut self, args: &RespondArgs, response: &str) -> FabricResult<Value> {
        let event = self
            .events
            .get_mut(&args.event_id)
            .ok_or_else(|| unknown_event(&args.event_id))?;
        if event.status == "CANCELED" {
            return Err(FabricError::new(
                "invalid_state",
                format!("cannot respond to canceled event: {}", args.event_id),
            ));
        }
        if !event.attendees.is_empty() && !event.attendees.contains(&args.attendee) {
            return Err(FabricError::new(
                "unknown_attendee",
                format!("attendee {} not on event {}", args.attendee, args.event_id),
            ));
        }
        event
            .responses
            .insert(args.attendee.clone(), response.to_string());
        Ok(json!({
            "event_id": args.event_id,
            "attendee": args.attendee,
            "status": response,
        }))
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("Calendar: {} events", self.events.len())
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        let canceled = self
            .events
            .values()
            .filter(|event| event.status == "CANCELED")
            .count();
        json!({
            "event_count": self.events.len(),
            "canceled_count": canceled,
            "next_seq": self.seq,
        })
    }
}

fn unknown_event(id: &str) -> FabricError {
    FabricError::new("unknown_event", format!("no such event: {id}"))
}

fn normalize_status(raw: &str) -> FabricResult<String> {
    let status = raw.trim().to_uppercase();
    if VALID_STATUSES.contains(&status.as_str()) {
        Ok(status)
    } else {
        Err(FabricError::invalid_args(format!(
            "invalid event status: {raw}"
        )))
    }
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the calendar twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("calendar.list_events", "List calendar events.")
            .with_permissions(&["calendar:read"])
            .with_latency(160, 50),
        ToolSpec::new("calendar.create_event", "Create a calendar event.")
            .with_permissions(&["calendar:write"])
            .with_side_effects(&["calendar_mutation"])
            .with_latency(300, 90),
        ToolSpec::new("calendar.update_event", "Update an event, bumping its version.")
            .with_permissions(&["calendar:write"])
            .with_side_effects(&["calendar_mutation"])
            .with_latency(280, 90),
        ToolSpec::new("calendar.cancel_event", "Cancel an event; terminal for writes.")
            .with_permissions(&["calendar:write"])
            .with_side_effects(&["calendar_mutation"])
            .with_latency(260, 80),
        ToolSpec::new("calendar.accept", "Accept an invite as an attendee.")
            .with_permissions(&["calendar:write"])
            .with_side_effects(&["calendar_mutation"])
            .with_latency(180, 60),
        ToolSpec::new("calendar.decline", "Decline an invite as an attendee.")
            .with_permissions(&["calendar:write"])
            .with_side_effects(&["calendar_mutation"])
            .with_latency(180, 60),
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

    fn create(twin: &mut CalendarTwin, ctx: &mut TwinContext<'_>) -> String {
        let created = twin
            .dispatch(
                "create_event",
                &args(json!({
                    "title": "Finance Review",
                    "start_ms": 50_000,
                    "end_ms": 60_000,
                    "attendees": ["sam@macrocompute.example"],
                    "organizer": "ops@macrocompute.example",
                })),
                ctx,
            )
            .unwrap();
        created["event_id"].as_str().unwrap().to_string()
    }

    #[test]
    fn cancelled_events_reject_updates_and_responses() {
        let mut twin = CalendarTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(100, &mut rng);
        let event_id = create(&mut twin, &mut ctx);

        twin.dispatch(
            "update_event",
            &args(json!({"event_id": event_id, "location": "Room 42"})),
            &mut ctx,
        )
        .unwrap();
        let canceled = twin
            .dispatch(
                "cancel_event",
                &args(json!({"event_id": event_id, "reason": "reschedule"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(canceled["changed"], true);

        let err = twin
            .dispatch(
                "update_event",
                &args(json!({"event_id": event_id, "title": "nope"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "invalid_state");

        let err = twin
            .dispatch(
                "accept",
                &args(json!({"event_id": event_id, "attendee": "sam@macrocompute.example"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "invalid_state");

        // Cancel is idempotent.
        let again = twin
            .dispatch("cancel_event", &args(json!({"event_id": event_id})), &mut ctx)
            .unwrap();
        assert_eq!(again["changed"], false);
    }

    #[test]
    fn responses_validate_attendee_membership() {
        let mut twin = CalendarTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let event_id = create(&mut twin, &mut ctx);

        let ok = twin
            .dispatch(
                "accept",
                &args(json!({"event_id": event_id, "attendee": "sam@macrocompute.example"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(ok["status"], "accepted");

        let err = twin
            .dispatch(
                "decline",
                &args(json!({"event_id": event_id, "attendee": "stranger@else.example"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "unknown_attendee");
    }

    #[test]
    fn list_filters_by_status_and_window() {
        let mut twin = CalendarTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let event_id = create(&mut twin, &mut ctx);
        twin.dispatch("cancel_event", &args(json!({"event_id": event_id})), &mut ctx)
            .unwrap();

        let listing = twin
            .dispatch(
                "list_events",
                &args(json!({"status": "CANCELED", "limit": 5})),
                &mut ctx,
            )
            .unwrap();
        assert!(
            listing["events"]
                .as_array()
                .unwrap()
                .iter()
                .any(|event| event["event_id"] == event_id.as_str())
        );

        let windowed = twin
            .dispatch(
                "list_events",
                &args(json!({"starts_after_ms": 100_000, "limit": 5})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(windowed["count"], 0);
    }

    #[test]
    fn delivery_honors_the_explicit_op_field() {
        let mut twin = CalendarTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let created = twin
            .deliver(
                &json!({
                    "title": "Approval Sync",
                    "start_ms": 10_000,
                    "end_ms": 11_000,
                    "attendees": ["ops@macrocompute.example"],
                }),
                &mut ctx,
            )
            .unwrap();
        let event_id = created["event_id"].as_str().unwrap().to_string();

        let updated = twin
            .deliver(
                &json!({"op": "update", "event_id": event_id, "title": "Approval Sync v2"}),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(updated["title"], "Approval Sync v2");

        let cancelled = twin
            .deliver(&json!({"op": "cancel", "event_id": event_id}), &mut ctx)
            .unwrap();
        assert_eq!(cancelled["status"], "CANCELED");

        let err = twin
            .deliver(&json!({"op": "explode", "event_id": event_id}), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "calendar.invalid_event");
    }
}
