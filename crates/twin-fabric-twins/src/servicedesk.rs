// twin-fabric-twins/src/servicedesk.rs
// ============================================================================
// Module: Service Desk Twin
// Description: Incidents and requests with simple status machines.
// Purpose: Model IT intake queues and the approval stage/status pair.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! Incidents move OPEN → IN_PROGRESS → RESOLVED → CLOSED (with reopening);
//! requests move through the approval pipeline and carry an
//! `approval_stage`/`approval_status` pair that updates bump alongside
//! `updated_ms`.

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
use crate::unknown_operation;

/// Allowed incident transitions.
const INCIDENT_TRANSITIONS: &[(&str, &[&str])] = &[
    ("OPEN", &["IN_PROGRESS", "RESOLVED", "CLOSED"]),
    ("IN_PROGRESS", &["OPEN", "RESOLVED", "CLOSED"]),
    ("RESOLVED", &["CLOSED", "OPEN"]),
    ("CLOSED", &["OPEN"]),
];

/// Allowed request transitions.
const REQUEST_TRANSITIONS: &[(&str, &[&str])] = &[
    ("PENDING_APPROVAL", &["APPROVED", "REJECTED"]),
    ("APPROVED", &["IN_FULFILLMENT", "FULFILLED", "CLOSED"]),
    ("REJECTED", &["CLOSED"]),
    ("IN_FULFILLMENT", &["FULFILLED", "CLOSED"]),
    ("FULFILLED", &["CLOSED"]),
    ("CLOSED", &[]),
];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One appended comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Comment {
    /// Author.
    author: String,
    /// Body text.
    body: String,
    /// Logical append time.
    time_ms: u64,
}

/// One incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Incident {
    /// Stable id (`INC-…`).
    incident_id: String,
    /// Title.
    title: String,
    /// Status.
    status: String,
    /// Priority.
    priority: String,
    /// Assignee.
    assignee: String,
    /// Description.
    description: String,
    /// Appended comments.
    comments: Vec<Comment>,
    /// Creation time.
    created_ms: u64,
    /// Last mutation time.
    updated_ms: u64,
}

/// One service request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServiceRequest {
    /// Stable id (`REQ-…`).
    request_id: String,
    /// Summary.
    summary: String,
    /// Requesting user.
    requester: String,
    /// Status.
    status: String,
    /// Current approval stage.
    approval_stage: String,
    /// Current approval status.
    approval_status: String,
    /// Appended comments.
    comments: Vec<Comment>,
    /// Creation time.
    created_ms: u64,
    /// Last mutation time.
    updated_ms: u64,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `servicedesk.list_incidents`.
#[derive(Debug, Deserialize)]
struct ListIncidentsArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    sort_dir: Option<String>,
}

/// Arguments for `servicedesk.get_incident`.
#[derive(Debug, Deserialize)]
struct GetIncidentArgs {
    incident_id: String,
}

/// Arguments for `servicedesk.update_incident`.
#[derive(Debug, Deserialize)]
struct UpdateIncidentArgs {
    incident_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assignee: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

/// Arguments for `servicedesk.list_requests`.
#[derive(Debug, Deserialize)]
struct ListRequestsArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    requester: Option<String>,
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
}

/// Arguments for `servicedesk.get_request`.
#[derive(Debug, Deserialize)]
struct GetRequestArgs {
    request_id: String,
}

/// Arguments for `servicedesk.update_request`.
#[derive(Debug, Deserialize)]
struct UpdateRequestArgs {
    request_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    approval_stage: Option<String>,
    #[serde(default)]
    approval_status: Option<String>,
    #[serde(default)]
    comment: Option<String>,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic service-desk twin.
#[derive(Debug)]
pub struct ServiceDeskTwin {
    /// Incidents keyed by id.
    incidents: BTreeMap<String, Incident>,
    /// Requests keyed by id.
    requests: BTreeMap<String, ServiceRequest>,
}

impl ServiceDeskTwin {
    /// Seeds queues from the scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let incidents = scenario
            .service_incidents
            .iter()
            .map(|(id, seed)| {
                (
                    id.clone(),
                    Incident {
                        incident_id: id.clone(),
                        title: seed.title.clone(),
                        status: seed.status.clone().unwrap_or_else(|| "OPEN".to_string()),
                        priority: seed.priority.clone().unwrap_or_else(|| "P3".to_string()),
                        assignee: seed.assignee.clone().unwrap_or_default(),
                        description: seed.description.clone().unwrap_or_default(),
                        comments: Vec::new(),
                        created_ms: 0,
                        updated_ms: 0,
                    },
                )
            })
            .collect();
        let requests = scenario
            .service_requests
            .iter()
            .map(|(id, seed)| {
                (
                    id.clone(),
                    ServiceRequest {
                        request_id: id.clone(),
                        summary: seed.summary.clone(),
                        requester: seed.requester.clone(),
                        status: seed
                            .status
                            .clone()
                            .unwrap_or_else(|| "PENDING_APPROVAL".to_string()),
                        approval_stage: seed.approval_stage.clone().unwrap_or_default(),
                        approval_status: seed
                            .approval_status
                            .clone()
                            .unwrap_or_else(|| "PENDING".to_string()),
                        comments: Vec::new(),
                        created_ms: 0,
                        updated_ms: 0,
                    },
                )
            })
            .collect();
        Self {
            incidents,
            requests,
        }
    }

    /// Dispatches one service-desk operation.
    ///
    /// # Errors
    ///
    /// Returns `servicedesk.*` entity and transition errors per operation.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "list_incidents" => self.list_incidents(decode_args(args)?),
            "get_incident" => self.get_incident(&decode_args::<GetIncidentArgs>(args)?),
            "update_incident" => self.update_incident(decode_args(args)?, ctx),
            "list_requests" => self.list_requests(decode_args(args)?),
            "get_request" => self.get_request(&decode_args::<GetRequestArgs>(args)?),
            "update_request" => self.update_request(decode_args(args)?, ctx),
            other => Err(unknown_operation(ServiceName::Servicedesk, other)),
        }
    }

    fn list_incidents(&self, args: ListIncidentsArgs) -> FabricResult<Value> {
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let wanted_priority = args.priority.as_deref().map(str::to_uppercase);
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .incidents
            .values()
            .filter(|incident| {
                wanted_status
                    .as_ref()
                    .is_none_or(|status| &incident.status == status)
                    && wanted_priority
                        .as_ref()
                        .is_none_or(|priority| &incident.priority == priority)
                    && args
                        .assignee
                        .as_ref()
                        .is_none_or(|assignee| &incident.assignee == assignee)
                    && (needle.is_empty()
                        || incident.title.to_lowercase().contains(&needle)
                        || incident.description.to_lowercase().contains(&needle))
            })
            .filter_map(|incident| serde_json::to_value(incident).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("updated_ms" | "priority" | "status")) => field,
            _ => "incident_id",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        page::paginate(
            rows,
            "incidents",
            args.limit,
            args.cursor.as_deref(),
            "servicedesk.invalid_cursor",
        )
    }

    fn get_incident(&self, args: &GetIncidentArgs) -> FabricResult<Value> {
        let incident = self
            .incidents
            .get(&args.incident_id)
            .ok_or_else(|| unknown_incident(&args.incident_id))?;
        serde_json::to_value(incident)
            .map_err(|err| FabricError::new("servicedesk.serialization", err.to_string()))
    }

    fn update_incident(
        &mut self,
        args: UpdateIncidentArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let incident = self
            .incidents
            .get_mut(&args.incident_id)
            .ok_or_else(|| unknown_incident(&args.incident_id))?;
        if let Some(status) = args.status {
            let next = status.trim().to_uppercase();
            if next != incident.status {
                check_transition(
                    INCIDENT_TRANSITIONS,
                    &incident.status,
                    &next,
                    &args.incident_id,
                )?;
                incident.status = next;
            }
        }
        if let Some(assignee) = args.assignee {
            incident.assignee = assignee;
        }
        if let Some(comment) = args.comment {
            incident.comments.push(Comment {
                author: "agent".to_string(),
                body: comment,
                time_ms: ctx.now_ms,
            });
        }
        incident.updated_ms = incident.updated_ms.saturating_add(1).max(ctx.now_ms);
        Ok(json!({
            "incident_id": args.incident_id,
            "status": incident.status,
            "updated_ms": incident.updated_ms,
        }))
    }

    fn list_requests(&self, args: ListRequestsArgs) -> FabricResult<Value> {
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .requests
            .values()
            .filter(|request| {
                wanted_status
                    .as_ref()
                    .is_none_or(|status| &request.status == status)
                    && args
                        .requester
                        .as_ref()
                        .is_none_or(|requester| &request.requester == requester)
                    && (needle.is_empty() || request.summary.to_lowercase().contains(&needle))
            })
            .filter_map(|request| serde_json::to_value(request).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("updated_ms" | "status" | "requester")) => field,
            _ => "request_id",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        page::paginate(
            rows,
            "requests",
            args.limit,
            args.cursor.as_deref(),
            "servicedesk.invalid_cursor",
        )
    }

    fn get_request(&self, args: &GetRequestArgs) -> FabricResult<Value> {
        let request = self
            .requests
            .get(&args.request_id)
            .ok_or_else(|| unknown_request(&args.request_id))?;
        serde_json::to_value(request)
            .map_err(|err| FabricError::new("servicedesk.serialization", err.to_string()))
    }

    fn update_request(
        &mut self,
        args: UpdateRequestArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let request = self
            .requests
            .get_mut(&args.request_id)
            .ok_or_else(|| unknown_request(&args.request_id))?;
        if let Some(status) = args.status {
            let next = status.trim().to_uppercase();
            if next != request.status {
                check_transition(
                    REQUEST_TRANSITIONS,
                    &request.status,
                    &next,
                    &args.request_id,
                )?;
                request.status = next;
            }
        }
        if let Some(stage) = args.approval_stage {
            request.approval_stage = stage;
        }
        if let Some(approval) = args.approval_status {
            request.approval_status = approval.trim().to_uppercase();
        }
        if let Some(comment) = args.comment {
            request.comments.push(Comment {
                author: "agent".to_string(),
                body: comment,
                time_ms: ctx.now_ms,
            });
        }
        request.updated_ms = request.updated_ms.saturating_add(1).max(ctx.now_ms);
        Ok(json!({
            "request_id": args.request_id,
            "status": request.status,
            "approval_stage": request.approval_stage,
            "approval_status": request.approval_status,
            "updated_ms": request.updated_ms,
        }))
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "ServiceDesk: {} incidents, {} requests",
            self.incidents.len(),
            self.requests.len()
        )
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        json!({
            "incident_count": self.incidents.len(),
            "request_count": self.requests.len(),
        })
    }
}

fn unknown_incident(id: &str) -> FabricError {
    FabricError::new("unknown_incident", format!("no such incident: {id}"))
}

fn unknown_request(id: &str) -> FabricError {
    FabricError::new("unknown_request", format!("no such request: {id}"))
}

fn check_transition(
    table: &[(&str, &[&str])],
    from: &str,
    to: &str,
    entity: &str,
) -> FabricResult<()> {
    let allowed = table
        .iter()
        .find(|(status, _)| *status == from)
        .map(|(_, next)| *next)
        .unwrap_or(&[]);
    if allowed.contains(&to) {
        Ok(())
    } else {
        Err(FabricError::new(
            "servicedesk.invalid_transition",
            format!("cannot transition {entity} from {from} to {to}"),
        ))
    }
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the service-desk twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("servicedesk.list_incidents", "List service incidents.")
            .with_permissions(&["servicedesk:read"])
            .with_latency(250, 80),
        ToolSpec::new("servicedesk.get_incident", "Get incident details.")
            .with_permissions(&["servicedesk:read"])
            .with_latency(220, 70),
        ToolSpec::new("servicedesk.update_incident", "Update incident fields.")
            .with_permissions(&["servicedesk:write"])
            .with_side_effects(&["servicedesk_mutation"])
            .with_latency(340, 110),
        ToolSpec::new("servicedesk.list_requests", "List service requests.")
            .with_permissions(&["servicedesk:read"])
            .with_latency(250, 80),
        ToolSpec::new("servicedesk.get_request", "Get request details.")
            .with_permissions(&["servicedesk:read"])
            .with_latency(220, 70),
        ToolSpec::new("servicedesk.update_request", "Update request and approval fields.")
            .with_permissions(&["servicedesk:write"])
            .with_side_effects(&["servicedesk_mutation"])
            .with_latency(340, 110),
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
    fn pending_requests_are_listable_and_approvable() {
        let mut twin = ServiceDeskTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(100, &mut rng);

        let pending = twin
            .dispatch(
                "list_requests",
                &args(json!({"status": "PENDING_APPROVAL", "limit": 5})),
                &mut ctx,
            )
            .unwrap();
        assert!(pending["count"].as_u64().unwrap() >= 1);

        let approved = twin
            .dispatch(
                "update_request",
                &args(json!({
                    "request_id": "REQ-8801",
                    "status": "APPROVED",
                    "approval_stage": "security",
                    "approval_status": "APPROVED",
                    "comment": "Group assignment validated.",
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(approved["status"], "APPROVED");
        assert_eq!(approved["approval_status"], "APPROVED");
        assert!(approved["updated_ms"].as_u64().unwrap() >= 100);
    }

    #[test]
    fn illegal_request_transitions_are_rejected() {
        let mut twin = ServiceDeskTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch(
                "update_request",
                &args(json!({"request_id": "REQ-8801", "status": "FULFILLED"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "servicedesk.invalid_transition");
    }

    #[test]
    fn incident_updates_bump_updated_ms_and_append_comments() {
        let mut twin = ServiceDeskTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(500, &mut rng);
        let updated = twin
            .dispatch(
                "update_incident",
                &args(json!({
                    "incident_id": "INC-5001",
                    "status": "IN_PROGRESS",
                    "assignee": "netops.lead",
                    "comment": "Replicated on the east VPN pool.",
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(updated["status"], "IN_PROGRESS");

        let detail = twin
            .dispatch("get_incident", &args(json!({"incident_id": "INC-5001"})), &mut ctx)
            .unwrap();
        assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
        assert_eq!(detail["assignee"], "netops.lead");
    }

    #[test]
    fn unknown_entities_surface_scoped_codes() {
        let mut twin = ServiceDeskTwin::from_scenario(&baseline());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch("get_incident", &args(json!({"incident_id": "INC-404"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "unknown_incident");
        let err = twin
            .dispatch("get_request", &args(json!({"request_id": "REQ-404"})), &mut ctx)
            .unwrap_err();
        assert_eq!(err.code, "unknown_request");
    }
}
