// twin-fabric-world/src/scenario.rs
// ============================================================================
// Module: Scenario Model
// Description: Seed records describing the world a session starts from.
// Purpose: One serde-friendly value model shared by catalog, compiler, and
//          corpus generation.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Scenario fields are all optional with serde defaults so inline JSON can
//! specify as little or as much of the world as it wants. Entity seeds are
//! deliberately plainer than the live twin entities: twins own lifecycle
//! fields (versions, timestamps, histories) and derive them at load time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use twin_fabric_core::JsonMap;

// ============================================================================
// SECTION: Seed Records
// ============================================================================

/// Initial Slack message scheduled at session start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSeed {
    /// Channel to post into.
    pub channel: String,
    /// Posting user.
    #[serde(default = "default_system_user")]
    pub user: String,
    /// Message text.
    pub text: String,
    /// Delay before the message lands.
    #[serde(default)]
    pub dt_ms: u64,
}

/// Vendor the mail twin can answer for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorSeed {
    /// Vendor display name.
    pub name: String,
    /// Contact address; derived from the name when omitted.
    #[serde(default)]
    pub contact: Option<String>,
    /// Quoted price range in whole dollars `[lo, hi]`.
    pub price: [i64; 2],
    /// Delivery estimate range in days `[lo, hi]`.
    pub eta_days: [i64; 2],
}

impl VendorSeed {
    /// Contact address, deriving `sales@<slug>.example` when unset.
    #[must_use]
    pub fn contact_address(&self) -> String {
        self.contact.clone().unwrap_or_else(|| {
            let slug: String = self
                .name
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase();
            format!("sales@{slug}.example")
        })
    }
}

/// One canned vendor reply variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailReplySeed {
    /// Reply subject; defaults to `Re: <original subject>`.
    #[serde(default)]
    pub subj: Option<String>,
    /// Reply body.
    pub body_text: String,
    /// Fixed delivery delay; sampled deterministically when omitted.
    #[serde(default)]
    pub dt_ms: Option<u64>,
}

/// One clickable affordance on a browser node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordanceSeed {
    /// Tool the affordance maps to (usually `browser.click`).
    pub tool: String,
    /// Suggested arguments.
    #[serde(default)]
    pub args: Value,
}

/// One node of the finite browser graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserNodeSeed {
    /// Node URL.
    pub url: String,
    /// Page title.
    pub title: String,
    /// Visible excerpt.
    pub excerpt: String,
    /// Clickable affordances at this node.
    #[serde(default)]
    pub affordances: Vec<AffordanceSeed>,
    /// Edge map: affordance id → destination node key.
    #[serde(default)]
    pub next: BTreeMap<String, String>,
}

/// Knowledge-base document seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSeed {
    /// Title.
    pub title: String,
    /// Body text.
    pub body: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owning user.
    #[serde(default)]
    pub owner: Option<String>,
    /// Lifecycle status; defaults to `ACTIVE` for seeded documents.
    #[serde(default)]
    pub status: Option<String>,
}

/// Ticket seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSeed {
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Assignee.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Status; defaults to `open`.
    #[serde(default)]
    pub status: Option<String>,
    /// Priority; defaults to `P3`.
    #[serde(default)]
    pub priority: Option<String>,
    /// Severity; defaults to `medium`.
    #[serde(default)]
    pub severity: Option<String>,
    /// Labels.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Calendar event seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEventSeed {
    /// Stable id; assigned from the `EVT-` counter when omitted.
    #[serde(default)]
    pub event_id: Option<String>,
    /// Title.
    pub title: String,
    /// Start time (ms).
    pub start_ms: u64,
    /// End time (ms).
    pub end_ms: u64,
    /// Attendees.
    #[serde(default)]
    pub attendees: Vec<String>,
    /// Location.
    #[serde(default)]
    pub location: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Organizer; defaults to `system`.
    #[serde(default)]
    pub organizer: Option<String>,
}

/// Directory user seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUserSeed {
    /// Stable user id (`USR-…`).
    pub user_id: String,
    /// Primary email.
    pub email: String,
    /// Login shortname.
    #[serde(default)]
    pub login: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Job title.
    #[serde(default)]
    pub title: Option<String>,
    /// Department.
    #[serde(default)]
    pub department: Option<String>,
    /// Lifecycle status; defaults to `ACTIVE`.
    #[serde(default)]
    pub status: Option<String>,
    /// Group memberships.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Application assignments.
    #[serde(default)]
    pub applications: Vec<String>,
}

/// Directory group seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityGroupSeed {
    /// Stable group id (`GRP-…`).
    pub group_id: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Member user ids.
    #[serde(default)]
    pub members: Vec<String>,
}

/// SSO application seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityApplicationSeed {
    /// Stable application id (`APP-…`).
    pub app_id: String,
    /// Display label.
    pub label: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Assigned user ids.
    #[serde(default)]
    pub assignments: Vec<String>,
}

/// Service-desk incident seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentSeed {
    /// Stable incident id (`INC-…`).
    pub incident_id: String,
    /// Title.
    pub title: String,
    /// Status; defaults to `OPEN`.
    #[serde(default)]
    pub status: Option<String>,
    /// Priority; defaults to `P3`.
    #[serde(default)]
    pub priority: Option<String>,
    /// Assignee.
    #[serde(default)]
    pub assignee: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Service-desk request seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSeed {
    /// Stable request id (`REQ-…`).
    pub request_id: String,
    /// Summary.
    pub summary: String,
    /// Requesting user.
    pub requester: String,
    /// Status; defaults to `PENDING_APPROVAL`.
    #[serde(default)]
    pub status: Option<String>,
    /// Current approval stage.
    #[serde(default)]
    pub approval_stage: Option<String>,
    /// Current approval status.
    #[serde(default)]
    pub approval_status: Option<String>,
}

/// A pre-scheduled bus delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerailEventSeed {
    /// Delay from session start.
    pub dt_ms: u64,
    /// Delivery target twin.
    pub target: String,
    /// Delivery payload.
    pub payload: Value,
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// Complete seeded world state for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Free-form scenario metadata (type, difficulty, tags, …).
    #[serde(default)]
    pub metadata: JsonMap,
    /// Budget cap in whole dollars, when the world has one.
    #[serde(default)]
    pub budget_cap_usd: Option<i64>,
    /// Slack channels existing at session start.
    #[serde(default)]
    pub slack_channels: Vec<String>,
    /// Initial Slack message scheduled at session start.
    #[serde(default)]
    pub slack_initial_message: Option<SlackSeed>,
    /// Vendors the mail twin can answer for.
    #[serde(default)]
    pub vendors: Vec<VendorSeed>,
    /// Canned reply variants keyed by lowercased recipient address.
    #[serde(default)]
    pub vendor_reply_variants: BTreeMap<String, Vec<MailReplySeed>>,
    /// Browser node graph keyed by node key.
    #[serde(default)]
    pub browser_nodes: BTreeMap<String, BrowserNodeSeed>,
    /// Starting browser node key; defaults to `home` or the first node.
    #[serde(default)]
    pub browser_start: Option<String>,
    /// Documents keyed by `DOC-…` id.
    #[serde(default)]
    pub documents: BTreeMap<String, DocumentSeed>,
    /// Tickets keyed by `TCK-…` id.
    #[serde(default)]
    pub tickets: BTreeMap<String, TicketSeed>,
    /// Calendar events.
    #[serde(default)]
    pub calendar_events: Vec<CalendarEventSeed>,
    /// Directory users keyed by `USR-…` id.
    #[serde(default)]
    pub identity_users: BTreeMap<String, IdentityUserSeed>,
    /// Directory groups keyed by `GRP-…` id.
    #[serde(default)]
    pub identity_groups: BTreeMap<String, IdentityGroupSeed>,
    /// SSO applications keyed by `APP-…` id.
    #[serde(default)]
    pub identity_applications: BTreeMap<String, IdentityApplicationSeed>,
    /// Service-desk incidents keyed by `INC-…` id.
    #[serde(default)]
    pub service_incidents: BTreeMap<String, IncidentSeed>,
    /// Service-desk requests keyed by `REQ-…` id.
    #[serde(default)]
    pub service_requests: BTreeMap<String, RequestSeed>,
    /// Database tables: name → row objects.
    #[serde(default)]
    pub database_tables: BTreeMap<String, Vec<JsonMap>>,
    /// Pre-scheduled deliveries.
    #[serde(default)]
    pub derail_events: Vec<DerailEventSeed>,
}

/// Default posting user for seeded Slack messages.
fn default_system_user() -> String {
    "system".to_string()
}
