// twin-fabric-twins/src/lib.rs
// ============================================================================
// Module: Twin Fabric Twins Library
// Description: Deterministic in-memory twins of enterprise SaaS services.
// Purpose: Expose per-service state machines behind a uniform dispatch and
//          delivery surface.
// Dependencies: serde, serde_json, twin-fabric-core, twin-fabric-world
// ============================================================================

//! ## Overview
//! A twin is a deterministic simulation of one SaaS service: its entity
//! maps, lifecycle rules, and pagination contract. [`TwinSet`] composes the
//! eleven twins behind two entry points: `dispatch` for tool calls and
//! `deliver` for bus events. Twins never see the bus or the session RNG
//! directly; both arrive through the per-call [`TwinContext`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod browser;
pub mod calendar;
pub mod crm;
pub mod database;
pub mod docs;
pub mod erp;
pub mod identity;
pub mod mail;
pub mod servicedesk;
pub mod slack;
pub mod tickets;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::FabricResult;
use twin_fabric_core::JsonMap;
use twin_fabric_core::ToolSpec;
use twin_fabric_core::TwinContext;
use twin_fabric_world::Scenario;

pub use browser::BrowserTwin;
pub use calendar::CalendarTwin;
pub use crm::CrmTwin;
pub use database::DatabaseTwin;
pub use docs::DocsTwin;
pub use erp::ErpTwin;
pub use identity::OktaTwin;
pub use mail::MailTwin;
pub use servicedesk::ServiceDeskTwin;
pub use slack::SlackTwin;
pub use tickets::TicketsTwin;

// ============================================================================
// SECTION: Service Names
// ============================================================================

/// The service families hosted by the fabric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceName {
    /// Chat twin.
    Slack,
    /// Mailbox twin.
    Mail,
    /// Finite-graph browser twin.
    Browser,
    /// Knowledge-base twin.
    Docs,
    /// Calendar twin.
    Calendar,
    /// Ticketing twin.
    Tickets,
    /// CRM twin.
    Crm,
    /// ERP twin.
    Erp,
    /// Relational store twin.
    Db,
    /// Identity directory twin.
    Okta,
    /// Service-desk twin.
    Servicedesk,
}

impl ServiceName {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Mail => "mail",
            Self::Browser => "browser",
            Self::Docs => "docs",
            Self::Calendar => "calendar",
            Self::Tickets => "tickets",
            Self::Crm => "crm",
            Self::Erp => "erp",
            Self::Db => "db",
            Self::Okta => "okta",
            Self::Servicedesk => "servicedesk",
        }
    }

    /// Parses a lowercase wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "slack" => Some(Self::Slack),
            "mail" => Some(Self::Mail),
            "browser" => Some(Self::Browser),
            "docs" => Some(Self::Docs),
            "calendar" => Some(Self::Calendar),
            "tickets" => Some(Self::Tickets),
            "crm" => Some(Self::Crm),
            "erp" => Some(Self::Erp),
            "db" => Some(Self::Db),
            "okta" => Some(Self::Okta),
            "servicedesk" => Some(Self::Servicedesk),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every service family, in wire-name order.
pub const ALL_SERVICES: &[ServiceName] = &[
    ServiceName::Browser,
    ServiceName::Calendar,
    ServiceName::Crm,
    ServiceName::Db,
    ServiceName::Docs,
    ServiceName::Erp,
    ServiceName::Mail,
    ServiceName::Okta,
    ServiceName::Servicedesk,
    ServiceName::Slack,
    ServiceName::Tickets,
];

// ============================================================================
// SECTION: Twin Options
// ============================================================================

/// Twin tuning derived from the runtime configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwinOptions {
    /// Injected fault rate for ERP invoice/payment operations.
    pub erp_error_rate: f64,
    /// Injected consent-violation rate for CRM outreach.
    pub crm_error_rate: f64,
}

// ============================================================================
// SECTION: Twin Set
// ============================================================================

/// The full twin population of one session.
#[derive(Debug)]
pub struct TwinSet {
    /// Chat twin.
    pub slack: SlackTwin,
    /// Mailbox twin.
    pub mail: MailTwin,
    /// Browser twin.
    pub browser: BrowserTwin,
    /// Knowledge-base twin.
    pub docs: DocsTwin,
    /// Calendar twin.
    pub calendar: CalendarTwin,
    /// Ticketing twin.
    pub tickets: TicketsTwin,
    /// CRM twin.
    pub crm: CrmTwin,
    /// ERP twin.
    pub erp: ErpTwin,
    /// Relational store twin.
    pub db: DatabaseTwin,
    /// Identity directory twin.
    pub okta: OktaTwin,
    /// Service-desk twin.
    pub servicedesk: ServiceDeskTwin,
}

impl TwinSet {
    /// Materializes the twin population from a scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario, options: TwinOptions) -> Self {
        Self {
            slack: SlackTwin::from_scenario(scenario),
            mail: MailTwin::from_scenario(scenario),
            browser: BrowserTwin::from_scenario(scenario),
            docs: DocsTwin::from_scenario(scenario),
            calendar: CalendarTwin::from_scenario(scenario),
            tickets: TicketsTwin::from_scenario(scenario),
            crm: CrmTwin::new(options.crm_error_rate),
            erp: ErpTwin::new(options.erp_error_rate),
            db: DatabaseTwin::from_scenario(scenario),
            okta: OktaTwin::from_scenario(scenario),
            servicedesk: ServiceDeskTwin::from_scenario(scenario),
        }
    }

    /// Dispatches one tool operation to the owning twin.
    ///
    /// # Errors
    ///
    /// Propagates the twin's structured error; unknown operations map to
    /// `unknown_operation`.
    pub fn dispatch(
        &mut self,
        service: ServiceName,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match service {
            ServiceName::Slack => self.slack.dispatch(operation, args, ctx),
            ServiceName::Mail => self.mail.dispatch(operation, args, ctx),
            ServiceName::Browser => self.browser.dispatch(operation, args, ctx),
            ServiceName::Docs => self.docs.dispatch(operation, args, ctx),
            ServiceName::Calendar => self.calendar.dispatch(operation, args, ctx),
            ServiceName::Tickets => self.tickets.dispatch(operation, args, ctx),
            ServiceName::Crm => self.crm.dispatch(operation, args, ctx),
            ServiceName::Erp => self.erp.dispatch(operation, args, ctx),
            ServiceName::Db => self.db.dispatch(operation, args, ctx),
            ServiceName::Okta => self.okta.dispatch(operation, args, ctx),
            ServiceName::Servicedesk => self.servicedesk.dispatch(operation, args, ctx),
        }
    }

    /// Routes a bus delivery to the target twin.
    ///
    /// Returns `None` for unknown targets so the router can log the
    /// `bus.unknown_target` warning without failing the tick.
    pub fn deliver(
        &mut self,
        target: &str,
        payload: &Value,
        ctx: &mut TwinContext<'_>,
    ) -> Option<FabricResult<Value>> {
        let Some(service) = ServiceName::parse(target) else {
            return None;
        };
        Some(match service {
            ServiceName::Slack => self.slack.deliver(payload, ctx),
            ServiceName::Mail => self.mail.deliver(payload, ctx),
            ServiceName::Docs => self.docs.deliver(payload, ctx),
            ServiceName::Calendar => self.calendar.deliver(payload, ctx),
            ServiceName::Tickets => self.tickets.deliver(payload, ctx),
            ServiceName::Db => self.db.deliver(payload, ctx),
            // The remaining services take op-shaped deliveries equivalent to
            // the corresponding tool call.
            ServiceName::Browser
            | ServiceName::Crm
            | ServiceName::Erp
            | ServiceName::Okta
            | ServiceName::Servicedesk => self.deliver_by_op(service, payload, ctx),
        })
    }

    /// Generic delivery: the payload's `op` field selects the operation and
    /// the remaining keys become its arguments.
    fn deliver_by_op(
        &mut self,
        service: ServiceName,
        payload: &Value,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let Some(object) = payload.as_object() else {
            return Err(FabricError::new(
                format!("{service}.invalid_event"),
                "delivery payload must be an object",
            ));
        };
        let Some(op) = object.get("op").and_then(Value::as_str).map(ToString::to_string) else {
            return Err(FabricError::new(
                format!("{service}.invalid_event"),
                format!("{service} delivery requires an op field"),
            ));
        };
        let mut args = object.clone();
        args.remove("op");
        self.dispatch(service, &op, &args, ctx)
    }

    /// Per-service state digests used for snapshots and the state head.
    #[must_use]
    pub fn digests(&self) -> Value {
        json!({
            "slack": self.slack.digest(),
            "mail": self.mail.digest(),
            "browser": self.browser.digest(),
            "docs": self.docs.digest(),
            "calendar": self.calendar.digest(),
            "tickets": self.tickets.digest(),
            "crm": self.crm.digest(),
            "erp": self.erp.digest(),
            "db": self.db.digest(),
            "okta": self.okta.digest(),
            "servicedesk": self.servicedesk.digest(),
        })
    }

    /// The full tool-spec catalog across every twin.
    #[must_use]
    pub fn tool_specs() -> Vec<ToolSpec> {
        let mut specs = Vec::new();
        specs.extend(slack::specs());
        specs.extend(mail::specs());
        specs.extend(browser::specs());
        specs.extend(docs::specs());
        specs.extend(calendar::specs());
        specs.extend(tickets::specs());
        specs.extend(crm::specs());
        specs.extend(erp::specs());
        specs.extend(database::specs());
        specs.extend(identity::specs());
        specs.extend(servicedesk::specs());
        specs
    }
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Decodes a schemaless argument map into a typed request struct.
pub(crate) fn decode_args<T: serde::de::DeserializeOwned>(args: &JsonMap) -> FabricResult<T> {
    serde_json::from_value(Value::Object(args.clone()))
        .map_err(|err| FabricError::invalid_args(err.to_string()))
}

/// Builds the `unknown_operation` error for a service.
pub(crate) fn unknown_operation(service: ServiceName, operation: &str) -> FabricError {
    FabricError::new(
        "unknown_operation",
        format!("unsupported operation for {service}: {operation}"),
    )
}

/// Next id counter value past the highest seeded `<prefix>N` suffix.
pub(crate) fn seeded_seq<'a>(ids: impl Iterator<Item = &'a String>, prefix: &str) -> u64 {
    let mut seq = 1;
    for id in ids {
        if let Some(rest) = id.strip_prefix(prefix)
            && let Ok(n) = rest.parse::<u64>()
        {
            seq = seq.max(n + 1);
        }
    }
    seq
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

    #[test]
    fn unknown_delivery_targets_are_reported_as_none() {
        let mut twins = TwinSet::from_scenario(&baseline(), TwinOptions::default());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        assert!(twins.deliver("ghost", &json!({}), &mut ctx).is_none());
    }

    #[test]
    fn op_shaped_delivery_routes_to_the_tool_semantics() {
        let mut twins = TwinSet::from_scenario(&baseline(), TwinOptions::default());
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let result = twins
            .deliver(
                "okta",
                &json!({"op": "suspend_user", "user_id": "USR-9001"}),
                &mut ctx,
            )
            .unwrap()
            .unwrap();
        assert_eq!(result["status"], "SUSPENDED");
    }

    #[test]
    fn tool_spec_catalog_has_unique_names() {
        let specs = TwinSet::tool_specs();
        let mut names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(total >= 60, "expected a full catalog, got {total}");
    }

    #[test]
    fn seeded_seq_skips_past_existing_ids() {
        let ids = vec!["TCK-2".to_string(), "TCK-10".to_string(), "other".to_string()];
        assert_eq!(seeded_seq(ids.iter(), "TCK-"), 11);
        let empty: Vec<String> = Vec::new();
        assert_eq!(seeded_seq(empty.iter(), "TCK-"), 1);
    }
}
