// twin-fabric-connectors/src/routes.rs
// ============================================================================
// Module: Connector Route Table
// Description: Tool name → (service, operation, operation class).
// Purpose: Decide which tools the connector runtime manages and how risky
//          each operation is.
// Dependencies: twin-fabric-twins
// ============================================================================

//! ## Overview
//! Routing is derived from the tool name: the prefix selects the service and
//! the suffix the operation, with the risk class looked up in a fixed table.
//! Browser tools are deliberately unrouted: the browser is router-direct,
//! not connector-managed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use twin_fabric_twins::ServiceName;

use crate::models::OperationClass;

// ============================================================================
// SECTION: Route
// ============================================================================

/// One resolved connector route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoute {
    /// Target service.
    pub service: ServiceName,
    /// Operation within the service.
    pub operation: String,
    /// Risk class.
    pub operation_class: OperationClass,
}

/// Resolves a tool name into a connector route, or `None` when the tool is
/// not connector-managed.
#[must_use]
pub fn route_for(tool: &str) -> Option<ToolRoute> {
    let (service_raw, operation) = tool.split_once('.')?;
    let service = ServiceName::parse(service_raw)?;
    if service == ServiceName::Browser {
        return None;
    }
    let operation_class = operation_class_for(service, operation)?;
    Some(ToolRoute {
        service,
        operation: operation.to_string(),
        operation_class,
    })
}

/// Fixed risk-class table per service operation.
fn operation_class_for(service: ServiceName, operation: &str) -> Option<OperationClass> {
    use OperationClass::{Read, WriteRisky, WriteSafe};
    let class = match (service, operation) {
        (ServiceName::Slack, "list_channels" | "open_channel" | "fetch_thread") => Read,
        (ServiceName::Slack, "send_message" | "react") => WriteSafe,

        (ServiceName::Mail, "list" | "open") => Read,
        (ServiceName::Mail, "compose" | "reply") => WriteSafe,

        (ServiceName::Docs, "list" | "read" | "search") => Read,
        (ServiceName::Docs, "create" | "update") => WriteSafe,

        (ServiceName::Calendar, "list_events") => Read,
        (ServiceName::Calendar, "create_event" | "update_event" | "accept" | "decline") => {
            WriteSafe
        }
        (ServiceName::Calendar, "cancel_event") => WriteRisky,

        (ServiceName::Tickets, "list" | "get") => Read,
        (ServiceName::Tickets, "create" | "update" | "add_comment") => WriteSafe,
        (ServiceName::Tickets, "transition") => WriteRisky,

        (ServiceName::Db, "list_tables" | "describe_table" | "query") => Read,
        (ServiceName::Db, "upsert") => WriteSafe,

        (ServiceName::Erp, "get_po" | "list_pos" | "get_invoice" | "list_invoices") => Read,
        (
            ServiceName::Erp,
            "create_po" | "receive_goods" | "submit_invoice" | "match_three_way",
        ) => WriteSafe,
        (ServiceName::Erp, "post_payment") => WriteRisky,

        (
            ServiceName::Crm,
            "get_contact" | "list_contacts" | "get_company" | "list_companies" | "get_deal"
            | "list_deals",
        ) => Read,
        (
            ServiceName::Crm,
            "create_contact" | "create_company" | "associate_contact_company" | "create_deal"
            | "update_deal_stage" | "log_activity",
        ) => WriteSafe,

        (ServiceName::Okta, "list_users" | "get_user" | "list_groups" | "list_applications") => {
            Read
        }
        (
            ServiceName::Okta,
            "activate_user" | "suspend_user" | "unsuspend_user" | "reset_password"
            | "assign_group" | "unassign_group" | "assign_application" | "unassign_application",
        ) => WriteSafe,
        (ServiceName::Okta, "deactivate_user") => WriteRisky,

        (
            ServiceName::Servicedesk,
            "list_incidents" | "get_incident" | "list_requests" | "get_request",
        ) => Read,
        (ServiceName::Servicedesk, "update_incident" | "update_request") => WriteSafe,

        _ => return None,
    };
    Some(class)
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
    fn every_twin_tool_except_browser_is_routed() {
        for spec in twin_fabric_twins::TwinSet::tool_specs() {
            let route = route_for(&spec.name);
            if spec.name.starts_with("browser.") {
                assert!(route.is_none(), "browser tools are router-direct");
            } else {
                assert!(route.is_some(), "unrouted tool: {}", spec.name);
            }
        }
    }

    #[test]
    fn risky_operations_match_the_contract() {
        for tool in [
            "calendar.cancel_event",
            "tickets.transition",
            "erp.post_payment",
            "okta.deactivate_user",
        ] {
            assert_eq!(
                route_for(tool).unwrap().operation_class,
                OperationClass::WriteRisky,
                "{tool}"
            );
        }
        assert_eq!(
            route_for("mail.compose").unwrap().operation_class,
            OperationClass::WriteSafe
        );
        assert_eq!(
            route_for("db.query").unwrap().operation_class,
            OperationClass::Read
        );
    }

    #[test]
    fn unknown_names_are_unrouted() {
        assert!(route_for("mail.explode").is_none());
        assert!(route_for("nosuchservice.op").is_none());
        assert!(route_for("plainname").is_none());
    }
}
