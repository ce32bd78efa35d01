// twin-fabric-world/src/catalog.rs
// ============================================================================
// Module: Scenario Catalog
// Description: Built-in named scenarios.
// Purpose: Give sessions, workflows, and tests a stable set of worlds.
// Dependencies: serde_json, crate::scenario
// ============================================================================

//! ## Overview
//! The catalog holds the worlds shipped with the fabric. `baseline` carries
//! the defaults every other world builds on: the procurement Slack channel,
//! the MacroCompute vendor with a quote-capable reply rule, a small browser
//! catalog, seeded database tables, and the default identity and service
//! desk population. `multi_channel` is the canonical rich world used by most
//! tests and workflows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde_json::json;

use twin_fabric_core::FabricError;
use twin_fabric_core::JsonMap;

use crate::scenario::AffordanceSeed;
use crate::scenario::BrowserNodeSeed;
use crate::scenario::CalendarEventSeed;
use crate::scenario::DocumentSeed;
use crate::scenario::IdentityApplicationSeed;
use crate::scenario::IdentityGroupSeed;
use crate::scenario::IdentityUserSeed;
use crate::scenario::IncidentSeed;
use crate::scenario::MailReplySeed;
use crate::scenario::RequestSeed;
use crate::scenario::Scenario;
use crate::scenario::SlackSeed;
use crate::scenario::TicketSeed;
use crate::scenario::VendorSeed;

// ============================================================================
// SECTION: Catalog Surface
// ============================================================================

/// Names of the built-in scenarios, sorted.
#[must_use]
pub fn catalog_names() -> Vec<&'static str> {
    vec!["baseline", "identity_review", "multi_channel", "procurement"]
}

/// Looks up a built-in scenario by name.
///
/// # Errors
///
/// Returns `world.unknown_catalog` for names outside the catalog.
pub fn get_catalog_scenario(name: &str) -> Result<Scenario, FabricError> {
    match name.trim().to_lowercase().as_str() {
        "baseline" => Ok(baseline()),
        "multi_channel" => Ok(multi_channel()),
        "procurement" => Ok(procurement()),
        "identity_review" => Ok(identity_review()),
        other => Err(FabricError::new(
            "world.unknown_catalog",
            format!("no such catalog scenario: {other}"),
        )),
    }
}

// ============================================================================
// SECTION: Baseline World
// ============================================================================

/// The defaults every session starts from when no scenario is supplied.
#[must_use]
pub fn baseline() -> Scenario {
    let mut scenario = Scenario {
        slack_channels: vec!["#procurement".to_string()],
        ..Scenario::default()
    };

    scenario.vendors.push(VendorSeed {
        name: "MacroCompute".to_string(),
        contact: Some("sales@macrocompute.example".to_string()),
        price: [2_999, 3_399],
        eta_days: [5, 7],
    });
    scenario.vendor_reply_variants.insert(
        "sales@macrocompute.example".to_string(),
        vec![MailReplySeed {
            subj: None,
            body_text: "Thanks for reaching out. The MacroBook Pro 16 is $3,199 \
                        per unit. ETA 5-7 business days after PO."
                .to_string(),
            dt_ms: None,
        }],
    );

    scenario.browser_nodes = browser_catalog_nodes();
    scenario.browser_start = Some("home".to_string());
    scenario.database_tables = default_database_tables();

    scenario.identity_users.insert(
        "USR-9001".to_string(),
        IdentityUserSeed {
            user_id: "USR-9001".to_string(),
            email: "jane@macrocompute.example".to_string(),
            login: Some("jane".to_string()),
            first_name: Some("Jane".to_string()),
            last_name: Some("Castillo".to_string()),
            title: Some("Security Lead".to_string()),
            department: Some("Security".to_string()),
            status: Some("ACTIVE".to_string()),
            groups: vec!["GRP-security".to_string()],
            applications: vec!["APP-sso".to_string()],
        },
    );
    scenario.identity_users.insert(
        "USR-9002".to_string(),
        IdentityUserSeed {
            user_id: "USR-9002".to_string(),
            email: "mike@macrocompute.example".to_string(),
            login: Some("mike".to_string()),
            first_name: Some("Mike".to_string()),
            last_name: Some("Dorsey".to_string()),
            title: Some("IT Analyst".to_string()),
            department: Some("IT".to_string()),
            status: Some("SUSPENDED".to_string()),
            groups: vec!["GRP-it".to_string()],
            applications: vec!["APP-sso".to_string()],
        },
    );
    scenario.identity_groups.insert(
        "GRP-security".to_string(),
        IdentityGroupSeed {
            group_id: "GRP-security".to_string(),
            name: "Security Admins".to_string(),
            description: Some("Manage identity profiles and MFA".to_string()),
            members: vec!["USR-9001".to_string()],
        },
    );
    scenario.identity_groups.insert(
        "GRP-it".to_string(),
        IdentityGroupSeed {
            group_id: "GRP-it".to_string(),
            name: "IT Support".to_string(),
            description: None,
            members: vec!["USR-9002".to_string()],
        },
    );
    scenario.identity_applications.insert(
        "APP-sso".to_string(),
        IdentityApplicationSeed {
            app_id: "APP-sso".to_string(),
            label: "Macro SSO".to_string(),
            description: Some("Corporate identity provider".to_string()),
            assignments: vec!["USR-9001".to_string(), "USR-9002".to_string()],
        },
    );

    scenario.service_incidents.insert(
        "INC-5001".to_string(),
        IncidentSeed {
            incident_id: "INC-5001".to_string(),
            title: "VPN intermittent drops for remote staff".to_string(),
            status: Some("OPEN".to_string()),
            priority: Some("P2".to_string()),
            assignee: Some("netops".to_string()),
            description: Some("Multiple reports of VPN session resets since 09:00.".to_string()),
        },
    );
    scenario.service_requests.insert(
        "REQ-8801".to_string(),
        RequestSeed {
            request_id: "REQ-8801".to_string(),
            summary: "Temporary admin access for laptop rollout".to_string(),
            requester: "sam@macrocompute.example".to_string(),
            status: Some("PENDING_APPROVAL".to_string()),
            approval_stage: Some("security".to_string()),
            approval_status: Some("PENDING".to_string()),
        },
    );

    scenario
}

// ============================================================================
// SECTION: Catalog Worlds
// ============================================================================

/// The canonical rich world: procurement plus identity, docs, tickets, and a
/// scheduled kickoff message.
#[must_use]
pub fn multi_channel() -> Scenario {
    let mut scenario = baseline();
    scenario.budget_cap_usd = Some(3_200);
    scenario.slack_initial_message = Some(SlackSeed {
        channel: "#procurement".to_string(),
        user: "ceo".to_string(),
        text: "We need a MacroBook Pro 16 for the new analyst. Budget $3200. \
               Confirm with finance before EOD."
            .to_string(),
        dt_ms: 0,
    });

    scenario.identity_users.insert(
        "USR-2001".to_string(),
        IdentityUserSeed {
            user_id: "USR-2001".to_string(),
            email: "sam@macrocompute.example".to_string(),
            login: Some("sam".to_string()),
            first_name: Some("Sam".to_string()),
            last_name: Some("Iyer".to_string()),
            title: Some("Procurement Analyst".to_string()),
            department: Some("Procurement".to_string()),
            status: Some("ACTIVE".to_string()),
            groups: vec![],
            applications: vec!["APP-sso".to_string()],
        },
    );
    scenario.identity_users.insert(
        "USR-3001".to_string(),
        IdentityUserSeed {
            user_id: "USR-3001".to_string(),
            email: "former@macrocompute.example".to_string(),
            login: Some("former".to_string()),
            first_name: Some("Lee".to_string()),
            last_name: Some("Okafor".to_string()),
            title: None,
            department: None,
            status: Some("DEPROVISIONED".to_string()),
            groups: vec![],
            applications: vec![],
        },
    );
    scenario.identity_groups.insert(
        "GRP-procurement".to_string(),
        IdentityGroupSeed {
            group_id: "GRP-procurement".to_string(),
            name: "Procurement Ops".to_string(),
            description: Some("Purchase order approvers".to_string()),
            members: vec![],
        },
    );

    scenario.documents.insert(
        "DOC-1".to_string(),
        DocumentSeed {
            title: "Hardware Procurement Policy".to_string(),
            body: "Purchases above $1,000 require finance approval in Slack with \
                   the quoted amount and a citation of the vendor offer."
                .to_string(),
            tags: vec!["policy".to_string(), "procurement".to_string()],
            owner: Some("ops@macrocompute.example".to_string()),
            status: Some("ACTIVE".to_string()),
        },
    );
    scenario.tickets.insert(
        "TCK-1".to_string(),
        TicketSeed {
            title: "Laptop provisioning for new analyst".to_string(),
            description: Some("Order hardware, log quote, route finance approval.".to_string()),
            assignee: Some("ops.agent".to_string()),
            status: Some("open".to_string()),
            priority: Some("P2".to_string()),
            severity: Some("medium".to_string()),
            labels: vec!["onboarding".to_string()],
        },
    );
    scenario.calendar_events.push(CalendarEventSeed {
        event_id: Some("EVT-1".to_string()),
        title: "Procurement sync".to_string(),
        start_ms: 3_600_000,
        end_ms: 5_400_000,
        attendees: vec![
            "sam@macrocompute.example".to_string(),
            "finance@macrocompute.example".to_string(),
        ],
        location: Some("Virtual".to_string()),
        description: Some("Weekly procurement status".to_string()),
        organizer: Some("ops@macrocompute.example".to_string()),
    });

    scenario.metadata = metadata_map(&[
        ("scenario_type", json!("core")),
        ("difficulty", json!("standard")),
        ("expected_steps", json!([8, 20])),
        ("tags", json!(["procurement", "multi_channel"])),
    ]);
    scenario
}

/// Procurement-heavy world with competing vendors and a derail email.
#[must_use]
pub fn procurement() -> Scenario {
    let mut scenario = multi_channel();
    scenario.vendors.push(VendorSeed {
        name: "Dell Business".to_string(),
        contact: Some("quotes@dellbusiness.example".to_string()),
        price: [2_599, 2_999],
        eta_days: [4, 6],
    });
    scenario.vendor_reply_variants.insert(
        "quotes@dellbusiness.example".to_string(),
        vec![MailReplySeed {
            subj: None,
            body_text: "Quote attached: $2,799 per unit, volume discounts at 10+. \
                        ETA 4-6 business days."
                .to_string(),
            dt_ms: Some(9_000),
        }],
    );
    scenario.derail_events.push(crate::scenario::DerailEventSeed {
        dt_ms: 5_000,
        target: "mail".to_string(),
        payload: json!({
            "from": "promotions@dealblast.example",
            "subj": "Limited offer on refurbished laptops",
            "body_text": "Act now! Unbeatable refurb pricing, no warranty.",
        }),
    });
    scenario.metadata = metadata_map(&[
        ("scenario_type", json!("core")),
        ("difficulty", json!("hard")),
        ("expected_steps", json!([10, 24])),
        ("tags", json!(["procurement", "vendor_comparison"])),
    ]);
    scenario
}

/// Identity/service-desk review world.
#[must_use]
pub fn identity_review() -> Scenario {
    let mut scenario = baseline();
    scenario.service_requests.insert(
        "REQ-8802".to_string(),
        RequestSeed {
            request_id: "REQ-8802".to_string(),
            summary: "Contractor SSO access extension".to_string(),
            requester: "vendor.pm@partner.example".to_string(),
            status: Some("PENDING_APPROVAL".to_string()),
            approval_stage: Some("it".to_string()),
            approval_status: Some("PENDING".to_string()),
        },
    );
    scenario.metadata = metadata_map(&[
        ("scenario_type", json!("identity")),
        ("difficulty", json!("standard")),
        ("expected_steps", json!([5, 12])),
        ("tags", json!(["identity", "servicedesk"])),
    ]);
    scenario
}

// ============================================================================
// SECTION: Shared Fixtures
// ============================================================================

/// Browser catalog: a home page linking to one vendor offer page.
fn browser_catalog_nodes() -> BTreeMap<String, BrowserNodeSeed> {
    let mut nodes = BTreeMap::new();
    let mut home_next = BTreeMap::new();
    home_next.insert("CLICK:open_vendor_1#0".to_string(), "vendor_1".to_string());
    nodes.insert(
        "home".to_string(),
        BrowserNodeSeed {
            url: "https://vweb.local/home".to_string(),
            title: "Enterprise Procurement Catalog".to_string(),
            excerpt: "Choose a vendor and review offer details before requesting \
                      quotes."
                .to_string(),
            affordances: vec![AffordanceSeed {
                tool: "browser.click".to_string(),
                args: json!({"node_id": "CLICK:open_vendor_1#0"}),
            }],
            next: home_next,
        },
    );
    let mut vendor_next = BTreeMap::new();
    vendor_next.insert("BACK".to_string(), "home".to_string());
    nodes.insert(
        "vendor_1".to_string(),
        BrowserNodeSeed {
            url: "https://vweb.local/vendor/macrocompute".to_string(),
            title: "MacroCompute MacroBook Pro 16".to_string(),
            excerpt: "MacroBook Pro 16, $3,199 list. ETA 5-7 business days. \
                      Contact sales@macrocompute.example for quotes."
                .to_string(),
            affordances: vec![AffordanceSeed {
                tool: "browser.back".to_string(),
                args: json!({}),
            }],
            next: vendor_next,
        },
    );
    nodes
}

/// Seeded database tables shared by the baseline world.
fn default_database_tables() -> BTreeMap<String, Vec<JsonMap>> {
    let mut tables = BTreeMap::new();
    tables.insert(
        "procurement_orders".to_string(),
        vec![
            row(&[
                ("id", json!("PO-1001")),
                ("vendor", json!("MacroCompute")),
                ("amount_usd", json!(3_199)),
                ("status", json!("PENDING_APPROVAL")),
                ("cost_center", json!("IT-OPS")),
            ]),
            row(&[
                ("id", json!("PO-1002")),
                ("vendor", json!("Dell Business")),
                ("amount_usd", json!(2_799)),
                ("status", json!("APPROVED")),
                ("cost_center", json!("ENG-PLATFORM")),
            ]),
        ],
    );
    tables.insert(
        "crm_pipeline".to_string(),
        vec![row(&[
            ("id", json!("OPP-901")),
            ("account", json!("MacroCompute")),
            ("stage", json!("qualification")),
            ("amount_usd", json!(12_000)),
            ("owner", json!("sam@macrocompute.example")),
        ])],
    );
    tables.insert(
        "approval_audit".to_string(),
        vec![row(&[
            ("id", json!("APR-1")),
            ("entity_type", json!("purchase_order")),
            ("entity_id", json!("PO-1001")),
            ("status", json!("PENDING")),
            ("approver", json!("finance@macrocompute.example")),
        ])],
    );
    tables
}

/// Builds a row object from key/value pairs.
fn row(pairs: &[(&str, serde_json::Value)]) -> JsonMap {
    let mut map = JsonMap::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
}

/// Builds a metadata map from key/value pairs.
fn metadata_map(pairs: &[(&str, serde_json::Value)]) -> JsonMap {
    let mut map = JsonMap::new();
    for (key, value) in pairs {
        map.insert((*key).to_string(), value.clone());
    }
    map
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
    fn catalog_lookup_covers_every_name() {
        for name in catalog_names() {
            assert!(get_catalog_scenario(name).is_ok(), "missing: {name}");
        }
        let err = get_catalog_scenario("nope").unwrap_err();
        assert_eq!(err.code, "world.unknown_catalog");
    }

    #[test]
    fn multi_channel_extends_the_baseline_population() {
        let world = multi_channel();
        assert!(world.identity_users.contains_key("USR-2001"));
        assert!(world.identity_users.contains_key("USR-9001"));
        assert!(world.identity_groups.contains_key("GRP-procurement"));
        assert!(world.service_requests.contains_key("REQ-8801"));
        assert!(world.documents.contains_key("DOC-1"));
        assert_eq!(world.budget_cap_usd, Some(3_200));
    }

    #[test]
    fn baseline_browser_graph_is_connected() {
        let world = baseline();
        let home = &world.browser_nodes["home"];
        for destination in home.next.values() {
            assert!(world.browser_nodes.contains_key(destination));
        }
    }
}
