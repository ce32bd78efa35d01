// twin-fabric-corpus/src/generator.rs
// ============================================================================
// Module: Corpus Generator
// Description: Seeded synthesis of environments and workflow specs.
// Purpose: Produce reproducible scenario collections across seven families.
// Dependencies: serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! The root RNG draws one sub-seed per environment and one per workflow, so
//! each artifact has an independent deterministic stream. Environments
//! compose an enterprise profile with a world template (vendors, browser
//! graph, seeded tables, a derail email); workflows pick a family by index
//! and emit a fully specified spec against that template.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use serde_json::json;

use twin_fabric_core::DeterministicRng;
use twin_fabric_core::JsonMap;

use crate::models::CorpusBundle;
use crate::models::EnterpriseProfile;
use crate::models::GeneratedEnvironment;
use crate::models::GeneratedWorkflowSpec;

/// Org name stems cycled per environment.
const ORG_STEMS: &[&str] = &[
    "MacroCompute",
    "Northwind",
    "Acme Dynamics",
    "Blue Harbor",
    "SummitWorks",
    "Atlas Forge",
    "QuantaBridge",
];

/// Org name suffixes.
const ORG_SUFFIXES: &[&str] = &["Inc", "Group", "Systems", "Holdings"];

/// Department pool sampled per environment.
const DEPARTMENTS: &[&str] = &[
    "Finance",
    "Procurement",
    "Security",
    "Operations",
    "PeopleOps",
    "Legal",
];

/// Vendor name pool sampled per environment.
const VENDOR_NAMES: &[&str] = &[
    "MacroCompute",
    "Dell Business",
    "HP Enterprise",
    "Lenovo Pro",
    "Acer Commercial",
];

/// Workflow families cycled per scenario index.
const WORKFLOW_FAMILIES: &[&str] = &[
    "procurement_quote",
    "db_audit",
    "sales_pipeline",
    "calendar_review",
    "risk_escalation",
    "identity_access_review",
    "procure_to_pay",
];

/// Tag pool appended per workflow.
const EXTRA_TAGS: &[&str] = &["procurement", "finance", "ops"];

// ============================================================================
// SECTION: Options
// ============================================================================

/// Host options affecting generated tool names.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// CRM alias packs active in the target sessions.
    pub crm_alias_packs: Vec<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            crm_alias_packs: vec!["hubspot".to_string(), "salesforce".to_string()],
        }
    }
}

impl GeneratorOptions {
    /// CRM deal-creation tool name under the active packs.
    fn crm_deal_create_tool(&self) -> &'static str {
        if self.has_pack("salesforce") {
            "salesforce.opportunity.create"
        } else if self.has_pack("hubspot") {
            "hubspot.deals.create"
        } else {
            "crm.create_deal"
        }
    }

    /// CRM activity-log tool name under the active packs.
    fn crm_activity_tool(&self) -> &'static str {
        if self.has_pack("salesforce") {
            "salesforce.activity.log"
        } else if self.has_pack("hubspot") {
            "hubspot.activities.log"
        } else {
            "crm.log_activity"
        }
    }

    fn has_pack(&self, pack: &str) -> bool {
        self.crm_alias_packs
            .iter()
            .any(|name| name.trim().to_lowercase() == pack)
    }
}

// ============================================================================
// SECTION: Generation
// ============================================================================

/// Generates a corpus; a pure function of its arguments.
#[must_use]
pub fn generate_corpus(
    seed: u64,
    environment_count: usize,
    scenarios_per_environment: usize,
    options: &GeneratorOptions,
) -> CorpusBundle {
    let mut rng = DeterministicRng::from_seed(seed);
    let mut environments = Vec::new();
    let mut workflows = Vec::new();

    for env_idx in 0..environment_count.max(1) {
        let env_seed = rng.sub_seed();
        let environment = generate_environment(env_seed, env_idx);
        for scenario_idx in 0..scenarios_per_environment.max(1) {
            let workflow_seed = rng.sub_seed();
            workflows.push(generate_workflow_spec(
                &environment,
                workflow_seed,
                scenario_idx,
                options,
            ));
        }
        environments.push(environment);
    }

    let mut metadata = JsonMap::new();
    metadata.insert("environment_count".to_string(), json!(environments.len()));
    metadata.insert("workflow_count".to_string(), json!(workflows.len()));
    CorpusBundle {
        seed,
        environments,
        workflows,
        metadata,
    }
}

/// Builds one environment from its sub-seed.
fn generate_environment(seed: u64, index: usize) -> GeneratedEnvironment {
    let mut rng = DeterministicRng::from_seed(seed);
    let org_stem = ORG_STEMS[index % ORG_STEMS.len()];
    let suffix = rng.pick(ORG_SUFFIXES).copied().unwrap_or("Inc");
    let org_name = format!("{org_stem} {suffix}");
    let domain_token: String = org_stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let primary_domain = format!("{domain_token}.example");
    let budget_cap = rng.range_i64(1_800, 5_500);
    let vendors = sample_vendors(&mut rng);
    let departments = sample_departments(&mut rng);
    let derail_prob = f64::from(rng.range_u64(0, 100) as u32) / 1_000.0;

    let po_id = format!("PO-{:04}", index + 1);
    let approval_id = format!("APR-{:04}", index + 1);
    let first_vendor_name = vendors[0]["name"].as_str().unwrap_or("MacroCompute");
    let first_vendor_price = vendors[0]["price"][1].as_i64().unwrap_or(3_000);

    let world_template = json!({
        "budget_cap_usd": budget_cap,
        "derail_prob": derail_prob,
        "slack_initial_message": format!(
            "Procurement run for {org_name}. Include budget and citation in approvals."
        ),
        "vendors": vendors,
        "browser_nodes": browser_nodes(&vendors),
        "database_tables": {
            "procurement_orders": [{
                "id": po_id,
                "vendor": first_vendor_name,
                "amount_usd": first_vendor_price,
                "status": "PENDING_APPROVAL",
                "cost_center": "IT-OPS",
            }],
            "approval_audit": [{
                "id": approval_id,
                "entity_type": "purchase_order",
                "entity_id": po_id,
                "status": "PENDING",
                "approver": format!("finance@{primary_domain}"),
            }],
        },
        "derail_events": [{
            "dt_ms": 5_000,
            "target": "mail",
            "payload": {
                "from": format!("sales@{primary_domain}"),
                "subj": "Requested Quote",
                "body_text": format!(
                    "{org_name} pricing package attached. Please confirm ETA and approver."
                ),
            },
        }],
    });

    GeneratedEnvironment {
        env_id: format!("ENV-{:04}", index + 1),
        seed,
        profile: EnterpriseProfile {
            org_id: format!("ORG-{:04}", index + 1),
            org_name,
            primary_domain,
            departments,
            budget_cap_usd: budget_cap,
        },
        world_template,
    }
}

/// Builds one workflow spec from its sub-seed.
fn generate_workflow_spec(
    environment: &GeneratedEnvironment,
    seed: u64,
    index: usize,
    options: &GeneratorOptions,
) -> GeneratedWorkflowSpec {
    let mut rng = DeterministicRng::from_seed(seed);
    let profile = &environment.profile;
    let approver = format!("approver{}@{}", index + 1, profile.primary_domain);
    let quote_to = format!("vendor{}@{}", index + 1, profile.primary_domain);
    let scenario_id = format!(
        "{}-SCN-{:04}",
        environment.env_id,
        index + 1
    );
    let family = WORKFLOW_FAMILIES[index % WORKFLOW_FAMILIES.len()];
    let budget = (profile.budget_cap_usd - rng.range_i64(50, 300)).max(500);
    let extra_tag = rng.pick(EXTRA_TAGS).copied().unwrap_or("procurement");

    let spec = json!({
        "name": scenario_id,
        "objective": {
            "statement": objective_for_family(family),
            "success": success_for_family(family),
        },
        "world": environment.world_template,
        "actors": [
            {
                "actor_id": "agent",
                "role": "procurement_operator",
                "email": format!("agent@{}", profile.primary_domain),
            },
            {
                "actor_id": "approver",
                "role": "finance_manager",
                "email": approver,
            },
        ],
        "constraints": [
            {
                "name": "budget_cap",
                "description": format!(
                    "Approval amount must be <= {}",
                    profile.budget_cap_usd
                ),
                "required": true,
            },
            {
                "name": "citation_required",
                "description": "At least one browser/doc read action before approval",
                "required": true,
            },
        ],
        "approvals": [{
            "stage": "finance",
            "approver": approver,
            "required": true,
            "evidence": "slack thread + ticket or db audit row",
        }],
        "steps": steps_for_family(
            family,
            &scenario_id,
            &profile.org_name,
            &quote_to,
            &approver,
            budget,
            options,
        ),
        "success_assertions": [
            {"kind": "pending_max", "field": "total", "max_value": 20},
        ],
        "failure_paths": failure_paths_for_family(family),
        "tags": ["generated", "enterprise", family, extra_tag],
        "metadata": {
            "environment_id": environment.env_id,
            "scenario_seed": seed,
            "workflow_family": family,
            "crm_deal_create_tool": options.crm_deal_create_tool(),
            "crm_activity_tool": options.crm_activity_tool(),
        },
    });

    GeneratedWorkflowSpec {
        scenario_id,
        env_id: environment.env_id.clone(),
        seed,
        spec,
    }
}

// ============================================================================
// SECTION: Environment Parts
// ============================================================================

/// Samples 3–5 departments, sorted for stable output.
fn sample_departments(rng: &mut DeterministicRng) -> Vec<String> {
    let count = rng.range_u64(3, 5) as usize;
    let mut sampled: Vec<String> = rng
        .sample(DEPARTMENTS, count)
        .into_iter()
        .map(|d| (*d).to_string())
        .collect();
    sampled.sort();
    sampled
}

/// Samples three vendors with price and ETA bands.
fn sample_vendors(rng: &mut DeterministicRng) -> Vec<Value> {
    let names: Vec<String> = rng
        .sample(VENDOR_NAMES, 3)
        .into_iter()
        .map(|n| (*n).to_string())
        .collect();
    names
        .into_iter()
        .map(|name| {
            let base_price = rng.range_i64(1_200, 4_200);
            let eta = rng.range_i64(3, 10);
            json!({
                "name": name,
                "price": [base_price - 200, base_price + 200],
                "eta_days": [(eta - 1).max(1), eta + 1],
            })
        })
        .collect()
}

/// Builds the home-plus-vendor browser graph for a template.
fn browser_nodes(vendors: &[Value]) -> Value {
    let mut affordances = Vec::new();
    let mut next = JsonMap::new();
    let mut nodes = JsonMap::new();
    for (idx, vendor) in vendors.iter().enumerate() {
        let slug = format!("vendor_{}", idx + 1);
        let node_id = format!("CLICK:open_{slug}#0");
        affordances.push(json!({"tool": "browser.click", "args": {"node_id": node_id}}));
        next.insert(node_id, json!(slug.clone()));
        nodes.insert(
            slug,
            json!({
                "url": format!("https://vweb.local/vendor/{}", idx + 1),
                "title": vendor["name"],
                "excerpt": format!(
                    "Price range {}-{} USD, ETA {}-{} days.",
                    vendor["price"][0], vendor["price"][1],
                    vendor["eta_days"][0], vendor["eta_days"][1],
                ),
                "affordances": [{"tool": "browser.back", "args": {}}],
                "next": {"BACK": "home"},
            }),
        );
    }
    nodes.insert(
        "home".to_string(),
        json!({
            "url": "https://vweb.local/home",
            "title": "Enterprise Procurement Catalog",
            "excerpt": "Choose a vendor and review offer details.",
            "affordances": affordances,
            "next": next,
        }),
    );
    Value::Object(nodes)
}

// ============================================================================
// SECTION: Family Content
// ============================================================================

fn objective_for_family(family: &str) -> &'static str {
    match family {
        "db_audit" => "Validate procurement records in DB and route finance approval artifacts.",
        "sales_pipeline" => "Open a sales pipeline artifact tied to procurement execution evidence.",
        "calendar_review" => "Schedule review operations and sync approvals across calendar/mail/db.",
        "risk_escalation" => "Escalate procurement risk with CRM logging and cross-channel notifications.",
        "identity_access_review" => {
            "Process an enterprise access request through identity and service-desk controls."
        }
        "procure_to_pay" => "Execute procure-to-pay lifecycle with ERP and approval audit updates.",
        _ => "Collect vendor evidence, email quote request, and route approval execution.",
    }
}

fn success_for_family(family: &str) -> Value {
    match family {
        "db_audit" => json!([
            "Approval audit table inspected",
            "Finance escalation email sent",
            "Approval audit row upserted",
        ]),
        "sales_pipeline" => json!([
            "CRM pipeline opportunity created",
            "Quote summary captured in docs",
            "Approval context announced in Slack",
        ]),
        "calendar_review" => json!([
            "Review meeting scheduled",
            "Procurement order status updated",
            "Action ticket opened",
        ]),
        "risk_escalation" => json!([
            "Risk signal captured in CRM activity",
            "Escalation email sent",
            "Escalation posted in Slack",
        ]),
        "identity_access_review" => json!([
            "Pending request reviewed in ServiceDesk",
            "Identity group assignment updated",
            "Approval status posted in Slack",
        ]),
        "procure_to_pay" => json!([
            "Purchase order created in ERP",
            "Invoice matched and payment posted",
            "Audit log row persisted in database",
        ]),
        _ => json!([
            "Vendor quote requested via mail",
            "Approval request posted in Slack with budget",
            "Execution ticket created",
        ]),
    }
}

#[allow(clippy::too_many_lines, reason = "One declarative block per workflow family.")]
fn steps_for_family(
    family: &str,
    scenario_id: &str,
    org_name: &str,
    quote_to: &str,
    approver: &str,
    budget: i64,
    options: &GeneratorOptions,
) -> Value {
    let deal_tool = options.crm_deal_create_tool();
    let activity_tool = options.crm_activity_tool();
    match family {
        "db_audit" => json!([
            {
                "step_id": "query_audit",
                "description": "Read approval audit rows from the DB.",
                "tool": "db.query",
                "args": {"table": "approval_audit", "limit": 10},
                "expect": [
                    {"kind": "result_contains", "field": "table", "contains": "approval_audit"},
                ],
            },
            {
                "step_id": "escalate_finance",
                "description": "Email finance for approval confirmation.",
                "tool": "mail.compose",
                "args": {
                    "to": approver,
                    "subj": format!("{scenario_id} approval confirmation"),
                    "body_text": format!(
                        "Please confirm approval for {scenario_id} budget ${budget}."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "m"}],
            },
            {
                "step_id": "post_approval",
                "description": "Post approval request in procurement Slack channel.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Approval needed for {scenario_id}. Budget ${budget}. DB audit row checked."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
            {
                "step_id": "write_audit",
                "description": "Write approval workflow state into audit DB.",
                "tool": "db.upsert",
                "args": {
                    "table": "approval_audit",
                    "row": {
                        "id": format!("APR-{scenario_id}"),
                        "entity_type": "purchase_order",
                        "status": "REQUESTED",
                        "approver": approver,
                    },
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "APR-"}],
            },
            {
                "step_id": "create_ticket",
                "description": "Open ticket for approval follow-up.",
                "tool": "tickets.create",
                "args": {
                    "title": format!("{scenario_id} approval follow-up"),
                    "description": "Track finance approval progress and audit linkage.",
                    "assignee": "agent",
                },
                "expect": [{"kind": "result_contains", "field": "ticket_id", "contains": "TCK-"}],
            },
        ]),
        "sales_pipeline" => json!([
            {
                "step_id": "create_opportunity",
                "description": "Create pipeline opportunity for this procurement plan.",
                "tool": deal_tool,
                "args": {
                    "name": format!("{org_name} {scenario_id} renewal"),
                    "amount": budget,
                    "stage": "Qualification",
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "D-"}],
            },
            {
                "step_id": "capture_quote_doc",
                "description": "Write quote summary into docs for reviewer context.",
                "tool": "docs.create",
                "args": {
                    "title": format!("{scenario_id} quote summary"),
                    "body": format!(
                        "Scenario {scenario_id}: budget ${budget}, approver {approver}."
                    ),
                    "tags": ["quote", "approval", "generated"],
                },
                "expect": [{"kind": "result_contains", "field": "doc_id", "contains": "DOC-"}],
            },
            {
                "step_id": "request_vendor_quote",
                "description": "Send quote request to vendor contact.",
                "tool": "mail.compose",
                "args": {
                    "to": quote_to,
                    "subj": format!("{org_name} quote request ({scenario_id})"),
                    "body_text": "Please confirm total amount, ETA, and contract validity window.",
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "m"}],
            },
            {
                "step_id": "post_approval",
                "description": "Post finance approval context in Slack.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Approval request {scenario_id}: budget ${budget}, CRM opportunity \
                         opened, docs summary captured."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
            {
                "step_id": "log_activity",
                "description": "Log final approval context in CRM activity stream.",
                "tool": activity_tool,
                "args": {
                    "kind": "note",
                    "note": format!(
                        "Scenario {scenario_id} submitted for finance approval at budget ${budget}."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ok", "contains": "true"}],
            },
        ]),
        "calendar_review" => json!([
            {
                "step_id": "schedule_review",
                "description": "Schedule a finance review call.",
                "tool": "calendar.create_event",
                "args": {
                    "title": format!("{scenario_id} finance approval review"),
                    "start_ms": 3_600_000,
                    "end_ms": 4_200_000,
                    "attendees": [approver],
                    "location": "Virtual",
                },
                "expect": [{"kind": "result_contains", "field": "event_id", "contains": "EVT-"}],
            },
            {
                "step_id": "mail_review_context",
                "description": "Email review context and expected decision.",
                "tool": "mail.compose",
                "args": {
                    "to": approver,
                    "subj": format!("{scenario_id} review agenda"),
                    "body_text": format!(
                        "Agenda: approve procurement plan {scenario_id} for ${budget}."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "m"}],
            },
            {
                "step_id": "mark_order",
                "description": "Update procurement order state in DB.",
                "tool": "db.upsert",
                "args": {
                    "table": "procurement_orders",
                    "row": {
                        "id": format!("ORD-{scenario_id}"),
                        "vendor": org_name,
                        "amount_usd": budget,
                        "status": "REVIEW_SCHEDULED",
                        "cost_center": "FIN-OPS",
                    },
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "ORD-"}],
            },
            {
                "step_id": "announce_channel",
                "description": "Post approval workflow status to Slack.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Scheduled finance review for {scenario_id}. Order marked REVIEW_SCHEDULED."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
            {
                "step_id": "create_ticket",
                "description": "Create an execution ticket for operational follow-up.",
                "tool": "tickets.create",
                "args": {
                    "title": format!("{scenario_id} operations follow-up"),
                    "description": "Coordinate finance review outcome and next actions.",
                    "assignee": "agent",
                },
                "expect": [{"kind": "result_contains", "field": "ticket_id", "contains": "TCK-"}],
            },
        ]),
        "risk_escalation" => json!([
            {
                "step_id": "inspect_catalog",
                "description": "Review procurement browser context for anomalies.",
                "tool": "browser.read",
                "args": {},
                "expect": [{"kind": "result_contains", "field": "title", "contains": ""}],
            },
            {
                "step_id": "query_orders",
                "description": "Read current procurement order states from DB.",
                "tool": "db.query",
                "args": {"table": "procurement_orders", "limit": 10},
                "expect": [
                    {"kind": "result_contains", "field": "table", "contains": "procurement_orders"},
                ],
            },
            {
                "step_id": "log_crm_risk",
                "description": "Record risk context in CRM activity log.",
                "tool": activity_tool,
                "args": {
                    "kind": "note",
                    "note": format!(
                        "Potential delivery risk for {scenario_id}; escalate pending approval."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ok", "contains": "true"}],
            },
            {
                "step_id": "mail_escalation",
                "description": "Escalate approval request by email.",
                "tool": "mail.compose",
                "args": {
                    "to": approver,
                    "subj": format!("{scenario_id} risk escalation"),
                    "body_text": "Delivery risk identified. Please approve mitigation budget \
                                  and timeline.",
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "m"}],
            },
            {
                "step_id": "post_approval",
                "description": "Post approval escalation context in Slack.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Escalation: {scenario_id} needs finance approval for risk mitigation."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
        ]),
        "identity_access_review" => json!([
            {
                "step_id": "list_pending_requests",
                "description": "Review pending access requests in ServiceDesk.",
                "tool": "servicedesk.list_requests",
                "args": {"status": "PENDING_APPROVAL", "limit": 10},
                "expect": [
                    {"kind": "result_contains", "field": "requests", "contains": "REQ-"},
                ],
            },
            {
                "step_id": "inspect_identity",
                "description": "Inspect user state before assignment.",
                "tool": "okta.get_user",
                "args": {"user_id": "USR-9001"},
                "expect": [
                    {"kind": "result_contains", "field": "email", "contains": "example"},
                ],
            },
            {
                "step_id": "assign_group",
                "description": "Assign user to IT support group for temporary access.",
                "tool": "okta.assign_group",
                "args": {"user_id": "USR-9001", "group_id": "GRP-it"},
                "expect": [
                    {"kind": "result_contains", "field": "group_id", "contains": "GRP-"},
                ],
            },
            {
                "step_id": "approve_request",
                "description": "Update service request approval stage.",
                "tool": "servicedesk.update_request",
                "args": {
                    "request_id": "REQ-8801",
                    "status": "APPROVED",
                    "approval_stage": "security",
                    "approval_status": "APPROVED",
                    "comment": "Identity group assignment completed and validated.",
                },
                "expect": [
                    {"kind": "result_contains", "field": "status", "contains": "APPROVED"},
                ],
            },
            {
                "step_id": "announce_access",
                "description": "Announce access completion in Slack.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Access request {scenario_id} approved; identity assignment applied."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
        ]),
        "procure_to_pay" => json!([
            {
                "step_id": "create_po",
                "description": "Create ERP purchase order for procurement plan.",
                "tool": "erp.create_po",
                "args": {
                    "vendor": "MacroCompute",
                    "currency": "USD",
                    "lines": [{
                        "item_id": "LAPTOP-15",
                        "desc": "Laptop fleet refresh",
                        "qty": 5,
                        "unit_price": budget as f64 / 5.0,
                    }],
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "PO-"}],
            },
            {
                "step_id": "receive_goods",
                "description": "Receive goods against the ERP purchase order.",
                "tool": "erp.receive_goods",
                "args": {"po_id": "PO-1", "lines": [{"item_id": "LAPTOP-15", "qty": 5}]},
                "expect": [{"kind": "result_contains", "field": "id", "contains": "RCPT-"}],
            },
            {
                "step_id": "submit_invoice",
                "description": "Submit invoice for the received order.",
                "tool": "erp.submit_invoice",
                "args": {
                    "vendor": "MacroCompute",
                    "po_id": "PO-1",
                    "lines": [{
                        "item_id": "LAPTOP-15",
                        "qty": 5,
                        "unit_price": budget as f64 / 5.0,
                    }],
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "INV-"}],
            },
            {
                "step_id": "match_three_way",
                "description": "Run ERP three-way match.",
                "tool": "erp.match_three_way",
                "args": {"po_id": "PO-1", "invoice_id": "INV-1", "receipt_id": "RCPT-1"},
                "expect": [{"kind": "result_equals", "field": "status", "equals": "MATCH"}],
            },
            {
                "step_id": "post_payment",
                "description": "Post invoice payment after successful match.",
                "tool": "erp.post_payment",
                "args": {"invoice_id": "INV-1", "amount": budget},
                "expect": [{"kind": "result_contains", "field": "status", "contains": "PAID"}],
            },
            {
                "step_id": "write_audit",
                "description": "Write procure-to-pay completion row to audit DB.",
                "tool": "db.upsert",
                "args": {
                    "table": "approval_audit",
                    "row": {
                        "id": format!("APR-{scenario_id}"),
                        "entity_type": "purchase_order",
                        "entity_id": "PO-1",
                        "status": "PAID",
                        "approver": approver,
                    },
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "APR-"}],
            },
        ]),
        _ => json!([
            {
                "step_id": "read_browser",
                "description": "Open procurement catalog context.",
                "tool": "browser.read",
                "args": {},
                "expect": [{"kind": "result_contains", "field": "title", "contains": ""}],
            },
            {
                "step_id": "search_docs",
                "description": "Search policy docs for procurement guidance.",
                "tool": "docs.search",
                "args": {"query": "policy"},
                "expect": [],
            },
            {
                "step_id": "request_quote",
                "description": "Send quote request email to the assigned vendor contact.",
                "tool": "mail.compose",
                "args": {
                    "to": quote_to,
                    "subj": format!("{org_name} procurement quote request"),
                    "body_text": format!(
                        "Please share quote and ETA for laptop batch ({scenario_id}). \
                         Include total amount and delivery timeline."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "id", "contains": "m"}],
            },
            {
                "step_id": "post_approval",
                "description": "Post approval request in procurement Slack channel.",
                "tool": "slack.send_message",
                "args": {
                    "channel": "#procurement",
                    "text": format!(
                        "Request approval for {scenario_id}. Budget ${budget}. Evidence \
                         reviewed in browser/docs."
                    ),
                },
                "expect": [{"kind": "result_contains", "field": "ts", "contains": ""}],
            },
            {
                "step_id": "create_ticket",
                "description": "Create ticket with workflow completion note.",
                "tool": "tickets.create",
                "args": {
                    "title": format!("{scenario_id} execution summary"),
                    "description": format!(
                        "{scenario_id} executed: quote requested and approval posted."
                    ),
                    "assignee": "agent",
                },
                "expect": [{"kind": "result_contains", "field": "ticket_id", "contains": "TCK-"}],
            },
        ]),
    }
}

fn failure_paths_for_family(family: &str) -> Value {
    match family {
        "db_audit" => json!([{
            "name": "audit_write_retry",
            "trigger_step": "write_audit",
            "recovery_steps": ["post_approval"],
            "notes": "If DB write fails, keep approval thread updated.",
        }]),
        "sales_pipeline" => json!([{
            "name": "crm_activity_retry",
            "trigger_step": "log_activity",
            "recovery_steps": ["post_approval"],
            "notes": "If CRM logging fails, continue with approval channel artifacts.",
        }]),
        "calendar_review" => json!([{
            "name": "calendar_recover",
            "trigger_step": "schedule_review",
            "recovery_steps": ["mail_review_context", "announce_channel"],
            "notes": "If event creation fails, preserve approval context over mail/slack.",
        }]),
        "risk_escalation" => json!([{
            "name": "escalation_continue",
            "trigger_step": "log_crm_risk",
            "recovery_steps": ["mail_escalation", "post_approval"],
            "notes": "Escalate even if CRM activity logging is unavailable.",
        }]),
        "identity_access_review" => json!([{
            "name": "identity_assign_retry",
            "trigger_step": "assign_group",
            "recovery_steps": ["approve_request", "announce_access"],
            "notes": "If identity assignment fails, continue request progression.",
        }]),
        "procure_to_pay" => json!([{
            "name": "three_way_mismatch_recovery",
            "trigger_step": "match_three_way",
            "recovery_steps": ["write_audit"],
            "notes": "Persist mismatch details to the audit table for AP investigation.",
        }]),
        _ => json!([{
            "name": "ticket_recover",
            "trigger_step": "create_ticket",
            "recovery_steps": ["post_approval"],
            "notes": "Proceed if the ticket service is unavailable.",
        }]),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
