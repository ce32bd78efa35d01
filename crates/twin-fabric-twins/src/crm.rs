// twin-fabric-twins/src/crm.rs
// ============================================================================
// Module: CRM Twin
// Description: Contacts, companies, deals, and activity logging.
// Purpose: Enforce uniqueness, the closed deal-stage set, and consent rules.
// Dependencies: serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! Contacts are unique by case-insensitive email, companies by lowercased
//! domain. Deal stages form a closed set and closed deals are sticky.
//! Email outreach against a do-not-contact record may raise
//! `consent_violation` under the configured error rate.

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

use crate::ServiceName;
use crate::decode_args;
use crate::unknown_operation;

/// Canonical deal stages keyed by their normalized lookup form.
const STAGES: &[(&str, &str)] = &[
    ("new", "New"),
    ("prospecting", "Prospecting"),
    ("qualification", "Qualification"),
    ("proposal", "Proposal"),
    ("negotiation", "Negotiation"),
    ("closed won", "Closed Won"),
    ("closed lost", "Closed Lost"),
    ("closed_won", "Closed Won"),
    ("closed_lost", "Closed Lost"),
];

/// Supported activity kinds.
const ACTIVITY_KINDS: &[&str] = &[
    "note",
    "email_outreach",
    "call",
    "meeting",
    "task",
    "system_event",
];

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One CRM contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Contact {
    /// Stable id (`C-…`).
    id: String,
    /// Unique email.
    email: String,
    /// Given name.
    first_name: String,
    /// Family name.
    last_name: String,
    /// Consent flag.
    do_not_contact: bool,
    /// Associated company id.
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<String>,
    /// Creation time.
    created_ms: u64,
}

/// One CRM company.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Company {
    /// Stable id (`CO-…`).
    id: String,
    /// Display name.
    name: String,
    /// Unique lowercased domain (may be empty).
    domain: String,
    /// Creation time.
    created_ms: u64,
}

/// One stage edge in a deal's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StageEntry {
    /// Stage after the edge.
    stage: String,
    /// Logical time of the edge.
    time_ms: u64,
}

/// One CRM deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Deal {
    /// Stable id (`D-…`).
    id: String,
    /// Display name.
    name: String,
    /// Amount in dollars.
    amount: f64,
    /// Current stage.
    stage: String,
    /// Associated contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_id: Option<String>,
    /// Associated company.
    #[serde(skip_serializing_if = "Option::is_none")]
    company_id: Option<String>,
    /// Expected close date.
    #[serde(skip_serializing_if = "Option::is_none")]
    close_date: Option<String>,
    /// Creation time.
    created_ms: u64,
    /// Last mutation time.
    updated_ms: u64,
    /// Stage history.
    stage_history: Vec<StageEntry>,
}

/// One activity record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Activity {
    /// Stable id (`A-…`).
    id: String,
    /// Logical log time.
    time_ms: u64,
    /// Activity kind.
    kind: String,
    /// Associated contact.
    #[serde(skip_serializing_if = "Option::is_none")]
    contact_id: Option<String>,
    /// Associated deal.
    #[serde(skip_serializing_if = "Option::is_none")]
    deal_id: Option<String>,
    /// Free-form note.
    note: String,
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Arguments for `crm.create_contact`.
#[derive(Debug, Deserialize)]
struct CreateContactArgs {
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    do_not_contact: bool,
}

/// Arguments for id lookups.
#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

/// Arguments for `crm.list_contacts`.
#[derive(Debug, Deserialize)]
struct ListContactsArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    do_not_contact: Option<bool>,
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

/// Arguments for `crm.create_company`.
#[derive(Debug, Deserialize)]
struct CreateCompanyArgs {
    name: String,
    #[serde(default)]
    domain: Option<String>,
}

/// Arguments for `crm.list_companies`.
#[derive(Debug, Deserialize)]
struct ListCompaniesArgs {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    domain: Option<String>,
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

/// Arguments for `crm.associate_contact_company`.
#[derive(Debug, Deserialize)]
struct AssociateArgs {
    contact_id: String,
    company_id: String,
}

/// Arguments for `crm.create_deal`.
#[derive(Debug, Deserialize)]
struct CreateDealArgs {
    name: String,
    amount: f64,
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    contact_id: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    close_date: Option<String>,
}

/// Arguments for `crm.list_deals`.
#[derive(Debug, Deserialize)]
struct ListDealsArgs {
    #[serde(default)]
    stage: Option<String>,
    #[serde(default)]
    company_id: Option<String>,
    #[serde(default)]
    min_amount: Option<f64>,
    #[serde(default)]
    max_amount: Option<f64>,
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

/// Arguments for `crm.update_deal_stage`.
#[derive(Debug, Deserialize)]
struct UpdateDealStageArgs {
    id: String,
    stage: String,
}

/// Arguments for `crm.log_activity`.
#[derive(Debug, Deserialize)]
struct LogActivityArgs {
    kind: String,
    #[serde(default)]
    contact_id: Option<String>,
    #[serde(default)]
    deal_id: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic CRM twin.
#[derive(Debug)]
pub struct CrmTwin {
    /// Contacts keyed by id.
    contacts: BTreeMap<String, Contact>,
    /// Companies keyed by id.
    companies: BTreeMap<String, Company>,
    /// Deals keyed by id.
    deals: BTreeMap<String, Deal>,
    /// Append-only activity log.
    activities: Vec<Activity>,
    /// Id counters.
    contact_seq: u64,
    company_seq: u64,
    deal_seq: u64,
    activity_seq: u64,
    /// Consent-violation sampling rate.
    error_rate: f64,
}

impl CrmTwin {
    /// Creates an empty CRM with the configured error rate.
    #[must_use]
    pub fn new(error_rate: f64) -> Self {
        Self {
            contacts: BTreeMap::new(),
            companies: BTreeMap::new(),
            deals: BTreeMap::new(),
            activities: Vec::new(),
            contact_seq: 1,
            company_seq: 1,
            deal_seq: 1,
            activity_seq: 1,
            error_rate,
        }
    }

    /// Dispatches one CRM operation.
    ///
    /// # Errors
    ///
    /// Returns entity, conflict, stage, and consent errors per operation.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "create_contact" => self.create_contact(decode_args(args)?, ctx),
            "get_contact" => self.get_contact(&decode_args::<IdArgs>(args)?),
            "list_contacts" => self.list_contacts(decode_args(args)?),
            "create_company" => self.create_company(decode_args(args)?, ctx),
            "get_company" => self.get_company(&decode_args::<IdArgs>(args)?),
            "list_companies" => self.list_companies(decode_args(args)?),
            "associate_contact_company" => self.associate(&decode_args::<AssociateArgs>(args)?),
            "create_deal" => self.create_deal(decode_args(args)?, ctx),
            "get_deal" => self.get_deal(&decode_args::<IdArgs>(args)?),
            "list_deals" => self.list_deals(decode_args(args)?),
            "update_deal_stage" => self.update_deal_stage(decode_args(args)?, ctx),
            "log_activity" => self.log_activity(decode_args(args)?, ctx),
            other => Err(unknown_operation(ServiceName::Crm, other)),
        }
    }

    fn create_contact(
        &mut self,
        args: CreateContactArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let email_key = args.email.trim().to_lowercase();
        if self
            .contacts
            .values()
            .any(|contact| contact.email.to_lowercase() == email_key)
        {
            return Err(FabricError::new(
                "conflict.contact_exists",
                format!("contact already exists: {}", args.email),
            ));
        }
        let id = format!("C-{}", self.contact_seq);
        self.contact_seq += 1;
        self.contacts.insert(
            id.clone(),
            Contact {
                id: id.clone(),
                email: args.email,
                first_name: args.first_name.unwrap_or_default(),
                last_name: args.last_name.unwrap_or_default(),
                do_not_contact: args.do_not_contact,
                company_id: None,
                created_ms: ctx.now_ms,
            },
        );
        Ok(json!({"id": id}))
    }

    fn get_contact(&self, args: &IdArgs) -> FabricResult<Value> {
        let contact = self
            .contacts
            .get(&args.id)
            .ok_or_else(|| unknown_contact(&args.id))?;
        serde_json::to_value(contact)
            .map_err(|err| FabricError::new("crm.serialization", err.to_string()))
    }

    fn list_contacts(&self, args: ListContactsArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let mut rows: Vec<Value> = self
            .contacts
            .values()
            .filter(|contact| {
                (needle.is_empty()
                    || contact.email.to_lowercase().contains(&needle)
                    || contact.first_name.to_lowercase().contains(&needle)
                    || contact.last_name.to_lowercase().contains(&needle))
                    && args
                        .company_id
                        .as_ref()
                        .is_none_or(|company| contact.company_id.as_ref() == Some(company))
                    && args
                        .do_not_contact
                        .is_none_or(|flag| contact.do_not_contact == flag)
            })
            .filter_map(|contact| serde_json::to_value(contact).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("email" | "last_name")) => field,
            _ => "created_ms",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "contacts",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn create_company(
        &mut self,
        args: CreateCompanyArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let domain = args
            .domain
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_lowercase();
        if !domain.is_empty()
            && self
                .companies
                .values()
                .any(|company| company.domain == domain)
        {
            return Err(FabricError::new(
                "conflict.company_exists",
                format!("company already exists: {domain}"),
            ));
        }
        let id = format!("CO-{}", self.company_seq);
        self.company_seq += 1;
        self.companies.insert(
            id.clone(),
            Company {
                id: id.clone(),
                name: args.name,
                domain,
                created_ms: ctx.now_ms,
            },
        );
        Ok(json!({"id": id}))
    }

    fn get_company(&self, args: &IdArgs) -> FabricResult<Value> {
        let company = self
            .companies
            .get(&args.id)
            .ok_or_else(|| unknown_company(&args.id))?;
        serde_json::to_value(company)
            .map_err(|err| FabricError::new("crm.serialization", err.to_string()))
    }

    fn list_companies(&self, args: ListCompaniesArgs) -> FabricResult<Value> {
        let needle = args.query.as_deref().unwrap_or("").trim().to_lowercase();
        let wanted_domain = args.domain.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Value> = self
            .companies
            .values()
            .filter(|company| {
                (needle.is_empty()
                    || company.name.to_lowercase().contains(&needle)
                    || company.domain.contains(&needle))
                    && wanted_domain
                        .as_ref()
                        .is_none_or(|domain| &company.domain == domain)
            })
            .filter_map(|company| serde_json::to_value(company).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("domain" | "created_ms")) => field,
            _ => "name",
        };
        let descending = args.sort_dir.as_deref() == Some("desc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "companies",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn associate(&mut self, args: &AssociateArgs) -> FabricResult<Value> {
        if !self.companies.contains_key(&args.company_id) {
            return Err(unknown_company(&args.company_id));
        }
        let contact = self
            .contacts
            .get_mut(&args.contact_id)
            .ok_or_else(|| unknown_contact(&args.contact_id))?;
        contact.company_id = Some(args.company_id.clone());
        Ok(json!({"ok": true}))
    }

    fn create_deal(&mut self, args: CreateDealArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let stage = normalize_stage(args.stage.as_deref().unwrap_or("New"))?;
        if let Some(contact_id) = &args.contact_id
            && !self.contacts.contains_key(contact_id)
        {
            return Err(unknown_contact(contact_id));
        }
        if let Some(company_id) = &args.company_id
            && !self.companies.contains_key(company_id)
        {
            return Err(unknown_company(company_id));
        }
        let id = format!("D-{}", self.deal_seq);
        self.deal_seq += 1;
        self.deals.insert(
            id.clone(),
            Deal {
                id: id.clone(),
                name: args.name,
                amount: args.amount,
                stage: stage.clone(),
                contact_id: args.contact_id,
                company_id: args.company_id,
                close_date: args.close_date,
                created_ms: ctx.now_ms,
                updated_ms: ctx.now_ms,
                stage_history: vec![StageEntry {
                    stage,
                    time_ms: ctx.now_ms,
                }],
            },
        );
        Ok(json!({"id": id}))
    }

    fn get_deal(&self, args: &IdArgs) -> FabricResult<Value> {
        let deal = self
            .deals
            .get(&args.id)
            .ok_or_else(|| unknown_deal(&args.id))?;
        serde_json::to_value(deal)
            .map_err(|err| FabricError::new("crm.serialization", err.to_string()))
    }

    fn list_deals(&self, args: ListDealsArgs) -> FabricResult<Value> {
        let wanted_stage = args
            .stage
            .as_deref()
            .map(normalize_stage)
            .transpose()?;
        let mut rows: Vec<Value> = self
            .deals
            .values()
            .filter(|deal| {
                wanted_stage.as_ref().is_none_or(|stage| &deal.stage == stage)
                    && args
                        .company_id
                        .as_ref()
                        .is_none_or(|company| deal.company_id.as_ref() == Some(company))
                    && args.min_amount.is_none_or(|min| deal.amount >= min)
                    && args.max_amount.is_none_or(|max| deal.amount <= max)
            })
            .filter_map(|deal| serde_json::to_value(deal).ok())
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("created_ms" | "amount" | "stage")) => field,
            _ => "updated_ms",
        };
        let descending = args.sort_dir.as_deref() != Some("asc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "deals",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn update_deal_stage(
        &mut self,
        args: UpdateDealStageArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let next = normalize_stage(&args.stage)?;
        let deal = self
            .deals
            .get_mut(&args.id)
            .ok_or_else(|| unknown_deal(&args.id))?;
        let closed = deal.stage == "Closed Won" || deal.stage == "Closed Lost";
        if closed && next != deal.stage {
            return Err(FabricError::new(
                "invalid_stage_transition",
                format!("cannot move closed deal from {} to {next}", deal.stage),
            ));
        }
        deal.stage = next.clone();
        deal.updated_ms = deal.updated_ms.saturating_add(1).max(ctx.now_ms);
        deal.stage_history.push(StageEntry {
            stage: next.clone(),
            time_ms: ctx.now_ms,
        });
        Ok(json!({"ok": true, "stage": next}))
    }

    fn log_activity(&mut self, args: LogActivityArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        if !ACTIVITY_KINDS.contains(&args.kind.as_str()) {
            return Err(FabricError::new(
                "invalid_activity_kind",
                format!("unsupported activity kind: {}", args.kind),
            ));
        }
        if let Some(contact_id) = &args.contact_id {
            let contact = self
                .contacts
                .get(contact_id)
                .ok_or_else(|| unknown_contact(contact_id))?;
            if args.kind == "email_outreach"
                && contact.do_not_contact
                && self.error_rate > 0.0
                && ctx.next_f64() < self.error_rate
            {
                return Err(FabricError::new(
                    "consent_violation",
                    "contact is marked do-not-contact",
                ));
            }
        }
        if let Some(deal_id) = &args.deal_id
            && !self.deals.contains_key(deal_id)
        {
            return Err(unknown_deal(deal_id));
        }
        let id = format!("A-{}", self.activity_seq);
        self.activity_seq += 1;
        self.activities.push(Activity {
            id: id.clone(),
            time_ms: ctx.now_ms,
            kind: args.kind,
            contact_id: args.contact_id,
            deal_id: args.deal_id,
            note: args.note.unwrap_or_default(),
        });
        Ok(json!({"ok": true, "id": id}))
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "CRM: {} contacts, {} deals, {} activities",
            self.contacts.len(),
            self.deals.len(),
            self.activities.len()
        )
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        json!({
            "contact_count": self.contacts.len(),
            "company_count": self.companies.len(),
            "deal_count": self.deals.len(),
            "activity_count": self.activities.len(),
        })
    }
}

fn unknown_contact(id: &str) -> FabricError {
    FabricError::new("unknown_contact", format!("no such contact: {id}"))
}

fn unknown_company(id: &str) -> FabricError {
    FabricError::new("unknown_company", format!("no such company: {id}"))
}

fn unknown_deal(id: &str) -> FabricError {
    FabricError::new("unknown_deal", format!("no such deal: {id}"))
}

fn normalize_stage(raw: &str) -> FabricResult<String> {
    let key = raw.trim().to_lowercase();
    STAGES
        .iter()
        .find(|(lookup, _)| *lookup == key)
        .map(|(_, canonical)| (*canonical).to_string())
        .ok_or_else(|| FabricError::new("invalid_stage", format!("unsupported stage: {raw}")))
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the CRM twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("crm.create_contact", "Create a contact (unique by email).")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(280, 90),
        ToolSpec::new("crm.get_contact", "Get a contact by id.")
            .with_permissions(&["crm:read"])
            .with_latency(140, 40),
        ToolSpec::new("crm.list_contacts", "List contacts with filters.")
            .with_permissions(&["crm:read"])
            .with_latency(160, 50),
        ToolSpec::new("crm.create_company", "Create a company (unique by domain).")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(280, 90),
        ToolSpec::new("crm.get_company", "Get a company by id.")
            .with_permissions(&["crm:read"])
            .with_latency(140, 40),
        ToolSpec::new("crm.list_companies", "List companies with filters.")
            .with_permissions(&["crm:read"])
            .with_latency(160, 50),
        ToolSpec::new("crm.associate_contact_company", "Associate a contact with a company.")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(220, 70),
        ToolSpec::new("crm.create_deal", "Create a deal in the pipeline.")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(300, 100),
        ToolSpec::new("crm.get_deal", "Get a deal by id.")
            .with_permissions(&["crm:read"])
            .with_latency(140, 40),
        ToolSpec::new("crm.list_deals", "List deals with filters.")
            .with_permissions(&["crm:read"])
            .with_latency(160, 50),
        ToolSpec::new("crm.update_deal_stage", "Move a deal to another stage.")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(260, 80),
        ToolSpec::new("crm.log_activity", "Log an activity (note, outreach, call, …).")
            .with_permissions(&["crm:write"])
            .with_side_effects(&["crm_mutation"])
            .with_latency(200, 60),
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

    use super::*;

    fn args(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn contact_email_uniqueness_is_case_insensitive() {
        let mut twin = CrmTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        twin.dispatch(
            "create_contact",
            &args(json!({"email": "Pat@Example.com"})),
            &mut ctx,
        )
        .unwrap();
        let err = twin
            .dispatch(
                "create_contact",
                &args(json!({"email": "pat@example.com"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "conflict.contact_exists");
    }

    #[test]
    fn company_domain_uniqueness_is_lowercased() {
        let mut twin = CrmTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        twin.dispatch(
            "create_company",
            &args(json!({"name": "Acme", "domain": "Acme.Example"})),
            &mut ctx,
        )
        .unwrap();
        let err = twin
            .dispatch(
                "create_company",
                &args(json!({"name": "Acme 2", "domain": "acme.example"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "conflict.company_exists");
    }

    #[test]
    fn closed_deals_are_sticky() {
        let mut twin = CrmTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let deal = twin
            .dispatch(
                "create_deal",
                &args(json!({"name": "Renewal", "amount": 125_000.0, "stage": "Qualification"})),
                &mut ctx,
            )
            .unwrap();
        let id = deal["id"].as_str().unwrap().to_string();
        twin.dispatch(
            "update_deal_stage",
            &args(json!({"id": id, "stage": "closed_won"})),
            &mut ctx,
        )
        .unwrap();
        let err = twin
            .dispatch(
                "update_deal_stage",
                &args(json!({"id": id, "stage": "Negotiation"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "invalid_stage_transition");
        // Re-asserting the same closed stage stays legal.
        let same = twin
            .dispatch(
                "update_deal_stage",
                &args(json!({"id": id, "stage": "Closed Won"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(same["stage"], "Closed Won");
    }

    #[test]
    fn invalid_stage_names_are_rejected() {
        let mut twin = CrmTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let err = twin
            .dispatch(
                "create_deal",
                &args(json!({"name": "Bad", "amount": 1.0, "stage": "Limbo"})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "invalid_stage");
    }

    #[test]
    fn dnc_outreach_samples_consent_violation_at_full_rate() {
        let mut twin = CrmTwin::new(1.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let contact = twin
            .dispatch(
                "create_contact",
                &args(json!({"email": "dnc@example.com", "do_not_contact": true})),
                &mut ctx,
            )
            .unwrap();
        let err = twin
            .dispatch(
                "log_activity",
                &args(json!({"kind": "email_outreach", "contact_id": contact["id"]})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "consent_violation");

        // A plain note against the same contact is always fine.
        let logged = twin
            .dispatch(
                "log_activity",
                &args(json!({"kind": "note", "contact_id": contact["id"], "note": "ctx"})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(logged["ok"], true);
    }

    #[test]
    fn deal_listing_filters_by_amount_band() {
        let mut twin = CrmTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        for (name, amount) in [("small", 100.0), ("mid", 5_000.0), ("big", 90_000.0)] {
            twin.dispatch(
                "create_deal",
                &args(json!({"name": name, "amount": amount})),
                &mut ctx,
            )
            .unwrap();
        }
        let page = twin
            .dispatch(
                "list_deals",
                &args(json!({"min_amount": 1_000.0, "max_amount": 10_000.0, "limit": 10})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(page["count"], 1);
        assert_eq!(page["deals"][0]["name"], "mid");
    }
}
