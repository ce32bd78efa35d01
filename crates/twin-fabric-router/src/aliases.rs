// twin-fabric-router/src/aliases.rs
// ============================================================================
// Module: Alias Packs & Focus Table
// Description: Vendor-flavored tool aliases and the tool → focus mapping.
// Purpose: Let agents speak HubSpot/Salesforce/Xero while the canonical
//          twins do the work.
// Dependencies: none beyond std
// ============================================================================

//! ## Overview
//! Alias packs are declarative `(alias, canonical)` tables. Aliases register
//! as thin forwarders inheriting the canonical spec; dispatch resolves the
//! alias before routing, so policy and receipts always see the canonical
//! operation. The focus table maps tool-name prefixes (alias prefixes
//! included) to the twin family an observation should foreground.

// ============================================================================
// SECTION: Alias Packs
// ============================================================================

/// `(alias, canonical)` pairs for one ERP vendor flavor.
#[must_use]
pub fn erp_alias_pack(pack: &str) -> &'static [(&'static str, &'static str)] {
    match pack {
        "xero" => &[
            ("xero.purchase_orders.create", "erp.create_po"),
            ("xero.invoices.create", "erp.submit_invoice"),
            ("xero.invoices.list", "erp.list_invoices"),
            ("xero.payments.create", "erp.post_payment"),
        ],
        "netsuite" => &[
            ("netsuite.po.create", "erp.create_po"),
            ("netsuite.vendor_bill.create", "erp.submit_invoice"),
            ("netsuite.payment.apply", "erp.post_payment"),
        ],
        "dynamics" => &[
            ("dynamics.purchase_order.create", "erp.create_po"),
            ("dynamics.invoice.match", "erp.match_three_way"),
        ],
        "quickbooks" => &[
            ("quickbooks.bill.create", "erp.submit_invoice"),
            ("quickbooks.billpayment.create", "erp.post_payment"),
        ],
        _ => &[],
    }
}

/// `(alias, canonical)` pairs for one CRM vendor flavor.
#[must_use]
pub fn crm_alias_pack(pack: &str) -> &'static [(&'static str, &'static str)] {
    match pack {
        "hubspot" => &[
            ("hubspot.contacts.create", "crm.create_contact"),
            ("hubspot.companies.create", "crm.create_company"),
            ("hubspot.deals.create", "crm.create_deal"),
            ("hubspot.activities.log", "crm.log_activity"),
        ],
        "salesforce" => &[
            ("salesforce.contact.create", "crm.create_contact"),
            ("salesforce.opportunity.create", "crm.create_deal"),
            ("salesforce.opportunity.update_stage", "crm.update_deal_stage"),
            ("salesforce.activity.log", "crm.log_activity"),
        ],
        _ => &[],
    }
}

// ============================================================================
// SECTION: Focus Table
// ============================================================================

/// Fixed tool-prefix → focus table used by `act_and_observe`.
#[must_use]
pub fn focus_for_tool(tool: &str) -> &'static str {
    const DIRECT: &[&str] = &[
        "slack",
        "mail",
        "docs",
        "calendar",
        "tickets",
        "erp",
        "crm",
        "db",
        "browser",
        "okta",
        "servicedesk",
    ];
    for family in DIRECT {
        if tool.starts_with(&format!("{family}.")) {
            return family;
        }
    }
    if tool.starts_with("salesforce.") || tool.starts_with("hubspot.") {
        return "crm";
    }
    if tool.starts_with("xero.")
        || tool.starts_with("netsuite.")
        || tool.starts_with("dynamics.")
        || tool.starts_with("quickbooks.")
    {
        return "erp";
    }
    "browser"
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
    fn packs_resolve_only_canonical_tool_names() {
        for pack in ["xero", "netsuite", "dynamics", "quickbooks"] {
            for (alias, canonical) in erp_alias_pack(pack) {
                assert!(canonical.starts_with("erp."), "{alias} → {canonical}");
            }
        }
        for pack in ["hubspot", "salesforce"] {
            for (alias, canonical) in crm_alias_pack(pack) {
                assert!(canonical.starts_with("crm."), "{alias} → {canonical}");
            }
        }
        assert!(erp_alias_pack("sap").is_empty());
    }

    #[test]
    fn focus_table_routes_aliases_to_their_family() {
        assert_eq!(focus_for_tool("salesforce.activity.log"), "crm");
        assert_eq!(focus_for_tool("xero.invoices.create"), "erp");
        assert_eq!(focus_for_tool("tickets.create"), "tickets");
        assert_eq!(focus_for_tool("something.else"), "browser");
    }
}
