// twin-fabric-twins/src/erp.rs
// ============================================================================
// Module: ERP Twin
// Description: Purchase orders, goods receipts, invoices, and payments.
// Purpose: Enforce three-way match and integer-cent money invariants.
// Dependencies: serde, serde_json, twin-fabric-core
// ============================================================================

//! ## Overview
//! All money lives in integer cents; tool payloads render dollars with two
//! decimals. PO status progresses OPEN → PARTIALLY_RECEIVED → RECEIVED →
//! INVOICED; invoices OPEN → PARTIALLY_PAID → PAID with payments clamped to
//! the invoice amount. Three-way match requires amounts within one cent,
//! per-item quantity equality, and (when a receipt is supplied) invoiced
//! quantity within received quantity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
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

// ============================================================================
// SECTION: Money
// ============================================================================

/// Converts a JSON dollar amount into integer cents, rounding half away
/// from zero; non-numeric values collapse to zero.
fn money_to_cents(value: &Value) -> i64 {
    let dollars = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    (dollars * 100.0).round() as i64
}

/// Renders integer cents as a two-decimal dollar amount.
fn cents_to_money(cents: i64) -> f64 {
    (cents as f64) / 100.0
}

// ============================================================================
// SECTION: Entities
// ============================================================================

/// One PO or invoice line.
#[derive(Debug, Clone)]
struct Line {
    /// 1-based line number.
    line_no: u64,
    /// Item identifier.
    item_id: String,
    /// Line description (PO only).
    desc: String,
    /// Ordered/invoiced quantity.
    qty: i64,
    /// Unit price in cents.
    unit_price_cents: i64,
}

impl Line {
    fn amount_cents(&self) -> i64 {
        self.qty * self.unit_price_cents
    }

    fn payload(&self) -> Value {
        json!({
            "line_no": self.line_no,
            "item_id": self.item_id,
            "desc": self.desc,
            "qty": self.qty,
            "unit_price": cents_to_money(self.unit_price_cents),
            "amount": cents_to_money(self.amount_cents()),
        })
    }
}

/// One purchase order.
#[derive(Debug, Clone)]
struct PurchaseOrder {
    id: String,
    vendor: String,
    currency: String,
    status: String,
    lines: Vec<Line>,
    amount_cents: i64,
    created_ms: u64,
    updated_ms: u64,
    /// Received quantity per item id.
    received_qty_by_item: BTreeMap<String, i64>,
    /// Result of the last three-way match.
    last_three_way_match: Option<Value>,
}

impl PurchaseOrder {
    fn payload(&self) -> Value {
        json!({
            "id": self.id,
            "vendor": self.vendor,
            "currency": self.currency,
            "status": self.status,
            "lines": self.lines.iter().map(Line::payload).collect::<Vec<Value>>(),
            "amount": cents_to_money(self.amount_cents),
            "created_ms": self.created_ms,
            "updated_ms": self.updated_ms,
            "received_qty_by_item": self.received_qty_by_item,
            "last_three_way_match": self.last_three_way_match,
        })
    }
}

/// One goods receipt.
#[derive(Debug, Clone)]
struct GoodsReceipt {
    id: String,
    po_id: String,
    /// Received lines as `(item_id, qty)`.
    lines: Vec<(String, i64)>,
    time_ms: u64,
}

impl GoodsReceipt {
    fn payload(&self) -> Value {
        json!({
            "id": self.id,
            "po_id": self.po_id,
            "lines": self
                .lines
                .iter()
                .map(|(item_id, qty)| json!({"item_id": item_id, "qty": qty}))
                .collect::<Vec<Value>>(),
            "time_ms": self.time_ms,
        })
    }
}

/// One invoice.
#[derive(Debug, Clone)]
struct Invoice {
    id: String,
    po_id: String,
    vendor: String,
    status: String,
    lines: Vec<Line>,
    amount_cents: i64,
    paid_cents: i64,
    time_ms: u64,
    updated_ms: u64,
}

impl Invoice {
    fn payload(&self) -> Value {
        json!({
            "id": self.id,
            "po_id": self.po_id,
            "vendor": self.vendor,
            "status": self.status,
            "lines": self.lines.iter().map(Line::payload).collect::<Vec<Value>>(),
            "amount": cents_to_money(self.amount_cents),
            "paid_amount": cents_to_money(self.paid_cents),
            "time_ms": self.time_ms,
            "updated_ms": self.updated_ms,
        })
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// One input line for PO creation and invoicing.
#[derive(Debug, Deserialize)]
struct LineInput {
    item_id: Option<Value>,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    qty: i64,
    #[serde(default)]
    unit_price: Value,
}

/// Arguments for `erp.create_po`.
#[derive(Debug, Deserialize)]
struct CreatePoArgs {
    vendor: String,
    #[serde(default)]
    currency: Option<String>,
    lines: Vec<LineInput>,
}

/// Arguments for id lookups.
#[derive(Debug, Deserialize)]
struct IdArgs {
    id: String,
}

/// Arguments for `erp.list_pos`.
#[derive(Debug, Deserialize)]
struct ListPosArgs {
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    currency: Option<String>,
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

/// One received line.
#[derive(Debug, Deserialize)]
struct ReceiveLineInput {
    item_id: Value,
    #[serde(default)]
    qty: i64,
}

/// Arguments for `erp.receive_goods`.
#[derive(Debug, Deserialize)]
struct ReceiveGoodsArgs {
    po_id: String,
    lines: Vec<ReceiveLineInput>,
}

/// Arguments for `erp.submit_invoice`.
#[derive(Debug, Deserialize)]
struct SubmitInvoiceArgs {
    vendor: String,
    po_id: String,
    lines: Vec<LineInput>,
}

/// Arguments for `erp.list_invoices`.
#[derive(Debug, Deserialize)]
struct ListInvoicesArgs {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    vendor: Option<String>,
    #[serde(default)]
    po_id: Option<String>,
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

/// Arguments for `erp.match_three_way`.
#[derive(Debug, Deserialize)]
struct MatchArgs {
    po_id: String,
    invoice_id: String,
    #[serde(default)]
    receipt_id: Option<String>,
}

/// Arguments for `erp.post_payment`.
#[derive(Debug, Deserialize)]
struct PostPaymentArgs {
    invoice_id: String,
    amount: Value,
}

// ============================================================================
// SECTION: Twin
// ============================================================================

/// Deterministic ERP twin.
#[derive(Debug)]
pub struct ErpTwin {
    /// Purchase orders keyed by id.
    pos: BTreeMap<String, PurchaseOrder>,
    /// Invoices keyed by id.
    invoices: BTreeMap<String, Invoice>,
    /// Goods receipts keyed by id.
    receipts: BTreeMap<String, GoodsReceipt>,
    /// Id counters.
    po_seq: u64,
    invoice_seq: u64,
    receipt_seq: u64,
    /// Injected fault rate for invoice/payment operations.
    error_rate: f64,
}

impl ErpTwin {
    /// Creates an empty ERP with the configured error rate.
    #[must_use]
    pub fn new(error_rate: f64) -> Self {
        Self {
            pos: BTreeMap::new(),
            invoices: BTreeMap::new(),
            receipts: BTreeMap::new(),
            po_seq: 1,
            invoice_seq: 1,
            receipt_seq: 1,
            error_rate,
        }
    }

    /// Dispatches one ERP operation.
    ///
    /// # Errors
    ///
    /// Returns entity, lifecycle, and injected-fault errors per operation.
    pub fn dispatch(
        &mut self,
        operation: &str,
        args: &JsonMap,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        match operation {
            "create_po" => self.create_po(decode_args(args)?, ctx),
            "get_po" => self.get_po(&decode_args::<IdArgs>(args)?),
            "list_pos" => self.list_pos(decode_args(args)?),
            "receive_goods" => self.receive_goods(decode_args(args)?, ctx),
            "submit_invoice" => self.submit_invoice(decode_args(args)?, ctx),
            "get_invoice" => self.get_invoice(&decode_args::<IdArgs>(args)?),
            "list_invoices" => self.list_invoices(decode_args(args)?),
            "match_three_way" => self.match_three_way(decode_args(args)?, ctx),
            "post_payment" => self.post_payment(decode_args(args)?, ctx),
            other => Err(unknown_operation(ServiceName::Erp, other)),
        }
    }

    fn build_lines(inputs: &[LineInput]) -> Vec<Line> {
        inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| {
                let line_no = idx as u64 + 1;
                let item_id = match &input.item_id {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => line_no.to_string(),
                };
                Line {
                    line_no,
                    item_id,
                    desc: input.desc.clone().unwrap_or_default(),
                    qty: input.qty,
                    unit_price_cents: money_to_cents(&input.unit_price),
                }
            })
            .collect()
    }

    fn create_po(&mut self, args: CreatePoArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let lines = Self::build_lines(&args.lines);
        let amount_cents: i64 = lines.iter().map(Line::amount_cents).sum();
        let id = format!("PO-{}", self.po_seq);
        self.po_seq += 1;
        let received = lines
            .iter()
            .map(|line| (line.item_id.clone(), 0))
            .collect();
        let currency = args
            .currency
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| "USD".to_string());
        let po = PurchaseOrder {
            id: id.clone(),
            vendor: args.vendor,
            currency: currency.clone(),
            status: "OPEN".to_string(),
            lines,
            amount_cents,
            created_ms: ctx.now_ms,
            updated_ms: ctx.now_ms,
            received_qty_by_item: received,
            last_three_way_match: None,
        };
        self.pos.insert(id.clone(), po);
        Ok(json!({
            "id": id,
            "amount": cents_to_money(amount_cents),
            "currency": currency,
        }))
    }

    fn get_po(&self, args: &IdArgs) -> FabricResult<Value> {
        self.pos
            .get(&args.id)
            .map(PurchaseOrder::payload)
            .ok_or_else(|| unknown_po(&args.id))
    }

    fn list_pos(&self, args: ListPosArgs) -> FabricResult<Value> {
        let vendor_needle = args.vendor.as_deref().map(str::to_lowercase);
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let wanted_currency = args.currency.as_deref().map(str::to_uppercase);
        let mut rows: Vec<Value> = self
            .pos
            .values()
            .filter(|po| {
                vendor_needle
                    .as_ref()
                    .is_none_or(|needle| po.vendor.to_lowercase().contains(needle))
                    && wanted_status
                        .as_ref()
                        .is_none_or(|status| &po.status == status)
                    && wanted_currency
                        .as_ref()
                        .is_none_or(|currency| &po.currency.to_uppercase() == currency)
            })
            .map(PurchaseOrder::payload)
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("updated_ms" | "amount" | "vendor")) => field,
            _ => "created_ms",
        };
        let descending = args.sort_dir.as_deref() != Some("asc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "purchase_orders",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn receive_goods(
        &mut self,
        args: ReceiveGoodsArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let po = self
            .pos
            .get_mut(&args.po_id)
            .ok_or_else(|| unknown_po(&args.po_id))?;
        let ordered: BTreeMap<String, i64> = po
            .lines
            .iter()
            .map(|line| (line.item_id.clone(), line.qty))
            .collect();
        let mut received = po.received_qty_by_item.clone();
        let mut receipt_lines = Vec::new();
        for line in &args.lines {
            let item_id = match &line.item_id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let Some(ordered_qty) = ordered.get(&item_id) else {
                return Err(FabricError::new(
                    "unknown_item",
                    format!("item {item_id} is not present on PO {}", args.po_id),
                ));
            };
            let new_total = received.get(&item_id).copied().unwrap_or(0) + line.qty;
            if new_total > *ordered_qty {
                return Err(FabricError::new(
                    "qty_exceeds_po",
                    format!(
                        "received qty for {item_id} exceeds ordered qty on {}",
                        args.po_id
                    ),
                ));
            }
            received.insert(item_id.clone(), new_total);
            receipt_lines.push((item_id, line.qty));
        }

        let receipt_id = format!("RCPT-{}", self.receipt_seq);
        self.receipt_seq += 1;
        self.receipts.insert(
            receipt_id.clone(),
            GoodsReceipt {
                id: receipt_id.clone(),
                po_id: args.po_id.clone(),
                lines: receipt_lines,
                time_ms: ctx.now_ms,
            },
        );
        let all_received = ordered
            .iter()
            .all(|(item_id, qty)| received.get(item_id).copied().unwrap_or(0) >= *qty);
        po.received_qty_by_item = received;
        po.status = if all_received {
            "RECEIVED".to_string()
        } else {
            "PARTIALLY_RECEIVED".to_string()
        };
        po.updated_ms = ctx.now_ms;
        Ok(json!({"id": receipt_id, "po_status": po.status}))
    }

    fn submit_invoice(
        &mut self,
        args: SubmitInvoiceArgs,
        ctx: &mut TwinContext<'_>,
    ) -> FabricResult<Value> {
        let po = self
            .pos
            .get_mut(&args.po_id)
            .ok_or_else(|| unknown_po(&args.po_id))?;
        if po.vendor.trim().to_lowercase() != args.vendor.trim().to_lowercase() {
            return Err(FabricError::new(
                "vendor_mismatch",
                format!(
                    "invoice vendor {} does not match PO vendor {}",
                    args.vendor, po.vendor
                ),
            ));
        }
        if self.error_rate > 0.0 && ctx.next_f64() < self.error_rate {
            return Err(FabricError::new(
                "validation_error",
                "duplicate invoice number or invalid tax",
            ));
        }
        let lines = Self::build_lines(&args.lines);
        let amount_cents: i64 = lines.iter().map(Line::amount_cents).sum();
        let id = format!("INV-{}", self.invoice_seq);
        self.invoice_seq += 1;
        self.invoices.insert(
            id.clone(),
            Invoice {
                id: id.clone(),
                po_id: args.po_id.clone(),
                vendor: args.vendor,
                status: "OPEN".to_string(),
                lines,
                amount_cents,
                paid_cents: 0,
                time_ms: ctx.now_ms,
                updated_ms: ctx.now_ms,
            },
        );
        po.status = "INVOICED".to_string();
        po.updated_ms = ctx.now_ms;
        Ok(json!({"id": id, "amount": cents_to_money(amount_cents)}))
    }

    fn get_invoice(&self, args: &IdArgs) -> FabricResult<Value> {
        self.invoices
            .get(&args.id)
            .map(Invoice::payload)
            .ok_or_else(|| unknown_invoice(&args.id))
    }

    fn list_invoices(&self, args: ListInvoicesArgs) -> FabricResult<Value> {
        let wanted_status = args.status.as_deref().map(str::to_uppercase);
        let vendor_needle = args.vendor.as_deref().map(str::to_lowercase);
        let mut rows: Vec<Value> = self
            .invoices
            .values()
            .filter(|invoice| {
                wanted_status
                    .as_ref()
                    .is_none_or(|status| &invoice.status == status)
                    && vendor_needle
                        .as_ref()
                        .is_none_or(|needle| invoice.vendor.to_lowercase().contains(needle))
                    && args.po_id.as_ref().is_none_or(|po| &invoice.po_id == po)
            })
            .map(Invoice::payload)
            .collect();
        let sort_field = match args.sort_by.as_deref() {
            Some(field @ ("time_ms" | "amount" | "vendor")) => field,
            _ => "updated_ms",
        };
        let descending = args.sort_dir.as_deref() != Some("asc");
        page::sort_rows(&mut rows, sort_field, descending);
        if args.legacy && args.limit.is_none() && args.cursor.is_none() {
            return Ok(Value::Array(rows));
        }
        page::paginate(
            rows,
            "invoices",
            args.limit,
            args.cursor.as_deref(),
            "invalid_cursor",
        )
    }

    fn match_three_way(&mut self, args: MatchArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        let invoice = self
            .invoices
            .get(&args.invoice_id)
            .ok_or_else(|| FabricError::new("unknown_ref", "PO or invoice not found"))?
            .clone();
        let receipt = match &args.receipt_id {
            Some(id) => Some(
                self.receipts
                    .get(id)
                    .ok_or_else(|| {
                        FabricError::new("unknown_receipt", format!("no such receipt: {id}"))
                    })?
                    .clone(),
            ),
            None => None,
        };
        let po = self
            .pos
            .get_mut(&args.po_id)
            .ok_or_else(|| FabricError::new("unknown_ref", "PO or invoice not found"))?;

        let po_qty: BTreeMap<String, i64> = po
            .lines
            .iter()
            .map(|line| (line.item_id.clone(), line.qty))
            .collect();
        let inv_qty: BTreeMap<String, i64> = invoice
            .lines
            .iter()
            .map(|line| (line.item_id.clone(), line.qty))
            .collect();
        let rcpt_qty: BTreeMap<String, i64> = receipt
            .as_ref()
            .map(|rcpt| rcpt.lines.iter().cloned().collect())
            .unwrap_or_default();

        let amount_ok = (po.amount_cents - invoice.amount_cents).abs() <= 1;
        let mut qty_mismatches = Vec::new();
        let mut items: Vec<&String> = po_qty.keys().chain(inv_qty.keys()).collect();
        items.sort();
        items.dedup();
        for item in items {
            let pq = po_qty.get(item).copied().unwrap_or(0);
            let iq = inv_qty.get(item).copied().unwrap_or(0);
            let rq = rcpt_qty.get(item).copied().unwrap_or(0);
            if pq != iq || (receipt.is_some() && iq > rq) {
                qty_mismatches.push(json!({
                    "item_id": item,
                    "po": pq,
                    "invoice": iq,
                    "received": rq,
                }));
            }
        }
        let status = if amount_ok && qty_mismatches.is_empty() {
            "MATCH"
        } else {
            "MISMATCH"
        };
        po.last_three_way_match = Some(json!({
            "invoice_id": args.invoice_id,
            "receipt_id": args.receipt_id,
            "status": status,
            "time_ms": ctx.now_ms,
        }));
        po.updated_ms = ctx.now_ms;
        Ok(json!({
            "status": status,
            "amount_ok": amount_ok,
            "qty_mismatches": qty_mismatches,
            "po_id": args.po_id,
            "invoice_id": args.invoice_id,
            "receipt_id": args.receipt_id,
        }))
    }

    fn post_payment(&mut self, args: PostPaymentArgs, ctx: &mut TwinContext<'_>) -> FabricResult<Value> {
        if self.error_rate > 0.0 && ctx.next_f64() < self.error_rate / 2.0 {
            return Err(FabricError::new("payment_rejected", "bank rejected payment"));
        }
        let invoice = self
            .invoices
            .get_mut(&args.invoice_id)
            .ok_or_else(|| unknown_invoice(&args.invoice_id))?;
        let paid = invoice.paid_cents + money_to_cents(&args.amount);
        invoice.paid_cents = paid.min(invoice.amount_cents);
        invoice.updated_ms = ctx.now_ms;
        invoice.status = if paid >= invoice.amount_cents {
            "PAID".to_string()
        } else if paid > 0 {
            "PARTIALLY_PAID".to_string()
        } else {
            invoice.status.clone()
        };
        Ok(json!({
            "status": invoice.status,
            "paid_amount": cents_to_money(invoice.paid_cents),
        }))
    }

    /// One-line summary for observations.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "ERP: {} POs, {} invoices",
            self.pos.len(),
            self.invoices.len()
        )
    }

    /// Compact state digest.
    #[must_use]
    pub fn digest(&self) -> Value {
        json!({
            "po_count": self.pos.len(),
            "invoice_count": self.invoices.len(),
            "receipt_count": self.receipts.len(),
        })
    }
}

fn unknown_po(id: &str) -> FabricError {
    FabricError::new("unknown_po", format!("no such PO: {id}"))
}

fn unknown_invoice(id: &str) -> FabricError {
    FabricError::new("unknown_invoice", format!("no such invoice: {id}"))
}

// ============================================================================
// SECTION: Tool Specs
// ============================================================================

/// Tool specs exposed by the ERP twin.
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new("erp.create_po", "Create a purchase order.")
            .with_permissions(&["erp:write"])
            .with_side_effects(&["erp_mutation"])
            .with_latency(350, 110),
        ToolSpec::new("erp.get_po", "Get a PO by id.")
            .with_permissions(&["erp:read"])
            .with_latency(160, 50),
        ToolSpec::new("erp.list_pos", "List purchase orders.")
            .with_permissions(&["erp:read"])
            .with_latency(180, 60),
        ToolSpec::new("erp.receive_goods", "Receive goods against a PO.")
            .with_permissions(&["erp:write"])
            .with_side_effects(&["erp_mutation"])
            .with_latency(320, 100),
        ToolSpec::new("erp.submit_invoice", "Submit a vendor invoice for a PO.")
            .with_permissions(&["erp:write"])
            .with_side_effects(&["erp_mutation"])
            .with_latency(340, 110),
        ToolSpec::new("erp.get_invoice", "Get an invoice by id.")
            .with_permissions(&["erp:read"])
            .with_latency(160, 50),
        ToolSpec::new("erp.list_invoices", "List invoices.")
            .with_permissions(&["erp:read"])
            .with_latency(180, 60),
        ToolSpec::new("erp.match_three_way", "Three-way match PO vs receipt vs invoice.")
            .with_permissions(&["erp:write"])
            .with_side_effects(&["erp_mutation"])
            .with_latency(300, 90),
        ToolSpec::new("erp.post_payment", "Post a payment against an invoice.")
            .with_permissions(&["erp:write"])
            .with_side_effects(&["erp_mutation", "money_movement"])
            .with_latency(380, 120),
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

    fn create_po(twin: &mut ErpTwin, ctx: &mut TwinContext<'_>) -> String {
        let created = twin
            .dispatch(
                "create_po",
                &args(json!({
                    "vendor": "MacroCompute",
                    "currency": "USD",
                    "lines": [
                        {"item_id": "LAPTOP-15", "desc": "laptops", "qty": 2, "unit_price": 1000}
                    ],
                })),
                ctx,
            )
            .unwrap();
        created["id"].as_str().unwrap().to_string()
    }

    #[test]
    fn po_amount_is_the_cent_sum_of_its_lines() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let created = twin
            .dispatch(
                "create_po",
                &args(json!({
                    "vendor": "MacroCompute",
                    "currency": "USD",
                    "lines": [
                        {"item_id": "A", "qty": 3, "unit_price": 19.99},
                        {"item_id": "B", "qty": 1, "unit_price": 0.03},
                    ],
                })),
                &mut ctx,
            )
            .unwrap();
        // 3 * 1999 + 3 = 6000 cents.
        assert!((created["amount"].as_f64().unwrap() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn full_procure_to_pay_flow_matches_and_pays() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let po_id = create_po(&mut twin, &mut ctx);

        let receipt = twin
            .dispatch(
                "receive_goods",
                &args(json!({"po_id": po_id, "lines": [{"item_id": "LAPTOP-15", "qty": 2}]})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(receipt["po_status"], "RECEIVED");

        let invoice = twin
            .dispatch(
                "submit_invoice",
                &args(json!({
                    "vendor": "MacroCompute",
                    "po_id": po_id,
                    "lines": [{"item_id": "LAPTOP-15", "qty": 2, "unit_price": 1000}],
                })),
                &mut ctx,
            )
            .unwrap();

        let matched = twin
            .dispatch(
                "match_three_way",
                &args(json!({
                    "po_id": po_id,
                    "invoice_id": invoice["id"],
                    "receipt_id": receipt["id"],
                })),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(matched["status"], "MATCH");
        assert_eq!(matched["amount_ok"], true);

        let paid = twin
            .dispatch(
                "post_payment",
                &args(json!({"invoice_id": invoice["id"], "amount": 2000})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(paid["status"], "PAID");
        assert!((paid["paid_amount"].as_f64().unwrap() - 2000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn over_receipt_is_rejected() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let po_id = create_po(&mut twin, &mut ctx);
        let err = twin
            .dispatch(
                "receive_goods",
                &args(json!({"po_id": po_id, "lines": [{"item_id": "LAPTOP-15", "qty": 3}]})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "qty_exceeds_po");

        let err = twin
            .dispatch(
                "receive_goods",
                &args(json!({"po_id": po_id, "lines": [{"item_id": "MOUSE-1", "qty": 1}]})),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "unknown_item");
    }

    #[test]
    fn vendor_mismatch_blocks_invoicing() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let po_id = create_po(&mut twin, &mut ctx);
        let err = twin
            .dispatch(
                "submit_invoice",
                &args(json!({
                    "vendor": "SomeoneElse",
                    "po_id": po_id,
                    "lines": [{"item_id": "LAPTOP-15", "qty": 2, "unit_price": 1000}],
                })),
                &mut ctx,
            )
            .unwrap_err();
        assert_eq!(err.code, "vendor_mismatch");
    }

    #[test]
    fn mismatched_quantities_surface_in_the_match_report() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let po_id = create_po(&mut twin, &mut ctx);
        let invoice = twin
            .dispatch(
                "submit_invoice",
                &args(json!({
                    "vendor": "MacroCompute",
                    "po_id": po_id,
                    "lines": [{"item_id": "LAPTOP-15", "qty": 1, "unit_price": 1000}],
                })),
                &mut ctx,
            )
            .unwrap();
        let matched = twin
            .dispatch(
                "match_three_way",
                &args(json!({"po_id": po_id, "invoice_id": invoice["id"]})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(matched["status"], "MISMATCH");
        assert_eq!(matched["qty_mismatches"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn payments_clamp_at_the_invoice_amount() {
        let mut twin = ErpTwin::new(0.0);
        let mut rng = DeterministicRng::from_seed(1);
        let mut ctx = TwinContext::new(0, &mut rng);
        let po_id = create_po(&mut twin, &mut ctx);
        let invoice = twin
            .dispatch(
                "submit_invoice",
                &args(json!({
                    "vendor": "MacroCompute",
                    "po_id": po_id,
                    "lines": [{"item_id": "LAPTOP-15", "qty": 2, "unit_price": 1000}],
                })),
                &mut ctx,
            )
            .unwrap();
        let partial = twin
            .dispatch(
                "post_payment",
                &args(json!({"invoice_id": invoice["id"], "amount": 500})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(partial["status"], "PARTIALLY_PAID");
        let over = twin
            .dispatch(
                "post_payment",
                &args(json!({"invoice_id": invoice["id"], "amount": 10_000})),
                &mut ctx,
            )
            .unwrap();
        assert_eq!(over["status"], "PAID");
        assert!((over["paid_amount"].as_f64().unwrap() - 2000.0).abs() < f64::EPSILON);
    }
}
