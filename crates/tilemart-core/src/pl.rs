//! # Profit & Margin
//!
//! Line-level and document-level profit, plus the negotiation preview used
//! while a quotation is being haggled over.
//!
//! ## Formulas
//! ```text
//! revenue  = rate × qty
//! cost     = unit_cost × qty
//! profit   = revenue − cost
//! raw %    = profit / revenue × 100           (0 when revenue is 0)
//! adj %    = max(0, raw % − 15)
//! ```
//! Document totals sum revenue and cost first, then apply the same margin
//! formulas to the totals (not an average of line margins).

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::costing::{CostResolution, CostSource};
use crate::money::Money;
use crate::types::Percent;
use crate::ADJUSTED_MARGIN_MARKDOWN_POINTS;

/// `profit / revenue × 100`, or 0 for zero revenue.
pub fn margin_pct(profit: f64, revenue: f64) -> f64 {
    if revenue != 0.0 {
        profit / revenue * 100.0
    } else {
        0.0
    }
}

/// Raw margin less [`ADJUSTED_MARGIN_MARKDOWN_POINTS`], floored at zero.
pub fn adjusted_margin_pct(raw_margin_pct: f64) -> f64 {
    (raw_margin_pct - ADJUSTED_MARGIN_MARKDOWN_POINTS).max(0.0)
}

// =============================================================================
// Line P&L
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LinePl {
    pub sku_id: i64,
    pub qty: f64,
    pub rate: f64,
    pub unit_cost: f64,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub raw_margin_pct: f64,
    pub adjusted_margin_pct: f64,
    pub cost_source: CostSource,
    pub warning: Option<String>,
}

/// Computes P&L for one line from an already-resolved cost.
pub fn line_pl(qty: f64, rate: f64, cost: &CostResolution) -> LinePl {
    line_pl_with_unit_cost(cost.sku_id, qty, rate, cost.unit_cost, cost.source, cost.warning.clone())
}

/// Same as [`line_pl`] for callers that hold a cost snapshot instead of a
/// fresh resolution.
pub fn line_pl_with_unit_cost(
    sku_id: i64,
    qty: f64,
    rate: f64,
    unit_cost: f64,
    cost_source: CostSource,
    warning: Option<String>,
) -> LinePl {
    let revenue = rate * qty;
    let cost = unit_cost * qty;
    let profit = revenue - cost;
    let raw = margin_pct(profit, revenue);

    LinePl {
        sku_id,
        qty,
        rate,
        unit_cost,
        revenue,
        cost,
        profit,
        raw_margin_pct: raw,
        adjusted_margin_pct: adjusted_margin_pct(raw),
        cost_source,
        warning,
    }
}

// =============================================================================
// Document Summary
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlSummary {
    pub lines: Vec<LinePl>,
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    pub raw_margin_pct: f64,
    pub adjusted_margin_pct: f64,
    /// One entry per line whose unit cost came out as zero.
    pub warnings: Vec<String>,
}

impl PlSummary {
    pub fn from_lines(lines: Vec<LinePl>) -> Self {
        let revenue: f64 = lines.iter().map(|l| l.revenue).sum();
        let cost: f64 = lines.iter().map(|l| l.cost).sum();
        let profit = revenue - cost;
        let raw = margin_pct(profit, revenue);
        let warnings = lines.iter().filter_map(|l| l.warning.clone()).collect();

        PlSummary {
            lines,
            revenue,
            cost,
            profit,
            raw_margin_pct: raw,
            adjusted_margin_pct: adjusted_margin_pct(raw),
            warnings,
        }
    }
}

// =============================================================================
// Negotiation Preview
// =============================================================================

/// How a negotiated discount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "mode", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Discount {
    #[default]
    None,
    /// Percentage of the gross sale.
    Pct(f64),
    /// Flat rupee amount.
    Amt(f64),
}

/// What the salesperson's commission is computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionBasis {
    /// Profit after discount, floored at zero.
    #[default]
    Profit,
    /// Net sale after discount.
    Sale,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NegotiationTerms {
    pub discount: Discount,
    pub basis: CommissionBasis,
    pub commission_pct: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NegotiationOutcome {
    pub gross_sale: f64,
    pub total_cost: f64,
    /// Clamped to `[0, gross_sale]`.
    pub discount: f64,
    pub net_sale: f64,
    pub profit_before_discount: f64,
    pub profit_after_discount: f64,
    pub commission_base: f64,
    pub commission: Money,
    pub profit_after_commission: f64,
    pub margin_after_commission_pct: f64,
}

/// Applies a discount and a commission rule to a quotation's P&L.
pub fn negotiate(summary: &PlSummary, terms: &NegotiationTerms) -> NegotiationOutcome {
    let gross_sale = summary.revenue;
    let total_cost = summary.cost;

    let requested = match terms.discount {
        Discount::None => 0.0,
        Discount::Pct(pct) => gross_sale * pct / 100.0,
        Discount::Amt(amount) => amount,
    };
    let discount = if requested.is_finite() {
        requested.clamp(0.0, gross_sale.max(0.0))
    } else {
        0.0
    };

    let net_sale = gross_sale - discount;
    let profit_before_discount = gross_sale - total_cost;
    let profit_after_discount = net_sale - total_cost;

    let commission_base = match terms.basis {
        CommissionBasis::Profit => profit_after_discount.max(0.0),
        CommissionBasis::Sale => net_sale,
    };
    let commission =
        Money::from_rupees(commission_base * terms.commission_pct.percentage() / 100.0);
    let profit_after_commission = profit_after_discount - commission.as_rupees();

    NegotiationOutcome {
        gross_sale,
        total_cost,
        discount,
        net_sale,
        profit_before_discount,
        profit_after_discount,
        commission_base,
        commission,
        profit_after_commission,
        margin_after_commission_pct: margin_pct(profit_after_commission, net_sale),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
