//! # Sales Returns
//!
//! Clamps requested return quantities against what is still returnable on
//! each sale line and totals the accepted lines.
//!
//! ```text
//! remaining = max(0, sold − already_returned)
//! accepted  = min(max(requested, 0), remaining)      accepted = 0 → line skipped
//! subtotal  = Σ rate × accepted
//! gst       = subtotal × gst%   (EXCLUDE invoices only)
//! total     = subtotal + gst
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{GstMode, Percent};

/// A sale line as seen by the returns desk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnableLine {
    pub sale_line_id: i64,
    pub sku_id: i64,
    pub sold: f64,
    pub already_returned: f64,
    pub rate: f64,
}

impl ReturnableLine {
    #[inline]
    pub fn remaining(&self) -> f64 {
        (self.sold - self.already_returned).max(0.0)
    }
}

/// Accepted quantity for one request.
///
/// Never negative, never more than what is left on the line.
pub fn clamp_return_qty(requested: f64, sold: f64, already_returned: f64) -> f64 {
    let remaining = (sold - already_returned).max(0.0);
    if !requested.is_finite() {
        return 0.0;
    }
    requested.max(0.0).min(remaining)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AcceptedReturnLine {
    pub sale_line_id: i64,
    pub sku_id: i64,
    pub requested: f64,
    pub qty: f64,
    pub rate: f64,
    pub line_total: Money,
}

/// Matches requests to returnable lines.
///
/// Requests for ids not in `lines` are returned separately so the caller can
/// reject them; lines that clamp to zero are dropped.
pub fn plan_return(
    lines: &[ReturnableLine],
    requests: &[(i64, f64)],
) -> (Vec<AcceptedReturnLine>, Vec<i64>) {
    let mut accepted: Vec<AcceptedReturnLine> = Vec::new();
    let mut unknown = Vec::new();

    for &(sale_line_id, requested) in requests {
        let Some(line) = lines.iter().find(|l| l.sale_line_id == sale_line_id) else {
            unknown.push(sale_line_id);
            continue;
        };

        // Earlier requests in the same batch count against the line too.
        let pending: f64 = accepted
            .iter()
            .filter(|a| a.sale_line_id == sale_line_id)
            .map(|a| a.qty)
            .sum();

        let qty = clamp_return_qty(requested, line.sold, line.already_returned + pending);
        if qty <= 0.0 {
            continue;
        }

        accepted.push(AcceptedReturnLine {
            sale_line_id,
            sku_id: line.sku_id,
            requested,
            qty,
            rate: line.rate,
            line_total: Money::from_rupees(line.rate * qty),
        });
    }

    (accepted, unknown)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnTotals {
    pub subtotal: Money,
    pub gst: Money,
    pub total: Money,
}

pub fn return_totals(lines: &[AcceptedReturnLine], mode: GstMode, gst_rate: Percent) -> ReturnTotals {
    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let gst = match mode {
        GstMode::Exclude => subtotal.percent_of(gst_rate),
        GstMode::Include => Money::zero(),
    };
    ReturnTotals {
        subtotal,
        gst,
        total: subtotal + gst,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
