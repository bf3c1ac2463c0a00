//! # Landed Cost Calculator
//!
//! Weighted-average landed cost per unit (box) and per area unit (sqft),
//! computed from a SKU's receipt history.
//!
//! ## Per-Receipt Math
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base       = per_unit_value            if > 0                          │
//! │             = per_area_value × factor   else if > 0                     │
//! │             = 0                                                         │
//! │                                                                         │
//! │  damaged    = damaged_units + damaged_area / factor                     │
//! │  good_units = max(0, quantity_in − damaged)                             │
//! │                                                                         │
//! │  transport  = base × transport_pct / 100        (pct amount)            │
//! │             + transport_per_unit                (adder)                 │
//! │             + transport_total / good_units      (allocation, 0 if no    │
//! │                                                  good units)            │
//! │                                                                         │
//! │  landed     = base + transport                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Aggregate
//! `total_paid = Σ landed × good_units`, `avg = total_paid / Σ good_units`.
//! The average multiplied back by the good units reproduces `total_paid`
//! (relative error ≤ 1e-6), so cost is conserved across the history.
//!
//! ## As-Of Selection
//! With a reference date, only priced receipts (base > 0) dated on or
//! before it count. Undated receipts always count. When that selection
//! holds no good units every priced receipt is used instead and the result
//! says so. Unpriced receipts still count toward the lifetime average.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{effective_factor, Receipt, Sku};

// =============================================================================
// Modes & Sources
// =============================================================================

/// How much detail a cost resolution carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CostMode {
    /// Unit cost only.
    #[default]
    Simple,
    /// Unit cost plus the four-way component breakdown.
    Detailed,
}

/// Where a resolved cost came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CostSource {
    /// Receipts dated on or before the reference date.
    AsOf,
    /// Whole history; no reference date was given.
    Lifetime,
    /// A reference date was given but nothing usable was on or before it.
    FallbackLifetime,
    /// No receipt contributed a good unit.
    NoPurchaseHistory,
    /// Stock was received but none of it carries a unit or area price.
    NoPricedReceipts,
    /// Unit cost captured on the sale line when the invoice was posted.
    SaleSnapshot,
}

impl CostSource {
    /// Short human-readable reason, shown next to zero or fallback costs.
    pub fn reason(&self) -> &'static str {
        match self {
            CostSource::AsOf => "as-of receipts",
            CostSource::Lifetime => "lifetime average",
            CostSource::FallbackLifetime => "no receipts on or before date; lifetime average used",
            CostSource::NoPurchaseHistory => "no purchase history",
            CostSource::NoPricedReceipts => "no priced receipts",
            CostSource::SaleSnapshot => "cost captured at sale",
        }
    }
}

// =============================================================================
// Per-Receipt Cost
// =============================================================================

/// Cost figures for a single receipt, also used as the audit breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptCost {
    pub receipt_id: i64,
    pub base: f64,
    pub transport_pct_amount: f64,
    pub transport_adder: f64,
    pub transport_allocation: f64,
    pub landed_unit_cost: f64,
    /// Units lost to damage, area damage converted to units.
    pub damaged_units_total: f64,
    pub good_units: f64,
    /// `landed_unit_cost × good_units`.
    pub total_value: f64,
    /// `landed_unit_cost × damaged_units_total`.
    pub damage_cost: f64,
    /// Damage as a share of quantity in (%), 0 for an empty receipt.
    pub damage_pct: f64,
    /// Transport as a share of base (%), 0 when base is 0.
    pub transport_pct_of_base: f64,
}

impl ReceiptCost {
    #[inline]
    pub fn transport(&self) -> f64 {
        self.transport_pct_amount + self.transport_adder + self.transport_allocation
    }
}

/// Computes the landed cost of one receipt under the given conversion
/// factor. The factor fallback is applied here.
pub fn receipt_cost(receipt: &Receipt, conversion_factor: f64) -> ReceiptCost {
    let factor = effective_factor(conversion_factor);

    let base = if receipt.per_unit_value > 0.0 {
        receipt.per_unit_value
    } else if receipt.per_area_value > 0.0 {
        receipt.per_area_value * factor
    } else {
        0.0
    };

    let damaged_units_total = receipt.damaged_units + receipt.damaged_area / factor;
    let good_units = (receipt.quantity_in - damaged_units_total).max(0.0);

    let transport_pct_amount = base * receipt.transport_pct / 100.0;
    let transport_adder = receipt.transport_per_unit;
    let transport_allocation = if good_units > 0.0 {
        receipt.transport_total / good_units
    } else {
        0.0
    };

    let landed_unit_cost = base + transport_pct_amount + transport_adder + transport_allocation;
    let transport = landed_unit_cost - base;

    ReceiptCost {
        receipt_id: receipt.id,
        base,
        transport_pct_amount,
        transport_adder,
        transport_allocation,
        landed_unit_cost,
        damaged_units_total,
        good_units,
        total_value: landed_unit_cost * good_units,
        damage_cost: landed_unit_cost * damaged_units_total,
        damage_pct: ratio_pct(damaged_units_total, receipt.quantity_in),
        transport_pct_of_base: ratio_pct(transport, base),
    }
}

fn ratio_pct(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

// =============================================================================
// Aggregate Basis
// =============================================================================

/// Good-unit-weighted totals over a set of receipts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostBasis {
    pub receipts: usize,
    pub total_good_units: f64,
    pub total_paid: f64,
    weighted_base: f64,
    weighted_pct_amount: f64,
    weighted_adder: f64,
    weighted_allocation: f64,
}

impl CostBasis {
    /// Folds receipts into a basis.
    pub fn from_receipts<'a>(
        receipts: impl IntoIterator<Item = &'a Receipt>,
        conversion_factor: f64,
    ) -> Self {
        receipts
            .into_iter()
            .map(|r| receipt_cost(r, conversion_factor))
            .fold(CostBasis::default(), |mut acc, rc| {
                acc.receipts += 1;
                acc.total_good_units += rc.good_units;
                acc.total_paid += rc.total_value;
                acc.weighted_base += rc.base * rc.good_units;
                acc.weighted_pct_amount += rc.transport_pct_amount * rc.good_units;
                acc.weighted_adder += rc.transport_adder * rc.good_units;
                acc.weighted_allocation += rc.transport_allocation * rc.good_units;
                acc
            })
    }

    /// True when at least one good unit exists to average over.
    #[inline]
    pub fn has_units(&self) -> bool {
        self.total_good_units > 0.0
    }

    /// `total_paid / total_good_units`, or 0 with no good units.
    pub fn avg_cost_per_unit(&self) -> f64 {
        self.per_good_unit(self.total_paid)
    }

    /// Component averages. They add up to [`Self::avg_cost_per_unit`] up to
    /// floating point error.
    pub fn breakdown(&self) -> CostBreakdown {
        CostBreakdown {
            base: self.per_good_unit(self.weighted_base),
            transport_pct_amount: self.per_good_unit(self.weighted_pct_amount),
            transport_adder: self.per_good_unit(self.weighted_adder),
            transport_allocation: self.per_good_unit(self.weighted_allocation),
        }
    }

    fn per_good_unit(&self, weighted: f64) -> f64 {
        if self.has_units() {
            weighted / self.total_good_units
        } else {
            0.0
        }
    }
}

/// Average unit cost split into its four sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostBreakdown {
    pub base: f64,
    pub transport_pct_amount: f64,
    pub transport_adder: f64,
    pub transport_allocation: f64,
}

impl CostBreakdown {
    #[inline]
    pub fn total(&self) -> f64 {
        self.base + self.transport_pct_amount + self.transport_adder + self.transport_allocation
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// A resolved cost for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CostResolution {
    pub sku_id: i64,
    /// Cost per sellable unit (box / piece).
    pub unit_cost: f64,
    /// Cost per area unit (sqft). Equals `unit_cost` for factor-1 SKUs.
    pub area_cost: f64,
    /// Factor actually used, after fallback.
    pub conversion_factor: f64,
    pub source: CostSource,
    pub receipts_used: usize,
    pub good_units: f64,
    pub total_paid: f64,
    /// Present in [`CostMode::Detailed`].
    pub breakdown: Option<CostBreakdown>,
    /// Set whenever `unit_cost` is zero.
    pub warning: Option<String>,
}

/// Resolves the landed cost of `sku` from its receipts.
///
/// `receipts` may contain rows for other SKUs; they are ignored.
///
/// ## Detailed Mode
/// The unit cost reported is the sum of the breakdown components so the
/// four figures add up exactly to what the caller displays.
pub fn resolve_cost(
    sku: &Sku,
    receipts: &[Receipt],
    as_of: Option<NaiveDate>,
    mode: CostMode,
) -> CostResolution {
    let factor = sku.effective_factor();
    let sku_id = sku.id;
    let own = move || receipts.iter().filter(move |r| r.sku_id == sku_id);

    let (basis, source) = match as_of {
        None => (CostBasis::from_receipts(own(), factor), CostSource::Lifetime),
        Some(date) => {
            let priced = move || own().filter(move |r| receipt_cost(r, factor).base > 0.0);
            let dated = CostBasis::from_receipts(
                priced().filter(|r| r.receipt_date.map_or(true, |d| d <= date)),
                factor,
            );
            if dated.has_units() {
                (dated, CostSource::AsOf)
            } else {
                (CostBasis::from_receipts(priced(), factor), CostSource::FallbackLifetime)
            }
        }
    };

    let source = if basis.has_units() {
        source
    } else if as_of.is_some() && CostBasis::from_receipts(own(), factor).has_units() {
        CostSource::NoPricedReceipts
    } else {
        CostSource::NoPurchaseHistory
    };

    let breakdown = match mode {
        CostMode::Simple => None,
        CostMode::Detailed => Some(basis.breakdown()),
    };
    let unit_cost = match breakdown {
        Some(b) => b.total(),
        None => basis.avg_cost_per_unit(),
    };

    let warning = if unit_cost == 0.0 {
        Some(format!("{}: cost is zero ({})", sku.code, source.reason()))
    } else {
        None
    };

    CostResolution {
        sku_id: sku.id,
        unit_cost,
        area_cost: unit_cost / factor,
        conversion_factor: factor,
        source,
        receipts_used: basis.receipts,
        good_units: basis.total_good_units,
        total_paid: basis.total_paid,
        breakdown,
        warning,
    }
}

/// Per-receipt audit rows for a SKU, in the order given.
pub fn receipt_breakdown(sku: &Sku, receipts: &[Receipt]) -> Vec<ReceiptCost> {
    let factor = sku.effective_factor();
    receipts
        .iter()
        .filter(|r| r.sku_id == sku.id)
        .map(|r| receipt_cost(r, factor))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
