//! # Availability Resolver
//!
//! `available = good_units − sold + returned`, rounded to three decimals.
//!
//! The figure is NOT clamped. A negative value means more was invoiced than
//! was ever received in good condition, which somebody needs to look at.
//! Reports that must not show negatives call [`display_quantity`].

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::costing::CostBasis;
use crate::types::{Receipt, Sku};
use crate::QUANTITY_DECIMALS;

/// Lifetime movements for one SKU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockMovements {
    pub sold: f64,
    pub returned: f64,
}

/// Saleable quantity for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Availability {
    pub sku_id: i64,
    pub good_units: f64,
    pub sold: f64,
    pub returned: f64,
    /// May be negative.
    pub available: f64,
    /// `available` in area units (sqft).
    pub available_area: f64,
}

impl Availability {
    #[inline]
    pub fn is_oversold(&self) -> bool {
        self.available < 0.0
    }
}

/// Rounds a quantity to [`QUANTITY_DECIMALS`] places.
pub fn round_qty(qty: f64) -> f64 {
    let scale = 10f64.powi(QUANTITY_DECIMALS);
    (qty * scale).round() / scale
}

/// Clamp for display layers only.
#[inline]
pub fn display_quantity(qty: f64) -> f64 {
    qty.max(0.0)
}

/// Resolves availability from receipts and movements.
pub fn resolve_availability(
    sku: &Sku,
    receipts: &[Receipt],
    movements: StockMovements,
) -> Availability {
    let factor = sku.effective_factor();
    let basis = CostBasis::from_receipts(receipts.iter().filter(|r| r.sku_id == sku.id), factor);
    let available = round_qty(basis.total_good_units - movements.sold + movements.returned);

    Availability {
        sku_id: sku.id,
        good_units: round_qty(basis.total_good_units),
        sold: movements.sold,
        returned: movements.returned,
        available,
        available_area: round_qty(available * factor),
    }
}

// =============================================================================
// Inventory Summary
// =============================================================================

/// Stock and investment overview for one SKU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventorySummary {
    pub sku_id: i64,
    pub receipt_count: usize,
    pub quantity_received: f64,
    pub damaged_units: f64,
    pub good_units: f64,
    /// Σ landed cost × good units.
    pub total_investment: f64,
    pub good_area: f64,
    pub sold: f64,
    pub returned: f64,
    pub available: f64,
    /// `sold / good_units × 100`; 0 when nothing good was received.
    pub turnover_pct: f64,
}

pub fn summarize_inventory(
    sku: &Sku,
    receipts: &[Receipt],
    movements: StockMovements,
) -> InventorySummary {
    let factor = sku.effective_factor();
    let own: Vec<&Receipt> = receipts.iter().filter(|r| r.sku_id == sku.id).collect();

    let basis = CostBasis::from_receipts(own.iter().copied(), factor);
    let quantity_received: f64 = own.iter().map(|r| r.quantity_in).sum();
    let damaged_units: f64 = own
        .iter()
        .map(|r| r.damaged_units + r.damaged_area / factor)
        .sum();

    let turnover_pct = if basis.total_good_units > 0.0 {
        movements.sold / basis.total_good_units * 100.0
    } else {
        0.0
    };

    InventorySummary {
        sku_id: sku.id,
        receipt_count: own.len(),
        quantity_received,
        damaged_units,
        good_units: round_qty(basis.total_good_units),
        total_investment: basis.total_paid,
        good_area: round_qty(basis.total_good_units * factor),
        sold: movements.sold,
        returned: movements.returned,
        available: round_qty(basis.total_good_units - movements.sold + movements.returned),
        turnover_pct,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkuKind;

    fn sku() -> Sku {
        Sku::new(1, SkuKind::Tile, "GVT-600", "Glazed vitrified", 10.0)
    }

    fn receipts() -> Vec<Receipt> {
        vec![Receipt {
            id: 1,
            quantity_in: 100.0,
            damaged_units: 5.0,
            per_unit_value: 200.0,
            ..Receipt::for_sku(1)
        }]
    }

    #[test]
    fn test_sold_and_returned_adjust_good_units() {
        let avail = resolve_availability(
            &sku(),
            &receipts(),
            StockMovements {
                sold: 60.0,
                returned: 5.0,
            },
        );
        assert_eq!(avail.good_units, 95.0);
        assert_eq!(avail.available, 40.0);
        assert_eq!(avail.available_area, 400.0);
        assert!(!avail.is_oversold());
    }

    #[test]
    fn test_oversold_is_not_clamped() {
        let avail = resolve_availability(
            &sku(),
            &receipts(),
            StockMovements {
                sold: 100.0,
                returned: 0.0,
            },
        );
        assert_eq!(avail.available, -5.0);
        assert!(avail.is_oversold());
        assert_eq!(display_quantity(avail.available), 0.0);
    }

    #[test]
    fn test_rounding_to_three_places() {
        assert_eq!(round_qty(1.23456), 1.235);
        assert_eq!(round_qty(-0.0004), -0.0);
    }

    #[test]
    fn test_no_receipts_gives_negative_of_sales() {
        let avail = resolve_availability(
            &sku(),
            &[],
            StockMovements {
                sold: 2.5,
                returned: 0.0,
            },
        );
        assert_eq!(avail.available, -2.5);
    }

    #[test]
    fn test_inventory_summary_turnover() {
        let summary = summarize_inventory(
            &sku(),
            &receipts(),
            StockMovements {
                sold: 19.0,
                returned: 0.0,
            },
        );
        assert_eq!(summary.receipt_count, 1);
        assert_eq!(summary.quantity_received, 100.0);
        assert_eq!(summary.damaged_units, 5.0);
        assert_eq!(summary.good_area, 950.0);
        assert!((summary.total_investment - 19_000.0).abs() < 1e-9);
        assert!((summary.turnover_pct - 20.0).abs() < 1e-9);
        assert_eq!(summary.available, 76.0);
    }
}
