//! # Domain Types
//!
//! Rows the engine reads and the one row it owns (the ledger entry).
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Sku ◄──── Receipt          (purchase history, immutable)               │
//! │   ▲                                                                     │
//! │   ├──── SaleLine ───► Invoice ───► Quotation (optional origin)          │
//! │   │        ▲                                                            │
//! │   │        └──── ReturnLine ───► ReturnHeader                           │
//! │   └──── QuotationLine ───► Quotation                                    │
//! │                                                                         │
//! │  CommissionRate (GLOBAL / USER / INVOICE / QUOTATION, append-only)      │
//! │  CommissionLedgerEntry (one per invoice, PENDING → APPROVED → PAID)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are SQLite rowids (`i64`). Quantities are `f64` boxes/units.
//! Stored money is integer paise (`*_paise`), percentages are basis points
//! (`*_bps`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;
use crate::DEFAULT_CONVERSION_FACTOR;

// =============================================================================
// Percent
// =============================================================================

/// A percentage in basis points (1 bp = 0.01%).
///
/// 250 bps = 2.5% commission, 1800 bps = 18% GST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Converts a human percentage (2.5) to basis points, rounding.
    /// Negative and non-finite input becomes zero.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return Percent(0);
        }
        Percent((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// The rate as a percentage (2.5 for 250 bps).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

// =============================================================================
// SKU
// =============================================================================

/// What kind of stock a SKU is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SkuKind {
    /// Sold by the box, priced by area (`conversion_factor` = sqft per box).
    Tile,
    /// Adhesives, grout, trims. Unit-priced, factor 1.
    Misc,
}

/// A stock-keeping unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sku {
    pub id: i64,
    pub kind: SkuKind,
    /// Business code printed on labels ("GVT-600").
    pub code: String,
    pub name: String,
    /// Area units per sellable unit (sqft per box). Misc items carry 1.
    pub conversion_factor: f64,
    /// "box", "bag", "pc"...
    pub unit_label: String,
}

impl Sku {
    /// Builds a SKU with the default unit label for its kind.
    pub fn new(
        id: i64,
        kind: SkuKind,
        code: impl Into<String>,
        name: impl Into<String>,
        conversion_factor: f64,
    ) -> Self {
        let unit_label = match kind {
            SkuKind::Tile => "box",
            SkuKind::Misc => "pc",
        };
        Sku {
            id,
            kind,
            code: code.into(),
            name: name.into(),
            conversion_factor,
            unit_label: unit_label.to_string(),
        }
    }

    /// The conversion factor with the fallback applied.
    ///
    /// Zero, negative or non-finite factors become
    /// [`DEFAULT_CONVERSION_FACTOR`] so nothing downstream divides by zero.
    pub fn effective_factor(&self) -> f64 {
        effective_factor(self.conversion_factor)
    }
}

/// Standalone form of [`Sku::effective_factor`].
pub fn effective_factor(raw: f64) -> f64 {
    if raw.is_finite() && raw > 0.0 {
        raw
    } else {
        DEFAULT_CONVERSION_FACTOR
    }
}

// =============================================================================
// Receipt
// =============================================================================

/// One purchase event for a SKU.
///
/// Transport may be given any combination of three ways: a percentage of
/// base, a flat fee per unit, and a lump sum spread over good units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receipt {
    pub id: i64,
    pub sku_id: i64,
    /// Undated receipts are treated as eligible for every as-of date.
    #[ts(as = "Option<String>")]
    pub receipt_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub quantity_in: f64,
    pub damaged_units: f64,
    /// Damage measured in area units (sqft); converted with the SKU factor.
    pub damaged_area: f64,
    pub per_unit_value: f64,
    pub per_area_value: f64,
    pub transport_pct: f64,
    pub transport_per_unit: f64,
    pub transport_total: f64,
}

impl Receipt {
    /// An all-zero receipt for `sku_id`, meant for struct-update syntax.
    pub fn for_sku(sku_id: i64) -> Self {
        Receipt {
            id: 0,
            sku_id,
            receipt_date: None,
            vendor: None,
            quantity_in: 0.0,
            damaged_units: 0.0,
            damaged_area: 0.0,
            per_unit_value: 0.0,
            per_area_value: 0.0,
            transport_pct: 0.0,
            transport_per_unit: 0.0,
            transport_total: 0.0,
        }
    }
}

// =============================================================================
// Quotations & Invoices
// =============================================================================

/// How GST relates to the line rates of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GstMode {
    /// Rates are net; GST is added on top of the subtotal.
    #[default]
    Exclude,
    /// Rates already include GST.
    Include,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Quotation {
    pub id: i64,
    pub quote_no: String,
    #[ts(as = "String")]
    pub quote_date: NaiveDate,
    pub salesperson_user_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct QuotationLine {
    pub id: i64,
    pub quotation_id: i64,
    pub sku_id: i64,
    pub qty: f64,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: i64,
    pub invoice_no: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    /// Quotation this invoice was converted from, if any.
    pub quotation_id: Option<i64>,
    pub salesperson_user_id: Option<i64>,
    pub gst_mode: GstMode,
    pub gst_rate_bps: u32,
}

impl Invoice {
    #[inline]
    pub fn gst_rate(&self) -> Percent {
        Percent::from_bps(self.gst_rate_bps)
    }
}

/// One invoiced line. Immutable once the invoice is posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleLine {
    pub id: i64,
    pub invoice_id: i64,
    pub sku_id: i64,
    pub qty: f64,
    pub rate: f64,
    /// Landed unit cost captured when the invoice was posted.
    pub cost_per_unit_at_sale: Option<f64>,
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnHeader {
    pub id: i64,
    pub return_no: String,
    pub invoice_id: i64,
    #[ts(as = "String")]
    pub return_date: NaiveDate,
    pub notes: Option<String>,
    pub gst_mode: GstMode,
    pub gst_rate_bps: u32,
    pub subtotal_paise: i64,
    pub gst_paise: i64,
    pub total_paise: i64,
}

impl ReturnHeader {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_paise(self.total_paise)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ReturnLine {
    pub id: i64,
    pub return_id: i64,
    pub sale_line_id: i64,
    pub sku_id: i64,
    pub qty: f64,
    pub rate: f64,
    pub line_total_paise: i64,
}

// =============================================================================
// Commission Rates
// =============================================================================

/// Which rows a commission rate applies to.
///
/// `Default` never appears on a stored rate row; it names the configured
/// fallback when no row matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RateScope {
    Global,
    User,
    Invoice,
    Quotation,
    Default,
}

impl RateScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateScope::Global => "GLOBAL",
            RateScope::User => "USER",
            RateScope::Invoice => "INVOICE",
            RateScope::Quotation => "QUOTATION",
            RateScope::Default => "DEFAULT",
        }
    }
}

impl fmt::Display for RateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One commission rate row. Rows are never edited; a new row supersedes
/// older ones for the same scope key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommissionRate {
    pub id: i64,
    pub scope: RateScope,
    /// Invoice or quotation id for override scopes.
    pub scope_id: Option<i64>,
    /// Salesperson for USER scope.
    pub user_id: Option<i64>,
    pub pct_bps: u32,
    pub active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CommissionRate {
    #[inline]
    pub fn pct(&self) -> Percent {
        Percent::from_bps(self.pct_bps)
    }
}

// =============================================================================
// Commission Ledger
// =============================================================================

/// Payout status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    #[default]
    Pending,
    Approved,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "PENDING",
            CommissionStatus::Approved => "APPROVED",
            CommissionStatus::Paid => "PAID",
        }
    }

    pub const ALL: [CommissionStatus; 3] = [
        CommissionStatus::Pending,
        CommissionStatus::Approved,
        CommissionStatus::Paid,
    ];
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolved commission for one invoice and its payout state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommissionLedgerEntry {
    pub id: i64,
    pub invoice_id: i64,
    pub salesperson_user_id: Option<i64>,
    pub base_amount_paise: i64,
    pub pct_bps: u32,
    pub scope: RateScope,
    /// Rate row that supplied `pct_bps`; `None` for the configured default.
    pub rate_id: Option<i64>,
    pub amount_paise: i64,
    pub status: CommissionStatus,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "Option<String>")]
    pub paid_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CommissionLedgerEntry {
    #[inline]
    pub fn base_amount(&self) -> Money {
        Money::from_paise(self.base_amount_paise)
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_paise(self.amount_paise)
    }

    #[inline]
    pub fn pct(&self) -> Percent {
        Percent::from_bps(self.pct_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
