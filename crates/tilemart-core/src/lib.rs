//! # tilemart-core: Cost & Commission Logic for a Tile Showroom
//!
//! Pure functions that turn purchase, sale, return and damage history into
//! landed cost, availability, profit and commission figures. Nothing in this
//! crate touches a database, the clock or the filesystem; callers hand in the
//! rows and the reference dates.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Tilemart Data Flow                                │
//! │                                                                         │
//! │  Reports / posting pages (external)                                     │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            tilemart-db::Engine (queries + transactions)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ rows in, figures out                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tilemart-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   costing ──► availability ──► pl                               │   │
//! │  │      │                                                          │   │
//! │  │      └──► commission ──► ledger        returns   validation     │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Rows: SKUs, receipts, invoices, rates, ledger entries
//! - [`money`] - Paise-denominated `Money`
//! - [`costing`] - Weighted-average landed cost, as-of selection
//! - [`availability`] - Saleable stock and inventory summaries
//! - [`pl`] - Line and document profit/margin, negotiation preview
//! - [`commission`] - Rate precedence and commission base
//! - [`ledger`] - Commission ledger state machine and sync planning
//! - [`returns`] - Return quantity clamping and GST totals
//! - [`validation`] - Receipt and input checks
//! - [`error`] - Domain error types
//!
//! ## Example
//!
//! ```rust
//! use tilemart_core::costing::{resolve_cost, CostMode, CostSource};
//! use tilemart_core::types::{Receipt, Sku, SkuKind};
//!
//! let sku = Sku::new(1, SkuKind::Tile, "GVT-600", "Glazed vitrified 600x600", 10.0);
//! let receipt = Receipt {
//!     quantity_in: 100.0,
//!     damaged_units: 5.0,
//!     per_unit_value: 200.0,
//!     transport_pct: 5.0,
//!     transport_total: 1000.0,
//!     ..Receipt::for_sku(1)
//! };
//!
//! let cost = resolve_cost(&sku, &[receipt], None, CostMode::Simple);
//! assert_eq!(cost.source, CostSource::Lifetime);
//! assert!((cost.total_paid - 20950.0).abs() < 1e-6);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod commission;
pub mod costing;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pl;
pub mod returns;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Points subtracted from the raw margin to get the "adjusted" margin shown
/// on profit reports.
///
/// ## Business Rule
/// Carried over unchanged from the showroom's existing reports. The owner
/// has not documented where the 15 comes from; keep it until they confirm.
pub const ADJUSTED_MARGIN_MARKDOWN_POINTS: f64 = 15.0;

/// Conversion factor used when a SKU's `sqft_per_box` (or unit factor) is
/// missing, zero or negative.
pub const DEFAULT_CONVERSION_FACTOR: f64 = 1.0;

/// Decimal places kept on availability figures.
pub const QUANTITY_DECIMALS: i32 = 3;

/// Damage share of a receipt above which validation raises a warning (%).
pub const HIGH_DAMAGE_WARNING_PCT: f64 = 10.0;

/// Transport percentage above which validation raises a warning (%).
pub const HIGH_TRANSPORT_WARNING_PCT: f64 = 20.0;
