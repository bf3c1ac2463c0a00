//! # Schema Capabilities
//!
//! Describes which optional columns a database actually has, so the same
//! engine can read an older showroom database.
//!
//! ## Versions
//! ```text
//! ┌─────────┬──────────────────────────────────────────────────────────────┐
//! │ version │ adds                                                         │
//! ├─────────┼──────────────────────────────────────────────────────────────┤
//! │   1     │ base tables only                                             │
//! │   2     │ receipts.receipt_date, damaged_area, transport_per_unit,     │
//! │         │ transport_total                                              │
//! │   3     │ invoices.quotation_id, invoices.salesperson_user_id          │
//! │   4     │ sale_lines.cost_per_unit_at_sale   (current)                 │
//! └─────────┴──────────────────────────────────────────────────────────────┘
//! ```
//!
//! When a column is absent, SELECTs read a neutral literal under the same
//! alias: `0.0` for amounts, `NULL` for optional ids and dates. Columns
//! are never inspected at runtime; the descriptor is configuration.

use serde::{Deserialize, Serialize};

/// Newest schema version this crate's migrations produce.
pub const CURRENT_SCHEMA_VERSION: u32 = 4;

/// Which optional columns are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaCapabilities {
    pub version: u32,
    pub receipt_date: bool,
    pub receipt_damaged_area: bool,
    pub receipt_transport_per_unit: bool,
    pub receipt_transport_total: bool,
    pub invoice_quotation_link: bool,
    pub invoice_salesperson: bool,
    pub sale_line_cost_snapshot: bool,
}

impl Default for SchemaCapabilities {
    fn default() -> Self {
        SchemaCapabilities::current()
    }
}

impl SchemaCapabilities {
    /// Everything present.
    pub fn current() -> Self {
        // CURRENT_SCHEMA_VERSION is always a known version
        Self::for_version(CURRENT_SCHEMA_VERSION).unwrap_or(SchemaCapabilities {
            version: CURRENT_SCHEMA_VERSION,
            receipt_date: true,
            receipt_damaged_area: true,
            receipt_transport_per_unit: true,
            receipt_transport_total: true,
            invoice_quotation_link: true,
            invoice_salesperson: true,
            sale_line_cost_snapshot: true,
        })
    }

    /// The column set a given schema version carries, `None` if unknown.
    pub fn for_version(version: u32) -> Option<Self> {
        if version == 0 || version > CURRENT_SCHEMA_VERSION {
            return None;
        }
        Some(SchemaCapabilities {
            version,
            receipt_date: version >= 2,
            receipt_damaged_area: version >= 2,
            receipt_transport_per_unit: version >= 2,
            receipt_transport_total: version >= 2,
            invoice_quotation_link: version >= 3,
            invoice_salesperson: version >= 3,
            sale_line_cost_snapshot: version >= 4,
        })
    }

    /// SELECT list for `receipts`, matching `Receipt`'s fields.
    pub(crate) fn receipt_columns(&self) -> String {
        [
            "id".to_string(),
            "sku_id".to_string(),
            column(self.receipt_date, "receipt_date", "NULL"),
            "vendor".to_string(),
            "quantity_in".to_string(),
            "damaged_units".to_string(),
            column(self.receipt_damaged_area, "damaged_area", "0.0"),
            "per_unit_value".to_string(),
            "per_area_value".to_string(),
            "transport_pct".to_string(),
            column(self.receipt_transport_per_unit, "transport_per_unit", "0.0"),
            column(self.receipt_transport_total, "transport_total", "0.0"),
        ]
        .join(", ")
    }

    /// SELECT list for `invoices`, matching `Invoice`'s fields.
    pub(crate) fn invoice_columns(&self) -> String {
        [
            "id".to_string(),
            "invoice_no".to_string(),
            "invoice_date".to_string(),
            column(self.invoice_quotation_link, "quotation_id", "NULL"),
            column(self.invoice_salesperson, "salesperson_user_id", "NULL"),
            "gst_mode".to_string(),
            "gst_rate_bps".to_string(),
        ]
        .join(", ")
    }

    /// SELECT list for `sale_lines`, matching `SaleLine`'s fields.
    pub(crate) fn sale_line_columns(&self) -> String {
        [
            "id".to_string(),
            "invoice_id".to_string(),
            "sku_id".to_string(),
            "qty".to_string(),
            "rate".to_string(),
            column(self.sale_line_cost_snapshot, "cost_per_unit_at_sale", "NULL"),
        ]
        .join(", ")
    }
}

fn column(present: bool, name: &str, neutral: &str) -> String {
    if present {
        name.to_string()
    } else {
        format!("{neutral} AS {name}")
    }
}
