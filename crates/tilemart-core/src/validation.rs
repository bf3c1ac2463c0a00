//! # Validation Module
//!
//! Input checks run before anything is written.
//!
//! ## Receipt Checks
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ERRORS (receipt rejected)            WARNINGS (receipt accepted)       │
//! │  ───────────────────────────────      ─────────────────────────────     │
//! │  • negative quantity / damage         • damage > 10% of quantity in     │
//! │  • damaged units > quantity in        • transport pct > 20%             │
//! │  • negative price or transport        • no vendor recorded              │
//! │  • both prices zero                   • receipt dated after today       │
//! │  • transport pct > 100                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use chrono::NaiveDate;
//! use tilemart_core::types::Receipt;
//! use tilemart_core::validation::validate_receipt;
//!
//! let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
//! let receipt = Receipt { quantity_in: 10.0, per_unit_value: 250.0, ..Receipt::for_sku(1) };
//! let report = validate_receipt(&receipt, today);
//! assert!(report.is_valid());
//! assert_eq!(report.warnings.len(), 1); // no vendor
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::Receipt;
use crate::{HIGH_DAMAGE_WARNING_PCT, HIGH_TRANSPORT_WARNING_PCT};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Receipt Validation
// =============================================================================

/// Non-blocking findings on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReceiptWarning {
    HighDamage { damage_pct: f64 },
    HighTransport { transport_pct: f64 },
    MissingVendor,
    FutureDated {
        #[ts(as = "String")]
        date: NaiveDate,
    },
}

/// All errors and warnings for one receipt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ReceiptWarning>,
}

impl ReceiptReport {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, or the warnings when there are none.
    pub fn into_result(self) -> ValidationResult<Vec<ReceiptWarning>> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.warnings),
        }
    }
}

/// Checks a receipt. `today` comes from the caller.
pub fn validate_receipt(receipt: &Receipt, today: NaiveDate) -> ReceiptReport {
    let mut report = ReceiptReport::default();

    let non_negative = [
        ("quantity_in", receipt.quantity_in),
        ("damaged_units", receipt.damaged_units),
        ("damaged_area", receipt.damaged_area),
        ("per_unit_value", receipt.per_unit_value),
        ("per_area_value", receipt.per_area_value),
        ("transport_pct", receipt.transport_pct),
        ("transport_per_unit", receipt.transport_per_unit),
        ("transport_total", receipt.transport_total),
    ];
    for (field, value) in non_negative {
        if value < 0.0 || !value.is_finite() {
            report.errors.push(ValidationError::negative(field));
        }
    }

    if receipt.damaged_units > receipt.quantity_in {
        report.errors.push(ValidationError::Exceeds {
            field: "damaged_units".to_string(),
            limit_field: "quantity_in".to_string(),
        });
    }

    if receipt.per_unit_value == 0.0 && receipt.per_area_value == 0.0 {
        report.errors.push(ValidationError::NoPrice {
            first: "per_unit_value".to_string(),
            second: "per_area_value".to_string(),
        });
    }

    if receipt.transport_pct > 100.0 {
        report.errors.push(ValidationError::OutOfRange {
            field: "transport_pct".to_string(),
            min: 0.0,
            max: 100.0,
        });
    }

    if receipt.quantity_in > 0.0 {
        let damage_pct = receipt.damaged_units / receipt.quantity_in * 100.0;
        if damage_pct > HIGH_DAMAGE_WARNING_PCT {
            report.warnings.push(ReceiptWarning::HighDamage { damage_pct });
        }
    }

    if receipt.transport_pct > HIGH_TRANSPORT_WARNING_PCT && receipt.transport_pct <= 100.0 {
        report.warnings.push(ReceiptWarning::HighTransport {
            transport_pct: receipt.transport_pct,
        });
    }

    if receipt.vendor.as_deref().map_or(true, |v| v.trim().is_empty()) {
        report.warnings.push(ReceiptWarning::MissingVendor);
    }

    if let Some(date) = receipt.receipt_date.filter(|d| *d > today) {
        report.warnings.push(ReceiptWarning::FutureDated { date });
    }

    report
}

// =============================================================================
// Small Validators
// =============================================================================

/// A percentage in `[0, 100]`.
pub fn validate_percentage(field: &str, pct: f64) -> ValidationResult<()> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0.0,
            max: 100.0,
        });
    }
    Ok(())
}

/// A payment reference: non-empty after trimming, at most 100 characters.
pub fn validate_payment_reference(reference: &str) -> ValidationResult<()> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ValidationError::Required {
            field: "payment_reference".to_string(),
        });
    }
    if reference.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "payment_reference".to_string(),
            max: 100,
        });
    }
    Ok(())
}

/// A quotation or invoice line: positive quantity, non-negative rate.
pub fn validate_document_line(qty: f64, rate: f64) -> ValidationResult<()> {
    if !qty.is_finite() || qty <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: "qty".to_string(),
        });
    }
    if !rate.is_finite() || rate < 0.0 {
        return Err(ValidationError::negative("rate"));
    }
    Ok(())
}

/// A non-empty document number.
pub fn validate_document_number(field: &str, value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 50,
        });
    }
    Ok(())
}

/// `from <= to` when both are given.
pub fn validate_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> ValidationResult<()> {
    match (from, to) {
        (Some(f), Some(t)) if f > t => Err(ValidationError::InvertedRange {
            from: f.to_string(),
            to: t.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Parses a `YYYY-MM-DD` date from user input.
pub fn parse_date(field: &str, raw: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: e.to_string(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
