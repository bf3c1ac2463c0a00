//! # Error Types
//!
//! Domain-specific error types for tilemart-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tilemart-core errors (this file)                                      │
//! │  ├── CoreError        - Ledger transitions, domain rejections          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tilemart-db errors (separate crate)                                   │
//! │  └── DbError          - Persistence failures, wraps CoreError          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Missing purchase history is not an error: cost resolves to zero and the
//! result carries `CostSource::NoPurchaseHistory`.

use thiserror::Error;

use crate::types::CommissionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A commission ledger entry was asked to move along an edge the state
    /// machine does not have.
    ///
    /// ## Allowed Edges
    /// ```text
    /// PENDING ──► APPROVED
    /// PENDING ──► PAID        (reference required)
    /// APPROVED ─► PAID        (reference required)
    /// PAID ─────► PENDING     (clears reference + paid_at)
    /// ```
    /// Anything else lands here and nothing is written.
    #[error("Commission entry {entry_id}: cannot move from {from} to {to}")]
    InvalidTransition {
        entry_id: i64,
        from: CommissionStatus,
        to: CommissionStatus,
    },

    /// Marking an entry PAID without a payment reference.
    #[error("Commission entry {entry_id}: payment reference is required to mark it paid")]
    MissingPaymentReference { entry_id: i64 },

    /// A return request named a sale line that is not on the invoice.
    #[error("Sale line {sale_line_id} does not belong to invoice {invoice_id}")]
    ForeignSaleLine { sale_line_id: i64, invoice_id: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: f64, max: f64 },

    /// Value must be strictly positive.
    #[error("{field} must be greater than zero")]
    NotPositive { field: String },

    /// Value must not be negative.
    #[error("{field} cannot be negative")]
    Negative { field: String },

    /// One quantity exceeds another it is bounded by.
    #[error("{field} cannot exceed {limit_field}")]
    Exceeds { field: String, limit_field: String },

    /// Neither of two alternative price fields was supplied.
    #[error("either {first} or {second} must be greater than zero")]
    NoPrice { first: String, second: String },

    /// Invalid format (e.g., unparseable date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A date range whose start is after its end.
    #[error("date range start {from} is after end {to}")]
    InvertedRange { from: String, to: String },
}

impl ValidationError {
    pub(crate) fn negative(field: &str) -> Self {
        ValidationError::Negative {
            field: field.to_string(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_message_names_both_states() {
        let err = CoreError::InvalidTransition {
            entry_id: 7,
            from: CommissionStatus::Paid,
            to: CommissionStatus::Approved,
        };
        assert_eq!(
            err.to_string(),
            "Commission entry 7: cannot move from PAID to APPROVED"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Exceeds {
            field: "damaged_units".to_string(),
            limit_field: "quantity_in".to_string(),
        };
        assert_eq!(err.to_string(), "damaged_units cannot exceed quantity_in");

        let err = ValidationError::negative("transport_total");
        assert_eq!(err.to_string(), "transport_total cannot be negative");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::Required {
            field: "reference".to_string(),
        }
        .into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
