//! # Repository Module
//!
//! SQL for each table lives in exactly one repository.
//!
//! ## Executor-Generic Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Every method takes the executor it runs on:                            │
//! │                                                                         │
//! │    db.skus().get(db.pool(), id)          ← straight on the pool         │
//! │    db.skus().get(&mut *conn, id)         ← on an acquired connection    │
//! │    db.invoices().insert(&mut *tx, ...)   ← inside a transaction         │
//! │                                                                         │
//! │  The Engine decides the transaction boundary; repositories never        │
//! │  begin or commit.                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`SkuRepository`](sku::SkuRepository) - catalogue
//! - [`ReceiptRepository`](receipt::ReceiptRepository) - purchase history
//! - [`QuotationRepository`](quotation::QuotationRepository) - quotations and lines
//! - [`InvoiceRepository`](invoice::InvoiceRepository) - invoices, sale lines, sold quantities
//! - [`ReturnRepository`](returns::ReturnRepository) - return headers and lines
//! - [`CommissionRateRepository`](commission_rate::CommissionRateRepository) - rate history
//! - [`CommissionLedgerRepository`](commission_ledger::CommissionLedgerRepository) - one entry per invoice

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub mod commission_ledger;
pub mod commission_rate;
pub mod invoice;
pub mod quotation;
pub mod receipt;
pub mod returns;
pub mod sku;

/// A line on a quotation or invoice before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DocumentLine {
    pub sku_id: i64,
    pub qty: f64,
    pub rate: f64,
}

impl DocumentLine {
    pub fn new(sku_id: i64, qty: f64, rate: f64) -> Self {
        DocumentLine { sku_id, qty, rate }
    }
}
