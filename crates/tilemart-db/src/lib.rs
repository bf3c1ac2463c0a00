//! # tilemart-db: Storage Layer and Engine
//!
//! SQLite persistence for the showroom cost and commission engine, plus the
//! [`Engine`] that composes repositories with the pure calculators in
//! `tilemart-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tilemart Data Flow                               │
//! │                                                                         │
//! │  Report page / admin screen (external)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   tilemart-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │    Engine     │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │  (engine/)    │───►│ (repository/) │    │  (embedded)  │   │   │
//! │  │   │               │    │               │    │              │   │   │
//! │  │   │ costing       │    │ SkuRepo       │    │ 001_initial  │   │   │
//! │  │   │ commission    │    │ InvoiceRepo   │    │   _schema    │   │   │
//! │  │   │ returns       │    │ LedgerRepo ...│    │              │   │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘   │   │
//! │  │                                │ SchemaCapabilities             │   │
//! │  └────────────────────────────────┼────────────────────────────────┘   │
//! │                                   ▼                                     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML + environment configuration
//! - [`engine`] - Public operations (cost, P&L, commission, returns)
//! - [`error`] - Database error types
//! - [`migrations`] - Embedded database migrations
//! - [`pool`] - Connection pool creation and configuration
//! - [`repository`] - One repository per table family
//! - [`schema`] - Which optional columns the database has
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tilemart_db::{AppConfig, Engine};
//!
//! let config = AppConfig::load(None)?;
//! let engine = Engine::from_config(&config).await?;
//!
//! let cost = engine.resolve_cost(sku_id, Some(today), CostMode::Simple).await?;
//! let summary = engine.recompute_commissions(Some(from), Some(to), Default::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod schema;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AppConfig;
pub use engine::{
    CommissionListing, Engine, NewQuotation, PostedInvoice, RecordedReceipt, ReturnLineRequest,
    ReturnOutcome, ReturnRequest, SyncOutcome,
};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use schema::SchemaCapabilities;

// Repository re-exports for convenience
pub use repository::commission_ledger::{CommissionLedgerRepository, LedgerFilter};
pub use repository::commission_rate::CommissionRateRepository;
pub use repository::invoice::{InvoiceRepository, NewInvoice};
pub use repository::quotation::QuotationRepository;
pub use repository::receipt::ReceiptRepository;
pub use repository::returns::ReturnRepository;
pub use repository::sku::SkuRepository;
pub use repository::DocumentLine;
