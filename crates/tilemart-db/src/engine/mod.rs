//! # Engine
//!
//! The public operations of the cost and commission engine.
//!
//! ## Layering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Engine (this module)                                                   │
//! │    ├── costing.rs     cost, availability, P&L, negotiation, receipts    │
//! │    ├── commission.rs  rates, invoice posting, ledger sync, status       │
//! │    └── returns.rs     return posting                                    │
//! │         │                                                               │
//! │         │ loads rows via repositories, calls pure functions             │
//! │         ▼                                                               │
//! │  tilemart-core (no I/O)                                                 │
//! │                                                                         │
//! │  Reads run on one acquired connection.                                  │
//! │  Writes run in one transaction; on error it is dropped (rolled back).   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::SqliteConnection;

use crate::config::AppConfig;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use tilemart_core::availability::StockMovements;
use tilemart_core::costing::{resolve_cost, CostMode, CostResolution};
use tilemart_core::{Percent, Receipt, Sku};

mod commission;
mod costing;
mod returns;

pub use commission::{CommissionListing, PostedInvoice, SyncOutcome};
pub use costing::{NewQuotation, RecordedReceipt};
pub use returns::{ReturnLineRequest, ReturnOutcome, ReturnRequest};

/// Cost and commission engine over one database.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    default_commission_pct: Percent,
}

impl Engine {
    /// `default_commission_pct` applies when no rate row matches an invoice.
    pub fn new(db: Database, default_commission_pct: Percent) -> Self {
        Engine {
            db,
            default_commission_pct,
        }
    }

    /// Opens the database described by `config` and builds an engine on it.
    pub async fn from_config(config: &AppConfig) -> DbResult<Self> {
        let db = Database::new(config.to_db_config()).await?;
        Ok(Engine::new(db, config.commission.default_rate()))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn default_commission_pct(&self) -> Percent {
        self.default_commission_pct
    }

    // =========================================================================
    // Shared loaders
    // =========================================================================

    async fn load_sku(&self, conn: &mut SqliteConnection, sku_id: i64) -> DbResult<Sku> {
        self.db
            .skus()
            .get(&mut *conn, sku_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sku", sku_id))
    }

    /// SKU plus its full receipt history.
    async fn load_history(&self, conn: &mut SqliteConnection, sku_id: i64) -> DbResult<(Sku, Vec<Receipt>)> {
        let sku = self.load_sku(&mut *conn, sku_id).await?;
        let receipts = self.db.receipts().list_for_sku(&mut *conn, sku_id).await?;
        Ok((sku, receipts))
    }

    async fn load_movements(&self, conn: &mut SqliteConnection, sku_id: i64) -> DbResult<StockMovements> {
        let sold = self.db.invoices().sold_qty_for_sku(&mut *conn, sku_id).await?;
        let returned = self.db.returns().returned_qty_for_sku(&mut *conn, sku_id).await?;
        Ok(StockMovements { sold, returned })
    }

    async fn cost_on(
        &self,
        conn: &mut SqliteConnection,
        sku_id: i64,
        as_of: Option<NaiveDate>,
        mode: CostMode,
    ) -> DbResult<CostResolution> {
        let (sku, receipts) = self.load_history(conn, sku_id).await?;
        Ok(resolve_cost(&sku, &receipts, as_of, mode))
    }
}

// =============================================================================
// Test Fixtures
// =============================================================================
