//! Cost, availability, P&L and receipt operations.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::Engine;
use crate::error::{DbError, DbResult};
use crate::repository::DocumentLine;
use tilemart_core::availability::{resolve_availability, summarize_inventory, Availability, InventorySummary};
use tilemart_core::costing::{receipt_breakdown, CostMode, CostResolution, CostSource, ReceiptCost};
use tilemart_core::pl::{line_pl, line_pl_with_unit_cost, negotiate, LinePl, NegotiationOutcome, NegotiationTerms, PlSummary};
use tilemart_core::validation::{validate_document_line, validate_document_number, validate_receipt, ReceiptWarning};
use tilemart_core::{Quotation, Receipt};

/// A stored receipt and the non-blocking findings on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RecordedReceipt {
    pub receipt: Receipt,
    pub warnings: Vec<ReceiptWarning>,
}

/// A quotation to be stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewQuotation {
    pub quote_no: String,
    #[ts(as = "String")]
    pub quote_date: NaiveDate,
    pub salesperson_user_id: Option<i64>,
    pub lines: Vec<DocumentLine>,
}

impl Engine {
    // =========================================================================
    // Cost & Stock
    // =========================================================================

    /// Landed unit cost of a SKU, optionally as of a date.
    pub async fn resolve_cost(
        &self,
        sku_id: i64,
        as_of: Option<NaiveDate>,
        mode: CostMode,
    ) -> DbResult<CostResolution> {
        let mut conn = self.db.pool().acquire().await?;
        let cost = self.cost_on(&mut conn, sku_id, as_of, mode).await?;

        debug!(sku_id, unit_cost = cost.unit_cost, source = ?cost.source, "Resolved cost");
        if let Some(warning) = &cost.warning {
            warn!(sku_id, %warning, "Zero cost");
        }
        Ok(cost)
    }

    /// Per-receipt audit figures for a SKU.
    pub async fn receipt_breakdown(&self, sku_id: i64) -> DbResult<Vec<ReceiptCost>> {
        let mut conn = self.db.pool().acquire().await?;
        let (sku, receipts) = self.load_history(&mut conn, sku_id).await?;
        Ok(receipt_breakdown(&sku, &receipts))
    }

    /// Lifetime good units minus sold plus returned. Never clamped.
    pub async fn resolve_availability(&self, sku_id: i64) -> DbResult<Availability> {
        let mut conn = self.db.pool().acquire().await?;
        let (sku, receipts) = self.load_history(&mut conn, sku_id).await?;
        let movements = self.load_movements(&mut conn, sku_id).await?;

        let availability = resolve_availability(&sku, &receipts, movements);
        if availability.is_oversold() {
            warn!(sku_id, available = availability.available, "SKU is oversold");
        }
        Ok(availability)
    }

    pub async fn inventory_summary(&self, sku_id: i64) -> DbResult<InventorySummary> {
        let mut conn = self.db.pool().acquire().await?;
        let (sku, receipts) = self.load_history(&mut conn, sku_id).await?;
        let movements = self.load_movements(&mut conn, sku_id).await?;
        Ok(summarize_inventory(&sku, &receipts, movements))
    }

    /// Validates and stores a purchase receipt.
    ///
    /// Errors reject the receipt; warnings come back with the stored row.
    pub async fn record_receipt(&self, receipt: &Receipt, today: NaiveDate) -> DbResult<RecordedReceipt> {
        let warnings = validate_receipt(receipt, today).into_result()?;

        let mut conn = self.db.pool().acquire().await?;
        self.load_sku(&mut conn, receipt.sku_id).await?;
        let stored = self.db.receipts().insert(&mut *conn, receipt).await?;

        info!(
            receipt_id = stored.id,
            sku_id = stored.sku_id,
            warnings = warnings.len(),
            "Receipt recorded"
        );
        Ok(RecordedReceipt {
            receipt: stored,
            warnings,
        })
    }

    // =========================================================================
    // Profit & Loss
    // =========================================================================

    /// P&L of one prospective line, costed as of `as_of` (lifetime if `None`).
    pub async fn compute_line_pl(
        &self,
        sku_id: i64,
        qty: f64,
        rate: f64,
        as_of: Option<NaiveDate>,
    ) -> DbResult<LinePl> {
        let mut conn = self.db.pool().acquire().await?;
        let cost = self.cost_on(&mut conn, sku_id, as_of, CostMode::Simple).await?;
        Ok(line_pl(qty, rate, &cost))
    }

    /// P&L of a posted invoice.
    ///
    /// Lines carrying a cost snapshot use it; the rest are costed as of the
    /// invoice date.
    pub async fn invoice_pl(&self, invoice_id: i64, mode: CostMode) -> DbResult<PlSummary> {
        let mut conn = self.db.pool().acquire().await?;
        let invoice = self
            .db
            .invoices()
            .get(&mut *conn, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))?;
        let lines = self.db.invoices().lines(&mut *conn, invoice_id).await?;

        let mut costs = CostCache::new(invoice.invoice_date, mode);
        let mut pl_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let pl = match line.cost_per_unit_at_sale {
                Some(unit_cost) => {
                    let warning = (unit_cost == 0.0).then(|| {
                        format!("sale line {}: cost is zero ({})", line.id, CostSource::SaleSnapshot.reason())
                    });
                    line_pl_with_unit_cost(line.sku_id, line.qty, line.rate, unit_cost, CostSource::SaleSnapshot, warning)
                }
                None => {
                    let cost = costs.get(self, &mut conn, line.sku_id).await?;
                    line_pl(line.qty, line.rate, cost)
                }
            };
            pl_lines.push(pl);
        }

        Ok(PlSummary::from_lines(pl_lines))
    }

    /// P&L of a quotation, costed as of the quotation date.
    pub async fn quotation_pl(&self, quotation_id: i64, mode: CostMode) -> DbResult<PlSummary> {
        let mut conn = self.db.pool().acquire().await?;
        self.quotation_pl_on(&mut conn, quotation_id, mode).await
    }

    /// Applies a discount and commission rule to a quotation's P&L.
    pub async fn negotiate_quotation(
        &self,
        quotation_id: i64,
        terms: &NegotiationTerms,
    ) -> DbResult<NegotiationOutcome> {
        let summary = self.quotation_pl(quotation_id, CostMode::Simple).await?;
        let outcome = negotiate(&summary, terms);

        debug!(
            quotation_id,
            net_sale = outcome.net_sale,
            commission = %outcome.commission,
            "Negotiation preview"
        );
        Ok(outcome)
    }

    /// Stores a quotation with its lines in one transaction.
    pub async fn create_quotation(&self, quotation: &NewQuotation) -> DbResult<Quotation> {
        validate_document_number("quote_no", &quotation.quote_no)?;
        for line in &quotation.lines {
            validate_document_line(line.qty, line.rate)?;
        }

        let mut tx = self.db.pool().begin().await?;
        let stored = self
            .db
            .quotations()
            .insert(&mut *tx, quotation.quote_no.trim(), quotation.quote_date, quotation.salesperson_user_id)
            .await?;
        for line in &quotation.lines {
            self.load_sku(&mut tx, line.sku_id).await?;
            self.db.quotations().insert_line(&mut *tx, stored.id, line).await?;
        }
        tx.commit().await?;

        info!(quotation_id = stored.id, quote_no = %stored.quote_no, lines = quotation.lines.len(), "Quotation created");
        Ok(stored)
    }

    async fn quotation_pl_on(
        &self,
        conn: &mut SqliteConnection,
        quotation_id: i64,
        mode: CostMode,
    ) -> DbResult<PlSummary> {
        let quotation = self
            .db
            .quotations()
            .get(&mut *conn, quotation_id)
            .await?
            .ok_or_else(|| DbError::not_found("Quotation", quotation_id))?;
        let lines = self.db.quotations().lines(&mut *conn, quotation_id).await?;

        let mut costs = CostCache::new(quotation.quote_date, mode);
        let mut pl_lines = Vec::with_capacity(lines.len());
        for line in &lines {
            let cost = costs.get(self, conn, line.sku_id).await?;
            pl_lines.push(line_pl(line.qty, line.rate, cost));
        }
        Ok(PlSummary::from_lines(pl_lines))
    }
}

// =============================================================================
// Cost Cache
// =============================================================================

/// As-of costs for one document date, resolved once per SKU.
pub(super) struct CostCache {
    as_of: NaiveDate,
    mode: CostMode,
    resolved: HashMap<i64, CostResolution>,
}

impl CostCache {
    pub(super) fn new(as_of: NaiveDate, mode: CostMode) -> Self {
        CostCache {
            as_of,
            mode,
            resolved: HashMap::new(),
        }
    }

    pub(super) async fn get(
        &mut self,
        engine: &Engine,
        conn: &mut SqliteConnection,
        sku_id: i64,
    ) -> DbResult<&CostResolution> {
        if !self.resolved.contains_key(&sku_id) {
            let cost = engine.cost_on(conn, sku_id, Some(self.as_of), self.mode).await?;
            self.resolved.insert(sku_id, cost);
        }
        self.resolved
            .get(&sku_id)
            .ok_or_else(|| DbError::Internal(format!("cost cache miss for SKU {sku_id}")))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::pool::DbConfig;
    use crate::schema::SchemaCapabilities;
    use tilemart_core::pl::{CommissionBasis, Discount};
    use tilemart_core::{CoreError, Percent, ValidationError};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-3
    }

    #[tokio::test]
    async fn test_reference_landed_cost() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;

        let cost = engine.resolve_cost(sku.id, None, CostMode::Simple).await.unwrap();
        assert_eq!(cost.source, CostSource::Lifetime);
        assert!(close(cost.unit_cost, 220.526));
        assert!(close(cost.total_paid, 20950.0));
        assert!(close(cost.good_units, 95.0));
        assert!(close(cost.area_cost, 22.0526));

        let detailed = engine.resolve_cost(sku.id, None, CostMode::Detailed).await.unwrap();
        let breakdown = detailed.breakdown.unwrap();
        assert!(close(breakdown.base, 200.0));
        assert!(close(breakdown.transport_pct_amount, 10.0));
        assert!(close(breakdown.transport_allocation, 10.526));
        assert_eq!(detailed.unit_cost, breakdown.total());
    }

    #[tokio::test]
    async fn test_as_of_falls_back_to_lifetime() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;

        let before = engine
            .resolve_cost(sku.id, Some(date(2023, 12, 31)), CostMode::Simple)
            .await
            .unwrap();
        assert_eq!(before.source, CostSource::FallbackLifetime);
        assert!(close(before.unit_cost, 220.526));

        let after = engine
            .resolve_cost(sku.id, Some(date(2024, 2, 1)), CostMode::Simple)
            .await
            .unwrap();
        assert_eq!(after.source, CostSource::AsOf);
    }

    #[tokio::test]
    async fn test_no_history_is_zero_with_reason() {
        let engine = engine().await;
        let sku = tile(&engine, "EMPTY").await;

        let cost = engine.resolve_cost(sku.id, None, CostMode::Simple).await.unwrap();
        assert_eq!(cost.unit_cost, 0.0);
        assert_eq!(cost.source, CostSource::NoPurchaseHistory);
        assert!(cost.warning.unwrap().contains("no purchase history"));
    }

    #[tokio::test]
    async fn test_unknown_sku() {
        let engine = engine().await;
        let err = engine.resolve_cost(404, None, CostMode::Simple).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_availability_after_sales_and_returns() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;

        let invoice = post(
            &engine,
            invoice("INV-1", date(2024, 2, 1), None, vec![DocumentLine::new(sku.id, 60.0, 300.0)]),
        )
        .await;
        let lines = engine.database().invoices().lines(engine.database().pool(), invoice.id).await.unwrap();
        engine
            .create_return(&super::super::ReturnRequest {
                invoice_id: invoice.id,
                return_date: date(2024, 2, 5),
                notes: None,
                lines: vec![super::super::ReturnLineRequest {
                    sale_line_id: lines[0].id,
                    qty: 5.0,
                }],
            })
            .await
            .unwrap();

        let availability = engine.resolve_availability(sku.id).await.unwrap();
        assert_eq!(availability.good_units, 95.0);
        assert_eq!(availability.sold, 60.0);
        assert_eq!(availability.returned, 5.0);
        assert_eq!(availability.available, 40.0);
        assert_eq!(availability.available_area, 400.0);

        let summary = engine.inventory_summary(sku.id).await.unwrap();
        assert_eq!(summary.receipt_count, 1);
        assert_eq!(summary.available, 40.0);
        assert!(close(summary.total_investment, 20950.0));
    }

    #[tokio::test]
    async fn test_oversold_stays_negative() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, Receipt { quantity_in: 2.0, damaged_units: 0.0, ..reference_receipt(sku.id) }).await;
        post(&engine, invoice("INV-1", date(2024, 2, 1), None, vec![DocumentLine::new(sku.id, 5.0, 300.0)])).await;

        let availability = engine.resolve_availability(sku.id).await.unwrap();
        assert_eq!(availability.available, -3.0);
        assert!(availability.is_oversold());
    }

    #[tokio::test]
    async fn test_record_receipt_validates() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        let today = date(2024, 6, 1);

        let recorded = engine
            .record_receipt(&Receipt { vendor: None, ..reference_receipt(sku.id) }, today)
            .await
            .unwrap();
        assert!(recorded.receipt.id > 0);
        assert_eq!(recorded.warnings, vec![ReceiptWarning::MissingVendor]);

        let bad = Receipt {
            damaged_units: 150.0,
            ..reference_receipt(sku.id)
        };
        let err = engine.record_receipt(&bad, today).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::Exceeds { .. }))
        ));
        assert_eq!(engine.receipt_breakdown(sku.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_line_pl_and_margin_floor() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;

        let pl = engine.compute_line_pl(sku.id, 10.0, 300.0, Some(date(2024, 2, 1))).await.unwrap();
        assert!(close(pl.revenue, 3000.0));
        assert!(close(pl.cost, 2205.263));
        assert!(close(pl.raw_margin_pct, 26.491));
        assert!(close(pl.adjusted_margin_pct, 11.491));

        let thin = engine.compute_line_pl(sku.id, 10.0, 230.0, None).await.unwrap();
        assert_eq!(thin.adjusted_margin_pct, 0.0);
    }

    #[tokio::test]
    async fn test_invoice_pl_uses_snapshot() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;
        let invoice = post(
            &engine,
            invoice("INV-1", date(2024, 2, 1), None, vec![DocumentLine::new(sku.id, 10.0, 300.0)]),
        )
        .await;

        // a later, pricier receipt must not change the posted invoice's P&L
        receive(&engine, Receipt { per_unit_value: 400.0, ..reference_receipt(sku.id) }).await;

        let pl = engine.invoice_pl(invoice.id, CostMode::Simple).await.unwrap();
        assert_eq!(pl.lines[0].cost_source, CostSource::SaleSnapshot);
        assert!(close(pl.cost, 2205.263));
        assert!(pl.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_invoice_pl_without_snapshot_column() {
        let legacy = SchemaCapabilities {
            sale_line_cost_snapshot: false,
            ..SchemaCapabilities::current()
        };
        let engine = engine_with(DbConfig::in_memory().schema(legacy), Percent::zero()).await;
        let sku = tile(&engine, "T1").await;
        receive(&engine, reference_receipt(sku.id)).await;
        let invoice = post(
            &engine,
            invoice("INV-1", date(2024, 2, 1), None, vec![DocumentLine::new(sku.id, 10.0, 300.0)]),
        )
        .await;

        let pl = engine.invoice_pl(invoice.id, CostMode::Simple).await.unwrap();
        assert_eq!(pl.lines[0].cost_source, CostSource::AsOf);
        assert!(close(pl.cost, 2205.263));
    }

    #[tokio::test]
    async fn test_quotation_pl_and_negotiation() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;
        let other = tile(&engine, "NOCOST").await;
        receive(&engine, reference_receipt(sku.id)).await;

        let quotation = engine
            .create_quotation(&NewQuotation {
                quote_no: "Q-1".to_string(),
                quote_date: date(2024, 2, 1),
                salesperson_user_id: Some(7),
                lines: vec![DocumentLine::new(sku.id, 10.0, 300.0), DocumentLine::new(other.id, 1.0, 50.0)],
            })
            .await
            .unwrap();

        let pl = engine.quotation_pl(quotation.id, CostMode::Simple).await.unwrap();
        assert!(close(pl.revenue, 3050.0));
        assert!(close(pl.cost, 2205.263));
        assert_eq!(pl.warnings.len(), 1);

        let outcome = engine
            .negotiate_quotation(
                quotation.id,
                &NegotiationTerms {
                    discount: Discount::Amt(50.0),
                    basis: CommissionBasis::Sale,
                    commission_pct: Percent::from_percentage(2.0),
                },
            )
            .await
            .unwrap();
        assert!(close(outcome.net_sale, 3000.0));
        assert_eq!(outcome.commission.paise(), 6000);
    }

    #[tokio::test]
    async fn test_create_quotation_rolls_back_on_unknown_sku() {
        let engine = engine().await;
        let sku = tile(&engine, "T1").await;

        let err = engine
            .create_quotation(&NewQuotation {
                quote_no: "Q-1".to_string(),
                quote_date: date(2024, 2, 1),
                salesperson_user_id: None,
                lines: vec![DocumentLine::new(sku.id, 1.0, 10.0), DocumentLine::new(999, 1.0, 10.0)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotations")
            .fetch_one(engine.database().pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
