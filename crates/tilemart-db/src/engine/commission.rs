//! # Commission Operations
//!
//! ## Sync Flow (one invoice)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  invoice ──► InvoiceContext ──► candidate rates ──► resolve_rate        │
//! │     │                                                   │               │
//! │     └──► sale lines ──► Σ qty × (snapshot | as-of cost) ─┤              │
//! │                                                         ▼               │
//! │                                               ComputedCommission        │
//! │                                                         │               │
//! │  existing ledger row ──────────────────────► plan_sync ─┤               │
//! │                                                         ▼               │
//! │                      Insert │ Update │ Unchanged │ Discrepancy          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recompute runs that flow once per invoice, each in its own transaction,
//! and stops at the first failure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};
use ts_rs::TS;

use super::costing::CostCache;
use super::Engine;
use crate::error::{DbError, DbResult};
use crate::repository::commission_ledger::LedgerFilter;
use crate::repository::invoice::NewInvoice;
use tilemart_core::commission::{commission_base, resolve_rate, InvoiceContext, ResolvedRate};
use tilemart_core::costing::CostMode;
use tilemart_core::ledger::{
    apply_status_change, plan_sync, ComputedCommission, LedgerTotals, RecomputeOptions,
    RecomputeSummary, StatusChange, SyncAction,
};
use tilemart_core::validation::{
    validate_date_range, validate_document_line, validate_document_number,
};
use tilemart_core::{
    CommissionLedgerEntry, CommissionRate, Invoice, Money, Percent, RateScope, SaleLine,
    ValidationError,
};

/// Result of syncing one invoice's ledger entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SyncOutcome {
    pub invoice_id: i64,
    pub action: SyncAction,
    /// The row as stored after the sync. For a discrepancy this is the
    /// untouched PAID entry.
    pub entry: CommissionLedgerEntry,
}

/// A posted invoice with its lines and commission entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PostedInvoice {
    pub invoice: Invoice,
    pub lines: Vec<SaleLine>,
    pub commission: SyncOutcome,
}

/// Ledger rows matching a filter plus their per-status totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionListing {
    pub entries: Vec<CommissionLedgerEntry>,
    pub totals: LedgerTotals,
}

impl Engine {
    // =========================================================================
    // Rate Resolution
    // =========================================================================

    /// The rate that applies to an invoice right now.
    pub async fn resolve_commission_rate(&self, invoice_id: i64) -> DbResult<ResolvedRate> {
        let mut conn = self.db.pool().acquire().await?;
        let invoice = self.load_invoice(&mut conn, invoice_id).await?;
        self.rate_on(&mut conn, &InvoiceContext::from(&invoice)).await
    }

    async fn rate_on(&self, conn: &mut SqliteConnection, ctx: &InvoiceContext) -> DbResult<ResolvedRate> {
        let candidates = self.db.commission_rates().candidates(&mut *conn, ctx).await?;
        let rate = resolve_rate(ctx, &candidates, self.default_commission_pct);
        debug!(invoice_id = ctx.invoice_id, scope = %rate.scope, pct = %rate.pct, "Resolved commission rate");
        Ok(rate)
    }

    // =========================================================================
    // Rate Administration
    // =========================================================================

    pub async fn set_global_rate(&self, pct: Percent) -> DbResult<CommissionRate> {
        self.insert_rate(RateScope::Global, None, None, pct).await
    }

    pub async fn set_user_rate(&self, user_id: i64, pct: Percent) -> DbResult<CommissionRate> {
        self.insert_rate(RateScope::User, None, Some(user_id), pct).await
    }

    pub async fn set_invoice_override(&self, invoice_id: i64, pct: Percent) -> DbResult<CommissionRate> {
        self.insert_rate(RateScope::Invoice, Some(invoice_id), None, pct).await
    }

    pub async fn set_quotation_override(&self, quotation_id: i64, pct: Percent) -> DbResult<CommissionRate> {
        self.insert_rate(RateScope::Quotation, Some(quotation_id), None, pct).await
    }

    pub async fn deactivate_rate(&self, rate_id: i64) -> DbResult<()> {
        self.db.commission_rates().deactivate(self.db.pool(), rate_id).await?;
        info!(rate_id, "Commission rate deactivated");
        Ok(())
    }

    /// Active rate rows, newest first.
    pub async fn active_rates(&self) -> DbResult<Vec<CommissionRate>> {
        self.db.commission_rates().list_active(self.db.pool()).await
    }

    async fn insert_rate(
        &self,
        scope: RateScope,
        scope_id: Option<i64>,
        user_id: Option<i64>,
        pct: Percent,
    ) -> DbResult<CommissionRate> {
        if pct.bps() > 10_000 {
            return Err(ValidationError::OutOfRange {
                field: "pct".to_string(),
                min: 0.0,
                max: 100.0,
            }
            .into());
        }

        let rate = self
            .db
            .commission_rates()
            .insert(self.db.pool(), scope, scope_id, user_id, pct, Utc::now())
            .await?;
        info!(rate_id = rate.id, %scope, ?scope_id, ?user_id, pct = %pct, "Commission rate set");
        Ok(rate)
    }

    // =========================================================================
    // Invoice Posting
    // =========================================================================

    /// Stores an invoice, snapshots each line's as-of landed cost and syncs
    /// its commission entry, all in one transaction.
    pub async fn post_invoice(&self, new_invoice: &NewInvoice) -> DbResult<PostedInvoice> {
        validate_document_number("invoice_no", &new_invoice.invoice_no)?;
        if new_invoice.lines.is_empty() {
            return Err(ValidationError::Required {
                field: "lines".to_string(),
            }
            .into());
        }
        for line in &new_invoice.lines {
            validate_document_line(line.qty, line.rate)?;
        }

        let mut tx = self.db.pool().begin().await?;
        let invoice = self.db.invoices().insert(&mut *tx, new_invoice).await?;

        let mut costs = CostCache::new(invoice.invoice_date, CostMode::Simple);
        let mut lines = Vec::with_capacity(new_invoice.lines.len());
        for line in &new_invoice.lines {
            let snapshot = costs.get(self, &mut tx, line.sku_id).await?.unit_cost;
            let stored = self
                .db
                .invoices()
                .insert_line(&mut *tx, invoice.id, line, Some(snapshot))
                .await?;
            lines.push(stored);
        }

        let commission = self
            .sync_on(&mut tx, invoice.id, RecomputeOptions::default(), Utc::now())
            .await?;
        tx.commit().await?;

        info!(
            invoice_id = invoice.id,
            invoice_no = %invoice.invoice_no,
            lines = lines.len(),
            commission = %commission.entry.amount(),
            "Invoice posted"
        );
        Ok(PostedInvoice {
            invoice,
            lines,
            commission,
        })
    }

    // =========================================================================
    // Ledger Sync
    // =========================================================================

    /// Re-resolves and upserts the ledger entry of one invoice.
    pub async fn sync_invoice_commission(
        &self,
        invoice_id: i64,
        options: RecomputeOptions,
    ) -> DbResult<SyncOutcome> {
        let mut tx = self.db.pool().begin().await?;
        let outcome = self.sync_on(&mut tx, invoice_id, options, Utc::now()).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Syncs every invoice dated in `[from, to]`, one transaction each.
    ///
    /// A failure stops processing and is reported in the summary; entries
    /// committed before it stay.
    pub async fn recompute_commissions(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
        options: RecomputeOptions,
    ) -> DbResult<RecomputeSummary> {
        validate_date_range(from, to)?;

        let ids = self.db.invoices().ids_in_range(self.db.pool(), from, to).await?;
        let mut summary = RecomputeSummary {
            from,
            to,
            total: ids.len(),
            ..Default::default()
        };

        info!(?from, ?to, invoices = ids.len(), overwrite_paid = options.overwrite_paid, "Recomputing commissions");

        for invoice_id in ids {
            match self.sync_invoice_commission(invoice_id, options).await {
                Ok(outcome) => summary.record(&outcome.action),
                Err(e) => {
                    warn!(invoice_id, error = %e, "Recompute stopped");
                    summary.first_error = Some(e.to_string());
                    summary.failed_invoice_id = Some(invoice_id);
                    break;
                }
            }
        }

        info!(
            synced = summary.synced,
            unchanged = summary.unchanged,
            discrepancies = summary.discrepancies.len(),
            complete = summary.is_complete(),
            "Recompute finished"
        );
        Ok(summary)
    }

    async fn sync_on(
        &self,
        conn: &mut SqliteConnection,
        invoice_id: i64,
        options: RecomputeOptions,
        now: DateTime<Utc>,
    ) -> DbResult<SyncOutcome> {
        let invoice = self.load_invoice(&mut *conn, invoice_id).await?;
        let ctx = InvoiceContext::from(&invoice);
        let rate = self.rate_on(&mut *conn, &ctx).await?;
        let base = self.commission_base_on(&mut *conn, &invoice).await?;
        let computed = ComputedCommission::new(&ctx, base, rate);

        let ledger = self.db.commission_ledger();
        let existing = ledger.find_by_invoice(&mut *conn, invoice_id).await?;
        let action = plan_sync(existing.as_ref(), &computed, options);

        let entry = match (&action, existing) {
            (SyncAction::Insert, _) => ledger.insert(&mut *conn, &computed, now).await?,
            (SyncAction::Update { reset_to_pending }, Some(entry)) => {
                ledger
                    .update_amounts(&mut *conn, entry.id, &computed, *reset_to_pending, now)
                    .await?;
                ledger
                    .get(&mut *conn, entry.id)
                    .await?
                    .ok_or_else(|| DbError::not_found("CommissionLedgerEntry", entry.id))?
            }
            (SyncAction::Discrepancy(d), Some(entry)) => {
                warn!(
                    entry_id = d.entry_id,
                    invoice_id = d.invoice_id,
                    stored = %d.stored_amount,
                    computed = %d.computed_amount,
                    "PAID commission differs from recomputed amount"
                );
                entry
            }
            (SyncAction::Unchanged, Some(entry)) => entry,
            (_, None) => {
                return Err(DbError::Internal(format!(
                    "sync planned {action:?} for invoice {invoice_id} without a ledger entry"
                )))
            }
        };

        debug!(invoice_id, entry_id = entry.id, ?action, "Commission synced");
        Ok(SyncOutcome {
            invoice_id,
            action,
            entry,
        })
    }

    /// `Σ qty × unit cost`, using the sale-time snapshot when present and
    /// the as-of landed cost at the invoice date otherwise.
    async fn commission_base_on(&self, conn: &mut SqliteConnection, invoice: &Invoice) -> DbResult<Money> {
        let lines = self.db.invoices().lines(&mut *conn, invoice.id).await?;

        let mut costs = CostCache::new(invoice.invoice_date, CostMode::Simple);
        let mut priced = Vec::with_capacity(lines.len());
        for line in &lines {
            let unit_cost = match line.cost_per_unit_at_sale {
                Some(snapshot) => snapshot,
                None => costs.get(self, &mut *conn, line.sku_id).await?.unit_cost,
            };
            priced.push((line.qty, unit_cost));
        }
        Ok(commission_base(priced))
    }

    async fn load_invoice(&self, conn: &mut SqliteConnection, invoice_id: i64) -> DbResult<Invoice> {
        self.db
            .invoices()
            .get(&mut *conn, invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Invoice", invoice_id))
    }

    // =========================================================================
    // Status & Listing
    // =========================================================================

    /// Moves a ledger entry along its state machine.
    ///
    /// An illegal move returns `InvalidTransition` and writes nothing.
    pub async fn set_commission_status(
        &self,
        entry_id: i64,
        change: &StatusChange,
    ) -> DbResult<CommissionLedgerEntry> {
        let ledger = self.db.commission_ledger();
        let mut tx = self.db.pool().begin().await?;

        let entry = ledger
            .get(&mut *tx, entry_id)
            .await?
            .ok_or_else(|| DbError::not_found("CommissionLedgerEntry", entry_id))?;

        let next = apply_status_change(&entry, change, Utc::now())?;

        if ledger.update_status(&mut *tx, &next, entry.status).await? == 0 {
            return Err(DbError::StaleStatus {
                entry_id,
                expected: entry.status.to_string(),
            });
        }
        tx.commit().await?;

        info!(entry_id, from = %entry.status, to = %next.status, "Commission status changed");
        Ok(next)
    }

    /// Ledger rows matching `filter`, newest invoice first, with totals.
    pub async fn list_commissions(&self, filter: &LedgerFilter) -> DbResult<CommissionListing> {
        validate_date_range(filter.from, filter.to)?;
        let entries = self.db.commission_ledger().list(self.db.pool(), filter).await?;
        let totals = LedgerTotals::from_entries(&entries);
        Ok(CommissionListing { entries, totals })
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
    use crate::repository::DocumentLine;
    use crate::schema::SchemaCapabilities;
    use tilemart_core::{CommissionStatus, CoreError};

    const SALESPERSON: i64 = 7;

    /// Tile with landed cost exactly ₹250 (no damage, no transport).
    async fn flat_tile(engine: &Engine, code: &str) -> i64 {
        let sku = tile(engine, code).await;
        receive(
            engine,
            tilemart_core::Receipt {
                receipt_date: Some(date(2024, 1, 1)),
                quantity_in: 500.0,
                per_unit_value: 250.0,
                ..tilemart_core::Receipt::for_sku(sku.id)
            },
        )
        .await;
        sku.id
    }

    /// Invoice with a cost base of ₹50,000 (200 boxes at ₹250).
    async fn base_50k_invoice(engine: &Engine, no: &str, sku_id: i64) -> PostedInvoice {
        engine
            .post_invoice(&invoice(
                no,
                date(2024, 3, 1),
                Some(SALESPERSON),
                vec![DocumentLine::new(sku_id, 200.0, 320.0)],
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_global_rate_commission_is_pending() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();

        let posted = base_50k_invoice(&engine, "INV-1", sku).await;
        let entry = &posted.commission.entry;
        assert_eq!(posted.commission.action, SyncAction::Insert);
        assert_eq!(entry.base_amount(), Money::from_rupees(50_000.0));
        assert_eq!(entry.amount(), Money::from_rupees(1_250.0));
        assert_eq!(entry.scope, RateScope::Global);
        assert_eq!(entry.status, CommissionStatus::Pending);
        assert_eq!(posted.lines[0].cost_per_unit_at_sale, Some(250.0));
    }

    #[tokio::test]
    async fn test_rate_precedence() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;

        let quotation = engine
            .create_quotation(&super::super::NewQuotation {
                quote_no: "Q-1".to_string(),
                quote_date: date(2024, 2, 20),
                salesperson_user_id: Some(SALESPERSON),
                lines: vec![DocumentLine::new(sku, 200.0, 320.0)],
            })
            .await
            .unwrap();
        let mut new_invoice = invoice("INV-1", date(2024, 3, 1), Some(SALESPERSON), vec![DocumentLine::new(sku, 1.0, 300.0)]);
        new_invoice.quotation_id = Some(quotation.id);
        let invoice_id = engine.post_invoice(&new_invoice).await.unwrap().invoice.id;

        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!(resolved, ResolvedRate::default_rate(Percent::zero()));

        let global = engine.set_global_rate(Percent::from_bps(100)).await.unwrap();
        engine.set_global_rate(Percent::from_bps(150)).await.unwrap();
        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!((resolved.scope, resolved.pct.bps()), (RateScope::Global, 150));

        engine.set_user_rate(SALESPERSON, Percent::from_bps(200)).await.unwrap();
        engine.set_user_rate(SALESPERSON + 1, Percent::from_bps(900)).await.unwrap();
        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!((resolved.scope, resolved.pct.bps()), (RateScope::User, 200));

        engine.set_quotation_override(quotation.id, Percent::from_bps(300)).await.unwrap();
        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!((resolved.scope, resolved.pct.bps()), (RateScope::Quotation, 300));

        let invoice_rate = engine.set_invoice_override(invoice_id, Percent::from_bps(400)).await.unwrap();
        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!((resolved.scope, resolved.pct.bps()), (RateScope::Invoice, 400));
        assert_eq!(resolved.rate_id, Some(invoice_rate.id));

        engine.deactivate_rate(invoice_rate.id).await.unwrap();
        let resolved = engine.resolve_commission_rate(invoice_id).await.unwrap();
        assert_eq!(resolved.scope, RateScope::Quotation);

        assert!(engine.active_rates().await.unwrap().iter().any(|r| r.id == global.id));
    }

    #[tokio::test]
    async fn test_configured_default_applies_without_rates() {
        let engine = engine_with(DbConfig::in_memory(), Percent::from_percentage(1.0)).await;
        let sku = flat_tile(&engine, "T1").await;

        let posted = base_50k_invoice(&engine, "INV-1", sku).await;
        assert_eq!(posted.commission.entry.scope, RateScope::Default);
        assert_eq!(posted.commission.entry.rate_id, None);
        assert_eq!(posted.commission.entry.amount(), Money::from_rupees(500.0));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();
        let a = base_50k_invoice(&engine, "INV-1", sku).await;
        base_50k_invoice(&engine, "INV-2", sku).await;

        let first = engine
            .recompute_commissions(None, None, RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(first.total, 2);
        assert_eq!(first.synced, 0);
        assert_eq!(first.unchanged, 2);

        let second = engine
            .recompute_commissions(Some(date(2024, 1, 1)), Some(date(2024, 12, 31)), RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(second.synced, 0);
        assert!(second.is_complete());

        let entry = engine
            .database()
            .commission_ledger()
            .find_by_invoice(engine.database().pool(), a.invoice.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry, a.commission.entry);
    }

    #[tokio::test]
    async fn test_rate_change_resets_approved_to_pending() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();
        let posted = base_50k_invoice(&engine, "INV-1", sku).await;

        let approved = engine
            .set_commission_status(posted.commission.entry.id, &StatusChange::Approve)
            .await
            .unwrap();
        assert_eq!(approved.status, CommissionStatus::Approved);

        engine.set_user_rate(SALESPERSON, Percent::from_percentage(3.0)).await.unwrap();
        let summary = engine
            .recompute_commissions(None, None, RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.synced, 1);

        let outcome = engine
            .sync_invoice_commission(posted.invoice.id, RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.action, SyncAction::Unchanged);
        assert_eq!(outcome.entry.id, posted.commission.entry.id);
        assert_eq!(outcome.entry.status, CommissionStatus::Pending);
        assert_eq!(outcome.entry.amount(), Money::from_rupees(1_500.0));
    }

    #[tokio::test]
    async fn test_paid_entry_reports_discrepancy() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();
        let posted = base_50k_invoice(&engine, "INV-1", sku).await;
        let entry_id = posted.commission.entry.id;

        engine
            .set_commission_status(
                entry_id,
                &StatusChange::MarkPaid {
                    reference: "NEFT-42".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap();
        engine.set_global_rate(Percent::from_percentage(3.0)).await.unwrap();

        let summary = engine
            .recompute_commissions(None, None, RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.synced, 0);
        assert_eq!(summary.discrepancies.len(), 1);
        let d = &summary.discrepancies[0];
        assert_eq!(d.entry_id, entry_id);
        assert_eq!(d.stored_amount, Money::from_rupees(1_250.0));
        assert_eq!(d.computed_amount, Money::from_rupees(1_500.0));

        let forced = engine
            .recompute_commissions(None, None, RecomputeOptions { overwrite_paid: true })
            .await
            .unwrap();
        assert_eq!(forced.synced, 1);
        let entry = engine.database().commission_ledger().get(engine.database().pool(), entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, CommissionStatus::Paid);
        assert_eq!(entry.payment_reference.as_deref(), Some("NEFT-42"));
        assert_eq!(entry.amount(), Money::from_rupees(1_500.0));
    }

    #[tokio::test]
    async fn test_paid_and_revert() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        let entry_id = base_50k_invoice(&engine, "INV-1", sku).await.commission.entry.id;

        let paid = engine
            .set_commission_status(
                entry_id,
                &StatusChange::MarkPaid {
                    reference: "TXN123".to_string(),
                    notes: Some("March".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(paid.status, CommissionStatus::Paid);
        assert_eq!(paid.payment_reference.as_deref(), Some("TXN123"));
        assert!(paid.paid_at.is_some());

        let reverted = engine
            .set_commission_status(entry_id, &StatusChange::RevertToPending)
            .await
            .unwrap();
        assert_eq!(reverted.status, CommissionStatus::Pending);
        assert_eq!(reverted.payment_reference, None);
        assert_eq!(reverted.paid_at, None);

        let stored = engine.database().commission_ledger().get(engine.database().pool(), entry_id).await.unwrap().unwrap();
        assert_eq!(stored.status, CommissionStatus::Pending);
        assert_eq!(stored.paid_at, None);
    }

    #[tokio::test]
    async fn test_invalid_transition_writes_nothing() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        let posted = base_50k_invoice(&engine, "INV-1", sku).await;
        let entry_id = posted.commission.entry.id;

        let err = engine
            .set_commission_status(entry_id, &StatusChange::RevertToPending)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidTransition { .. })));

        let err = engine
            .set_commission_status(
                entry_id,
                &StatusChange::MarkPaid {
                    reference: "  ".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::MissingPaymentReference { .. })));

        let err = engine
            .set_commission_status(
                entry_id,
                &StatusChange::MarkPaid {
                    reference: "R".repeat(101),
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let stored = engine.database().commission_ledger().get(engine.database().pool(), entry_id).await.unwrap().unwrap();
        assert_eq!(stored, posted.commission.entry);

        let err = engine
            .set_commission_status(9999, &StatusChange::Approve)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_legacy_schema_uses_as_of_cost() {
        let legacy = SchemaCapabilities::for_version(2).unwrap();
        let engine = engine_with(DbConfig::in_memory().schema(legacy), Percent::zero()).await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();

        // salesperson column is absent, so the USER rate cannot apply
        engine.set_user_rate(SALESPERSON, Percent::from_percentage(9.0)).await.unwrap();

        let posted = base_50k_invoice(&engine, "INV-1", sku).await;
        assert_eq!(posted.lines[0].cost_per_unit_at_sale, None);
        assert_eq!(posted.commission.entry.scope, RateScope::Global);
        assert_eq!(posted.commission.entry.base_amount(), Money::from_rupees(50_000.0));
        assert_eq!(posted.commission.entry.amount(), Money::from_rupees(1_250.0));
    }

    #[tokio::test]
    async fn test_post_invoice_rolls_back_on_unknown_sku() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;

        let err = engine
            .post_invoice(&invoice(
                "INV-1",
                date(2024, 3, 1),
                None,
                vec![DocumentLine::new(sku, 1.0, 300.0), DocumentLine::new(404, 1.0, 300.0)],
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let ids = engine.database().invoices().ids_in_range(engine.database().pool(), None, None).await.unwrap();
        assert!(ids.is_empty());

        let err = engine
            .post_invoice(&invoice("INV-2", date(2024, 3, 1), None, vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_recompute_stops_at_first_failure() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();

        let mut ids = Vec::new();
        for (no, day) in [("INV-1", 1), ("INV-2", 2), ("INV-3", 3)] {
            let posted = engine
                .post_invoice(&invoice(
                    no,
                    date(2024, 3, day),
                    Some(SALESPERSON),
                    vec![DocumentLine::new(sku, 200.0, 320.0)],
                ))
                .await
                .unwrap();
            ids.push(posted.invoice.id);
        }
        engine.set_user_rate(SALESPERSON, Percent::from_percentage(3.0)).await.unwrap();

        // An invoice row that no longer decodes.
        let pool = engine.database().pool();
        sqlx::query("PRAGMA ignore_check_constraints = ON").execute(pool).await.unwrap();
        sqlx::query("UPDATE invoices SET gst_mode = 'BOGUS' WHERE id = ?1")
            .bind(ids[1])
            .execute(pool)
            .await
            .unwrap();

        let summary = engine
            .recompute_commissions(None, None, RecomputeOptions::default())
            .await
            .unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.unchanged, 0);
        assert!(summary.first_error.is_some());
        assert_eq!(summary.failed_invoice_id, Some(ids[1]));
        assert!(!summary.is_complete());

        let ledger = engine.database().commission_ledger();
        let first = ledger.find_by_invoice(pool, ids[0]).await.unwrap().unwrap();
        assert_eq!(first.amount(), Money::from_rupees(1_500.0));
        let third = ledger.find_by_invoice(pool, ids[2]).await.unwrap().unwrap();
        assert_eq!(third.amount(), Money::from_rupees(1_250.0));
    }

    #[tokio::test]
    async fn test_recompute_rejects_inverted_range() {
        let engine = engine().await;
        let err = engine
            .recompute_commissions(Some(date(2024, 2, 1)), Some(date(2024, 1, 1)), RecomputeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(ValidationError::InvertedRange { .. }))));
    }

    #[tokio::test]
    async fn test_list_commissions_filters_and_totals() {
        let engine = engine().await;
        let sku = flat_tile(&engine, "T1").await;
        engine.set_global_rate(Percent::from_percentage(2.5)).await.unwrap();

        let a = base_50k_invoice(&engine, "INV-1", sku).await;
        base_50k_invoice(&engine, "INV-2", sku).await;
        engine
            .post_invoice(&invoice("INV-3", date(2024, 4, 1), Some(99), vec![DocumentLine::new(sku, 40.0, 300.0)]))
            .await
            .unwrap();
        engine
            .set_commission_status(
                a.commission.entry.id,
                &StatusChange::MarkPaid {
                    reference: "TXN-1".to_string(),
                    notes: None,
                },
            )
            .await
            .unwrap();

        let mine = engine.list_commissions(&LedgerFilter::for_user(SALESPERSON)).await.unwrap();
        assert_eq!(mine.totals.entries, 2);
        assert_eq!(mine.totals.total, Money::from_rupees(2_500.0));
        assert_eq!(mine.totals.paid, Money::from_rupees(1_250.0));
        assert_eq!(mine.totals.pending, Money::from_rupees(1_250.0));

        let paid = engine
            .list_commissions(&LedgerFilter::for_user(SALESPERSON).with_status(CommissionStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid.entries.len(), 1);
        assert_eq!(paid.entries[0].id, a.commission.entry.id);

        let april = engine
            .list_commissions(&LedgerFilter {
                from: Some(date(2024, 4, 1)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(april.entries.len(), 1);
        assert_eq!(april.entries[0].salesperson_user_id, Some(99));
        assert_eq!(april.totals.total, Money::from_rupees(250.0));
    }
}
