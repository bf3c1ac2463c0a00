//! # Invoice Repository
//!
//! Invoices and their sale lines. Both are immutable once posted; the only
//! writer is `Engine::post_invoice`.
//!
//! ## Cost Snapshot
//! ```text
//! post_invoice ──► as-of landed cost at invoice_date ──► sale_lines.cost_per_unit_at_sale
//!                                                              │
//! commission base ◄────────── qty × snapshot ◄─────────────────┘
//!                  (falls back to as-of cost when NULL / column absent)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use tracing::debug;
use ts_rs::TS;

use super::DocumentLine;
use crate::error::DbResult;
use crate::schema::SchemaCapabilities;
use tilemart_core::{GstMode, Invoice, Percent, SaleLine};

/// An invoice to be posted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewInvoice {
    pub invoice_no: String,
    #[ts(as = "String")]
    pub invoice_date: NaiveDate,
    pub quotation_id: Option<i64>,
    pub salesperson_user_id: Option<i64>,
    pub gst_mode: GstMode,
    pub gst_rate: Percent,
    pub lines: Vec<DocumentLine>,
}

#[derive(Debug, Clone, Copy)]
pub struct InvoiceRepository {
    schema: SchemaCapabilities,
}

impl InvoiceRepository {
    pub fn new(schema: SchemaCapabilities) -> Self {
        InvoiceRepository { schema }
    }

    /// Inserts the header of `invoice`; lines go through [`Self::insert_line`].
    pub async fn insert<'e, E>(&self, executor: E, invoice: &NewInvoice) -> DbResult<Invoice>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(invoice_no = %invoice.invoice_no, date = %invoice.invoice_date, "Inserting invoice");

        let s = self.schema;
        let mut columns = vec!["invoice_no", "invoice_date", "gst_mode", "gst_rate_bps"];
        if s.invoice_quotation_link {
            columns.push("quotation_id");
        }
        if s.invoice_salesperson {
            columns.push("salesperson_user_id");
        }
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO invoices ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let mut query = sqlx::query(&sql)
            .bind(&invoice.invoice_no)
            .bind(invoice.invoice_date)
            .bind(invoice.gst_mode)
            .bind(invoice.gst_rate.bps());
        if s.invoice_quotation_link {
            query = query.bind(invoice.quotation_id);
        }
        if s.invoice_salesperson {
            query = query.bind(invoice.salesperson_user_id);
        }

        let id = query.execute(executor).await?.last_insert_rowid();

        Ok(Invoice {
            id,
            invoice_no: invoice.invoice_no.clone(),
            invoice_date: invoice.invoice_date,
            quotation_id: invoice.quotation_id.filter(|_| s.invoice_quotation_link),
            salesperson_user_id: invoice.salesperson_user_id.filter(|_| s.invoice_salesperson),
            gst_mode: invoice.gst_mode,
            gst_rate_bps: invoice.gst_rate.bps(),
        })
    }

    /// Inserts one sale line. `cost_snapshot` is dropped when the column is
    /// absent.
    pub async fn insert_line<'e, E>(
        &self,
        executor: E,
        invoice_id: i64,
        line: &DocumentLine,
        cost_snapshot: Option<f64>,
    ) -> DbResult<SaleLine>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let snapshot = cost_snapshot.filter(|_| self.schema.sale_line_cost_snapshot);

        let result = if self.schema.sale_line_cost_snapshot {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (invoice_id, sku_id, qty, rate, cost_per_unit_at_sale)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(invoice_id)
            .bind(line.sku_id)
            .bind(line.qty)
            .bind(line.rate)
            .bind(snapshot)
            .execute(executor)
            .await?
        } else {
            sqlx::query("INSERT INTO sale_lines (invoice_id, sku_id, qty, rate) VALUES (?1, ?2, ?3, ?4)")
                .bind(invoice_id)
                .bind(line.sku_id)
                .bind(line.qty)
                .bind(line.rate)
                .execute(executor)
                .await?
        };

        Ok(SaleLine {
            id: result.last_insert_rowid(),
            invoice_id,
            sku_id: line.sku_id,
            qty: line.qty,
            rate: line.rate,
            cost_per_unit_at_sale: snapshot,
        })
    }

    pub async fn get<'e, E>(&self, executor: E, id: i64) -> DbResult<Option<Invoice>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM invoices WHERE id = ?1",
            self.schema.invoice_columns()
        );
        let invoice = sqlx::query_as::<_, Invoice>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(invoice)
    }

    pub async fn lines<'e, E>(&self, executor: E, invoice_id: i64) -> DbResult<Vec<SaleLine>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM sale_lines WHERE invoice_id = ?1 ORDER BY id",
            self.schema.sale_line_columns()
        );
        let lines = sqlx::query_as::<_, SaleLine>(&sql)
            .bind(invoice_id)
            .fetch_all(executor)
            .await?;
        Ok(lines)
    }

    /// Ids of invoices dated within `[from, to]` (either bound optional),
    /// oldest first.
    pub async fn ids_in_range<'e, E>(
        &self,
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> DbResult<Vec<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM invoices
            WHERE (?1 IS NULL OR invoice_date >= ?1)
              AND (?2 IS NULL OR invoice_date <= ?2)
            ORDER BY invoice_date, id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(ids)
    }

    /// Lifetime quantity sold of a SKU across all invoices.
    pub async fn sold_qty_for_sku<'e, E>(&self, executor: E, sku_id: i64) -> DbResult<f64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sold = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(qty), 0.0) FROM sale_lines WHERE sku_id = ?1",
        )
        .bind(sku_id)
        .fetch_one(executor)
        .await?;
        Ok(sold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use tilemart_core::{Sku, SkuKind};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn new_invoice(no: &str, day: u32) -> NewInvoice {
        NewInvoice {
            invoice_no: no.to_string(),
            invoice_date: date(day),
            quotation_id: None,
            salesperson_user_id: Some(7),
            gst_mode: GstMode::Exclude,
            gst_rate: Percent::from_percentage(18.0),
            lines: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_insert_header_and_lines() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sku = db
            .skus()
            .insert(db.pool(), &Sku::new(0, SkuKind::Tile, "T1", "Tile", 10.0))
            .await
            .unwrap();
        let repo = db.invoices();

        let invoice = repo.insert(db.pool(), &new_invoice("INV-1", 5)).await.unwrap();
        repo.insert_line(db.pool(), invoice.id, &DocumentLine::new(sku.id, 4.0, 450.0), Some(220.5))
            .await
            .unwrap();
        repo.insert_line(db.pool(), invoice.id, &DocumentLine::new(sku.id, 2.5, 450.0), None)
            .await
            .unwrap();

        assert_eq!(repo.get(db.pool(), invoice.id).await.unwrap(), Some(invoice.clone()));

        let lines = repo.lines(db.pool(), invoice.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].cost_per_unit_at_sale, Some(220.5));
        assert_eq!(lines[1].cost_per_unit_at_sale, None);

        assert_eq!(repo.sold_qty_for_sku(db.pool(), sku.id).await.unwrap(), 6.5);
        assert_eq!(repo.sold_qty_for_sku(db.pool(), 999).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_ids_in_range() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.invoices();
        let a = repo.insert(db.pool(), &new_invoice("INV-A", 20)).await.unwrap();
        let b = repo.insert(db.pool(), &new_invoice("INV-B", 2)).await.unwrap();
        let c = repo.insert(db.pool(), &new_invoice("INV-C", 10)).await.unwrap();

        let all = repo.ids_in_range(db.pool(), None, None).await.unwrap();
        assert_eq!(all, vec![b.id, c.id, a.id]);

        let mid = repo
            .ids_in_range(db.pool(), Some(date(5)), Some(date(20)))
            .await
            .unwrap();
        assert_eq!(mid, vec![c.id, a.id]);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_number() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.invoices();
        repo.insert(db.pool(), &new_invoice("INV-1", 1)).await.unwrap();
        let err = repo.insert(db.pool(), &new_invoice("INV-1", 2)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_legacy_schema_drops_links_and_snapshot() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sku = db
            .skus()
            .insert(db.pool(), &Sku::new(0, SkuKind::Tile, "T1", "Tile", 10.0))
            .await
            .unwrap();
        let repo = InvoiceRepository::new(SchemaCapabilities::for_version(1).unwrap());

        let invoice = repo.insert(db.pool(), &new_invoice("INV-L", 1)).await.unwrap();
        assert_eq!(invoice.salesperson_user_id, None);

        let line = repo
            .insert_line(db.pool(), invoice.id, &DocumentLine::new(sku.id, 1.0, 100.0), Some(80.0))
            .await
            .unwrap();
        assert_eq!(line.cost_per_unit_at_sale, None);
        assert_eq!(repo.lines(db.pool(), invoice.id).await.unwrap(), vec![line]);
    }
}
