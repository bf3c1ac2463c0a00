//! # Return Repository
//!
//! Return headers and lines are append-only.

use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::DbResult;
use tilemart_core::returns::{AcceptedReturnLine, ReturnableLine};
use tilemart_core::{ReturnHeader, ReturnLine};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnRepository;

impl ReturnRepository {
    pub fn new() -> Self {
        ReturnRepository
    }

    /// Sale lines of an invoice with the quantity already returned on each.
    pub async fn returnable_lines<'e, E>(
        &self,
        executor: E,
        invoice_id: i64,
    ) -> DbResult<Vec<ReturnableLine>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let rows: Vec<(i64, i64, f64, f64, f64)> = sqlx::query_as(
            r#"
            SELECT
                sl.id,
                sl.sku_id,
                sl.qty,
                COALESCE((SELECT SUM(rl.qty) FROM return_lines rl WHERE rl.sale_line_id = sl.id), 0.0),
                sl.rate
            FROM sale_lines sl
            WHERE sl.invoice_id = ?1
            ORDER BY sl.id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sale_line_id, sku_id, sold, already_returned, rate)| ReturnableLine {
                sale_line_id,
                sku_id,
                sold,
                already_returned,
                rate,
            })
            .collect())
    }

    /// Number of returns already posted against an invoice.
    pub async fn count_for_invoice<'e, E>(&self, executor: E, invoice_id: i64) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM return_headers WHERE invoice_id = ?1",
        )
        .bind(invoice_id)
        .fetch_one(executor)
        .await?;
        Ok(count)
    }

    /// Inserts a header; the `id` on the input is ignored.
    pub async fn insert_header<'e, E>(&self, executor: E, header: &ReturnHeader) -> DbResult<ReturnHeader>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(return_no = %header.return_no, invoice_id = header.invoice_id, "Inserting return header");

        let id = sqlx::query(
            r#"
            INSERT INTO return_headers (
                return_no, invoice_id, return_date, notes, gst_mode, gst_rate_bps,
                subtotal_paise, gst_paise, total_paise, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&header.return_no)
        .bind(header.invoice_id)
        .bind(header.return_date)
        .bind(&header.notes)
        .bind(header.gst_mode)
        .bind(header.gst_rate_bps)
        .bind(header.subtotal_paise)
        .bind(header.gst_paise)
        .bind(header.total_paise)
        .bind(chrono::Utc::now())
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(ReturnHeader { id, ..header.clone() })
    }

    pub async fn insert_line<'e, E>(
        &self,
        executor: E,
        return_id: i64,
        line: &AcceptedReturnLine,
    ) -> DbResult<ReturnLine>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query(
            r#"
            INSERT INTO return_lines (return_id, sale_line_id, sku_id, qty, rate, line_total_paise)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(return_id)
        .bind(line.sale_line_id)
        .bind(line.sku_id)
        .bind(line.qty)
        .bind(line.rate)
        .bind(line.line_total.paise())
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(ReturnLine {
            id,
            return_id,
            sale_line_id: line.sale_line_id,
            sku_id: line.sku_id,
            qty: line.qty,
            rate: line.rate,
            line_total_paise: line.line_total.paise(),
        })
    }

    pub async fn headers_for_invoice<'e, E>(
        &self,
        executor: E,
        invoice_id: i64,
    ) -> DbResult<Vec<ReturnHeader>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let headers = sqlx::query_as::<_, ReturnHeader>(
            r#"
            SELECT id, return_no, invoice_id, return_date, notes, gst_mode, gst_rate_bps,
                   subtotal_paise, gst_paise, total_paise
            FROM return_headers
            WHERE invoice_id = ?1
            ORDER BY id
            "#,
        )
        .bind(invoice_id)
        .fetch_all(executor)
        .await?;
        Ok(headers)
    }

    /// Lifetime quantity returned of a SKU.
    pub async fn returned_qty_for_sku<'e, E>(&self, executor: E, sku_id: i64) -> DbResult<f64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let returned = sqlx::query_scalar::<_, f64>(
            "SELECT COALESCE(SUM(qty), 0.0) FROM return_lines WHERE sku_id = ?1",
        )
        .bind(sku_id)
        .fetch_one(executor)
        .await?;
        Ok(returned)
    }
}
