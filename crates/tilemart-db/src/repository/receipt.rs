//! # Receipt Repository
//!
//! Purchase receipts are append-only. Columns a legacy database lacks are
//! neither written nor read; see [`SchemaCapabilities`].

use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::DbResult;
use crate::schema::SchemaCapabilities;
use tilemart_core::Receipt;

#[derive(Debug, Clone, Copy)]
pub struct ReceiptRepository {
    schema: SchemaCapabilities,
}

impl ReceiptRepository {
    pub fn new(schema: SchemaCapabilities) -> Self {
        ReceiptRepository { schema }
    }

    /// Inserts a receipt; the `id` on the input is ignored.
    ///
    /// Validation is the caller's job (`validate_receipt`).
    pub async fn insert<'e, E>(&self, executor: E, receipt: &Receipt) -> DbResult<Receipt>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(sku_id = receipt.sku_id, quantity_in = receipt.quantity_in, "Inserting receipt");

        let s = self.schema;
        let mut columns = vec![
            "sku_id",
            "vendor",
            "quantity_in",
            "damaged_units",
            "per_unit_value",
            "per_area_value",
            "transport_pct",
        ];
        let optional = [
            (s.receipt_date, "receipt_date"),
            (s.receipt_damaged_area, "damaged_area"),
            (s.receipt_transport_per_unit, "transport_per_unit"),
            (s.receipt_transport_total, "transport_total"),
        ];
        columns.extend(optional.iter().filter(|(present, _)| *present).map(|(_, c)| *c));

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO receipts ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let mut query = sqlx::query(&sql)
            .bind(receipt.sku_id)
            .bind(&receipt.vendor)
            .bind(receipt.quantity_in)
            .bind(receipt.damaged_units)
            .bind(receipt.per_unit_value)
            .bind(receipt.per_area_value)
            .bind(receipt.transport_pct);
        if s.receipt_date {
            query = query.bind(receipt.receipt_date);
        }
        if s.receipt_damaged_area {
            query = query.bind(receipt.damaged_area);
        }
        if s.receipt_transport_per_unit {
            query = query.bind(receipt.transport_per_unit);
        }
        if s.receipt_transport_total {
            query = query.bind(receipt.transport_total);
        }

        let id = query.execute(executor).await?.last_insert_rowid();

        // what a later read will see
        let stored = Receipt {
            id,
            receipt_date: receipt.receipt_date.filter(|_| s.receipt_date),
            damaged_area: if s.receipt_damaged_area { receipt.damaged_area } else { 0.0 },
            transport_per_unit: if s.receipt_transport_per_unit {
                receipt.transport_per_unit
            } else {
                0.0
            },
            transport_total: if s.receipt_transport_total { receipt.transport_total } else { 0.0 },
            ..receipt.clone()
        };
        Ok(stored)
    }

    /// All receipts of a SKU in insertion order.
    pub async fn list_for_sku<'e, E>(&self, executor: E, sku_id: i64) -> DbResult<Vec<Receipt>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM receipts WHERE sku_id = ?1 ORDER BY id",
            self.schema.receipt_columns()
        );
        let receipts = sqlx::query_as::<_, Receipt>(&sql)
            .bind(sku_id)
            .fetch_all(executor)
            .await?;
        Ok(receipts)
    }
}
