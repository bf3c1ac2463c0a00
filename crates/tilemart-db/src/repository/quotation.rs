//! # Quotation Repository

use chrono::NaiveDate;
use sqlx::{Executor, Sqlite};
use tracing::debug;

use super::DocumentLine;
use crate::error::DbResult;
use tilemart_core::{Quotation, QuotationLine};

#[derive(Debug, Clone, Copy, Default)]
pub struct QuotationRepository;

impl QuotationRepository {
    pub fn new() -> Self {
        QuotationRepository
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        quote_no: &str,
        quote_date: NaiveDate,
        salesperson_user_id: Option<i64>,
    ) -> DbResult<Quotation>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(quote_no = %quote_no, "Inserting quotation");

        let id = sqlx::query(
            "INSERT INTO quotations (quote_no, quote_date, salesperson_user_id) VALUES (?1, ?2, ?3)",
        )
        .bind(quote_no)
        .bind(quote_date)
        .bind(salesperson_user_id)
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(Quotation {
            id,
            quote_no: quote_no.to_string(),
            quote_date,
            salesperson_user_id,
        })
    }

    pub async fn insert_line<'e, E>(
        &self,
        executor: E,
        quotation_id: i64,
        line: &DocumentLine,
    ) -> DbResult<QuotationLine>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let id = sqlx::query(
            "INSERT INTO quotation_lines (quotation_id, sku_id, qty, rate) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(quotation_id)
        .bind(line.sku_id)
        .bind(line.qty)
        .bind(line.rate)
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(QuotationLine {
            id,
            quotation_id,
            sku_id: line.sku_id,
            qty: line.qty,
            rate: line.rate,
        })
    }

    pub async fn get<'e, E>(&self, executor: E, id: i64) -> DbResult<Option<Quotation>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let quotation = sqlx::query_as::<_, Quotation>(
            "SELECT id, quote_no, quote_date, salesperson_user_id FROM quotations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(quotation)
    }

    pub async fn lines<'e, E>(&self, executor: E, quotation_id: i64) -> DbResult<Vec<QuotationLine>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let lines = sqlx::query_as::<_, QuotationLine>(
            r#"
            SELECT id, quotation_id, sku_id, qty, rate
            FROM quotation_lines
            WHERE quotation_id = ?1
            ORDER BY id
            "#,
        )
        .bind(quotation_id)
        .fetch_all(executor)
        .await?;
        Ok(lines)
    }
}
