//! # Commission Rate Repository
//!
//! Rates are never edited. Setting a rate inserts a new active row; the
//! newest active row per scope key wins at resolution time.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::{DbError, DbResult};
use tilemart_core::commission::InvoiceContext;
use tilemart_core::{CommissionRate, Percent, RateScope};

const RATE_COLUMNS: &str = "id, scope, scope_id, user_id, pct_bps, active, created_at";

#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionRateRepository;

impl CommissionRateRepository {
    pub fn new() -> Self {
        CommissionRateRepository
    }

    /// Inserts an active rate row.
    ///
    /// `scope_id` carries the invoice or quotation id for override scopes,
    /// `user_id` the salesperson for USER scope.
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        scope: RateScope,
        scope_id: Option<i64>,
        user_id: Option<i64>,
        pct: Percent,
        now: DateTime<Utc>,
    ) -> DbResult<CommissionRate>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(%scope, ?scope_id, ?user_id, pct = %pct, "Inserting commission rate");

        let id = sqlx::query(
            r#"
            INSERT INTO commission_rates (scope, scope_id, user_id, pct_bps, active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(scope)
        .bind(scope_id)
        .bind(user_id)
        .bind(pct.bps())
        .bind(now)
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(CommissionRate {
            id,
            scope,
            scope_id,
            user_id,
            pct_bps: pct.bps(),
            active: true,
            created_at: now,
        })
    }

    pub async fn deactivate<'e, E>(&self, executor: E, id: i64) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id, "Deactivating commission rate");

        let result = sqlx::query("UPDATE commission_rates SET active = 0 WHERE id = ?1")
            .bind(id)
            .execute(executor)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CommissionRate", id));
        }
        Ok(())
    }

    /// All active rows, newest first.
    pub async fn list_active<'e, E>(&self, executor: E) -> DbResult<Vec<CommissionRate>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {RATE_COLUMNS} FROM commission_rates WHERE active = 1 ORDER BY id DESC");
        let rates = sqlx::query_as::<_, CommissionRate>(&sql)
            .fetch_all(executor)
            .await?;
        Ok(rates)
    }

    /// Active rows that could apply to one invoice: its override, its
    /// quotation's override, its salesperson's rate and every global rate.
    pub async fn candidates<'e, E>(&self, executor: E, ctx: &InvoiceContext) -> DbResult<Vec<CommissionRate>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            r#"
            SELECT {RATE_COLUMNS} FROM commission_rates
            WHERE active = 1 AND (
                   (scope = 'INVOICE' AND scope_id = ?1)
                OR (scope = 'QUOTATION' AND ?2 IS NOT NULL AND scope_id = ?2)
                OR (scope = 'USER' AND ?3 IS NOT NULL AND user_id = ?3)
                OR scope = 'GLOBAL'
            )
            ORDER BY id
            "#
        );
        let rates = sqlx::query_as::<_, CommissionRate>(&sql)
            .bind(ctx.invoice_id)
            .bind(ctx.quotation_id)
            .bind(ctx.salesperson_user_id)
            .fetch_all(executor)
            .await?;
        Ok(rates)
    }
}
