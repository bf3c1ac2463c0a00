//! # Commission Ledger Repository
//!
//! One row per invoice (`invoice_id` is UNIQUE).
//!
//! ## Guarded Status Updates
//! ```text
//! UPDATE commission_ledger SET status = ?, ... WHERE id = ? AND status = ?expected
//!                                                               │
//!                         0 rows affected ◄── someone moved it ─┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite};
use tracing::debug;
use ts_rs::TS;

use crate::error::{DbError, DbResult};
use tilemart_core::ledger::ComputedCommission;
use tilemart_core::{CommissionLedgerEntry, CommissionStatus};

const ENTRY_COLUMNS: &str = "cl.id AS id, cl.invoice_id AS invoice_id, \
     cl.salesperson_user_id AS salesperson_user_id, cl.base_amount_paise AS base_amount_paise, \
     cl.pct_bps AS pct_bps, cl.scope AS scope, cl.rate_id AS rate_id, \
     cl.amount_paise AS amount_paise, cl.status AS status, \
     cl.payment_reference AS payment_reference, cl.notes AS notes, cl.paid_at AS paid_at, \
     cl.created_at AS created_at, cl.updated_at AS updated_at";

/// Ledger listing filters. Every field is optional; the caller names the
/// salesperson explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerFilter {
    pub salesperson_user_id: Option<i64>,
    pub status: Option<CommissionStatus>,
    /// Invoice date bounds, inclusive.
    #[ts(as = "Option<String>")]
    pub from: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub to: Option<NaiveDate>,
}

impl LedgerFilter {
    pub fn for_user(user_id: i64) -> Self {
        LedgerFilter {
            salesperson_user_id: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: CommissionStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommissionLedgerRepository;

impl CommissionLedgerRepository {
    pub fn new() -> Self {
        CommissionLedgerRepository
    }

    pub async fn get<'e, E>(&self, executor: E, id: i64) -> DbResult<Option<CommissionLedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM commission_ledger cl WHERE cl.id = ?1");
        let entry = sqlx::query_as::<_, CommissionLedgerEntry>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    pub async fn find_by_invoice<'e, E>(
        &self,
        executor: E,
        invoice_id: i64,
    ) -> DbResult<Option<CommissionLedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {ENTRY_COLUMNS} FROM commission_ledger cl WHERE cl.invoice_id = ?1");
        let entry = sqlx::query_as::<_, CommissionLedgerEntry>(&sql)
            .bind(invoice_id)
            .fetch_optional(executor)
            .await?;
        Ok(entry)
    }

    /// Inserts a PENDING entry for a freshly computed commission.
    pub async fn insert<'e, E>(
        &self,
        executor: E,
        computed: &ComputedCommission,
        now: DateTime<Utc>,
    ) -> DbResult<CommissionLedgerEntry>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(
            invoice_id = computed.invoice_id,
            amount = %computed.amount,
            scope = %computed.rate.scope,
            "Inserting commission entry"
        );

        let id = sqlx::query(
            r#"
            INSERT INTO commission_ledger (
                invoice_id, salesperson_user_id, base_amount_paise, pct_bps, scope, rate_id,
                amount_paise, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
        )
        .bind(computed.invoice_id)
        .bind(computed.salesperson_user_id)
        .bind(computed.base.paise())
        .bind(computed.rate.pct.bps())
        .bind(computed.rate.scope)
        .bind(computed.rate.rate_id)
        .bind(computed.amount.paise())
        .bind(CommissionStatus::Pending)
        .bind(now)
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(CommissionLedgerEntry {
            id,
            invoice_id: computed.invoice_id,
            salesperson_user_id: computed.salesperson_user_id,
            base_amount_paise: computed.base.paise(),
            pct_bps: computed.rate.pct.bps(),
            scope: computed.rate.scope,
            rate_id: computed.rate.rate_id,
            amount_paise: computed.amount.paise(),
            status: CommissionStatus::Pending,
            payment_reference: None,
            notes: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rewrites the computed figures of an entry.
    ///
    /// With `reset_to_pending` the status goes back to PENDING and any
    /// payment data is cleared; otherwise status and payment data stay.
    pub async fn update_amounts<'e, E>(
        &self,
        executor: E,
        entry_id: i64,
        computed: &ComputedCommission,
        reset_to_pending: bool,
        now: DateTime<Utc>,
    ) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(entry_id, reset_to_pending, amount = %computed.amount, "Updating commission amounts");

        let result = sqlx::query(
            r#"
            UPDATE commission_ledger SET
                salesperson_user_id = ?2,
                base_amount_paise   = ?3,
                pct_bps             = ?4,
                scope               = ?5,
                rate_id             = ?6,
                amount_paise        = ?7,
                status              = CASE WHEN ?8 THEN 'PENDING' ELSE status END,
                payment_reference   = CASE WHEN ?8 THEN NULL ELSE payment_reference END,
                paid_at             = CASE WHEN ?8 THEN NULL ELSE paid_at END,
                updated_at          = ?9
            WHERE id = ?1
            "#,
        )
        .bind(entry_id)
        .bind(computed.salesperson_user_id)
        .bind(computed.base.paise())
        .bind(computed.rate.pct.bps())
        .bind(computed.rate.scope)
        .bind(computed.rate.rate_id)
        .bind(computed.amount.paise())
        .bind(reset_to_pending)
        .bind(now)
        .execute(executor)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CommissionLedgerEntry", entry_id));
        }
        Ok(())
    }

    /// Writes the status fields of `next` if the row is still in `expected`.
    ///
    /// Returns the number of rows written (0 or 1).
    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        next: &CommissionLedgerEntry,
        expected: CommissionStatus,
    ) -> DbResult<u64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(entry_id = next.id, from = %expected, to = %next.status, "Updating commission status");

        let result = sqlx::query(
            r#"
            UPDATE commission_ledger SET
                status            = ?3,
                payment_reference = ?4,
                notes             = ?5,
                paid_at           = ?6,
                updated_at        = ?7
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(next.id)
        .bind(expected)
        .bind(next.status)
        .bind(&next.payment_reference)
        .bind(&next.notes)
        .bind(next.paid_at)
        .bind(next.updated_at)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Entries matching `filter`, newest invoice first.
    pub async fn list<'e, E>(&self, executor: E, filter: &LedgerFilter) -> DbResult<Vec<CommissionLedgerEntry>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM commission_ledger cl \
             JOIN invoices i ON i.id = cl.invoice_id \
             WHERE (?1 IS NULL OR cl.salesperson_user_id = ?1) \
               AND (?2 IS NULL OR cl.status = ?2) \
               AND (?3 IS NULL OR i.invoice_date >= ?3) \
               AND (?4 IS NULL OR i.invoice_date <= ?4) \
             ORDER BY i.invoice_date DESC, cl.id DESC"
        );

        let entries = sqlx::query_as::<_, CommissionLedgerEntry>(&sql)
            .bind(filter.salesperson_user_id)
            .bind(filter.status)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_all(executor)
            .await?;
        Ok(entries)
    }
}
