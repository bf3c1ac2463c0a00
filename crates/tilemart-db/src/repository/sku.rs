//! # SKU Repository

use sqlx::{Executor, Sqlite};
use tracing::debug;

use crate::error::DbResult;
use tilemart_core::Sku;

const SKU_COLUMNS: &str = "id, kind, code, name, conversion_factor, unit_label";

#[derive(Debug, Clone, Copy, Default)]
pub struct SkuRepository;

impl SkuRepository {
    pub fn new() -> Self {
        SkuRepository
    }

    /// Inserts a SKU; the `id` on the input is ignored.
    pub async fn insert<'e, E>(&self, executor: E, sku: &Sku) -> DbResult<Sku>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(code = %sku.code, kind = ?sku.kind, "Inserting SKU");

        let id = sqlx::query(
            r#"
            INSERT INTO skus (kind, code, name, conversion_factor, unit_label)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(sku.kind)
        .bind(&sku.code)
        .bind(&sku.name)
        .bind(sku.conversion_factor)
        .bind(&sku.unit_label)
        .execute(executor)
        .await?
        .last_insert_rowid();

        Ok(Sku { id, ..sku.clone() })
    }

    pub async fn get<'e, E>(&self, executor: E, id: i64) -> DbResult<Option<Sku>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {SKU_COLUMNS} FROM skus WHERE id = ?1");
        let sku = sqlx::query_as::<_, Sku>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(sku)
    }

    pub async fn get_by_code<'e, E>(&self, executor: E, code: &str) -> DbResult<Option<Sku>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {SKU_COLUMNS} FROM skus WHERE code = ?1");
        let sku = sqlx::query_as::<_, Sku>(&sql)
            .bind(code)
            .fetch_optional(executor)
            .await?;
        Ok(sku)
    }

    /// All SKUs ordered by code.
    pub async fn list<'e, E>(&self, executor: E) -> DbResult<Vec<Sku>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {SKU_COLUMNS} FROM skus ORDER BY code");
        let skus = sqlx::query_as::<_, Sku>(&sql).fetch_all(executor).await?;
        Ok(skus)
    }
}
