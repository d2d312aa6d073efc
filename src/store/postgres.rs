//! PostgreSQL store over a sqlx pool.

use super::{into_row, Row, Store};
use crate::config::{EntityDescriptor, ResolvedModel};
use crate::error::AppError;
use crate::query::AbstractQuery;
use crate::sql::{Catalog, QueryBuf, SqlBuilder};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

pub struct PgStore {
    pool: PgPool,
    model: Arc<ResolvedModel>,
    catalog: Catalog,
}

impl PgStore {
    /// Connect and read column types for every configured table.
    pub async fn connect(database_url: &str, max_connections: u32, model: Arc<ResolvedModel>) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Self::with_pool(pool, model).await
    }

    pub async fn with_pool(pool: PgPool, model: Arc<ResolvedModel>) -> Result<Self, AppError> {
        let catalog = introspect(&pool, &model).await?;
        tracing::info!(entities = model.entities.len(), tables = catalog.len(), "postgres store ready");
        Ok(PgStore { pool, model, catalog })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn builder(&self) -> SqlBuilder<'_> {
        SqlBuilder::new(&self.model, &self.catalog)
    }

    async fn query_rows(&self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(into_row).collect()
    }

    async fn query_optional(&self, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, Value>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        query.fetch_optional(&self.pool).await?.map(into_row).transpose()
    }
}

/// `information_schema.columns` for the schemas the model uses, keyed by entity name.
async fn introspect(pool: &PgPool, model: &ResolvedModel) -> Result<Catalog, AppError> {
    let mut schemas: Vec<String> = model.entities.iter().map(|e| e.schema_name.clone()).collect();
    schemas.sort();
    schemas.dedup();
    let rows: Vec<(String, String, String, String)> = sqlx::query_as(
        "SELECT table_schema::text, table_name::text, column_name::text, udt_name::text \
         FROM information_schema.columns WHERE table_schema = ANY($1)",
    )
    .bind(&schemas)
    .fetch_all(pool)
    .await?;

    let entity_by_table: HashMap<(&str, &str), &str> = model
        .entities
        .iter()
        .map(|e| ((e.schema_name.as_str(), e.table_name.as_str()), e.name.as_str()))
        .collect();
    let mut catalog = Catalog::new();
    for (schema, table, column, udt) in rows {
        let Some(entity) = entity_by_table.get(&(schema.as_str(), table.as_str())) else { continue };
        catalog.entry(entity.to_string()).or_default().insert(column, udt);
    }
    for e in &model.entities {
        if !catalog.contains_key(&e.name) {
            tracing::warn!(entity = %e.name, table = %e.table_name, "table not found during introspection");
        }
    }
    Ok(catalog)
}

#[async_trait]
impl Store for PgStore {
    async fn fetch(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<Vec<Row>, AppError> {
        let q = self.builder().select(entity, query);
        self.query_rows(&q).await
    }

    async fn count(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<u64, AppError> {
        let q = self.builder().count(entity, query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let n = query.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn insert(&self, entity: &EntityDescriptor, values: &Map<String, Value>) -> Result<Row, AppError> {
        let q = self.builder().insert(entity, values);
        self.query_optional(&q)
            .await?
            .ok_or_else(|| AppError::Store(format!("insert into {} returned no row", entity.name)))
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &str,
        values: &Map<String, Value>,
    ) -> Result<Option<Row>, AppError> {
        let q = self.builder().update(entity, id, values);
        self.query_optional(&q).await
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &str) -> Result<Option<Row>, AppError> {
        let q = self.builder().delete(entity, id);
        self.query_optional(&q).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}
