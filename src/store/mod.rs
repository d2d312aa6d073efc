//! Storage capability consumed by the resource service.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::EntityDescriptor;
use crate::error::AppError;
use crate::query::AbstractQuery;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// One stored row as a JSON object, included relations and `{relation}_count` keys merged in.
pub type Row = Map<String, Value>;

/// Executes abstract queries and writes for one resolved model.
///
/// Keys are passed as strings and coerced by the store to the entity's key type. Soft-deleted
/// rows (entities with a `deleted_at` column) are invisible to every operation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Rows matching the filters, in sort order, limited to the window when present.
    async fn fetch(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<Vec<Row>, AppError>;

    /// Number of rows matching the filters. Sorts, includes and the window are ignored.
    async fn count(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<u64, AppError>;

    /// Insert a row from the given columns; the store sets key and timestamps.
    async fn insert(&self, entity: &EntityDescriptor, values: &Map<String, Value>) -> Result<Row, AppError>;

    /// Update the given columns. `None` when no row has this key.
    async fn update(&self, entity: &EntityDescriptor, id: &str, values: &Map<String, Value>)
        -> Result<Option<Row>, AppError>;

    /// Delete (or soft delete) by key, returning the removed row.
    async fn delete(&self, entity: &EntityDescriptor, id: &str) -> Result<Option<Row>, AppError>;

    /// Readiness probe.
    async fn ping(&self) -> Result<(), AppError>;
}

fn into_row(value: Value) -> Result<Row, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Store(format!("expected a row object, got {}", other))),
    }
}
