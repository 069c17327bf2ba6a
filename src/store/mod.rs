//! Entity storage seam. Views load and persist entities only through `EntityStore`.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::entity::EntityDecl;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// A stored row keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Exact-match filters plus paging for collection reads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListQuery {
    pub filters: Vec<(String, Value)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub fn filter(mut self, column: impl Into<String>, value: Value) -> Self {
        self.filters.push((column.into(), value));
        self
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one row by primary key.
    async fn fetch(&self, entity: &EntityDecl, id: &Value) -> Result<Option<Record>, AppError>;

    /// Rows matching all filters, ordered by primary key.
    async fn list(&self, entity: &EntityDecl, query: &ListQuery) -> Result<Vec<Record>, AppError>;

    /// Insert one row. The primary key may be omitted when it is generated. Returns the stored row.
    async fn insert(&self, entity: &EntityDecl, values: &Record) -> Result<Record, AppError>;

    /// Update the given columns of one row. Returns the updated row, or None when it does not exist.
    async fn update(&self, entity: &EntityDecl, id: &Value, values: &Record) -> Result<Option<Record>, AppError>;

    /// Delete one row. Returns whether it existed.
    async fn delete(&self, entity: &EntityDecl, id: &Value) -> Result<bool, AppError>;

    /// Delete every row of the entity. Returns the number of rows removed.
    async fn delete_all(&self, entity: &EntityDecl) -> Result<u64, AppError>;

    /// Primary keys of the rows whose `column` equals `value` (ids only, no other columns).
    async fn ids_where(&self, entity: &EntityDecl, column: &str, value: &Value) -> Result<Vec<Value>, AppError>;

    /// Readiness check.
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
