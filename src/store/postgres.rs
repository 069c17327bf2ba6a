//! PostgreSQL entity store over a sqlx pool.

use super::{EntityStore, ListQuery, Record};
use crate::entity::{ColumnDecl, ColumnType, EntityDecl};
use crate::error::AppError;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn query_one(&self, entity: &EntityDecl, q: &QueryBuf) -> Result<Option<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_record(&r, entity)).transpose()
    }

    async fn query_many(&self, entity: &EntityDecl, q: &QueryBuf) -> Result<Vec<Record>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| row_to_record(r, entity)).collect()
    }

    async fn execute(&self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let result = bind_all(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn fetch(&self, entity: &EntityDecl, id: &Value) -> Result<Option<Record>, AppError> {
        self.query_one(entity, &sql::select_by_id(entity, id)).await
    }

    async fn list(&self, entity: &EntityDecl, query: &ListQuery) -> Result<Vec<Record>, AppError> {
        self.query_many(entity, &sql::select_list(entity, query)).await
    }

    async fn insert(&self, entity: &EntityDecl, values: &Record) -> Result<Record, AppError> {
        self.query_one(entity, &sql::insert(entity, values))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update(&self, entity: &EntityDecl, id: &Value, values: &Record) -> Result<Option<Record>, AppError> {
        self.query_one(entity, &sql::update(entity, id, values)).await
    }

    async fn delete(&self, entity: &EntityDecl, id: &Value) -> Result<bool, AppError> {
        Ok(self.execute(&sql::delete(entity, id)).await? > 0)
    }

    async fn delete_all(&self, entity: &EntityDecl) -> Result<u64, AppError> {
        self.execute(&sql::delete_all(entity)).await
    }

    async fn ids_where(&self, entity: &EntityDecl, column: &str, value: &Value) -> Result<Vec<Value>, AppError> {
        let col = entity.find_column(column).ok_or_else(|| {
            AppError::BadRequest(format!("{} has no column '{}'", entity.name, column))
        })?;
        let pk = entity.primary_key().ok_or_else(|| {
            AppError::Config(crate::error::ConfigError::InvalidPrimaryKey {
                entity: entity.name.clone(),
                reason: "no primary key column".into(),
            })
        })?;
        let q = sql::select_ids_where(entity, col, value);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| decode_cell(r, pk).map_err(AppError::Db)).collect()
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[PgBindValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = query.bind(p.clone());
    }
    query
}

fn row_to_record(row: &PgRow, entity: &EntityDecl) -> Result<Record, AppError> {
    let mut map = Record::new();
    for col in &entity.columns {
        map.insert(col.name.clone(), decode_cell(row, col)?);
    }
    Ok(map)
}

/// Decode one cell with the declared column type.
fn decode_cell(row: &PgRow, col: &ColumnDecl) -> Result<Value, sqlx::Error> {
    let name = col.name.as_str();
    let v = match col.column_type {
        ColumnType::Integer => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        ColumnType::BigInt => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(name)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
        ColumnType::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
            .map(|d| Value::String(d.to_rfc3339())),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)?
            .map(|u| Value::String(u.to_string())),
        ColumnType::Json => row.try_get::<Option<Value>, _>(name)?,
    };
    Ok(v.unwrap_or(Value::Null))
}
