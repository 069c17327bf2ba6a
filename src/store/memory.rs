//! In-process entity store. Keeps rows per table in insertion order; enforces primary key
//! uniqueness and NOT NULL, but not foreign keys.

use super::{EntityStore, ListQuery, Record};
use crate::entity::{ColumnDecl, ColumnType, EntityDecl};
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Table {
    rows: Vec<Record>,
    last_id: i64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Table>> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Table>> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn table_key(entity: &EntityDecl) -> String {
    format!("{}.{}", entity.schema, entity.table)
}

/// Evaluate simple SQL literal defaults ('text', numbers, booleans). Expressions stay NULL.
fn literal_default(column: &ColumnDecl) -> Value {
    let Some(expr) = column.default.as_deref().map(str::trim) else {
        return Value::Null;
    };
    if expr.len() >= 2 && expr.starts_with('\'') && expr.ends_with('\'') {
        return Value::String(expr[1..expr.len() - 1].replace("''", "'"));
    }
    if expr.eq_ignore_ascii_case("true") || expr.eq_ignore_ascii_case("false") {
        return Value::Bool(expr.eq_ignore_ascii_case("true"));
    }
    serde_json::from_str::<serde_json::Number>(expr)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

fn check_not_null(entity: &EntityDecl, column: &ColumnDecl, value: &Value) -> Result<(), AppError> {
    if value.is_null() && !column.nullable {
        return Err(AppError::Validation(format!(
            "{}.{} cannot be null",
            entity.resource_name(),
            column.name
        )));
    }
    Ok(())
}

fn pk_of(entity: &EntityDecl, row: &Record) -> Value {
    row.get(entity.pk_name()).cloned().unwrap_or(Value::Null)
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn fetch(&self, entity: &EntityDecl, id: &Value) -> Result<Option<Record>, AppError> {
        let tables = self.read();
        Ok(tables
            .get(&table_key(entity))
            .and_then(|t| t.rows.iter().find(|r| pk_of(entity, r) == *id))
            .cloned())
    }

    async fn list(&self, entity: &EntityDecl, query: &ListQuery) -> Result<Vec<Record>, AppError> {
        let tables = self.read();
        let Some(table) = tables.get(&table_key(entity)) else {
            return Ok(Vec::new());
        };
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        Ok(table
            .rows
            .iter()
            .filter(|r| {
                query.filters.iter().all(|(col, val)| {
                    entity.find_column(col).is_none() || r.get(col).unwrap_or(&Value::Null) == val
                })
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert(&self, entity: &EntityDecl, values: &Record) -> Result<Record, AppError> {
        let mut tables = self.write();
        let table = tables.entry(table_key(entity)).or_default();
        let mut row = Record::new();
        for c in &entity.columns {
            let given = values.get(&c.name).cloned().filter(|v| !v.is_null());
            let value = if c.primary_key {
                match given {
                    Some(v) => {
                        if table.rows.iter().any(|r| pk_of(entity, r) == v) {
                            return Err(AppError::Conflict(format!(
                                "{} identified by \"{}\" already exists",
                                entity.resource_name(),
                                crate::serializer::id_string(&v)
                            )));
                        }
                        if let Some(n) = v.as_i64() {
                            table.last_id = table.last_id.max(n);
                        }
                        v
                    }
                    None if c.has_default() => match c.column_type {
                        ColumnType::Integer | ColumnType::BigInt => {
                            table.last_id += 1;
                            Value::from(table.last_id)
                        }
                        ColumnType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
                        _ => literal_default(c),
                    },
                    None => Value::Null,
                }
            } else {
                match values.get(&c.name) {
                    Some(v) => v.clone(),
                    // Expression defaults are not evaluated here.
                    None if c.has_default() => {
                        row.insert(c.name.clone(), literal_default(c));
                        continue;
                    }
                    None => Value::Null,
                }
            };
            check_not_null(entity, c, &value)?;
            row.insert(c.name.clone(), value);
        }
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, entity: &EntityDecl, id: &Value, values: &Record) -> Result<Option<Record>, AppError> {
        let mut tables = self.write();
        let Some(row) = tables
            .get_mut(&table_key(entity))
            .and_then(|t| t.rows.iter_mut().find(|r| pk_of(entity, r) == *id))
        else {
            return Ok(None);
        };
        let mut updated = row.clone();
        for c in entity.columns.iter().filter(|c| !c.primary_key) {
            if let Some(v) = values.get(&c.name) {
                check_not_null(entity, c, v)?;
                updated.insert(c.name.clone(), v.clone());
            }
        }
        *row = updated.clone();
        Ok(Some(updated))
    }

    async fn delete(&self, entity: &EntityDecl, id: &Value) -> Result<bool, AppError> {
        let mut tables = self.write();
        let Some(table) = tables.get_mut(&table_key(entity)) else {
            return Ok(false);
        };
        let before = table.rows.len();
        table.rows.retain(|r| pk_of(entity, r) != *id);
        Ok(table.rows.len() != before)
    }

    async fn delete_all(&self, entity: &EntityDecl) -> Result<u64, AppError> {
        let mut tables = self.write();
        Ok(tables
            .get_mut(&table_key(entity))
            .map(|t| std::mem::take(&mut t.rows).len() as u64)
            .unwrap_or(0))
    }

    async fn ids_where(&self, entity: &EntityDecl, column: &str, value: &Value) -> Result<Vec<Value>, AppError> {
        if entity.find_column(column).is_none() {
            return Err(AppError::BadRequest(format!("{} has no column '{}'", entity.name, column)));
        }
        let tables = self.read();
        Ok(tables
            .get(&table_key(entity))
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|r| r.get(column) == Some(value))
                    .map(|r| pk_of(entity, r))
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{address_decl, user_decl};
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn generates_sequential_ids() {
        let store = MemoryStore::new();
        let user = user_decl();
        let a = store.insert(&user, &record(json!({"name": "A"}))).await.unwrap();
        let b = store.insert(&user, &record(json!({"name": "B"}))).await.unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["id"], json!(2));
        assert_eq!(b["age"], Value::Null);
    }

    #[tokio::test]
    async fn client_ids_and_conflicts() {
        let store = MemoryStore::new();
        let user = user_decl();
        store.insert(&user, &record(json!({"id": 10, "name": "A"}))).await.unwrap();
        let err = store.insert(&user, &record(json!({"id": 10}))).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let next = store.insert(&user, &Record::new()).await.unwrap();
        assert_eq!(next["id"], json!(11));
    }

    #[tokio::test]
    async fn not_null_is_enforced() {
        let store = MemoryStore::new();
        let err = store
            .insert(&address_decl(), &record(json!({"city": "Paris"})))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn update_delete_and_ids_where() {
        let store = MemoryStore::new();
        let address = address_decl();
        for city in ["Paris", "Lyon", "Nice"] {
            store
                .insert(&address, &record(json!({"city": city, "owner_id": 1})))
                .await
                .unwrap();
        }
        store.insert(&address, &record(json!({"city": "Oslo", "owner_id": 2}))).await.unwrap();

        assert_eq!(store.ids_where(&address, "owner_id", &json!(1)).await.unwrap(), vec![json!(1), json!(2), json!(3)]);

        let updated = store
            .update(&address, &json!(2), &record(json!({"city": "Lille"})))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated["city"], "Lille");
        assert!(store.update(&address, &json!(99), &Record::new()).await.unwrap().is_none());

        assert!(store.delete(&address, &json!(1)).await.unwrap());
        assert!(!store.delete(&address, &json!(1)).await.unwrap());

        let page = store
            .list(&address, &ListQuery { limit: Some(1), offset: Some(1), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page[0]["city"], "Nice");

        assert_eq!(store.delete_all(&address).await.unwrap(), 3);
        assert!(store.list(&address, &ListQuery::default()).await.unwrap().is_empty());
    }

    #[test]
    fn literal_defaults() {
        let c = ColumnDecl::new("city", ColumnType::Text).default_sql("'O''Hare'");
        assert_eq!(literal_default(&c), json!("O'Hare"));
        let n = ColumnDecl::new("n", ColumnType::Integer).default_sql("3");
        assert_eq!(literal_default(&n), json!(3));
        let e = ColumnDecl::new("at", ColumnType::Timestamp).default_sql("NOW()");
        assert_eq!(literal_default(&e), Value::Null);
    }
}
