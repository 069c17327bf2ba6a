//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from an entity declaration.

use super::PgBindValue;
use crate::entity::{ColumnDecl, EntityDecl};
use crate::store::{ListQuery, Record};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from declarations).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub(crate) fn qualified_table(entity: &EntityDecl) -> String {
    format!("{}.{}", quoted(&entity.schema), quoted(&entity.table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    /// Bound values, already typed for the column they are compared with or written to.
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the column type.
    fn push_param(&mut self, v: Value, column: &ColumnDecl) -> String {
        self.params.push(PgBindValue::for_column(&v, column.column_type));
        format!("${}::{}", self.params.len(), column.column_type.pg_type())
    }
}

fn select_column_list(entity: &EntityDecl) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk_column(entity: &EntityDecl) -> ColumnDecl {
    entity
        .primary_key()
        .cloned()
        .unwrap_or_else(|| ColumnDecl::new(entity.pk_name(), entity.pk_type()))
}

/// SELECT by primary key.
pub fn select_by_id(entity: &EntityDecl, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_column(entity);
    let ph = q.push_param(id.clone(), &pk);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        qualified_table(entity),
        quoted(&pk.name),
        ph
    );
    q
}

/// SELECT list with exact-match filters, ORDER BY pk, optional LIMIT/OFFSET.
/// Filters on undeclared columns are ignored; params are bound in filter order.
pub fn select_list(entity: &EntityDecl, query: &ListQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    for (col, val) in &query.filters {
        let Some(c) = entity.find_column(col) else { continue };
        let ph = q.push_param(val.clone(), c);
        where_parts.push(format!("{} = {}", quoted(col), ph));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}{}{}",
        select_column_list(entity),
        qualified_table(entity),
        where_clause,
        quoted(entity.pk_name()),
        limit_clause,
        offset_clause
    );
    q
}

/// SELECT pk FROM entity WHERE column = $1 ORDER BY pk. Loads ids only for to-many linkage.
pub fn select_ids_where(entity: &EntityDecl, column: &ColumnDecl, value: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(value.clone(), column);
    let pk = quoted(entity.pk_name());
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {} ORDER BY {}",
        pk,
        qualified_table(entity),
        quoted(&column.name),
        ph,
        pk
    );
    q
}

/// INSERT: declared columns in declaration order. Columns absent from `values` are omitted
/// when they have a default (so the DB applies it) and bound as NULL otherwise.
pub fn insert(entity: &EntityDecl, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        let val = values.get(&c.name).cloned();
        if val.is_none() && (c.has_default() || c.primary_key) {
            continue;
        }
        let ph = q.push_param(val.unwrap_or(Value::Null), c);
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    let table = qualified_table(entity);
    let returning = select_column_list(entity);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only declared non-key columns present in `values`.
/// With nothing to set this degrades to a SELECT by id.
pub fn update(entity: &EntityDecl, id: &Value, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in entity.columns.iter().filter(|c| !c.primary_key) {
        let Some(v) = values.get(&c.name) else { continue };
        let ph = q.push_param(v.clone(), c);
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let pk = pk_column(entity);
    let id_ph = q.push_param(id.clone(), &pk);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        qualified_table(entity),
        sets.join(", "),
        quoted(&pk.name),
        id_ph,
        select_column_list(entity)
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &EntityDecl, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = pk_column(entity);
    let ph = q.push_param(id.clone(), &pk);
    q.sql = format!("DELETE FROM {} WHERE {} = {}", qualified_table(entity), quoted(&pk.name), ph);
    q
}

/// DELETE every row.
pub fn delete_all(entity: &EntityDecl) -> QueryBuf {
    let mut q = QueryBuf::new();
    q.sql = format!("DELETE FROM {}", qualified_table(entity));
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{address_decl, user_decl};
    use crate::entity::ColumnType;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn text(s: &str) -> PgBindValue {
        PgBindValue::String(s.into())
    }

    #[test]
    fn select_by_id_casts_key() {
        let q = select_by_id(&user_decl(), &json!(5));
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "age", "best_friend_id" FROM "public"."users" WHERE "id" = $1::int4"#
        );
        assert_eq!(q.params, vec![PgBindValue::I64(5)]);
    }

    #[test]
    fn select_list_with_filters_and_paging() {
        let query = ListQuery {
            filters: vec![("name".into(), json!("Brendan")), ("bogus".into(), json!(1))],
            limit: Some(10),
            offset: Some(20),
        };
        let q = select_list(&user_decl(), &query);
        assert_eq!(
            q.sql,
            r#"SELECT "id", "name", "age", "best_friend_id" FROM "public"."users" WHERE "name" = $1::text ORDER BY "id" LIMIT 10 OFFSET 20"#
        );
        assert_eq!(q.params, vec![text("Brendan")]);
    }

    #[test]
    fn ids_where_selects_keys_only() {
        let address = address_decl();
        let owner_id = address.find_column("owner_id").unwrap();
        let q = select_ids_where(&address, owner_id, &json!(1));
        assert_eq!(
            q.sql,
            r#"SELECT "id" FROM "public"."addresses" WHERE "owner_id" = $1::int4 ORDER BY "id""#
        );
    }

    #[test]
    fn insert_omits_generated_key() {
        let q = insert(&user_decl(), &record(json!({"name": "Brendan", "age": 18})));
        assert_eq!(
            q.sql,
            r#"INSERT INTO "public"."users" ("name", "age", "best_friend_id") VALUES ($1::text, $2::int4, $3::int4) RETURNING "id", "name", "age", "best_friend_id""#
        );
        assert_eq!(q.params, vec![text("Brendan"), PgBindValue::I64(18), PgBindValue::Null]);
    }

    #[test]
    fn insert_keeps_client_key() {
        let q = insert(&user_decl(), &record(json!({"id": 9, "name": "Ann"})));
        assert!(q.sql.starts_with(r#"INSERT INTO "public"."users" ("id", "name", "age", "best_friend_id")"#));
        assert_eq!(q.params[0], PgBindValue::I64(9));
    }

    #[test]
    fn update_sets_present_columns() {
        let q = update(&user_decl(), &json!(3), &record(json!({"age": 19, "id": 4})));
        assert_eq!(
            q.sql,
            r#"UPDATE "public"."users" SET "age" = $1::int4 WHERE "id" = $2::int4 RETURNING "id", "name", "age", "best_friend_id""#
        );
        assert_eq!(q.params, vec![PgBindValue::I64(19), PgBindValue::I64(3)]);
    }

    #[test]
    fn json_columns_bind_as_json() {
        let settings = EntityDecl::new("Setting")
            .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDecl::new("prefs", ColumnType::Json));
        let q = insert(&settings, &record(json!({"prefs": "dark"})));
        assert_eq!(
            q.sql,
            r#"INSERT INTO "public"."settings" ("prefs") VALUES ($1::jsonb) RETURNING "id", "prefs""#
        );
        assert_eq!(q.params, vec![PgBindValue::Json(json!("dark"))]);
        let q = update(&settings, &json!(1), &record(json!({"prefs": true})));
        assert_eq!(q.params, vec![PgBindValue::Json(json!(true)), PgBindValue::I64(1)]);
    }

    #[test]
    fn empty_update_reads_back() {
        let q = update(&user_decl(), &json!(3), &Record::new());
        assert!(q.sql.starts_with("SELECT"));
    }

    #[test]
    fn deletes() {
        assert_eq!(delete(&user_decl(), &json!(1)).sql, r#"DELETE FROM "public"."users" WHERE "id" = $1::int4"#);
        assert_eq!(delete_all(&user_decl()).sql, r#"DELETE FROM "public"."users""#);
    }
}
