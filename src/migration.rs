//! Database initialization from declarations: schemas, tables, then foreign keys.
//! Everything is idempotent; existing tables are left as they are.

use crate::entity::{ColumnDecl, ColumnType, EntityDecl};
use crate::error::AppError;
use crate::registry::Registry;
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;

/// Create missing schemas and tables for every exposed entity, then add foreign keys.
pub async fn ensure_tables(pool: &PgPool, registry: &Registry) -> Result<(), AppError> {
    let mut schemas: Vec<&str> = registry.entries().iter().map(|e| e.decl.schema.as_str()).collect();
    schemas.sort_unstable();
    schemas.dedup();
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema)))
            .execute(pool)
            .await?;
    }

    for entry in registry.entries() {
        let sql = table_ddl(&entry.decl);
        tracing::debug!(sql = %sql, "ensure table");
        sqlx::query(&sql).execute(pool).await?;
    }

    for entry in registry.entries() {
        for (name, sql) in foreign_key_ddl(&entry.decl, registry) {
            match sqlx::query(&sql).execute(pool).await {
                Ok(_) => tracing::info!(constraint = %name, "added foreign key"),
                Err(e) if is_duplicate_object(&e) => tracing::debug!(constraint = %name, "foreign key exists"),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

fn is_duplicate_object(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|d| d.code())
        .map(|c| c == "42710")
        .unwrap_or(false)
}

fn column_ddl(c: &ColumnDecl) -> String {
    let auto = c.primary_key && c.generated && c.default.is_none();
    let typ = match c.column_type {
        ColumnType::Integer if auto => "SERIAL",
        ColumnType::BigInt if auto => "BIGSERIAL",
        other => other.pg_type(),
    };
    let mut def = format!("{} {}", quoted(&c.name), typ);
    if c.primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !c.nullable {
        def.push_str(" NOT NULL");
    }
    match &c.default {
        Some(d) => {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        None if auto && c.column_type == ColumnType::Uuid => def.push_str(" DEFAULT gen_random_uuid()"),
        None => {}
    }
    def
}

/// CREATE TABLE IF NOT EXISTS with columns in declaration order.
pub fn table_ddl(entity: &EntityDecl) -> String {
    let cols: Vec<String> = entity.columns.iter().map(column_ddl).collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(entity),
        cols.join(",\n  ")
    )
}

/// ALTER TABLE ... ADD CONSTRAINT for each declared foreign key, with the constraint name.
pub fn foreign_key_ddl(entity: &EntityDecl, registry: &Registry) -> Vec<(String, String)> {
    entity
        .columns
        .iter()
        .filter_map(|c| {
            let fk = c.foreign_key.as_ref()?;
            let target = registry.get(&fk.entity)?;
            let name = format!("fk_{}_{}", entity.table, c.name);
            let sql = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                qualified_table(entity),
                quoted(&name),
                quoted(&c.name),
                qualified_table(&target.decl),
                quoted(&fk.column)
            );
            Some((name, sql))
        })
        .collect()
}
