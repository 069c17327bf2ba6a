//! Load entity declarations from in-memory configs or a JSON file.

use crate::config::types::*;
use crate::entity::{ColumnDecl, ColumnType, EntityDecl, RelationshipDecl};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Turn raw configs into declarations. Entities with `exposed: false` are only used to
/// resolve foreign keys that point at them and are not returned.
pub fn resolve(configs: &[EntityConfig]) -> Result<Vec<EntityDecl>, ConfigError> {
    let pk_by_entity: HashMap<&str, &str> = configs
        .iter()
        .filter_map(|e| {
            e.columns
                .iter()
                .find(|c| c.primary_key)
                .map(|c| (e.name.as_str(), c.name.as_str()))
        })
        .collect();

    let mut decls = Vec::new();
    for config in configs.iter().filter(|e| e.exposed) {
        let mut decl = EntityDecl::new(config.name.clone());
        if let Some(table) = &config.table {
            decl = decl.table(table.clone());
        }
        if let Some(schema) = &config.schema {
            decl = decl.schema(schema.clone());
        }
        for c in &config.columns {
            decl = decl.column(resolve_column(c, &pk_by_entity)?);
        }
        for r in &config.relationships {
            let rel = match r.kind {
                RelationshipKindConfig::ToOne => RelationshipDecl::to_one(&r.name, &r.target, &r.column),
                RelationshipKindConfig::ToMany => RelationshipDecl::to_many(&r.name, &r.target, &r.column),
            };
            decl = decl.relationship(match &r.backref {
                Some(b) => rel.backref(b.clone()),
                None => rel,
            });
        }
        decls.push(decl);
    }
    Ok(decls)
}

fn resolve_column(c: &ColumnConfig, pk_by_entity: &HashMap<&str, &str>) -> Result<ColumnDecl, ConfigError> {
    let type_name = c.type_.name();
    let mut col = ColumnDecl::new(c.name.clone(), ColumnType::parse(type_name));
    if c.primary_key {
        col = col.primary_key();
        // An explicit serial type or a default decides generation, not the column type alone.
        let lower = type_name.to_lowercase();
        col.generated = lower.contains("serial") || (col.column_type == ColumnType::Uuid && c.default.is_none());
    } else if !c.nullable {
        col = col.not_null();
    }
    if let Some(default) = &c.default {
        col = col.default_sql(default.to_sql());
    }
    if let Some(fk) = &c.references {
        let column = match &fk.column {
            Some(column) => column.clone(),
            None => pk_by_entity
                .get(fk.entity.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: fk.entity.clone(),
                })?,
        };
        col = col.references(fk.entity.clone(), column);
    }
    if let Some(rule) = &c.validation {
        col = col.validate(rule.clone());
    }
    Ok(col)
}

/// Parse a JSON array of entity configs.
pub fn parse_configs(json: &str) -> Result<Vec<EntityConfig>, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and resolve declarations from a JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<Vec<EntityDecl>, ConfigError> {
    let path = path.as_ref();
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let configs = parse_configs(&json)?;
    tracing::debug!(path = %path.display(), entities = configs.len(), "loaded entity configs");
    resolve(&configs)
}
