//! Declaration validation: identifiers, primary keys and referential integrity.

use crate::entity::{EntityDecl, RelationshipKind};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

const IDENTIFIER: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

pub fn validate(decls: &[EntityDecl]) -> Result<(), ConfigError> {
    let ident = Regex::new(IDENTIFIER).map_err(|e| ConfigError::Validation(e.to_string()))?;
    let check = |s: &str| {
        if ident.is_match(s) {
            Ok(())
        } else {
            Err(ConfigError::InvalidIdentifier(s.to_string()))
        }
    };

    let mut by_name: HashMap<&str, &EntityDecl> = HashMap::new();
    let mut urls = HashSet::new();
    for decl in decls {
        check(&decl.name)?;
        check(&decl.table)?;
        check(&decl.schema)?;
        if by_name.insert(decl.name.as_str(), decl).is_some() {
            return Err(ConfigError::DuplicateEntity(decl.name.clone()));
        }
        if !urls.insert(decl.pluralized_name()) {
            return Err(ConfigError::DuplicatePathSegment(decl.pluralized_name()));
        }
    }

    for decl in decls {
        let pks: Vec<_> = decl.columns.iter().filter(|c| c.primary_key).collect();
        match pks.len() {
            1 => {}
            0 => {
                return Err(ConfigError::InvalidPrimaryKey {
                    entity: decl.name.clone(),
                    reason: "no primary key column".into(),
                })
            }
            _ => {
                return Err(ConfigError::InvalidPrimaryKey {
                    entity: decl.name.clone(),
                    reason: "composite primary keys are not supported".into(),
                })
            }
        }

        compile_patterns(decl)?;

        let mut names = HashSet::new();
        for c in &decl.columns {
            check(&c.name)?;
            if !names.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: duplicate column '{}'",
                    decl.name, c.name
                )));
            }
            if let Some(fk) = &c.foreign_key {
                let target = by_name.get(fk.entity.as_str()).ok_or_else(|| ConfigError::MissingReference {
                    kind: "entity",
                    id: fk.entity.clone(),
                })?;
                if target.find_column(&fk.column).is_none() {
                    return Err(ConfigError::MissingReference {
                        kind: "column",
                        id: format!("{}.{}", fk.entity, fk.column),
                    });
                }
            }
        }

        for r in &decl.relationships {
            check(&r.name)?;
            if !names.insert(r.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{}: relationship '{}' clashes with another member",
                    decl.name, r.name
                )));
            }
            let target = by_name.get(r.target.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "entity",
                id: r.target.clone(),
            })?;
            let (owner, column) = match &r.kind {
                RelationshipKind::ToOne { column } => (decl, column),
                RelationshipKind::ToMany { column } => (*target, column),
            };
            let fk = owner
                .find_column(column)
                .ok_or_else(|| ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", owner.name, column),
                })?;
            if fk.column_type != target_key_type(decl, target, &r.kind) {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: column '{}' does not match the referenced key type",
                    decl.name, r.name, column
                )));
            }
        }
    }
    Ok(())
}

/// Compiled `pattern` rules of an entity's columns, keyed by column name.
pub fn compile_patterns(decl: &EntityDecl) -> Result<HashMap<String, Regex>, ConfigError> {
    decl.columns
        .iter()
        .filter_map(|c| {
            let pattern = c.validation.as_ref()?.pattern.as_ref()?;
            let compiled = Regex::new(pattern).map(|re| (c.name.clone(), re)).map_err(|e| {
                ConfigError::Validation(format!("{}.{}: invalid pattern: {}", decl.name, c.name, e))
            });
            Some(compiled)
        })
        .collect()
}

/// Type the relationship's FK column must have: the key of the entity it points at.
fn target_key_type(decl: &EntityDecl, target: &EntityDecl, kind: &RelationshipKind) -> crate::entity::ColumnType {
    match kind {
        RelationshipKind::ToOne { .. } => target.pk_type(),
        RelationshipKind::ToMany { .. } => decl.pk_type(),
    }
}
