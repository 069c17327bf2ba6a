//! Model introspection: a neutral snapshot of an entity's attributes and relationships,
//! taken from a declaration (template, no values) or from a stored row (populated).

use crate::entity::{ColumnType, EntityDecl, RelationshipKind};
use crate::error::AppError;
use crate::registry::Registry;
use crate::store::{EntityStore, Record};
use serde_json::Value;

/// A plain column of the entity (keys and `_`-prefixed columns are never attributes).
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub column_type: ColumnType,
    pub optional: bool,
    /// `None` when not filled; `Some(Value::Null)` is an explicit null.
    pub value: Option<Value>,
}

impl Attribute {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

/// Resource linkage of a relationship: target id(s).
#[derive(Clone, Debug, PartialEq)]
pub enum Linkage {
    One(Option<Value>),
    Many(Vec<Value>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub name: String,
    /// Declared name of the target entity.
    pub target: String,
    /// JSON:API type of the target.
    pub target_type: String,
    pub to_many: bool,
    pub optional: bool,
    pub value: Option<Linkage>,
}

impl Relationship {
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    /// Singular resource name, e.g. "user".
    pub name: String,
    /// JSON:API type, e.g. "users".
    pub type_name: String,
    /// Primary key of the source row; None for templates and new resources.
    pub source_id: Option<Value>,
    pub is_template: bool,
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
}

impl Model {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Column values for the store: filled attributes, plus to-one linkages written to
    /// their FK column with ids parsed by the target's key type. To-many linkage is owned
    /// by the target rows and cannot be replaced from here.
    pub fn to_values(&self, decl: &EntityDecl, registry: &Registry) -> Result<Record, AppError> {
        let mut values = Record::new();
        for a in &self.attributes {
            if let Some(v) = &a.value {
                values.insert(a.name.clone(), v.clone());
            }
        }
        for r in &self.relationships {
            let Some(linkage) = &r.value else { continue };
            let rel = decl
                .find_relationship(&r.name)
                .ok_or_else(|| AppError::BadRequest(format!("unknown relationship '{}'", r.name)))?;
            match (&rel.kind, linkage) {
                (RelationshipKind::ToOne { column }, Linkage::One(id)) => {
                    let value = match id {
                        None => Value::Null,
                        Some(id) => {
                            let target = registry.decl(&rel.target)?;
                            parse_linkage_id(&target, id)?
                        }
                    };
                    values.insert(column.clone(), value);
                }
                (RelationshipKind::ToMany { .. }, _) => {
                    return Err(AppError::Forbidden(format!(
                        "full replacement of to-many relationship '{}' is not supported",
                        r.name
                    )))
                }
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "relationship '{}' linkage has the wrong shape",
                        r.name
                    )))
                }
            }
        }
        Ok(values)
    }
}

/// Document ids are strings (or numbers); convert to the key type of `target`.
pub(crate) fn parse_linkage_id(target: &EntityDecl, id: &Value) -> Result<Value, AppError> {
    let raw = match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return Err(AppError::BadRequest(format!("invalid {} id", target.resource_name()))),
    };
    target
        .parse_id(&raw)
        .ok_or_else(|| AppError::BadRequest(format!("invalid {} id '{}'", target.resource_name(), raw)))
}

pub struct Introspector;

impl Introspector {
    /// Template model for a declaration: every attribute and relationship, no values.
    pub fn template(decl: &EntityDecl) -> Model {
        let attributes = decl
            .attributes()
            .map(|c| Attribute {
                name: c.name.clone(),
                column_type: c.column_type,
                optional: c.nullable,
                value: None,
            })
            .collect();
        let relationships = decl
            .relationships
            .iter()
            .map(|r| {
                let optional = match &r.kind {
                    RelationshipKind::ToOne { column } => {
                        decl.find_column(column).map(|c| c.nullable).unwrap_or(true)
                    }
                    RelationshipKind::ToMany { .. } => true,
                };
                Relationship {
                    name: r.name.clone(),
                    target: r.target.clone(),
                    target_type: crate::case::type_name_for(&r.target),
                    to_many: r.is_to_many(),
                    optional,
                    value: None,
                }
            })
            .collect();
        Model {
            name: decl.resource_name(),
            type_name: decl.pluralized_name(),
            source_id: None,
            is_template: true,
            attributes,
            relationships,
        }
    }

    /// Model with attribute values filled from `record`; relationships stay unfilled.
    /// Used for list responses, which carry attributes only.
    pub fn attributes_only(decl: &EntityDecl, record: &Record) -> Model {
        let mut model = Self::template(decl);
        model.is_template = false;
        model.source_id = record.get(decl.pk_name()).cloned();
        for a in &mut model.attributes {
            a.value = Some(record.get(&a.name).cloned().unwrap_or(Value::Null));
        }
        model
    }

    /// Fully populated model. To-one linkage is read from the local FK column; to-many
    /// linkage is the ids of the target rows pointing back at this one, loaded ids-only.
    pub async fn instance(
        registry: &Registry,
        store: &dyn EntityStore,
        decl: &EntityDecl,
        record: &Record,
    ) -> Result<Model, AppError> {
        let mut model = Self::attributes_only(decl, record);
        let owner_id = model.source_id.clone().unwrap_or(Value::Null);
        for (rel, decl_rel) in model.relationships.iter_mut().zip(&decl.relationships) {
            rel.value = Some(match &decl_rel.kind {
                RelationshipKind::ToOne { column } => {
                    Linkage::One(record.get(column).cloned().filter(|v| !v.is_null()))
                }
                RelationshipKind::ToMany { column } => {
                    let target = registry.decl(&decl_rel.target)?;
                    Linkage::Many(store.ids_where(&target, column, &owner_id).await?)
                }
            });
        }
        Ok(model)
    }
}
