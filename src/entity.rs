//! Entity declarations: the columns, keys and relationships of an exposed entity.
//!
//! A declaration is the only per-entity input; resources, views and the serializer
//! template are all derived from it when the registry is built.

use crate::case::{pluralize, to_snake_case};
use crate::config::ValidationRule;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Column type. Drives PostgreSQL casts, row decoding and request value checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInt,
    Float,
    Text,
    Boolean,
    Timestamp,
    Date,
    Uuid,
    Json,
}

impl ColumnType {
    /// Parse a SQL type name ("integer", "bigserial", "varchar(255)", "timestamptz", ...).
    /// Length and precision arguments are ignored; unknown names are stored as text.
    pub fn parse(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        let base = lower.split('(').next().unwrap_or_default().trim();
        match base {
            "uuid" => ColumnType::Uuid,
            "bigint" | "int8" | "bigserial" | "serial8" => ColumnType::BigInt,
            "integer" | "int" | "int4" | "serial" | "serial4" | "smallint" | "int2" | "smallserial" | "serial2" => {
                ColumnType::Integer
            }
            "real" | "float" | "float4" | "float8" | "double" | "double precision" | "numeric" | "decimal" => {
                ColumnType::Float
            }
            "bool" | "boolean" => ColumnType::Boolean,
            "timestamp" | "timestamptz" | "timestamp with time zone" | "timestamp without time zone" | "datetime" => {
                ColumnType::Timestamp
            }
            "date" => ColumnType::Date,
            "json" | "jsonb" => ColumnType::Json,
            _ => ColumnType::Text,
        }
    }

    /// Cast target for bound parameters and DDL column type.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "int4",
            ColumnType::BigInt => "int8",
            ColumnType::Float => "float8",
            ColumnType::Text => "text",
            ColumnType::Boolean => "bool",
            ColumnType::Timestamp => "timestamptz",
            ColumnType::Date => "date",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "jsonb",
        }
    }

    /// Human-readable name used in validation messages.
    pub fn describe(&self) -> &'static str {
        match self {
            ColumnType::Integer => "a 32-bit integer",
            ColumnType::BigInt => "a 64-bit integer",
            ColumnType::Float => "a number",
            ColumnType::Text => "a string",
            ColumnType::Boolean => "a boolean",
            ColumnType::Timestamp => "an ISO 8601 timestamp",
            ColumnType::Date => "a date (YYYY-MM-DD)",
            ColumnType::Uuid => "a UUID",
            ColumnType::Json => "JSON",
        }
    }

    /// Whether a non-null JSON value is acceptable for this column.
    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            ColumnType::Integer => v.as_i64().map(|n| i32::try_from(n).is_ok()).unwrap_or(false),
            ColumnType::BigInt => v.is_i64(),
            ColumnType::Float => v.is_number(),
            ColumnType::Text => v.is_string(),
            ColumnType::Boolean => v.is_boolean(),
            ColumnType::Timestamp => v
                .as_str()
                .map(|s| {
                    DateTime::parse_from_rfc3339(s).is_ok()
                        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                })
                .unwrap_or(false),
            ColumnType::Date => v
                .as_str()
                .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
                .unwrap_or(false),
            ColumnType::Uuid => v.as_str().map(|s| uuid::Uuid::parse_str(s).is_ok()).unwrap_or(false),
            ColumnType::Json => true,
        }
    }

    /// Interpret a path or query-string value as a value of this type.
    pub fn parse_str(&self, s: &str) -> Option<Value> {
        match self {
            ColumnType::Integer => s.parse::<i32>().ok().map(Value::from),
            ColumnType::BigInt => s.parse::<i64>().ok().map(Value::from),
            ColumnType::Float => s.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(Value::Number),
            ColumnType::Boolean => {
                if s.eq_ignore_ascii_case("true") {
                    Some(Value::Bool(true))
                } else if s.eq_ignore_ascii_case("false") {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            ColumnType::Uuid => uuid::Uuid::parse_str(s).ok().map(|u| Value::String(u.to_string())),
            _ => {
                let v = Value::String(s.to_string());
                self.accepts(&v).then_some(v)
            }
        }
    }

    /// Integer and uuid keys can be generated by the store.
    pub fn can_autogenerate(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInt | ColumnType::Uuid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    pub entity: String,
    pub column: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ColumnDecl {
    pub name: String,
    pub column_type: ColumnType,
    pub primary_key: bool,
    pub foreign_key: Option<ForeignKey>,
    pub nullable: bool,
    /// SQL default expression used in DDL.
    pub default: Option<String>,
    /// Primary keys the store generates (serial / random uuid).
    pub generated: bool,
    pub validation: Option<ValidationRule>,
}

impl ColumnDecl {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDecl {
            name: name.into(),
            column_type,
            primary_key: false,
            foreign_key: None,
            nullable: true,
            default: None,
            generated: false,
            validation: None,
        }
    }

    /// Mark as primary key; integer and uuid keys are generated on insert.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self.generated = self.column_type.can_autogenerate();
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn references(mut self, entity: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            entity: entity.into(),
            column: column.into(),
        });
        self
    }

    pub fn default_sql(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn validate(mut self, rule: ValidationRule) -> Self {
        self.validation = Some(rule);
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.generated
    }

    /// Columns starting with an underscore are never exposed.
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('_')
    }

    /// Plain attributes: not a key of any kind and not hidden.
    pub fn is_attribute(&self) -> bool {
        !self.primary_key && self.foreign_key.is_none() && !self.is_hidden()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationshipKind {
    /// We hold the FK (`column` is ours).
    ToOne { column: String },
    /// The target holds the FK (`column` is theirs).
    ToMany { column: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipDecl {
    pub name: String,
    /// Declared name of the target entity.
    pub target: String,
    pub kind: RelationshipKind,
    /// Name of the reverse to-many relationship registered on the target.
    pub backref: Option<String>,
}

impl RelationshipDecl {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>, column: impl Into<String>) -> Self {
        RelationshipDecl {
            name: name.into(),
            target: target.into(),
            kind: RelationshipKind::ToOne { column: column.into() },
            backref: None,
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>, column: impl Into<String>) -> Self {
        RelationshipDecl {
            name: name.into(),
            target: target.into(),
            kind: RelationshipKind::ToMany { column: column.into() },
            backref: None,
        }
    }

    pub fn backref(mut self, name: impl Into<String>) -> Self {
        self.backref = Some(name.into());
        self
    }

    pub fn is_to_many(&self) -> bool {
        matches!(self.kind, RelationshipKind::ToMany { .. })
    }

    /// The FK column of the relationship (ours for to-one, the target's for to-many).
    pub fn column(&self) -> &str {
        match &self.kind {
            RelationshipKind::ToOne { column } | RelationshipKind::ToMany { column } => column,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EntityDecl {
    /// Declared type name, e.g. "User".
    pub name: String,
    pub table: String,
    pub schema: String,
    pub columns: Vec<ColumnDecl>,
    pub relationships: Vec<RelationshipDecl>,
}

impl EntityDecl {
    /// New declaration; the table defaults to the pluralized resource name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = pluralize(&to_snake_case(&name));
        EntityDecl {
            name,
            table,
            schema: "public".into(),
            columns: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn column(mut self, column: ColumnDecl) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipDecl) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn primary_key(&self) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Primary key column name. Declarations are validated to have exactly one.
    pub fn pk_name(&self) -> &str {
        self.primary_key().map(|c| c.name.as_str()).unwrap_or("id")
    }

    pub fn pk_type(&self) -> ColumnType {
        self.primary_key().map(|c| c.column_type).unwrap_or(ColumnType::Integer)
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDecl> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_relationship(&self, name: &str) -> Option<&RelationshipDecl> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &ColumnDecl> {
        self.columns.iter().filter(|c| c.is_attribute())
    }

    /// Singular resource name, e.g. "user" for `User`.
    pub fn resource_name(&self) -> String {
        to_snake_case(&self.name)
    }

    /// JSON:API type and url segment, e.g. "users".
    pub fn pluralized_name(&self) -> String {
        pluralize(&self.resource_name())
    }

    pub fn url(&self) -> String {
        format!("/{}", self.pluralized_name())
    }

    /// Parse a path id with the primary key type.
    pub fn parse_id(&self, raw: &str) -> Option<Value> {
        self.pk_type().parse_str(raw)
    }
}

/// A Rust type exposed through the API. Register with `RegistryBuilder::expose`.
pub trait Entity {
    fn declare() -> EntityDecl;
}
