//! Raw entity declaration types as read from JSON files.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s.as_str(),
            ColumnTypeConfig::Parameterized { name, .. } => name.as_str(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(String),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = serde_json::Value::deserialize(deserializer)?;
        match v {
            serde_json::Value::String(s) => Ok(ColumnDefaultConfig::Literal(s)),
            serde_json::Value::Number(n) => Ok(ColumnDefaultConfig::Expression {
                expression: n.to_string(),
            }),
            serde_json::Value::Bool(b) => Ok(ColumnDefaultConfig::Expression {
                expression: b.to_string(),
            }),
            serde_json::Value::Object(mut obj) => {
                if let Some(serde_json::Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(serde_json::Value::String(s)) = obj.remove("value").or_else(|| obj.remove("literal")) {
                    return Ok(ColumnDefaultConfig::Literal(s));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a scalar, {{ \"expression\": \"...\" }}, or {{ \"value\": \"...\" }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            other => Err(serde::de::Error::custom(format!(
                "column default must be a scalar or {{ \"expression\": \"...\" }}; got {}",
                if other.is_null() { "null" } else { "array" }
            ))),
        }
    }
}

impl ColumnDefaultConfig {
    /// SQL expression for DDL; literals are quoted.
    pub fn to_sql(&self) -> String {
        match self {
            ColumnDefaultConfig::Literal(s) => format!("'{}'", s.replace('\'', "''")),
            ColumnDefaultConfig::Expression { expression } => expression.clone(),
        }
    }
}

/// Target of a foreign key. `column` defaults to the target's primary key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForeignKeyConfig {
    pub entity: String,
    #[serde(default)]
    pub column: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    #[serde(default)]
    pub references: Option<ForeignKeyConfig>,
    #[serde(default)]
    pub validation: Option<ValidationRule>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKindConfig {
    ToOne,
    ToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub name: String,
    pub target: String,
    pub kind: RelationshipKindConfig,
    /// Local FK column for to_one, FK column on the target for to_many.
    pub column: String,
    #[serde(default)]
    pub backref: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relationships: Vec<RelationshipConfig>,
    /// Declared but not exposed entities are skipped by the loader.
    #[serde(default = "default_true")]
    pub exposed: bool,
}
