//! Convert serde_json::Value to types that sqlx can bind.

use crate::entity::ColumnType;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};

/// A value that can be bound to a PostgreSQL query. Placeholders are always cast to the
/// column type (`$1::int4`), so each variant only has to pick a wire type PostgreSQL can cast from.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PgBindValue::I64(i),
                None => PgBindValue::F64(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }

    /// Wire type for a value written to a column of `column_type`. Any non-null value of a
    /// jsonb column goes over as JSON, scalars included, since `text::jsonb` would re-parse it.
    pub fn for_column(v: &Value, column_type: ColumnType) -> Self {
        match (v, column_type) {
            (Value::Null, _) => PgBindValue::Null,
            (_, ColumnType::Json) => PgBindValue::Json(v.clone()),
            _ => Self::from_json(v),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        match self {
            PgBindValue::Null => None,
            PgBindValue::Bool(_) => Some(<bool as Type<Postgres>>::type_info()),
            PgBindValue::I64(_) => Some(<i64 as Type<Postgres>>::type_info()),
            PgBindValue::F64(_) => Some(<f64 as Type<Postgres>>::type_info()),
            PgBindValue::String(_) => Some(<String as Type<Postgres>>::type_info()),
            PgBindValue::Json(_) => Some(<Value as Type<Postgres>>::type_info()),
        }
    }
}

impl Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }
}
