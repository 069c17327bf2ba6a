//! JSON:API rendering of introspected models, and parsing of request documents back
//! into models.

use crate::entity::ColumnType;
use crate::error::AppError;
use crate::introspect::{Attribute, Linkage, Model, Relationship};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

/// Ids travel as strings on the wire.
pub fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub trait Serializer: Send + Sync {
    /// Single resource document, relationships included.
    fn serialize(&self, model: &Model) -> Value;

    /// Collection document; resources carry attributes only.
    fn serialize_list(&self, models: &[Model]) -> Value;

    /// Parse a request document against `template`. Only members present in the document
    /// are filled in the returned model.
    fn deserialize(&self, document: &Value, template: &Model) -> Result<Model, AppError>;

    fn serialize_attribute(&self, attribute: &Attribute) -> Value {
        attribute.value.clone().unwrap_or(Value::Null)
    }

    /// Relationship object: `{"data": <linkage>}`.
    fn serialize_relationship(&self, relationship: &Relationship) -> Value {
        let identifier = |id: &Value| json!({"type": relationship.target_type, "id": id_string(id)});
        let data = match &relationship.value {
            Some(Linkage::One(Some(id))) => identifier(id),
            Some(Linkage::Many(ids)) => Value::Array(ids.iter().map(identifier).collect()),
            Some(Linkage::One(None)) | None if relationship.to_many => Value::Array(Vec::new()),
            Some(Linkage::One(None)) | None => Value::Null,
        };
        json!({ "data": data })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JsonApiSerializer;

impl JsonApiSerializer {
    /// Resource identifier object of a populated model.
    pub fn serialize_identifier(&self, model: &Model) -> Value {
        json!({
            "type": model.type_name,
            "id": model.source_id.as_ref().map(id_string),
        })
    }

    fn resource_object(&self, model: &Model, with_relationships: bool) -> Value {
        let mut object = Map::new();
        object.insert("type".into(), Value::String(model.type_name.clone()));
        if let Some(id) = &model.source_id {
            object.insert("id".into(), Value::String(id_string(id)));
        }
        let attributes: Map<String, Value> = model
            .attributes
            .iter()
            .filter(|a| a.has_value())
            .map(|a| (a.name.clone(), self.serialize_attribute(a)))
            .collect();
        object.insert("attributes".into(), Value::Object(attributes));
        if with_relationships {
            let relationships: Map<String, Value> = model
                .relationships
                .iter()
                .filter(|r| r.has_value())
                .map(|r| (r.name.clone(), self.serialize_relationship(r)))
                .collect();
            object.insert("relationships".into(), Value::Object(relationships));
        }
        Value::Object(object)
    }
}

/// UTC, ISO 8601, whole seconds. Zone-less timestamps are taken as UTC; anything
/// unparseable is passed through.
fn normalize_timestamp(value: &Value) -> Value {
    let Some(s) = value.as_str() else {
        return value.clone();
    };
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|n| n.and_utc()));
    match parsed {
        Ok(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Secs, false)),
        Err(_) => value.clone(),
    }
}

impl Serializer for JsonApiSerializer {
    fn serialize(&self, model: &Model) -> Value {
        json!({ "data": self.resource_object(model, true) })
    }

    fn serialize_list(&self, models: &[Model]) -> Value {
        let data: Vec<Value> = models.iter().map(|m| self.resource_object(m, false)).collect();
        json!({ "data": data })
    }

    fn serialize_attribute(&self, attribute: &Attribute) -> Value {
        match (&attribute.value, attribute.column_type) {
            (Some(v), ColumnType::Timestamp) => normalize_timestamp(v),
            (Some(v), _) => v.clone(),
            (None, _) => Value::Null,
        }
    }

    fn deserialize(&self, document: &Value, template: &Model) -> Result<Model, AppError> {
        let data = document
            .get("data")
            .and_then(Value::as_object)
            .ok_or_else(|| AppError::BadRequest("document must contain a 'data' object".into()))?;
        let type_name = data
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("resource object must have a 'type'".into()))?;
        if type_name != template.type_name {
            return Err(AppError::Conflict(format!(
                "type '{}' does not match endpoint type '{}'",
                type_name, template.type_name
            )));
        }

        let mut model = template.clone();
        model.is_template = false;
        model.source_id = match data.get("id") {
            None | Some(Value::Null) => None,
            Some(id @ (Value::String(_) | Value::Number(_))) => Some(id.clone()),
            Some(_) => return Err(AppError::BadRequest("'id' must be a string".into())),
        };

        if let Some(attributes) = member_object(data, "attributes")? {
            for (name, value) in attributes {
                let attribute = model
                    .attributes
                    .iter_mut()
                    .find(|a| a.name == *name)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown attribute '{}'", name)))?;
                check_attribute(&model.name, attribute, value)?;
                attribute.value = Some(value.clone());
            }
        }

        if let Some(relationships) = member_object(data, "relationships")? {
            for (name, value) in relationships {
                let relationship = model
                    .relationships
                    .iter_mut()
                    .find(|r| r.name == *name)
                    .ok_or_else(|| AppError::BadRequest(format!("unknown relationship '{}'", name)))?;
                let linkage = value.get("data").ok_or_else(|| {
                    AppError::BadRequest(format!("relationship '{}' must contain 'data'", name))
                })?;
                relationship.value = Some(parse_linkage(relationship, linkage)?);
            }
        }
        Ok(model)
    }
}

fn member_object<'a>(data: &'a Map<String, Value>, member: &str) -> Result<Option<&'a Map<String, Value>>, AppError> {
    match data.get(member) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(AppError::BadRequest(format!("'{}' must be an object", member))),
    }
}

fn check_attribute(resource: &str, attribute: &Attribute, value: &Value) -> Result<(), AppError> {
    if value.is_null() {
        if !attribute.optional {
            return Err(AppError::Validation(format!("{}.{} cannot be null", resource, attribute.name)));
        }
        return Ok(());
    }
    if !attribute.column_type.accepts(value) {
        return Err(AppError::Validation(format!(
            "{}.{} must be {}",
            resource,
            attribute.name,
            attribute.column_type.describe()
        )));
    }
    Ok(())
}

fn parse_identifier(relationship: &Relationship, identifier: &Value) -> Result<Value, AppError> {
    let type_name = identifier.get("type").and_then(Value::as_str);
    let id = identifier.get("id").filter(|v| v.is_string() || v.is_number());
    match (type_name, id) {
        (Some(t), Some(id)) if t == relationship.target_type => Ok(id.clone()),
        (Some(t), Some(_)) => Err(AppError::Conflict(format!(
            "relationship '{}' expects type '{}', got '{}'",
            relationship.name, relationship.target_type, t
        ))),
        _ => Err(AppError::BadRequest(format!(
            "relationship '{}' linkage must be a resource identifier",
            relationship.name
        ))),
    }
}

fn parse_linkage(relationship: &Relationship, linkage: &Value) -> Result<Linkage, AppError> {
    match (relationship.to_many, linkage) {
        (false, Value::Null) if !relationship.optional => Err(AppError::Validation(format!(
            "relationship '{}' cannot be null",
            relationship.name
        ))),
        (false, Value::Null) => Ok(Linkage::One(None)),
        (false, Value::Object(_)) => Ok(Linkage::One(Some(parse_identifier(relationship, linkage)?))),
        (true, Value::Array(items)) => Ok(Linkage::Many(
            items
                .iter()
                .map(|i| parse_identifier(relationship, i))
                .collect::<Result<_, _>>()?,
        )),
        _ => Err(AppError::BadRequest(format!(
            "relationship '{}' linkage has the wrong shape",
            relationship.name
        ))),
    }
}
