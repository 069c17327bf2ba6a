//! Column rule checks on values about to be written.

use crate::config::{compile_patterns, ValidationRule};
use crate::entity::EntityDecl;
use crate::error::{AppError, ConfigError};
use crate::store::Record;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Column rules of one entity, with `pattern` rules compiled up front.
#[derive(Debug, Default)]
pub struct RequestValidator {
    patterns: HashMap<String, Regex>,
}

impl RequestValidator {
    pub fn new(entity: &EntityDecl) -> Result<Self, ConfigError> {
        Ok(RequestValidator {
            patterns: compile_patterns(entity)?,
        })
    }

    /// Values for a new row: every non-null column without a default must be present,
    /// and present values must satisfy their column rules.
    pub fn validate_create(&self, entity: &EntityDecl, values: &Record) -> Result<(), AppError> {
        for c in &entity.columns {
            let missing = values.get(&c.name).map(Value::is_null).unwrap_or(true);
            if missing && !c.nullable && !c.has_default() {
                return Err(AppError::Validation(format!(
                    "{}.{} is required",
                    entity.resource_name(),
                    c.name
                )));
            }
        }
        self.validate_partial(entity, values)
    }

    /// Only the values present are checked (PATCH).
    pub fn validate_partial(&self, entity: &EntityDecl, values: &Record) -> Result<(), AppError> {
        for (name, v) in values {
            let rule = entity.find_column(name).and_then(|c| c.validation.as_ref());
            if let Some(rule) = rule {
                validate_field(name, v, rule, self.patterns.get(name))?;
            }
        }
        Ok(())
    }
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule, pattern: Option<&Regex>) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(col, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(AppError::Validation(format!("{} must be at most {} characters", col, max)));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(AppError::Validation(format!("{} must be at least {} characters", col, min)));
            }
        }
        if let Some(re) = pattern {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err(AppError::Validation(format!(
                "{} must be one of: {:?}",
                col,
                allowed.iter().take(5).collect::<Vec<_>>()
            )));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(col: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else { return Ok(()) };
    match format.to_lowercase().as_str() {
        "email" => {
            let valid = s
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
                .unwrap_or(false);
            if !valid {
                return Err(AppError::Validation(format!("{} must be a valid email", col)));
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err(AppError::Validation(format!("{} must be a valid UUID", col)));
            }
        }
        _ => {}
    }
    Ok(())
}
