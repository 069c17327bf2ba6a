//! Typed errors and HTTP mapping to JSON:API error documents.

use crate::response::{error_document, JsonApi};
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::postgres::PgDatabaseError;
use thiserror::Error;

/// Problems with entity declarations, raised while building the registry.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: entity {entity}: {reason}")]
    InvalidPrimaryKey { entity: String, reason: String },
    #[error("entity exposed twice: {0}")]
    DuplicateEntity(String),
    #[error("duplicate url segment: {0}")]
    DuplicatePathSegment(String),
    #[error("invalid identifier: '{0}'")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("method {method} not allowed")]
    MethodNotAllowed { method: String, allow: &'static str },
}

impl AppError {
    /// The entity behind `id` does not exist.
    pub fn entity_not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        AppError::NotFound(format!("Cannot find {} identified by \"{}\"", entity, id))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => db_status(e),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::MethodNotAllowed { .. } => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        }
    }
}

fn db_code(e: &sqlx::Error) -> Option<String> {
    e.as_database_error().and_then(|d| d.code().map(|c| c.into_owned()))
}

fn db_status(e: &sqlx::Error) -> (StatusCode, &'static str) {
    if let sqlx::Error::RowNotFound = e {
        return (StatusCode::NOT_FOUND, "not_found");
    }
    match db_code(e).as_deref() {
        Some("23505") | Some("23503") => (StatusCode::CONFLICT, "conflict"),
        Some("23502") | Some("22P02") | Some("22003") | Some("22007") | Some("22008") => {
            (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
    }
}

/// Client-facing text for a database error; the server's own message stays in the logs.
fn db_detail(e: &sqlx::Error) -> String {
    let pg = e
        .as_database_error()
        .and_then(|d| d.try_downcast_ref::<PgDatabaseError>());
    let column = pg.and_then(|d| d.column());
    let table = pg.and_then(|d| d.table());
    let target = match (table, column) {
        (Some(t), Some(c)) => format!("{}.{}", t, c),
        (None, Some(c)) => c.to_string(),
        _ => "a column".to_string(),
    };
    match db_code(e).as_deref() {
        None if matches!(e, sqlx::Error::RowNotFound) => "resource not found".into(),
        Some("23505") => "an entity with the same key already exists".into(),
        Some("23503") => "the change conflicts with a reference between entities".into(),
        Some("23502") => format!("{} is required", target),
        Some("22003") => format!("value for {} is out of range", target),
        Some(_) => format!("value for {} is not valid for its type", target),
        None => "database error".into(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let detail = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else if let AppError::Db(e) = &self {
            tracing::debug!(error = %e, "database rejected request");
            db_detail(e)
        } else {
            self.to_string()
        };
        let body = error_document(status, code, detail);
        let mut response = (status, JsonApi(body)).into_response();
        if let AppError::MethodNotAllowed { allow, .. } = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(allow));
        }
        response
    }
}
