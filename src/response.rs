//! JSON:API response envelope helpers.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

/// Media type of every document this crate emits.
pub const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

/// A JSON body sent with the JSON:API media type.
#[derive(Debug)]
pub struct JsonApi(pub Value);

impl IntoResponse for JsonApi {
    fn into_response(self) -> Response {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_API_MEDIA_TYPE))],
            Json(self.0),
        )
            .into_response()
    }
}

/// Outcome of a view operation, turned into an HTTP response at the edge.
#[derive(Debug)]
pub enum ViewResponse {
    Document(Value),
    Created { location: String, document: Value },
    NoContent,
}

impl IntoResponse for ViewResponse {
    fn into_response(self) -> Response {
        match self {
            ViewResponse::Document(doc) => (StatusCode::OK, JsonApi(doc)).into_response(),
            ViewResponse::Created { location, document } => {
                let mut response = (StatusCode::CREATED, JsonApi(document)).into_response();
                if let Ok(v) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(header::LOCATION, v);
                }
                response
            }
            ViewResponse::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

/// Attach `meta` to a top-level document (list responses carry `meta.count`).
pub fn with_meta(mut document: Value, meta: Value) -> Value {
    if let Value::Object(ref mut map) = document {
        map.insert("meta".into(), meta);
    }
    document
}

pub fn error_document(status: StatusCode, code: &str, detail: String) -> Value {
    serde_json::json!({
        "errors": [
            {
                "status": status.as_u16().to_string(),
                "code": code,
                "title": status.canonical_reason().unwrap_or("Error"),
                "detail": detail
            }
        ]
    })
}
