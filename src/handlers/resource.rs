//! Resource handlers: traverse the resource tree, then hand the request to the entity's view.

use crate::error::AppError;
use crate::resource::Resource;
use crate::response::ViewResponse;
use crate::state::AppState;
use crate::view::ViewRequest;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::Method,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_body(body: &Bytes) -> Result<Option<Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| AppError::BadRequest(format!("body is not valid JSON: {}", e)))
}

async fn respond(
    state: &AppState,
    method: &Method,
    segments: &[&str],
    query: HashMap<String, String>,
    body: &Bytes,
) -> Result<ViewResponse, AppError> {
    let ctx = state.view_context();
    let resource = state.registry.root().traverse(ctx.store, segments).await?;
    let request = ViewRequest {
        query,
        body: parse_body(body)?,
    };
    let entry_for = |name: &str| {
        state
            .registry
            .get(name)
            .ok_or_else(|| AppError::NotFound(format!("no resource named '{}'", name)))
    };
    match resource {
        Resource::Collection(collection) => {
            let entry = entry_for(&collection.decl().name)?;
            entry.collection_view.dispatch(ctx, method, &request).await
        }
        Resource::Item(item) => {
            let entry = entry_for(&item.decl.name)?;
            entry.item_view.dispatch(ctx, method, &item, &request).await
        }
        Resource::Related { item, relationship } => {
            let entry = entry_for(&item.decl.name)?;
            entry.item_view.related(ctx, method, &item, &relationship).await
        }
    }
}

/// Any method on `/:collection`.
pub async fn collection(
    State(state): State<AppState>,
    method: Method,
    Path(collection): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ViewResponse, AppError> {
    respond(&state, &method, &[collection.as_str()], query, &body).await
}

/// Any method on `/:collection/:id`.
pub async fn item(
    State(state): State<AppState>,
    method: Method,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ViewResponse, AppError> {
    respond(&state, &method, &[collection.as_str(), id.as_str()], query, &body).await
}

/// Any method on `/:collection/:id/:relationship`.
pub async fn related(
    State(state): State<AppState>,
    method: Method,
    Path((collection, id, relationship)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<ViewResponse, AppError> {
    respond(&state, &method, &[collection.as_str(), id.as_str(), relationship.as_str()], query, &body).await
}
