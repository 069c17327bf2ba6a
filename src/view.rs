//! Item and collection views: the CRUD operations of one entity, bound to HTTP methods.
//!
//! Views are built once per exposed entity when the registry is built. Per-request state
//! (store, serializer, paging) is passed in through `ViewContext`.

use crate::entity::{EntityDecl, RelationshipKind};
use crate::error::AppError;
use crate::introspect::{parse_linkage_id, Introspector, Linkage, Model};
use crate::registry::Registry;
use crate::resource::ResourceItem;
use crate::response::{with_meta, ViewResponse};
use crate::serializer::{id_string, Serializer};
use crate::service::RequestValidator;
use crate::settings::Paging;
use crate::store::{EntityStore, ListQuery, Record};
use axum::http::Method;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemOperation {
    Read,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectionOperation {
    Add,
    List,
    Empty,
}

pub const ITEM_BINDINGS: &[(&str, ItemOperation)] = &[
    ("GET", ItemOperation::Read),
    ("PATCH", ItemOperation::Update),
    ("DELETE", ItemOperation::Delete),
];

pub const COLLECTION_BINDINGS: &[(&str, CollectionOperation)] = &[
    ("GET", CollectionOperation::List),
    ("POST", CollectionOperation::Add),
    ("DELETE", CollectionOperation::Empty),
];

fn bound<T: Copy>(bindings: &[(&str, T)], method: &Method, allow: &'static str) -> Result<T, AppError> {
    bindings
        .iter()
        .find(|(m, _)| *m == method.as_str())
        .map(|(_, op)| *op)
        .ok_or_else(|| AppError::MethodNotAllowed {
            method: method.to_string(),
            allow,
        })
}

impl ItemOperation {
    pub const ALLOW: &'static str = "GET, PATCH, DELETE";

    pub fn for_method(method: &Method) -> Result<Self, AppError> {
        bound(ITEM_BINDINGS, method, Self::ALLOW)
    }
}

impl CollectionOperation {
    pub const ALLOW: &'static str = "GET, POST, DELETE";

    pub fn for_method(method: &Method) -> Result<Self, AppError> {
        bound(COLLECTION_BINDINGS, method, Self::ALLOW)
    }
}

/// Shared dependencies of a view call.
#[derive(Clone, Copy)]
pub struct ViewContext<'a> {
    pub registry: &'a Registry,
    pub store: &'a dyn EntityStore,
    pub serializer: &'a dyn Serializer,
    pub paging: Paging,
    /// Prefix the collection urls are mounted under, used for `Location`.
    pub base_path: &'a str,
}

/// Query string and parsed body of a request.
#[derive(Debug, Default)]
pub struct ViewRequest {
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ViewRequest {
    fn document(&self) -> Result<&Value, AppError> {
        self.body
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("request body must be a JSON:API document".into()))
    }
}

#[derive(Debug)]
pub struct ItemView {
    decl: Arc<EntityDecl>,
    template: Model,
    validator: Arc<RequestValidator>,
}

impl ItemView {
    pub(crate) fn new(decl: Arc<EntityDecl>, validator: Arc<RequestValidator>) -> Self {
        let template = Introspector::template(&decl);
        ItemView {
            decl,
            template,
            validator,
        }
    }

    pub async fn dispatch(
        &self,
        ctx: ViewContext<'_>,
        method: &Method,
        item: &ResourceItem,
        request: &ViewRequest,
    ) -> Result<ViewResponse, AppError> {
        match ItemOperation::for_method(method)? {
            ItemOperation::Read => self.read(ctx, item).await,
            ItemOperation::Update => self.update(ctx, item, request.document()?).await,
            ItemOperation::Delete => self.delete(ctx, item).await,
        }
    }

    pub async fn read(&self, ctx: ViewContext<'_>, item: &ResourceItem) -> Result<ViewResponse, AppError> {
        self.render(ctx, &item.record).await
    }

    /// Partial update: only members present in the document are written.
    pub async fn update(
        &self,
        ctx: ViewContext<'_>,
        item: &ResourceItem,
        document: &Value,
    ) -> Result<ViewResponse, AppError> {
        let model = ctx.serializer.deserialize(document, &self.template)?;
        if let Some(id) = &model.source_id {
            if id_string(id) != id_string(&item.id) {
                return Err(AppError::Conflict(format!(
                    "id '{}' does not match the endpoint id '{}'",
                    id_string(id),
                    id_string(&item.id)
                )));
            }
        }
        check_linkage_targets(ctx, &model).await?;
        let values = model.to_values(&self.decl, ctx.registry)?;
        self.validator.validate_partial(&self.decl, &values)?;
        let record = ctx
            .store
            .update(&self.decl, &item.id, &values)
            .await?
            .ok_or_else(|| AppError::entity_not_found(&self.decl.resource_name(), id_string(&item.id)))?;
        tracing::info!(entity = %self.decl.name, id = %id_string(&item.id), "updated");
        self.render(ctx, &record).await
    }

    pub async fn delete(&self, ctx: ViewContext<'_>, item: &ResourceItem) -> Result<ViewResponse, AppError> {
        if !ctx.store.delete(&self.decl, &item.id).await? {
            return Err(AppError::entity_not_found(&self.decl.resource_name(), id_string(&item.id)));
        }
        tracing::info!(entity = %self.decl.name, id = %id_string(&item.id), "deleted");
        Ok(ViewResponse::NoContent)
    }

    /// GET on a relationship of the item: the related resource (or null), or the
    /// related collection for to-many relationships.
    pub async fn related(
        &self,
        ctx: ViewContext<'_>,
        method: &Method,
        item: &ResourceItem,
        relationship: &str,
    ) -> Result<ViewResponse, AppError> {
        if method != Method::GET {
            return Err(AppError::MethodNotAllowed {
                method: method.to_string(),
                allow: "GET",
            });
        }
        let rel = self.decl.find_relationship(relationship).ok_or_else(|| {
            AppError::NotFound(format!("{} has no relationship '{}'", self.decl.resource_name(), relationship))
        })?;
        let target = ctx.registry.decl(&rel.target)?;
        match &rel.kind {
            RelationshipKind::ToOne { column } => {
                let Some(id) = item.record.get(column).filter(|v| !v.is_null()) else {
                    return Ok(ViewResponse::Document(json!({ "data": null })));
                };
                let record = ctx
                    .store
                    .fetch(&target, id)
                    .await?
                    .ok_or_else(|| AppError::entity_not_found(&target.resource_name(), id_string(id)))?;
                let model = Introspector::instance(ctx.registry, ctx.store, &target, &record).await?;
                Ok(ViewResponse::Document(ctx.serializer.serialize(&model)))
            }
            RelationshipKind::ToMany { column } => {
                let query = ListQuery {
                    limit: Some(ctx.paging.limit(None)),
                    ..Default::default()
                }
                .filter(column.clone(), item.id.clone());
                let rows = ctx.store.list(&target, &query).await?;
                Ok(list_document(ctx, &target, &rows))
            }
        }
    }

    async fn render(&self, ctx: ViewContext<'_>, record: &Record) -> Result<ViewResponse, AppError> {
        let model = Introspector::instance(ctx.registry, ctx.store, &self.decl, record).await?;
        Ok(ViewResponse::Document(ctx.serializer.serialize(&model)))
    }
}

#[derive(Debug)]
pub struct CollectionView {
    decl: Arc<EntityDecl>,
    template: Model,
    validator: Arc<RequestValidator>,
}

impl CollectionView {
    pub(crate) fn new(decl: Arc<EntityDecl>, validator: Arc<RequestValidator>) -> Self {
        let template = Introspector::template(&decl);
        CollectionView {
            decl,
            template,
            validator,
        }
    }

    pub async fn dispatch(
        &self,
        ctx: ViewContext<'_>,
        method: &Method,
        request: &ViewRequest,
    ) -> Result<ViewResponse, AppError> {
        match CollectionOperation::for_method(method)? {
            CollectionOperation::List => self.list(ctx, list_query(&self.decl, &request.query)?).await,
            CollectionOperation::Add => self.add(ctx, request.document()?).await,
            CollectionOperation::Empty => self.empty(ctx).await,
        }
    }

    /// Create from a document. A client-supplied `data.id` is used as the primary key.
    pub async fn add(&self, ctx: ViewContext<'_>, document: &Value) -> Result<ViewResponse, AppError> {
        let model = ctx.serializer.deserialize(document, &self.template)?;
        if let Some(r) = model
            .relationships
            .iter()
            .find(|r| !r.to_many && !r.optional && !r.has_value())
        {
            return Err(AppError::Validation(format!("{}.{} is required", model.name, r.name)));
        }
        check_linkage_targets(ctx, &model).await?;
        let mut values = model.to_values(&self.decl, ctx.registry)?;
        if let Some(id) = &model.source_id {
            values.insert(self.decl.pk_name().to_string(), parse_linkage_id(&self.decl, id)?);
        }
        self.validator.validate_create(&self.decl, &values)?;

        let record = ctx.store.insert(&self.decl, &values).await?;
        let created = Introspector::instance(ctx.registry, ctx.store, &self.decl, &record).await?;
        let id = created.source_id.as_ref().map(id_string).unwrap_or_default();
        tracing::info!(entity = %self.decl.name, id = %id, "created");
        Ok(ViewResponse::Created {
            location: format!("{}{}/{}", ctx.base_path, self.decl.url(), id),
            document: ctx.serializer.serialize(&created),
        })
    }

    pub async fn list(&self, ctx: ViewContext<'_>, mut query: ListQuery) -> Result<ViewResponse, AppError> {
        query.limit = Some(ctx.paging.limit(query.limit));
        let rows = ctx.store.list(&self.decl, &query).await?;
        Ok(list_document(ctx, &self.decl, &rows))
    }

    /// Delete every entity of the collection.
    pub async fn empty(&self, ctx: ViewContext<'_>) -> Result<ViewResponse, AppError> {
        let removed = ctx.store.delete_all(&self.decl).await?;
        tracing::info!(entity = %self.decl.name, removed, "emptied collection");
        Ok(ViewResponse::NoContent)
    }
}

fn list_document(ctx: ViewContext<'_>, decl: &EntityDecl, rows: &[Record]) -> ViewResponse {
    let models: Vec<Model> = rows.iter().map(|r| Introspector::attributes_only(decl, r)).collect();
    let document = ctx.serializer.serialize_list(&models);
    ViewResponse::Document(with_meta(document, json!({ "count": models.len() })))
}

/// To-one linkage must point at an existing entity.
async fn check_linkage_targets(ctx: ViewContext<'_>, model: &Model) -> Result<(), AppError> {
    for r in &model.relationships {
        let Some(Linkage::One(Some(id))) = &r.value else { continue };
        let target = ctx.registry.decl(&r.target)?;
        let parsed = parse_linkage_id(&target, id)?;
        if ctx.store.fetch(&target, &parsed).await?.is_none() {
            return Err(AppError::entity_not_found(&target.resource_name(), id_string(id)));
        }
    }
    Ok(())
}

fn page_param(params: &HashMap<String, String>, name: &str) -> Result<Option<u32>, AppError> {
    let raw = params
        .get(&format!("page[{}]", name))
        .or_else(|| params.get(name));
    raw.map(|s| {
        s.parse()
            .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
    })
    .transpose()
}

/// Paging (`page[limit]`, `page[offset]`, or bare `limit`/`offset`) and exact-match
/// `filter[<column>]` parameters. Other parameters are ignored.
pub fn list_query(decl: &EntityDecl, params: &HashMap<String, String>) -> Result<ListQuery, AppError> {
    let mut query = ListQuery {
        limit: page_param(params, "limit")?,
        offset: page_param(params, "offset")?,
        ..Default::default()
    };
    let mut filters: Vec<(&String, &String)> = params
        .iter()
        .filter_map(|(k, v)| k.strip_prefix("filter[")?.strip_suffix(']').map(|_| (k, v)))
        .collect();
    filters.sort();
    for (key, raw) in filters {
        let name = &key["filter[".len()..key.len() - 1];
        let column = decl
            .find_column(name)
            .filter(|c| !c.is_hidden())
            .ok_or_else(|| AppError::BadRequest(format!("cannot filter on unknown attribute '{}'", name)))?;
        let value = column.column_type.parse_str(raw).ok_or_else(|| {
            AppError::BadRequest(format!("filter[{}] must be {}", name, column.column_type.describe()))
        })?;
        query = query.filter(name, value);
    }
    Ok(query)
}
