//! Resource tree: the root maps url segments to collections, collections load items.

use crate::entity::EntityDecl;
use crate::error::AppError;
use crate::store::{EntityStore, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
pub struct Root {
    children: HashMap<String, Arc<ResourceCollection>>,
}

/// What a request path resolves to.
#[derive(Debug)]
pub enum Resource {
    Collection(Arc<ResourceCollection>),
    Item(ResourceItem),
    Related { item: ResourceItem, relationship: String },
}

impl Root {
    pub(crate) fn new(children: HashMap<String, Arc<ResourceCollection>>) -> Self {
        Root { children }
    }

    pub fn get(&self, segment: &str) -> Option<&Arc<ResourceCollection>> {
        self.children.get(segment)
    }

    /// Resolve `<collection>`, `<collection>/<id>` or `<collection>/<id>/<relationship>`.
    /// Items are loaded from the store on the way.
    pub async fn traverse(&self, store: &dyn EntityStore, segments: &[&str]) -> Result<Resource, AppError> {
        tracing::debug!(path = ?segments, "traverse");
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| AppError::NotFound("no resource at the root".into()))?;
        let collection = self
            .get(first)
            .ok_or_else(|| AppError::NotFound(format!("no resource named '{}'", first)))?;
        match rest {
            [] => Ok(Resource::Collection(collection.clone())),
            [id] => Ok(Resource::Item(collection.item(store, id).await?)),
            [id, relationship] => {
                let item = collection.item(store, id).await?;
                if item.decl.find_relationship(relationship).is_none() {
                    return Err(AppError::NotFound(format!(
                        "{} has no relationship '{}'",
                        item.decl.resource_name(),
                        relationship
                    )));
                }
                Ok(Resource::Related {
                    item,
                    relationship: relationship.to_string(),
                })
            }
            _ => Err(AppError::NotFound(format!("no resource at '{}'", segments.join("/")))),
        }
    }
}

#[derive(Debug)]
pub struct ResourceCollection {
    decl: Arc<EntityDecl>,
}

impl ResourceCollection {
    pub(crate) fn new(decl: Arc<EntityDecl>) -> Self {
        ResourceCollection { decl }
    }

    pub fn decl(&self) -> &Arc<EntityDecl> {
        &self.decl
    }

    /// Load the item behind a path id. Ids that do not parse as the key type are
    /// reported the same way as missing rows.
    pub async fn item(&self, store: &dyn EntityStore, raw_id: &str) -> Result<ResourceItem, AppError> {
        let not_found = || AppError::entity_not_found(&self.decl.resource_name(), raw_id);
        let id = self.decl.parse_id(raw_id).ok_or_else(not_found)?;
        let record = store.fetch(&self.decl, &id).await?.ok_or_else(not_found)?;
        Ok(ResourceItem {
            decl: self.decl.clone(),
            id,
            record,
        })
    }
}

/// A loaded entity.
#[derive(Clone, Debug)]
pub struct ResourceItem {
    pub decl: Arc<EntityDecl>,
    pub id: Value,
    pub record: Record,
}
