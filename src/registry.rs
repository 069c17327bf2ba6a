//! Registry of exposed entities. Each declaration gets exactly one entry holding its
//! resource collection, views and serializer template, built once in `RegistryBuilder::build`.

use crate::config::validate;
use crate::entity::{Entity, EntityDecl, RelationshipDecl, RelationshipKind};
use crate::error::{AppError, ConfigError};
use crate::introspect::{Introspector, Model};
use crate::resource::{ResourceCollection, Root};
use crate::service::RequestValidator;
use crate::view::{CollectionView, ItemView};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything derived from one exposed declaration.
#[derive(Debug)]
pub struct RegistryEntry {
    pub decl: Arc<EntityDecl>,
    /// Singular resource name ("user").
    pub name: String,
    /// JSON:API type and url segment ("users").
    pub pluralized_name: String,
    /// Collection url relative to the api prefix ("/users").
    pub url: String,
    pub resource_collection: Arc<ResourceCollection>,
    pub item_view: Arc<ItemView>,
    pub collection_view: Arc<CollectionView>,
    pub template: Model,
}

impl RegistryEntry {
    fn new(decl: EntityDecl) -> Result<Self, ConfigError> {
        let decl = Arc::new(decl);
        let validator = Arc::new(RequestValidator::new(&decl)?);
        Ok(RegistryEntry {
            name: decl.resource_name(),
            pluralized_name: decl.pluralized_name(),
            url: decl.url(),
            resource_collection: Arc::new(ResourceCollection::new(decl.clone())),
            item_view: Arc::new(ItemView::new(decl.clone(), validator.clone())),
            collection_view: Arc::new(CollectionView::new(decl.clone(), validator)),
            template: Introspector::template(&decl),
            decl,
        })
    }
}

#[derive(Debug)]
pub struct Registry {
    entries: Vec<Arc<RegistryEntry>>,
    by_name: HashMap<String, Arc<RegistryEntry>>,
    by_url: HashMap<String, Arc<RegistryEntry>>,
    root: Root,
}

impl Registry {
    /// Entry by declared entity name ("User").
    pub fn get(&self, name: &str) -> Option<&Arc<RegistryEntry>> {
        self.by_name.get(name)
    }

    /// Entry by url segment ("users").
    pub fn by_url(&self, segment: &str) -> Option<&Arc<RegistryEntry>> {
        self.by_url.get(segment)
    }

    /// Entries in exposure order.
    pub fn entries(&self) -> &[Arc<RegistryEntry>] {
        &self.entries
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    /// Declaration of an exposed entity; a miss means a relationship points outside the registry.
    pub(crate) fn decl(&self, name: &str) -> Result<Arc<EntityDecl>, AppError> {
        self.get(name).map(|e| e.decl.clone()).ok_or_else(|| {
            AppError::Config(ConfigError::MissingReference {
                kind: "entity",
                id: name.to_string(),
            })
        })
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    decls: Vec<EntityDecl>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expose<E: Entity>(&mut self) -> Result<&mut Self, ConfigError> {
        self.expose_decl(E::declare())
    }

    pub fn expose_decl(&mut self, decl: EntityDecl) -> Result<&mut Self, ConfigError> {
        if self.decls.iter().any(|d| d.name == decl.name) {
            return Err(ConfigError::DuplicateEntity(decl.name));
        }
        tracing::info!(entity = %decl.name, url = %decl.url(), "exposing entity");
        self.decls.push(decl);
        Ok(self)
    }

    /// Expose every declaration of a loaded configuration.
    pub fn expose_all(&mut self, decls: impl IntoIterator<Item = EntityDecl>) -> Result<&mut Self, ConfigError> {
        for decl in decls {
            self.expose_decl(decl)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Registry, ConfigError> {
        let decls = resolve_backrefs(self.decls);
        validate(&decls)?;

        let entries: Vec<Arc<RegistryEntry>> = decls
            .into_iter()
            .map(|d| RegistryEntry::new(d).map(Arc::new))
            .collect::<Result<_, _>>()?;
        let by_name = entries.iter().map(|e| (e.decl.name.clone(), e.clone())).collect();
        let by_url: HashMap<String, Arc<RegistryEntry>> =
            entries.iter().map(|e| (e.pluralized_name.clone(), e.clone())).collect();
        let root = Root::new(
            by_url
                .iter()
                .map(|(segment, e)| (segment.clone(), e.resource_collection.clone()))
                .collect(),
        );
        Ok(Registry {
            entries,
            by_name,
            by_url,
            root,
        })
    }
}

/// A to-one with a backref adds the reverse to-many on its target, over the same FK column.
fn resolve_backrefs(mut decls: Vec<EntityDecl>) -> Vec<EntityDecl> {
    let reverse: Vec<(String, RelationshipDecl)> = decls
        .iter()
        .flat_map(|d| {
            d.relationships.iter().filter_map(|r| match (&r.kind, &r.backref) {
                (RelationshipKind::ToOne { column }, Some(backref)) => {
                    Some((r.target.clone(), RelationshipDecl::to_many(backref.clone(), d.name.clone(), column.clone())))
                }
                _ => None,
            })
        })
        .collect();
    for (target, relationship) in reverse {
        if let Some(decl) = decls.iter_mut().find(|d| d.name == target) {
            decl.relationships.push(relationship);
        }
    }
    decls
}
