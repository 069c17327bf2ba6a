//! Shared application state for all routes. The registry is immutable once built.

use crate::registry::Registry;
use crate::serializer::{JsonApiSerializer, Serializer};
use crate::settings::Paging;
use crate::store::EntityStore;
use crate::view::ViewContext;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub store: Arc<dyn EntityStore>,
    pub serializer: Arc<dyn Serializer>,
    pub paging: Paging,
    /// Where the resource routes are nested, e.g. "/api/v1". Used to build `Location`.
    pub base_path: Arc<str>,
}

impl AppState {
    pub fn new(registry: Registry, store: Arc<dyn EntityStore>) -> Self {
        AppState {
            registry: Arc::new(registry),
            store,
            serializer: Arc::new(JsonApiSerializer),
            paging: Paging::default(),
            base_path: Arc::from(""),
        }
    }

    pub fn with_serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = serializer;
        self
    }

    pub fn with_paging(mut self, paging: Paging) -> Self {
        self.paging = paging;
        self
    }

    pub fn with_base_path(mut self, base_path: &str) -> Self {
        self.base_path = Arc::from(base_path.trim_end_matches('/'));
        self
    }

    pub fn view_context(&self) -> ViewContext<'_> {
        ViewContext {
            registry: &self.registry,
            store: self.store.as_ref(),
            serializer: self.serializer.as_ref(),
            paging: self.paging,
            base_path: &self.base_path,
        }
    }
}
