//! honeygen: JSON:API CRUD endpoints generated from entity declarations.
//!
//! Declare entities (in Rust via [`Entity`] or in a JSON file), expose them on a
//! [`RegistryBuilder`], and mount [`resource_routes`] on an axum router.

pub mod case;
pub mod config;
pub mod entity;
pub mod error;
pub mod introspect;
pub mod migration;
pub mod registry;
pub mod resource;
pub mod response;
pub mod serializer;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;
pub mod view;
pub mod handlers;
pub mod routes;

#[cfg(test)]
mod testing;

pub use config::{load_from_path, parse_configs, resolve, validate, EntityConfig};
pub use entity::{ColumnDecl, ColumnType, Entity, EntityDecl, RelationshipDecl};
pub use error::{AppError, ConfigError};
pub use introspect::{Introspector, Model};
pub use migration::ensure_tables;
pub use registry::{Registry, RegistryBuilder, RegistryEntry};
pub use response::{JsonApi, ViewResponse, JSON_API_MEDIA_TYPE};
pub use routes::{common_routes, common_routes_with_ready, resource_routes};
pub use serializer::{JsonApiSerializer, Serializer};
pub use settings::{Paging, Settings};
pub use state::AppState;
pub use store::{EntityStore, MemoryStore, PgStore};
