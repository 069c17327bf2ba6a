//! Demo server: exposes User and Address (or the declarations in ENTITIES_PATH) under
//! API_PREFIX. Uses PostgreSQL when DATABASE_URL is set, an in-memory store otherwise.

use axum::Router;
use honeygen::{
    common_routes_with_ready, ensure_tables, load_from_path, resource_routes, AppState, ColumnDecl, ColumnType,
    Entity, EntityDecl, EntityStore, MemoryStore, PgStore, RegistryBuilder, RelationshipDecl, Settings,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

struct User;

impl Entity for User {
    fn declare() -> EntityDecl {
        EntityDecl::new("User")
            .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDecl::new("name", ColumnType::Text).not_null())
            .column(ColumnDecl::new("age", ColumnType::Integer))
            .column(ColumnDecl::new("created_at", ColumnType::Timestamp).not_null().default_sql("NOW()"))
            .column(ColumnDecl::new("best_friend_id", ColumnType::Integer).references("User", "id"))
            .relationship(RelationshipDecl::to_one("best_friend", "User", "best_friend_id"))
    }
}

struct Address;

impl Entity for Address {
    fn declare() -> EntityDecl {
        EntityDecl::new("Address")
            .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDecl::new("city", ColumnType::Text).not_null())
            .column(ColumnDecl::new("owner_id", ColumnType::Integer).not_null().references("User", "id"))
            .relationship(RelationshipDecl::to_one("owner", "User", "owner_id").backref("addresses"))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("honeygen=info".parse()?))
        .init();

    let settings = Settings::from_env()?;

    let mut builder = RegistryBuilder::new();
    match &settings.entities_path {
        Some(path) => {
            builder.expose_all(load_from_path(path).await?)?;
        }
        None => {
            builder.expose::<User>()?.expose::<Address>()?;
        }
    }
    let registry = builder.build()?;

    let store: Arc<dyn EntityStore> = match &settings.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(settings.max_connections)
                .connect(url)
                .await?;
            ensure_tables(&pool, &registry).await?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(registry, store)
        .with_paging(settings.paging)
        .with_base_path(&settings.api_prefix);

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest(&settings.api_prefix, resource_routes(state))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(settings.body_limit)),
        );

    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
