//! Round trips against a live PostgreSQL. Skipped unless `DATABASE_URL` is set; each run
//! works in a fresh schema that is dropped at the end.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::IntoResponse,
    Router,
};
use honeygen::{
    common_routes_with_ready, ensure_tables, resource_routes, AppState, ColumnDecl, ColumnType, EntityDecl,
    EntityStore, PgStore, Registry, RegistryBuilder, RelationshipDecl, JSON_API_MEDIA_TYPE,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;

fn member(schema: &str) -> EntityDecl {
    EntityDecl::new("Member")
        .schema(schema)
        .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDecl::new("name", ColumnType::Text).not_null())
        .column(ColumnDecl::new("age", ColumnType::Integer))
        .column(ColumnDecl::new("prefs", ColumnType::Json))
        .column(ColumnDecl::new("joined_at", ColumnType::Timestamp))
}

fn pet(schema: &str) -> EntityDecl {
    EntityDecl::new("Pet")
        .schema(schema)
        .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
        .column(ColumnDecl::new("name", ColumnType::Text).not_null())
        .column(ColumnDecl::new("owner_id", ColumnType::Integer).not_null().references("Member", "id"))
        .relationship(RelationshipDecl::to_one("owner", "Member", "owner_id").backref("pets"))
}

fn registry(schema: &str) -> Registry {
    let mut builder = RegistryBuilder::new();
    builder.expose_decl(member(schema)).unwrap().expose_decl(pet(schema)).unwrap();
    builder.build().unwrap()
}

async fn connect() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    Some(PgPoolOptions::new().max_connections(4).connect(&url).await.unwrap())
}

struct Reply {
    status: StatusCode,
    body: Value,
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, JSON_API_MEDIA_TYPE)
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, body }
}

fn new_member(attributes: Value) -> Value {
    json!({"data": {"type": "members", "attributes": attributes}})
}

fn new_pet(name: &str, owner: &str) -> Value {
    json!({"data": {"type": "pets", "attributes": {"name": name},
        "relationships": {"owner": {"data": {"type": "members", "id": owner}}}}})
}

#[tokio::test]
async fn postgres_round_trip() {
    let Some(pool) = connect().await else { return };
    let schema = format!("honeygen_it_{}", uuid::Uuid::new_v4().simple());
    let registry = registry(&schema);
    ensure_tables(&pool, &registry).await.unwrap();
    ensure_tables(&pool, &registry).await.unwrap();

    let state = AppState::new(registry, Arc::new(PgStore::new(pool.clone()))).with_base_path("/api");
    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api", resource_routes(state));

    let first = send(
        &app,
        Method::POST,
        "/api/members",
        Some(new_member(json!({"name": "Ann", "age": 30, "prefs": "dark", "joined_at": "2024-05-01T10:20:30Z"}))),
    )
    .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["data"]["id"], "1");
    assert_eq!(first.body["data"]["attributes"]["prefs"], "dark");
    assert_eq!(first.body["data"]["attributes"]["joined_at"], "2024-05-01T10:20:30+00:00");

    for prefs in [json!(5), json!(true), json!({"theme": "dark", "sizes": [1, 2]})] {
        let created = send(
            &app,
            Method::POST,
            "/api/members",
            Some(new_member(json!({"name": "Bob", "prefs": prefs.clone()}))),
        )
        .await;
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body["data"]["attributes"]["prefs"], prefs);
    }

    let out_of_range = send(
        &app,
        Method::POST,
        "/api/members",
        Some(new_member(json!({"name": "Cid", "age": 3_000_000_000u64}))),
    )
    .await;
    assert_eq!(out_of_range.status, StatusCode::UNPROCESSABLE_ENTITY);

    let duplicate = json!({"data": {"type": "members", "id": "1", "attributes": {"name": "Dup"}}});
    let duplicate = send(&app, Method::POST, "/api/members", Some(duplicate)).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["errors"][0]["detail"], "an entity with the same key already exists");

    for name in ["Rex", "Tom"] {
        let created = send(&app, Method::POST, "/api/pets", Some(new_pet(name, "1"))).await;
        assert_eq!(created.status, StatusCode::CREATED);
    }
    let dangling = send(&app, Method::POST, "/api/pets", Some(new_pet("Ghost", "99"))).await;
    assert_eq!(dangling.status, StatusCode::NOT_FOUND);

    let ann = send(&app, Method::GET, "/api/members/1", None).await;
    assert_eq!(ann.status, StatusCode::OK);
    assert_eq!(
        ann.body["data"]["relationships"]["pets"],
        json!({"data": [{"type": "pets", "id": "1"}, {"type": "pets", "id": "2"}]})
    );
    let pets = send(&app, Method::GET, "/api/members/1/pets", None).await;
    assert_eq!(pets.body["meta"]["count"], 2);
    let owner = send(&app, Method::GET, "/api/pets/2/owner", None).await;
    assert_eq!(owner.body["data"]["attributes"]["name"], "Ann");

    let thirty = send(&app, Method::GET, "/api/members?filter%5Bage%5D=30", None).await;
    assert_eq!(thirty.body["meta"]["count"], 1);
    let paged = send(&app, Method::GET, "/api/members?page%5Boffset%5D=2&page%5Blimit%5D=1", None).await;
    assert_eq!(paged.body["data"][0]["id"], "3");

    let referenced = send(&app, Method::DELETE, "/api/members/1", None).await;
    assert_eq!(referenced.status, StatusCode::CONFLICT);
    assert_eq!(
        referenced.body["errors"][0]["detail"],
        "the change conflicts with a reference between entities"
    );

    let patch = json!({"data": {"type": "members", "id": "1", "attributes": {"prefs": "light", "age": 31}}});
    let patched = send(&app, Method::PATCH, "/api/members/1", Some(patch)).await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["data"]["attributes"]["prefs"], "light");
    assert_eq!(patched.body["data"]["attributes"]["age"], 31);

    assert_eq!(send(&app, Method::DELETE, "/api/pets", None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, Method::DELETE, "/api/members/1", None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(send(&app, Method::GET, "/api/members/1", None).await.status, StatusCode::NOT_FOUND);

    let store = PgStore::new(pool.clone());
    let err = store.insert(&pet(&schema), &serde_json::Map::new()).await.unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let doc: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(doc["errors"][0]["detail"], "pets.name is required");

    let ready = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);

    sqlx::query(&format!("DROP SCHEMA \"{}\" CASCADE", schema))
        .execute(&pool)
        .await
        .unwrap();
}
