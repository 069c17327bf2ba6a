use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use honeygen::{
    common_routes_with_ready, resource_routes, AppState, ColumnDecl, ColumnType, Entity, EntityDecl, MemoryStore,
    RegistryBuilder, RelationshipDecl, JSON_API_MEDIA_TYPE,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct User;

impl Entity for User {
    fn declare() -> EntityDecl {
        EntityDecl::new("User")
            .column(ColumnDecl::new("id", ColumnType::Integer).primary_key())
            .column(ColumnDecl::new("name", ColumnType::Text).not_null())
            .column(ColumnDecl::new("age", ColumnType::Integer))
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

fn app() -> Router {
    let mut builder = RegistryBuilder::new();
    builder.expose::<User>().unwrap().expose::<Address>().unwrap();
    let state = AppState::new(builder.build().unwrap(), Arc::new(MemoryStore::new())).with_base_path("/api/v1");
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .nest("/api/v1", resource_routes(state))
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
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
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    Reply { status, headers, body }
}

fn user(name: &str, age: i64) -> Value {
    json!({"data": {"type": "users", "attributes": {"name": name, "age": age}}})
}

fn address(city: &str, owner: &str) -> Value {
    json!({"data": {"type": "addresses", "attributes": {"city": city},
        "relationships": {"owner": {"data": {"type": "users", "id": owner}}}}})
}

#[tokio::test]
async fn crud_round() {
    let app = app();

    let created = send(&app, Method::POST, "/api/v1/users", Some(user("Brendan", 18))).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.headers[header::LOCATION], "/api/v1/users/1");
    assert_eq!(created.headers[header::CONTENT_TYPE], JSON_API_MEDIA_TYPE);
    assert_eq!(created.body["data"]["id"], "1");
    assert_eq!(created.body["data"]["type"], "users");

    let read = send(&app, Method::GET, "/api/v1/users/1", None).await;
    assert_eq!(read.status, StatusCode::OK);
    assert_eq!(read.body["data"]["attributes"], json!({"name": "Brendan", "age": 18}));
    assert_eq!(read.body["data"]["relationships"]["best_friend"], json!({"data": null}));

    let patch = json!({"data": {"type": "users", "id": "1", "attributes": {"age": 19}}});
    let updated = send(&app, Method::PATCH, "/api/v1/users/1", Some(patch)).await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["data"]["attributes"], json!({"name": "Brendan", "age": 19}));

    send(&app, Method::POST, "/api/v1/users", Some(user("Ann", 30))).await;
    let list = send(&app, Method::GET, "/api/v1/users", None).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["meta"]["count"], 2);
    assert_eq!(list.body["data"][1]["attributes"]["name"], "Ann");

    let deleted = send(&app, Method::DELETE, "/api/v1/users/1", None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let gone = send(&app, Method::GET, "/api/v1/users/1", None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body["errors"][0]["detail"], "Cannot find user identified by \"1\"");
    assert_eq!(gone.body["errors"][0]["status"], "404");

    let emptied = send(&app, Method::DELETE, "/api/v1/users", None).await;
    assert_eq!(emptied.status, StatusCode::NO_CONTENT);
    let list = send(&app, Method::GET, "/api/v1/users", None).await;
    assert_eq!(list.body, json!({"data": [], "meta": {"count": 0}}));
}

#[tokio::test]
async fn relationships_and_related_resources() {
    let app = app();
    send(&app, Method::POST, "/api/v1/users", Some(user("Brendan", 18))).await;
    for city in ["Paris", "Lyon"] {
        let created = send(&app, Method::POST, "/api/v1/addresses", Some(address(city, "1"))).await;
        assert_eq!(created.status, StatusCode::CREATED);
    }

    let brendan = send(&app, Method::GET, "/api/v1/users/1", None).await;
    assert_eq!(
        brendan.body["data"]["relationships"]["addresses"],
        json!({"data": [{"type": "addresses", "id": "1"}, {"type": "addresses", "id": "2"}]})
    );

    let addresses = send(&app, Method::GET, "/api/v1/users/1/addresses", None).await;
    assert_eq!(addresses.status, StatusCode::OK);
    assert_eq!(addresses.body["meta"]["count"], 2);
    assert_eq!(addresses.body["data"][1]["attributes"]["city"], "Lyon");

    let owner = send(&app, Method::GET, "/api/v1/addresses/2/owner", None).await;
    assert_eq!(owner.body["data"]["id"], "1");
    assert_eq!(owner.body["data"]["attributes"]["name"], "Brendan");

    let filtered = send(&app, Method::GET, "/api/v1/addresses?filter%5Bcity%5D=Lyon", None).await;
    assert_eq!(filtered.body["meta"]["count"], 1);
    let paged = send(&app, Method::GET, "/api/v1/addresses?page%5Boffset%5D=1&page%5Blimit%5D=5", None).await;
    assert_eq!(paged.body["data"][0]["id"], "2");

    let missing = send(&app, Method::GET, "/api/v1/users/1/friends", None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn client_generated_ids() {
    let app = app();
    let doc = json!({"data": {"type": "users", "id": "42", "attributes": {"name": "Zed"}}});
    let created = send(&app, Method::POST, "/api/v1/users", Some(doc.clone())).await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.headers[header::LOCATION], "/api/v1/users/42");
    let again = send(&app, Method::POST, "/api/v1/users", Some(doc)).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn request_errors() {
    let app = app();
    send(&app, Method::POST, "/api/v1/users", Some(user("Brendan", 18))).await;

    let wrong_type = json!({"data": {"type": "addresses", "attributes": {"city": "Paris"}}});
    let reply = send(&app, Method::POST, "/api/v1/users", Some(wrong_type)).await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let unknown = json!({"data": {"type": "users", "attributes": {"nickname": "B"}}});
    assert_eq!(send(&app, Method::POST, "/api/v1/users", Some(unknown)).await.status, StatusCode::BAD_REQUEST);

    let bad_kind = json!({"data": {"type": "users", "attributes": {"name": "B", "age": "old"}}});
    assert_eq!(
        send(&app, Method::POST, "/api/v1/users", Some(bad_kind)).await.status,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let too_old = send(&app, Method::POST, "/api/v1/users", Some(user("Methuselah", 3_000_000_000))).await;
    assert_eq!(too_old.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(too_old.body["errors"][0]["detail"], "user.age must be a 32-bit integer");

    let no_name = json!({"data": {"type": "users", "attributes": {"age": 3}}});
    assert_eq!(
        send(&app, Method::POST, "/api/v1/users", Some(no_name)).await.status,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let dangling = send(&app, Method::POST, "/api/v1/addresses", Some(address("Nice", "9"))).await;
    assert_eq!(dangling.status, StatusCode::NOT_FOUND);

    let to_many = json!({"data": {"type": "users", "relationships": {"addresses": {"data": []}}}});
    assert_eq!(
        send(&app, Method::PATCH, "/api/v1/users/1", Some(to_many)).await.status,
        StatusCode::FORBIDDEN
    );

    let put = send(&app, Method::PUT, "/api/v1/users", None).await;
    assert_eq!(put.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(put.headers[header::ALLOW], "GET, POST, DELETE");
    let post_item = send(&app, Method::POST, "/api/v1/users/1", Some(user("X", 1))).await;
    assert_eq!(post_item.status, StatusCode::METHOD_NOT_ALLOWED);

    assert_eq!(send(&app, Method::GET, "/api/v1/people", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(send(&app, Method::GET, "/api/v1/users/abc", None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        send(&app, Method::GET, "/api/v1/users?filter%5Bnickname%5D=x", None).await.status,
        StatusCode::BAD_REQUEST
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_and_ready() {
    let app = app();
    let health = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health.body, json!({"status": "ok"}));
    let ready = send(&app, Method::GET, "/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["entities"], 2);
}
