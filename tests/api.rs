//! End-to-end tests over the full router backed by `MemoryStore`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use resource_sdk::{api_router, load_from_str, resolve, AppState, MemoryStore, Registry, ResourceService};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const CONFIG: &str = r#"{"entities": [
    {"name": "widgets", "fillable": ["name", "status", "age"], "hidden": ["secret"],
     "timestamps": {"deleted_at": "deleted_at"},
     "options": {"label": "name"},
     "validation": {"name": {"required": true}}},
    {"name": "gadgets", "fillable": ["label"], "timestamps": false},
    {"name": "logs", "fillable": ["line"], "operations": ["list"]}
]}"#;

fn app() -> Router {
    let model = Arc::new(resolve(&load_from_str(CONFIG).unwrap()).unwrap());
    let store = MemoryStore::new(model.clone());
    store
        .seed(
            "widgets",
            (1..=35).map(|i| {
                json!({
                    "id": i,
                    "name": format!("w{:02}", i),
                    "status": if i % 2 == 1 { "active" } else { "inactive" },
                    "age": if i % 5 == 0 { Value::Null } else { json!(i) },
                    "secret": "s",
                    "created_at": format!("2024-01-01T00:00:{:02}Z", i),
                })
            }),
        )
        .unwrap();
    store
        .seed("gadgets", vec![json!({"id": 2, "label": "b"}), json!({"id": 1, "label": "a"})])
        .unwrap();
    let service = ResourceService::new(Arc::new(store), model, Registry::new());
    api_router(AppState::new(service), "/api/v1", 1024 * 1024)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header(header::CONTENT_TYPE, "application/json");
    }
    let request = request
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> Value {
    let (status, body) = send(app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK, "GET {} -> {}", uri, body);
    body
}

fn names(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn unknown_and_hidden_keys_add_no_filter() {
    let app = app();
    let body = get(&app, "/api/v1/widgets?secret=nope&bogus=1&limit=max").await;
    assert_eq!(body["meta"]["count"], json!(35));
    assert!(body["data"][0].get("secret").is_none());
}

#[tokio::test]
async fn empty_values_add_no_filter() {
    let app = app();
    let body = get(&app, "/api/v1/widgets?status=&name_like=&filters%5Bage%5D=gt:").await;
    assert_eq!(body["meta"]["total"], json!(35));
}

#[tokio::test]
async fn suffix_and_named_filters_combine() {
    let app = app();
    let body = get(&app, "/api/v1/widgets?age_isNotNull=1&limit=max").await;
    assert_eq!(body["meta"]["count"], json!(28));

    let body = get(&app, "/api/v1/widgets?status=active&age_lte=9&filters%5Bname%5D=sw:w0&limit=max").await;
    assert_eq!(names(&body), vec!["w01", "w03", "w07", "w09"]);

    let body = get(&app, "/api/v1/widgets?id_in=3,4,40&limit=max").await;
    assert_eq!(names(&body), vec!["w03", "w04"]);
}

#[tokio::test]
async fn latest_and_oldest_use_created_at() {
    let app = app();
    let latest = get(&app, "/api/v1/widgets?sort=latest").await;
    assert_eq!(latest["data"][0]["name"], json!("w35"));
    let oldest = get(&app, "/api/v1/widgets?sort=OLDEST").await;
    assert_eq!(oldest["data"][0]["name"], json!("w01"));

    let gadgets = get(&app, "/api/v1/gadgets?sort=latest").await;
    assert_eq!(gadgets["data"][0]["label"], json!("a"));
}

#[tokio::test]
async fn pagination_defaults_and_unbounded_limit() {
    let app = app();
    let first = get(&app, "/api/v1/widgets").await;
    assert_eq!(first["data"].as_array().unwrap().len(), 30);
    assert_eq!(first["meta"]["per_page"], json!(30));
    assert_eq!(first["meta"]["total"], json!(35));
    assert_eq!(first["meta"]["last_page"], json!(2));

    let second = get(&app, "/api/v1/widgets?page=2").await;
    assert_eq!(second["data"].as_array().unwrap().len(), 5);
    assert_eq!(second["meta"]["from"], json!(31));

    let all = get(&app, "/api/v1/widgets?limit=max").await;
    assert_eq!(all["data"].as_array().unwrap().len(), 35);

    let search = get(&app, "/api/v1/widgets/search?limit=max").await;
    assert_eq!(search["meta"]["per_page"], json!(30));
}

#[tokio::test]
async fn create_then_read_returns_assignable_fields() {
    let app = app();
    let (status, created) = send(
        &app,
        Method::POST,
        "/api/v1/widgets",
        Some(r#"{"name": "fresh", "status": "active", "age": 3, "secret": "x"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["data"]["id"].clone();
    assert_eq!(id, json!(36));

    let read = get(&app, "/api/v1/widgets/36").await;
    assert_eq!(read["data"]["name"], json!("fresh"));
    assert_eq!(read["data"]["status"], json!("active"));
    assert_eq!(read["data"]["age"], json!(3));
    assert!(read["data"].get("secret").is_none());
}

#[tokio::test]
async fn validation_failure_lists_messages() {
    let app = app();
    let (status, body) = send(&app, Method::POST, "/api/v1/widgets", Some(r#"{"status": "x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!("error"));
    assert_eq!(body["message"], json!(["name is required"]));
}

#[tokio::test]
async fn non_object_bodies_are_unprocessable() {
    let app = app();
    let (status, _) = send(&app, Method::POST, "/api/v1/widgets", Some("[1, 2]")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::PATCH, "/api/v1/widgets/1", Some("not json")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::POST, "/api/v1/batch", Some("\"x\"")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn update_on_missing_id_is_not_found_and_creates_nothing() {
    let app = app();
    let (status, body) = send(&app, Method::PUT, "/api/v1/widgets/999", Some(r#"{"name": "ghost"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Resource not found"));

    let count = get(&app, "/api/v1/widgets/count").await;
    assert_eq!(count, json!({"count": 35}));
}

#[tokio::test]
async fn update_merges_fillable_fields() {
    let app = app();
    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/v1/widgets/2",
        Some(r#"{"name": "renamed", "id": 77}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], json!(2));
    assert_eq!(body["data"]["name"], json!("renamed"));
    assert_eq!(body["data"]["status"], json!("inactive"));
}

#[tokio::test]
async fn count_uses_filters_only() {
    let app = app();
    let body = get(&app, "/api/v1/widgets/count?filters%5Bstatus%5D=eq:active&limit=5&page=3&sort=name:desc").await;
    assert_eq!(body, json!({"count": 18}));
}

#[tokio::test]
async fn delete_is_soft_and_hides_the_row() {
    let app = app();
    let (status, body) = send(&app, Method::DELETE, "/api/v1/widgets/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["message"], json!("Resource deleted"));
    assert_eq!(body["data"]["name"], json!("w01"));

    let (status, _) = send(&app, Method::GET, "/api/v1/widgets/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(get(&app, "/api/v1/widgets/count").await, json!({"count": 34}));
}

#[tokio::test]
async fn disabled_operations_answer_405() {
    let app = app();
    let (status, _) = send(&app, Method::GET, "/api/v1/logs/1", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = send(&app, Method::POST, "/api/v1/logs", Some(r#"{"line": "x"}"#)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    get(&app, "/api/v1/logs").await;
}

#[tokio::test]
async fn options_are_sorted_by_label() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/api/v1/widgets/options", None).await;
    assert_eq!(status, StatusCode::OK);
    let options = body.as_array().unwrap();
    assert_eq!(options.len(), 35);
    assert_eq!(options[0], json!({"value": 1, "label": "w01"}));

    let (status, _) = send(&app, Method::GET, "/api/v1/gadgets/options", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn batch_keeps_entries_isolated() {
    let app = app();
    let payload = json!([
        {"url": "/api/v1/widgets", "method": "GET", "params": {"limit": "max"}},
        {"url": "/missing", "method": "GET", "request_id": "x"}
    ]);
    let (status, body) = send(&app, Method::POST, "/api/v1/batch", Some(&payload.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    let responses = &body["responses"];
    assert_eq!(responses["0"]["meta"]["count"], json!(35));
    assert_eq!(responses["x"], json!({"status": "failed", "message": "Resource not found"}));
}

#[tokio::test]
async fn batch_without_request_ids_is_a_list() {
    let app = app();
    let payload = json!([
        {"url": "/widgets/count", "params": {"filters": {"status": "eq:inactive"}}},
        {"method": "GET"},
        {"url": "/api/v1/widgets", "method": "POST", "params": {"name": "batched"}}
    ]);
    let (_, body) = send(&app, Method::POST, "/api/v1/batch", Some(&payload.to_string())).await;
    let responses = body["responses"].as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0], json!({"count": 17}));
    assert_eq!(responses[1]["data"]["name"], json!("batched"));
}

#[tokio::test]
async fn common_routes_answer_at_the_root() {
    let app = app();
    assert_eq!(get(&app, "/health").await, json!({"status": "ok"}));
    assert_eq!(get(&app, "/ready").await["status"], json!("ok"));
    assert_eq!(get(&app, "/version").await["name"], json!("resource-sdk"));
}
