use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use eldar_core::InvertedIndex;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

fn build_tiny_index() -> (TempDir, String) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin");
    let mut index = InvertedIndex::new();
    index.add_document(["a", "b"]);
    index.add_document(["b", "c"]);
    index.add_document(["a", "c"]);
    index.save(&path).unwrap();
    (dir, path.to_string_lossy().to_string())
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(t) = token {
        builder = builder.header("X-ADMIN-TOKEN", t);
    }
    send(app, builder.body(Body::from(body.to_string())).unwrap()).await
}

#[tokio::test]
async fn search_and_count() {
    let (_dir, path) = build_tiny_index();
    let app = server::build_app(path).unwrap();

    let (status, json) = get(&app, "/search?q=A%20AND%20B").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["doc_ids"], serde_json::json!([0]));
    assert_eq!(json["canonical"], "(a AND b)");

    let (_, json) = get(&app, "/search?q=a%20OR%20c&limit=2").await;
    assert_eq!(json["total_hits"], 3);
    assert_eq!(json["doc_ids"], serde_json::json!([0, 1]));

    let (_, json) = get(&app, "/search?q=NOT%20a").await;
    assert_eq!(json["doc_ids"], serde_json::json!([1]));

    let (_, json) = get(&app, "/count?q=b%20AND%20NOT%20c").await;
    assert_eq!(json["count"], 1);

    let (_, json) = get(&app, "/postings/b").await;
    assert_eq!(json["doc_ids"], serde_json::json!([0, 1]));
}

#[tokio::test]
async fn bad_queries_are_client_errors() {
    let (_dir, path) = build_tiny_index();
    let app = server::build_app(path).unwrap();

    let (status, _) = get(&app, "/search?q=a%20AND%20(b").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = serde_json::json!({ "q": "NOT a", "path": [1], "word": "c", "op": "AND" });
    let (status, _) = post_json(&app, "/expand", body, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = serde_json::json!({ "q": "a", "word": "c", "op": "XOR" });
    let (status, _) = post_json(&app, "/expand", body, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expand_and_list_expansions() {
    let (_dir, path) = build_tiny_index();
    let app = server::build_app(path).unwrap();

    let body = serde_json::json!({ "q": "a OR b", "path": [1], "word": "c", "op": "AND NOT" });
    let (status, json) = post_json(&app, "/expand", body, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["canonical"], "(a OR (b AND NOT c))");
    assert_eq!(json["count"], 2);

    let (status, json) = get(&app, "/expansions?q=a%20OR%20b&word=c").await;
    assert_eq!(status, StatusCode::OK);
    let list = json["expansions"].as_array().unwrap();
    assert_eq!(list.len(), 6);
    assert_eq!(list[0]["query"], "((a AND c) OR b)");
    assert_eq!(list[0]["path"], serde_json::json!([0]));
    assert_eq!(list[0]["op"], "AND");
    assert_eq!(list[0]["count"], 3);
    assert_eq!(list[5]["query"], "(a OR (b AND NOT c))");
}

fn write_manifest(index_path: &str, contents: &str) {
    std::fs::write(format!("{index_path}.meta.json"), contents).unwrap();
}

#[tokio::test]
async fn manifest_analyzer_applies_to_queries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("index.bin").to_string_lossy().to_string();
    let mut index = InvertedIndex::new();
    index.add_document(["run", "fast"]);
    index.add_document(["walk"]);
    index.save(&path).unwrap();
    write_manifest(&path, r#"{"num_docs": 2, "analyzer": {"stem": true, "remove_stopwords": false}}"#);

    let app = server::build_app(path).unwrap();
    let (status, json) = get(&app, "/search?q=Running%20OR%20walking").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["canonical"], "(run OR walk)");
    assert_eq!(json["doc_ids"], serde_json::json!([0, 1]));
}

#[tokio::test]
async fn malformed_manifest_fails_startup() {
    let (_dir, path) = build_tiny_index();
    write_manifest(&path, r#"{"analyzer": {"stem": "yes"}}"#);
    let err = server::build_app(path.clone()).unwrap_err();
    assert!(format!("{err:#}").contains("parsing manifest"), "{err:#}");

    write_manifest(&path, "not json");
    assert!(server::build_app(path).is_err());
}

#[tokio::test]
async fn missing_index_fails_startup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.bin").to_string_lossy().to_string();
    assert!(server::build_app(path).is_err());
}

// Single test so the ADMIN_TOKEN environment variable is not raced by other tests.
#[tokio::test]
async fn admin_endpoints_append_and_save() {
    let (_dir, path) = build_tiny_index();
    std::env::set_var("ADMIN_TOKEN", "secret");
    let app = server::build_app(path.clone()).unwrap();

    let body = serde_json::json!({ "documents": [["d"]] });
    let (status, _) = post_json(&app, "/documents", body.clone(), Some("wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let body = serde_json::json!({ "documents": [["d", "a"]], "texts": ["D and E"] });
    let (status, json) = post_json(&app, "/documents", body, Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["doc_ids"], serde_json::json!([3, 4]));

    let (_, json) = get(&app, "/search?q=d").await;
    assert_eq!(json["doc_ids"], serde_json::json!([3, 4]));

    let (status, _) = post_json(&app, "/save", serde_json::json!({}), Some("secret")).await;
    assert_eq!(status, StatusCode::OK);
    let reloaded = InvertedIndex::open(&path).unwrap();
    assert_eq!(reloaded.get_document_count(), 5);
    assert_eq!(reloaded.get_postings("e"), vec![4]);
}
