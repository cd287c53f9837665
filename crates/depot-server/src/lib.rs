//! HTTP server for the depot artifact store.
//!
//! Maps every depot operation onto a JSON route. Depot calls block on disk
//! and SQLite, so handlers run them on tokio's blocking pool.

pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use error::{ServerError, ServerResult};
pub use handler::{content_type_for, AppState};
pub use router::build_router;
pub use server::DepotServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use depot_core::{CoordinatorConfig, Depot, DepotConfig, ServerConfig};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn app() -> Router {
        let depot = Arc::new(Depot::in_memory(&CoordinatorConfig::default()));
        DepotServer::new(depot, ServerConfig::default()).router()
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Body) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if uri.starts_with("/v1/check")
            || uri.starts_with("/v1/references")
            || uri == "/v1/releases"
        {
            request = request.header(header::CONTENT_TYPE, "application/json");
        }
        app.clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap()
    }

    async fn get(app: &Router, uri: &str) -> Response {
        send(app, Method::GET, uri, Body::empty()).await
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn put_object(app: &Router, hash: &str, bytes: &'static [u8]) -> Response {
        send(app, Method::PUT, &format!("/v1/objects/{hash}"), Body::from(bytes)).await
    }

    async fn submit(app: &Router, body: Value) -> Value {
        let response = send(app, Method::POST, "/v1/releases", Body::from(body.to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await
    }

    fn release(revision: &str, files: Value, time: &str) -> Value {
        json!({
            "owner": "bob",
            "project": "app",
            "revision": revision,
            "author": "bob",
            "files": files,
            "metadata": {"description": "demo"},
            "time": time,
        })
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = get(&app(), "/v1/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn responses_disable_caching() {
        let response = get(&app(), "/v1/owners").await;
        let headers = response.headers();
        assert_eq!(
            headers[header::CACHE_CONTROL],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers[header::EXPIRES], "0");
    }

    #[tokio::test]
    async fn object_upload_and_check() {
        let app = app();
        assert_eq!(put_object(&app, "h1", b"one").await.status(), StatusCode::CREATED);
        assert_eq!(put_object(&app, "h1", b"one").await.status(), StatusCode::OK);

        let response = get(&app, "/v1/objects/h1").await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"one");

        let response = send(
            &app,
            Method::POST,
            "/v1/check",
            Body::from(json!(["h1", "h2"]).to_string()),
        )
        .await;
        assert_eq!(json_body(response).await, json!(["h1"]));
    }

    #[tokio::test]
    async fn missing_object_is_404() {
        let response = get(&app(), "/v1/objects/nothing").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("nothing"));
    }

    #[tokio::test]
    async fn invalid_hash_is_400() {
        let response = send(
            &app(),
            Method::POST,
            "/v1/check",
            Body::from(json!(["ok", "not a hash"]).to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn release_lifecycle() {
        let app = app();
        put_object(&app, "h1", b"<h1>hi</h1>").await;
        put_object(&app, "h2", b"body {}").await;

        let outcome = submit(
            &app,
            release(
                "rev1",
                json!({"index.html": "h1", "style.css": "h2"}),
                "2024-01-01T00:00:00",
            ),
        )
        .await;
        assert_eq!(outcome, json!({"superseded": 0, "missing": []}));

        let rows = json_body(get(&app, "/v1/releases/bob/app/rev1").await).await;
        assert_eq!(rows.as_array().unwrap().len(), 1);
        assert_eq!(rows[0]["files"]["index.html"], "h1");
        assert_eq!(rows[0]["metadata"]["description"], "demo");

        let outcome = submit(
            &app,
            release("rev1", json!({"index.html": "h1"}), "2024-01-02T00:00:00"),
        )
        .await;
        assert_eq!(outcome["superseded"], 1);

        let refs = send(
            &app,
            Method::POST,
            "/v1/references",
            Body::from(json!(["h1", "h2"]).to_string()),
        )
        .await;
        assert_eq!(
            json_body(refs).await,
            json!({"h1": ["bob/app/rev1/index.html"], "h2": []})
        );

        let latest = json_body(get(&app, "/v1/releases/bob/app/rev1/latest").await).await;
        assert_eq!(latest["time"], "2024-01-02T00:00:00");

        let deleted = send(
            &app,
            Method::DELETE,
            "/v1/releases/bob/app/rev1",
            Body::empty(),
        )
        .await;
        assert_eq!(json_body(deleted).await, json!({"deleted": 1}));

        let rows = json_body(get(&app, "/v1/releases/bob/app/rev1").await).await;
        assert_eq!(rows, json!([]));
        assert_eq!(
            get(&app, "/v1/releases/bob/app/rev1/latest").await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(get(&app, "/v1/objects/h1").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_hashes_are_not_an_error() {
        let app = app();
        let outcome = submit(
            &app,
            release("rev1", json!({"a.bin": "ghost"}), "2024-01-01T00:00:00"),
        )
        .await;
        assert_eq!(outcome, json!({"superseded": 0, "missing": ["ghost"]}));
        assert_eq!(json_body(get(&app, "/v1/owners").await).await, json!([]));
    }

    #[tokio::test]
    async fn invalid_release_key_is_400() {
        let app = app();
        let mut body = release("rev1", json!({}), "2024-01-01T00:00:00");
        body["owner"] = json!("..");
        let response = send(&app, Method::POST, "/v1/releases", Body::from(body.to_string())).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn raw_file_is_typed_by_extension() {
        let app = app();
        put_object(&app, "h1", b"<html></html>").await;
        submit(
            &app,
            release("rev1", json!({"docs/index.html": "h1"}), "2024-01-01T00:00:00"),
        )
        .await;

        let response = get(&app, "/raw/bob/app/rev1/docs/index.html").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        assert_eq!(response.headers()[header::ETAG], "\"h1\"");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<html></html>");

        let missing = get(&app, "/raw/bob/app/rev1/docs/other.html").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listings_paginate() {
        let app = app();
        for i in 0..25 {
            submit(
                &app,
                release(
                    &format!("rev{i}"),
                    json!({}),
                    &format!("2024-01-{:02}T00:00:00", i + 1),
                ),
            )
            .await;
        }

        let page = json_body(get(&app, "/v1/projects/bob/app/commits").await).await;
        assert_eq!(page["total"], 25);
        assert_eq!(page["items"].as_array().unwrap().len(), 20);
        assert_eq!(page["items"][0]["revision"], "rev24");

        let page = json_body(get(&app, "/v1/projects/bob/app/commits?page=3&size=10").await).await;
        assert_eq!(page["offset"], 20);
        assert_eq!(page["items"].as_array().unwrap().len(), 5);

        let page = json_body(get(&app, "/v1/projects/bob/app/commits?start=4&end=2").await).await;
        assert_eq!(page["limit"], 1);
        assert_eq!(page["items"][0]["revision"], "rev20");

        let projects = json_body(get(&app, "/v1/projects?owner=bob").await).await;
        assert_eq!(projects["total"], 1);
        assert_eq!(projects["items"][0]["revision"], "rev24");

        let owners = json_body(get(&app, "/v1/owners").await).await;
        assert_eq!(owners, json!(["bob"]));
    }

    #[tokio::test]
    async fn extreme_range_bounds_are_served() {
        let app = app();
        submit(&app, release("rev1", json!({}), "2024-01-01T00:00:00")).await;

        let uri = format!("/v1/projects/bob/app/commits?start=0&end={}", usize::MAX);
        let response = get(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);

        let uri = format!("/v1/projects?start={}", usize::MAX);
        let response = get(&app, &uri).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = json_body(response).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"], json!([]));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let depot = Arc::new(Depot::in_memory(&CoordinatorConfig::default()));
        let config = ServerConfig {
            max_object_size: 8,
            ..ServerConfig::default()
        };
        let app = DepotServer::new(depot, config).router();
        let response = put_object(&app, "big", b"0123456789abcdef").await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn sqlite_backed_router() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = DepotConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        let depot = Arc::new(Depot::open(&config).unwrap());
        let app = DepotServer::new(depot, config.server).router();

        put_object(&app, "h1", b"x").await;
        let outcome = submit(
            &app,
            release("rev1", json!({"x": "h1"}), "2024-01-01T00:00:00"),
        )
        .await;
        assert_eq!(outcome["missing"], json!([]));
        let rows = json_body(get(&app, "/v1/releases/bob/app/rev1").await).await;
        assert_eq!(rows[0]["files"], json!({"x": "h1"}));
    }
}
