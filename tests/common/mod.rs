//! Shared helpers for driving the router in tests
#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;
use trellis::config::TrellisConfig;
use trellis::http::app;

pub const BASE: &str = "http://localhost:8080";

/// An in-memory application with a fixed base URL.
pub async fn test_app() -> Router {
    let config = TrellisConfig {
        base_url: Some(BASE.to_string()),
        ..TrellisConfig::default()
    };
    let bundle = trellis::default_bundle(config).await.expect("bundle");
    app(bundle)
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<axum::body::Body> {
    app.clone().oneshot(request).await.expect("response")
}

pub async fn body_string(response: Response<axum::body::Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn turtle_post(uri: &str, slug: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/turtle")
        .header("slug", slug)
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn container_post(uri: &str, slug: &str, model: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "text/turtle")
        .header("slug", slug)
        .header("link", format!("<{}>; rel=\"type\"", model))
        .body(Body::from(body.to_string()))
        .expect("request")
}
