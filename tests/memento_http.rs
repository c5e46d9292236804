//! Versioning over HTTP: mementos, TimeMap, TimeGate

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use common::*;
use std::time::Duration;

fn put_turtle(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("content-type", "text/turtle")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn http_date(instant: chrono::DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Two versions of /r, separated by more than a second so their memento
/// instants are distinct. Returns the instant between them.
async fn two_versions(app: &axum::Router) -> chrono::DateTime<Utc> {
    let response = send(
        app,
        put_turtle("/r", "<> <http://purl.org/dc/terms/title> \"v1\" ."),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let between = Utc::now();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let response = send(
        app,
        put_turtle("/r", "<> <http://purl.org/dc/terms/title> \"v2\" ."),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    between
}

#[tokio::test]
async fn test_timegate_redirects_to_snapshot() {
    let app = test_app().await;
    let between = two_versions(&app).await;

    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/r")
            .header("accept-datetime", http_date(between))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.contains("?version="));

    // The redirect target serves the first snapshot.
    let uri = location.strip_prefix(BASE).unwrap().to_string();
    let response = send(&app, get(&uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("memento-datetime"));
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(!allow.contains("PUT"));
    let body = body_string(response).await;
    assert!(body.contains("\"v1\""));
    assert!(!body.contains("\"v2\""));
}

#[tokio::test]
async fn test_current_version_still_served() {
    let app = test_app().await;
    two_versions(&app).await;
    let body = body_string(send(&app, get("/r")).await).await;
    assert!(body.contains("\"v2\""));
}

#[tokio::test]
async fn test_memento_link_headers() {
    let app = test_app().await;
    two_versions(&app).await;

    let response = send(&app, get("/r")).await;
    let links: Vec<String> = response
        .headers()
        .get_all("link")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(links
        .iter()
        .any(|l| l.contains("original timegate")));
    assert!(links.iter().any(|l| l.contains("ext=timemap")));
    let mementos: Vec<&String> =
        links.iter().filter(|l| l.contains("rel=\"memento")).collect();
    assert_eq!(mementos.len(), 2);
    let vary = response.headers().get("vary").unwrap().to_str().unwrap();
    assert!(vary.contains("Accept-Datetime"));
}

#[tokio::test]
async fn test_timemap_bodies() {
    let app = test_app().await;
    two_versions(&app).await;

    // RDF by default.
    let response = send(&app, get("/r?ext=timemap")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/turtle"
    );
    let body = body_string(response).await;
    assert!(body.contains("http://mementoweb.org/ns#TimeMap"));
    assert!(body.contains("http://mementoweb.org/ns#mementoDatetime"));

    // Link-format when no RDF syntax is acceptable.
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/r?ext=timemap")
            .header("accept", "application/link-format")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/link-format"
    );
    let body = body_string(response).await;
    assert!(body.contains("rel=\"original timegate\""));
}

#[tokio::test]
async fn test_mementos_are_read_only() {
    let app = test_app().await;
    two_versions(&app).await;
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/r?version=1")
            .header("content-type", "text/turtle")
            .body(Body::from(""))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_unknown_version_is_not_found() {
    let app = test_app().await;
    send(
        &app,
        put_turtle("/r", "<> <http://purl.org/dc/terms/title> \"v1\" ."),
    )
    .await;
    // No memento exists anywhere near epoch 1000.
    let response = send(&app, get("/never?version=1000")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_timemap_of_missing_resource() {
    let app = test_app().await;
    let response = send(&app, get("/ghost?ext=timemap")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
