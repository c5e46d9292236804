//! Binary round-trips: digests, ranges, descriptions

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;

const LDP_BC: &str = "http://www.w3.org/ns/ldp#BasicContainer";

async fn create_binary(app: &axum::Router) -> String {
    send(app, container_post("/", "c1", LDP_BC, "")).await;
    let response = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/c1/")
            .header("content-type", "text/plain")
            .header("slug", "file")
            .header("digest", "md5=XUFAKrxLKna5cZ2REBfFkg==")
            .body(Body::from("hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_binary_round_trip_with_digest() {
    let app = test_app().await;
    let location = create_binary(&app).await;
    assert_eq!(location, "http://localhost:8080/c1/file");

    let response = send(&app, get("/c1/file")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(response.headers().get("accept-ranges").unwrap(), "bytes");
    // Binary validators are strong.
    let etag = response.headers().get("etag").unwrap().to_str().unwrap();
    assert!(!etag.starts_with("W/"));
    assert_eq!(body_string(response).await, "hello");
}

#[tokio::test]
async fn test_want_digest() {
    let app = test_app().await;
    create_binary(&app).await;
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/c1/file")
            .header("want-digest", "SHA")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(
        response.headers().get("digest").unwrap(),
        "sha=qvTGHdzF6KLavt4PO0gs2a6pQ00="
    );
}

#[tokio::test]
async fn test_digest_mismatch_rejected() {
    let app = test_app().await;
    send(&app, container_post("/", "c1", LDP_BC, "")).await;
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/c1/")
            .header("content-type", "text/plain")
            .header("digest", "md5=XUFAKrxLKna5cZ2REBfFkg==")
            .body(Body::from("not hello"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_range_request() {
    let app = test_app().await;
    create_binary(&app).await;
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/c1/file")
            .header("range", "bytes=0-1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_string(response).await, "he");
}

#[tokio::test]
async fn test_description_resource() {
    let app = test_app().await;
    create_binary(&app).await;

    // The binary points at its description.
    let response = send(&app, get("/c1/file")).await;
    let links: Vec<String> = response
        .headers()
        .get_all("link")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(links.iter().any(|l| l.contains("ext=description")
        && l.contains("describedby")));

    // An RDF body on the binary updates its description, not its bytes.
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/c1/file")
            .header("content-type", "text/turtle")
            .body(Body::from(
                "<> <http://purl.org/dc/terms/title> \"A file\" .",
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, get("/c1/file")).await;
    assert_eq!(body_string(response).await, "hello");

    let response = send(&app, get("/c1/file?ext=description")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("A file"));
}

#[tokio::test]
async fn test_rdf_negotiation_on_binary() {
    let app = test_app().await;
    create_binary(&app).await;
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/c1/file")
            .header("accept", "text/turtle")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "text/turtle");
}

#[tokio::test]
async fn test_explicit_nonrdf_with_rdf_body_rejected() {
    let app = test_app().await;
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "text/turtle")
            .header(
                "link",
                "<http://www.w3.org/ns/ldp#NonRDFSource>; rel=\"type\"",
            )
            .body(Body::from("<> <http://purl.org/dc/terms/title> \"x\" ."))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
