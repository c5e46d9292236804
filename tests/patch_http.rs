//! SPARQL-Update PATCH behavior

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;

fn patch(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/sparql-update")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_insert_data() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;

    let response = send(
        &app,
        patch(
            "/r1",
            "INSERT DATA { <> <http://purl.org/dc/terms/title> \"T\" }",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, get("/r1")).await;
    let body = body_string(response).await;
    assert!(body.contains("http://localhost:8080/r1"));
    assert!(body.contains("http://purl.org/dc/terms/title"));
    assert!(body.contains("\"T\""));
}

#[tokio::test]
async fn test_delete_insert_where() {
    let app = test_app().await;
    send(
        &app,
        turtle_post("/", "r1", "<> <http://purl.org/dc/terms/title> \"Old\" ."),
    )
    .await;

    let response = send(
        &app,
        patch(
            "/r1",
            "DELETE { <> <http://purl.org/dc/terms/title> ?t }\n\
             INSERT { <> <http://purl.org/dc/terms/title> \"New\" }\n\
             WHERE { <> <http://purl.org/dc/terms/title> ?t }",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let body = body_string(send(&app, get("/r1")).await).await;
    assert!(body.contains("\"New\""));
    assert!(!body.contains("\"Old\""));
}

#[tokio::test]
async fn test_wrong_media_type() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(
        &app,
        Request::builder()
            .method("PATCH")
            .uri("/r1")
            .header("content-type", "text/plain")
            .body(Body::from("INSERT DATA { <a> <b> <c> }"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_missing_body() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(&app, patch("/r1", "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_sparql() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(&app, patch("/r1", "THIS IS NOT SPARQL")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patch_missing_resource() {
    let app = test_app().await;
    let response = send(
        &app,
        patch("/ghost", "INSERT DATA { <> <http://purl.org/dc/terms/title> \"T\" }"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_return_representation() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(
        &app,
        Request::builder()
            .method("PATCH")
            .uri("/r1")
            .header("content-type", "application/sparql-update")
            .header("prefer", "return=representation")
            .header("accept", "text/turtle")
            .body(Body::from(
                "INSERT DATA { <> <http://purl.org/dc/terms/title> \"T\" }",
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("preference-applied").unwrap(),
        "return=representation"
    );
    let body = body_string(response).await;
    assert!(body.contains("\"T\""));
}

#[tokio::test]
async fn test_server_owned_triples_are_stripped() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(
        &app,
        patch(
            "/r1",
            "INSERT DATA { <> <http://www.w3.org/ns/ldp#contains> <http://example.org/x> }",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let body = body_string(send(&app, get("/r1")).await).await;
    assert!(!body.contains("http://example.org/x"));
}

#[tokio::test]
async fn test_patch_binary_rejected() {
    let app = test_app().await;
    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/octet-stream")
            .header("slug", "bin")
            .body(Body::from("bytes"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(
        &app,
        patch(
            "/bin",
            "INSERT DATA { <> <http://purl.org/dc/terms/title> \"T\" }",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // The description remains patchable.
    let response = send(
        &app,
        patch(
            "/bin?ext=description",
            "INSERT DATA { <> <http://purl.org/dc/terms/title> \"T\" }",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
