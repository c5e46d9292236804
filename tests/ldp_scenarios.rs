//! Container and membership scenarios over the HTTP surface

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;

const LDP_BC: &str = "http://www.w3.org/ns/ldp#BasicContainer";
const LDP_DC: &str = "http://www.w3.org/ns/ldp#DirectContainer";
const LDP_IC: &str = "http://www.w3.org/ns/ldp#IndirectContainer";

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn test_create_basic_container_then_child() {
    let app = test_app().await;

    // Containment claims in the body are server-owned and must be dropped.
    let body = "<> <http://www.w3.org/ns/ldp#contains> <child> .";
    let response = send(&app, container_post("/", "c1", LDP_BC, body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "http://localhost:8080/c1/"
    );

    let response = send(&app, turtle_post("/c1/", "r1", "")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "http://localhost:8080/c1/r1"
    );

    let response = send(&app, get("/c1/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("http://localhost:8080/c1/>"));
    assert!(body.contains("http://www.w3.org/ns/ldp#contains"));
    assert!(body.contains("http://localhost:8080/c1/r1"));
    // The POSTed containment claim never survived ingestion.
    assert!(!body.contains("child"));
}

#[tokio::test]
async fn test_root_reports_container_links() {
    let app = test_app().await;
    let response = send(&app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let links: Vec<String> = response
        .headers()
        .get_all("link")
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert!(links.iter().any(|l| l.contains(LDP_BC)));
    assert!(links
        .iter()
        .any(|l| l.contains("http://www.w3.org/ns/ldp#Resource")));
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("POST"));
    assert!(response.headers().contains_key("accept-post"));
}

#[tokio::test]
async fn test_direct_container_membership() {
    let app = test_app().await;

    send(&app, turtle_post("/", "m", "")).await;
    let config = format!(
        "<> <http://www.w3.org/ns/ldp#membershipResource> <{base}/m> ;\n\
            <http://www.w3.org/ns/ldp#hasMemberRelation> <http://purl.org/dc/terms/relation> .",
        base = BASE
    );
    let response = send(&app, container_post("/", "dc", LDP_DC, &config)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, turtle_post("/dc/", "x", "")).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, get("/m")).await;
    let body = body_string(response).await;
    assert!(body.contains("http://purl.org/dc/terms/relation"));
    assert!(body.contains("http://localhost:8080/dc/x"));

    // Membership is derived: deleting the child retracts it.
    let response = send(&app, delete("/dc/x")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, get("/m")).await;
    let body = body_string(response).await;
    assert!(!body.contains("http://localhost:8080/dc/x"));
}

#[tokio::test]
async fn test_indirect_container_inserted_content() {
    let app = test_app().await;

    send(&app, turtle_post("/", "m", "")).await;
    let config = format!(
        "<> <http://www.w3.org/ns/ldp#membershipResource> <{base}/m> ;\n\
            <http://www.w3.org/ns/ldp#hasMemberRelation> <http://purl.org/dc/terms/relation> ;\n\
            <http://www.w3.org/ns/ldp#insertedContentRelation> <http://xmlns.com/foaf/0.1/primaryTopic> .",
        base = BASE
    );
    let response = send(&app, container_post("/", "ic", LDP_IC, &config)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let child = "<> <http://xmlns.com/foaf/0.1/primaryTopic> <#it> .";
    let response = send(&app, turtle_post("/ic/", "x", child)).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = send(&app, get("/m")).await;
    let body = body_string(response).await;
    // The member value comes from the child's user graph.
    assert!(body.contains("http://localhost:8080/ic/x#it"));
}

#[tokio::test]
async fn test_post_to_non_container_is_rejected() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(&app, turtle_post("/r1", "nope", "")).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(!allow.contains("POST"));
}

#[tokio::test]
async fn test_post_collision_conflicts() {
    let app = test_app().await;
    assert_eq!(
        send(&app, turtle_post("/", "dup", "")).await.status(),
        StatusCode::CREATED
    );
    assert_eq!(
        send(&app, turtle_post("/", "dup", "")).await.status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_deleted_resources_are_gone() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    assert_eq!(
        send(&app, delete("/r1")).await.status(),
        StatusCode::NO_CONTENT
    );
    assert_eq!(send(&app, get("/r1")).await.status(), StatusCode::GONE);
    // Unknown resources are plain 404.
    assert_eq!(
        send(&app, get("/never-existed")).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_post_to_deleted_parent_is_gone() {
    let app = test_app().await;
    send(&app, container_post("/", "c9", LDP_BC, "")).await;
    send(&app, delete("/c9")).await;
    assert_eq!(
        send(&app, turtle_post("/c9/", "x", "")).await.status(),
        StatusCode::GONE
    );
}

#[tokio::test]
async fn test_type_change_across_chains_conflicts() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    // RDFSource -> NonRDFSource does not share a supertype chain.
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/r1")
            .header("content-type", "text/plain")
            .header(
                "link",
                "<http://www.w3.org/ns/ldp#NonRDFSource>; rel=\"type\"",
            )
            .body(Body::from("bytes"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // RDFSource -> BasicContainer moves along one chain.
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/r1")
            .header("content-type", "text/turtle")
            .header("link", format!("<{}>; rel=\"type\"", LDP_BC))
            .body(Body::from(""))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_conditional_requests() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;

    let response = send(&app, get("/r1")).await;
    let etag = response
        .headers()
        .get("etag")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(etag.starts_with("W/"));

    // If-None-Match with the current tag short-circuits.
    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/r1")
            .header("if-none-match", etag.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    // A stale If-Match blocks mutation.
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/r1")
            .header("content-type", "text/turtle")
            .header("if-match", "W/\"0123456789abcdef\"")
            .body(Body::from(""))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PRECONDITION_FAILED);

    // The live tag lets it through.
    let response = send(
        &app,
        Request::builder()
            .method("PUT")
            .uri("/r1")
            .header("content-type", "text/turtle")
            .header("if-match", etag)
            .body(Body::from(""))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_prefer_minimal_and_audit() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;

    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/r1")
            .header("prefer", "return=minimal")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers().get("preference-applied").unwrap(),
        "return=minimal"
    );

    // The audit trail appears only when asked for.
    let response = send(&app, get("/r1")).await;
    let body = body_string(response).await;
    assert!(!body.contains("http://www.w3.org/ns/prov#Activity"));

    let response = send(
        &app,
        Request::builder()
            .method("GET")
            .uri("/r1")
            .header(
                "prefer",
                "return=representation; include=\"http://www.trellisldp.org/ns/trellis#PreferAudit\"",
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let body = body_string(response).await;
    assert!(body.contains("http://www.w3.org/ns/prov#Activity"));
}

#[tokio::test]
async fn test_options_reports_methods() {
    let app = test_app().await;
    send(&app, turtle_post("/", "r1", "")).await;
    let response = send(
        &app,
        Request::builder()
            .method("OPTIONS")
            .uri("/r1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("PATCH"));
    assert!(!allow.contains("POST"));
    assert_eq!(
        response.headers().get("accept-patch").unwrap(),
        "application/sparql-update"
    );
}
