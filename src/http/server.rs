//! HTTP server wiring
//!
//! One wildcard route feeds every request through the method dispatcher so
//! the per-method handlers stay plain async functions over the parsed
//! request value. Mementos are read-only: mutations against a `version`
//! parameter are rejected before any handler runs.

use super::delete::handle_delete;
use super::get::handle_get;
use super::options::handle_options;
use super::patch::handle_patch;
use super::post::handle_post;
use super::put::handle_put;
use super::request::LdpRequest;
use crate::error::HttpError;
use crate::services::{ServiceBundle, Session};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Build the application router.
pub fn app(bundle: Arc<ServiceBundle>) -> Router {
    Router::new()
        .route("/__status", get(status))
        .route("/", any(dispatch))
        .route("/*path", any(dispatch))
        .layer(CorsLayer::permissive())
        .with_state(bundle)
}

async fn status(State(bundle): State<Arc<ServiceBundle>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "storage": bundle
            .config
            .triplestore_location
            .clone()
            .unwrap_or_else(|| "memory".to_string()),
    }))
}

async fn dispatch(State(bundle): State<Arc<ServiceBundle>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return HttpError::BadRequest(format!("cannot read request body: {}", e))
                .into_response()
        }
    };
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .unwrap_or_default();
    let req = LdpRequest::from_parts(
        parts.method.clone(),
        &parts.uri,
        parts.headers,
        bytes,
        session,
        &bundle.config,
    );

    let method = parts.method;
    let is_mutation = matches!(
        method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    if is_mutation && req.version().is_some() {
        // Mementos are read-only.
        return HttpError::MethodNotAllowed(vec!["GET", "HEAD", "OPTIONS"]).into_response();
    }

    let result = if method == Method::GET {
        handle_get(&bundle, &req).await
    } else if method == Method::HEAD {
        handle_get(&bundle, &req).await.map(|response| {
            let (parts, _) = response.into_parts();
            Response::from_parts(parts, Body::empty())
        })
    } else if method == Method::OPTIONS {
        handle_options(&bundle, &req).await
    } else if method == Method::POST {
        handle_post(&bundle, &req).await
    } else if method == Method::PUT {
        handle_put(&bundle, &req).await
    } else if method == Method::PATCH {
        handle_patch(&bundle, &req).await
    } else if method == Method::DELETE {
        handle_delete(&bundle, &req).await
    } else {
        Err(HttpError::MethodNotAllowed(vec![
            "GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE",
        ]))
    };

    match result {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

/// The HTTP server over an assembled service bundle.
pub struct LdpServer {
    bundle: Arc<ServiceBundle>,
}

impl LdpServer {
    /// Create a server
    pub fn new(bundle: Arc<ServiceBundle>) -> Self {
        Self { bundle }
    }

    /// Bind and serve until shutdown.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error>> {
        let addr = format!("{}:{}", self.bundle.config.host, self.bundle.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("LDP server listening on http://{}", addr);

        axum::serve(listener, app(Arc::clone(&self.bundle))).await?;

        Ok(())
    }
}
