//! OPTIONS handling

use super::core::{accept_post, allow_methods, ldp_type_links, require_resource, ACCEPT_PATCH};
use super::request::LdpRequest;
use crate::error::HttpError;
use crate::resource::InteractionModel;
use crate::services::ServiceBundle;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;

/// Dispatch an OPTIONS request.
pub async fn handle_options(
    bundle: &ServiceBundle,
    req: &LdpRequest,
) -> Result<Response, HttpError> {
    let identifier = req.identifier();
    let resource = require_resource(bundle.resources.get(&identifier).await?)?;
    let is_memento = req.version().is_some();

    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(
            header::ALLOW,
            allow_methods(resource.interaction_model, is_memento).join(","),
        );
    if !is_memento {
        if resource.interaction_model.is_container() {
            builder = builder.header("accept-post", accept_post());
        }
        if resource.interaction_model != InteractionModel::NonRdfSource {
            builder = builder.header("accept-patch", ACCEPT_PATCH);
        }
    }
    for link in ldp_type_links(resource.interaction_model) {
        builder = builder.header(header::LINK, link.to_string());
    }
    builder
        .body(Body::empty())
        .map_err(|e| HttpError::Internal(e.to_string()))
}
