//! DELETE handling
//!
//! A plain DELETE writes the tombstone and clears every other graph. A
//! DELETE addressed at the ACL extension is a replace that clears only the
//! ACL graph, carrying the user state through and emitting no event.

use super::conditions;
use super::core::{cascade_to_parent, notify, require_resource};
use super::etag::EntityTag;
use super::request::{Extension, LdpRequest};
use crate::error::HttpError;
use crate::event::ActivityType;
use crate::rdf::{Dataset, GraphName};
use crate::resource::{Metadata, ResourceState};
use crate::services::ServiceBundle;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use tracing::{debug, warn};

/// Dispatch a DELETE.
pub async fn handle_delete(
    bundle: &ServiceBundle,
    req: &LdpRequest,
) -> Result<Response, HttpError> {
    let ext = req.ext(&bundle.config);
    if matches!(ext, Some(Extension::Timemap) | Some(Extension::Audit)) {
        return Err(HttpError::MethodNotAllowed(vec!["GET", "HEAD", "OPTIONS"]));
    }

    let identifier = req.identifier();
    let resource = require_resource(bundle.resources.get(&identifier).await?)?;

    let etag = EntityTag::rdf(
        identifier.as_str(),
        resource.modified,
        None,
        bundle.config.weak_etags,
    );
    conditions::evaluate(
        &req.conditions(),
        Some(&etag),
        Some(resource.modified),
        false,
        bundle.config.precondition_required,
    )?;

    let mut metadata = Metadata::new(
        identifier.clone(),
        resource.interaction_model,
        resource.container.clone(),
    );
    if let Some(binary) = resource.binary.clone() {
        metadata = metadata.with_binary(binary);
    }

    if ext == Some(Extension::Acl) {
        // Clear only the ACL graph; user triples stay in place.
        debug!("clearing acl for {}", identifier);
        let mut dataset = Dataset::new();
        dataset.extend(
            GraphName::UserManaged,
            resource.dataset.graph_triples(&GraphName::UserManaged),
        );
        let audit = bundle.audit.update(&identifier, &req.session);
        tokio::try_join!(
            bundle.resources.replace(&metadata, &dataset),
            bundle.resources.add(&identifier, &audit)
        )?;
        return Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .map_err(|e| HttpError::Internal(e.to_string()));
    }

    debug!("deleting {}", identifier);
    let audit = bundle.audit.deletion(&identifier, &req.session);
    tokio::try_join!(
        bundle.resources.delete(&metadata),
        bundle.resources.add(&identifier, &audit)
    )?;

    if let Some(binary) = &resource.binary {
        if let Err(e) = bundle.binaries.purge(&binary.identifier).await {
            warn!("binary purge failed for {}: {}", binary.identifier, e);
        }
    }

    let external = if resource.interaction_model.is_container() {
        format!("{}/", req.external_url())
    } else {
        req.external_url()
    };
    notify(
        bundle,
        req,
        external,
        resource.interaction_model,
        ActivityType::Delete,
    );
    if let Some(parent_id) = &resource.container {
        if let Ok(ResourceState::Present(parent)) = bundle.resources.get(parent_id).await {
            cascade_to_parent(bundle, req, &parent).await;
        }
    }

    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .map_err(|e| HttpError::Internal(e.to_string()))
}
