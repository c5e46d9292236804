//! POST handling: create a child inside a container

use super::conditions;
use super::core::{
    allow_methods, cascade_to_parent, check_constraints, heuristic_model, ldp_type_links,
    notify, parse_entity, rdf_content_type, verify_digest, ACL_ALLOW,
};
use super::etag::EntityTag;
use super::request::LdpRequest;
use crate::error::HttpError;
use crate::event::ActivityType;
use crate::rdf::{Dataset, GraphName, NamedNode, RdfSyntax};
use crate::resource::{BinaryMetadata, InteractionModel, Metadata, ResourceState};
use crate::services::ServiceBundle;
use crate::vocab::trellis;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use tracing::debug;

/// Dispatch a POST.
pub async fn handle_post(bundle: &ServiceBundle, req: &LdpRequest) -> Result<Response, HttpError> {
    // POST addresses the resource itself, never an extension view.
    if req.ext(&bundle.config).is_some() {
        return Err(HttpError::MethodNotAllowed(ACL_ALLOW.to_vec()));
    }

    let parent_id = req.identifier();
    let parent = match bundle.resources.get(&parent_id).await? {
        ResourceState::Missing => return Err(HttpError::NotFound),
        ResourceState::Deleted => return Err(HttpError::Gone),
        ResourceState::Present(parent) => *parent,
    };

    let etag = EntityTag::rdf(
        parent_id.as_str(),
        parent.modified,
        None,
        bundle.config.weak_etags,
    );
    conditions::evaluate(
        &req.conditions(),
        Some(&etag),
        Some(parent.modified),
        false,
        bundle.config.precondition_required,
    )?;

    if !parent.interaction_model.is_container() {
        return Err(HttpError::MethodNotAllowed(allow_methods(
            parent.interaction_model,
            false,
        )));
    }

    let segment = req
        .slug()
        .unwrap_or_else(|| bundle.resources.generate_identifier());
    let child_path = if req.path().is_empty() {
        segment
    } else {
        format!("{}/{}", req.path(), segment)
    };
    let child_id = NamedNode::new_unchecked(format!("{}{}", trellis::DATA_PREFIX, child_path));

    if matches!(
        bundle.resources.get(&child_id).await?,
        ResourceState::Present(_)
    ) {
        return Err(HttpError::Conflict(format!(
            "{} already exists",
            child_path
        )));
    }

    let model = heuristic_model(req.link_type().as_deref(), req.content_type())?;
    if !bundle.resources.supported_interaction_models().contains(&model) {
        return Err(HttpError::BadRequest(
            "unsupported interaction model".to_string(),
        ));
    }

    let child_external = format!("{}/{}", req.base_url(), child_path);
    let mut metadata = Metadata::new(child_id.clone(), model, Some(parent_id));
    let mut dataset = Dataset::new();

    if model == InteractionModel::NonRdfSource {
        if rdf_content_type(req.content_type()).is_some() {
            return Err(HttpError::BadRequest(
                "RDF content cannot be stored as a NonRDFSource".to_string(),
            ));
        }
        verify_digest(req)?;
        let binary_id = bundle.binaries.generate_identifier();
        bundle
            .binaries
            .set_content(&binary_id, req.body.clone())
            .await?;
        metadata = metadata.with_binary(BinaryMetadata {
            identifier: binary_id,
            mime_type: Some(
                req.content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string(),
            ),
            size: Some(req.body.len() as u64),
        });
    } else {
        let syntax = rdf_content_type(req.content_type()).unwrap_or(RdfSyntax::Turtle);
        let triples = parse_entity(bundle, req, syntax, &child_external)?;
        check_constraints(bundle, model, &child_id, &triples)?;
        dataset.extend(GraphName::UserManaged, triples);
    }

    debug!("creating {} as {}", child_id, model.as_str());
    let audit = bundle.audit.creation(&child_id, &req.session);
    tokio::try_join!(
        bundle.resources.create(&metadata, &dataset),
        bundle.resources.add(&child_id, &audit)
    )?;

    // Containers are addressed with a trailing slash.
    let location = if model.is_container() {
        format!("{}/", child_external)
    } else {
        child_external
    };

    notify(bundle, req, location.clone(), model, ActivityType::Create);
    cascade_to_parent(bundle, req, &parent).await;

    let mut builder = Response::builder()
        .status(StatusCode::CREATED)
        .header(header::LOCATION, location.clone());
    for link in ldp_type_links(model) {
        builder = builder.header(header::LINK, link.to_string());
    }
    if model == InteractionModel::NonRdfSource {
        builder = builder.header(
            header::LINK,
            format!("<{}?ext=description>; rel=\"describedby\"", location),
        );
    }
    builder
        .body(Body::empty())
        .map_err(|e| HttpError::Internal(e.to_string()))
}
