//! PUT handling: create or replace a resource

use super::conditions;
use super::core::{
    cascade_indirect_update, cascade_to_parent, check_constraints, ldp_type_links, notify,
    parse_entity, rdf_content_type, verify_digest,
};
use super::etag::EntityTag;
use super::request::{Extension, LdpRequest};
use crate::error::HttpError;
use crate::event::ActivityType;
use crate::rdf::{Dataset, GraphName, NamedNode, RdfSyntax};
use crate::resource::{BinaryMetadata, InteractionModel, Metadata, Resource, ResourceState};
use crate::services::ServiceBundle;
use crate::vocab::trellis;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use tracing::debug;

fn parent_identifier(req: &LdpRequest) -> Option<NamedNode> {
    let path = req.path();
    if path.is_empty() {
        return None;
    }
    let parent = match path.rsplit_once('/') {
        Some((prefix, _)) => prefix,
        None => "",
    };
    Some(NamedNode::new_unchecked(format!(
        "{}{}",
        trellis::DATA_PREFIX,
        parent
    )))
}

/// The effective interaction model for a PUT (§ policy): an RDF body on an
/// existing NonRDFSource is a description update; otherwise an explicit
/// Link wins, then the existing model, then the content-type heuristic.
fn effective_model(
    req: &LdpRequest,
    existing: Option<&Resource>,
    body_is_rdf: bool,
) -> Result<InteractionModel, HttpError> {
    if let Some(resource) = existing {
        if resource.interaction_model == InteractionModel::NonRdfSource && body_is_rdf {
            return Ok(InteractionModel::NonRdfSource);
        }
    }
    if let Some(iri) = req.link_type() {
        return InteractionModel::from_iri(&iri).ok_or_else(|| {
            HttpError::BadRequest(format!("unsupported interaction model: {}", iri))
        });
    }
    if let Some(resource) = existing {
        return Ok(resource.interaction_model);
    }
    if req.content_type().is_some() && !body_is_rdf {
        Ok(InteractionModel::NonRdfSource)
    } else {
        Ok(InteractionModel::RdfSource)
    }
}

/// Dispatch a PUT.
pub async fn handle_put(bundle: &ServiceBundle, req: &LdpRequest) -> Result<Response, HttpError> {
    let ext = req.ext(&bundle.config);
    if matches!(ext, Some(Extension::Timemap) | Some(Extension::Audit)) {
        return Err(HttpError::MethodNotAllowed(vec!["GET", "HEAD", "OPTIONS"]));
    }

    let identifier = req.identifier();
    let existing = match bundle.resources.get(&identifier).await? {
        ResourceState::Present(resource) => Some(*resource),
        // A tombstone does not block re-creation through PUT.
        _ => None,
    };
    let body_syntax = rdf_content_type(req.content_type());

    // Preconditions run against the prior state, if any.
    let etag = existing.as_ref().map(|resource| {
        if resource.binary.is_some() && body_syntax.is_none() && ext.is_none() {
            EntityTag::binary(identifier.as_str(), resource.modified)
        } else {
            EntityTag::rdf(
                identifier.as_str(),
                resource.modified,
                None,
                bundle.config.weak_etags,
            )
        }
    });
    conditions::evaluate(
        &req.conditions(),
        etag.as_ref(),
        existing.as_ref().map(|r| r.modified),
        false,
        bundle.config.precondition_required,
    )?;

    if ext == Some(Extension::Acl) && body_syntax.is_none() {
        return Err(HttpError::NotAcceptable);
    }

    let model = effective_model(req, existing.as_ref(), body_syntax.is_some())?;
    if !bundle.resources.supported_interaction_models().contains(&model) {
        return Err(HttpError::BadRequest(
            "unsupported interaction model".to_string(),
        ));
    }
    if let Some(resource) = &existing {
        if !model.compatible_with(resource.interaction_model) {
            return Err(HttpError::Conflict(format!(
                "cannot change {} to {}",
                resource.interaction_model.as_str(),
                model.as_str()
            )));
        }
    }

    let mut metadata = Metadata::new(
        identifier.clone(),
        model,
        existing
            .as_ref()
            .and_then(|r| r.container.clone())
            .or_else(|| parent_identifier(req)),
    );
    let mut dataset = Dataset::new();

    if ext == Some(Extension::Acl) {
        let syntax = body_syntax.unwrap_or(RdfSyntax::Turtle);
        let triples = parse_entity(bundle, req, syntax, &req.external_url())?;
        check_constraints(bundle, model, &identifier, &triples)?;
        dataset.extend(GraphName::AccessControl, triples);
        // The user graph and binary carry through untouched.
        if let Some(resource) = &existing {
            dataset.extend(
                GraphName::UserManaged,
                resource.dataset.graph_triples(&GraphName::UserManaged),
            );
            if let Some(binary) = resource.binary.clone() {
                metadata = metadata.with_binary(binary);
            }
        }
    } else if model == InteractionModel::NonRdfSource && body_syntax.is_none() {
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
        if let Some(resource) = &existing {
            dataset.extend(
                GraphName::AccessControl,
                resource.dataset.graph_triples(&GraphName::AccessControl),
            );
            // Supersede the previous content.
            if let Some(previous) = &resource.binary {
                if let Err(e) = bundle.binaries.purge(&previous.identifier).await {
                    tracing::warn!("binary purge failed for {}: {}", previous.identifier, e);
                }
            }
        }
    } else {
        let syntax = body_syntax.unwrap_or(RdfSyntax::Turtle);
        let triples = parse_entity(bundle, req, syntax, &req.external_url())?;
        check_constraints(bundle, model, &identifier, &triples)?;
        dataset.extend(GraphName::UserManaged, triples);
        if let Some(resource) = &existing {
            dataset.extend(
                GraphName::AccessControl,
                resource.dataset.graph_triples(&GraphName::AccessControl),
            );
            // A description update keeps the binary attached.
            if model == InteractionModel::NonRdfSource {
                if let Some(binary) = resource.binary.clone() {
                    metadata = metadata.with_binary(binary);
                }
            }
        }
    }

    let is_create = existing.is_none();
    debug!(
        "{} {} as {}",
        if is_create { "creating" } else { "replacing" },
        identifier,
        model.as_str()
    );
    let audit = if is_create {
        bundle.audit.creation(&identifier, &req.session)
    } else {
        bundle.audit.update(&identifier, &req.session)
    };
    if is_create {
        tokio::try_join!(
            bundle.resources.create(&metadata, &dataset),
            bundle.resources.add(&identifier, &audit)
        )?;
    } else {
        tokio::try_join!(
            bundle.resources.replace(&metadata, &dataset),
            bundle.resources.add(&identifier, &audit)
        )?;
    }

    let external = if model.is_container() {
        format!("{}/", req.external_url())
    } else {
        req.external_url()
    };

    if ext != Some(Extension::Acl) {
        if is_create {
            notify(bundle, req, external.clone(), model, ActivityType::Create);
            if let Some(parent_id) = &metadata.container {
                if let Ok(ResourceState::Present(parent)) =
                    bundle.resources.get(parent_id).await
                {
                    cascade_to_parent(bundle, req, &parent).await;
                }
            }
        } else {
            notify(bundle, req, external.clone(), model, ActivityType::Update);
            if let Some(resource) = &existing {
                cascade_indirect_update(bundle, req, resource).await;
            }
        }
    }

    if is_create {
        let mut builder = Response::builder()
            .status(StatusCode::CREATED)
            .header(header::CONTENT_LOCATION, external);
        for link in ldp_type_links(model) {
            builder = builder.header(header::LINK, link.to_string());
        }
        builder
            .body(Body::empty())
            .map_err(|e| HttpError::Internal(e.to_string()))
    } else {
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .body(Body::empty())
            .map_err(|e| HttpError::Internal(e.to_string()))
    }
}
