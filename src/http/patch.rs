//! PATCH handling: apply a SPARQL update to one graph

use super::conditions;
use super::conneg::negotiate;
use super::core::{
    cascade_indirect_update, check_constraints, notify, prepare_output, require_resource,
    strip_server_managed,
};
use super::etag::EntityTag;
use super::prefer::ReturnPreference;
use super::request::{Extension, LdpRequest};
use crate::error::HttpError;
use crate::event::ActivityType;
use crate::rdf::{io, skolem, Dataset, GraphName, Triple};
use crate::resource::{InteractionModel, Metadata};
use crate::services::ServiceBundle;
use crate::triplestore::sparql;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use tracing::debug;

fn externalize(bundle: &ServiceBundle, triples: Vec<Triple>, base: &str) -> Vec<Triple> {
    let resources = bundle.resources.clone();
    skolem::unskolemize_triples(triples)
        .into_iter()
        .map(|t| {
            let subject = match t.subject {
                crate::rdf::Subject::NamedNode(n) => {
                    crate::rdf::Subject::NamedNode(resources.to_external(&n, base))
                }
                other => other,
            };
            let object = match t.object {
                crate::rdf::Term::NamedNode(n) => {
                    crate::rdf::Term::NamedNode(resources.to_external(&n, base))
                }
                other => other,
            };
            Triple {
                subject,
                predicate: t.predicate,
                object,
            }
        })
        .collect()
}

fn internalize(bundle: &ServiceBundle, triples: Vec<Triple>, base: &str) -> Vec<Triple> {
    let resources = bundle.resources.clone();
    let mapped: Vec<Triple> = triples
        .into_iter()
        .map(|t| {
            let subject = match t.subject {
                crate::rdf::Subject::NamedNode(n) => {
                    crate::rdf::Subject::NamedNode(resources.to_internal(&n, base))
                }
                other => other,
            };
            let object = match t.object {
                crate::rdf::Term::NamedNode(n) => {
                    crate::rdf::Term::NamedNode(resources.to_internal(&n, base))
                }
                other => other,
            };
            Triple {
                subject,
                predicate: t.predicate,
                object,
            }
        })
        .collect();
    strip_server_managed(skolem::skolemize_triples(mapped))
}

/// Dispatch a PATCH.
pub async fn handle_patch(
    bundle: &ServiceBundle,
    req: &LdpRequest,
) -> Result<Response, HttpError> {
    let ext = req.ext(&bundle.config);
    if matches!(ext, Some(Extension::Timemap) | Some(Extension::Audit)) {
        return Err(HttpError::MethodNotAllowed(vec!["GET", "HEAD", "OPTIONS"]));
    }

    match req.content_type() {
        Some(value) if value.split(';').next().unwrap_or("").trim()
            == "application/sparql-update" => {}
        _ => return Err(HttpError::UnsupportedMediaType),
    }
    if req.body.is_empty() {
        return Err(HttpError::BadRequest("missing SPARQL-Update body".to_string()));
    }
    let update = std::str::from_utf8(&req.body)
        .map_err(|_| HttpError::BadRequest("SPARQL-Update body is not UTF-8".to_string()))?;

    let identifier = req.identifier();
    let resource = require_resource(bundle.resources.get(&identifier).await?)?;

    // Only RDF state can be patched; for a NonRDFSource that means its
    // description.
    if resource.interaction_model == InteractionModel::NonRdfSource
        && ext != Some(Extension::Description)
    {
        return Err(HttpError::BadRequest(
            "cannot patch a NonRDFSource".to_string(),
        ));
    }

    let prefer = req.prefer();
    let etag = EntityTag::rdf(
        identifier.as_str(),
        resource.modified,
        prefer.as_ref(),
        bundle.config.weak_etags,
    );
    conditions::evaluate(
        &req.conditions(),
        Some(&etag),
        Some(resource.modified),
        false,
        bundle.config.precondition_required,
    )?;

    let target_graph = if ext == Some(Extension::Acl) {
        GraphName::AccessControl
    } else {
        GraphName::UserManaged
    };

    // Apply the update on the externalized view so relative IRIs in the
    // patch body resolve the same way they would in a fetched document.
    let current = externalize(
        bundle,
        resource.dataset.graph_triples(&target_graph),
        req.base_url(),
    );
    let updated = sparql::update_graph(current, update, Some(&req.external_url()))
        .map_err(|e| HttpError::BadRequest(e.to_string()))?;
    let triples = internalize(bundle, updated, req.base_url());

    check_constraints(bundle, resource.interaction_model, &identifier, &triples)?;

    let mut dataset = Dataset::new();
    dataset.extend(target_graph.clone(), triples.clone());
    // The untouched graph carries forward.
    let carried = if target_graph == GraphName::AccessControl {
        GraphName::UserManaged
    } else {
        GraphName::AccessControl
    };
    dataset.extend(carried.clone(), resource.dataset.graph_triples(&carried));

    let mut metadata = Metadata::new(
        identifier.clone(),
        resource.interaction_model,
        resource.container.clone(),
    );
    if let Some(binary) = resource.binary.clone() {
        metadata = metadata.with_binary(binary);
    }

    debug!("patching {} ({} triples)", identifier, dataset.len());
    let audit = bundle.audit.update(&identifier, &req.session);
    tokio::try_join!(
        bundle.resources.replace(&metadata, &dataset),
        bundle.resources.add(&identifier, &audit)
    )?;

    if ext != Some(Extension::Acl) {
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
            ActivityType::Update,
        );
        cascade_indirect_update(bundle, req, &resource).await;
    }

    if prefer.as_ref().and_then(|p| p.preference) == Some(ReturnPreference::Representation) {
        let (syntax, profile) = match negotiate(&req.accept(), None)? {
            Some(selected) => selected,
            None => (crate::rdf::RdfSyntax::Turtle, None),
        };
        let output = prepare_output(
            bundle,
            dataset.graph_triples(&target_graph),
            req.base_url(),
            &identifier,
            resource.interaction_model.is_container(),
        );
        let body = io::write(syntax, &output, profile.as_deref())
            .map_err(|e| HttpError::Internal(e.to_string()))?;
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, syntax.media_type())
            .header("preference-applied", "return=representation")
            .body(Body::from(body))
            .map_err(|e| HttpError::Internal(e.to_string()));
    }

    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .map_err(|e| HttpError::Internal(e.to_string()))
}
