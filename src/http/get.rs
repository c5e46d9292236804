//! GET and HEAD handling
//!
//! Resolves the target (live, memento, TimeGate, or TimeMap), negotiates
//! the representation, evaluates preconditions, and streams either the
//! binary content or the serialized RDF view selected by Prefer.

use super::conditions;
use super::conneg::negotiate;
use super::core::{
    accept_post, allow_methods, cache_control, ldp_type_links, prepare_output,
    require_resource, ACCEPT_PATCH,
};
use super::etag::EntityTag;
use super::memento::{http_date, memento_links, timemap_link_format, timemap_triples};
use super::prefer::{selected_graphs, ReturnPreference};
use super::request::{Extension, LdpRequest};
use crate::error::HttpError;
use crate::rdf::{io, GraphName, NamedNode, Triple};
use crate::resource::Resource;
use crate::services::ServiceBundle;
use crate::vocab::rdf;
use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

fn internal_error(e: axum::http::Error) -> HttpError {
    HttpError::Internal(e.to_string())
}

/// Dispatch a GET (or HEAD; the server strips the body).
pub async fn handle_get(bundle: &ServiceBundle, req: &LdpRequest) -> Result<Response, HttpError> {
    let ext = req.ext(&bundle.config);
    if ext == Some(Extension::Timemap) {
        return timemap(bundle, req).await;
    }

    let identifier = req.identifier();
    let version = req.version();

    // Memento instants, used for TimeGate redirection and link headers.
    let mementos: BTreeSet<DateTime<Utc>> = if bundle.config.versioning {
        bundle.mementos.mementos(&identifier).await?
    } else {
        BTreeSet::new()
    };

    if version.is_none() && ext.is_none() && bundle.config.versioning {
        if let Some(datetime) = req.accept_datetime() {
            if !mementos.is_empty() {
                return timegate(req, &mementos, datetime);
            }
        }
    }

    let state = match version {
        Some(time) => bundle.resources.get_at(&identifier, time).await?,
        None => bundle.resources.get(&identifier).await?,
    };
    let resource = require_resource(state)?;

    if ext == Some(Extension::Acl) && !resource.has_acl() {
        return Err(HttpError::NotFound);
    }

    // Binary bytes are only offered on the resource itself, not on the
    // description, ACL, or audit views.
    let binary_type = match (&resource.binary, &ext) {
        (Some(binary), None) => Some(
            binary
                .mime_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        ),
        _ => None,
    };

    let negotiated = negotiate(&req.accept(), binary_type.as_deref())?;
    let prefer = req.prefer();

    let etag = match &negotiated {
        None => EntityTag::binary(identifier.as_str(), resource.modified),
        Some(_) => EntityTag::rdf(
            identifier.as_str(),
            resource.modified,
            prefer.as_ref(),
            bundle.config.weak_etags,
        ),
    };
    conditions::evaluate(
        &req.conditions(),
        Some(&etag),
        Some(resource.modified),
        true,
        bundle.config.precondition_required,
    )?;

    let mut builder = Response::builder()
        .header(header::CACHE_CONTROL, cache_control(bundle))
        .header(header::LAST_MODIFIED, http_date(resource.modified))
        .header(header::ETAG, etag.to_string())
        .header(
            header::ALLOW,
            allow_methods(resource.interaction_model, resource.is_memento).join(","),
        );
    for link in ldp_type_links(resource.interaction_model) {
        builder = builder.header(header::LINK, link.to_string());
    }

    let mut vary = vec!["Accept"];

    if resource.is_memento {
        builder = builder.header("memento-datetime", http_date(resource.modified));
        let external = req.external_url();
        for link in memento_links(
            &external,
            &mementos,
            version,
            bundle.config.include_memento_dates,
        ) {
            builder = builder.header(header::LINK, link.to_string());
        }
    } else {
        if resource.interaction_model.is_container() {
            builder = builder
                .header("accept-post", accept_post())
                .header("accept-patch", ACCEPT_PATCH);
        } else if negotiated.is_some() {
            builder = builder.header("accept-patch", ACCEPT_PATCH);
        }
        if bundle.config.versioning {
            vary.push("Accept-Datetime");
            if ext != Some(Extension::Acl) {
                for link in memento_links(
                    &req.external_url(),
                    &mementos,
                    None,
                    bundle.config.include_memento_dates,
                ) {
                    builder = builder.header(header::LINK, link.to_string());
                }
            }
        }
    }

    match negotiated {
        None => {
            let Some(binary) = resource.binary.as_ref() else {
                return Err(HttpError::Internal(
                    "binary negotiated without binary metadata".to_string(),
                ));
            };
            let content = bundle
                .binaries
                .get_content(&binary.identifier, req.range())
                .await?;

            builder = builder
                .header(
                    header::CONTENT_TYPE,
                    binary_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                )
                .header(header::ACCEPT_RANGES, "bytes")
                .header(
                    header::LINK,
                    format!("<{}?ext=description>; rel=\"describedby\"", req.external_url()),
                )
                .header(header::VARY, vary.join(", "));

            // Serve the first requested digest we support.
            if let Some(algorithm) = req
                .want_digest()
                .into_iter()
                .find(|a| bundle.binaries.supported_algorithms().contains(a))
            {
                builder = builder.header(
                    "digest",
                    format!("{}={}", algorithm.token(), algorithm.digest_base64(&content)),
                );
            }

            builder
                .status(StatusCode::OK)
                .body(Body::from(content))
                .map_err(internal_error)
        }
        Some((syntax, profile)) => {
            vary.push("Prefer");
            builder = builder.header(header::VARY, vary.join(", "));

            if ext == Some(Extension::Description) {
                builder = builder.header(
                    header::LINK,
                    format!("<{}>; rel=\"describes\"", req.external_url()),
                );
            }

            if let Some(applied) = prefer.as_ref().and_then(|p| p.applied()) {
                builder = builder.header("preference-applied", applied);
            }
            if prefer
                .as_ref()
                .and_then(|p| p.preference)
                == Some(ReturnPreference::Minimal)
            {
                return builder
                    .status(StatusCode::NO_CONTENT)
                    .body(Body::empty())
                    .map_err(internal_error);
            }

            let triples = representation_triples(bundle, req, &resource, &ext);
            let body = io::write(syntax, &triples, profile.as_deref())
                .map_err(|e| HttpError::Internal(e.to_string()))?;
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, syntax.media_type())
                .body(Body::from(body))
                .map_err(internal_error)
        }
    }
}

/// Assemble the triples of an RDF representation: graph selection by
/// extension or Prefer, the asserted LDP type, the fragment filter, and
/// output rewriting.
fn representation_triples(
    bundle: &ServiceBundle,
    req: &LdpRequest,
    resource: &Resource,
    ext: &Option<Extension>,
) -> Vec<Triple> {
    let graphs = match ext {
        Some(Extension::Acl) => vec![GraphName::AccessControl],
        Some(Extension::Audit) => vec![GraphName::Audit],
        Some(Extension::Named(name)) => bundle
            .config
            .extension_graph(name)
            .map(|iri| vec![GraphName::from_iri(&iri)])
            .unwrap_or_default(),
        _ => selected_graphs(req.prefer().as_ref()),
    };
    let mut triples = resource.triples(&graphs);

    if bundle.config.include_ldp_type && matches!(ext, None | Some(Extension::Description)) {
        triples.push(Triple::new(
            resource.identifier.clone(),
            NamedNode::new_unchecked(rdf::TYPE),
            resource.interaction_model.iri(),
        ));
    }

    let mut triples = prepare_output(
        bundle,
        triples,
        req.base_url(),
        &resource.identifier,
        resource.interaction_model.is_container(),
    );

    // The fragment filter matches against the representation the client
    // sees, so it runs after identifier rewriting.
    let (subject, predicate, object) = req.fragment_terms();
    if subject.is_some() || predicate.is_some() || object.is_some() {
        let matches_term = |filter: Option<&str>, lexical: &str| {
            filter.is_none_or(|f| f == lexical)
        };
        triples.retain(|t| {
            let subject_lexical = t.subject.to_string();
            matches_term(subject, subject_lexical.trim_matches(['<', '>']))
                && matches_term(predicate, t.predicate.as_str())
                && matches_term(object, t.object.lexical_form())
        });
    }
    triples
}

fn timegate(
    req: &LdpRequest,
    mementos: &BTreeSet<DateTime<Utc>>,
    datetime: DateTime<Utc>,
) -> Result<Response, HttpError> {
    // Nearest memento at or before the request, else the earliest.
    let chosen = mementos
        .range(..=datetime)
        .next_back()
        .or_else(|| mementos.iter().next())
        .copied()
        .expect("non-empty memento set");
    let location = format!("{}?version={}", req.external_url(), chosen.timestamp());
    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::LOCATION, location)
        .header(header::VARY, "Accept-Datetime")
        .header(
            header::LINK,
            format!("<{}>; rel=\"original timegate\"", req.external_url()),
        )
        .body(Body::empty())
        .map_err(internal_error)
}

async fn timemap(bundle: &ServiceBundle, req: &LdpRequest) -> Result<Response, HttpError> {
    let identifier = req.identifier();
    require_resource(bundle.resources.get(&identifier).await?)?;
    let mementos = bundle.mementos.mementos(&identifier).await?;
    let external = req.external_url();

    match negotiate(&req.accept(), None) {
        Ok(Some((syntax, profile))) => {
            let triples = timemap_triples(&external, &mementos);
            let body = io::write(syntax, &triples, profile.as_deref())
                .map_err(|e| HttpError::Internal(e.to_string()))?;
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, syntax.media_type())
                .body(Body::from(body))
                .map_err(internal_error)
        }
        _ => {
            // No RDF syntax acceptable: fall back to link-format.
            let body = timemap_link_format(
                &external,
                &mementos,
                bundle.config.include_memento_dates,
            );
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/link-format")
                .body(Body::from(body))
                .map_err(internal_error)
        }
    }
}
