//! Shared handler plumbing
//!
//! The pieces every per-method handler composes: target resolution, entity
//! parsing with identifier internalization and skolemization, server-owned
//! triple stripping, constraint checks, digest verification, response
//! header construction, and the touch/event cascade that follows a
//! mutation.

use super::link::Link;
use super::request::LdpRequest;
use crate::error::HttpError;
use crate::event::{ActivityType, Notification};
use crate::rdf::{io, skolem, NamedNode, RdfSyntax, Subject, Term, Triple, READ_SYNTAXES};
use crate::resource::{InteractionModel, Resource, ResourceState};
use crate::services::ServiceBundle;
use crate::vocab::{ldp, rdf};
use tracing::warn;

/// Methods allowed on a resource of the given model.
pub fn allow_methods(model: InteractionModel, is_memento: bool) -> Vec<&'static str> {
    if is_memento {
        return vec!["GET", "HEAD", "OPTIONS"];
    }
    match model {
        InteractionModel::NonRdfSource => {
            vec!["GET", "HEAD", "OPTIONS", "PUT", "DELETE"]
        }
        m if m.is_container() => {
            vec!["GET", "HEAD", "OPTIONS", "PUT", "DELETE", "PATCH", "POST"]
        }
        _ => vec!["GET", "HEAD", "OPTIONS", "PUT", "DELETE", "PATCH"],
    }
}

/// Allow value for a rejected ACL POST.
pub const ACL_ALLOW: &[&str] = &["GET", "HEAD", "OPTIONS", "PATCH", "PUT", "DELETE"];

/// Cache-Control value from configuration.
pub fn cache_control(bundle: &ServiceBundle) -> String {
    let cache = &bundle.config.cache;
    let mut parts = vec![format!("max-age={}", cache.max_age)];
    if cache.must_revalidate {
        parts.push("must-revalidate".to_string());
    }
    if cache.no_cache {
        parts.push("no-cache".to_string());
    }
    parts.join(", ")
}

/// `Link rel=type` headers for a model's supertype chain.
pub fn ldp_type_links(model: InteractionModel) -> Vec<Link> {
    model
        .hierarchy()
        .into_iter()
        .rev()
        .map(|m| Link::rel(m.as_str(), "type"))
        .collect()
}

/// Accept-Post value: the syntaxes accepted on input.
pub fn accept_post() -> String {
    READ_SYNTAXES
        .iter()
        .map(|s| s.media_type())
        .collect::<Vec<_>>()
        .join(",")
}

/// Accept-Patch value.
pub const ACCEPT_PATCH: &str = "application/sparql-update";

/// The RDF syntax of an entity content type, when it is readable.
pub fn rdf_content_type(content_type: Option<&str>) -> Option<RdfSyntax> {
    RdfSyntax::from_media_type(content_type?).filter(|s| s.readable())
}

/// The effective interaction model for a new resource (§ heuristics): an
/// explicit Link type wins; otherwise a non-RDF content type means a
/// NonRDFSource; otherwise an RDFSource.
pub fn heuristic_model(
    link_type: Option<&str>,
    content_type: Option<&str>,
) -> Result<InteractionModel, HttpError> {
    if let Some(iri) = link_type {
        return InteractionModel::from_iri(iri).ok_or_else(|| {
            HttpError::BadRequest(format!("unsupported interaction model: {}", iri))
        });
    }
    if content_type.is_some() && rdf_content_type(content_type).is_none() {
        return Ok(InteractionModel::NonRdfSource);
    }
    Ok(InteractionModel::RdfSource)
}

/// Strip server-owned triples from user input: `rdf:type` assertions with
/// an object in the LDP namespace, and `ldp:contains`.
pub fn strip_server_managed(triples: Vec<Triple>) -> Vec<Triple> {
    triples
        .into_iter()
        .filter(|t| {
            if t.predicate.as_str() == ldp::CONTAINS {
                return false;
            }
            if t.predicate.as_str() == rdf::TYPE {
                if let Some(object) = t.object.as_named_node() {
                    if object.as_str().starts_with(ldp::NS) {
                        return false;
                    }
                }
            }
            true
        })
        .collect()
}

fn map_subject(subject: Subject, f: &impl Fn(NamedNode) -> NamedNode) -> Subject {
    match subject {
        Subject::NamedNode(n) => Subject::NamedNode(f(n)),
        other => other,
    }
}

fn map_term(term: Term, f: &impl Fn(NamedNode) -> NamedNode) -> Term {
    match term {
        Term::NamedNode(n) => Term::NamedNode(f(n)),
        other => other,
    }
}

fn map_named(triples: Vec<Triple>, f: impl Fn(NamedNode) -> NamedNode) -> Vec<Triple> {
    triples
        .into_iter()
        .map(|t| Triple {
            subject: map_subject(t.subject, &f),
            predicate: t.predicate,
            object: map_term(t.object, &f),
        })
        .collect()
}

/// Parse an RDF entity into internalized, skolemized, stripped triples.
pub fn parse_entity(
    bundle: &ServiceBundle,
    req: &LdpRequest,
    syntax: RdfSyntax,
    external_base: &str,
) -> Result<Vec<Triple>, HttpError> {
    let triples = io::read(syntax, &req.body, Some(external_base))
        .map_err(|e| HttpError::BadRequest(e.to_string()))?;
    let base = req.base_url().to_string();
    let resources = bundle.resources.clone();
    let internalized = map_named(triples, move |n| resources.to_internal(&n, &base));
    Ok(strip_server_managed(skolem::skolemize_triples(internalized)))
}

/// Rewrite triples for output: unskolemize, then externalize identifiers.
/// The resource's own identifier gets a trailing slash when it is a
/// container, so containment listings print container URLs canonically.
pub fn prepare_output(
    bundle: &ServiceBundle,
    triples: Vec<Triple>,
    base: &str,
    self_id: &NamedNode,
    self_is_container: bool,
) -> Vec<Triple> {
    let resources = bundle.resources.clone();
    let self_external = resources.to_external(self_id, base);
    let self_slash = if self_is_container && !self_external.as_str().ends_with('/') {
        Some(NamedNode::new_unchecked(format!("{}/", self_external.as_str())))
    } else {
        None
    };
    let self_id = self_id.clone();
    let base = base.to_string();
    map_named(skolem::unskolemize_triples(triples), move |n| {
        if n == self_id {
            if let Some(slash) = &self_slash {
                return slash.clone();
            }
        }
        resources.to_external(&n, &base)
    })
}

/// Run every constraint service over the triples bound for a graph.
pub fn check_constraints(
    bundle: &ServiceBundle,
    model: InteractionModel,
    identifier: &NamedNode,
    triples: &[Triple],
) -> Result<(), HttpError> {
    let violations: Vec<_> = bundle
        .constraints
        .iter()
        .flat_map(|c| c.check(model, identifier, triples))
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(HttpError::ConstraintViolation(violations))
    }
}

/// Verify a Digest header against the entity body.
pub fn verify_digest(req: &LdpRequest) -> Result<(), HttpError> {
    if let Some((algorithm, expected)) = req.digest() {
        let algorithm = algorithm
            .ok_or_else(|| HttpError::BadRequest("invalid digest algorithm".to_string()))?;
        let actual = algorithm.digest_base64(&req.body);
        if actual != expected {
            return Err(HttpError::BadRequest(format!(
                "digest mismatch: expected {}, computed {}",
                expected, actual
            )));
        }
    }
    Ok(())
}

/// Resolve a state to a live resource, mapping the sentinels to 404/410.
pub fn require_resource(state: ResourceState) -> Result<Resource, HttpError> {
    match state {
        ResourceState::Missing => Err(HttpError::NotFound),
        ResourceState::Deleted => Err(HttpError::Gone),
        ResourceState::Present(resource) => Ok(*resource),
    }
}

/// Public URL of a resource, with the container trailing slash.
pub fn external_self(bundle: &ServiceBundle, resource: &Resource, base: &str) -> String {
    let external = bundle.resources.to_external(&resource.identifier, base);
    if resource.interaction_model.is_container() && !external.as_str().ends_with('/') {
        format!("{}/", external.as_str())
    } else {
        external.as_str().to_string()
    }
}

/// Emit an activity notification for a resource.
pub fn notify(
    bundle: &ServiceBundle,
    req: &LdpRequest,
    target: String,
    model: InteractionModel,
    activity: ActivityType,
) {
    let types = model
        .hierarchy()
        .into_iter()
        .map(|m| m.as_str().to_string())
        .collect();
    bundle.events.emit(Notification::new(
        target,
        req.session.agent.clone(),
        activity,
        types,
    ));
}

/// After creating or deleting a child: advance the parent's modification
/// time and emit an Update for it; when the parent is a Direct or Indirect
/// container with a distinct membership resource, do the same there.
pub async fn cascade_to_parent(bundle: &ServiceBundle, req: &LdpRequest, parent: &Resource) {
    if let Err(e) = bundle.resources.touch(&parent.identifier).await {
        warn!("touch failed for {}: {}", parent.identifier, e);
    }
    let target = external_self(bundle, parent, req.base_url());
    notify(
        bundle,
        req,
        target,
        parent.interaction_model,
        ActivityType::Update,
    );

    if let Some(membership) = &parent.membership_resource {
        if *membership != parent.identifier {
            if let Err(e) = bundle.resources.touch(membership).await {
                warn!("touch failed for {}: {}", membership, e);
                return;
            }
            if let Ok(ResourceState::Present(resource)) =
                bundle.resources.get(membership).await
            {
                let target = external_self(bundle, &resource, req.base_url());
                notify(
                    bundle,
                    req,
                    target,
                    resource.interaction_model,
                    ActivityType::Update,
                );
            }
        }
    }
}

/// After updating a resource held by an IndirectContainer: the membership
/// resource's derived view changed, so it is touched and announced too.
pub async fn cascade_indirect_update(
    bundle: &ServiceBundle,
    req: &LdpRequest,
    target: &Resource,
) {
    let Some(container) = &target.container else {
        return;
    };
    let Ok(ResourceState::Present(parent)) = bundle.resources.get(container).await else {
        return;
    };
    if parent.interaction_model != InteractionModel::IndirectContainer {
        return;
    }
    let Some(membership) = parent.membership_resource.clone() else {
        return;
    };
    if let Err(e) = bundle.resources.touch(&membership).await {
        warn!("touch failed for {}: {}", membership, e);
        return;
    }
    if let Ok(ResourceState::Present(resource)) = bundle.resources.get(&membership).await {
        let target = external_self(bundle, &resource, req.base_url());
        notify(
            bundle,
            req,
            target,
            resource.interaction_model,
            ActivityType::Update,
        );
    }
}
