//! Resource materialization
//!
//! Runs the fixed read-side queries against a connection and assembles an
//! immutable [`Resource`] snapshot: server-managed attributes, user and
//! extension graphs, the audit trail, and the derived containment and
//! membership views. Mementos materialize from their snapshot graphs and
//! skip the derived views.

use super::connection::RdfConnection;
use super::service::{extension_graph, server_graph, user_graph};
use crate::config::TrellisConfig;
use crate::rdf::{Dataset, GraphName, NamedNode, Subject, Term, Triple};
use crate::resource::{BinaryMetadata, InteractionModel, Resource, ResourceState};
use crate::services::{ServiceError, ServiceResult};
use crate::vocab::{dc, ldp, rdf, trellis};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

fn to_term(term: &oxrdf::Term) -> Term {
    Term::from(term.clone())
}

fn to_subject(term: &oxrdf::Term) -> Option<Subject> {
    match Term::from(term.clone()) {
        Term::NamedNode(n) => Some(Subject::NamedNode(n)),
        Term::BlankNode(b) => Some(Subject::BlankNode(b)),
        Term::Literal(_) => None,
    }
}

fn named(term: &oxrdf::Term) -> Option<NamedNode> {
    match term {
        oxrdf::Term::NamedNode(n) => Some(NamedNode::from(n.clone())),
        _ => None,
    }
}

/// Graph names used to materialize a resource, shifted for mementos.
struct GraphSet {
    user: NamedNode,
    audit: NamedNode,
    server: Option<NamedNode>,
    extensions: Vec<(String, NamedNode, GraphName)>,
}

impl GraphSet {
    fn build(config: &TrellisConfig, identifier: &NamedNode, version: Option<i64>) -> Self {
        let extensions = config
            .extension_names()
            .into_iter()
            .filter_map(|name| {
                let iri = config.extension_graph(name)?;
                let graph = match version {
                    None => extension_graph(identifier, name),
                    Some(v) => NamedNode::new_unchecked(format!(
                        "{}?version={}&ext={}",
                        identifier.as_str(),
                        v,
                        name
                    )),
                };
                Some((name.to_string(), graph, GraphName::from_iri(&iri)))
            })
            .collect();
        match version {
            None => Self {
                user: user_graph(identifier),
                audit: extension_graph(identifier, "audit"),
                server: None,
                extensions,
            },
            Some(v) => Self {
                user: NamedNode::new_unchecked(format!(
                    "{}?version={}",
                    identifier.as_str(),
                    v
                )),
                audit: NamedNode::new_unchecked(format!(
                    "{}?version={}&ext=audit",
                    identifier.as_str(),
                    v
                )),
                server: Some(NamedNode::new_unchecked(format!(
                    "{}?version={}&ext=server",
                    identifier.as_str(),
                    v
                ))),
                extensions,
            },
        }
    }
}

async fn select_graph(
    connection: &dyn RdfConnection,
    graph: &NamedNode,
) -> ServiceResult<Vec<Triple>> {
    let query = format!("SELECT ?s ?p ?o WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}", graph);
    let rows = connection.select(&query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let subject = to_subject(row.get("s")?)?;
            let predicate = match row.get("p")? {
                oxrdf::Term::NamedNode(n) => NamedNode::from(n.clone()),
                _ => return None,
            };
            Some(Triple::new(subject, predicate, to_term(row.get("o")?)))
        })
        .collect())
}

/// Server-managed rows about one subject: predicate -> objects.
async fn select_properties(
    connection: &dyn RdfConnection,
    graph: &NamedNode,
    subject: &NamedNode,
) -> ServiceResult<HashMap<String, Vec<Term>>> {
    let query = format!(
        "SELECT ?p ?o WHERE {{ GRAPH {} {{ {} ?p ?o }} }}",
        graph, subject
    );
    let rows = connection.select(&query).await?;
    let mut properties: HashMap<String, Vec<Term>> = HashMap::new();
    for row in &rows {
        let (Some(p), Some(o)) = (row.get("p"), row.get("o")) else {
            continue;
        };
        let Some(predicate) = named(p) else { continue };
        properties
            .entry(predicate.as_str().to_string())
            .or_default()
            .push(to_term(o));
    }
    Ok(properties)
}

fn first_named(properties: &HashMap<String, Vec<Term>>, predicate: &str) -> Option<NamedNode> {
    properties
        .get(predicate)?
        .iter()
        .find_map(|t| t.as_named_node().cloned())
}

fn parse_modified(properties: &HashMap<String, Vec<Term>>) -> Option<DateTime<Utc>> {
    properties
        .get(dc::MODIFIED)?
        .iter()
        .find_map(|t| t.as_literal())
        .and_then(|l| DateTime::parse_from_rfc3339(l.value()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

async fn containment(
    connection: &dyn RdfConnection,
    identifier: &NamedNode,
) -> ServiceResult<Vec<Triple>> {
    let query = format!(
        "SELECT ?c WHERE {{ GRAPH {} {{ ?c <{}> {} }} }}",
        server_graph(),
        dc::IS_PART_OF,
        identifier
    );
    let rows = connection.select(&query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| named(row.get("c")?))
        .map(|child| {
            Triple::new(
                identifier.clone(),
                NamedNode::new_unchecked(ldp::CONTAINS),
                child,
            )
        })
        .collect())
}

/// Membership triples for `identifier` as the membership resource of one
/// or more DirectContainers with a forward member relation.
async fn direct_membership(
    connection: &dyn RdfConnection,
    identifier: &NamedNode,
) -> ServiceResult<Vec<Triple>> {
    let query = format!(
        "SELECT ?p ?o WHERE {{ GRAPH {psm} {{ \
            ?s <{membership}> {id} . \
            ?s <{type_}> <{direct}> . \
            ?s <{relation}> ?p . \
            ?o <{partof}> ?s . }} }}",
        psm = server_graph(),
        membership = ldp::MEMBERSHIP_RESOURCE,
        id = identifier,
        type_ = rdf::TYPE,
        direct = ldp::DIRECT_CONTAINER,
        relation = ldp::HAS_MEMBER_RELATION,
        partof = dc::IS_PART_OF,
    );
    let rows = connection.select(&query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let predicate = named(row.get("p")?)?;
            let object = named(row.get("o")?)?;
            Some(Triple::new(identifier.clone(), predicate, object))
        })
        .collect())
}

/// The inverse variant: `identifier` is a child of a DirectContainer with
/// `ldp:isMemberOfRelation`.
async fn inverse_membership(
    connection: &dyn RdfConnection,
    identifier: &NamedNode,
) -> ServiceResult<Vec<Triple>> {
    let query = format!(
        "SELECT ?p ?o WHERE {{ GRAPH {psm} {{ \
            {id} <{partof}> ?s . \
            ?s <{type_}> <{direct}> . \
            ?s <{inverse}> ?p . \
            ?s <{membership}> ?o . }} }}",
        psm = server_graph(),
        id = identifier,
        partof = dc::IS_PART_OF,
        type_ = rdf::TYPE,
        direct = ldp::DIRECT_CONTAINER,
        inverse = ldp::IS_MEMBER_OF_RELATION,
        membership = ldp::MEMBERSHIP_RESOURCE,
    );
    let rows = connection.select(&query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let predicate = named(row.get("p")?)?;
            let object = named(row.get("o")?)?;
            Some(Triple::new(identifier.clone(), predicate, object))
        })
        .collect())
}

/// IndirectContainer membership: objects come from each child's user graph
/// through the container's `insertedContentRelation`, except for
/// `ldp:MemberSubject`, which degenerates to the direct case.
async fn indirect_membership(
    connection: &dyn RdfConnection,
    identifier: &NamedNode,
) -> ServiceResult<Vec<Triple>> {
    let query = format!(
        "SELECT ?p ?icr ?child WHERE {{ GRAPH {psm} {{ \
            ?s <{membership}> {id} . \
            ?s <{type_}> <{indirect}> . \
            ?s <{relation}> ?p . \
            ?s <{icr_pred}> ?icr . \
            ?child <{partof}> ?s . }} }}",
        psm = server_graph(),
        membership = ldp::MEMBERSHIP_RESOURCE,
        id = identifier,
        type_ = rdf::TYPE,
        indirect = ldp::INDIRECT_CONTAINER,
        relation = ldp::HAS_MEMBER_RELATION,
        icr_pred = ldp::INSERTED_CONTENT_RELATION,
        partof = dc::IS_PART_OF,
    );
    let rows = connection.select(&query).await?;

    let mut triples = Vec::new();
    for row in &rows {
        let (Some(p), Some(icr), Some(child)) =
            (row.get("p"), row.get("icr"), row.get("child"))
        else {
            continue;
        };
        let (Some(predicate), Some(icr), Some(child)) = (named(p), named(icr), named(child))
        else {
            continue;
        };
        if icr.as_str() == ldp::MEMBER_SUBJECT {
            triples.push(Triple::new(identifier.clone(), predicate, child));
            continue;
        }
        let values = format!(
            "SELECT ?o WHERE {{ GRAPH {child} {{ {child} {icr} ?o }} }}",
            child = child,
            icr = icr,
        );
        for value_row in connection.select(&values).await? {
            if let Some(object) = value_row.get("o") {
                triples.push(Triple::new(
                    identifier.clone(),
                    predicate.clone(),
                    to_term(object),
                ));
            }
        }
    }
    Ok(triples)
}

/// Materialize the state of `identifier`, either live or at a memento.
pub(crate) async fn materialize(
    connection: &dyn RdfConnection,
    config: &TrellisConfig,
    identifier: &NamedNode,
    version: Option<i64>,
) -> ServiceResult<ResourceState> {
    let graphs = GraphSet::build(config, identifier, version);

    // Server-managed rows: either the global graph or the snapshot graph.
    let (properties, server_triples) = match &graphs.server {
        None => {
            let properties =
                select_properties(connection, &server_graph(), identifier).await?;
            let mut triples: Vec<Triple> = properties
                .iter()
                .flat_map(|(p, objects)| {
                    let predicate = NamedNode::new_unchecked(p.clone());
                    objects.iter().map(move |o| {
                        Triple::new(identifier.clone(), predicate.clone(), o.clone())
                    })
                })
                .collect();
            // Pull the binary description rows alongside.
            if let Some(binary_id) = first_named(&properties, dc::HAS_PART) {
                let binary_props =
                    select_properties(connection, &server_graph(), &binary_id).await?;
                for (p, objects) in &binary_props {
                    let predicate = NamedNode::new_unchecked(p.clone());
                    for o in objects {
                        triples.push(Triple::new(
                            binary_id.clone(),
                            predicate.clone(),
                            o.clone(),
                        ));
                    }
                }
            }
            (properties, triples)
        }
        Some(snapshot) => {
            let triples = select_graph(connection, snapshot).await?;
            let mut properties: HashMap<String, Vec<Term>> = HashMap::new();
            for triple in &triples {
                if triple.subject.as_named_node() == Some(identifier) {
                    properties
                        .entry(triple.predicate.as_str().to_string())
                        .or_default()
                        .push(triple.object.clone());
                }
            }
            (properties, triples)
        }
    };

    if properties.is_empty() {
        return Ok(ResourceState::Missing);
    }
    if properties
        .get(dc::TYPE)
        .is_some_and(|objects| {
            objects
                .iter()
                .any(|o| o.as_named_node().map(NamedNode::as_str) == Some(trellis::DELETED_RESOURCE))
        })
    {
        return Ok(ResourceState::Deleted);
    }

    let interaction_model = properties
        .get(rdf::TYPE)
        .into_iter()
        .flatten()
        .filter_map(|t| t.as_named_node())
        .find_map(|n| InteractionModel::from_iri(n.as_str()))
        .ok_or_else(|| {
            ServiceError::InvalidData(format!("{} has no interaction model", identifier))
        })?;
    let modified = parse_modified(&properties).ok_or_else(|| {
        ServiceError::InvalidData(format!("{} has no modification time", identifier))
    })?;

    let binary = first_named(&properties, dc::HAS_PART).map(|binary_id| {
        let mime_type = server_triples
            .iter()
            .find(|t| {
                t.subject.as_named_node() == Some(&binary_id)
                    && t.predicate.as_str() == dc::FORMAT
            })
            .map(|t| t.object.lexical_form().to_string());
        let size = server_triples
            .iter()
            .find(|t| {
                t.subject.as_named_node() == Some(&binary_id)
                    && t.predicate.as_str() == dc::EXTENT
            })
            .and_then(|t| t.object.lexical_form().parse().ok());
        BinaryMetadata {
            identifier: binary_id,
            mime_type,
            size,
        }
    });

    let mut dataset = Dataset::new();
    dataset.extend(GraphName::ServerManaged, server_triples);
    dataset.extend(
        GraphName::UserManaged,
        select_graph(connection, &graphs.user).await?,
    );
    dataset.extend(GraphName::Audit, select_graph(connection, &graphs.audit).await?);
    for (_, graph, name) in &graphs.extensions {
        dataset.extend(name.clone(), select_graph(connection, graph).await?);
    }

    if version.is_none() {
        if interaction_model.is_container() {
            dataset.extend(
                GraphName::Containment,
                containment(connection, identifier).await?,
            );
        }
        let mut membership = direct_membership(connection, identifier).await?;
        membership.extend(indirect_membership(connection, identifier).await?);
        membership.extend(inverse_membership(connection, identifier).await?);
        dataset.extend(GraphName::Membership, membership);
    }

    Ok(ResourceState::Present(Box::new(Resource {
        identifier: identifier.clone(),
        interaction_model,
        modified,
        container: first_named(&properties, dc::IS_PART_OF),
        membership_resource: first_named(&properties, ldp::MEMBERSHIP_RESOURCE),
        member_relation: first_named(&properties, ldp::HAS_MEMBER_RELATION),
        member_of_relation: first_named(&properties, ldp::IS_MEMBER_OF_RELATION),
        inserted_content_relation: first_named(&properties, ldp::INSERTED_CONTENT_RELATION),
        binary,
        dataset,
        is_memento: version.is_some(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Literal;
    use crate::resource::Metadata;
    use crate::services::ResourceService;
    use crate::triplestore::connection::MemoryConnection;
    use crate::triplestore::service::{root_identifier, TriplestoreResourceService};
    use std::sync::Arc;

    fn service() -> TriplestoreResourceService {
        TriplestoreResourceService::new(
            Arc::new(MemoryConnection::new()),
            TrellisConfig::default(),
        )
    }

    fn internal(segment: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", trellis::DATA_PREFIX, segment))
    }

    fn membership_config(
        dc_id: &NamedNode,
        member: &NamedNode,
        relation: &str,
        icr: Option<&str>,
    ) -> Dataset {
        let mut dataset = Dataset::new();
        dataset.insert(
            GraphName::UserManaged,
            Triple::new(
                dc_id.clone(),
                NamedNode::new_unchecked(ldp::MEMBERSHIP_RESOURCE),
                member.clone(),
            ),
        );
        dataset.insert(
            GraphName::UserManaged,
            Triple::new(
                dc_id.clone(),
                NamedNode::new_unchecked(relation),
                NamedNode::new_unchecked(dc::RELATION),
            ),
        );
        if let Some(icr) = icr {
            dataset.insert(
                GraphName::UserManaged,
                Triple::new(
                    dc_id.clone(),
                    NamedNode::new_unchecked(ldp::INSERTED_CONTENT_RELATION),
                    NamedNode::new_unchecked(icr),
                ),
            );
        }
        dataset
    }

    #[tokio::test]
    async fn test_direct_membership_forward() {
        let service = service();
        let member = internal("m");
        let dc_id = internal("dc");
        let child = internal("dc/x");

        service
            .create(
                &Metadata::new(member.clone(), InteractionModel::RdfSource, None),
                &Dataset::new(),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(dc_id.clone(), InteractionModel::DirectContainer, None),
                &membership_config(&dc_id, &member, ldp::HAS_MEMBER_RELATION, None),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(child.clone(), InteractionModel::RdfSource, Some(dc_id)),
                &Dataset::new(),
            )
            .await
            .unwrap();

        let state = service.get(&member).await.unwrap();
        let membership = state
            .resource()
            .unwrap()
            .dataset
            .graph_triples(&GraphName::Membership);
        assert_eq!(membership.len(), 1);
        assert_eq!(membership[0].predicate.as_str(), dc::RELATION);
        assert_eq!(membership[0].object.as_named_node().unwrap(), &child);
    }

    #[tokio::test]
    async fn test_direct_membership_inverse() {
        let service = service();
        let member = internal("m");
        let dc_id = internal("dc");
        let child = internal("dc/x");

        service
            .create(
                &Metadata::new(member.clone(), InteractionModel::RdfSource, None),
                &Dataset::new(),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(dc_id.clone(), InteractionModel::DirectContainer, None),
                &membership_config(&dc_id, &member, ldp::IS_MEMBER_OF_RELATION, None),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(child.clone(), InteractionModel::RdfSource, Some(dc_id)),
                &Dataset::new(),
            )
            .await
            .unwrap();

        let state = service.get(&child).await.unwrap();
        let membership = state
            .resource()
            .unwrap()
            .dataset
            .graph_triples(&GraphName::Membership);
        assert_eq!(membership.len(), 1);
        assert_eq!(
            membership[0].subject.as_named_node().unwrap(),
            &child
        );
        assert_eq!(membership[0].object.as_named_node().unwrap(), &member);
    }

    #[tokio::test]
    async fn test_indirect_membership_inserted_content() {
        let service = service();
        let member = internal("m");
        let ic = internal("ic");
        let child = internal("ic/x");
        let topic = NamedNode::new_unchecked("http://example.org/topic");

        service
            .create(
                &Metadata::new(member.clone(), InteractionModel::RdfSource, None),
                &Dataset::new(),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(ic.clone(), InteractionModel::IndirectContainer, None),
                &membership_config(
                    &ic,
                    &member,
                    ldp::HAS_MEMBER_RELATION,
                    Some(crate::vocab::foaf::PRIMARY_TOPIC),
                ),
            )
            .await
            .unwrap();

        let mut child_data = Dataset::new();
        child_data.insert(
            GraphName::UserManaged,
            Triple::new(
                child.clone(),
                NamedNode::new_unchecked(crate::vocab::foaf::PRIMARY_TOPIC),
                topic.clone(),
            ),
        );
        service
            .create(
                &Metadata::new(child.clone(), InteractionModel::RdfSource, Some(ic)),
                &child_data,
            )
            .await
            .unwrap();

        let state = service.get(&member).await.unwrap();
        let membership = state
            .resource()
            .unwrap()
            .dataset
            .graph_triples(&GraphName::Membership);
        assert_eq!(membership.len(), 1);
        assert_eq!(membership[0].object.as_named_node().unwrap(), &topic);
    }

    #[tokio::test]
    async fn test_member_subject_degenerates_to_direct() {
        let service = service();
        let member = internal("m");
        let ic = internal("ic");
        let child = internal("ic/x");

        service
            .create(
                &Metadata::new(member.clone(), InteractionModel::RdfSource, None),
                &Dataset::new(),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(ic.clone(), InteractionModel::IndirectContainer, None),
                &membership_config(
                    &ic,
                    &member,
                    ldp::HAS_MEMBER_RELATION,
                    Some(ldp::MEMBER_SUBJECT),
                ),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(child.clone(), InteractionModel::RdfSource, Some(ic)),
                &Dataset::new(),
            )
            .await
            .unwrap();

        let state = service.get(&member).await.unwrap();
        let membership = state
            .resource()
            .unwrap()
            .dataset
            .graph_triples(&GraphName::Membership);
        assert_eq!(membership.len(), 1);
        assert_eq!(membership[0].object.as_named_node().unwrap(), &child);
    }

    #[tokio::test]
    async fn test_membership_disappears_after_child_delete() {
        let service = service();
        let member = internal("m");
        let dc_id = internal("dc");
        let child = internal("dc/x");

        service
            .create(
                &Metadata::new(member.clone(), InteractionModel::RdfSource, None),
                &Dataset::new(),
            )
            .await
            .unwrap();
        service
            .create(
                &Metadata::new(dc_id.clone(), InteractionModel::DirectContainer, None),
                &membership_config(&dc_id, &member, ldp::HAS_MEMBER_RELATION, None),
            )
            .await
            .unwrap();
        let child_meta =
            Metadata::new(child.clone(), InteractionModel::RdfSource, Some(dc_id));
        service.create(&child_meta, &Dataset::new()).await.unwrap();
        service.delete(&child_meta).await.unwrap();

        let state = service.get(&member).await.unwrap();
        assert!(state
            .resource()
            .unwrap()
            .dataset
            .graph_triples(&GraphName::Membership)
            .is_empty());
    }

    #[tokio::test]
    async fn test_missing_and_acl_flags() {
        let service = service();
        assert!(service.get(&internal("nothing")).await.unwrap().is_missing());

        service.initialize().await.unwrap();
        let root = service.get(&root_identifier()).await.unwrap();
        assert!(root.resource().unwrap().has_acl());

        let plain = internal("plain");
        let mut dataset = Dataset::new();
        dataset.insert(
            GraphName::UserManaged,
            Triple::new(
                plain.clone(),
                NamedNode::new_unchecked(dc::TITLE),
                Literal::simple("no acl here"),
            ),
        );
        service
            .create(
                &Metadata::new(plain.clone(), InteractionModel::RdfSource, None),
                &dataset,
            )
            .await
            .unwrap();
        assert!(!service.get(&plain).await.unwrap().resource().unwrap().has_acl());
    }
}
