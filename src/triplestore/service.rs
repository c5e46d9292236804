//! Triplestore-backed resource service
//!
//! Every mutation is one atomic SPARQL update: a preamble that clears the
//! resource's graphs (user, extensions, binary fan-out, server-managed
//! rows) followed by an INSERT DATA re-asserting the new state. The audit
//! graph is append-only and survives the preamble.

use super::connection::RdfConnection;
use super::memento::TriplestoreMementoService;
use super::reader;
use crate::config::TrellisConfig;
use crate::rdf::{skolem, Dataset, GraphName, Literal, NamedNode, Term, Triple};
use crate::resource::{InteractionModel, Metadata, ResourceState};
use crate::services::{MementoService, ResourceService, ServiceError, ServiceResult};
use crate::vocab::{acl, dc, foaf, ldp, rdf, trellis, xsd};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// The internal identifier of the root container.
pub fn root_identifier() -> NamedNode {
    NamedNode::new_unchecked(trellis::DATA_PREFIX)
}

/// Graph IRI of a resource's user graph.
pub(crate) fn user_graph(identifier: &NamedNode) -> NamedNode {
    identifier.clone()
}

/// Graph IRI of a resource's extension graph.
pub(crate) fn extension_graph(identifier: &NamedNode, name: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}?ext={}", identifier.as_str(), name))
}

/// Graph IRI of a resource's audit graph.
pub(crate) fn audit_graph(identifier: &NamedNode) -> NamedNode {
    extension_graph(identifier, "audit")
}

pub(crate) fn server_graph() -> NamedNode {
    NamedNode::new_unchecked(trellis::PREFER_SERVER_MANAGED)
}

/// Format an xsd:dateTime literal at millisecond precision.
pub(crate) fn datetime_literal(instant: DateTime<Utc>) -> Literal {
    Literal::typed(
        instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        NamedNode::new_unchecked(xsd::DATE_TIME),
    )
}

fn triple_block(triples: &[Triple]) -> String {
    triples
        .iter()
        .map(|t| format!("    {}\n", t))
        .collect::<String>()
}

const MEMBERSHIP_PREDICATES: &[&str] = &[
    ldp::MEMBERSHIP_RESOURCE,
    ldp::HAS_MEMBER_RELATION,
    ldp::IS_MEMBER_OF_RELATION,
    ldp::INSERTED_CONTENT_RELATION,
];

/// Reference implementation of the resource service over a quad store.
pub struct TriplestoreResourceService {
    connection: Arc<dyn RdfConnection>,
    config: TrellisConfig,
    mementos: TriplestoreMementoService,
}

impl TriplestoreResourceService {
    /// Create a service over a connection
    pub fn new(connection: Arc<dyn RdfConnection>, config: TrellisConfig) -> Self {
        let mementos = TriplestoreMementoService::new(connection.clone(), config.clone());
        Self {
            connection,
            config,
            mementos,
        }
    }

    /// The memento service sharing this connection
    pub fn memento_service(&self) -> TriplestoreMementoService {
        self.mementos.clone()
    }

    /// Clear the resource's mutable graphs: user graph, every configured
    /// extension graph, the binary fan-out, and its server-managed rows.
    fn delete_preamble(&self, identifier: &NamedNode) -> String {
        let mut ops = Vec::new();
        ops.push(format!(
            "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
            user_graph(identifier)
        ));
        for name in self.config.extension_names() {
            ops.push(format!(
                "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
                extension_graph(identifier, name)
            ));
        }
        ops.push(format!(
            "DELETE WHERE {{ GRAPH {psm} {{ {id} <{type_}> <{nonrdf}> . {id} <{haspart}> ?s . ?s ?p ?o }} }}",
            psm = server_graph(),
            id = identifier,
            type_ = rdf::TYPE,
            nonrdf = ldp::NON_RDF_SOURCE,
            haspart = dc::HAS_PART,
        ));
        ops.push(format!(
            "DELETE WHERE {{ GRAPH {} {{ {} ?p ?o }} }}",
            server_graph(),
            identifier
        ));
        ops.join(" ;\n")
    }

    /// Server-managed rows asserted for a live resource.
    fn server_managed(
        &self,
        metadata: &Metadata,
        dataset: &Dataset,
        now: DateTime<Utc>,
    ) -> Vec<Triple> {
        let id = &metadata.identifier;
        let mut triples = vec![
            Triple::new(
                id.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                metadata.interaction_model.iri(),
            ),
            Triple::new(
                id.clone(),
                NamedNode::new_unchecked(dc::MODIFIED),
                datetime_literal(now),
            ),
        ];
        if let Some(container) = &metadata.container {
            triples.push(Triple::new(
                id.clone(),
                NamedNode::new_unchecked(dc::IS_PART_OF),
                container.clone(),
            ));
        }
        if let Some(binary) = &metadata.binary {
            triples.push(Triple::new(
                id.clone(),
                NamedNode::new_unchecked(dc::HAS_PART),
                binary.identifier.clone(),
            ));
            if let Some(mime) = &binary.mime_type {
                triples.push(Triple::new(
                    binary.identifier.clone(),
                    NamedNode::new_unchecked(dc::FORMAT),
                    Literal::simple(mime.clone()),
                ));
            }
            if let Some(size) = binary.size {
                triples.push(Triple::new(
                    binary.identifier.clone(),
                    NamedNode::new_unchecked(dc::EXTENT),
                    Literal::typed(size.to_string(), NamedNode::new_unchecked(xsd::LONG)),
                ));
            }
        }
        // Membership configuration is copied out of the user graph so the
        // read-side queries can resolve it without touching user state.
        if metadata
            .interaction_model
            .is_a(InteractionModel::Container)
        {
            for triple in dataset.graph(&GraphName::UserManaged) {
                if triple.subject.as_named_node() == Some(id)
                    && MEMBERSHIP_PREDICATES.contains(&triple.predicate.as_str())
                    && matches!(triple.object, Term::NamedNode(_))
                {
                    triples.push(triple.clone());
                }
            }
        }
        triples
    }

    /// The tombstone rows asserted for a deleted resource.
    fn tombstone(&self, identifier: &NamedNode, now: DateTime<Utc>) -> Vec<Triple> {
        vec![
            Triple::new(
                identifier.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                NamedNode::new_unchecked(ldp::RESOURCE),
            ),
            Triple::new(
                identifier.clone(),
                NamedNode::new_unchecked(dc::TYPE),
                NamedNode::new_unchecked(trellis::DELETED_RESOURCE),
            ),
            Triple::new(
                identifier.clone(),
                NamedNode::new_unchecked(dc::MODIFIED),
                datetime_literal(now),
            ),
        ]
    }

    fn write_template(&self, metadata: &Metadata, dataset: &Dataset) -> String {
        let id = &metadata.identifier;
        let now = Utc::now();
        let mut insert = format!(
            "  GRAPH {} {{\n{}  }}\n",
            server_graph(),
            triple_block(&self.server_managed(metadata, dataset, now))
        );
        let user = dataset.graph_triples(&GraphName::UserManaged);
        if !user.is_empty() {
            insert.push_str(&format!(
                "  GRAPH {} {{\n{}  }}\n",
                user_graph(id),
                triple_block(&user)
            ));
        }
        for name in self.config.extension_names() {
            let Some(iri) = self.config.extension_graph(name) else {
                continue;
            };
            let triples = dataset.graph_triples(&GraphName::from_iri(&iri));
            if !triples.is_empty() {
                insert.push_str(&format!(
                    "  GRAPH {} {{\n{}  }}\n",
                    extension_graph(id, name),
                    triple_block(&triples)
                ));
            }
        }
        format!(
            "{} ;\nINSERT DATA {{\n{}}}",
            self.delete_preamble(id),
            insert
        )
    }

    async fn record_memento(&self, identifier: &NamedNode) {
        if self.config.versioning {
            if let Err(e) = self.mementos.put(identifier).await {
                tracing::warn!("memento write failed for {}: {}", identifier, e);
            }
        }
    }
}

#[async_trait]
impl ResourceService for TriplestoreResourceService {
    async fn get(&self, identifier: &NamedNode) -> ServiceResult<ResourceState> {
        reader::materialize(&*self.connection, &self.config, identifier, None).await
    }

    async fn get_at(
        &self,
        identifier: &NamedNode,
        time: DateTime<Utc>,
    ) -> ServiceResult<ResourceState> {
        self.mementos.get(identifier, time).await
    }

    async fn create(&self, metadata: &Metadata, dataset: &Dataset) -> ServiceResult<()> {
        if matches!(
            self.get(&metadata.identifier).await?,
            ResourceState::Present(_)
        ) {
            return Err(ServiceError::InvalidData(format!(
                "create on live resource {}",
                metadata.identifier
            )));
        }
        debug!("create {}", metadata.identifier);
        self.connection
            .update(&self.write_template(metadata, dataset))
            .await?;
        self.record_memento(&metadata.identifier).await;
        Ok(())
    }

    async fn replace(&self, metadata: &Metadata, dataset: &Dataset) -> ServiceResult<()> {
        if self.get(&metadata.identifier).await?.is_missing() {
            return Err(ServiceError::InvalidData(format!(
                "replace on missing resource {}",
                metadata.identifier
            )));
        }
        debug!("replace {}", metadata.identifier);
        self.connection
            .update(&self.write_template(metadata, dataset))
            .await?;
        self.record_memento(&metadata.identifier).await;
        Ok(())
    }

    async fn delete(&self, metadata: &Metadata) -> ServiceResult<()> {
        debug!("delete {}", metadata.identifier);
        let update = format!(
            "{} ;\nINSERT DATA {{\n  GRAPH {} {{\n{}  }}\n}}",
            self.delete_preamble(&metadata.identifier),
            server_graph(),
            triple_block(&self.tombstone(&metadata.identifier, Utc::now()))
        );
        self.connection.update(&update).await
    }

    async fn add(&self, identifier: &NamedNode, dataset: &Dataset) -> ServiceResult<()> {
        let triples = dataset.graph_triples(&GraphName::Audit);
        if triples.is_empty() {
            return Ok(());
        }
        let update = format!(
            "INSERT DATA {{\n  GRAPH {} {{\n{}  }}\n}}",
            audit_graph(identifier),
            triple_block(&triples)
        );
        self.connection.update(&update).await
    }

    async fn touch(&self, identifier: &NamedNode) -> ServiceResult<()> {
        let psm = server_graph();
        let modified = NamedNode::new_unchecked(dc::MODIFIED);
        let now = datetime_literal(Utc::now());
        let update = format!(
            "DELETE {{ GRAPH {psm} {{ {id} {modified} ?t }} }}\n\
             INSERT {{ GRAPH {psm} {{ {id} {modified} {now} }} }}\n\
             WHERE  {{ GRAPH {psm} {{ {id} {modified} ?t }} }}",
            psm = psm,
            id = identifier,
            modified = modified,
            now = now,
        );
        self.connection.update(&update).await?;
        self.record_memento(identifier).await;
        Ok(())
    }

    async fn container_of(
        &self,
        identifier: &NamedNode,
    ) -> ServiceResult<Option<NamedNode>> {
        let query = format!(
            "SELECT ?c WHERE {{ GRAPH {} {{ {} <{}> ?c }} }}",
            server_graph(),
            identifier,
            dc::IS_PART_OF
        );
        let rows = self.connection.select(&query).await?;
        Ok(rows.into_iter().find_map(|row| {
            row.get("c").and_then(|term| match term {
                oxrdf::Term::NamedNode(n) => Some(NamedNode::from(n.clone())),
                _ => None,
            })
        }))
    }

    fn generate_identifier(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn supported_interaction_models(&self) -> &[InteractionModel] {
        InteractionModel::ALL
    }

    fn to_external(&self, internal: &NamedNode, base_url: &str) -> NamedNode {
        match internal.as_str().strip_prefix(trellis::DATA_PREFIX) {
            Some(rest) => {
                NamedNode::new_unchecked(format!("{}/{}", base_url.trim_end_matches('/'), rest))
            }
            None => internal.clone(),
        }
    }

    fn to_internal(&self, external: &NamedNode, base_url: &str) -> NamedNode {
        let base = base_url.trim_end_matches('/');
        match external.as_str().strip_prefix(base) {
            Some(rest) => {
                let rest = rest.trim_start_matches('/').trim_end_matches('/');
                NamedNode::new_unchecked(format!("{}{}", trellis::DATA_PREFIX, rest))
            }
            None => external.clone(),
        }
    }

    fn skolemize(&self, term: Term) -> Term {
        skolem::skolemize(term)
    }

    fn unskolemize(&self, term: Term) -> Term {
        skolem::unskolemize(term)
    }
}

impl TriplestoreResourceService {
    /// Provision the root container on cold start.
    ///
    /// When the root has no `rdf:type` row, assert it as a BasicContainer
    /// and grant the administrative ACL to `foaf:Agent`.
    pub async fn initialize(&self) -> ServiceResult<()> {
        let root = root_identifier();
        let query = format!(
            "SELECT ?type WHERE {{ GRAPH {} {{ {} <{}> ?type }} }}",
            server_graph(),
            root,
            rdf::TYPE
        );
        if !self.connection.select(&query).await?.is_empty() {
            return Ok(());
        }
        info!("initializing root container");

        let auth = NamedNode::new_unchecked(format!(
            "{}{}",
            trellis::BNODE_PREFIX,
            Uuid::new_v4().simple()
        ));
        let mut acl_triples = vec![
            Triple::new(
                auth.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                NamedNode::new_unchecked(acl::AUTHORIZATION),
            ),
            Triple::new(
                auth.clone(),
                NamedNode::new_unchecked(acl::AGENT_CLASS),
                NamedNode::new_unchecked(foaf::AGENT),
            ),
            Triple::new(
                auth.clone(),
                NamedNode::new_unchecked(acl::ACCESS_TO),
                root.clone(),
            ),
            Triple::new(
                auth.clone(),
                NamedNode::new_unchecked(acl::DEFAULT),
                root.clone(),
            ),
        ];
        for mode in [acl::READ, acl::WRITE, acl::CONTROL] {
            acl_triples.push(Triple::new(
                auth.clone(),
                NamedNode::new_unchecked(acl::MODE),
                NamedNode::new_unchecked(mode),
            ));
        }

        let server = vec![
            Triple::new(
                root.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                InteractionModel::BasicContainer.iri(),
            ),
            Triple::new(
                root.clone(),
                NamedNode::new_unchecked(dc::MODIFIED),
                datetime_literal(Utc::now()),
            ),
        ];

        let update = format!(
            "INSERT DATA {{\n  GRAPH {} {{\n{}  }}\n  GRAPH {} {{\n{}  }}\n}}",
            server_graph(),
            triple_block(&server),
            extension_graph(&root, "acl"),
            triple_block(&acl_triples)
        );
        self.connection.update(&update).await
    }
}
