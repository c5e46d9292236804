//! Resource value objects
//!
//! A [`Resource`] is an immutable snapshot materialized by the persistence
//! layer; handlers share it freely across tasks. [`Metadata`] carries the
//! server-managed attributes of a pending write. [`ResourceState`] covers
//! the two sentinels the protocol distinguishes: a resource that never
//! existed and one that has been deleted.

use crate::rdf::{Dataset, GraphName, NamedNode, Quad, Triple};
use crate::vocab::ldp;
use chrono::{DateTime, Utc};

/// The LDP interaction model of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionModel {
    /// ldp:Resource
    Resource,
    /// ldp:RDFSource
    RdfSource,
    /// ldp:NonRDFSource
    NonRdfSource,
    /// ldp:Container
    Container,
    /// ldp:BasicContainer
    BasicContainer,
    /// ldp:DirectContainer
    DirectContainer,
    /// ldp:IndirectContainer
    IndirectContainer,
}

impl InteractionModel {
    /// All models the server knows about.
    pub const ALL: &'static [InteractionModel] = &[
        InteractionModel::Resource,
        InteractionModel::RdfSource,
        InteractionModel::NonRdfSource,
        InteractionModel::Container,
        InteractionModel::BasicContainer,
        InteractionModel::DirectContainer,
        InteractionModel::IndirectContainer,
    ];

    /// The IRI of this model
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionModel::Resource => ldp::RESOURCE,
            InteractionModel::RdfSource => ldp::RDF_SOURCE,
            InteractionModel::NonRdfSource => ldp::NON_RDF_SOURCE,
            InteractionModel::Container => ldp::CONTAINER,
            InteractionModel::BasicContainer => ldp::BASIC_CONTAINER,
            InteractionModel::DirectContainer => ldp::DIRECT_CONTAINER,
            InteractionModel::IndirectContainer => ldp::INDIRECT_CONTAINER,
        }
    }

    /// The IRI of this model as a named node
    pub fn iri(self) -> NamedNode {
        NamedNode::new_unchecked(self.as_str())
    }

    /// Resolve an IRI to a model
    pub fn from_iri(iri: &str) -> Option<InteractionModel> {
        Self::ALL.iter().copied().find(|m| m.as_str() == iri)
    }

    /// This model and its supertypes, most specific first.
    ///
    /// `BasicContainer < Container < RDFSource < Resource`, likewise for the
    /// other container types; `NonRDFSource < Resource`.
    pub fn hierarchy(self) -> Vec<InteractionModel> {
        match self {
            InteractionModel::Resource => vec![InteractionModel::Resource],
            InteractionModel::RdfSource => {
                vec![InteractionModel::RdfSource, InteractionModel::Resource]
            }
            InteractionModel::NonRdfSource => {
                vec![InteractionModel::NonRdfSource, InteractionModel::Resource]
            }
            InteractionModel::Container => vec![
                InteractionModel::Container,
                InteractionModel::RdfSource,
                InteractionModel::Resource,
            ],
            InteractionModel::BasicContainer => vec![
                InteractionModel::BasicContainer,
                InteractionModel::Container,
                InteractionModel::RdfSource,
                InteractionModel::Resource,
            ],
            InteractionModel::DirectContainer => vec![
                InteractionModel::DirectContainer,
                InteractionModel::Container,
                InteractionModel::RdfSource,
                InteractionModel::Resource,
            ],
            InteractionModel::IndirectContainer => vec![
                InteractionModel::IndirectContainer,
                InteractionModel::Container,
                InteractionModel::RdfSource,
                InteractionModel::Resource,
            ],
        }
    }

    /// Is this model `other` or one of its subtypes?
    pub fn is_a(self, other: InteractionModel) -> bool {
        self.hierarchy().contains(&other)
    }

    /// Does this model share a supertype chain with `other`?
    ///
    /// A replace may only move between models on the same chain.
    pub fn compatible_with(self, other: InteractionModel) -> bool {
        self.is_a(other) || other.is_a(self)
    }

    /// Is this a container type?
    pub fn is_container(self) -> bool {
        self.is_a(InteractionModel::Container)
    }
}

/// Metadata describing the bytes behind a NonRDFSource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMetadata {
    /// Identifier of the stored content
    pub identifier: NamedNode,
    /// Content type, if known
    pub mime_type: Option<String>,
    /// Size in bytes, if known
    pub size: Option<u64>,
}

/// Server-managed attributes of a pending create/replace/delete.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// Internal identifier of the resource
    pub identifier: NamedNode,
    /// Interaction model to record
    pub interaction_model: InteractionModel,
    /// Parent container, if any
    pub container: Option<NamedNode>,
    /// Binary content description, for NonRDFSources
    pub binary: Option<BinaryMetadata>,
}

impl Metadata {
    /// Metadata for a resource with no binary content
    pub fn new(
        identifier: NamedNode,
        interaction_model: InteractionModel,
        container: Option<NamedNode>,
    ) -> Self {
        Self {
            identifier,
            interaction_model,
            container,
            binary: None,
        }
    }

    /// Attach binary content metadata
    pub fn with_binary(mut self, binary: BinaryMetadata) -> Self {
        self.binary = Some(binary);
        self
    }
}

/// An immutable snapshot of a resource's state.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Internal identifier
    pub identifier: NamedNode,
    /// Interaction model
    pub interaction_model: InteractionModel,
    /// Last modification instant
    pub modified: DateTime<Utc>,
    /// Parent container, if any
    pub container: Option<NamedNode>,
    /// ldp:membershipResource, for Direct/IndirectContainers
    pub membership_resource: Option<NamedNode>,
    /// ldp:hasMemberRelation
    pub member_relation: Option<NamedNode>,
    /// ldp:isMemberOfRelation
    pub member_of_relation: Option<NamedNode>,
    /// ldp:insertedContentRelation
    pub inserted_content_relation: Option<NamedNode>,
    /// Binary content description, for NonRDFSources
    pub binary: Option<BinaryMetadata>,
    /// Materialized graphs
    pub dataset: Dataset,
    /// Whether this snapshot is a memento
    pub is_memento: bool,
}

impl Resource {
    /// Does the resource carry an ACL graph?
    pub fn has_acl(&self) -> bool {
        self.dataset.has_graph(&GraphName::AccessControl)
    }

    /// Every quad of the materialized state.
    pub fn stream(&self) -> impl Iterator<Item = Quad> + '_ {
        self.dataset.quads()
    }

    /// Triples of the selected graphs.
    pub fn triples(&self, graphs: &[GraphName]) -> Vec<Triple> {
        self.dataset.triples_in(graphs)
    }
}

/// Resolution result for an identifier.
#[derive(Debug, Clone)]
pub enum ResourceState {
    /// No resource has ever existed at the identifier
    Missing,
    /// The resource was deleted; a tombstone remains
    Deleted,
    /// A live resource (or memento)
    Present(Box<Resource>),
}

impl ResourceState {
    /// Is this the missing sentinel?
    pub fn is_missing(&self) -> bool {
        matches!(self, ResourceState::Missing)
    }

    /// Is this the deleted sentinel?
    pub fn is_deleted(&self) -> bool {
        matches!(self, ResourceState::Deleted)
    }

    /// The resource, if present
    pub fn resource(&self) -> Option<&Resource> {
        match self {
            ResourceState::Present(r) => Some(r),
            _ => None,
        }
    }
}
