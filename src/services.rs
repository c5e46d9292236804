//! Service contracts consumed by the handler pipeline
//!
//! Handlers never talk to a store directly; they call these traits through
//! a [`ServiceBundle`] assembled at startup. Implementations live in
//! [`crate::triplestore`] and [`crate::binary`]; the event and audit
//! services have defaults in [`crate::event`] and [`crate::audit`].

use crate::binary::DigestAlgorithm;
use crate::config::TrellisConfig;
use crate::constraint::ConstraintService;
use crate::event::Notification;
use crate::rdf::{Dataset, NamedNode, Term};
use crate::resource::{InteractionModel, Metadata, ResourceState};
use crate::vocab::trellis;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

/// Persistence-layer errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The backing store failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The requested interaction model is not supported
    #[error("unsupported interaction model")]
    UnsupportedModel,

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored state could not be interpreted
    #[error("invalid stored data: {0}")]
    InvalidData(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The security principal attached to a request.
#[derive(Debug, Clone)]
pub struct Session {
    /// The agent performing the request
    pub agent: NamedNode,
    /// The agent being acted on behalf of, when delegated
    pub delegated_by: Option<NamedNode>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            agent: NamedNode::new_unchecked(trellis::ANONYMOUS_AGENT),
            delegated_by: None,
        }
    }
}

/// The contract between the handlers and any backing store.
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// Resolve an identifier to its current state.
    async fn get(&self, identifier: &NamedNode) -> ServiceResult<ResourceState>;

    /// Resolve an identifier to its state at (or before) an instant.
    async fn get_at(
        &self,
        identifier: &NamedNode,
        time: DateTime<Utc>,
    ) -> ServiceResult<ResourceState>;

    /// Create a resource. The identifier must not name a live resource.
    async fn create(&self, metadata: &Metadata, dataset: &Dataset) -> ServiceResult<()>;

    /// Replace a live resource's state.
    async fn replace(&self, metadata: &Metadata, dataset: &Dataset) -> ServiceResult<()>;

    /// Delete a resource, leaving a tombstone. Idempotent.
    async fn delete(&self, metadata: &Metadata) -> ServiceResult<()>;

    /// Append immutable (audit) quads to a resource.
    async fn add(&self, identifier: &NamedNode, dataset: &Dataset) -> ServiceResult<()>;

    /// Advance a resource's modification time without touching its state.
    async fn touch(&self, identifier: &NamedNode) -> ServiceResult<()>;

    /// The parent container of an identifier, if any.
    async fn container_of(&self, identifier: &NamedNode)
        -> ServiceResult<Option<NamedNode>>;

    /// Generate an opaque child identifier segment.
    fn generate_identifier(&self) -> String;

    /// The interaction models this store accepts.
    fn supported_interaction_models(&self) -> &[InteractionModel];

    /// Rewrite an internal identifier to its public URL.
    fn to_external(&self, internal: &NamedNode, base_url: &str) -> NamedNode;

    /// Rewrite a public URL to its internal identifier.
    fn to_internal(&self, external: &NamedNode, base_url: &str) -> NamedNode;

    /// Replace a blank node with its skolem IRI.
    fn skolemize(&self, term: Term) -> Term;

    /// Replace a skolem IRI with its blank node.
    fn unskolemize(&self, term: Term) -> Term;
}

/// Versioning support: records and serves resource snapshots.
#[async_trait]
pub trait MementoService: Send + Sync {
    /// Record a snapshot of the resource's current state.
    async fn put(&self, identifier: &NamedNode) -> ServiceResult<()>;

    /// The instants at which snapshots exist, ascending.
    async fn mementos(&self, identifier: &NamedNode)
        -> ServiceResult<BTreeSet<DateTime<Utc>>>;

    /// The snapshot in effect at an instant.
    async fn get(
        &self,
        identifier: &NamedNode,
        time: DateTime<Utc>,
    ) -> ServiceResult<ResourceState>;
}

/// Opaque byte storage for NonRDFSources.
#[async_trait]
pub trait BinaryService: Send + Sync {
    /// Fetch content, optionally a single inclusive byte range.
    async fn get_content(
        &self,
        identifier: &NamedNode,
        range: Option<(u64, Option<u64>)>,
    ) -> ServiceResult<Bytes>;

    /// Store content under an identifier.
    async fn set_content(&self, identifier: &NamedNode, content: Bytes) -> ServiceResult<()>;

    /// Remove stored content. Idempotent.
    async fn purge(&self, identifier: &NamedNode) -> ServiceResult<()>;

    /// Allocate a fresh binary identifier.
    fn generate_identifier(&self) -> NamedNode;

    /// The digest algorithms this service can serve, in preference order.
    fn supported_algorithms(&self) -> &'static [DigestAlgorithm];
}

/// Sink for activity notifications. Emission is best-effort.
pub trait EventService: Send + Sync {
    /// Deliver one notification.
    fn emit(&self, notification: Notification);
}

/// Generator of immutable audit quads for a mutation.
pub trait AuditService: Send + Sync {
    /// Quads recording a creation.
    fn creation(&self, identifier: &NamedNode, session: &Session) -> Dataset;

    /// Quads recording an update.
    fn update(&self, identifier: &NamedNode, session: &Session) -> Dataset;

    /// Quads recording a deletion.
    fn deletion(&self, identifier: &NamedNode, session: &Session) -> Dataset;
}

/// Everything a handler needs, injected at startup.
#[derive(Clone)]
pub struct ServiceBundle {
    /// Resource persistence
    pub resources: Arc<dyn ResourceService>,
    /// Binary content storage
    pub binaries: Arc<dyn BinaryService>,
    /// Versioning
    pub mementos: Arc<dyn MementoService>,
    /// Notification sink
    pub events: Arc<dyn EventService>,
    /// Audit quad generation
    pub audit: Arc<dyn AuditService>,
    /// Constraint rule sets
    pub constraints: Vec<Arc<dyn ConstraintService>>,
    /// Server configuration
    pub config: TrellisConfig,
}
