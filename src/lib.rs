//! Trellis: a Linked Data Platform and Memento server
//!
//! Clients manipulate RDF graphs and opaque binaries over HTTP; the server
//! enforces containment, membership, versioning, concurrency, and audit
//! semantics on top of a pluggable persistence layer.
//!
//! # Architecture
//!
//! - `rdf` — terms, named-graph datasets, skolemization, rio-backed I/O
//! - `resource` — the `Resource`/`Metadata` value objects and sentinels
//! - `http` — the per-method handler pipeline and axum wiring
//! - `services` — the contracts between handlers and any backing store
//! - `triplestore` — the reference store: one SPARQL update per mutation
//!   over an in-memory, file-backed, or remote connection
//! - `binary`, `audit`, `event`, `constraint` — the collaborating services
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis::config::TrellisConfig;
//! use trellis::http::LdpServer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bundle = trellis::default_bundle(TrellisConfig::default())
//!         .await
//!         .expect("service assembly");
//!     LdpServer::new(bundle).start().await.expect("server");
//! }
//! ```

#![warn(clippy::all)]

pub mod audit;
pub mod binary;
pub mod config;
pub mod constraint;
pub mod error;
pub mod event;
pub mod http;
pub mod rdf;
pub mod resource;
pub mod services;
pub mod triplestore;
pub mod vocab;

// Re-export the main types for convenience
pub use config::TrellisConfig;
pub use error::HttpError;
pub use event::{ActivityType, Notification};
pub use rdf::{
    BlankNode, Dataset, GraphName, Literal, NamedNode, Quad, RdfSyntax, Subject, Term, Triple,
};
pub use resource::{
    BinaryMetadata, InteractionModel, Metadata, Resource, ResourceState,
};
pub use services::{
    AuditService, BinaryService, EventService, MementoService, ResourceService, ServiceBundle,
    ServiceError, ServiceResult, Session,
};
pub use triplestore::{TriplestoreMementoService, TriplestoreResourceService};

use std::sync::Arc;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

/// Assemble the default service stack for a configuration: a triplestore
/// connection selected by location, the snapshot memento service, in-memory
/// binary storage, the built-in audit generator and LDP constraints, and a
/// logging event sink. Provisions the root container.
pub async fn default_bundle(config: TrellisConfig) -> ServiceResult<Arc<ServiceBundle>> {
    let connection = triplestore::connect(config.triplestore_location.as_deref())?;
    let resources = TriplestoreResourceService::new(connection, config.clone());
    resources.initialize().await?;
    let mementos = Arc::new(resources.memento_service());

    Ok(Arc::new(ServiceBundle {
        resources: Arc::new(resources),
        binaries: Arc::new(binary::MemoryBinaryService::new()),
        mementos,
        events: Arc::new(event::LoggingEventService),
        audit: Arc::new(audit::DefaultAuditService),
        constraints: vec![Arc::new(constraint::LdpConstraints)],
        config,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }

    #[tokio::test]
    async fn test_default_bundle_provisions_root() {
        let bundle = default_bundle(TrellisConfig::default()).await.unwrap();
        let root = bundle
            .resources
            .get(&triplestore::root_identifier())
            .await
            .unwrap();
        let resource = root.resource().expect("root container");
        assert_eq!(
            resource.interaction_model,
            InteractionModel::BasicContainer
        );
        assert!(resource.has_acl());
    }
}
