//! Triplestore persistence
//!
//! The reference implementation of the resource-service contract over a
//! named-graph quad store. Every mutation is a single SPARQL update; reads
//! run fixed SELECT queries. The connection seam supports an in-memory
//! dataset, an N-Quads file, or a remote SPARQL endpoint.

pub mod connection;
pub mod memento;
mod reader;
pub mod service;
pub mod sparql;

pub use connection::{connect, MemoryConnection, RdfConnection, RemoteConnection};
pub use memento::TriplestoreMementoService;
pub use service::{root_identifier, TriplestoreResourceService};
pub use sparql::{SparqlError, SparqlResult};
