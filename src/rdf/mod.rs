//! RDF support: terms, named-graph datasets, skolemization, and I/O
//!
//! The term types wrap oxrdf; datasets partition triples by the graph
//! names the server manages; parsing and serialization go through rio.

mod dataset;
pub mod io;
pub mod skolem;
mod types;

pub use dataset::{Dataset, GraphName, Quad};
pub use io::{IoError, IoResult, RdfSyntax, READ_SYNTAXES, WRITE_SYNTAXES};
pub use types::{
    BlankNode, Literal, NamedNode, RdfError, RdfResult, Subject, Term, Triple,
};
