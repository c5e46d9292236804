//! Triplestore connections
//!
//! The persistence layer talks to the store through a two-method contract:
//! run an update, run a select. Three backends implement it: a transactional
//! in-memory dataset, the same dataset persisted to an N-Quads file, and a
//! remote SPARQL endpoint.

use super::sparql::{evaluate_query, evaluate_update, Bindings, QuadStore};
use crate::services::{ServiceError, ServiceResult};
use async_trait::async_trait;
use oxrdf::{NamedNode, Subject, Term, Triple};
use rio_api::formatter::QuadsFormatter;
use rio_api::parser::QuadsParser;
use rio_turtle::{NQuadsFormatter, NQuadsParser};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// The run-update / run-select contract against a quad store.
#[async_trait]
pub trait RdfConnection: Send + Sync {
    /// Execute a SPARQL update atomically.
    async fn update(&self, sparql: &str) -> ServiceResult<()>;

    /// Execute a SPARQL SELECT, returning its solution rows.
    async fn select(&self, sparql: &str) -> ServiceResult<Vec<Bindings>>;
}

/// In-memory transactional dataset, optionally persisted to an N-Quads file.
pub struct MemoryConnection {
    store: RwLock<QuadStore>,
    path: Option<PathBuf>,
}

impl MemoryConnection {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self {
            store: RwLock::new(QuadStore::new()),
            path: None,
        }
    }

    /// Open a file-backed store, loading existing quads if the file exists
    pub fn open(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref().to_path_buf();
        let store = if path.exists() {
            let data = std::fs::read(&path)?;
            let store = parse_nquads(&data)?;
            info!("loaded {} quads from {}", store.len(), path.display());
            store
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            QuadStore::new()
        };
        Ok(Self {
            store: RwLock::new(store),
            path: Some(path),
        })
    }

    async fn persist(&self, store: &QuadStore) -> ServiceResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serialize_nquads(store)?;
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, serialized).await?;
        tokio::fs::rename(&staging, path).await?;
        Ok(())
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RdfConnection for MemoryConnection {
    async fn update(&self, sparql: &str) -> ServiceResult<()> {
        let mut guard = self.store.write().await;
        // Stage on a copy so a mid-sequence failure commits nothing.
        let mut staged = guard.clone();
        evaluate_update(&mut staged, sparql)
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        self.persist(&staged).await?;
        *guard = staged;
        Ok(())
    }

    async fn select(&self, sparql: &str) -> ServiceResult<Vec<Bindings>> {
        let guard = self.store.read().await;
        evaluate_query(&guard, sparql).map_err(|e| ServiceError::Persistence(e.to_string()))
    }
}

fn parse_nquads(data: &[u8]) -> ServiceResult<QuadStore> {
    let mut store = QuadStore::new();
    let mut parser = NQuadsParser::new(Cursor::new(data));
    parser
        .parse_all(&mut |quad| {
            let subject = match quad.subject {
                rio_api::model::Subject::NamedNode(n) => {
                    Subject::NamedNode(NamedNode::new_unchecked(n.iri))
                }
                rio_api::model::Subject::BlankNode(b) => {
                    Subject::BlankNode(oxrdf::BlankNode::new_unchecked(b.id))
                }
                _ => return Ok(()),
            };
            let predicate = NamedNode::new_unchecked(quad.predicate.iri);
            let object = match quad.object {
                rio_api::model::Term::NamedNode(n) => {
                    Term::NamedNode(NamedNode::new_unchecked(n.iri))
                }
                rio_api::model::Term::BlankNode(b) => {
                    Term::BlankNode(oxrdf::BlankNode::new_unchecked(b.id))
                }
                rio_api::model::Term::Literal(l) => Term::Literal(match l {
                    rio_api::model::Literal::Simple { value } => {
                        oxrdf::Literal::new_simple_literal(value)
                    }
                    rio_api::model::Literal::LanguageTaggedString { value, language } => {
                        oxrdf::Literal::new_language_tagged_literal_unchecked(value, language)
                    }
                    rio_api::model::Literal::Typed { value, datatype } => {
                        oxrdf::Literal::new_typed_literal(
                            value,
                            NamedNode::new_unchecked(datatype.iri),
                        )
                    }
                }),
                _ => return Ok(()),
            };
            let graph = match quad.graph_name {
                None => None,
                Some(rio_api::model::GraphName::NamedNode(n)) => {
                    Some(NamedNode::new_unchecked(n.iri))
                }
                Some(rio_api::model::GraphName::BlankNode(_)) => return Ok(()),
            };
            store.insert(graph.as_ref(), Triple::new(subject, predicate, object));
            Ok::<(), rio_turtle::TurtleError>(())
        })
        .map_err(|e| ServiceError::InvalidData(e.to_string()))?;
    Ok(store)
}

fn serialize_nquads(store: &QuadStore) -> ServiceResult<Vec<u8>> {
    let mut formatter = NQuadsFormatter::new(Vec::new());
    for (graph, triple) in store.quads() {
        let subject = match &triple.subject {
            Subject::NamedNode(n) => {
                rio_api::model::Subject::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
            }
            Subject::BlankNode(b) => {
                rio_api::model::Subject::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
            }
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        let datatype_node;
        let object = match &triple.object {
            Term::NamedNode(n) => {
                rio_api::model::Term::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
            }
            Term::BlankNode(b) => {
                rio_api::model::Term::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
            }
            Term::Literal(l) => rio_api::model::Term::Literal(match l.language() {
                Some(language) => rio_api::model::Literal::LanguageTaggedString {
                    value: l.value(),
                    language,
                },
                None => {
                    datatype_node = l.datatype();
                    rio_api::model::Literal::Typed {
                        value: l.value(),
                        datatype: rio_api::model::NamedNode {
                            iri: datatype_node.as_str(),
                        },
                    }
                }
            }),
            #[allow(unreachable_patterns)]
            _ => continue,
        };
        let graph_name = graph.map(|g| {
            rio_api::model::GraphName::NamedNode(rio_api::model::NamedNode { iri: g.as_str() })
        });
        formatter
            .format(&rio_api::model::Quad {
                subject,
                predicate: rio_api::model::NamedNode {
                    iri: triple.predicate.as_str(),
                },
                object,
                graph_name,
            })
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
    }
    formatter
        .finish()
        .map_err(|e| ServiceError::Persistence(e.to_string()))
}

/// Connection to a remote SPARQL 1.1 endpoint.
pub struct RemoteConnection {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteConnection {
    /// Connect to an endpoint URL
    pub fn new(endpoint: impl Into<String>) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl RdfConnection for RemoteConnection {
    async fn update(&self, sparql: &str) -> ServiceResult<()> {
        debug!("remote update: {} bytes", sparql.len());
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-update")
            .body(sparql.to_string())
            .send()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ServiceError::Persistence(format!(
                "endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn select(&self, sparql: &str) -> ServiceResult<Vec<Bindings>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/sparql-query")
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .body(sparql.to_string())
            .send()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ServiceError::Persistence(format!(
                "endpoint returned {}",
                response.status()
            )));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Persistence(e.to_string()))?;

        let parser = QueryResultsParser::from_format(QueryResultsFormat::Json);
        let reader = parser
            .for_reader(body.as_ref())
            .map_err(|e| ServiceError::InvalidData(e.to_string()))?;
        let mut rows = Vec::new();
        if let ReaderQueryResultsParserOutput::Solutions(solutions) = reader {
            for solution in solutions {
                let solution = solution.map_err(|e| ServiceError::InvalidData(e.to_string()))?;
                let mut row = Bindings::new();
                for (variable, term) in solution.iter() {
                    row.insert(variable.as_str().to_string(), term.clone());
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

/// Build a connection from the configured triplestore location.
///
/// Unset selects the in-memory store, an `http(s)://` URL a remote
/// endpoint, anything else a local N-Quads file path.
pub fn connect(location: Option<&str>) -> ServiceResult<Arc<dyn RdfConnection>> {
    match location {
        None => {
            info!("using in-memory triplestore");
            Ok(Arc::new(MemoryConnection::new()))
        }
        Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
            info!("using remote triplestore at {}", url);
            Ok(Arc::new(RemoteConnection::new(url)?))
        }
        Some(path) => {
            info!("using file-backed triplestore at {}", path);
            Ok(Arc::new(MemoryConnection::open(path)?))
        }
    }
}
