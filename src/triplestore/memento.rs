//! Snapshot-graph memento service
//!
//! After each successful mutation the current state of a resource is copied
//! into versioned graphs: `<id>?version=<epoch-sec>` for the user graph
//! plus `&ext=server|acl|audit` companions. The instant index lives in a
//! dedicated graph and drives TimeMap and TimeGate handling.

use super::connection::RdfConnection;
use super::reader;
use super::service::{
    audit_graph, datetime_literal, extension_graph, server_graph, user_graph,
};
use crate::config::TrellisConfig;
use crate::rdf::{NamedNode, Triple};
use crate::services::{MementoService, ServiceResult};
use crate::vocab::{dc, memento, trellis};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use tracing::debug;

fn index_graph() -> NamedNode {
    NamedNode::new_unchecked(trellis::MEMENTO_INDEX_GRAPH)
}

fn version_graph(identifier: &NamedNode, epoch: i64) -> NamedNode {
    NamedNode::new_unchecked(format!("{}?version={}", identifier.as_str(), epoch))
}

fn version_ext_graph(identifier: &NamedNode, epoch: i64, ext: &str) -> NamedNode {
    NamedNode::new_unchecked(format!(
        "{}?version={}&ext={}",
        identifier.as_str(),
        epoch,
        ext
    ))
}

async fn copy_graph(
    connection: &dyn RdfConnection,
    source: &NamedNode,
) -> ServiceResult<Vec<String>> {
    let query = format!("SELECT ?s ?p ?o WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}", source);
    let rows = connection.select(&query).await?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let s = row.get("s")?;
            let p = row.get("p")?;
            let o = row.get("o")?;
            Some(format!("    {} {} {} .\n", s, p, o))
        })
        .collect())
}

/// Versioning over the same connection as the resource service.
#[derive(Clone)]
pub struct TriplestoreMementoService {
    connection: std::sync::Arc<dyn RdfConnection>,
    config: TrellisConfig,
}

impl TriplestoreMementoService {
    /// Create a memento service over a connection
    pub fn new(connection: std::sync::Arc<dyn RdfConnection>, config: TrellisConfig) -> Self {
        Self { connection, config }
    }
}

#[async_trait]
impl MementoService for TriplestoreMementoService {
    async fn put(&self, identifier: &NamedNode) -> ServiceResult<()> {
        // Snapshot the server-managed rows about the resource and, for a
        // NonRDFSource, its binary description.
        let psm = server_graph();
        let query = format!(
            "SELECT ?p ?o WHERE {{ GRAPH {} {{ {} ?p ?o }} }}",
            psm, identifier
        );
        let rows = self.connection.select(&query).await?;
        if rows.is_empty() {
            return Ok(());
        }

        let mut modified: Option<DateTime<Utc>> = None;
        let mut binary: Option<NamedNode> = None;
        let mut server_lines = Vec::new();
        for row in &rows {
            let (Some(p), Some(o)) = (row.get("p"), row.get("o")) else {
                continue;
            };
            if let oxrdf::Term::NamedNode(p_node) = p {
                if p_node.as_str() == dc::MODIFIED {
                    if let oxrdf::Term::Literal(l) = o {
                        modified = DateTime::parse_from_rfc3339(l.value())
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc));
                    }
                }
                if p_node.as_str() == dc::HAS_PART {
                    if let oxrdf::Term::NamedNode(n) = o {
                        binary = Some(NamedNode::from(n.clone()));
                    }
                }
            }
            server_lines.push(format!("    {} {} {} .\n", identifier, p, o));
        }
        let Some(modified) = modified else {
            return Ok(());
        };
        if let Some(binary) = &binary {
            let query = format!(
                "SELECT ?p ?o WHERE {{ GRAPH {} {{ {} ?p ?o }} }}",
                psm, binary
            );
            for row in self.connection.select(&query).await? {
                let (Some(p), Some(o)) = (row.get("p"), row.get("o")) else {
                    continue;
                };
                server_lines.push(format!("    {} {} {} .\n", binary, p, o));
            }
        }

        let epoch = modified.timestamp();
        let user_lines = copy_graph(&*self.connection, &user_graph(identifier)).await?;
        let audit_lines = copy_graph(&*self.connection, &audit_graph(identifier)).await?;

        let mut blocks = format!(
            "  GRAPH {} {{\n{}  }}\n",
            version_ext_graph(identifier, epoch, "server"),
            server_lines.concat()
        );
        if !user_lines.is_empty() {
            blocks.push_str(&format!(
                "  GRAPH {} {{\n{}  }}\n",
                version_graph(identifier, epoch),
                user_lines.concat()
            ));
        }
        if !audit_lines.is_empty() {
            blocks.push_str(&format!(
                "  GRAPH {} {{\n{}  }}\n",
                version_ext_graph(identifier, epoch, "audit"),
                audit_lines.concat()
            ));
        }
        for name in self.config.extension_names() {
            let lines =
                copy_graph(&*self.connection, &extension_graph(identifier, name)).await?;
            if !lines.is_empty() {
                blocks.push_str(&format!(
                    "  GRAPH {} {{\n{}  }}\n",
                    version_ext_graph(identifier, epoch, name),
                    lines.concat()
                ));
            }
        }

        // Index the instant at second precision.
        let instant = Utc
            .timestamp_opt(epoch, 0)
            .single()
            .unwrap_or(modified);
        let index = Triple::new(
            identifier.clone(),
            NamedNode::new_unchecked(memento::MEMENTO_DATETIME),
            datetime_literal(instant),
        );
        blocks.push_str(&format!(
            "  GRAPH {} {{\n    {}\n  }}\n",
            index_graph(),
            index
        ));

        // Re-recording within the same second overwrites the snapshot.
        let mut preamble = vec![
            format!(
                "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
                version_graph(identifier, epoch)
            ),
            format!(
                "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
                version_ext_graph(identifier, epoch, "server")
            ),
            format!(
                "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
                version_ext_graph(identifier, epoch, "audit")
            ),
        ];
        for name in self.config.extension_names() {
            preamble.push(format!(
                "DELETE WHERE {{ GRAPH {} {{ ?s ?p ?o }} }}",
                version_ext_graph(identifier, epoch, name)
            ));
        }

        let update = format!("{} ;\nINSERT DATA {{\n{}}}", preamble.join(" ;\n"), blocks);
        debug!("memento {} at {}", identifier, epoch);
        self.connection.update(&update).await
    }

    async fn mementos(
        &self,
        identifier: &NamedNode,
    ) -> ServiceResult<BTreeSet<DateTime<Utc>>> {
        let query = format!(
            "SELECT ?t WHERE {{ GRAPH {} {{ {} <{}> ?t }} }}",
            index_graph(),
            identifier,
            memento::MEMENTO_DATETIME
        );
        let rows = self.connection.select(&query).await?;
        Ok(rows
            .iter()
            .filter_map(|row| match row.get("t") {
                Some(oxrdf::Term::Literal(l)) => DateTime::parse_from_rfc3339(l.value())
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc)),
                _ => None,
            })
            .collect())
    }

    async fn get(
        &self,
        identifier: &NamedNode,
        time: DateTime<Utc>,
    ) -> ServiceResult<crate::resource::ResourceState> {
        let instants = self.mementos(identifier).await?;
        // The memento in effect: the newest instant not after the request,
        // or the earliest snapshot when the request predates them all.
        let chosen = instants
            .range(..=time)
            .next_back()
            .or_else(|| instants.iter().next())
            .copied();
        match chosen {
            None => Ok(crate::resource::ResourceState::Missing),
            Some(instant) => {
                reader::materialize(
                    &*self.connection,
                    &self.config,
                    identifier,
                    Some(instant.timestamp()),
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{Dataset, GraphName, Literal};
    use crate::resource::{InteractionModel, Metadata};
    use crate::services::ResourceService;
    use crate::triplestore::connection::MemoryConnection;
    use crate::triplestore::service::TriplestoreResourceService;
    use std::sync::Arc;

    fn internal(segment: &str) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", trellis::DATA_PREFIX, segment))
    }

    fn titled(id: &NamedNode, title: &str) -> Dataset {
        let mut dataset = Dataset::new();
        dataset.insert(
            GraphName::UserManaged,
            Triple::new(
                id.clone(),
                NamedNode::new_unchecked(dc::TITLE),
                Literal::simple(title),
            ),
        );
        dataset
    }

    #[tokio::test]
    async fn test_snapshot_and_floor_lookup() {
        let service = TriplestoreResourceService::new(
            Arc::new(MemoryConnection::new()),
            TrellisConfig::default(),
        );
        let mementos = service.memento_service();
        let id = internal("r");
        let metadata = Metadata::new(id.clone(), InteractionModel::RdfSource, None);

        service.create(&metadata, &titled(&id, "v1")).await.unwrap();
        let instants = mementos.mementos(&id).await.unwrap();
        assert_eq!(instants.len(), 1);
        let t1 = *instants.iter().next().unwrap();

        // A lookup at any time >= t1 serves the v1 snapshot.
        let state = mementos.get(&id, t1 + chrono::Duration::seconds(30)).await.unwrap();
        let resource = state.resource().expect("memento should exist");
        assert!(resource.is_memento);
        let titles = resource.dataset.graph_triples(&GraphName::UserManaged);
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].object.lexical_form(), "v1");

        // A lookup before the first snapshot still serves the earliest.
        let state = mementos.get(&id, t1 - chrono::Duration::seconds(30)).await.unwrap();
        assert!(state.resource().is_some());
    }

    #[tokio::test]
    async fn test_versioning_disabled_records_nothing() {
        let config = TrellisConfig {
            versioning: false,
            ..TrellisConfig::default()
        };
        let service = TriplestoreResourceService::new(
            Arc::new(MemoryConnection::new()),
            config,
        );
        let mementos = service.memento_service();
        let id = internal("r");
        let metadata = Metadata::new(id.clone(), InteractionModel::RdfSource, None);
        service.create(&metadata, &titled(&id, "v1")).await.unwrap();
        assert!(mementos.mementos(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_resource_has_no_memento() {
        let service = TriplestoreResourceService::new(
            Arc::new(MemoryConnection::new()),
            TrellisConfig::default(),
        );
        let mementos = service.memento_service();
        let id = internal("ghost");
        mementos.put(&id).await.unwrap();
        assert!(mementos.mementos(&id).await.unwrap().is_empty());
        assert!(mementos.get(&id, Utc::now()).await.unwrap().is_missing());
    }
}
