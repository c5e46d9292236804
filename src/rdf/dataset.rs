//! Named-graph quad collections
//!
//! A [`Dataset`] partitions triples by the graph names the server cares
//! about: user-managed, server-managed, audit, access control, the derived
//! containment/membership views, and any configured extension graph.

use super::types::{NamedNode, Triple};
use crate::vocab::{ldp, trellis};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// The graphs a resource's state is partitioned into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GraphName {
    /// User-authored triples
    UserManaged,
    /// Server-controlled assertions
    ServerManaged,
    /// Audit trail
    Audit,
    /// WebAC authorization statements (the `acl` extension graph)
    AccessControl,
    /// Derived containment view, never stored
    Containment,
    /// Derived membership view, never stored
    Membership,
    /// A configured extension graph, keyed by its IRI
    Extension(NamedNode),
}

impl GraphName {
    /// The IRI naming this graph.
    pub fn iri(&self) -> NamedNode {
        match self {
            GraphName::UserManaged => NamedNode::new_unchecked(trellis::PREFER_USER_MANAGED),
            GraphName::ServerManaged => {
                NamedNode::new_unchecked(trellis::PREFER_SERVER_MANAGED)
            }
            GraphName::Audit => NamedNode::new_unchecked(trellis::PREFER_AUDIT),
            GraphName::AccessControl => {
                NamedNode::new_unchecked(trellis::PREFER_ACCESS_CONTROL)
            }
            GraphName::Containment => NamedNode::new_unchecked(ldp::PREFER_CONTAINMENT),
            GraphName::Membership => NamedNode::new_unchecked(ldp::PREFER_MEMBERSHIP),
            GraphName::Extension(iri) => iri.clone(),
        }
    }

    /// Resolve a graph IRI back to a graph name.
    pub fn from_iri(iri: &NamedNode) -> GraphName {
        match iri.as_str() {
            trellis::PREFER_USER_MANAGED => GraphName::UserManaged,
            trellis::PREFER_SERVER_MANAGED => GraphName::ServerManaged,
            trellis::PREFER_AUDIT => GraphName::Audit,
            trellis::PREFER_ACCESS_CONTROL => GraphName::AccessControl,
            ldp::PREFER_CONTAINMENT => GraphName::Containment,
            ldp::PREFER_MEMBERSHIP => GraphName::Membership,
            _ => GraphName::Extension(iri.clone()),
        }
    }
}

impl fmt::Display for GraphName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.iri().fmt(f)
    }
}

/// A triple together with the graph it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    /// The triple
    pub triple: Triple,
    /// The graph holding it
    pub graph: GraphName,
}

/// A collection of triples partitioned by graph name.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    graphs: HashMap<GraphName, HashSet<Triple>>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple into a graph
    pub fn insert(&mut self, graph: GraphName, triple: Triple) {
        self.graphs.entry(graph).or_default().insert(triple);
    }

    /// Insert many triples into a graph
    pub fn extend(&mut self, graph: GraphName, triples: impl IntoIterator<Item = Triple>) {
        self.graphs.entry(graph).or_default().extend(triples);
    }

    /// Merge another dataset into this one
    pub fn merge(&mut self, other: Dataset) {
        for (graph, triples) in other.graphs {
            self.graphs.entry(graph).or_default().extend(triples);
        }
    }

    /// Iterate the triples of one graph
    pub fn graph(&self, name: &GraphName) -> impl Iterator<Item = &Triple> {
        self.graphs.get(name).into_iter().flatten()
    }

    /// Collect the triples of one graph
    pub fn graph_triples(&self, name: &GraphName) -> Vec<Triple> {
        self.graph(name).cloned().collect()
    }

    /// Collect the triples of several graphs
    pub fn triples_in(&self, names: &[GraphName]) -> Vec<Triple> {
        names.iter().flat_map(|g| self.graph(g).cloned()).collect()
    }

    /// Iterate every quad in the dataset
    pub fn quads(&self) -> impl Iterator<Item = Quad> + '_ {
        self.graphs.iter().flat_map(|(graph, triples)| {
            triples.iter().map(move |t| Quad {
                triple: t.clone(),
                graph: graph.clone(),
            })
        })
    }

    /// Iterate (graph, triple) pairs without cloning
    pub fn iter(&self) -> impl Iterator<Item = (&GraphName, &Triple)> {
        self.graphs
            .iter()
            .flat_map(|(g, ts)| ts.iter().map(move |t| (g, t)))
    }

    /// Does a graph hold any triples?
    pub fn has_graph(&self, name: &GraphName) -> bool {
        self.graphs.get(name).is_some_and(|ts| !ts.is_empty())
    }

    /// Number of triples in one graph
    pub fn graph_len(&self, name: &GraphName) -> usize {
        self.graphs.get(name).map_or(0, HashSet::len)
    }

    /// Remove a graph, returning its triples
    pub fn remove_graph(&mut self, name: &GraphName) -> Vec<Triple> {
        self.graphs
            .remove(name)
            .map(|ts| ts.into_iter().collect())
            .unwrap_or_default()
    }

    /// The graph names present in the dataset
    pub fn graph_names(&self) -> impl Iterator<Item = &GraphName> {
        self.graphs.keys()
    }

    /// Total number of triples
    pub fn len(&self) -> usize {
        self.graphs.values().map(HashSet::len).sum()
    }

    /// Is the dataset empty?
    pub fn is_empty(&self) -> bool {
        self.graphs.values().all(HashSet::is_empty)
    }
}

impl FromIterator<Quad> for Dataset {
    fn from_iter<I: IntoIterator<Item = Quad>>(iter: I) -> Self {
        let mut dataset = Dataset::new();
        for quad in iter {
            dataset.insert(quad.graph, quad.triple);
        }
        dataset
    }
}
