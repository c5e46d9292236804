//! RFC 7240 Prefer header handling
//!
//! The Prefer header selects which graphs a representation includes. The
//! default view is the user graph plus the derived containment and
//! membership views; `ldp:PreferMinimalContainer` drops the derived views,
//! and explicit include/omit IRIs adjust from there.

use crate::rdf::GraphName;
use crate::vocab::{ldp, trellis};

/// The `return` preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPreference {
    /// return=representation
    Representation,
    /// return=minimal
    Minimal,
}

/// A parsed Prefer header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefer {
    /// The return preference, if stated
    pub preference: Option<ReturnPreference>,
    /// IRIs from include=""
    pub include: Vec<String>,
    /// IRIs from omit=""
    pub omit: Vec<String>,
}

fn parse_iri_list(value: &str) -> Vec<String> {
    value
        .trim_matches('"')
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

impl Prefer {
    /// Parse a Prefer header value.
    pub fn parse(header: &str) -> Prefer {
        let mut prefer = Prefer::default();
        for part in header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                match key.trim().to_ascii_lowercase().as_str() {
                    "return" => {
                        prefer.preference = match value.trim().trim_matches('"') {
                            "representation" => Some(ReturnPreference::Representation),
                            "minimal" => Some(ReturnPreference::Minimal),
                            _ => None,
                        }
                    }
                    "include" => prefer.include = parse_iri_list(value.trim()),
                    "omit" => prefer.omit = parse_iri_list(value.trim()),
                    _ => {}
                }
            }
        }
        prefer
    }

    /// The Preference-Applied value to echo, if any.
    pub fn applied(&self) -> Option<&'static str> {
        match self.preference? {
            ReturnPreference::Representation => Some("return=representation"),
            ReturnPreference::Minimal => Some("return=minimal"),
        }
    }

    fn includes(&self, iri: &str) -> bool {
        self.include.iter().any(|i| i == iri)
    }

    fn omits(&self, iri: &str) -> bool {
        self.omit.iter().any(|i| i == iri)
    }
}

/// The graphs a representation should draw from, given a Prefer header.
pub fn selected_graphs(prefer: Option<&Prefer>) -> Vec<GraphName> {
    let mut graphs = vec![
        GraphName::UserManaged,
        GraphName::Containment,
        GraphName::Membership,
    ];
    let Some(prefer) = prefer else {
        return graphs;
    };

    if prefer.includes(ldp::PREFER_MINIMAL_CONTAINER) {
        graphs.retain(|g| *g == GraphName::UserManaged);
    }
    let additions = [
        (trellis::PREFER_AUDIT, GraphName::Audit),
        (trellis::PREFER_SERVER_MANAGED, GraphName::ServerManaged),
        (ldp::PREFER_CONTAINMENT, GraphName::Containment),
        (ldp::PREFER_MEMBERSHIP, GraphName::Membership),
    ];
    for (iri, graph) in additions {
        if prefer.includes(iri) && !graphs.contains(&graph) {
            graphs.push(graph);
        }
    }
    let removals = [
        (trellis::PREFER_USER_MANAGED, GraphName::UserManaged),
        (trellis::PREFER_AUDIT, GraphName::Audit),
        (trellis::PREFER_SERVER_MANAGED, GraphName::ServerManaged),
        (ldp::PREFER_CONTAINMENT, GraphName::Containment),
        (ldp::PREFER_MEMBERSHIP, GraphName::Membership),
    ];
    for (iri, graph) in removals {
        if prefer.omits(iri) {
            graphs.retain(|g| *g != graph);
        }
    }
    graphs
}
