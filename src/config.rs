//! Server configuration
//!
//! All keys have serde defaults so an empty file (or no file at all) yields
//! a working in-memory server. Configuration is fixed after startup.

use crate::rdf::NamedNode;
use crate::vocab::trellis;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// File could not be parsed
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Cache-Control settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// max-age in seconds
    pub max_age: u64,
    /// emit must-revalidate
    pub must_revalidate: bool,
    /// emit no-cache
    pub no_cache: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age: 86400,
            must_revalidate: true,
            no_cache: false,
        }
    }
}

/// Top-level server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TrellisConfig {
    /// Bind address
    pub host: String,
    /// Port
    pub port: u16,
    /// Public base URL; when unset it is derived from the Host header
    pub base_url: Option<String>,
    /// Cache-Control settings
    pub cache: CacheConfig,
    /// Emit weak ETags for RDF resources
    pub weak_etags: bool,
    /// Record mementos on mutation
    pub versioning: bool,
    /// Include from/until/datetime parameters on memento links
    pub include_memento_dates: bool,
    /// Extension graph mapping: name -> graph IRI
    pub extensions: HashMap<String, String>,
    /// Triplestore location: unset = in-memory, http(s) URL = remote
    /// SPARQL endpoint, anything else = local file path
    pub triplestore_location: Option<String>,
    /// Assert the LDP type triple in RDF representations
    pub include_ldp_type: bool,
    /// Require If-Match or If-Unmodified-Since on mutations
    pub precondition_required: bool,
}

impl Default for TrellisConfig {
    fn default() -> Self {
        let mut extensions = HashMap::new();
        extensions.insert("acl".to_string(), trellis::PREFER_ACCESS_CONTROL.to_string());
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: None,
            cache: CacheConfig::default(),
            weak_etags: true,
            versioning: true,
            include_memento_dates: true,
            extensions,
            triplestore_location: None,
            include_ldp_type: true,
            precondition_required: false,
        }
    }
}

impl TrellisConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// The graph IRI registered for an extension name, if any
    pub fn extension_graph(&self, name: &str) -> Option<NamedNode> {
        self.extensions
            .get(name)
            .and_then(|iri| NamedNode::new(iri.clone()).ok())
    }

    /// The extension name registered for a graph IRI, if any
    pub fn extension_name(&self, iri: &str) -> Option<&str> {
        self.extensions
            .iter()
            .find(|(_, v)| v.as_str() == iri)
            .map(|(k, _)| k.as_str())
    }

    /// Extension names in deterministic order
    pub fn extension_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extensions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a `name=IRI[,name=IRI]` extension mapping string.
pub fn parse_extensions(spec: &str) -> HashMap<String, String> {
    spec.split(',')
        .filter_map(|entry| {
            let (name, iri) = entry.split_once('=')?;
            let name = name.trim();
            let iri = iri.trim();
            if name.is_empty() || iri.is_empty() {
                None
            } else {
                Some((name.to_string(), iri.to_string()))
            }
        })
        .collect()
}
