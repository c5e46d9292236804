//! The parsed request value
//!
//! One value object wraps everything a handler needs: the normalized path,
//! recognized query parameters (`ext`, `version`, fragment terms), typed
//! header accessors, the entity body, and the security principal. Header
//! parsing is on demand; nothing is validated until a handler asks.

use super::conditions::{parse_http_date, Conditions};
use super::conneg::{parse_accept, MediaRange};
use super::link::Link;
use super::prefer::Prefer;
use crate::binary::DigestAlgorithm;
use crate::config::TrellisConfig;
use crate::rdf::NamedNode;
use crate::services::Session;
use crate::vocab::{ldp, trellis};
use axum::http::{header, HeaderMap, Method, Uri};
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;

/// A recognized `ext` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    /// The ACL extension graph
    Acl,
    /// The audit trail
    Audit,
    /// The Memento TimeMap
    Timemap,
    /// The RDF description of a NonRDFSource
    Description,
    /// Another configured extension graph
    Named(String),
}

fn decode(value: &str) -> String {
    percent_decode_str(value)
        .decode_utf8()
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key.is_empty() {
                None
            } else {
                Some((decode(key), decode(value.replace('+', " ").as_str())))
            }
        })
        .collect()
}

/// The parsed request.
#[derive(Debug, Clone)]
pub struct LdpRequest {
    /// HTTP method
    pub method: Method,
    path: String,
    trailing_slash: bool,
    query: HashMap<String, String>,
    headers: HeaderMap,
    /// The entity body
    pub body: Bytes,
    base_url: String,
    /// The security principal
    pub session: Session,
}

impl LdpRequest {
    /// Assemble a request value from its HTTP parts.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
        session: Session,
        config: &TrellisConfig,
    ) -> Self {
        let raw_path = uri.path();
        let trailing_slash = raw_path.len() > 1 && raw_path.ends_with('/');
        let path = decode(raw_path.trim_matches('/'));
        let query = uri.query().map(parse_query).unwrap_or_default();
        let base_url = config.base_url.clone().unwrap_or_else(|| {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("localhost");
            format!("http://{}", host)
        });
        Self {
            method,
            path,
            trailing_slash,
            query,
            headers,
            body,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Normalized path: no leading or trailing slash; empty for the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Did the request URI carry a trailing slash?
    pub fn trailing_slash(&self) -> bool {
        self.trailing_slash || self.path.is_empty()
    }

    /// The public base URL in effect for this request
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Public URL of the target, without query parameters
    pub fn external_url(&self) -> String {
        if self.path.is_empty() {
            format!("{}/", self.base_url)
        } else {
            format!("{}/{}", self.base_url, self.path)
        }
    }

    /// Internal identifier of the target
    pub fn identifier(&self) -> NamedNode {
        NamedNode::new_unchecked(format!("{}{}", trellis::DATA_PREFIX, self.path))
    }

    /// The recognized `ext` parameter, if any. Unknown values are absent.
    pub fn ext(&self, config: &TrellisConfig) -> Option<Extension> {
        let value = self.query.get("ext")?.as_str();
        match value {
            "timemap" => Some(Extension::Timemap),
            "description" => Some(Extension::Description),
            "audit" => Some(Extension::Audit),
            name => {
                let iri = config.extension_graph(name)?;
                if iri.as_str() == trellis::PREFER_ACCESS_CONTROL {
                    Some(Extension::Acl)
                } else {
                    Some(Extension::Named(name.to_string()))
                }
            }
        }
    }

    /// The `version` parameter as an instant
    pub fn version(&self) -> Option<DateTime<Utc>> {
        let epoch: i64 = self.query.get("version")?.parse().ok()?;
        Utc.timestamp_opt(epoch, 0).single()
    }

    /// Linked-Data-Fragments filter terms (subject, predicate, object)
    pub fn fragment_terms(&self) -> (Option<&str>, Option<&str>, Option<&str>) {
        (
            self.query.get("subject").map(String::as_str),
            self.query.get("predicate").map(String::as_str),
            self.query.get("object").map(String::as_str),
        )
    }

    fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn header_named(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parsed Accept header ranges, highest preference first
    pub fn accept(&self) -> Vec<MediaRange> {
        self.header(header::ACCEPT).map(parse_accept).unwrap_or_default()
    }

    /// Accept-Datetime as an instant
    pub fn accept_datetime(&self) -> Option<DateTime<Utc>> {
        parse_http_date(self.header_named("accept-datetime")?)
    }

    /// Content-Type of the entity
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE)
    }

    /// Parsed Prefer header
    pub fn prefer(&self) -> Option<Prefer> {
        self.header_named("prefer").map(Prefer::parse)
    }

    /// Slug header, sanitized into a path segment
    pub fn slug(&self) -> Option<String> {
        let raw = decode(self.header_named("slug")?.trim());
        let cleaned: String = raw
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .filter(|c| *c != '/' && *c != '?' && *c != '#')
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// The requested interaction model from `Link rel=type`, if it is an
    /// LDP IRI other than `ldp:Resource`.
    pub fn link_type(&self) -> Option<String> {
        for value in self.headers.get_all(header::LINK) {
            let Ok(value) = value.to_str() else { continue };
            for link in Link::parse_all(value) {
                if link.has_rel("type")
                    && link.uri.starts_with(ldp::NS)
                    && link.uri != ldp::RESOURCE
                {
                    return Some(link.uri);
                }
            }
        }
        None
    }

    /// Single byte range from a `Range: bytes=a-b` header
    pub fn range(&self) -> Option<(u64, Option<u64>)> {
        let value = self.header(header::RANGE)?.trim();
        let spec = value.strip_prefix("bytes=")?;
        let (from, to) = spec.split_once('-')?;
        let from: u64 = from.trim().parse().ok()?;
        let to = to.trim().parse().ok();
        Some((from, to))
    }

    /// Requested digest algorithms from Want-Digest, in header order
    pub fn want_digest(&self) -> Vec<DigestAlgorithm> {
        self.header_named("want-digest")
            .map(|value| {
                value
                    .split(',')
                    .filter_map(|token| DigestAlgorithm::parse(token.trim()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Digest header: algorithm and expected base64 value
    pub fn digest(&self) -> Option<(Option<DigestAlgorithm>, String)> {
        let value = self.header_named("digest")?;
        let (algorithm, digest) = value.split_once('=')?;
        Some((
            DigestAlgorithm::parse(algorithm.trim()),
            digest.trim().to_string(),
        ))
    }

    /// The conditional headers
    pub fn conditions(&self) -> Conditions {
        Conditions {
            if_match: self.header(header::IF_MATCH).map(str::to_string),
            if_unmodified_since: self
                .header(header::IF_UNMODIFIED_SINCE)
                .map(str::to_string),
            if_none_match: self.header(header::IF_NONE_MATCH).map(str::to_string),
            if_modified_since: self.header(header::IF_MODIFIED_SINCE).map(str::to_string),
        }
    }
}
