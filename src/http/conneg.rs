//! Content negotiation
//!
//! Client media ranges are walked in preference order. For a NonRDFSource
//! the stored content type competes with the RDF write syntaxes: whichever
//! matches first wins, and a binary match means "serve the bytes" (no
//! syntax). An empty Accept header defaults to the binary when one exists,
//! otherwise Turtle.

use crate::error::HttpError;
use crate::rdf::{io::jsonld_profile, RdfSyntax, WRITE_SYNTAXES};

/// One parsed Accept media range.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRange {
    /// type/subtype without parameters
    pub essence: String,
    /// Quality weight
    pub q: f32,
    /// JSON-LD profile parameter, if present
    pub profile: Option<String>,
}

/// Parse an Accept header into ranges ordered by q (stable on ties).
pub fn parse_accept(header: &str) -> Vec<MediaRange> {
    let mut ranges: Vec<MediaRange> = header
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let mut parts = entry.split(';');
            let essence = parts.next()?.trim().to_ascii_lowercase();
            let mut q = 1.0f32;
            let mut profile = None;
            for param in parts {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                match key.trim().to_ascii_lowercase().as_str() {
                    "q" => q = value.trim().parse().unwrap_or(1.0),
                    "profile" => profile = Some(value.trim().trim_matches('"').to_string()),
                    _ => {}
                }
            }
            Some(MediaRange { essence, q, profile })
        })
        .collect();
    // Stable sort keeps the client's order among equal weights.
    ranges.sort_by(|a, b| b.q.partial_cmp(&a.q).unwrap_or(std::cmp::Ordering::Equal));
    ranges
}

fn range_matches(range: &str, concrete: &str) -> bool {
    if range == "*/*" {
        return true;
    }
    match (range.split_once('/'), concrete.split_once('/')) {
        (Some((rt, rs)), Some((ct, cs))) => rt == ct && (rs == "*" || rs == cs),
        _ => false,
    }
}

/// The negotiated output: an RDF syntax (with optional JSON-LD profile), or
/// `None` meaning "serve the binary content".
pub type Negotiated = Option<(RdfSyntax, Option<String>)>;

/// Select the response representation.
pub fn negotiate(accept: &[MediaRange], binary_type: Option<&str>) -> Result<Negotiated, HttpError> {
    if accept.is_empty() {
        return Ok(match binary_type {
            Some(_) => None,
            None => Some((RdfSyntax::Turtle, None)),
        });
    }
    for range in accept {
        if let Some(binary) = binary_type {
            if range_matches(&range.essence, &binary.to_ascii_lowercase())
                || range.essence == "*/*"
            {
                return Ok(None);
            }
        }
        for syntax in WRITE_SYNTAXES {
            if range_matches(&range.essence, syntax.media_type()) {
                let profile = match syntax {
                    RdfSyntax::JsonLd => Some(
                        range
                            .profile
                            .clone()
                            .unwrap_or_else(|| jsonld_profile::COMPACTED.to_string()),
                    ),
                    _ => None,
                };
                return Ok(Some((*syntax, profile)));
            }
        }
    }
    Err(HttpError::NotAcceptable)
}
