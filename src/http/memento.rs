//! Memento link and TimeMap construction (RFC 7089)
//!
//! Builds the navigation links for versioned resources: `original
//! timegate` on the resource itself, a `timemap` link spanning the memento
//! range, and one `memento` link per instant with first/last/prev/next
//! annotations relative to the memento being served.

use super::link::Link;
use crate::rdf::{Literal, NamedNode, Triple};
use crate::vocab::{memento, rdf, time, xsd};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Format an instant as an RFC 1123 HTTP date.
pub fn http_date(instant: DateTime<Utc>) -> String {
    instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn version_url(external: &str, instant: DateTime<Utc>) -> String {
    format!("{}?version={}", external, instant.timestamp())
}

fn timemap_url(external: &str) -> String {
    format!("{}?ext=timemap", external)
}

/// Memento navigation links for a resource.
///
/// `current` marks the memento being served, adding prev/next annotations.
/// With `include_dates` unset, the from/until/datetime parameters are
/// omitted for downstream parsers that reject them.
pub fn memento_links(
    external: &str,
    mementos: &BTreeSet<DateTime<Utc>>,
    current: Option<DateTime<Utc>>,
    include_dates: bool,
) -> Vec<Link> {
    let mut links = vec![Link::rel(external, "original timegate")];

    if !mementos.is_empty() {
        let first = *mementos.iter().next().unwrap();
        let last = *mementos.iter().next_back().unwrap();

        let mut timemap = Link::rel(timemap_url(external), "timemap");
        if include_dates {
            timemap = timemap
                .with("from", http_date(first))
                .with("until", http_date(last));
        }
        links.push(timemap);

        let instants: Vec<DateTime<Utc>> = mementos.iter().copied().collect();
        for (index, instant) in instants.iter().enumerate() {
            let mut rel = vec!["memento"];
            if *instant == first {
                rel.push("first");
            }
            if *instant == last {
                rel.push("last");
            }
            if let Some(current) = current {
                if index + 1 < instants.len() && instants[index + 1] == current {
                    rel.push("prev");
                }
                if index > 0 && instants[index - 1] == current {
                    rel.push("next");
                }
            }
            let mut link = Link::rel(version_url(external, *instant), rel.join(" "));
            if include_dates {
                link = link.with("datetime", http_date(*instant));
            }
            links.push(link);
        }
    }
    links
}

/// The TimeMap as RDF, using the Memento vocabulary.
pub fn timemap_triples(
    external: &str,
    mementos: &BTreeSet<DateTime<Utc>>,
) -> Vec<Triple> {
    let original = NamedNode::new_unchecked(external);
    let timemap = NamedNode::new_unchecked(timemap_url(external));
    let a = NamedNode::new_unchecked(rdf::TYPE);

    let mut triples = vec![
        Triple::new(
            original.clone(),
            a.clone(),
            NamedNode::new_unchecked(memento::ORIGINAL_RESOURCE),
        ),
        Triple::new(
            original.clone(),
            a.clone(),
            NamedNode::new_unchecked(memento::TIME_GATE),
        ),
        Triple::new(
            original.clone(),
            NamedNode::new_unchecked(memento::TIMEGATE_REL),
            original.clone(),
        ),
        Triple::new(
            original.clone(),
            NamedNode::new_unchecked(memento::TIMEMAP_REL),
            timemap.clone(),
        ),
        Triple::new(
            timemap.clone(),
            a.clone(),
            NamedNode::new_unchecked(memento::TIME_MAP),
        ),
    ];

    let datetime = |instant: DateTime<Utc>| {
        Literal::typed(
            instant.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            NamedNode::new_unchecked(xsd::DATE_TIME),
        )
    };

    if let (Some(first), Some(last)) = (mementos.iter().next(), mementos.iter().next_back()) {
        triples.push(Triple::new(
            timemap.clone(),
            NamedNode::new_unchecked(time::HAS_BEGINNING),
            datetime(*first),
        ));
        triples.push(Triple::new(
            timemap,
            NamedNode::new_unchecked(time::HAS_END),
            datetime(*last),
        ));
    }

    for instant in mementos {
        let version = NamedNode::new_unchecked(version_url(external, *instant));
        triples.push(Triple::new(
            version.clone(),
            a.clone(),
            NamedNode::new_unchecked(memento::MEMENTO),
        ));
        triples.push(Triple::new(
            version.clone(),
            NamedNode::new_unchecked(memento::ORIGINAL),
            original.clone(),
        ));
        triples.push(Triple::new(
            version,
            NamedNode::new_unchecked(memento::MEMENTO_DATETIME),
            datetime(*instant),
        ));
    }
    triples
}

/// The TimeMap in application/link-format.
pub fn timemap_link_format(
    external: &str,
    mementos: &BTreeSet<DateTime<Utc>>,
    include_dates: bool,
) -> String {
    memento_links(external, mementos, None, include_dates)
        .iter()
        .map(Link::to_string)
        .collect::<Vec<_>>()
        .join(",\n")
}
