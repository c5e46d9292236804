//! Entity tag generation and comparison
//!
//! The opaque tag is a hex MD5 over the modification instant, the Prefer
//! include/omit sets, and the identifier, so distinct preferences yield
//! distinct tags for the same state. Binary tags hash the identifier with a
//! marker suffix and ignore Prefer. RDF tags are weak by default; binary
//! tags are strong.

use super::prefer::Prefer;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A validator for conditional requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    /// The opaque tag (hex MD5)
    pub tag: String,
    /// Weak validator?
    pub weak: bool,
}

fn set_hash(values: &[String]) -> u64 {
    let mut sorted: Vec<&String> = values.iter().collect();
    sorted.sort();
    let mut hasher = DefaultHasher::new();
    sorted.hash(&mut hasher);
    hasher.finish()
}

fn hex_md5(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

impl EntityTag {
    /// Tag for an RDF representation.
    pub fn rdf(
        identifier: &str,
        modified: DateTime<Utc>,
        prefer: Option<&Prefer>,
        weak: bool,
    ) -> Self {
        let empty: &[String] = &[];
        let include = prefer.map_or(empty, |p| p.include.as_slice());
        let omit = prefer.map_or(empty, |p| p.omit.as_slice());
        let input = format!(
            "{}.{}.{}.{}.{}",
            modified.timestamp_millis(),
            modified.timestamp_subsec_nanos(),
            set_hash(include),
            set_hash(omit),
            identifier
        );
        Self {
            tag: hex_md5(&input),
            weak,
        }
    }

    /// Tag for a binary representation.
    pub fn binary(identifier: &str, modified: DateTime<Utc>) -> Self {
        let input = format!(
            "{}.{}.{}BINARY",
            modified.timestamp_millis(),
            modified.timestamp_subsec_nanos(),
            identifier
        );
        Self {
            tag: hex_md5(&input),
            weak: false,
        }
    }

    /// Does a header candidate match this tag?
    ///
    /// Weak comparison ignores the weakness flag on both sides; strong
    /// comparison requires both validators to be strong.
    pub fn matches(&self, candidate: &str, strong_comparison: bool) -> bool {
        let candidate = candidate.trim();
        let (candidate_weak, opaque) = match candidate.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, candidate),
        };
        if strong_comparison && (self.weak || candidate_weak) {
            return false;
        }
        opaque.trim_matches('"') == self.tag
    }

    /// Does any member of a header list (or `*`) match?
    pub fn matches_list(&self, header: &str, strong_comparison: bool) -> bool {
        if header.trim() == "*" {
            return !strong_comparison || !self.weak;
        }
        header
            .split(',')
            .any(|candidate| self.matches(candidate, strong_comparison))
    }
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.tag)
        } else {
            write!(f, "\"{}\"", self.tag)
        }
    }
}
