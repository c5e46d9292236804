//! Link header parsing and construction (RFC 8288)

use std::fmt;

/// One web link: a target IRI with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Target IRI
    pub uri: String,
    /// Parameters in order
    pub params: Vec<(String, String)>,
}

impl Link {
    /// Create a link with no parameters
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Shorthand for the rel parameter
    pub fn rel(uri: impl Into<String>, rel: impl Into<String>) -> Self {
        Self::new(uri).with("rel", rel)
    }

    /// First value of a parameter
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Does the rel parameter contain this relation (space-separated)?
    pub fn has_rel(&self, rel: &str) -> bool {
        self.param("rel")
            .is_some_and(|value| value.split_whitespace().any(|r| r == rel))
    }

    /// Parse one Link header value, which may carry several links.
    pub fn parse_all(header: &str) -> Vec<Link> {
        let mut links = Vec::new();
        // Split on commas outside angle brackets and quotes.
        let mut depth_angle = false;
        let mut in_quotes = false;
        let mut current = String::new();
        let mut parts = Vec::new();
        for c in header.chars() {
            match c {
                '<' if !in_quotes => depth_angle = true,
                '>' if !in_quotes => depth_angle = false,
                '"' => in_quotes = !in_quotes,
                ',' if !depth_angle && !in_quotes => {
                    parts.push(std::mem::take(&mut current));
                    continue;
                }
                _ => {}
            }
            current.push(c);
        }
        if !current.trim().is_empty() {
            parts.push(current);
        }

        for part in parts {
            let part = part.trim();
            let Some(end) = part.find('>') else { continue };
            let Some(start) = part.find('<') else { continue };
            if start > end {
                continue;
            }
            let mut link = Link::new(&part[start + 1..end]);
            for param in part[end + 1..].split(';') {
                let param = param.trim();
                if let Some((key, value)) = param.split_once('=') {
                    link.params.push((
                        key.trim().to_string(),
                        value.trim().trim_matches('"').to_string(),
                    ));
                }
            }
            links.push(link);
        }
        links
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.uri)?;
        for (key, value) in &self.params {
            write!(f, "; {}=\"{}\"", key, value)?;
        }
        Ok(())
    }
}
