//! Conditional request evaluation
//!
//! Applied on every request once the target's ETag and modification time
//! are known. Evaluation order follows RFC 7232: If-Match, then
//! If-Unmodified-Since, then If-None-Match, then If-Modified-Since. Tag
//! comparison is weak throughout so conditional updates work against weak
//! RDF validators. Modification times compare at second granularity.

use super::etag::EntityTag;
use crate::error::HttpError;
use chrono::{DateTime, Utc};

/// The conditional headers of one request.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    /// If-Match
    pub if_match: Option<String>,
    /// If-Unmodified-Since
    pub if_unmodified_since: Option<String>,
    /// If-None-Match
    pub if_none_match: Option<String>,
    /// If-Modified-Since
    pub if_modified_since: Option<String>,
}

/// Parse an HTTP date (RFC 1123 / obsolete RFC 850 forms chrono accepts).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate_seconds(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

/// Evaluate the conditional headers.
///
/// `etag` and `modified` are `None` when the target does not exist yet
/// (PUT-to-create). `is_read` selects 304 over 412 for If-None-Match and
/// enables If-Modified-Since. `strict` requires mutations to carry
/// If-Match or If-Unmodified-Since.
pub fn evaluate(
    conditions: &Conditions,
    etag: Option<&EntityTag>,
    modified: Option<DateTime<Utc>>,
    is_read: bool,
    strict: bool,
) -> Result<(), HttpError> {
    if let Some(if_match) = &conditions.if_match {
        match etag {
            None => return Err(HttpError::PreconditionFailed),
            Some(etag) => {
                if !etag.matches_list(if_match, false) {
                    return Err(HttpError::PreconditionFailed);
                }
            }
        }
    }

    if let Some(header) = &conditions.if_unmodified_since {
        if let (Some(date), Some(modified)) = (parse_http_date(header), modified) {
            if truncate_seconds(modified) > date.timestamp() {
                return Err(HttpError::PreconditionFailed);
            }
        }
    }

    if let Some(if_none_match) = &conditions.if_none_match {
        let matched = match etag {
            None => false,
            Some(etag) => etag.matches_list(if_none_match, false)
                || (if_none_match.trim() == "*"),
        };
        if matched {
            return if is_read {
                Err(HttpError::NotModified(etag.map(EntityTag::to_string)))
            } else {
                Err(HttpError::PreconditionFailed)
            };
        }
    }

    if is_read {
        if let Some(header) = &conditions.if_modified_since {
            // Only applies when If-None-Match is absent.
            if conditions.if_none_match.is_none() {
                if let (Some(date), Some(modified)) = (parse_http_date(header), modified) {
                    if truncate_seconds(modified) <= date.timestamp() {
                        return Err(HttpError::NotModified(
                            etag.map(EntityTag::to_string),
                        ));
                    }
                }
            }
        }
    }

    if strict
        && !is_read
        && conditions.if_match.is_none()
        && conditions.if_unmodified_since.is_none()
    {
        return Err(HttpError::PreconditionRequired);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
    }

    fn etag() -> EntityTag {
        EntityTag::rdf("trellis:data/r", modified(), None, true)
    }

    #[test]
    fn test_if_match_success_and_failure() {
        let tag = etag();
        let ok = Conditions {
            if_match: Some(tag.to_string()),
            ..Conditions::default()
        };
        assert!(evaluate(&ok, Some(&tag), Some(modified()), false, false).is_ok());

        let stale = Conditions {
            if_match: Some("W/\"stale\"".to_string()),
            ..Conditions::default()
        };
        assert!(matches!(
            evaluate(&stale, Some(&tag), Some(modified()), false, false),
            Err(HttpError::PreconditionFailed)
        ));
    }

    #[test]
    fn test_if_match_star_requires_existence() {
        let star = Conditions {
            if_match: Some("*".to_string()),
            ..Conditions::default()
        };
        assert!(evaluate(&star, Some(&etag()), Some(modified()), false, false).is_ok());
        assert!(matches!(
            evaluate(&star, None, None, false, false),
            Err(HttpError::PreconditionFailed)
        ));
    }

    #[test]
    fn test_if_none_match_read_yields_304() {
        let tag = etag();
        let conditions = Conditions {
            if_none_match: Some(tag.to_string()),
            ..Conditions::default()
        };
        assert!(matches!(
            evaluate(&conditions, Some(&tag), Some(modified()), true, false),
            Err(HttpError::NotModified(_))
        ));
        assert!(matches!(
            evaluate(&conditions, Some(&tag), Some(modified()), false, false),
            Err(HttpError::PreconditionFailed)
        ));
    }

    #[test]
    fn test_if_modified_since() {
        let conditions = Conditions {
            if_modified_since: Some("Thu, 01 Jan 2026 12:00:00 GMT".to_string()),
            ..Conditions::default()
        };
        // Not modified since the given date.
        assert!(matches!(
            evaluate(&conditions, Some(&etag()), Some(modified()), true, false),
            Err(HttpError::NotModified(_))
        ));
        // Modified after the given date.
        let later = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        assert!(evaluate(&conditions, Some(&etag()), Some(later), true, false).is_ok());
    }

    #[test]
    fn test_if_unmodified_since() {
        let conditions = Conditions {
            if_unmodified_since: Some("Thu, 01 Jan 2026 00:00:00 GMT".to_string()),
            ..Conditions::default()
        };
        assert!(matches!(
            evaluate(&conditions, Some(&etag()), Some(modified()), false, false),
            Err(HttpError::PreconditionFailed)
        ));
        let earlier = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        assert!(evaluate(&conditions, Some(&etag()), Some(earlier), false, false).is_ok());
    }

    #[test]
    fn test_strict_mode() {
        let empty = Conditions::default();
        assert!(matches!(
            evaluate(&empty, Some(&etag()), Some(modified()), false, true),
            Err(HttpError::PreconditionRequired)
        ));
        // Reads are exempt.
        assert!(evaluate(&empty, Some(&etag()), Some(modified()), true, true).is_ok());
    }
}
