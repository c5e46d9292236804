//! RDF syntax registry and serialization
//!
//! Parsing and writing go through rio; JSON-LD output is produced directly
//! with serde_json in expanded form. The registry drives content
//! negotiation: `READ_SYNTAXES` are accepted on input (POST/PUT bodies),
//! `WRITE_SYNTAXES` are offered on output.

use super::types::{Literal, NamedNode, Subject, Term, Triple};
use crate::vocab::xsd;
use oxiri::Iri;
use rio_api::formatter::TriplesFormatter;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser, TurtleFormatter, TurtleParser};
use rio_xml::{RdfXmlFormatter, RdfXmlParser};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::Cursor;
use thiserror::Error;

/// I/O errors
#[derive(Error, Debug)]
pub enum IoError {
    /// Parse error
    #[error("RDF parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("RDF serialization error: {0}")]
    Serialize(String),

    /// Unsupported syntax for the requested direction
    #[error("Unsupported RDF syntax: {0}")]
    Unsupported(String),
}

pub type IoResult<T> = Result<T, IoError>;

/// The concrete RDF syntaxes the server speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RdfSyntax {
    /// text/turtle
    Turtle,
    /// application/n-triples
    NTriples,
    /// application/ld+json
    JsonLd,
    /// application/rdf+xml
    RdfXml,
}

/// Syntaxes accepted on input.
pub const READ_SYNTAXES: &[RdfSyntax] =
    &[RdfSyntax::Turtle, RdfSyntax::NTriples, RdfSyntax::RdfXml];

/// Syntaxes offered on output.
pub const WRITE_SYNTAXES: &[RdfSyntax] = &[
    RdfSyntax::Turtle,
    RdfSyntax::JsonLd,
    RdfSyntax::NTriples,
    RdfSyntax::RdfXml,
];

impl RdfSyntax {
    /// The canonical media type
    pub fn media_type(self) -> &'static str {
        match self {
            RdfSyntax::Turtle => "text/turtle",
            RdfSyntax::NTriples => "application/n-triples",
            RdfSyntax::JsonLd => "application/ld+json",
            RdfSyntax::RdfXml => "application/rdf+xml",
        }
    }

    /// Resolve a media type (without parameters) to a syntax
    pub fn from_media_type(value: &str) -> Option<RdfSyntax> {
        let essence = value.split(';').next().unwrap_or("").trim();
        match essence {
            "text/turtle" => Some(RdfSyntax::Turtle),
            "application/n-triples" => Some(RdfSyntax::NTriples),
            "application/ld+json" | "application/json" => Some(RdfSyntax::JsonLd),
            "application/rdf+xml" => Some(RdfSyntax::RdfXml),
            _ => None,
        }
    }

    /// Is this syntax supported for reading?
    pub fn readable(self) -> bool {
        READ_SYNTAXES.contains(&self)
    }
}

/// The JSON-LD profiles the server recognizes on the Accept header.
pub mod jsonld_profile {
    pub const COMPACTED: &str = "http://www.w3.org/ns/json-ld#compacted";
    pub const EXPANDED: &str = "http://www.w3.org/ns/json-ld#expanded";
    pub const FLATTENED: &str = "http://www.w3.org/ns/json-ld#flattened";
}

fn base_iri(base: Option<&str>) -> Option<Iri<String>> {
    base.and_then(|b| Iri::parse(b.to_string()).ok())
}

fn convert_subject(s: rio_api::model::Subject<'_>) -> IoResult<Subject> {
    match s {
        rio_api::model::Subject::NamedNode(n) => {
            Ok(Subject::NamedNode(NamedNode::new_unchecked(n.iri)))
        }
        rio_api::model::Subject::BlankNode(b) => {
            Ok(Subject::BlankNode(super::BlankNode::new_unchecked(b.id)))
        }
        _ => Err(IoError::Parse("unsupported subject term".to_string())),
    }
}

fn convert_object(o: rio_api::model::Term<'_>) -> IoResult<Term> {
    match o {
        rio_api::model::Term::NamedNode(n) => {
            Ok(Term::NamedNode(NamedNode::new_unchecked(n.iri)))
        }
        rio_api::model::Term::BlankNode(b) => {
            Ok(Term::BlankNode(super::BlankNode::new_unchecked(b.id)))
        }
        rio_api::model::Term::Literal(l) => Ok(Term::Literal(match l {
            rio_api::model::Literal::Simple { value } => Literal::simple(value),
            rio_api::model::Literal::LanguageTaggedString { value, language } => {
                Literal::language_tagged(value, language)
                    .map_err(|e| IoError::Parse(e.to_string()))?
            }
            rio_api::model::Literal::Typed { value, datatype } => {
                Literal::typed(value, NamedNode::new_unchecked(datatype.iri))
            }
        })),
        _ => Err(IoError::Parse("unsupported object term".to_string())),
    }
}

fn collect<P, E>(mut parser: P) -> IoResult<Vec<Triple>>
where
    P: TriplesParser<Error = E>,
    E: std::fmt::Display + From<std::io::Error>,
{
    let mut triples = Vec::new();
    let mut conversion: Option<IoError> = None;
    parser
        .parse_all(&mut |t| {
            match convert_subject(t.subject).and_then(|subject| {
                let object = convert_object(t.object)?;
                Ok(Triple {
                    subject,
                    predicate: NamedNode::new_unchecked(t.predicate.iri),
                    object,
                })
            }) {
                Ok(triple) => triples.push(triple),
                Err(e) => {
                    if conversion.is_none() {
                        conversion = Some(e);
                    }
                }
            }
            Ok::<(), E>(())
        })
        .map_err(|e: E| IoError::Parse(e.to_string()))?;
    if let Some(e) = conversion {
        return Err(e);
    }
    Ok(triples)
}

/// Parse an RDF payload into triples, resolving relative IRIs against `base`.
pub fn read(syntax: RdfSyntax, data: &[u8], base: Option<&str>) -> IoResult<Vec<Triple>> {
    match syntax {
        RdfSyntax::Turtle => collect(TurtleParser::new(Cursor::new(data), base_iri(base))),
        RdfSyntax::NTriples => collect(NTriplesParser::new(Cursor::new(data))),
        RdfSyntax::RdfXml => collect(RdfXmlParser::new(Cursor::new(data), base_iri(base))),
        RdfSyntax::JsonLd => Err(IoError::Unsupported(
            "JSON-LD input is not supported".to_string(),
        )),
    }
}

fn format_all<F: TriplesFormatter>(
    formatter: &mut F,
    triples: &[Triple],
) -> Result<(), F::Error> {
    for triple in triples {
        let subject = match &triple.subject {
            Subject::NamedNode(n) => {
                rio_api::model::Subject::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
            }
            Subject::BlankNode(b) => {
                rio_api::model::Subject::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
            }
        };
        let predicate = rio_api::model::NamedNode {
            iri: triple.predicate.as_str(),
        };
        let datatype;
        let object = match &triple.object {
            Term::NamedNode(n) => {
                rio_api::model::Term::NamedNode(rio_api::model::NamedNode { iri: n.as_str() })
            }
            Term::BlankNode(b) => {
                rio_api::model::Term::BlankNode(rio_api::model::BlankNode { id: b.as_str() })
            }
            Term::Literal(l) => rio_api::model::Term::Literal(if let Some(lang) = l.language() {
                rio_api::model::Literal::LanguageTaggedString {
                    value: l.value(),
                    language: lang,
                }
            } else {
                datatype = l.datatype();
                if datatype.as_str() == xsd::STRING {
                    rio_api::model::Literal::Simple { value: l.value() }
                } else {
                    rio_api::model::Literal::Typed {
                        value: l.value(),
                        datatype: rio_api::model::NamedNode {
                            iri: datatype.as_str(),
                        },
                    }
                }
            }),
        };
        formatter.format(&rio_api::model::Triple {
            subject,
            predicate,
            object,
        })?;
    }
    Ok(())
}

fn jsonld_object(term: &Term) -> Value {
    match term {
        Term::NamedNode(n) => json!({ "@id": n.as_str() }),
        Term::BlankNode(b) => json!({ "@id": format!("_:{}", b.as_str()) }),
        Term::Literal(l) => {
            if let Some(lang) = l.language() {
                json!({ "@value": l.value(), "@language": lang })
            } else if l.datatype().as_str() == xsd::STRING {
                json!({ "@value": l.value() })
            } else {
                json!({ "@value": l.value(), "@type": l.datatype().as_str() })
            }
        }
    }
}

fn write_jsonld(triples: &[Triple]) -> IoResult<String> {
    // Expanded form: one node object per subject, predicates as arrays.
    let mut subjects: Vec<String> = Vec::new();
    let mut map: HashMap<String, Vec<(String, Value)>> = HashMap::new();
    for triple in triples {
        let key = match &triple.subject {
            Subject::NamedNode(n) => n.as_str().to_string(),
            Subject::BlankNode(b) => format!("_:{}", b.as_str()),
        };
        if !map.contains_key(&key) {
            subjects.push(key.clone());
        }
        map.entry(key)
            .or_default()
            .push((triple.predicate.as_str().to_string(), jsonld_object(&triple.object)));
    }

    let mut output = Vec::new();
    for subject in subjects {
        let mut node = serde_json::Map::new();
        node.insert("@id".to_string(), Value::String(subject.clone()));
        let mut by_predicate: Vec<(String, Vec<Value>)> = Vec::new();
        for (predicate, object) in map.remove(&subject).unwrap_or_default() {
            match by_predicate.iter_mut().find(|(p, _)| *p == predicate) {
                Some((_, objects)) => objects.push(object),
                None => by_predicate.push((predicate, vec![object])),
            }
        }
        for (predicate, objects) in by_predicate {
            node.insert(predicate, Value::Array(objects));
        }
        output.push(Value::Object(node));
    }
    serde_json::to_string_pretty(&output).map_err(|e| IoError::Serialize(e.to_string()))
}

/// Serialize triples in the requested syntax.
///
/// The JSON-LD `profile` is accepted for signature compatibility with the
/// negotiation layer; output is always the expanded form.
pub fn write(syntax: RdfSyntax, triples: &[Triple], _profile: Option<&str>) -> IoResult<String> {
    match syntax {
        RdfSyntax::Turtle => {
            let mut formatter = TurtleFormatter::new(Vec::new());
            format_all(&mut formatter, triples)
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            let output = formatter
                .finish()
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            String::from_utf8(output).map_err(|e| IoError::Serialize(e.to_string()))
        }
        RdfSyntax::NTriples => {
            let mut formatter = NTriplesFormatter::new(Vec::new());
            format_all(&mut formatter, triples)
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            let output = formatter
                .finish()
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            String::from_utf8(output).map_err(|e| IoError::Serialize(e.to_string()))
        }
        RdfSyntax::RdfXml => {
            let mut formatter = RdfXmlFormatter::new(Vec::new())
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            format_all(&mut formatter, triples)
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            let output = formatter
                .finish()
                .map_err(|e| IoError::Serialize(e.to_string()))?;
            String::from_utf8(output).map_err(|e| IoError::Serialize(e.to_string()))
        }
        RdfSyntax::JsonLd => write_jsonld(triples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turtle_roundtrip() {
        let input = r#"<http://example.org/a> <http://example.org/b> "c" ."#;
        let triples = read(RdfSyntax::Turtle, input.as_bytes(), None).unwrap();
        assert_eq!(triples.len(), 1);
        let output = write(RdfSyntax::Turtle, &triples, None).unwrap();
        assert!(output.contains("http://example.org/a"));
    }

    #[test]
    fn test_turtle_base_resolution() {
        let input = r#"<> <http://purl.org/dc/terms/title> "T" ."#;
        let triples =
            read(RdfSyntax::Turtle, input.as_bytes(), Some("http://example.org/r1")).unwrap();
        assert_eq!(
            triples[0].subject.as_named_node().unwrap().as_str(),
            "http://example.org/r1"
        );
    }

    #[test]
    fn test_media_type_resolution() {
        assert_eq!(
            RdfSyntax::from_media_type("text/turtle; charset=utf-8"),
            Some(RdfSyntax::Turtle)
        );
        assert_eq!(
            RdfSyntax::from_media_type("application/ld+json"),
            Some(RdfSyntax::JsonLd)
        );
        assert_eq!(RdfSyntax::from_media_type("text/plain"), None);
    }

    #[test]
    fn test_jsonld_output_groups_subjects() {
        let triples = vec![
            Triple::new(
                NamedNode::new("http://example.org/a").unwrap(),
                NamedNode::new("http://purl.org/dc/terms/title").unwrap(),
                Literal::simple("One"),
            ),
            Triple::new(
                NamedNode::new("http://example.org/a").unwrap(),
                NamedNode::new("http://purl.org/dc/terms/title").unwrap(),
                Literal::simple("Two"),
            ),
        ];
        let output = write(RdfSyntax::JsonLd, &triples, None).unwrap();
        let parsed: Vec<Value> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(
            parsed[0]["http://purl.org/dc/terms/title"]
                .as_array()
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_jsonld_input_unsupported() {
        assert!(read(RdfSyntax::JsonLd, b"{}", None).is_err());
    }
}
