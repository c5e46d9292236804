//! Blank node skolemization
//!
//! The store never sees blank nodes: before persistence every blank node is
//! rewritten to an IRI under the `trellis:bnode/` prefix, keyed by its
//! label, and the rewrite is undone on output. Keying by label makes the
//! mapping a bijection, so skolemize/unskolemize round-trips.

use super::types::{BlankNode, NamedNode, Subject, Term, Triple};
use crate::vocab::trellis;

/// Rewrite a blank node term to its skolem IRI. Other terms pass through.
pub fn skolemize(term: Term) -> Term {
    match term {
        Term::BlankNode(b) => {
            Term::NamedNode(NamedNode::new_unchecked(format!(
                "{}{}",
                trellis::BNODE_PREFIX,
                b.as_str()
            )))
        }
        other => other,
    }
}

/// Rewrite a skolem IRI back to its blank node. Other terms pass through.
pub fn unskolemize(term: Term) -> Term {
    if let Term::NamedNode(n) = &term {
        if let Some(label) = n.as_str().strip_prefix(trellis::BNODE_PREFIX) {
            if let Ok(b) = BlankNode::from_label(label) {
                return Term::BlankNode(b);
            }
        }
    }
    term
}

fn skolemize_subject(subject: Subject) -> Subject {
    match skolemize(subject.into()) {
        Term::NamedNode(n) => Subject::NamedNode(n),
        Term::BlankNode(b) => Subject::BlankNode(b),
        Term::Literal(_) => unreachable!("skolemize never produces a literal from a subject"),
    }
}

fn unskolemize_subject(subject: Subject) -> Subject {
    match unskolemize(subject.into()) {
        Term::NamedNode(n) => Subject::NamedNode(n),
        Term::BlankNode(b) => Subject::BlankNode(b),
        Term::Literal(_) => unreachable!("unskolemize never produces a literal from a subject"),
    }
}

/// Skolemize the subject and object of every triple.
pub fn skolemize_triples(triples: impl IntoIterator<Item = Triple>) -> Vec<Triple> {
    triples
        .into_iter()
        .map(|t| Triple {
            subject: skolemize_subject(t.subject),
            predicate: t.predicate,
            object: skolemize(t.object),
        })
        .collect()
}

/// Undo skolemization on the subject and object of every triple.
pub fn unskolemize_triples(triples: impl IntoIterator<Item = Triple>) -> Vec<Triple> {
    triples
        .into_iter()
        .map(|t| Triple {
            subject: unskolemize_subject(t.subject),
            predicate: t.predicate,
            object: unskolemize(t.object),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bijection() {
        let b = BlankNode::from_label("b0").unwrap();
        let skolemized = skolemize(Term::BlankNode(b.clone()));
        assert!(skolemized.is_named_node());
        assert_eq!(unskolemize(skolemized), Term::BlankNode(b));
    }

    #[test]
    fn test_iris_pass_through() {
        let iri: Term = NamedNode::new("http://example.org/a").unwrap().into();
        assert_eq!(skolemize(iri.clone()), iri);
        assert_eq!(unskolemize(iri.clone()), iri);
    }

    #[test]
    fn test_triples_roundtrip() {
        let t = Triple::new(
            BlankNode::from_label("auth").unwrap(),
            NamedNode::new("http://www.w3.org/ns/auth/acl#mode").unwrap(),
            NamedNode::new("http://www.w3.org/ns/auth/acl#Read").unwrap(),
        );
        let skolemized = skolemize_triples([t.clone()]);
        assert!(skolemized[0].subject.is_named_node());
        let back = unskolemize_triples(skolemized);
        assert_eq!(back[0], t);
    }
}
