//! LDP constraint checks
//!
//! Constraint services vet a user graph before it is persisted. A violation
//! blocks the write and surfaces as 409 Conflict with a
//! `Link rel=constrainedBy` header naming the rule.

use crate::rdf::{NamedNode, Term, Triple};
use crate::resource::InteractionModel;
use crate::vocab::{ldp, trellis};

/// A single violated rule with the offending triples.
#[derive(Debug, Clone)]
pub struct ConstraintViolation {
    /// IRI of the violated rule
    pub rule: NamedNode,
    /// The triples that triggered the violation
    pub triples: Vec<Triple>,
}

impl ConstraintViolation {
    fn new(rule: &str, triples: Vec<Triple>) -> Self {
        Self {
            rule: NamedNode::new_unchecked(rule),
            triples,
        }
    }
}

/// A pluggable rule set applied to user graphs before persistence.
pub trait ConstraintService: Send + Sync {
    /// Check the triples destined for a resource's user (or ACL) graph.
    fn check(
        &self,
        model: InteractionModel,
        identifier: &NamedNode,
        triples: &[Triple],
    ) -> Vec<ConstraintViolation>;
}

/// The built-in LDP rule set.
///
/// Covers membership-configuration cardinality, membership properties on
/// non-containers, and containment assertions that slipped past stripping.
#[derive(Debug, Default)]
pub struct LdpConstraints;

const MEMBERSHIP_PROPERTIES: &[&str] = &[
    ldp::MEMBERSHIP_RESOURCE,
    ldp::HAS_MEMBER_RELATION,
    ldp::IS_MEMBER_OF_RELATION,
    ldp::INSERTED_CONTENT_RELATION,
];

impl ConstraintService for LdpConstraints {
    fn check(
        &self,
        model: InteractionModel,
        identifier: &NamedNode,
        triples: &[Triple],
    ) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();

        let about_self: Vec<&Triple> = triples
            .iter()
            .filter(|t| t.subject.as_named_node() == Some(identifier))
            .collect();

        for property in MEMBERSHIP_PROPERTIES {
            let matching: Vec<Triple> = about_self
                .iter()
                .filter(|t| t.predicate.as_str() == *property)
                .map(|t| (*t).clone())
                .collect();
            if matching.len() > 1 {
                violations.push(ConstraintViolation::new(
                    trellis::INVALID_CARDINALITY,
                    matching,
                ));
            } else if !matching.is_empty()
                && !model.is_a(InteractionModel::Container)
            {
                violations.push(ConstraintViolation::new(
                    trellis::INVALID_PROPERTY,
                    matching,
                ));
            }
        }

        // hasMemberRelation and isMemberOfRelation are mutually exclusive.
        let forward = about_self
            .iter()
            .any(|t| t.predicate.as_str() == ldp::HAS_MEMBER_RELATION);
        let inverse = about_self
            .iter()
            .any(|t| t.predicate.as_str() == ldp::IS_MEMBER_OF_RELATION);
        if forward && inverse {
            violations.push(ConstraintViolation::new(
                trellis::INVALID_CARDINALITY,
                about_self
                    .iter()
                    .filter(|t| {
                        t.predicate.as_str() == ldp::HAS_MEMBER_RELATION
                            || t.predicate.as_str() == ldp::IS_MEMBER_OF_RELATION
                    })
                    .map(|t| (*t).clone())
                    .collect(),
            ));
        }

        // membershipResource must be an IRI.
        for triple in &about_self {
            if triple.predicate.as_str() == ldp::MEMBERSHIP_RESOURCE
                && matches!(triple.object, Term::Literal(_))
            {
                violations.push(ConstraintViolation::new(
                    trellis::INVALID_PROPERTY,
                    vec![(*triple).clone()],
                ));
            }
        }

        // Containment is server-owned; anything left after stripping is a
        // client error.
        let contains: Vec<Triple> = triples
            .iter()
            .filter(|t| t.predicate.as_str() == ldp::CONTAINS)
            .cloned()
            .collect();
        if !contains.is_empty() {
            violations.push(ConstraintViolation::new(
                trellis::INVALID_CONTAINMENT,
                contains,
            ));
        }

        violations
    }
}
