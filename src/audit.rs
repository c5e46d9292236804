//! Audit quad generation
//!
//! Each mutation appends an immutable PROV activity record to the
//! resource's audit graph. Activity subjects are minted directly as skolem
//! IRIs so the quads can be persisted as-is.

use crate::event::ActivityType;
use crate::rdf::{Dataset, GraphName, Literal, NamedNode, Triple};
use crate::services::{AuditService, Session};
use crate::vocab::{prov, rdf, trellis, xsd};
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// The built-in audit generator.
#[derive(Debug, Default)]
pub struct DefaultAuditService;

impl DefaultAuditService {
    fn activity(
        &self,
        identifier: &NamedNode,
        session: &Session,
        activity: ActivityType,
    ) -> Dataset {
        let subject =
            NamedNode::new_unchecked(format!("{}{}", trellis::BNODE_PREFIX, Uuid::new_v4().simple()));
        let now = Literal::typed(
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            NamedNode::new_unchecked(xsd::DATE_TIME),
        );

        let mut dataset = Dataset::new();
        let graph = GraphName::Audit;
        dataset.insert(
            graph.clone(),
            Triple::new(
                identifier.clone(),
                NamedNode::new_unchecked(prov::WAS_GENERATED_BY),
                subject.clone(),
            ),
        );
        dataset.insert(
            graph.clone(),
            Triple::new(
                subject.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                NamedNode::new_unchecked(prov::ACTIVITY),
            ),
        );
        dataset.insert(
            graph.clone(),
            Triple::new(
                subject.clone(),
                NamedNode::new_unchecked(rdf::TYPE),
                NamedNode::new_unchecked(activity.as_str()),
            ),
        );
        dataset.insert(
            graph.clone(),
            Triple::new(
                subject.clone(),
                NamedNode::new_unchecked(prov::AT_TIME),
                now,
            ),
        );
        dataset.insert(
            graph.clone(),
            Triple::new(
                subject.clone(),
                NamedNode::new_unchecked(prov::WAS_ASSOCIATED_WITH),
                session.agent.clone(),
            ),
        );
        if let Some(delegate) = &session.delegated_by {
            dataset.insert(
                graph,
                Triple::new(
                    subject,
                    NamedNode::new_unchecked(prov::ACTED_ON_BEHALF_OF),
                    delegate.clone(),
                ),
            );
        }
        dataset
    }
}

impl AuditService for DefaultAuditService {
    fn creation(&self, identifier: &NamedNode, session: &Session) -> Dataset {
        self.activity(identifier, session, ActivityType::Create)
    }

    fn update(&self, identifier: &NamedNode, session: &Session) -> Dataset {
        self.activity(identifier, session, ActivityType::Update)
    }

    fn deletion(&self, identifier: &NamedNode, session: &Session) -> Dataset {
        self.activity(identifier, session, ActivityType::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::activitystreams;

    #[test]
    fn test_creation_quads() {
        let service = DefaultAuditService;
        let id = NamedNode::new("trellis:data/r1").unwrap();
        let dataset = service.creation(&id, &Session::default());

        let triples = dataset.graph_triples(&GraphName::Audit);
        // wasGeneratedBy + two types + atTime + wasAssociatedWith
        assert_eq!(triples.len(), 5);
        assert!(triples.iter().any(|t| {
            t.predicate.as_str() == rdf::TYPE
                && t.object.as_named_node().map(|n| n.as_str())
                    == Some(activitystreams::CREATE)
        }));
        // Activity subjects are already skolemized.
        assert!(triples
            .iter()
            .all(|t| t.subject.as_named_node().is_some()));
    }

    #[test]
    fn test_delegated_session_adds_behalf_of() {
        let service = DefaultAuditService;
        let id = NamedNode::new("trellis:data/r1").unwrap();
        let session = Session {
            agent: NamedNode::new("http://example.org/agent").unwrap(),
            delegated_by: Some(NamedNode::new("http://example.org/delegate").unwrap()),
        };
        let dataset = service.update(&id, &session);
        assert!(dataset
            .graph(&GraphName::Audit)
            .any(|t| t.predicate.as_str() == prov::ACTED_ON_BEHALF_OF));
    }
}
