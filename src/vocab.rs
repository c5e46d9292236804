//! RDF vocabularies used by the server
//!
//! Each submodule holds the term IRIs of one vocabulary as string constants,
//! together with a `named()` helper that wraps a constant into a validated
//! [`NamedNode`](crate::rdf::NamedNode). Constants are preferred over parsed
//! nodes so vocabulary terms can be compared without allocation.

use crate::rdf::NamedNode;

/// Wrap a vocabulary constant into a `NamedNode`.
///
/// The constants in this module are known-valid IRIs.
pub fn named(iri: &str) -> NamedNode {
    NamedNode::new_unchecked(iri)
}

/// W3C Linked Data Platform vocabulary
pub mod ldp {
    pub const NS: &str = "http://www.w3.org/ns/ldp#";

    pub const RESOURCE: &str = "http://www.w3.org/ns/ldp#Resource";
    pub const RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#RDFSource";
    pub const NON_RDF_SOURCE: &str = "http://www.w3.org/ns/ldp#NonRDFSource";
    pub const CONTAINER: &str = "http://www.w3.org/ns/ldp#Container";
    pub const BASIC_CONTAINER: &str = "http://www.w3.org/ns/ldp#BasicContainer";
    pub const DIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#DirectContainer";
    pub const INDIRECT_CONTAINER: &str = "http://www.w3.org/ns/ldp#IndirectContainer";

    pub const CONTAINS: &str = "http://www.w3.org/ns/ldp#contains";
    pub const MEMBERSHIP_RESOURCE: &str = "http://www.w3.org/ns/ldp#membershipResource";
    pub const HAS_MEMBER_RELATION: &str = "http://www.w3.org/ns/ldp#hasMemberRelation";
    pub const IS_MEMBER_OF_RELATION: &str = "http://www.w3.org/ns/ldp#isMemberOfRelation";
    pub const INSERTED_CONTENT_RELATION: &str =
        "http://www.w3.org/ns/ldp#insertedContentRelation";
    pub const MEMBER_SUBJECT: &str = "http://www.w3.org/ns/ldp#MemberSubject";

    pub const PREFER_CONTAINMENT: &str = "http://www.w3.org/ns/ldp#PreferContainment";
    pub const PREFER_MEMBERSHIP: &str = "http://www.w3.org/ns/ldp#PreferMembership";
    pub const PREFER_MINIMAL_CONTAINER: &str =
        "http://www.w3.org/ns/ldp#PreferMinimalContainer";

    pub const CONSTRAINED_BY: &str = "http://www.w3.org/ns/ldp#constrainedBy";
}

/// RDF syntax vocabulary
pub mod rdf {
    pub const NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

/// XML Schema datatypes
pub mod xsd {
    pub const NS: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
}

/// Dublin Core terms
pub mod dc {
    pub const NS: &str = "http://purl.org/dc/terms/";
    pub const IS_PART_OF: &str = "http://purl.org/dc/terms/isPartOf";
    pub const HAS_PART: &str = "http://purl.org/dc/terms/hasPart";
    pub const MODIFIED: &str = "http://purl.org/dc/terms/modified";
    pub const FORMAT: &str = "http://purl.org/dc/terms/format";
    pub const EXTENT: &str = "http://purl.org/dc/terms/extent";
    pub const TYPE: &str = "http://purl.org/dc/terms/type";
    pub const RELATION: &str = "http://purl.org/dc/terms/relation";
    pub const TITLE: &str = "http://purl.org/dc/terms/title";
}

/// Server-internal vocabulary: graph names, sentinels, constraint rules
pub mod trellis {
    pub const NS: &str = "http://www.trellisldp.org/ns/trellis#";

    pub const PREFER_USER_MANAGED: &str =
        "http://www.trellisldp.org/ns/trellis#PreferUserManaged";
    pub const PREFER_SERVER_MANAGED: &str =
        "http://www.trellisldp.org/ns/trellis#PreferServerManaged";
    pub const PREFER_AUDIT: &str = "http://www.trellisldp.org/ns/trellis#PreferAudit";
    pub const PREFER_ACCESS_CONTROL: &str =
        "http://www.trellisldp.org/ns/trellis#PreferAccessControl";

    pub const DELETED_RESOURCE: &str =
        "http://www.trellisldp.org/ns/trellis#DeletedResource";
    pub const ADMINISTRATOR_AGENT: &str =
        "http://www.trellisldp.org/ns/trellis#AdministratorAgent";
    pub const ANONYMOUS_AGENT: &str =
        "http://www.trellisldp.org/ns/trellis#AnonymousAgent";

    pub const INVALID_CARDINALITY: &str =
        "http://www.trellisldp.org/ns/trellis#InvalidCardinality";
    pub const INVALID_PROPERTY: &str =
        "http://www.trellisldp.org/ns/trellis#InvalidProperty";
    pub const INVALID_CONTAINMENT: &str =
        "http://www.trellisldp.org/ns/trellis#InvalidContainment";

    /// Scheme prefix of internal resource identifiers
    pub const DATA_PREFIX: &str = "trellis:data/";
    /// Scheme prefix of skolemized blank nodes
    pub const BNODE_PREFIX: &str = "trellis:bnode/";
    /// Scheme prefix of binary content identifiers
    pub const BINARY_PREFIX: &str = "trellis:binary/";
    /// Graph holding the memento instant index
    pub const MEMENTO_INDEX_GRAPH: &str = "trellis:mementos";
}

/// Memento vocabulary (RFC 7089 companion ontology)
pub mod memento {
    pub const NS: &str = "http://mementoweb.org/ns#";
    pub const ORIGINAL_RESOURCE: &str = "http://mementoweb.org/ns#OriginalResource";
    pub const TIME_MAP: &str = "http://mementoweb.org/ns#TimeMap";
    pub const TIME_GATE: &str = "http://mementoweb.org/ns#TimeGate";
    pub const MEMENTO: &str = "http://mementoweb.org/ns#Memento";
    pub const MEMENTO_DATETIME: &str = "http://mementoweb.org/ns#mementoDatetime";
    pub const ORIGINAL: &str = "http://mementoweb.org/ns#original";
    pub const TIMEGATE_REL: &str = "http://mementoweb.org/ns#timegate";
    pub const TIMEMAP_REL: &str = "http://mementoweb.org/ns#timemap";
}

/// W3C time ontology terms used by TimeMap bodies
pub mod time {
    pub const NS: &str = "http://www.w3.org/2006/time#";
    pub const HAS_BEGINNING: &str = "http://www.w3.org/2006/time#hasBeginning";
    pub const HAS_END: &str = "http://www.w3.org/2006/time#hasEnd";
    pub const IN_XSD_DATE_TIME: &str = "http://www.w3.org/2006/time#inXSDDateTime";
}

/// ActivityStreams 2.0 vocabulary
pub mod activitystreams {
    pub const NS: &str = "https://www.w3.org/ns/activitystreams#";
    pub const CREATE: &str = "https://www.w3.org/ns/activitystreams#Create";
    pub const UPDATE: &str = "https://www.w3.org/ns/activitystreams#Update";
    pub const DELETE: &str = "https://www.w3.org/ns/activitystreams#Delete";
}

/// PROV ontology terms used by the audit trail
pub mod prov {
    pub const NS: &str = "http://www.w3.org/ns/prov#";
    pub const ACTIVITY: &str = "http://www.w3.org/ns/prov#Activity";
    pub const AT_TIME: &str = "http://www.w3.org/ns/prov#atTime";
    pub const WAS_ASSOCIATED_WITH: &str = "http://www.w3.org/ns/prov#wasAssociatedWith";
    pub const WAS_GENERATED_BY: &str = "http://www.w3.org/ns/prov#wasGeneratedBy";
    pub const ACTED_ON_BEHALF_OF: &str = "http://www.w3.org/ns/prov#actedOnBehalfOf";
}

/// WebAC vocabulary
pub mod acl {
    pub const NS: &str = "http://www.w3.org/ns/auth/acl#";
    pub const AUTHORIZATION: &str = "http://www.w3.org/ns/auth/acl#Authorization";
    pub const MODE: &str = "http://www.w3.org/ns/auth/acl#mode";
    pub const READ: &str = "http://www.w3.org/ns/auth/acl#Read";
    pub const WRITE: &str = "http://www.w3.org/ns/auth/acl#Write";
    pub const CONTROL: &str = "http://www.w3.org/ns/auth/acl#Control";
    pub const AGENT_CLASS: &str = "http://www.w3.org/ns/auth/acl#agentClass";
    pub const ACCESS_TO: &str = "http://www.w3.org/ns/auth/acl#accessTo";
    pub const DEFAULT: &str = "http://www.w3.org/ns/auth/acl#default";
}

/// FOAF terms referenced by the default ACL
pub mod foaf {
    pub const NS: &str = "http://xmlns.com/foaf/0.1/";
    pub const AGENT: &str = "http://xmlns.com/foaf/0.1/Agent";
    pub const PRIMARY_TOPIC: &str = "http://xmlns.com/foaf/0.1/primaryTopic";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_wraps_constants() {
        let node = named(ldp::BASIC_CONTAINER);
        assert_eq!(node.as_str(), "http://www.w3.org/ns/ldp#BasicContainer");
    }

    #[test]
    fn test_internal_prefixes_are_iris() {
        // The trellis: scheme identifiers must parse as IRIs.
        assert!(crate::rdf::NamedNode::new(trellis::DATA_PREFIX).is_ok());
        assert!(crate::rdf::NamedNode::new(trellis::BNODE_PREFIX).is_ok());
    }
}
