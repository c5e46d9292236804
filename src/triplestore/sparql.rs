//! SPARQL evaluation for the in-memory backend
//!
//! The memory connection executes the same SPARQL strings a remote endpoint
//! would receive, so the persistence templates are interpreted here rather
//! than special-cased. The evaluator covers the grammar those templates and
//! PATCH bodies use: basic graph patterns under GRAPH clauses (constant or
//! variable graph names), joins, unions, OPTIONAL, DISTINCT, projection,
//! INSERT DATA, DELETE DATA, DELETE/INSERT WHERE, and CLEAR/DROP.

use oxrdf::{NamedNode, Subject, Term, Triple};
use spargebra::algebra::{GraphPattern, GraphTarget};
use spargebra::GraphUpdateOperation;
use spargebra::term::{
    GraphName, GraphNamePattern, GroundQuad, GroundQuadPattern, GroundSubject, GroundTerm,
    GroundTermPattern, NamedNodePattern, Quad, QuadPattern, TermPattern, TriplePattern,
};
use spargebra::{Query, Update};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// SPARQL evaluation errors
#[derive(Error, Debug)]
pub enum SparqlError {
    /// The query or update could not be parsed
    #[error("SPARQL parse error: {0}")]
    Parse(String),

    /// The query uses a feature outside the supported grammar
    #[error("unsupported SPARQL feature: {0}")]
    Unsupported(String),
}

pub type SparqlResult<T> = Result<T, SparqlError>;

/// One solution row: variable name to bound term.
pub type Bindings = HashMap<String, Term>;

/// Quads partitioned into a default graph and named graphs.
#[derive(Debug, Clone, Default)]
pub struct QuadStore {
    default_graph: HashSet<Triple>,
    named: HashMap<NamedNode, HashSet<Triple>>,
}

impl QuadStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple into the default graph or a named graph
    pub fn insert(&mut self, graph: Option<&NamedNode>, triple: Triple) {
        match graph {
            None => {
                self.default_graph.insert(triple);
            }
            Some(name) => {
                self.named.entry(name.clone()).or_default().insert(triple);
            }
        }
    }

    /// Remove a triple, pruning the graph entry when it empties
    pub fn remove(&mut self, graph: Option<&NamedNode>, triple: &Triple) {
        match graph {
            None => {
                self.default_graph.remove(triple);
            }
            Some(name) => {
                if let Some(triples) = self.named.get_mut(name) {
                    triples.remove(triple);
                    if triples.is_empty() {
                        self.named.remove(name);
                    }
                }
            }
        }
    }

    /// Iterate the triples of one graph
    pub fn triples(&self, graph: Option<&NamedNode>) -> impl Iterator<Item = &Triple> {
        match graph {
            None => Some(&self.default_graph).into_iter().flatten(),
            Some(name) => self.named.get(name).into_iter().flatten(),
        }
    }

    /// The names of all non-empty named graphs
    pub fn graph_names(&self) -> impl Iterator<Item = &NamedNode> {
        self.named.keys()
    }

    /// Drop one named graph
    pub fn clear_graph(&mut self, name: &NamedNode) {
        self.named.remove(name);
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.default_graph.clear();
        self.named.clear();
    }

    /// Iterate every (graph, triple) pair
    pub fn quads(&self) -> impl Iterator<Item = (Option<&NamedNode>, &Triple)> {
        self.default_graph
            .iter()
            .map(|t| (None, t))
            .chain(
                self.named
                    .iter()
                    .flat_map(|(g, ts)| ts.iter().map(move |t| (Some(g), t))),
            )
    }

    /// Total number of quads
    pub fn len(&self) -> usize {
        self.default_graph.len() + self.named.values().map(HashSet::len).sum::<usize>()
    }

    /// Is the store empty?
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy)]
enum Active<'a> {
    Default,
    Named(&'a NamedNode),
}

fn subject_term(subject: &Subject) -> Term {
    match subject {
        Subject::NamedNode(n) => Term::NamedNode(n.clone()),
        Subject::BlankNode(b) => Term::BlankNode(b.clone()),
        #[allow(unreachable_patterns)]
        _ => unreachable!("RDF-star subjects are not stored"),
    }
}

fn term_as_subject(term: &Term) -> Option<Subject> {
    match term {
        Term::NamedNode(n) => Some(Subject::NamedNode(n.clone())),
        Term::BlankNode(b) => Some(Subject::BlankNode(b.clone())),
        _ => None,
    }
}

/// Resolve a term pattern against the current bindings: either a concrete
/// term to compare, or the variable name to capture. Blank nodes in
/// patterns behave as variables scoped by their label.
enum Resolved {
    Const(Term),
    Capture(String),
}

fn resolve(pattern: &TermPattern, bindings: &Bindings) -> SparqlResult<Resolved> {
    Ok(match pattern {
        TermPattern::NamedNode(n) => Resolved::Const(Term::NamedNode(n.clone())),
        TermPattern::Literal(l) => Resolved::Const(Term::Literal(l.clone())),
        TermPattern::BlankNode(b) => {
            let key = format!("_:{}", b.as_str());
            match bindings.get(&key) {
                Some(term) => Resolved::Const(term.clone()),
                None => Resolved::Capture(key),
            }
        }
        TermPattern::Variable(v) => match bindings.get(v.as_str()) {
            Some(term) => Resolved::Const(term.clone()),
            None => Resolved::Capture(v.as_str().to_string()),
        },
        #[allow(unreachable_patterns)]
        _ => return Err(SparqlError::Unsupported("RDF-star pattern".to_string())),
    })
}

fn resolve_predicate(
    pattern: &NamedNodePattern,
    bindings: &Bindings,
) -> Resolved {
    match pattern {
        NamedNodePattern::NamedNode(n) => Resolved::Const(Term::NamedNode(n.clone())),
        NamedNodePattern::Variable(v) => match bindings.get(v.as_str()) {
            Some(term) => Resolved::Const(term.clone()),
            None => Resolved::Capture(v.as_str().to_string()),
        },
    }
}

fn unify(resolved: &Resolved, actual: &Term, bindings: &mut Bindings) -> bool {
    match resolved {
        Resolved::Const(expected) => expected == actual,
        Resolved::Capture(name) => {
            // The same variable may recur within one triple pattern.
            if let Some(existing) = bindings.get(name) {
                existing == actual
            } else {
                bindings.insert(name.clone(), actual.clone());
                true
            }
        }
    }
}

fn match_triple_pattern(
    store: &QuadStore,
    active: Active<'_>,
    pattern: &TriplePattern,
    bindings: &Bindings,
) -> SparqlResult<Vec<Bindings>> {
    let subject = resolve(&pattern.subject, bindings)?;
    let predicate = resolve_predicate(&pattern.predicate, bindings);
    let object = resolve(&pattern.object, bindings)?;

    let graph = match active {
        Active::Default => None,
        Active::Named(name) => Some(name),
    };

    let mut results = Vec::new();
    for triple in store.triples(graph) {
        let mut row = bindings.clone();
        if unify(&subject, &subject_term(&triple.subject), &mut row)
            && unify(&predicate, &Term::NamedNode(triple.predicate.clone()), &mut row)
            && unify(&object, &triple.object, &mut row)
        {
            results.push(row);
        }
    }
    Ok(results)
}

fn eval_bgp(
    store: &QuadStore,
    active: Active<'_>,
    patterns: &[TriplePattern],
    input: Vec<Bindings>,
) -> SparqlResult<Vec<Bindings>> {
    let mut solutions = input;
    for pattern in patterns {
        let mut next = Vec::new();
        for row in &solutions {
            next.extend(match_triple_pattern(store, active, pattern, row)?);
        }
        solutions = next;
        if solutions.is_empty() {
            break;
        }
    }
    Ok(solutions)
}

fn eval_pattern(
    store: &QuadStore,
    pattern: &GraphPattern,
    active: Active<'_>,
    input: Vec<Bindings>,
) -> SparqlResult<Vec<Bindings>> {
    match pattern {
        GraphPattern::Bgp { patterns } => eval_bgp(store, active, patterns, input),
        GraphPattern::Graph { name, inner } => match name {
            NamedNodePattern::NamedNode(n) => {
                eval_pattern(store, inner, Active::Named(n), input)
            }
            NamedNodePattern::Variable(v) => {
                let names: Vec<NamedNode> = store.graph_names().cloned().collect();
                let mut results = Vec::new();
                for graph in &names {
                    let graph_term = Term::NamedNode(graph.clone());
                    let seeded: Vec<Bindings> = input
                        .iter()
                        .filter(|row| {
                            row.get(v.as_str()).is_none_or(|bound| *bound == graph_term)
                        })
                        .map(|row| {
                            let mut row = row.clone();
                            row.insert(v.as_str().to_string(), graph_term.clone());
                            row
                        })
                        .collect();
                    if !seeded.is_empty() {
                        results.extend(eval_pattern(
                            store,
                            inner,
                            Active::Named(graph),
                            seeded,
                        )?);
                    }
                }
                Ok(results)
            }
        },
        GraphPattern::Join { left, right } => {
            let left = eval_pattern(store, left, active, input)?;
            eval_pattern(store, right, active, left)
        }
        GraphPattern::LeftJoin {
            left,
            right,
            expression,
        } => {
            if expression.is_some() {
                return Err(SparqlError::Unsupported("OPTIONAL with FILTER".to_string()));
            }
            let left_rows = eval_pattern(store, left, active, input)?;
            let mut results = Vec::new();
            for row in left_rows {
                let extended = eval_pattern(store, right, active, vec![row.clone()])?;
                if extended.is_empty() {
                    results.push(row);
                } else {
                    results.extend(extended);
                }
            }
            Ok(results)
        }
        GraphPattern::Union { left, right } => {
            let mut results = eval_pattern(store, left, active, input.clone())?;
            results.extend(eval_pattern(store, right, active, input)?);
            Ok(results)
        }
        GraphPattern::Project { inner, variables } => {
            let rows = eval_pattern(store, inner, active, input)?;
            Ok(rows
                .into_iter()
                .map(|row| {
                    variables
                        .iter()
                        .filter_map(|v| {
                            row.get(v.as_str())
                                .map(|t| (v.as_str().to_string(), t.clone()))
                        })
                        .collect()
                })
                .collect())
        }
        GraphPattern::Distinct { inner } | GraphPattern::Reduced { inner } => {
            let rows = eval_pattern(store, inner, active, input)?;
            let mut seen = HashSet::new();
            let mut results = Vec::new();
            for row in rows {
                let mut key: Vec<(String, String)> = row
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_string()))
                    .collect();
                key.sort();
                if seen.insert(key) {
                    results.push(row);
                }
            }
            Ok(results)
        }
        GraphPattern::Slice {
            inner,
            start,
            length,
        } => {
            let rows = eval_pattern(store, inner, active, input)?;
            let iter = rows.into_iter().skip(*start);
            Ok(match length {
                Some(len) => iter.take(*len).collect(),
                None => iter.collect(),
            })
        }
        other => Err(SparqlError::Unsupported(format!("{other:?}"))),
    }
}

/// Run a SELECT query, returning its solution rows.
pub fn evaluate_query(store: &QuadStore, query: &str) -> SparqlResult<Vec<Bindings>> {
    let parsed = Query::parse(query, None).map_err(|e| SparqlError::Parse(e.to_string()))?;
    match parsed {
        Query::Select { pattern, .. } => {
            eval_pattern(store, &pattern, Active::Default, vec![Bindings::new()])
        }
        _ => Err(SparqlError::Unsupported(
            "only SELECT queries are evaluated".to_string(),
        )),
    }
}

fn graph_of(name: &GraphName) -> Option<&NamedNode> {
    match name {
        GraphName::NamedNode(n) => Some(n),
        GraphName::DefaultGraph => None,
    }
}

fn ground_subject(subject: &GroundSubject) -> Subject {
    match subject {
        GroundSubject::NamedNode(n) => Subject::NamedNode(n.clone()),
        #[allow(unreachable_patterns)]
        _ => unreachable!("RDF-star subjects are not stored"),
    }
}

fn ground_term(term: &GroundTerm) -> Term {
    match term {
        GroundTerm::NamedNode(n) => Term::NamedNode(n.clone()),
        GroundTerm::Literal(l) => Term::Literal(l.clone()),
        #[allow(unreachable_patterns)]
        _ => unreachable!("RDF-star terms are not stored"),
    }
}

fn instantiate_ground(
    pattern: &GroundTermPattern,
    bindings: &Bindings,
) -> Option<Term> {
    match pattern {
        GroundTermPattern::NamedNode(n) => Some(Term::NamedNode(n.clone())),
        GroundTermPattern::Literal(l) => Some(Term::Literal(l.clone())),
        GroundTermPattern::Variable(v) => bindings.get(v.as_str()).cloned(),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn instantiate_term(pattern: &TermPattern, bindings: &Bindings) -> Option<Term> {
    match pattern {
        TermPattern::NamedNode(n) => Some(Term::NamedNode(n.clone())),
        TermPattern::Literal(l) => Some(Term::Literal(l.clone())),
        TermPattern::BlankNode(b) => bindings.get(&format!("_:{}", b.as_str())).cloned(),
        TermPattern::Variable(v) => bindings.get(v.as_str()).cloned(),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn instantiate_graph(
    pattern: &GraphNamePattern,
    bindings: &Bindings,
) -> Option<Option<NamedNode>> {
    match pattern {
        GraphNamePattern::NamedNode(n) => Some(Some(n.clone())),
        GraphNamePattern::DefaultGraph => Some(None),
        GraphNamePattern::Variable(v) => match bindings.get(v.as_str()) {
            Some(Term::NamedNode(n)) => Some(Some(n.clone())),
            _ => None,
        },
    }
}

type ResolvedQuad = (Option<NamedNode>, Triple);

fn delete_quads(
    patterns: &[GroundQuadPattern],
    solutions: &[Bindings],
) -> Vec<ResolvedQuad> {
    let mut quads = Vec::new();
    for row in solutions {
        for pattern in patterns {
            let (Some(subject), Some(predicate), Some(object), Some(graph)) = (
                instantiate_ground(&pattern.subject, row),
                match &pattern.predicate {
                    NamedNodePattern::NamedNode(n) => Some(Term::NamedNode(n.clone())),
                    NamedNodePattern::Variable(v) => row.get(v.as_str()).cloned(),
                },
                instantiate_ground(&pattern.object, row),
                instantiate_graph(&pattern.graph_name, row),
            ) else {
                continue;
            };
            let (Some(subject), Term::NamedNode(predicate)) =
                (term_as_subject(&subject), predicate)
            else {
                continue;
            };
            quads.push((graph, Triple::new(subject, predicate, object)));
        }
    }
    quads
}

fn insert_quads(patterns: &[QuadPattern], solutions: &[Bindings]) -> Vec<ResolvedQuad> {
    let mut quads = Vec::new();
    for row in solutions {
        for pattern in patterns {
            let (Some(subject), Some(predicate), Some(object), Some(graph)) = (
                instantiate_term(&pattern.subject, row),
                match &pattern.predicate {
                    NamedNodePattern::NamedNode(n) => Some(Term::NamedNode(n.clone())),
                    NamedNodePattern::Variable(v) => row.get(v.as_str()).cloned(),
                },
                instantiate_term(&pattern.object, row),
                instantiate_graph(&pattern.graph_name, row),
            ) else {
                continue;
            };
            let (Some(subject), Term::NamedNode(predicate)) =
                (term_as_subject(&subject), predicate)
            else {
                continue;
            };
            quads.push((graph, Triple::new(subject, predicate, object)));
        }
    }
    quads
}

fn apply_operation(store: &mut QuadStore, operation: &GraphUpdateOperation) -> SparqlResult<()> {
    match operation {
        GraphUpdateOperation::InsertData { data } => {
            for Quad {
                subject,
                predicate,
                object,
                graph_name,
            } in data
            {
                let graph = graph_of(graph_name).cloned();
                store.insert(
                    graph.as_ref(),
                    Triple::new(subject.clone(), predicate.clone(), object.clone()),
                );
            }
            Ok(())
        }
        GraphUpdateOperation::DeleteData { data } => {
            for GroundQuad {
                subject,
                predicate,
                object,
                graph_name,
            } in data
            {
                let graph = graph_of(graph_name).cloned();
                store.remove(
                    graph.as_ref(),
                    &Triple::new(
                        ground_subject(subject),
                        predicate.clone(),
                        ground_term(object),
                    ),
                );
            }
            Ok(())
        }
        GraphUpdateOperation::DeleteInsert {
            delete,
            insert,
            using,
            pattern,
        } => {
            if using.is_some() {
                return Err(SparqlError::Unsupported("USING".to_string()));
            }
            let solutions = eval_pattern(store, pattern, Active::Default, vec![Bindings::new()])?;
            for (graph, triple) in delete_quads(delete, &solutions) {
                store.remove(graph.as_ref(), &triple);
            }
            for (graph, triple) in insert_quads(insert, &solutions) {
                store.insert(graph.as_ref(), triple);
            }
            Ok(())
        }
        GraphUpdateOperation::Clear { graph, .. }
        | GraphUpdateOperation::Drop { graph, .. } => {
            match graph {
                GraphTarget::NamedNode(n) => store.clear_graph(n),
                GraphTarget::DefaultGraph => {
                    store.default_graph.clear();
                }
                GraphTarget::NamedGraphs => {
                    store.named.clear();
                }
                GraphTarget::AllGraphs => store.clear(),
            }
            Ok(())
        }
        GraphUpdateOperation::Create { .. } => Ok(()),
        GraphUpdateOperation::Load { .. } => {
            Err(SparqlError::Unsupported("LOAD".to_string()))
        }
    }
}

/// Run an update (a `;`-separated operation sequence) against the store.
///
/// Operations are applied in order; a failure leaves earlier operations
/// applied, so callers stage on a copy when atomicity is required.
pub fn evaluate_update(store: &mut QuadStore, update: &str) -> SparqlResult<()> {
    let parsed = Update::parse(update, None).map_err(|e| SparqlError::Parse(e.to_string()))?;
    for operation in &parsed.operations {
        apply_operation(store, operation)?;
    }
    Ok(())
}

/// Apply a SPARQL update to a single graph of triples.
///
/// Used by PATCH: the graph becomes the default graph of a scratch store,
/// the update runs there, and the resulting default graph is returned.
pub fn update_graph(
    triples: Vec<crate::rdf::Triple>,
    update: &str,
    base: Option<&str>,
) -> SparqlResult<Vec<crate::rdf::Triple>> {
    let parsed = Update::parse(update, base).map_err(|e| SparqlError::Parse(e.to_string()))?;
    let mut store = QuadStore::new();
    for triple in triples {
        store.insert(None, triple.to_oxrdf());
    }
    for operation in &parsed.operations {
        apply_operation(&mut store, operation)?;
    }
    Ok(store
        .triples(None)
        .cloned()
        .map(crate::rdf::Triple::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(iri: &str) -> NamedNode {
        NamedNode::new(iri).unwrap()
    }

    fn seeded() -> QuadStore {
        let mut store = QuadStore::new();
        evaluate_update(
            &mut store,
            r#"INSERT DATA {
                GRAPH <http://example.org/g> {
                    <http://example.org/a> <http://example.org/p> "one" .
                    <http://example.org/b> <http://example.org/p> "two" .
                }
                <http://example.org/a> <http://example.org/q> <http://example.org/b> .
            }"#,
        )
        .unwrap();
        store
    }

    #[test]
    fn test_insert_data_and_select() {
        let store = seeded();
        assert_eq!(store.len(), 3);

        let rows = evaluate_query(
            &store,
            "SELECT ?s ?o WHERE { GRAPH <http://example.org/g> { ?s <http://example.org/p> ?o } }",
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.contains_key("s") && r.contains_key("o")));
    }

    #[test]
    fn test_default_graph_select() {
        let store = seeded();
        let rows = evaluate_query(
            &store,
            "SELECT ?o WHERE { <http://example.org/a> <http://example.org/q> ?o }",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0]["o"],
            Term::NamedNode(node("http://example.org/b"))
        );
    }

    #[test]
    fn test_delete_where_clears_graph() {
        let mut store = seeded();
        evaluate_update(
            &mut store,
            "DELETE WHERE { GRAPH <http://example.org/g> { ?s ?p ?o } }",
        )
        .unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.triples(Some(&node("http://example.org/g"))).next().is_none());
    }

    #[test]
    fn test_delete_insert_where_swaps_value() {
        let mut store = QuadStore::new();
        evaluate_update(
            &mut store,
            r#"INSERT DATA { GRAPH <http://example.org/g> {
                <http://example.org/r> <http://example.org/modified> "t0" . } }"#,
        )
        .unwrap();
        evaluate_update(
            &mut store,
            r#"DELETE { GRAPH <http://example.org/g> { <http://example.org/r> <http://example.org/modified> ?t } }
               INSERT { GRAPH <http://example.org/g> { <http://example.org/r> <http://example.org/modified> "t1" } }
               WHERE { GRAPH <http://example.org/g> { <http://example.org/r> <http://example.org/modified> ?t } }"#,
        )
        .unwrap();
        let rows = evaluate_query(
            &store,
            "SELECT ?t WHERE { GRAPH <http://example.org/g> { <http://example.org/r> <http://example.org/modified> ?t } }",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["t"].to_string(), "\"t1\"");
    }

    #[test]
    fn test_multi_pattern_join_within_graph() {
        let mut store = QuadStore::new();
        evaluate_update(
            &mut store,
            r#"INSERT DATA { GRAPH <http://example.org/g> {
                <http://example.org/dc> <http://example.org/member> <http://example.org/m> .
                <http://example.org/dc> <http://example.org/rel> <http://example.org/knows> .
                <http://example.org/x> <http://example.org/partOf> <http://example.org/dc> .
            } }"#,
        )
        .unwrap();
        let rows = evaluate_query(
            &store,
            r#"SELECT ?p ?o WHERE { GRAPH <http://example.org/g> {
                ?s <http://example.org/member> <http://example.org/m> .
                ?s <http://example.org/rel> ?p .
                ?o <http://example.org/partOf> ?s .
            } }"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["p"].to_string(), "<http://example.org/knows>");
        assert_eq!(rows[0]["o"].to_string(), "<http://example.org/x>");
    }

    #[test]
    fn test_variable_graph_name() {
        let store = seeded();
        let rows = evaluate_query(
            &store,
            "SELECT ?g ?s WHERE { GRAPH ?g { ?s <http://example.org/p> \"one\" } }",
        )
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["g"].to_string(), "<http://example.org/g>");
    }

    #[test]
    fn test_sequence_of_operations() {
        let mut store = QuadStore::new();
        evaluate_update(
            &mut store,
            r#"DELETE WHERE { GRAPH <http://example.org/g> { ?s ?p ?o } } ;
               INSERT DATA { GRAPH <http://example.org/g> {
                   <http://example.org/a> <http://example.org/p> "v" . } }"#,
        )
        .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_graph_for_patch() {
        let result = update_graph(
            vec![],
            r#"INSERT DATA { <> <http://purl.org/dc/terms/title> "T" }"#,
            Some("http://example.org/r1"),
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].subject.as_named_node().unwrap().as_str(),
            "http://example.org/r1"
        );
    }

    #[test]
    fn test_unsupported_feature_is_reported() {
        let store = QuadStore::new();
        let result = evaluate_query(
            &store,
            "SELECT ?s WHERE { ?s ?p ?o . MINUS { ?s ?p \"x\" } }",
        );
        assert!(matches!(result, Err(SparqlError::Unsupported(_))));
    }
}
