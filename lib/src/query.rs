//! The read-only query capability the engine consumes: triple-pattern lookups scoped to a
//! single ontology graph. Implemented for in-memory oxigraph graphs and for a named graph
//! inside an oxigraph `Store`.

use crate::consts::{FIRST, NIL, REST, TYPE};
use crate::errors::QueryError;
use anyhow::Result;
use oxigraph::model::{
    Graph, GraphNameRef, NamedNode, NamedNodeRef, NamedOrBlankNodeRef, Term, TermRef, Triple,
    TripleRef,
};
use oxigraph::store::Store;
use std::collections::HashSet;

pub trait GraphQuery {
    /// Returns every triple matching the pattern; `None` positions are wildcards.
    fn triples(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<Vec<Triple>>;

    /// Number of triples in the graph.
    fn triple_count(&self) -> Result<usize>;

    /// All IRI `rdf:type` values of `uri`, deduplicated in discovery order.
    fn types_of(&self, uri: &str) -> Result<Vec<String>> {
        self.object_iris(uri, TYPE)
    }

    fn objects(&self, subject: &str, predicate: NamedNodeRef<'_>) -> Result<Vec<Term>> {
        let subject = NamedNodeRef::new_unchecked(subject);
        Ok(self
            .triples(Some(subject.into()), Some(predicate), None)?
            .into_iter()
            .map(|t| t.object)
            .collect())
    }

    /// Objects of `subject predicate ?o` for an IRI or blank node subject term. Literal
    /// subjects have no objects.
    fn term_objects(&self, subject: &Term, predicate: NamedNodeRef<'_>) -> Result<Vec<Term>> {
        let subject: NamedOrBlankNodeRef = match subject {
            Term::NamedNode(n) => n.as_ref().into(),
            Term::BlankNode(b) => b.as_ref().into(),
            _ => return Ok(vec![]),
        };
        Ok(self
            .triples(Some(subject), Some(predicate), None)?
            .into_iter()
            .map(|t| t.object)
            .collect())
    }

    /// IRI objects of `subject predicate ?o`, deduplicated in discovery order.
    fn object_iris(&self, subject: &str, predicate: NamedNodeRef<'_>) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .objects(subject, predicate)?
            .into_iter()
            .filter_map(|o| match o {
                Term::NamedNode(n) => Some(n.into_string()),
                _ => None,
            })
            .filter(|iri| seen.insert(iri.clone()))
            .collect())
    }

    /// IRI subjects of `?s predicate object`, deduplicated in discovery order.
    fn subject_iris(&self, predicate: NamedNodeRef<'_>, object: TermRef<'_>) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        Ok(self
            .triples(None, Some(predicate), Some(object))?
            .into_iter()
            .filter_map(|t| match t.subject {
                oxigraph::model::NamedOrBlankNode::NamedNode(n) => Some(n.into_string()),
                _ => None,
            })
            .filter(|iri| seen.insert(iri.clone()))
            .collect())
    }

    /// IRI subjects with `rdf:type <type_uri>`.
    fn instances_of(&self, type_uri: NamedNodeRef<'_>) -> Result<Vec<String>> {
        self.subject_iris(TYPE, type_uri.into())
    }

    /// The first literal value found for `subject` under any of `predicates`, tried in
    /// order. Within one predicate an untagged or English literal is preferred.
    fn first_literal(&self, subject: &str, predicates: &[NamedNodeRef<'_>]) -> Result<Option<String>> {
        for predicate in predicates {
            let mut fallback: Option<String> = None;
            for object in self.objects(subject, *predicate)? {
                if let Term::Literal(lit) = object {
                    match lit.language() {
                        None | Some("en") => return Ok(Some(lit.value().to_string())),
                        Some(_) => {
                            if fallback.is_none() {
                                fallback = Some(lit.value().to_string());
                            }
                        }
                    }
                }
            }
            if fallback.is_some() {
                return Ok(fallback);
            }
        }
        Ok(None)
    }

    /// Walks an RDF collection (`rdf:first`/`rdf:rest`) from `head`, returning the items
    /// in list order. Malformed or cyclic lists stop at the first repeated cell.
    fn list_items(&self, head: &Term) -> Result<Vec<Term>> {
        let mut items = vec![];
        let mut visited: HashSet<Term> = HashSet::new();
        let mut cell = head.clone();
        loop {
            match &cell {
                Term::NamedNode(n) if n.as_ref() == NIL => break,
                Term::NamedNode(_) | Term::BlankNode(_) => {}
                _ => break,
            }
            if !visited.insert(cell.clone()) {
                break;
            }
            if let Some(first) = self.term_objects(&cell, FIRST)?.into_iter().next() {
                items.push(first);
            }
            match self.term_objects(&cell, REST)?.into_iter().next() {
                Some(rest) => cell = rest,
                None => break,
            }
        }
        Ok(items)
    }
}

impl GraphQuery for Graph {
    fn triples(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<Vec<Triple>> {
        // pick the narrowest index available, then filter the remaining positions
        let candidates: Vec<TripleRef<'_>> = if let Some(s) = subject {
            self.triples_for_subject(s).collect()
        } else if let Some(o) = object {
            self.triples_for_object(o).collect()
        } else if let Some(p) = predicate {
            self.triples_for_predicate(p).collect()
        } else {
            self.iter().collect()
        };
        Ok(candidates
            .into_iter()
            .filter(|t| subject.map_or(true, |s| t.subject == s))
            .filter(|t| predicate.map_or(true, |p| t.predicate == p))
            .filter(|t| object.map_or(true, |o| t.object == o))
            .map(Triple::from)
            .collect())
    }

    fn triple_count(&self) -> Result<usize> {
        Ok(self.len())
    }
}

/// A named graph inside an oxigraph `Store`. Storage failures surface as [`QueryError`].
pub struct StoreGraph<'a> {
    store: &'a Store,
    graph: NamedNode,
}

impl<'a> StoreGraph<'a> {
    pub fn new(store: &'a Store, graph: NamedNode) -> Self {
        Self { store, graph }
    }

    fn graph_name(&self) -> GraphNameRef<'_> {
        GraphNameRef::NamedNode(self.graph.as_ref())
    }
}

fn describe_pattern(
    subject: Option<NamedOrBlankNodeRef<'_>>,
    predicate: Option<NamedNodeRef<'_>>,
    object: Option<TermRef<'_>>,
) -> String {
    format!(
        "{{ {} {} {} }}",
        subject.map_or("?s".to_string(), |s| s.to_string()),
        predicate.map_or("?p".to_string(), |p| p.to_string()),
        object.map_or("?o".to_string(), |o| o.to_string()),
    )
}

impl GraphQuery for StoreGraph<'_> {
    fn triples(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<Vec<Triple>> {
        let mut triples = vec![];
        for quad in self
            .store
            .quads_for_pattern(subject, predicate, object, Some(self.graph_name()))
        {
            let quad = quad.map_err(|e| QueryError {
                pattern: describe_pattern(subject, predicate, object),
                message: e.to_string(),
            })?;
            triples.push(Triple::new(quad.subject, quad.predicate, quad.object));
        }
        Ok(triples)
    }

    fn triple_count(&self) -> Result<usize> {
        let mut count = 0;
        for quad in self
            .store
            .quads_for_pattern(None, None, None, Some(self.graph_name()))
        {
            quad.map_err(|e| QueryError {
                pattern: describe_pattern(None, None, None),
                message: e.to_string(),
            })?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{LABEL, ONE_OF};
    use oxigraph::model::{BlankNode, Literal, QuadRef};

    fn node(s: &str) -> NamedNode {
        NamedNode::new(s).unwrap()
    }

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        let thing = node("http://example.org/Thing");
        g.insert(TripleRef::new(&thing, TYPE, &node("http://www.w3.org/2002/07/owl#Class")));
        g.insert(TripleRef::new(&thing, LABEL, &Literal::new_language_tagged_literal("Ding", "de").unwrap()));
        g.insert(TripleRef::new(&thing, LABEL, &Literal::new_simple_literal("Thing")));
        g
    }

    #[test]
    fn test_first_literal_prefers_untagged() {
        let g = sample_graph();
        let label = g.first_literal("http://example.org/Thing", &[LABEL]).unwrap();
        assert_eq!(label.as_deref(), Some("Thing"));
        let missing = g.first_literal("http://example.org/Other", &[LABEL]).unwrap();
        assert_eq!(missing, None);
    }

    #[test]
    fn test_list_items_in_order() {
        let mut g = Graph::new();
        let class = node("http://example.org/Color");
        let (l1, l2, l3) = (BlankNode::default(), BlankNode::default(), BlankNode::default());
        g.insert(TripleRef::new(&class, ONE_OF, &l1));
        for (cell, item, next) in [
            (&l1, "http://example.org/Red", Term::from(l2.clone())),
            (&l2, "http://example.org/Green", Term::from(l3.clone())),
            (&l3, "http://example.org/Blue", Term::from(NIL.into_owned())),
        ] {
            g.insert(TripleRef::new(cell, FIRST, &node(item)));
            g.insert(TripleRef::new(cell, REST, &next));
        }
        let head = g.objects("http://example.org/Color", ONE_OF).unwrap().remove(0);
        let items: Vec<String> = g
            .list_items(&head)
            .unwrap()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(
            items,
            vec![
                "<http://example.org/Red>",
                "<http://example.org/Green>",
                "<http://example.org/Blue>"
            ]
        );
    }

    #[test]
    fn test_list_items_stops_on_cycle() {
        let mut g = Graph::new();
        let cell = BlankNode::default();
        g.insert(TripleRef::new(&cell, FIRST, &node("http://example.org/A")));
        g.insert(TripleRef::new(&cell, REST, &cell));
        let items = g.list_items(&Term::from(cell)).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_store_graph_is_scoped() {
        let store = Store::new().unwrap();
        let a = node("http://example.org/graphA");
        let b = node("http://example.org/graphB");
        let s = node("http://example.org/s");
        let class = node("http://www.w3.org/2002/07/owl#Class");
        store
            .insert(QuadRef::new(&s, TYPE, &class, GraphNameRef::NamedNode(a.as_ref())))
            .unwrap();
        let in_a = StoreGraph::new(&store, a);
        let in_b = StoreGraph::new(&store, b);
        assert_eq!(in_a.types_of("http://example.org/s").unwrap().len(), 1);
        assert!(in_b.types_of("http://example.org/s").unwrap().is_empty());
        assert_eq!(in_a.triple_count().unwrap(), 1);
        assert_eq!(in_b.triple_count().unwrap(), 0);
    }
}
