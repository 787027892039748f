//! Detection of enumerations (code lists) and extraction of their members.
//!
//! Four patterns are recognised, checked in a fixed order with the first non-empty match
//! winning: SKOS concept schemes, SKOS collections, `owl:oneOf` enumerations on the class
//! itself, and `owl:oneOf` enumerations reached through `owl:equivalentClass`.

use crate::consts::*;
use crate::prefix::identifier_of;
use crate::query::GraphQuery;
use anyhow::Result;
use log::{debug, info};
use oxigraph::model::{NamedNodeRef, NamedOrBlankNode, Term};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default cap on the number of members returned for one code list.
pub const DEFAULT_MEMBER_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeListPattern {
    #[serde(rename = "skos_scheme")]
    SkosScheme,
    #[serde(rename = "skos_collection")]
    SkosCollection,
    #[serde(rename = "owl_oneof")]
    OwlOneOf,
    #[serde(rename = "owl_equivalent_oneof")]
    OwlEquivalentOneOf,
}

impl CodeListPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeListPattern::SkosScheme => "skos_scheme",
            CodeListPattern::SkosCollection => "skos_collection",
            CodeListPattern::OwlOneOf => "owl_oneof",
            CodeListPattern::OwlEquivalentOneOf => "owl_equivalent_oneof",
        }
    }
}

impl std::fmt::Display for CodeListPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeListMember {
    pub uri: String,
    pub label: String,
    pub notation: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeList {
    pub uri: String,
    pub label: Option<String>,
    pub pattern: CodeListPattern,
    pub members: Vec<CodeListMember>,
    pub member_count: usize,
}

impl CodeList {
    pub fn new(
        uri: impl Into<String>,
        label: Option<String>,
        pattern: CodeListPattern,
        members: Vec<CodeListMember>,
    ) -> Self {
        CodeList {
            uri: uri.into(),
            label,
            pattern,
            member_count: members.len(),
            members,
        }
    }
}

/// Resolves one member's display fields. The label falls back to the URI's terminal
/// identifier when neither `skos:prefLabel` nor `rdfs:label` is present.
fn resolve_member<Q: GraphQuery + ?Sized>(query: &Q, uri: &str) -> Result<CodeListMember> {
    let label = query
        .first_literal(uri, &MEMBER_LABELS)?
        .unwrap_or_else(|| identifier_of(uri).to_string());
    Ok(CodeListMember {
        uri: uri.to_string(),
        label,
        notation: query.first_literal(uri, &[NOTATION])?,
        description: query.first_literal(uri, &MEMBER_DESCRIPTIONS)?,
    })
}

fn resolve_members<Q: GraphQuery + ?Sized>(
    query: &Q,
    uris: &[String],
) -> Result<Vec<CodeListMember>> {
    uris.iter().map(|uri| resolve_member(query, uri)).collect()
}

/// SKOS members are ordered by notation (absent notations first), then case-insensitive
/// label, then URI.
fn sort_skos_members(members: &mut [CodeListMember]) {
    members.sort_by(|a, b| {
        a.notation
            .cmp(&b.notation)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
            .then_with(|| a.uri.cmp(&b.uri))
    });
}

fn push_unique(into: &mut Vec<String>, seen: &mut HashSet<String>, items: Vec<String>) {
    for item in items {
        if seen.insert(item.clone()) {
            into.push(item);
        }
    }
}

fn iris_only(terms: Vec<Term>) -> Vec<String> {
    terms
        .into_iter()
        .filter_map(|t| match t {
            Term::NamedNode(n) => Some(n.into_string()),
            _ => None,
        })
        .collect()
}

/// Members of a concept scheme: concepts declaring `skos:inScheme`, plus top concepts
/// when the entity is typed as a scheme.
fn scheme_members<Q: GraphQuery + ?Sized>(
    query: &Q,
    uri: &str,
    is_scheme: bool,
) -> Result<Vec<String>> {
    let node = NamedNodeRef::new_unchecked(uri);
    let mut seen = HashSet::new();
    let mut members = vec![];
    push_unique(&mut members, &mut seen, query.subject_iris(IN_SCHEME, node.into())?);
    if is_scheme {
        push_unique(&mut members, &mut seen, query.subject_iris(TOP_CONCEPT_OF, node.into())?);
        push_unique(&mut members, &mut seen, query.object_iris(uri, HAS_TOP_CONCEPT)?);
    }
    Ok(members)
}

/// Members of a collection. An ordered collection's `skos:memberList` contributes its
/// items in list order; `skos:member` values follow.
fn collection_members<Q: GraphQuery + ?Sized>(
    query: &Q,
    uri: &str,
    is_ordered: bool,
) -> Result<(Vec<String>, bool)> {
    let mut seen = HashSet::new();
    let mut members = vec![];
    let mut ordered = false;
    if is_ordered {
        for head in query.objects(uri, MEMBER_LIST)? {
            let items = iris_only(query.list_items(&head)?);
            ordered |= !items.is_empty();
            push_unique(&mut members, &mut seen, items);
        }
    }
    push_unique(&mut members, &mut seen, query.object_iris(uri, MEMBER)?);
    Ok((members, ordered))
}

/// Enumerated IRIs of every `owl:oneOf` list attached to `subject`, in list order.
fn one_of_members<Q: GraphQuery + ?Sized>(query: &Q, subject: &Term) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut members = vec![];
    for head in query.term_objects(subject, ONE_OF)? {
        push_unique(&mut members, &mut seen, iris_only(query.list_items(&head)?));
    }
    Ok(members)
}

/// Determines whether `entity_uri` is a code list and, if so, extracts its members.
///
/// `entity_types` are the entity's asserted `rdf:type` URIs. At most `member_limit`
/// members are returned; SKOS members are sorted before truncation while `owl:oneOf`
/// members keep their declared order. Query failures propagate unchanged.
pub fn detect_code_list<Q, I, S>(
    query: &Q,
    entity_uri: &str,
    entity_types: I,
    member_limit: usize,
) -> Result<Option<CodeList>>
where
    Q: GraphQuery + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let types: HashSet<String> = entity_types
        .into_iter()
        .map(|t| t.as_ref().to_string())
        .collect();
    let has_type = |t: NamedNodeRef| types.contains(t.as_str());

    let (pattern, mut members) = 'detect: {
        let scheme = scheme_members(query, entity_uri, has_type(CONCEPT_SCHEME))?;
        if !scheme.is_empty() {
            let mut members = resolve_members(query, &scheme)?;
            sort_skos_members(&mut members);
            break 'detect (CodeListPattern::SkosScheme, members);
        }

        let (collection, ordered) =
            collection_members(query, entity_uri, has_type(ORDERED_COLLECTION))?;
        if !collection.is_empty() {
            let mut members = resolve_members(query, &collection)?;
            if !ordered {
                sort_skos_members(&mut members);
            }
            break 'detect (CodeListPattern::SkosCollection, members);
        }

        let subject = Term::from(NamedNodeRef::new_unchecked(entity_uri).into_owned());
        let direct = one_of_members(query, &subject)?;
        if !direct.is_empty() {
            break 'detect (CodeListPattern::OwlOneOf, resolve_members(query, &direct)?);
        }

        let mut seen = HashSet::new();
        let mut equivalent = vec![];
        for class in query.term_objects(&subject, EQUIVALENT_CLASS)? {
            push_unique(&mut equivalent, &mut seen, one_of_members(query, &class)?);
        }
        if !equivalent.is_empty() {
            break 'detect (
                CodeListPattern::OwlEquivalentOneOf,
                resolve_members(query, &equivalent)?,
            );
        }

        debug!("{} is not a code list", entity_uri);
        return Ok(None);
    };

    if members.len() > member_limit {
        info!(
            "Truncating code list {} from {} to {} members",
            entity_uri,
            members.len(),
            member_limit
        );
        members.truncate(member_limit);
    }
    let label = query.first_literal(entity_uri, &[LABEL, PREF_LABEL])?;
    Ok(Some(CodeList::new(entity_uri, label, pattern, members)))
}

/// Convenience form of [`detect_code_list`] that looks up the entity's types itself.
pub fn detect_code_list_for<Q: GraphQuery + ?Sized>(
    query: &Q,
    entity_uri: &str,
    member_limit: usize,
) -> Result<Option<CodeList>> {
    let types = query.types_of(entity_uri)?;
    detect_code_list(query, entity_uri, &types, member_limit)
}

/// A code list found by scanning the whole graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeListSummary {
    pub uri: String,
    pub label: String,
    pub pattern: CodeListPattern,
    pub member_count: usize,
}

/// Counts distinct IRI members of `predicate` per group node (the object when
/// `by_object`, otherwise the subject), preserving first-seen order of the groups.
fn group_by_predicate<Q: GraphQuery + ?Sized>(
    query: &Q,
    predicate: NamedNodeRef<'_>,
    by_object: bool,
) -> Result<Vec<(String, usize)>> {
    let mut order: Vec<String> = vec![];
    let mut members: HashMap<String, HashSet<String>> = HashMap::new();
    for triple in query.triples(None, Some(predicate), None)? {
        let (NamedOrBlankNode::NamedNode(s), Term::NamedNode(o)) = (triple.subject, triple.object)
        else {
            continue;
        };
        let (group, member) = if by_object {
            (o.into_string(), s.into_string())
        } else {
            (s.into_string(), o.into_string())
        };
        if !members.contains_key(&group) {
            order.push(group.clone());
        }
        members.entry(group).or_default().insert(member);
    }
    Ok(order
        .into_iter()
        .map(|g| {
            let count = members.get(&g).map_or(0, HashSet::len);
            (g, count)
        })
        .collect())
}

/// Every SKOS concept scheme and collection in the graph with its member count, sorted
/// case-insensitively by label.
pub fn list_code_lists<Q: GraphQuery + ?Sized>(query: &Q) -> Result<Vec<CodeListSummary>> {
    let mut summaries = vec![];
    let mut seen = HashSet::new();
    for (pattern, predicate, by_object) in [
        (CodeListPattern::SkosScheme, IN_SCHEME, true),
        (CodeListPattern::SkosCollection, MEMBER, false),
    ] {
        for (uri, member_count) in group_by_predicate(query, predicate, by_object)? {
            if !seen.insert(uri.clone()) {
                continue;
            }
            let label = query
                .first_literal(&uri, &[LABEL, PREF_LABEL])?
                .unwrap_or_else(|| identifier_of(&uri).to_string());
            summaries.push(CodeListSummary {
                uri,
                label,
                pattern,
                member_count,
            });
        }
    }
    summaries.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.uri.cmp(&b.uri))
    });
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QueryError;
    use oxigraph::io::{RdfFormat, RdfParser};
    use oxigraph::model::{Graph, NamedOrBlankNodeRef, TermRef, Triple};

    fn parse(ttl: &str) -> Graph {
        let mut graph = Graph::new();
        for quad in RdfParser::from_format(RdfFormat::Turtle).for_reader(ttl.as_bytes()) {
            let quad = quad.unwrap();
            graph.insert(&Triple::new(quad.subject, quad.predicate, quad.object));
        }
        graph
    }

    const PREFIXES: &str = r#"
        @prefix ex: <http://example.org/> .
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix skos: <http://www.w3.org/2004/02/skos/core#> .
    "#;

    fn graph(body: &str) -> Graph {
        parse(&format!("{PREFIXES}\n{body}"))
    }

    fn member_uris(list: &CodeList) -> Vec<&str> {
        list.members.iter().map(|m| m.uri.as_str()).collect()
    }

    #[test]
    fn test_skos_scheme_members_sorted_by_notation() {
        let g = graph(
            r#"
            ex:S a skos:ConceptScheme ; rdfs:label "Status" .
            ex:X skos:inScheme ex:S ; skos:prefLabel "X" ; skos:notation "1" .
            ex:Y skos:inScheme ex:S ; skos:prefLabel "Y" ; skos:notation "2" .
            ex:Z skos:inScheme ex:S ; skos:prefLabel "Z" .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/S", DEFAULT_MEMBER_LIMIT)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::SkosScheme);
        assert_eq!(list.label.as_deref(), Some("Status"));
        assert_eq!(list.member_count, 3);
        assert_eq!(
            member_uris(&list),
            vec!["http://example.org/Z", "http://example.org/X", "http://example.org/Y"]
        );
        let x = &list.members[1];
        assert_eq!(x.label, "X");
        assert_eq!(x.notation.as_deref(), Some("1"));
        assert_eq!(x.description, None);
    }

    #[test]
    fn test_scheme_unlabeled_member_uses_identifier() {
        let g = graph(
            r#"
            ex:S a skos:ConceptScheme .
            ex:X skos:inScheme ex:S ; skos:prefLabel "X" .
            ex:Y skos:inScheme ex:S .
            ex:Z skos:inScheme ex:S ; skos:prefLabel "Z" .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/S", DEFAULT_MEMBER_LIMIT)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::SkosScheme);
        assert_eq!(list.member_count, 3);
        let labels: Vec<&str> = list.members.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["X", "Y", "Z"]);
        assert_eq!(list.members[1].uri, "http://example.org/Y");
    }

    #[test]
    fn test_member_label_ignores_trailing_slash() {
        let g = graph(
            r#"
            ex:S a skos:ConceptScheme .
            <http://example.org/codes/A/> skos:inScheme ex:S .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/S", DEFAULT_MEMBER_LIMIT)
            .unwrap()
            .unwrap();
        assert_eq!(list.members[0].label, "A");

        let lists = list_code_lists(&graph(
            r#"<http://example.org/codes/> skos:member ex:one ."#,
        ))
        .unwrap();
        assert_eq!(lists[0].label, "codes");
    }

    #[test]
    fn test_scheme_top_concepts() {
        let g = graph(
            r#"
            ex:S a skos:ConceptScheme ; skos:hasTopConcept ex:A .
            ex:B skos:topConceptOf ex:S .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/S", 10)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::SkosScheme);
        assert_eq!(member_uris(&list), vec!["http://example.org/A", "http://example.org/B"]);
        // without the scheme type only skos:inScheme counts
        assert!(detect_code_list(&g, "http://example.org/S", Vec::<String>::new(), 10)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_collection_members_and_fallbacks() {
        let g = graph(
            r#"
            ex:C a skos:Collection ; skos:member ex:b, ex:a .
            ex:a rdfs:label "alpha" ; rdfs:comment "first letter" .
            ex:b skos:definition "second letter" ; rdfs:comment "ignored" .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/C", 10)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::SkosCollection);
        assert_eq!(list.label, None);
        assert_eq!(member_uris(&list), vec!["http://example.org/a", "http://example.org/b"]);
        assert_eq!(list.members[0].description.as_deref(), Some("first letter"));
        assert_eq!(list.members[1].label, "b");
        assert_eq!(list.members[1].description.as_deref(), Some("second letter"));
    }

    #[test]
    fn test_ordered_collection_keeps_list_order() {
        let g = graph(
            r#"
            ex:Days a skos:OrderedCollection ; skos:memberList ( ex:Tue ex:Mon ) .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/Days", 10)
            .unwrap()
            .unwrap();
        assert_eq!(
            member_uris(&list),
            vec!["http://example.org/Tue", "http://example.org/Mon"]
        );
    }

    #[test]
    fn test_owl_one_of_keeps_declared_order() {
        let g = graph(
            r#"
            ex:Color a owl:Class ; owl:oneOf ( ex:Red ex:Green ex:Blue ) .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/Color", 10)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::OwlOneOf);
        assert_eq!(
            member_uris(&list),
            vec![
                "http://example.org/Red",
                "http://example.org/Green",
                "http://example.org/Blue"
            ]
        );
        assert_eq!(list.members[0].label, "Red");
    }

    #[test]
    fn test_equivalent_class_one_of() {
        let g = graph(
            r#"
            ex:Size a owl:Class ;
                owl:equivalentClass [ a owl:Class ; owl:oneOf ( ex:Small ex:Large ) ] .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/Size", 10)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::OwlEquivalentOneOf);
        assert_eq!(
            member_uris(&list),
            vec!["http://example.org/Small", "http://example.org/Large"]
        );
    }

    #[test]
    fn test_first_matching_pattern_wins() {
        let g = graph(
            r#"
            ex:Both a owl:Class ; owl:oneOf ( ex:One ) .
            ex:Two skos:inScheme ex:Both .
            "#,
        );
        let list = detect_code_list_for(&g, "http://example.org/Both", 10)
            .unwrap()
            .unwrap();
        assert_eq!(list.pattern, CodeListPattern::SkosScheme);
        assert_eq!(member_uris(&list), vec!["http://example.org/Two"]);
    }

    #[test]
    fn test_not_a_code_list() {
        let g = graph("ex:Plain a owl:Class .");
        assert!(detect_code_list_for(&g, "http://example.org/Plain", 10)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_member_limit() {
        let mut body = String::from("ex:S a skos:ConceptScheme .\n");
        for i in 0..20 {
            body.push_str(&format!("ex:m{i:02} skos:inScheme ex:S ; skos:notation \"{i:02}\" .\n"));
        }
        let g = graph(&body);
        let list = detect_code_list_for(&g, "http://example.org/S", 5)
            .unwrap()
            .unwrap();
        assert_eq!(list.member_count, 5);
        assert_eq!(list.members[4].notation.as_deref(), Some("04"));
    }

    #[test]
    fn test_list_code_lists() {
        let g = graph(
            r#"
            ex:S rdfs:label "beta scheme" .
            ex:X skos:inScheme ex:S .
            ex:Y skos:inScheme ex:S .
            ex:C skos:prefLabel "Alpha collection" ; skos:member ex:X .
            "#,
        );
        let lists = list_code_lists(&g).unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].uri, "http://example.org/C");
        assert_eq!(lists[0].pattern, CodeListPattern::SkosCollection);
        assert_eq!(lists[0].member_count, 1);
        assert_eq!(lists[1].label, "beta scheme");
        assert_eq!(lists[1].member_count, 2);
    }

    struct FailingQuery;

    impl GraphQuery for FailingQuery {
        fn triples(
            &self,
            _subject: Option<NamedOrBlankNodeRef<'_>>,
            _predicate: Option<NamedNodeRef<'_>>,
            _object: Option<TermRef<'_>>,
        ) -> Result<Vec<Triple>> {
            Err(QueryError {
                pattern: "{ ?s ?p ?o }".to_string(),
                message: "backend unavailable".to_string(),
            }
            .into())
        }

        fn triple_count(&self) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_query_failure_propagates() {
        let err = detect_code_list_for(&FailingQuery, "http://example.org/S", 10).unwrap_err();
        assert!(err.downcast_ref::<QueryError>().is_some());
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn test_pattern_json() {
        assert_eq!(
            serde_json::to_string(&CodeListPattern::OwlEquivalentOneOf).unwrap(),
            "\"owl_equivalent_oneof\""
        );
        let list = CodeList::new("http://example.org/S", None, CodeListPattern::SkosScheme, vec![]);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["memberCount"], 0);
    }
}
