//! Reads classified entities out of an ontology graph: the hierarchy candidates with their
//! labels, parents and flags, and every typed entity for composition counts.

use crate::config::OntologyConfig;
use crate::consts::*;
use crate::entity::{ClassifiedEntity, EntityRecord, EntityType};
use crate::prefix::{namespace_of, prefix_for_namespace, PrefixMap};
use crate::query::GraphQuery;
use anyhow::Result;
use log::{debug, info};
use oxigraph::model::{NamedOrBlankNode, Term};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Smallest number of classes a namespace needs to be auto-detected as internal.
const MIN_INTERNAL_CLASSES: usize = 3;

/// Shortest shared base, in `/`-separated segments of the namespace string.
const MIN_BASE_SEGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Namespaces considered internal; auto-detected when empty.
    pub internal_namespaces: BTreeSet<String>,
    pub internal_threshold: f64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions::from(&OntologyConfig::default())
    }
}

impl From<&OntologyConfig> for ExtractOptions {
    fn from(config: &OntologyConfig) -> Self {
        ExtractOptions {
            internal_namespaces: config.selected_namespaces.iter().cloned().collect(),
            internal_threshold: config.internal_threshold,
        }
    }
}

fn is_deprecated<Q: GraphQuery + ?Sized>(query: &Q, uri: &str) -> Result<bool> {
    Ok(query.objects(uri, DEPRECATED)?.iter().any(|o| match o {
        Term::Literal(lit) => lit.value().eq_ignore_ascii_case("true"),
        _ => false,
    }))
}

/// Hierarchy candidates: IRI subjects typed `owl:Class`, `rdfs:Class` or `skos:Concept`,
/// minus the meta classes, in discovery order.
fn candidate_uris<Q: GraphQuery + ?Sized>(query: &Q) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut uris = vec![];
    for class_type in [OWL_CLASS, RDFS_CLASS, CONCEPT] {
        for uri in query.instances_of(class_type)? {
            if is_excluded_class(&uri) || !seen.insert(uri.clone()) {
                continue;
            }
            uris.push(uri);
        }
    }
    Ok(uris)
}

fn read_record<Q: GraphQuery + ?Sized>(query: &Q, uri: &str) -> Result<EntityRecord> {
    let mut record = EntityRecord::new(uri, query.types_of(uri)?);
    if let Some(label) = query.first_literal(uri, &[LABEL, PREF_LABEL])? {
        record = record.with_label(label);
    }
    for predicate in [SUB_CLASS_OF, BROADER] {
        for parent in query.object_iris(uri, predicate)? {
            if parent != uri && !is_excluded_class(&parent) {
                record = record.with_parent(parent);
            }
        }
    }
    Ok(record.deprecated(is_deprecated(query, uri)?))
}

/// Extracts the hierarchy entities of a graph with their external flags resolved.
///
/// An entity is external when its namespace is not internal. Internal namespaces come from
/// `options`, or are detected from the class distribution when none are given. An external
/// entity with an internal descendant is kept internal so the local classes stay reachable.
pub fn extract_entities<Q: GraphQuery + ?Sized>(
    query: &Q,
    options: &ExtractOptions,
) -> Result<Vec<ClassifiedEntity>> {
    let mut records = vec![];
    for uri in candidate_uris(query)? {
        records.push(read_record(query, &uri)?);
    }

    let internal = if options.internal_namespaces.is_empty() {
        let classes: Vec<&str> = records.iter().map(|r| r.uri.as_str()).collect();
        detect_internal_namespaces(&classes, options.internal_threshold)
    } else {
        options.internal_namespaces.clone()
    };
    debug!("Internal namespaces: {:?}", internal);
    for record in records.iter_mut() {
        record.is_external = !internal.contains(&record.namespace);
    }
    clear_external_ancestors(&mut records);

    info!("Extracted {} hierarchy entities", records.len());
    Ok(records.into_iter().map(ClassifiedEntity::from).collect())
}

/// Marks every external record that has a non-external descendant as internal.
fn clear_external_ancestors(records: &mut [EntityRecord]) {
    let index: HashMap<&str, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.uri.as_str(), i))
        .collect();
    let mut parents_of: Vec<Vec<usize>> = vec![vec![]; records.len()];
    for (i, record) in records.iter().enumerate() {
        parents_of[i] = record
            .parent_uris
            .iter()
            .filter_map(|p| index.get(p.as_str()).copied())
            .collect();
    }

    // walk upwards from every internal record
    let mut keep = vec![false; records.len()];
    let mut stack: Vec<usize> = (0..records.len())
        .filter(|i| !records[*i].is_external)
        .collect();
    let mut visited = vec![false; records.len()];
    while let Some(i) = stack.pop() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        for &parent in &parents_of[i] {
            if records[parent].is_external {
                keep[parent] = true;
            }
            stack.push(parent);
        }
    }
    for (record, keep) in records.iter_mut().zip(keep) {
        if keep {
            record.is_external = false;
        }
    }
}

/// Determines which namespaces belong to the ontology itself.
///
/// Namespaces holding at least `max(3, threshold * total)` of the given class URIs are
/// major. A prefix of at least three `/` segments shared by two or more major namespaces is
/// a base, and every namespace under a base is internal as well.
pub fn detect_internal_namespaces(class_uris: &[&str], threshold: f64) -> BTreeSet<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for uri in class_uris {
        *counts.entry(namespace_of(uri)).or_default() += 1;
    }
    let min_count = MIN_INTERNAL_CLASSES.max((class_uris.len() as f64 * threshold) as usize);
    let major: Vec<&str> = counts
        .iter()
        .filter(|(_, n)| **n >= min_count)
        .map(|(ns, _)| *ns)
        .collect();

    let mut bases: BTreeSet<String> = BTreeSet::new();
    for ns in &major {
        let parts: Vec<&str> = ns.trim_end_matches('/').split('/').collect();
        for end in MIN_BASE_SEGMENTS..parts.len() {
            let base = format!("{}/", parts[..end].join("/"));
            let sharing = major.iter().filter(|m| m.starts_with(&base)).count();
            if sharing >= 2 {
                bases.insert(base);
            }
        }
    }

    let mut internal: BTreeSet<String> = major.iter().map(|ns| ns.to_string()).collect();
    for ns in counts.keys() {
        if bases.iter().any(|b| ns.starts_with(b.as_str())) {
            internal.insert(ns.to_string());
        }
    }
    internal
}

/// Every IRI subject carrying at least one IRI `rdf:type`, with all its types and label.
pub fn extract_all_typed<Q: GraphQuery + ?Sized>(query: &Q) -> Result<Vec<ClassifiedEntity>> {
    let mut order: Vec<String> = vec![];
    let mut types: HashMap<String, Vec<String>> = HashMap::new();
    for triple in query.triples(None, Some(TYPE), None)? {
        let (NamedOrBlankNode::NamedNode(s), Term::NamedNode(t)) = (triple.subject, triple.object)
        else {
            continue;
        };
        let s = s.into_string();
        if !types.contains_key(&s) {
            order.push(s.clone());
        }
        types.entry(s).or_default().push(t.into_string());
    }
    let mut entities = Vec::with_capacity(order.len());
    for uri in order {
        let mut record = EntityRecord::new(uri.as_str(), types.remove(&uri).unwrap_or_default());
        if let Some(label) = query.first_literal(&uri, &[LABEL, PREF_LABEL])? {
            record = record.with_label(label);
        }
        entities.push(record.classify());
    }
    Ok(entities)
}

/// One row of a namespace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceInfo {
    pub namespace: String,
    pub prefix: Option<String>,
    pub class_count: usize,
    pub selected: bool,
}

/// Class counts per namespace, sorted by count descending then namespace.
pub fn list_namespaces(
    entities: &[ClassifiedEntity],
    prefixes: &PrefixMap,
    selected: &BTreeSet<String>,
) -> Vec<NamespaceInfo> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for entity in entities
        .iter()
        .filter(|e| e.primary_type == EntityType::Class)
    {
        *counts.entry(entity.record.namespace.as_str()).or_default() += 1;
    }
    let mut rows: Vec<NamespaceInfo> = counts
        .into_iter()
        .map(|(ns, class_count)| NamespaceInfo {
            namespace: ns.to_string(),
            prefix: prefix_for_namespace(ns, prefixes),
            class_count,
            selected: selected.contains(ns),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.class_count
            .cmp(&a.class_count)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });
    rows
}
