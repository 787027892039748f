//! Namespace composition statistics: how much of an ontology is defined natively and how
//! much is reused from other vocabularies.

use crate::entity::{ClassifiedEntity, EntityType};
use crate::prefix::{namespace_of, prefix_for_namespace, terminal_component, PrefixMap};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const OBO_BASE: &str = "http://purl.obolibrary.org/obo/";

/// Namespaces of upper and reference vocabularies which are never inferred as native by
/// dominance alone.
const FOUNDATIONAL_NAMESPACES: &[&str] = &[
    "http://www.w3.org/",
    "http://purl.org/dc/",
    "http://xmlns.com/foaf/",
    "http://schema.org/",
    "https://schema.org/",
    "http://purl.org/vocab/vann/",
    "http://rdfs.org/ns/void#",
    "http://qudt.org/",
    "http://www.opengis.net/ont/",
];

/// OBO upper ontologies
const FOUNDATIONAL_OBO_IDS: &[&str] = &["BFO", "RO", "IAO", "OMO", "COB"];

fn obo_term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^http://purl\.obolibrary\.org/obo/([A-Za-z][A-Za-z0-9]*)_[^/#]+$")
            .expect("OBO term pattern is valid")
    })
}

fn obo_ontology_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^http://purl\.obolibrary\.org/obo/([A-Za-z][A-Za-z0-9_]*)\.owl$")
            .expect("OBO ontology pattern is valid")
    })
}

/// The namespace an entity is counted under. OBO term URIs (`…/obo/GO_0008150`) are split
/// into per-ontology pseudo namespaces (`…/obo/GO_`); everything else uses
/// [`namespace_of`].
pub fn composition_namespace(uri: &str) -> String {
    match obo_term_pattern().captures(uri).and_then(|c| c.get(1)) {
        Some(id) => format!("{}{}_", OBO_BASE, id.as_str()),
        None => namespace_of(uri).to_string(),
    }
}

/// The OBO identifier (`GO`) of an OBO pseudo namespace (`…/obo/GO_`).
pub fn obo_namespace_id(namespace: &str) -> Option<&str> {
    let id = namespace.strip_prefix(OBO_BASE)?.strip_suffix('_')?;
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(id)
    } else {
        None
    }
}

pub fn is_foundational(namespace: &str) -> bool {
    if let Some(id) = obo_namespace_id(namespace) {
        return FOUNDATIONAL_OBO_IDS.contains(&id);
    }
    FOUNDATIONAL_NAMESPACES
        .iter()
        .any(|base| namespace.starts_with(base))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceCounts {
    pub class_count: usize,
    pub property_count: usize,
    /// Named individuals and SKOS concepts
    pub instance_count: usize,
}

/// Counts classes, properties and instances per namespace. Entities of any other primary
/// type are not counted and do not create an entry.
pub fn count_namespaces(entities: &[ClassifiedEntity]) -> BTreeMap<String, NamespaceCounts> {
    let mut counts: BTreeMap<String, NamespaceCounts> = BTreeMap::new();
    for entity in entities {
        let t = entity.primary_type;
        if t != EntityType::Class && !t.is_property() && !t.is_instance() {
            continue;
        }
        let entry = counts.entry(composition_namespace(entity.uri())).or_default();
        if t == EntityType::Class {
            entry.class_count += 1;
        } else if t.is_property() {
            entry.property_count += 1;
        } else {
            entry.instance_count += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntologyType {
    Domain,
    Integration,
    Application,
    Vocabulary,
}

impl std::fmt::Display for OntologyType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            OntologyType::Domain => "domain",
            OntologyType::Integration => "integration",
            OntologyType::Application => "application",
            OntologyType::Vocabulary => "vocabulary",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceStats {
    pub namespace: String,
    pub prefix: Option<String>,
    pub label: String,
    pub class_count: usize,
    pub property_count: usize,
    pub instance_count: usize,
    pub is_native: bool,
    pub is_obo: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyComposition {
    pub total_classes: usize,
    pub total_properties: usize,
    pub total_triples: usize,
    pub native_namespace: Option<String>,
    pub native_class_count: usize,
    pub native_class_pct: f64,
    pub namespace_stats: Vec<NamespaceStats>,
    pub ontology_type: OntologyType,
    pub source_ontologies: Vec<String>,
}

/// Everything the analyzer needs about one ontology.
#[derive(Debug, Clone)]
pub struct CompositionInput<'a> {
    pub counts: &'a BTreeMap<String, NamespaceCounts>,
    pub prefixes: &'a PrefixMap,
    pub ontology_uri: Option<&'a str>,
    pub total_triples: usize,
    pub native_override: Option<&'a str>,
}

impl<'a> CompositionInput<'a> {
    pub fn new(counts: &'a BTreeMap<String, NamespaceCounts>, prefixes: &'a PrefixMap) -> Self {
        CompositionInput {
            counts,
            prefixes,
            ontology_uri: None,
            total_triples: 0,
            native_override: None,
        }
    }

    pub fn ontology_uri(mut self, uri: Option<&'a str>) -> Self {
        self.ontology_uri = uri;
        self
    }

    pub fn total_triples(mut self, total: usize) -> Self {
        self.total_triples = total;
        self
    }

    pub fn native_override(mut self, namespace: Option<&'a str>) -> Self {
        self.native_override = namespace;
        self
    }
}

/// True when `namespace` prefixes `uri`, or when the namespace without its trailing
/// separators equals `uri` or prefixes it up to a separator.
fn namespace_matches_uri(namespace: &str, uri: &str) -> bool {
    if uri.starts_with(namespace) {
        return true;
    }
    let trimmed = namespace.trim_end_matches(['#', '/']);
    if trimmed.is_empty() {
        return false;
    }
    match uri.strip_prefix(trimmed) {
        Some(rest) => rest.is_empty() || rest.starts_with(['#', '/']),
        None => false,
    }
}

/// Infers the native namespace of an ontology.
///
/// In order: an observed override; the namespace matching the ontology URI with the most
/// classes (longer namespace on ties); the `obo/<ID>_` namespace of an OBO PURL; the
/// non-foundational namespace holding at least half of the non-foundational classes or
/// twice the runner-up.
pub fn infer_native_namespace(
    counts: &BTreeMap<String, NamespaceCounts>,
    ontology_uri: Option<&str>,
    native_override: Option<&str>,
) -> Option<String> {
    if let Some(ns) = native_override {
        if counts.contains_key(ns) {
            return Some(ns.to_string());
        }
        warn!("Native namespace override {} is not used by any entity", ns);
    }

    if let Some(uri) = ontology_uri {
        let by_uri = counts
            .iter()
            .filter(|(ns, _)| namespace_matches_uri(ns, uri))
            .max_by(|(a_ns, a), (b_ns, b)| {
                a.class_count
                    .cmp(&b.class_count)
                    .then_with(|| a_ns.len().cmp(&b_ns.len()))
            });
        if let Some((ns, _)) = by_uri {
            debug!("Native namespace {} matches ontology URI {}", ns, uri);
            return Some(ns.clone());
        }
        if let Some(id) = obo_ontology_pattern().captures(uri).and_then(|c| c.get(1)) {
            let ns = format!("{}{}_", OBO_BASE, id.as_str().to_uppercase());
            if counts.contains_key(&ns) {
                return Some(ns);
            }
        }
    }

    let mut candidates: Vec<(&String, usize)> = counts
        .iter()
        .filter(|(ns, c)| c.class_count > 0 && !is_foundational(ns))
        .map(|(ns, c)| (ns, c.class_count))
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let total: usize = candidates.iter().map(|(_, n)| n).sum();
    let (top, top_count) = *candidates.first()?;
    let dominant = match candidates.get(1) {
        Some((_, runner_up)) => top_count * 2 >= total || top_count >= runner_up * 2,
        None => true,
    };
    if dominant {
        debug!("Native namespace {} inferred from class share", top);
        Some(top.clone())
    } else {
        None
    }
}

/// Instances outnumbering classes make a vocabulary; otherwise the native share decides.
pub fn classify_ontology(total_classes: usize, total_instances: usize, native_pct: f64) -> OntologyType {
    if total_instances > total_classes {
        OntologyType::Vocabulary
    } else if native_pct > 0.5 {
        OntologyType::Domain
    } else if native_pct < 0.2 {
        OntologyType::Integration
    } else {
        OntologyType::Application
    }
}

fn namespace_label(namespace: &str, prefix: Option<&str>) -> String {
    if let Some(id) = obo_namespace_id(namespace) {
        return id.to_string();
    }
    if let Some(prefix) = prefix {
        return prefix.to_string();
    }
    let trimmed = namespace.trim_end_matches(['#', '/']);
    terminal_component(trimmed)
        .unwrap_or(if trimmed.is_empty() { namespace } else { trimmed })
        .to_string()
}

pub fn analyze(input: &CompositionInput) -> OntologyComposition {
    let counts = input.counts;
    let native = infer_native_namespace(counts, input.ontology_uri, input.native_override);

    let total_classes: usize = counts.values().map(|c| c.class_count).sum();
    let total_properties: usize = counts.values().map(|c| c.property_count).sum();
    let total_instances: usize = counts.values().map(|c| c.instance_count).sum();
    let native_class_count = native
        .as_ref()
        .and_then(|ns| counts.get(ns))
        .map_or(0, |c| c.class_count);
    let native_class_pct = if total_classes == 0 {
        0.0
    } else {
        native_class_count as f64 / total_classes as f64
    };

    let mut namespace_stats: Vec<NamespaceStats> = counts
        .iter()
        .map(|(ns, c)| {
            let prefix = prefix_for_namespace(ns, input.prefixes)
                .or_else(|| obo_namespace_id(ns).map(str::to_string));
            NamespaceStats {
                namespace: ns.clone(),
                label: namespace_label(ns, prefix.as_deref()),
                prefix,
                class_count: c.class_count,
                property_count: c.property_count,
                instance_count: c.instance_count,
                is_native: native.as_deref() == Some(ns.as_str()),
                is_obo: obo_namespace_id(ns).is_some(),
            }
        })
        .collect();
    namespace_stats.sort_by(|a, b| {
        b.class_count
            .cmp(&a.class_count)
            .then_with(|| a.namespace.cmp(&b.namespace))
    });

    let source_ontologies = namespace_stats
        .iter()
        .filter(|s| !s.is_native && s.class_count > 0)
        .map(|s| s.label.clone())
        .collect();

    OntologyComposition {
        total_classes,
        total_properties,
        total_triples: input.total_triples,
        ontology_type: classify_ontology(total_classes, total_instances, native_class_pct),
        native_namespace: native,
        native_class_count,
        native_class_pct,
        namespace_stats,
        source_ontologies,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{NAMED_INDIVIDUAL, OBJECT_PROPERTY, OWL_CLASS};
    use crate::entity::EntityRecord;

    fn ns_counts(entries: &[(&str, usize, usize, usize)]) -> BTreeMap<String, NamespaceCounts> {
        entries
            .iter()
            .map(|(ns, classes, props, instances)| {
                (
                    ns.to_string(),
                    NamespaceCounts {
                        class_count: *classes,
                        property_count: *props,
                        instance_count: *instances,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_integration_ontology() {
        let counts = ns_counts(&[
            ("http://example.org/onto#", 19, 4, 0),
            ("http://purl.obolibrary.org/obo/ENVO_", 200, 0, 0),
            ("http://www.opengis.net/ont/geosparql#", 93, 10, 0),
        ]);
        let prefixes = PrefixMap::new();
        let input = CompositionInput::new(&counts, &prefixes)
            .ontology_uri(Some("http://example.org/onto"))
            .total_triples(5000);
        let result = analyze(&input);
        assert_eq!(result.total_classes, 312);
        assert_eq!(result.native_namespace.as_deref(), Some("http://example.org/onto#"));
        assert_eq!(result.native_class_count, 19);
        assert!((result.native_class_pct - 19.0 / 312.0).abs() < 1e-9);
        assert_eq!(result.ontology_type, OntologyType::Integration);
        assert_eq!(result.total_triples, 5000);
        assert_eq!(result.source_ontologies, vec!["ENVO", "geo"]);
    }

    #[test]
    fn test_class_counts_sum_to_total() {
        let counts = ns_counts(&[
            ("http://a.org/", 5, 0, 0),
            ("http://b.org/", 5, 1, 0),
            ("http://c.org/", 0, 3, 0),
        ]);
        let prefixes = PrefixMap::new();
        let result = analyze(&CompositionInput::new(&counts, &prefixes));
        let sum: usize = result.namespace_stats.iter().map(|s| s.class_count).sum();
        assert_eq!(sum, result.total_classes);
        assert_eq!(result.namespace_stats.len(), 3);
        assert!(result.namespace_stats.iter().filter(|s| s.is_native).count() <= 1);
        // ties broken by namespace string
        assert_eq!(result.namespace_stats[0].namespace, "http://a.org/");
        assert_eq!(result.namespace_stats[2].namespace, "http://c.org/");
    }

    #[test]
    fn test_empty_counts_do_not_divide_by_zero() {
        let counts = BTreeMap::new();
        let prefixes = PrefixMap::new();
        let result = analyze(&CompositionInput::new(&counts, &prefixes));
        assert_eq!(result.native_class_pct, 0.0);
        assert_eq!(result.native_namespace, None);
        assert_eq!(result.ontology_type, OntologyType::Integration);
    }

    #[test]
    fn test_vocabulary_checked_first() {
        let counts = ns_counts(&[("http://vocab.org/terms/", 2, 0, 40)]);
        let prefixes = PrefixMap::new();
        let result = analyze(&CompositionInput::new(&counts, &prefixes));
        assert_eq!(result.native_class_pct, 1.0);
        assert_eq!(result.ontology_type, OntologyType::Vocabulary);
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(classify_ontology(10, 0, 0.6), OntologyType::Domain);
        assert_eq!(classify_ontology(10, 0, 0.5), OntologyType::Application);
        assert_eq!(classify_ontology(10, 0, 0.2), OntologyType::Application);
        assert_eq!(classify_ontology(10, 0, 0.19), OntologyType::Integration);
        assert_eq!(classify_ontology(10, 10, 0.9), OntologyType::Domain);
    }

    #[test]
    fn test_native_override_and_dominance() {
        let counts = ns_counts(&[
            ("http://a.org/", 30, 0, 0),
            ("http://b.org/", 10, 0, 0),
            ("http://www.w3.org/ns/prov#", 100, 0, 0),
        ]);
        assert_eq!(
            infer_native_namespace(&counts, None, None).as_deref(),
            Some("http://a.org/")
        );
        assert_eq!(
            infer_native_namespace(&counts, None, Some("http://b.org/")).as_deref(),
            Some("http://b.org/")
        );
        // an unobserved override falls through to inference
        assert_eq!(
            infer_native_namespace(&counts, None, Some("http://z.org/")).as_deref(),
            Some("http://a.org/")
        );

        let even = ns_counts(&[
            ("http://a.org/", 10, 0, 0),
            ("http://b.org/", 9, 0, 0),
            ("http://c.org/", 8, 0, 0),
        ]);
        assert_eq!(infer_native_namespace(&even, None, None), None);
    }

    #[test]
    fn test_obo_namespaces() {
        let go = EntityRecord::new("http://purl.obolibrary.org/obo/GO_0008150", [OWL_CLASS.as_str()]).classify();
        let go2 = EntityRecord::new("http://purl.obolibrary.org/obo/GO_0003674", [OWL_CLASS.as_str()]).classify();
        let ro = EntityRecord::new("http://purl.obolibrary.org/obo/RO_0002211", [OBJECT_PROPERTY.as_str()]).classify();
        let ind = EntityRecord::new("http://example.org/data/x1", [NAMED_INDIVIDUAL.as_str()]).classify();
        let counts = count_namespaces(&[go, go2, ro, ind]);
        assert_eq!(counts["http://purl.obolibrary.org/obo/GO_"].class_count, 2);
        assert_eq!(counts["http://purl.obolibrary.org/obo/RO_"].property_count, 1);
        assert_eq!(counts["http://example.org/data/"].instance_count, 1);

        let prefixes = PrefixMap::new();
        let input = CompositionInput::new(&counts, &prefixes)
            .ontology_uri(Some("http://purl.obolibrary.org/obo/go.owl"));
        let result = analyze(&input);
        assert_eq!(
            result.native_namespace.as_deref(),
            Some("http://purl.obolibrary.org/obo/GO_")
        );
        let go_stats = &result.namespace_stats[0];
        assert!(go_stats.is_obo);
        assert_eq!(go_stats.label, "GO");
    }

    #[test]
    fn test_namespace_matching() {
        assert!(namespace_matches_uri("http://ex.org/onto#", "http://ex.org/onto"));
        assert!(namespace_matches_uri("http://ex.org/onto/", "http://ex.org/onto/core"));
        assert!(!namespace_matches_uri("http://ex.org/on#", "http://ex.org/onto"));
        assert_eq!(namespace_label("http://w3id.org/glosis/model/common/", None), "common");
    }

    #[test]
    fn test_composition_json() {
        let json = serde_json::to_value(OntologyType::Application).unwrap();
        assert_eq!(json, "application");
        let counts = BTreeMap::new();
        let prefixes = PrefixMap::new();
        let value = serde_json::to_value(analyze(&CompositionInput::new(&counts, &prefixes))).unwrap();
        assert!(value.get("nativeClassPct").is_some());
        assert!(value.get("sourceOntologies").is_some());
    }
}
