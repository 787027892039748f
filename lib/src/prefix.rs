//! Namespace and prefix utilities: splitting URIs into namespace and local name, and
//! rendering URIs in a compact `prefix:localName` form.
//!
//! Every formatting function takes the active [`PrefixMap`] as an argument; there is no
//! process-wide prefix state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known namespace prefixes, curated from prefix.cc and commonly reused ontologies.
pub const WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[
    // W3C standards
    ("http://www.w3.org/1999/02/22-rdf-syntax-ns#", "rdf"),
    ("http://www.w3.org/2000/01/rdf-schema#", "rdfs"),
    ("http://www.w3.org/2002/07/owl#", "owl"),
    ("http://www.w3.org/2001/XMLSchema#", "xsd"),
    ("http://www.w3.org/2004/02/skos/core#", "skos"),
    ("http://www.w3.org/ns/shacl#", "sh"),
    ("http://www.w3.org/ns/prov#", "prov"),
    ("http://www.w3.org/ns/dcat#", "dcat"),
    ("http://www.w3.org/ns/sosa/", "sosa"),
    ("http://www.w3.org/ns/ssn/", "ssn"),
    ("http://www.w3.org/ns/org#", "org"),
    ("http://www.w3.org/ns/adms#", "adms"),
    // Dublin Core
    ("http://purl.org/dc/terms/", "dct"),
    ("http://purl.org/dc/elements/1.1/", "dc"),
    // common vocabularies
    ("http://xmlns.com/foaf/0.1/", "foaf"),
    ("http://schema.org/", "schema"),
    ("https://schema.org/", "schema"),
    ("http://purl.org/vocab/vann/", "vann"),
    ("http://rdfs.org/ns/void#", "void"),
    // geospatial
    ("http://www.opengis.net/ont/geosparql#", "geo"),
    ("http://www.w3.org/2003/01/geo/wgs84_pos#", "wgs84"),
    // units
    ("http://qudt.org/schema/qudt/", "qudt"),
    ("http://qudt.org/vocab/unit/", "unit"),
    ("http://qudt.org/vocab/quantitykind/", "quantitykind"),
    // life sciences
    ("http://purl.obolibrary.org/obo/", "obo"),
    ("http://purl.bioontology.org/ontology/", "bioportal"),
    // ISO 19156
    ("http://def.isotc211.org/iso19156/2011/SamplingFeature#", "sf"),
    ("http://def.isotc211.org/iso19156/2011/Observation#", "om"),
    ("http://def.isotc211.org/iso19156/2011/GeneralFeatureInstance#", "gfi"),
    ("http://def.isotc211.org/iso19156/2011/SpatialSamplingFeature#", "ssf"),
    // DBpedia
    ("http://dbpedia.org/ontology/", "dbo"),
    ("http://dbpedia.org/property/", "dbp"),
    ("http://dbpedia.org/resource/", "dbr"),
    ("http://w3id.org/glosis/model/", "glosis"),
];

/// Returns the well-known prefix for an exact namespace match.
pub fn well_known_prefix(namespace: &str) -> Option<&'static str> {
    WELL_KNOWN_PREFIXES
        .iter()
        .find(|(ns, _)| *ns == namespace)
        .map(|(_, prefix)| *prefix)
}

/// An insertion-ordered mapping from full namespace strings (including their trailing
/// separator) to short prefix tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefixMap {
    entries: IndexMap<String, String>,
}

impl PrefixMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map seeded with [`WELL_KNOWN_PREFIXES`]. When two namespaces share a prefix
    /// (e.g. http/https schema.org) both are kept.
    pub fn with_well_known() -> Self {
        let mut map = Self::new();
        for (ns, prefix) in WELL_KNOWN_PREFIXES {
            map.insert(*ns, *prefix);
        }
        map
    }

    /// Builds a map from `(prefix, namespace)` declarations as they appear in an RDF
    /// document. Empty prefixes (the default namespace) are skipped.
    pub fn from_declarations<I, P, N>(declarations: I) -> Self
    where
        I: IntoIterator<Item = (P, N)>,
        P: AsRef<str>,
        N: AsRef<str>,
    {
        let mut map = Self::new();
        for (prefix, namespace) in declarations {
            if prefix.as_ref().is_empty() {
                continue;
            }
            map.insert(namespace.as_ref(), prefix.as_ref());
        }
        map
    }

    /// Inserts a binding. Re-binding an existing namespace updates its prefix in place,
    /// keeping the original iteration position.
    pub fn insert(&mut self, namespace: impl Into<String>, prefix: impl Into<String>) {
        self.entries.insert(namespace.into(), prefix.into());
    }

    pub fn get(&self, namespace: &str) -> Option<&str> {
        self.entries.get(namespace).map(String::as_str)
    }

    /// Appends the bindings of `other` whose namespaces are not bound yet.
    pub fn extend_missing(&mut self, other: &PrefixMap) {
        for (ns, prefix) in other.iter() {
            self.entries
                .entry(ns.to_string())
                .or_insert_with(|| prefix.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(ns, p)| (ns.as_str(), p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A URI split into a known prefix and the remaining local name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefixedName {
    pub prefix: String,
    pub local_name: String,
}

impl fmt::Display for PrefixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.local_name)
    }
}

/// Resolves `uri` against the first namespace, in map iteration order, that is a string
/// prefix of it. There is no longest-match preference: when `http://a.org/` precedes
/// `http://a.org/x#` in the map, the former wins.
pub fn get_prefixed_form(uri: &str, prefixes: &PrefixMap) -> Option<PrefixedName> {
    prefixes
        .iter()
        .find(|(ns, _)| uri.starts_with(ns))
        .map(|(ns, prefix)| PrefixedName {
            prefix: prefix.to_string(),
            local_name: uri[ns.len()..].to_string(),
        })
}

/// Renders `uri` as `prefix:localName` when a namespace matches, otherwise returns it
/// unchanged.
pub fn format_uri(uri: &str, prefixes: &PrefixMap) -> String {
    match get_prefixed_form(uri, prefixes) {
        Some(name) => name.to_string(),
        None => uri.to_string(),
    }
}

/// Namespace of a URI: everything up to and including the last `#`, or failing that the
/// last `/`. A URI with neither is its own namespace.
pub fn namespace_of(uri: &str) -> &str {
    if let Some(idx) = uri.rfind('#') {
        return &uri[..=idx];
    }
    if let Some(idx) = uri.rfind('/') {
        return &uri[..=idx];
    }
    uri
}

/// The substring after the last `#` or `/`. Returns the whole URI when it has no
/// separator; may be empty for URIs ending in a separator.
pub fn local_name(uri: &str) -> &str {
    match uri.rfind(['#', '/']) {
        Some(idx) => &uri[idx + 1..],
        None => uri,
    }
}

/// The terminal path or fragment component of a URI, if it has a non-empty one.
pub fn terminal_component(uri: &str) -> Option<&str> {
    let idx = uri.rfind(['#', '/'])?;
    let tail = &uri[idx + 1..];
    if tail.is_empty() {
        None
    } else {
        Some(tail)
    }
}

/// Display identifier of a URI: its terminal component, ignoring trailing `/` or `#`
/// separators. A URI with no component at all is returned whole.
pub fn identifier_of(uri: &str) -> &str {
    terminal_component(uri)
        .or_else(|| terminal_component(uri.trim_end_matches(['#', '/'])))
        .unwrap_or(uri)
}

/// Prefix for a namespace: bindings declared by the ontology first, then the well-known
/// table. No synthetic prefixes are generated from URI structure.
pub fn prefix_for_namespace(namespace: &str, declared: &PrefixMap) -> Option<String> {
    declared
        .get(namespace)
        .or_else(|| well_known_prefix(namespace))
        .map(|p| p.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_form() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("http://example.org/onto#", "ex");
        assert_eq!(
            get_prefixed_form("http://example.org/onto#Foo", &prefixes),
            Some(PrefixedName {
                prefix: "ex".to_string(),
                local_name: "Foo".to_string()
            })
        );
        assert_eq!(get_prefixed_form("http://other.org/Bar", &prefixes), None);
    }

    #[test]
    fn test_prefixed_form_is_first_match_not_longest() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("http://example.org/", "base");
        prefixes.insert("http://example.org/onto#", "ex");
        let name = get_prefixed_form("http://example.org/onto#Foo", &prefixes).unwrap();
        assert_eq!(name.prefix, "base");
        assert_eq!(name.local_name, "onto#Foo");

        // reversing insertion order flips the winner
        let mut prefixes = PrefixMap::new();
        prefixes.insert("http://example.org/onto#", "ex");
        prefixes.insert("http://example.org/", "base");
        let name = get_prefixed_form("http://example.org/onto#Foo", &prefixes).unwrap();
        assert_eq!(name.prefix, "ex");
    }

    #[test]
    fn test_namespace_and_local_name() {
        assert_eq!(
            namespace_of("http://www.w3.org/2002/07/owl#Class"),
            "http://www.w3.org/2002/07/owl#"
        );
        assert_eq!(namespace_of("http://xmlns.com/foaf/0.1/Person"), "http://xmlns.com/foaf/0.1/");
        assert_eq!(namespace_of("urn:isbn:123"), "urn:isbn:123");
        assert_eq!(local_name("http://xmlns.com/foaf/0.1/Person"), "Person");
        assert_eq!(local_name("urn:isbn:123"), "urn:isbn:123");
        assert_eq!(terminal_component("http://example.org/"), None);
        assert_eq!(terminal_component("urn:isbn:123"), None);
        assert_eq!(terminal_component("http://example.org/a#b"), Some("b"));
    }

    #[test]
    fn test_identifier_of_skips_trailing_separators() {
        assert_eq!(identifier_of("http://example.org/codes/A"), "A");
        assert_eq!(identifier_of("http://example.org/codes/A/"), "A");
        assert_eq!(identifier_of("http://example.org/onto#"), "onto");
        assert_eq!(identifier_of("urn:isbn:123"), "urn:isbn:123");
    }

    #[test]
    fn test_insert_rebinds_in_place() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("http://a.org/", "a");
        prefixes.insert("http://b.org/", "b");
        prefixes.insert("http://a.org/", "aa");
        let entries: Vec<_> = prefixes.iter().collect();
        assert_eq!(entries, vec![("http://a.org/", "aa"), ("http://b.org/", "b")]);
    }

    #[test]
    fn test_prefix_for_namespace_prefers_declared() {
        let declared = PrefixMap::from_declarations([("myskos", "http://www.w3.org/2004/02/skos/core#"), ("", "http://default.org/")]);
        assert_eq!(declared.len(), 1);
        assert_eq!(
            prefix_for_namespace("http://www.w3.org/2004/02/skos/core#", &declared).as_deref(),
            Some("myskos")
        );
        assert_eq!(
            prefix_for_namespace("http://www.w3.org/2002/07/owl#", &declared).as_deref(),
            Some("owl")
        );
        assert_eq!(prefix_for_namespace("http://nowhere.org/", &declared), None);
    }

    #[test]
    fn test_prefix_map_json_keeps_order() {
        let mut prefixes = PrefixMap::new();
        prefixes.insert("http://z.org/", "z");
        prefixes.insert("http://a.org/", "a");
        let json = serde_json::to_string(&prefixes).unwrap();
        assert_eq!(json, r#"{"http://z.org/":"z","http://a.org/":"a"}"#);
        let back: PrefixMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, prefixes);
        assert!(back.iter().eq(prefixes.iter()));
    }

    #[test]
    fn test_format_uri() {
        let prefixes = PrefixMap::with_well_known();
        assert_eq!(format_uri("http://www.w3.org/2002/07/owl#Thing", &prefixes), "owl:Thing");
        assert_eq!(format_uri("http://nowhere.org/x", &prefixes), "http://nowhere.org/x");
    }
}
