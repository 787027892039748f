//! In-memory store of parsed ontology graphs.
//!
//! Each loaded ontology is published as an immutable [`OntologySnapshot`] behind an `Arc`.
//! Loading parses into a fresh graph first and swaps the snapshot in only on success, so
//! readers see either the previous graph or the new one.

use crate::consts::{ONTOLOGY, TYPE};
use crate::errors::UnknownOntologyError;
use crate::prefix::PrefixMap;
use crate::query::GraphQuery;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::{Graph, NamedNodeRef, NamedOrBlankNodeRef, TermRef, Triple};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, RwLock};

const FALLBACK_FORMATS: [RdfFormat; 3] = [RdfFormat::Turtle, RdfFormat::RdfXml, RdfFormat::NTriples];

/// Guesses the RDF syntax from a file extension.
pub fn format_from_path(path: &Path) -> Option<RdfFormat> {
    let ext = path.extension().and_then(|ext| ext.to_str())?;
    match ext.to_lowercase().as_str() {
        "ttl" | "n3" => Some(RdfFormat::Turtle),
        "xml" | "owl" | "rdf" => Some(RdfFormat::RdfXml),
        "nt" => Some(RdfFormat::NTriples),
        _ => None,
    }
}

fn parse_with(bytes: &[u8], format: RdfFormat) -> Result<Graph> {
    let parser = RdfParser::from_format(format).for_reader(bytes);
    let mut graph = Graph::new();
    for quad in parser {
        let quad = quad?;
        let triple = Triple::new(quad.subject, quad.predicate, quad.object);
        graph.insert(&triple);
    }
    Ok(graph)
}

/// Parses `bytes` with the given format, or with each supported format in turn when none
/// is given or the given one fails.
pub fn parse_graph(bytes: &[u8], format: Option<RdfFormat>) -> Result<Graph> {
    let mut attempts = vec![];
    let ordered = format
        .into_iter()
        .chain(FALLBACK_FORMATS.into_iter().filter(|f| Some(*f) != format));
    for format in ordered {
        match parse_with(bytes, format) {
            Ok(graph) => {
                debug!("Parsed {} triples as {}", graph.len(), format.name());
                return Ok(graph);
            }
            Err(e) => {
                debug!("Failed to parse as {}: {}", format.name(), e);
                attempts.push(format!("{}: {}", format.name(), e));
            }
        }
    }
    Err(anyhow!(
        "Failed to parse RDF in any supported format ({})",
        attempts.join("; ")
    ))
}

fn turtle_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?mi)^\s*@?prefix\s+([A-Za-z][\w.\-]*)?:\s*<([^>]*)>")
            .expect("turtle prefix pattern is valid")
    })
}

fn xmlns_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"xmlns:([A-Za-z][\w.\-]*)\s*=\s*["']([^"']*)["']"#)
            .expect("xmlns pattern is valid")
    })
}

/// Reads the prefix declarations of a Turtle/N3 (`@prefix`, `PREFIX`) or RDF/XML
/// (`xmlns:`) document, in document order. Default-namespace declarations are skipped.
pub fn declared_prefixes(bytes: &[u8]) -> PrefixMap {
    let text = String::from_utf8_lossy(bytes);
    let mut declarations: Vec<(String, String)> = vec![];
    for pattern in [turtle_prefix_pattern(), xmlns_pattern()] {
        for caps in pattern.captures_iter(&text) {
            let prefix = caps.get(1).map_or("", |m| m.as_str());
            let namespace = caps.get(2).map_or("", |m| m.as_str());
            if !namespace.is_empty() {
                declarations.push((prefix.to_string(), namespace.to_string()));
            }
        }
    }
    PrefixMap::from_declarations(declarations)
}

/// The first IRI declared as `owl:Ontology` in the graph.
pub fn ontology_iri(graph: &Graph) -> Option<String> {
    graph
        .subjects_for_predicate_object(TYPE, ONTOLOGY)
        .find_map(|s| match s {
            NamedOrBlankNodeRef::NamedNode(n) => Some(n.as_str().to_string()),
            _ => None,
        })
}

/// One published, immutable ontology graph.
#[derive(Debug)]
pub struct OntologySnapshot {
    id: String,
    graph: Graph,
    prefixes: PrefixMap,
    ontology_uri: Option<String>,
    loaded_at: DateTime<Utc>,
    content_hash: String,
    source: Option<PathBuf>,
}

impl OntologySnapshot {
    /// Parses `bytes` into a new snapshot. Nothing is published.
    pub fn parse(id: impl Into<String>, bytes: &[u8], format: Option<RdfFormat>) -> Result<Self> {
        let graph = parse_graph(bytes, format)?;
        Ok(OntologySnapshot {
            id: id.into(),
            ontology_uri: ontology_iri(&graph),
            prefixes: declared_prefixes(bytes),
            graph,
            loaded_at: Utc::now(),
            content_hash: blake3::hash(bytes).to_hex().to_string(),
            source: None,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Prefixes declared by the source document.
    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    /// Declared prefixes followed by the well-known ones they do not rebind.
    pub fn display_prefixes(&self) -> PrefixMap {
        let mut prefixes = self.prefixes.clone();
        prefixes.extend_missing(&PrefixMap::with_well_known());
        prefixes
    }

    pub fn ontology_uri(&self) -> Option<&str> {
        self.ontology_uri.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// blake3 hash of the source bytes, hex encoded.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl GraphQuery for OntologySnapshot {
    fn triples(
        &self,
        subject: Option<NamedOrBlankNodeRef<'_>>,
        predicate: Option<NamedNodeRef<'_>>,
        object: Option<TermRef<'_>>,
    ) -> Result<Vec<Triple>> {
        self.graph.triples(subject, predicate, object)
    }

    fn triple_count(&self) -> Result<usize> {
        Ok(self.graph.len())
    }
}

/// Snapshots keyed by ontology identifier. Many readers, one writer at a time.
#[derive(Debug, Default)]
pub struct GraphStore {
    snapshots: RwLock<HashMap<String, Arc<OntologySnapshot>>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads (or reloads) an ontology from a file, choosing the syntax from its extension.
    pub fn load_file(&self, id: &str, path: &Path) -> Result<Arc<OntologySnapshot>> {
        debug!("Reading file: {}", path.display());
        let bytes = std::fs::read(path)?;
        let mut snapshot = OntologySnapshot::parse(id, &bytes, format_from_path(path))?;
        snapshot.source = Some(path.to_path_buf());
        Ok(self.publish(snapshot))
    }

    /// Loads (or reloads) an ontology from raw bytes.
    pub fn load_bytes(
        &self,
        id: &str,
        bytes: &[u8],
        format: Option<RdfFormat>,
    ) -> Result<Arc<OntologySnapshot>> {
        let snapshot = OntologySnapshot::parse(id, bytes, format)?;
        Ok(self.publish(snapshot))
    }

    /// Replaces the snapshot stored under the snapshot's id.
    pub fn publish(&self, snapshot: OntologySnapshot) -> Arc<OntologySnapshot> {
        let snapshot = Arc::new(snapshot);
        info!(
            "Publishing ontology {} ({} triples, hash {})",
            snapshot.id,
            snapshot.graph.len(),
            snapshot.content_hash
        );
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots.insert(snapshot.id.clone(), snapshot.clone());
        snapshot
    }

    pub fn get(&self, id: &str) -> Result<Arc<OntologySnapshot>> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots
            .get(id)
            .cloned()
            .ok_or_else(|| UnknownOntologyError { id: id.to_string() }.into())
    }

    /// Removes an ontology, returning whether it was present. Readers holding the snapshot
    /// keep it alive.
    pub fn remove(&self, id: &str) -> bool {
        let mut snapshots = self
            .snapshots
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        snapshots.remove(id).is_some()
    }

    /// Identifiers of all loaded ontologies, sorted.
    pub fn ids(&self) -> Vec<String> {
        let snapshots = self
            .snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut ids: Vec<String> = snapshots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.snapshots
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: &str = r#"
        @prefix ex: <http://example.org/onto#> .
        PREFIX owl: <http://www.w3.org/2002/07/owl#>
        @prefix : <http://example.org/default#> .
        <http://example.org/onto> a owl:Ontology .
        ex:A a owl:Class .
    "#;

    #[test]
    fn test_format_from_path() {
        assert_eq!(format_from_path(Path::new("a/b.ttl")), Some(RdfFormat::Turtle));
        assert_eq!(format_from_path(Path::new("b.OWL")), Some(RdfFormat::RdfXml));
        assert_eq!(format_from_path(Path::new("b.nt")), Some(RdfFormat::NTriples));
        assert_eq!(format_from_path(Path::new("b.json")), None);
        assert_eq!(format_from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_declared_prefixes_in_order() {
        let prefixes = declared_prefixes(TTL.as_bytes());
        let entries: Vec<_> = prefixes.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("http://example.org/onto#", "ex"),
                ("http://www.w3.org/2002/07/owl#", "owl")
            ]
        );

        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns="http://example.org/default#"
                     xmlns:ex='http://example.org/onto#'/>"#;
        let prefixes = declared_prefixes(xml.as_bytes());
        assert_eq!(prefixes.get("http://example.org/onto#"), Some("ex"));
        assert_eq!(prefixes.len(), 2);
    }

    #[test]
    fn test_parse_falls_back_across_formats() {
        let xml = r#"<?xml version="1.0"?>
            <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                     xmlns:owl="http://www.w3.org/2002/07/owl#">
              <owl:Class rdf:about="http://example.org/onto#A"/>
            </rdf:RDF>"#;
        let graph = parse_graph(xml.as_bytes(), None).unwrap();
        assert_eq!(graph.len(), 1);
        let err = parse_graph(b"this is { not rdf", None).unwrap_err();
        assert!(err.to_string().contains("any supported format"));
    }

    #[test]
    fn test_snapshot_metadata() {
        let store = GraphStore::new();
        let snapshot = store
            .load_bytes("onto", TTL.as_bytes(), Some(RdfFormat::Turtle))
            .unwrap();
        assert_eq!(snapshot.id(), "onto");
        assert_eq!(snapshot.ontology_uri(), Some("http://example.org/onto"));
        assert_eq!(snapshot.content_hash(), blake3::hash(TTL.as_bytes()).to_hex().as_str());
        assert_eq!(snapshot.triple_count().unwrap(), 2);
        assert!(snapshot.display_prefixes().get("http://www.w3.org/2004/02/skos/core#").is_some());
    }

    #[test]
    fn test_unknown_id() {
        let store = GraphStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(err.downcast_ref::<UnknownOntologyError>().is_some());
        assert!(!store.remove("missing"));
        assert!(store.is_empty());
    }
}
