//! Defines the per-ontology browsing configuration: which namespaces are treated as
//! internal, how nodes are named, which nodes are shown, and the detection limits.

use crate::codelist::DEFAULT_MEMBER_LIMIT;
use crate::hierarchy::DisplayNameMode;
use anyhow::Result;
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{BufReader, Write};
use std::path::Path;

/// Default share of all classes a namespace must hold to be auto-detected as internal.
pub const DEFAULT_INTERNAL_THRESHOLD: f64 = 0.05;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Builder)]
#[builder(default, setter(into))]
#[serde(default, rename_all = "camelCase")]
pub struct OntologyConfig {
    /// Ontology IRI used for native-namespace inference; read from the graph when unset.
    #[builder(setter(into, strip_option))]
    pub ontology_uri: Option<String>,
    /// Namespaces considered internal. Empty means auto-detect.
    pub selected_namespaces: Vec<String>,
    pub display_name_mode: DisplayNameMode,
    pub show_deprecated: bool,
    pub show_external: bool,
    #[builder(setter(into, strip_option))]
    pub native_namespace: Option<String>,
    pub member_limit: usize,
    pub internal_threshold: f64,
}

impl Default for OntologyConfig {
    fn default() -> Self {
        OntologyConfig {
            ontology_uri: None,
            selected_namespaces: vec![],
            display_name_mode: DisplayNameMode::Label,
            show_deprecated: false,
            show_external: true,
            native_namespace: None,
            member_limit: DEFAULT_MEMBER_LIMIT,
            internal_threshold: DEFAULT_INTERNAL_THRESHOLD,
        }
    }
}

impl OntologyConfig {
    pub fn builder() -> OntologyConfigBuilder {
        OntologyConfigBuilder::default()
    }

    pub fn save_to_file(&self, file: &Path) -> Result<()> {
        let config_str = serde_json::to_string_pretty(&self)?;
        let mut file = std::fs::File::create(file)?;
        file.write_all(config_str.as_bytes())?;
        Ok(())
    }

    pub fn from_file(file: &Path) -> Result<Self> {
        let file = std::fs::File::open(file)?;
        let reader = BufReader::new(file);
        let config: OntologyConfig = serde_json::from_reader(reader)?;
        Ok(config)
    }
}

/// Readable rendering for command line output.
impl fmt::Display for OntologyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        if let Some(uri) = &self.ontology_uri {
            writeln!(f, "  Ontology URI: {}", uri)?;
        }
        if self.selected_namespaces.is_empty() {
            writeln!(f, "  Internal Namespaces: (auto-detect)")?;
        } else {
            writeln!(f, "  Internal Namespaces:")?;
            for ns in &self.selected_namespaces {
                writeln!(f, "    - {}", ns)?;
            }
        }
        writeln!(f, "  Display Names: {}", self.display_name_mode)?;
        writeln!(f, "  Show Deprecated: {}", self.show_deprecated)?;
        writeln!(f, "  Show External: {}", self.show_external)?;
        if let Some(ns) = &self.native_namespace {
            writeln!(f, "  Native Namespace: {}", ns)?;
        }
        writeln!(f, "  Member Limit: {}", self.member_limit)?;
        write!(f, "  Internal Threshold: {}", self.internal_threshold)
    }
}
