//! Defines the high-level browsing API: a [`GraphStore`] of loaded ontologies paired with a
//! per-ontology [`OntologyConfig`], exposing every structure-resolution operation by
//! ontology id.

use crate::codelist::{detect_code_list, list_code_lists, CodeList, CodeListSummary};
use crate::composition::{analyze, count_namespaces, CompositionInput, OntologyComposition};
use crate::config::OntologyConfig;
use crate::entity::ClassifiedEntity;
use crate::extract::{
    extract_all_typed, extract_entities, list_namespaces, ExtractOptions, NamespaceInfo,
};
use crate::hierarchy::{build_forest, flatten_nodes, HierarchyFilter, HierarchyNode, TreeNode};
use crate::prefix::{get_prefixed_form, PrefixedName};
use crate::properties::{class_properties, property_info, ClassProperties, PropertyInfo};
use crate::query::GraphQuery;
use crate::store::{GraphStore, OntologySnapshot};
use anyhow::Result;
use log::debug;
use oxigraph::io::RdfFormat;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

pub fn init_logging() {
    // Allow ONTOTREE_LOG to override RUST_LOG for consistent CLI defaults.
    if let Ok(log_level) = std::env::var("ONTOTREE_LOG") {
        std::env::set_var("RUST_LOG", log_level);
    }
}

/// Loaded ontologies and their browsing configuration.
#[derive(Debug, Default)]
pub struct OntologyBrowser {
    store: GraphStore,
    configs: RwLock<HashMap<String, OntologyConfig>>,
    default_config: OntologyConfig,
}

impl OntologyBrowser {
    pub fn new(default_config: OntologyConfig) -> Self {
        OntologyBrowser {
            store: GraphStore::new(),
            configs: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn load_file(&self, id: &str, path: &Path) -> Result<Arc<OntologySnapshot>> {
        self.store.load_file(id, path)
    }

    pub fn load_bytes(
        &self,
        id: &str,
        bytes: &[u8],
        format: Option<RdfFormat>,
    ) -> Result<Arc<OntologySnapshot>> {
        self.store.load_bytes(id, bytes, format)
    }

    /// The configuration of `id`, or the browser default when none was set.
    pub fn config(&self, id: &str) -> OntologyConfig {
        let configs = self
            .configs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        configs
            .get(id)
            .cloned()
            .unwrap_or_else(|| self.default_config.clone())
    }

    pub fn set_config(&self, id: &str, config: OntologyConfig) {
        let mut configs = self
            .configs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        configs.insert(id.to_string(), config);
    }

    /// Hierarchy entities of `id` with external flags resolved under its configuration.
    pub fn entities(&self, id: &str) -> Result<Vec<ClassifiedEntity>> {
        let snapshot = self.store.get(id)?;
        extract_entities(&*snapshot, &ExtractOptions::from(&self.config(id)))
    }

    pub fn hierarchy(&self, id: &str) -> Result<Vec<TreeNode>> {
        let config = self.config(id);
        self.hierarchy_with(id, &config, &HierarchyFilter::from_config(&config))
    }

    /// The forest of `id` under an explicit filter. `config` decides which entities are
    /// external; `filter` decides which are shown.
    pub fn hierarchy_with(
        &self,
        id: &str,
        config: &OntologyConfig,
        filter: &HierarchyFilter,
    ) -> Result<Vec<TreeNode>> {
        let snapshot = self.store.get(id)?;
        let entities = extract_entities(&*snapshot, &ExtractOptions::from(config))?;
        Ok(build_forest(&entities, filter))
    }

    pub fn hierarchy_nodes(&self, id: &str) -> Result<Vec<HierarchyNode>> {
        let snapshot = self.store.get(id)?;
        let config = self.config(id);
        let entities = extract_entities(&*snapshot, &ExtractOptions::from(&config))?;
        Ok(flatten_nodes(&entities, &HierarchyFilter::from_config(&config)))
    }

    /// Every typed entity of `id` with its resolved primary type.
    pub fn classified(&self, id: &str) -> Result<Vec<ClassifiedEntity>> {
        let snapshot = self.store.get(id)?;
        extract_all_typed(&*snapshot)
    }

    pub fn code_list(&self, id: &str, entity_uri: &str) -> Result<Option<CodeList>> {
        let snapshot = self.store.get(id)?;
        let types = snapshot.types_of(entity_uri)?;
        debug!("Detecting code list for {} with types {:?}", entity_uri, types);
        detect_code_list(
            &*snapshot,
            entity_uri,
            &types,
            self.config(id).member_limit,
        )
    }

    pub fn code_lists(&self, id: &str) -> Result<Vec<CodeListSummary>> {
        let snapshot = self.store.get(id)?;
        list_code_lists(&*snapshot)
    }

    pub fn namespaces(&self, id: &str) -> Result<Vec<NamespaceInfo>> {
        let snapshot = self.store.get(id)?;
        let config = self.config(id);
        let entities = extract_entities(&*snapshot, &ExtractOptions::from(&config))?;
        let selected: BTreeSet<String> = config.selected_namespaces.iter().cloned().collect();
        Ok(list_namespaces(
            &entities,
            &snapshot.display_prefixes(),
            &selected,
        ))
    }

    /// Composition of `id`. The ontology URI comes from the configuration, else from the
    /// graph's `owl:Ontology` declaration.
    pub fn composition(&self, id: &str) -> Result<OntologyComposition> {
        let snapshot = self.store.get(id)?;
        let config = self.config(id);
        let counts = count_namespaces(&extract_all_typed(&*snapshot)?);
        let prefixes = snapshot.display_prefixes();
        let ontology_uri = config
            .ontology_uri
            .as_deref()
            .or_else(|| snapshot.ontology_uri());
        let input = CompositionInput::new(&counts, &prefixes)
            .ontology_uri(ontology_uri)
            .total_triples(snapshot.triple_count()?)
            .native_override(config.native_namespace.as_deref());
        Ok(analyze(&input))
    }

    /// Prefixed form of `uri` under the prefixes declared by `id`, then the well-known ones.
    pub fn prefixed_form(&self, id: &str, uri: &str) -> Result<Option<PrefixedName>> {
        let snapshot = self.store.get(id)?;
        Ok(get_prefixed_form(uri, &snapshot.display_prefixes()))
    }

    pub fn property_info(&self, id: &str, property_uri: &str) -> Result<PropertyInfo> {
        let snapshot = self.store.get(id)?;
        property_info(&*snapshot, property_uri)
    }

    /// Direct, inherited and range properties of a class of `id`.
    pub fn class_properties(&self, id: &str, class_uri: &str) -> Result<ClassProperties> {
        let snapshot = self.store.get(id)?;
        class_properties(&*snapshot, class_uri)
    }
}
