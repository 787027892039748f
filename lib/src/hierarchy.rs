//! Builds the display forest of an ontology's class hierarchy from classified entities.
//!
//! Parents link to children through a petgraph arena; the forest itself is produced by an
//! explicit-stack traversal so deep hierarchies never recurse on the call stack. A child
//! reachable through several parents is repeated under each of them.

use crate::config::OntologyConfig;
use crate::entity::{ClassifiedEntity, EntityType};
use crate::prefix::{identifier_of, terminal_component};
use log::debug;
use petgraph::graph::{Graph as DiGraph, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// How a node's display name is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayNameMode {
    /// The asserted label, falling back to the URI's terminal component
    #[default]
    Label,
    /// Always the URI's terminal component
    Identifier,
}

impl std::fmt::Display for DisplayNameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DisplayNameMode::Label => write!(f, "label"),
            DisplayNameMode::Identifier => write!(f, "identifier"),
        }
    }
}

impl std::str::FromStr for DisplayNameMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "label" => Ok(DisplayNameMode::Label),
            "identifier" | "id" => Ok(DisplayNameMode::Identifier),
            other => Err(anyhow::anyhow!("Unknown display name mode: {}", other)),
        }
    }
}

/// Resolves the display name of a node. An empty label counts as absent. In identifier
/// mode the label is only used when the URI has no terminal component; a URI with neither
/// is displayed whole.
pub fn display_name(uri: &str, label: Option<&str>, mode: DisplayNameMode) -> String {
    let label = label.filter(|l| !l.is_empty());
    let identifier = terminal_component(uri);
    let chosen = match mode {
        DisplayNameMode::Label => label.or(identifier),
        DisplayNameMode::Identifier => identifier.or(label),
    };
    chosen.unwrap_or(uri).to_string()
}

/// Which entities take part in a hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyFilter {
    pub include_external: bool,
    pub include_deprecated: bool,
    /// When set, only entities whose namespace is listed are kept.
    pub namespaces: Option<BTreeSet<String>>,
    pub display_mode: DisplayNameMode,
}

impl Default for HierarchyFilter {
    fn default() -> Self {
        HierarchyFilter {
            include_external: true,
            include_deprecated: false,
            namespaces: None,
            display_mode: DisplayNameMode::Label,
        }
    }
}

impl HierarchyFilter {
    pub fn new(include_external: bool, include_deprecated: bool) -> Self {
        HierarchyFilter {
            include_external,
            include_deprecated,
            ..Default::default()
        }
    }

    pub fn with_namespaces<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces = Some(namespaces.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayNameMode) -> Self {
        self.display_mode = mode;
        self
    }

    /// The filter described by a saved configuration. The namespace selection of a
    /// configuration only decides which entities are external, so it is not applied here.
    pub fn from_config(config: &OntologyConfig) -> Self {
        HierarchyFilter::new(config.show_external, config.show_deprecated)
            .with_display_mode(config.display_name_mode)
    }

    pub fn accepts(&self, entity: &ClassifiedEntity) -> bool {
        let record = &entity.record;
        if record.is_external && !self.include_external {
            return false;
        }
        if record.is_deprecated && !self.include_deprecated {
            return false;
        }
        match &self.namespaces {
            Some(selected) => selected.contains(&record.namespace),
            None => true,
        }
    }
}

/// A node of the display forest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub uri: String,
    pub display_name: String,
    pub children: Vec<TreeNode>,
    /// Presentation state, always false when built.
    #[serde(default)]
    pub expanded: bool,
}

impl TreeNode {
    /// Total number of nodes in this subtree, including repeated ones.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first, pre-order walk yielding each node with its depth (roots are 0).
    pub fn walk(&self) -> Vec<(usize, &TreeNode)> {
        let mut out = vec![];
        let mut stack = vec![(0usize, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.children.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

struct Frame {
    index: usize,
    next_child: usize,
    built: Vec<TreeNode>,
}

impl Frame {
    fn new(index: usize) -> Self {
        Frame {
            index,
            next_child: 0,
            built: vec![],
        }
    }
}

/// Builds the display forest.
///
/// Entities rejected by `filter` are removed first; a parent link to a removed entity is
/// ignored, which promotes the child to a root when none of its parents survive. A
/// self-reference is not a parent. Cycles among surviving entities are broken by never
/// descending into a node already on the current root-to-node path. Roots and every
/// child list are sorted case-insensitively by display name, ties broken by URI.
pub fn build_forest(entities: &[ClassifiedEntity], filter: &HierarchyFilter) -> Vec<TreeNode> {
    let mut kept: Vec<&ClassifiedEntity> = vec![];
    let mut index_of: HashMap<&str, usize> = HashMap::new();
    for entity in entities.iter().filter(|e| filter.accepts(e)) {
        if index_of.contains_key(entity.uri()) {
            continue;
        }
        index_of.insert(entity.uri(), kept.len());
        kept.push(entity);
    }

    let names: Vec<String> = kept
        .iter()
        .map(|e| display_name(e.uri(), e.label(), filter.display_mode))
        .collect();
    let sort_keys: Vec<(String, &str)> = kept
        .iter()
        .zip(names.iter())
        .map(|(e, name)| (name.to_lowercase(), e.uri()))
        .collect();

    // node weights are indices into `kept`; edges run parent -> child
    let mut arena: DiGraph<usize, ()> = DiGraph::with_capacity(kept.len(), kept.len());
    for i in 0..kept.len() {
        arena.add_node(i);
    }
    for (child, entity) in kept.iter().enumerate() {
        for parent_uri in &entity.record.parent_uris {
            if let Some(&parent) = index_of.get(parent_uri.as_str()) {
                if parent != child {
                    arena.update_edge(NodeIndex::new(parent), NodeIndex::new(child), ());
                }
            }
        }
    }

    let sorted = |mut v: Vec<usize>| {
        v.sort_by(|a, b| sort_keys[*a].cmp(&sort_keys[*b]));
        v
    };
    let children: Vec<Vec<usize>> = arena
        .node_indices()
        .map(|idx| {
            sorted(
                arena
                    .neighbors_directed(idx, Direction::Outgoing)
                    .map(|c| arena[c])
                    .collect(),
            )
        })
        .collect();
    let roots = sorted(
        arena
            .node_indices()
            .filter(|idx| {
                arena
                    .neighbors_directed(*idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| arena[idx])
            .collect(),
    );
    debug!(
        "Building forest of {} nodes ({} roots, {} filtered out)",
        kept.len(),
        roots.len(),
        entities.len() - kept.len()
    );

    let mut forest = Vec::with_capacity(roots.len());
    let mut on_path = vec![false; kept.len()];
    for root in roots {
        let mut stack = vec![Frame::new(root)];
        on_path[root] = true;
        loop {
            let Some(top) = stack.last_mut() else { break };
            if let Some(&child) = children[top.index].get(top.next_child) {
                top.next_child += 1;
                if on_path[child] {
                    debug!("Skipping cyclic edge to {}", kept[child].uri());
                    continue;
                }
                on_path[child] = true;
                stack.push(Frame::new(child));
                continue;
            }
            let Some(done) = stack.pop() else { break };
            on_path[done.index] = false;
            let node = TreeNode {
                uri: kept[done.index].uri().to_string(),
                display_name: names[done.index].clone(),
                children: done.built,
                expanded: false,
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => forest.push(node),
            }
        }
    }
    forest
}

/// A flat hierarchy entry, for consumers that build their own tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub uri: String,
    pub label: String,
    pub entity_type: EntityType,
    pub parent_uris: Vec<String>,
    pub is_external: bool,
    pub is_deprecated: bool,
}

/// The entities accepted by `filter` as flat nodes, sorted case-insensitively by label.
pub fn flatten_nodes(entities: &[ClassifiedEntity], filter: &HierarchyFilter) -> Vec<HierarchyNode> {
    let mut nodes: Vec<HierarchyNode> = entities
        .iter()
        .filter(|e| filter.accepts(e))
        .map(|e| HierarchyNode {
            uri: e.uri().to_string(),
            label: display_name(e.uri(), e.label(), filter.display_mode),
            entity_type: e.primary_type,
            parent_uris: e.record.parent_uris.clone(),
            is_external: e.record.is_external,
            is_deprecated: e.record.is_deprecated,
        })
        .collect();
    nodes.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.uri.cmp(&b.uri))
    });
    nodes
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub uri: String,
    pub label: String,
}

/// The ancestor chain of `uri`, root first and ending at `uri` itself. Each step follows
/// the first asserted parent; the walk stops at an unknown parent or a repeated node.
pub fn breadcrumb(uri: &str, entities: &[ClassifiedEntity]) -> Vec<Crumb> {
    let by_uri: HashMap<&str, &ClassifiedEntity> =
        entities.iter().map(|e| (e.uri(), e)).collect();
    let mut chain = vec![];
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current = uri;
    loop {
        if !seen.insert(current) {
            break;
        }
        let entity = by_uri.get(current);
        chain.push(Crumb {
            uri: current.to_string(),
            label: entity
                .and_then(|e| e.label())
                .map(str::to_string)
                .unwrap_or_else(|| identifier_of(current).to_string()),
        });
        match entity.and_then(|e| e.record.parent_uris.first()) {
            Some(parent) => current = parent.as_str(),
            None => break,
        }
    }
    chain.reverse();
    chain
}
