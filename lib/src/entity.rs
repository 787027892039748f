//! Entity records and the classifier that resolves one primary type from the full set of
//! asserted `rdf:type` values.

use crate::consts::*;
use crate::prefix::namespace_of;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The primary type of an entity. Variants are ordered by classification precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    ConceptScheme,
    Concept,
    Class,
    ObjectProperty,
    DatatypeProperty,
    AnnotationProperty,
    NamedIndividual,
    Unknown,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ConceptScheme => "ConceptScheme",
            EntityType::Concept => "Concept",
            EntityType::Class => "Class",
            EntityType::ObjectProperty => "ObjectProperty",
            EntityType::DatatypeProperty => "DatatypeProperty",
            EntityType::AnnotationProperty => "AnnotationProperty",
            EntityType::NamedIndividual => "NamedIndividual",
            EntityType::Unknown => "Unknown",
        }
    }

    pub fn is_property(&self) -> bool {
        matches!(
            self,
            EntityType::ObjectProperty
                | EntityType::DatatypeProperty
                | EntityType::AnnotationProperty
        )
    }

    /// Instances rather than types: individuals and SKOS concepts.
    pub fn is_instance(&self) -> bool {
        matches!(self, EntityType::NamedIndividual | EntityType::Concept)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the primary entity type. First match wins:
/// ConceptScheme, Concept, Class (OWL or RDFS), ObjectProperty, DatatypeProperty,
/// AnnotationProperty, NamedIndividual, then Unknown.
pub fn classify<I, S>(types: I) -> EntityType
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut best = EntityType::Unknown;
    for t in types {
        let candidate = match t.as_ref() {
            s if s == CONCEPT_SCHEME.as_str() => EntityType::ConceptScheme,
            s if s == CONCEPT.as_str() => EntityType::Concept,
            s if s == OWL_CLASS.as_str() || s == RDFS_CLASS.as_str() => EntityType::Class,
            s if s == OBJECT_PROPERTY.as_str() => EntityType::ObjectProperty,
            s if s == DATATYPE_PROPERTY.as_str() => EntityType::DatatypeProperty,
            s if s == ANNOTATION_PROPERTY.as_str() => EntityType::AnnotationProperty,
            s if s == NAMED_INDIVIDUAL.as_str() => EntityType::NamedIndividual,
            _ => continue,
        };
        best = best.min(candidate);
    }
    best
}

/// The raw facts collected for one entity of an ontology graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub uri: String,
    pub types: BTreeSet<String>,
    pub label: Option<String>,
    pub parent_uris: Vec<String>,
    pub namespace: String,
    pub is_external: bool,
    pub is_deprecated: bool,
}

impl EntityRecord {
    /// Creates a record with the namespace derived from the URI. An empty type set is
    /// replaced by the `Unknown` sentinel.
    pub fn new<I, S>(uri: impl Into<String>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let uri = uri.into();
        let mut types: BTreeSet<String> = types.into_iter().map(Into::into).collect();
        if types.is_empty() {
            types.insert(UNKNOWN_TYPE.to_string());
        }
        EntityRecord {
            namespace: namespace_of(&uri).to_string(),
            uri,
            types,
            label: None,
            parent_uris: vec![],
            is_external: false,
            is_deprecated: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        if !self.parent_uris.contains(&parent) {
            self.parent_uris.push(parent);
        }
        self
    }

    pub fn external(mut self, is_external: bool) -> Self {
        self.is_external = is_external;
        self
    }

    pub fn deprecated(mut self, is_deprecated: bool) -> Self {
        self.is_deprecated = is_deprecated;
        self
    }

    pub fn classify(self) -> ClassifiedEntity {
        ClassifiedEntity::from(self)
    }
}

/// An entity record paired with its resolved primary type. The full type set stays
/// available on `record.types`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEntity {
    #[serde(flatten)]
    pub record: EntityRecord,
    pub primary_type: EntityType,
}

impl From<EntityRecord> for ClassifiedEntity {
    fn from(record: EntityRecord) -> Self {
        let primary_type = classify(&record.types);
        ClassifiedEntity {
            record,
            primary_type,
        }
    }
}

impl ClassifiedEntity {
    pub fn uri(&self) -> &str {
        &self.record.uri
    }

    pub fn label(&self) -> Option<&str> {
        self.record.label.as_deref()
    }

    pub fn has_type(&self, type_uri: &str) -> bool {
        self.record.types.contains(type_uri)
    }
}
