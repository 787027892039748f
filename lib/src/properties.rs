//! Property details: the domains and ranges of one property, and the properties a class
//! is the domain of (directly or through its superclasses) or the range of.

use crate::consts::*;
use crate::entity::{classify, EntityType};
use crate::prefix::identifier_of;
use crate::query::GraphQuery;
use anyhow::Result;
use log::debug;
use oxigraph::model::{NamedNodeRef, Term};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A referenced resource with its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLink {
    pub uri: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInfo {
    pub uri: String,
    pub label: String,
    pub property_type: EntityType,
    pub domains: Vec<ResourceLink>,
    pub ranges: Vec<ResourceLink>,
}

/// Properties a class receives from one of its superclasses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InheritedProperties {
    pub from_class: ResourceLink,
    pub properties: Vec<PropertyInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProperties {
    pub domain_of: Vec<PropertyInfo>,
    pub inherited: Vec<InheritedProperties>,
    pub range_of: Vec<PropertyInfo>,
}

fn link<Q: GraphQuery + ?Sized>(query: &Q, uri: &str) -> Result<ResourceLink> {
    let label = query
        .first_literal(uri, &[LABEL, PREF_LABEL])?
        .unwrap_or_else(|| identifier_of(uri).to_string());
    Ok(ResourceLink {
        uri: uri.to_string(),
        label,
    })
}

fn links<Q: GraphQuery + ?Sized>(query: &Q, uris: &[String]) -> Result<Vec<ResourceLink>> {
    uris.iter().map(|uri| link(query, uri)).collect()
}

/// IRIs enumerated by anonymous `owl:oneOf` range classes of `property`, in list order.
fn enumerated_ranges<Q: GraphQuery + ?Sized>(query: &Q, property: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut members = vec![];
    for range in query.objects(property, RANGE)? {
        if !matches!(range, Term::BlankNode(_)) {
            continue;
        }
        for head in query.term_objects(&range, ONE_OF)? {
            for item in query.list_items(&head)? {
                if let Term::NamedNode(n) = item {
                    let iri = n.into_string();
                    if seen.insert(iri.clone()) {
                        members.push(iri);
                    }
                }
            }
        }
    }
    Ok(members)
}

/// Details of one property. A property without an OWL property type is reported as an
/// object property. When no IRI range is declared, the members of an anonymous
/// `owl:oneOf` range stand in for it.
pub fn property_info<Q: GraphQuery + ?Sized>(query: &Q, property_uri: &str) -> Result<PropertyInfo> {
    let property_type = match classify(query.types_of(property_uri)?) {
        t if t.is_property() => t,
        _ => EntityType::ObjectProperty,
    };
    let mut range_iris = query.object_iris(property_uri, RANGE)?;
    if range_iris.is_empty() {
        range_iris = enumerated_ranges(query, property_uri)?;
    }
    Ok(PropertyInfo {
        uri: property_uri.to_string(),
        label: link(query, property_uri)?.label,
        property_type,
        domains: links(query, &query.object_iris(property_uri, DOMAIN)?)?,
        ranges: links(query, &range_iris)?,
    })
}

fn properties_by<Q: GraphQuery + ?Sized>(
    query: &Q,
    predicate: NamedNodeRef<'_>,
    class_uri: &str,
) -> Result<Vec<PropertyInfo>> {
    let class = NamedNodeRef::new_unchecked(class_uri);
    let mut properties = vec![];
    for uri in query.subject_iris(predicate, class.into())? {
        properties.push(property_info(query, &uri)?);
    }
    properties.sort_by(|a, b| {
        a.label
            .to_lowercase()
            .cmp(&b.label.to_lowercase())
            .then_with(|| a.uri.cmp(&b.uri))
    });
    Ok(properties)
}

/// Properties declaring `class_uri` as their `rdfs:domain`, sorted by label.
pub fn properties_with_domain<Q: GraphQuery + ?Sized>(
    query: &Q,
    class_uri: &str,
) -> Result<Vec<PropertyInfo>> {
    properties_by(query, DOMAIN, class_uri)
}

/// Properties declaring `class_uri` as their `rdfs:range`, sorted by label.
pub fn properties_with_range<Q: GraphQuery + ?Sized>(
    query: &Q,
    class_uri: &str,
) -> Result<Vec<PropertyInfo>> {
    properties_by(query, RANGE, class_uri)
}

/// Superclasses of `class_uri` from the immediate parent upwards. Each step takes the
/// smallest IRI parent that is not a meta class; the walk ends at a class without one or
/// at a class already visited.
pub fn superclass_chain<Q: GraphQuery + ?Sized>(
    query: &Q,
    class_uri: &str,
) -> Result<Vec<ResourceLink>> {
    let mut chain = vec![];
    let mut visited: HashSet<String> = HashSet::from([class_uri.to_string()]);
    let mut current = class_uri.to_string();
    loop {
        let parent = query
            .object_iris(&current, SUB_CLASS_OF)?
            .into_iter()
            .filter(|p| !is_excluded_class(p))
            .min();
        let Some(parent) = parent else { break };
        if !visited.insert(parent.clone()) {
            break;
        }
        chain.push(link(query, &parent)?);
        current = parent;
    }
    Ok(chain)
}

/// The properties of a class: those it is the domain of, those inherited along its
/// superclass chain (each property reported once, at the nearest class), and those it is
/// the range of.
pub fn class_properties<Q: GraphQuery + ?Sized>(
    query: &Q,
    class_uri: &str,
) -> Result<ClassProperties> {
    let domain_of = properties_with_domain(query, class_uri)?;
    let mut seen: HashSet<String> = domain_of.iter().map(|p| p.uri.clone()).collect();
    let mut inherited = vec![];
    for ancestor in superclass_chain(query, class_uri)? {
        let properties: Vec<PropertyInfo> = properties_with_domain(query, &ancestor.uri)?
            .into_iter()
            .filter(|p| seen.insert(p.uri.clone()))
            .collect();
        if !properties.is_empty() {
            inherited.push(InheritedProperties {
                from_class: ancestor,
                properties,
            });
        }
    }
    let range_of = properties_with_range(query, class_uri)?;
    debug!(
        "{}: {} direct, {} inherited groups, {} as range",
        class_uri,
        domain_of.len(),
        inherited.len(),
        range_of.len()
    );
    Ok(ClassProperties {
        domain_of,
        inherited,
        range_of,
    })
}
