//! Structure resolution for RDF ontologies: entity classification, class hierarchies, code
//! list detection, namespace composition, property details and prefix formatting.

pub mod api;
pub mod codelist;
pub mod composition;
pub mod config;
pub mod consts;
pub mod entity;
pub mod errors;
pub mod extract;
pub mod hierarchy;
pub mod prefix;
pub mod properties;
pub mod query;
pub mod store;

pub use api::{init_logging, OntologyBrowser};
pub use config::OntologyConfig;
