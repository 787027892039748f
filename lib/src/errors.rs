// Query and store errors

use std::fmt;

/// A failure of the graph query layer. Raised by `GraphQuery` implementations and
/// passed through the engine untouched.
#[derive(Debug)]
pub struct QueryError {
    pub pattern: String,
    pub message: String,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Query {} failed: {}", self.pattern, self.message)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug)]
pub struct UnknownOntologyError {
    pub id: String,
}

impl fmt::Display for UnknownOntologyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "No ontology loaded with id {}", self.id)
    }
}

impl std::error::Error for UnknownOntologyError {}
