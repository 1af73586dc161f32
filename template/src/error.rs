//! Errors raised while instantiating, checking and resolving resource graphs

use thiserror::Error;

/// What kind of name two declarations are fighting over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionScope {
    /// Logical name of a resource node within one graph
    Node,

    /// Export name, within a graph or across a deployment batch
    Export,

    /// Stack name within a deployment batch
    Stack,

    /// Name a resource gets in AWS, e.g. an ECR repository or a Glue database
    PhysicalName,
}

impl std::fmt::Display for CollisionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let str = match self {
            CollisionScope::Node => "logical name",
            CollisionScope::Export => "export name",
            CollisionScope::Stack => "stack name",
            CollisionScope::PhysicalName => "resource name",
        };

        write!(f, "{str}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A required parameter is missing, or a value fails validation
    #[error("Invalid parameter \"{field}\" for template {template}: {reason}")]
    Parameter {
        template: String,
        field: String,
        reason: String,
    },

    /// A cross-graph placeholder has no value in the exports map
    #[error(
        "Missing export \"{export}\" referenced by {graph}/{node} (property {property})"
    )]
    MissingExport {
        graph: String,
        node: String,
        property: String,
        export: String,
    },

    /// Resource edges loop back on themselves
    #[error("Cycle in {graph}: {}", path.join(" -> "))]
    Cycle { graph: String, path: Vec<String> },

    /// Two declarations resolve to the same name
    #[error("Duplicate {scope} \"{name}\": declared by {first} and by {second}")]
    NameCollision {
        scope: CollisionScope,
        name: String,
        first: String,
        second: String,
    },

    /// An intrinsic points to a node the graph does not contain
    #[error("{graph}/{node} references unknown resource \"{target}\" (property {property})")]
    DanglingReference {
        graph: String,
        node: String,
        property: String,
        target: String,
    },

    #[error("Unknown template \"{0}\"")]
    UnknownTemplate(String),
}

impl Error {
    pub(crate) fn parameter(template: &str, field: &str, reason: impl Into<String>) -> Self {
        Error::Parameter {
            template: template.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// The parameter name for `Parameter` errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Parameter { field, .. } => Some(field),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
