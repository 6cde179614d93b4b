use thiserror::Error;

use crate::ast::NodeId;
use crate::builder::EntityId;

/// Raised when a modifier set is not valid for a declaration kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModifierError {
    pub kind: &'static str,
    pub message: String,
}

impl ModifierError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unexpected token: {image}, line: {line}, col: {column}, file: {file}.")]
    UnexpectedToken { image: String, line: u32, column: u32, file: String },
    #[error("Unexpected end of token stream in file: {file}.")]
    TokenStreamEnd { file: String },
    #[error("{message}, line: {line}, col: {column}, file: {file}.")]
    InvalidState { line: u32, column: u32, file: String, message: String },
    #[error(transparent)]
    InvalidModifiers(#[from] ModifierError),
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("Interface {name} cannot declare a parent class.")]
    InterfaceParentClass { name: String },
    #[error(transparent)]
    InvalidModifiers(#[from] ModifierError),
    #[error("No entity registered with id {0}.")]
    UnknownEntity(EntityId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Type {name} is part of an endless inheritance hierarchy")]
    RecursiveInheritance { name: String },
    #[error("Trait method {method} has not been applied, because there are collisions with other trait methods on {name}.")]
    MethodCollision { method: String, name: String },
    #[error(transparent)]
    Builder(#[from] BuilderError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AstError {
    #[error("No node at child index {index}, node has {count} children.")]
    ChildOutOfRange { index: usize, count: usize },
    #[error("Unknown node {0:?}.")]
    UnknownNode(NodeId),
    #[error("Invalid node snapshot: {0}")]
    Snapshot(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid package pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
