use std::sync::OnceLock;

use crate::builder::{Builder, EntityId};
use crate::span::Span;

/// Symbolic class-or-interface name found in source, shared between the AST
/// node that spells it and the declaration that depends on it.
///
/// The first call to [`TypeRef::resolve`] asks the builder for the entity and
/// memoizes the answer for the lifetime of the reference.
#[derive(Debug)]
pub struct TypeRef {
    name: String,
    span: Span,
    target: OnceLock<EntityId>,
}

impl TypeRef {
    /// `name` is the fully qualified name without a leading `\`.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { name: name.into(), span, target: OnceLock::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn resolve(&self, builder: &Builder) -> EntityId {
        *self.target.get_or_init(|| builder.get_class_or_interface(&self.name))
    }

    /// Target if this reference was already resolved.
    pub fn resolved(&self) -> Option<EntityId> {
        self.target.get().copied()
    }
}
