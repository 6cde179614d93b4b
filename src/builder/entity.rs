use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ast::NodeId;
use crate::builder::modifiers::Modifiers;
use crate::builder::reference::TypeRef;
use crate::error::BuilderError;
use crate::resolve::{ResolvedConstant, ResolvedMethod};
use crate::span::Span;

macro_rules! define_uuid_id {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub const fn uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

define_uuid_id!(EntityId);
define_uuid_id!(FileId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Class,
    Interface,
    Trait,
    Function,
}

impl EntityKind {
    pub fn is_type(&self) -> bool {
        !matches!(self, EntityKind::Function)
    }
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub modifiers: Modifiers,
    pub comment: Option<String>,
    pub span: Span,
    pub node: Option<NodeId>,
    /// Types named by the signature and by `new`, `instanceof`, `catch` and
    /// static member access in the body.
    pub dependencies: Vec<Arc<TypeRef>>,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub modifiers: Modifiers,
    pub comment: Option<String>,
    pub span: Span,
    pub type_ref: Option<Arc<TypeRef>>,
}

#[derive(Debug, Clone)]
pub struct Constant {
    pub name: String,
    pub modifiers: Modifiers,
    pub comment: Option<String>,
    pub span: Span,
}

/// `Trait::method as [visibility] [alias]`.
#[derive(Debug, Clone)]
pub struct TraitAlias {
    pub trait_ref: Option<Arc<TypeRef>>,
    pub method: String,
    pub new_name: Option<String>,
    pub visibility: Option<Modifiers>,
}

/// `Trait::method insteadof Other, ...`.
#[derive(Debug, Clone)]
pub struct TraitPrecedence {
    pub trait_ref: Arc<TypeRef>,
    pub method: String,
    pub insteadof: Vec<Arc<TypeRef>>,
}

#[derive(Debug, Clone, Default)]
pub struct TraitUse {
    pub traits: Vec<Arc<TypeRef>>,
    pub aliases: Vec<TraitAlias>,
    pub precedences: Vec<TraitPrecedence>,
}

/// Everything a parsed class, interface, trait or function declares.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: EntityKind,
    /// Fully qualified name without a leading `\`.
    pub name: String,
    pub namespace: Option<String>,
    pub modifiers: Modifiers,
    pub comment: Option<String>,
    pub file: Option<FileId>,
    pub span: Span,
    pub node: Option<NodeId>,
    parent: Option<Arc<TypeRef>>,
    pub interfaces: Vec<Arc<TypeRef>>,
    pub trait_uses: Vec<TraitUse>,
    pub methods: Vec<Method>,
    pub properties: Vec<Property>,
    pub constants: Vec<Constant>,
    /// References outside of methods: property types, functions' own
    /// signature and body references.
    pub dependencies: Vec<Arc<TypeRef>>,
    /// Inclusive index range into the unit's significant tokens.
    pub token_range: Option<(usize, usize)>,
}

impl Declaration {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        let modifiers = match kind {
            EntityKind::Interface => Modifiers::IMPLICIT_ABSTRACT,
            _ => Modifiers::empty(),
        };
        Self {
            kind,
            name: name.into(),
            namespace: None,
            modifiers,
            comment: None,
            file: None,
            span: Span::default(),
            node: None,
            parent: None,
            interfaces: Vec::new(),
            trait_uses: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            constants: Vec::new(),
            dependencies: Vec::new(),
            token_range: None,
        }
    }

    /// Short name, without the namespace.
    pub fn local_name(&self) -> &str {
        self.name.rsplit('\\').next().unwrap_or(&self.name)
    }

    pub fn parent(&self) -> Option<&Arc<TypeRef>> {
        self.parent.as_ref()
    }

    /// Interfaces never extend a class; asking them to is a contract violation.
    pub fn set_parent(&mut self, parent: Arc<TypeRef>) -> Result<(), BuilderError> {
        if self.kind == EntityKind::Interface {
            return Err(BuilderError::InterfaceParentClass { name: self.name.clone() });
        }
        self.parent = Some(parent);
        Ok(())
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.contains(Modifiers::FINAL)
    }
}

#[derive(Debug, Clone)]
pub enum EntityState {
    /// Referenced by name before (or without) a declaration being parsed.
    Unresolved { name: String },
    Declared(Arc<Declaration>),
}

/// Memoized derived views of one entity.
#[derive(Debug, Default)]
pub(crate) struct DerivedCache {
    pub all_methods: Option<Arc<IndexMap<String, ResolvedMethod>>>,
    pub all_constants: Option<Arc<IndexMap<String, ResolvedConstant>>>,
    pub interfaces: Option<Arc<Vec<EntityId>>>,
    pub dependencies: Option<Arc<Vec<EntityId>>>,
}

/// Registry slot for a class, interface, trait or function. The id is stable
/// across placeholder reconciliation and redeclaration.
#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    state: RwLock<EntityState>,
    package: RwLock<Option<String>>,
    derived: Mutex<DerivedCache>,
}

impl Entity {
    pub(crate) fn new(id: EntityId, state: EntityState) -> Self {
        Self {
            id,
            state: RwLock::new(state),
            package: RwLock::new(None),
            derived: Mutex::new(DerivedCache::default()),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_state(&self, state: EntityState) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub fn declaration(&self) -> Option<Arc<Declaration>> {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            EntityState::Declared(decl) => Some(Arc::clone(decl)),
            EntityState::Unresolved { .. } => None,
        }
    }

    pub fn name(&self) -> String {
        match &*self.state.read().unwrap_or_else(|e| e.into_inner()) {
            EntityState::Declared(decl) => decl.name.clone(),
            EntityState::Unresolved { name } => name.clone(),
        }
    }

    /// `None` for placeholders.
    pub fn kind(&self) -> Option<EntityKind> {
        self.declaration().map(|d| d.kind)
    }

    pub fn is_resolved(&self) -> bool {
        self.declaration().is_some()
    }

    pub fn package(&self) -> Option<String> {
        self.package.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn set_package(&self, package: Option<String>) -> Option<String> {
        std::mem::replace(&mut *self.package.write().unwrap_or_else(|e| e.into_inner()), package)
    }

    pub(crate) fn clear_derived(&self) {
        *self.derived.lock().unwrap_or_else(|e| e.into_inner()) = DerivedCache::default();
    }

    pub(crate) fn read_derived<T>(&self, read: impl FnOnce(&DerivedCache) -> Option<T>) -> Option<T> {
        read(&self.derived.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub(crate) fn update_derived(&self, write: impl FnOnce(&mut DerivedCache)) {
        write(&mut self.derived.lock().unwrap_or_else(|e| e.into_inner()));
    }

    pub fn accept<V: EntityVisitor + ?Sized>(&self, visitor: &mut V) -> V::Output {
        match self.declaration() {
            Some(decl) => match decl.kind {
                EntityKind::Class => visitor.visit_class(self, &decl),
                EntityKind::Interface => visitor.visit_interface(self, &decl),
                EntityKind::Trait => visitor.visit_trait(self, &decl),
                EntityKind::Function => visitor.visit_function(self, &decl),
            },
            None => visitor.visit_unresolved(self, &self.name()),
        }
    }
}

/// One operation per entity kind, mirroring the AST [`crate::ast::visitor::Visitor`].
pub trait EntityVisitor {
    type Output;

    fn visit_class(&mut self, entity: &Entity, decl: &Declaration) -> Self::Output;
    fn visit_interface(&mut self, entity: &Entity, decl: &Declaration) -> Self::Output;
    fn visit_trait(&mut self, entity: &Entity, decl: &Declaration) -> Self::Output;
    fn visit_function(&mut self, entity: &Entity, decl: &Declaration) -> Self::Output;
    fn visit_unresolved(&mut self, entity: &Entity, name: &str) -> Self::Output;
}
