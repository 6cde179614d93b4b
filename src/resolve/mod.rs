//! Derived views over the registry: inheritance chains, flattened member
//! sets, the subtype relation and declaration dependencies.
//!
//! Views are computed on demand and memoized per entity. Failed computations
//! are never memoized.

mod traits;

use std::collections::HashSet;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::{trace, warn};

use crate::builder::{Builder, Declaration, Entity, EntityId, EntityKind, Modifiers};
use crate::error::{BuilderError, ResolveError};

/// Where a member of a flattened member set came from, relative to the
/// entity that was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberOrigin {
    Own,
    Trait,
    Parent,
    Interface,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// Name the method is visible under; differs from `original_name` for
    /// trait aliases.
    pub name: String,
    pub original_name: String,
    pub modifiers: Modifiers,
    /// Entity whose declaration contains the method body.
    pub declaring: EntityId,
    pub origin: MemberOrigin,
}

impl ResolvedMethod {
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(Modifiers::STATIC)
    }

    pub fn visibility(&self) -> Modifiers {
        self.modifiers.effective_visibility()
    }

    fn with_origin(&self, origin: MemberOrigin) -> ResolvedMethod {
        ResolvedMethod { origin, ..self.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConstant {
    pub name: String,
    pub modifiers: Modifiers,
    pub declaring: EntityId,
    pub origin: MemberOrigin,
}

pub(crate) fn recursive(name: impl Into<String>) -> ResolveError {
    let name = name.into();
    warn!(name = %name, "inheritance cycle detected");
    ResolveError::RecursiveInheritance { name }
}

impl Builder {
    fn require(&self, id: EntityId) -> Result<Arc<Entity>, ResolveError> {
        self.entity(id).ok_or(ResolveError::Builder(BuilderError::UnknownEntity(id)))
    }

    fn name_of(&self, id: EntityId) -> String {
        self.entity(id).map(|e| e.name()).unwrap_or_else(|| id.to_string())
    }

    /// Parent as written, resolved but not filtered.
    fn declared_parent(&self, id: EntityId) -> Option<EntityId> {
        let decl = self.declaration(id)?;
        decl.parent().map(|parent| parent.resolve(self))
    }

    /// Parent class of `id`; `None` when there is none or its package is
    /// filtered out.
    pub fn parent_class(&self, id: EntityId) -> Result<Option<EntityId>, ResolveError> {
        Ok(self.parent_classes(id)?.first().copied())
    }

    /// Parent chain of `id`, nearest first. Stops at the first filtered parent.
    pub fn parent_classes(&self, id: EntityId) -> Result<Vec<EntityId>, ResolveError> {
        self.require(id)?;
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.declared_parent(current) {
            if !seen.insert(parent) {
                return Err(recursive(self.name_of(parent)));
            }
            if !self.is_accepted(parent) {
                trace!(parent = %parent, "parent filtered out");
                break;
            }
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Interfaces implemented directly, through extended interfaces and
    /// through parent classes. Deduplicated, declaration order.
    pub fn interfaces(&self, id: EntityId) -> Result<Vec<EntityId>, ResolveError> {
        let entity = self.require(id)?;
        if let Some(cached) = entity.read_derived(|c| c.interfaces.clone()) {
            return Ok(cached.as_ref().clone());
        }
        let interfaces = self.collect_interfaces(id, &mut Vec::new())?;
        let interfaces: Arc<Vec<EntityId>> = Arc::new(interfaces.into_iter().collect());
        entity.update_derived(|c| c.interfaces = Some(Arc::clone(&interfaces)));
        Ok(interfaces.as_ref().clone())
    }

    fn collect_interfaces(&self, id: EntityId, path: &mut Vec<EntityId>) -> Result<IndexSet<EntityId>, ResolveError> {
        if path.contains(&id) {
            return Err(recursive(self.name_of(id)));
        }
        let Some(decl) = self.declaration(id) else {
            return Ok(IndexSet::new());
        };

        path.push(id);
        let mut found = IndexSet::new();
        let result = (|| -> Result<(), ResolveError> {
            for reference in &decl.interfaces {
                let interface = reference.resolve(self);
                if !self.is_accepted(interface) {
                    continue;
                }
                found.insert(interface);
                found.extend(self.collect_interfaces(interface, path)?);
            }
            if decl.kind == EntityKind::Class {
                if let Some(parent) = self.parent_class(id)? {
                    found.extend(self.collect_interfaces(parent, path)?);
                }
            }
            Ok(())
        })();
        path.pop();
        result.map(|()| found)
    }

    /// Every method visible on `id`, keyed by lowercased name.
    ///
    /// Later sources overwrite earlier ones: interface methods, then the
    /// parent's methods, then trait methods, then the entity's own methods.
    pub fn all_methods(&self, id: EntityId) -> Result<Arc<IndexMap<String, ResolvedMethod>>, ResolveError> {
        self.all_methods_inner(id, &mut Vec::new())
    }

    pub(crate) fn all_methods_inner(
        &self,
        id: EntityId,
        path: &mut Vec<EntityId>,
    ) -> Result<Arc<IndexMap<String, ResolvedMethod>>, ResolveError> {
        let entity = self.require(id)?;
        if let Some(cached) = entity.read_derived(|c| c.all_methods.clone()) {
            return Ok(cached);
        }
        if path.contains(&id) {
            return Err(recursive(entity.name()));
        }

        path.push(id);
        let result = match entity.declaration() {
            Some(decl) => self.compute_all_methods(id, &decl, path),
            None => Ok(IndexMap::new()),
        };
        path.pop();

        let methods = Arc::new(result?);
        entity.update_derived(|c| c.all_methods = Some(Arc::clone(&methods)));
        Ok(methods)
    }

    fn compute_all_methods(
        &self,
        id: EntityId,
        decl: &Declaration,
        path: &mut Vec<EntityId>,
    ) -> Result<IndexMap<String, ResolvedMethod>, ResolveError> {
        let mut methods = IndexMap::new();

        match decl.kind {
            EntityKind::Function => return Ok(methods),
            EntityKind::Class | EntityKind::Interface => {
                for reference in &decl.interfaces {
                    let interface = reference.resolve(self);
                    if !self.is_accepted(interface) {
                        continue;
                    }
                    for (key, method) in self.all_methods_inner(interface, path)?.iter() {
                        methods.insert(key.clone(), method.with_origin(MemberOrigin::Interface));
                    }
                }
            }
            EntityKind::Trait => {}
        }

        if decl.kind == EntityKind::Class {
            if let Some(parent) = self.parent_class(id)? {
                for (key, method) in self.all_methods_inner(parent, path)?.iter() {
                    methods.insert(key.clone(), method.with_origin(MemberOrigin::Parent));
                }
            }
        }

        for (key, method) in self.trait_methods(decl, path)? {
            // An abstract trait method is satisfied by an inherited body.
            let keeps_inherited = method.is_abstract() && methods.get(&key).is_some_and(|m| !m.is_abstract());
            if !keeps_inherited {
                methods.insert(key, method);
            }
        }

        for method in &decl.methods {
            let mut modifiers = method.modifiers;
            if decl.kind == EntityKind::Interface {
                modifiers |= Modifiers::IMPLICIT_ABSTRACT;
            }
            methods.insert(
                method.name.to_ascii_lowercase(),
                ResolvedMethod {
                    name: method.name.clone(),
                    original_name: method.name.clone(),
                    modifiers,
                    declaring: id,
                    origin: MemberOrigin::Own,
                },
            );
        }

        Ok(methods)
    }

    /// Every constant visible on `id`: own constants over trait constants over
    /// the parent's over the interfaces'.
    pub fn all_constants(&self, id: EntityId) -> Result<Arc<IndexMap<String, ResolvedConstant>>, ResolveError> {
        self.all_constants_inner(id, &mut Vec::new())
    }

    fn all_constants_inner(
        &self,
        id: EntityId,
        path: &mut Vec<EntityId>,
    ) -> Result<Arc<IndexMap<String, ResolvedConstant>>, ResolveError> {
        let entity = self.require(id)?;
        if let Some(cached) = entity.read_derived(|c| c.all_constants.clone()) {
            return Ok(cached);
        }
        if path.contains(&id) {
            return Err(recursive(entity.name()));
        }

        path.push(id);
        let result = match entity.declaration() {
            Some(decl) => self.compute_all_constants(id, &decl, path),
            None => Ok(IndexMap::new()),
        };
        path.pop();

        let constants = Arc::new(result?);
        entity.update_derived(|c| c.all_constants = Some(Arc::clone(&constants)));
        Ok(constants)
    }

    fn compute_all_constants(
        &self,
        id: EntityId,
        decl: &Declaration,
        path: &mut Vec<EntityId>,
    ) -> Result<IndexMap<String, ResolvedConstant>, ResolveError> {
        let mut constants = IndexMap::new();
        if decl.kind == EntityKind::Function {
            return Ok(constants);
        }

        let mut overlay = |source: &IndexMap<String, ResolvedConstant>, origin: MemberOrigin| {
            for (name, constant) in source {
                constants.insert(name.clone(), ResolvedConstant { origin, ..constant.clone() });
            }
        };

        for reference in &decl.interfaces {
            let interface = reference.resolve(self);
            if self.is_accepted(interface) {
                overlay(&*self.all_constants_inner(interface, path)?, MemberOrigin::Interface);
            }
        }
        if decl.kind == EntityKind::Class {
            if let Some(parent) = self.parent_class(id)? {
                overlay(&*self.all_constants_inner(parent, path)?, MemberOrigin::Parent);
            }
        }
        for trait_use in &decl.trait_uses {
            for reference in &trait_use.traits {
                let used = reference.resolve(self);
                overlay(&*self.all_constants_inner(used, path)?, MemberOrigin::Trait);
            }
        }
        for constant in &decl.constants {
            constants.insert(
                constant.name.clone(),
                ResolvedConstant {
                    name: constant.name.clone(),
                    modifiers: constant.modifiers,
                    declaring: id,
                    origin: MemberOrigin::Own,
                },
            );
        }
        Ok(constants)
    }

    /// Reflexive, transitive subtype test over parent classes and
    /// implemented or extended interfaces.
    pub fn is_subtype_of(&self, id: EntityId, other: EntityId) -> Result<bool, ResolveError> {
        self.require(id)?;
        self.require(other)?;
        self.subtype_search(id, other, &mut Vec::new(), &mut HashSet::new())
    }

    fn subtype_search(
        &self,
        id: EntityId,
        other: EntityId,
        path: &mut Vec<EntityId>,
        visited: &mut HashSet<EntityId>,
    ) -> Result<bool, ResolveError> {
        if id == other {
            return Ok(true);
        }
        if path.contains(&id) {
            return Err(recursive(self.name_of(id)));
        }
        if !visited.insert(id) {
            return Ok(false);
        }
        let Some(decl) = self.declaration(id) else {
            return Ok(false);
        };

        let mut supertypes = Vec::new();
        if let Some(parent) = decl.parent() {
            supertypes.push(parent.resolve(self));
        }
        supertypes.extend(decl.interfaces.iter().map(|i| i.resolve(self)));

        path.push(id);
        for supertype in supertypes {
            if !self.is_accepted(supertype) {
                continue;
            }
            match self.subtype_search(supertype, other, path, visited) {
                Ok(false) => {}
                found => {
                    path.pop();
                    return found;
                }
            }
        }
        path.pop();
        Ok(false)
    }

    /// Other entities the declaration of `id` references by name: parent,
    /// interfaces, used traits, property types, and everything its methods
    /// (or, for functions, its own signature and body) reference.
    pub fn dependencies(&self, id: EntityId) -> Result<Vec<EntityId>, ResolveError> {
        let entity = self.require(id)?;
        if let Some(cached) = entity.read_derived(|c| c.dependencies.clone()) {
            return Ok(cached.as_ref().clone());
        }
        let Some(decl) = entity.declaration() else {
            return Ok(Vec::new());
        };

        let references = decl
            .parent()
            .into_iter()
            .chain(&decl.interfaces)
            .chain(decl.trait_uses.iter().flat_map(|u| &u.traits))
            .chain(decl.properties.iter().filter_map(|p| p.type_ref.as_ref()))
            .chain(&decl.dependencies)
            .chain(decl.methods.iter().flat_map(|m| &m.dependencies));

        let mut found = IndexSet::new();
        for reference in references {
            let target = reference.resolve(self);
            if target != id && self.is_accepted(target) {
                found.insert(target);
            }
        }

        let dependencies: Arc<Vec<EntityId>> = Arc::new(found.into_iter().collect());
        entity.update_derived(|c| c.dependencies = Some(Arc::clone(&dependencies)));
        Ok(dependencies.as_ref().clone())
    }

    /// Entities referenced by one method of `id`.
    pub fn method_dependencies(&self, id: EntityId, method: &str) -> Result<Vec<EntityId>, ResolveError> {
        self.require(id)?;
        let Some(method) = self.declaration(id).and_then(|d| d.method(method).cloned()) else {
            return Ok(Vec::new());
        };
        let found: IndexSet<EntityId> = method
            .dependencies
            .iter()
            .map(|r| r.resolve(self))
            .filter(|target| *target != id && self.is_accepted(*target))
            .collect();
        Ok(found.into_iter().collect())
    }
}
