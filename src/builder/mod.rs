//! Process-wide registry of packages, classes, interfaces, traits and
//! functions.
//!
//! Names are indexed case-insensitively. A name requested before its
//! declaration was parsed gets an unresolved placeholder; the declaration is
//! later reconciled into the same entity, so every reference handed out
//! earlier stays valid.

pub mod entity;
pub mod modifiers;
pub mod package;
pub mod reference;

use std::fmt;
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::ast::Ast;
use crate::cache::{CacheDriver, TOKENS_CATEGORY};
use crate::config::{Config, PackageFilter};
use crate::error::{BuilderError, ConfigError, ParseError};
use crate::lexer::token::Token;
use crate::lexer::{Lexer, TokenStream};
use crate::parser::Parser;

pub use entity::{
    Constant, Declaration, Entity, EntityId, EntityKind, EntityState, EntityVisitor, FileId, Method, Property,
    TraitAlias, TraitPrecedence, TraitUse,
};
pub use modifiers::{ModifierTarget, Modifiers};
pub use package::Package;
pub use reference::TypeRef;

/// One compilation unit handed to [`Builder::parse_source`].
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub id: FileId,
    pub path: String,
    pub source: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        Self { id: FileId::new(), path: path.into(), source: source.into() }
    }
}

pub struct Builder {
    config: Config,
    filter: RwLock<PackageFilter>,
    entities: DashMap<EntityId, Arc<Entity>>,
    /// Lowercased qualified name of classes, interfaces and traits.
    types: DashMap<String, EntityId>,
    functions: DashMap<String, EntityId>,
    packages: DashMap<String, Package>,
    units: DashMap<FileId, Arc<Ast>>,
    cache: Option<Arc<dyn CacheDriver>>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            filter: RwLock::new(PackageFilter::accept_all()),
            entities: DashMap::new(),
            types: DashMap::new(),
            functions: DashMap::new(),
            packages: DashMap::new(),
            units: DashMap::new(),
            cache: None,
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("config", &self.config)
            .field("entities", &self.entities.len())
            .field("packages", &self.packages.len())
            .field("units", &self.units.len())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        let filter = config.package_filter()?;
        Ok(Self { config, filter: RwLock::new(filter), ..Self::default() })
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheDriver>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the package filter. Memoized views depend on it, so all of
    /// them are dropped.
    pub fn set_filter(&self, filter: PackageFilter) {
        *self.filter.write().unwrap_or_else(|e| e.into_inner()) = filter;
        self.invalidate_all();
    }

    pub fn accepts_package(&self, package: &str) -> bool {
        self.filter.read().unwrap_or_else(|e| e.into_inner()).accept(package)
    }

    /// Whether `id` lives in a package the filter lets through.
    pub fn is_accepted(&self, id: EntityId) -> bool {
        match self.entity(id).and_then(|e| e.package()) {
            Some(package) => self.accepts_package(&package),
            None => true,
        }
    }

    fn package_for(&self, namespace: Option<&str>) -> String {
        match namespace {
            Some(ns) if !ns.is_empty() => ns.to_string(),
            _ => self.config.default_package.clone(),
        }
    }

    // Registration

    pub fn register_class(&self, decl: Declaration) -> Result<EntityId, BuilderError> {
        self.register(EntityKind::Class, decl)
    }

    pub fn register_interface(&self, decl: Declaration) -> Result<EntityId, BuilderError> {
        self.register(EntityKind::Interface, decl)
    }

    pub fn register_trait(&self, decl: Declaration) -> Result<EntityId, BuilderError> {
        self.register(EntityKind::Trait, decl)
    }

    pub fn register_function(&self, decl: Declaration) -> Result<EntityId, BuilderError> {
        self.register(EntityKind::Function, decl)
    }

    fn register(&self, kind: EntityKind, mut decl: Declaration) -> Result<EntityId, BuilderError> {
        decl.kind = kind;
        decl.name = decl.name.trim_start_matches('\\').to_string();
        if kind == EntityKind::Interface {
            decl.modifiers |= Modifiers::IMPLICIT_ABSTRACT;
        }
        Self::validate(&decl)?;

        let package = self.package_for(decl.namespace.as_deref());
        let name = decl.name.clone();
        let decl = Arc::new(decl);
        let index = if kind.is_type() { &self.types } else { &self.functions };

        // The entry keeps the name's shard locked until the entity is in place.
        let entity = match index.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(slot) => {
                let id = *slot.get();
                match self.entities.get(&id).map(|e| Arc::clone(e.value())) {
                    Some(entity) => {
                        match entity.state() {
                            EntityState::Unresolved { .. } => {
                                debug!(name = %name, id = %id, "reconciled placeholder with declaration")
                            }
                            EntityState::Declared(_) => warn!(name = %name, id = %id, "redeclared entity"),
                        }
                        entity.set_state(EntityState::Declared(decl));
                        entity.clear_derived();
                        entity
                    }
                    None => {
                        let entity = Arc::new(Entity::new(id, EntityState::Declared(decl)));
                        self.entities.insert(id, Arc::clone(&entity));
                        entity
                    }
                }
            }
            Entry::Vacant(slot) => {
                let entity = Arc::new(Entity::new(EntityId::new(), EntityState::Declared(decl)));
                self.entities.insert(entity.id(), Arc::clone(&entity));
                slot.insert(entity.id());
                entity
            }
        };

        debug!(name = %name, kind = ?kind, package = %package, "registered declaration");
        self.assign_package(&entity, package);
        Ok(entity.id())
    }

    fn validate(decl: &Declaration) -> Result<(), BuilderError> {
        let target = match decl.kind {
            EntityKind::Class => ModifierTarget::Class,
            EntityKind::Interface => ModifierTarget::Interface,
            EntityKind::Trait => ModifierTarget::Trait,
            EntityKind::Function => ModifierTarget::Function,
        };
        target.validate(decl.modifiers)?;
        for method in &decl.methods {
            ModifierTarget::Method.validate(method.modifiers)?;
        }
        for property in &decl.properties {
            ModifierTarget::Field.validate(property.modifiers)?;
        }
        for constant in &decl.constants {
            ModifierTarget::Constant.validate(constant.modifiers)?;
        }
        Ok(())
    }

    /// Entity registered for the class, interface or trait `name`, or a new
    /// unresolved placeholder for it.
    pub fn get_class_or_interface(&self, name: &str) -> EntityId {
        let name = name.trim_start_matches('\\');
        let key = name.to_ascii_lowercase();
        if let Some(id) = self.types.get(&key).map(|r| *r.value()) {
            return id;
        }

        let entity = match self.types.entry(key) {
            Entry::Occupied(slot) => return *slot.get(),
            Entry::Vacant(slot) => {
                let state = EntityState::Unresolved { name: name.to_string() };
                let entity = Arc::new(Entity::new(EntityId::new(), state));
                self.entities.insert(entity.id(), Arc::clone(&entity));
                slot.insert(entity.id());
                entity
            }
        };

        trace!(name, id = %entity.id(), "created placeholder");
        self.assign_package(&entity, self.package_for(package::namespace_of(name)));
        entity.id()
    }

    fn assign_package(&self, entity: &Entity, package: String) {
        let previous = entity.set_package(Some(package.clone()));
        if previous.as_deref() == Some(package.as_str()) {
            return;
        }
        if let Some(previous) = previous {
            if let Some(mut old) = self.packages.get_mut(&previous) {
                old.members.shift_remove(&entity.id());
            }
        }
        self.packages
            .entry(package.clone())
            .or_insert_with(|| Package::new(package))
            .members
            .insert(entity.id());
    }

    /// Moves `id` into `package`, removing it from its previous package.
    pub fn reassign_package(&self, id: EntityId, package: &str) -> Result<(), BuilderError> {
        let entity = self.entity(id).ok_or(BuilderError::UnknownEntity(id))?;
        self.assign_package(&entity, package.to_string());
        self.invalidate_all();
        Ok(())
    }

    /// Removes `id` from the name indexes and its package. References that
    /// already resolved to it keep the stale id.
    pub fn unregister(&self, id: EntityId) -> Result<Arc<Entity>, BuilderError> {
        let (_, entity) = self.entities.remove(&id).ok_or(BuilderError::UnknownEntity(id))?;
        let key = entity.name().to_ascii_lowercase();
        self.types.remove_if(&key, |_, v| *v == id);
        self.functions.remove_if(&key, |_, v| *v == id);
        if let Some(package) = entity.set_package(None) {
            if let Some(mut members) = self.packages.get_mut(&package) {
                members.members.shift_remove(&id);
            }
        }
        entity.clear_derived();
        debug!(name = %entity.name(), id = %id, "unregistered entity");
        Ok(entity)
    }

    /// Drops the memoized views of one entity. Dependents are not touched.
    pub fn invalidate(&self, id: EntityId) {
        if let Some(entity) = self.entity(id) {
            trace!(id = %id, "invalidated derived views");
            entity.clear_derived();
        }
    }

    pub fn invalidate_all(&self) {
        for entity in self.entities.iter() {
            entity.value().clear_derived();
        }
    }

    // Lookup

    pub fn entity(&self, id: EntityId) -> Option<Arc<Entity>> {
        self.entities.get(&id).map(|e| Arc::clone(e.value()))
    }

    pub fn declaration(&self, id: EntityId) -> Option<Arc<Declaration>> {
        self.entity(id).and_then(|e| e.declaration())
    }

    pub fn entities(&self) -> Vec<Arc<Entity>> {
        self.entities.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Class, interface or trait registered under `name` (placeholders included).
    pub fn find_type(&self, name: &str) -> Option<EntityId> {
        let key = name.trim_start_matches('\\').to_ascii_lowercase();
        self.types.get(&key).map(|r| *r.value())
    }

    pub fn find_function(&self, name: &str) -> Option<EntityId> {
        let key = name.trim_start_matches('\\').to_ascii_lowercase();
        self.functions.get(&key).map(|r| *r.value())
    }

    pub fn packages(&self) -> Vec<Package> {
        let mut packages: Vec<Package> = self.packages.iter().map(|p| p.value().clone()).collect();
        packages.sort_by(|a, b| a.name.cmp(&b.name));
        packages
    }

    pub fn package(&self, name: &str) -> Option<Package> {
        self.packages.get(name).map(|p| p.value().clone())
    }

    // Compilation units and tokens

    pub fn store_unit(&self, file: FileId, ast: Arc<Ast>) {
        self.units.insert(file, ast);
    }

    pub fn unit(&self, file: FileId) -> Option<Arc<Ast>> {
        self.units.get(&file).map(|u| Arc::clone(u.value()))
    }

    fn token_cache_enabled(&self) -> bool {
        self.cache.is_some() && self.config.cache_tokens
    }

    pub(crate) fn store_tokens(&self, key: &str, tokens: &[Token]) {
        let Some(cache) = self.cache.as_ref().filter(|_| self.config.cache_tokens) else {
            return;
        };
        match serde_json::to_vec(tokens) {
            Ok(blob) => cache.category(TOKENS_CATEGORY).store(key, blob),
            Err(err) => warn!(key, error = %err, "failed to serialize tokens"),
        }
    }

    fn restore_tokens(&self, key: &str) -> Option<Vec<Token>> {
        let cache = self.cache.as_ref()?;
        let blob = cache.category(TOKENS_CATEGORY).restore(key)?;
        match serde_json::from_slice(&blob) {
            Ok(tokens) => Some(tokens),
            Err(err) => {
                warn!(key, error = %err, "discarding unreadable cached tokens");
                None
            }
        }
    }

    /// Token list of a declaration, restored from the cache.
    pub fn tokens(&self, id: EntityId) -> Option<Vec<Token>> {
        self.restore_tokens(&id.to_string())
    }

    /// Token list of a whole compilation unit, restored from the cache.
    pub fn unit_tokens(&self, file: FileId) -> Option<Vec<Token>> {
        self.restore_tokens(&file.to_string())
    }

    // Parsing

    /// Parses one compilation unit, registering its declarations. Cached
    /// tokens for the file id are reused instead of lexing again.
    pub fn parse_source(&self, file: &SourceFile) -> Result<Arc<Ast>, ParseError> {
        debug!(path = %file.path, "parsing compilation unit");
        let cached = if self.token_cache_enabled() { self.unit_tokens(file.id) } else { None };
        let tokens = match cached {
            Some(tokens) => {
                trace!(path = %file.path, "reusing cached tokens");
                tokens
            }
            None => {
                let tokens = Lexer::tokenize(&file.source);
                self.store_tokens(&file.id.to_string(), &tokens);
                tokens
            }
        };

        let stream = TokenStream::new(tokens);
        let ast = Parser::new(&stream, self).with_file(&file.path, file.id).parse()?;
        let ast = Arc::new(ast);
        self.store_unit(file.id, Arc::clone(&ast));
        debug!(path = %file.path, nodes = ast.len(), "parsed compilation unit");
        Ok(ast)
    }

    /// Parses independent units in parallel against this registry.
    pub fn parse_all(&self, files: &[SourceFile]) -> Vec<Result<Arc<Ast>, ParseError>> {
        files.par_iter().map(|file| self.parse_source(file)).collect()
    }
}
