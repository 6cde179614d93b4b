use std::sync::Arc;

use php_depend::builder::{Declaration, Entity, EntityVisitor};
use php_depend::cache::MemoryCache;
use php_depend::lexer::token::TokenKind;
use php_depend::{Builder, Config, EntityKind, SourceFile};

fn parse_into(builder: &Builder, path: &str, source: &str) {
    builder.parse_source(&SourceFile::new(path, source)).unwrap();
}

#[test]
fn placeholder_is_reconciled_with_later_declaration() {
    let builder = Builder::new();
    let placeholder = builder.get_class_or_interface("\\App\\Model");
    assert!(!builder.entity(placeholder).unwrap().is_resolved());
    assert_eq!(builder.entity(placeholder).unwrap().kind(), None);

    parse_into(&builder, "model.php", "<?php namespace App; class Model {}");

    assert_eq!(builder.find_type("app\\model"), Some(placeholder));
    let entity = builder.entity(placeholder).unwrap();
    assert!(entity.is_resolved());
    assert_eq!(entity.kind(), Some(EntityKind::Class));
    assert_eq!(entity.name(), "App\\Model");
}

#[test]
fn type_reference_resolves_once_on_demand() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php class A extends B {}");
    let a = builder.find_type("A").unwrap();
    let decl = builder.declaration(a).unwrap();
    let parent = decl.parent().unwrap();
    assert_eq!(parent.name(), "B");
    assert_eq!(parent.resolved(), None);

    let target = builder.parent_class(a).unwrap().unwrap();
    assert_eq!(parent.resolved(), Some(target));
    assert_eq!(parent.resolve(&builder), target);
    assert!(!builder.entity(target).unwrap().is_resolved());

    parse_into(&builder, "b.php", "<?php class B {}");
    assert_eq!(builder.find_type("B"), Some(target));
    assert!(builder.entity(target).unwrap().is_resolved());
}

#[test]
fn entities_land_in_namespace_packages() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php namespace Foo\\Bar; class Baz {} function helper() {}");
    parse_into(&builder, "b.php", "<?php interface Plain {}");

    let baz = builder.find_type("Foo\\Bar\\Baz").unwrap();
    let helper = builder.find_function("Foo\\Bar\\helper").unwrap();
    let plain = builder.find_type("Plain").unwrap();

    assert_eq!(builder.entity(baz).unwrap().package().as_deref(), Some("Foo\\Bar"));
    assert!(builder.package("Foo\\Bar").unwrap().contains(helper));
    assert!(builder.package("+global").unwrap().contains(plain));
    let names: Vec<String> = builder.packages().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["+global", "Foo\\Bar"]);
}

#[test]
fn ignored_packages_hide_parents() {
    let config = Config { ignore_packages: vec!["Vendor*".into()], ..Default::default() };
    let builder = Builder::with_config(config).unwrap();
    parse_into(&builder, "base.php", "<?php namespace Vendor\\Lib; class Base {}");
    parse_into(&builder, "child.php", "<?php namespace App; class Child extends \\Vendor\\Lib\\Base {}");

    let child = builder.find_type("App\\Child").unwrap();
    assert_eq!(builder.parent_class(child).unwrap(), None);
    assert!(builder.dependencies(child).unwrap().is_empty());
    assert!(!builder.accepts_package("Vendor\\Lib"));
    assert!(builder.accepts_package("App"));
}

#[test]
fn config_loads_from_json() {
    let config = Config::from_json_str(r#"{"ignore_packages": ["Tests*"], "cache_tokens": false}"#).unwrap();
    assert_eq!(config.default_package, "+global");
    assert!(!config.cache_tokens);
    assert!(Builder::with_config(config).is_ok());
    assert!(Config::from_json_str(r#"{"ignore_packages": 3}"#).is_err());
}

#[test]
fn parse_all_links_units_parsed_in_parallel() {
    let builder = Builder::new();
    let files = vec![
        SourceFile::new("a.php", "<?php class A extends B {}"),
        SourceFile::new("b.php", "<?php class B implements I {}"),
        SourceFile::new("i.php", "<?php interface I {}"),
    ];
    let results = builder.parse_all(&files);
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(builder.len(), 3);

    let a = builder.find_type("A").unwrap();
    let i = builder.find_type("I").unwrap();
    assert_eq!(builder.parent_class(a).unwrap(), builder.find_type("B"));
    assert!(builder.is_subtype_of(a, i).unwrap());
    for file in &files {
        assert!(builder.unit(file.id).is_some());
    }
}

#[test]
fn token_lists_are_cached_per_declaration_and_unit() {
    let builder = Builder::new().with_cache(Arc::new(MemoryCache::new()));
    let file = SourceFile::new("a.php", "<?php class A {}");
    let first = builder.parse_source(&file).unwrap();

    let a = builder.find_type("A").unwrap();
    let kinds: Vec<TokenKind> = builder.tokens(a).unwrap().into_iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![TokenKind::Class, TokenKind::Identifier, TokenKind::OpenBrace, TokenKind::CloseBrace]
    );
    assert!(builder.unit_tokens(file.id).is_some());

    // A second pass reuses the cached unit tokens and yields the same tree.
    let again = builder.parse_source(&file).unwrap();
    assert_eq!(builder.find_type("A"), Some(a));
    assert_eq!(again.len(), first.len());
}

#[test]
fn token_cache_is_off_without_driver() {
    let builder = Builder::new();
    let file = SourceFile::new("a.php", "<?php function f() {}");
    builder.parse_source(&file).unwrap();
    assert!(builder.tokens(builder.find_function("f").unwrap()).is_none());
    assert!(builder.unit_tokens(file.id).is_none());
}

#[derive(Default)]
struct KindCounter {
    seen: Vec<String>,
}

impl EntityVisitor for KindCounter {
    type Output = ();

    fn visit_class(&mut self, _: &Entity, decl: &Declaration) {
        self.seen.push(format!("class {}", decl.name));
    }

    fn visit_interface(&mut self, _: &Entity, decl: &Declaration) {
        self.seen.push(format!("interface {}", decl.name));
    }

    fn visit_trait(&mut self, _: &Entity, decl: &Declaration) {
        self.seen.push(format!("trait {}", decl.name));
    }

    fn visit_function(&mut self, _: &Entity, decl: &Declaration) {
        self.seen.push(format!("function {}", decl.name));
    }

    fn visit_unresolved(&mut self, _: &Entity, name: &str) {
        self.seen.push(format!("unresolved {name}"));
    }
}

#[test]
fn entity_visitor_dispatches_by_kind() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php class A extends Missing {} trait T {} function f() {}");
    builder.parent_class(builder.find_type("A").unwrap()).unwrap();

    let mut counter = KindCounter::default();
    for entity in builder.entities() {
        entity.accept(&mut counter);
    }
    counter.seen.sort();
    assert_eq!(counter.seen, vec!["class A", "function f", "trait T", "unresolved Missing"]);
}

#[test]
fn unregister_removes_name_and_package_membership() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php namespace App; class Gone {}");
    let gone = builder.find_type("App\\Gone").unwrap();

    let removed = builder.unregister(gone).unwrap();
    assert_eq!(removed.package(), None);
    assert_eq!(builder.find_type("App\\Gone"), None);
    assert!(builder.package("App").unwrap().is_empty());
    assert!(builder.unregister(gone).is_err());
}

#[test]
fn reassigning_package_moves_membership() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php class Loose {}");
    let loose = builder.find_type("Loose").unwrap();

    builder.reassign_package(loose, "Legacy").unwrap();
    assert!(!builder.package("+global").unwrap().contains(loose));
    assert!(builder.package("Legacy").unwrap().contains(loose));
    assert_eq!(builder.entity(loose).unwrap().package().as_deref(), Some("Legacy"));
}

#[test]
fn dependents_keep_memoized_views_until_invalidated() {
    let builder = Builder::new();
    parse_into(&builder, "a.php", "<?php class A extends B {}");
    parse_into(&builder, "b.php", "<?php class B { function first() {} }");
    let a = builder.find_type("A").unwrap();
    assert!(builder.all_methods(a).unwrap().contains_key("first"));

    parse_into(&builder, "b2.php", "<?php class B { function second() {} }");
    assert!(builder.all_methods(a).unwrap().contains_key("first"));

    builder.invalidate(a);
    let methods = builder.all_methods(a).unwrap();
    assert!(methods.contains_key("second"));
    assert!(!methods.contains_key("first"));
}

#[test]
fn interface_rejects_parent_class() {
    let parent = Arc::new(php_depend::builder::TypeRef::new("Base", php_depend::Span::default()));

    let mut interface = Declaration::new(EntityKind::Interface, "Contract");
    let err = interface.set_parent(parent.clone()).unwrap_err();
    assert!(matches!(err, php_depend::BuilderError::InterfaceParentClass { ref name } if name == "Contract"));
    assert_eq!(err.to_string(), "Interface Contract cannot declare a parent class.");
    assert!(interface.parent().is_none());

    let mut class = Declaration::new(EntityKind::Class, "Service");
    class.set_parent(parent).unwrap();
    assert_eq!(class.parent().map(|p| p.name()), Some("Base"));
}
