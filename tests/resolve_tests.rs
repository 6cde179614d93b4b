use php_depend::{Builder, EntityId, MemberOrigin, ResolveError};

fn parse(source: &str) -> Builder {
    let (builder, _) = php_depend::parse(source).unwrap();
    builder
}

fn id(builder: &Builder, name: &str) -> EntityId {
    builder.find_type(name).unwrap()
}

fn names(builder: &Builder, ids: &[EntityId]) -> Vec<String> {
    ids.iter().map(|id| builder.entity(*id).unwrap().name()).collect()
}

#[test]
fn subtype_relation_is_reflexive_and_transitive() {
    let builder = parse("<?php interface C {} class B implements C {} class A extends B {}");
    let (a, b, c) = (id(&builder, "A"), id(&builder, "B"), id(&builder, "C"));

    assert!(builder.is_subtype_of(a, a).unwrap());
    assert!(builder.is_subtype_of(a, b).unwrap());
    assert!(builder.is_subtype_of(a, c).unwrap());
    assert!(!builder.is_subtype_of(c, a).unwrap());
    assert!(!builder.is_subtype_of(b, a).unwrap());
    assert_eq!(builder.interfaces(a).unwrap(), vec![c]);
}

#[test]
fn interface_extension_counts_as_subtype() {
    let builder = parse("<?php interface Base {} interface Child extends Base {} class Impl implements Child {}");
    let implementation = id(&builder, "Impl");
    let base = id(&builder, "Base");
    assert!(builder.is_subtype_of(implementation, base).unwrap());
    assert_eq!(names(&builder, &builder.interfaces(implementation).unwrap()), vec!["Child", "Base"]);
}

#[test]
fn inheritance_cycle_is_reported() {
    let builder = parse("<?php class A extends B {} class B extends A {}");
    let a = id(&builder, "A");
    let expected = ResolveError::RecursiveInheritance { name: "A".to_string() };

    assert_eq!(builder.parent_class(a), Err(expected.clone()));
    assert_eq!(builder.all_methods(a).unwrap_err(), expected);
    assert_eq!(expected.to_string(), "Type A is part of an endless inheritance hierarchy");
}

#[test]
fn class_extending_itself_is_a_cycle() {
    let builder = parse("<?php class Loop extends Loop {}");
    let looped = id(&builder, "Loop");
    assert!(matches!(
        builder.parent_classes(looped),
        Err(ResolveError::RecursiveInheritance { name }) if name == "Loop"
    ));
}

#[test]
fn interface_cycle_is_reported() {
    let builder = parse("<?php interface I extends J {} interface J extends I {}");
    let i = id(&builder, "I");
    assert!(matches!(builder.interfaces(i), Err(ResolveError::RecursiveInheritance { .. })));
}

#[test]
fn cycle_errors_are_not_memoized() {
    let builder = parse("<?php class A extends B {} class B extends A {}");
    let a = id(&builder, "A");
    assert!(builder.all_methods(a).is_err());
    assert!(builder.all_methods(a).is_err());
}

#[test]
fn methods_overlay_parent_and_interfaces() {
    let builder = parse(
        "<?php
        interface Runner { function run(); function stop(); }
        abstract class Base implements Runner {
            public function run() {}
            protected static function boot() {}
        }
        class Worker extends Base {
            public function stop() {}
            private function tick() {}
        }",
    );
    let base = id(&builder, "Base");
    let worker = id(&builder, "Worker");
    let runner = id(&builder, "Runner");

    let base_methods = builder.all_methods(base).unwrap();
    let stop = &base_methods["stop"];
    assert!(stop.is_abstract());
    assert_eq!(stop.origin, MemberOrigin::Interface);
    assert_eq!(stop.declaring, runner);

    let methods = builder.all_methods(worker).unwrap();
    let keys: Vec<&str> = methods.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["run", "stop", "boot", "tick"]);
    assert_eq!(methods["run"].origin, MemberOrigin::Parent);
    assert_eq!(methods["run"].declaring, base);
    assert!(!methods["run"].is_abstract());
    assert_eq!(methods["stop"].origin, MemberOrigin::Own);
    assert!(methods["boot"].is_static());
    assert_eq!(methods["tick"].declaring, worker);
}

#[test]
fn method_names_are_case_insensitive() {
    let builder = parse("<?php class P { function DoWork() {} } class C extends P { function dowork() {} }");
    let c = id(&builder, "C");
    let methods = builder.all_methods(c).unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods["dowork"].name, "dowork");
    assert_eq!(methods["dowork"].declaring, c);
}

#[test]
fn constants_overlay_in_inheritance_order() {
    let builder = parse(
        "<?php
        interface I { const A = 1; }
        class P implements I { const B = 2; }
        class C extends P { const B = 3; }",
    );
    let c = id(&builder, "C");
    let constants = builder.all_constants(c).unwrap();
    assert_eq!(constants["A"].origin, MemberOrigin::Parent);
    assert_eq!(constants["A"].declaring, id(&builder, "I"));
    assert_eq!(constants["B"].origin, MemberOrigin::Own);
    assert_eq!(constants["B"].declaring, c);
}

#[test]
fn dependencies_follow_declaration_order() {
    let builder = parse(
        "<?php
        class A extends B implements I {
            use T;
            private Foo $f;
            function m(Bar $b): Baz { new Qux(); }
        }",
    );
    let a = id(&builder, "A");
    let dependencies = builder.dependencies(a).unwrap();
    assert_eq!(names(&builder, &dependencies), vec!["B", "I", "T", "Foo", "Bar", "Baz", "Qux"]);
    assert_eq!(names(&builder, &builder.method_dependencies(a, "M").unwrap()), vec!["Bar", "Baz", "Qux"]);
    assert!(builder.method_dependencies(a, "missing").unwrap().is_empty());
}

#[test]
fn dependencies_skip_self_and_deduplicate() {
    let builder = parse(
        "<?php
        class Node {
            function next(): ?Node { return new Node(); }
            function make(Factory $f): Factory { return Factory::create(); }
        }",
    );
    let node = id(&builder, "Node");
    assert_eq!(names(&builder, &builder.dependencies(node).unwrap()), vec!["Factory"]);
}

#[test]
fn function_dependencies_come_from_signature_and_body() {
    let (builder, _) = php_depend::parse(
        "<?php
        function load(Reader $r): Document {
            try { return Parser::parse($r); } catch (ParseFailure $e) { return new EmptyDocument(); }
        }",
    )
    .unwrap();
    let load = builder.find_function("load").unwrap();
    assert_eq!(
        names(&builder, &builder.dependencies(load).unwrap()),
        vec!["Reader", "Document", "Parser", "ParseFailure", "EmptyDocument"]
    );
}
