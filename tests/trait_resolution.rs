use php_depend::builder::Modifiers;
use php_depend::{Builder, EntityId, MemberOrigin, ResolveError};

fn parse(source: &str) -> Builder {
    let (builder, _) = php_depend::parse(source).unwrap();
    builder
}

fn id(builder: &Builder, name: &str) -> EntityId {
    builder.find_type(name).unwrap()
}

#[test]
fn insteadof_picks_the_preferred_trait() {
    let builder = parse(
        "<?php
        trait A { function hello() {} }
        trait B { function hello() {} }
        class C { use A, B { A::hello insteadof B; } }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods["hello"].declaring, id(&builder, "A"));
    assert_eq!(methods["hello"].origin, MemberOrigin::Trait);
}

#[test]
fn unresolved_collision_is_an_error() {
    let builder = parse(
        "<?php
        trait A { function hello() {} }
        trait B { function hello() {} }
        class C { use A, B; }",
    );
    let error = builder.all_methods(id(&builder, "C")).unwrap_err();
    assert_eq!(error, ResolveError::MethodCollision { method: "hello".to_string(), name: "C".to_string() });
}

#[test]
fn own_method_settles_a_collision() {
    let builder = parse(
        "<?php
        trait A { function hello() {} }
        trait B { function hello() {} }
        class C { use A, B; function hello() {} }",
    );
    let c = id(&builder, "C");
    let methods = builder.all_methods(c).unwrap();
    assert_eq!(methods["hello"].declaring, c);
    assert_eq!(methods["hello"].origin, MemberOrigin::Own);
}

#[test]
fn renaming_alias_adds_a_copy() {
    let builder = parse(
        "<?php
        trait A { function hello() {} }
        trait B { function hello() {} }
        class C { use A, B { A::hello insteadof B; B::hello as protected greet; } }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    let greet = &methods["greet"];
    assert_eq!(greet.name, "greet");
    assert_eq!(greet.original_name, "hello");
    assert_eq!(greet.declaring, id(&builder, "B"));
    assert_eq!(greet.visibility(), Modifiers::PROTECTED);
    assert_eq!(methods["hello"].declaring, id(&builder, "A"));
    assert_eq!(methods["hello"].visibility(), Modifiers::PUBLIC);
}

#[test]
fn visibility_alias_changes_the_original() {
    let builder = parse(
        "<?php
        trait Greets { public function hello() {} }
        class C { use Greets { hello as private; } }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods.len(), 1);
    assert_eq!(methods["hello"].visibility(), Modifiers::PRIVATE);
}

#[test]
fn alias_colliding_with_trait_method_is_an_error() {
    let builder = parse(
        "<?php
        trait A { function foo() {} function bar() {} }
        class C { use A { foo as bar; } }",
    );
    assert!(matches!(
        builder.all_methods(id(&builder, "C")),
        Err(ResolveError::MethodCollision { method, .. }) if method == "bar"
    ));
}

#[test]
fn abstract_trait_method_keeps_inherited_body() {
    let builder = parse(
        "<?php
        class P { function run() {} }
        trait T { abstract function run(); function extra() {} }
        class C extends P { use T; }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods["run"].declaring, id(&builder, "P"));
    assert_eq!(methods["run"].origin, MemberOrigin::Parent);
    assert!(!methods["run"].is_abstract());
    assert_eq!(methods["extra"].declaring, id(&builder, "T"));
}

#[test]
fn concrete_trait_method_replaces_abstract_one() {
    let builder = parse(
        "<?php
        trait Contract { abstract function handle(); }
        trait Impl { function handle() {} }
        class C { use Contract, Impl; }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods["handle"].declaring, id(&builder, "Impl"));
    assert!(!methods["handle"].is_abstract());
}

#[test]
fn trait_using_traits_flattens() {
    let builder = parse(
        "<?php
        trait Inner { function inner() {} }
        trait Outer { use Inner; function outer() {} }
        class C { use Outer; }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods["inner"].declaring, id(&builder, "Inner"));
    assert_eq!(methods["outer"].declaring, id(&builder, "Outer"));
    assert!(methods.values().all(|m| m.origin == MemberOrigin::Trait));
}

#[test]
fn trait_constants_are_visible() {
    let builder = parse("<?php trait T { const LIMIT = 10; } class C { use T; }");
    let constants = builder.all_constants(id(&builder, "C")).unwrap();
    assert_eq!(constants["LIMIT"].origin, MemberOrigin::Trait);
    assert_eq!(constants["LIMIT"].declaring, id(&builder, "T"));
}

#[test]
fn unqualified_alias_follows_insteadof_winner() {
    let builder = parse(
        "<?php
        trait A { function foo() {} }
        trait B { function foo() {} }
        class C { use A, B { A::foo insteadof B; foo as bar; } }",
    );
    let a = id(&builder, "A");
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    let keys: Vec<&str> = methods.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["foo", "bar"]);
    assert_eq!(methods["foo"].declaring, a);
    assert_eq!(methods["bar"].declaring, a);
    assert_eq!(methods["bar"].original_name, "foo");
}

#[test]
fn qualified_alias_still_reaches_excluded_trait() {
    let builder = parse(
        "<?php
        trait A { function foo() {} }
        trait B { function foo() {} }
        class C { use A, B { A::foo insteadof B; B::foo as fromB; } }",
    );
    let methods = builder.all_methods(id(&builder, "C")).unwrap();
    assert_eq!(methods["foo"].declaring, id(&builder, "A"));
    assert_eq!(methods["fromb"].declaring, id(&builder, "B"));
    assert_eq!(methods["fromb"].name, "fromB");
}
