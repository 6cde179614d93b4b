use php_depend::builder::Modifiers;
use php_depend::{Ast, Builder, NodeFlags, NodeKind, ParseError, SourceFile};

fn parameters(source: &str) -> (Ast, Vec<php_depend::NodeId>) {
    let (_, ast) = php_depend::parse(source).unwrap();
    let ast = Ast::clone(&ast);
    let root = ast.root().unwrap();
    let found = ast.find_children_of_type(root, &NodeKind::FormalParameter);
    (ast, found)
}

#[test]
fn variadic_parameter_with_type() {
    let (ast, params) = parameters("<?php function f(int ...$rest) {}");
    assert_eq!(params.len(), 1);
    let param = &ast[params[0]];
    assert_eq!(param.image, "$rest");
    assert!(param.is_variadic());
    assert_eq!(ast.kind(ast.get_child(params[0], 0).unwrap()), NodeKind::ScalarType);
}

#[test]
fn reference_parameter_with_default() {
    let (ast, params) = parameters("<?php function g(array &$items = [], ?Foo $foo = null) {}");
    assert_eq!(params.len(), 2);
    let items = &ast[params[0]];
    assert!(items.is_by_reference());
    assert!(items.is_default());
    assert_eq!(ast.kind(ast.get_child(params[0], 0).unwrap()), NodeKind::TypeArray);

    let foo_type = ast.get_child(params[1], 0).unwrap();
    assert_eq!(ast.kind(foo_type), NodeKind::ClassOrInterfaceReference);
    assert!(ast[foo_type].has_flag(NodeFlags::NULLABLE));
}

#[test]
fn union_and_intersection_types() {
    let (ast, params) = parameters("<?php function h(A|B|null $x, C&D $y, E & $z) {}");
    let union = ast.get_child(params[0], 0).unwrap();
    assert_eq!(ast.kind(union), NodeKind::UnionType);
    assert_eq!(ast.image(union), "|");
    assert_eq!(ast.children(union).len(), 3);

    let intersection = ast.get_child(params[1], 0).unwrap();
    assert_eq!(ast.image(intersection), "&");
    assert_eq!(ast.children(intersection).len(), 2);

    assert!(ast[params[2]].is_by_reference());
    assert_eq!(ast.kind(ast.get_child(params[2], 0).unwrap()), NodeKind::ClassOrInterfaceReference);
}

#[test]
fn named_and_spread_arguments() {
    let (_, ast) = php_depend::parse("<?php f(name: $x, ...$rest); strlen(...);").unwrap();
    let root = ast.root().unwrap();
    let arguments = ast.find_children_of_type(root, &NodeKind::Arguments);
    assert_eq!(ast.children(arguments[0]).len(), 2);
    assert!(ast[ast.children(arguments[0])[1]].is_variadic());
    assert!(ast[arguments[1]].is_variadic());
    assert!(ast.children(arguments[1]).is_empty());
}

#[test]
fn constructor_promotion_registers_properties() {
    let builder = Builder::new();
    let source = "<?php class Point { public function __construct(private readonly int $x, protected $y = 0) {} }";
    builder.parse_source(&SourceFile::new("point.php", source)).unwrap();

    let point = builder.find_type("Point").unwrap();
    let decl = builder.declaration(point).unwrap();
    let names: Vec<&str> = decl.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["$x", "$y"]);
    assert_eq!(decl.properties[0].modifiers, Modifiers::PRIVATE | Modifiers::READONLY);
    assert_eq!(decl.properties[1].modifiers, Modifiers::PROTECTED);
}

#[test]
fn promotion_outside_constructor_is_rejected() {
    let err = php_depend::parse("<?php class P { function run(private $x) {} }").unwrap_err();
    assert!(matches!(
        err,
        ParseError::InvalidState { ref message, .. } if message == "Cannot declare promoted property outside a constructor."
    ));
}
