use php_depend::ast::CastKind;
use php_depend::{NodeFlags, NodeKind};

#[test]
fn magic_constants_keep_their_spelling() {
    let (_, ast) = php_depend::parse("<?php echo __LINE__, __CLASS__, __namespace__;").unwrap();
    let root = ast.root().unwrap();
    let constants: Vec<&str> = ast
        .find_children_of_type(root, &NodeKind::Constant)
        .into_iter()
        .map(|c| ast.image(c))
        .collect();
    assert_eq!(constants, vec!["__LINE__", "__CLASS__", "__namespace__"]);
}

#[test]
fn bare_names_are_constants_and_keywords_literals() {
    let (_, ast) = php_depend::parse("<?php $a = PHP_EOL; $b = TRUE; $c = null;").unwrap();
    let root = ast.root().unwrap();
    let constant = ast.find_children_of_type(root, &NodeKind::Constant)[0];
    assert_eq!(ast.image(constant), "PHP_EOL");
    let literals: Vec<&str> = ast
        .find_children_of_type(root, &NodeKind::Literal)
        .into_iter()
        .map(|c| ast.image(c))
        .collect();
    assert_eq!(literals, vec!["TRUE", "null"]);
}

#[test]
fn cast_image_is_normalized() {
    let (_, ast) = php_depend::parse("<?php $a = ( INTEGER )$b;").unwrap();
    let root = ast.root().unwrap();
    let cast = ast.find_children_of_type(root, &NodeKind::CastExpression)[0];
    assert_eq!(ast.image(cast), "(integer)");
    assert_eq!(ast[cast].cast_kind(), Some(CastKind::Int));
}

#[test]
fn include_once_sets_flag() {
    let (_, ast) = php_depend::parse("<?php require_once __DIR__ . '/boot.php'; include 'x.php';").unwrap();
    let root = ast.root().unwrap();
    let require = ast.find_children_of_type(root, &NodeKind::RequireExpression)[0];
    assert_eq!(ast.image(require), "require_once");
    assert!(ast[require].has_flag(NodeFlags::ONCE));
    let include = ast.find_children_of_type(root, &NodeKind::IncludeExpression)[0];
    assert!(!ast[include].has_flag(NodeFlags::ONCE));
}

#[test]
fn class_name_fetch_and_class_constant() {
    let (_, ast) = php_depend::parse("<?php $a = Foo::class; $b = Foo::BAR;").unwrap();
    let root = ast.root().unwrap();
    assert_eq!(ast.find_children_of_type(root, &NodeKind::ClassFqnPostfix).len(), 1);
    let constant = ast.find_children_of_type(root, &NodeKind::ConstantPostfix)[0];
    assert_eq!(ast.image(constant), "BAR");
}
