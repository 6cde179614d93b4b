use php_depend::{Ast, NodeFlags, NodeId, NodeKind};

fn parse(source: &str) -> (Ast, NodeId) {
    let (_, ast) = php_depend::parse(source).unwrap();
    let ast = Ast::clone(&ast);
    let root = ast.root().unwrap();
    (ast, root)
}

fn first(ast: &Ast, root: NodeId, kind: NodeKind) -> NodeId {
    ast.find_children_of_type(root, &kind)[0]
}

fn kinds(ast: &Ast, id: NodeId) -> Vec<NodeKind> {
    ast.children(id).iter().map(|c| ast.kind(*c)).collect()
}

#[test]
fn list_keyword_skips_empty_slots() {
    let (ast, root) = parse("<?php list($a, , $b) = $pair;");
    let list = first(&ast, root, NodeKind::ListExpression);
    assert_eq!(ast.image(list), "list");
    assert_eq!(kinds(&ast, list), vec![NodeKind::Variable, NodeKind::Variable]);
    assert_eq!(ast.image(ast.children(list)[1]), "$b");
}

#[test]
fn short_array_on_left_of_assignment_becomes_list() {
    let (ast, root) = parse("<?php [[$a, $b], $c] = $matrix;");
    let assignment = first(&ast, root, NodeKind::AssignmentExpression);
    let outer = ast.children(assignment)[0];
    assert_eq!(ast.kind(outer), NodeKind::ListExpression);
    assert_eq!(kinds(&ast, outer), vec![NodeKind::ListExpression, NodeKind::Variable]);

    let inner = ast.children(outer)[0];
    assert_eq!(ast.parent(inner), Some(outer));
    assert_eq!(kinds(&ast, inner), vec![NodeKind::Variable, NodeKind::Variable]);
}

#[test]
fn keyed_and_reference_elements_stay_wrapped() {
    let (ast, root) = parse("<?php ['id' => $id, &$ref] = $row;");
    let list = first(&ast, root, NodeKind::ListExpression);
    assert_eq!(kinds(&ast, list), vec![NodeKind::ArrayElement, NodeKind::ArrayElement]);

    let keyed = ast.children(list)[0];
    assert_eq!(kinds(&ast, keyed), vec![NodeKind::Literal, NodeKind::Variable]);
    let by_ref = ast.children(list)[1];
    assert!(ast[by_ref].has_flag(NodeFlags::BY_REF));
}

#[test]
fn array_literal_on_right_stays_array() {
    let (ast, root) = parse("<?php $x = [$a, $b];");
    assert!(ast.find_children_of_type(root, &NodeKind::ListExpression).is_empty());
    let array = first(&ast, root, NodeKind::Array);
    assert!(ast[array].has_flag(NodeFlags::SHORT_SYNTAX));
    assert_eq!(kinds(&ast, array), vec![NodeKind::ArrayElement, NodeKind::ArrayElement]);
}

#[test]
fn array_keyword_reference_value() {
    let (ast, root) = parse("<?php $x = array($key => &$value);");
    let element = first(&ast, root, NodeKind::ArrayElement);
    assert!(ast[element].is_by_reference());
    assert_eq!(ast.image(ast.children(element)[0]), "$key");
    assert_eq!(ast.image(ast.children(element)[1]), "$value");
}
