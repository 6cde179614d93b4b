use php_depend::ast::sexpr::SExprFormatter;
use php_depend::{NodeFlags, NodeKind};

fn sexpr(source: &str) -> String {
    let (_, ast) = php_depend::parse(source).unwrap();
    SExprFormatter::format(&ast, ast.root().unwrap())
}

fn assert_same_tree(braced: &str, alternative: &str) {
    assert_eq!(sexpr(braced), sexpr(alternative));
}

#[test]
fn if_elseif_else() {
    assert_same_tree(
        "<?php if ($a) { echo 1; } elseif ($b) { echo 2; } else { echo 3; }",
        "<?php if ($a): echo 1; elseif ($b): echo 2; else: echo 3; endif;",
    );
}

#[test]
fn loops() {
    assert_same_tree("<?php while ($a) { $a--; }", "<?php while ($a): $a--; endwhile;");
    assert_same_tree(
        "<?php for ($i = 0; $i < 3; $i++) { echo $i; }",
        "<?php for ($i = 0; $i < 3; $i++): echo $i; endfor;",
    );
    assert_same_tree(
        "<?php foreach ($items as $k => &$v) { unset($v); }",
        "<?php foreach ($items as $k => &$v): unset($v); endforeach;",
    );
}

#[test]
fn switch_labels() {
    assert_same_tree(
        "<?php switch ($a) { case 1: echo 1; break; default: echo 2; }",
        "<?php switch ($a): case 1: echo 1; break; default: echo 2; endswitch;",
    );
}

#[test]
fn alternative_flag_is_recorded() {
    let (_, ast) = php_depend::parse("<?php while ($a): endwhile; while ($b) {}").unwrap();
    let root = ast.root().unwrap();
    let loops = ast.find_children_of_type(root, &NodeKind::WhileStatement);
    assert!(ast[loops[0]].is_alternative());
    assert!(!ast[loops[1]].has_flag(NodeFlags::ALTERNATIVE));
}

#[test]
fn inline_html_inside_block() {
    let (_, ast) = php_depend::parse("<?php if ($a): ?>text<?php endif; ?>").unwrap();
    let root = ast.root().unwrap();
    let statement = ast.get_child(root, 0).unwrap();
    assert_eq!(ast.kind(statement), NodeKind::IfStatement);
    let body = ast.get_child(statement, 1).unwrap();
    assert_eq!(ast.kind(body), NodeKind::ScopeStatement);
    assert!(ast.children(body).is_empty());
}

#[test]
fn unit_may_end_inside_block_after_close_tag() {
    let (_, ast) = php_depend::parse("<?php if ($a): echo 1; ?>").unwrap();
    let root = ast.root().unwrap();
    let statement = ast.get_child(root, 0).unwrap();
    assert_eq!(ast.kind(statement), NodeKind::IfStatement);
    assert_eq!(ast.children(statement).len(), 2);
}

#[test]
fn close_tag_terminates_statement() {
    let (_, ast) = php_depend::parse("<?php echo 1 ?>").unwrap();
    let root = ast.root().unwrap();
    let echo = ast.get_child(root, 0).unwrap();
    assert_eq!(ast.kind(echo), NodeKind::EchoStatement);
    assert_eq!(ast.span(echo).end_column, 12);
}
