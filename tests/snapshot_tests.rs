use php_depend::ast::sexpr::SExprFormatter;
use php_depend::{Ast, NodeKind};

#[test]
fn json_snapshot_restores_tree_and_parents() {
    let source = "<?php\n/** Greeter */\nclass Greeter { public function hi($name) { echo \"Hi $name\"; } }";
    let (_, ast) = php_depend::parse(source).unwrap();
    let root = ast.root().unwrap();

    let json = ast.to_json(root).unwrap();
    let restored = Ast::from_json(&json).unwrap();
    let restored_root = restored.root().unwrap();

    assert_eq!(SExprFormatter::format(&restored, restored_root), SExprFormatter::format(&ast, root));
    for id in restored.descendants(restored_root) {
        for &child in restored.children(id) {
            assert_eq!(restored.parent(child), Some(id));
        }
    }

    let class = restored.find_children_of_type(restored_root, &NodeKind::Class)[0];
    assert_eq!(restored[class].comment.as_deref(), Some("/** Greeter */"));
    assert!(restored[class].reference.is_none());
}

#[test]
fn snapshot_keeps_entity_link() {
    let (builder, ast) = php_depend::parse("<?php function helper() {}").unwrap();
    let root = ast.root().unwrap();
    let function = ast.find_children_of_type(root, &NodeKind::Function)[0];
    let id = builder.find_function("helper").unwrap();
    assert_eq!(ast[function].extra("entity"), Some(id.to_string().as_str()));

    let restored = Ast::from_snapshot(&ast.to_snapshot(function));
    let restored_root = restored.root().unwrap();
    assert_eq!(restored[restored_root].extra("entity"), Some(id.to_string().as_str()));
}

#[test]
fn import_copies_subtree_into_another_arena() {
    let (_, ast) = php_depend::parse("<?php $a = [1, 2];").unwrap();
    let array = ast.find_children_of_type(ast.root().unwrap(), &NodeKind::Array)[0];

    let mut target = Ast::new();
    let copy = target.import(&ast, array);
    assert_eq!(target.parent(copy), None);
    assert_eq!(target.children(copy).len(), 2);
    assert_eq!(SExprFormatter::format(&target, copy), SExprFormatter::format(&ast, array));
}
