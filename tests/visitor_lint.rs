use php_depend::ast::locator::Locator;
use php_depend::ast::visitor::{Visitor, walk_children};
use php_depend::{Ast, NodeId, NodeKind};

/// Flags `eval(...)` and dynamic method calls, as a lint pass would.
#[derive(Default)]
struct DynamicCodeLint {
    findings: Vec<String>,
}

impl Visitor for DynamicCodeLint {
    type Output = ();

    fn visit_node(&mut self, ast: &Ast, id: NodeId) {
        walk_children(self, ast, id);
    }

    fn visit_eval_expression(&mut self, ast: &Ast, id: NodeId) {
        let line = ast.span(id).start_line;
        self.findings.push(format!("eval on line {line}"));
        walk_children(self, ast, id);
    }

    fn visit_method_postfix(&mut self, ast: &Ast, id: NodeId) {
        let member = ast.get_child(id, 0).ok().map(|child| ast.kind(child));
        if member != Some(NodeKind::Identifier) {
            let line = ast.span(id).start_line;
            self.findings.push(format!("dynamic call on line {line}"));
        }
        walk_children(self, ast, id);
    }
}

#[test]
fn lint_finds_dynamic_code() {
    let source = "<?php\n$obj->run();\neval($code);\n$obj->$method();\n";
    let (_, ast) = php_depend::parse(source).unwrap();
    let mut lint = DynamicCodeLint::default();
    ast.accept(ast.root().unwrap(), &mut lint);
    assert_eq!(lint.findings, vec!["eval on line 3", "dynamic call on line 4"]);
}

#[test]
fn locator_walks_to_innermost_node() {
    let source = "<?php\nfunction f() {\n    return $value;\n}\n";
    let (_, ast) = php_depend::parse(source).unwrap();
    let path = Locator::find(&ast, 3, 13);
    let kinds: Vec<NodeKind> = path.iter().map(|id| ast.kind(*id)).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::CompilationUnit,
            NodeKind::Function,
            NodeKind::ScopeStatement,
            NodeKind::ReturnStatement,
            NodeKind::Variable,
        ]
    );
}

#[test]
fn parsed_tree_is_well_formed() {
    let source = "<?php
namespace App;

abstract class Repository extends Base implements \\Countable
{
    private ?Cache $cache = null;

    public function find(int $id): ?Entity
    {
        foreach ($this->rows as $row) {
            if ($row['id'] === $id) {
                return new Entity($row);
            }
        }
        return self::fallback(fn($x) => $x ?? static::DEFAULT);
    }

    abstract protected function fallback(callable $factory);
}
";
    let (_, ast) = php_depend::parse(source).unwrap();
    let root = ast.root().unwrap();
    assert!(ast.is_well_formed(root));
    let class = ast.find_children_of_type(root, &NodeKind::Class)[0];
    assert_eq!(ast.image(class), "App\\Repository");
    assert_eq!(ast.find_children_of_type(class, &NodeKind::Method).len(), 2);
}
