use crate::ast::visitor::{Visitor, accept};
use crate::ast::{Ast, NodeId};

/// Collects the chain of nodes whose span contains a line/column position,
/// outermost first.
pub struct Locator {
    line: u32,
    column: u32,
    path: Vec<NodeId>,
}

impl Locator {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column, path: Vec::new() }
    }

    pub fn find(ast: &Ast, line: u32, column: u32) -> Vec<NodeId> {
        let mut locator = Self::new(line, column);
        if let Some(root) = ast.root() {
            accept(&mut locator, ast, root);
        }
        locator.path
    }
}

impl Visitor for Locator {
    type Output = ();

    fn visit_node(&mut self, ast: &Ast, id: NodeId) {
        if ast.span(id).contains(self.line, self.column) {
            self.path.push(id);
            // Sibling spans do not overlap, so at most one child matches.
            for &child in ast.children(id) {
                if ast.span(child).contains(self.line, self.column) {
                    accept(self, ast, child);
                    break;
                }
            }
        }
    }
}
