use crate::ast::kind::with_node_kinds;
use crate::ast::{Ast, NodeId, NodeKind};

macro_rules! define_visitor {
    ($($kind:ident => $visit:ident,)*) => {
        /// One visit operation per concrete node kind. Every operation falls
        /// back to [`Visitor::visit_node`], so implementors only override the
        /// kinds they care about.
        pub trait Visitor {
            type Output;

            fn visit_node(&mut self, ast: &Ast, id: NodeId) -> Self::Output;

            $(
                fn $visit(&mut self, ast: &Ast, id: NodeId) -> Self::Output {
                    self.visit_node(ast, id)
                }
            )*
        }

        /// Dispatches to the visit operation matching the kind of `id`.
        pub fn accept<V: Visitor + ?Sized>(visitor: &mut V, ast: &Ast, id: NodeId) -> V::Output {
            match ast[id].kind {
                $(NodeKind::$kind => visitor.$visit(ast, id),)*
            }
        }
    };
}

with_node_kinds!(define_visitor);

/// Visits every child of `id` in order, dropping the results.
pub fn walk_children<V: Visitor + ?Sized>(visitor: &mut V, ast: &Ast, id: NodeId) {
    for &child in ast.children(id) {
        accept(visitor, ast, child);
    }
}

impl Ast {
    pub fn accept<V: Visitor + ?Sized>(&self, id: NodeId, visitor: &mut V) -> V::Output {
        accept(visitor, self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[derive(Default)]
    struct VariableCounter {
        variables: usize,
    }

    impl Visitor for VariableCounter {
        type Output = ();

        fn visit_node(&mut self, ast: &Ast, id: NodeId) {
            walk_children(self, ast, id);
        }

        fn visit_variable(&mut self, ast: &Ast, id: NodeId) {
            self.variables += 1;
            walk_children(self, ast, id);
        }
    }

    #[test]
    fn dispatches_by_kind() {
        let mut ast = Ast::new();
        let root = ast.alloc(NodeKind::Arguments, "", Span::default());
        for name in ["$a", "$b"] {
            let var = ast.alloc(NodeKind::Variable, name, Span::default());
            ast.add_child(root, var);
        }
        let lit = ast.alloc(NodeKind::Literal, "1", Span::default());
        ast.add_child(root, lit);

        let mut counter = VariableCounter::default();
        ast.accept(root, &mut counter);
        assert_eq!(counter.variables, 2);
    }
}
