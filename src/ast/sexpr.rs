use crate::ast::visitor::{Visitor, accept};
use crate::ast::{Ast, NodeFlags, NodeId};

/// Renders a subtree as an indented S-expression: `(Kind "image" children...)`.
/// Flags that change a node's meaning (`&`, `default`, `...`) are appended
/// after the image.
#[derive(Default)]
pub struct SExprFormatter {
    output: String,
    indent: usize,
}

impl SExprFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.output
    }

    /// Formats `id` and everything below it.
    pub fn format(ast: &Ast, id: NodeId) -> String {
        let mut formatter = Self::new();
        accept(&mut formatter, ast, id);
        formatter.finish()
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }

    fn newline(&mut self) {
        self.output.push('\n');
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
    }
}

impl Visitor for SExprFormatter {
    type Output = ();

    fn visit_node(&mut self, ast: &Ast, id: NodeId) {
        let node = &ast[id];
        self.write("(");
        self.write(node.kind.name());
        if !node.image.is_empty() {
            self.write(&format!(" {:?}", node.image));
        }
        for (flag, marker) in [
            (NodeFlags::BY_REF, " &"),
            (NodeFlags::DEFAULT, " default"),
            (NodeFlags::VARIADIC, " ..."),
            (NodeFlags::STATIC, " static"),
        ] {
            if node.has_flag(flag) {
                self.write(marker);
            }
        }

        self.indent += 1;
        for &child in node.children() {
            self.newline();
            accept(self, ast, child);
        }
        self.indent -= 1;
        self.write(")");
    }
}
