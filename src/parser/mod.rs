//! Recursive-descent parser. Builds one [`Ast`] per compilation unit and
//! registers every class, interface, trait and function it reduces with the
//! shared [`Builder`].

mod attributes;
mod decl;
mod expr;
mod stmt;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::ast::{Ast, NodeFlags, NodeId, NodeKind};
use crate::builder::{Builder, Declaration, EntityId, EntityKind, FileId, TypeRef};
use crate::error::ParseError;
use crate::lexer::TokenStream;
use crate::lexer::token::{Token, TokenKind};
use crate::span::Span;

const RESERVED_TYPE_NAMES: &[&str] = &[
    "self", "parent", "static", "int", "integer", "float", "double", "real", "string", "bool", "boolean", "array",
    "callable", "iterable", "object", "mixed", "void", "null", "never", "false", "true",
];

pub(crate) fn is_reserved_type_name(name: &str) -> bool {
    RESERVED_TYPE_NAMES.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn strip_namespace_prefix(name: &str) -> Option<&str> {
    const PREFIX: &str = "namespace\\";
    let head = name.get(..PREFIX.len())?;
    let rest = name.get(PREFIX.len()..)?;
    (head.eq_ignore_ascii_case(PREFIX) && !rest.is_empty()).then_some(rest)
}

struct ClassScope {
    name: Option<String>,
    parent: Option<Arc<TypeRef>>,
    allows_parent: bool,
}

pub struct Parser<'a> {
    stream: &'a TokenStream,
    builder: &'a Builder,
    pos: usize,
    /// Span of the last consumed token; every production stamps its end from it.
    last: Span,
    ast: Ast,
    file: String,
    file_id: Option<FileId>,
    namespace: Option<String>,
    /// Lowercased alias to fully qualified class name.
    imports: HashMap<String, String>,
    classes: Vec<ClassScope>,
    dependencies: Vec<Vec<Arc<TypeRef>>>,
}

impl<'a> Parser<'a> {
    pub fn new(stream: &'a TokenStream, builder: &'a Builder) -> Self {
        Self {
            stream,
            builder,
            pos: 0,
            last: Span::default(),
            ast: Ast::new(),
            file: String::new(),
            file_id: None,
            namespace: None,
            imports: HashMap::new(),
            classes: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_file(mut self, path: &str, id: FileId) -> Self {
        self.file = path.to_string();
        self.file_id = Some(id);
        self.ast = Ast::with_file(path);
        self
    }

    /// Parses the whole unit. Any error aborts the unit; declarations
    /// registered before the error stay registered.
    pub fn parse(mut self) -> Result<Ast, ParseError> {
        let root = self.ast.alloc(NodeKind::CompilationUnit, self.file.clone(), Span::default());
        self.ast.set_root(root);
        let start = self.current_token().span;

        while !self.at(TokenKind::Eof) {
            if self.at(TokenKind::HaltCompiler) {
                self.parse_halt_compiler()?;
                break;
            }
            self.parse_top_statement(root)?;
        }

        if self.pos > 0 {
            self.ast.node_mut(root).span = start.to(self.last);
        }
        Ok(self.ast)
    }

    fn parse_top_statement(&mut self, parent: NodeId) -> Result<(), ParseError> {
        match self.current_token().kind {
            TokenKind::Namespace if self.next_token().kind != TokenKind::NsSeparator => self.parse_namespace(parent),
            TokenKind::Use => self.parse_use_imports(),
            _ => {
                if let Some(statement) = self.parse_statement()? {
                    self.ast.add_child(parent, statement);
                }
                Ok(())
            }
        }
    }

    fn parse_halt_compiler(&mut self) -> Result<(), ParseError> {
        self.bump();
        self.expect(TokenKind::OpenParen)?;
        self.expect(TokenKind::CloseParen)?;
        self.expect_terminator()?;
        Ok(())
    }

    fn parse_namespace(&mut self, parent: NodeId) -> Result<(), ParseError> {
        self.bump();
        let name = match self.current_token().kind {
            TokenKind::OpenBrace => None,
            _ => Some(self.parse_name()?.trim_start_matches('\\').to_string()),
        };
        trace!(namespace = ?name, file = %self.file, "entering namespace");
        self.imports.clear();

        if self.eat(TokenKind::OpenBrace) {
            self.namespace = name;
            while !self.at(TokenKind::CloseBrace) {
                if self.at(TokenKind::Eof) {
                    return Err(self.unexpected());
                }
                self.parse_top_statement(parent)?;
            }
            self.bump();
            self.namespace = None;
            self.imports.clear();
        } else {
            self.expect_terminator()?;
            self.namespace = name;
        }
        Ok(())
    }

    fn parse_use_imports(&mut self) -> Result<(), ParseError> {
        self.bump();
        let classes = !matches!(self.current_token().kind, TokenKind::Function | TokenKind::Const);
        if !classes {
            self.bump();
        }

        loop {
            let prefix = self.parse_name()?.trim_start_matches('\\').to_string();
            if self.at(TokenKind::NsSeparator) && self.next_token().kind == TokenKind::OpenBrace {
                self.bump();
                self.bump();
                while !self.at(TokenKind::CloseBrace) {
                    let member_is_class =
                        classes && !matches!(self.current_token().kind, TokenKind::Function | TokenKind::Const);
                    if matches!(self.current_token().kind, TokenKind::Function | TokenKind::Const) {
                        self.bump();
                    }
                    let name = format!("{prefix}\\{}", self.parse_name()?);
                    let alias = self.parse_import_alias()?;
                    if member_is_class {
                        self.add_import(name, alias);
                    }
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::CloseBrace)?;
            } else {
                let alias = self.parse_import_alias()?;
                if classes {
                    self.add_import(prefix, alias);
                }
            }
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_terminator()?;
        Ok(())
    }

    fn parse_import_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat(TokenKind::As) {
            return Ok(Some(self.expect_identifier()?.image.clone()));
        }
        Ok(None)
    }

    fn add_import(&mut self, name: String, alias: Option<String>) {
        let alias = alias.unwrap_or_else(|| name.rsplit('\\').next().unwrap_or(&name).to_string());
        trace!(alias = %alias, name = %name, "imported class name");
        self.imports.insert(alias.to_ascii_lowercase(), name);
    }

    // Token plumbing

    fn current_token(&self) -> &'a Token {
        self.stream.get(self.pos)
    }

    fn next_token(&self) -> &'a Token {
        self.stream.get(self.pos + 1)
    }

    fn peek_kind(&self, offset: usize) -> TokenKind {
        self.stream.get(self.pos + offset).kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current_token().kind == kind
    }

    fn bump(&mut self) -> &'a Token {
        let token = self.current_token();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
            self.last = token.span;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token, ParseError> {
        if self.at(kind) { Ok(self.bump()) } else { Err(self.unexpected()) }
    }

    fn expect_identifier(&mut self) -> Result<&'a Token, ParseError> {
        self.expect(TokenKind::Identifier)
    }

    fn expect_member_name(&mut self) -> Result<&'a Token, ParseError> {
        let kind = self.current_token().kind;
        if kind == TokenKind::Identifier || kind.is_semi_reserved() {
            Ok(self.bump())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        match self.current_token().kind {
            TokenKind::SemiColon => {
                self.bump();
                Ok(())
            }
            TokenKind::CloseTag => {
                // The close tag terminates the statement without widening it.
                let end = self.last;
                self.bump();
                self.last = end;
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }

    /// True when the unit ran out right after a close tag or trailing
    /// inline HTML, which may end an open alternative-syntax block.
    fn ended_after_close_tag(&self) -> bool {
        self.at(TokenKind::Eof)
            && self.pos > 0
            && matches!(self.stream.get(self.pos - 1).kind, TokenKind::CloseTag | TokenKind::InlineHtml)
    }

    fn doc_comment(&self) -> Option<String> {
        self.stream.doc_comment(self.pos).map(str::to_string)
    }

    // Node helpers

    fn node(&mut self, kind: NodeKind, image: impl Into<String>, span: Span) -> NodeId {
        self.ast.alloc(kind, image, span)
    }

    fn finish(&mut self, id: NodeId, start: Span) -> NodeId {
        self.ast.node_mut(id).span = start.to(self.last);
        id
    }

    fn set_flag(&mut self, id: NodeId, flag: NodeFlags) {
        self.ast.node_mut(id).metadata.flags |= flag;
    }

    // Errors

    fn unexpected(&self) -> ParseError {
        let token = self.current_token();
        match token.kind {
            TokenKind::Eof => ParseError::TokenStreamEnd { file: self.file.clone() },
            _ => ParseError::UnexpectedToken {
                image: token.image.clone(),
                line: token.start_line(),
                column: token.start_column(),
                file: self.file.clone(),
            },
        }
    }

    fn invalid_state(&self, span: Span, message: impl Into<String>) -> ParseError {
        ParseError::InvalidState {
            line: span.start_line,
            column: span.start_column,
            file: self.file.clone(),
            message: message.into(),
        }
    }

    // Names

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let mut name = String::new();
        if self.at(TokenKind::Namespace) && self.next_token().kind == TokenKind::NsSeparator {
            self.bump();
            name.push_str("namespace");
        }
        if self.eat(TokenKind::NsSeparator) {
            name.push('\\');
        }
        loop {
            name.push_str(&self.expect_member_name()?.image);
            let continues = self.at(TokenKind::NsSeparator)
                && (self.peek_kind(1) == TokenKind::Identifier || self.peek_kind(1).is_semi_reserved());
            if !continues {
                return Ok(name);
            }
            self.bump();
            name.push('\\');
        }
    }

    fn with_namespace(&self, name: &str) -> String {
        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}\\{name}"),
            _ => name.to_string(),
        }
    }

    fn qualify(&self, name: &str) -> String {
        if let Some(absolute) = name.strip_prefix('\\') {
            return absolute.to_string();
        }
        if is_reserved_type_name(name) {
            return name.to_string();
        }
        if let Some(relative) = strip_namespace_prefix(name) {
            return self.with_namespace(relative);
        }
        let (head, tail) = match name.split_once('\\') {
            Some((head, tail)) => (head, Some(tail)),
            None => (name, None),
        };
        match (self.imports.get(&head.to_ascii_lowercase()), tail) {
            (Some(target), Some(tail)) => format!("{target}\\{tail}"),
            (Some(target), None) => target.clone(),
            (None, _) => self.with_namespace(name),
        }
    }

    // References

    fn type_reference(&mut self, kind: NodeKind, name: &str, span: Span) -> (NodeId, Arc<TypeRef>) {
        let qualified = self.qualify(name);
        let reference = Arc::new(TypeRef::new(qualified.clone(), span));
        let node = self.node(kind, qualified, span);
        self.ast.node_mut(node).reference = Some(Arc::clone(&reference));
        (node, reference)
    }

    fn dependency_reference(&mut self, kind: NodeKind, name: &str, span: Span) -> NodeId {
        let (node, reference) = self.type_reference(kind, name, span);
        self.record_dependency(reference);
        node
    }

    fn record_dependency(&mut self, reference: Arc<TypeRef>) {
        if let Some(scope) = self.dependencies.last_mut() {
            scope.push(reference);
        }
    }

    fn special_reference(&mut self, name: &str, span: Span) -> Result<Option<NodeId>, ParseError> {
        let lower = name.to_ascii_lowercase();
        let kind = match lower.as_str() {
            "self" => NodeKind::SelfReference,
            "parent" => NodeKind::ParentReference,
            "static" => NodeKind::StaticReference,
            _ => return Ok(None),
        };
        let Some(scope) = self.classes.last() else {
            return Err(self.invalid_state(
                span,
                format!("The keyword \"{lower}\" was used outside of a class/method scope."),
            ));
        };

        let reference = match kind {
            NodeKind::ParentReference => {
                if !scope.allows_parent {
                    let owner = scope.name.clone().unwrap_or_else(|| "class@anonymous".to_string());
                    return Err(self.invalid_state(
                        span,
                        format!("The keyword \"parent\" was used but the class \"{owner}\" does not declare a parent."),
                    ));
                }
                scope.parent.clone()
            }
            _ => scope.name.as_ref().map(|name| Arc::new(TypeRef::new(name.clone(), span))),
        };

        let node = self.node(kind, lower, span);
        self.ast.node_mut(node).reference = reference;
        Ok(Some(node))
    }

    fn class_name_reference(&mut self, kind: NodeKind, name: &str, span: Span) -> Result<NodeId, ParseError> {
        match self.special_reference(name, span)? {
            Some(node) => Ok(node),
            None => Ok(self.dependency_reference(kind, name, span)),
        }
    }

    // Registration

    fn register(&mut self, node: NodeId, mut decl: Declaration, first: usize) -> Result<EntityId, ParseError> {
        let last = self.pos.saturating_sub(1);
        decl.file = self.file_id;
        decl.node = Some(node);
        decl.span = self.ast.span(node);
        decl.namespace = self.namespace.clone();
        decl.token_range = Some((first, last));

        let id = match decl.kind {
            EntityKind::Class => self.builder.register_class(decl)?,
            EntityKind::Interface => self.builder.register_interface(decl)?,
            EntityKind::Trait => self.builder.register_trait(decl)?,
            EntityKind::Function => self.builder.register_function(decl)?,
        };
        self.builder.store_tokens(&id.to_string(), self.stream.slice(first, last));
        self.ast.node_mut(node).metadata.extra.insert("entity".to_string(), id.to_string());
        Ok(id)
    }
}
