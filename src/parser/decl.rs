use std::sync::Arc;

use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::builder::{
    Constant, Declaration, EntityKind, Method, ModifierTarget, Modifiers, Property, TraitAlias, TraitPrecedence,
    TraitUse, TypeRef,
};
use crate::error::ParseError;
use crate::lexer::token::TokenKind;
use crate::parser::{ClassScope, Parser, is_reserved_type_name};
use crate::span::Span;

struct MemberHead {
    start: Span,
    comment: Option<String>,
    modifiers: Modifiers,
}

impl<'a> Parser<'a> {
    pub(super) fn parse_function_declaration(&mut self) -> Result<NodeId, ParseError> {
        let first = self.pos;
        let comment = self.doc_comment();
        let start = self.bump().span;
        let by_ref = self.eat(TokenKind::Ampersand);
        let token = self.expect_identifier()?;
        let name = self.with_namespace(&token.image);

        let node = self.node(NodeKind::Function, name.clone(), start);
        self.ast.node_mut(node).comment = comment.clone();
        if by_ref {
            self.set_flag(node, NodeFlags::RETURNS_REF);
        }

        // Classes declared inside the body collect their own references.
        let outer_classes = std::mem::take(&mut self.classes);
        self.dependencies.push(Vec::new());
        let signature = self.parse_callable_signature(node, false);
        let body = signature.and_then(|_| self.parse_scope());
        let dependencies = self.dependencies.pop().unwrap_or_default();
        self.classes = outer_classes;
        let body = body?;
        self.ast.add_child(node, body);
        self.finish(node, start);

        let mut decl = Declaration::new(EntityKind::Function, name);
        decl.comment = comment;
        decl.dependencies = dependencies;
        self.register(node, decl, first)?;
        Ok(node)
    }

    /// Parameter list and optional return type of a function, method or
    /// closure. Returns the properties promoted by a constructor.
    fn parse_callable_signature(&mut self, owner: NodeId, promotes: bool) -> Result<Vec<Property>, ParseError> {
        let (parameters, promoted) = self.parse_formal_parameters(promotes)?;
        self.ast.add_child(owner, parameters);
        self.parse_return_type(owner)?;
        Ok(promoted)
    }

    pub(super) fn parse_return_type(&mut self, owner: NodeId) -> Result<(), ParseError> {
        if self.eat(TokenKind::Colon) {
            let return_type = self.parse_type()?;
            self.ast.add_child(owner, return_type);
        }
        Ok(())
    }

    pub(super) fn parse_formal_parameters(&mut self, promotes: bool) -> Result<(NodeId, Vec<Property>), ParseError> {
        let start = self.expect(TokenKind::OpenParen)?.span;
        let node = self.node(NodeKind::FormalParameters, "", start);
        let mut promoted = Vec::new();

        while !self.at(TokenKind::CloseParen) {
            if self.at(TokenKind::Attribute) {
                self.skip_attributes()?;
            }
            let (parameter, property) = self.parse_formal_parameter(promotes)?;
            self.ast.add_child(node, parameter);
            promoted.extend(property);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok((self.finish(node, start), promoted))
    }

    fn parse_formal_parameter(&mut self, promotes: bool) -> Result<(NodeId, Option<Property>), ParseError> {
        let start = self.current_token().span;
        let comment = self.doc_comment();
        let node = self.node(NodeKind::FormalParameter, "", start);

        let mut modifiers = Modifiers::empty();
        while matches!(
            self.current_token().kind,
            TokenKind::Public | TokenKind::Protected | TokenKind::Private | TokenKind::Readonly
        ) {
            let token = self.bump();
            modifiers |= Modifiers::from_keyword(&token.image).unwrap_or_default();
        }
        if !modifiers.is_empty() {
            if !promotes {
                return Err(self.invalid_state(start, "Cannot declare promoted property outside a constructor."));
            }
            modifiers = ModifierTarget::Field.validate(modifiers)?;
            self.ast.node_mut(node).metadata.modifiers = modifiers;
        }

        let mut type_node = None;
        if !matches!(
            self.current_token().kind,
            TokenKind::Variable | TokenKind::Ampersand | TokenKind::Ellipsis
        ) {
            let parsed = self.parse_type()?;
            self.ast.add_child(node, parsed);
            type_node = Some(parsed);
        }
        if self.eat(TokenKind::Ampersand) {
            self.set_flag(node, NodeFlags::BY_REF);
        }
        if self.eat(TokenKind::Ellipsis) {
            self.set_flag(node, NodeFlags::VARIADIC);
        }

        let token = self.expect(TokenKind::Variable)?;
        let variable = self.node(NodeKind::Variable, token.image.clone(), token.span);
        self.ast.add_child(node, variable);
        self.ast.node_mut(node).image = token.image.clone();

        if self.eat(TokenKind::Eq) {
            self.set_flag(node, NodeFlags::DEFAULT);
            let value = self.parse_expression()?;
            self.ast.add_child(node, value);
        }
        self.finish(node, start);

        let property = (!modifiers.is_empty()).then(|| Property {
            name: token.image.clone(),
            modifiers,
            comment,
            span: self.ast.span(node),
            type_ref: type_node.and_then(|t| self.type_references(t).into_iter().next()),
        });
        Ok((node, property))
    }

    pub(super) fn parse_type(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current_token().span;
        let nullable = self.eat(TokenKind::Question);
        let first = self.parse_single_type()?;

        let separator = match self.current_token().kind {
            TokenKind::Pipe => Some(TokenKind::Pipe),
            TokenKind::Ampersand if self.is_intersection() => Some(TokenKind::Ampersand),
            _ => None,
        };
        let node = match separator {
            Some(separator) => {
                let image = if separator == TokenKind::Pipe { "|" } else { "&" };
                let union = self.node(NodeKind::UnionType, image, start);
                self.ast.add_child(union, first);
                while self.at(separator) && (separator == TokenKind::Pipe || self.is_intersection()) {
                    self.bump();
                    let next = self.parse_single_type()?;
                    self.ast.add_child(union, next);
                }
                self.finish(union, start)
            }
            None => first,
        };
        if nullable {
            self.set_flag(node, NodeFlags::NULLABLE);
            self.finish(node, start);
        }
        Ok(node)
    }

    fn is_intersection(&self) -> bool {
        !matches!(
            self.peek_kind(1),
            TokenKind::Variable | TokenKind::Ellipsis | TokenKind::Ampersand
        )
    }

    fn parse_single_type(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        match token.kind {
            TokenKind::OpenParen => {
                self.bump();
                let inner = self.parse_type()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Array => {
                self.bump();
                Ok(self.node(NodeKind::TypeArray, "array", start))
            }
            TokenKind::Callable => {
                self.bump();
                Ok(self.node(NodeKind::TypeCallable, "callable", start))
            }
            TokenKind::Static => {
                self.bump();
                self.class_name_reference(NodeKind::ClassOrInterfaceReference, "static", start)
            }
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => {
                let name = self.parse_name()?;
                let span = start.to(self.last);
                let lower = name.to_ascii_lowercase();
                if matches!(lower.as_str(), "self" | "parent") {
                    return self.class_name_reference(NodeKind::ClassOrInterfaceReference, &name, span);
                }
                if is_reserved_type_name(&name) {
                    return Ok(self.node(NodeKind::ScalarType, lower, span));
                }
                Ok(self.dependency_reference(NodeKind::ClassOrInterfaceReference, &name, span))
            }
            _ => Err(self.unexpected()),
        }
    }

    pub(super) fn type_references(&self, node: NodeId) -> Vec<Arc<TypeRef>> {
        self.ast
            .find_self_and_children_of_type(node, &NodeKind::ClassOrInterfaceReference)
            .into_iter()
            .filter_map(|id| self.ast[id].reference.clone())
            .collect()
    }

    // Classes, interfaces, traits

    pub(super) fn parse_class_declaration(&mut self) -> Result<NodeId, ParseError> {
        let first = self.pos;
        let comment = self.doc_comment();
        let start = self.current_token().span;

        let mut modifiers = Modifiers::empty();
        while matches!(
            self.current_token().kind,
            TokenKind::Abstract | TokenKind::Final | TokenKind::Readonly
        ) {
            let token = self.bump();
            modifiers |= Modifiers::from_keyword(&token.image).unwrap_or_default();
        }
        let modifiers = ModifierTarget::Class.validate(modifiers)?;
        self.expect(TokenKind::Class)?;
        let token = self.expect_identifier()?;
        let name = self.with_namespace(&token.image);

        let node = self.node(NodeKind::Class, name.clone(), start);
        self.ast.node_mut(node).comment = comment.clone();
        self.ast.node_mut(node).metadata.modifiers = modifiers;
        let mut decl = Declaration::new(EntityKind::Class, name.clone());
        decl.modifiers = modifiers;
        decl.comment = comment;

        let parent = self.parse_class_header(node, &mut decl)?;
        let scope = ClassScope { name: Some(name), allows_parent: parent.is_some(), parent };
        self.parse_named_class_body(node, &mut decl, scope)?;
        self.finish(node, start);

        self.register(node, decl, first)?;
        Ok(node)
    }

    fn parse_class_header(&mut self, node: NodeId, decl: &mut Declaration) -> Result<Option<Arc<TypeRef>>, ParseError> {
        let mut parent = None;
        if self.eat(TokenKind::Extends) {
            let start = self.current_token().span;
            let name = self.parse_name()?;
            let span = start.to(self.last);
            let (reference, type_ref) = self.type_reference(NodeKind::ClassReference, &name, span);
            self.ast.add_child(node, reference);
            decl.set_parent(Arc::clone(&type_ref))?;
            parent = Some(type_ref);
        }
        if self.eat(TokenKind::Implements) {
            decl.interfaces = self.parse_interface_list(node)?;
        }
        Ok(parent)
    }

    fn parse_interface_list(&mut self, node: NodeId) -> Result<Vec<Arc<TypeRef>>, ParseError> {
        let mut references = Vec::new();
        loop {
            let start = self.current_token().span;
            let name = self.parse_name()?;
            let span = start.to(self.last);
            let (reference, type_ref) = self.type_reference(NodeKind::ClassOrInterfaceReference, &name, span);
            self.ast.add_child(node, reference);
            references.push(type_ref);
            if !self.eat(TokenKind::Comma) {
                return Ok(references);
            }
        }
    }

    fn parse_named_class_body(
        &mut self,
        node: NodeId,
        decl: &mut Declaration,
        scope: ClassScope,
    ) -> Result<(), ParseError> {
        let outer_dependencies = std::mem::take(&mut self.dependencies);
        let outer_classes = std::mem::replace(&mut self.classes, vec![scope]);
        let result = self.parse_class_body(node, decl);
        self.classes = outer_classes;
        self.dependencies = outer_dependencies;
        result
    }

    pub(super) fn parse_interface_declaration(&mut self) -> Result<NodeId, ParseError> {
        let first = self.pos;
        let comment = self.doc_comment();
        let start = self.bump().span;
        let token = self.expect_identifier()?;
        let name = self.with_namespace(&token.image);

        let node = self.node(NodeKind::Interface, name.clone(), start);
        self.ast.node_mut(node).comment = comment.clone();
        let mut decl = Declaration::new(EntityKind::Interface, name.clone());
        decl.comment = comment;
        self.ast.node_mut(node).metadata.modifiers = decl.modifiers;

        if self.eat(TokenKind::Extends) {
            decl.interfaces = self.parse_interface_list(node)?;
        }
        let scope = ClassScope { name: Some(name), parent: None, allows_parent: false };
        self.parse_named_class_body(node, &mut decl, scope)?;
        self.finish(node, start);

        self.register(node, decl, first)?;
        Ok(node)
    }

    pub(super) fn parse_trait_declaration(&mut self) -> Result<NodeId, ParseError> {
        let first = self.pos;
        let comment = self.doc_comment();
        let start = self.bump().span;
        let token = self.expect_identifier()?;
        let name = self.with_namespace(&token.image);

        let node = self.node(NodeKind::Trait, name.clone(), start);
        self.ast.node_mut(node).comment = comment.clone();
        let mut decl = Declaration::new(EntityKind::Trait, name.clone());
        decl.comment = comment;

        // `parent` inside a trait refers to the parent of the using class.
        let scope = ClassScope { name: Some(name), parent: None, allows_parent: true };
        self.parse_named_class_body(node, &mut decl, scope)?;
        self.finish(node, start);

        self.register(node, decl, first)?;
        Ok(node)
    }

    /// `new class(...) extends P implements I { ... }`. The class is not
    /// registered; its references count for the enclosing callable.
    pub(super) fn parse_anonymous_class(&mut self, allocation: NodeId) -> Result<(), ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::Class, "class@anonymous", start);
        self.ast.add_child(allocation, node);
        let arguments = if self.at(TokenKind::OpenParen) { Some(self.parse_arguments()?) } else { None };

        let mut decl = Declaration::new(EntityKind::Class, "class@anonymous");
        let parent = self.parse_class_header(node, &mut decl)?;
        if let Some(parent) = &parent {
            self.record_dependency(Arc::clone(parent));
        }
        for interface in &decl.interfaces {
            self.record_dependency(Arc::clone(interface));
        }

        self.classes.push(ClassScope { name: None, allows_parent: parent.is_some(), parent });
        let body = self.parse_class_body(node, &mut decl);
        self.classes.pop();
        body?;
        self.finish(node, start);

        for method in &decl.methods {
            for reference in &method.dependencies {
                self.record_dependency(Arc::clone(reference));
            }
        }
        if let Some(arguments) = arguments {
            self.ast.add_child(allocation, arguments);
        }
        Ok(())
    }

    fn parse_class_body(&mut self, owner: NodeId, decl: &mut Declaration) -> Result<(), ParseError> {
        self.expect(TokenKind::OpenBrace)?;
        while !self.at(TokenKind::CloseBrace) {
            match self.current_token().kind {
                TokenKind::Eof => return Err(self.unexpected()),
                TokenKind::Attribute => self.skip_attributes()?,
                TokenKind::Use => {
                    let statement = self.parse_trait_use(decl)?;
                    self.ast.add_child(owner, statement);
                }
                _ => {
                    let head = self.parse_member_head();
                    let member = match self.current_token().kind {
                        TokenKind::Const => self.parse_class_constants(decl, head)?,
                        TokenKind::Function => self.parse_method(decl, head)?,
                        _ if !head.modifiers.is_empty() => self.parse_field_declaration(decl, head)?,
                        _ => return Err(self.unexpected()),
                    };
                    self.ast.add_child(owner, member);
                }
            }
        }
        self.bump();
        Ok(())
    }

    fn parse_member_head(&mut self) -> MemberHead {
        let start = self.current_token().span;
        let comment = self.doc_comment();
        let mut modifiers = Modifiers::empty();
        while self.current_token().kind.is_member_modifier() {
            let token = self.bump();
            modifiers |= Modifiers::from_keyword(&token.image).unwrap_or_default();
        }
        MemberHead { start, comment, modifiers }
    }

    fn parse_method(&mut self, decl: &mut Declaration, head: MemberHead) -> Result<NodeId, ParseError> {
        let modifiers = ModifierTarget::Method.validate(head.modifiers)?;
        self.bump();
        let by_ref = self.eat(TokenKind::Ampersand);
        let name = self.expect_member_name()?.image.clone();

        let node = self.node(NodeKind::Method, name.clone(), head.start);
        self.ast.node_mut(node).comment = head.comment.clone();
        self.ast.node_mut(node).metadata.modifiers = modifiers;
        if by_ref {
            self.set_flag(node, NodeFlags::RETURNS_REF);
        }

        self.dependencies.push(Vec::new());
        let promoted = self.parse_callable_signature(node, name.eq_ignore_ascii_case("__construct"));
        let body = promoted.and_then(|promoted| {
            if self.eat(TokenKind::SemiColon) {
                Ok((promoted, None))
            } else {
                self.parse_scope().map(|body| (promoted, Some(body)))
            }
        });
        let dependencies = self.dependencies.pop().unwrap_or_default();
        let (promoted, body) = body?;
        if let Some(body) = body {
            self.ast.add_child(node, body);
        }
        self.finish(node, head.start);

        decl.properties.extend(promoted);
        decl.methods.push(Method {
            name,
            modifiers,
            comment: head.comment,
            span: self.ast.span(node),
            node: Some(node),
            dependencies,
        });
        Ok(node)
    }

    fn parse_field_declaration(&mut self, decl: &mut Declaration, head: MemberHead) -> Result<NodeId, ParseError> {
        let modifiers = ModifierTarget::Field.validate(head.modifiers)?;
        let node = self.node(NodeKind::FieldDeclaration, "", head.start);
        self.ast.node_mut(node).comment = head.comment.clone();
        self.ast.node_mut(node).metadata.modifiers = modifiers;

        let mut type_refs = Vec::new();
        if !self.at(TokenKind::Variable) {
            let field_type = self.parse_type()?;
            self.ast.add_child(node, field_type);
            type_refs = self.type_references(field_type);
        }
        let mut type_refs = type_refs.into_iter();
        let type_ref = type_refs.next();
        decl.dependencies.extend(type_refs);

        loop {
            let declarator = self.parse_variable_declarator()?;
            self.ast.add_child(node, declarator);
            decl.properties.push(Property {
                name: self.ast.image(declarator).to_string(),
                modifiers,
                comment: head.comment.clone(),
                span: self.ast.span(declarator),
                type_ref: type_ref.clone(),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_terminator()?;
        Ok(self.finish(node, head.start))
    }

    fn parse_class_constants(&mut self, decl: &mut Declaration, head: MemberHead) -> Result<NodeId, ParseError> {
        let modifiers = ModifierTarget::Constant.validate(head.modifiers)?;
        self.bump();
        let node = self.node(NodeKind::ConstantDefinition, "const", head.start);
        self.ast.node_mut(node).comment = head.comment.clone();
        self.ast.node_mut(node).metadata.modifiers = modifiers;

        // Typed constant: `const int A = 1;`
        if self.peek_kind(1) != TokenKind::Eq {
            let constant_type = self.parse_type()?;
            self.ast.add_child(node, constant_type);
        }
        for name in self.parse_constant_declarators(node)? {
            decl.constants.push(Constant {
                name,
                modifiers,
                comment: head.comment.clone(),
                span: head.start.to(self.last),
            });
        }
        self.expect_terminator()?;
        Ok(self.finish(node, head.start))
    }

    fn parse_trait_use(&mut self, decl: &mut Declaration) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::TraitUseStatement, "use", start);
        let mut trait_use = TraitUse::default();

        loop {
            let reference = self.parse_trait_reference(node)?;
            trait_use.traits.push(reference);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        if self.at(TokenKind::OpenBrace) {
            let adaptation_start = self.bump().span;
            let adaptation = self.node(NodeKind::TraitAdaptation, "", adaptation_start);
            while !self.at(TokenKind::CloseBrace) {
                self.parse_trait_adaptation(adaptation, &mut trait_use)?;
            }
            self.bump();
            self.finish(adaptation, adaptation_start);
            self.ast.add_child(node, adaptation);
        } else {
            self.expect_terminator()?;
        }

        decl.trait_uses.push(trait_use);
        Ok(self.finish(node, start))
    }

    fn parse_trait_reference(&mut self, owner: NodeId) -> Result<Arc<TypeRef>, ParseError> {
        let start = self.current_token().span;
        let name = self.parse_name()?;
        let span = start.to(self.last);
        let (reference, type_ref) = self.type_reference(NodeKind::TraitReference, &name, span);
        self.ast.add_child(owner, reference);
        Ok(type_ref)
    }

    fn parse_trait_adaptation(&mut self, owner: NodeId, trait_use: &mut TraitUse) -> Result<(), ParseError> {
        let start = self.current_token().span;
        let node = self.node(NodeKind::TraitAdaptationAlias, "", start);

        let mut offset = 0;
        while matches!(self.peek_kind(offset), TokenKind::Identifier | TokenKind::NsSeparator) {
            offset += 1;
        }
        let qualified = offset > 0 && self.peek_kind(offset) == TokenKind::DoubleColon;
        let trait_ref = if qualified {
            let reference = self.parse_trait_reference(node)?;
            self.expect(TokenKind::DoubleColon)?;
            Some(reference)
        } else {
            None
        };
        let method = self.expect_member_name()?.image.clone();
        self.ast.node_mut(node).image = method.clone();

        if self.eat(TokenKind::Insteadof) {
            let Some(trait_ref) = trait_ref else {
                return Err(self.unexpected());
            };
            self.ast.node_mut(node).kind = NodeKind::TraitAdaptationPrecedence;
            let mut insteadof = Vec::new();
            loop {
                insteadof.push(self.parse_trait_reference(node)?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            trait_use.precedences.push(TraitPrecedence { trait_ref, method, insteadof });
        } else {
            self.expect(TokenKind::As)?;
            let visibility = match self.current_token().kind {
                TokenKind::Public | TokenKind::Protected | TokenKind::Private => {
                    Modifiers::from_keyword(&self.bump().image)
                }
                _ => None,
            };
            let new_name = match self.current_token().kind {
                TokenKind::SemiColon => None,
                _ => Some(self.expect_member_name()?.image.clone()),
            };
            if visibility.is_none() && new_name.is_none() {
                return Err(self.unexpected());
            }
            if let Some(visibility) = visibility {
                self.ast.node_mut(node).metadata.modifiers = visibility;
            }
            if let Some(new_name) = &new_name {
                self.ast.node_mut(node).metadata.extra.insert("alias".to_string(), new_name.clone());
            }
            trait_use.aliases.push(TraitAlias { trait_ref, method, new_name, visibility });
        }

        self.expect(TokenKind::SemiColon)?;
        self.finish(node, start);
        self.ast.add_child(owner, node);
        Ok(())
    }
}
