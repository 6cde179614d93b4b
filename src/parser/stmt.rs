use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::error::ParseError;
use crate::lexer::token::TokenKind;
use crate::parser::Parser;
use crate::span::Span;

impl<'a> Parser<'a> {
    pub(super) fn parse_statement(&mut self) -> Result<Option<NodeId>, ParseError> {
        let token = self.current_token();
        let node = match token.kind {
            TokenKind::OpenTag | TokenKind::CloseTag | TokenKind::InlineHtml | TokenKind::SemiColon => {
                self.bump();
                return Ok(None);
            }
            TokenKind::Use => {
                self.parse_use_imports()?;
                return Ok(None);
            }
            TokenKind::Attribute => {
                self.skip_attributes()?;
                return self.parse_statement();
            }
            TokenKind::Eof => return Err(self.unexpected()),
            TokenKind::OpenTagEcho | TokenKind::Echo => self.parse_echo()?,
            TokenKind::OpenBrace => self.parse_scope()?,
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Do => self.parse_do_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Foreach => self.parse_foreach()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Try => self.parse_try()?,
            TokenKind::Throw => {
                let node = self.parse_throw()?;
                self.expect_terminator()?;
                node
            }
            TokenKind::Return => self.parse_keyword_statement(NodeKind::ReturnStatement)?,
            TokenKind::Break => self.parse_keyword_statement(NodeKind::BreakStatement)?,
            TokenKind::Continue => self.parse_keyword_statement(NodeKind::ContinueStatement)?,
            TokenKind::Global => self.parse_global()?,
            TokenKind::Static if self.next_token().kind == TokenKind::Variable => self.parse_static_variables()?,
            TokenKind::Unset => self.parse_unset()?,
            TokenKind::Declare => self.parse_declare()?,
            TokenKind::Goto => self.parse_goto()?,
            TokenKind::Identifier if self.next_token().kind == TokenKind::Colon => self.parse_label()?,
            TokenKind::Const => self.parse_constant_definition()?,
            TokenKind::Function if self.is_function_declaration() => self.parse_function_declaration()?,
            TokenKind::Abstract | TokenKind::Final | TokenKind::Readonly | TokenKind::Class => {
                self.parse_class_declaration()?
            }
            TokenKind::Interface => self.parse_interface_declaration()?,
            TokenKind::Trait => self.parse_trait_declaration()?,
            _ => self.parse_expression_statement()?,
        };
        Ok(Some(node))
    }

    fn is_function_declaration(&self) -> bool {
        match self.peek_kind(1) {
            TokenKind::Identifier => true,
            TokenKind::Ampersand => self.peek_kind(2) == TokenKind::Identifier,
            _ => false,
        }
    }

    fn parse_expression_statement(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current_token().span;
        let node = self.node(NodeKind::Statement, "", start);
        let expression = self.parse_expression()?;
        self.ast.add_child(node, expression);
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_scope(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::OpenBrace)?.span;
        let node = self.node(NodeKind::ScopeStatement, "", start);
        while !self.at(TokenKind::CloseBrace) {
            if let Some(statement) = self.parse_statement()? {
                self.ast.add_child(node, statement);
            }
        }
        self.bump();
        Ok(self.finish(node, start))
    }

    fn parse_body(&mut self) -> Result<NodeId, ParseError> {
        if self.at(TokenKind::SemiColon) {
            let span = self.bump().span;
            return Ok(self.node(NodeKind::Statement, "", span));
        }
        match self.parse_statement()? {
            Some(statement) => Ok(statement),
            None => Err(self.unexpected()),
        }
    }

    fn parse_alternative_block(&mut self, terminators: &[TokenKind]) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::Colon)?.span;
        let node = self.node(NodeKind::ScopeStatement, "", start);
        while !terminators.contains(&self.current_token().kind) {
            if self.ended_after_close_tag() {
                break;
            }
            if let Some(statement) = self.parse_statement()? {
                self.ast.add_child(node, statement);
            }
        }
        Ok(self.finish(node, start))
    }

    /// `endif;`, `endwhile;` and friends. A close tag may replace the
    /// semicolon and is then part of the construct.
    fn parse_alternative_end(&mut self, keyword: TokenKind) -> Result<(), ParseError> {
        if self.ended_after_close_tag() {
            return Ok(());
        }
        self.expect(keyword)?;
        match self.current_token().kind {
            TokenKind::SemiColon | TokenKind::CloseTag => {
                self.bump();
                Ok(())
            }
            _ => Err(self.unexpected()),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<NodeId, ParseError> {
        self.expect(TokenKind::OpenParen)?;
        let expression = self.parse_expression()?;
        self.expect(TokenKind::CloseParen)?;
        Ok(expression)
    }

    fn parse_if(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::IfStatement, "if", start);
        let condition = self.parse_parenthesized()?;
        self.ast.add_child(node, condition);

        if self.at(TokenKind::Colon) {
            self.set_flag(node, NodeFlags::ALTERNATIVE);
            let body = self.parse_alternative_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf])?;
            self.ast.add_child(node, body);
            self.parse_else_branches(node, true)?;
            self.parse_alternative_end(TokenKind::EndIf)?;
        } else {
            let body = self.parse_body()?;
            self.ast.add_child(node, body);
            self.parse_else_branches(node, false)?;
        }
        Ok(self.finish(node, start))
    }

    /// `elseif` branches nest inside each other; a trailing `else` body is
    /// the last child of the innermost branch.
    fn parse_else_branches(&mut self, owner: NodeId, alternative: bool) -> Result<(), ParseError> {
        match self.current_token().kind {
            TokenKind::ElseIf => {
                let start = self.bump().span;
                let node = self.node(NodeKind::ElseIfStatement, "elseif", start);
                let condition = self.parse_parenthesized()?;
                self.ast.add_child(node, condition);
                let body = if alternative {
                    self.set_flag(node, NodeFlags::ALTERNATIVE);
                    self.parse_alternative_block(&[TokenKind::ElseIf, TokenKind::Else, TokenKind::EndIf])?
                } else {
                    self.parse_body()?
                };
                self.ast.add_child(node, body);
                self.parse_else_branches(node, alternative)?;
                self.finish(node, start);
                self.ast.add_child(owner, node);
            }
            TokenKind::Else => {
                self.bump();
                let body = if alternative {
                    self.parse_alternative_block(&[TokenKind::EndIf])?
                } else {
                    self.parse_body()?
                };
                self.ast.add_child(owner, body);
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_while(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::WhileStatement, "while", start);
        let condition = self.parse_parenthesized()?;
        self.ast.add_child(node, condition);
        self.parse_loop_body(node, TokenKind::EndWhile)?;
        Ok(self.finish(node, start))
    }

    fn parse_loop_body(&mut self, owner: NodeId, terminator: TokenKind) -> Result<(), ParseError> {
        if self.at(TokenKind::Colon) {
            self.set_flag(owner, NodeFlags::ALTERNATIVE);
            let body = self.parse_alternative_block(&[terminator])?;
            self.ast.add_child(owner, body);
            self.parse_alternative_end(terminator)
        } else {
            let body = self.parse_body()?;
            self.ast.add_child(owner, body);
            Ok(())
        }
    }

    fn parse_do_while(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::DoWhileStatement, "do", start);
        let body = self.parse_body()?;
        self.ast.add_child(node, body);
        self.expect(TokenKind::While)?;
        let condition = self.parse_parenthesized()?;
        self.ast.add_child(node, condition);
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    fn parse_for(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::ForStatement, "for", start);
        self.expect(TokenKind::OpenParen)?;

        let sections = [
            (NodeKind::ForInit, TokenKind::SemiColon),
            (NodeKind::Expression, TokenKind::SemiColon),
            (NodeKind::ForUpdate, TokenKind::CloseParen),
        ];
        for (kind, end) in sections {
            if !self.at(end) {
                let section_start = self.current_token().span;
                let section = self.node(kind, "", section_start);
                loop {
                    let expression = self.parse_expression()?;
                    self.ast.add_child(section, expression);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.finish(section, section_start);
                self.ast.add_child(node, section);
            }
            self.expect(end)?;
        }

        self.parse_loop_body(node, TokenKind::EndFor)?;
        Ok(self.finish(node, start))
    }

    fn parse_foreach(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::ForeachStatement, "foreach", start);
        self.expect(TokenKind::OpenParen)?;
        let subject = self.parse_expression()?;
        self.ast.add_child(node, subject);
        self.expect(TokenKind::As)?;

        let (first, first_by_ref, first_span) = self.parse_foreach_target()?;
        if self.eat(TokenKind::DoubleArrow) {
            if first_by_ref {
                return Err(self.invalid_state(first_span, "Key element cannot be a reference."));
            }
            self.ast.add_child(node, first);
            let (value, by_ref, _) = self.parse_foreach_target()?;
            if by_ref {
                self.set_flag(value, NodeFlags::BY_REF);
            }
            self.ast.add_child(node, value);
        } else {
            if first_by_ref {
                self.set_flag(first, NodeFlags::BY_REF);
            }
            self.ast.add_child(node, first);
        }
        self.expect(TokenKind::CloseParen)?;

        self.parse_loop_body(node, TokenKind::EndForeach)?;
        Ok(self.finish(node, start))
    }

    fn parse_foreach_target(&mut self) -> Result<(NodeId, bool, Span), ParseError> {
        let span = self.current_token().span;
        let by_ref = self.eat(TokenKind::Ampersand);
        let target = self.parse_expression()?;
        if self.ast.kind(target) == NodeKind::Array {
            self.into_list(target)?;
        }
        Ok((target, by_ref, span))
    }

    fn parse_switch(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::SwitchStatement, "switch", start);
        let subject = self.parse_parenthesized()?;
        self.ast.add_child(node, subject);

        let alternative = self.at(TokenKind::Colon);
        let close = if alternative {
            self.set_flag(node, NodeFlags::ALTERNATIVE);
            self.bump();
            TokenKind::EndSwitch
        } else {
            self.expect(TokenKind::OpenBrace)?;
            TokenKind::CloseBrace
        };
        self.eat(TokenKind::SemiColon);

        while !self.at(close) {
            if alternative && self.ended_after_close_tag() {
                break;
            }
            let label = self.parse_switch_label(close)?;
            self.ast.add_child(node, label);
        }

        if alternative {
            self.parse_alternative_end(TokenKind::EndSwitch)?;
        } else {
            self.bump();
        }
        Ok(self.finish(node, start))
    }

    fn parse_switch_label(&mut self, close: TokenKind) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        let node = match token.kind {
            TokenKind::Case => {
                self.bump();
                let node = self.node(NodeKind::SwitchLabel, "case", start);
                let value = self.parse_expression()?;
                self.ast.add_child(node, value);
                node
            }
            TokenKind::Default => {
                self.bump();
                let node = self.node(NodeKind::SwitchLabel, "default", start);
                self.set_flag(node, NodeFlags::DEFAULT);
                node
            }
            _ => return Err(self.unexpected()),
        };
        if !self.eat(TokenKind::Colon) {
            self.expect(TokenKind::SemiColon)?;
        }

        while !matches!(self.current_token().kind, TokenKind::Case | TokenKind::Default) && !self.at(close) {
            if self.ended_after_close_tag() {
                break;
            }
            if let Some(statement) = self.parse_statement()? {
                self.ast.add_child(node, statement);
            }
        }
        Ok(self.finish(node, start))
    }

    fn parse_try(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::TryStatement, "try", start);
        let body = self.parse_scope()?;
        self.ast.add_child(node, body);

        let mut handled = false;
        while self.at(TokenKind::Catch) {
            let catch_start = self.bump().span;
            let catch = self.node(NodeKind::CatchStatement, "catch", catch_start);
            self.expect(TokenKind::OpenParen)?;
            loop {
                let span = self.current_token().span;
                let name = self.parse_name()?;
                let span = span.to(self.last);
                let reference = self.class_name_reference(NodeKind::ClassOrInterfaceReference, &name, span)?;
                self.ast.add_child(catch, reference);
                if !self.eat(TokenKind::Pipe) {
                    break;
                }
            }
            if self.at(TokenKind::Variable) {
                let token = self.bump();
                let variable = self.node(NodeKind::Variable, token.image.clone(), token.span);
                self.ast.add_child(catch, variable);
            }
            self.expect(TokenKind::CloseParen)?;
            let body = self.parse_scope()?;
            self.ast.add_child(catch, body);
            self.finish(catch, catch_start);
            self.ast.add_child(node, catch);
            handled = true;
        }

        if self.at(TokenKind::Finally) {
            let finally_start = self.bump().span;
            let finally = self.node(NodeKind::FinallyStatement, "finally", finally_start);
            let body = self.parse_scope()?;
            self.ast.add_child(finally, body);
            self.finish(finally, finally_start);
            self.ast.add_child(node, finally);
            handled = true;
        }

        if !handled {
            return Err(self.unexpected());
        }
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_throw(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::ThrowStatement, "throw", start);
        let expression = self.parse_expression()?;
        self.ast.add_child(node, expression);
        Ok(self.finish(node, start))
    }

    fn parse_keyword_statement(&mut self, kind: NodeKind) -> Result<NodeId, ParseError> {
        let token = self.bump();
        let start = token.span;
        let node = self.node(kind, token.image.to_ascii_lowercase(), start);
        if !matches!(self.current_token().kind, TokenKind::SemiColon | TokenKind::CloseTag) {
            let expression = self.parse_expression()?;
            self.ast.add_child(node, expression);
        }
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    fn parse_echo(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::EchoStatement, "echo", start);
        loop {
            let expression = self.parse_expression()?;
            self.ast.add_child(node, expression);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        if !self.at(TokenKind::Eof) {
            self.expect_terminator()?;
        }
        Ok(self.finish(node, start))
    }

    fn parse_global(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::GlobalStatement, "global", start);
        loop {
            let variable = self.parse_simple_variable()?;
            self.ast.add_child(node, variable);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    fn parse_static_variables(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::StaticVariableDeclaration, "static", start);
        loop {
            let declarator = self.parse_variable_declarator()?;
            self.ast.add_child(node, declarator);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_variable_declarator(&mut self) -> Result<NodeId, ParseError> {
        let token = self.expect(TokenKind::Variable)?;
        let start = token.span;
        let node = self.node(NodeKind::VariableDeclarator, token.image.clone(), start);
        if self.eat(TokenKind::Eq) {
            let value = self.parse_expression()?;
            self.ast.add_child(node, value);
        }
        Ok(self.finish(node, start))
    }

    fn parse_unset(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::UnsetStatement, "unset", start);
        self.expect(TokenKind::OpenParen)?;
        while !self.at(TokenKind::CloseParen) {
            let expression = self.parse_expression()?;
            self.ast.add_child(node, expression);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    fn parse_declare(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::DeclareStatement, "declare", start);
        self.expect(TokenKind::OpenParen)?;
        loop {
            let token = self.expect_identifier()?;
            let declarator = self.node(NodeKind::ConstantDeclarator, token.image.clone(), token.span);
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expression()?;
            self.ast.add_child(declarator, value);
            self.finish(declarator, token.span);
            self.ast.add_child(node, declarator);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;

        match self.current_token().kind {
            TokenKind::SemiColon | TokenKind::CloseTag => self.expect_terminator()?,
            TokenKind::Colon => self.parse_loop_body(node, TokenKind::EndDeclare)?,
            _ => {
                let body = self.parse_body()?;
                self.ast.add_child(node, body);
            }
        }
        Ok(self.finish(node, start))
    }

    fn parse_goto(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let label = self.expect_identifier()?;
        let node = self.node(NodeKind::GotoStatement, label.image.clone(), start);
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    fn parse_label(&mut self) -> Result<NodeId, ParseError> {
        let token = self.bump();
        let node = self.node(NodeKind::LabelStatement, token.image.clone(), token.span);
        self.bump();
        Ok(self.finish(node, token.span))
    }

    fn parse_constant_definition(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::ConstantDefinition, "const", start);
        self.parse_constant_declarators(node)?;
        self.expect_terminator()?;
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_constant_declarators(&mut self, owner: NodeId) -> Result<Vec<String>, ParseError> {
        let mut names = Vec::new();
        loop {
            let token = self.expect_member_name()?;
            let declarator = self.node(NodeKind::ConstantDeclarator, token.image.clone(), token.span);
            self.expect(TokenKind::Eq)?;
            let value = self.parse_expression()?;
            self.ast.add_child(declarator, value);
            self.finish(declarator, token.span);
            self.ast.add_child(owner, declarator);
            names.push(token.image.clone());
            if !self.eat(TokenKind::Comma) {
                return Ok(names);
            }
        }
    }
}
