use std::mem;

use crate::ast::kind::normalize_cast_image;
use crate::ast::{NodeFlags, NodeId, NodeKind};
use crate::error::ParseError;
use crate::lexer::token::{Token, TokenKind};
use crate::lexer::{Lexer, TokenStream};
use crate::line_index::LineIndex;
use crate::parser::Parser;
use crate::span::Span;

/// Binding power of assignment operators; their right side is parsed one below.
const ASSIGNMENT_BP: u8 = 35;
const TERNARY_BP: u8 = 40;
const UNARY_BP: u8 = 180;
const POSTFIX_BP: u8 = 200;

impl<'a> Parser<'a> {
    pub(super) fn parse_expression(&mut self) -> Result<NodeId, ParseError> {
        self.parse_expr(0)
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<NodeId, ParseError> {
        let mut left = self.parse_unary()?;

        loop {
            let token = self.current_token();
            match token.kind {
                TokenKind::Question => {
                    if TERNARY_BP < min_bp {
                        break;
                    }
                    left = self.parse_conditional(left)?;
                }
                kind if kind.is_assignment() => {
                    if ASSIGNMENT_BP < min_bp {
                        break;
                    }
                    left = self.parse_assignment(left)?;
                }
                TokenKind::InstanceOf => {
                    let l_bp = 170;
                    if l_bp < min_bp {
                        break;
                    }
                    left = self.parse_instanceof(left)?;
                }
                kind => {
                    let Some((l_bp, r_bp, node_kind)) = Self::infix_binding_power(kind) else {
                        break;
                    };
                    if l_bp < min_bp {
                        break;
                    }
                    self.bump();
                    let start = self.ast.span(left);
                    let node = self.node(node_kind, token.image.clone(), start);
                    let right = self.parse_expr(r_bp)?;
                    self.ast.add_child(node, left);
                    self.ast.add_child(node, right);
                    left = self.finish(node, start);
                }
            }
        }

        Ok(left)
    }

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, NodeKind)> {
        let entry = match kind {
            TokenKind::LogicalOr => (10, 11, NodeKind::LogicalOrExpression),
            TokenKind::LogicalXor => (20, 21, NodeKind::LogicalXorExpression),
            TokenKind::LogicalAnd => (30, 31, NodeKind::LogicalAndExpression),

            TokenKind::Coalesce => (51, 50, NodeKind::Expression),

            TokenKind::PipePipe => (60, 61, NodeKind::BooleanOrExpression),
            TokenKind::AmpersandAmpersand => (70, 71, NodeKind::BooleanAndExpression),

            TokenKind::Pipe => (80, 81, NodeKind::Expression),
            TokenKind::Caret => (90, 91, NodeKind::Expression),
            TokenKind::Ampersand => (100, 101, NodeKind::Expression),

            TokenKind::EqEq | TokenKind::BangEq | TokenKind::EqEqEq | TokenKind::BangEqEq | TokenKind::Spaceship => {
                (110, 111, NodeKind::Expression)
            }
            TokenKind::Lt | TokenKind::LtEq | TokenKind::Gt | TokenKind::GtEq => (120, 121, NodeKind::Expression),

            TokenKind::Dot => (125, 126, NodeKind::Expression),
            TokenKind::Sl | TokenKind::Sr => (130, 131, NodeKind::Expression),
            TokenKind::Plus | TokenKind::Minus => (140, 141, NodeKind::Expression),
            TokenKind::Asterisk | TokenKind::Slash | TokenKind::Percent => (150, 151, NodeKind::Expression),

            TokenKind::Pow => (191, 190, NodeKind::Expression),
            _ => return None,
        };
        Some(entry)
    }

    fn parse_conditional(&mut self, condition: NodeId) -> Result<NodeId, ParseError> {
        let start = self.ast.span(condition);
        self.bump();
        let node = self.node(NodeKind::ConditionalExpression, "?", start);
        self.ast.add_child(node, condition);
        if !self.at(TokenKind::Colon) {
            let then = self.parse_expr(0)?;
            self.ast.add_child(node, then);
        }
        self.expect(TokenKind::Colon)?;
        let otherwise = self.parse_expr(TERNARY_BP + 1)?;
        self.ast.add_child(node, otherwise);
        Ok(self.finish(node, start))
    }

    fn parse_assignment(&mut self, target: NodeId) -> Result<NodeId, ParseError> {
        let start = self.ast.span(target);
        let operator = self.bump();
        let node = self.node(NodeKind::AssignmentExpression, operator.image.clone(), start);
        if operator.kind == TokenKind::Eq && self.eat(TokenKind::Ampersand) {
            self.set_flag(node, NodeFlags::BY_REF);
        }
        if operator.kind == TokenKind::Eq && self.ast.kind(target) == NodeKind::Array {
            self.into_list(target)?;
        }
        let value = self.parse_expr(ASSIGNMENT_BP - 1)?;
        self.ast.add_child(node, target);
        self.ast.add_child(node, value);
        Ok(self.finish(node, start))
    }

    fn parse_instanceof(&mut self, subject: NodeId) -> Result<NodeId, ParseError> {
        let start = self.ast.span(subject);
        let operator = self.bump();
        let node = self.node(NodeKind::InstanceOfExpression, operator.image.to_ascii_lowercase(), start);
        self.ast.add_child(node, subject);

        let class = match self.current_token().kind {
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace | TokenKind::Static => {
                self.parse_class_name_reference(NodeKind::ClassOrInterfaceReference)?
            }
            _ => self.parse_expr(171)?,
        };
        self.ast.add_child(node, class);
        Ok(self.finish(node, start))
    }

    fn parse_class_name_reference(&mut self, kind: NodeKind) -> Result<NodeId, ParseError> {
        let start = self.current_token().span;
        let name = if self.at(TokenKind::Static) {
            self.bump();
            "static".to_string()
        } else {
            self.parse_name()?
        };
        let span = start.to(self.last);
        self.class_name_reference(kind, &name, span)
    }

    fn parse_unary(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        match token.kind {
            TokenKind::Bang | TokenKind::Minus | TokenKind::Plus | TokenKind::BitNot | TokenKind::At => {
                self.bump();
                let node = self.node(NodeKind::UnaryExpression, token.image.clone(), start);
                let bp = if token.kind == TokenKind::Bang { 160 } else { UNARY_BP };
                let operand = self.parse_expr(bp)?;
                self.ast.add_child(node, operand);
                Ok(self.finish(node, start))
            }
            TokenKind::Inc | TokenKind::Dec => {
                self.bump();
                let kind = match token.kind {
                    TokenKind::Inc => NodeKind::PreIncrementExpression,
                    _ => NodeKind::PreDecrementExpression,
                };
                let node = self.node(kind, token.image.clone(), start);
                let operand = self.parse_expr(POSTFIX_BP)?;
                self.ast.add_child(node, operand);
                Ok(self.finish(node, start))
            }
            kind if kind.is_cast() => {
                self.bump();
                let node = self.node(NodeKind::CastExpression, normalize_cast_image(&token.image), start);
                let operand = self.parse_expr(UNARY_BP)?;
                self.ast.add_child(node, operand);
                Ok(self.finish(node, start))
            }
            TokenKind::New => self.parse_allocation(),
            TokenKind::Clone => self.parse_prefixed(NodeKind::CloneExpression, POSTFIX_BP),
            TokenKind::Print => self.parse_prefixed(NodeKind::PrintExpression, 31),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Include | TokenKind::IncludeOnce => self.parse_include(NodeKind::IncludeExpression),
            TokenKind::Require | TokenKind::RequireOnce => self.parse_include(NodeKind::RequireExpression),
            TokenKind::Yield => self.parse_yield(),
            TokenKind::Ampersand => {
                // By-reference marker in front of an operand, e.g. `fn() => &$x`.
                self.bump();
                let operand = self.parse_expr(POSTFIX_BP)?;
                self.set_flag(operand, NodeFlags::BY_REF);
                Ok(operand)
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    fn parse_prefixed(&mut self, kind: NodeKind, bp: u8) -> Result<NodeId, ParseError> {
        let token = self.bump();
        let node = self.node(kind, token.image.to_ascii_lowercase(), token.span);
        let operand = self.parse_expr(bp)?;
        self.ast.add_child(node, operand);
        Ok(self.finish(node, token.span))
    }

    fn parse_include(&mut self, kind: NodeKind) -> Result<NodeId, ParseError> {
        let once = matches!(self.current_token().kind, TokenKind::IncludeOnce | TokenKind::RequireOnce);
        let node = self.parse_prefixed(kind, 36)?;
        if once {
            self.set_flag(node, NodeFlags::ONCE);
        }
        Ok(node)
    }

    fn parse_yield(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let delegates = self.current_token().is_ident("from");
        if delegates {
            self.bump();
        }
        let image = if delegates { "yield from" } else { "yield" };
        let node = self.node(NodeKind::YieldExpression, image, start);
        if delegates {
            self.set_flag(node, NodeFlags::DELEGATE);
        }

        let ends = matches!(
            self.current_token().kind,
            TokenKind::SemiColon | TokenKind::CloseParen | TokenKind::Comma | TokenKind::CloseBracket | TokenKind::CloseTag
        );
        if !ends {
            let first = self.parse_expr(31)?;
            self.ast.add_child(node, first);
            if !delegates && self.eat(TokenKind::DoubleArrow) {
                let value = self.parse_expr(31)?;
                self.ast.add_child(node, value);
            }
        }
        Ok(self.finish(node, start))
    }

    fn parse_primary(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        match token.kind {
            TokenKind::Variable => {
                self.bump();
                Ok(self.node(NodeKind::Variable, token.image.clone(), start))
            }
            TokenKind::Dollar => self.parse_variable_variable(),
            TokenKind::LNumber | TokenKind::DNumber | TokenKind::StringLiteral => {
                self.bump();
                Ok(self.node(NodeKind::Literal, token.image.clone(), start))
            }
            TokenKind::InterpolatedString => self.parse_interpolated(NodeKind::String, token),
            TokenKind::ShellExec => self.parse_interpolated(NodeKind::ShellExecExpression, token),
            TokenKind::Heredoc => {
                if token.image.starts_with("<<<'") || token.image.starts_with("<<< '") {
                    self.bump();
                    Ok(self.node(NodeKind::HeredocString, token.image.clone(), start))
                } else {
                    self.parse_interpolated(NodeKind::HeredocString, token)
                }
            }
            TokenKind::Line
            | TokenKind::File
            | TokenKind::Dir
            | TokenKind::ClassC
            | TokenKind::TraitC
            | TokenKind::MethodC
            | TokenKind::FuncC
            | TokenKind::NsC => {
                self.bump();
                Ok(self.node(NodeKind::Constant, token.image.clone(), start))
            }
            TokenKind::OpenParen => {
                self.bump();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::OpenBracket => self.parse_array(true),
            TokenKind::Array => self.parse_array(false),
            TokenKind::List => self.parse_list(),
            TokenKind::Isset => self.parse_call_like(NodeKind::IssetExpression),
            TokenKind::Empty => self.parse_call_like(NodeKind::EmptyExpression),
            TokenKind::Eval => self.parse_call_like(NodeKind::EvalExpression),
            TokenKind::Exit => self.parse_exit(),
            TokenKind::Function | TokenKind::Fn => self.parse_closure(start, false),
            TokenKind::Static => match self.peek_kind(1) {
                TokenKind::Function | TokenKind::Fn => {
                    self.bump();
                    self.parse_closure(start, true)
                }
                _ => self.parse_class_name_reference(NodeKind::ClassOrInterfaceReference),
            },
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace => self.parse_name_expression(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_name_expression(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current_token().span;
        let name = self.parse_name()?;
        let span = start.to(self.last);

        match self.current_token().kind {
            TokenKind::DoubleColon => self.class_name_reference(NodeKind::ClassOrInterfaceReference, &name, span),
            TokenKind::OpenParen => {
                let node = self.node(NodeKind::FunctionPostfix, name.clone(), span);
                let identifier = self.node(NodeKind::Identifier, name, span);
                self.ast.add_child(node, identifier);
                let arguments = self.parse_arguments()?;
                self.ast.add_child(node, arguments);
                Ok(self.finish(node, start))
            }
            _ if ["true", "false", "null"].iter().any(|l| l.eq_ignore_ascii_case(&name)) => {
                Ok(self.node(NodeKind::Literal, name, span))
            }
            _ => Ok(self.node(NodeKind::Constant, name, span)),
        }
    }

    fn parse_variable_variable(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        if self.at(TokenKind::OpenBrace) {
            let node = self.node(NodeKind::CompoundVariable, "$", start);
            let inner = self.parse_compound_expression()?;
            self.ast.add_child(node, inner);
            return Ok(self.finish(node, start));
        }
        let node = self.node(NodeKind::VariableVariable, "$", start);
        let inner = match self.current_token().kind {
            TokenKind::Variable => {
                let token = self.bump();
                self.node(NodeKind::Variable, token.image.clone(), token.span)
            }
            TokenKind::Dollar => self.parse_variable_variable()?,
            _ => return Err(self.unexpected()),
        };
        self.ast.add_child(node, inner);
        Ok(self.finish(node, start))
    }

    fn parse_compound_expression(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::OpenBrace)?.span;
        let node = self.node(NodeKind::CompoundExpression, "{", start);
        let inner = self.parse_expression()?;
        self.ast.add_child(node, inner);
        self.expect(TokenKind::CloseBrace)?;
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_simple_variable(&mut self) -> Result<NodeId, ParseError> {
        match self.current_token().kind {
            TokenKind::Variable => {
                let token = self.bump();
                Ok(self.node(NodeKind::Variable, token.image.clone(), token.span))
            }
            TokenKind::Dollar => self.parse_variable_variable(),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_postfix(&mut self, mut left: NodeId) -> Result<NodeId, ParseError> {
        loop {
            let token = self.current_token();
            let start = self.ast.span(left);
            left = match token.kind {
                TokenKind::OpenBracket => {
                    self.bump();
                    let node = self.node(NodeKind::ArrayIndexExpression, "[", start);
                    self.ast.add_child(node, left);
                    if !self.at(TokenKind::CloseBracket) {
                        let index = self.parse_expression()?;
                        self.ast.add_child(node, index);
                    }
                    self.expect(TokenKind::CloseBracket)?;
                    self.finish(node, start)
                }
                TokenKind::Arrow | TokenKind::NullSafeArrow => {
                    self.bump();
                    let node = self.node(NodeKind::MemberPrimaryPrefix, token.image.clone(), start);
                    self.ast.add_child(node, left);
                    let postfix = self.parse_object_member()?;
                    self.ast.add_child(node, postfix);
                    self.finish(node, start)
                }
                TokenKind::DoubleColon => {
                    self.bump();
                    let node = self.node(NodeKind::MemberPrimaryPrefix, "::", start);
                    self.ast.add_child(node, left);
                    let postfix = self.parse_static_member()?;
                    self.ast.add_child(node, postfix);
                    self.finish(node, start)
                }
                TokenKind::OpenParen => {
                    let image = match self.ast.kind(left) {
                        NodeKind::Variable => self.ast.image(left).to_string(),
                        _ => String::new(),
                    };
                    let node = self.node(NodeKind::FunctionPostfix, image, start);
                    self.ast.add_child(node, left);
                    let arguments = self.parse_arguments()?;
                    self.ast.add_child(node, arguments);
                    self.finish(node, start)
                }
                TokenKind::Inc | TokenKind::Dec => {
                    self.bump();
                    let node = self.node(NodeKind::PostfixExpression, token.image.clone(), start);
                    self.ast.add_child(node, left);
                    return Ok(self.finish(node, start));
                }
                _ => return Ok(left),
            };
        }
    }

    fn parse_object_member(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        let (member, image) = match token.kind {
            TokenKind::Variable => {
                self.bump();
                (self.node(NodeKind::Variable, token.image.clone(), start), token.image.clone())
            }
            TokenKind::OpenBrace => (self.parse_compound_expression()?, String::new()),
            TokenKind::Dollar => (self.parse_variable_variable()?, String::new()),
            kind if kind == TokenKind::Identifier || kind.is_semi_reserved() => {
                self.bump();
                (self.node(NodeKind::Identifier, token.image.clone(), start), token.image.clone())
            }
            _ => return Err(self.unexpected()),
        };
        self.member_postfix(member, image, start, NodeKind::PropertyPostfix)
    }

    fn parse_static_member(&mut self) -> Result<NodeId, ParseError> {
        let token = self.current_token();
        let start = token.span;
        match token.kind {
            TokenKind::Class => {
                self.bump();
                Ok(self.node(NodeKind::ClassFqnPostfix, "class", start))
            }
            TokenKind::Variable => {
                self.bump();
                let member = self.node(NodeKind::Variable, token.image.clone(), start);
                self.member_postfix(member, token.image.clone(), start, NodeKind::PropertyPostfix)
            }
            TokenKind::Dollar => {
                let member = self.parse_variable_variable()?;
                self.member_postfix(member, String::new(), start, NodeKind::PropertyPostfix)
            }
            TokenKind::OpenBrace => {
                let member = self.parse_compound_expression()?;
                self.member_postfix(member, String::new(), start, NodeKind::ConstantPostfix)
            }
            kind if kind == TokenKind::Identifier || kind.is_semi_reserved() => {
                self.bump();
                let member = self.node(NodeKind::Identifier, token.image.clone(), start);
                self.member_postfix(member, token.image.clone(), start, NodeKind::ConstantPostfix)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn member_postfix(
        &mut self,
        member: NodeId,
        image: String,
        start: Span,
        fallback: NodeKind,
    ) -> Result<NodeId, ParseError> {
        let kind = if self.at(TokenKind::OpenParen) { NodeKind::MethodPostfix } else { fallback };
        let node = self.node(kind, image, start);
        self.ast.add_child(node, member);
        if kind == NodeKind::MethodPostfix {
            let arguments = self.parse_arguments()?;
            self.ast.add_child(node, arguments);
        }
        Ok(self.finish(node, start))
    }

    pub(super) fn parse_arguments(&mut self) -> Result<NodeId, ParseError> {
        let start = self.expect(TokenKind::OpenParen)?.span;
        let node = self.node(NodeKind::Arguments, "", start);

        if self.at(TokenKind::Ellipsis) && self.peek_kind(1) == TokenKind::CloseParen {
            self.bump();
            self.set_flag(node, NodeFlags::VARIADIC);
        }
        while !self.at(TokenKind::CloseParen) {
            let named = (self.at(TokenKind::Identifier) || self.current_token().kind.is_semi_reserved())
                && self.peek_kind(1) == TokenKind::Colon;
            if named {
                self.bump();
                self.bump();
            }
            let unpack = self.eat(TokenKind::Ellipsis);
            let argument = self.parse_expression()?;
            if unpack {
                self.set_flag(argument, NodeFlags::VARIADIC);
            }
            self.ast.add_child(node, argument);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(self.finish(node, start))
    }

    fn parse_call_like(&mut self, kind: NodeKind) -> Result<NodeId, ParseError> {
        let token = self.bump();
        let node = self.node(kind, token.image.to_ascii_lowercase(), token.span);
        self.expect(TokenKind::OpenParen)?;
        while !self.at(TokenKind::CloseParen) {
            let argument = self.parse_expression()?;
            self.ast.add_child(node, argument);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::CloseParen)?;
        Ok(self.finish(node, token.span))
    }

    fn parse_exit(&mut self) -> Result<NodeId, ParseError> {
        let token = self.bump();
        let node = self.node(NodeKind::ExitExpression, token.image.to_ascii_lowercase(), token.span);
        if self.eat(TokenKind::OpenParen) {
            if !self.at(TokenKind::CloseParen) {
                let status = self.parse_expression()?;
                self.ast.add_child(node, status);
            }
            self.expect(TokenKind::CloseParen)?;
        }
        Ok(self.finish(node, token.span))
    }

    fn parse_array(&mut self, short: bool) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let close = if short {
            TokenKind::CloseBracket
        } else {
            self.expect(TokenKind::OpenParen)?;
            TokenKind::CloseParen
        };
        let node = self.node(NodeKind::Array, "", start);
        if short {
            self.set_flag(node, NodeFlags::SHORT_SYNTAX);
        }
        self.parse_array_elements(node, close)?;
        Ok(self.finish(node, start))
    }

    fn parse_list(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        self.expect(TokenKind::OpenParen)?;
        let node = self.node(NodeKind::Array, "list", start);
        self.parse_array_elements(node, TokenKind::CloseParen)?;
        self.finish(node, start);
        self.into_list(node)?;
        Ok(node)
    }

    fn parse_array_elements(&mut self, owner: NodeId, close: TokenKind) -> Result<(), ParseError> {
        while !self.at(close) {
            if self.eat(TokenKind::Comma) {
                continue;
            }
            let element = self.parse_array_element()?;
            self.ast.add_child(owner, element);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(close)?;
        Ok(())
    }

    fn parse_array_element(&mut self) -> Result<NodeId, ParseError> {
        let start = self.current_token().span;
        let node = self.node(NodeKind::ArrayElement, "", start);
        if self.eat(TokenKind::Ellipsis) {
            self.set_flag(node, NodeFlags::VARIADIC);
        }
        let mut by_ref = self.eat(TokenKind::Ampersand);
        let first = self.parse_expr(ASSIGNMENT_BP - 1)?;
        self.ast.add_child(node, first);

        if !by_ref && self.eat(TokenKind::DoubleArrow) {
            by_ref = self.eat(TokenKind::Ampersand);
            let value = self.parse_expr(ASSIGNMENT_BP - 1)?;
            self.ast.add_child(node, value);
        }
        if by_ref {
            self.set_flag(node, NodeFlags::BY_REF);
        }
        Ok(self.finish(node, start))
    }

    /// Turns a parsed array literal into a destructuring list. Plain
    /// elements are replaced by their target; keyed and by-ref elements stay.
    pub(super) fn into_list(&mut self, array: NodeId) -> Result<(), ParseError> {
        self.ast.node_mut(array).kind = NodeKind::ListExpression;
        if self.ast.image(array).is_empty() {
            self.ast.node_mut(array).image = "[".to_string();
        }
        for element in self.ast.children(array).to_vec() {
            if self.ast.kind(element) != NodeKind::ArrayElement {
                continue;
            }
            let targets = self.ast.children(element).to_vec();
            let Some(&target) = targets.last() else {
                continue;
            };
            if self.ast.kind(target) == NodeKind::Array {
                self.into_list(target)?;
            }
            if targets.len() == 1 && self.ast[element].metadata.flags.is_empty() {
                let span = self.ast.span(element);
                self.ast
                    .replace_child(array, element, target)
                    .map_err(|err| self.invalid_state(span, err.to_string()))?;
            }
        }
        Ok(())
    }

    fn parse_allocation(&mut self) -> Result<NodeId, ParseError> {
        let start = self.bump().span;
        let node = self.node(NodeKind::AllocationExpression, "new", start);

        match self.current_token().kind {
            TokenKind::Class => {
                self.parse_anonymous_class(node)?;
                return Ok(self.finish(node, start));
            }
            TokenKind::Identifier | TokenKind::NsSeparator | TokenKind::Namespace | TokenKind::Static => {
                let class = self.parse_class_name_reference(NodeKind::ClassReference)?;
                self.ast.add_child(node, class);
            }
            TokenKind::OpenParen => {
                self.bump();
                let class = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;
                self.ast.add_child(node, class);
            }
            _ => {
                let class = self.parse_dynamic_class_name()?;
                self.ast.add_child(node, class);
            }
        }

        if self.at(TokenKind::OpenParen) {
            let arguments = self.parse_arguments()?;
            self.ast.add_child(node, arguments);
        }
        Ok(self.finish(node, start))
    }

    fn parse_dynamic_class_name(&mut self) -> Result<NodeId, ParseError> {
        let mut left = self.parse_simple_variable()?;
        loop {
            let token = self.current_token();
            let start = self.ast.span(left);
            left = match token.kind {
                TokenKind::OpenBracket => {
                    self.bump();
                    let node = self.node(NodeKind::ArrayIndexExpression, "[", start);
                    self.ast.add_child(node, left);
                    let index = self.parse_expression()?;
                    self.ast.add_child(node, index);
                    self.expect(TokenKind::CloseBracket)?;
                    self.finish(node, start)
                }
                TokenKind::Arrow | TokenKind::NullSafeArrow | TokenKind::DoubleColon => {
                    self.bump();
                    let node = self.node(NodeKind::MemberPrimaryPrefix, token.image.clone(), start);
                    self.ast.add_child(node, left);
                    let member_token = self.current_token();
                    let member = match member_token.kind {
                        TokenKind::Variable => {
                            self.bump();
                            self.node(NodeKind::Variable, member_token.image.clone(), member_token.span)
                        }
                        kind if kind == TokenKind::Identifier || kind.is_semi_reserved() => {
                            self.bump();
                            self.node(NodeKind::Identifier, member_token.image.clone(), member_token.span)
                        }
                        _ => return Err(self.unexpected()),
                    };
                    let postfix = self.node(NodeKind::PropertyPostfix, member_token.image.clone(), member_token.span);
                    self.ast.add_child(postfix, member);
                    self.ast.add_child(node, postfix);
                    self.finish(node, start)
                }
                _ => return Ok(left),
            };
        }
    }

    fn parse_closure(&mut self, start: Span, is_static: bool) -> Result<NodeId, ParseError> {
        let keyword = self.bump();
        let arrow = keyword.kind == TokenKind::Fn;
        let node = self.node(NodeKind::Closure, keyword.image.to_ascii_lowercase(), start);
        if is_static {
            self.set_flag(node, NodeFlags::STATIC);
        }
        if arrow {
            self.set_flag(node, NodeFlags::ARROW);
        }
        if self.eat(TokenKind::Ampersand) {
            self.set_flag(node, NodeFlags::RETURNS_REF);
        }

        let (parameters, _) = self.parse_formal_parameters(false)?;
        self.ast.add_child(node, parameters);

        if !arrow && self.at(TokenKind::Use) {
            let use_start = self.bump().span;
            let uses = self.node(NodeKind::ClosureUse, "use", use_start);
            self.expect(TokenKind::OpenParen)?;
            while !self.at(TokenKind::CloseParen) {
                let by_ref = self.eat(TokenKind::Ampersand);
                let token = self.expect(TokenKind::Variable)?;
                let variable = self.node(NodeKind::Variable, token.image.clone(), token.span);
                if by_ref {
                    self.set_flag(variable, NodeFlags::BY_REF);
                }
                self.ast.add_child(uses, variable);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::CloseParen)?;
            self.finish(uses, use_start);
            self.ast.add_child(node, uses);
        }
        self.parse_return_type(node)?;

        let body = if arrow {
            self.expect(TokenKind::DoubleArrow)?;
            self.parse_expr(ASSIGNMENT_BP - 1)?
        } else {
            self.parse_scope()?
        };
        self.ast.add_child(node, body);
        Ok(self.finish(node, start))
    }

    /// Double-quoted strings, heredocs and backticks. Embedded variables with
    /// their simple `[..]` or `->` suffix, and `{$..}` / `${..}` segments,
    /// become children positioned inside the literal.
    fn parse_interpolated(&mut self, kind: NodeKind, token: &'a Token) -> Result<NodeId, ParseError> {
        self.bump();
        let node = self.node(kind, token.image.clone(), token.span);
        let text = token.image.as_str();
        let bytes = text.as_bytes();
        let at = ImagePositions { lines: LineIndex::new(bytes), origin: token.span };
        let mut i = 0;

        while i < bytes.len() {
            let part = match (bytes[i], bytes.get(i + 1).copied()) {
                (b'\\', _) => {
                    i += 2;
                    continue;
                }
                (b'{', Some(b'$')) => match closing_brace(bytes, i) {
                    Some(close) => {
                        let (line, column) = at.position(i + 1);
                        Some((self.parse_embedded(&text[i + 1..close], line, column)?, close + 1))
                    }
                    None => None,
                },
                (b'$', Some(b'{')) => match closing_brace(bytes, i + 1) {
                    Some(close) => Some((self.parse_dollar_brace(text, i, close, &at)?, close + 1)),
                    None => None,
                },
                (b'$', Some(c)) if is_name_start(c) => Some(self.parse_simple_interpolation(text, i, &at)),
                _ => None,
            };
            match part {
                Some((child, next)) => {
                    self.ast.add_child(node, child);
                    i = next;
                }
                None => i += 1,
            }
        }
        Ok(node)
    }

    fn parse_simple_interpolation(&mut self, text: &str, start: usize, at: &ImagePositions) -> (NodeId, usize) {
        let bytes = text.as_bytes();
        let name_end = start + 1 + name_length(&bytes[start + 1..]);
        let variable = self.node(NodeKind::Variable, &text[start..name_end], at.span(start, name_end - 1));
        let rest = &text[name_end..];

        if let Some(close) = rest.strip_prefix('[').and_then(|inner| inner.find(']')) {
            let key = &rest[1..=close];
            if let Some(kind) = offset_kind(key) {
                let key_start = name_end + 1;
                let index = self.node(kind, key, at.span(key_start, key_start + key.len() - 1));
                let end = key_start + key.len();
                let node = self.node(NodeKind::ArrayIndexExpression, "[", at.span(start, end));
                self.ast.add_child(node, variable);
                self.ast.add_child(node, index);
                return (node, end + 1);
            }
        }

        let arrow = ["->", "?->"].into_iter().find(|arrow| rest.starts_with(arrow));
        if let Some(arrow) = arrow {
            let member_start = name_end + arrow.len();
            let member_len = match bytes.get(member_start) {
                Some(&c) if is_name_start(c) => name_length(&bytes[member_start..]),
                _ => 0,
            };
            if member_len > 0 {
                let member_end = member_start + member_len;
                let name = &text[member_start..member_end];
                let member_span = at.span(member_start, member_end - 1);
                let identifier = self.node(NodeKind::Identifier, name, member_span);
                let postfix = self.node(NodeKind::PropertyPostfix, name, member_span);
                self.ast.add_child(postfix, identifier);
                let node = self.node(NodeKind::MemberPrimaryPrefix, arrow, at.span(start, member_end - 1));
                self.ast.add_child(node, variable);
                self.ast.add_child(node, postfix);
                return (node, member_end);
            }
        }
        (variable, name_end)
    }

    fn parse_dollar_brace(
        &mut self,
        text: &str,
        start: usize,
        close: usize,
        at: &ImagePositions,
    ) -> Result<NodeId, ParseError> {
        let inner = &text[start + 2..close];
        let inner_bytes = inner.as_bytes();
        let name = match inner_bytes.first() {
            Some(&c) if is_name_start(c) => name_length(inner_bytes),
            _ => 0,
        };
        if name > 0 && name == inner.len() {
            return Ok(self.node(NodeKind::Variable, format!("${inner}"), at.span(start, close)));
        }
        if name > 0 && inner_bytes.get(name) == Some(&b'[') {
            // The `{` stands in for the `$` of the rewritten fragment.
            let (line, column) = at.position(start + 1);
            let node = self.parse_embedded(&format!("${inner}"), line, column)?;
            self.ast.node_mut(node).span = at.span(start, close);
            return Ok(node);
        }

        let (line, column) = at.position(start + 2);
        let expression = self.parse_embedded(inner, line, column)?;
        let node = self.node(NodeKind::CompoundVariable, "$", at.span(start, close));
        self.ast.add_child(node, expression);
        Ok(node)
    }

    /// Parses `source`, one expression found at `line`/`column` of this file,
    /// with the current namespace, imports and scopes, and copies the result
    /// into this unit's tree.
    fn parse_embedded(&mut self, source: &str, line: u32, column: u32) -> Result<NodeId, ParseError> {
        let tokens = Lexer::scripting(source)
            .map(|mut token| {
                token.span = relocate(token.span, line, column);
                token
            })
            .collect();
        let stream = TokenStream::new(tokens);
        let mut embedded = Parser::new(&stream, self.builder);
        embedded.file = self.file.clone();
        embedded.file_id = self.file_id;
        embedded.namespace = self.namespace.clone();
        embedded.imports = self.imports.clone();
        embedded.classes = mem::take(&mut self.classes);
        embedded.dependencies = mem::take(&mut self.dependencies);

        let parsed = embedded.parse_expression().and_then(|id| {
            if embedded.at(TokenKind::Eof) { Ok(id) } else { Err(embedded.unexpected()) }
        });
        self.classes = mem::take(&mut embedded.classes);
        self.dependencies = mem::take(&mut embedded.dependencies);
        let id = parsed?;
        Ok(self.ast.import(&embedded.ast, id))
    }
}

struct ImagePositions {
    lines: LineIndex,
    origin: Span,
}

impl ImagePositions {
    fn position(&self, offset: usize) -> (u32, u32) {
        match self.lines.position(offset) {
            (1, column) => (self.origin.start_line, self.origin.start_column + column - 1),
            (line, column) => (self.origin.start_line + line - 1, column),
        }
    }

    fn span(&self, first: usize, last: usize) -> Span {
        let (start_line, start_column) = self.position(first);
        let (end_line, end_column) = self.position(last);
        Span::new(start_line, start_column, end_line, end_column)
    }
}

fn relocate(span: Span, line: u32, column: u32) -> Span {
    let place = |l: u32, c: u32| {
        if l <= 1 { (line, column + c.saturating_sub(1)) } else { (line + l - 1, c) }
    };
    let (start_line, start_column) = place(span.start_line, span.start_column);
    let (end_line, end_column) = place(span.end_line, span.end_column);
    Span::new(start_line, start_column, end_line, end_column)
}

fn is_name_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c >= 0x80
}

fn name_length(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|&&c| is_name_start(c) || c.is_ascii_digit()).count()
}

fn closing_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn offset_kind(key: &str) -> Option<NodeKind> {
    let is_name = |b: &[u8]| b.first().is_some_and(|&c| is_name_start(c)) && name_length(b) == b.len();
    let digits = key.strip_prefix('-').unwrap_or(key);
    if let Some(variable) = key.strip_prefix('$') {
        is_name(variable.as_bytes()).then_some(NodeKind::Variable)
    } else if !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit()) {
        Some(NodeKind::Literal)
    } else {
        is_name(key.as_bytes()).then_some(NodeKind::Literal)
    }
}
