use serde::{Deserialize, Serialize};

use crate::span::Span;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub image: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, image: impl Into<String>, span: Span) -> Self {
        Self { kind, image: image.into(), span }
    }

    pub fn start_line(&self) -> u32 {
        self.span.start_line
    }

    pub fn start_column(&self) -> u32 {
        self.span.start_column
    }

    pub fn end_line(&self) -> u32 {
        self.span.end_line
    }

    pub fn end_column(&self) -> u32 {
        self.span.end_column
    }

    /// Case-insensitive comparison of the token image.
    pub fn is_ident(&self, ident: &str) -> bool {
        self.image.eq_ignore_ascii_case(ident)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Keywords
    Function, Class, Interface, Trait, Extends, Implements,
    If, Else, ElseIf, EndIf, Return, Echo, Print,
    While, Do, For, Foreach, EndWhile, EndFor, EndForeach, As, Switch, EndSwitch, Case, Default, Break, Continue, Goto,
    Try, Catch, Finally, Throw,
    Public, Protected, Private, Static, Abstract, Final, Readonly, Var,
    Namespace, Use, Global, Insteadof,
    New, Clone, InstanceOf,
    Array, Callable, Const,
    Include, IncludeOnce, Require, RequireOnce, Eval, Exit,
    Empty, Isset, Unset, List,
    Yield,
    Declare, EndDeclare, Fn,
    HaltCompiler, // __halt_compiler
    Attribute, // #[

    // Magic Constants
    Line, File, Dir, ClassC, TraitC, MethodC, FuncC, NsC,

    // Casts
    IntCast, FloatCast, StringCast, ArrayCast, ObjectCast, BoolCast, UnsetCast,

    // Identifiers & Literals
    Identifier,
    LNumber,
    DNumber,
    StringLiteral, // '...'
    InterpolatedString, // "..."
    ShellExec, // `...`
    Heredoc, // <<<LABEL ... LABEL, nowdoc included
    Variable,
    InlineHtml,
    Dollar, // $ (for variable variables like $$a)
    NsSeparator, // \

    // Comments
    Comment,
    DocComment,

    // Symbols
    Arrow, // ->
    NullSafeArrow, // ?->
    DoubleArrow, // =>
    DoubleColon, // ::
    Ellipsis, // ...

    Plus, Minus, Asterisk, Slash, Percent, Dot,
    Pow, // **
    Inc, Dec, // ++, --

    Eq, // =
    PlusEq, MinusEq, MulEq, DivEq, ModEq, ConcatEq, PowEq,
    AndEq, OrEq, XorEq, SlEq, SrEq, CoalesceEq,

    EqEq, // ==
    EqEqEq, // ===
    Bang, // !
    BangEq, // != and <>
    BangEqEq, // !==
    Lt, // <
    LtEq, // <=
    Gt, // >
    GtEq, // >=
    Spaceship, // <=>

    Ampersand, // &
    Pipe, // |
    Caret, // ^
    BitNot, // ~
    Sl, // <<
    Sr, // >>

    AmpersandAmpersand, // &&
    PipePipe, // ||
    LogicalAnd, // and
    LogicalOr, // or
    LogicalXor, // xor
    Question, // ?
    Coalesce, // ??
    At, // @

    SemiColon,
    Colon,
    Comma,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,

    OpenTag, // <?php
    OpenTagEcho, // <?=
    CloseTag, // ?>

    Eof,

    // Error token for lexing failures
    Error,
}

impl TokenKind {
    /// Keywords that may still appear where PHP expects an identifier:
    /// member names after `->`/`::`, method and constant names.
    pub fn is_semi_reserved(&self) -> bool {
        matches!(
            self,
            TokenKind::Function
                | TokenKind::Class
                | TokenKind::Interface
                | TokenKind::Trait
                | TokenKind::Extends
                | TokenKind::Implements
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::ElseIf
                | TokenKind::EndIf
                | TokenKind::Return
                | TokenKind::Echo
                | TokenKind::Print
                | TokenKind::While
                | TokenKind::Do
                | TokenKind::For
                | TokenKind::Foreach
                | TokenKind::EndWhile
                | TokenKind::EndFor
                | TokenKind::EndForeach
                | TokenKind::As
                | TokenKind::Switch
                | TokenKind::EndSwitch
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Goto
                | TokenKind::Try
                | TokenKind::Catch
                | TokenKind::Finally
                | TokenKind::Throw
                | TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
                | TokenKind::Var
                | TokenKind::Namespace
                | TokenKind::Use
                | TokenKind::Global
                | TokenKind::Insteadof
                | TokenKind::New
                | TokenKind::Clone
                | TokenKind::InstanceOf
                | TokenKind::Array
                | TokenKind::Callable
                | TokenKind::Const
                | TokenKind::Include
                | TokenKind::IncludeOnce
                | TokenKind::Require
                | TokenKind::RequireOnce
                | TokenKind::Eval
                | TokenKind::Exit
                | TokenKind::Empty
                | TokenKind::Isset
                | TokenKind::Unset
                | TokenKind::List
                | TokenKind::Yield
                | TokenKind::Declare
                | TokenKind::EndDeclare
                | TokenKind::Fn
                | TokenKind::LogicalAnd
                | TokenKind::LogicalOr
                | TokenKind::LogicalXor
                | TokenKind::Line
                | TokenKind::File
                | TokenKind::Dir
                | TokenKind::ClassC
                | TokenKind::TraitC
                | TokenKind::MethodC
                | TokenKind::FuncC
                | TokenKind::NsC
        )
    }

    pub fn is_trivia(&self) -> bool {
        matches!(self, TokenKind::Comment | TokenKind::DocComment)
    }

    pub fn is_cast(&self) -> bool {
        matches!(
            self,
            TokenKind::IntCast
                | TokenKind::FloatCast
                | TokenKind::StringCast
                | TokenKind::ArrayCast
                | TokenKind::ObjectCast
                | TokenKind::BoolCast
                | TokenKind::UnsetCast
        )
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::MulEq
                | TokenKind::DivEq
                | TokenKind::ModEq
                | TokenKind::ConcatEq
                | TokenKind::PowEq
                | TokenKind::AndEq
                | TokenKind::OrEq
                | TokenKind::XorEq
                | TokenKind::SlEq
                | TokenKind::SrEq
                | TokenKind::CoalesceEq
        )
    }

    pub fn is_member_modifier(&self) -> bool {
        matches!(
            self,
            TokenKind::Public
                | TokenKind::Protected
                | TokenKind::Private
                | TokenKind::Static
                | TokenKind::Abstract
                | TokenKind::Final
                | TokenKind::Readonly
                | TokenKind::Var
        )
    }
}
