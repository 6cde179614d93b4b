pub mod stream;
pub mod token;

use crate::line_index::LineIndex;
use crate::span::Span;
use token::{Token, TokenKind};

pub use stream::TokenStream;

#[derive(Debug, Clone, Copy, PartialEq)]
enum LexerState {
    Initial,
    Scripting,
    HaltCompiler,
    RawData,
    Done,
}

/// Scans PHP source into tokens carrying their image and line/column span.
///
/// Strings, heredocs and shell commands are produced as one token each; the
/// parser splits interpolated variables out of the image when it needs them.
pub struct Lexer<'src> {
    input: &'src [u8],
    cursor: usize,
    state: LexerState,
    lines: LineIndex,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        let input = input.as_bytes();
        Self {
            input,
            cursor: 0,
            state: LexerState::Initial,
            lines: LineIndex::new(input),
        }
    }

    /// Starts inside PHP code, for fragments that carry no open tag.
    pub fn scripting(input: &'src str) -> Self {
        Self { state: LexerState::Scripting, ..Self::new(input) }
    }

    /// Lexes the whole input. The returned vector always ends with `Eof`.
    pub fn tokenize(input: &'src str) -> Vec<Token> {
        Lexer::new(input).collect()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.cursor).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.cursor + offset).copied()
    }

    fn advance(&mut self) {
        self.cursor += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.advance();
        }
    }

    fn read_identifier(&mut self) {
        while let Some(c) = self.peek() {
            // PHP allows extended ASCII in identifiers
            if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn make_token(&self, kind: TokenKind, start: usize) -> Token {
        let image = String::from_utf8_lossy(&self.input[start..self.cursor]).into_owned();
        let (start_line, start_column) = self.lines.position(start);
        let (end_line, end_column) = if self.cursor > start {
            self.lines.position(self.cursor - 1)
        } else {
            (start_line, start_column)
        };
        Token::new(kind, image, Span::new(start_line, start_column, end_line, end_column))
    }

    fn read_number(&mut self) -> TokenKind {
        if self.peek() == Some(b'0') {
            let radix = match self.peek_at(1) {
                Some(b'x' | b'X') => Some(16),
                Some(b'b' | b'B') => Some(2),
                Some(b'o' | b'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance_n(2);
                while let Some(c) = self.peek() {
                    if (c as char).is_digit(radix) || c == b'_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                return TokenKind::LNumber;
            }
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'_' {
                self.advance();
            } else if c == b'.' && !is_float && self.peek_at(1) != Some(b'.') {
                is_float = true;
                self.advance();
            } else if (c == b'e' || c == b'E')
                && (self.peek_at(1).is_some_and(|n| n.is_ascii_digit())
                    || (matches!(self.peek_at(1), Some(b'+' | b'-'))
                        && self.peek_at(2).is_some_and(|n| n.is_ascii_digit())))
            {
                is_float = true;
                self.advance_n(2);
            } else {
                break;
            }
        }

        if is_float { TokenKind::DNumber } else { TokenKind::LNumber }
    }

    fn consume_single_line_comment(&mut self) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == b'\n' || c == b'\r' {
                break;
            } else if c == b'?' && self.peek_at(1) == Some(b'>') {
                // Don't consume closing tag
                break;
            }
            self.advance();
        }
        TokenKind::Comment
    }

    fn consume_multi_line_comment(&mut self) -> TokenKind {
        // `/**/` is a plain comment, `/** ...*/` a doc comment.
        let is_doc = self.peek() == Some(b'*') && self.peek_at(1) != Some(b'/');

        while let Some(c) = self.peek() {
            self.advance();
            if c == b'*' && self.peek() == Some(b'/') {
                self.advance();
                return if is_doc { TokenKind::DocComment } else { TokenKind::Comment };
            }
        }

        TokenKind::Error // Unterminated comment
    }

    fn read_quoted(&mut self, quote: u8, kind: TokenKind) -> TokenKind {
        while let Some(c) = self.peek() {
            if c == quote {
                self.advance();
                return kind;
            } else if c == b'\\' {
                self.advance_n(2);
            } else {
                self.advance();
            }
        }
        TokenKind::Error
    }

    fn read_heredoc(&mut self) -> TokenKind {
        self.skip_blanks();

        let quote = match self.peek() {
            Some(q @ (b'\'' | b'"')) => {
                self.advance();
                Some(q)
            }
            _ => None,
        };

        let input = self.input;
        let label_start = self.cursor;
        self.read_identifier();
        let label = &input[label_start..self.cursor];
        if label.is_empty() {
            return TokenKind::Error;
        }

        if let Some(q) = quote {
            if self.peek() != Some(q) {
                return TokenKind::Error;
            }
            self.advance();
        }

        loop {
            match memchr::memchr(b'\n', &self.input[self.cursor..]) {
                Some(offset) => self.advance_n(offset + 1),
                None => {
                    self.cursor = self.input.len();
                    return TokenKind::Error;
                }
            }
            if let Some(len) = self.closing_label_len(label) {
                self.advance_n(len);
                return TokenKind::Heredoc;
            }
        }
    }

    /// Length of the closing label line prefix when the line at the cursor
    /// closes the heredoc.
    fn closing_label_len(&self, label: &[u8]) -> Option<usize> {
        let rest = &self.input[self.cursor..];
        let indent = rest.iter().take_while(|c| matches!(c, b' ' | b'\t')).count();
        let candidate = &rest[indent..];
        if !candidate.starts_with(label) {
            return None;
        }
        match candidate.get(label.len()) {
            Some(c) if c.is_ascii_alphanumeric() || *c == b'_' || *c >= 0x80 => None,
            _ => Some(indent + label.len()),
        }
    }

    /// Matches `(int)`, `( FLOAT )` and friends at the cursor (just past `(`).
    fn read_cast(&mut self) -> Option<TokenKind> {
        let saved = self.cursor;
        self.skip_blanks();
        let ident_start = self.cursor;
        self.read_identifier();
        let ident = self.input[ident_start..self.cursor].to_ascii_lowercase();
        self.skip_blanks();

        let kind = match ident.as_slice() {
            b"int" | b"integer" => Some(TokenKind::IntCast),
            b"bool" | b"boolean" => Some(TokenKind::BoolCast),
            b"float" | b"double" | b"real" => Some(TokenKind::FloatCast),
            b"string" | b"binary" => Some(TokenKind::StringCast),
            b"array" => Some(TokenKind::ArrayCast),
            b"object" => Some(TokenKind::ObjectCast),
            b"unset" => Some(TokenKind::UnsetCast),
            _ => None,
        };

        match kind {
            Some(kind) if self.peek() == Some(b')') => {
                self.advance();
                Some(kind)
            }
            _ => {
                self.cursor = saved;
                None
            }
        }
    }

    fn next_in_initial(&mut self) -> Token {
        let start = self.cursor;
        while self.cursor < self.input.len() {
            let rest = &self.input[self.cursor..];
            let tag_len = if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"<?php") {
                Some((5, TokenKind::OpenTag))
            } else if rest.starts_with(b"<?=") {
                Some((3, TokenKind::OpenTagEcho))
            } else {
                None
            };

            if let Some((len, kind)) = tag_len {
                if self.cursor > start {
                    return self.make_token(TokenKind::InlineHtml, start);
                }
                self.state = LexerState::Scripting;
                self.advance_n(len);
                if kind == TokenKind::OpenTag && self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                    self.advance();
                }
                return self.make_token(kind, start);
            }
            self.advance();
        }

        if self.cursor > start {
            return self.make_token(TokenKind::InlineHtml, start);
        }
        self.eof()
    }

    fn next_in_halt_compiler(&mut self) -> Token {
        self.skip_whitespace();
        if self.cursor >= self.input.len() {
            return self.eof();
        }

        let start = self.cursor;
        let c = self.input[self.cursor];
        self.advance();
        let kind = match c {
            b'(' => TokenKind::OpenParen,
            b')' => TokenKind::CloseParen,
            b';' => {
                self.state = LexerState::RawData;
                TokenKind::SemiColon
            }
            _ => TokenKind::Error,
        };
        self.make_token(kind, start)
    }

    fn eof(&mut self) -> Token {
        self.state = LexerState::Done;
        let offset = self.input.len().saturating_sub(1);
        let (line, column) = if self.input.is_empty() { (1, 1) } else { self.lines.position(offset) };
        Token::new(TokenKind::Eof, "", Span::new(line, column, line, column))
    }

    fn keyword(text: &[u8]) -> TokenKind {
        match text.to_ascii_lowercase().as_slice() {
            b"abstract" => TokenKind::Abstract,
            b"and" => TokenKind::LogicalAnd,
            b"array" => TokenKind::Array,
            b"as" => TokenKind::As,
            b"break" => TokenKind::Break,
            b"callable" => TokenKind::Callable,
            b"case" => TokenKind::Case,
            b"catch" => TokenKind::Catch,
            b"class" => TokenKind::Class,
            b"clone" => TokenKind::Clone,
            b"const" => TokenKind::Const,
            b"continue" => TokenKind::Continue,
            b"declare" => TokenKind::Declare,
            b"default" => TokenKind::Default,
            b"die" | b"exit" => TokenKind::Exit,
            b"do" => TokenKind::Do,
            b"echo" => TokenKind::Echo,
            b"else" => TokenKind::Else,
            b"elseif" => TokenKind::ElseIf,
            b"empty" => TokenKind::Empty,
            b"enddeclare" => TokenKind::EndDeclare,
            b"endfor" => TokenKind::EndFor,
            b"endforeach" => TokenKind::EndForeach,
            b"endif" => TokenKind::EndIf,
            b"endswitch" => TokenKind::EndSwitch,
            b"endwhile" => TokenKind::EndWhile,
            b"eval" => TokenKind::Eval,
            b"extends" => TokenKind::Extends,
            b"final" => TokenKind::Final,
            b"finally" => TokenKind::Finally,
            b"fn" => TokenKind::Fn,
            b"for" => TokenKind::For,
            b"foreach" => TokenKind::Foreach,
            b"function" => TokenKind::Function,
            b"global" => TokenKind::Global,
            b"goto" => TokenKind::Goto,
            b"if" => TokenKind::If,
            b"implements" => TokenKind::Implements,
            b"include" => TokenKind::Include,
            b"include_once" => TokenKind::IncludeOnce,
            b"instanceof" => TokenKind::InstanceOf,
            b"insteadof" => TokenKind::Insteadof,
            b"interface" => TokenKind::Interface,
            b"isset" => TokenKind::Isset,
            b"list" => TokenKind::List,
            b"namespace" => TokenKind::Namespace,
            b"new" => TokenKind::New,
            b"or" => TokenKind::LogicalOr,
            b"print" => TokenKind::Print,
            b"private" => TokenKind::Private,
            b"protected" => TokenKind::Protected,
            b"public" => TokenKind::Public,
            b"readonly" => TokenKind::Readonly,
            b"require" => TokenKind::Require,
            b"require_once" => TokenKind::RequireOnce,
            b"return" => TokenKind::Return,
            b"static" => TokenKind::Static,
            b"switch" => TokenKind::Switch,
            b"throw" => TokenKind::Throw,
            b"trait" => TokenKind::Trait,
            b"try" => TokenKind::Try,
            b"unset" => TokenKind::Unset,
            b"use" => TokenKind::Use,
            b"var" => TokenKind::Var,
            b"while" => TokenKind::While,
            b"xor" => TokenKind::LogicalXor,
            b"yield" => TokenKind::Yield,
            b"__halt_compiler" => TokenKind::HaltCompiler,
            b"__class__" => TokenKind::ClassC,
            b"__trait__" => TokenKind::TraitC,
            b"__function__" => TokenKind::FuncC,
            b"__method__" => TokenKind::MethodC,
            b"__line__" => TokenKind::Line,
            b"__file__" => TokenKind::File,
            b"__dir__" => TokenKind::Dir,
            b"__namespace__" => TokenKind::NsC,
            _ => TokenKind::Identifier,
        }
    }

    fn next_in_scripting(&mut self) -> Token {
        self.skip_whitespace();

        if self.cursor >= self.input.len() {
            return self.eof();
        }

        let start = self.cursor;
        let char = self.input[self.cursor];
        self.advance();

        let kind = match char {
            b'$' => match self.peek() {
                Some(c) if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => {
                    self.read_identifier();
                    TokenKind::Variable
                }
                _ => TokenKind::Dollar,
            },
            b'\\' => TokenKind::NsSeparator,
            b'\'' => self.read_quoted(b'\'', TokenKind::StringLiteral),
            b'"' => self.read_quoted(b'"', TokenKind::InterpolatedString),
            b'`' => self.read_quoted(b'`', TokenKind::ShellExec),
            b'#' => {
                if self.peek() == Some(b'[') {
                    self.advance();
                    TokenKind::Attribute
                } else {
                    self.consume_single_line_comment()
                }
            }
            b';' => TokenKind::SemiColon,
            b':' => {
                if self.peek() == Some(b':') {
                    self.advance();
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            b',' => TokenKind::Comma,
            b'{' => TokenKind::OpenBrace,
            b'}' => TokenKind::CloseBrace,
            b'(' => self.read_cast().unwrap_or(TokenKind::OpenParen),
            b')' => TokenKind::CloseParen,
            b'[' => TokenKind::OpenBracket,
            b']' => TokenKind::CloseBracket,
            b'+' => match self.peek() {
                Some(b'+') => {
                    self.advance();
                    TokenKind::Inc
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::PlusEq
                }
                _ => TokenKind::Plus,
            },
            b'-' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    TokenKind::Arrow
                }
                Some(b'-') => {
                    self.advance();
                    TokenKind::Dec
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::MinusEq
                }
                _ => TokenKind::Minus,
            },
            b'*' => match self.peek() {
                Some(b'*') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::PowEq
                    } else {
                        TokenKind::Pow
                    }
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::MulEq
                }
                _ => TokenKind::Asterisk,
            },
            b'/' => match self.peek() {
                Some(b'/') => {
                    self.advance();
                    self.consume_single_line_comment()
                }
                Some(b'*') => {
                    self.advance();
                    self.consume_multi_line_comment()
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::DivEq
                }
                _ => TokenKind::Slash,
            },
            b'%' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::ModEq
                } else {
                    TokenKind::Percent
                }
            }
            b'.' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    TokenKind::ConcatEq
                }
                Some(b'.') if self.peek_at(1) == Some(b'.') => {
                    self.advance_n(2);
                    TokenKind::Ellipsis
                }
                Some(c) if c.is_ascii_digit() => {
                    self.cursor -= 1;
                    self.read_number()
                }
                _ => TokenKind::Dot,
            },
            b'=' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                }
                Some(b'>') => {
                    self.advance();
                    TokenKind::DoubleArrow
                }
                _ => TokenKind::Eq,
            },
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            b'<' => {
                if self.peek() == Some(b'<') && self.peek_at(1) == Some(b'<') {
                    self.advance_n(2);
                    self.read_heredoc()
                } else if self.peek() == Some(b'=') {
                    self.advance();
                    if self.peek() == Some(b'>') {
                        self.advance();
                        TokenKind::Spaceship
                    } else {
                        TokenKind::LtEq
                    }
                } else if self.peek() == Some(b'<') {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::SlEq
                    } else {
                        TokenKind::Sl
                    }
                } else if self.peek() == Some(b'>') {
                    self.advance();
                    TokenKind::BangEq
                } else {
                    TokenKind::Lt
                }
            }
            b'>' => match self.peek() {
                Some(b'=') => {
                    self.advance();
                    TokenKind::GtEq
                }
                Some(b'>') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::SrEq
                    } else {
                        TokenKind::Sr
                    }
                }
                _ => TokenKind::Gt,
            },
            b'&' => match self.peek() {
                Some(b'&') => {
                    self.advance();
                    TokenKind::AmpersandAmpersand
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::AndEq
                }
                _ => TokenKind::Ampersand,
            },
            b'|' => match self.peek() {
                Some(b'|') => {
                    self.advance();
                    TokenKind::PipePipe
                }
                Some(b'=') => {
                    self.advance();
                    TokenKind::OrEq
                }
                _ => TokenKind::Pipe,
            },
            b'^' => {
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::XorEq
                } else {
                    TokenKind::Caret
                }
            }
            b'~' => TokenKind::BitNot,
            b'@' => TokenKind::At,
            b'?' => match self.peek() {
                Some(b'>') => {
                    self.advance();
                    // The newline directly after a close tag belongs to it.
                    if self.peek() == Some(b'\n') {
                        self.advance();
                    }
                    self.state = LexerState::Initial;
                    TokenKind::CloseTag
                }
                Some(b'?') => {
                    self.advance();
                    if self.peek() == Some(b'=') {
                        self.advance();
                        TokenKind::CoalesceEq
                    } else {
                        TokenKind::Coalesce
                    }
                }
                Some(b'-') if self.peek_at(1) == Some(b'>') => {
                    self.advance_n(2);
                    TokenKind::NullSafeArrow
                }
                _ => TokenKind::Question,
            },
            c if c.is_ascii_digit() => {
                self.cursor -= 1;
                self.read_number()
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => {
                // Binary string prefix: b'...' and b"..."
                if (c == b'b' || c == b'B') && matches!(self.peek(), Some(b'\'' | b'"')) {
                    let quote = self.input[self.cursor];
                    self.advance();
                    let kind = if quote == b'\'' {
                        TokenKind::StringLiteral
                    } else {
                        TokenKind::InterpolatedString
                    };
                    let kind = self.read_quoted(quote, kind);
                    return self.make_token(kind, start);
                }

                self.read_identifier();
                let kind = Self::keyword(&self.input[start..self.cursor]);
                if kind == TokenKind::HaltCompiler {
                    self.state = LexerState::HaltCompiler;
                }
                kind
            }
            _ => TokenKind::Error,
        };

        self.make_token(kind, start)
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            LexerState::Done => None,
            LexerState::Initial => Some(self.next_in_initial()),
            LexerState::Scripting => Some(self.next_in_scripting()),
            LexerState::HaltCompiler => Some(self.next_in_halt_compiler()),
            LexerState::RawData => {
                if self.cursor >= self.input.len() {
                    return Some(self.eof());
                }
                let start = self.cursor;
                self.cursor = self.input.len();
                Some(self.make_token(TokenKind::InlineHtml, start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn alternative_syntax_keywords_are_distinct() {
        assert_eq!(
            kinds("<?php endif endwhile endfor endforeach endswitch enddeclare insteadof"),
            vec![
                TokenKind::OpenTag,
                TokenKind::EndIf,
                TokenKind::EndWhile,
                TokenKind::EndFor,
                TokenKind::EndForeach,
                TokenKind::EndSwitch,
                TokenKind::EndDeclare,
                TokenKind::Insteadof,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn cast_keeps_verbatim_image() {
        let tokens = Lexer::tokenize("<?php ( FLOAT )$a;");
        assert_eq!(tokens[1].kind, TokenKind::FloatCast);
        assert_eq!(tokens[1].image, "( FLOAT )");
        assert_eq!(tokens[1].span, Span::new(1, 7, 1, 15));
    }

    #[test]
    fn positions_span_lines() {
        let tokens = Lexer::tokenize("<?php\n/**\n * doc\n */\nclass Foo {}");
        let doc = &tokens[1];
        assert_eq!(doc.kind, TokenKind::DocComment);
        assert_eq!(doc.span, Span::new(2, 1, 4, 3));
        let class = &tokens[2];
        assert_eq!(class.span, Span::new(5, 1, 5, 5));
    }

    #[test]
    fn heredoc_is_single_token() {
        let tokens = Lexer::tokenize("<?php $a = <<<EOT\nhello $name\nEOT;\n");
        assert_eq!(tokens[3].kind, TokenKind::Heredoc);
        assert_eq!(tokens[3].image, "<<<EOT\nhello $name\nEOT");
        assert_eq!(tokens[4].kind, TokenKind::SemiColon);
    }

    #[test]
    fn close_tag_switches_to_inline_html() {
        assert_eq!(
            kinds("<?php echo 1 ?>\n<b>html</b>"),
            vec![
                TokenKind::OpenTag,
                TokenKind::Echo,
                TokenKind::LNumber,
                TokenKind::CloseTag,
                TokenKind::InlineHtml,
                TokenKind::Eof,
            ]
        );
    }
}
