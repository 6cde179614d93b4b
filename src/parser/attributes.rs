use crate::error::ParseError;
use crate::lexer::token::TokenKind;
use crate::parser::Parser;

impl<'a> Parser<'a> {
    /// Consumes consecutive `#[...]` groups. Attributes carry no analysis
    /// data, so nothing is added to the tree.
    pub(super) fn skip_attributes(&mut self) -> Result<(), ParseError> {
        while self.at(TokenKind::Attribute) {
            self.bump();
            let mut depth = 1usize;
            while depth > 0 {
                match self.current_token().kind {
                    TokenKind::Eof => return Err(self.unexpected()),
                    TokenKind::OpenBracket | TokenKind::Attribute => depth += 1,
                    TokenKind::CloseBracket => depth -= 1,
                    _ => {}
                }
                self.bump();
            }
        }
        Ok(())
    }
}
