use super::Lexer;
use super::token::{Token, TokenKind};

/// Ordered, immutable token sequence handed to the parser.
///
/// Comments are dropped from the significant sequence; a doc comment is
/// remembered against the first significant token that follows it.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
    doc_comments: Vec<Option<String>>,
}

impl TokenStream {
    pub fn new(raw: Vec<Token>) -> Self {
        let mut tokens = Vec::with_capacity(raw.len());
        let mut doc_comments = Vec::with_capacity(raw.len());
        let mut pending = None;

        for token in raw {
            match token.kind {
                TokenKind::DocComment => pending = Some(token.image),
                TokenKind::Comment => {}
                _ => {
                    doc_comments.push(pending.take());
                    tokens.push(token);
                }
            }
        }

        if tokens.last().is_none_or(|t| t.kind != TokenKind::Eof) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            doc_comments.push(None);
            tokens.push(Token::new(TokenKind::Eof, "", span));
        }

        Self { tokens, doc_comments }
    }

    pub fn from_source(source: &str) -> Self {
        Self::new(Lexer::tokenize(source))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.len() <= 1
    }

    /// Token at `index`; out-of-range indexes yield the trailing `Eof`.
    pub fn get(&self, index: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[index.min(last)]
    }

    pub fn doc_comment(&self, index: usize) -> Option<&str> {
        self.doc_comments.get(index).and_then(|c| c.as_deref())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Tokens in `start..=end`, clamped to the stream.
    pub fn slice(&self, start: usize, end: usize) -> &[Token] {
        let end = (end + 1).min(self.tokens.len());
        &self.tokens[start.min(end)..end]
    }
}
