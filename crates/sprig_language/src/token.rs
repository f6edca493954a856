//! Token types for Sprig source.
//!
//! Lexer output: a kind plus the span it was read from.

use crate::span::Span;

/// One lexed token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    /// What was read.
    pub kind: TokenKind,
    /// Where it was read.
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub const fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Slices the token's text out of `source`.
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> Option<&'a str> {
        self.span.text(source)
    }

    /// Returns true for `(` and `[`.
    #[must_use]
    pub const fn is_open_delimiter(&self) -> bool {
        matches!(self.kind, TokenKind::LParen | TokenKind::LBracket)
    }

    /// Returns true for `)` and `]`.
    #[must_use]
    pub const fn is_close_delimiter(&self) -> bool {
        matches!(self.kind, TokenKind::RParen | TokenKind::RBracket)
    }
}

/// Token types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Delimiters
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `[`
    LBracket,
    /// `]`
    RBracket,

    // Literals
    /// `true`
    True,
    /// `false`
    False,
    /// Integer literal like `42` or `-17`
    Int(i64),
    /// String literal, escapes already processed
    String(String),
    /// Symbol like `fac`, `::` or `&rest`
    Symbol(String),

    // Reader macros
    /// `'` for quote
    Quote,
    /// `` ` `` for quasiquote
    Backtick,
    /// `~` for unquote
    Unquote,
    /// `~@` for unquote-splicing
    UnquoteSplice,

    // Meta
    /// `;` line comment, text included
    Comment(String),
    /// End of input
    Eof,
    /// Lexer error
    Error(String),
}

impl TokenKind {
    /// Comments are skipped by the parser.
    #[must_use]
    pub const fn is_trivia(&self) -> bool {
        matches!(self, Self::Comment(_))
    }

    /// Name used in parse error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::True => "true",
            Self::False => "false",
            Self::Int(_) => "integer",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Quote => "quote",
            Self::Backtick => "backtick",
            Self::Unquote => "unquote",
            Self::UnquoteSplice => "unquote-splice",
            Self::Comment(_) => "comment",
            Self::Eof => "end of input",
            Self::Error(_) => "error",
        }
    }
}
