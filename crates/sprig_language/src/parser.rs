//! Parser for Sprig source.
//!
//! The parser converts a stream of tokens into AST nodes. It always runs in
//! recovering mode: a malformed form is recorded as a structured error and
//! replaced by an [`Ast::Error`] node, and parsing continues with the next
//! token. [`parse`] turns the first recorded error into a failure;
//! [`parse_recovering`] hands back both the forms and every error.
//!
//! Reader macros are desugared here: `'x` becomes `(quote x)`, `` `x ``
//! becomes `(quasiquote x)`, `~x` becomes `(unquote x)` and `~@x` becomes
//! `(unquote-splicing x)`.

use sprig_foundation::{Error, ErrorKind, Result};

use crate::ast::Ast;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parser for Sprig source code.
pub struct Parser<'src> {
    /// The lexer providing tokens.
    lexer: Lexer<'src>,
    /// Current token (lookahead).
    current: Token,
    /// Source text (for error context lines).
    source: &'src str,
    /// Errors recorded so far.
    errors: Vec<Error>,
}

impl<'src> Parser<'src> {
    /// Creates a new parser for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            source,
            errors: Vec::new(),
        }
    }

    /// Parses every form in the source.
    ///
    /// Returns the forms, with `Ast::Error` placeholders where forms were
    /// malformed, and the errors recorded for them.
    pub fn parse_all(mut self) -> (Vec<Ast>, Vec<Error>) {
        let mut forms = Vec::new();
        self.skip_trivia();

        while self.current.kind != TokenKind::Eof {
            if self.current.is_close_delimiter() {
                let span = self.current.span;
                let message = format!("unexpected {}", self.current.kind.name());
                self.advance();
                forms.push(self.fail(span, &message));
            } else {
                forms.push(self.parse_form());
            }
            self.skip_trivia();
        }

        (forms, self.errors)
    }

    /// Parses one form, recording an error on failure.
    fn parse_form(&mut self) -> Ast {
        self.skip_trivia();
        let span = self.current.span;

        match &self.current.kind {
            TokenKind::True => {
                self.advance();
                Ast::Bool(true, span)
            }
            TokenKind::False => {
                self.advance();
                Ast::Bool(false, span)
            }
            TokenKind::Int(n) => {
                let n = *n;
                self.advance();
                Ast::Int(n, span)
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ast::String(s, span)
            }
            TokenKind::Symbol(name) => {
                let name = name.clone();
                self.advance();
                Ast::Symbol(name, span)
            }
            TokenKind::LParen => self.parse_seq(&TokenKind::RParen, "list", Ast::List),
            TokenKind::LBracket => self.parse_seq(&TokenKind::RBracket, "vector", Ast::Vector),
            TokenKind::Quote => self.parse_reader_macro("quote"),
            TokenKind::Backtick => self.parse_reader_macro("quasiquote"),
            TokenKind::Unquote => self.parse_reader_macro("unquote"),
            TokenKind::UnquoteSplice => self.parse_reader_macro("unquote-splicing"),
            TokenKind::Eof => self.fail(span, "unexpected end of input"),
            TokenKind::Error(message) => {
                let message = message.clone();
                self.advance();
                self.fail(span, &message)
            }
            TokenKind::RParen | TokenKind::RBracket => {
                let message = format!("unexpected {}", self.current.kind.name());
                self.fail(span, &message)
            }
            TokenKind::Comment(_) => {
                self.advance();
                self.parse_form()
            }
        }
    }

    /// Parses `(...)` or `[...]`, the opening token being current.
    fn parse_seq(&mut self, close: &TokenKind, what: &str, build: fn(Vec<Ast>, Span) -> Ast) -> Ast {
        let start_span = self.current.span;
        self.advance();

        let mut elements = Vec::new();
        self.skip_trivia();

        loop {
            if &self.current.kind == close {
                let end_span = self.current.span;
                self.advance();
                return build(elements, start_span.to(end_span));
            }
            match self.current.kind {
                TokenKind::Eof => return self.fail(start_span, &format!("unterminated {what}")),
                TokenKind::RParen | TokenKind::RBracket => {
                    let message = format!(
                        "expected {} to close {what}, found {}",
                        close.name(),
                        self.current.kind.name()
                    );
                    let span = self.current.span;
                    self.advance();
                    return self.fail(span, &message);
                }
                _ => elements.push(self.parse_form()),
            }
            self.skip_trivia();
        }
    }

    /// Parses `'x` style prefixes into `(name x)`.
    fn parse_reader_macro(&mut self, name: &str) -> Ast {
        let start_span = self.current.span;
        self.advance();
        self.skip_trivia();

        if self.current.kind == TokenKind::Eof || self.current.is_close_delimiter() {
            return self.fail(start_span, &format!("expected form after {name}"));
        }

        let inner = self.parse_form();
        let span = start_span.to(inner.span());
        Ast::List(vec![Ast::Symbol(name.to_string(), start_span), inner], span)
    }

    /// Skips comment tokens.
    fn skip_trivia(&mut self) {
        while self.current.kind.is_trivia() {
            self.advance();
        }
    }

    fn advance(&mut self) {
        self.current = self.lexer.next_token();
    }

    /// Records a parse error and returns its placeholder node.
    fn fail(&mut self, span: Span, message: &str) -> Ast {
        self.errors.push(Error::new(ErrorKind::ParseError {
            message: message.to_string(),
            line: span.line,
            column: span.column,
            context: self.context_at(span),
        }));
        Ast::Error(message.to_string(), span)
    }

    /// The source line containing `span`.
    fn context_at(&self, span: Span) -> String {
        let start = span.start.min(self.source.len());
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line_end = self.source[start..]
            .find('\n')
            .map_or(self.source.len(), |i| start + i);
        self.source[line_start..line_end].to_string()
    }
}

/// Parses source code, failing on the first error.
///
/// # Errors
/// Returns the first parse error.
pub fn parse(source: &str) -> Result<Vec<Ast>> {
    let (forms, errors) = Parser::new(source).parse_all();
    match errors.into_iter().next() {
        Some(error) => Err(error),
        None => Ok(forms),
    }
}

/// Parses source code, continuing past errors.
///
/// Malformed forms are replaced by `Ast::Error` nodes.
#[must_use]
pub fn parse_recovering(source: &str) -> (Vec<Ast>, Vec<Error>) {
    Parser::new(source).parse_all()
}

/// Returns how many more openers than closers `source` contains, ignoring
/// delimiters inside strings and comments.
///
/// Front ends use this to decide whether to keep reading input lines.
#[must_use]
pub fn open_depth(source: &str) -> i64 {
    Lexer::tokenize_all(source)
        .iter()
        .map(|token| match token.kind {
            TokenKind::LParen | TokenKind::LBracket => 1,
            TokenKind::RParen | TokenKind::RBracket => -1,
            _ => 0,
        })
        .sum()
}
