//! Lexer for Sprig source.
//!
//! A symbol is any run of characters that are neither whitespace nor one of
//! the reserved characters `( ) [ ] " ; ' `` ` `` ~`. Runs that read as an
//! integer (an optional `-` followed by digits) become integer tokens.

use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Lexer for Sprig source code.
pub struct Lexer<'src> {
    /// Source text being tokenized.
    source: &'src str,
    /// Remaining source text.
    rest: &'src str,
    /// Current byte offset in source.
    position: usize,
    /// Current line number (1-based).
    line: u32,
    /// Current column number (1-based).
    column: u32,
}

impl<'src> Lexer<'src> {
    /// Creates a new lexer for the given source.
    #[must_use]
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            rest: source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Returns the next token from the source.
    ///
    /// After the end of input every call returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start = self.position;
        let start_line = self.line;
        let start_column = self.column;

        let Some(c) = self.peek_char() else {
            return Token::new(
                TokenKind::Eof,
                Span::new(start, start, start_line, start_column),
            );
        };

        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '\'' => self.single(TokenKind::Quote),
            '`' => self.single(TokenKind::Backtick),
            '~' => {
                self.advance();
                if self.peek_char() == Some('@') {
                    self.advance();
                    TokenKind::UnquoteSplice
                } else {
                    TokenKind::Unquote
                }
            }
            ';' => self.scan_comment(),
            '"' => self.scan_string(),
            _ => self.scan_atom(),
        };

        Token::new(
            kind,
            Span::new(start, self.position, start_line, start_column),
        )
    }

    /// Tokenizes all source, ending with `Eof`.
    ///
    /// Comments are included in the output.
    #[must_use]
    pub fn tokenize_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn peek_char(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            let len = c.len_utf8();
            self.rest = &self.rest[len..];
            self.position += len;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Scans a comment starting with `;`.
    fn scan_comment(&mut self) -> TokenKind {
        let start = self.position;
        while self.peek_char().is_some_and(|c| c != '\n') {
            self.advance();
        }
        TokenKind::Comment(self.source[start..self.position].to_string())
    }

    /// Scans a string literal.
    ///
    /// A bad escape does not end the token; the rest of the literal is
    /// consumed so lexing resumes after the closing quote.
    fn scan_string(&mut self) -> TokenKind {
        self.advance(); // opening '"'
        let mut text = String::new();
        let mut bad_escape = None;
        loop {
            match self.peek_char() {
                Some('"') => {
                    self.advance();
                    return match bad_escape {
                        Some(c) => TokenKind::Error(format!("invalid escape sequence: \\{c}")),
                        None => TokenKind::String(text),
                    };
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.peek_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some(c) => {
                            bad_escape.get_or_insert(c);
                            c
                        }
                        None => {
                            return TokenKind::Error("unexpected end of input in string escape".into());
                        }
                    };
                    self.advance();
                    text.push(escaped);
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
                None => return TokenKind::Error("unterminated string literal".into()),
            }
        }
    }

    /// Scans a symbol, integer or boolean.
    fn scan_atom(&mut self) -> TokenKind {
        let start = self.position;
        while self.peek_char().is_some_and(is_symbol_char) {
            self.advance();
        }
        let text = &self.source[start..self.position];

        match text {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ if looks_numeric(text) => match text.parse::<i64>() {
                Ok(n) => TokenKind::Int(n),
                Err(e) => TokenKind::Error(format!("invalid integer {text}: {e}")),
            },
            _ => TokenKind::Symbol(text.to_string()),
        }
    }
}

/// Returns true if `c` can appear in a symbol.
pub fn is_symbol_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'' | '`' | '~')
}

/// A digit, or `-` followed by a digit.
fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    digits.starts_with(|c: char| c.is_ascii_digit())
}
