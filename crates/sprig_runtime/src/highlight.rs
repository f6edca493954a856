//! Syntax highlighting for the REPL.

use std::borrow::Cow;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const COMMENT: &str = "\x1b[2;3m";
const STRING: &str = "\x1b[33m";
const NUMBER: &str = "\x1b[35m";
const QUOTE: &str = "\x1b[36m";
const SPECIAL_FORM: &str = "\x1b[32m";
const DEFINITION: &str = "\x1b[1;32m";
const BOOLEAN: &str = "\x1b[34m";
const PRIMITIVE: &str = "\x1b[33m";
const PORT: &str = "\x1b[35m";

/// Highlighter for Sprig source.
#[derive(Clone, Copy, Debug, Default)]
pub struct SprigHighlighter;

impl SprigHighlighter {
    /// Creates a new highlighter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the color for a symbol, if it has one.
    #[must_use]
    pub fn symbol_color(word: &str) -> Option<&'static str> {
        match word {
            "def" | "defmacro" | "use" => Some(DEFINITION),
            "fn" | "let" | "if" | "cond" | "do" | "and" | "or" | "rec" | "set!" | "debug" | "quote"
            | "quasiquote" | "unquote" | "unquote-splicing" => Some(SPECIAL_FORM),
            "true" | "false" => Some(BOOLEAN),
            "fst" | "rest" | "len" | "dissolve" | "not" | "mod" | "write" | "::" => Some(PRIMITIVE),
            "stdout" | "stderr" => Some(PORT),
            _ => None,
        }
    }

    /// Highlights a line of input.
    #[allow(clippy::unused_self)]
    #[must_use]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut chars = line.chars().peekable();
        let mut in_string = false;

        while let Some(c) = chars.next() {
            if in_string {
                result.push(c);
                match c {
                    '\\' => {
                        if let Some(next) = chars.next() {
                            result.push(next);
                        }
                    }
                    '"' => {
                        result.push_str(RESET);
                        in_string = false;
                    }
                    _ => {}
                }
                continue;
            }

            match c {
                ';' => {
                    result.push_str(COMMENT);
                    result.push(c);
                    result.extend(chars.by_ref());
                    result.push_str(RESET);
                }

                '"' => {
                    result.push_str(STRING);
                    result.push(c);
                    in_string = true;
                }

                '\'' | '`' | '~' => {
                    result.push_str(QUOTE);
                    result.push(c);
                    if let Some(at) = chars.next_if_eq(&'@') {
                        result.push(at);
                    }
                    result.push_str(RESET);
                }

                '(' | ')' | '[' | ']' => {
                    result.push_str(BOLD);
                    result.push(c);
                    result.push_str(RESET);
                }

                c if c.is_whitespace() => result.push(c),

                c => {
                    let mut word = String::from(c);
                    while let Some(next) = chars.next_if(|&n| !is_delimiter(n)) {
                        word.push(next);
                    }

                    let color = if is_integer(&word) {
                        Some(NUMBER)
                    } else {
                        Self::symbol_color(&word)
                    };
                    match color {
                        Some(color) => {
                            result.push_str(color);
                            result.push_str(&word);
                            result.push_str(RESET);
                        }
                        None => result.push_str(&word),
                    }
                }
            }
        }

        if in_string {
            result.push_str(RESET);
        }

        Cow::Owned(result)
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '"' | ';' | '\'' | '`' | '~')
}

fn is_integer(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
