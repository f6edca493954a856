//! Integration tests for the lexer
//!
//! Tests tokenization of all token types, spans, and error tokens.

use sprig_language::{Lexer, Span, TokenKind};

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::tokenize_all(source).into_iter().map(|t| t.kind).collect()
}

fn sym(name: &str) -> TokenKind {
    TokenKind::Symbol(name.to_string())
}

// =============================================================================
// Atoms
// =============================================================================

#[test]
fn small_program() {
    assert_eq!(
        kinds("(def fac (fn [n] n))"),
        vec![
            TokenKind::LParen,
            sym("def"),
            sym("fac"),
            TokenKind::LParen,
            sym("fn"),
            TokenKind::LBracket,
            sym("n"),
            TokenKind::RBracket,
            sym("n"),
            TokenKind::RParen,
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn integers_and_negative_literals() {
    assert_eq!(
        kinds("0 42 -9"),
        vec![TokenKind::Int(0), TokenKind::Int(42), TokenKind::Int(-9), TokenKind::Eof]
    );
}

#[test]
fn extreme_integers() {
    assert_eq!(kinds("9223372036854775807")[0], TokenKind::Int(i64::MAX));
    assert_eq!(kinds("-9223372036854775808")[0], TokenKind::Int(i64::MIN));
    assert!(matches!(kinds("9223372036854775808")[0], TokenKind::Error(_)));
}

#[test]
fn operator_symbols() {
    assert_eq!(
        kinds("+ - * / <= >= :: set!"),
        vec![
            sym("+"),
            sym("-"),
            sym("*"),
            sym("/"),
            sym("<="),
            sym(">="),
            sym("::"),
            sym("set!"),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn booleans_are_keywords_only_when_whole() {
    assert_eq!(kinds("true")[0], TokenKind::True);
    assert_eq!(kinds("false?")[0], sym("false?"));
}

// =============================================================================
// Strings
// =============================================================================

#[test]
fn string_escapes() {
    assert_eq!(
        kinds(r#""a\tb\n\"q\"\\""#)[0],
        TokenKind::String("a\tb\n\"q\"\\".to_string())
    );
}

#[test]
fn string_with_delimiters_inside() {
    assert_eq!(kinds(r#""(]""#)[0], TokenKind::String("(]".to_string()));
}

#[test]
fn bad_escape_resumes_after_the_literal() {
    let tokens = kinds(r#""\x" 1"#);
    assert!(matches!(tokens[0], TokenKind::Error(ref m) if m.contains("escape")));
    assert_eq!(tokens[1], TokenKind::Int(1));
}

#[test]
fn unterminated_string() {
    assert!(matches!(kinds("\"open")[0], TokenKind::Error(ref m) if m.contains("unterminated")));
}

// =============================================================================
// Reader Macros and Comments
// =============================================================================

#[test]
fn quote_family() {
    assert_eq!(
        kinds("'a `b ~c ~@d"),
        vec![
            TokenKind::Quote,
            sym("a"),
            TokenKind::Backtick,
            sym("b"),
            TokenKind::Unquote,
            sym("c"),
            TokenKind::UnquoteSplice,
            sym("d"),
            TokenKind::Eof,
        ]
    );
}

#[test]
fn comments_run_to_end_of_line() {
    assert_eq!(
        kinds("1 ; one\n2"),
        vec![
            TokenKind::Int(1),
            TokenKind::Comment("; one".to_string()),
            TokenKind::Int(2),
            TokenKind::Eof,
        ]
    );
    assert!(TokenKind::Comment(String::new()).is_trivia());
}

// =============================================================================
// Spans
// =============================================================================

#[test]
fn spans_track_lines_and_columns() {
    let tokens = Lexer::tokenize_all("(a\n  bc)");
    assert_eq!(tokens[0].span, Span::new(0, 1, 1, 1));
    assert_eq!(tokens[1].span, Span::new(1, 2, 1, 2));
    assert_eq!(tokens[2].span, Span::new(5, 7, 2, 3));
    assert_eq!(tokens[2].text("(a\n  bc)"), Some("bc"));
}

#[test]
fn columns_count_characters() {
    let tokens = Lexer::tokenize_all("\"é\" x");
    assert_eq!(tokens[1].span.column, 5);
}

#[test]
fn eof_repeats() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next_token().kind, sym("x"));
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().kind, TokenKind::Eof);
}
