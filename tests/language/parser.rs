//! Integration tests for the parser
//!
//! Tests parsing of all syntactic forms, error reporting, and recovery.

use sprig_foundation::ErrorKind;
use sprig_language::{Ast, Parser, open_depth, parse, parse_recovering};

fn render(source: &str) -> Vec<String> {
    parse(source)
        .unwrap_or_else(|e| panic!("{source}: {e}"))
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn parse_error(source: &str) -> (String, u32, u32, String) {
    match parse(source).unwrap_err().kind {
        ErrorKind::ParseError {
            message,
            line,
            column,
            context,
        } => (message, line, column, context),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// =============================================================================
// Forms
// =============================================================================

#[test]
fn empty_source_has_no_forms() {
    assert!(parse("").unwrap().is_empty());
    assert!(parse("  ; only a comment\n").unwrap().is_empty());
}

#[test]
fn atoms_keep_their_kind() {
    let forms = parse(r#"true 7 "s" sym"#).unwrap();
    assert!(matches!(forms[0], Ast::Bool(true, _)));
    assert!(matches!(forms[1], Ast::Int(7, _)));
    assert_eq!(forms[2].as_string(), Some("s"));
    assert_eq!(forms[3].as_symbol(), Some("sym"));
}

#[test]
fn lists_and_vectors_are_distinct() {
    let forms = parse("(a b) [a b]").unwrap();
    assert_eq!(forms[0].as_list().map(<[Ast]>::len), Some(2));
    assert!(forms[0].as_vector().is_none());
    assert_eq!(forms[1].as_vector().map(<[Ast]>::len), Some(2));
}

#[test]
fn calls_split_head_and_arguments() {
    let forms = parse("(f 1 2) (1 2) ()").unwrap();
    let (head, args) = forms[0].as_call().unwrap();
    assert_eq!(head, "f");
    assert_eq!(args.len(), 2);
    assert!(forms[1].as_call().is_none());
    assert!(forms[2].as_call().is_none());
}

#[test]
fn nesting_round_trips_through_display() {
    let source = "(def fac (fn [n] (if (= n 0) 1 (* n (fac (- n 1))))))";
    assert_eq!(render(source), vec![source]);
}

#[test]
fn comments_between_elements_are_skipped() {
    assert_eq!(render("(a ; first\n b ; second\n)"), vec!["(a b)"]);
}

#[test]
fn reader_macros_wrap_the_next_form() {
    assert_eq!(
        render("'(1 2) `[a ~b ~@c]"),
        vec!["(quote (1 2))", "(quasiquote [a (unquote b) (unquote-splicing c)])"]
    );
}

#[test]
fn string_display_is_escaped() {
    assert_eq!(render(r#""a\"b""#), vec![r#""a\"b""#]);
}

// =============================================================================
// Spans
// =============================================================================

#[test]
fn forms_remember_their_position() {
    let forms = parse("1\n  (f x)").unwrap();
    let span = forms[1].span();
    assert_eq!((span.line, span.column), (2, 3));
    assert_eq!(span.text("1\n  (f x)"), Some("(f x)"));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn unterminated_vector() {
    let (message, line, column, _) = parse_error("\n [1 2");
    assert_eq!(message, "unterminated vector");
    assert_eq!((line, column), (2, 2));
}

#[test]
fn mismatched_closer() {
    let (message, _, column, context) = parse_error("(f 1]");
    assert_eq!(message, "expected ')' to close list, found ']'");
    assert_eq!(column, 5);
    assert_eq!(context, "(f 1]");
}

#[test]
fn stray_closer() {
    let (message, ..) = parse_error(")");
    assert_eq!(message, "unexpected ')'");
}

#[test]
fn lexer_errors_surface_as_parse_errors() {
    let (message, ..) = parse_error("(f \"open");
    assert!(message.contains("unterminated string"), "{message}");
}

#[test]
fn parse_error_display_names_the_position() {
    let err = parse("(x").unwrap_err();
    assert_eq!(err.to_string(), "parse error at 1:1: unterminated list");
}

// =============================================================================
// Recovery
// =============================================================================

#[test]
fn recovery_collects_every_error() {
    let (forms, errors) = parse_recovering("] (ok) [1 ) 5");
    assert_eq!(errors.len(), 2);
    assert!(matches!(forms[0], Ast::Error(..)));
    assert_eq!(forms[1].to_string(), "(ok)");
    assert!(forms[2].contains_error());
    assert!(matches!(forms.last(), Some(Ast::Int(5, _))));
}

#[test]
fn parser_struct_matches_helpers() {
    let (forms, errors) = Parser::new("(a) (b").parse_all();
    assert_eq!(forms.len(), 2);
    assert_eq!(errors.len(), 1);
    assert!(!forms[0].contains_error());
}

// =============================================================================
// Open Depth
// =============================================================================

#[test]
fn open_depth_counts_unclosed_openers() {
    assert_eq!(open_depth(""), 0);
    assert_eq!(open_depth("(def f (fn [x]"), 2);
    assert_eq!(open_depth("(f [1 2])"), 0);
    assert_eq!(open_depth("(f \"]]\" ; ))"), 1);
}
