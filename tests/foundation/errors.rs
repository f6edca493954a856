//! Integration tests for Error types
//!
//! Tests error construction, context attachment, and rendering.

use sprig_foundation::{Error, ErrorContext, ErrorKind, Type};

// =============================================================================
// Construction
// =============================================================================

#[test]
fn constructors_pick_their_kind() {
    assert!(matches!(
        Error::type_mismatch(Type::Int, Type::Bool).kind,
        ErrorKind::TypeMismatch {
            expected: Type::Int,
            actual: Type::Bool
        }
    ));
    assert!(matches!(Error::undefined_symbol("x").kind, ErrorKind::UndefinedSymbol(ref s) if s == "x"));
    assert!(matches!(Error::invalid_form("bad").kind, ErrorKind::InvalidForm(_)));
    assert!(matches!(Error::internal("oops").kind, ErrorKind::Internal(_)));
    assert!(matches!(Error::stack_underflow().kind, ErrorKind::StackUnderflow));
}

#[test]
fn new_errors_have_no_context() {
    assert!(Error::stack_underflow().context.is_none());
}

// =============================================================================
// Messages
// =============================================================================

#[test]
fn kind_messages() {
    assert_eq!(
        Error::type_mismatch(Type::Fn, Type::Int).to_string(),
        "type mismatch: expected fn, got int"
    );
    assert_eq!(
        Error::arity_mismatch("fac", "1", 2).to_string(),
        "arity mismatch in fac: expected 1, got 2"
    );
    assert_eq!(Error::new(ErrorKind::DivisionByZero).to_string(), "division by zero");
    assert_eq!(
        Error::new(ErrorKind::IndexOutOfBounds { index: 0, length: 0 }).to_string(),
        "index out of bounds: 0 (length 0)"
    );
    assert_eq!(
        Error::new(ErrorKind::InvalidOpcode(0xfe)).to_string(),
        "invalid opcode: 0xfe"
    );
    assert_eq!(
        Error::new(ErrorKind::TruncatedInstruction { offset: 0x10 }).to_string(),
        "truncated instruction at offset 0x0010"
    );
}

// =============================================================================
// Context
// =============================================================================

#[test]
fn position_context() {
    let err = Error::undefined_symbol("y").at_position(3, 14);
    assert_eq!(err.to_string(), "unknown symbol: y (at 3:14)");
}

#[test]
fn source_and_position_context() {
    let ctx = ErrorContext::new().with_source("main.sprig").with_position(2, 1);
    let err = Error::undefined_symbol("z").with_context(ctx);
    assert_eq!(err.to_string(), "unknown symbol: z (at main.sprig:2:1)");
}

#[test]
fn source_only_context() {
    let ctx = ErrorContext::new().with_source("lib.sprig");
    let err = Error::new(ErrorKind::ModuleNotFound("util".into())).with_context(ctx);
    assert_eq!(err.to_string(), "module not found: util (in lib.sprig)");
}

#[test]
fn instruction_context() {
    let err = Error::type_mismatch(Type::Int, Type::String).at_instruction("Add", 0x20);
    assert_eq!(
        err.to_string(),
        "type mismatch: expected int, got string (at Add, offset 0x0020)"
    );
}

#[test]
fn first_instruction_recorded_is_kept() {
    let err = Error::new(ErrorKind::DivisionByZero)
        .at_instruction("Mod", 4)
        .at_instruction("Call", 40);
    let ctx = err.context.expect("context");
    assert_eq!(ctx.operation.as_deref(), Some("Mod"));
    assert_eq!(ctx.offset, Some(4));
}

#[test]
fn position_is_added_to_existing_context() {
    let err = Error::undefined_symbol("q")
        .with_context(ErrorContext::new().with_source("a.sprig"))
        .at_position(1, 2);
    let ctx = err.context.expect("context");
    assert_eq!(ctx.source.as_deref(), Some("a.sprig"));
    assert_eq!(ctx.line, Some(1));
    assert_eq!(ctx.column, Some(2));
}

#[test]
fn empty_context() {
    assert!(ErrorContext::new().is_empty());
    assert!(!ErrorContext::new().with_position(1, 1).is_empty());
}

// =============================================================================
// Compile Failures
// =============================================================================

#[test]
fn compile_failed_lists_every_message() {
    let err = Error::new(ErrorKind::CompileFailed(vec![
        Error::undefined_symbol("a").at_position(1, 6),
        Error::invalid_form("rec outside a function"),
    ]));
    assert_eq!(err.to_string(), "compilation failed with 2 error(s)");
    assert_eq!(
        err.messages(),
        vec![
            "unknown symbol: a (at 1:6)".to_string(),
            "invalid form: rec outside a function".to_string(),
        ]
    );
}

#[test]
fn plain_error_has_one_message() {
    assert_eq!(Error::stack_underflow().messages(), vec!["stack underflow".to_string()]);
}

#[test]
fn errors_are_std_errors() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&Error::stack_underflow());
}
