//! Integration tests for Value types
//!
//! Tests Value variants, truthiness, type tags, equality, and the two
//! printed forms.

use sprig_foundation::{Callable, Cell, Port, Type, Value, ValueList};

fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().map(|&n| Value::Int(n)).collect())
}

// =============================================================================
// Truthiness
// =============================================================================

#[test]
fn false_is_the_only_falsy_value() {
    assert!(!Value::Bool(false).is_truthy());
    for value in [
        Value::Bool(true),
        Value::Int(0),
        Value::from(""),
        ints(&[]),
        Value::Port(Port::Stderr),
        Value::Ref(Callable::new(0)),
    ] {
        assert!(value.is_truthy(), "{value:?} should be truthy");
    }
}

// =============================================================================
// Accessors
// =============================================================================

#[test]
fn accessors_match_their_variant() {
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
    assert_eq!(Value::Int(42).as_int(), Some(42));
    assert_eq!(Value::from("sprig").as_str(), Some("sprig"));
    assert_eq!(ints(&[1, 2]).as_list().map(ValueList::len), Some(2));
    assert_eq!(Value::Ref(Callable::new(8)).as_callable().map(|c| c.addr), Some(8));
}

#[test]
fn accessors_reject_other_variants() {
    assert_eq!(Value::Int(1).as_bool(), None);
    assert_eq!(Value::Bool(true).as_int(), None);
    assert_eq!(Value::Int(1).as_str(), None);
    assert!(Value::from("x").as_list().is_none());
    assert!(Value::Int(0).as_callable().is_none());
}

// =============================================================================
// Type Tags
// =============================================================================

#[test]
fn value_types() {
    assert_eq!(Value::Bool(false).value_type(), Type::Bool);
    assert_eq!(Value::Int(3).value_type(), Type::Int);
    assert_eq!(Value::from("s").value_type(), Type::String);
    assert_eq!(ints(&[]).value_type(), Type::List);
    assert_eq!(Value::Ref(Callable::new(0)).value_type(), Type::Fn);
    assert_eq!(Value::Port(Port::Stdout).value_type(), Type::Port);
}

#[test]
fn only_ints_and_strings_are_ordered() {
    assert!(Type::Int.is_ordered());
    assert!(Type::String.is_ordered());
    assert!(!Type::Bool.is_ordered());
    assert!(!Type::List.is_ordered());
    assert!(!Type::Fn.is_ordered());
}

// =============================================================================
// Equality
// =============================================================================

#[test]
fn lists_compare_structurally() {
    assert_eq!(ints(&[1, 2, 3]), ints(&[1, 2, 3]));
    assert_ne!(ints(&[1, 2]), ints(&[2, 1]));
    assert_ne!(ints(&[1]), Value::Int(1));
}

#[test]
fn callables_compare_by_address_and_captures() {
    let plain = Callable::new(16);
    let captured = Callable::with_env(16, vec![Cell::Slot(Value::Int(1))]);
    assert_eq!(plain, Callable::new(16));
    assert_ne!(plain, Callable::new(20));
    assert_ne!(plain, captured);
}

#[test]
fn no_cross_type_equality() {
    assert_ne!(Value::Int(1), Value::Bool(true));
    assert_ne!(Value::Int(0), Value::Bool(false));
    assert_ne!(Value::from("1"), Value::Int(1));
}

// =============================================================================
// Printing
// =============================================================================

#[test]
fn debug_form_reads_back() {
    assert_eq!(format!("{:?}", Value::Int(-7)), "-7");
    assert_eq!(format!("{:?}", Value::Bool(true)), "true");
    assert_eq!(format!("{:?}", Value::from("a b")), "\"a b\"");
    assert_eq!(format!("{:?}", Value::Port(Port::Stdout)), "<stdout>");
}

#[test]
fn display_form_leaves_strings_bare() {
    assert_eq!(Value::from("a b").to_string(), "a b");
    assert_eq!(Value::Int(12).to_string(), "12");
    assert_eq!(Value::Port(Port::Stderr).to_string(), "<stderr>");
}

#[test]
fn nested_lists_quote_their_strings() {
    let nested = Value::from(vec![Value::from("x"), ints(&[1, 2]), Value::Bool(false)]);
    assert_eq!(nested.to_string(), "[\"x\" [1 2] false]");
    assert_eq!(format!("{nested:?}"), "[\"x\" [1 2] false]");
}

#[test]
fn callables_print_their_address() {
    assert_eq!(format!("{:?}", Value::Ref(Callable::new(0x2a))), "<fn@0x002a>");
    let closure = Callable::with_env(0x2a, vec![Cell::Slot(Value::Int(1)), Cell::Slot(Value::Int(2))]);
    assert_eq!(format!("{:?}", Value::Ref(closure)), "<fn@0x002a +2>");
}

// =============================================================================
// Conversions
// =============================================================================

#[test]
fn from_conversions() {
    assert_eq!(Value::from(true), Value::Bool(true));
    assert_eq!(Value::from(5_i64), Value::Int(5));
    assert_eq!(Value::from(String::from("s")), Value::from("s"));
    assert_eq!(Value::from(vec![Value::Int(1)]), ints(&[1]));
    assert_eq!(Value::from(ValueList::new()), ints(&[]));
}
