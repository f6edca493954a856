//! Integration tests for sessions
//!
//! Tests persistent state across inputs, module loading, and output capture.

use std::path::{Path, PathBuf};

use sprig_debug::DebugConfig;
use sprig_foundation::{ErrorKind, Port, Value};
use sprig_language::{LoaderConfig, MemoryProvider};
use sprig_runtime::Session;

fn session() -> Session<MemoryProvider> {
    let files = MemoryProvider::new()
        .with_file("/work/prelude.sprig", "(defmacro unless [c x] (if c false x)) (def inc (fn [n] (+ n 1)))")
        .with_file("/work/app.sprig", "(use \"prelude\") (def started (inc 0))")
        .with_file("/work/extra.sprig", "(def extra (unless false started))");
    Session::with_provider(files, &DebugConfig::new(), LoaderConfig::new()).with_base_dir("/work")
}

// =============================================================================
// State
// =============================================================================

#[test]
fn definitions_persist() {
    let mut s = session();
    s.eval("(def x 20)").unwrap();
    s.eval("(def double (fn [n] (* n 2)))").unwrap();
    assert_eq!(s.eval("(double (+ x 1))").unwrap(), Value::Int(42));
}

#[test]
fn macros_persist() {
    let mut s = session();
    s.eval("(defmacro swap [a b] [b a])").unwrap();
    assert_eq!(s.eval("(swap 1 2)").unwrap(), Value::from(vec![Value::Int(2), Value::Int(1)]));
    assert_eq!(s.macro_names(), vec!["swap"]);
}

#[test]
fn globals_lists_defined_values_in_order() {
    let mut s = session();
    s.eval("(def b 2) (def a 1)").unwrap();
    let names: Vec<&str> = s.globals().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["stdout", "stderr", "b", "a"]);
}

#[test]
fn errors_leave_the_session_usable() {
    let mut s = session();
    s.eval("(def ok 1)").unwrap();
    assert!(s.eval("(/ ok 0)").is_err());
    assert!(s.eval("(nope)").is_err());
    assert_eq!(s.eval("(+ ok 1)").unwrap(), Value::Int(2));
}

#[test]
fn compile_errors_define_nothing_new() {
    let mut s = session();
    let err = s.eval("(def y 1) (undefined-fn)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CompileFailed(_)));
    assert!(s.globals().iter().all(|(name, _)| *name != "y"));
}

// =============================================================================
// Modules
// =============================================================================

#[test]
fn use_in_typed_input() {
    let mut s = session();
    assert_eq!(s.eval("(use \"prelude\") (unless false (inc 1))").unwrap(), Value::Int(2));
    assert!(s.is_loaded(Path::new("/work/prelude.sprig")));
    // A second use is a no-op.
    assert_eq!(s.eval("(use \"prelude\") (inc 5)").unwrap(), Value::Int(6));
}

#[test]
fn eval_files_runs_them_as_one_program() {
    let mut s = session();
    let value = s
        .eval_files(&[PathBuf::from("/work/app.sprig"), PathBuf::from("/work/extra.sprig")])
        .unwrap();
    assert_eq!(value, Value::Int(1));
    assert_eq!(s.eval("extra").unwrap(), Value::Int(1));
}

// =============================================================================
// Output
// =============================================================================

#[test]
fn output_is_held_until_taken() {
    let mut s = session();
    s.eval("(write stdout \"one\")").unwrap();
    s.eval("(write stderr \"two\")").unwrap();
    let lines = s.take_output();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].port, Port::Stdout);
    assert_eq!(lines[1].text, "two");
    assert!(s.take_output().is_empty());
}

#[test]
fn output_before_a_runtime_error_is_kept() {
    let mut s = session();
    assert!(s.eval("(write stdout \"before\") (fst [])").is_err());
    assert_eq!(s.take_output()[0].text, "before");
}

// =============================================================================
// Inspection
// =============================================================================

#[test]
fn asm_and_disasm_do_not_define() {
    let mut s = session();
    s.eval("(def n 3)").unwrap();
    let asm = s.asm("(def m (+ n 1))").unwrap();
    assert!(asm.contains("GetGlobal 2"), "{asm}");
    assert!(asm.contains("SetGlobal 3"), "{asm}");
    let listing = s.disasm("(+ n 1)").unwrap();
    assert!(listing.starts_with("0000  GetGlobal  2"), "{listing}");
    assert_eq!(s.registry().lookup("m"), None);
}

#[test]
fn compile_without_running() {
    let mut s = session();
    let image = s.compile("(def later 5)").unwrap();
    assert!(image.globals.contains(&"later".to_string()));
    assert!(s.globals().iter().all(|(name, _)| *name != "later"));
}

#[test]
fn vm_limits_come_from_the_debug_config() {
    let debug = DebugConfig::new().with_max_frame_cells(32);
    let mut s = Session::with_provider(MemoryProvider::new(), &debug, LoaderConfig::new());
    let err = s.eval("(def deep (fn [n] (+ 1 (deep n)))) (deep 0)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FrameOverflow { limit: 32 }));
}
