//! Integration tests for separate compilation
//!
//! Tests libraries compiled on their own, merged by the linker, resolved
//! into images, and run.

use sprig_foundation::{ErrorKind, Value};
use sprig_language::{Image, Library, Vm, VmConfig, compile_library, expand, link, parse, resolve};

fn library(source: &str) -> Library {
    let expansion = expand(parse(source).unwrap()).unwrap();
    compile_library(&expansion.forms, expansion.macro_names).unwrap_or_else(|e| panic!("{source}: {e}"))
}

/// Runs an image and returns the result with the VM for inspection.
fn run(image: &Image) -> (Value, Vm) {
    let registry = image.registry().unwrap();
    let mut vm = Vm::new(&registry, VmConfig::default());
    let value = vm.execute(&image.code).unwrap();
    (value, vm)
}

fn global(vm: &Vm, image: &Image, name: &str) -> Option<Value> {
    let id = image.registry().unwrap().lookup(name)?;
    vm.global(id).cloned()
}

// =============================================================================
// Single Units
// =============================================================================

#[test]
fn resolved_library_matches_direct_evaluation() {
    let source = "(def fac (fn [n] (if (= n 0) 1 (* n (fac (- n 1)))))) (fac 6)";
    let (value, _) = run(&resolve(&library(source)).unwrap());
    assert_eq!(value, sprig_language::eval(source).unwrap());
}

#[test]
fn closures_survive_hoisting() {
    let source = "(def adder (fn [n] (fn [x] (+ x n)))) ((adder 3) 4)";
    let (value, _) = run(&resolve(&library(source)).unwrap());
    assert_eq!(value, Value::Int(7));
}

#[test]
fn empty_link_resolves_to_a_halting_image() {
    let image = resolve(&link(&[]).unwrap()).unwrap();
    let (value, _) = run(&image);
    assert_eq!(value, Value::Bool(false));
    assert_eq!(image.globals, vec!["stdout", "stderr"]);
}

// =============================================================================
// Multiple Units
// =============================================================================

#[test]
fn last_unit_supplies_the_result() {
    let a = library("(def a (fn [x] (+ x 1))) (a 1)");
    let b = library("(def b (fn [x] (* x 10))) (b 4)");
    let (value, _) = run(&resolve(&link(&[a, b]).unwrap()).unwrap());
    assert_eq!(value, Value::Int(40));
}

#[test]
fn every_unit_runs_with_its_own_functions() {
    let a = library("(def pick (fn [c] (if c 1 2))) (def from-a (pick false))");
    let b = library("(def choose (fn [c] (if c 10 20))) (def from-b (choose true))");
    let c = library("(def pick-c (fn [xs] (if (= (len xs) 0) 0 (fst xs)))) (def from-c (pick-c [7]))");
    let image = resolve(&link(&[a, b, c]).unwrap()).unwrap();
    let (_, vm) = run(&image);
    assert_eq!(global(&vm, &image, "from-a"), Some(Value::Int(2)));
    assert_eq!(global(&vm, &image, "from-b"), Some(Value::Int(10)));
    assert_eq!(global(&vm, &image, "from-c"), Some(Value::Int(7)));
}

#[test]
fn shared_names_become_one_global() {
    let a = library("(def level 1)");
    let b = library("(def level 2) (def seen level)");
    let image = resolve(&link(&[a, b]).unwrap()).unwrap();
    assert_eq!(image.globals, vec!["stdout", "stderr", "level", "seen"]);
    let (_, vm) = run(&image);
    assert_eq!(global(&vm, &image, "level"), Some(Value::Int(2)));
    assert_eq!(global(&vm, &image, "seen"), Some(Value::Int(2)));
}

#[test]
fn linking_in_stages_matches_linking_at_once() {
    let units = [
        library("(def f (fn [] 1))"),
        library("(def g (fn [n] (if (< n 0) 0 n)))"),
        library("(def h (fn [] (fn [] 3))) ((h))"),
    ];
    let at_once = link(&units).unwrap();
    let staged = link(&[link(&units[..2]).unwrap(), units[2].clone()]).unwrap();
    assert_eq!(at_once, staged);
    assert_eq!(run(&resolve(&staged).unwrap()).0, Value::Int(3));
}

#[test]
fn macro_names_are_kept_for_inspection() {
    let a = library("(defmacro unless [c x] (if c false x)) (unless false 1)");
    let b = library("2");
    assert_eq!(link(&[a, b]).unwrap().macro_names, vec!["unless"]);
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn units_cannot_see_each_others_globals() {
    let forms = expand(parse("(helper 1)").unwrap()).unwrap().forms;
    let err = compile_library(&forms, Vec::new()).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CompileFailed(_)));
}

#[test]
fn corrupt_function_table_is_rejected() {
    let mut lib = library("(fn [] 1)");
    lib.function_entries.clear();
    let err = resolve(&lib).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Internal(_)));
}
