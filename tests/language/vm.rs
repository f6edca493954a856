//! Integration tests for the VM
//!
//! Tests whole programs end to end: source is parsed, expanded, compiled,
//! and executed on a fresh or shared VM.

use sprig_foundation::{ErrorKind, Port, Type, Value};
use sprig_language::{GlobalRegistry, OutputLine, Vm, VmConfig, compile_image, eval, expand, parse};

fn run(source: &str) -> Value {
    eval(source).unwrap_or_else(|e| panic!("{source}: {e}"))
}

fn run_kind(source: &str) -> ErrorKind {
    match eval(source) {
        Ok(v) => panic!("{source}: expected an error, got {v:?}"),
        Err(e) => e.kind,
    }
}

fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().map(|&n| Value::Int(n)).collect())
}

/// A VM with its registry, for programs split over several executions.
struct Machine {
    globals: GlobalRegistry,
    vm: Vm,
}

impl Machine {
    fn new(config: VmConfig) -> Self {
        let globals = GlobalRegistry::with_defaults();
        let vm = Vm::new(&globals, config);
        Self { globals, vm }
    }

    fn eval(&mut self, source: &str) -> sprig_foundation::Result<Value> {
        let forms = expand(parse(source)?)?.forms;
        let image = compile_image(&forms, &mut self.globals)?;
        self.vm.install_globals(&self.globals);
        self.vm.execute(&image.code)
    }
}

// =============================================================================
// Programs
// =============================================================================

#[test]
fn fibonacci() {
    let source = "
        (def fib (fn [n] (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2))))))
        (fib 15)";
    assert_eq!(run(source), Value::Int(610));
}

#[test]
fn map_over_a_list() {
    let source = "
        (def map (fn [f xs]
          (if (= (len xs) 0)
            []
            (:: (f (fst xs)) (map f (rest xs))))))
        (map (fn [x] (* x x)) [1 2 3 4])";
    assert_eq!(run(source), ints(&[1, 4, 9, 16]));
}

#[test]
fn accumulating_loop_with_rec() {
    let source = "
        (def range (fn [n acc] (if (= n 0) acc (rec (range (- n 1) (:: n acc))))))
        (range 5 [])";
    assert_eq!(run(source), ints(&[1, 2, 3, 4, 5]));
}

#[test]
fn reverse_with_variadic_entry_point() {
    let source = "
        (def rev (fn [xs acc] (if (= (len xs) 0) acc (rec (rev (rest xs) (:: (fst xs) acc))))))
        (def rev-all (fn [&xs] (rev xs [])))
        (rev-all 1 2 3)";
    assert_eq!(run(source), ints(&[3, 2, 1]));
}

#[test]
fn counter_closure_captures_a_snapshot() {
    let source = "
        (def make (fn [start] (fn [step] (+ start step))))
        (let [from-ten (make 10) from-one (make 1)] [(from-ten 1) (from-one 1)])";
    assert_eq!(run(source), ints(&[11, 2]));
}

#[test]
fn macros_and_quasiquote_in_programs() {
    let source = "
        (defmacro unless [c then else] (if c else then))
        (def xs [2 3])
        (unless false `(1 ~@xs 4) 0)";
    assert_eq!(run(source), ints(&[1, 2, 3, 4]));
}

#[test]
fn strings_compare_and_measure() {
    assert_eq!(run(r#"(if (<= "apple" "banana") (len "über") 0)"#), Value::Int(4));
    assert_eq!(run(r#"(= "a" "a")"#), Value::Bool(true));
}

// =============================================================================
// Shared State
// =============================================================================

#[test]
fn definitions_survive_between_executions() {
    let mut m = Machine::new(VmConfig::default());
    m.eval("(def counter 0)").unwrap();
    m.eval("(def bump (fn [] (set! counter (+ counter 1))))").unwrap();
    m.eval("(bump) (bump)").unwrap();
    assert_eq!(m.eval("counter").unwrap(), Value::Int(2));
    let id = m.globals.lookup("counter").unwrap();
    assert_eq!(m.vm.global(id), Some(&Value::Int(2)));
}

#[test]
fn reading_an_unset_global_fails() {
    assert!(matches!(run_kind("(def x x)"), ErrorKind::UndefinedGlobal(ref name) if name == "x"));
}

#[test]
fn default_ports_are_installed() {
    assert_eq!(run("stdout"), Value::Port(Port::Stdout));
    assert_eq!(run("stderr"), Value::Port(Port::Stderr));
}

// =============================================================================
// Output
// =============================================================================

#[test]
fn write_collects_lines_per_port() {
    let mut m = Machine::new(VmConfig::default());
    m.eval(r#"(write stdout "a") (write stderr 2) (write stdout ["x" 1])"#).unwrap();
    let lines = m.vm.take_output();
    assert_eq!(
        lines,
        vec![
            OutputLine {
                port: Port::Stdout,
                text: "a".into(),
            },
            OutputLine {
                port: Port::Stderr,
                text: "2".into(),
            },
            OutputLine {
                port: Port::Stdout,
                text: "[\"x\" 1]".into(),
            },
        ]
    );
}

// =============================================================================
// Errors and Limits
// =============================================================================

#[test]
fn runtime_type_errors() {
    assert!(matches!(
        run_kind("(fst 1)"),
        ErrorKind::TypeMismatch {
            expected: Type::List,
            actual: Type::Int
        }
    ));
    assert!(matches!(run_kind("(mod 1 0)"), ErrorKind::DivisionByZero));
}

#[test]
fn runtime_errors_carry_the_instruction() {
    let err = eval("(+ 1 \"two\")").unwrap_err();
    let ctx = err.context.as_ref().expect("context");
    assert_eq!(ctx.operation.as_deref(), Some("Add"));
    assert!(err.to_string().starts_with("type mismatch: expected int, got string"));
}

#[test]
fn compile_errors_stop_before_running() {
    let err = eval("(write stdout 1) (nope)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CompileFailed(_)));
}

#[test]
fn value_stack_limit() {
    let mut m = Machine::new(VmConfig::new().with_max_stack(4));
    let err = m.eval("[1 2 3 4 5 6]").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StackOverflow { limit: 4 }));
}

#[test]
fn frame_limit_stops_runaway_recursion() {
    let mut m = Machine::new(VmConfig::new().with_max_frame_cells(100));
    let err = m.eval("(def f (fn [n] (+ 1 (f n)))) (f 0)").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FrameOverflow { limit: 100 }));
}

#[test]
fn rec_loops_run_in_constant_frame_space() {
    let mut m = Machine::new(VmConfig::new().with_max_frame_cells(16));
    let value = m
        .eval("(def spin (fn [n] (if (= n 0) true (rec (spin (- n 1)))))) (spin 100000)")
        .unwrap();
    assert_eq!(value, Value::Bool(true));
    assert!(m.vm.max_frame_depth() <= 16);
}

#[test]
fn config_is_kept() {
    let config = VmConfig::new().with_global_capacity(8).with_max_stack(64);
    let m = Machine::new(config.clone());
    assert_eq!(m.vm.config(), &config);
}
