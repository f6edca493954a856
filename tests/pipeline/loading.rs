//! Integration tests for module loading
//!
//! Tests `use` resolution over in-memory and on-disk sources.

use std::fs;
use std::path::{Path, PathBuf};

use sprig_foundation::{ErrorKind, Value};
use sprig_language::{GlobalRegistry, Loader, LoaderConfig, MemoryProvider, Vm, VmConfig, compile_image, expand};

fn run_forms(forms: Vec<sprig_language::Ast>) -> Value {
    let forms = expand(forms).unwrap().forms;
    let mut globals = GlobalRegistry::with_defaults();
    let image = compile_image(&forms, &mut globals).unwrap();
    Vm::new(&globals, VmConfig::default()).execute(&image.code).unwrap()
}

fn project() -> MemoryProvider {
    MemoryProvider::new()
        .with_file("/proj/main.sprig", "(use \"lib/math\") (use \"lib/lists\") (sum (squares [1 2 3]))")
        .with_file("/proj/lib/math.sprig", "(def square (fn [x] (* x x)))")
        .with_file(
            "/proj/lib/lists.sprig",
            "(use \"math\")
             (def squares (fn [xs] (if (= (len xs) 0) [] (:: (square (fst xs)) (squares (rest xs))))))
             (def sum (fn [xs] (if (= (len xs) 0) 0 (+ (fst xs) (sum (rest xs))))))",
        )
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn program_with_nested_modules_runs() {
    let mut loader = Loader::new(project(), LoaderConfig::new());
    let forms = loader.load_file(Path::new("/proj/main.sprig")).unwrap();
    assert_eq!(run_forms(forms), Value::Int(14));
}

#[test]
fn shared_dependency_is_loaded_once() {
    let mut loader = Loader::new(project(), LoaderConfig::new());
    let forms = loader.load_file(Path::new("/proj/main.sprig")).unwrap();
    let squares = forms
        .iter()
        .filter(|form| form.to_string().starts_with("(def square "))
        .count();
    assert_eq!(squares, 1);
    assert!(loader.is_loaded(Path::new("/proj/lib/math.sprig")));
    assert!(loader.is_loaded(Path::new("/proj/lib/./lists.sprig")));
}

#[test]
fn custom_extension() {
    let files = MemoryProvider::new()
        .with_file("/x/main.lisp", "(use \"helper\") helper")
        .with_file("/x/helper.lisp", "(def helper 9)");
    let mut loader = Loader::new(files, LoaderConfig::new().with_extension("lisp"));
    let forms = loader.load_file(Path::new("/x/main.lisp")).unwrap();
    assert_eq!(run_forms(forms), Value::Int(9));
}

#[test]
fn search_path_supplies_a_standard_library() {
    let files = MemoryProvider::new()
        .with_file("/app/main.sprig", "(use \"prelude\") (inc 1)")
        .with_file("/usr/lib/sprig/prelude.sprig", "(def inc (fn [n] (+ n 1)))");
    let config = LoaderConfig::new().with_search_path("/usr/lib/sprig");
    let forms = Loader::new(files, config).load_file(Path::new("/app/main.sprig")).unwrap();
    assert_eq!(run_forms(forms), Value::Int(2));
}

#[test]
fn the_using_directory_wins_over_search_paths() {
    let files = MemoryProvider::new()
        .with_file("/app/main.sprig", "(use \"util\") which")
        .with_file("/app/util.sprig", "(def which 1)")
        .with_file("/lib/util.sprig", "(def which 2)");
    let config = LoaderConfig::new().with_search_path("/lib");
    let forms = Loader::new(files, config).load_file(Path::new("/app/main.sprig")).unwrap();
    assert_eq!(run_forms(forms), Value::Int(1));
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn three_module_cycle() {
    let files = MemoryProvider::new()
        .with_file("/c/a.sprig", "(use \"b\")")
        .with_file("/c/b.sprig", "(use \"c\")")
        .with_file("/c/c.sprig", "(use \"a\")");
    let err = Loader::new(files, LoaderConfig::new())
        .load_file(Path::new("/c/a.sprig"))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::CyclicLoad(ref chain) if chain.matches("->").count() == 3));
}

#[test]
fn missing_entry_file() {
    let err = Loader::new(MemoryProvider::new(), LoaderConfig::new())
        .load_file(Path::new("/nowhere.sprig"))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::IoError(_) | ErrorKind::ModuleNotFound(_)));
}

// =============================================================================
// File System
// =============================================================================

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sprig_pipeline_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn loads_from_disk() {
    let dir = scratch_dir("fs");
    fs::write(dir.join("main.sprig"), "(use \"dep\") (twice 21)").unwrap();
    fs::write(dir.join("dep.sprig"), "(def twice (fn [n] (* 2 n)))").unwrap();

    let mut loader = Loader::from_fs(LoaderConfig::new());
    let forms = loader.load_file(&dir.join("main.sprig")).unwrap();
    assert_eq!(run_forms(forms), Value::Int(42));

    let _ = fs::remove_dir_all(dir);
}
