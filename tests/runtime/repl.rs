//! Integration tests for the REPL
//!
//! Drives the full read-eval-print loop with a scripted editor.

use sprig_debug::DebugConfig;
use sprig_foundation::{ErrorKind, Value};
use sprig_language::{LoaderConfig, MemoryProvider};
use sprig_runtime::{MockEditor, Repl, ReplConfig, Response, Session};

fn repl(editor: MockEditor) -> Repl<MockEditor, MemoryProvider> {
    let provider = MemoryProvider::new().with_file("/home/util.sprig", "(def util-answer 42)");
    let session = Session::with_provider(provider, &DebugConfig::new(), LoaderConfig::new()).with_base_dir("/home");
    Repl::with_session(editor, session, ReplConfig::new().without_banner())
}

// =============================================================================
// The Loop
// =============================================================================

#[test]
fn run_evaluates_every_input_until_eof() {
    let mut r = repl(MockEditor::new(["(def a 1)", "(def b (+ a 1))", "(use \"util\")"]));
    r.run().unwrap();
    assert_eq!(r.session_mut().eval("(+ b util-answer)").unwrap(), Value::Int(44));
}

#[test]
fn run_stops_at_quit() {
    let mut r = repl(MockEditor::new(["(def a 1)", ":quit", "(def b 2)"]));
    r.run().unwrap();
    let names: Vec<&str> = r.session().globals().into_iter().map(|(name, _)| name).collect();
    assert!(names.contains(&"a"));
    assert!(!names.contains(&"b"));
}

#[test]
fn errors_do_not_end_the_loop() {
    let mut r = repl(MockEditor::new(["(/ 1 0)", "(nope)", ":bogus", "(def after 1)"]));
    r.run().unwrap();
    assert!(r.session().globals().iter().any(|(name, _)| *name == "after"));
}

#[test]
fn history_holds_complete_inputs() {
    let mut r = repl(MockEditor::new(["(def f (fn [x]", "  x))", "", "(f 1)"]));
    r.run().unwrap();
    assert_eq!(r.editor().history, vec!["(def f (fn [x]\n  x))", "(f 1)"]);
}

#[test]
fn interrupted_input_is_dropped() {
    let editor = MockEditor::new(["(def broken (fn [x]"]).then_interrupt().then_lines(["(def fine 1)"]);
    let mut r = repl(editor);
    r.run().unwrap();
    assert_eq!(r.session().registry().lookup("broken"), None);
    assert!(r.session().registry().lookup("fine").is_some());
}

#[test]
fn completion_words_track_definitions() {
    let mut r = repl(MockEditor::new(["(def my-counter 0)", "(defmacro my-when [c x] (if c x false))"]));
    r.run().unwrap();
    let keywords = &r.editor().keywords;
    assert!(keywords.iter().any(|k| k == "my-counter"));
    assert!(keywords.iter().any(|k| k == "my-when"));
    assert!(keywords.iter().any(|k| k == "defmacro"));
    let mut sorted = keywords.clone();
    sorted.sort();
    assert_eq!(&sorted, keywords);
}

#[test]
fn custom_prompt() {
    let editor = MockEditor::new(["(+ 1"]);
    let session = Session::with_provider(MemoryProvider::new(), &DebugConfig::new(), LoaderConfig::new());
    let config = ReplConfig::new().with_prompt("> ").without_banner();
    let mut r = Repl::with_session(editor, session, config);
    r.run().unwrap();
    assert_eq!(r.editor().prompts, vec!["> ", "  ...> ", "> "]);
}

// =============================================================================
// Commands
// =============================================================================

#[test]
fn help_lists_commands() {
    let mut r = repl(MockEditor::default());
    match r.handle(":help").unwrap() {
        Response::Text(text) => {
            for command in [":quit", ":asm", ":disasm", ":trace", ":globals", ":macros"] {
                assert!(text.contains(command), "help is missing {command}");
            }
        }
        other => panic!("expected help text, got {other:?}"),
    }
}

#[test]
fn globals_command_shows_readable_values() {
    let mut r = repl(MockEditor::default());
    r.handle("(def greeting \"hi\")").unwrap();
    match r.handle(":globals").unwrap() {
        Response::Text(text) => assert!(text.ends_with("greeting = \"hi\""), "{text}"),
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn macros_command() {
    let mut r = repl(MockEditor::default());
    r.handle("(defmacro b [] 2) (defmacro a [] 1)").unwrap();
    assert_eq!(r.handle(":macros").unwrap(), Response::Text("a b".to_string()));
}

#[test]
fn asm_command_needs_an_expression() {
    let mut r = repl(MockEditor::default());
    let err = r.handle(":asm").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidForm(ref m) if m.starts_with("usage:")));
    assert!(matches!(r.handle(":asm (+ 1 2)").unwrap(), Response::Text(t) if t.contains("Add")));
}

#[test]
fn trace_command_toggles_the_tracer() {
    let mut r = repl(MockEditor::default());
    r.handle(":trace on").unwrap();
    assert!(r.session().tracer().is_enabled());
    r.handle(":trace off").unwrap();
    assert!(!r.session().tracer().is_enabled());
    assert!(r.handle(":trace sideways").is_err());
}

#[test]
fn short_command_aliases() {
    let mut r = repl(MockEditor::default());
    assert_eq!(r.handle(":q").unwrap(), Response::Quit);
    assert!(matches!(r.handle(":h").unwrap(), Response::Text(_)));
}
