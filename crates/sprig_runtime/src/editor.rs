//! Line editor abstraction for the REPL.
//!
//! The REPL reads through [`LineEditor`], so it runs the same over rustyline
//! on a terminal and over a scripted [`MockEditor`] in tests.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::path::PathBuf;

use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::HistoryHinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Completer, Config, Context, Editor, Helper, Hinter, Validator as RLValidator};
use sprig_foundation::{Error, ErrorKind, Result};
use sprig_language::open_depth;

use crate::highlight::SprigHighlighter;

/// Maximum number of history entries kept.
const HISTORY_SIZE: usize = 1000;

/// Result of reading a line from the editor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadResult {
    /// A line was read.
    Line(String),
    /// User pressed Ctrl+C.
    Interrupted,
    /// User pressed Ctrl+D (EOF).
    Eof,
}

/// Abstraction over line editing.
pub trait LineEditor {
    /// Reads a line with the given prompt.
    ///
    /// # Errors
    /// Returns an error if reading from the terminal fails.
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult>;

    /// Adds a line to history.
    fn add_history(&mut self, line: &str);

    /// Replaces the words offered for completion.
    fn set_keywords(&mut self, keywords: Vec<String>);

    /// Persists history, if the editor keeps any.
    ///
    /// # Errors
    /// Returns an error if the history file cannot be written.
    fn save_history(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Rustyline
// =============================================================================

/// Helper for rustyline: completion, hints, highlighting and validation.
#[derive(Helper, Completer, Hinter, RLValidator)]
struct SprigHelper {
    #[rustyline(Completer)]
    completer: KeywordCompleter,
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
    #[rustyline(Validator)]
    validator: DelimiterValidator,
    highlighter: SprigHighlighter,
}

impl Highlighter for SprigHelper {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        self.highlighter.highlight(line, pos)
    }

    fn highlight_prompt<'b, 's: 'b, 'p: 'b>(&'s self, prompt: &'p str, default: bool) -> Cow<'b, str> {
        if default {
            Cow::Owned(format!("\x1b[1;32m{prompt}\x1b[0m"))
        } else {
            Cow::Borrowed(prompt)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }

    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[2m{hint}\x1b[0m"))
    }
}

/// Completes special forms, primitives, REPL commands and known globals.
struct KeywordCompleter {
    keywords: Vec<String>,
}

/// Words offered before the session reports its globals.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "def", "defmacro", "use", "fn", "let", "if", "cond", "do", "and", "or", "rec", "set!", "debug", "quote",
    "quasiquote", "unquote", "unquote-splicing", "fst", "rest", "len", "dissolve", "not", "mod", "write", "::",
    "stdout", "stderr", "true", "false", ":help", ":quit", ":asm", ":disasm", ":trace", ":globals", ":macros",
];

impl KeywordCompleter {
    fn new() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Completer for KeywordCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(|c: char| c.is_whitespace() || "()[]'`~@".contains(c))
            .map_or(0, |i| i + 1);
        let word = &line[start..pos];

        if word.is_empty() || line[..pos].chars().filter(|&c| c == '"').count() % 2 == 1 {
            return Ok((start, Vec::new()));
        }

        let candidates = self
            .keywords
            .iter()
            .filter(|kw| kw.starts_with(word))
            .map(|kw| Pair {
                display: kw.clone(),
                replacement: kw.clone(),
            })
            .collect();
        Ok((start, candidates))
    }
}

/// Keeps reading while openers outnumber closers.
#[derive(Default)]
struct DelimiterValidator;

impl Validator for DelimiterValidator {
    fn validate(&self, ctx: &mut ValidationContext<'_>) -> rustyline::Result<ValidationResult> {
        if open_depth(ctx.input()) > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Line editor backed by rustyline.
pub struct RustylineEditor {
    editor: Editor<SprigHelper, DefaultHistory>,
    history_file: Option<PathBuf>,
}

impl RustylineEditor {
    /// Creates an editor, loading history from `history_file` if it exists.
    ///
    /// # Errors
    /// Returns an error if rustyline cannot initialize the terminal.
    pub fn new(history_file: Option<PathBuf>) -> Result<Self> {
        let config = Config::builder()
            .auto_add_history(false)
            .max_history_size(HISTORY_SIZE)
            .map_err(readline_error)?
            .build();

        let helper = SprigHelper {
            completer: KeywordCompleter::new(),
            hinter: HistoryHinter::new(),
            validator: DelimiterValidator,
            highlighter: SprigHighlighter::new(),
        };

        let mut editor = Editor::with_config(config).map_err(readline_error)?;
        editor.set_helper(Some(helper));

        if let Some(path) = &history_file {
            // A missing history file is normal on first start.
            let _ = editor.load_history(path);
        }

        Ok(Self { editor, history_file })
    }
}

impl LineEditor for RustylineEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(ReadResult::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadResult::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadResult::Eof),
            Err(e) => Err(readline_error(e)),
        }
    }

    fn add_history(&mut self, line: &str) {
        let _ = self.editor.add_history_entry(line);
    }

    fn set_keywords(&mut self, keywords: Vec<String>) {
        if let Some(helper) = self.editor.helper_mut() {
            helper.completer.keywords = keywords;
        }
    }

    fn save_history(&mut self) -> Result<()> {
        match &self.history_file {
            Some(path) => self
                .editor
                .save_history(path)
                .map_err(|e| Error::new(ErrorKind::IoError(format!("{}: {e}", path.display())))),
            None => Ok(()),
        }
    }
}

fn readline_error(e: ReadlineError) -> Error {
    Error::new(ErrorKind::IoError(e.to_string()))
}

// =============================================================================
// Scripted editor
// =============================================================================

/// Editor that replays a fixed script, for tests and batch input.
///
/// Returns [`ReadResult::Eof`] once the script runs out.
#[derive(Clone, Debug, Default)]
pub struct MockEditor {
    inputs: VecDeque<ReadResult>,
    /// Prompts shown, in order.
    pub prompts: Vec<String>,
    /// Lines added to history, in order.
    pub history: Vec<String>,
    /// The latest completion words.
    pub keywords: Vec<String>,
}

impl MockEditor {
    /// Creates an editor that reads `lines` in order.
    #[must_use]
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: lines.into_iter().map(|l| ReadResult::Line(l.into())).collect(),
            ..Self::default()
        }
    }

    /// Appends a Ctrl+C to the script.
    #[must_use]
    pub fn then_interrupt(mut self) -> Self {
        self.inputs.push_back(ReadResult::Interrupted);
        self
    }

    /// Appends more lines to the script.
    #[must_use]
    pub fn then_lines<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(lines.into_iter().map(|l| ReadResult::Line(l.into())));
        self
    }
}

impl LineEditor for MockEditor {
    fn read_line(&mut self, prompt: &str) -> Result<ReadResult> {
        self.prompts.push(prompt.to_string());
        Ok(self.inputs.pop_front().unwrap_or(ReadResult::Eof))
    }

    fn add_history(&mut self, line: &str) {
        self.history.push(line.to_string());
    }

    fn set_keywords(&mut self, keywords: Vec<String>) {
        self.keywords = keywords;
    }
}
