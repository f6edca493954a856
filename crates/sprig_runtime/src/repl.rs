//! The interactive REPL.
//!
//! Input is read until its delimiters balance, then either handled as a
//! `:command` or evaluated in the [`Session`].

use std::io::{self, Write};
use std::path::PathBuf;

use sprig_debug::DebugConfig;
use sprig_foundation::{Error, ErrorKind, Result, Value};
use sprig_language::{LoaderConfig, SourceProvider, open_depth};

use crate::editor::{DEFAULT_KEYWORDS, LineEditor, ReadResult, RustylineEditor};
use crate::session::{Session, emit_output};

const HELP: &str = "\
Type an expression to evaluate it. Definitions and macros persist.

Commands:
  :help            Show this help
  :quit            Leave the REPL (also Ctrl+D)
  :asm <expr>      Show the assembly <expr> compiles to
  :disasm <expr>   Show the bytecode <expr> compiles to
  :trace on|off    Trace executed instructions to stderr
  :globals         List defined globals
  :macros          List declared macros";

// =============================================================================
// Configuration
// =============================================================================

/// REPL settings.
#[derive(Clone, Debug)]
pub struct ReplConfig {
    /// Primary prompt.
    pub prompt: String,
    /// Prompt for continuation lines.
    pub continuation_prompt: String,
    /// Where history is kept between runs.
    pub history_file: Option<PathBuf>,
    /// Whether tracing starts on.
    pub trace: bool,
    /// Whether to print the welcome banner.
    pub show_banner: bool,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            prompt: "sprig> ".to_string(),
            continuation_prompt: "  ...> ".to_string(),
            history_file: None,
            trace: false,
            show_banner: true,
        }
    }
}

impl ReplConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the primary prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Keeps history in `path`.
    #[must_use]
    pub fn with_history_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.history_file = Some(path.into());
        self
    }

    /// Starts with tracing on.
    #[must_use]
    pub fn with_trace(mut self) -> Self {
        self.trace = true;
        self
    }

    /// Disables the welcome banner.
    #[must_use]
    pub fn without_banner(mut self) -> Self {
        self.show_banner = false;
        self
    }
}

// =============================================================================
// Responses
// =============================================================================

/// What one input produced.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    /// The value of an evaluated expression.
    Value(Value),
    /// Text from a command.
    Text(String),
    /// Nothing to show.
    Empty,
    /// The user asked to leave.
    Quit,
}

// =============================================================================
// REPL
// =============================================================================

/// The interactive REPL.
pub struct Repl<E: LineEditor = RustylineEditor, P: SourceProvider = sprig_language::FsProvider> {
    editor: E,
    session: Session<P>,
    config: ReplConfig,
}

impl Repl<RustylineEditor> {
    /// Creates a REPL on the terminal.
    ///
    /// # Errors
    /// Returns an error if the editor fails to initialize.
    pub fn new(config: ReplConfig, debug: &DebugConfig, loader: LoaderConfig) -> Result<Self> {
        let editor = RustylineEditor::new(config.history_file.clone())?;
        Ok(Self::with_session(editor, Session::new(debug, loader), config))
    }
}

impl<E: LineEditor, P: SourceProvider> Repl<E, P> {
    /// Creates a REPL over the given editor and session.
    pub fn with_session(editor: E, mut session: Session<P>, config: ReplConfig) -> Self {
        if config.trace {
            session.set_tracing(true);
        }
        Self {
            editor,
            session,
            config,
        }
    }

    /// Returns the session.
    #[must_use]
    pub const fn session(&self) -> &Session<P> {
        &self.session
    }

    /// Returns the session mutably.
    pub fn session_mut(&mut self) -> &mut Session<P> {
        &mut self.session
    }

    /// Returns the editor.
    #[must_use]
    pub const fn editor(&self) -> &E {
        &self.editor
    }

    /// Runs until `:quit` or end of input.
    ///
    /// # Errors
    /// Returns an error if the editor fails. Evaluation errors are printed
    /// and the loop continues.
    pub fn run(&mut self) -> Result<()> {
        if self.config.show_banner {
            print_banner();
        }

        while let Some(input) = self.read_input()? {
            if input.trim().is_empty() {
                continue;
            }
            self.editor.add_history(&input);

            let response = self.handle(&input);
            emit_output(&self.session.take_output());
            match response {
                Ok(Response::Quit) => break,
                Ok(response) => print_response(&response),
                Err(e) => print_error(&e),
            }
            self.refresh_keywords();
        }

        self.editor.save_history()
    }

    /// Reads one complete input, joining lines while delimiters are open.
    ///
    /// Returns `None` at end of input. Ctrl+C discards the pending input.
    ///
    /// # Errors
    /// Returns an error if the editor fails.
    pub fn read_input(&mut self) -> Result<Option<String>> {
        let mut input = String::new();
        loop {
            let prompt = if input.is_empty() {
                &self.config.prompt
            } else {
                &self.config.continuation_prompt
            };

            match self.editor.read_line(prompt)? {
                ReadResult::Line(line) => {
                    if !input.is_empty() {
                        input.push('\n');
                    }
                    input.push_str(&line);
                    if open_depth(&input) <= 0 {
                        return Ok(Some(input));
                    }
                }
                ReadResult::Interrupted => return Ok(Some(String::new())),
                ReadResult::Eof if input.is_empty() => return Ok(None),
                ReadResult::Eof => return Ok(Some(input)),
            }
        }
    }

    /// Handles one complete input.
    ///
    /// # Errors
    /// Any evaluation error, or a command used wrongly.
    pub fn handle(&mut self, input: &str) -> Result<Response> {
        let trimmed = input.trim();
        match trimmed.strip_prefix(':') {
            Some(command) => self.command(command),
            None if trimmed.is_empty() => Ok(Response::Empty),
            None => self.session.eval(input).map(Response::Value),
        }
    }

    fn command(&mut self, line: &str) -> Result<Response> {
        let (name, arg) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let arg = arg.trim();
        match name {
            "help" | "h" => Ok(Response::Text(HELP.to_string())),
            "quit" | "q" => Ok(Response::Quit),
            "asm" => self.session.asm(required(name, arg)?).map(|s| Response::Text(s.trim_end().to_string())),
            "disasm" => self
                .session
                .disasm(required(name, arg)?)
                .map(|s| Response::Text(s.trim_end().to_string())),
            "trace" => match arg {
                "on" => {
                    self.session.set_tracing(true);
                    Ok(Response::Text("tracing on".to_string()))
                }
                "off" => {
                    self.session.set_tracing(false);
                    Ok(Response::Text("tracing off".to_string()))
                }
                _ => Err(usage("trace on|off")),
            },
            "globals" => {
                let lines: Vec<String> = self
                    .session
                    .globals()
                    .iter()
                    .map(|(name, value)| format!("{name} = {value:?}"))
                    .collect();
                Ok(Response::Text(lines.join("\n")))
            }
            "macros" => Ok(Response::Text(self.session.macro_names().join(" "))),
            other => Err(Error::new(ErrorKind::InvalidForm(format!(
                "unknown command :{other} (try :help)"
            )))),
        }
    }

    fn refresh_keywords(&mut self) {
        let mut keywords: Vec<String> = DEFAULT_KEYWORDS.iter().map(ToString::to_string).collect();
        keywords.extend(self.session.registry().names().iter().cloned());
        keywords.extend(self.session.macro_names().into_iter().map(String::from));
        keywords.sort_unstable();
        keywords.dedup();
        self.editor.set_keywords(keywords);
    }
}

fn required<'a>(command: &str, arg: &'a str) -> Result<&'a str> {
    if arg.is_empty() {
        Err(usage(&format!("{command} <expr>")))
    } else {
        Ok(arg)
    }
}

fn usage(text: &str) -> Error {
    Error::new(ErrorKind::InvalidForm(format!("usage: :{text}")))
}

fn print_response(response: &Response) {
    match response {
        Response::Value(value) => println!("\x1b[1m{value:?}\x1b[0m"),
        Response::Text(text) if !text.is_empty() => println!("{text}"),
        _ => {}
    }
}

/// Prints an error, one line per collected failure.
pub fn print_error(error: &Error) {
    for message in error.messages() {
        eprintln!("\x1b[31merror: {message}\x1b[0m");
    }
}

fn print_banner() {
    println!("\x1b[1;36msprig\x1b[0m {}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for commands, Ctrl+D to exit.\n");
    let _ = io::stdout().flush();
}
