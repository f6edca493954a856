//! Error types for the Sprig toolchain.
//!
//! Uses `thiserror` for ergonomic error definition with rich context. The
//! same [`Error`] travels through the reader, compiler, assembler, linker
//! and VM; [`ErrorKind`] says which stage produced it.

use std::fmt;

use thiserror::Error;

use crate::types::Type;

/// The main error type for Sprig operations.
#[derive(Debug, Error)]
#[error("{kind}{}", context_suffix(.context))]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

fn context_suffix(context: &Option<ErrorContext>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!(" ({ctx})"),
        _ => String::new(),
    }
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Attaches a source position, keeping any context already present.
    #[must_use]
    pub fn at_position(mut self, line: u32, column: u32) -> Self {
        let ctx = self.context.take().unwrap_or_default();
        self.context = Some(ctx.with_position(line, column));
        self
    }

    /// Attaches the failing VM operation and its instruction offset.
    ///
    /// An operation already recorded is kept, so the innermost failure wins.
    #[must_use]
    pub fn at_instruction(mut self, operation: &str, offset: usize) -> Self {
        let ctx = self.context.take().unwrap_or_default();
        if ctx.operation.is_some() {
            self.context = Some(ctx);
        } else {
            self.context = Some(ctx.with_instruction(operation, offset));
        }
        self
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch { expected, actual })
    }

    /// Creates an unknown symbol error.
    #[must_use]
    pub fn undefined_symbol(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UndefinedSymbol(name.into()))
    }

    /// Creates an arity mismatch error.
    #[must_use]
    pub fn arity_mismatch(form: impl Into<String>, expected: impl Into<String>, actual: usize) -> Self {
        Self::new(ErrorKind::ArityMismatch {
            form: form.into(),
            expected: expected.into(),
            actual,
        })
    }

    /// Creates a malformed special form error.
    #[must_use]
    pub fn invalid_form(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidForm(message.into()))
    }

    /// Creates an internal invariant violation.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Creates a stack underflow error.
    #[must_use]
    pub fn stack_underflow() -> Self {
        Self::new(ErrorKind::StackUnderflow)
    }

    /// Flattens this error into human-readable messages, one per
    /// underlying failure.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        match &self.kind {
            ErrorKind::CompileFailed(errors) => errors.iter().flat_map(Error::messages).collect(),
            _ => vec![self.to_string()],
        }
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// Type mismatch during runtime type checking.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The expected type.
        expected: Type,
        /// The actual type encountered.
        actual: Type,
    },

    /// Symbol is neither a local binding nor a known global.
    #[error("unknown symbol: {0}")]
    UndefinedSymbol(String),

    /// Wrong number of arguments to a form, primitive, or function.
    #[error("arity mismatch in {form}: expected {expected}, got {actual}")]
    ArityMismatch {
        /// The form or function being applied.
        form: String,
        /// Description of expected arity.
        expected: String,
        /// Actual number of arguments.
        actual: usize,
    },

    /// Structurally malformed special form.
    #[error("invalid form: {0}")]
    InvalidForm(String),

    /// AST node the compiler cannot lower.
    #[error("unsupported node kind: {0}")]
    UnsupportedNode(String),

    /// Parse error in source text.
    #[error("parse error at {line}:{column}: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Line number (1-indexed).
        line: u32,
        /// Column number (1-indexed).
        column: u32,
        /// The source line where the error occurred.
        context: String,
    },

    /// Division (or modulo) by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Index out of bounds.
    #[error("index out of bounds: {index} (length {length})")]
    IndexOutOfBounds {
        /// The index that was accessed.
        index: usize,
        /// The actual length of the collection.
        length: usize,
    },

    /// An instruction needed more operands than the value stack held.
    #[error("stack underflow")]
    StackUnderflow,

    /// The value stack grew past its configured limit.
    #[error("value stack overflow (limit {limit})")]
    StackOverflow {
        /// The configured limit.
        limit: usize,
    },

    /// A frame slot read or write fell outside the frame stack.
    #[error("frame access out of bounds: slot {index} (frame stack depth {depth})")]
    FrameAccess {
        /// The top-relative slot index.
        index: usize,
        /// Frame stack depth at the time of access.
        depth: usize,
    },

    /// The frame stack grew past its configured limit.
    #[error("frame stack overflow (limit {limit})")]
    FrameOverflow {
        /// The configured limit.
        limit: usize,
    },

    /// A global was read before any value was stored in it.
    #[error("undefined global: {0}")]
    UndefinedGlobal(String),

    /// A global id fell outside the VM's global table.
    #[error("global id {id} out of bounds (capacity {capacity})")]
    GlobalOutOfBounds {
        /// The global id.
        id: u32,
        /// Size of the global table.
        capacity: usize,
    },

    /// A byte that is not a known opcode.
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),

    /// An instruction whose operands run past the end of the stream.
    #[error("truncated instruction at offset 0x{offset:04x}")]
    TruncatedInstruction {
        /// Offset of the instruction's opcode byte.
        offset: usize,
    },

    /// A module (transitively) uses itself.
    #[error("cyclic load detected: {0}")]
    CyclicLoad(String),

    /// A `use`d module could not be located.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// One or more top-level forms failed to compile.
    #[error("compilation failed with {} error(s)", .0.len())]
    CompileFailed(Vec<Error>),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File system failure.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    /// Source file or module name.
    pub source: Option<String>,
    /// Line number in source.
    pub line: Option<u32>,
    /// Column number in source.
    pub column: Option<u32>,
    /// Mnemonic of the VM operation that failed.
    pub operation: Option<String>,
    /// Byte offset of the failing instruction.
    pub offset: Option<usize>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the source location.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the line and column.
    #[must_use]
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    /// Sets the failing operation and its instruction offset.
    #[must_use]
    pub fn with_instruction(mut self, operation: impl Into<String>, offset: usize) -> Self {
        self.operation = Some(operation.into());
        self.offset = Some(offset);
        self
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_none()
            && self.line.is_none()
            && self.operation.is_none()
            && self.offset.is_none()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        match (&self.source, self.line, self.column) {
            (Some(source), Some(line), Some(col)) => parts.push(format!("at {source}:{line}:{col}")),
            (Some(source), _, _) => parts.push(format!("in {source}")),
            (None, Some(line), Some(col)) => parts.push(format!("at {line}:{col}")),
            _ => {}
        }
        if let Some(op) = &self.operation {
            parts.push(format!("at {op}"));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset 0x{offset:04x}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Result type for Sprig operations.
pub type Result<T> = std::result::Result<T, Error>;
