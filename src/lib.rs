//! Sprig - a small Lisp compiled to stack-machine bytecode
//!
//! This crate re-exports all layers of the Sprig toolchain for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 3: sprig_runtime    - CLI, REPL, artifact serialization
//! Layer 2: sprig_debug      - Instruction tracing
//! Layer 1: sprig_language   - Reader, expander, compiler, assembler, linker, VM
//! Layer 0: sprig_foundation - Core types (Value, Cell, Error)
//! ```

pub use sprig_debug as debug;
pub use sprig_foundation as foundation;
pub use sprig_language as language;
pub use sprig_runtime as runtime;
