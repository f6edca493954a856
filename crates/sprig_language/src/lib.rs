//! Reader, compiler, assembler, linker and bytecode VM for Sprig.
//!
//! # Architecture
//!
//! ```text
//! source ──► Lexer ──► Parser ──► Loader ──► Expander ──► Compiler
//!                                  (use)    (defmacro,       │
//!                                           quote)           ▼
//!                                                         AsmCode
//!                                                            │
//!                        ┌───────────────────────────────────┤
//!                        ▼                                   ▼
//!                    Assembler                     compile_library
//!                        │                                   │
//!                        │                            link / resolve
//!                        ▼                                   ▼
//!                   byte stream ──────────► Vm ◄────────── Image
//! ```
//!
//! # Modules
//!
//! - [`lexer`], [`token`], [`span`] - Tokenization with source positions
//! - [`parser`], [`ast`] - S-expressions with error recovery
//! - [`loader`] - `use` resolution over a [`loader::SourceProvider`]
//! - [`expand`] - Template macros and quote desugaring
//! - [`compiler`], [`symbols`], [`globals`] - Lowering to abstract assembly
//! - [`opcode`], [`asm`], [`assembler`] - Instruction set and label resolution
//! - [`library`], [`linker`] - Relocatable units and runnable images
//! - [`vm`] - The stack machine and its observer seam
//! - [`disasm`] - Bytecode listings

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod asm;
pub mod assembler;
pub mod ast;
pub mod compiler;
pub mod disasm;
pub mod expand;
pub mod globals;
pub mod lexer;
pub mod library;
pub mod linker;
pub mod loader;
pub mod opcode;
pub mod parser;
pub mod span;
pub mod symbols;
pub mod token;
pub mod vm;

pub use asm::{AsmCmd, AsmCode, Label};
pub use assembler::{Assembler, assemble, assemble_at};
pub use ast::Ast;
pub use compiler::{Compiler, Layout};
pub use disasm::{disassemble, render, render_library};
pub use expand::{Expander, Expansion, expand};
pub use globals::GlobalRegistry;
pub use lexer::Lexer;
pub use library::{Image, Library, compile_code, compile_image, compile_library};
pub use linker::{link, resolve};
pub use loader::{FsProvider, Loader, LoaderConfig, MemoryProvider, SourceProvider};
pub use opcode::{Decoded, Opcode};
pub use parser::{Parser, open_depth, parse, parse_recovering};
pub use span::Span;
pub use token::{Token, TokenKind};
pub use vm::{NullObserver, OutputLine, Vm, VmConfig, VmObserver, eval};
