//! Relocatable libraries and runnable images.
//!
//! A [`Library`] is one compiled unit before address resolution. Its
//! function bodies live in a separate block, `Ref` operands are indices
//! into the function table, and every jump is relative to the segment it
//! sits in (the code segment or the function block). The linker merges
//! libraries and resolves them into an [`Image`], a flat stream the VM runs
//! directly.

use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use sprig_foundation::{Error, Result};

use crate::asm::{AsmCode, Label};
use crate::assembler::{Assembler, assemble};
use crate::ast::Ast;
use crate::compiler::Compiler;
use crate::globals::GlobalRegistry;

/// One compiled, not yet resolved, unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Library {
    /// Macros the unit declared, for front ends that list them.
    pub macro_names: Vec<String>,
    /// Global names in id order; ids in the code index this list.
    pub globals: Vec<String>,
    /// Offset of each function's first instruction within
    /// `function_bodies`, by function index.
    pub function_entries: Vec<u32>,
    /// All function bodies, back to back.
    pub function_bodies: Vec<u8>,
    /// The unit's top-level code.
    pub code: Vec<u8>,
}

impl Library {
    /// Number of functions in the table.
    #[must_use]
    pub fn function_count(&self) -> usize {
        self.function_entries.len()
    }
}

/// A fully resolved program: `[code][Halt][function block]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Image {
    /// Executable bytes, entry point at offset 0.
    pub code: Vec<u8>,
    /// Global names in id order.
    pub globals: Vec<String>,
}

impl Image {
    /// Creates an image from assembled code and the registry it was
    /// compiled against.
    #[must_use]
    pub fn new(code: Vec<u8>, globals: &GlobalRegistry) -> Self {
        Self {
            code,
            globals: globals.names().to_vec(),
        }
    }

    /// Rebuilds the registry this image's global ids refer to.
    ///
    /// # Errors
    /// Fails if the stored names are not a valid id table.
    pub fn registry(&self) -> Result<GlobalRegistry> {
        GlobalRegistry::from_names(&self.globals)
    }
}

/// Compiles expanded forms into a relocatable library.
///
/// # Errors
/// Returns `CompileFailed` if any form fails to compile, or an internal
/// error if assembly fails.
pub fn compile_library(forms: &[Ast], macro_names: Vec<String>) -> Result<Library> {
    let mut globals = GlobalRegistry::with_defaults();
    let mut compiler = Compiler::hoisting(&mut globals);
    let code = compiler.compile_program(forms)?;
    let functions = compiler.take_functions();

    let mut assembler = Assembler::new();
    let mut block_len = 0;
    for function in &functions {
        block_len = assembler.locate(&function.code, block_len)?;
    }
    assembler.locate(&code, 0)?;

    let indices: HashMap<Label, usize> = functions
        .iter()
        .enumerate()
        .map(|(index, function)| (function.label, index))
        .collect();
    let fn_index = |label: Label| -> Result<i64> {
        let index = indices
            .get(&label)
            .ok_or_else(|| Error::internal(format!("function label {label} has no table entry")))?;
        i64::try_from(*index).map_err(|_| Error::internal("function table overflows"))
    };

    let mut function_bodies = Vec::with_capacity(block_len);
    let mut function_entries = Vec::with_capacity(functions.len());
    for function in &functions {
        let entry = assembler.labels().resolve(function.label)?;
        function_entries.push(
            u32::try_from(entry).map_err(|_| Error::internal("function block exceeds 4 GiB"))?,
        );
        assembler.emit(&function.code, &mut function_bodies, fn_index)?;
    }

    let mut bytes = Vec::with_capacity(code.byte_len());
    assembler.emit(&code, &mut bytes, fn_index)?;

    Ok(Library {
        macro_names,
        globals: globals.names().to_vec(),
        function_entries,
        function_bodies,
        code: bytes,
    })
}

/// Compiles expanded forms into a self-contained image.
///
/// Function bodies are laid out inline, so no linking is needed. Global ids
/// are assigned in `globals`, which the caller shares with the VM.
///
/// # Errors
/// Returns `CompileFailed` if any form fails to compile.
pub fn compile_image(forms: &[Ast], globals: &mut GlobalRegistry) -> Result<Image> {
    let code = compile_code(forms, globals)?;
    Ok(Image::new(assemble(&code)?, globals))
}

/// Compiles expanded forms to inline assembly without assembling it.
///
/// # Errors
/// Returns `CompileFailed` if any form fails to compile.
pub fn compile_code(forms: &[Ast], globals: &mut GlobalRegistry) -> Result<AsmCode> {
    Compiler::new(globals).compile_program(forms)
}
