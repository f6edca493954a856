//! Linker: merges libraries and resolves them into images.
//!
//! Linking happens in index space. Each unit's `Ref` operands are shifted by
//! the number of functions in the units before it, its jumps by the size of
//! the segments before it, and its global ids are remapped by name into one
//! merged registry. Resolution then lays out `[code][Halt][function block]`
//! and turns every function index into an absolute address.

use sprig_foundation::{Error, Result};

use crate::globals::GlobalRegistry;
use crate::library::{Image, Library};
use crate::opcode::{Opcode, rewrite_operands};

/// Per-unit operand rewrite applied while merging.
struct Relocation<'a> {
    functions: i64,
    jumps: i64,
    globals: &'a [u32],
}

impl Relocation<'_> {
    fn apply(&self, op: Opcode, position: usize, value: i64) -> Result<i64> {
        match (op, position) {
            (Opcode::Ref, 0) => Ok(value + self.functions),
            (op, 0) if op.is_jump() => Ok(value + self.jumps),
            (Opcode::GetGlobal | Opcode::SetGlobal, 0) => usize::try_from(value)
                .ok()
                .and_then(|id| self.globals.get(id))
                .map(|&id| i64::from(id))
                .ok_or_else(|| Error::internal(format!("global id {value} is not in the unit's table"))),
            _ => Ok(value),
        }
    }
}

fn to_operand(n: usize) -> Result<i64> {
    i64::try_from(n).map_err(|_| Error::internal("linked unit exceeds the address space"))
}

/// Merges libraries into one, in order.
///
/// Code segments are concatenated without separators, so the merged code
/// runs each unit's top-level forms in turn.
///
/// # Errors
/// Returns an internal error for malformed unit bytecode or global ids
/// outside a unit's table.
pub fn link(units: &[Library]) -> Result<Library> {
    let mut registry = GlobalRegistry::with_defaults();
    let mut merged = Library::default();

    for unit in units {
        let globals: Vec<u32> = unit.globals.iter().map(|name| registry.define(name)).collect();
        let block_shift = merged.function_bodies.len();

        let in_code = Relocation {
            functions: to_operand(merged.function_entries.len())?,
            jumps: to_operand(merged.code.len())?,
            globals: &globals,
        };
        let in_block = Relocation {
            jumps: to_operand(block_shift)?,
            ..in_code
        };

        let code = rewrite_operands(&unit.code, |op, i, v| in_code.apply(op, i, v))?;
        let bodies = rewrite_operands(&unit.function_bodies, |op, i, v| in_block.apply(op, i, v))?;

        for &entry in &unit.function_entries {
            let shifted = u32::try_from(entry as usize + block_shift)
                .map_err(|_| Error::internal("function block exceeds 4 GiB"))?;
            merged.function_entries.push(shifted);
        }
        merged.code.extend_from_slice(&code);
        merged.function_bodies.extend_from_slice(&bodies);
        merged.macro_names.extend(unit.macro_names.iter().cloned());
    }

    merged.globals = registry.names().to_vec();
    Ok(merged)
}

/// Resolves a library into a runnable image.
///
/// # Errors
/// Returns an internal error if a `Ref` names a function outside the table
/// or the bytecode is malformed.
pub fn resolve(library: &Library) -> Result<Image> {
    let base = library.code.len() + 1;
    let address = |index: i64| -> Result<i64> {
        let entry = usize::try_from(index)
            .ok()
            .and_then(|i| library.function_entries.get(i))
            .ok_or_else(|| {
                Error::internal(format!(
                    "function index {index} out of range ({} functions)",
                    library.function_entries.len()
                ))
            })?;
        to_operand(*entry as usize + base)
    };
    let shift = to_operand(base)?;

    let code = rewrite_operands(&library.code, |op, i, v| match (op, i) {
        (Opcode::Ref, 0) => address(v),
        _ => Ok(v),
    })?;
    let bodies = rewrite_operands(&library.function_bodies, |op, i, v| match (op, i) {
        (Opcode::Ref, 0) => address(v),
        (op, 0) if op.is_jump() => Ok(v + shift),
        _ => Ok(v),
    })?;

    let mut out = Vec::with_capacity(base + bodies.len());
    out.extend_from_slice(&code);
    out.push(Opcode::Halt.into());
    out.extend_from_slice(&bodies);

    Ok(Image {
        code: out,
        globals: library.globals.clone(),
    })
}
