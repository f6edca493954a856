//! Disassembler: bytecode back to readable listings.
//!
//! One line per instruction, offset first:
//!
//! ```text
//! 0000  Const      1
//! 0009  JumpIfNot  0x0000001f
//! 000e  Ref        0x00000040 2
//! 0015  Str        "hi"
//! ```

use std::fmt::Write;

use sprig_foundation::Result;

use crate::library::Library;
use crate::opcode::{Decoded, Instructions, Opcode};

/// Width of the mnemonic column.
const MNEMONIC_WIDTH: usize = 11;

/// Decodes a whole stream.
///
/// # Errors
/// Returns the first decoding failure.
pub fn disassemble(bytes: &[u8]) -> Result<Vec<Decoded>> {
    Instructions::new(bytes).collect()
}

/// Formats one decoded instruction.
#[must_use]
pub fn format_instruction(insn: &Decoded) -> String {
    let mut line = format!("{:04x}  {:<width$}", insn.offset, insn.op.mnemonic(), width = MNEMONIC_WIDTH);
    let operands: Vec<String> = insn
        .args
        .iter()
        .enumerate()
        .map(|(i, &arg)| match (insn.op, i) {
            (op, 0) if op.is_jump() || op == Opcode::Ref => format!("0x{arg:08x}"),
            _ => arg.to_string(),
        })
        .chain(insn.payload.iter().map(|text| format!("{text:?}")))
        .collect();
    line.push_str(&operands.join(" "));
    line.truncate(line.trim_end().len());
    line
}

/// Renders a stream as a listing.
///
/// # Errors
/// Returns the first decoding failure.
pub fn render(bytes: &[u8]) -> Result<String> {
    let mut out = String::new();
    for insn in disassemble(bytes)? {
        let _ = writeln!(out, "{}", format_instruction(&insn));
    }
    Ok(out)
}

/// Renders a library: its globals, function table, code and bodies.
///
/// Offsets in the bodies section are relative to the function block.
///
/// # Errors
/// Returns the first decoding failure.
pub fn render_library(library: &Library) -> Result<String> {
    let mut out = String::new();
    if !library.macro_names.is_empty() {
        let _ = writeln!(out, "; macros: {}", library.macro_names.join(" "));
    }
    let _ = writeln!(out, "; globals:");
    for (id, name) in library.globals.iter().enumerate() {
        let _ = writeln!(out, ";   {id:>4}  {name}");
    }
    let _ = writeln!(out, "; functions:");
    for (index, entry) in library.function_entries.iter().enumerate() {
        let _ = writeln!(out, ";   {index:>4}  @ {entry:04x}");
    }
    let _ = writeln!(out, "code:");
    out.push_str(&render(&library.code)?);
    let _ = writeln!(out, "bodies:");
    out.push_str(&render(&library.function_bodies)?);
    Ok(out)
}
