//! Two-pass assembler.
//!
//! The locate pass walks the commands with a running byte offset and
//! records where each label lands. The emit pass walks them again and
//! writes bytes, resolving every jump and function reference against the
//! table built by the first pass, so labels may be referenced before or
//! after the point where they are placed.

use sprig_foundation::{Error, Result};

use crate::asm::{AsmCmd, AsmCode, Label};
use crate::opcode::{self, Opcode};

/// Resolved label offsets, indexed by label id.
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
    offsets: Vec<Option<usize>>,
}

impl LabelTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the offset of `label`.
    ///
    /// # Errors
    /// Placing a label twice is an internal error: the compiler hands out
    /// every label exactly once.
    pub fn place(&mut self, label: Label, offset: usize) -> Result<()> {
        let index = label.index();
        if index >= self.offsets.len() {
            self.offsets.resize(index + 1, None);
        }
        if let Some(previous) = self.offsets[index] {
            return Err(Error::internal(format!(
                "label {label} placed twice (0x{previous:04x} and 0x{offset:04x})"
            )));
        }
        self.offsets[index] = Some(offset);
        Ok(())
    }

    /// Returns the offset of `label`, if placed.
    #[must_use]
    pub fn get(&self, label: Label) -> Option<usize> {
        self.offsets.get(label.index()).copied().flatten()
    }

    /// Returns the offset of `label` as an operand.
    ///
    /// # Errors
    /// Referencing a label that was never placed is an internal error.
    pub fn resolve(&self, label: Label) -> Result<i64> {
        let offset = self
            .get(label)
            .ok_or_else(|| Error::internal(format!("label {label} referenced but never placed")))?;
        i64::try_from(offset).map_err(|_| Error::internal(format!("label {label} offset overflows")))
    }
}

/// Label-resolving assembler.
#[derive(Clone, Debug, Default)]
pub struct Assembler {
    labels: LabelTable,
}

impl Assembler {
    /// Creates an assembler with an empty label table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The label table built so far.
    #[must_use]
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Locate pass: records label offsets for `code` laid out at `origin`.
    ///
    /// Returns the offset just past the last command.
    ///
    /// # Errors
    /// Fails if a label is placed twice.
    pub fn locate(&mut self, code: &AsmCode, origin: usize) -> Result<usize> {
        let mut offset = origin;
        for cmd in code.cmds() {
            if let AsmCmd::Label(label) = cmd {
                self.labels.place(*label, offset)?;
            }
            offset += cmd.size();
        }
        Ok(offset)
    }

    /// Emit pass: appends the encoding of `code` to `out`.
    ///
    /// Jump targets come from the label table; `fn_ref` maps a function
    /// label to the operand a `Ref` should carry (an address, or a function
    /// table index when building a library).
    ///
    /// # Errors
    /// Fails on unplaced labels and operands that do not fit their field.
    pub fn emit<F>(&self, code: &AsmCode, out: &mut Vec<u8>, mut fn_ref: F) -> Result<()>
    where
        F: FnMut(Label) -> Result<i64>,
    {
        for cmd in code.cmds() {
            match cmd {
                AsmCmd::Label(_) => {}
                AsmCmd::Jump(op, label) => {
                    if !op.is_jump() {
                        return Err(Error::internal(format!("{op} is not a jump")));
                    }
                    opcode::encode(*op, &[self.labels.resolve(*label)?], out)?;
                }
                AsmCmd::FnRef(label, cargs) => {
                    opcode::encode(Opcode::Ref, &[fn_ref(*label)?, i64::from(*cargs)], out)?;
                }
                AsmCmd::Instr(insn) => opcode::encode(insn.op, &insn.args, out)?,
                AsmCmd::Str(text) => opcode::encode_str(text, out),
            }
        }
        Ok(())
    }
}

/// Assembles self-contained code into a flat binary laid out at offset 0.
///
/// Function references resolve to the absolute address of their label.
///
/// # Errors
/// Returns an internal error for duplicate or unplaced labels and for
/// malformed instructions.
pub fn assemble(code: &AsmCode) -> Result<Vec<u8>> {
    assemble_at(code, 0)
}

/// Assembles code that will be placed at `origin` within a larger stream.
///
/// The returned bytes start at `origin`: jump targets and function
/// addresses already include it.
///
/// # Errors
/// As for [`assemble`].
pub fn assemble_at(code: &AsmCode, origin: usize) -> Result<Vec<u8>> {
    let mut assembler = Assembler::new();
    let end = assembler.locate(code, origin)?;
    let mut out = Vec::with_capacity(end - origin);
    assembler.emit(code, &mut out, |label| assembler.labels().resolve(label))?;
    Ok(out)
}
