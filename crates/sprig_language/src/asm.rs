//! Abstract assembly.
//!
//! The compiler emits [`AsmCode`]: concrete instructions interleaved with
//! symbolic labels, label-targeted jumps, function references and string
//! literals. Positions are only known once the assembler lays the commands
//! out, so order is significant.

use std::fmt;

use crate::opcode::Opcode;

/// An opaque label identity, dense from zero within one compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(pub u32);

impl Label {
    /// Index into a label table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Hands out fresh labels.
#[derive(Clone, Debug, Default)]
pub struct LabelGen {
    next: u32,
}

impl LabelGen {
    /// Creates a generator starting at `L0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a label never returned before.
    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }

    /// Number of labels handed out so far.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.next as usize
    }
}

/// An instruction with all operands known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    /// The opcode.
    pub op: Opcode,
    /// Operands, in order.
    pub args: Vec<i64>,
}

impl Instruction {
    /// An instruction without operands.
    #[must_use]
    pub fn new(op: Opcode) -> Self {
        Self {
            op,
            args: Vec::new(),
        }
    }

    /// An instruction with operands.
    #[must_use]
    pub fn with_args(op: Opcode, args: &[i64]) -> Self {
        Self {
            op,
            args: args.to_vec(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// One abstract assembly command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmCmd {
    /// Marks a position.
    Label(Label),
    /// A jump whose target is resolved by the assembler.
    Jump(Opcode, Label),
    /// Pushes a callable reference to the function body at the label,
    /// capturing the given number of frame cells.
    FnRef(Label, u16),
    /// A concrete instruction.
    Instr(Instruction),
    /// A length-prefixed string literal.
    Str(String),
}

impl AsmCmd {
    /// Shorthand for an instruction without operands.
    #[must_use]
    pub fn op(op: Opcode) -> Self {
        Self::Instr(Instruction::new(op))
    }

    /// Shorthand for an instruction with operands.
    #[must_use]
    pub fn op_with(op: Opcode, args: &[i64]) -> Self {
        Self::Instr(Instruction::with_args(op, args))
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            Self::Label(_) => 0,
            Self::Jump(op, _) => op.size(),
            Self::FnRef(..) => Opcode::Ref.size(),
            Self::Instr(insn) => insn.op.size(),
            Self::Str(text) => Opcode::Str.size() + crate::opcode::STR_LEN_WIDTH + text.len(),
        }
    }

    /// The opcode this command encodes to, if any.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Self::Label(_) => None,
            Self::Jump(op, _) => Some(*op),
            Self::FnRef(..) => Some(Opcode::Ref),
            Self::Instr(insn) => Some(insn.op),
            Self::Str(_) => Some(Opcode::Str),
        }
    }
}

impl fmt::Display for AsmCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, "{label}:"),
            Self::Jump(op, label) => write!(f, "  {op} {label}"),
            Self::FnRef(label, cargs) => write!(f, "  Ref {label} {cargs}"),
            Self::Instr(insn) => write!(f, "  {insn}"),
            Self::Str(text) => write!(f, "  Str {text:?}"),
        }
    }
}

impl From<Instruction> for AsmCmd {
    fn from(insn: Instruction) -> Self {
        Self::Instr(insn)
    }
}

/// An ordered sequence of assembly commands.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AsmCode {
    cmds: Vec<AsmCmd>,
}

impl AsmCode {
    /// Creates empty assembly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command.
    pub fn push(&mut self, cmd: AsmCmd) {
        self.cmds.push(cmd);
    }

    /// Appends an instruction without operands.
    pub fn op(&mut self, op: Opcode) {
        self.cmds.push(AsmCmd::op(op));
    }

    /// Appends an instruction with operands.
    pub fn op_with(&mut self, op: Opcode, args: &[i64]) {
        self.cmds.push(AsmCmd::op_with(op, args));
    }

    /// Appends a label.
    pub fn label(&mut self, label: Label) {
        self.cmds.push(AsmCmd::Label(label));
    }

    /// Appends a jump to `label`.
    pub fn jump(&mut self, op: Opcode, label: Label) {
        self.cmds.push(AsmCmd::Jump(op, label));
    }

    /// Appends all commands of `other`.
    pub fn append(&mut self, other: AsmCode) {
        self.cmds.extend(other.cmds);
    }

    /// The commands, in order.
    #[must_use]
    pub fn cmds(&self) -> &[AsmCmd] {
        &self.cmds
    }

    /// Number of commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// Returns true if there are no commands.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.cmds.iter().map(AsmCmd::size).sum()
    }

    /// The opcodes in emission order, labels skipped.
    #[must_use]
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.cmds.iter().filter_map(AsmCmd::opcode).collect()
    }
}

impl From<Vec<AsmCmd>> for AsmCode {
    fn from(cmds: Vec<AsmCmd>) -> Self {
        Self { cmds }
    }
}

impl fmt::Display for AsmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cmd in &self.cmds {
            writeln!(f, "{cmd}")?;
        }
        Ok(())
    }
}
