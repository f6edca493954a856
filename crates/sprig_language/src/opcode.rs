//! Bytecode instruction set for the Sprig VM.
//!
//! Every instruction is `[opcode:1][arg0][arg1]...`, each argument a
//! big-endian integer whose width is fixed by the opcode. `Str` is the one
//! variable-length instruction: `[Str][length:8][raw bytes]`. There is no
//! other framing, so every walker over a stream must step by
//! [`Opcode::size`] (plus the payload for `Str`).
//!
//! Stack effects are written `[before] -> [after]`, top of stack rightmost.

#![allow(clippy::doc_markdown)]

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::{EnumCount, EnumIter, IntoStaticStr};

use sprig_foundation::{Error, ErrorKind, Result};

/// Width of the length prefix carried by `Str`.
pub const STR_LEN_WIDTH: usize = 8;

/// A bytecode opcode.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    IntoStaticStr,
    EnumIter,
    EnumCount,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum Opcode {
    // === Control ===
    /// No operation.
    Nop,
    /// Stop execution.
    Halt,

    // === Literals ===
    /// `[] -> [n]`, operand is a two's complement `i64`.
    Const,
    /// `[] -> [true]`
    True,
    /// `[] -> [false]`
    False,
    /// `[] -> [s]`, followed by `[length:8][bytes]`.
    Str,
    /// `[a] -> []`
    Pop,

    // === Arithmetic ===
    /// `[a, b] -> [a + b]`
    Add,
    /// `[a, b] -> [a - b]`
    Sub,
    /// `[a, b] -> [a * b]`
    Mul,
    /// `[a, b] -> [a / b]`
    Div,
    /// `[a, b] -> [a % b]`
    Mod,

    // === Comparison / Logic ===
    /// `[a, b] -> [a == b]`
    Eq,
    /// `[a, b] -> [a < b]`
    Lt,
    /// `[a, b] -> [a <= b]`
    Le,
    /// `[a] -> [!a]`
    Not,

    // === Jumps (absolute targets) ===
    /// Unconditional jump.
    Jump,
    /// `[c] -> []`, jump if `c` is truthy.
    JumpIf,
    /// `[c] -> []`, jump if `c` is falsy.
    JumpIfNot,

    // === Argument lists ===
    /// `[] -> [END]`, the end-of-args sentinel.
    End,
    /// `[END, x1 .. xn] -> [list]`, consuming the sentinel.
    List,
    /// `[] -> [[]]`
    EmptyVector,

    // === Frames ===
    /// Pop `n` values into new frame slots, top of stack first.
    PushArgs,
    /// Discard the top `n` frame slots.
    DropArgs,
    /// `[END] -> []`, anything but the sentinel is an arity error.
    DropEnd,
    /// `[] -> [frame[top - i]]`
    GetArg,
    /// `[v] -> [v]`, storing `v` into `frame[top - i]`.
    SetLocal,

    // === Globals ===
    /// `[] -> [global[id]]`
    GetGlobal,
    /// `[v] -> [v]`, storing `v` into `global[id]`.
    SetGlobal,

    // === Calls ===
    /// `[] -> [ref]`, capturing the top `cargs` frame cells.
    Ref,
    /// `[END, args.., f] -> [result]` once the callee returns.
    Call,
    /// Like `Call` but replaces the current frame.
    RecCall,
    /// Return to the caller, dropping the callee's frame.
    Return,

    // === Lists ===
    /// `[xs] -> [first xs]`
    Fst,
    /// `[xs] -> [rest xs]`
    Rest,
    /// `[x, xs] -> [x :: xs]`
    Cons,
    /// `[xs] -> [len xs]`
    Length,
    /// `[xs] -> [xn .. x1]`, spreading the list onto the stack.
    Dissolve,

    // === I/O and diagnostics ===
    /// `[port, v] -> [v]`, writing `v` to `port`.
    Write,
    /// Diagnostic marker carrying the lexical frame size.
    Debug,
}

impl Opcode {
    /// Returns the width in bytes of each operand, in order.
    #[must_use]
    pub const fn arg_widths(self) -> &'static [usize] {
        match self {
            Self::Const => &[8],
            Self::PushArgs => &[1],
            Self::DropArgs | Self::GetArg | Self::SetLocal | Self::Debug => &[2],
            Self::Jump
            | Self::JumpIf
            | Self::JumpIfNot
            | Self::GetGlobal
            | Self::SetGlobal => &[4],
            Self::Ref => &[4, 2],
            _ => &[],
        }
    }

    /// Returns the encoded size of the instruction, excluding any `Str`
    /// payload.
    #[must_use]
    pub fn size(self) -> usize {
        1 + self.arg_widths().iter().sum::<usize>()
    }

    /// Returns true for instructions whose first operand is a code address.
    #[must_use]
    pub const fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIf | Self::JumpIfNot)
    }

    /// Returns the mnemonic.
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Decodes an opcode byte.
    ///
    /// # Errors
    /// Returns `InvalidOpcode` for bytes outside the instruction set.
    pub fn from_byte(byte: u8) -> Result<Self> {
        Self::try_from_primitive(byte).map_err(|e| Error::new(ErrorKind::InvalidOpcode(e.number)))
    }
}

// =============================================================================
// Encoding
// =============================================================================

/// Appends one instruction to `out`.
///
/// # Errors
/// Returns an internal error if the operand count does not match the
/// opcode or an operand does not fit its field.
pub fn encode(op: Opcode, args: &[i64], out: &mut Vec<u8>) -> Result<()> {
    let widths = op.arg_widths();
    if widths.len() != args.len() {
        return Err(Error::internal(format!(
            "{op} takes {} operand(s), got {}",
            widths.len(),
            args.len()
        )));
    }
    out.push(op.into());
    for (&arg, &width) in args.iter().zip(widths) {
        write_operand(op, arg, width, out)?;
    }
    Ok(())
}

/// Appends a `Str` instruction with its payload.
pub fn encode_str(text: &str, out: &mut Vec<u8>) {
    out.push(Opcode::Str.into());
    out.extend_from_slice(&(text.len() as u64).to_be_bytes());
    out.extend_from_slice(text.as_bytes());
}

fn write_operand(op: Opcode, arg: i64, width: usize, out: &mut Vec<u8>) -> Result<()> {
    if width == 8 {
        out.extend_from_slice(&arg.to_be_bytes());
        return Ok(());
    }
    let max = (1_i64 << (width * 8)) - 1;
    if !(0..=max).contains(&arg) {
        return Err(Error::internal(format!(
            "operand {arg} does not fit the {width}-byte field of {op}"
        )));
    }
    out.extend_from_slice(&arg.to_be_bytes()[8 - width..]);
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Reads a big-endian unsigned operand of `width` bytes at `at`.
///
/// # Errors
/// Returns `TruncatedInstruction` (reporting `insn`, the opcode's offset) if
/// the operand runs past the end of `bytes`.
pub fn read_operand(bytes: &[u8], at: usize, width: usize, insn: usize) -> Result<u64> {
    let field = bytes
        .get(at..at + width)
        .ok_or_else(|| Error::new(ErrorKind::TruncatedInstruction { offset: insn }))?;
    Ok(field.iter().fold(0_u64, |acc, &b| (acc << 8) | u64::from(b)))
}

/// One decoded instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decoded {
    /// Offset of the opcode byte.
    pub offset: usize,
    /// The opcode.
    pub op: Opcode,
    /// Operands, in order.
    pub args: Vec<i64>,
    /// The `Str` payload, if any.
    pub payload: Option<String>,
    /// Encoded size in bytes, payload included.
    pub size: usize,
}

impl Decoded {
    /// Offset of the next instruction.
    #[must_use]
    pub fn next_offset(&self) -> usize {
        self.offset + self.size
    }
}

/// Decodes the instruction starting at `offset`.
///
/// # Errors
/// Returns `InvalidOpcode` for an unknown byte and `TruncatedInstruction`
/// when operands or the `Str` payload run past the end of `bytes`.
pub fn decode_at(bytes: &[u8], offset: usize) -> Result<Decoded> {
    let byte = *bytes
        .get(offset)
        .ok_or_else(|| Error::new(ErrorKind::TruncatedInstruction { offset }))?;
    let op = Opcode::from_byte(byte)?;

    let mut at = offset + 1;
    let mut args = Vec::with_capacity(op.arg_widths().len());
    for &width in op.arg_widths() {
        let raw = read_operand(bytes, at, width, offset)?;
        #[allow(clippy::cast_possible_wrap)]
        args.push(raw as i64);
        at += width;
    }

    let payload = if op == Opcode::Str {
        let len = usize::try_from(read_operand(bytes, at, STR_LEN_WIDTH, offset)?)
            .map_err(|_| Error::new(ErrorKind::TruncatedInstruction { offset }))?;
        at += STR_LEN_WIDTH;
        let raw = bytes
            .get(at..at.saturating_add(len))
            .ok_or_else(|| Error::new(ErrorKind::TruncatedInstruction { offset }))?;
        at += len;
        Some(String::from_utf8_lossy(raw).into_owned())
    } else {
        None
    };

    Ok(Decoded {
        offset,
        op,
        args,
        payload,
        size: at - offset,
    })
}

/// Iterator over the instructions of a byte stream.
///
/// Stops after the first decoding error.
pub struct Instructions<'a> {
    bytes: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> Instructions<'a> {
    /// Creates an iterator starting at offset 0.
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            offset: 0,
            failed: false,
        }
    }
}

impl Iterator for Instructions<'_> {
    type Item = Result<Decoded>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.bytes.len() {
            return None;
        }
        match decode_at(self.bytes, self.offset) {
            Ok(decoded) => {
                self.offset = decoded.next_offset();
                Some(Ok(decoded))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Re-encodes `bytes`, passing every operand through `rewrite`.
///
/// `rewrite` receives the opcode, the operand's position and its current
/// value. `Str` payloads are copied untouched, so string bytes are never
/// mistaken for opcodes.
///
/// # Errors
/// Propagates decoding errors, errors from `rewrite`, and operands that
/// no longer fit their field.
pub fn rewrite_operands<F>(bytes: &[u8], mut rewrite: F) -> Result<Vec<u8>>
where
    F: FnMut(Opcode, usize, i64) -> Result<i64>,
{
    let mut out = Vec::with_capacity(bytes.len());
    for decoded in Instructions::new(bytes) {
        let decoded = decoded?;
        if let Some(text) = &decoded.payload {
            encode_str(text, &mut out);
            continue;
        }
        let args = decoded
            .args
            .iter()
            .enumerate()
            .map(|(i, &arg)| rewrite(decoded.op, i, arg))
            .collect::<Result<Vec<_>>>()?;
        encode(decoded.op, &args, &mut out)?;
    }
    Ok(out)
}
