//! Stack-based virtual machine for Sprig bytecode.
//!
//! The VM walks a flat byte stream with three pieces of state beside the
//! instruction pointer:
//!
//! - the **value stack**, holding operands and the end-of-args sentinel
//!   pushed by `End`;
//! - the **frame stack**, holding argument and `let` slots plus two
//!   bookkeeping cells per active call;
//! - the **global table**, indexed by the ids of a shared
//!   [`GlobalRegistry`].
//!
//! # Calling convention
//!
//! ```text
//!   Call f:   base = len(frames)
//!             push f.env ..             captured cells, bottom first
//!             push ReturnFp { fp, base }
//!             push ReturnIp(ip)
//!             fp = len(frames); ip = f.addr
//!
//!   Return:   truncate(fp); pop ReturnIp; pop ReturnFp; truncate(base)
//! ```
//!
//! `RecCall` unwinds the current frame the same way but keeps its
//! bookkeeping cells, so a self tail call never deepens the frame stack.
//!
//! Runtime errors are fatal for the current [`Vm::execute`] call and carry
//! the failing operation and instruction offset.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]


use std::sync::Arc;

use sprig_foundation::{
    Callable, Cell, Error, ErrorKind, Port, Result, Type, Value, ValueList,
};

use crate::globals::GlobalRegistry;
use crate::opcode::{Opcode, STR_LEN_WIDTH, read_operand};

/// Default number of global slots.
pub const DEFAULT_GLOBAL_CAPACITY: usize = 1024;
/// Default frame stack limit, in cells.
pub const DEFAULT_MAX_FRAME_CELLS: usize = 1_000_000;
/// Default value stack limit.
pub const DEFAULT_MAX_STACK: usize = 1_000_000;

// =============================================================================
// Configuration
// =============================================================================

/// VM limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VmConfig {
    /// Size of the global table.
    pub global_capacity: usize,
    /// Maximum frame stack size in cells.
    pub max_frame_cells: usize,
    /// Maximum value stack size.
    pub max_stack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            global_capacity: DEFAULT_GLOBAL_CAPACITY,
            max_frame_cells: DEFAULT_MAX_FRAME_CELLS,
            max_stack: DEFAULT_MAX_STACK,
        }
    }
}

impl VmConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the size of the global table.
    #[must_use]
    pub fn with_global_capacity(mut self, capacity: usize) -> Self {
        self.global_capacity = capacity;
        self
    }

    /// Sets the frame stack limit.
    #[must_use]
    pub fn with_max_frame_cells(mut self, cells: usize) -> Self {
        self.max_frame_cells = cells;
        self
    }

    /// Sets the value stack limit.
    #[must_use]
    pub fn with_max_stack(mut self, depth: usize) -> Self {
        self.max_stack = depth;
        self
    }
}

// =============================================================================
// Observation
// =============================================================================

/// Receives execution events.
///
/// Every method has an empty default so observers only implement what they
/// need. The VM is generic over the observer, so [`NullObserver`] costs
/// nothing.
pub trait VmObserver {
    /// Called before each instruction executes.
    fn on_instruction(&mut self, _offset: usize, _op: Opcode, _stack_depth: usize, _frame_depth: usize) {}

    /// Called after a `Call` or `RecCall` has set up the callee frame.
    fn on_call(&mut self, _offset: usize, _target: u32, _frame_depth: usize, _tail: bool) {}

    /// Called after `Return` has restored the caller.
    fn on_return(&mut self, _offset: usize, _return_to: usize, _frame_depth: usize) {}

    /// Called for each `Debug` marker with the value on top of the stack.
    fn on_debug(&mut self, _offset: usize, _hint: u16, _frame_depth: usize, _top: Option<&Value>) {}

    /// Called when execution stops normally.
    fn on_halt(&mut self, _offset: usize) {}

    /// Called when execution fails.
    fn on_error(&mut self, _error: &Error) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullObserver;

impl VmObserver for NullObserver {}

/// One line written by the `Write` instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputLine {
    /// Destination port.
    pub port: Port,
    /// Rendered value.
    pub text: String,
}

// =============================================================================
// Machine
// =============================================================================

/// An entry of the value stack.
#[derive(Clone, Debug, PartialEq)]
enum StackItem {
    Value(Value),
    /// End-of-args sentinel.
    End,
}

/// Whether the run loop continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Stack-based virtual machine.
pub struct Vm {
    /// Operand stack.
    stack: Vec<StackItem>,
    /// Argument slots and call bookkeeping.
    frames: Vec<Cell>,
    /// Frame pointer: length of the frame stack when the current call began.
    fp: usize,
    /// Instruction pointer.
    ip: usize,
    /// Global values by id (persist across executions).
    globals: Vec<Option<Value>>,
    /// Global names by id, for error messages.
    global_names: Vec<String>,
    /// Output from `Write`.
    output: Vec<OutputLine>,
    config: VmConfig,
    /// Deepest frame stack seen in the last execution.
    max_frame_depth: usize,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new(&GlobalRegistry::with_defaults(), VmConfig::default())
    }
}

impl Vm {
    /// Creates a VM whose global table follows `registry`.
    #[must_use]
    pub fn new(registry: &GlobalRegistry, config: VmConfig) -> Self {
        let mut vm = Self {
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(256),
            fp: 0,
            ip: 0,
            globals: vec![None; config.global_capacity],
            global_names: Vec::new(),
            output: Vec::new(),
            config,
            max_frame_depth: 0,
        };
        vm.install_globals(registry);
        vm
    }

    /// Catches up with globals defined in `registry` since the last call:
    /// copies their names and seeds default values into empty slots.
    ///
    /// Values already stored are kept, so a session can compile more code
    /// against the same registry and run it on the same VM.
    pub fn install_globals(&mut self, registry: &GlobalRegistry) {
        self.global_names = registry.names().to_vec();
        for (id, value) in registry.defaults() {
            if let Some(slot) = self.globals.get_mut(id as usize) {
                slot.get_or_insert_with(|| value.clone());
            }
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Returns the value of global `id`, if set.
    #[must_use]
    pub fn global(&self, id: u32) -> Option<&Value> {
        self.globals.get(id as usize).and_then(Option::as_ref)
    }

    /// Returns every global that has a value, with its name.
    #[must_use]
    pub fn defined_globals(&self) -> Vec<(&str, &Value)> {
        self.global_names
            .iter()
            .zip(&self.globals)
            .filter_map(|(name, value)| value.as_ref().map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Returns the output written so far.
    #[must_use]
    pub fn output(&self) -> &[OutputLine] {
        &self.output
    }

    /// Takes and clears the output.
    pub fn take_output(&mut self) -> Vec<OutputLine> {
        std::mem::take(&mut self.output)
    }

    /// Deepest frame stack, in cells, reached by the last execution.
    #[must_use]
    pub fn max_frame_depth(&self) -> usize {
        self.max_frame_depth
    }

    /// Executes `code` from offset 0 and returns the value left on top of
    /// the stack, or `false` if the stack is empty.
    ///
    /// # Errors
    /// Any runtime failure, annotated with the failing operation and
    /// instruction offset.
    pub fn execute(&mut self, code: &[u8]) -> Result<Value> {
        self.execute_with_observer(code, &mut NullObserver)
    }

    /// Like [`Vm::execute`], reporting events to `observer`.
    ///
    /// # Errors
    /// Any runtime failure; the observer sees it first.
    pub fn execute_with_observer<O: VmObserver>(&mut self, code: &[u8], observer: &mut O) -> Result<Value> {
        self.execute_from_with_observer(code, 0, observer)
    }

    /// Executes `code` starting at `entry`.
    ///
    /// Front ends that keep appending input to one growing stream run each
    /// new piece from where it was placed, so earlier function addresses
    /// stay valid.
    ///
    /// # Errors
    /// As for [`Vm::execute`].
    pub fn execute_from(&mut self, code: &[u8], entry: usize) -> Result<Value> {
        self.execute_from_with_observer(code, entry, &mut NullObserver)
    }

    /// Like [`Vm::execute_from`], reporting events to `observer`.
    ///
    /// # Errors
    /// As for [`Vm::execute_with_observer`].
    pub fn execute_from_with_observer<O: VmObserver>(
        &mut self,
        code: &[u8],
        entry: usize,
        observer: &mut O,
    ) -> Result<Value> {
        let result = self.run(code, entry, observer);
        if let Err(e) = &result {
            observer.on_error(e);
        }
        result
    }

    fn run<O: VmObserver>(&mut self, code: &[u8], entry: usize, observer: &mut O) -> Result<Value> {
        self.stack.clear();
        self.frames.clear();
        self.fp = 0;
        self.ip = entry;
        self.max_frame_depth = 0;

        while self.ip < code.len() {
            let offset = self.ip;
            let op = Opcode::from_byte(code[offset]).map_err(|e| e.at_instruction("decode", offset))?;
            observer.on_instruction(offset, op, self.stack.len(), self.frames.len());

            let flow = self
                .step(code, offset, op, observer)
                .map_err(|e| e.at_instruction(op.mnemonic(), offset))?;
            if flow == Flow::Halt {
                observer.on_halt(offset);
                return self.result();
            }
        }

        observer.on_halt(self.ip);
        self.result()
    }

    /// The value on top of the stack; a program that leaves nothing
    /// evaluates to `false`.
    fn result(&mut self) -> Result<Value> {
        match self.stack.pop() {
            Some(StackItem::Value(value)) => Ok(value),
            Some(StackItem::End) => Err(Error::internal("end-of-args marker left on top of the stack")),
            None => Ok(Value::Bool(false)),
        }
    }

    /// Executes the instruction at `offset`.
    fn step<O: VmObserver>(&mut self, code: &[u8], offset: usize, op: Opcode, observer: &mut O) -> Result<Flow> {
        let (args, next) = operands(code, offset, op)?;
        self.ip = next;

        match op {
            Opcode::Nop => {}
            Opcode::Halt => return Ok(Flow::Halt),

            // === Literals ===
            Opcode::Const => self.push(Value::Int(args[0] as i64))?,
            Opcode::True => self.push(Value::Bool(true))?,
            Opcode::False => self.push(Value::Bool(false))?,
            Opcode::Str => {
                let len = usize::try_from(read_operand(code, next, STR_LEN_WIDTH, offset)?)
                    .map_err(|_| Error::new(ErrorKind::TruncatedInstruction { offset }))?;
                let start = next + STR_LEN_WIDTH;
                let bytes = code
                    .get(start..start.saturating_add(len))
                    .ok_or_else(|| Error::new(ErrorKind::TruncatedInstruction { offset }))?;
                self.ip = start + len;
                self.push(Value::String(Arc::from(String::from_utf8_lossy(bytes).as_ref())))?;
            }
            Opcode::Pop => {
                self.pop()?;
            }

            // === Arithmetic ===
            Opcode::Add => self.int_op(i64::wrapping_add)?,
            Opcode::Sub => self.int_op(i64::wrapping_sub)?,
            Opcode::Mul => self.int_op(i64::wrapping_mul)?,
            Opcode::Div => self.checked_int_op(i64::wrapping_div)?,
            Opcode::Mod => self.checked_int_op(i64::wrapping_rem)?,

            // === Comparison / Logic ===
            Opcode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Bool(a == b))?;
            }
            Opcode::Lt => self.compare(|ord| ord.is_lt())?,
            Opcode::Le => self.compare(|ord| ord.is_le())?,
            Opcode::Not => {
                let v = self.pop()?;
                self.push(Value::Bool(!v.is_truthy()))?;
            }

            // === Jumps ===
            Opcode::Jump => self.ip = args[0] as usize,
            Opcode::JumpIf => {
                if self.pop()?.is_truthy() {
                    self.ip = args[0] as usize;
                }
            }
            Opcode::JumpIfNot => {
                if !self.pop()?.is_truthy() {
                    self.ip = args[0] as usize;
                }
            }

            // === Argument lists ===
            Opcode::End => self.push_item(StackItem::End)?,
            Opcode::List => {
                let mut items = Vec::new();
                loop {
                    match self.pop_item()? {
                        StackItem::End => break,
                        StackItem::Value(v) => items.push(v),
                    }
                }
                self.push(Value::List(ValueList::from(items)))?;
            }
            Opcode::EmptyVector => self.push(Value::List(ValueList::new()))?,

            // === Frames ===
            Opcode::PushArgs => {
                let n = args[0] as usize;
                for taken in 0..n {
                    match self.pop_item()? {
                        StackItem::Value(v) => self.push_cell(Cell::Slot(v))?,
                        StackItem::End => {
                            return Err(Error::arity_mismatch("call", n.to_string(), taken));
                        }
                    }
                }
            }
            Opcode::DropArgs => {
                let n = args[0] as usize;
                if n > self.frames.len() - self.fp {
                    return Err(Error::new(ErrorKind::FrameAccess {
                        index: n,
                        depth: self.frames.len(),
                    }));
                }
                self.frames.truncate(self.frames.len() - n);
            }
            Opcode::DropEnd => match self.pop_item()? {
                StackItem::End => {}
                StackItem::Value(_) => {
                    // The prologue has just moved the fixed arguments into
                    // the frame; whatever is left above the marker is extra.
                    let expected = self.frames.len().saturating_sub(self.fp);
                    let extra = 1 + self
                        .stack
                        .iter()
                        .rev()
                        .take_while(|item| matches!(item, StackItem::Value(_)))
                        .count();
                    return Err(Error::arity_mismatch("call", expected.to_string(), expected + extra));
                }
            },
            Opcode::GetArg => {
                let index = self.frame_index(args[0] as usize)?;
                match &self.frames[index] {
                    Cell::Slot(v) => {
                        let v = v.clone();
                        self.push(v)?;
                    }
                    _ => return Err(Error::internal(format!("slot {} holds call bookkeeping", args[0]))),
                }
            }
            Opcode::SetLocal => {
                let index = self.frame_index(args[0] as usize)?;
                let v = self.peek()?.clone();
                self.frames[index] = Cell::Slot(v);
            }

            // === Globals ===
            Opcode::GetGlobal => {
                let id = args[0] as u32;
                let slot = self.global_slot(id)?;
                let v = self.globals[slot].clone().ok_or_else(|| {
                    let name = self
                        .global_names
                        .get(slot)
                        .cloned()
                        .unwrap_or_else(|| format!("#{id}"));
                    Error::new(ErrorKind::UndefinedGlobal(name))
                })?;
                self.push(v)?;
            }
            Opcode::SetGlobal => {
                let slot = self.global_slot(args[0] as u32)?;
                self.globals[slot] = Some(self.peek()?.clone());
            }

            // === Calls ===
            Opcode::Ref => {
                let addr = args[0] as u32;
                let cargs = args[1] as usize;
                if cargs > self.frames.len() {
                    return Err(Error::new(ErrorKind::FrameAccess {
                        index: cargs,
                        depth: self.frames.len(),
                    }));
                }
                let env = self.frames[self.frames.len() - cargs..].to_vec();
                self.push(Value::Ref(Callable::with_env(addr, env)))?;
            }
            Opcode::Call => {
                let callee = self.pop_callable()?;
                let return_fp = Cell::ReturnFp {
                    fp: self.fp,
                    base: self.frames.len(),
                };
                self.enter(&callee, return_fp, Cell::ReturnIp(self.ip))?;
                observer.on_call(offset, callee.addr, self.frames.len(), false);
            }
            Opcode::RecCall => {
                let callee = self.pop_callable()?;
                let (return_fp, return_ip) = self.unwind()?;
                self.enter(&callee, return_fp, return_ip)?;
                observer.on_call(offset, callee.addr, self.frames.len(), true);
            }
            Opcode::Return => {
                let (return_fp, return_ip) = self.unwind()?;
                if let (Cell::ReturnFp { fp, .. }, Cell::ReturnIp(ip)) = (return_fp, return_ip) {
                    self.fp = fp;
                    self.ip = ip;
                }
                observer.on_return(offset, self.ip, self.frames.len());
            }

            // === Lists ===
            Opcode::Fst => {
                let xs = self.pop_list()?;
                let first = xs
                    .first()
                    .cloned()
                    .ok_or_else(|| Error::new(ErrorKind::IndexOutOfBounds { index: 0, length: 0 }))?;
                self.push(first)?;
            }
            Opcode::Rest => {
                let xs = self.pop_list()?;
                self.push(Value::List(xs.rest()))?;
            }
            Opcode::Cons => {
                let xs = self.pop_list()?;
                let x = self.pop()?;
                self.push(Value::List(xs.cons(x)))?;
            }
            Opcode::Length => {
                let len = match self.pop()? {
                    Value::List(xs) => xs.len(),
                    Value::String(s) => s.chars().count(),
                    other => return Err(Error::type_mismatch(Type::List, other.value_type())),
                };
                self.push(Value::Int(len as i64))?;
            }
            Opcode::Dissolve => {
                let xs = self.pop_list()?;
                for x in xs.iter().rev() {
                    self.push(x.clone())?;
                }
            }

            // === I/O and diagnostics ===
            Opcode::Write => {
                let v = self.pop()?;
                let port = match self.pop()? {
                    Value::Port(port) => port,
                    other => return Err(Error::type_mismatch(Type::Port, other.value_type())),
                };
                self.output.push(OutputLine {
                    port,
                    text: v.to_string(),
                });
                self.push(v)?;
            }
            Opcode::Debug => {
                let top = match self.stack.last() {
                    Some(StackItem::Value(v)) => Some(v),
                    _ => None,
                };
                observer.on_debug(offset, args[0] as u16, self.frames.len(), top);
            }
        }

        Ok(Flow::Continue)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Pushes the callee's captured cells and the bookkeeping cells, then
    /// jumps to its entry.
    fn enter(&mut self, callee: &Callable, return_fp: Cell, return_ip: Cell) -> Result<()> {
        for cell in callee.env.iter() {
            self.push_cell(cell.clone())?;
        }
        self.push_cell(return_fp)?;
        self.push_cell(return_ip)?;
        self.fp = self.frames.len();
        self.ip = callee.addr as usize;
        Ok(())
    }

    /// Drops the current frame and its captured cells, returning its
    /// bookkeeping cells.
    fn unwind(&mut self) -> Result<(Cell, Cell)> {
        if self.fp < 2 || self.fp > self.frames.len() {
            return Err(Error::internal("return outside of a function call"));
        }
        self.frames.truncate(self.fp);
        let return_ip = self.frames.pop();
        let return_fp = self.frames.pop();
        match (return_fp, return_ip) {
            (Some(return_fp @ Cell::ReturnFp { base, .. }), Some(return_ip @ Cell::ReturnIp(_))) => {
                self.frames.truncate(base);
                Ok((return_fp, return_ip))
            }
            _ => Err(Error::internal("corrupt call bookkeeping on the frame stack")),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn push(&mut self, value: Value) -> Result<()> {
        self.push_item(StackItem::Value(value))
    }

    fn push_item(&mut self, item: StackItem) -> Result<()> {
        if self.stack.len() >= self.config.max_stack {
            return Err(Error::new(ErrorKind::StackOverflow {
                limit: self.config.max_stack,
            }));
        }
        self.stack.push(item);
        Ok(())
    }

    fn pop_item(&mut self) -> Result<StackItem> {
        self.stack.pop().ok_or_else(Error::stack_underflow)
    }

    fn pop(&mut self) -> Result<Value> {
        match self.pop_item()? {
            StackItem::Value(v) => Ok(v),
            StackItem::End => Err(Error::internal("expected a value, found the end-of-args marker")),
        }
    }

    fn peek(&self) -> Result<&Value> {
        match self.stack.last() {
            Some(StackItem::Value(v)) => Ok(v),
            Some(StackItem::End) => Err(Error::internal("expected a value, found the end-of-args marker")),
            None => Err(Error::stack_underflow()),
        }
    }

    fn pop_int(&mut self) -> Result<i64> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(Error::type_mismatch(Type::Int, other.value_type())),
        }
    }

    fn pop_list(&mut self) -> Result<ValueList> {
        match self.pop()? {
            Value::List(xs) => Ok(xs),
            other => Err(Error::type_mismatch(Type::List, other.value_type())),
        }
    }

    fn pop_callable(&mut self) -> Result<Callable> {
        match self.pop()? {
            Value::Ref(callable) => Ok(callable),
            other => Err(Error::type_mismatch(Type::Fn, other.value_type())),
        }
    }

    fn int_op(&mut self, op: fn(i64, i64) -> i64) -> Result<()> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        self.push(Value::Int(op(a, b)))
    }

    /// Division-like operation: a zero divisor is an error.
    fn checked_int_op(&mut self, op: fn(i64, i64) -> i64) -> Result<()> {
        let b = self.pop_int()?;
        let a = self.pop_int()?;
        if b == 0 {
            return Err(Error::new(ErrorKind::DivisionByZero));
        }
        self.push(Value::Int(op(a, b)))
    }

    /// `Lt`/`Le`: integers with integers, strings with strings.
    fn compare(&mut self, test: fn(std::cmp::Ordering) -> bool) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let ordering = match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => x.cmp(y),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Int(_) | Value::String(_), other) => {
                return Err(Error::type_mismatch(a.value_type(), other.value_type()));
            }
            (other, _) => return Err(Error::type_mismatch(Type::Int, other.value_type())),
        };
        self.push(Value::Bool(test(ordering)))
    }

    fn push_cell(&mut self, cell: Cell) -> Result<()> {
        if self.frames.len() >= self.config.max_frame_cells {
            return Err(Error::new(ErrorKind::FrameOverflow {
                limit: self.config.max_frame_cells,
            }));
        }
        self.frames.push(cell);
        self.max_frame_depth = self.max_frame_depth.max(self.frames.len());
        Ok(())
    }

    /// Converts a top-relative slot index into a frame stack index.
    fn frame_index(&self, slot: usize) -> Result<usize> {
        if slot < self.frames.len() {
            Ok(self.frames.len() - 1 - slot)
        } else {
            Err(Error::new(ErrorKind::FrameAccess {
                index: slot,
                depth: self.frames.len(),
            }))
        }
    }

    fn global_slot(&self, id: u32) -> Result<usize> {
        let slot = id as usize;
        if slot < self.globals.len() {
            Ok(slot)
        } else {
            Err(Error::new(ErrorKind::GlobalOutOfBounds {
                id,
                capacity: self.globals.len(),
            }))
        }
    }
}

/// Reads the fixed-width operands of the instruction at `offset`.
///
/// Returns them zero-extended, plus the offset just past them.
fn operands(code: &[u8], offset: usize, op: Opcode) -> Result<([u64; 2], usize)> {
    let mut args = [0; 2];
    let mut at = offset + 1;
    for (slot, &width) in args.iter_mut().zip(op.arg_widths()) {
        *slot = read_operand(code, at, width, offset)?;
        at += width;
    }
    Ok((args, at))
}

/// Evaluates source text on a fresh VM and returns the result.
///
/// # Errors
/// Parse, expansion, compile and runtime errors.
pub fn eval(source: &str) -> Result<Value> {
    let forms = crate::expand::expand(crate::parser::parse(source)?)?.forms;
    let mut globals = GlobalRegistry::with_defaults();
    let image = crate::library::compile_image(&forms, &mut globals)?;
    Vm::new(&globals, VmConfig::default()).execute(&image.code)
}
