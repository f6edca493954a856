//! Compiler from expanded AST to abstract assembly.
//!
//! Code generation is single-pass and stack-oriented. The conventions the
//! VM relies on:
//!
//! - A call `(f a b c)` emits `End, c, b, a, f, Call`. Arguments are
//!   compiled in reverse so the callee's `PushArgs n` pops the leftmost
//!   argument first and it lands in the deepest slot.
//! - A function body starts with `PushArgs n` for its fixed parameters
//!   (omitted when there are none), then either `List, PushArgs 1` for a
//!   trailing `&rest` parameter or `DropEnd`, and ends with `Return`.
//! - `let` pushes each binding with `PushArgs 1` into the current frame
//!   and drops them all with `DropArgs n` after the body.
//!
//! Errors abort the current top-level form only; [`Compiler::compile_program`]
//! keeps going with the next form and reports every failure at the end.

#![allow(clippy::too_many_lines)]

use sprig_foundation::{Error, ErrorKind, Result};

use crate::asm::{AsmCmd, AsmCode, Label, LabelGen};
use crate::ast::Ast;
use crate::globals::GlobalRegistry;
use crate::opcode::Opcode;
use crate::span::Span;
use crate::symbols::SymbolTable;


/// Where function bodies go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Bodies are emitted in place, behind a jump over them. The result is a
    /// single self-contained stream.
    Inline,
    /// Bodies are collected into a function table (see
    /// [`Compiler::take_functions`]) for building a relocatable library.
    Hoisted,
}

/// A function body removed from the main stream by [`Layout::Hoisted`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionBody {
    /// Label placed at the body's first instruction.
    pub label: Label,
    /// The body, starting with that label.
    pub code: AsmCode,
}

/// Fixed-arity primitive operation.
#[derive(Clone, Copy, Debug)]
struct Primitive {
    op: Opcode,
    arity: usize,
    /// Compile arguments right to left (`>` is `<` with swapped operands).
    reversed: bool,
}

const fn prim(op: Opcode, arity: usize, reversed: bool) -> Option<Primitive> {
    Some(Primitive {
        op,
        arity,
        reversed,
    })
}

fn primitive(name: &str) -> Option<Primitive> {
    match name {
        "fst" => prim(Opcode::Fst, 1, false),
        "rest" => prim(Opcode::Rest, 1, false),
        "len" => prim(Opcode::Length, 1, false),
        "dissolve" => prim(Opcode::Dissolve, 1, false),
        "not" => prim(Opcode::Not, 1, false),
        "=" => prim(Opcode::Eq, 2, false),
        "<" => prim(Opcode::Lt, 2, false),
        ">" => prim(Opcode::Lt, 2, true),
        "<=" => prim(Opcode::Le, 2, false),
        ">=" => prim(Opcode::Le, 2, true),
        "::" => prim(Opcode::Cons, 2, false),
        "mod" => prim(Opcode::Mod, 2, false),
        "write" => prim(Opcode::Write, 2, false),
        _ => None,
    }
}

/// Forms that must be gone before compilation.
fn is_pre_compile_form(name: &str) -> bool {
    matches!(
        name,
        "use" | "defmacro" | "quote" | "quasiquote" | "unquote" | "unquote-splicing"
    )
}

fn error_at(span: Span, error: Error) -> Error {
    error.at_position(span.line, span.column)
}

/// Single-pass compiler.
///
/// Borrows the global registry for its lifetime so ids assigned by `def`
/// are immediately visible to the VM that will run the result.
pub struct Compiler<'g> {
    globals: &'g mut GlobalRegistry,
    labels: LabelGen,
    symbols: SymbolTable,
    /// Name of the innermost `def` being compiled; `rec` may only call it.
    self_name: Option<String>,
    layout: Layout,
    functions: Vec<FunctionBody>,
}

impl<'g> Compiler<'g> {
    /// Creates a compiler producing a single inline stream.
    #[must_use]
    pub fn new(globals: &'g mut GlobalRegistry) -> Self {
        Self::with_layout(globals, Layout::Inline)
    }

    /// Creates a compiler that hoists function bodies into a table.
    #[must_use]
    pub fn hoisting(globals: &'g mut GlobalRegistry) -> Self {
        Self::with_layout(globals, Layout::Hoisted)
    }

    /// Creates a compiler with the given layout.
    #[must_use]
    pub fn with_layout(globals: &'g mut GlobalRegistry, layout: Layout) -> Self {
        Self {
            globals,
            labels: LabelGen::new(),
            symbols: SymbolTable::new(),
            self_name: None,
            layout,
            functions: Vec::new(),
        }
    }

    /// The layout this compiler emits.
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Read access to the global registry.
    #[must_use]
    pub fn globals(&self) -> &GlobalRegistry {
        self.globals
    }

    /// Takes the hoisted function bodies compiled so far.
    pub fn take_functions(&mut self) -> Vec<FunctionBody> {
        std::mem::take(&mut self.functions)
    }

    /// Compiles a sequence of top-level forms, discarding every value but
    /// the last.
    ///
    /// # Errors
    /// Returns `CompileFailed` with one error per failing form. Forms after
    /// a failure are still compiled so all problems are reported at once.
    pub fn compile_program(&mut self, forms: &[Ast]) -> Result<AsmCode> {
        let mut out = AsmCode::new();
        let mut errors = Vec::new();
        let mut emitted = false;

        for form in forms {
            match self.compile_form(form) {
                Ok(code) => {
                    if emitted {
                        out.op(Opcode::Pop);
                    }
                    out.append(code);
                    emitted = true;
                }
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(Error::new(ErrorKind::CompileFailed(errors)))
        }
    }

    /// Compiles one top-level form.
    ///
    /// On failure nothing the form produced is kept.
    ///
    /// # Errors
    /// Returns the first structural error in the form.
    pub fn compile_form(&mut self, form: &Ast) -> Result<AsmCode> {
        let mark = self.functions.len();
        let mut out = AsmCode::new();
        match self.compile_node(form, &mut out) {
            Ok(()) => Ok(out),
            Err(e) => {
                self.functions.truncate(mark);
                self.symbols.reset();
                self.self_name = None;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    fn compile_node(&mut self, node: &Ast, out: &mut AsmCode) -> Result<()> {
        match node {
            Ast::Bool(true, _) => out.op(Opcode::True),
            Ast::Bool(false, _) => out.op(Opcode::False),
            Ast::Int(n, _) => out.op_with(Opcode::Const, &[*n]),
            Ast::String(s, _) => out.push(AsmCmd::Str(s.clone())),
            Ast::Symbol(name, span) => self.compile_symbol(name, *span, out)?,
            Ast::Vector(items, _) => self.compile_sequence(items, out)?,
            Ast::List(items, span) => self.compile_list(items, *span, out)?,
            Ast::Error(message, span) => {
                return Err(error_at(
                    *span,
                    Error::new(ErrorKind::UnsupportedNode(format!("error ({message})"))),
                ));
            }
        }
        Ok(())
    }

    fn compile_symbol(&mut self, name: &str, span: Span, out: &mut AsmCode) -> Result<()> {
        if let Some(resolved) = self.symbols.index_of(name) {
            let index = frame_index(resolved.index, span)?;
            out.op_with(Opcode::GetArg, &[index]);
        } else if let Some(id) = self.globals.lookup(name) {
            out.op_with(Opcode::GetGlobal, &[i64::from(id)]);
        } else {
            return Err(error_at(span, Error::undefined_symbol(name)));
        }
        Ok(())
    }

    /// Vector literal: `End, xn .. x1, List`, or `EmptyVector`.
    fn compile_sequence(&mut self, items: &[Ast], out: &mut AsmCode) -> Result<()> {
        if items.is_empty() {
            out.op(Opcode::EmptyVector);
            return Ok(());
        }
        out.op(Opcode::End);
        for item in items.iter().rev() {
            self.compile_node(item, out)?;
        }
        out.op(Opcode::List);
        Ok(())
    }

    fn compile_list(&mut self, items: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let Some((head, args)) = items.split_first() else {
            out.op(Opcode::EmptyVector);
            return Ok(());
        };

        let Ast::Symbol(name, _) = head else {
            return self.compile_call(head, args, false, out);
        };

        match name.as_str() {
            "if" => self.compile_if(args, span, out),
            "cond" => self.compile_cond(args, span, out),
            "let" => self.compile_let(args, span, out),
            "def" => self.compile_def(args, span, out),
            "fn" => self.compile_fn(args, span, out),
            "do" => self.compile_body(args, out),
            "and" => self.compile_and(args, out),
            "or" => self.compile_or(args, out),
            "rec" => self.compile_rec(args, span, out),
            "debug" => self.compile_debug(args, span, out),
            "set!" => self.compile_set(args, span, out),
            "+" => self.compile_fold(Opcode::Add, 0, args, out),
            "*" => self.compile_fold(Opcode::Mul, 1, args, out),
            "-" => self.compile_inverse(Opcode::Sub, "-", 0, args, span, out),
            "/" => self.compile_inverse(Opcode::Div, "/", 1, args, span, out),
            other if is_pre_compile_form(other) => Err(error_at(
                span,
                Error::invalid_form(format!("{other} must be expanded before compilation")),
            )),
            other => match primitive(other) {
                Some(p) => self.compile_primitive(other, p, args, span, out),
                None => self.compile_call(head, args, false, out),
            },
        }
    }

    /// `End, an .. a1, callee, Call|RecCall`.
    fn compile_call(&mut self, callee: &Ast, args: &[Ast], tail: bool, out: &mut AsmCode) -> Result<()> {
        out.op(Opcode::End);
        for arg in args.iter().rev() {
            self.compile_node(arg, out)?;
        }
        self.compile_node(callee, out)?;
        out.op(if tail { Opcode::RecCall } else { Opcode::Call });
        Ok(())
    }

    fn compile_primitive(
        &mut self,
        name: &str,
        p: Primitive,
        args: &[Ast],
        span: Span,
        out: &mut AsmCode,
    ) -> Result<()> {
        if args.len() != p.arity {
            return Err(error_at(
                span,
                Error::arity_mismatch(name, p.arity.to_string(), args.len()),
            ));
        }
        if p.reversed {
            for arg in args.iter().rev() {
                self.compile_node(arg, out)?;
            }
        } else {
            for arg in args {
                self.compile_node(arg, out)?;
            }
        }
        out.op(p.op);
        Ok(())
    }

    /// Forms evaluated for their last value; empty yields `false`.
    fn compile_body(&mut self, forms: &[Ast], out: &mut AsmCode) -> Result<()> {
        if forms.is_empty() {
            out.op(Opcode::False);
            return Ok(());
        }
        for (i, form) in forms.iter().enumerate() {
            if i > 0 {
                out.op(Opcode::Pop);
            }
            self.compile_node(form, out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// `+` and `*`: identity for no arguments, the argument itself for one,
    /// otherwise a strict left fold `x1, x2, op, x3, op, ..`.
    fn compile_fold(&mut self, op: Opcode, identity: i64, args: &[Ast], out: &mut AsmCode) -> Result<()> {
        let Some((first, rest)) = args.split_first() else {
            out.op_with(Opcode::Const, &[identity]);
            return Ok(());
        };
        self.compile_node(first, out)?;
        for arg in rest {
            self.compile_node(arg, out)?;
            out.op(op);
        }
        Ok(())
    }

    /// `-` and `/`: identity for no arguments, `identity, x, op` for one,
    /// `x, y, op` for two. More is an error.
    fn compile_inverse(
        &mut self,
        op: Opcode,
        name: &str,
        identity: i64,
        args: &[Ast],
        span: Span,
        out: &mut AsmCode,
    ) -> Result<()> {
        match args {
            [] => out.op_with(Opcode::Const, &[identity]),
            [x] => {
                out.op_with(Opcode::Const, &[identity]);
                self.compile_node(x, out)?;
                out.op(op);
            }
            [x, y] => {
                self.compile_node(x, out)?;
                self.compile_node(y, out)?;
                out.op(op);
            }
            _ => {
                return Err(error_at(
                    span,
                    Error::arity_mismatch(name, "0, 1 or 2", args.len()),
                ));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Control flow
    // =========================================================================

    fn compile_if(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        if !(2..=3).contains(&args.len()) {
            return Err(error_at(span, Error::arity_mismatch("if", "2 or 3", args.len())));
        }
        let alt = self.labels.fresh();
        let end = self.labels.fresh();

        self.compile_node(&args[0], out)?;
        out.jump(Opcode::JumpIfNot, alt);
        self.compile_node(&args[1], out)?;
        out.jump(Opcode::Jump, end);
        out.label(alt);
        match args.get(2) {
            Some(otherwise) => self.compile_node(otherwise, out)?,
            None => out.op(Opcode::False),
        }
        out.label(end);
        Ok(())
    }

    /// `(cond c1 b1 c2 b2 ..)`: each pair skips to its own label when the
    /// condition fails; no match yields `false`.
    fn compile_cond(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        if args.len() % 2 != 0 {
            return Err(error_at(
                span,
                Error::invalid_form("cond expects condition/body pairs"),
            ));
        }
        let end = self.labels.fresh();
        for pair in args.chunks(2) {
            let next = self.labels.fresh();
            self.compile_node(&pair[0], out)?;
            out.jump(Opcode::JumpIfNot, next);
            self.compile_node(&pair[1], out)?;
            out.jump(Opcode::Jump, end);
            out.label(next);
        }
        out.op(Opcode::False);
        out.label(end);
        Ok(())
    }

    fn compile_and(&mut self, args: &[Ast], out: &mut AsmCode) -> Result<()> {
        self.compile_short_circuit(args, Opcode::JumpIfNot, false, out)
    }

    fn compile_or(&mut self, args: &[Ast], out: &mut AsmCode) -> Result<()> {
        self.compile_short_circuit(args, Opcode::JumpIf, true, out)
    }

    /// `and`/`or`: every operand but the last branches to a shared label
    /// that pushes the short-circuit constant; the last operand's value is
    /// the result otherwise.
    fn compile_short_circuit(
        &mut self,
        args: &[Ast],
        branch: Opcode,
        short: bool,
        out: &mut AsmCode,
    ) -> Result<()> {
        let short_op = if short { Opcode::True } else { Opcode::False };
        let Some((last, init)) = args.split_last() else {
            out.op(if short { Opcode::False } else { Opcode::True });
            return Ok(());
        };
        if init.is_empty() {
            return self.compile_node(last, out);
        }

        let taken = self.labels.fresh();
        let end = self.labels.fresh();
        for arg in init {
            self.compile_node(arg, out)?;
            out.jump(branch, taken);
        }
        self.compile_node(last, out)?;
        out.jump(Opcode::Jump, end);
        out.label(taken);
        out.op(short_op);
        out.label(end);
        Ok(())
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    fn compile_let(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let Some((bindings, body)) = args.split_first() else {
            return Err(error_at(span, Error::arity_mismatch("let", "at least 1", 0)));
        };
        let Some(bindings) = bindings.as_vector() else {
            return Err(error_at(
                bindings.span(),
                Error::invalid_form("let bindings must be a vector"),
            ));
        };
        if bindings.len() % 2 != 0 {
            return Err(error_at(
                span,
                Error::invalid_form("let bindings must be name/value pairs"),
            ));
        }

        let drop = frame_index(bindings.len() / 2, span)?;
        let mut bound = 0;
        for pair in bindings.chunks(2) {
            let Some(name) = pair[0].as_symbol() else {
                return Err(error_at(
                    pair[0].span(),
                    Error::invalid_form(format!(
                        "let binding target must be a symbol, got {}",
                        pair[0].type_name()
                    )),
                ));
            };
            self.compile_node(&pair[1], out)?;
            out.op_with(Opcode::PushArgs, &[1]);
            self.symbols.declare(name);
            bound += 1;
        }

        self.compile_body(body, out)?;

        if bound > 0 {
            out.op_with(Opcode::DropArgs, &[drop]);
            self.symbols.release(bound);
        }
        Ok(())
    }

    fn compile_def(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let [target, value] = args else {
            return Err(error_at(span, Error::arity_mismatch("def", "2", args.len())));
        };
        let Some(name) = target.as_symbol() else {
            return Err(error_at(
                target.span(),
                Error::invalid_form(format!("def target must be a symbol, got {}", target.type_name())),
            ));
        };

        // Reserved before the value is compiled so the body can refer to it.
        let id = self.globals.define(name);

        let outer = self.self_name.replace(name.to_string());
        let compiled = self.compile_node(value, out);
        self.self_name = outer;
        compiled?;

        out.op_with(Opcode::SetGlobal, &[i64::from(id)]);
        Ok(())
    }

    fn compile_set(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let [target, value] = args else {
            return Err(error_at(span, Error::arity_mismatch("set!", "2", args.len())));
        };
        let Some(name) = target.as_symbol() else {
            return Err(error_at(
                target.span(),
                Error::invalid_form("set! target must be a symbol"),
            ));
        };

        self.compile_node(value, out)?;
        if let Some(resolved) = self.symbols.index_of(name) {
            out.op_with(Opcode::SetLocal, &[frame_index(resolved.index, span)?]);
        } else if let Some(id) = self.globals.lookup(name) {
            out.op_with(Opcode::SetGlobal, &[i64::from(id)]);
        } else {
            return Err(error_at(target.span(), Error::undefined_symbol(name)));
        }
        Ok(())
    }

    // =========================================================================
    // Functions
    // =========================================================================

    fn compile_fn(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let Some((params, body)) = args.split_first() else {
            return Err(error_at(span, Error::arity_mismatch("fn", "at least 1", 0)));
        };
        let Some(params) = params.as_vector() else {
            return Err(error_at(
                params.span(),
                Error::invalid_form("fn parameters must be a vector"),
            ));
        };
        let (fixed, rest) = parse_params(params)?;
        let arity = u8::try_from(fixed.len()).map_err(|_| {
            error_at(
                args[0].span(),
                Error::invalid_form(format!("fn takes at most {} fixed parameters", u8::MAX)),
            )
        })?;

        let entry = self.labels.fresh();
        let mut code = AsmCode::new();
        code.label(entry);

        self.symbols.push_scope();
        let compiled = self.compile_fn_body(&fixed, arity, rest, body, &mut code);
        let reach = self.symbols.pop_scope();
        compiled?;

        let captures = u16::try_from(reach).map_err(|_| {
            error_at(span, Error::invalid_form("closure captures too many frame cells"))
        })?;

        match self.layout {
            Layout::Inline => {
                let after = self.labels.fresh();
                out.jump(Opcode::Jump, after);
                out.append(code);
                out.label(after);
            }
            Layout::Hoisted => self.functions.push(FunctionBody { label: entry, code }),
        }
        out.push(AsmCmd::FnRef(entry, captures));
        Ok(())
    }

    fn compile_fn_body(
        &mut self,
        fixed: &[&str],
        arity: u8,
        rest: Option<&str>,
        body: &[Ast],
        code: &mut AsmCode,
    ) -> Result<()> {
        if arity > 0 {
            code.op_with(Opcode::PushArgs, &[i64::from(arity)]);
        }
        for name in fixed {
            self.symbols.declare(name);
        }
        match rest {
            Some(name) => {
                code.op(Opcode::List);
                code.op_with(Opcode::PushArgs, &[1]);
                self.symbols.declare(name);
            }
            None => code.op(Opcode::DropEnd),
        }
        self.compile_body(body, code)?;
        code.op(Opcode::Return);
        Ok(())
    }

    /// `(rec (f args..))`: a self-call that reuses the current frame.
    fn compile_rec(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let [call] = args else {
            return Err(error_at(span, Error::arity_mismatch("rec", "1", args.len())));
        };
        if self.symbols.fn_depth() == 0 {
            return Err(error_at(span, Error::invalid_form("rec used outside of a function body")));
        }
        let Some(self_name) = self.self_name.clone() else {
            return Err(error_at(span, Error::invalid_form("rec used outside of a def")));
        };
        let Some((callee, call_args)) = call.as_list().and_then(<[Ast]>::split_first) else {
            return Err(error_at(call.span(), Error::invalid_form("rec expects a call")));
        };
        if callee.as_symbol() != Some(self_name.as_str()) {
            return Err(error_at(
                call.span(),
                Error::invalid_form(format!("rec expects a self-call of {self_name}, got {callee}")),
            ));
        }
        self.compile_call(callee, call_args, true, out)
    }

    fn compile_debug(&mut self, args: &[Ast], span: Span, out: &mut AsmCode) -> Result<()> {
        let [value] = args else {
            return Err(error_at(span, Error::arity_mismatch("debug", "1", args.len())));
        };
        self.compile_node(value, out)?;
        out.op_with(Opcode::Debug, &[frame_index(self.symbols.size(), span)?]);
        Ok(())
    }
}

/// Splits a parameter vector into fixed names and an optional `&rest` name.
fn parse_params(params: &[Ast]) -> Result<(Vec<&str>, Option<&str>)> {
    let mut fixed = Vec::with_capacity(params.len());
    let mut rest = None;

    for (i, param) in params.iter().enumerate() {
        let Some(name) = param.as_symbol() else {
            return Err(error_at(
                param.span(),
                Error::invalid_form(format!("fn parameter must be a symbol, got {}", param.type_name())),
            ));
        };
        match name.strip_prefix('&') {
            Some("") => {
                return Err(error_at(
                    param.span(),
                    Error::invalid_form("variadic parameter needs a name after &"),
                ));
            }
            Some(_) if i + 1 != params.len() => {
                return Err(error_at(
                    param.span(),
                    Error::invalid_form(format!("variadic parameter {name} must be last")),
                ));
            }
            Some(stripped) => rest = Some(stripped),
            None => fixed.push(name),
        }
    }

    if fixed.len() > usize::from(u8::MAX) {
        let span = params.first().map(Ast::span).unwrap_or_default();
        return Err(error_at(span, Error::invalid_form("too many fn parameters")));
    }
    Ok((fixed, rest))
}

/// Checks that a frame index fits a 2-byte operand.
fn frame_index(index: usize, span: Span) -> Result<i64> {
    u16::try_from(index)
        .map(i64::from)
        .map_err(|_| error_at(span, Error::invalid_form("too many bindings in scope")))
}
