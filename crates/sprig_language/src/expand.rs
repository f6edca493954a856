//! Macro and quote expansion.
//!
//! The expander runs between the parser and the compiler and removes every
//! form the compiler does not lower itself:
//!
//! - `(defmacro name [params] template..)` registers a template macro and
//!   disappears from the program;
//! - a call to a registered macro is replaced by its template with the
//!   parameters substituted, then expanded again;
//! - `quote` and `quasiquote` are rewritten into literals.
//!
//! # Quote desugaring
//!
//! Values have no symbol type, so quoting produces plain data:
//!
//! ```text
//! '42          =>  42
//! 'name        =>  "name"
//! '(a [1 b])   =>  ["a" [1 "b"]]
//! `(a ~x ~@ys) =>  ["a" x (dissolve ys)]
//! ```

use std::collections::HashMap;

use sprig_foundation::{Error, ErrorKind, Result};

use crate::ast::Ast;
use crate::span::Span;

/// Maximum nesting of macro expansions.
pub const MAX_EXPANSION_DEPTH: usize = 256;

// =============================================================================
// Macro definitions
// =============================================================================

/// A template macro.
#[derive(Clone, Debug, PartialEq)]
pub struct MacroDef {
    /// Macro name.
    pub name: String,
    /// Fixed parameters, in order.
    pub params: Vec<String>,
    /// Name of the `&rest` parameter, if any.
    pub rest: Option<String>,
    /// Template forms; several are wrapped in `do`.
    pub body: Vec<Ast>,
    /// Where the macro was declared.
    pub span: Span,
}

impl MacroDef {
    /// Returns true if `count` arguments satisfy the parameter list.
    #[must_use]
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.rest.is_some() {
            count >= self.params.len()
        } else {
            count == self.params.len()
        }
    }

    fn arity_description(&self) -> String {
        if self.rest.is_some() {
            format!("at least {}", self.params.len())
        } else {
            self.params.len().to_string()
        }
    }
}

/// What a parameter stands for during substitution.
enum MacroArg<'a> {
    Single(&'a Ast),
    Rest(&'a [Ast]),
}

/// Result of expanding one input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expansion {
    /// Forms ready for the compiler.
    pub forms: Vec<Ast>,
    /// Macros declared by this input, in declaration order.
    pub macro_names: Vec<String>,
}

// =============================================================================
// Expander
// =============================================================================

/// Macro expander.
///
/// Macros stay registered across calls, so a session can declare a macro
/// in one input and use it in the next.
#[derive(Clone, Debug, Default)]
pub struct Expander {
    macros: HashMap<String, MacroDef>,
    depth: usize,
}

impl Expander {
    /// Creates an expander with no macros.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a registered macro.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    /// Names of all registered macros, sorted.
    #[must_use]
    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Expands a program.
    ///
    /// Top-level `defmacro` forms are registered and removed; everything
    /// else is expanded in order, so a macro is usable from the form after
    /// its declaration.
    ///
    /// # Errors
    /// Malformed `defmacro`, macro arity errors, runaway expansion, and
    /// `unquote` outside a quasiquote.
    pub fn expand_program(&mut self, forms: Vec<Ast>) -> Result<Expansion> {
        let mut expansion = Expansion::default();
        for form in forms {
            if let Some(items) = form.as_list().filter(|items| head_is(items, "defmacro")) {
                let def = parse_defmacro(items, form.span())?;
                expansion.macro_names.push(def.name.clone());
                self.macros.insert(def.name.clone(), def);
            } else {
                expansion.forms.push(self.expand(&form)?);
            }
        }
        Ok(expansion)
    }

    /// Expands one form.
    ///
    /// # Errors
    /// See [`Expander::expand_program`]. A `defmacro` below the top level is
    /// an error.
    pub fn expand(&mut self, ast: &Ast) -> Result<Ast> {
        if self.depth > MAX_EXPANSION_DEPTH {
            return Err(error_at(
                ast.span(),
                Error::invalid_form(format!(
                    "macro expansion depth exceeded {MAX_EXPANSION_DEPTH} (possible infinite expansion)"
                )),
            ));
        }

        match ast {
            Ast::List(items, span) => match items.first().and_then(Ast::as_symbol) {
                Some("quote") => quote(special_arg(items, *span)?),
                Some("quasiquote") => self.quasiquote(special_arg(items, *span)?),
                Some(name @ ("unquote" | "unquote-splicing")) => Err(error_at(
                    *span,
                    Error::invalid_form(format!("{name} used outside of a quasiquote")),
                )),
                Some("defmacro") => Err(error_at(
                    *span,
                    Error::invalid_form("defmacro is only allowed at the top level"),
                )),
                Some(name) if self.macros.contains_key(name) => {
                    let expanded = self.apply_macro(name, &items[1..], *span)?;
                    self.depth += 1;
                    let result = self.expand(&expanded);
                    self.depth -= 1;
                    result
                }
                _ => Ok(Ast::List(self.expand_all(items)?, *span)),
            },
            Ast::Vector(items, span) => Ok(Ast::Vector(self.expand_all(items)?, *span)),
            _ => Ok(ast.clone()),
        }
    }

    fn expand_all(&mut self, items: &[Ast]) -> Result<Vec<Ast>> {
        items.iter().map(|item| self.expand(item)).collect()
    }

    /// Substitutes a macro call's arguments into the template.
    fn apply_macro(&self, name: &str, args: &[Ast], span: Span) -> Result<Ast> {
        let def = self
            .macros
            .get(name)
            .ok_or_else(|| Error::internal(format!("macro {name} vanished")))?;
        if !def.accepts_arity(args.len()) {
            return Err(error_at(
                span,
                Error::arity_mismatch(name, def.arity_description(), args.len()),
            ));
        }

        let mut bindings = HashMap::new();
        for (param, arg) in def.params.iter().zip(args) {
            bindings.insert(param.as_str(), MacroArg::Single(arg));
        }
        if let Some(rest) = &def.rest {
            bindings.insert(rest.as_str(), MacroArg::Rest(&args[def.params.len()..]));
        }

        let mut body: Vec<Ast> = def.body.iter().map(|form| substitute(form, &bindings)).collect();
        if body.len() == 1 {
            Ok(body.remove(0))
        } else {
            let mut items = vec![Ast::Symbol("do".to_string(), span)];
            items.extend(body);
            Ok(Ast::List(items, span))
        }
    }

    /// `(quasiquote x)`: quote, except `unquote` drops back to code.
    fn quasiquote(&mut self, ast: &Ast) -> Result<Ast> {
        match ast {
            Ast::List(items, span) | Ast::Vector(items, span) => {
                if let Some(name) = items.first().and_then(Ast::as_symbol) {
                    if ast.as_list().is_some() {
                        match name {
                            "unquote" => return self.expand(special_arg(items, *span)?),
                            "unquote-splicing" => {
                                return Err(error_at(
                                    *span,
                                    Error::invalid_form("unquote-splicing must appear inside a list or vector"),
                                ));
                            }
                            _ => {}
                        }
                    }
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_list() {
                        Some(inner) if head_is(inner, "unquote-splicing") => {
                            let spliced = self.expand(special_arg(inner, item.span())?)?;
                            out.push(Ast::List(
                                vec![Ast::Symbol("dissolve".to_string(), item.span()), spliced],
                                item.span(),
                            ));
                        }
                        _ => out.push(self.quasiquote(item)?),
                    }
                }
                Ok(Ast::Vector(out, *span))
            }
            _ => quote(ast),
        }
    }
}

/// Expands a program with a fresh expander.
///
/// # Errors
/// See [`Expander::expand_program`].
pub fn expand(forms: Vec<Ast>) -> Result<Expansion> {
    Expander::new().expand_program(forms)
}

// =============================================================================
// Helpers
// =============================================================================

fn error_at(span: Span, error: Error) -> Error {
    error.at_position(span.line, span.column)
}

fn head_is(items: &[Ast], name: &str) -> bool {
    items.first().and_then(Ast::as_symbol) == Some(name)
}

/// The single argument of `(quote x)` and friends.
fn special_arg(items: &[Ast], span: Span) -> Result<&Ast> {
    match items {
        [_, arg] => Ok(arg),
        _ => {
            let name = items.first().and_then(Ast::as_symbol).unwrap_or("quote");
            Err(error_at(
                span,
                Error::arity_mismatch(name, "1", items.len().saturating_sub(1)),
            ))
        }
    }
}

/// `(quote x)` as a literal.
fn quote(ast: &Ast) -> Result<Ast> {
    match ast {
        Ast::Symbol(name, span) => Ok(Ast::String(name.clone(), *span)),
        Ast::List(items, span) | Ast::Vector(items, span) => {
            Ok(Ast::Vector(items.iter().map(quote).collect::<Result<_>>()?, *span))
        }
        Ast::Error(message, span) => Err(error_at(
            *span,
            Error::new(ErrorKind::UnsupportedNode(format!("error node: {message}"))),
        )),
        Ast::Bool(..) | Ast::Int(..) | Ast::String(..) => Ok(ast.clone()),
    }
}

/// Parses `(defmacro name [params] template..)`.
fn parse_defmacro(items: &[Ast], span: Span) -> Result<MacroDef> {
    let [_, name, params, body @ ..] = items else {
        return Err(error_at(
            span,
            Error::arity_mismatch("defmacro", "at least 3", items.len().saturating_sub(1)),
        ));
    };
    if body.is_empty() {
        return Err(error_at(span, Error::invalid_form("defmacro needs a template")));
    }
    let Some(name) = name.as_symbol() else {
        return Err(error_at(
            name.span(),
            Error::invalid_form(format!("macro name must be a symbol, got {}", name.type_name())),
        ));
    };
    let Some(params) = params.as_vector() else {
        return Err(error_at(
            params.span(),
            Error::invalid_form("macro parameters must be a vector"),
        ));
    };

    let mut fixed = Vec::with_capacity(params.len());
    let mut rest = None;
    for (i, param) in params.iter().enumerate() {
        let Some(param_name) = param.as_symbol() else {
            return Err(error_at(
                param.span(),
                Error::invalid_form(format!("macro parameter must be a symbol, got {}", param.type_name())),
            ));
        };
        match param_name.strip_prefix('&') {
            Some(stripped) if !stripped.is_empty() && i + 1 == params.len() => {
                rest = Some(stripped.to_string());
            }
            Some(_) => {
                return Err(error_at(
                    param.span(),
                    Error::invalid_form("rest parameter must be named and last"),
                ));
            }
            None => fixed.push(param_name.to_string()),
        }
    }

    Ok(MacroDef {
        name: name.to_string(),
        params: fixed,
        rest,
        body: body.to_vec(),
        span,
    })
}

/// Replaces parameter symbols in a template.
///
/// A rest parameter splices its arguments into the enclosing list or
/// vector; on its own it becomes a vector of them.
fn substitute(ast: &Ast, bindings: &HashMap<&str, MacroArg<'_>>) -> Ast {
    match ast {
        Ast::Symbol(name, span) => match bindings.get(name.as_str()) {
            Some(MacroArg::Single(arg)) => (*arg).clone(),
            Some(MacroArg::Rest(args)) => Ast::Vector(args.to_vec(), *span),
            None => ast.clone(),
        },
        Ast::List(items, span) => Ast::List(substitute_items(items, bindings), *span),
        Ast::Vector(items, span) => Ast::Vector(substitute_items(items, bindings), *span),
        _ => ast.clone(),
    }
}

fn substitute_items(items: &[Ast], bindings: &HashMap<&str, MacroArg<'_>>) -> Vec<Ast> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_symbol().and_then(|name| bindings.get(name)) {
            Some(MacroArg::Rest(args)) => out.extend(args.iter().cloned()),
            _ => out.push(substitute(item, bindings)),
        }
    }
    out
}
