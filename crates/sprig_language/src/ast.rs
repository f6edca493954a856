//! Abstract syntax tree.
//!
//! The reader produces these nodes; the expander rewrites them; the
//! compiler only reads them.

use std::fmt;

use crate::span::Span;

/// An AST node.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// `true` or `false`
    Bool(bool, Span),
    /// Integer literal like `42`
    Int(i64, Span),
    /// String literal like `"hello"`
    String(String, Span),
    /// Symbol like `fac` or `::`
    Symbol(String, Span),
    /// List form like `(+ 1 2)`
    List(Vec<Ast>, Span),
    /// Vector form like `[1 2 3]`
    Vector(Vec<Ast>, Span),
    /// Placeholder the recovering parser leaves where a form was malformed.
    Error(String, Span),
}

impl Ast {
    /// Returns the source span of this node.
    #[must_use]
    pub const fn span(&self) -> Span {
        match self {
            Self::Bool(_, s)
            | Self::Int(_, s)
            | Self::String(_, s)
            | Self::Symbol(_, s)
            | Self::List(_, s)
            | Self::Vector(_, s)
            | Self::Error(_, s) => *s,
        }
    }

    /// Returns the elements of a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Ast]> {
        match self {
            Self::List(elements, _) => Some(elements),
            _ => None,
        }
    }

    /// Returns the elements of a vector.
    #[must_use]
    pub fn as_vector(&self) -> Option<&[Ast]> {
        match self {
            Self::Vector(elements, _) => Some(elements),
            _ => None,
        }
    }

    /// Returns the symbol name.
    #[must_use]
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Self::Symbol(name, _) => Some(name),
            _ => None,
        }
    }

    /// Returns the string literal.
    #[must_use]
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s, _) => Some(s),
            _ => None,
        }
    }

    /// If this is a list headed by a symbol, returns the symbol and the
    /// remaining elements.
    #[must_use]
    pub fn as_call(&self) -> Option<(&str, &[Ast])> {
        let (head, args) = self.as_list()?.split_first()?;
        Some((head.as_symbol()?, args))
    }

    /// Returns true if this node or any descendant is an `Error` node.
    #[must_use]
    pub fn contains_error(&self) -> bool {
        match self {
            Self::Error(..) => true,
            Self::List(items, _) | Self::Vector(items, _) => items.iter().any(Ast::contains_error),
            _ => false,
        }
    }

    /// A human-readable kind name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(..) => "bool",
            Self::Int(..) => "int",
            Self::String(..) => "string",
            Self::Symbol(..) => "symbol",
            Self::List(..) => "list",
            Self::Vector(..) => "vector",
            Self::Error(..) => "error",
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Ast], close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b, _) => write!(f, "{b}"),
            Self::Int(n, _) => write!(f, "{n}"),
            Self::String(s, _) => write!(f, "{s:?}"),
            Self::Symbol(name, _) => f.write_str(name),
            Self::List(items, _) => write_seq(f, "(", items, ")"),
            Self::Vector(items, _) => write_seq(f, "[", items, "]"),
            Self::Error(message, _) => write!(f, "#<error: {message}>"),
        }
    }
}

/// Helper constructors for AST nodes (for testing).
#[cfg(test)]
impl Ast {
    pub fn int(n: i64) -> Self {
        Self::Int(n, Span::default())
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Self::Symbol(s.into(), Span::default())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into(), Span::default())
    }

    pub fn list(elements: Vec<Ast>) -> Self {
        Self::List(elements, Span::default())
    }

    pub fn vector(elements: Vec<Ast>) -> Self {
        Self::Vector(elements, Span::default())
    }
}
