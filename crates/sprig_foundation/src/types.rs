//! Type tags for runtime values.
//!
//! The bytecode carries no type information, so the VM checks operand types
//! as each instruction executes and reports failures with these tags.

use std::fmt;

/// The runtime type of a [`Value`](crate::Value).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// String type.
    String,
    /// List (the runtime form of both list and vector literals).
    List,
    /// Callable function reference.
    Fn,
    /// Output port.
    Port,
}

impl Type {
    /// Returns true for types that `Lt`/`Le` can order.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        matches!(self, Self::Int | Self::String)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::String => "string",
            Self::List => "list",
            Self::Fn => "fn",
            Self::Port => "port",
        };
        f.write_str(name)
    }
}
