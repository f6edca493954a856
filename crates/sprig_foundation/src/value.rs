//! Core value type manipulated by the VM.

use std::fmt;
use std::sync::Arc;

use crate::collections::ValueList;
use crate::types::Type;

/// Runtime value.
///
/// Values are immutable and cheaply cloneable. Lists use structural sharing.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// Boolean value.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// String value.
    String(Arc<str>),
    /// Persistent list, produced by list and vector literals.
    List(ValueList),
    /// Callable function reference.
    Ref(Callable),
    /// Output port.
    Port(Port),
}

/// A callable reference: a code address plus the frame cells captured when
/// the reference was created.
#[derive(Clone, PartialEq)]
pub struct Callable {
    /// Absolute code address of the function prologue.
    pub addr: u32,
    /// Captured frame cells, bottom first. Re-pushed below the callee's
    /// bookkeeping cells on every call.
    pub env: Arc<[Cell]>,
}

impl Callable {
    /// Creates a callable with no captured cells.
    #[must_use]
    pub fn new(addr: u32) -> Self {
        Self {
            addr,
            env: Arc::from(Vec::new()),
        }
    }

    /// Creates a callable capturing `env`.
    #[must_use]
    pub fn with_env(addr: u32, env: Vec<Cell>) -> Self {
        Self {
            addr,
            env: Arc::from(env),
        }
    }
}

/// One entry of the VM frame stack.
///
/// Argument and `let` slots hold values; every active call adds two
/// bookkeeping cells on top of its captured environment.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// An argument or local slot.
    Slot(Value),
    /// Caller's frame pointer and the frame stack length before the call.
    ReturnFp {
        /// Caller's frame pointer.
        fp: usize,
        /// Frame stack length before the callee's captures were pushed.
        base: usize,
    },
    /// Caller's return instruction pointer.
    ReturnIp(usize),
}

/// Standard output streams reachable from programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

impl Value {
    /// Returns the type of this value.
    #[must_use]
    pub fn value_type(&self) -> Type {
        match self {
            Self::Bool(_) => Type::Bool,
            Self::Int(_) => Type::Int,
            Self::String(_) => Type::String,
            Self::List(_) => Type::List,
            Self::Ref(_) => Type::Fn,
            Self::Port(_) => Type::Port,
        }
    }

    /// Only `false` is falsy.
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Bool(false))
    }

    /// Returns the boolean if this is a `Bool`.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer if this is an `Int`.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string slice if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the list if this is a `List`.
    #[must_use]
    pub const fn as_list(&self) -> Option<&ValueList> {
        match self {
            Self::List(xs) => Some(xs),
            _ => None,
        }
    }

    /// Returns the callable if this is a `Ref`.
    #[must_use]
    pub const fn as_callable(&self) -> Option<&Callable> {
        match self {
            Self::Ref(c) => Some(c),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{x:?}")?;
                }
                write!(f, "]")
            }
            Self::Ref(c) => write!(f, "{c:?}"),
            Self::Port(p) => write!(f, "<{p}>"),
        }
    }
}

/// Strings display without quotes; everything else displays as it reads.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::List(xs) => {
                write!(f, "[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{x:?}")?;
                }
                write!(f, "]")
            }
            other => write!(f, "{other:?}"),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.env.is_empty() {
            write!(f, "<fn@0x{:04x}>", self.addr)
        } else {
            write!(f, "<fn@0x{:04x} +{}>", self.addr, self.env.len())
        }
    }
}

// =============================================================================
// Convenience From implementations
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(Arc::from(s))
    }
}

impl From<ValueList> for Value {
    fn from(xs: ValueList) -> Self {
        Self::List(xs)
    }
}

impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self {
        Self::List(ValueList::from(xs))
    }
}
