//! Core values, errors, and persistent collections for Sprig.
//!
//! This crate provides:
//! - [`Value`] - The runtime value type manipulated by the VM
//! - [`Cell`] - One entry of the VM frame stack
//! - [`Type`] - Type tags used in runtime type errors
//! - [`Error`] - Rich error types with context
//! - [`ValueList`] - Persistent list backing list and vector values

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod collections;
pub mod error;
pub mod types;
pub mod value;

pub use collections::ValueList;
pub use error::{Error, ErrorContext, ErrorKind, Result};
pub use types::Type;
pub use value::{Callable, Cell, Port, Value};
