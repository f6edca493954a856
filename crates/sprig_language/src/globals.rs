//! The global definition registry.
//!
//! One registry is shared by the compiler (which assigns ids as it meets
//! `def` forms) and the VM (which sizes and seeds its global table from
//! it), so the two can never disagree about which id names which global.

use std::collections::HashMap;

use sprig_foundation::{Error, Port, Result, Value};

/// Globals every registry starts with, in id order.
pub const DEFAULT_GLOBALS: [(&str, Port); 2] = [("stdout", Port::Stdout), ("stderr", Port::Stderr)];

/// Bijective mapping between global names and dense ids.
#[derive(Clone, Debug)]
pub struct GlobalRegistry {
    names: Vec<String>,
    ids: HashMap<String, u32>,
    defaults: Vec<(u32, Value)>,
}

impl Default for GlobalRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl GlobalRegistry {
    /// Creates a registry with no globals at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            ids: HashMap::new(),
            defaults: Vec::new(),
        }
    }

    /// Creates a registry holding the standard I/O ports.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (name, port) in DEFAULT_GLOBALS {
            let id = registry.define(name);
            registry.defaults.push((id, Value::Port(port)));
        }
        registry
    }

    /// Rebuilds a registry from names in id order, as stored in a library
    /// or image.
    ///
    /// # Errors
    /// Fails if the names do not start with the default globals or repeat
    /// a name, since ids would then shift.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let mut registry = Self::with_defaults();
        for (position, name) in names.iter().enumerate() {
            let id = registry.define(name);
            if id as usize != position {
                return Err(Error::internal(format!(
                    "global table out of order: {name} expected at {position}, registered at {id}"
                )));
            }
        }
        Ok(registry)
    }

    /// Returns the id of `name`, assigning the next id if it is new.
    pub fn define(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Returns the id of `name`, if defined.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Returns the name for `id`.
    #[must_use]
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// All names in id order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of globals.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if no globals are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Globals with a value before any code runs.
    pub fn defaults(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.defaults.iter().map(|(id, value)| (*id, value))
    }
}
