//! Lexical symbol table.
//!
//! Each function body opens a scope; `let` adds names to the current scope
//! and releases them afterwards. Indices are top-relative, matching how the
//! VM's `GetArg` addresses the frame stack:
//!
//! ```text
//!   frame stack (top at right)
//!   .. outer slots | captured cells | ReturnFp ReturnIp | slot0 slot1 slot2
//!                                                          idx 2 idx 1 idx 0
//! ```
//!
//! Crossing into an enclosing scope adds that scope's two bookkeeping cells
//! plus its current size. Whenever a lookup crosses a function boundary the
//! function records how many of its enclosing frame's cells it must capture
//! so that the same indices are valid wherever the closure is later called.

/// One lexical scope: the slots of one function frame.
#[derive(Clone, Debug, Default)]
struct Scope {
    /// Bound names by slot; later entries shadow earlier ones.
    names: Vec<String>,
    /// Cells of the enclosing frame this function must capture.
    reach: usize,
}

/// Result of resolving a name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// Top-relative frame index.
    pub index: usize,
    /// Number of function boundaries crossed.
    pub depth: usize,
}

/// Chain of lexical scopes, innermost last.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// Creates a table holding only the top-level scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// Opens the scope of a function body.
    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    /// Closes the innermost function scope, returning how many enclosing
    /// frame cells its closure must capture.
    pub fn pop_scope(&mut self) -> usize {
        if self.scopes.len() > 1 {
            self.scopes.pop().map_or(0, |scope| scope.reach)
        } else {
            0
        }
    }

    /// Number of open function scopes (0 at top level).
    #[must_use]
    pub fn fn_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Binds `name` to the next slot of the current scope.
    ///
    /// Returns the new slot number.
    pub fn declare(&mut self, name: &str) -> usize {
        let scope = self.current_mut();
        scope.names.push(name.to_string());
        scope.names.len() - 1
    }

    /// Unbinds the `n` most recent names of the current scope.
    pub fn release(&mut self, n: usize) {
        let scope = self.current_mut();
        let keep = scope.names.len().saturating_sub(n);
        scope.names.truncate(keep);
    }

    /// Number of slots in the current scope.
    #[must_use]
    pub fn size(&self) -> usize {
        self.scopes.last().map_or(0, |scope| scope.names.len())
    }

    /// Drops every scope and binding, back to an empty top level.
    pub fn reset(&mut self) {
        self.scopes.clear();
        self.scopes.push(Scope::default());
    }

    /// Resolves `name` to its top-relative frame index.
    ///
    /// Records capture requirements on every function scope the lookup
    /// crosses.
    pub fn index_of(&mut self, name: &str) -> Option<Resolved> {
        let innermost = self.scopes.len() - 1;
        let (found, slot) = self
            .scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, scope)| scope.names.iter().rposition(|n| n == name).map(|slot| (i, slot)))?;

        let mut index = self.scopes[found].names.len() - 1 - slot;
        for scope in &mut self.scopes[found + 1..] {
            scope.reach = scope.reach.max(index + 1);
            index += scope.names.len() + 2;
        }
        Some(Resolved {
            index,
            depth: innermost - found,
        })
    }

    fn current_mut(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
