//! Persistent list with structural sharing.
//!
//! A thin wrapper around `im::Vector`. List and vector literals both
//! evaluate to a [`ValueList`]; `Cons`, `Rest` and `Dissolve` lean on O(1)
//! clones and cheap front insertion/removal.

use std::fmt;
use std::iter::FromIterator;

use crate::value::Value;

/// Persistent sequence of values.
///
/// Cloning is O(1). Modifications return a new list sharing structure
/// with the original.
#[derive(Clone, Default, PartialEq)]
pub struct ValueList(im::Vector<Value>);

impl ValueList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self(im::Vector::new())
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets an element by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Returns the first element.
    #[must_use]
    pub fn first(&self) -> Option<&Value> {
        self.0.front()
    }

    /// Returns every element but the first. The rest of an empty list is
    /// the empty list.
    #[must_use]
    pub fn rest(&self) -> Self {
        if self.0.is_empty() {
            return Self::new();
        }
        Self(self.0.clone().split_off(1))
    }

    /// Returns a new list with `value` prepended.
    #[must_use]
    pub fn cons(&self, value: Value) -> Self {
        let mut new = self.0.clone();
        new.push_front(value);
        Self(new)
    }

    /// Returns a new list with `value` appended.
    #[must_use]
    pub fn push_back(&self, value: Value) -> Self {
        let mut new = self.0.clone();
        new.push_back(value);
        Self(new)
    }

    /// Returns an iterator over the elements.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Value> {
        self.0.iter()
    }
}

impl fmt::Debug for ValueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Value> for ValueList {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Value>> for ValueList {
    fn from(values: Vec<Value>) -> Self {
        values.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a ValueList {
    type Item = &'a Value;
    type IntoIter = im::vector::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
