use std::collections::BTreeMap;

use crate::value::EngineValue;

/// Sparse map from zero-based parameter position to an already-encoded value.
///
/// Positions are unique; re-binding a position overwrites. Iteration is
/// always in ascending position order. Whether the statement's declared
/// parameters are all present is the engine's to enforce at execution time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    values: BTreeMap<usize, EngineValue>,
}

impl Binding {
    pub(crate) fn set(&mut self, position: usize, value: EngineValue) {
        self.values.insert(position, value);
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&EngineValue> {
        self.values.get(&position)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Entries in ascending position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EngineValue)> {
        self.values.iter().map(|(position, value)| (*position, value))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut EngineValue)> {
        self.values.iter_mut().map(|(position, value)| (*position, value))
    }
}

impl IntoIterator for Binding {
    type Item = (usize, EngineValue);
    type IntoIter = std::collections::btree_map::IntoIter<usize, EngineValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// The bindings accumulated on one statement: completed ones plus the
/// in-progress current binding.
#[derive(Debug, Default)]
pub(crate) struct BindingSet {
    complete: Vec<Binding>,
    current: Binding,
}

impl BindingSet {
    pub(crate) fn current_mut(&mut self) -> &mut Binding {
        &mut self.current
    }

    /// Closes the current binding if it holds any values. Calling this with
    /// nothing bound is a no-op, so a trailing `add()` never produces an
    /// empty execution.
    pub(crate) fn finish_current(&mut self) {
        if !self.current.is_empty() {
            self.complete.push(std::mem::take(&mut self.current));
        }
    }

    /// All bindings in accumulation order. A statement with no bindings at
    /// all yields one empty binding, so zero-parameter statements share the
    /// execution shape of parameterized ones.
    pub(crate) fn into_bindings(mut self) -> Vec<Binding> {
        self.finish_current();
        if self.complete.is_empty() {
            vec![Binding::default()]
        } else {
            self.complete
        }
    }
}
