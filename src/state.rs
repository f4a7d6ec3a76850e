//! Per-invocation scratch space for stateful steps.

use crate::error::ProcessError;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;

/// Type-erased entry stored in a [`ProcessorState`].
pub type StateValue = Box<dyn Any + Send + Sync>;

/// Mutable key/value scratch map shared by the stateful steps of ONE processor run.
///
/// A compiled [`Processor`](crate::Processor) creates an empty state at the start
/// of every call and drops it at the end; nothing survives across records. It is
/// the only channel through which steps of the same pipeline coordinate, e.g. a
/// frame sampler recording the chosen time window for an audio sampler later in
/// the chain:
///
/// ```
/// use ironprep::ProcessorState;
///
/// let mut state = ProcessorState::new();
/// state.insert("start_time", 1.5f32);
/// assert_eq!(state.get::<f32>("start_time"), Some(&1.5));
/// assert_eq!(state.get::<i64>("start_time"), None);
/// ```
#[derive(Default)]
pub struct ProcessorState {
    entries: HashMap<String, StateValue>,
}

impl ProcessorState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Typed read; `None` if absent or of another type.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Typed read that reports why the entry could not be returned.
    pub fn require<T: Any>(&self, key: &str) -> Result<&T, ProcessError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ProcessError::MissingState(key.to_string()))?;
        entry.downcast_ref::<T>().ok_or_else(|| ProcessError::StateTypeMismatch {
            key: key.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Remove and return an entry. A type mismatch leaves the entry in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.entries.get(key)?.is::<T>() {
            return None;
        }
        let boxed = self.entries.remove(key)?;
        boxed.downcast::<T>().ok().map(|b| *b)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("ProcessorState").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_reports_missing_and_mismatch() {
        let mut state = ProcessorState::new();
        state.insert("k", 5i64);

        assert_eq!(*state.require::<i64>("k").unwrap(), 5);
        assert_eq!(
            state.require::<i64>("nope").unwrap_err(),
            ProcessError::MissingState("nope".into())
        );
        assert!(matches!(
            state.require::<String>("k").unwrap_err(),
            ProcessError::StateTypeMismatch { .. }
        ));
    }

    #[test]
    fn test_remove_keeps_entry_on_type_mismatch() {
        let mut state = ProcessorState::new();
        state.insert("k", 5i64);
        assert_eq!(state.remove::<f32>("k"), None);
        assert!(state.contains_key("k"));
        assert_eq!(state.remove::<i64>("k"), Some(5));
        assert!(state.is_empty());
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut state = ProcessorState::new();
        state.insert("frames", vec![1usize, 2]);
        state.get_mut::<Vec<usize>>("frames").unwrap().push(3);
        assert_eq!(state.get::<Vec<usize>>("frames"), Some(&vec![1, 2, 3]));
    }
}
