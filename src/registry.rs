//! Ordered, name-unique storage of step descriptors behind a `PipelineBuilder`.
//!
//! Every mutation validates first and mutates second, so a rejected call never
//! leaves a partial change behind.

use crate::error::BuilderError;
use crate::step::{StepDescriptor, StepFn};
use std::sync::Arc;

pub(crate) struct FunctionRegistry<V> {
    steps: Vec<StepDescriptor<V>>,
}

impl<V> Default for FunctionRegistry<V> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<V> FunctionRegistry<V> {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|d| d.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Insert before `before` when given, else append. Returns the new step's index.
    pub fn insert(&mut self, descriptor: StepDescriptor<V>, before: Option<&str>) -> Result<usize, BuilderError> {
        if self.contains(descriptor.name()) {
            return Err(BuilderError::DuplicateStepName(descriptor.name().to_string()));
        }
        let idx = match before {
            Some(anchor) => self
                .position(anchor)
                .ok_or_else(|| BuilderError::UnknownStep(anchor.to_string()))?,
            None => self.steps.len(),
        };
        self.steps.insert(idx, descriptor);
        Ok(idx)
    }

    pub fn remove(&mut self, name: &str) -> Option<StepDescriptor<V>> {
        let idx = self.position(name)?;
        Some(self.steps.remove(idx))
    }

    /// Swap the function of `name` in place, keeping position, field and shape.
    pub fn replace(&mut self, name: &str, function: StepFn<V>) -> Result<usize, BuilderError> {
        let idx = self
            .position(name)
            .ok_or_else(|| BuilderError::UnknownStep(name.to_string()))?;
        let current = &self.steps[idx];
        if current.kind() != function.kind() {
            return Err(BuilderError::IncompatibleStep {
                name: name.to_string(),
                expected: current.kind(),
                found: function.kind(),
            });
        }
        self.steps[idx] = current.with_function(function);
        Ok(idx)
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepDescriptor<V>> {
        self.steps.iter()
    }

    /// Immutable copy of the current order, shared by compiled processors.
    pub fn snapshot(&self) -> Arc<[StepDescriptor<V>]> {
        self.steps.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(name: &str) -> StepDescriptor<i64> {
        StepDescriptor::new(name.into(), None, StepFn::mapping(|m| Ok(m)))
    }

    fn names(r: &FunctionRegistry<i64>) -> Vec<&str> {
        r.iter().map(|d| d.name()).collect()
    }

    #[test]
    fn test_insert_before_splices() {
        let mut r = FunctionRegistry::default();
        for n in ["a", "b", "c"] {
            r.insert(step(n), None).unwrap();
        }
        assert_eq!(r.insert(step("d"), Some("b")).unwrap(), 1);
        assert_eq!(names(&r), vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_failed_insert_leaves_registry_unchanged() {
        let mut r = FunctionRegistry::default();
        r.insert(step("a"), None).unwrap();
        assert_eq!(r.insert(step("a"), None), Err(BuilderError::DuplicateStepName("a".into())));
        assert_eq!(r.insert(step("b"), Some("zzz")), Err(BuilderError::UnknownStep("zzz".into())));
        assert_eq!(names(&r), vec!["a"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut r = FunctionRegistry::default();
        r.insert(step("a"), None).unwrap();
        let snap = r.snapshot();
        r.clear();
        assert_eq!(snap.len(), 1);
        assert_eq!(r.len(), 0);
    }
}
