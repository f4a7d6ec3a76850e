//! Steps: the named, orderable units registered on a [`PipelineBuilder`](crate::PipelineBuilder).
//!
//! A step function has one of four call shapes, picked by whether it works on a
//! single feature or on the whole mapping, and whether it takes the per-run
//! [`ProcessorState`]:
//!
//! | shape | signature |
//! |---|---|
//! | [`StepKind::Feature`] | `Fn(V) -> Result<V>` |
//! | [`StepKind::StatefulFeature`] | `Fn(V, &mut ProcessorState) -> Result<V>` |
//! | [`StepKind::Mapping`] | `Fn(FeatureMap<V>) -> Result<FeatureMap<V>>` |
//! | [`StepKind::StatefulMapping`] | `Fn(FeatureMap<V>, &mut ProcessorState) -> Result<FeatureMap<V>>` |
//!
//! The shape is carried as a tag on [`StepFn`] and dispatched with a `match`.

use crate::error::ProcessError;
use crate::features::FeatureMap;
use crate::state::ProcessorState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub type FeatureFn<V> = Arc<dyn Fn(V) -> Result<V> + Send + Sync>;
pub type StatefulFeatureFn<V> = Arc<dyn Fn(V, &mut ProcessorState) -> Result<V> + Send + Sync>;
pub type MappingFn<V> = Arc<dyn Fn(FeatureMap<V>) -> Result<FeatureMap<V>> + Send + Sync>;
pub type StatefulMappingFn<V> =
    Arc<dyn Fn(FeatureMap<V>, &mut ProcessorState) -> Result<FeatureMap<V>> + Send + Sync>;

/// Call shape of a step function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Feature,
    StatefulFeature,
    Mapping,
    StatefulMapping,
}

impl StepKind {
    #[must_use]
    pub const fn is_stateful(self) -> bool {
        matches!(self, StepKind::StatefulFeature | StepKind::StatefulMapping)
    }

    #[must_use]
    pub const fn is_feature_scoped(self) -> bool {
        matches!(self, StepKind::Feature | StepKind::StatefulFeature)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepKind::Feature => "feature",
            StepKind::StatefulFeature => "stateful feature",
            StepKind::Mapping => "mapping",
            StepKind::StatefulMapping => "stateful mapping",
        };
        f.write_str(name)
    }
}

/// A step function tagged with its call shape.
pub enum StepFn<V> {
    Feature(FeatureFn<V>),
    StatefulFeature(StatefulFeatureFn<V>),
    Mapping(MappingFn<V>),
    StatefulMapping(StatefulMappingFn<V>),
}

impl<V> StepFn<V> {
    pub fn feature<F>(f: F) -> Self
    where
        F: Fn(V) -> Result<V> + Send + Sync + 'static,
    {
        StepFn::Feature(Arc::new(f))
    }

    pub fn feature_with_state<F>(f: F) -> Self
    where
        F: Fn(V, &mut ProcessorState) -> Result<V> + Send + Sync + 'static,
    {
        StepFn::StatefulFeature(Arc::new(f))
    }

    pub fn mapping<F>(f: F) -> Self
    where
        F: Fn(FeatureMap<V>) -> Result<FeatureMap<V>> + Send + Sync + 'static,
    {
        StepFn::Mapping(Arc::new(f))
    }

    pub fn mapping_with_state<F>(f: F) -> Self
    where
        F: Fn(FeatureMap<V>, &mut ProcessorState) -> Result<FeatureMap<V>> + Send + Sync + 'static,
    {
        StepFn::StatefulMapping(Arc::new(f))
    }

    #[must_use]
    pub fn kind(&self) -> StepKind {
        match self {
            StepFn::Feature(_) => StepKind::Feature,
            StepFn::StatefulFeature(_) => StepKind::StatefulFeature,
            StepFn::Mapping(_) => StepKind::Mapping,
            StepFn::StatefulMapping(_) => StepKind::StatefulMapping,
        }
    }
}

impl<V> Clone for StepFn<V> {
    fn clone(&self) -> Self {
        match self {
            StepFn::Feature(f) => StepFn::Feature(Arc::clone(f)),
            StepFn::StatefulFeature(f) => StepFn::StatefulFeature(Arc::clone(f)),
            StepFn::Mapping(f) => StepFn::Mapping(Arc::clone(f)),
            StepFn::StatefulMapping(f) => StepFn::StatefulMapping(Arc::clone(f)),
        }
    }
}

impl<V> fmt::Debug for StepFn<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StepFn::<{}>", self.kind())
    }
}

/// A step waiting to be added: function, target feature, optional name and position.
///
/// ```
/// use ironprep::{PipelineBuilder, StepSpec};
///
/// let mut builder = PipelineBuilder::<i64>::new();
/// builder
///     .add_step(StepSpec::feature("n", |n| Ok(n + 1)).named("add_one"))?
///     .add_step(StepSpec::feature("n", |n| Ok(n * 2)).named("double").insert_before("add_one"))?;
/// assert_eq!(builder.step_names(), vec!["double", "add_one"]);
/// # Ok::<(), ironprep::BuilderError>(())
/// ```
pub struct StepSpec<V> {
    pub(crate) function: StepFn<V>,
    pub(crate) field: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) insert_before: Option<String>,
}

impl<V> StepSpec<V> {
    /// Step applied to the value of `field`; its result replaces that value.
    pub fn feature<F>(field: impl Into<String>, f: F) -> Self
    where
        F: Fn(V) -> Result<V> + Send + Sync + 'static,
    {
        Self::scoped(field, StepFn::feature(f))
    }

    pub fn feature_with_state<F>(field: impl Into<String>, f: F) -> Self
    where
        F: Fn(V, &mut ProcessorState) -> Result<V> + Send + Sync + 'static,
    {
        Self::scoped(field, StepFn::feature_with_state(f))
    }

    /// Step receiving and returning the whole feature map.
    pub fn mapping<F>(f: F) -> Self
    where
        F: Fn(FeatureMap<V>) -> Result<FeatureMap<V>> + Send + Sync + 'static,
    {
        Self::unscoped(StepFn::mapping(f))
    }

    pub fn mapping_with_state<F>(f: F) -> Self
    where
        F: Fn(FeatureMap<V>, &mut ProcessorState) -> Result<FeatureMap<V>> + Send + Sync + 'static,
    {
        Self::unscoped(StepFn::mapping_with_state(f))
    }

    /// Name the step; without a name a unique `fn_<n>` is generated.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Splice the step immediately before an existing step instead of appending it.
    #[must_use]
    pub fn insert_before(mut self, step_name: impl Into<String>) -> Self {
        self.insert_before = Some(step_name.into());
        self
    }

    fn scoped(field: impl Into<String>, function: StepFn<V>) -> Self {
        Self { function, field: Some(field.into()), name: None, insert_before: None }
    }

    fn unscoped(function: StepFn<V>) -> Self {
        Self { function, field: None, name: None, insert_before: None }
    }
}

/// A registered step. Feature-scoped kinds always carry a field, mapping kinds never do.
pub struct StepDescriptor<V> {
    name: String,
    field: Option<String>,
    function: StepFn<V>,
}

impl<V> StepDescriptor<V> {
    pub(crate) fn new(name: String, field: Option<String>, function: StepFn<V>) -> Self {
        Self { name, field, function }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Target feature of a feature-scoped step.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    #[must_use]
    pub fn function(&self) -> &StepFn<V> {
        &self.function
    }

    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.function.kind()
    }

    #[must_use]
    pub fn is_stateful(&self) -> bool {
        self.kind().is_stateful()
    }

    /// Same descriptor with a different function of the same shape.
    pub(crate) fn with_function(&self, function: StepFn<V>) -> Self {
        Self { name: self.name.clone(), field: self.field.clone(), function }
    }

    #[must_use]
    pub fn summary(&self) -> StepSummary {
        StepSummary {
            name: self.name.clone(),
            field: self.field.clone(),
            kind: self.kind(),
        }
    }

    /// Run this step over `features`.
    pub(crate) fn apply(&self, mut features: FeatureMap<V>, state: &mut ProcessorState) -> Result<FeatureMap<V>> {
        match (&self.function, self.field.as_deref()) {
            (StepFn::Mapping(f), _) => f(features),
            (StepFn::StatefulMapping(f), _) => f(features, state),
            (StepFn::Feature(f), Some(field)) => {
                let value = self.take_field(&mut features, field)?;
                features.insert(field.to_string(), f(value)?);
                Ok(features)
            }
            (StepFn::StatefulFeature(f), Some(field)) => {
                let value = self.take_field(&mut features, field)?;
                features.insert(field.to_string(), f(value, state)?);
                Ok(features)
            }
            (StepFn::Feature(_) | StepFn::StatefulFeature(_), None) => {
                unreachable!("feature-scoped step `{}` registered without a field", self.name)
            }
        }
    }

    fn take_field(&self, features: &mut FeatureMap<V>, field: &str) -> Result<V> {
        features.remove(field).ok_or_else(|| {
            ProcessError::MissingFeature { step: self.name.clone(), field: field.to_string() }.into()
        })
    }
}

impl<V> Clone for StepDescriptor<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            field: self.field.clone(),
            function: self.function.clone(),
        }
    }
}

impl<V> fmt::Debug for StepDescriptor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepDescriptor")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("kind", &self.kind())
            .finish()
    }
}

/// Serializable view of one registered step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSummary {
    pub name: String,
    pub field: Option<String>,
    pub kind: StepKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_spec_scoping_matches_kind() {
        let s = StepSpec::<i64>::feature("n", |n| Ok(n));
        assert_eq!(s.field.as_deref(), Some("n"));
        assert_eq!(s.function.kind(), StepKind::Feature);

        let m = StepSpec::<i64>::mapping_with_state(|m, _| Ok(m));
        assert!(m.field.is_none());
        assert!(m.function.kind().is_stateful());
        assert!(!m.function.kind().is_feature_scoped());
    }

    #[test]
    fn test_feature_step_reports_missing_field() {
        let d = StepDescriptor::new("inc".into(), Some("n".into()), StepFn::<i64>::feature(|n| Ok(n + 1)));
        let mut state = ProcessorState::new();
        let err = d.apply(FeatureMap::new(), &mut state).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProcessError>(),
            Some(&ProcessError::MissingFeature { step: "inc".into(), field: "n".into() })
        );
    }

    #[test]
    fn test_with_function_keeps_identity() {
        let d = StepDescriptor::new("s".into(), Some("n".into()), StepFn::<i64>::feature_with_state(|n, _| Ok(n)));
        let r = d.with_function(StepFn::feature_with_state(|n, _| Ok(n * 3)));
        assert_eq!(r.name(), "s");
        assert_eq!(r.field(), Some("n"));
        assert!(r.is_stateful());
        assert_eq!(r.summary().kind, StepKind::StatefulFeature);
    }
}
