//! Ordered step pipelines and their compiled form.
//!
//! A [`PipelineBuilder`] collects named steps; [`PipelineBuilder::compile`] freezes
//! them into a [`Processor`], a cheap-to-clone function from a feature map to a
//! new feature map. Every processing phase uses the same engine; the role-specific
//! builders ([`SamplerBuilder`], [`DecoderBuilder`], [`PreprocessorBuilder`],
//! [`PostprocessorBuilder`]) only document which phase they belong to.
//!
//! # Example
//!
//! ```
//! use ironprep::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = PipelineBuilder::<i64>::new();
//! builder
//!     .add_step(StepSpec::feature("n", |n| Ok(n * 2)).named("double"))?
//!     .add_step(StepSpec::feature("n", |n| Ok(n + 1)).named("add_one"))?;
//!
//! let process = builder.compile();
//! let out = process.process(&FeatureMap::<i64>::from([("n".to_string(), 3)]))?;
//! assert_eq!(out["n"], 7);
//! # Ok(())
//! # }
//! ```
//!
//! Steps can share auxiliary values through the per-call [`ProcessorState`]:
//!
//! ```
//! use ironprep::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = PipelineBuilder::<i64>::new();
//! builder
//!     .add_step(StepSpec::feature_with_state("frames", |f, state| {
//!         state.insert("offset", 5i64);
//!         Ok(f)
//!     }))?
//!     .add_step(StepSpec::feature_with_state("audio", |a, state| {
//!         Ok(a + *state.require::<i64>("offset")?)
//!     }))?;
//!
//! let input = FeatureMap::<i64>::from([("frames".to_string(), 0), ("audio".to_string(), 10)]);
//! assert_eq!(builder.compile().process(&input)?["audio"], 15);
//! # Ok(())
//! # }
//! ```

use crate::error::BuilderError;
use crate::features::FeatureMap;
use crate::phase::Phase;
use crate::registry::FunctionRegistry;
use crate::state::ProcessorState;
use crate::step::{StepDescriptor, StepFn, StepSpec, StepSummary};
use crate::value::FeatureValue;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace};

/// Mutable, ordered collection of named steps.
pub struct PipelineBuilder<V = FeatureValue> {
    registry: FunctionRegistry<V>,
    next_fn_idx: usize,
}

impl<V> Default for PipelineBuilder<V> {
    fn default() -> Self {
        Self { registry: FunctionRegistry::default(), next_fn_idx: 0 }
    }
}

impl<V> PipelineBuilder<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step.
    ///
    /// # Errors
    ///
    /// - [`BuilderError::DuplicateStepName`] if the step's name is taken.
    /// - [`BuilderError::UnknownStep`] if `insert_before` names no registered step.
    ///
    /// On error the builder is unchanged.
    pub fn add_step(&mut self, step: StepSpec<V>) -> Result<&mut Self, BuilderError> {
        let StepSpec { function, field, name, insert_before } = step;
        let (name, next_idx) = match name {
            Some(name) => (name, self.next_fn_idx),
            None => self.synthetic_name(),
        };
        let kind = function.kind();
        let descriptor = StepDescriptor::new(name, field, function);
        let name = descriptor.name().to_string();
        let position = self.registry.insert(descriptor, insert_before.as_deref())?;
        self.next_fn_idx = next_idx;
        debug!(step = %name, %kind, position, "added step");
        Ok(self)
    }

    /// Append an anonymous whole-mapping step.
    pub fn add_fn<F>(&mut self, f: F) -> Result<&mut Self, BuilderError>
    where
        F: Fn(FeatureMap<V>) -> Result<FeatureMap<V>> + Send + Sync + 'static,
    {
        self.add_step(StepSpec::mapping(f))
    }

    /// Append an anonymous step on a single feature.
    pub fn add_feature_fn<F>(&mut self, field: impl Into<String>, f: F) -> Result<&mut Self, BuilderError>
    where
        F: Fn(V) -> Result<V> + Send + Sync + 'static,
    {
        self.add_step(StepSpec::feature(field, f))
    }

    /// Remove a step by name. Removing an absent name is a no-op.
    pub fn remove_step(&mut self, name: &str) -> &mut Self {
        match self.registry.remove(name) {
            Some(_) => debug!(step = name, "removed step"),
            None => trace!(step = name, "remove of unknown step ignored"),
        }
        self
    }

    /// Swap the function of an existing step, keeping its position and target feature.
    ///
    /// # Errors
    ///
    /// - [`BuilderError::UnknownStep`] if no step has that name.
    /// - [`BuilderError::IncompatibleStep`] if `function` has a different call shape.
    pub fn replace_step(&mut self, name: &str, function: StepFn<V>) -> Result<&mut Self, BuilderError> {
        let position = self.registry.replace(name, function)?;
        debug!(step = name, position, "replaced step");
        Ok(self)
    }

    /// Drop every registered step.
    pub fn reset(&mut self) -> &mut Self {
        debug!(steps = self.registry.len(), "reset pipeline");
        self.registry.clear();
        self
    }

    /// Copy of the registered steps in execution order.
    #[must_use]
    pub fn inspect(&self) -> Vec<StepDescriptor<V>> {
        self.registry.iter().cloned().collect()
    }

    #[must_use]
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary { steps: self.registry.iter().map(StepDescriptor::summary).collect() }
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<String> {
        self.registry.iter().map(|d| d.name().to_string()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Freeze the current steps into a processor. Later builder changes do not
    /// affect processors already compiled.
    #[must_use]
    pub fn compile(&self) -> Processor<V> {
        let steps = self.registry.snapshot();
        debug!(steps = steps.len(), "compiled processor");
        Processor { steps }
    }

    fn synthetic_name(&self) -> (String, usize) {
        let mut idx = self.next_fn_idx;
        loop {
            let candidate = format!("fn_{idx}");
            idx += 1;
            if !self.registry.contains(&candidate) {
                return (candidate, idx);
            }
        }
    }
}

impl<V> fmt::Debug for PipelineBuilder<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("steps", &self.registry.iter().map(StepDescriptor::name).collect::<Vec<_>>())
            .finish()
    }
}

/// Compiled, immutable step pipeline.
///
/// Safe to share across threads: each call copies its input and allocates its own
/// [`ProcessorState`].
pub struct Processor<V = FeatureValue> {
    steps: Arc<[StepDescriptor<V>]>,
}

impl<V> Clone for Processor<V> {
    fn clone(&self) -> Self {
        Self { steps: Arc::clone(&self.steps) }
    }
}

impl<V> Processor<V> {
    /// Run every step over an owned feature map.
    pub fn process_owned(&self, features: FeatureMap<V>) -> Result<FeatureMap<V>> {
        let mut state = ProcessorState::new();
        self.steps.iter().try_fold(features, |acc, step| {
            trace!(step = step.name(), "applying step");
            step.apply(acc, &mut state)
        })
    }

    /// Run every step over a copy of `features`; the caller's map is untouched.
    pub fn process(&self, features: &FeatureMap<V>) -> Result<FeatureMap<V>>
    where
        V: Clone,
    {
        self.process_owned(features.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    #[must_use]
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(StepDescriptor::name).collect()
    }

    #[must_use]
    pub fn summary(&self) -> PipelineSummary {
        PipelineSummary { steps: self.steps.iter().map(StepDescriptor::summary).collect() }
    }
}

impl<V> fmt::Debug for Processor<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor").field("steps", &self.step_names()).finish()
    }
}

/// Step listing of a builder or processor, for logs and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub steps: Vec<StepSummary>,
}

impl PipelineSummary {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Display for PipelineSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline ({} steps)", self.steps.len())?;
        for (i, step) in self.steps.iter().enumerate() {
            let target = step.field.as_deref().unwrap_or("<all features>");
            writeln!(f, "  {i:>3}. {:<24} {:<18} {target}", step.name, step.kind.to_string())?;
        }
        Ok(())
    }
}

macro_rules! role_builder {
    ($(#[$meta:meta])* $role:ident => $phase:expr) => {
        paste::paste! {
            $(#[$meta])*
            pub struct [<$role Builder>]<V = FeatureValue> {
                inner: PipelineBuilder<V>,
            }

            impl<V> Default for [<$role Builder>]<V> {
                fn default() -> Self {
                    Self { inner: PipelineBuilder::default() }
                }
            }

            impl<V> [<$role Builder>]<V> {
                /// Phase after which the compiled processor runs.
                pub const PHASE: Phase = $phase;
                /// Whether the processor sees batched feature maps.
                pub const BATCHED: bool = $phase.is_batched();

                #[must_use]
                pub fn new() -> Self {
                    Self::default()
                }

                #[must_use]
                pub fn into_inner(self) -> PipelineBuilder<V> {
                    self.inner
                }
            }

            impl<V> Deref for [<$role Builder>]<V> {
                type Target = PipelineBuilder<V>;

                fn deref(&self) -> &Self::Target {
                    &self.inner
                }
            }

            impl<V> DerefMut for [<$role Builder>]<V> {
                fn deref_mut(&mut self) -> &mut Self::Target {
                    &mut self.inner
                }
            }

            impl<V> fmt::Debug for [<$role Builder>]<V> {
                fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                    f.debug_tuple(stringify!([<$role Builder>])).field(&self.inner).finish()
                }
            }
        }
    };
}

role_builder!(
    /// Builder for the sample processor: keeps only the parts of a raw record worth
    /// decoding, e.g. the frames of one clip. Runs on unbatched records.
    Sampler => Phase::Sample
);

role_builder!(
    /// Builder for the decode processor: turns raw features into usable values,
    /// e.g. JPEG bytes into pixels. Avoid dataset-specific work such as crops here.
    /// Runs on unbatched records.
    Decoder => Phase::Decode
);

role_builder!(
    /// Builder for the preprocess processor: crop, pad, resize and similar.
    /// Runs on unbatched records.
    Preprocessor => Phase::Preprocess
);

role_builder!(
    /// Builder for the postprocess processor. Same as [`PreprocessorBuilder`] but
    /// runs on batched feature maps, e.g. for transposes.
    Postprocessor => Phase::Postprocess
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_names_skip_taken() {
        let mut b = PipelineBuilder::<i64>::new();
        b.add_step(StepSpec::mapping(|m| Ok(m)).named("fn_0")).unwrap();
        b.add_fn(|m| Ok(m)).unwrap();
        b.add_fn(|m| Ok(m)).unwrap();
        assert_eq!(b.step_names(), vec!["fn_0", "fn_1", "fn_2"]);
    }

    #[test]
    fn test_failed_add_does_not_consume_synthetic_name() {
        let mut b = PipelineBuilder::<i64>::new();
        assert!(b.add_step(StepSpec::mapping(|m| Ok(m)).insert_before("missing")).is_err());
        b.add_fn(|m| Ok(m)).unwrap();
        assert_eq!(b.step_names(), vec!["fn_0"]);
    }

    #[test]
    fn test_role_builder_constants() {
        assert_eq!(SamplerBuilder::<i64>::PHASE, Phase::Sample);
        assert!(!DecoderBuilder::<i64>::BATCHED);
        assert!(!PreprocessorBuilder::<i64>::BATCHED);
        assert!(PostprocessorBuilder::<i64>::BATCHED);
    }

    #[test]
    fn test_summary_display_lists_steps() {
        let mut b = PipelineBuilder::<i64>::new();
        b.add_feature_fn("image", |v| Ok(v)).unwrap();
        let text = b.summary().to_string();
        assert!(text.contains("fn_0"));
        assert!(text.contains("image"));
        assert!(b.summary().to_json().unwrap().contains("\"kind\": \"feature\""));
    }
}
