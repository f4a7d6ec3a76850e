//! # ironprep
//!
//! A **declarative construction layer** for record preprocessing pipelines. ironprep
//! lets you describe how a serialized multi-modal record (image, audio, text,
//! labels, ...) is parsed, transformed and filtered, validates that description
//! while you build it, and compiles it into plain functions that an external
//! execution engine applies per record or per batch.
//!
//! ## Key Features
//!
//! - **Ordered step pipelines** - named steps with insertion, replacement and removal
//! - **Four step shapes** - whole-map or single-feature, with or without per-call state
//! - **Schema-driven parsers** - flat and two-level (context / sequence) records
//! - **Fan-out** - one stored field under several output names, copy-on-write
//! - **Phase filters** - predicates keyed by processing phase, compiled to an AND
//! - **Immutable compiled functions** - snapshots that are safe to share across threads
//!
//! ## Quick Start
//!
//! ```
//! use ironprep::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut stages = StageBuilders::new(RawFormat::Example);
//! stages
//!     .parser
//!     .register_field("image/encoded", FieldType::var_len(DType::Bytes), Some(names::IMAGE))?
//!     .register_field("clip/label/index", FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?;
//!
//! // Keep only the first encoded image.
//! stages.sampler.add_feature_fn(names::IMAGE, |image: FeatureValue| {
//!     let first = image.data().as_bytes().and_then(|b| b.first()).cloned().unwrap_or_default();
//!     Ok(FeatureValue::Dense(Tensor::new(vec![1], vec![first].into()).unwrap()))
//! })?;
//! stages.filters.add_predicate(
//!     |f| Ok(f[names::LABEL_INDEX].data().as_int64() != Some(&[-1][..])),
//!     Phase::Parse,
//! );
//!
//! let raw = Example::new()
//!     .with_feature("image/encoded", Feature::bytes(["jpeg-0", "jpeg-1"]))
//!     .with_feature("clip/label/index", vec![2i64])
//!     .to_bytes(WireEncoding::Json)?;
//!
//! let compiled = stages.compile();
//! let features = compiled.process_record(Some("clip-0001"), &raw)?.expect("kept");
//! assert_eq!(features[names::IMAGE].as_dense().unwrap().shape(), &[1]);
//! assert!(features.contains_key(names::KEY));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Feature maps
//!
//! A [`FeatureMap`] maps feature names to values. Values default to
//! [`FeatureValue`] (dense [`Tensor`] or [`SparseTensor`]), but every builder is
//! generic over the value type. Use the constants in [`names`] as output names so
//! that steps can be reused across datasets.
//!
//! ### Pipelines
//!
//! A [`PipelineBuilder`] holds named steps in execution order:
//! - [`add_step`](PipelineBuilder::add_step) - register a [`StepSpec`], optionally before another step
//! - [`remove_step`](PipelineBuilder::remove_step) - idempotent removal
//! - [`replace_step`](PipelineBuilder::replace_step) - swap a function in place
//! - [`compile`](PipelineBuilder::compile) - freeze into a [`Processor`]
//!
//! [`SamplerBuilder`], [`DecoderBuilder`], [`PreprocessorBuilder`] and
//! [`PostprocessorBuilder`] are the same builder tagged with their [`Phase`].
//!
//! ### Parsers
//!
//! [`FlatRecordParserBuilder`] and [`GroupedRecordParserBuilder`] implement
//! [`RecordParserBuilder`]: register fields with a [`FieldType`], then compile a
//! [`Parser`] from raw bytes to a feature map.
//!
//! ### Filters
//!
//! A [`FilterBuilder`] collects predicates per [`Phase`];
//! [`compile`](FilterBuilder::compile) returns a [`FilterFn`] for one phase.
//!
//! ## Errors
//!
//! Builder calls fail with [`BuilderError`] and leave the builder unchanged.
//! Compiled functions return [`anyhow::Result`]; errors from your own steps and
//! predicates come back unmodified, crate errors as [`ProcessError`] or
//! [`ParseError`].
//!
//! ## Feature Flags
//!
//! - `binary-records` (default) - [`WireEncoding::Postcard`] record encoding
//!
//! ## Module Overview
//!
//! - [`processor`] - Pipeline builders and compiled processors
//! - [`step`] - Step specifications and descriptors
//! - [`state`] - Per-call scratch state shared by stateful steps
//! - [`schema`] - Feature schemas and field types
//! - [`parser`] - Record parser builders
//! - [`filter`] - Phase-keyed filters
//! - [`stages`] - All builders of a dataset in one bundle
//! - [`record`] - Serialized record model
//! - [`testing`] - Assertions and fixtures for tests

pub mod error;
pub mod features;
pub mod filter;
pub mod parser;
pub mod phase;
pub mod processor;
pub mod record;
mod registry;
pub mod schema;
pub mod stages;
pub mod state;
pub mod step;
pub mod testing;
pub mod value;

// General re-exports
pub use error::{BuilderError, ParseError, ProcessError};
pub use features::{FeatureMap, names};
pub use filter::{FilterBuilder, FilterFn, Predicate};
pub use parser::{
    AnyParserBuilder, FlatRecordParserBuilder, GroupedRecordParserBuilder, ParseFn, Parser, RecordParserBuilder,
};
pub use phase::{Phase, RawFormat};
pub use processor::{
    DecoderBuilder, PipelineBuilder, PipelineSummary, PostprocessorBuilder, PreprocessorBuilder, Processor,
    SamplerBuilder,
};
pub use record::{Example, Feature, Record, SequenceExample, WireEncoding};
pub use schema::{FeatureSchema, FieldGroup, FieldType, GroupedKey, SchemaEntry};
pub use stages::{CompiledStages, StageBuilders};
pub use state::{ProcessorState, StateValue};
pub use step::{StepDescriptor, StepFn, StepKind, StepSpec, StepSummary};
pub use value::{DType, FeatureValue, SparseTensor, Tensor, TensorData};
