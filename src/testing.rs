//! Testing utilities for ironprep pipelines.
//!
//! Helpers for end-users writing tests for their own processing steps, parsers
//! and filters:
//!
//! - **Assertions**: compare feature maps and step orderings with readable diffs
//! - **Fixtures**: small serialized records and feature maps to feed parsers and processors
//!
//! # Quick Start
//!
//! ```
//! use ironprep::*;
//! use ironprep::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = PipelineBuilder::<i64>::new();
//! builder.add_step(StepSpec::feature("n", |n| Ok(n * 2)).named("double"))?;
//! assert_step_order(&builder, &["double"]);
//!
//! let out = builder.compile().process(&int_features([("n", 3)]))?;
//! assert_features_equal(&out, &int_features([("n", 6)]));
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::*;
pub use fixtures::*;
