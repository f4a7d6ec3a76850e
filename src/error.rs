//! Error types.
//!
//! Three families, by when they can happen:
//!
//! - [`BuilderError`]: rejected builder calls. Raised synchronously while a
//!   pipeline is being declared; the builder is left exactly as it was.
//! - [`ProcessError`]: conditions detected by a compiled processor while it runs
//!   (a field-scoped step whose field is absent, a missing state entry). These
//!   travel inside `anyhow::Error` next to whatever the caller's own steps return.
//! - [`ParseError`]: a serialized record that does not match the parser schema.

use crate::step::StepKind;
use crate::value::DType;
use thiserror::Error;

/// A builder call that violates a naming, ordering or typing invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("step name `{0}` is not unique")]
    DuplicateStepName(String),

    #[error("output name `{0}` is not unique")]
    DuplicateOutputName(String),

    #[error("different field type given for `{key}`: registered as {existing}, got {given}")]
    InconsistentFieldType {
        key: String,
        existing: String,
        given: String,
    },

    #[error("step `{0}` does not exist")]
    UnknownStep(String),

    #[error("step `{name}` is a {expected} step, replacement is a {found} step")]
    IncompatibleStep {
        name: String,
        expected: StepKind,
        found: StepKind,
    },

    #[error("field type {field_type} is not supported for `{key}`")]
    UnsupportedFieldType { key: String, field_type: String },

    #[error("`{key}`: flat records have no {group} fields")]
    UnsupportedGroup { key: String, group: String },
}

impl BuilderError {
    /// True for both step-name and output-name collisions.
    #[must_use]
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, BuilderError::DuplicateStepName(_) | BuilderError::DuplicateOutputName(_))
    }
}

/// Failures raised by compiled processors themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("step `{step}` targets feature `{field}`, which is not present")]
    MissingFeature { step: String, field: String },

    #[error("processor state has no entry `{0}`")]
    MissingState(String),

    #[error("processor state entry `{key}` is not a `{expected}`")]
    StateTypeMismatch { key: String, expected: &'static str },
}

/// A serialized record that cannot be parsed against the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("required feature `{0}` is missing")]
    MissingFeature(String),

    #[error("feature `{name}` has type {found}, schema expects {expected}")]
    DTypeMismatch {
        name: String,
        expected: DType,
        found: DType,
    },

    #[error("feature `{name}` has {found} values, schema expects {expected}")]
    ShapeMismatch {
        name: String,
        expected: String,
        found: usize,
    },
}
