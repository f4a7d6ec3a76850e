//! Processing phases and raw record formats.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};

/// Checkpoints of a record's processing lifecycle, in execution order.
///
/// Filters are attached *after* a phase. The ordering (`Ord`) is the order in
/// which an execution engine is expected to evaluate them, so that records are
/// rejected as soon as the features a predicate needs exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Read,
    Parse,
    Sample,
    Decode,
    Preprocess,
    Postprocess,
}

impl Phase {
    /// Every phase, in execution order.
    pub const ALL: [Phase; 6] = [
        Phase::Read,
        Phase::Parse,
        Phase::Sample,
        Phase::Decode,
        Phase::Preprocess,
        Phase::Postprocess,
    ];

    /// The phase that follows this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Phase> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// Position in [`Phase::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Whether the phase runs on batched feature maps.
    #[must_use]
    pub const fn is_batched(self) -> bool {
        matches!(self, Phase::Postprocess)
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            Phase::Read => "read",
            Phase::Parse => "parse",
            Phase::Sample => "sample",
            Phase::Decode => "decode",
            Phase::Preprocess => "preprocess",
            Phase::Postprocess => "postprocess",
        };
        f.write_str(name)
    }
}

/// Supported layouts of serialized records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawFormat {
    /// Single-level records, see [`Example`](crate::record::Example).
    Example,
    /// Two-level records with context and per-step fields, see
    /// [`SequenceExample`](crate::record::SequenceExample).
    SequenceExample,
}
