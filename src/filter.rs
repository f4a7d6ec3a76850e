//! Phase-keyed record filters.
//!
//! Predicates are registered against the [`Phase`] after which they run and
//! compiled per phase into a [`FilterFn`] that ANDs them together. A phase with
//! no predicates keeps every record.
//!
//! ```
//! use ironprep::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut filters = FilterBuilder::<i64>::new();
//! filters
//!     .add_predicate(|f| Ok(f["n"] > 0), Phase::Decode)
//!     .add_predicate(|f| Ok(f["n"] % 2 == 0), Phase::Decode);
//!
//! let keep = filters.compile(Phase::Decode);
//! assert!(keep.keep(&FeatureMap::<i64>::from([("n".to_string(), 4)]))?);
//! assert!(!keep.keep(&FeatureMap::<i64>::from([("n".to_string(), 3)]))?);
//! assert!(filters.compile(Phase::Parse).keep(&FeatureMap::<i64>::new())?);
//! # Ok(())
//! # }
//! ```

use crate::features::FeatureMap;
use crate::phase::Phase;
use crate::value::FeatureValue;
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Boolean test over a feature map.
pub type Predicate<V = FeatureValue> = Arc<dyn Fn(&FeatureMap<V>) -> Result<bool> + Send + Sync>;

/// Predicates grouped by the phase they follow.
pub struct FilterBuilder<V = FeatureValue> {
    predicates: BTreeMap<Phase, Vec<Predicate<V>>>,
}

impl<V> Default for FilterBuilder<V> {
    fn default() -> Self {
        Self { predicates: BTreeMap::new() }
    }
}

impl<V> FilterBuilder<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `f` to the predicates run after `after_phase`. Duplicates are allowed.
    pub fn add_predicate<F>(&mut self, f: F, after_phase: Phase) -> &mut Self
    where
        F: Fn(&FeatureMap<V>) -> Result<bool> + Send + Sync + 'static,
    {
        let list = self.predicates.entry(after_phase).or_default();
        list.push(Arc::new(f));
        debug!(phase = %after_phase, count = list.len(), "added predicate");
        self
    }

    #[must_use]
    pub fn predicate_count(&self, phase: Phase) -> usize {
        self.predicates.get(&phase).map_or(0, Vec::len)
    }

    /// Filter for `after_phase`. Other phases are unaffected.
    #[must_use]
    pub fn compile(&self, after_phase: Phase) -> FilterFn<V> {
        let predicates: Arc<[Predicate<V>]> = self
            .predicates
            .get(&after_phase)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_else(|| Arc::from(Vec::new()));
        debug!(phase = %after_phase, predicates = predicates.len(), "compiled filter");
        FilterFn { phase: after_phase, predicates }
    }
}

impl<V> fmt::Debug for FilterBuilder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<Phase, usize> = self.predicates.iter().map(|(p, l)| (*p, l.len())).collect();
        f.debug_struct("FilterBuilder").field("predicates", &counts).finish()
    }
}

/// Compiled conjunction of one phase's predicates.
pub struct FilterFn<V = FeatureValue> {
    phase: Phase,
    predicates: Arc<[Predicate<V>]>,
}

impl<V> Clone for FilterFn<V> {
    fn clone(&self) -> Self {
        Self { phase: self.phase, predicates: Arc::clone(&self.predicates) }
    }
}

impl<V> FilterFn<V> {
    /// `true` if every predicate accepts `features`. Stops at the first rejection
    /// or error.
    pub fn keep(&self, features: &FeatureMap<V>) -> Result<bool> {
        for (i, predicate) in self.predicates.iter().enumerate() {
            if !predicate(features)? {
                trace!(phase = %self.phase, predicate = i, "record rejected");
                return Ok(false);
            }
        }
        Ok(true)
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl<V> fmt::Debug for FilterFn<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterFn")
            .field("phase", &self.phase)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}
