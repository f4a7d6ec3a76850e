//! Assertion functions for testing pipeline outputs.

use crate::features::FeatureMap;
use crate::processor::PipelineBuilder;
use std::fmt::Debug;

/// Assert that two feature maps hold the same keys with equal values.
///
/// The panic message lists missing keys, extra keys and differing values,
/// sorted by key.
///
/// # Panics
///
/// Panics if the maps differ.
///
/// # Example
///
/// ```
/// use ironprep::testing::{assert_features_equal, int_features};
///
/// assert_features_equal(&int_features([("a", 1), ("b", 2)]), &int_features([("b", 2), ("a", 1)]));
/// ```
pub fn assert_features_equal<V: Debug + PartialEq>(actual: &FeatureMap<V>, expected: &FeatureMap<V>) {
    let mut missing: Vec<&str> = expected
        .keys()
        .filter(|k| !actual.contains_key(*k))
        .map(String::as_str)
        .collect();
    let mut extra: Vec<&str> = actual
        .keys()
        .filter(|k| !expected.contains_key(*k))
        .map(String::as_str)
        .collect();
    let mut differing: Vec<(&str, &V, &V)> = expected
        .iter()
        .filter_map(|(k, e)| actual.get(k).filter(|a| *a != e).map(|a| (k.as_str(), e, a)))
        .collect();

    if missing.is_empty() && extra.is_empty() && differing.is_empty() {
        return;
    }
    missing.sort_unstable();
    extra.sort_unstable();
    differing.sort_unstable_by_key(|(k, _, _)| *k);

    let mut msg = String::from("Feature map mismatch:");
    if !missing.is_empty() {
        msg.push_str(&format!("\n  Missing features: {missing:?}"));
    }
    if !extra.is_empty() {
        msg.push_str(&format!("\n  Extra features: {extra:?}"));
    }
    for (k, e, a) in differing {
        msg.push_str(&format!("\n  `{k}`:\n    Expected: {e:?}\n    Actual: {a:?}"));
    }
    panic!("{msg}");
}

/// Assert that a builder's steps run in exactly the given order.
///
/// # Panics
///
/// Panics if the registered step names differ from `expected`.
///
/// # Example
///
/// ```
/// use ironprep::PipelineBuilder;
/// use ironprep::testing::assert_step_order;
///
/// let mut b = PipelineBuilder::<i64>::new();
/// b.add_fn(|m| Ok(m)).unwrap();
/// assert_step_order(&b, &["fn_0"]);
/// ```
pub fn assert_step_order<V>(builder: &PipelineBuilder<V>, expected: &[&str]) {
    let actual = builder.step_names();
    assert!(
        actual.iter().map(String::as_str).eq(expected.iter().copied()),
        "Step order mismatch:\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that every name in `names` is a key of `features`.
///
/// # Panics
///
/// Panics listing the absent names.
pub fn assert_has_features<V>(features: &FeatureMap<V>, names: &[&str]) {
    let absent: Vec<&str> = names.iter().copied().filter(|n| !features.contains_key(*n)).collect();
    if !absent.is_empty() {
        let mut present: Vec<&String> = features.keys().collect();
        present.sort_unstable();
        panic!("Features not found: {absent:?}\n  Present: {present:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::int_features;

    #[test]
    #[should_panic(expected = "Missing features: [\"b\"]")]
    fn test_reports_missing_key() {
        assert_features_equal(&int_features([("a", 1)]), &int_features([("a", 1), ("b", 2)]));
    }

    #[test]
    #[should_panic(expected = "Expected: 2")]
    fn test_reports_differing_value() {
        assert_features_equal(&int_features([("a", 1)]), &int_features([("a", 2)]));
    }

    #[test]
    #[should_panic(expected = "Step order mismatch")]
    fn test_step_order_mismatch() {
        let mut b = PipelineBuilder::<i64>::new();
        b.add_fn(|m| Ok(m)).unwrap().add_fn(|m| Ok(m)).unwrap();
        assert_step_order(&b, &["fn_1", "fn_0"]);
    }

    #[test]
    fn test_has_features() {
        assert_has_features(&int_features([("a", 1), ("b", 2)]), &["b"]);
    }
}
