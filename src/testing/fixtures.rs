//! Pre-built records and feature maps for common testing scenarios.

use crate::features::{FeatureMap, names};
use crate::record::{Example, Feature, SequenceExample};

/// Source field names used by the fixture records.
pub mod fields {
    pub const IMAGE: &str = "image/encoded";
    pub const AUDIO: &str = "WAVEFORM/feature/floats";
    pub const LABEL: &str = "clip/label/index";
    pub const LABEL_NAME: &str = "clip/label/string";
    pub const TEXT: &str = "caption/string";
    pub const TEXT_INDICES: &str = "caption/token_ids";
}

/// Feature map of integers, handy for steps that do arithmetic.
///
/// # Example
///
/// ```
/// use ironprep::testing::int_features;
///
/// let f = int_features([("n", 3)]);
/// assert_eq!(f["n"], 3);
/// ```
pub fn int_features<'a>(entries: impl IntoIterator<Item = (&'a str, i64)>) -> FeatureMap<i64> {
    entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Image-classification record: one encoded image, a label index and a label name.
#[must_use]
pub fn sample_image_example() -> Example {
    Example::new()
        .with_feature(fields::IMAGE, Feature::bytes(["\u{ff}\u{d8}jpeg-bytes"]))
        .with_feature(fields::LABEL, vec![3i64])
        .with_feature(fields::LABEL_NAME, Feature::bytes(["cat"]))
}

/// Captioned image record with a variable number of caption tokens.
#[must_use]
pub fn sample_caption_example() -> Example {
    Example::new()
        .with_feature(fields::IMAGE, Feature::bytes(["png-bytes"]))
        .with_feature(fields::TEXT, Feature::bytes(["a cat on a mat"]))
        .with_feature(fields::TEXT_INDICES, vec![12i64, 7, 99, 7, 40])
}

/// Video clip record: four frames, two audio steps of three samples each, and a
/// clip-level label in the context.
#[must_use]
pub fn sample_video_sequence() -> SequenceExample {
    SequenceExample::new()
        .with_context(fields::LABEL, vec![1i64])
        .with_context(fields::LABEL_NAME, Feature::bytes(["running"]))
        .with_feature_list(
            fields::IMAGE,
            ["frame-0", "frame-1", "frame-2", "frame-3"].map(|f| Feature::bytes([f])),
        )
        .with_feature_list(fields::AUDIO, [vec![0.0f32, 0.25, 0.5], vec![0.75, 1.0, 0.5]])
}

/// Output names the fixture records are usually registered under.
#[must_use]
pub fn fixture_output_names() -> [(&'static str, &'static str); 6] {
    [
        (fields::IMAGE, names::IMAGE),
        (fields::AUDIO, names::AUDIO),
        (fields::LABEL, names::LABEL_INDEX),
        (fields::LABEL_NAME, names::LABEL_NAME),
        (fields::TEXT, names::TEXT),
        (fields::TEXT_INDICES, names::TEXT_INDICES),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_records_are_well_formed() {
        let ex = sample_image_example();
        assert_eq!(ex.features.len(), 3);
        let seq = sample_video_sequence();
        assert_eq!(seq.feature_lists[fields::IMAGE].len(), 4);
        assert!(seq.feature_lists[fields::AUDIO].iter().all(|f| f.len() == 3));
    }

    #[test]
    fn test_fixture_outputs_are_well_known() {
        assert!(fixture_output_names().iter().all(|(_, out)| names::is_well_known(out)));
    }
}
