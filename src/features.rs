//! The feature mapping and the well-known feature names shared across datasets.
//!
//! Every stage consumes and produces a [`FeatureMap`]: a mapping from a unique
//! feature name to its value. Parsers and steps should target the names in
//! [`names`] for their modality so that a step written for one dataset (say a
//! crop on [`names::IMAGE`]) can be reused on another, whatever the field is
//! called inside the stored records.

use crate::value::FeatureValue;
use std::collections::HashMap;

/// Named field values of one record (or one batch).
pub type FeatureMap<V = FeatureValue> = HashMap<String, V>;

/// Conventional feature names per modality.
pub mod names {
    pub const AUDIO: &str = "audio";
    pub const FLOW: &str = "flow";
    pub const IMAGE: &str = "image";
    pub const KEY: &str = "key";
    pub const LABEL_INDEX: &str = "label";
    pub const LABEL_NAME: &str = "label_name";
    pub const TEXT: &str = "text";
    pub const TEXT_INDICES: &str = "text_indices";

    /// All reserved names.
    pub const ALL: [&str; 8] = [AUDIO, FLOW, IMAGE, KEY, LABEL_INDEX, LABEL_NAME, TEXT, TEXT_INDICES];

    /// Whether `name` is one of the reserved modality names.
    #[must_use]
    pub fn is_well_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::names;

    #[test]
    fn test_well_known_names_are_unique() {
        let mut all = names::ALL.to_vec();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), names::ALL.len());
        assert!(names::is_well_known("label_name"));
        assert!(!names::is_well_known("my_feature"));
    }
}
