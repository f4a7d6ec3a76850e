//! Declarative feature schemas shared by the record parser builders.
//!
//! A schema maps a source key (a field name in the stored record, plus a
//! [`FieldGroup`] for two-level records) to one [`FieldType`] and one or more
//! output names. Registering the same key again with the same type adds another
//! output name (fan-out); a different type, or an output name already used
//! anywhere in the schema, is rejected without touching the schema.

use crate::error::BuilderError;
use crate::value::{DType, TensorData};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;
use tracing::debug;

/// How a stored field is turned into a [`FeatureValue`](crate::FeatureValue).
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// Dense tensor of a fixed shape; `default` fills in when the field is absent.
    FixedLen {
        shape: Vec<usize>,
        dtype: DType,
        default: Option<TensorData>,
    },
    /// Variable number of values, parsed into a sparse tensor.
    VarLen { dtype: DType },
    /// Sequence of fixed-shape elements, parsed into a dense `[steps, ..shape]` tensor.
    FixedLenSequence {
        shape: Vec<usize>,
        dtype: DType,
        allow_missing: bool,
    },
}

impl FieldType {
    #[must_use]
    pub fn fixed_len(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        FieldType::FixedLen { shape: shape.into(), dtype, default: None }
    }

    #[must_use]
    pub fn var_len(dtype: DType) -> Self {
        FieldType::VarLen { dtype }
    }

    #[must_use]
    pub fn fixed_len_sequence(shape: impl Into<Vec<usize>>, dtype: DType) -> Self {
        FieldType::FixedLenSequence { shape: shape.into(), dtype, allow_missing: false }
    }

    /// Default used for an absent `FixedLen` field. Ignored by other types.
    #[must_use]
    pub fn with_default(self, value: impl Into<TensorData>) -> Self {
        match self {
            FieldType::FixedLen { shape, dtype, .. } => FieldType::FixedLen { shape, dtype, default: Some(value.into()) },
            other => other,
        }
    }

    /// Let an absent `FixedLenSequence` field parse as zero steps. Ignored by other types.
    #[must_use]
    pub fn allow_missing(self) -> Self {
        match self {
            FieldType::FixedLenSequence { shape, dtype, .. } => {
                FieldType::FixedLenSequence { shape, dtype, allow_missing: true }
            }
            other => other,
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            FieldType::FixedLen { dtype, .. }
            | FieldType::VarLen { dtype }
            | FieldType::FixedLenSequence { dtype, .. } => *dtype,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::FixedLen { shape, dtype, default } => {
                write!(f, "fixed_len({dtype}, {shape:?}")?;
                if default.is_some() {
                    f.write_str(", default")?;
                }
                f.write_str(")")
            }
            FieldType::VarLen { dtype } => write!(f, "var_len({dtype})"),
            FieldType::FixedLenSequence { shape, dtype, allow_missing } => {
                write!(f, "fixed_len_sequence({dtype}, {shape:?}")?;
                if *allow_missing {
                    f.write_str(", allow_missing")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Which half of a two-level record a field lives in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldGroup {
    /// One value per record.
    Context,
    /// One entry per sequence step.
    #[default]
    Sequence,
}

impl Display for FieldGroup {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldGroup::Context => "context",
            FieldGroup::Sequence => "sequence",
        })
    }
}

/// Schema key of a two-level record: source name plus group.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupedKey {
    pub name: String,
    pub group: FieldGroup,
}

impl GroupedKey {
    pub fn new(name: impl Into<String>, group: FieldGroup) -> Self {
        Self { name: name.into(), group }
    }
}

impl Display for GroupedKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.group)
    }
}

/// One source field: its type and every output name it fans out to.
#[derive(Clone, Debug, PartialEq)]
pub struct SchemaEntry<K> {
    key: K,
    field_type: FieldType,
    output_names: Vec<String>,
}

impl<K> SchemaEntry<K> {
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    #[must_use]
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

/// Validated collection of schema entries, in first-registration order.
#[derive(Clone, Debug)]
pub struct FeatureSchema<K> {
    entries: Vec<SchemaEntry<K>>,
    index: HashMap<K, usize>,
    outputs: HashSet<String>,
}

impl<K> Default for FeatureSchema<K> {
    fn default() -> Self {
        Self { entries: Vec::new(), index: HashMap::new(), outputs: HashSet::new() }
    }
}

impl<K> FeatureSchema<K>
where
    K: Clone + Eq + Hash + Display,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `output_name` for `key`, creating the entry on first use.
    ///
    /// # Errors
    ///
    /// - [`BuilderError::DuplicateOutputName`] if `output_name` is already used.
    /// - [`BuilderError::InconsistentFieldType`] if `key` is registered with another type.
    pub fn register(&mut self, key: K, field_type: FieldType, output_name: String) -> Result<(), BuilderError> {
        if self.outputs.contains(&output_name) {
            return Err(BuilderError::DuplicateOutputName(output_name));
        }
        match self.index.get(&key) {
            Some(&idx) => {
                let entry = &mut self.entries[idx];
                if entry.field_type != field_type {
                    return Err(BuilderError::InconsistentFieldType {
                        key: key.to_string(),
                        existing: entry.field_type.to_string(),
                        given: field_type.to_string(),
                    });
                }
                debug!(source = %key, output = %output_name, "fanned out schema field");
                entry.output_names.push(output_name.clone());
            }
            None => {
                debug!(source = %key, output = %output_name, field_type = %field_type, "registered schema field");
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push(SchemaEntry { key, field_type, output_names: vec![output_name.clone()] });
            }
        }
        self.outputs.insert(output_name);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&SchemaEntry<K>> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> impl Iterator<Item = &SchemaEntry<K>> {
        self.entries.iter()
    }

    /// Every output name, in registration order of their source fields.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().flat_map(|e| e.output_names.iter().map(String::as_str))
    }

    #[must_use]
    pub fn contains_output(&self, name: &str) -> bool {
        self.outputs.contains(name)
    }

    /// Number of distinct source fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
