//! Serialized record model.
//!
//! Records come in two layouts, matching [`RawFormat`](crate::RawFormat):
//!
//! - [`Example`]: one level of named [`Feature`] lists.
//! - [`SequenceExample`]: `context` features (one list per record) plus
//!   `feature_lists` (one list per sequence step).
//!
//! Both are plain serde types. [`WireEncoding`] picks the byte format the parsers
//! decode: JSON always, and `postcard` with the `binary-records` feature.

use crate::error::ParseError;
use crate::value::DType;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// A typed list of values stored under one field name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BytesList(Vec<Vec<u8>>),
    FloatList(Vec<f32>),
    Int64List(Vec<i64>),
}

impl Feature {
    pub fn bytes<I, B>(values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        Feature::BytesList(values.into_iter().map(|b| b.as_ref().to_vec()).collect())
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Feature::BytesList(_) => DType::Bytes,
            Feature::FloatList(_) => DType::Float32,
            Feature::Int64List(_) => DType::Int64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Feature::BytesList(v) => v.len(),
            Feature::FloatList(v) => v.len(),
            Feature::Int64List(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<f32>> for Feature {
    fn from(v: Vec<f32>) -> Self {
        Feature::FloatList(v)
    }
}

impl From<Vec<i64>> for Feature {
    fn from(v: Vec<i64>) -> Self {
        Feature::Int64List(v)
    }
}

impl From<Vec<Vec<u8>>> for Feature {
    fn from(v: Vec<Vec<u8>>) -> Self {
        Feature::BytesList(v)
    }
}

/// Single-level record.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub features: BTreeMap<String, Feature>,
}

impl Example {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_feature(mut self, name: impl Into<String>, feature: impl Into<Feature>) -> Self {
        self.features.insert(name.into(), feature.into());
        self
    }
}

/// Two-level record: per-record context and per-step feature lists.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceExample {
    pub context: BTreeMap<String, Feature>,
    pub feature_lists: BTreeMap<String, Vec<Feature>>,
}

impl SequenceExample {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context(mut self, name: impl Into<String>, feature: impl Into<Feature>) -> Self {
        self.context.insert(name.into(), feature.into());
        self
    }

    #[must_use]
    pub fn with_feature_list<I, F>(mut self, name: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Feature>,
    {
        self.feature_lists
            .insert(name.into(), steps.into_iter().map(Into::into).collect());
        self
    }
}

/// Byte format of serialized records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireEncoding {
    #[default]
    Json,
    #[cfg(feature = "binary-records")]
    Postcard,
}

impl WireEncoding {
    pub fn encode<T: Serialize>(self, record: &T) -> Result<Vec<u8>> {
        match self {
            WireEncoding::Json => serde_json::to_vec(record).context("encoding record as JSON"),
            #[cfg(feature = "binary-records")]
            WireEncoding::Postcard => postcard::to_allocvec(record).context("encoding record as postcard"),
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, ParseError> {
        match self {
            WireEncoding::Json => serde_json::from_slice(bytes).map_err(|e| ParseError::Malformed(e.to_string())),
            #[cfg(feature = "binary-records")]
            WireEncoding::Postcard => postcard::from_bytes(bytes).map_err(|e| ParseError::Malformed(e.to_string())),
        }
    }
}

impl Display for WireEncoding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WireEncoding::Json => f.write_str("json"),
            #[cfg(feature = "binary-records")]
            WireEncoding::Postcard => f.write_str("postcard"),
        }
    }
}

/// Serde record types that can travel as raw bytes.
pub trait Record: Serialize + DeserializeOwned {
    fn to_bytes(&self, encoding: WireEncoding) -> Result<Vec<u8>> {
        encoding.encode(self)
    }

    fn from_bytes(bytes: &[u8], encoding: WireEncoding) -> Result<Self, ParseError> {
        encoding.decode(bytes)
    }
}

impl Record for Example {}
impl Record for SequenceExample {}
