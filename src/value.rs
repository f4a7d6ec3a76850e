//! Tensor-like field values carried in a [`FeatureMap`](crate::FeatureMap).
//!
//! Parsed fields become either a dense [`Tensor`] or a [`SparseTensor`]. Both keep
//! their element buffer in an `Arc`, so cloning a value (which every compiled
//! function does when it copies its input mapping) never copies element data.
//! Mutation goes through the `*_mut` accessors on [`TensorData`], which use
//! `Arc::make_mut`: the first write to a shared buffer detaches it, so two feature
//! names fanned out from one source field never see each other's writes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::sync::Arc;

/// Element type of a tensor buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    /// Byte strings (encoded images, text, keys).
    Bytes,
    /// 32-bit floats.
    Float32,
    /// 64-bit signed integers.
    Int64,
}

impl Display for DType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            DType::Bytes => "bytes",
            DType::Float32 => "float32",
            DType::Int64 => "int64",
        };
        f.write_str(name)
    }
}

/// Flat, shared element buffer.
///
/// Float buffers compare bitwise, so a buffer holding NaN equals itself.
#[derive(Clone, Debug)]
pub enum TensorData {
    Bytes(Arc<Vec<Vec<u8>>>),
    Float32(Arc<Vec<f32>>),
    Int64(Arc<Vec<i64>>),
}

impl PartialEq for TensorData {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TensorData::Bytes(a), TensorData::Bytes(b)) => a == b,
            (TensorData::Float32(a), TensorData::Float32(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()))
            }
            (TensorData::Int64(a), TensorData::Int64(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TensorData {}

impl TensorData {
    /// Empty buffer of the given type.
    #[must_use]
    pub fn empty(dtype: DType) -> Self {
        match dtype {
            DType::Bytes => TensorData::Bytes(Arc::new(Vec::new())),
            DType::Float32 => TensorData::Float32(Arc::new(Vec::new())),
            DType::Int64 => TensorData::Int64(Arc::new(Vec::new())),
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            TensorData::Bytes(_) => DType::Bytes,
            TensorData::Float32(_) => DType::Float32,
            TensorData::Int64(_) => DType::Int64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TensorData::Bytes(v) => v.len(),
            TensorData::Float32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[Vec<u8>]> {
        match self {
            TensorData::Bytes(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float32(&self) -> Option<&[f32]> {
        match self {
            TensorData::Float32(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int64(&self) -> Option<&[i64]> {
        match self {
            TensorData::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable access to byte elements, detaching the buffer if it is shared.
    pub fn bytes_mut(&mut self) -> Option<&mut Vec<Vec<u8>>> {
        match self {
            TensorData::Bytes(v) => Some(Arc::make_mut(v)),
            _ => None,
        }
    }

    /// Mutable access to float elements, detaching the buffer if it is shared.
    pub fn float32_mut(&mut self) -> Option<&mut Vec<f32>> {
        match self {
            TensorData::Float32(v) => Some(Arc::make_mut(v)),
            _ => None,
        }
    }

    /// Mutable access to integer elements, detaching the buffer if it is shared.
    pub fn int64_mut(&mut self) -> Option<&mut Vec<i64>> {
        match self {
            TensorData::Int64(v) => Some(Arc::make_mut(v)),
            _ => None,
        }
    }

    /// Whether both buffers point at the same allocation.
    #[must_use]
    pub fn shares_storage_with(&self, other: &TensorData) -> bool {
        match (self, other) {
            (TensorData::Bytes(a), TensorData::Bytes(b)) => Arc::ptr_eq(a, b),
            (TensorData::Float32(a), TensorData::Float32(b)) => Arc::ptr_eq(a, b),
            (TensorData::Int64(a), TensorData::Int64(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Repeat a single-element buffer `n` times; other buffers are returned as-is.
    pub(crate) fn broadcast(&self, n: usize) -> TensorData {
        if self.len() != 1 || n == 1 {
            return self.clone();
        }
        match self {
            TensorData::Bytes(v) => TensorData::Bytes(Arc::new(vec![v[0].clone(); n])),
            TensorData::Float32(v) => TensorData::Float32(Arc::new(vec![v[0]; n])),
            TensorData::Int64(v) => TensorData::Int64(Arc::new(vec![v[0]; n])),
        }
    }
}

impl From<Vec<Vec<u8>>> for TensorData {
    fn from(v: Vec<Vec<u8>>) -> Self {
        TensorData::Bytes(Arc::new(v))
    }
}

impl From<Vec<f32>> for TensorData {
    fn from(v: Vec<f32>) -> Self {
        TensorData::Float32(Arc::new(v))
    }
}

impl From<Vec<i64>> for TensorData {
    fn from(v: Vec<i64>) -> Self {
        TensorData::Int64(Arc::new(v))
    }
}

/// Dense, row-major tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Build a tensor, returning `None` when `data` does not fill `shape` exactly.
    #[must_use]
    pub fn new(shape: Vec<usize>, data: TensorData) -> Option<Self> {
        (num_elements(&shape) == Some(data.len())).then_some(Self { shape, data })
    }

    /// Rank-0 tensor holding one element.
    #[must_use]
    pub fn scalar(data: impl Into<TensorData>) -> Option<Self> {
        Self::new(Vec::new(), data.into())
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Mutable element buffer. The shape is fixed, so element count must not change.
    pub fn data_mut(&mut self) -> &mut TensorData {
        &mut self.data
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[must_use]
    pub fn num_elements(&self) -> usize {
        self.data.len()
    }
}

/// Coordinate-list sparse tensor, as produced for variable-length fields.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseTensor {
    indices: Arc<Vec<Vec<usize>>>,
    values: TensorData,
    dense_shape: Vec<usize>,
}

impl SparseTensor {
    /// Build a sparse tensor. Every index must have the rank of `dense_shape`
    /// and there must be exactly one index per value.
    #[must_use]
    pub fn new(indices: Vec<Vec<usize>>, values: TensorData, dense_shape: Vec<usize>) -> Option<Self> {
        let rank = dense_shape.len();
        let in_bounds = indices
            .iter()
            .all(|ix| ix.len() == rank && ix.iter().zip(&dense_shape).all(|(i, d)| i < d));
        (indices.len() == values.len() && in_bounds).then(|| Self {
            indices: Arc::new(indices),
            values,
            dense_shape,
        })
    }

    #[must_use]
    pub fn indices(&self) -> &[Vec<usize>] {
        &self.indices
    }

    #[must_use]
    pub fn values(&self) -> &TensorData {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut TensorData {
        &mut self.values
    }

    #[must_use]
    pub fn dense_shape(&self) -> &[usize] {
        &self.dense_shape
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }
}

/// A single field value: dense or sparse.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    Dense(Tensor),
    Sparse(SparseTensor),
}

impl FeatureValue {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            FeatureValue::Dense(t) => t.dtype(),
            FeatureValue::Sparse(s) => s.dtype(),
        }
    }

    #[must_use]
    pub fn as_dense(&self) -> Option<&Tensor> {
        match self {
            FeatureValue::Dense(t) => Some(t),
            FeatureValue::Sparse(_) => None,
        }
    }

    #[must_use]
    pub fn as_sparse(&self) -> Option<&SparseTensor> {
        match self {
            FeatureValue::Sparse(s) => Some(s),
            FeatureValue::Dense(_) => None,
        }
    }

    /// Element buffer of either representation.
    #[must_use]
    pub fn data(&self) -> &TensorData {
        match self {
            FeatureValue::Dense(t) => t.data(),
            FeatureValue::Sparse(s) => s.values(),
        }
    }

    pub fn data_mut(&mut self) -> &mut TensorData {
        match self {
            FeatureValue::Dense(t) => t.data_mut(),
            FeatureValue::Sparse(s) => s.values_mut(),
        }
    }

    #[must_use]
    pub fn shares_storage_with(&self, other: &FeatureValue) -> bool {
        self.data().shares_storage_with(other.data())
    }
}

impl From<Tensor> for FeatureValue {
    fn from(t: Tensor) -> Self {
        FeatureValue::Dense(t)
    }
}

impl From<SparseTensor> for FeatureValue {
    fn from(s: SparseTensor) -> Self {
        FeatureValue::Sparse(s)
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        FeatureValue::Dense(Tensor { shape: Vec::new(), data: vec![v].into() })
    }
}

impl From<f32> for FeatureValue {
    fn from(v: f32) -> Self {
        FeatureValue::Dense(Tensor { shape: Vec::new(), data: vec![v].into() })
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Dense(Tensor { shape: Vec::new(), data: vec![v.as_bytes().to_vec()].into() })
    }
}

impl From<Vec<i64>> for FeatureValue {
    fn from(v: Vec<i64>) -> Self {
        FeatureValue::Dense(Tensor { shape: vec![v.len()], data: v.into() })
    }
}

impl From<Vec<f32>> for FeatureValue {
    fn from(v: Vec<f32>) -> Self {
        FeatureValue::Dense(Tensor { shape: vec![v.len()], data: v.into() })
    }
}

/// Element count of `shape`, or `None` if it does not fit in a `usize`.
pub(crate) fn num_elements(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |n, &d| n.checked_mul(d))
}
