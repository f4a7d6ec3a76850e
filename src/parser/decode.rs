//! Turning stored [`Feature`] lists into [`FeatureValue`]s according to a [`FieldType`].

use crate::error::ParseError;
use crate::features::FeatureMap;
use crate::record::Feature;
use crate::schema::{FieldType, SchemaEntry};
use crate::value::{DType, FeatureValue, SparseTensor, Tensor, TensorData, num_elements};
use std::sync::Arc;

/// Parse a field stored once per record (flat records and sequence context).
pub(crate) fn parse_single(name: &str, feature: Option<&Feature>, field_type: &FieldType) -> Result<FeatureValue, ParseError> {
    match field_type {
        FieldType::FixedLen { shape, dtype, default } => {
            let expected = elements(name, shape)?;
            let data = match (feature, default) {
                (Some(f), _) => {
                    check_dtype(name, *dtype, f)?;
                    check_len(name, expected, f.len(), || format!("{shape:?}"))?;
                    to_data(f)
                }
                (None, Some(d)) => d.broadcast(expected),
                (None, None) => return Err(ParseError::MissingFeature(name.to_string())),
            };
            dense(name, shape.clone(), data)
        }
        FieldType::VarLen { dtype } => {
            let Some(f) = feature else {
                return sparse(name, Vec::new(), TensorData::empty(*dtype), vec![0]);
            };
            check_dtype(name, *dtype, f)?;
            let indices = (0..f.len()).map(|i| vec![i]).collect();
            sparse(name, indices, to_data(f), vec![f.len()])
        }
        FieldType::FixedLenSequence { shape, dtype, allow_missing } => {
            let Some(f) = feature else {
                return missing_sequence(name, shape, *dtype, *allow_missing);
            };
            check_dtype(name, *dtype, f)?;
            let elem = elements(name, shape)?;
            let steps = match elem {
                0 if f.is_empty() => 0,
                0 => return Err(shape_mismatch(name, format!("{shape:?}"), f.len())),
                _ if f.len() % elem == 0 => f.len() / elem,
                _ => return Err(shape_mismatch(name, format!("a multiple of {elem}"), f.len())),
            };
            dense(name, with_leading(steps, shape), to_data(f))
        }
    }
}

/// Parse a field stored once per sequence step.
pub(crate) fn parse_sequence(name: &str, steps: Option<&[Feature]>, field_type: &FieldType) -> Result<FeatureValue, ParseError> {
    match field_type {
        FieldType::FixedLenSequence { shape, dtype, allow_missing } => {
            let Some(steps) = steps else {
                return missing_sequence(name, shape, *dtype, *allow_missing);
            };
            let elem = elements(name, shape)?;
            for f in steps {
                check_dtype(name, *dtype, f)?;
                check_len(name, elem, f.len(), || format!("{shape:?} per step"))?;
            }
            dense(name, with_leading(steps.len(), shape), concat(*dtype, steps))
        }
        FieldType::VarLen { dtype } => {
            let Some(steps) = steps else {
                return sparse(name, Vec::new(), TensorData::empty(*dtype), vec![0, 0]);
            };
            let mut indices = Vec::new();
            let mut widest = 0;
            for (t, f) in steps.iter().enumerate() {
                check_dtype(name, *dtype, f)?;
                indices.extend((0..f.len()).map(|i| vec![t, i]));
                widest = widest.max(f.len());
            }
            sparse(name, indices, concat(*dtype, steps), vec![steps.len(), widest])
        }
        FieldType::FixedLen { .. } => Err(ParseError::Malformed(format!(
            "`{name}`: fixed_len fields cannot be stored per sequence step"
        ))),
    }
}

/// Copy `value` into every output name of `entry`. Copies share storage until written.
pub(crate) fn fan_out<K>(entry: &SchemaEntry<K>, value: FeatureValue, out: &mut FeatureMap) {
    if let Some((last, rest)) = entry.output_names().split_last() {
        for name in rest {
            out.insert(name.clone(), value.clone());
        }
        out.insert(last.clone(), value);
    }
}

fn missing_sequence(name: &str, shape: &[usize], dtype: DType, allow_missing: bool) -> Result<FeatureValue, ParseError> {
    if !allow_missing {
        return Err(ParseError::MissingFeature(name.to_string()));
    }
    dense(name, with_leading(0, shape), TensorData::empty(dtype))
}

fn elements(name: &str, shape: &[usize]) -> Result<usize, ParseError> {
    num_elements(shape).ok_or_else(|| ParseError::Malformed(format!("`{name}`: shape {shape:?} is too large")))
}

fn with_leading(steps: usize, shape: &[usize]) -> Vec<usize> {
    std::iter::once(steps).chain(shape.iter().copied()).collect()
}

fn check_dtype(name: &str, expected: DType, f: &Feature) -> Result<(), ParseError> {
    if f.dtype() == expected {
        Ok(())
    } else {
        Err(ParseError::DTypeMismatch { name: name.to_string(), expected, found: f.dtype() })
    }
}

fn check_len(name: &str, expected: usize, found: usize, describe: impl FnOnce() -> String) -> Result<(), ParseError> {
    if expected == found {
        Ok(())
    } else {
        Err(shape_mismatch(name, describe(), found))
    }
}

fn shape_mismatch(name: &str, expected: String, found: usize) -> ParseError {
    ParseError::ShapeMismatch { name: name.to_string(), expected, found }
}

fn dense(name: &str, shape: Vec<usize>, data: TensorData) -> Result<FeatureValue, ParseError> {
    let found = data.len();
    let expected = format!("{shape:?}");
    Tensor::new(shape, data)
        .map(FeatureValue::Dense)
        .ok_or_else(|| shape_mismatch(name, expected, found))
}

fn sparse(name: &str, indices: Vec<Vec<usize>>, values: TensorData, dense_shape: Vec<usize>) -> Result<FeatureValue, ParseError> {
    let found = values.len();
    let expected = format!("{dense_shape:?}");
    SparseTensor::new(indices, values, dense_shape)
        .map(FeatureValue::Sparse)
        .ok_or_else(|| shape_mismatch(name, expected, found))
}

fn to_data(f: &Feature) -> TensorData {
    match f {
        Feature::BytesList(v) => TensorData::Bytes(Arc::new(v.clone())),
        Feature::FloatList(v) => TensorData::Float32(Arc::new(v.clone())),
        Feature::Int64List(v) => TensorData::Int64(Arc::new(v.clone())),
    }
}

// Callers check every step's dtype first; mismatched steps are skipped.
fn concat(dtype: DType, steps: &[Feature]) -> TensorData {
    let mut out = TensorData::empty(dtype);
    for f in steps {
        match (&mut out, f) {
            (TensorData::Bytes(v), Feature::BytesList(x)) => Arc::make_mut(v).extend_from_slice(x),
            (TensorData::Float32(v), Feature::FloatList(x)) => Arc::make_mut(v).extend_from_slice(x),
            (TensorData::Int64(v), Feature::Int64List(x)) => Arc::make_mut(v).extend_from_slice(x),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_len_default_broadcasts() {
        let ty = FieldType::fixed_len([3], DType::Int64).with_default(vec![-1i64]);
        let v = parse_single("label", None, &ty).unwrap();
        let t = v.as_dense().unwrap();
        assert_eq!(t.shape(), &[3]);
        assert_eq!(t.data().as_int64(), Some(&[-1i64, -1, -1][..]));
    }

    #[test]
    fn test_fixed_len_without_default_is_required() {
        let ty = FieldType::fixed_len([1], DType::Int64);
        assert_eq!(parse_single("label", None, &ty), Err(ParseError::MissingFeature("label".into())));
    }

    #[test]
    fn test_var_len_single_is_rank_one_sparse() {
        let f = Feature::FloatList(vec![0.1, 0.2, 0.3]);
        let v = parse_single("audio", Some(&f), &FieldType::var_len(DType::Float32)).unwrap();
        let s = v.as_sparse().unwrap();
        assert_eq!(s.dense_shape(), &[3]);
        assert_eq!(s.indices()[2], vec![2]);
    }

    #[test]
    fn test_sequence_var_len_is_ragged() {
        let steps = vec![Feature::Int64List(vec![1, 2, 3]), Feature::Int64List(vec![4])];
        let v = parse_sequence("tokens", Some(steps.as_slice()), &FieldType::var_len(DType::Int64)).unwrap();
        let s = v.as_sparse().unwrap();
        assert_eq!(s.dense_shape(), &[2, 3]);
        assert_eq!(s.indices(), &[vec![0, 0], vec![0, 1], vec![0, 2], vec![1, 0]]);
        assert_eq!(s.values().as_int64(), Some(&[1i64, 2, 3, 4][..]));
    }

    #[test]
    fn test_sequence_fixed_len_checks_each_step() {
        let ty = FieldType::fixed_len_sequence([2], DType::Float32);
        let good = vec![Feature::FloatList(vec![1.0, 2.0]), Feature::FloatList(vec![3.0, 4.0])];
        let v = parse_sequence("flow", Some(good.as_slice()), &ty).unwrap();
        assert_eq!(v.as_dense().unwrap().shape(), &[2, 2]);

        let bad = vec![Feature::FloatList(vec![1.0, 2.0]), Feature::FloatList(vec![3.0])];
        assert!(matches!(parse_sequence("flow", Some(bad.as_slice()), &ty), Err(ParseError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_dtype_mismatch_is_reported() {
        let f = Feature::Int64List(vec![1]);
        let err = parse_single("image", Some(&f), &FieldType::var_len(DType::Bytes)).unwrap_err();
        assert_eq!(
            err,
            ParseError::DTypeMismatch { name: "image".into(), expected: DType::Bytes, found: DType::Int64 }
        );
    }

    #[test]
    fn test_missing_sequence_allowed_is_empty() {
        let ty = FieldType::fixed_len_sequence([4], DType::Bytes).allow_missing();
        let v = parse_sequence("frames", None, &ty).unwrap();
        assert_eq!(v.as_dense().unwrap().shape(), &[0, 4]);
    }
}
