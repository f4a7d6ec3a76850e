//! Tests for the schema-driven record parsers.

use anyhow::Result;
use ironprep::testing::*;
use ironprep::*;

fn int_list() -> FieldType {
    FieldType::var_len(DType::Int64)
}

#[test]
fn test_duplicate_output_name_rejected() {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("a", int_list(), Some("x")).unwrap();

    let same_source = b.register_field("a", int_list(), Some("x")).unwrap_err();
    let other_source = b.register_field("b", int_list(), Some("x")).unwrap_err();
    let defaulted = b.register_field("x", int_list(), None).unwrap_err();

    for err in [same_source, other_source, defaulted] {
        assert_eq!(err, BuilderError::DuplicateOutputName("x".into()));
    }
    assert_eq!(b.output_names(), vec!["x"]);
}

#[test]
fn test_inconsistent_field_type_rejected() {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("a", int_list(), None).unwrap();
    let err = b
        .register_field("a", FieldType::var_len(DType::Float32), Some("a_float"))
        .unwrap_err();
    assert_eq!(
        err,
        BuilderError::InconsistentFieldType {
            key: "a".into(),
            existing: "var_len(int64)".into(),
            given: "var_len(float32)".into(),
        }
    );
    assert_eq!(b.output_names(), vec!["a"]);
}

#[test]
fn test_fan_out_yields_equal_values() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("a", int_list(), Some("x"))?
        .register_field("a", int_list(), Some("y"))?;
    assert_eq!(b.schema().len(), 1);

    let raw = Example::new().with_feature("a", vec![1i64, 2, 3]).to_bytes(WireEncoding::Json)?;
    let out = b.compile().parse(&raw)?;
    assert_has_features(&out, &["x", "y"]);
    assert_eq!(out["x"], out["y"]);
    Ok(())
}

#[test]
fn test_nan_default_fans_out() -> Result<()> {
    let nan_default = || FieldType::fixed_len([2], DType::Float32).with_default(vec![f32::NAN]);
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("score", nan_default(), Some("x"))?
        .register_field("score", nan_default(), Some("y"))?;
    assert_eq!(b.schema().len(), 1);

    let out = b.compile().parse(&Example::new().to_bytes(WireEncoding::Json)?)?;
    assert_eq!(out["x"], out["y"]);
    assert!(out["x"].data().as_float32().is_some_and(|v| v.iter().all(|f| f.is_nan())));
    Ok(())
}

#[test]
fn test_overflowing_shape_rejected_at_registration() {
    let mut flat = FlatRecordParserBuilder::new();
    let err = flat
        .register_field("a", FieldType::fixed_len([usize::MAX, 2], DType::Int64), None)
        .unwrap_err();
    assert!(matches!(err, BuilderError::UnsupportedFieldType { .. }));
    assert!(flat.output_names().is_empty());

    let mut grouped = GroupedRecordParserBuilder::new();
    let err = grouped
        .register_field("frames", FieldType::fixed_len_sequence([usize::MAX, 2], DType::Float32), None)
        .unwrap_err();
    assert!(matches!(err, BuilderError::UnsupportedFieldType { .. }));
    assert!(grouped.output_names().is_empty());
}

#[test]
fn test_fan_out_outputs_do_not_alias() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("tokens", int_list(), Some(names::TEXT_INDICES))?
        .register_field("tokens", int_list(), Some("tokens_copy"))?;

    let raw = Example::new().with_feature("tokens", vec![5i64, 6]).to_bytes(WireEncoding::Json)?;
    let mut out = b.compile().parse(&raw)?;
    assert!(out[names::TEXT_INDICES].shares_storage_with(&out["tokens_copy"]));

    let mut edited = out.remove("tokens_copy").expect("fanned out");
    if let Some(values) = edited.data_mut().int64_mut() {
        values[0] = -1;
    }
    assert_eq!(edited.data().as_int64(), Some(&[-1i64, 6][..]));
    assert_eq!(out[names::TEXT_INDICES].data().as_int64(), Some(&[5i64, 6][..]));
    assert!(!out[names::TEXT_INDICES].shares_storage_with(&edited));
    Ok(())
}

#[test]
fn test_flat_fixture_parses_to_well_known_names() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field(fields::IMAGE, FieldType::var_len(DType::Bytes), Some(names::IMAGE))?
        .register_field(fields::LABEL, FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?
        .register_field(fields::LABEL_NAME, FieldType::fixed_len(Vec::new(), DType::Bytes), Some(names::LABEL_NAME))?;

    let parser = b.compile();
    assert_eq!(parser.format(), RawFormat::Example);
    let out = parser.parse(&sample_image_example().to_bytes(WireEncoding::Json)?)?;

    assert_eq!(out.len(), 3);
    assert_eq!(out[names::LABEL_INDEX].data().as_int64(), Some(&[3i64][..]));
    let label_name = out[names::LABEL_NAME].as_dense().expect("dense");
    assert!(label_name.shape().is_empty());
    assert_eq!(label_name.data().as_bytes(), Some(&[b"cat".to_vec()][..]));
    Ok(())
}

#[test]
fn test_missing_fields() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("required", FieldType::fixed_len([1], DType::Int64), None)?;
    let raw = Example::new().to_bytes(WireEncoding::Json)?;
    assert_eq!(b.compile().parse(&raw), Err(ParseError::MissingFeature("required".into())));

    let mut b = FlatRecordParserBuilder::new();
    b.register_field("optional", FieldType::fixed_len([2], DType::Float32).with_default(vec![0.5f32]), None)?
        .register_field("ragged", FieldType::var_len(DType::Bytes), None)?;
    let out = b.compile().parse(&raw)?;
    assert_eq!(out["optional"].data().as_float32(), Some(&[0.5f32, 0.5][..]));
    assert_eq!(out["ragged"].as_sparse().expect("sparse").dense_shape(), &[0]);
    Ok(())
}

#[test]
fn test_grouped_fixture() -> Result<()> {
    let mut b = GroupedRecordParserBuilder::new();
    b.register_field(fields::IMAGE, FieldType::fixed_len_sequence(Vec::new(), DType::Bytes), Some(names::IMAGE))?
        .register_field(fields::AUDIO, FieldType::fixed_len_sequence([3], DType::Float32), Some(names::AUDIO))?
        .register_context_field(fields::LABEL, FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?
        .register_context_field(fields::LABEL_NAME, FieldType::var_len(DType::Bytes), Some(names::LABEL_NAME))?;

    let parser = b.compile();
    assert_eq!(parser.format(), RawFormat::SequenceExample);
    let out = parser.parse(&sample_video_sequence().to_bytes(WireEncoding::Json)?)?;

    assert_eq!(out[names::IMAGE].as_dense().expect("dense").shape(), &[4]);
    assert_eq!(out[names::AUDIO].as_dense().expect("dense").shape(), &[2, 3]);
    assert_eq!(out[names::LABEL_INDEX].data().as_int64(), Some(&[1i64][..]));
    assert_eq!(out[names::LABEL_NAME].as_sparse().expect("sparse").dense_shape(), &[1]);
    Ok(())
}

#[test]
fn test_grouped_fan_out_yields_equal_values() -> Result<()> {
    let mut b = GroupedRecordParserBuilder::new();
    b.register_context_field(fields::LABEL, FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?
        .register_context_field(fields::LABEL, FieldType::fixed_len([1], DType::Int64), Some("clip_label"))?
        .register_field(fields::AUDIO, FieldType::fixed_len_sequence([3], DType::Float32), Some(names::AUDIO))?
        .register_field(fields::AUDIO, FieldType::fixed_len_sequence([3], DType::Float32), Some("waveform"))?;
    assert_eq!(b.schema().len(), 2);

    let out = b.compile().parse(&sample_video_sequence().to_bytes(WireEncoding::Json)?)?;
    assert_has_features(&out, &[names::LABEL_INDEX, "clip_label", names::AUDIO, "waveform"]);
    assert_eq!(out[names::LABEL_INDEX], out["clip_label"]);
    assert_eq!(out[names::AUDIO], out["waveform"]);
    assert_eq!(out["waveform"].as_dense().expect("dense").shape(), &[2, 3]);
    Ok(())
}

#[test]
fn test_grouped_type_consistency_is_per_group() -> Result<()> {
    let mut b = GroupedRecordParserBuilder::new();
    b.register_context_field("label", int_list(), Some("context_label"))?
        .register_field("label", FieldType::var_len(DType::Bytes), Some("step_label"))?;

    let err = b
        .register_context_field("label", FieldType::var_len(DType::Bytes), Some("other"))
        .unwrap_err();
    assert!(matches!(err, BuilderError::InconsistentFieldType { .. }));

    let err = b.register_field("other_field", int_list(), Some("context_label")).unwrap_err();
    assert_eq!(err, BuilderError::DuplicateOutputName("context_label".into()));
    Ok(())
}

#[test]
fn test_missing_sequence_fields() -> Result<()> {
    let mut b = GroupedRecordParserBuilder::new();
    b.register_field("flow", FieldType::fixed_len_sequence([2], DType::Float32).allow_missing(), Some(names::FLOW))?
        .register_field("tokens", int_list(), None)?;
    let out = b.compile().parse(&SequenceExample::new().to_bytes(WireEncoding::Json)?)?;
    assert_eq!(out[names::FLOW].as_dense().expect("dense").shape(), &[0, 2]);
    assert_eq!(out["tokens"].as_sparse().expect("sparse").dense_shape(), &[0, 0]);

    let mut strict = GroupedRecordParserBuilder::new();
    strict.register_field("flow", FieldType::fixed_len_sequence([2], DType::Float32), None)?;
    let err = strict.compile().parse(&SequenceExample::new().to_bytes(WireEncoding::Json)?);
    assert_eq!(err, Err(ParseError::MissingFeature("flow".into())));
    Ok(())
}

#[test]
fn test_malformed_and_mistyped_records() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("image", FieldType::var_len(DType::Bytes), None)?;
    let parser = b.compile();

    assert!(matches!(parser.parse(b"{not json"), Err(ParseError::Malformed(_))));

    let raw = Example::new().with_feature("image", vec![1.0f32]).to_bytes(WireEncoding::Json)?;
    assert_eq!(
        parser.parse(&raw),
        Err(ParseError::DTypeMismatch { name: "image".into(), expected: DType::Bytes, found: DType::Float32 })
    );
    Ok(())
}

#[cfg(feature = "binary-records")]
#[test]
fn test_postcard_encoding() -> Result<()> {
    let mut b = RawFormat::SequenceExample.parser_builder().with_encoding(WireEncoding::Postcard);
    b.register_field_with(fields::LABEL, FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX), Some(FieldGroup::Context))?;

    let parser = b.compile();
    assert_eq!(parser.encoding(), WireEncoding::Postcard);
    let out = parser.parse(&sample_video_sequence().to_bytes(WireEncoding::Postcard)?)?;
    assert_eq!(out[names::LABEL_INDEX].data().as_int64(), Some(&[1i64][..]));
    Ok(())
}

#[test]
fn test_compiled_parser_is_a_snapshot() -> Result<()> {
    let mut b = FlatRecordParserBuilder::new();
    b.register_field("a", int_list(), None)?;
    let parser = b.compile();
    b.register_field("b", int_list(), None)?;

    assert_eq!(parser.output_names(), &["a".to_string()]);
    let raw = Example::new().with_feature("a", vec![1i64]).to_bytes(WireEncoding::Json)?;
    assert!(!parser.parse(&raw)?.contains_key("b"));
    Ok(())
}
