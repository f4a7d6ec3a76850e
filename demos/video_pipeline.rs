//! Example wiring a video classification dataset through every stage.
//!
//! Registers the stored fields, samples a frame window, "decodes" frames,
//! drops clips by label and prints the step summaries before running a few
//! serialized records through the compiled chain.

use anyhow::Result;
use ironprep::*;

fn main() -> Result<()> {
    println!("=== Video classification stages ===\n");

    let mut stages = StageBuilders::new(RawFormat::SequenceExample);
    stages
        .parser
        .register_field("image/encoded", FieldType::fixed_len_sequence(Vec::new(), DType::Bytes), Some(names::IMAGE))?
        .register_field_with(
            "clip/label/index",
            FieldType::fixed_len([1], DType::Int64),
            Some(names::LABEL_INDEX),
            Some(FieldGroup::Context),
        )?;

    // Keep the first two frames and remember the window for later stages.
    stages.sampler.add_step(
        StepSpec::feature_with_state(names::IMAGE, |image: FeatureValue, state| {
            let frames = image.data().as_bytes().map(|b| b[..b.len().min(2)].to_vec()).unwrap_or_default();
            state.insert("num_frames", frames.len());
            Ok(Tensor::new(vec![frames.len()], frames.into()).map(FeatureValue::Dense).unwrap_or(image))
        })
        .named("sample_frames"),
    )?;

    // Stand-in decoder: replace each encoded frame by its byte length.
    stages.decoder.add_step(
        StepSpec::feature(names::IMAGE, |image: FeatureValue| {
            let sizes: Vec<i64> = image
                .data()
                .as_bytes()
                .unwrap_or_default()
                .iter()
                .map(|f| f.len() as i64)
                .collect();
            Ok(FeatureValue::from(sizes))
        })
        .named("decode_frames"),
    )?;

    stages.filters.add_predicate(
        |f| Ok(f[names::LABEL_INDEX].data().as_int64().is_some_and(|l| l[0] != 0)),
        Phase::Parse,
    );

    println!("=== Sampler ===\n{}", stages.sampler.summary());
    println!("=== Decoder ===\n{}", stages.decoder.summary());

    let compiled = stages.compile();
    for (key, label) in [("clip-0", 0i64), ("clip-1", 1), ("clip-2", 2)] {
        let raw = SequenceExample::new()
            .with_context("clip/label/index", vec![label])
            .with_feature_list("image/encoded", ["jpeg-a", "jpeg-bb", "jpeg-ccc"].map(|f| Feature::bytes([f])))
            .to_bytes(WireEncoding::Json)?;

        match compiled.process_record(Some(key), &raw)? {
            Some(features) => println!(
                "{key}: frames={:?} label={:?}",
                features[names::IMAGE].data().as_int64(),
                features[names::LABEL_INDEX].data().as_int64()
            ),
            None => println!("{key}: dropped"),
        }
    }
    Ok(())
}
