//! Compiled functions invoked from many threads at once.

use anyhow::Result;
use ironprep::testing::*;
use ironprep::*;
use rayon::prelude::*;

#[test]
fn test_processor_state_is_per_call_under_parallel_use() -> Result<()> {
    let mut b = PipelineBuilder::<i64>::new();
    b.add_step(StepSpec::feature_with_state("n", |n, state| {
        state.insert("seen", n);
        Ok(n * 2)
    }))?
    .add_step(StepSpec::mapping_with_state(|mut m, state| {
        let seen = *state.require::<i64>("seen")?;
        m.insert("seen".into(), seen);
        Ok(m)
    }))?;
    let processor = b.compile();

    let outputs: Vec<FeatureMap<i64>> = (0..1_000i64)
        .into_par_iter()
        .map(|n| processor.process(&int_features([("n", n)])))
        .collect::<Result<_>>()?;

    for (n, out) in (0..1_000i64).zip(outputs) {
        assert_features_equal(&out, &int_features([("n", n * 2), ("seen", n)]));
    }
    Ok(())
}

#[test]
fn test_parser_and_filters_shared_across_threads() -> Result<()> {
    let mut stages = StageBuilders::new(RawFormat::Example);
    stages
        .parser
        .register_field("label", FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?;
    stages.filters.add_predicate(
        |f| Ok(f[names::LABEL_INDEX].data().as_int64().is_some_and(|l| l[0] % 2 == 0)),
        Phase::Parse,
    );
    let compiled = stages.compile();

    let records: Vec<Vec<u8>> = (0..200i64)
        .map(|l| Example::new().with_feature("label", vec![l]).to_bytes(WireEncoding::Json))
        .collect::<Result<_>>()?;

    let kept = records
        .par_iter()
        .map(|raw| compiled.process_record(None, raw))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .count();
    assert_eq!(kept, 100);
    Ok(())
}
