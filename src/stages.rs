//! One bundle of builders per dataset, compiled into the per-record call chain.
//!
//! [`StageBuilders`] owns a parser builder, the four role builders and a filter
//! builder. [`CompiledStages`] runs them on a single record in the order
//!
//! ```text
//! read filter -> parse -> parse filter -> sample -> sample filter
//!   -> decode -> decode filter -> preprocess -> preprocess filter
//! ```
//!
//! and [`CompiledStages::postprocess_batch`] runs the batched tail. Iterating a
//! dataset, batching records and storing them are left to the caller.

use crate::features::{FeatureMap, names};
use crate::filter::{FilterBuilder, FilterFn};
use crate::parser::{AnyParserBuilder, Parser, RecordParserBuilder};
use crate::phase::{Phase, RawFormat};
use crate::processor::{
    DecoderBuilder, PostprocessorBuilder, PreprocessorBuilder, Processor, SamplerBuilder,
};
use crate::value::FeatureValue;
use anyhow::Result;
use std::fmt;
use tracing::{debug, trace};

/// Every builder a dataset needs, mutable until [`compile`](Self::compile).
#[derive(Debug)]
pub struct StageBuilders {
    pub parser: AnyParserBuilder,
    pub sampler: SamplerBuilder,
    pub decoder: DecoderBuilder,
    pub preprocessor: PreprocessorBuilder,
    pub postprocessor: PostprocessorBuilder,
    pub filters: FilterBuilder,
}

impl StageBuilders {
    /// Empty builders for records of `format`.
    #[must_use]
    pub fn new(format: RawFormat) -> Self {
        Self::with_parser(format.parser_builder())
    }

    #[must_use]
    pub fn with_parser(parser: impl Into<AnyParserBuilder>) -> Self {
        Self {
            parser: parser.into(),
            sampler: SamplerBuilder::new(),
            decoder: DecoderBuilder::new(),
            preprocessor: PreprocessorBuilder::new(),
            postprocessor: PostprocessorBuilder::new(),
            filters: FilterBuilder::new(),
        }
    }

    #[must_use]
    pub fn compile(&self) -> CompiledStages {
        let compiled = CompiledStages {
            parser: self.parser.compile(),
            sample: self.sampler.compile(),
            decode: self.decoder.compile(),
            preprocess: self.preprocessor.compile(),
            postprocess: self.postprocessor.compile(),
            filters: Phase::ALL.map(|phase| self.filters.compile(phase)),
        };
        debug!(
            format = ?compiled.parser.format(),
            outputs = compiled.parser.output_names().len(),
            steps = compiled.step_count(),
            "compiled stages"
        );
        compiled
    }
}

/// Immutable, shareable form of [`StageBuilders`].
#[derive(Clone)]
pub struct CompiledStages {
    parser: Parser,
    sample: Processor,
    decode: Processor,
    preprocess: Processor,
    postprocess: Processor,
    filters: [FilterFn; 6],
}

impl CompiledStages {
    /// Run one serialized record up to and including the preprocess filter.
    ///
    /// `key` identifies the record: the read filter sees it as the only feature,
    /// and parsing adds it under [`names::KEY`] unless the schema already
    /// produced that feature. Returns `Ok(None)` once any filter rejects.
    pub fn process_record(&self, key: Option<&str>, raw: &[u8]) -> Result<Option<FeatureMap>> {
        let mut read = FeatureMap::new();
        if let Some(key) = key {
            read.insert(names::KEY.to_string(), FeatureValue::from(key));
        }
        if !self.passes(Phase::Read, &read)? {
            return Ok(None);
        }

        let mut features = self.parser.parse(raw)?;
        if let Some(key) = read.remove(names::KEY) {
            features.entry(names::KEY.to_string()).or_insert(key);
        }
        if !self.passes(Phase::Parse, &features)? {
            return Ok(None);
        }

        for (processor, phase) in [
            (&self.sample, Phase::Sample),
            (&self.decode, Phase::Decode),
            (&self.preprocess, Phase::Preprocess),
        ] {
            features = processor.process_owned(features)?;
            if !self.passes(phase, &features)? {
                return Ok(None);
            }
        }
        Ok(Some(features))
    }

    /// Postprocess one batched feature map, then apply the postprocess filter.
    pub fn postprocess_batch(&self, batch: FeatureMap) -> Result<Option<FeatureMap>> {
        let batch = self.postprocess.process_owned(batch)?;
        Ok(self.passes(Phase::Postprocess, &batch)?.then_some(batch))
    }

    #[must_use]
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// Compiled processor of a transform phase; `None` for read and parse.
    #[must_use]
    pub fn processor(&self, phase: Phase) -> Option<&Processor> {
        match phase {
            Phase::Read | Phase::Parse => None,
            Phase::Sample => Some(&self.sample),
            Phase::Decode => Some(&self.decode),
            Phase::Preprocess => Some(&self.preprocess),
            Phase::Postprocess => Some(&self.postprocess),
        }
    }

    #[must_use]
    pub fn filter(&self, phase: Phase) -> &FilterFn {
        &self.filters[phase.index()]
    }

    fn passes(&self, phase: Phase, features: &FeatureMap) -> Result<bool> {
        let keep = self.filter(phase).keep(features)?;
        if !keep {
            trace!(%phase, "record dropped");
        }
        Ok(keep)
    }

    fn step_count(&self) -> usize {
        self.sample.len() + self.decode.len() + self.preprocess.len() + self.postprocess.len()
    }
}

impl fmt::Debug for CompiledStages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledStages")
            .field("parser", &self.parser)
            .field("sample", &self.sample)
            .field("decode", &self.decode)
            .field("preprocess", &self.preprocess)
            .field("postprocess", &self.postprocess)
            .finish_non_exhaustive()
    }
}
