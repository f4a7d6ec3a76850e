use super::decode::{fan_out, parse_sequence, parse_single};
use super::{Parser, RecordParserBuilder, validate_field_type};
use crate::error::{BuilderError, ParseError};
use crate::features::FeatureMap;
use crate::phase::RawFormat;
use crate::record::{SequenceExample, WireEncoding};
use crate::schema::{FeatureSchema, FieldGroup, FieldType, GroupedKey};
use std::sync::Arc;
use tracing::debug;

/// Parser builder for two-level [`SequenceExample`] records.
///
/// Each field is registered in a [`FieldGroup`]: `Context` for values stored
/// once per record, `Sequence` (the default) for values stored once per step.
/// The same name may exist in both groups as two unrelated fields.
///
/// ```
/// use ironprep::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = GroupedRecordParserBuilder::new();
/// builder
///     .register_field("image/encoded", FieldType::fixed_len_sequence(Vec::new(), DType::Bytes), Some(names::IMAGE))?
///     .register_context_field("clip/label/index", FieldType::var_len(DType::Int64), Some(names::LABEL_INDEX))?;
///
/// let raw = SequenceExample::new()
///     .with_context("clip/label/index", vec![7i64])
///     .with_feature_list("image/encoded", [Feature::bytes(["f0"]), Feature::bytes(["f1"])])
///     .to_bytes(WireEncoding::Json)?;
/// let features = builder.compile().parse(&raw)?;
/// assert_eq!(features[names::IMAGE].as_dense().unwrap().shape(), &[2]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct GroupedRecordParserBuilder {
    schema: FeatureSchema<GroupedKey>,
    encoding: WireEncoding,
}

impl GroupedRecordParserBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: WireEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Register a field stored once per record.
    pub fn register_context_field(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
    ) -> Result<&mut Self, BuilderError> {
        self.register_field_with(source_name, field_type, output_name, FieldGroup::Context)
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema<GroupedKey> {
        &self.schema
    }
}

impl RecordParserBuilder for GroupedRecordParserBuilder {
    type Options = FieldGroup;

    fn register_field_with(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
        group: FieldGroup,
    ) -> Result<&mut Self, BuilderError> {
        validate_field_type(source_name, &field_type, Some(group))?;
        let output_name = output_name.unwrap_or(source_name).to_string();
        self.schema.register(GroupedKey::new(source_name, group), field_type, output_name)?;
        Ok(self)
    }

    fn compile(&self) -> Parser {
        let schema = Arc::new(self.schema.clone());
        let encoding = self.encoding;
        debug!(fields = schema.len(), %encoding, "compiled grouped record parser");
        Parser::new(
            RawFormat::SequenceExample,
            encoding,
            self.output_names(),
            Arc::new(move |raw: &[u8]| {
                let record: SequenceExample = encoding.decode(raw)?;
                parse_sequence_example(&schema, &record)
            }),
        )
    }

    fn output_names(&self) -> Vec<String> {
        self.schema.output_names().map(str::to_string).collect()
    }
}

fn parse_sequence_example(schema: &FeatureSchema<GroupedKey>, record: &SequenceExample) -> Result<FeatureMap, ParseError> {
    let mut out = FeatureMap::with_capacity(schema.len());
    for entry in schema.entries() {
        let GroupedKey { name, group } = entry.key();
        let value = match group {
            FieldGroup::Context => parse_single(name, record.context.get(name), entry.field_type())?,
            FieldGroup::Sequence => {
                parse_sequence(name, record.feature_lists.get(name).map(Vec::as_slice), entry.field_type())?
            }
        };
        fan_out(entry, value, &mut out);
    }
    Ok(out)
}
