use super::decode::{fan_out, parse_single};
use super::{Parser, RecordParserBuilder, validate_field_type};
use crate::error::{BuilderError, ParseError};
use crate::features::FeatureMap;
use crate::phase::RawFormat;
use crate::record::{Example, WireEncoding};
use crate::schema::{FeatureSchema, FieldType};
use std::sync::Arc;
use tracing::debug;

/// Parser builder for single-level [`Example`] records.
///
/// The same source field may be registered several times with different output
/// names, always with the same [`FieldType`]; each output receives the parsed
/// value. This gives later stages independent views of one stored field.
#[derive(Debug, Clone, Default)]
pub struct FlatRecordParserBuilder {
    schema: FeatureSchema<String>,
    encoding: WireEncoding,
}

impl FlatRecordParserBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_encoding(mut self, encoding: WireEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    #[must_use]
    pub fn schema(&self) -> &FeatureSchema<String> {
        &self.schema
    }
}

impl RecordParserBuilder for FlatRecordParserBuilder {
    type Options = ();

    fn register_field_with(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
        _options: (),
    ) -> Result<&mut Self, BuilderError> {
        validate_field_type(source_name, &field_type, None)?;
        let output_name = output_name.unwrap_or(source_name).to_string();
        self.schema.register(source_name.to_string(), field_type, output_name)?;
        Ok(self)
    }

    fn compile(&self) -> Parser {
        let schema = Arc::new(self.schema.clone());
        let encoding = self.encoding;
        debug!(fields = schema.len(), %encoding, "compiled flat record parser");
        Parser::new(
            RawFormat::Example,
            encoding,
            self.output_names(),
            Arc::new(move |raw: &[u8]| {
                let record: Example = encoding.decode(raw)?;
                parse_example(&schema, &record)
            }),
        )
    }

    fn output_names(&self) -> Vec<String> {
        self.schema.output_names().map(str::to_string).collect()
    }
}

fn parse_example(schema: &FeatureSchema<String>, record: &Example) -> Result<FeatureMap, ParseError> {
    let mut out = FeatureMap::with_capacity(schema.len());
    for entry in schema.entries() {
        let name = entry.key();
        let value = parse_single(name, record.features.get(name), entry.field_type())?;
        fan_out(entry, value, &mut out);
    }
    Ok(out)
}
