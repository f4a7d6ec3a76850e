//! Schema-driven record parsers.
//!
//! A parser builder accumulates a [`FeatureSchema`](crate::schema::FeatureSchema)
//! through [`RecordParserBuilder::register_field`] and compiles it into a
//! [`Parser`]: a function from the raw bytes of one record to a [`FeatureMap`].
//!
//! Output names should follow [`names`](crate::names) for each modality, so that
//! later steps can be shared between datasets that store the same modality
//! under different field names.
//!
//! ```
//! use ironprep::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut builder = FlatRecordParserBuilder::new();
//! builder
//!     .register_field("image/encoded", FieldType::var_len(DType::Bytes), Some(names::IMAGE))?
//!     .register_field("clip/label/index", FieldType::fixed_len([1], DType::Int64), Some(names::LABEL_INDEX))?;
//! let parser = builder.compile();
//!
//! let raw = Example::new()
//!     .with_feature("image/encoded", Feature::bytes(["jpeg-0", "jpeg-1"]))
//!     .with_feature("clip/label/index", vec![4i64])
//!     .to_bytes(WireEncoding::Json)?;
//! let features = parser.parse(&raw)?;
//! assert_eq!(features[names::LABEL_INDEX].data().as_int64(), Some(&[4i64][..]));
//! # Ok(())
//! # }
//! ```

mod decode;
mod flat;
mod grouped;

pub use flat::FlatRecordParserBuilder;
pub use grouped::GroupedRecordParserBuilder;

use crate::error::{BuilderError, ParseError};
use crate::features::FeatureMap;
use crate::phase::RawFormat;
use crate::record::WireEncoding;
use crate::schema::{FieldGroup, FieldType};
use crate::value::num_elements;
use std::fmt;
use std::sync::Arc;

/// Compiled parse function body.
pub type ParseFn = Arc<dyn Fn(&[u8]) -> Result<FeatureMap, ParseError> + Send + Sync>;

/// Common contract of the record parser builders.
pub trait RecordParserBuilder {
    /// Per-variant registration options (the group of a two-level record field).
    type Options: Default;

    /// Register `source_name` under `output_name` (defaults to `source_name`).
    ///
    /// # Errors
    ///
    /// - [`BuilderError::DuplicateOutputName`] if the output name is already used.
    /// - [`BuilderError::InconsistentFieldType`] if the source field was registered
    ///   with another type.
    /// - [`BuilderError::UnsupportedFieldType`] if the type cannot be stored where
    ///   the options place the field.
    ///
    /// A failed call leaves the builder unchanged.
    fn register_field_with(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
        options: Self::Options,
    ) -> Result<&mut Self, BuilderError>;

    /// [`register_field_with`](Self::register_field_with) using default options.
    fn register_field(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
    ) -> Result<&mut Self, BuilderError> {
        self.register_field_with(source_name, field_type, output_name, Self::Options::default())
    }

    /// Snapshot the schema into a parser.
    fn compile(&self) -> Parser;

    /// Every registered output name.
    fn output_names(&self) -> Vec<String>;
}

/// Compiled parser: raw record bytes in, feature map out.
#[derive(Clone)]
pub struct Parser {
    format: RawFormat,
    encoding: WireEncoding,
    output_names: Arc<[String]>,
    parse_fn: ParseFn,
}

impl Parser {
    pub(crate) fn new(format: RawFormat, encoding: WireEncoding, output_names: Vec<String>, parse_fn: ParseFn) -> Self {
        Self { format, encoding, output_names: output_names.into(), parse_fn }
    }

    pub fn parse(&self, raw: &[u8]) -> Result<FeatureMap, ParseError> {
        (self.parse_fn)(raw)
    }

    #[must_use]
    pub fn format(&self) -> RawFormat {
        self.format
    }

    #[must_use]
    pub fn encoding(&self) -> WireEncoding {
        self.encoding
    }

    /// Keys every successfully parsed map contains.
    #[must_use]
    pub fn output_names(&self) -> &[String] {
        &self.output_names
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("format", &self.format)
            .field("encoding", &self.encoding)
            .field("output_names", &self.output_names)
            .finish()
    }
}

/// Parser builder for either raw format, chosen at run time.
#[derive(Debug, Clone)]
pub enum AnyParserBuilder {
    Flat(FlatRecordParserBuilder),
    Grouped(GroupedRecordParserBuilder),
}

impl AnyParserBuilder {
    #[must_use]
    pub fn format(&self) -> RawFormat {
        match self {
            AnyParserBuilder::Flat(_) => RawFormat::Example,
            AnyParserBuilder::Grouped(_) => RawFormat::SequenceExample,
        }
    }

    #[must_use]
    pub fn with_encoding(self, encoding: WireEncoding) -> Self {
        match self {
            AnyParserBuilder::Flat(b) => AnyParserBuilder::Flat(b.with_encoding(encoding)),
            AnyParserBuilder::Grouped(b) => AnyParserBuilder::Grouped(b.with_encoding(encoding)),
        }
    }
}

impl RecordParserBuilder for AnyParserBuilder {
    /// `None` uses the variant's default; flat records accept no group.
    type Options = Option<FieldGroup>;

    fn register_field_with(
        &mut self,
        source_name: &str,
        field_type: FieldType,
        output_name: Option<&str>,
        options: Option<FieldGroup>,
    ) -> Result<&mut Self, BuilderError> {
        match (&mut *self, options) {
            (AnyParserBuilder::Flat(_), Some(group)) => {
                return Err(BuilderError::UnsupportedGroup {
                    key: source_name.to_string(),
                    group: group.to_string(),
                });
            }
            (AnyParserBuilder::Flat(b), None) => {
                b.register_field(source_name, field_type, output_name)?;
            }
            (AnyParserBuilder::Grouped(b), group) => {
                b.register_field_with(source_name, field_type, output_name, group.unwrap_or_default())?;
            }
        }
        Ok(self)
    }

    fn compile(&self) -> Parser {
        match self {
            AnyParserBuilder::Flat(b) => b.compile(),
            AnyParserBuilder::Grouped(b) => b.compile(),
        }
    }

    fn output_names(&self) -> Vec<String> {
        match self {
            AnyParserBuilder::Flat(b) => b.output_names(),
            AnyParserBuilder::Grouped(b) => b.output_names(),
        }
    }
}

impl From<FlatRecordParserBuilder> for AnyParserBuilder {
    fn from(b: FlatRecordParserBuilder) -> Self {
        AnyParserBuilder::Flat(b)
    }
}

impl From<GroupedRecordParserBuilder> for AnyParserBuilder {
    fn from(b: GroupedRecordParserBuilder) -> Self {
        AnyParserBuilder::Grouped(b)
    }
}

impl RawFormat {
    /// Empty parser builder for records of this format.
    #[must_use]
    pub fn parser_builder(self) -> AnyParserBuilder {
        match self {
            RawFormat::Example => FlatRecordParserBuilder::new().into(),
            RawFormat::SequenceExample => GroupedRecordParserBuilder::new().into(),
        }
    }
}

/// Reject field types that cannot be stored where `group` places them
/// (`None` for flat records).
pub(crate) fn validate_field_type(
    source_name: &str,
    field_type: &FieldType,
    group: Option<FieldGroup>,
) -> Result<(), BuilderError> {
    let unsupported = || BuilderError::UnsupportedFieldType {
        key: match group {
            Some(g) => format!("{source_name} ({g})"),
            None => source_name.to_string(),
        },
        field_type: field_type.to_string(),
    };
    match field_type {
        FieldType::FixedLen { .. } if group == Some(FieldGroup::Sequence) => Err(unsupported()),
        FieldType::FixedLen { shape, .. } | FieldType::FixedLenSequence { shape, .. }
            if num_elements(shape).is_none() =>
        {
            Err(unsupported())
        }
        FieldType::FixedLen { shape, dtype, default: Some(d) } => {
            let fits = d.len() == 1 || Some(d.len()) == num_elements(shape);
            if d.dtype() == *dtype && fits { Ok(()) } else { Err(unsupported()) }
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::DType;

    #[test]
    fn test_fixed_len_rejected_for_sequence_fields() {
        let ty = FieldType::fixed_len([1], DType::Int64);
        assert!(validate_field_type("f", &ty, Some(FieldGroup::Sequence)).is_err());
        assert!(validate_field_type("f", &ty, Some(FieldGroup::Context)).is_ok());
        assert!(validate_field_type("f", &ty, None).is_ok());
    }

    #[test]
    fn test_overflowing_shapes_rejected() {
        for ty in [
            FieldType::fixed_len([usize::MAX, 2], DType::Int64),
            FieldType::fixed_len([usize::MAX, 2], DType::Int64).with_default(vec![0i64]),
            FieldType::fixed_len_sequence([2, usize::MAX], DType::Float32),
        ] {
            assert!(matches!(
                validate_field_type("f", &ty, None),
                Err(BuilderError::UnsupportedFieldType { .. })
            ));
        }
        assert!(validate_field_type("f", &FieldType::fixed_len([0, usize::MAX], DType::Int64), None).is_ok());
    }

    #[test]
    fn test_default_must_match_type_and_shape() {
        let wrong_dtype = FieldType::fixed_len([2], DType::Int64).with_default(vec![0.0f32]);
        let wrong_len = FieldType::fixed_len([3], DType::Int64).with_default(vec![0i64, 1]);
        let scalar = FieldType::fixed_len([3], DType::Int64).with_default(vec![0i64]);
        assert!(validate_field_type("f", &wrong_dtype, None).is_err());
        assert!(validate_field_type("f", &wrong_len, None).is_err());
        assert!(validate_field_type("f", &scalar, None).is_ok());
    }

    #[test]
    fn test_any_builder_rejects_group_on_flat() {
        let mut b = RawFormat::Example.parser_builder();
        let err = b
            .register_field_with("f", FieldType::var_len(DType::Bytes), None, Some(FieldGroup::Context))
            .unwrap_err();
        assert!(matches!(err, BuilderError::UnsupportedGroup { .. }));
        assert!(b.output_names().is_empty());
    }

    #[test]
    fn test_any_builder_grouped_defaults_to_sequence() {
        let mut b = RawFormat::SequenceExample.parser_builder();
        b.register_field("frames", FieldType::fixed_len_sequence(Vec::new(), DType::Bytes), None).unwrap();
        assert_eq!(b.format(), RawFormat::SequenceExample);
        assert_eq!(b.compile().output_names(), &["frames".to_string()]);
    }
}
