//! Format specifications: per-datatype validation and canonicalization of
//! cell literals into the lexical form of their RDF datatype.

mod boolean;
mod numeric;
mod temporal;

pub use boolean::BooleanFormat;
pub use numeric::NumericFormat;
pub use temporal::{TemporalFormat, TemporalKind};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::datatype::{DatatypeAnnotation, FormatFamily};
use crate::error::{FormatError, MetadataError};

pub trait FormatSpecification {
    /// Never fails: an unparseable literal is simply not valid.
    fn is_valid(&self, literal: &str) -> bool;

    /// Canonical lexical form of `literal`, or a [`FormatError`] when it
    /// does not conform.
    fn normalize(&self, literal: &str) -> Result<String, FormatError>;
}

/// A regular expression format, used for datatypes without a dedicated
/// format family. The whole literal has to match and normalization is the
/// identity.
#[derive(Debug, Clone)]
pub struct PatternFormat {
    source: String,
    regex: Regex,
}

impl PartialEq for PatternFormat {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl PatternFormat {
    pub fn new(pattern: &str) -> Result<Self, MetadataError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
            MetadataError::InvalidFormat(format!("invalid regular expression '{}': {}", pattern, e))
        })?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }
}

impl FormatSpecification for PatternFormat {
    fn is_valid(&self, literal: &str) -> bool {
        self.regex.is_match(literal)
    }

    fn normalize(&self, literal: &str) -> Result<String, FormatError> {
        if self.is_valid(literal) {
            Ok(literal.to_string())
        } else {
            Err(FormatError::new(
                literal,
                format!("a value matching '{}'", self.source),
            ))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Format {
    Boolean(BooleanFormat),
    Numeric(NumericFormat),
    Temporal(TemporalFormat),
    Pattern(PatternFormat),
}

impl Format {
    /// Build the format declared by a datatype description's `format`
    /// property. Numeric types accept either a pattern string or an object
    /// with `decimalChar`, `groupChar` and `pattern`; every other family
    /// takes a string.
    pub fn from_annotation(family: FormatFamily, format: &JsonValue) -> Result<Self, MetadataError> {
        match (family, format) {
            (FormatFamily::Numeric, JsonValue::String(pattern)) => {
                Ok(Format::Numeric(NumericFormat::from_pattern(pattern)?))
            }
            (FormatFamily::Numeric, JsonValue::Object(map)) => {
                let decimal_char = single_char(map.get("decimalChar"), "decimalChar")?.unwrap_or('.');
                let group_char = single_char(map.get("groupChar"), "groupChar")?;
                let pattern = match map.get("pattern") {
                    None | Some(JsonValue::Null) => None,
                    Some(JsonValue::String(p)) => Some(p.as_str()),
                    Some(_) => {
                        return Err(MetadataError::InvalidFormat(
                            "numeric format pattern must be a string".to_string(),
                        ))
                    }
                };
                Ok(Format::Numeric(NumericFormat::new(
                    decimal_char,
                    group_char,
                    pattern,
                )?))
            }
            (FormatFamily::Boolean, JsonValue::String(pattern)) => {
                Ok(Format::Boolean(BooleanFormat::new(pattern)?))
            }
            (FormatFamily::Date, JsonValue::String(pattern)) => Ok(Format::Temporal(
                TemporalFormat::new(TemporalKind::Date, pattern)?,
            )),
            (FormatFamily::Time, JsonValue::String(pattern)) => Ok(Format::Temporal(
                TemporalFormat::new(TemporalKind::Time, pattern)?,
            )),
            (FormatFamily::DateTime, JsonValue::String(pattern)) => Ok(Format::Temporal(
                TemporalFormat::new(TemporalKind::DateTime, pattern)?,
            )),
            (FormatFamily::Other, JsonValue::String(pattern)) => {
                Ok(Format::Pattern(PatternFormat::new(pattern)?))
            }
            (_, other) => Err(MetadataError::InvalidFormat(format!(
                "unsupported format value {}",
                other
            ))),
        }
    }

    /// The lexical check applied to a datatype when no format is declared.
    pub fn default_for(annotation: &DatatypeAnnotation) -> Option<&'static Self> {
        match annotation.family {
            FormatFamily::Boolean => Some(&*DEFAULT_BOOLEAN),
            FormatFamily::Numeric => Some(&*DEFAULT_NUMERIC),
            FormatFamily::Date => Some(&*DEFAULT_DATE),
            FormatFamily::Time => Some(&*DEFAULT_TIME),
            FormatFamily::DateTime => Some(&*DEFAULT_DATE_TIME),
            FormatFamily::Other => None,
        }
    }
}

static DEFAULT_BOOLEAN: Lazy<Format> = Lazy::new(|| Format::Boolean(BooleanFormat::xsd()));
static DEFAULT_NUMERIC: Lazy<Format> = Lazy::new(|| Format::Numeric(NumericFormat::generic()));
static DEFAULT_DATE: Lazy<Format> =
    Lazy::new(|| Format::Temporal(TemporalFormat::xsd(TemporalKind::Date)));
static DEFAULT_TIME: Lazy<Format> =
    Lazy::new(|| Format::Temporal(TemporalFormat::xsd(TemporalKind::Time)));
static DEFAULT_DATE_TIME: Lazy<Format> =
    Lazy::new(|| Format::Temporal(TemporalFormat::xsd(TemporalKind::DateTime)));

impl FormatSpecification for Format {
    fn is_valid(&self, literal: &str) -> bool {
        match self {
            Format::Boolean(f) => f.is_valid(literal),
            Format::Numeric(f) => f.is_valid(literal),
            Format::Temporal(f) => f.is_valid(literal),
            Format::Pattern(f) => f.is_valid(literal),
        }
    }

    fn normalize(&self, literal: &str) -> Result<String, FormatError> {
        match self {
            Format::Boolean(f) => f.normalize(literal),
            Format::Numeric(f) => f.normalize(literal),
            Format::Temporal(f) => f.normalize(literal),
            Format::Pattern(f) => f.normalize(literal),
        }
    }
}

fn single_char(value: Option<&JsonValue>, property: &str) -> Result<Option<char>, MetadataError> {
    match value {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::String(s)) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Some(c)),
                _ => Err(MetadataError::InvalidFormat(format!(
                    "{} must be a single character, found '{}'",
                    property, s
                ))),
            }
        }
        Some(other) => Err(MetadataError::InvalidFormat(format!(
            "{} must be a string, found {}",
            property, other
        ))),
    }
}
