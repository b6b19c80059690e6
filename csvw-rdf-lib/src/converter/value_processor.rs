use oxrdf::Literal;

use crate::datatype::XSD_STRING;
use crate::error::CsvwError;
use crate::format::FormatSpecification;
use crate::metadata::DatatypeDescription;
use crate::rdf::RdfSink;

/// Canonical lexical form of `value` under `datatype`, after format,
/// integer range, length and value constraint checks.
pub(crate) fn canonical_value(value: &str, datatype: &DatatypeDescription) -> Result<String, CsvwError> {
    let annotation = datatype.annotation();
    let canonical = match datatype.effective_format() {
        Some(format) => format.normalize(value)?,
        None => value.to_string(),
    };

    if annotation.is_integer() || annotation.name == "decimal" {
        if matches!(canonical.as_str(), "NaN" | "INF" | "-INF") {
            return Err(CsvwError::Conversion(format!(
                "'{}' is not a valid {}",
                value, annotation.name
            )));
        }
    }
    if annotation.is_integer() {
        check_integer(annotation.name, &canonical)?;
    }

    if !datatype.length.is_empty() && !datatype.length.validate(&canonical) {
        return Err(CsvwError::Conversion(format!(
            "'{}' does not satisfy the length constraints of {}",
            value, annotation.name
        )));
    }
    if let Some(constraint) = datatype
        .value_constraints
        .iter()
        .find(|constraint| !constraint.validate(&canonical))
    {
        return Err(CsvwError::Conversion(format!(
            "'{}' does not satisfy {}",
            value,
            constraint.describe()
        )));
    }
    Ok(canonical)
}

fn check_integer(name: &str, canonical: &str) -> Result<(), CsvwError> {
    let invalid = || CsvwError::Conversion(format!("'{}' is not a valid {}", canonical, name));
    let digits = canonical.strip_prefix('-').unwrap_or(canonical);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let (min, max): (i128, i128) = match name {
        "byte" => (i8::MIN.into(), i8::MAX.into()),
        "short" => (i16::MIN.into(), i16::MAX.into()),
        "int" => (i32::MIN.into(), i32::MAX.into()),
        "long" => (i64::MIN.into(), i64::MAX.into()),
        "unsignedByte" => (0, u8::MAX.into()),
        "unsignedShort" => (0, u16::MAX.into()),
        "unsignedInt" => (0, u32::MAX.into()),
        "unsignedLong" => (0, u64::MAX.into()),
        "nonNegativeInteger" => (0, i128::MAX),
        "positiveInteger" => (1, i128::MAX),
        "nonPositiveInteger" => (i128::MIN, 0),
        "negativeInteger" => (i128::MIN, -1),
        _ => return Ok(()),
    };
    let value: i128 = canonical.parse().map_err(|_| invalid())?;
    if value < min || value > max {
        return Err(invalid());
    }
    Ok(())
}

/// Builds the literal for one cell value. Strings become language tagged
/// literals when a language applies, plain literals when string datatypes
/// are suppressed and `xsd:string` literals otherwise; every other datatype
/// yields a typed literal of the canonical form.
pub(crate) fn literal_for(
    sink: &mut dyn RdfSink,
    value: &str,
    datatype: Option<&DatatypeDescription>,
    language: Option<&str>,
    suppress_string_datatype: bool,
) -> Result<Literal, CsvwError> {
    let (canonical, iri) = match datatype {
        Some(datatype) => (canonical_value(value, datatype)?, datatype.iri()),
        None => (value.to_string(), XSD_STRING.to_string()),
    };

    if iri == XSD_STRING {
        if let Some(language) = language.filter(|l| *l != "und") {
            return sink.lang_literal_node(&canonical, language);
        }
        if suppress_string_datatype {
            return Ok(sink.literal_node(&canonical));
        }
    }
    sink.typed_literal_node(&canonical, &iri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::metadata::{ConstraintKind, Threshold, ValueConstraint};
    use crate::rdf::GraphSink;
    use serde_json::json;

    fn datatype(base: &str) -> DatatypeDescription {
        DatatypeDescription::from_base(base)
    }

    #[test]
    fn test_string_literals() {
        let mut sink = GraphSink::new();
        let literal = literal_for(&mut sink, "Andorra", None, Some("en"), false).unwrap();
        assert_eq!(literal.language(), Some("en"));

        let literal = literal_for(&mut sink, "Andorra", None, None, true).unwrap();
        assert_eq!(literal.datatype().as_str(), XSD_STRING);
        assert_eq!(literal.value(), "Andorra");
    }

    #[test]
    fn test_typed_literals_are_canonical() {
        let mut sink = GraphSink::new();
        let literal = literal_for(&mut sink, "042.50", Some(&datatype("decimal")), Some("en"), false).unwrap();
        assert_eq!(literal.value(), "42.50");
        assert_eq!(literal.datatype().as_str(), "http://www.w3.org/2001/XMLSchema#decimal");

        let mut date = datatype("date");
        date.format = Some(Format::from_annotation(date.annotation().family, &json!("dd/MM/yyyy")).unwrap());
        let literal = literal_for(&mut sink, "22/03/2015", Some(&date), None, false).unwrap();
        assert_eq!(literal.value(), "2015-03-22");
    }

    #[test]
    fn test_invalid_values() {
        assert!(canonical_value("abc", &datatype("decimal")).is_err());
        assert!(canonical_value("NaN", &datatype("decimal")).is_err());
        assert!(canonical_value("NaN", &datatype("double")).is_ok());
        assert!(canonical_value("1.5", &datatype("integer")).is_err());
        assert!(canonical_value("300", &datatype("byte")).is_err());
        assert!(canonical_value("-1", &datatype("nonNegativeInteger")).is_err());
        assert_eq!(canonical_value("+0127", &datatype("byte")).unwrap(), "127");
    }

    #[test]
    fn test_constraints() {
        let mut latitude = datatype("decimal");
        latitude.value_constraints.push(ValueConstraint {
            kind: ConstraintKind::Maximum,
            threshold: Threshold::Numeric(90.0),
        });
        assert!(canonical_value("42.5", &latitude).is_ok());
        assert!(canonical_value("90.5", &latitude).is_err());

        let mut code = datatype("string");
        code.length.length = Some(2);
        assert!(canonical_value("AD", &code).is_ok());
        assert!(canonical_value("AND", &code).is_err());
    }
}
