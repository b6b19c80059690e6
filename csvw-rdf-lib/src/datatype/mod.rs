//! Registry of the CSVW built-in datatypes.
//!
//! Maps the base names usable in a `datatype` annotation to their RDF
//! datatype IRIs, and classifies each one for cell whitespace handling and
//! for picking a format specification family.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema#";
pub const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const CSVW_NS: &str = "http://www.w3.org/ns/csvw#";

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// How a cell's raw string is cleaned up before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhitespaceHandling {
    /// Line endings, tabs and leading/trailing whitespace are kept.
    Preserve,
    /// CR/LF/TAB become spaces, leading/trailing whitespace is kept.
    ReplaceControl,
    /// CR/LF/TAB become spaces, the value is trimmed and runs of
    /// whitespace collapse to a single space.
    Collapse,
}

/// Which format specification family parses a `format` annotation for the
/// datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatFamily {
    Boolean,
    Date,
    Time,
    DateTime,
    Numeric,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatatypeAnnotation {
    pub name: &'static str,
    pub iri: &'static str,
    pub family: FormatFamily,
}

impl DatatypeAnnotation {
    pub fn whitespace(&self) -> WhitespaceHandling {
        match self.name {
            "string" | "json" | "html" | "anyAtomicType" | "any" => WhitespaceHandling::Preserve,
            "normalizedString" => WhitespaceHandling::ReplaceControl,
            _ => WhitespaceHandling::Collapse,
        }
    }

    /// Whether list tokens keep their surrounding whitespace after splitting
    /// on the column separator.
    pub fn retains_list_token_whitespace(&self) -> bool {
        matches!(self.name, "string" | "anyAtomicType" | "any")
    }

    pub fn is_string(&self) -> bool {
        self.iri == XSD_STRING
    }

    /// True for the integer-valued XSD types derived from `xsd:decimal`.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.name,
            "integer"
                | "long"
                | "int"
                | "short"
                | "byte"
                | "nonNegativeInteger"
                | "positiveInteger"
                | "unsignedLong"
                | "unsignedInt"
                | "unsignedShort"
                | "unsignedByte"
                | "nonPositiveInteger"
                | "negativeInteger"
        )
    }
}

macro_rules! xsd {
    ($name:literal, $local:literal, $family:ident) => {
        DatatypeAnnotation {
            name: $name,
            iri: concat!("http://www.w3.org/2001/XMLSchema#", $local),
            family: FormatFamily::$family,
        }
    };
}

static DATATYPES: &[DatatypeAnnotation] = &[
    xsd!("anyAtomicType", "anyAtomicType", Other),
    xsd!("any", "anyAtomicType", Other),
    xsd!("anyURI", "anyURI", Other),
    xsd!("base64Binary", "base64Binary", Other),
    xsd!("binary", "base64Binary", Other),
    xsd!("hexBinary", "hexBinary", Other),
    xsd!("boolean", "boolean", Boolean),
    xsd!("date", "date", Date),
    xsd!("dateTime", "dateTime", DateTime),
    xsd!("datetime", "dateTime", DateTime),
    xsd!("dateTimeStamp", "dateTimeStamp", DateTime),
    xsd!("time", "time", Time),
    xsd!("decimal", "decimal", Numeric),
    xsd!("integer", "integer", Numeric),
    xsd!("long", "long", Numeric),
    xsd!("int", "int", Numeric),
    xsd!("short", "short", Numeric),
    xsd!("byte", "byte", Numeric),
    xsd!("nonNegativeInteger", "nonNegativeInteger", Numeric),
    xsd!("positiveInteger", "positiveInteger", Numeric),
    xsd!("unsignedLong", "unsignedLong", Numeric),
    xsd!("unsignedInt", "unsignedInt", Numeric),
    xsd!("unsignedShort", "unsignedShort", Numeric),
    xsd!("unsignedByte", "unsignedByte", Numeric),
    xsd!("nonPositiveInteger", "nonPositiveInteger", Numeric),
    xsd!("negativeInteger", "negativeInteger", Numeric),
    xsd!("double", "double", Numeric),
    xsd!("number", "double", Numeric),
    xsd!("float", "float", Numeric),
    xsd!("duration", "duration", Other),
    xsd!("dayTimeDuration", "dayTimeDuration", Other),
    xsd!("yearMonthDuration", "yearMonthDuration", Other),
    xsd!("gDay", "gDay", Other),
    xsd!("gMonth", "gMonth", Other),
    xsd!("gMonthDay", "gMonthDay", Other),
    xsd!("gYear", "gYear", Other),
    xsd!("gYearMonth", "gYearMonth", Other),
    xsd!("QName", "QName", Other),
    xsd!("string", "string", Other),
    xsd!("normalizedString", "normalizedString", Other),
    xsd!("token", "token", Other),
    xsd!("language", "language", Other),
    xsd!("Name", "Name", Other),
    xsd!("NMTOKEN", "NMTOKEN", Other),
    DatatypeAnnotation {
        name: "xml",
        iri: "http://www.w3.org/1999/02/22-rdf-syntax-ns#XMLLiteral",
        family: FormatFamily::Other,
    },
    DatatypeAnnotation {
        name: "html",
        iri: "http://www.w3.org/1999/02/22-rdf-syntax-ns#HTML",
        family: FormatFamily::Other,
    },
    DatatypeAnnotation {
        name: "json",
        iri: "http://www.w3.org/ns/csvw#JSON",
        family: FormatFamily::Other,
    },
];

static BY_NAME: Lazy<HashMap<&'static str, &'static DatatypeAnnotation>> =
    Lazy::new(|| DATATYPES.iter().map(|d| (d.name, d)).collect());

/// Look up a datatype by its CSVW base name (`"decimal"`, `"date"`, ...).
/// Absolute XSD IRIs are accepted as well.
pub fn lookup(base_name: &str) -> Option<&'static DatatypeAnnotation> {
    if let Some(annotation) = BY_NAME.get(base_name) {
        return Some(*annotation);
    }
    DATATYPES.iter().find(|d| d.iri == base_name)
}

pub fn string_annotation() -> &'static DatatypeAnnotation {
    BY_NAME["string"]
}

pub fn xsd(local_name: &str) -> String {
    format!("{}{}", XSD_NS, local_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        assert_eq!(lookup("number").unwrap().iri, xsd("double"));
        assert_eq!(lookup("datetime").unwrap().iri, xsd("dateTime"));
        assert_eq!(lookup("any").unwrap().iri, xsd("anyAtomicType"));
        assert_eq!(lookup("json").unwrap().iri, "http://www.w3.org/ns/csvw#JSON");
        assert!(lookup("colour").is_none());
    }

    #[test]
    fn test_lookup_by_iri() {
        let annotation = lookup("http://www.w3.org/2001/XMLSchema#gYear").unwrap();
        assert_eq!(annotation.name, "gYear");
    }

    #[test]
    fn test_whitespace_classification() {
        assert_eq!(
            lookup("string").unwrap().whitespace(),
            WhitespaceHandling::Preserve
        );
        assert_eq!(
            lookup("normalizedString").unwrap().whitespace(),
            WhitespaceHandling::ReplaceControl
        );
        assert_eq!(
            lookup("decimal").unwrap().whitespace(),
            WhitespaceHandling::Collapse
        );
        assert!(lookup("anyAtomicType").unwrap().retains_list_token_whitespace());
        assert!(!lookup("json").unwrap().retains_list_token_whitespace());
    }

    #[test]
    fn test_families() {
        assert_eq!(lookup("unsignedByte").unwrap().family, FormatFamily::Numeric);
        assert!(lookup("unsignedByte").unwrap().is_integer());
        assert_eq!(lookup("time").unwrap().family, FormatFamily::Time);
        assert!(lookup("string").unwrap().is_string());
    }
}
