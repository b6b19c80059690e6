use once_cell::sync::Lazy;
use std::collections::HashMap;

/// How a metadata property is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertyKind {
    /// Value must be an array of values or objects.
    Array,
    /// A link resolved against the base URL.
    Link,
    /// An inline object or a URL of a JSON document to load in its place.
    Object,
    /// A string, array of strings or language map.
    NaturalLanguage,
    /// Kept as is.
    Atomic,
    /// A URI template string.
    UriTemplate,
    /// A prefixed or absolute IRI outside the CSVW vocabulary.
    Common,
}

static PROPERTY_KINDS: Lazy<HashMap<&'static str, PropertyKind>> = Lazy::new(|| {
    use PropertyKind::*;
    let table: &[(&[&str], PropertyKind)] = &[
        (
            &[
                "tables",
                "transformations",
                "notes",
                "foreignKeys",
                "columns",
                "lineTerminators",
            ],
            Array,
        ),
        (
            &[
                "url",
                "targetFormat",
                "scriptFormat",
                "@id",
                "resource",
                "schemaReference",
            ],
            Link,
        ),
        (&["aboutUrl", "propertyUrl", "valueUrl"], UriTemplate),
        (&["reference", "tableSchema", "dialect"], Object),
        (&["titles"], NaturalLanguage),
        (
            &[
                "source",
                "@type",
                "@language",
                "@base",
                "null",
                "lang",
                "textDirection",
                "separator",
                "ordered",
                "default",
                "datatype",
                "required",
                "base",
                "format",
                "length",
                "minLength",
                "maxLength",
                "minimum",
                "maximum",
                "minInclusive",
                "maxInclusive",
                "minExclusive",
                "maxExclusive",
                "decimalChar",
                "groupChar",
                "pattern",
                "tableDirection",
                "suppressOutput",
                "commentPrefix",
                "doubleQuote",
                "delimiter",
                "encoding",
                "header",
                "headerRowCount",
                "quoteChar",
                "skipBlankRows",
                "skipColumns",
                "skipInitialSpace",
                "skipRows",
                "trim",
                "name",
                "virtual",
                "columnReference",
                "primaryKey",
                "rowTitles",
            ],
            Atomic,
        ),
    ];
    table
        .iter()
        .flat_map(|(names, kind)| names.iter().map(move |name| (*name, *kind)))
        .collect()
});

/// Prefixed (`dc:title`) or absolute (`http://...`) property names.
pub(crate) fn is_common_property(name: &str) -> bool {
    !name.starts_with('@') && name.contains(':')
}

pub(crate) fn classify(name: &str) -> Option<PropertyKind> {
    if let Some(kind) = PROPERTY_KINDS.get(name) {
        return Some(*kind);
    }
    is_common_property(name).then_some(PropertyKind::Common)
}
