//! In-memory model of a CSVW metadata document.
//!
//! `TableGroup` owns its `Table`s, a table owns its `Schema` and a schema its
//! `ColumnDescription`s. There are no back-references: inherited properties
//! are resolved through a [`PropertyChain`] built from the path to a node.

mod context;
mod dialect;
mod inherited;

pub use context::{csvw_context, CsvwContext, CSVW_CONTEXT_IRI};
pub use dialect::{Dialect, Trim};
pub(crate) use dialect::DIALECT_KEYS;
pub use inherited::{resolve, InheritedProperties, PropertyChain};

use serde_json::{Map, Value as JsonValue};
use url::Url;

use crate::datatype::{self, DatatypeAnnotation};
use crate::format::Format;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageTaggedString {
    pub value: String,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableGroup {
    pub id: Option<Url>,
    pub tables: Vec<Table>,
    pub dialect: Option<Dialect>,
    pub inherited: InheritedProperties,
    pub common_properties: Map<String, JsonValue>,
    pub notes: Vec<JsonValue>,
}

impl TableGroup {
    /// A group with one table and nothing else, used when a CSV file has no
    /// metadata of its own.
    pub fn for_table_url(url: Url) -> Self {
        Self {
            tables: vec![Table::new(url)],
            ..Default::default()
        }
    }

    pub fn chain(&self) -> PropertyChain<'_> {
        PropertyChain::new(vec![&self.inherited])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub id: Option<Url>,
    pub url: Url,
    pub schema: Option<Schema>,
    /// Effective dialect: the table's own, else the group's, else defaults.
    pub dialect: Dialect,
    pub suppress_output: bool,
    pub inherited: InheritedProperties,
    pub common_properties: Map<String, JsonValue>,
    pub notes: Vec<JsonValue>,
}

impl Table {
    pub fn new(url: Url) -> Self {
        Self {
            id: None,
            url,
            schema: None,
            dialect: Dialect::default().with_derived_defaults(),
            suppress_output: false,
            inherited: InheritedProperties::default(),
            common_properties: Map::new(),
            notes: Vec::new(),
        }
    }

    pub fn chain<'a>(&'a self, group: &'a TableGroup) -> PropertyChain<'a> {
        PropertyChain::new(vec![&self.inherited, &group.inherited])
    }

    pub fn columns(&self) -> &[ColumnDescription] {
        self.schema
            .as_ref()
            .map(|s| s.columns.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub columns: Vec<ColumnDescription>,
    pub inherited: InheritedProperties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    pub name: String,
    pub titles: Vec<LanguageTaggedString>,
    pub virtual_column: bool,
    pub suppress_output: bool,
    pub inherited: InheritedProperties,
}

impl ColumnDescription {
    /// An untyped column named `_col.N` (1-based), as generated for columns
    /// the schema does not describe.
    pub fn positional(number: usize) -> Self {
        Self::named(format!("_col.{}", number))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            titles: Vec::new(),
            virtual_column: false,
            suppress_output: false,
            inherited: InheritedProperties::default(),
        }
    }

    pub fn chain<'a>(
        &'a self,
        table: &'a Table,
        group: &'a TableGroup,
    ) -> PropertyChain<'a> {
        let mut levels = vec![&self.inherited];
        if let Some(schema) = &table.schema {
            levels.push(&schema.inherited);
        }
        levels.push(&table.inherited);
        levels.push(&group.inherited);
        PropertyChain::new(levels)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Minimum,
    Maximum,
    MinExclusive,
    MaxExclusive,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Threshold {
    Numeric(f64),
    /// Compared against the canonical lexical form, e.g. of a date.
    Lexical(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueConstraint {
    pub kind: ConstraintKind,
    pub threshold: Threshold,
}

impl ValueConstraint {
    pub fn validate(&self, canonical: &str) -> bool {
        let ordering = match &self.threshold {
            Threshold::Numeric(threshold) => match canonical.parse::<f64>() {
                Ok(value) => value.partial_cmp(threshold),
                Err(_) => None,
            },
            Threshold::Lexical(threshold) => Some(canonical.cmp(threshold.as_str())),
        };
        let Some(ordering) = ordering else {
            return false;
        };
        match self.kind {
            ConstraintKind::Minimum => ordering.is_ge(),
            ConstraintKind::Maximum => ordering.is_le(),
            ConstraintKind::MinExclusive => ordering.is_gt(),
            ConstraintKind::MaxExclusive => ordering.is_lt(),
        }
    }

    pub fn describe(&self) -> String {
        let name = match self.kind {
            ConstraintKind::Minimum => "minimum",
            ConstraintKind::Maximum => "maximum",
            ConstraintKind::MinExclusive => "minExclusive",
            ConstraintKind::MaxExclusive => "maxExclusive",
        };
        match &self.threshold {
            Threshold::Numeric(value) => format!("{} {}", name, value),
            Threshold::Lexical(value) => format!("{} {}", name, value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LengthConstraint {
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

impl LengthConstraint {
    pub fn is_empty(&self) -> bool {
        self.length.is_none() && self.min_length.is_none() && self.max_length.is_none()
    }

    pub fn validate(&self, value: &str) -> bool {
        let len = value.chars().count();
        self.length.map_or(true, |l| len == l)
            && self.min_length.map_or(true, |l| len >= l)
            && self.max_length.map_or(true, |l| len <= l)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatatypeDescription {
    /// Base datatype name, already validated against the registry.
    pub base: String,
    /// Explicit datatype IRI overriding the one of `base`.
    pub id: Option<String>,
    pub format: Option<Format>,
    pub value_constraints: Vec<ValueConstraint>,
    pub length: LengthConstraint,
}

impl DatatypeDescription {
    pub fn from_base(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            id: None,
            format: None,
            value_constraints: Vec::new(),
            length: LengthConstraint::default(),
        }
    }

    pub fn annotation(&self) -> &'static DatatypeAnnotation {
        datatype::lookup(&self.base).unwrap_or_else(datatype::string_annotation)
    }

    pub fn iri(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.annotation().iri.to_string(),
        }
    }

    /// The declared format, or the default lexical check of the base type.
    pub fn effective_format(&self) -> Option<&Format> {
        match &self.format {
            Some(format) => Some(format),
            None => Format::default_for(self.annotation()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_column_chain_walks_to_group() {
        let mut group = TableGroup::for_table_url(url("http://example.org/a.csv"));
        group.inherited.lang = Some("en".to_string());
        group.tables[0].schema = Some(Schema {
            columns: vec![ColumnDescription::named("name")],
            inherited: InheritedProperties {
                separator: Some(";".to_string()),
                ..Default::default()
            },
        });

        let table = &group.tables[0];
        let column = &table.columns()[0];
        let chain = column.chain(table, &group);
        assert_eq!(chain.lang(), Some("en"));
        assert_eq!(chain.separator(), Some(";"));
        assert_eq!(chain.levels().len(), 4);
    }

    #[test]
    fn test_positional_column_name() {
        assert_eq!(ColumnDescription::positional(3).name, "_col.3");
    }

    #[test]
    fn test_value_constraints() {
        let min = ValueConstraint {
            kind: ConstraintKind::Minimum,
            threshold: Threshold::Numeric(0.0),
        };
        assert!(min.validate("0"));
        assert!(!min.validate("-0.5"));
        assert!(!min.validate("abc"));

        let before = ValueConstraint {
            kind: ConstraintKind::MaxExclusive,
            threshold: Threshold::Lexical("2020-01-01".to_string()),
        };
        assert!(before.validate("2019-12-31"));
        assert!(!before.validate("2020-01-01"));
    }

    #[test]
    fn test_length_constraint() {
        let constraint = LengthConstraint {
            min_length: Some(2),
            max_length: Some(3),
            ..Default::default()
        };
        assert!(constraint.validate("AD"));
        assert!(!constraint.validate("A"));
        assert!(!constraint.validate("ANDO"));
        assert!(LengthConstraint::default().is_empty());
    }

    #[test]
    fn test_datatype_iri() {
        let mut datatype = DatatypeDescription::from_base("decimal");
        assert_eq!(datatype.iri(), "http://www.w3.org/2001/XMLSchema#decimal");
        assert!(datatype.effective_format().is_some());
        datatype.id = Some("http://example.org/money".to_string());
        assert_eq!(datatype.iri(), "http://example.org/money");
        assert!(DatatypeDescription::from_base("string").effective_format().is_none());
    }
}
