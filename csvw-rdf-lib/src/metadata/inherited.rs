//! Inherited properties and their resolution.
//!
//! Every level of the model (table group, table, schema, column) carries its
//! own `InheritedProperties`. Lookups go through a [`PropertyChain`], an
//! immutable closest-first slice of those sets: the first level that sets a
//! property wins. Nothing is copied down or written back.

use super::DatatypeDescription;
use crate::template::UriTemplate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InheritedProperties {
    pub about_url: Option<UriTemplate>,
    pub property_url: Option<UriTemplate>,
    pub value_url: Option<UriTemplate>,
    pub datatype: Option<DatatypeDescription>,
    pub default: Option<String>,
    pub lang: Option<String>,
    pub null: Option<Vec<String>>,
    pub separator: Option<String>,
    pub required: Option<bool>,
    pub ordered: Option<bool>,
}

/// First value `select` finds walking `chain` from the closest level out.
pub fn resolve<'a, T: ?Sized>(
    chain: &[&'a InheritedProperties],
    select: impl Fn(&'a InheritedProperties) -> Option<&'a T>,
) -> Option<&'a T> {
    chain.iter().copied().find_map(select)
}

/// Effective inherited properties of one node, e.g. `[column, schema, table,
/// group]` for a column.
#[derive(Debug, Clone)]
pub struct PropertyChain<'a> {
    levels: Vec<&'a InheritedProperties>,
}

impl<'a> PropertyChain<'a> {
    pub fn new(levels: Vec<&'a InheritedProperties>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[&'a InheritedProperties] {
        &self.levels
    }

    pub fn about_url(&self) -> Option<&'a UriTemplate> {
        resolve(&self.levels, |p| p.about_url.as_ref())
    }

    pub fn property_url(&self) -> Option<&'a UriTemplate> {
        resolve(&self.levels, |p| p.property_url.as_ref())
    }

    pub fn value_url(&self) -> Option<&'a UriTemplate> {
        resolve(&self.levels, |p| p.value_url.as_ref())
    }

    pub fn datatype(&self) -> Option<&'a DatatypeDescription> {
        resolve(&self.levels, |p| p.datatype.as_ref())
    }

    pub fn lang(&self) -> Option<&'a str> {
        resolve(&self.levels, |p| p.lang.as_deref())
    }

    /// Defaults to the empty string.
    pub fn default_value(&self) -> &'a str {
        resolve(&self.levels, |p| p.default.as_deref()).unwrap_or("")
    }

    pub fn separator(&self) -> Option<&'a str> {
        resolve(&self.levels, |p| p.separator.as_deref())
    }

    pub fn required(&self) -> bool {
        resolve(&self.levels, |p| p.required.as_ref())
            .copied()
            .unwrap_or(false)
    }

    pub fn ordered(&self) -> bool {
        resolve(&self.levels, |p| p.ordered.as_ref())
            .copied()
            .unwrap_or(false)
    }

    /// Whether `value` is one of the null tokens. Without a `null`
    /// annotation anywhere on the chain only the empty string is null.
    pub fn is_null_token(&self, value: &str) -> bool {
        match resolve(&self.levels, |p| p.null.as_deref()) {
            Some(tokens) => tokens.iter().any(|token| token == value),
            None => value.is_empty(),
        }
    }
}
