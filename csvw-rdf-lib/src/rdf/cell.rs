use crate::datatype::{self, DatatypeAnnotation, WhitespaceHandling};
use crate::metadata::PropertyChain;

/// Value of a cell after null, default and list handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent {
    Null,
    Single(String),
    /// Non-null items of a list cell, in source order.
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellValue {
    pub raw: String,
    /// The raw string after whitespace handling and defaulting.
    pub normalized: String,
    pub content: CellContent,
    pub errors: Vec<String>,
}

impl CellValue {
    pub fn is_list(&self) -> bool {
        matches!(self.content, CellContent::List(_))
    }

    pub fn is_null(&self) -> bool {
        self.content == CellContent::Null
    }

    /// Values to emit, one per list item or a single one.
    pub fn values(&self) -> &[String] {
        match &self.content {
            CellContent::Null => &[],
            CellContent::Single(value) => std::slice::from_ref(value),
            CellContent::List(values) => values,
        }
    }
}

/// Normalizes raw cells of one column.
pub struct CellParser<'a> {
    chain: PropertyChain<'a>,
    annotation: &'static DatatypeAnnotation,
}

impl<'a> CellParser<'a> {
    pub fn new(chain: PropertyChain<'a>) -> Self {
        let annotation = chain
            .datatype()
            .map(|datatype| datatype.annotation())
            .unwrap_or_else(datatype::string_annotation);
        Self { chain, annotation }
    }

    pub fn chain(&self) -> &PropertyChain<'a> {
        &self.chain
    }

    pub fn annotation(&self) -> &'static DatatypeAnnotation {
        self.annotation
    }

    pub fn parse(&self, raw: &str) -> CellValue {
        let mut normalized = clean_whitespace(raw, self.annotation.whitespace());
        if normalized.is_empty() {
            normalized = self.chain.default_value().to_string();
        }

        let mut errors = Vec::new();
        let content = match self.chain.separator() {
            Some(separator) => self.split_list(&normalized, separator, &mut errors),
            None if self.chain.is_null_token(&normalized) => {
                if self.chain.required() {
                    errors.push("required value is null".to_string());
                }
                CellContent::Null
            }
            None => CellContent::Single(normalized.clone()),
        };

        CellValue {
            raw: raw.to_string(),
            normalized,
            content,
            errors,
        }
    }

    fn split_list(&self, normalized: &str, separator: &str, errors: &mut Vec<String>) -> CellContent {
        if self.chain.is_null_token(normalized) {
            return CellContent::Null;
        }
        if normalized.is_empty() || separator.is_empty() {
            if normalized.is_empty() && self.chain.required() {
                errors.push("required list is empty".to_string());
            }
            return if normalized.is_empty() {
                CellContent::List(Vec::new())
            } else {
                CellContent::List(vec![normalized.to_string()])
            };
        }

        let keep_whitespace = self.annotation.retains_list_token_whitespace();
        let items = normalized
            .split(separator)
            .map(|item| if keep_whitespace { item } else { item.trim() })
            .filter(|item| !self.chain.is_null_token(item))
            .map(str::to_string)
            .collect();
        CellContent::List(items)
    }
}

fn clean_whitespace(raw: &str, handling: WhitespaceHandling) -> String {
    match handling {
        WhitespaceHandling::Preserve => raw.to_string(),
        WhitespaceHandling::ReplaceControl => raw.replace(['\r', '\n', '\t'], " "),
        WhitespaceHandling::Collapse => raw.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}
