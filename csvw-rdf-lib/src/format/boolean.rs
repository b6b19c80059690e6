use super::FormatSpecification;
use crate::error::{FormatError, MetadataError};

/// Boolean format: either a `"true-literal|false-literal"` pair or, without
/// a declared format, the XSD lexical space `true`, `false`, `1`, `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BooleanFormat {
    literals: Option<(String, String)>,
}

impl BooleanFormat {
    pub fn new(pattern: &str) -> Result<Self, MetadataError> {
        let parts: Vec<&str> = pattern.split('|').collect();
        match parts.as_slice() {
            [true_literal, false_literal] => Ok(Self {
                literals: Some((true_literal.to_string(), false_literal.to_string())),
            }),
            _ => Err(MetadataError::InvalidFormat(format!(
                "the format of a boolean must be two strings separated by '|', found '{}'",
                pattern
            ))),
        }
    }

    pub fn xsd() -> Self {
        Self { literals: None }
    }

    fn parse(&self, literal: &str) -> Option<bool> {
        match &self.literals {
            Some((true_literal, _)) if literal == true_literal => Some(true),
            Some((_, false_literal)) if literal == false_literal => Some(false),
            Some(_) => None,
            None => match literal {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
        }
    }
}

impl FormatSpecification for BooleanFormat {
    fn is_valid(&self, literal: &str) -> bool {
        self.parse(literal).is_some()
    }

    fn normalize(&self, literal: &str) -> Result<String, FormatError> {
        match self.parse(literal) {
            Some(value) => Ok(value.to_string()),
            None => {
                let expected = match &self.literals {
                    Some((t, f)) => format!("a boolean ('{}' or '{}')", t, f),
                    None => "a boolean".to_string(),
                };
                Err(FormatError::new(literal, expected))
            }
        }
    }
}
