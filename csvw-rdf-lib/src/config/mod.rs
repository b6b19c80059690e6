use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CsvwError;

/// Which triples a conversion produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterMode {
    /// Only the triples describing cell values.
    Minimal,
    /// Cell triples plus table group, table and row descriptions.
    #[default]
    Standard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ConverterConfig {
    pub mode: ConverterMode,
    /// Emit plain literals instead of `xsd:string` typed ones.
    pub suppress_string_datatype: bool,
    /// Rows between progress callbacks.
    pub report_interval: usize,
    /// Unknown datatypes fail the metadata parse instead of falling back to
    /// `string`.
    pub strict: bool,
    pub default_language: Option<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            mode: ConverterMode::Standard,
            suppress_string_datatype: false,
            report_interval: 50,
            strict: true,
            default_language: None,
        }
    }
}

impl ConverterConfig {
    pub fn minimal() -> Self {
        Self {
            mode: ConverterMode::Minimal,
            ..Default::default()
        }
    }

    /// Loads a configuration file. `//` and `/* */` comments are allowed.
    pub fn from_file<P: Into<PathBuf>>(path: P) -> Result<Self, CsvwError> {
        let path = path.into();
        tracing::info!("Loading converter configuration from {:?}", path);
        let file = std::fs::File::open(&path)?;
        let config = serde_json::from_reader(json_comments::StripComments::new(file))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config: ConverterConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, ConverterConfig::default());
        assert_eq!(config.mode, ConverterMode::Standard);
        assert_eq!(config.report_interval, 50);
        assert!(config.strict);
    }

    #[test]
    fn test_camel_case_keys() {
        let config: ConverterConfig = serde_json::from_value(json!({
            "mode": "minimal",
            "suppressStringDatatype": true,
            "defaultLanguage": "en"
        }))
        .unwrap();
        assert_eq!(config.mode, ConverterMode::Minimal);
        assert!(config.suppress_string_datatype);
        assert_eq!(config.default_language.as_deref(), Some("en"));

        assert!(serde_json::from_value::<ConverterConfig>(json!({"verbose": true})).is_err());
    }

    #[test]
    fn test_from_file_with_comments() {
        let config = ConverterConfig::from_file("../test-data/converter-config.jsonc").unwrap();
        assert_eq!(config.mode, ConverterMode::Minimal);
        assert_eq!(config.report_interval, 10);
    }
}
