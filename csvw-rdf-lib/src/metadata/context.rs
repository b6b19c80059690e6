//! The CSVW JSON-LD context, embedded at compile time and parsed once.

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use url::Url;

pub const CSVW_CONTEXT_IRI: &str = "http://www.w3.org/ns/csvw";

/// Schemes accepted for a property name that is not a compact IRI.
const IRI_SCHEMES: &[&str] = &["http", "https", "urn", "tag", "mailto", "file"];

static CONTEXT_SOURCE: &str = include_str!("csvw_context.json");

static CSVW_CONTEXT: Lazy<CsvwContext> = Lazy::new(|| CsvwContext::from_source(CONTEXT_SOURCE));

pub fn csvw_context() -> &'static CsvwContext {
    &CSVW_CONTEXT
}

#[derive(Debug, Default)]
pub struct CsvwContext {
    prefixes: HashMap<String, String>,
    terms: HashMap<String, String>,
}

impl CsvwContext {
    fn from_source(source: &str) -> Self {
        let document: JsonValue = match serde_json::from_str(source) {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("Embedded CSVW context is not valid JSON: {}", e);
                return Self::default();
            }
        };
        let mut context = Self::default();
        let Some(entries) = document.get("@context").and_then(JsonValue::as_object) else {
            return context;
        };
        for (key, value) in entries {
            if key.starts_with('@') {
                continue;
            }
            match value {
                JsonValue::String(iri) if iri.starts_with("http") => {
                    context.prefixes.insert(key.clone(), iri.clone());
                }
                JsonValue::String(alias) => {
                    context.terms.insert(key.clone(), alias.clone());
                }
                JsonValue::Object(definition) => {
                    if let Some(id) = definition.get("@id").and_then(JsonValue::as_str) {
                        context.terms.insert(key.clone(), id.to_string());
                    }
                }
                _ => {}
            }
        }
        context
    }

    pub fn prefix(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Expand a compact IRI (`dc:title`) whose prefix the context defines.
    /// Blank node identifiers, absolute IRIs (`http://...`) and unknown
    /// prefixes come back unchanged.
    pub fn expand_iri(&self, value: &str) -> String {
        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix != "_" && !suffix.starts_with("//") {
                if let Some(namespace) = self.prefix(prefix) {
                    return format!("{}{}", namespace, suffix);
                }
            }
        }
        value.to_string()
    }

    /// Absolute IRI for a property or type name used in metadata: compact
    /// IRIs with a known prefix are expanded, absolute IRIs with a known
    /// scheme kept, and context terms such as `describedby` looked up.
    /// Anything else, `nope:thing` included, has no IRI.
    pub fn expand_term(&self, name: &str) -> Option<String> {
        if let Some(alias) = self.terms.get(name) {
            return Some(self.expand_iri(alias));
        }
        let (prefix, suffix) = name.split_once(':')?;
        if prefix != "_" && !suffix.starts_with("//") {
            if let Some(namespace) = self.prefix(prefix) {
                return Some(format!("{}{}", namespace, suffix));
            }
        }
        let url = Url::parse(name).ok()?;
        IRI_SCHEMES
            .contains(&url.scheme())
            .then(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_iri() {
        let context = csvw_context();
        assert_eq!(context.expand_iri("dc:title"), "http://purl.org/dc/terms/title");
        assert_eq!(
            context.expand_iri("schema:{name}"),
            "http://schema.org/{name}"
        );
        assert_eq!(context.expand_iri("http://example.org/x"), "http://example.org/x");
        assert_eq!(context.expand_iri("_:b0"), "_:b0");
        assert_eq!(context.expand_iri("unknown:thing"), "unknown:thing");
        assert_eq!(context.expand_iri("relative/{id}"), "relative/{id}");
    }

    #[test]
    fn test_expand_term() {
        let context = csvw_context();
        assert_eq!(
            context.expand_term("describedby").as_deref(),
            Some("http://www.w3.org/2007/05/powder-s#describedby")
        );
        assert_eq!(
            context.expand_term("rdfs:label").as_deref(),
            Some("http://www.w3.org/2000/01/rdf-schema#label")
        );
        assert!(context.expand_term("label").is_none());
        assert!(context.expand_term("nope:thing").is_none());
        assert!(context.expand_term("_:b0").is_none());
        assert_eq!(
            context.expand_term("http://example.org/p").as_deref(),
            Some("http://example.org/p")
        );
        assert_eq!(
            context.expand_term("urn:isbn:0451450523").as_deref(),
            Some("urn:isbn:0451450523")
        );
        assert_eq!(context.prefix("xsd"), Some("http://www.w3.org/2001/XMLSchema#"));
    }
}
