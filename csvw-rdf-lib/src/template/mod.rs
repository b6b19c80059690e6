//! URI templates: the subset of RFC 6570 used by `aboutUrl`, `propertyUrl`,
//! `valueUrl` and metadata discovery. Simple `{a,b}`, reserved `{+a}` and
//! fragment `{#a,b}` expansions are supported.

use std::fmt;

use url::Url;

use crate::error::TemplateBindingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Simple,
    Reserved,
    Fragment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Expansion {
        operator: Operator,
        variables: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UriTemplate {
    pub fn new(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let expression = &rest[open + 1..close];
            let (operator, list) = match expression.chars().next() {
                Some('#') => (Operator::Fragment, &expression[1..]),
                Some('+') => (Operator::Reserved, &expression[1..]),
                _ => (Operator::Simple, expression),
            };
            segments.push(Segment::Expansion {
                operator,
                variables: list.split(',').map(|v| v.trim().to_string()).collect(),
            });
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        Self {
            source: template.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Expand the template into a (possibly relative) URI reference. Every
    /// variable must resolve to a non-empty value.
    pub fn expand<F>(&self, lookup: F) -> Result<String, TemplateBindingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Expansion {
                    operator,
                    variables,
                } => {
                    let mut values = Vec::with_capacity(variables.len());
                    for variable in variables {
                        let value = lookup(variable)
                            .filter(|v| !v.is_empty())
                            .ok_or_else(|| TemplateBindingError {
                                variable: variable.clone(),
                            })?;
                        values.push(match operator {
                            Operator::Simple => urlencoding::encode(&value).into_owned(),
                            Operator::Reserved | Operator::Fragment => encode_reserved(&value),
                        });
                    }
                    if *operator == Operator::Fragment {
                        out.push('#');
                    }
                    out.push_str(&values.join(","));
                }
            }
        }
        Ok(out)
    }

    /// Expand and resolve against `base`. `Ok(None)` means the expansion is
    /// not a valid URI reference.
    pub fn resolve<F>(&self, base: &Url, lookup: F) -> Result<Option<Url>, TemplateBindingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expanded = self.expand(lookup)?;
        Ok(base.join(&expanded).ok())
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Percent-encode everything outside the unreserved and reserved sets.
fn encode_reserved(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() || "-._~:/?#[]@!$&'()*+,;=%".contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn bindings() -> HashMap<&'static str, &'static str> {
        HashMap::from([("code", "AD"), ("name", "Andorra la Vella"), ("empty", "")])
    }

    fn lookup(name: &str) -> Option<String> {
        bindings().get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_simple_and_fragment_expansion() {
        let template = UriTemplate::new("http://example.org/country/{code}");
        assert_eq!(template.expand(lookup).unwrap(), "http://example.org/country/AD");

        let template = UriTemplate::new("countries.csv{#code,name}");
        assert_eq!(
            template.expand(lookup).unwrap(),
            "countries.csv#AD,Andorra%20la%20Vella"
        );

        let template = UriTemplate::new("{code,name}");
        assert_eq!(template.expand(lookup).unwrap(), "AD,Andorra%20la%20Vella");
    }

    #[test]
    fn test_reserved_expansion() {
        let template = UriTemplate::new("{+url}-metadata.json");
        let expanded = template
            .expand(|name| (name == "url").then(|| "http://example.org/a b.csv".to_string()))
            .unwrap();
        assert_eq!(expanded, "http://example.org/a%20b.csv-metadata.json");
    }

    #[test]
    fn test_binding_errors() {
        let err = UriTemplate::new("http://example.org/{missing}")
            .expand(lookup)
            .unwrap_err();
        assert_eq!(err.variable, "missing");

        let err = UriTemplate::new("{code}/{empty}").expand(lookup).unwrap_err();
        assert_eq!(err.variable, "empty");
    }

    #[test]
    fn test_resolve_against_base() {
        let base = Url::parse("http://example.org/data/countries.csv").unwrap();
        let resolved = UriTemplate::new("#row.{code}")
            .resolve(&base, lookup)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.as_str(), "http://example.org/data/countries.csv#row.AD");

        let resolved = UriTemplate::new("../country/{code}")
            .resolve(&base, lookup)
            .unwrap()
            .unwrap();
        assert_eq!(resolved.as_str(), "http://example.org/country/AD");
    }

    #[test]
    fn test_unterminated_expression() {
        let template = UriTemplate::new("http://example.org/{open");
        assert_eq!(template.expand(lookup).unwrap(), "http://example.org/{open");
    }
}
