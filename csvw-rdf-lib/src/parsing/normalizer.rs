//! Rewrites a metadata document into canonical form before it is parsed.
//!
//! After normalization every link is absolute, natural language properties
//! are `{language: [values]}` maps, string datatypes are `{"base": ...}`
//! objects, URI templates have their prefixes expanded and common property
//! values are JSON-LD value or node objects. Referenced `tableSchema` and
//! `dialect` documents are fetched and inlined.

use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;
use url::Url;

use super::language_tag::is_valid_language_tag;
use super::properties::{classify, PropertyKind};
use crate::error::{MetadataError, ProcessingState, ResolverError};
use crate::metadata::{csvw_context, CSVW_CONTEXT_IRI};
use crate::resolver::TableResolver;

/// Base URL and default language in effect for a (sub)document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizationContext {
    pub base: Url,
    pub language: Option<String>,
}

impl NormalizationContext {
    fn language_key(&self) -> &str {
        self.language.as_deref().unwrap_or("und")
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedMetadata {
    pub root: Map<String, JsonValue>,
    pub context: NormalizationContext,
}

pub struct MetadataNormalizer {
    resolver: Option<Arc<dyn TableResolver>>,
}

/// `@type` an object reached through `property` must have.
fn expected_type(property: &str) -> Option<&'static str> {
    match property {
        "tables" => Some("Table"),
        "tableSchema" => Some("Schema"),
        "columns" => Some("Column"),
        "dialect" => Some("Dialect"),
        "transformations" => Some("Template"),
        _ => None,
    }
}

fn root_type(root: &Map<String, JsonValue>) -> Option<&'static str> {
    if root.contains_key("tables") {
        Some("TableGroup")
    } else if root.contains_key("url") {
        Some("Table")
    } else {
        None
    }
}

fn join_link(base: &Url, link: &str) -> Result<Url, MetadataError> {
    base.join(link).map_err(|_| MetadataError::InvalidLink {
        link: link.to_string(),
        base: base.to_string(),
    })
}

fn reject_blank_node(id: &str) -> Result<(), MetadataError> {
    if id.starts_with("_:") {
        return Err(MetadataError::BlankNodeId(id.to_string()));
    }
    Ok(())
}

impl MetadataNormalizer {
    pub fn new(resolver: Option<Arc<dyn TableResolver>>) -> Self {
        Self { resolver }
    }

    pub async fn normalize(
        &self,
        document: JsonValue,
        base: &Url,
        state: &mut ProcessingState,
    ) -> Result<NormalizedMetadata, MetadataError> {
        let JsonValue::Object(mut root) = document else {
            return Err(MetadataError::InvalidRoot(
                "metadata document must be a JSON object".into(),
            ));
        };
        let context = self.process_context(&mut root, base, "$", state)?;
        tracing::debug!("Normalizing metadata with base {}", context.base);

        self.dereference_object_properties(&mut root, &context, "$", state)
            .await?;
        if let Some(JsonValue::Array(tables)) = root.get_mut("tables") {
            for (index, table) in tables.iter_mut().enumerate() {
                if let JsonValue::Object(table) = table {
                    let path = format!("$.tables[{}]", index);
                    self.dereference_object_properties(table, &context, &path, state)
                        .await?;
                }
            }
        }

        let expected = root_type(&root);
        let root = normalize_object(root, &context, expected, "$", state)?;
        Ok(NormalizedMetadata { root, context })
    }

    /// Removes `@context` from `object` and returns the base and language it
    /// sets, falling back to `base` and no language.
    fn process_context(
        &self,
        object: &mut Map<String, JsonValue>,
        base: &Url,
        path: &str,
        state: &mut ProcessingState,
    ) -> Result<NormalizationContext, MetadataError> {
        let mut context = NormalizationContext {
            base: base.clone(),
            language: None,
        };
        let path = format!("{}.@context", path);
        let local = match object.remove("@context") {
            None => None,
            Some(JsonValue::String(iri)) => {
                if iri != CSVW_CONTEXT_IRI {
                    state.add_warning(format!("Unexpected @context '{}'", iri), Some(path.clone()));
                }
                None
            }
            Some(JsonValue::Array(items)) => {
                if items.first().and_then(JsonValue::as_str) != Some(CSVW_CONTEXT_IRI) {
                    state.add_warning(
                        format!("@context should start with '{}'", CSVW_CONTEXT_IRI),
                        Some(path.clone()),
                    );
                }
                items.into_iter().find_map(|item| match item {
                    JsonValue::Object(local) => Some(local),
                    _ => None,
                })
            }
            Some(JsonValue::Object(local)) => Some(local),
            Some(other) => {
                state.add_warning(format!("Invalid @context {}", other), Some(path.clone()));
                None
            }
        };

        let Some(local) = local else {
            return Ok(context);
        };
        for (key, value) in local {
            match (key.as_str(), value) {
                ("@base", JsonValue::String(link)) => {
                    context.base = join_link(base, &link)?;
                }
                ("@language", JsonValue::String(tag)) if is_valid_language_tag(&tag) => {
                    context.language = Some(tag);
                }
                ("@language", value) => {
                    state.add_warning(
                        format!("Invalid @language {}; ignoring it", value),
                        Some(path.clone()),
                    );
                }
                (key, _) => {
                    state.add_warning(
                        format!("Unsupported @context property '{}' ignored", key),
                        Some(path.clone()),
                    );
                }
            }
        }
        Ok(context)
    }

    /// Replaces string `tableSchema` and `dialect` values of `object` with
    /// the normalized documents they point to.
    async fn dereference_object_properties(
        &self,
        object: &mut Map<String, JsonValue>,
        context: &NormalizationContext,
        path: &str,
        state: &mut ProcessingState,
    ) -> Result<(), MetadataError> {
        for property in ["tableSchema", "dialect"] {
            let Some(JsonValue::String(link)) = object.get(property) else {
                continue;
            };
            let url = join_link(&context.base, link)?;
            let path = format!("{}.{}", path, property);
            let document = self.fetch_object(&url, &path, state).await?;
            object.insert(property.to_string(), JsonValue::Object(document));
        }
        Ok(())
    }

    async fn fetch_object(
        &self,
        url: &Url,
        path: &str,
        state: &mut ProcessingState,
    ) -> Result<Map<String, JsonValue>, MetadataError> {
        let Some(resolver) = &self.resolver else {
            return Err(MetadataError::Dereference {
                url: url.to_string(),
                source: ResolverError::UnsupportedScheme(format!(
                    "{} (no resolver configured)",
                    url
                )),
            });
        };
        tracing::info!("Dereferencing {} for {}", url, path);
        let document = resolver
            .resolve_json(url)
            .await
            .map_err(|source| MetadataError::Dereference {
                url: url.to_string(),
                source,
            })?;
        let JsonValue::Object(mut document) = document else {
            return Err(MetadataError::InvalidProperty {
                property: path.to_string(),
                message: format!("{} does not contain a JSON object", url),
            });
        };
        // A referenced document is resolved against its own location.
        let context = self.process_context(&mut document, url, path, state)?;
        let property = path.rsplit('.').next().unwrap_or_default();
        normalize_object(document, &context, expected_type(property), path, state)
    }
}

fn normalize_object(
    object: Map<String, JsonValue>,
    context: &NormalizationContext,
    expected: Option<&'static str>,
    path: &str,
    state: &mut ProcessingState,
) -> Result<Map<String, JsonValue>, MetadataError> {
    if let (Some(expected), Some(found)) = (expected, object.get("@type")) {
        if found.as_str() != Some(expected) {
            return Err(MetadataError::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
    }

    let mut normalized = Map::new();
    for (key, value) in object {
        let property_path = format!("{}.{}", path, key);
        let Some(kind) = classify(&key) else {
            state.add_warning(
                format!("Unknown property '{}' ignored", key),
                Some(property_path),
            );
            continue;
        };
        let value = match kind {
            PropertyKind::Array => normalize_array(&key, value, context, &property_path, state)?,
            PropertyKind::Link => normalize_link(&key, value, context, &property_path, state)?,
            PropertyKind::Object => match value {
                JsonValue::Object(inner) => Some(JsonValue::Object(normalize_object(
                    inner,
                    context,
                    expected_type(&key),
                    &property_path,
                    state,
                )?)),
                other => {
                    state.add_warning(
                        format!("'{}' must be an object, found {}", key, other),
                        Some(property_path),
                    );
                    None
                }
            },
            PropertyKind::NaturalLanguage => {
                normalize_natural_language(value, context, &property_path, state)
            }
            PropertyKind::UriTemplate => match value {
                JsonValue::String(template) => {
                    Some(JsonValue::String(csvw_context().expand_iri(&template)))
                }
                other => {
                    state.add_warning(
                        format!("URI template '{}' must be a string, found {}", key, other),
                        Some(property_path),
                    );
                    None
                }
            },
            PropertyKind::Atomic => Some(normalize_atomic(&key, value, context, &property_path, state)?),
            PropertyKind::Common => Some(normalize_common(value, context)?),
        };
        if let Some(value) = value {
            normalized.insert(key, value);
        }
    }
    Ok(normalized)
}

fn normalize_array(
    key: &str,
    value: JsonValue,
    context: &NormalizationContext,
    path: &str,
    state: &mut ProcessingState,
) -> Result<Option<JsonValue>, MetadataError> {
    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::String(terminator) if key == "lineTerminators" => {
            return Ok(Some(json!([terminator])));
        }
        // Structural; the parser reports the wrong shape.
        other if key == "tables" || key == "columns" => return Ok(Some(other)),
        other => {
            state.add_warning(
                format!("'{}' must be an array, found {}", key, other),
                Some(path.to_string()),
            );
            return Ok(None);
        }
    };

    let mut normalized = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let item_path = format!("{}[{}]", path, index);
        let item = match item {
            _ if key == "notes" => normalize_common(item, context)?,
            JsonValue::Object(object) => JsonValue::Object(normalize_object(
                object,
                context,
                expected_type(key),
                &item_path,
                state,
            )?),
            other => other,
        };
        normalized.push(item);
    }
    Ok(Some(JsonValue::Array(normalized)))
}

fn normalize_link(
    key: &str,
    value: JsonValue,
    context: &NormalizationContext,
    path: &str,
    state: &mut ProcessingState,
) -> Result<Option<JsonValue>, MetadataError> {
    match value {
        JsonValue::String(link) => {
            if key == "@id" {
                reject_blank_node(&link)?;
            }
            let resolved = join_link(&context.base, &link)?;
            Ok(Some(JsonValue::String(resolved.to_string())))
        }
        other if key == "url" => Ok(Some(other)),
        other => {
            state.add_warning(
                format!("Link property '{}' must be a string, found {}", key, other),
                Some(path.to_string()),
            );
            Ok(None)
        }
    }
}

fn normalize_natural_language(
    value: JsonValue,
    context: &NormalizationContext,
    path: &str,
    state: &mut ProcessingState,
) -> Option<JsonValue> {
    let mut strings_of = |values: JsonValue, state: &mut ProcessingState| -> Vec<JsonValue> {
        match values {
            JsonValue::String(_) => vec![values],
            JsonValue::Array(items) => items
                .into_iter()
                .filter(|item| {
                    let keep = item.is_string();
                    if !keep {
                        state.add_warning(
                            format!("Ignoring non-string title {}", item),
                            Some(path.to_string()),
                        );
                    }
                    keep
                })
                .collect(),
            other => {
                state.add_warning(
                    format!("Ignoring invalid title {}", other),
                    Some(path.to_string()),
                );
                Vec::new()
            }
        }
    };

    match value {
        JsonValue::String(_) | JsonValue::Array(_) => {
            let mut map = Map::new();
            map.insert(
                context.language_key().to_string(),
                JsonValue::Array(strings_of(value, state)),
            );
            Some(JsonValue::Object(map))
        }
        JsonValue::Object(languages) => {
            let mut map = Map::new();
            for (language, values) in languages {
                if language != "und" && !is_valid_language_tag(&language) {
                    state.add_warning(
                        format!("Invalid language tag '{}' ignored", language),
                        Some(path.to_string()),
                    );
                    continue;
                }
                map.insert(language, JsonValue::Array(strings_of(values, state)));
            }
            Some(JsonValue::Object(map))
        }
        other => {
            state.add_warning(
                format!("Natural language property must be a string, array or object, found {}", other),
                Some(path.to_string()),
            );
            None
        }
    }
}

fn normalize_atomic(
    key: &str,
    value: JsonValue,
    context: &NormalizationContext,
    path: &str,
    state: &mut ProcessingState,
) -> Result<JsonValue, MetadataError> {
    if key != "datatype" {
        return Ok(value);
    }
    Ok(match value {
        JsonValue::String(base) => json!({ "base": base }),
        JsonValue::Object(datatype) => {
            JsonValue::Object(normalize_object(datatype, context, None, path, state)?)
        }
        other => other,
    })
}

/// Turns a common property value into JSON-LD value objects and node
/// objects with absolute `@id`s.
fn normalize_common(
    value: JsonValue,
    context: &NormalizationContext,
) -> Result<JsonValue, MetadataError> {
    match value {
        JsonValue::String(text) => {
            let mut object = Map::new();
            object.insert("@value".to_string(), JsonValue::String(text));
            if let Some(language) = &context.language {
                object.insert("@language".to_string(), JsonValue::String(language.clone()));
            }
            Ok(JsonValue::Object(object))
        }
        JsonValue::Array(items) => items
            .into_iter()
            .map(|item| normalize_common(item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array),
        JsonValue::Object(object) if object.contains_key("@value") => {
            Ok(JsonValue::Object(object))
        }
        JsonValue::Object(object) => {
            let mut normalized = Map::new();
            for (key, value) in object {
                let value = match (key.as_str(), value) {
                    ("@id", JsonValue::String(id)) => {
                        reject_blank_node(&id)?;
                        let expanded = csvw_context().expand_iri(&id);
                        JsonValue::String(join_link(&context.base, &expanded)?.to_string())
                    }
                    ("@type", value) => value,
                    (_, value) => normalize_common(value, context)?,
                };
                normalized.insert(key, value);
            }
            Ok(JsonValue::Object(normalized))
        }
        other => Ok(other),
    }
}
