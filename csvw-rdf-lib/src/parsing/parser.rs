use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use url::Url;

use super::language_tag::is_valid_language_tag;
use super::normalizer::{MetadataNormalizer, NormalizedMetadata};
use crate::datatype;
use crate::error::{MetadataError, ParseOutcome, ProcessingState};
use crate::format::{Format, FormatSpecification};
use crate::metadata::{
    ColumnDescription, ConstraintKind, DatatypeDescription, Dialect, InheritedProperties,
    LanguageTaggedString, LengthConstraint, Schema, Table, TableGroup, Threshold,
    ValueConstraint, DIALECT_KEYS,
};
use crate::resolver::TableResolver;
use crate::template::UriTemplate;

/// Parses CSVW metadata documents into a [`TableGroup`].
///
/// Structural problems (no `tables` or `url`, malformed `columns`, blank
/// node `@id`s, unknown datatypes in strict mode) fail the parse. Bad values
/// of optional properties are dropped with a warning and the parse result is
/// [`ParseOutcome::Recovered`].
pub struct JsonMetadataParser {
    base_url: Url,
    resolver: Option<Arc<dyn TableResolver>>,
    default_language: Option<String>,
    strict: bool,
}

impl JsonMetadataParser {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            resolver: None,
            default_language: None,
            strict: true,
        }
    }

    /// Resolver used to fetch `tableSchema` and `dialect` references.
    pub fn with_resolver(mut self, resolver: Arc<dyn TableResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Language of titles without one when the document's `@context`
    /// declares no `@language`.
    pub fn with_default_language(mut self, language: Option<String>) -> Self {
        self.default_language = language;
        self
    }

    /// When false, unknown datatypes become `string` with a warning.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn parse_str(&self, json: &str) -> Result<ParseOutcome<TableGroup>, MetadataError> {
        let reader = json_comments::StripComments::new(json.as_bytes());
        let document: JsonValue = serde_json::from_reader(reader)?;
        self.parse_value(document).await
    }

    pub async fn parse_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<ParseOutcome<TableGroup>, MetadataError> {
        let document: JsonValue =
            serde_json::from_reader(json_comments::StripComments::new(reader))?;
        self.parse_value(document).await
    }

    pub async fn parse_value(
        &self,
        document: JsonValue,
    ) -> Result<ParseOutcome<TableGroup>, MetadataError> {
        let mut state = ProcessingState::new();
        let normalized = MetadataNormalizer::new(self.resolver.clone())
            .normalize(document, &self.base_url, &mut state)
            .await?;
        let group = self.parse_normalized(&normalized, &mut state)?;
        tracing::info!(
            "Parsed metadata with {} table(s), {} warning(s)",
            group.tables.len(),
            state.get_warnings().len()
        );
        Ok(ParseOutcome::from_state(group, state))
    }

    /// Builds the model from an already normalized document.
    pub fn parse_normalized(
        &self,
        normalized: &NormalizedMetadata,
        state: &mut ProcessingState,
    ) -> Result<TableGroup, MetadataError> {
        let default_language = normalized
            .context
            .language
            .clone()
            .or_else(|| self.default_language.clone());
        let mut builder = ModelBuilder {
            strict: self.strict,
            default_language,
            state,
        };
        builder.root(&normalized.root)
    }
}

struct ModelBuilder<'s> {
    strict: bool,
    default_language: Option<String>,
    state: &'s mut ProcessingState,
}

impl ModelBuilder<'_> {
    fn warn(&mut self, message: impl Into<String>, path: &str) {
        self.state.add_warning(message, Some(path.to_string()));
    }

    fn root(&mut self, root: &Map<String, JsonValue>) -> Result<TableGroup, MetadataError> {
        if root.contains_key("tables") {
            self.table_group(root)
        } else if root.contains_key("url") {
            let table = self.table(root, None, "$")?;
            Ok(TableGroup {
                tables: vec![table],
                ..Default::default()
            })
        } else {
            Err(MetadataError::InvalidRoot(
                "expected a table group with 'tables' or a table with 'url'".into(),
            ))
        }
    }

    fn table_group(&mut self, object: &Map<String, JsonValue>) -> Result<TableGroup, MetadataError> {
        let tables = match object.get("tables") {
            Some(JsonValue::Array(tables)) => tables,
            Some(_) => {
                return Err(MetadataError::InvalidProperty {
                    property: "tables".into(),
                    message: "must be an array of table descriptions".into(),
                })
            }
            None => {
                return Err(MetadataError::MissingProperty {
                    property: "tables",
                    object: "table group",
                })
            }
        };
        if tables.is_empty() {
            return Err(MetadataError::InvalidProperty {
                property: "tables".into(),
                message: "must contain at least one table".into(),
            });
        }

        let dialect = self.dialect(object.get("dialect"), "$.dialect");
        let mut parsed = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            let path = format!("$.tables[{}]", index);
            let JsonValue::Object(table) = table else {
                return Err(MetadataError::InvalidProperty {
                    property: "tables".into(),
                    message: format!("item {} is not an object", index),
                });
            };
            parsed.push(self.table(table, dialect.as_ref(), &path)?);
        }

        Ok(TableGroup {
            id: self.id(object, "$"),
            tables: parsed,
            inherited: self.inherited(object, "$")?,
            common_properties: common_properties(object),
            notes: notes(object),
            dialect,
        })
    }

    fn table(
        &mut self,
        object: &Map<String, JsonValue>,
        group_dialect: Option<&Dialect>,
        path: &str,
    ) -> Result<Table, MetadataError> {
        let url = match object.get("url") {
            Some(JsonValue::String(link)) => {
                Url::parse(link).map_err(|_| MetadataError::InvalidLink {
                    link: link.clone(),
                    base: String::new(),
                })?
            }
            Some(_) => {
                return Err(MetadataError::InvalidProperty {
                    property: "url".into(),
                    message: "must be a string".into(),
                })
            }
            None => {
                return Err(MetadataError::MissingProperty {
                    property: "url",
                    object: "table",
                })
            }
        };

        let schema = match object.get("tableSchema") {
            Some(JsonValue::Object(schema)) => {
                Some(self.schema(schema, &format!("{}.tableSchema", path))?)
            }
            Some(other) => {
                self.warn(format!("tableSchema must be an object, found {}", other), path);
                None
            }
            None => None,
        };

        let dialect = self
            .dialect(object.get("dialect"), &format!("{}.dialect", path))
            .or_else(|| group_dialect.cloned())
            .unwrap_or_else(|| Dialect::default().with_derived_defaults());

        Ok(Table {
            id: self.id(object, path),
            url,
            schema,
            dialect,
            suppress_output: self.boolean(object, "suppressOutput", path).unwrap_or(false),
            inherited: self.inherited(object, path)?,
            common_properties: common_properties(object),
            notes: notes(object),
        })
    }

    fn schema(&mut self, object: &Map<String, JsonValue>, path: &str) -> Result<Schema, MetadataError> {
        let items = match object.get("columns") {
            None => &[][..],
            Some(JsonValue::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(MetadataError::InvalidProperty {
                    property: "columns".into(),
                    message: "must be an array of column descriptions".into(),
                })
            }
        };

        let mut columns: Vec<ColumnDescription> = Vec::with_capacity(items.len());
        let mut names = HashSet::new();
        for (index, item) in items.iter().enumerate() {
            let JsonValue::Object(column) = item else {
                return Err(MetadataError::InvalidProperty {
                    property: "columns".into(),
                    message: format!("item {} is not an object", index),
                });
            };
            let column_path = format!("{}.columns[{}]", path, index);
            let column = self.column(column, index + 1, &column_path)?;
            if !names.insert(column.name.clone()) {
                return Err(MetadataError::InvalidProperty {
                    property: "name".into(),
                    message: format!("duplicate column name '{}'", column.name),
                });
            }
            if !column.virtual_column && columns.last().is_some_and(|c| c.virtual_column) {
                return Err(MetadataError::InvalidProperty {
                    property: "virtual".into(),
                    message: format!("column '{}' follows a virtual column", column.name),
                });
            }
            columns.push(column);
        }

        Ok(Schema {
            columns,
            inherited: self.inherited(object, path)?,
        })
    }

    fn column(
        &mut self,
        object: &Map<String, JsonValue>,
        number: usize,
        path: &str,
    ) -> Result<ColumnDescription, MetadataError> {
        let titles = titles(object);

        let declared_name = match object.get("name") {
            Some(JsonValue::String(name)) if name.starts_with('_') => {
                self.warn(
                    format!("Column names starting with '_' are reserved; ignoring '{}'", name),
                    path,
                );
                None
            }
            Some(JsonValue::String(name)) => Some(name.clone()),
            Some(other) => {
                self.warn(format!("Column name must be a string, found {}", other), path);
                None
            }
            None => None,
        };
        let name = declared_name
            .or_else(|| self.name_from_titles(&titles))
            .unwrap_or_else(|| format!("_col.{}", number));

        Ok(ColumnDescription {
            name,
            titles,
            virtual_column: self.boolean(object, "virtual", path).unwrap_or(false),
            suppress_output: self.boolean(object, "suppressOutput", path).unwrap_or(false),
            inherited: self.inherited(object, path)?,
        })
    }

    /// First title in the default language, else the first one without a
    /// language, percent-encoded for use in URIs.
    fn name_from_titles(&self, titles: &[LanguageTaggedString]) -> Option<String> {
        let default_language = self.default_language.as_deref();
        titles
            .iter()
            .find(|title| default_language.is_some() && title.language.as_deref() == default_language)
            .or_else(|| titles.iter().find(|title| title.language.is_none()))
            .map(|title| urlencoding::encode(&title.value).into_owned())
    }

    fn id(&mut self, object: &Map<String, JsonValue>, path: &str) -> Option<Url> {
        let link = object.get("@id")?.as_str()?;
        match Url::parse(link) {
            Ok(id) => Some(id),
            Err(e) => {
                self.warn(format!("Invalid @id '{}': {}", link, e), path);
                None
            }
        }
    }

    fn boolean(&mut self, object: &Map<String, JsonValue>, key: &str, path: &str) -> Option<bool> {
        match object.get(key)? {
            JsonValue::Bool(flag) => Some(*flag),
            other => {
                self.warn(format!("'{}' must be a boolean, found {}", key, other), path);
                None
            }
        }
    }

    fn string(&mut self, object: &Map<String, JsonValue>, key: &str, path: &str) -> Option<String> {
        match object.get(key)? {
            JsonValue::String(value) => Some(value.clone()),
            other => {
                self.warn(format!("'{}' must be a string, found {}", key, other), path);
                None
            }
        }
    }

    fn template(&mut self, object: &Map<String, JsonValue>, key: &str, path: &str) -> Option<UriTemplate> {
        self.string(object, key, path).map(|t| UriTemplate::new(&t))
    }

    fn inherited(
        &mut self,
        object: &Map<String, JsonValue>,
        path: &str,
    ) -> Result<InheritedProperties, MetadataError> {
        let datatype = match object.get("datatype") {
            Some(JsonValue::Object(datatype)) => {
                Some(self.datatype(datatype, &format!("{}.datatype", path))?)
            }
            Some(other) => {
                self.warn(format!("Invalid datatype {}", other), path);
                None
            }
            None => None,
        };

        let lang = match self.string(object, "lang", path) {
            Some(tag) if is_valid_language_tag(&tag) => Some(tag),
            Some(tag) => {
                self.warn(format!("Invalid language tag '{}' ignored", tag), path);
                None
            }
            None => None,
        };

        let null = match object.get("null") {
            None => None,
            Some(JsonValue::String(token)) => Some(vec![token.clone()]),
            Some(JsonValue::Array(tokens)) => {
                let mut strings = Vec::with_capacity(tokens.len());
                for token in tokens {
                    match token.as_str() {
                        Some(token) => strings.push(token.to_string()),
                        None => self.warn(format!("Ignoring non-string null value {}", token), path),
                    }
                }
                Some(strings)
            }
            Some(other) => {
                self.warn(format!("Invalid null value {}", other), path);
                None
            }
        };

        let separator = match object.get("separator") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(separator)) => Some(separator.clone()),
            Some(other) => {
                self.warn(format!("Invalid separator {}", other), path);
                None
            }
        };

        Ok(InheritedProperties {
            about_url: self.template(object, "aboutUrl", path),
            property_url: self.template(object, "propertyUrl", path),
            value_url: self.template(object, "valueUrl", path),
            datatype,
            default: self.string(object, "default", path),
            lang,
            null,
            separator,
            required: self.boolean(object, "required", path),
            ordered: self.boolean(object, "ordered", path),
        })
    }

    fn datatype(
        &mut self,
        object: &Map<String, JsonValue>,
        path: &str,
    ) -> Result<DatatypeDescription, MetadataError> {
        let mut id = object.get("@id").and_then(JsonValue::as_str).map(str::to_string);
        let mut base = match object.get("base") {
            Some(JsonValue::String(base)) => match datatype::lookup(base) {
                Some(annotation) => annotation.name.to_string(),
                None if self.strict => return Err(MetadataError::UnknownDatatype(base.clone())),
                None => {
                    self.warn(
                        format!("Unknown datatype '{}'; treating values as strings", base),
                        path,
                    );
                    "string".to_string()
                }
            },
            Some(other) => {
                self.warn(format!("Datatype base must be a string, found {}", other), path);
                "string".to_string()
            }
            None => "string".to_string(),
        };
        // An @id naming a built-in type is that type.
        if let Some(annotation) = id.as_deref().and_then(datatype::lookup) {
            if !object.contains_key("base") {
                base = annotation.name.to_string();
            }
            id = None;
        }

        let mut description = DatatypeDescription::from_base(base);
        description.id = id;
        let family = description.annotation().family;

        if let Some(format) = object.get("format") {
            match Format::from_annotation(family, format) {
                Ok(format) => description.format = Some(format),
                Err(e) => self.warn(format!("Ignoring format {}: {}", format, e), path),
            }
        }

        description.length = LengthConstraint {
            length: self.length(object, "length", path),
            min_length: self.length(object, "minLength", path),
            max_length: self.length(object, "maxLength", path),
        };

        let constraints = [
            ("minimum", ConstraintKind::Minimum),
            ("minInclusive", ConstraintKind::Minimum),
            ("maximum", ConstraintKind::Maximum),
            ("maxInclusive", ConstraintKind::Maximum),
            ("minExclusive", ConstraintKind::MinExclusive),
            ("maxExclusive", ConstraintKind::MaxExclusive),
        ];
        for (key, kind) in constraints {
            let Some(value) = object.get(key) else {
                continue;
            };
            match self.threshold(&description, value) {
                Some(threshold) => description
                    .value_constraints
                    .push(ValueConstraint { kind, threshold }),
                None => self.warn(format!("Ignoring invalid {} {}", key, value), path),
            }
        }

        Ok(description)
    }

    fn length(&mut self, object: &Map<String, JsonValue>, key: &str, path: &str) -> Option<usize> {
        let value = object.get(key)?;
        match value.as_u64().and_then(|n| usize::try_from(n).ok()) {
            Some(length) => Some(length),
            None => {
                self.warn(format!("'{}' must be a non-negative integer, found {}", key, value), path);
                None
            }
        }
    }

    /// Numeric thresholds for numeric types, canonical lexical forms for
    /// everything else (dates compare correctly as canonical strings).
    fn threshold(&self, description: &DatatypeDescription, value: &JsonValue) -> Option<Threshold> {
        let numeric = description.annotation().family == datatype::FormatFamily::Numeric;
        match value {
            JsonValue::Number(number) if numeric => number.as_f64().map(Threshold::Numeric),
            JsonValue::String(text) if numeric => {
                let canonical = match description.effective_format() {
                    Some(format) => format.normalize(text).ok()?,
                    None => text.clone(),
                };
                canonical.parse().ok().map(Threshold::Numeric)
            }
            JsonValue::String(text) => {
                let canonical = match description.effective_format() {
                    Some(format) => format.normalize(text).unwrap_or_else(|_| text.clone()),
                    None => text.clone(),
                };
                Some(Threshold::Lexical(canonical))
            }
            _ => None,
        }
    }

    fn dialect(&mut self, value: Option<&JsonValue>, path: &str) -> Option<Dialect> {
        let object = match value? {
            JsonValue::Object(object) => object,
            other => {
                self.warn(format!("Dialect must be an object, found {}", other), path);
                return None;
            }
        };
        let mut known = Map::new();
        for (key, value) in object {
            if DIALECT_KEYS.contains(&key.as_str()) {
                known.insert(key.clone(), value.clone());
            } else if !matches!(key.as_str(), "@id" | "@type") {
                self.warn(format!("Unknown dialect property '{}' ignored", key), path);
            }
        }
        match serde_json::from_value::<Dialect>(JsonValue::Object(known)) {
            Ok(dialect) => Some(dialect.with_derived_defaults()),
            Err(e) => {
                self.warn(format!("Invalid dialect, using defaults: {}", e), path);
                Some(Dialect::default().with_derived_defaults())
            }
        }
    }
}

fn titles(object: &Map<String, JsonValue>) -> Vec<LanguageTaggedString> {
    let Some(JsonValue::Object(languages)) = object.get("titles") else {
        return Vec::new();
    };
    languages
        .iter()
        .flat_map(|(language, values)| {
            let language = (language != "und").then(|| language.clone());
            values
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(JsonValue::as_str)
                .map(move |value| LanguageTaggedString {
                    value: value.to_string(),
                    language: language.clone(),
                })
        })
        .collect()
}

fn common_properties(object: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    object
        .iter()
        .filter(|(key, _)| super::properties::is_common_property(key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn notes(object: &Map<String, JsonValue>) -> Vec<JsonValue> {
    object
        .get("notes")
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default()
}
