//! Locating the metadata of a CSV file and converting from a URL.

use serde_json::Value as JsonValue;
use url::Url;

use super::Converter;
use crate::error::{CsvwError, ProcessingState};
use crate::metadata::TableGroup;
use crate::parsing::JsonMetadataParser;
use crate::rdf::RdfSink;
use crate::resolver::{parse_json, FetchedResource};
use crate::template::UriTemplate;

const JSON_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/csvm+json",
];

/// Locations tried when neither `/.well-known/csvm` nor a `Link` header
/// names the metadata.
const DEFAULT_LOCATIONS: &[&str] = &["{+url}-metadata.json", "csv-metadata.json"];

/// One entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    target: String,
    rel: Option<String>,
    media_type: Option<String>,
}

impl Link {
    fn describes_metadata(&self) -> bool {
        let described_by = self
            .rel
            .as_deref()
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("describedby")));
        let json = self
            .media_type
            .as_deref()
            .is_some_and(|media_type| JSON_MEDIA_TYPES.contains(&media_type));
        described_by || json
    }
}

/// Splits a `Link` header value into its links. Commas inside `<...>` are
/// part of the target.
fn parse_link_header(value: &str) -> Vec<Link> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, c) in value.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);

    parts
        .into_iter()
        .filter_map(|part| {
            let mut params = part.split(';');
            let target = params
                .next()?
                .trim()
                .strip_prefix('<')?
                .strip_suffix('>')?
                .to_string();
            let mut link = Link {
                target,
                rel: None,
                media_type: None,
            };
            for param in params {
                let Some((key, value)) = param.split_once('=') else {
                    continue;
                };
                let value = value.trim().trim_matches('"').to_string();
                match key.trim().to_ascii_lowercase().as_str() {
                    "rel" => link.rel = Some(value),
                    "type" => link.media_type = Some(value.to_ascii_lowercase()),
                    _ => {}
                }
            }
            Some(link)
        })
        .collect()
}

fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

impl Converter {
    /// Converts the resource at `source`. A JSON resource is read as the
    /// metadata itself; anything else is treated as CSV and its metadata is
    /// looked up through `/.well-known/csvm`, `Link` headers and the default
    /// locations. Without metadata the file is converted on its own.
    pub async fn convert_from_uri(
        &mut self,
        source: &Url,
        sink: &mut dyn RdfSink,
    ) -> Result<(), CsvwError> {
        self.state = ProcessingState::new();
        let resource = self.resolver.fetch(source).await?;

        let is_json = resource
            .media_type()
            .is_some_and(|media_type| JSON_MEDIA_TYPES.contains(&media_type.as_str()));
        let group = if is_json {
            tracing::info!("Reading {} as metadata", source);
            let document = parse_json(&resource.url, &resource.body)?;
            self.parse_metadata(document, &resource.url).await?
        } else {
            match self.discover(&resource).await {
                Some(group) => group,
                None => {
                    tracing::info!("No metadata found for {}, converting it on its own", source);
                    TableGroup::for_table_url(without_fragment(source))
                }
            }
        };
        self.run(&group, sink).await
    }

    /// Converts `source` with metadata supplied by the caller. Relative URLs
    /// in the metadata resolve against `source`.
    pub async fn convert_with_local_metadata(
        &mut self,
        source: &Url,
        metadata: &str,
        sink: &mut dyn RdfSink,
    ) -> Result<(), CsvwError> {
        self.state = ProcessingState::new();
        let document: JsonValue =
            serde_json::from_reader(json_comments::StripComments::new(metadata.as_bytes()))?;
        let group = self.parse_metadata(document, source).await?;
        self.run(&group, sink).await
    }

    async fn parse_metadata(
        &mut self,
        document: JsonValue,
        base: &Url,
    ) -> Result<TableGroup, CsvwError> {
        let parser = JsonMetadataParser::new(base.clone())
            .with_resolver(self.resolver.clone())
            .with_default_language(self.config.default_language.clone())
            .with_strict(self.config.strict);
        let (group, warnings) = parser.parse_value(document).await?.into_parts();
        self.state.extend_warnings(warnings);
        Ok(group)
    }

    /// First candidate location holding metadata that describes `resource`.
    async fn discover(&mut self, resource: &FetchedResource) -> Option<TableGroup> {
        let source = without_fragment(&resource.url);
        for candidate in self.candidates(resource).await {
            tracing::debug!("Looking for metadata of {} at {}", source, candidate);
            let document = match self.resolver.resolve_json(&candidate).await {
                Ok(document) => document,
                Err(e) => {
                    tracing::debug!("No metadata at {}: {}", candidate, e);
                    continue;
                }
            };
            let group = match self.parse_metadata(document, &candidate).await {
                Ok(group) => group,
                Err(e) => {
                    self.state.add_warning(
                        format!("Ignoring invalid metadata at {}: {}", candidate, e),
                        Some(candidate.to_string()),
                    );
                    continue;
                }
            };
            if group.tables.iter().any(|table| without_fragment(&table.url) == source) {
                tracing::info!("Using metadata at {} for {}", candidate, source);
                return Some(group);
            }
            self.state.add_warning(
                format!("Metadata at {} does not describe {}", candidate, source),
                Some(candidate.to_string()),
            );
        }
        None
    }

    async fn candidates(&self, resource: &FetchedResource) -> Vec<Url> {
        let source = without_fragment(&resource.url);
        let expand = |template: &str| -> Option<Url> {
            UriTemplate::new(template)
                .resolve(&source, |variable| (variable == "url").then(|| source.to_string()))
                .ok()
                .flatten()
        };

        if let Ok(well_known) = source.join("/.well-known/csvm") {
            if let Ok(body) = self.resolver.resolve(&well_known).await {
                let templates = String::from_utf8_lossy(&body);
                return templates
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .filter_map(expand)
                    .collect();
            }
        }

        let mut candidates: Vec<Url> = resource
            .link_headers
            .iter()
            .flat_map(|header| parse_link_header(header))
            .filter(Link::describes_metadata)
            .filter_map(|link| resource.url.join(&link.target).ok())
            .collect();
        candidates.extend(DEFAULT_LOCATIONS.iter().copied().filter_map(expand));
        candidates
    }
}
