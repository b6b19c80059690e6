//! Fetching tables and metadata documents.
//!
//! The converter never performs I/O itself: every CSV body, metadata file and
//! referenced schema goes through a [`TableResolver`].

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::PathBuf;
use url::Url;

use crate::error::ResolverError;

/// A fetched resource with the response metadata discovery needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub url: Url,
    pub content_type: Option<String>,
    /// Raw `Link` header values.
    pub link_headers: Vec<String>,
    pub body: Vec<u8>,
}

impl FetchedResource {
    /// Media type without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        self.content_type.as_deref().map(|content_type| {
            content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }
}

#[async_trait]
pub trait TableResolver: Send + Sync {
    /// Body of the resource at `url`.
    async fn resolve(&self, url: &Url) -> Result<Vec<u8>, ResolverError>;

    /// The resource plus its content type and link headers. The default
    /// guesses the content type from the file extension and reports no links.
    async fn fetch(&self, url: &Url) -> Result<FetchedResource, ResolverError> {
        let body = self.resolve(url).await?;
        Ok(FetchedResource {
            url: url.clone(),
            content_type: content_type_for(url).map(str::to_string),
            link_headers: Vec::new(),
            body,
        })
    }

    /// The JSON document at `url`. Comments are allowed.
    async fn resolve_json(&self, url: &Url) -> Result<JsonValue, ResolverError> {
        let body = self.resolve(url).await?;
        parse_json(url, &body)
    }
}

pub(crate) fn parse_json(url: &Url, body: &[u8]) -> Result<JsonValue, ResolverError> {
    let reader = json_comments::StripComments::new(body);
    serde_json::from_reader(reader).map_err(|source| ResolverError::Json {
        url: url.to_string(),
        source,
    })
}

pub fn content_type_for(url: &Url) -> Option<&'static str> {
    let path = url.path().to_ascii_lowercase();
    let extension = path.rsplit_once('.').map(|(_, ext)| ext)?;
    match extension {
        "csv" => Some("text/csv"),
        "tsv" | "tab" => Some("text/tab-separated-values"),
        "json" => Some("application/json"),
        "jsonld" => Some("application/ld+json"),
        _ => None,
    }
}

fn without_fragment(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

/// Reads `file:` URLs, and URLs under registered prefixes, from disk.
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    mappings: Vec<(String, PathBuf)>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve URLs starting with `prefix` from `directory`, e.g.
    /// `http://example.org/data/` from `./test-data/`.
    pub fn with_mapping(mut self, prefix: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        self.mappings.push((prefix.into(), directory.into()));
        self
    }

    fn local_path(&self, url: &Url) -> Result<PathBuf, ResolverError> {
        if url.scheme() == "file" {
            return url
                .to_file_path()
                .map_err(|_| ResolverError::UnsupportedScheme(url.to_string()));
        }
        let mut target = url.clone();
        target.set_fragment(None);
        target.set_query(None);
        let target = target.to_string();
        self.mappings
            .iter()
            .find_map(|(prefix, directory)| {
                target
                    .strip_prefix(prefix.as_str())
                    .map(|rest| directory.join(rest))
            })
            .ok_or_else(|| ResolverError::UnsupportedScheme(url.to_string()))
    }
}

#[async_trait]
impl TableResolver for FileResolver {
    async fn resolve(&self, url: &Url) -> Result<Vec<u8>, ResolverError> {
        let path = self.local_path(url)?;
        tracing::debug!("Reading {} from {}", url, path.display());
        tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResolverError::NotFound(url.to_string())
            } else {
                ResolverError::Io {
                    url: url.to_string(),
                    source,
                }
            }
        })
    }
}

/// Serves resources registered up front, keyed by URL without fragment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    resources: HashMap<String, FetchedResource>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, url: &Url, body: impl Into<Vec<u8>>) -> &mut Self {
        let content_type = content_type_for(url).map(str::to_string);
        self.add_with_headers(url, body, content_type, Vec::new())
    }

    pub fn add_with_headers(
        &mut self,
        url: &Url,
        body: impl Into<Vec<u8>>,
        content_type: Option<String>,
        link_headers: Vec<String>,
    ) -> &mut Self {
        self.resources.insert(
            without_fragment(url),
            FetchedResource {
                url: url.clone(),
                content_type,
                link_headers,
                body: body.into(),
            },
        );
        self
    }

    fn lookup(&self, url: &Url) -> Result<&FetchedResource, ResolverError> {
        self.resources
            .get(&without_fragment(url))
            .ok_or_else(|| ResolverError::NotFound(url.to_string()))
    }
}

#[async_trait]
impl TableResolver for InMemoryResolver {
    async fn resolve(&self, url: &Url) -> Result<Vec<u8>, ResolverError> {
        Ok(self.lookup(url)?.body.clone())
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedResource, ResolverError> {
        self.lookup(url).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_resolver() {
        let mut resolver = InMemoryResolver::new();
        resolver.add(&url("http://example.org/a.csv"), "a,b\n1,2\n");
        resolver.add(
            &url("http://example.org/a.csv-metadata.json"),
            r#"{ /* schema */ "url": "a.csv" }"#,
        );

        let body = resolver.resolve(&url("http://example.org/a.csv#row=2")).await.unwrap();
        assert_eq!(body, b"a,b\n1,2\n");

        let fetched = resolver.fetch(&url("http://example.org/a.csv")).await.unwrap();
        assert_eq!(fetched.media_type().as_deref(), Some("text/csv"));

        let json = resolver
            .resolve_json(&url("http://example.org/a.csv-metadata.json"))
            .await
            .unwrap();
        assert_eq!(json["url"], "a.csv");

        assert!(matches!(
            resolver.resolve(&url("http://example.org/missing.csv")).await,
            Err(ResolverError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_resolver_mapping() {
        let resolver = FileResolver::new().with_mapping("http://example.org/data/", "../test-data/");
        let body = resolver
            .resolve(&url("http://example.org/data/countries.csv"))
            .await
            .unwrap();
        assert!(String::from_utf8(body).unwrap().starts_with("countryCode"));

        assert!(matches!(
            resolver.resolve(&url("ftp://elsewhere.org/x.csv")).await,
            Err(ResolverError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_media_type() {
        let resource = FetchedResource {
            url: url("http://example.org/x"),
            content_type: Some("Text/CSV; charset=utf-8".to_string()),
            link_headers: Vec::new(),
            body: Vec::new(),
        };
        assert_eq!(resource.media_type().as_deref(), Some("text/csv"));
    }
}
