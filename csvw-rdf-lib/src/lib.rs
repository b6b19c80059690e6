//! CSV on the Web to RDF Converter Library
//!
//! This library converts CSV files to RDF triples as described by CSVW
//! metadata: tables, schemas, dialects, datatypes and URI templates.

mod config;
mod converter;
pub mod datatype;
mod error;
pub mod format;
pub mod metadata;
mod parsing;
pub mod rdf;
mod resolver;
mod template;

pub use config::{ConverterConfig, ConverterMode};
pub use converter::{Converter, ConverterBuilder, ErrorSink, ProgressCallback};
pub use error::{
    CsvwError, FormatError, MetadataError, ParseOutcome, ParserWarning, ProcessingMessage,
    ProcessingOutcome, ProcessingState, ResolverError, TemplateBindingError,
};
pub use format::{Format, FormatSpecification};
pub use metadata::{ColumnDescription, Dialect, PropertyChain, Schema, Table, TableGroup};
pub use parsing::{
    is_valid_language_tag, JsonMetadataParser, MetadataNormalizer, NormalizationContext,
    NormalizedMetadata,
};
pub use rdf::{GraphSink, NTriplesSink, RdfSink};
pub use resolver::{FetchedResource, FileResolver, InMemoryResolver, TableResolver};
pub use template::UriTemplate;
