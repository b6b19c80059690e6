//! Metadata parsing: normalization of the raw JSON document followed by a
//! pure structural parse into the metadata model.

mod language_tag;
mod normalizer;
mod parser;
mod properties;

pub use language_tag::is_valid_language_tag;
pub use normalizer::{MetadataNormalizer, NormalizationContext, NormalizedMetadata};
pub use parser::JsonMetadataParser;
