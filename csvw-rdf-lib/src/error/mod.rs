use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvwError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid metadata: {0}")]
    Metadata(#[from] MetadataError),
    #[error("Resolver error: {0}")]
    Resolver(#[from] ResolverError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Template(#[from] TemplateBindingError),
    #[error("Conversion error: {0}")]
    Conversion(String),
}

/// Structural problems with a metadata document. Any of these aborts the
/// parse (or, when raised while converting, the table being converted).
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Invalid metadata root: {0}")]
    InvalidRoot(String),
    #[error("Did not find required '{property}' property on {object} object")]
    MissingProperty {
        property: &'static str,
        object: &'static str,
    },
    #[error("Invalid value for property '{property}': {message}")]
    InvalidProperty { property: String, message: String },
    #[error("Invalid @id '{0}': blank node identifiers are not allowed in metadata")]
    BlankNodeId(String),
    #[error("Expected an object of type {expected} but @type is {found}")]
    TypeMismatch { expected: String, found: String },
    #[error("Unable to match the datatype '{0}' to a known datatype")]
    UnknownDatatype(String),
    #[error("Invalid format specification: {0}")]
    InvalidFormat(String),
    #[error("Could not resolve '{link}' against base '{base}'")]
    InvalidLink { link: String, base: String },
    #[error("Failed to dereference '{url}': {source}")]
    Dereference {
        url: String,
        #[source]
        source: ResolverError,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Raised by [`crate::FormatSpecification::normalize`] when a literal does
/// not conform to the declared format.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not parse '{literal}' as {expected}")]
pub struct FormatError {
    pub literal: String,
    pub expected: String,
}

impl FormatError {
    pub fn new(literal: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
            expected: expected.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Could not bind URI template variable '{variable}'")]
pub struct TemplateBindingError {
    pub variable: String,
}

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Unsupported URL scheme for {0}")]
    UnsupportedScheme(String),
    #[error("IO error reading {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {url}: {source}")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingMessage {
    pub message: String,
    pub source: Option<String>,
}

impl ProcessingMessage {
    pub fn new(message: impl Into<String>, source: Option<String>) -> Self {
        Self {
            message: message.into(),
            source,
        }
    }
}

impl std::fmt::Display for ProcessingMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} (at {})", self.message, source),
            None => write!(f, "{}", self.message),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProcessingState {
    warnings: Vec<ProcessingMessage>,
    errors: Vec<ProcessingMessage>,
}

impl ProcessingState {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>, source: Option<String>) {
        let message = ProcessingMessage::new(message, source);
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn add_error(&mut self, message: impl Into<String>, source: Option<String>) {
        self.errors.push(ProcessingMessage::new(message, source));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn get_warnings(&self) -> &[ProcessingMessage] {
        &self.warnings
    }

    pub fn get_errors(&self) -> &[ProcessingMessage] {
        &self.errors
    }

    pub fn take_warnings(&mut self) -> Vec<ProcessingMessage> {
        std::mem::take(&mut self.warnings)
    }

    /// Adds warnings that were already reported where they were raised.
    pub fn extend_warnings(&mut self, warnings: impl IntoIterator<Item = ProcessingMessage>) {
        self.warnings.extend(warnings);
    }
}

/// A recoverable problem found while parsing metadata. `path` is a
/// JSON-pointer-like location of the offending property.
pub type ParserWarning = ProcessingMessage;

/// Successful result of a metadata parse: either clean, or recovered from
/// one or more property-level problems that were replaced by defaults.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    Clean(T),
    Recovered(T, Vec<ParserWarning>),
}

impl<T> ParseOutcome<T> {
    pub(crate) fn from_state(value: T, mut state: ProcessingState) -> Self {
        if state.has_warnings() {
            ParseOutcome::Recovered(value, state.take_warnings())
        } else {
            ParseOutcome::Clean(value)
        }
    }

    pub fn value(&self) -> &T {
        match self {
            ParseOutcome::Clean(value) | ParseOutcome::Recovered(value, _) => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            ParseOutcome::Clean(value) | ParseOutcome::Recovered(value, _) => value,
        }
    }

    pub fn warnings(&self) -> &[ParserWarning] {
        match self {
            ParseOutcome::Clean(_) => &[],
            ParseOutcome::Recovered(_, warnings) => warnings,
        }
    }

    pub fn into_parts(self) -> (T, Vec<ParserWarning>) {
        match self {
            ParseOutcome::Clean(value) => (value, Vec::new()),
            ParseOutcome::Recovered(value, warnings) => (value, warnings),
        }
    }
}

/// Summary of a conversion run, in the shape the rest of the crate reports
/// outcomes.
#[derive(Debug)]
pub enum ProcessingOutcome {
    Success,
    SuccessWithWarnings(Vec<ProcessingMessage>),
    Failure {
        errors: Vec<ProcessingMessage>,
        warnings: Vec<ProcessingMessage>,
    },
}

impl ProcessingOutcome {
    pub fn from_state(state: ProcessingState) -> Self {
        if state.errors.is_empty() && state.warnings.is_empty() {
            ProcessingOutcome::Success
        } else if state.has_errors() {
            ProcessingOutcome::Failure {
                errors: state.errors,
                warnings: state.warnings,
            }
        } else {
            ProcessingOutcome::SuccessWithWarnings(state.warnings)
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, ProcessingOutcome::Failure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_state() {
        let state = ProcessingState::new();
        assert!(matches!(
            ProcessingOutcome::from_state(state),
            ProcessingOutcome::Success
        ));

        let mut state = ProcessingState::new();
        state.add_warning("lang must be a string", Some("$.lang".into()));
        assert!(matches!(
            ProcessingOutcome::from_state(state),
            ProcessingOutcome::SuccessWithWarnings(w) if w.len() == 1
        ));

        let mut state = ProcessingState::new();
        state.add_error("bad cell", None);
        state.add_warning("odd property", None);
        let outcome = ProcessingOutcome::from_state(state);
        assert!(!outcome.is_success());
    }

    #[test]
    fn test_parse_outcome_severity() {
        let mut state = ProcessingState::new();
        let clean = ParseOutcome::from_state(1, state.clone());
        assert!(clean.warnings().is_empty());

        state.add_warning("separator must be a string", Some("$.separator".into()));
        let recovered = ParseOutcome::from_state(2, state);
        assert_eq!(recovered.warnings().len(), 1);
        assert_eq!(recovered.into_value(), 2);
    }
}
