use serde::{Deserialize, Serialize};

/// How leading and trailing whitespace is removed from fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TrimValue", into = "TrimValue")]
pub enum Trim {
    True,
    False,
    Start,
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum TrimValue {
    Flag(bool),
    Text(String),
}

impl TryFrom<TrimValue> for Trim {
    type Error = String;

    fn try_from(value: TrimValue) -> Result<Self, Self::Error> {
        match value {
            TrimValue::Flag(true) => Ok(Trim::True),
            TrimValue::Flag(false) => Ok(Trim::False),
            TrimValue::Text(text) => match text.as_str() {
                "true" => Ok(Trim::True),
                "false" => Ok(Trim::False),
                "start" => Ok(Trim::Start),
                "end" => Ok(Trim::End),
                other => Err(format!("invalid trim value '{}'", other)),
            },
        }
    }
}

impl From<Trim> for TrimValue {
    fn from(trim: Trim) -> Self {
        match trim {
            Trim::True => TrimValue::Flag(true),
            Trim::False => TrimValue::Flag(false),
            Trim::Start => TrimValue::Text("start".to_string()),
            Trim::End => TrimValue::Text("end".to_string()),
        }
    }
}

impl Trim {
    pub fn apply<'a>(&self, field: &'a str) -> &'a str {
        match self {
            Trim::True => field.trim(),
            Trim::False => field,
            Trim::Start => field.trim_start(),
            Trim::End => field.trim_end(),
        }
    }
}

/// CSV parsing parameters of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Dialect {
    pub comment_prefix: Option<String>,
    pub delimiter: String,
    pub double_quote: bool,
    pub encoding: String,
    pub header: bool,
    pub header_row_count: Option<usize>,
    pub line_terminators: Vec<String>,
    pub quote_char: Option<String>,
    pub skip_blank_rows: bool,
    pub skip_columns: usize,
    pub skip_initial_space: bool,
    pub skip_rows: usize,
    pub trim: Option<Trim>,
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            comment_prefix: Some("#".to_string()),
            delimiter: ",".to_string(),
            double_quote: true,
            encoding: "utf-8".to_string(),
            header: true,
            header_row_count: None,
            line_terminators: vec!["\n".to_string(), "\r\n".to_string()],
            quote_char: Some("\"".to_string()),
            skip_blank_rows: false,
            skip_columns: 0,
            skip_initial_space: false,
            skip_rows: 0,
            trim: None,
        }
    }
}

pub(crate) const DIALECT_KEYS: &[&str] = &[
    "commentPrefix",
    "delimiter",
    "doubleQuote",
    "encoding",
    "header",
    "headerRowCount",
    "lineTerminators",
    "quoteChar",
    "skipBlankRows",
    "skipColumns",
    "skipInitialSpace",
    "skipRows",
    "trim",
];

impl Dialect {
    /// Fill in `headerRowCount` from `header` and `trim` from
    /// `skipInitialSpace` when they were not given explicitly.
    pub fn with_derived_defaults(mut self) -> Self {
        if self.header_row_count.is_none() {
            self.header_row_count = Some(if self.header { 1 } else { 0 });
        }
        if self.trim.is_none() {
            self.trim = Some(if self.skip_initial_space {
                Trim::Start
            } else {
                Trim::False
            });
        }
        self
    }

    pub fn header_row_count(&self) -> usize {
        self.header_row_count
            .unwrap_or(if self.header { 1 } else { 0 })
    }

    pub fn effective_trim(&self) -> Trim {
        self.trim.unwrap_or(if self.skip_initial_space {
            Trim::Start
        } else {
            Trim::False
        })
    }

    /// A `csv` reader configured for this dialect. Header rows are handled
    /// by the caller, so the reader itself never consumes one.
    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .double_quote(self.double_quote)
            .comment(single_byte(self.comment_prefix.as_deref()));
        if let Some(delimiter) = single_byte(Some(&self.delimiter)) {
            builder.delimiter(delimiter);
        }
        match single_byte(self.quote_char.as_deref()) {
            Some(quote) => {
                builder.quote(quote);
            }
            None => {
                builder.quoting(false);
            }
        }
        let custom_terminator = self
            .line_terminators
            .iter()
            .find(|t| !matches!(t.as_str(), "\n" | "\r\n" | "\r"));
        if let Some(terminator) = custom_terminator.and_then(|t| single_byte(Some(t))) {
            builder.terminator(csv::Terminator::Any(terminator));
        }
        builder
    }

    /// Settings the `csv` reader cannot honour because they are longer than
    /// one byte. The reader falls back to its default for each of them.
    pub fn unsupported_settings(&self) -> Vec<String> {
        let mut messages = Vec::new();
        let mut check = |property: &str, value: Option<&str>, fallback: &str| {
            if let Some(value) = value {
                if single_byte(Some(value)).is_none() {
                    messages.push(format!(
                        "{} '{}' is not a single byte, using {}",
                        property,
                        value.escape_debug(),
                        fallback
                    ));
                }
            }
        };
        check("delimiter", Some(self.delimiter.as_str()), "','");
        check("quoteChar", self.quote_char.as_deref(), "no quoting");
        check("commentPrefix", self.comment_prefix.as_deref(), "no comments");
        for terminator in self
            .line_terminators
            .iter()
            .filter(|t| !matches!(t.as_str(), "\n" | "\r\n" | "\r"))
        {
            check("lineTerminators", Some(terminator.as_str()), "the standard line endings");
        }
        messages
    }
}

fn single_byte(value: Option<&str>) -> Option<u8> {
    match value.map(str::as_bytes) {
        Some([byte]) => Some(*byte),
        _ => None,
    }
}
