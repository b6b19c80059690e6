//! Date, time and dateTime formats.
//!
//! Patterns use the small UAX #35 subset CSVW allows: `yyyy`/`u`, `M`/`MM`,
//! `d`/`dd`, `H`/`HH`, `m`/`mm`, `s`/`ss`, runs of `S` for fractional
//! seconds and the offset letters `X`, `x` (one to three repetitions) and
//! `Z`. Anything else that is not a letter is matched literally, as is `T`.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

use super::FormatSpecification;
use crate::error::{FormatError, MetadataError};

static XSD_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d{4,})-(\d{2})-(\d{2})(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static XSD_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?(Z|[+-]\d{2}:\d{2})?$").unwrap()
});

static XSD_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-?\d{4,})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})(?:\.(\d+))?(Z|[+-]\d{2}:\d{2})?$",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalKind {
    Date,
    Time,
    DateTime,
}

impl TemporalKind {
    fn describe(self) -> &'static str {
        match self {
            TemporalKind::Date => "date",
            TemporalKind::Time => "time",
            TemporalKind::DateTime => "dateTime",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

/// Accepted shapes of a timezone offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OffsetStyle {
    /// `X`: `Z`, `±HH` or `±HHmm`
    UtcHoursOptionalMinutes,
    /// `XX` and `Z`: `Z` or `±HHmm`
    UtcHoursMinutes,
    /// `XXX`: `Z` or `±HH:mm`
    UtcExtended,
    /// `x`: `±HH` or `±HHmm`
    HoursOptionalMinutes,
    /// `xx`: `±HHmm`
    HoursMinutes,
    /// `xxx`: `±HH:mm`
    Extended,
}

impl OffsetStyle {
    fn accepts_utc_designator(self) -> bool {
        matches!(
            self,
            OffsetStyle::UtcHoursOptionalMinutes
                | OffsetStyle::UtcHoursMinutes
                | OffsetStyle::UtcExtended
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number { field: Field, min: usize, max: usize },
    Fraction(usize),
    Offset(OffsetStyle),
    Literal(char),
}

#[derive(Debug, Default)]
struct Parts {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
    fraction: Option<String>,
    offset_minutes: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Grammar {
    Pattern { source: String, tokens: Vec<Token> },
    Xsd,
}

/// A date, time or dateTime format. Built either from a user pattern or, for
/// columns without a `format`, from the XSD lexical grammar of the type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporalFormat {
    kind: TemporalKind,
    grammar: Grammar,
}

impl TemporalFormat {
    pub fn new(kind: TemporalKind, pattern: &str) -> Result<Self, MetadataError> {
        let tokens = compile_pattern(pattern)?;
        let has = |wanted: Field| {
            tokens
                .iter()
                .any(|t| matches!(t, Token::Number { field, .. } if *field == wanted))
        };
        let complete = match kind {
            TemporalKind::Date => has(Field::Year) && has(Field::Month) && has(Field::Day),
            TemporalKind::Time => has(Field::Hour),
            TemporalKind::DateTime => {
                has(Field::Year) && has(Field::Month) && has(Field::Day) && has(Field::Hour)
            }
        };
        if !complete {
            return Err(MetadataError::InvalidFormat(format!(
                "'{}' does not contain all the fields of a {}",
                pattern,
                kind.describe()
            )));
        }
        Ok(Self {
            kind,
            grammar: Grammar::Pattern {
                source: pattern.to_string(),
                tokens,
            },
        })
    }

    /// The format used when a column declares the type but no pattern.
    pub fn xsd(kind: TemporalKind) -> Self {
        Self {
            kind,
            grammar: Grammar::Xsd,
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        match &self.grammar {
            Grammar::Pattern { source, .. } => Some(source),
            Grammar::Xsd => None,
        }
    }

    fn parse(&self, literal: &str) -> Option<Parts> {
        let parts = match &self.grammar {
            Grammar::Pattern { tokens, .. } => match_tokens(tokens, literal)?,
            Grammar::Xsd => match_xsd(self.kind, literal)?,
        };
        if parts.year.is_some() || parts.month.is_some() || parts.day.is_some() {
            NaiveDate::from_ymd_opt(parts.year?, parts.month?, parts.day?)?;
        }
        if parts.hour.is_some() {
            NaiveTime::from_hms_opt(
                parts.hour?,
                parts.minute.unwrap_or(0),
                parts.second.unwrap_or(0),
            )?;
        }
        Some(parts)
    }

    fn render(&self, parts: &Parts) -> String {
        let extended_offset = matches!(self.grammar, Grammar::Xsd);
        let mut out = String::new();
        if matches!(self.kind, TemporalKind::Date | TemporalKind::DateTime) {
            out.push_str(&render_date(parts));
        }
        if self.kind == TemporalKind::DateTime {
            out.push('T');
        }
        if matches!(self.kind, TemporalKind::Time | TemporalKind::DateTime) {
            out.push_str(&render_time(parts));
        }
        if let Some(offset) = parts.offset_minutes {
            out.push_str(&render_offset(offset, extended_offset));
        }
        out
    }
}

impl FormatSpecification for TemporalFormat {
    fn is_valid(&self, literal: &str) -> bool {
        self.parse(literal).is_some()
    }

    fn normalize(&self, literal: &str) -> Result<String, FormatError> {
        let parts = self.parse(literal).ok_or_else(|| {
            let expected = match self.pattern() {
                Some(pattern) => format!("{} with format '{}'", self.kind.describe(), pattern),
                None => self.kind.describe().to_string(),
            };
            FormatError::new(literal, expected)
        })?;
        Ok(self.render(&parts))
    }
}

fn compile_pattern(pattern: &str) -> Result<Vec<Token>, MetadataError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }
        i += run;

        let number = |field: Field| match run {
            1 => Ok(Token::Number { field, min: 1, max: 2 }),
            2 => Ok(Token::Number { field, min: 2, max: 2 }),
            _ => Err(invalid_run(pattern, c, run)),
        };
        let token = match c {
            'y' if run == 4 => Token::Number {
                field: Field::Year,
                min: 4,
                max: 4,
            },
            'u' if run == 1 => Token::Number {
                field: Field::Year,
                min: 4,
                max: 4,
            },
            'M' => number(Field::Month)?,
            'd' => number(Field::Day)?,
            'H' => number(Field::Hour)?,
            'm' => number(Field::Minute)?,
            's' => number(Field::Second)?,
            'S' if run <= 9 => Token::Fraction(run),
            'X' => match run {
                1 => Token::Offset(OffsetStyle::UtcHoursOptionalMinutes),
                2 => Token::Offset(OffsetStyle::UtcHoursMinutes),
                3 => Token::Offset(OffsetStyle::UtcExtended),
                _ => return Err(invalid_run(pattern, c, run)),
            },
            'x' => match run {
                1 => Token::Offset(OffsetStyle::HoursOptionalMinutes),
                2 => Token::Offset(OffsetStyle::HoursMinutes),
                3 => Token::Offset(OffsetStyle::Extended),
                _ => return Err(invalid_run(pattern, c, run)),
            },
            'Z' if run == 1 => Token::Offset(OffsetStyle::UtcHoursMinutes),
            'T' => {
                tokens.extend(std::iter::repeat(Token::Literal('T')).take(run));
                continue;
            }
            c if c.is_ascii_alphabetic() => return Err(invalid_run(pattern, c, run)),
            c => {
                tokens.extend(std::iter::repeat(Token::Literal(c)).take(run));
                continue;
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

fn invalid_run(pattern: &str, c: char, run: usize) -> MetadataError {
    MetadataError::InvalidFormat(format!(
        "unsupported field '{}' in date/time pattern '{}'",
        c.to_string().repeat(run),
        pattern
    ))
}

fn take_digits(chars: &[char], pos: usize, max: usize) -> &[char] {
    let end = chars[pos..]
        .iter()
        .take(max)
        .take_while(|c| c.is_ascii_digit())
        .count();
    &chars[pos..pos + end]
}

fn digits_value(digits: &[char]) -> Option<u32> {
    digits.iter().collect::<String>().parse().ok()
}

fn match_tokens(tokens: &[Token], literal: &str) -> Option<Parts> {
    let chars: Vec<char> = literal.chars().collect();
    let mut parts = Parts::default();
    let mut pos = 0;
    for token in tokens {
        match token {
            Token::Literal(expected) => {
                if chars.get(pos) != Some(expected) {
                    return None;
                }
                pos += 1;
            }
            Token::Number { field, min, max } => {
                let digits = take_digits(&chars, pos, *max);
                if digits.len() < *min {
                    return None;
                }
                pos += digits.len();
                let value = digits_value(digits)?;
                match field {
                    Field::Year => parts.year = Some(value as i32),
                    Field::Month => parts.month = Some(value),
                    Field::Day => parts.day = Some(value),
                    Field::Hour => parts.hour = Some(value),
                    Field::Minute => parts.minute = Some(value),
                    Field::Second => parts.second = Some(value),
                }
            }
            Token::Fraction(max) => {
                let digits = take_digits(&chars, pos, *max);
                if digits.is_empty() {
                    return None;
                }
                pos += digits.len();
                parts.fraction = Some(digits.iter().collect());
            }
            Token::Offset(style) => {
                let (minutes, consumed) = match_offset(&chars[pos..], *style)?;
                pos += consumed;
                parts.offset_minutes = Some(minutes);
            }
        }
    }
    (pos == chars.len()).then_some(parts)
}

fn match_offset(rest: &[char], style: OffsetStyle) -> Option<(i32, usize)> {
    let first = *rest.first()?;
    if first == 'Z' {
        return style.accepts_utc_designator().then_some((0, 1));
    }
    let sign = match first {
        '+' => 1,
        '-' => -1,
        _ => return None,
    };
    let two_digits = |at: usize| -> Option<i32> {
        let slice = rest.get(at..at + 2)?;
        if slice.iter().all(|c| c.is_ascii_digit()) {
            digits_value(slice).map(|v| v as i32)
        } else {
            None
        }
    };
    let hours = two_digits(1)?;
    let (minutes, consumed) = match style {
        OffsetStyle::UtcHoursOptionalMinutes | OffsetStyle::HoursOptionalMinutes => {
            match two_digits(3) {
                Some(minutes) => (minutes, 5),
                None => (0, 3),
            }
        }
        OffsetStyle::UtcHoursMinutes | OffsetStyle::HoursMinutes => (two_digits(3)?, 5),
        OffsetStyle::UtcExtended | OffsetStyle::Extended => {
            if rest.get(3) != Some(&':') {
                return None;
            }
            (two_digits(4)?, 6)
        }
    };
    if hours > 18 || minutes > 59 {
        return None;
    }
    Some((sign * (hours * 60 + minutes), consumed))
}

fn match_xsd(kind: TemporalKind, literal: &str) -> Option<Parts> {
    let mut parts = Parts::default();
    let offset_group = |text: &str| -> Option<i32> {
        if text == "Z" {
            return Some(0);
        }
        let chars: Vec<char> = text.chars().collect();
        match_offset(&chars, OffsetStyle::Extended).map(|(minutes, _)| minutes)
    };
    match kind {
        TemporalKind::Date => {
            let caps = XSD_DATE.captures(literal)?;
            parts.year = caps[1].parse().ok();
            parts.month = caps[2].parse().ok();
            parts.day = caps[3].parse().ok();
            if let Some(offset) = caps.get(4) {
                parts.offset_minutes = Some(offset_group(offset.as_str())?);
            }
        }
        TemporalKind::Time => {
            let caps = XSD_TIME.captures(literal)?;
            parts.hour = caps[1].parse().ok();
            parts.minute = caps[2].parse().ok();
            parts.second = caps[3].parse().ok();
            parts.fraction = caps.get(4).map(|m| m.as_str().to_string());
            if let Some(offset) = caps.get(5) {
                parts.offset_minutes = Some(offset_group(offset.as_str())?);
            }
        }
        TemporalKind::DateTime => {
            let caps = XSD_DATETIME.captures(literal)?;
            parts.year = caps[1].parse().ok();
            parts.month = caps[2].parse().ok();
            parts.day = caps[3].parse().ok();
            parts.hour = caps[4].parse().ok();
            parts.minute = caps[5].parse().ok();
            parts.second = caps[6].parse().ok();
            parts.fraction = caps.get(7).map(|m| m.as_str().to_string());
            if let Some(offset) = caps.get(8) {
                parts.offset_minutes = Some(offset_group(offset.as_str())?);
            }
        }
    }
    Some(parts)
}

fn render_date(parts: &Parts) -> String {
    let year = parts.year.unwrap_or_default();
    let year = if year < 0 {
        format!("-{:04}", -year)
    } else {
        format!("{:04}", year)
    };
    format!(
        "{}-{:02}-{:02}",
        year,
        parts.month.unwrap_or(1),
        parts.day.unwrap_or(1)
    )
}

fn render_time(parts: &Parts) -> String {
    let mut out = format!(
        "{:02}:{:02}:{:02}",
        parts.hour.unwrap_or(0),
        parts.minute.unwrap_or(0),
        parts.second.unwrap_or(0)
    );
    if let Some(fraction) = &parts.fraction {
        let fraction = fraction.trim_end_matches('0');
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(fraction);
        }
    }
    out
}

/// Zero collapses to `Z`. Patterned formats drop a zero minute component
/// (`-08`), the XSD default keeps the `±HH:MM` lexical form.
fn render_offset(minutes: i32, extended: bool) -> String {
    if minutes == 0 {
        return "Z".to_string();
    }
    let sign = if minutes < 0 { '-' } else { '+' };
    let hours = minutes.abs() / 60;
    let mins = minutes.abs() % 60;
    if mins == 0 && !extended {
        format!("{}{:02}", sign, hours)
    } else {
        format!("{}{:02}:{:02}", sign, hours, mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(kind: TemporalKind, pattern: &str, input: &str, expected: Option<&str>) {
        let format = TemporalFormat::new(kind, pattern).unwrap();
        assert_eq!(
            format.is_valid(input),
            expected.is_some(),
            "validity of '{}' against '{}'",
            input,
            pattern
        );
        match expected {
            Some(expected) => assert_eq!(format.normalize(input).unwrap(), expected),
            None => assert!(format.normalize(input).is_err()),
        }
    }

    #[test]
    fn test_date_patterns() {
        let cases = [
            ("yyyy-MM-dd", "2015-03-22"),
            ("yyyyMMdd", "20150322"),
            ("dd-MM-yyyy", "22-03-2015"),
            ("d-M-yyyy", "22-3-2015"),
            ("M-d-yyyy", "3-22-2015"),
            ("dd/MM/yyyy", "22/03/2015"),
            ("d/M/yyyy", "22/3/2015"),
            ("MM.dd.yyyy", "03.22.2015"),
            ("u-MM-dd", "2015-03-22"),
        ];
        for (pattern, input) in cases {
            check(TemporalKind::Date, pattern, input, Some("2015-03-22"));
        }
        check(TemporalKind::Date, "dd/MM/yyyy", "31/02/2015", None);
        check(TemporalKind::Date, "dd/MM/yyyy", "22/03/15", None);
    }

    #[test]
    fn test_time_patterns() {
        let t = TemporalKind::Time;
        check(t, "HH:mm:ss.SSS", "15:02:37.143", Some("15:02:37.143"));
        check(t, "HH:mm", "15:02", Some("15:02:00"));
        check(t, "HH:mm:ss.S", "15:02:37.1", Some("15:02:37.1"));
        check(t, "HHmmss", "150237", Some("15:02:37"));
        check(t, "HHmm", "1502", Some("15:02:00"));
    }

    #[test]
    fn test_offset_tokens() {
        let t = TemporalKind::Time;
        check(t, "HH:mm:ss.SSSX", "15:02:37.143Z", Some("15:02:37.143Z"));
        check(t, "HH:mm:ss.SSSX", "15:02:37.143-08", Some("15:02:37.143-08"));
        check(t, "HH:mm:ss.SSSX", "15:02:37.143+0530", Some("15:02:37.143+05:30"));
        check(t, "HH:mm:ss.SSSXX", "15:02:37.143-08", None);
        check(t, "HH:mm:ss.SSSXX", "15:02:37.143-0800", Some("15:02:37.143-08"));
        check(t, "HH:mm:ss.SSSXXX", "15:02:37.143+0530", None);
        check(t, "HH:mm:ss.SSSXXX", "15:02:37.143+05:30", Some("15:02:37.143+05:30"));
        check(t, "HH:mm:ss.SSSx", "15:02:37.143Z", None);
        check(t, "HH:mm:ss.SSSx", "15:02:37.143+00", Some("15:02:37.143Z"));
        check(t, "HH:mm:ss.SSSxx", "15:02:37.143+0000", Some("15:02:37.143Z"));
        check(t, "HH:mm:ss.SSSxxx", "15:02:37.143+00:00", Some("15:02:37.143Z"));
        check(t, "HH:mm:ss.SSSxxx", "15:02:37.143-0800", None);
    }

    #[test]
    fn test_datetime_patterns() {
        let dt = TemporalKind::DateTime;
        check(
            dt,
            "yyyy-MM-ddTHH:mm:ss.SSSxx",
            "2015-03-15T15:02:37.143+0000",
            Some("2015-03-15T15:02:37.143Z"),
        );
        check(dt, "yyyy-MM-ddTHH:mm:ss.SSSxx", "2015-03-15T15:02:37.143-08", None);
        check(
            dt,
            "dd-MM-yyyy HH:mm:ss.S",
            "15-03-2015 15:02:37.1",
            Some("2015-03-15T15:02:37.1"),
        );
        check(dt, "M.d.yyyy HHmm", "3.15.2015 1502", Some("2015-03-15T15:02:00"));
        check(
            dt,
            "yyyy-MM-ddTHH:mm:ss.SSSZ",
            "2015-03-15T15:02:37.143+0530",
            Some("2015-03-15T15:02:37.143+05:30"),
        );
        check(
            dt,
            "yyyy-M-dTH:m:sZ",
            "2019-03-16T15:03:23Z",
            Some("2019-03-16T15:03:23Z"),
        );
    }

    #[test]
    fn test_xsd_defaults() {
        let date = TemporalFormat::xsd(TemporalKind::Date);
        assert_eq!(date.normalize("2015-03-22").unwrap(), "2015-03-22");
        assert_eq!(date.normalize("2015-03-22+00:00").unwrap(), "2015-03-22Z");
        assert!(!date.is_valid("22/03/2015"));

        let datetime = TemporalFormat::xsd(TemporalKind::DateTime);
        assert_eq!(
            datetime.normalize("2015-03-15T15:02:37.1400-08:00").unwrap(),
            "2015-03-15T15:02:37.14-08:00"
        );
        assert!(!datetime.is_valid("2015-03-15 15:02:37"));

        let time = TemporalFormat::xsd(TemporalKind::Time);
        assert!(time.is_valid("23:59:59"));
        assert!(!time.is_valid("25:00:00"));
    }

    #[test]
    fn test_incomplete_or_unknown_patterns() {
        assert!(TemporalFormat::new(TemporalKind::Date, "yyyy-MM").is_err());
        assert!(TemporalFormat::new(TemporalKind::Date, "yy-MM-dd").is_err());
        assert!(TemporalFormat::new(TemporalKind::Time, "HH:mm a").is_err());
    }
}
