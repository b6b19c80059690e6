//! Numeric formats.
//!
//! A pattern is built from `0` (required digit), `#` (optional digit), the
//! decimal and group characters, `E` with an optional `+` for exponents and a
//! trailing `%` or `‰`. Without a pattern the generic numeric grammar
//! applies. Normalization strips grouping, maps the decimal character to `.`
//! and re-serializes: exponent forms through `f64`, everything else as a
//! fixed-point decimal that keeps the written precision.

use once_cell::sync::Lazy;
use regex::Regex;

use super::FormatSpecification;
use crate::error::{FormatError, MetadataError};

static GENERIC_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[+-]?\d+(?:\.\d+)?(?:E[+-]?\d+|%|‰)?|NaN|-?INF)$").unwrap()
});

#[derive(Debug, Clone)]
pub struct NumericFormat {
    decimal_char: char,
    group_char: Option<char>,
    pattern: Option<String>,
    regex: Regex,
}

impl PartialEq for NumericFormat {
    fn eq(&self, other: &Self) -> bool {
        self.decimal_char == other.decimal_char
            && self.group_char == other.group_char
            && self.pattern == other.pattern
    }
}

impl NumericFormat {
    pub fn new(
        decimal_char: char,
        group_char: Option<char>,
        pattern: Option<&str>,
    ) -> Result<Self, MetadataError> {
        if group_char == Some(decimal_char) {
            return Err(MetadataError::InvalidFormat(format!(
                "decimalChar and groupChar are both '{}'",
                decimal_char
            )));
        }
        let source = match pattern {
            Some(pattern) => pattern_regex(pattern, decimal_char, group_char)?,
            None => generic_regex(decimal_char, group_char),
        };
        let regex = Regex::new(&source)
            .map_err(|e| MetadataError::InvalidFormat(format!("numeric pattern: {}", e)))?;
        Ok(Self {
            decimal_char,
            group_char,
            pattern: pattern.map(str::to_string),
            regex,
        })
    }

    /// A format given as a bare string: the pattern with `.` decimals and
    /// `,` grouping.
    pub fn from_pattern(pattern: &str) -> Result<Self, MetadataError> {
        Self::new('.', Some(','), Some(pattern))
    }

    /// The grammar used when a numeric column has no format.
    pub fn generic() -> Self {
        Self {
            decimal_char: '.',
            group_char: None,
            pattern: None,
            regex: GENERIC_NUMBER.clone(),
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }
}

impl FormatSpecification for NumericFormat {
    fn is_valid(&self, literal: &str) -> bool {
        self.regex.is_match(literal)
            && (is_special(literal) || literal.contains(|c: char| c.is_ascii_digit()))
    }

    fn normalize(&self, literal: &str) -> Result<String, FormatError> {
        if !self.is_valid(literal) {
            let expected = match &self.pattern {
                Some(pattern) => format!("a number with pattern '{}'", pattern),
                None => "a number".to_string(),
            };
            return Err(FormatError::new(literal, expected));
        }
        if is_special(literal) {
            return Ok(literal.to_string());
        }

        let mut cleaned: String = literal
            .chars()
            .filter(|c| Some(*c) != self.group_char)
            .map(|c| if c == self.decimal_char { '.' } else { c })
            .collect();

        if cleaned.contains('E') {
            let value: f64 = cleaned
                .parse()
                .map_err(|_| FormatError::new(literal, "a floating point number"))?;
            return Ok(format_double(value));
        }

        let scale = if cleaned.ends_with('%') {
            cleaned.pop();
            2
        } else if cleaned.ends_with('‰') {
            cleaned.pop();
            3
        } else {
            0
        };
        Ok(canonical_decimal(&cleaned, scale))
    }
}

fn is_special(literal: &str) -> bool {
    matches!(literal, "NaN" | "INF" | "-INF")
}

fn generic_regex(decimal_char: char, group_char: Option<char>) -> String {
    let decimal = regex::escape(&decimal_char.to_string());
    let digit_or_group = match group_char {
        Some(g) => format!(r"(?:\d|{})", regex::escape(&g.to_string())),
        None => r"\d".to_string(),
    };
    format!(
        r"^(?:[+-]?\d{}*(?:{}\d+)?(?:E[+-]?\d+|%|‰)?|NaN|-?INF)$",
        digit_or_group, decimal
    )
}

fn pattern_regex(
    pattern: &str,
    decimal_char: char,
    group_char: Option<char>,
) -> Result<String, MetadataError> {
    let allowed = |c: char| {
        matches!(c, '0' | '#' | 'E' | '+' | '%' | '‰') || c == decimal_char || Some(c) == group_char
    };
    if pattern.is_empty() || !pattern.chars().all(allowed) {
        return Err(MetadataError::InvalidFormat(format!(
            "invalid numeric pattern '{}'",
            pattern
        )));
    }

    let (mantissa, exponent) = match pattern.split_once('E') {
        Some((m, e)) => (m, Some(e)),
        None => (pattern, None),
    };
    let (mantissa, suffix) = if let Some(m) = mantissa.strip_suffix('%') {
        (m, "%")
    } else if let Some(m) = mantissa.strip_suffix('‰') {
        (m, "‰")
    } else {
        (mantissa, "")
    };
    let (sign, mantissa) = match mantissa.strip_prefix('+') {
        Some(rest) => ("[+-]", rest),
        None => ("[+-]?", mantissa),
    };
    let (integer, fraction) = match mantissa.split_once(decimal_char) {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };

    let mut source = format!("^(?:{}", sign);
    source.push_str(&integer_regex(integer, group_char, pattern)?);
    if let Some(fraction) = fraction {
        let required = fraction.chars().filter(|c| *c == '0').count();
        let total = fraction.chars().filter(|c| matches!(c, '0' | '#')).count();
        let decimal = regex::escape(&decimal_char.to_string());
        if required > 0 {
            source.push_str(&format!(r"{}\d{{{},{}}}", decimal, required, total));
        } else if total > 0 {
            source.push_str(&format!(r"(?:{}\d{{1,{}}})?", decimal, total));
        }
    }
    if let Some(exponent) = exponent {
        let (exp_sign, digits) = match exponent.strip_prefix('+') {
            Some(rest) => ("[+-]", rest),
            None => ("-?", exponent),
        };
        let required = digits.chars().filter(|c| *c == '0').count().max(1);
        source.push_str(&format!(r"E{}\d{{{},}}", exp_sign, required));
    }
    source.push_str(&regex::escape(suffix));
    source.push_str("|NaN|-?INF)$");
    Ok(source)
}

fn integer_regex(
    integer: &str,
    group_char: Option<char>,
    pattern: &str,
) -> Result<String, MetadataError> {
    let required = integer.chars().filter(|c| *c == '0').count();
    match group_char.filter(|g| integer.contains(*g)) {
        Some(group) => {
            let group_size = integer
                .rsplit(group)
                .next()
                .map(|tail| tail.chars().count())
                .unwrap_or(0);
            if group_size == 0 {
                return Err(MetadataError::InvalidFormat(format!(
                    "empty digit group in numeric pattern '{}'",
                    pattern
                )));
            }
            Ok(format!(
                r"\d{{1,{size}}}(?:{group}\d{{{size}}})*",
                size = group_size,
                group = regex::escape(&group.to_string())
            ))
        }
        None if required > 0 => Ok(format!(r"\d{{{},}}", required)),
        None => Ok(r"\d*".to_string()),
    }
}

/// Fixed-point rendering of `[+-]digits[.digits]`, shifting the decimal
/// point `scale` places left.
fn canonical_decimal(value: &str, scale: usize) -> String {
    let (negative, unsigned) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.trim_start_matches('+')),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (unsigned.to_string(), String::new()),
    };

    let (integer, fraction) = if scale > 0 {
        let digits = format!("{}{}", integer, fraction);
        let point = integer.len() as isize - scale as isize;
        if point <= 0 {
            let padding = "0".repeat((-point) as usize);
            ("0".to_string(), format!("{}{}", padding, digits))
        } else {
            let (i, f) = digits.split_at(point as usize);
            (i.to_string(), f.to_string())
        }
    } else {
        (integer, fraction)
    };

    let integer = match integer.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let is_zero = integer == "0" && fraction.chars().all(|c| c == '0');
    let mut out = String::new();
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(integer);
    if !fraction.is_empty() {
        out.push('.');
        out.push_str(&fraction);
    }
    out
}

fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "INF" } else { "-INF" };
        text.to_string()
    } else if value != 0.0 && (value.abs() >= 1e15 || value.abs() < 1e-6) {
        format!("{:E}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_grammar() {
        let format = NumericFormat::generic();
        for literal in ["1", "-1.5", "+12", "1E3", "5%", "NaN", "-INF"] {
            assert!(format.is_valid(literal), "{} should be valid", literal);
        }
        for literal in ["", "1.", ".5", "1,000", "abc", "1e3"] {
            assert!(!format.is_valid(literal), "{} should be invalid", literal);
        }
    }

    #[test]
    fn test_normalize_decimal() {
        let format = NumericFormat::generic();
        assert_eq!(format.normalize("+007.50").unwrap(), "7.50");
        assert_eq!(format.normalize("-0").unwrap(), "0");
        assert_eq!(format.normalize("1.5E3").unwrap(), "1500");
        assert_eq!(format.normalize("50%").unwrap(), "0.50");
        assert_eq!(format.normalize("5‰").unwrap(), "0.005");
        assert_eq!(format.normalize("INF").unwrap(), "INF");
        assert!(format.normalize("twelve").is_err());
    }

    #[test]
    fn test_custom_separators() {
        let format = NumericFormat::new(',', Some('.'), None).unwrap();
        assert!(format.is_valid("1.234.567,89"));
        assert_eq!(format.normalize("1.234.567,89").unwrap(), "1234567.89");
        assert!(NumericFormat::new(',', Some(','), None).is_err());
    }

    #[test]
    fn test_pattern() {
        let format = NumericFormat::from_pattern("#,##0.00").unwrap();
        assert!(format.is_valid("1,234.50"));
        assert!(format.is_valid("12.00"));
        assert!(!format.is_valid("1234.50"));
        assert!(!format.is_valid("12.5"));
        assert_eq!(format.normalize("1,234.50").unwrap(), "1234.50");

        let exponent = NumericFormat::from_pattern("0.0E0").unwrap();
        assert!(exponent.is_valid("1.5E3"));
        assert_eq!(exponent.normalize("1.5E3").unwrap(), "1500");

        assert!(NumericFormat::from_pattern("##0.0x").is_err());
    }
}
