//! BCP 47 language tag syntax check.

use once_cell::sync::Lazy;
use regex::Regex;

static LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| {
    let regular = "(?:art-lojban|cel-gaulish|no-bok|no-nyn|zh-guoyu|zh-hakka|zh-min|zh-min-nan|zh-xiang)";
    let irregular = "(?:en-GB-oed|i-ami|i-bnn|i-default|i-enochian|i-hak|i-klingon|i-lux|i-mingo|i-navajo|i-pwn|i-tao|i-tay|i-tsu|sgn-BE-FR|sgn-BE-NL|sgn-CH-DE)";
    let grandfathered = format!("(?:{}|{})", irregular, regular);
    let private_use = "(?:x(?:-[A-Za-z0-9]{1,8})+)";
    let singleton = "[0-9A-WY-Za-wy-z]";
    let extension = format!("(?:{}(?:-[A-Za-z0-9]{{2,8}})+)", singleton);
    let variant = "(?:[A-Za-z0-9]{5,8}|[0-9][A-Za-z0-9]{3})";
    let region = "(?:[A-Za-z]{2}|[0-9]{3})";
    let script = "(?:[A-Za-z]{4})";
    let extlang = "(?:[A-Za-z]{3}(?:-[A-Za-z]{3}){0,2})";
    let language = format!("(?:[A-Za-z]{{2,3}}(?:-{})?|[A-Za-z]{{4}}|[A-Za-z]{{5,8}})", extlang);
    let langtag = format!(
        "(?:{}(?:-{})?(?:-{})?(?:-{})*(?:-{})*(?:-{})?)",
        language, script, region, variant, extension, private_use
    );
    Regex::new(&format!(
        "^(?:{}|{}|{})$",
        grandfathered, langtag, private_use
    ))
    .unwrap()
});

pub fn is_valid_language_tag(tag: &str) -> bool {
    LANGUAGE_TAG.is_match(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_tags() {
        for tag in ["en", "en-GB", "zh-Hant-TW", "und", "de-CH-1996", "x-private", "i-klingon"] {
            assert!(is_valid_language_tag(tag), "{} should be valid", tag);
        }
        for tag in ["", "english-language", "en_GB", "1en", "en-"] {
            assert!(!is_valid_language_tag(tag), "{} should be invalid", tag);
        }
    }
}
