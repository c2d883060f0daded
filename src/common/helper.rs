//! Helper utilities for building safe SQL text

use crate::common::constants::{BLANK_CATEGORY_LABEL, RESERVED_KEYWORDS};
use crate::common::error::PivotResult;
use crate::invalid_spec_err;
use regex::Regex;
use std::sync::OnceLock;

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"))
}

fn affix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]*$").expect("valid affix regex"))
}

/// Check whether a string is a plain, unquoted column identifier
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Validate a column identifier, naming its role in the error message
pub fn validate_identifier(role: &str, name: &str) -> PivotResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid_spec_err!("{} must not be blank", role));
    }
    if !is_valid_identifier(trimmed) {
        return Err(invalid_spec_err!(
            "{} '{}' is not a valid column identifier (expected [A-Za-z_][A-Za-z0-9_]*)",
            role,
            trimmed
        ));
    }
    Ok(trimmed.to_string())
}

/// Validate a column-name prefix or suffix
pub fn validate_affix(role: &str, affix: &str) -> PivotResult<String> {
    if !affix_pattern().is_match(affix) {
        return Err(invalid_spec_err!(
            "{} '{}' may only contain letters, digits and underscores",
            role,
            affix
        ));
    }
    Ok(affix.to_string())
}

pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS
        .iter()
        .any(|kw| kw.eq_ignore_ascii_case(name))
}

/// Render an identifier, backtick-quoting reserved keywords and names that
/// are not plain identifiers (e.g. a generated name with a leading digit)
pub fn quote_identifier(name: &str) -> String {
    if is_reserved_keyword(name) || !is_valid_identifier(name) {
        format!("`{}`", name)
    } else {
        name.to_string()
    }
}

/// Render a string as a GoogleSQL single-quoted literal.
///
/// Backslash, quote and control characters are escaped so the literal can
/// never terminate early.
pub fn quote_string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Normalize a category value into a label usable inside a column name
pub fn normalize_label(raw: &str) -> String {
    let mut label = String::with_capacity(raw.len());
    let mut last_was_underscore = false;
    for c in raw.trim().chars() {
        let mapped = if c.is_ascii_alphanumeric() {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' {
            if !last_was_underscore {
                label.push('_');
            }
            last_was_underscore = true;
        } else {
            label.push(mapped);
            last_was_underscore = false;
        }
    }

    let label = label.trim_matches('_');
    if label.is_empty() {
        BLANK_CATEGORY_LABEL.to_string()
    } else {
        label.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("index column", " user_id ").unwrap(), "user_id");
        assert!(validate_identifier("index column", "").is_err());
        assert!(validate_identifier("index column", "   ").is_err());
        assert!(validate_identifier("value column", "1st").is_err());
        assert!(validate_identifier("value column", "a;DROP TABLE x").is_err());
        assert!(validate_identifier("value column", "_private").is_ok());
    }

    #[test]
    fn test_validate_affix() {
        assert!(validate_affix("prefix", "").is_ok());
        assert!(validate_affix("prefix", "n_").is_ok());
        assert!(validate_affix("suffix", "_2024").is_ok());
        assert!(validate_affix("suffix", "-x").is_err());
    }

    #[test]
    fn test_quote_identifier_reserved() {
        assert_eq!(quote_identifier("user_id"), "user_id");
        assert_eq!(quote_identifier("group"), "`group`");
        assert_eq!(quote_identifier("Select"), "`Select`");
        assert_eq!(quote_identifier("2024_count_click"), "`2024_count_click`");
        assert_eq!(quote_identifier("_2024"), "_2024");
    }

    #[test]
    fn test_quote_string_literal_escapes() {
        assert_eq!(quote_string_literal("click"), "'click'");
        assert_eq!(quote_string_literal("it's"), r"'it\'s'");
        assert_eq!(quote_string_literal(r"a\b"), r"'a\\b'");
        assert_eq!(quote_string_literal("a\nb"), r"'a\nb'");
        assert_eq!(quote_string_literal("\u{1}"), r"'\u0001'");
        assert_eq!(quote_string_literal(r"\'); DROP"), r"'\\\'); DROP'");
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("click"), "click");
        assert_eq!(normalize_label("Page View"), "page_view");
        assert_eq!(normalize_label("  a--b  "), "a_b");
        assert_eq!(normalize_label("__x__"), "x");
        assert_eq!(normalize_label("2024-01"), "2024_01");
        assert_eq!(normalize_label("!!!"), "blank");
        assert_eq!(normalize_label(""), "blank");
        assert_eq!(normalize_label("café"), "caf");
    }
}
