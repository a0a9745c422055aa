use std::sync::LazyLock;

use madrasa_common::{Error, Result};
use regex::Regex;

const MAX_TITLE_CHARS: usize = 255;
const MAX_CATEGORY_CHARS: usize = 100;

static PHONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{6,15}$").expect("valid phone regex"));

/// Input validation and sanitization for request fields.
pub struct InputValidator;

impl InputValidator {
    /// Sanitize multi-line input by removing control characters other than
    /// line breaks (`\n`, `\r`) and tabs.
    pub fn sanitize(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
            .collect()
    }

    /// Single-line fields: control characters stripped (newlines included),
    /// surrounding whitespace trimmed.
    pub fn sanitize_line(input: &str) -> String {
        input
            .chars()
            .filter(|c| !c.is_control())
            .collect::<String>()
            .trim()
            .to_string()
    }

    pub fn validate_title(title: &str) -> Result<()> {
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(Error::Validation(format!(
                "Title must be at most {MAX_TITLE_CHARS} characters"
            )));
        }
        Ok(())
    }

    pub fn validate_category(category: &str) -> Result<()> {
        if category.chars().count() > MAX_CATEGORY_CHARS {
            return Err(Error::Validation(format!(
                "Category must be at most {MAX_CATEGORY_CHARS} characters"
            )));
        }
        Ok(())
    }

    /// Digits with an optional leading `+`, with spaces and dashes ignored.
    pub fn normalize_phone_number(phone: &str) -> Result<String> {
        let compact: String = phone
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .collect();
        if !PHONE_NUMBER.is_match(&compact) {
            return Err(Error::Validation(format!("invalid phone number: {phone}")));
        }
        Ok(compact)
    }
}

#[cfg(test)]
mod tests {
    use super::InputValidator;

    #[test]
    fn sanitizes_control_chars_but_keeps_newlines_and_tabs() {
        let input = "hello\u{0000}\u{001F}\n\tworld";
        let sanitized = InputValidator::sanitize(input);
        assert_eq!(sanitized, "hello\n\tworld");
    }

    #[test]
    fn sanitize_keeps_crlf_line_endings() {
        let input = "first line\r\nsecond\u{0007} line\r\n";
        assert_eq!(
            InputValidator::sanitize(input),
            "first line\r\nsecond line\r\n"
        );
        assert_eq!(InputValidator::sanitize_line("title\r\n"), "title");
    }

    #[test]
    fn sanitize_line_drops_newlines_and_trims() {
        assert_eq!(InputValidator::sanitize_line("  Seerah\n "), "Seerah");
    }

    #[test]
    fn title_length_counts_characters_not_bytes() {
        let arabic = "ب".repeat(255);
        assert!(InputValidator::validate_title(&arabic).is_ok());
        assert!(InputValidator::validate_title(&"a".repeat(256)).is_err());
    }

    #[test]
    fn phone_numbers_are_normalized() {
        assert_eq!(
            InputValidator::normalize_phone_number("+880 1711-000000").unwrap(),
            "+8801711000000"
        );
        assert!(InputValidator::normalize_phone_number("call me").is_err());
        assert!(InputValidator::normalize_phone_number("123").is_err());
    }
}
