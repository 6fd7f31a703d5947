//! Message-body validation: non-emptiness, length cap, and a dangerous-content
//! denylist.

use std::sync::LazyLock;

static DANGEROUS_PATTERNS: LazyLock<Vec<regex::Regex>> = LazyLock::new(|| {
    vec![
        regex::Regex::new(r"(?i)<script[\s>]").unwrap(),
        regex::Regex::new(r"(?i)javascript:").unwrap(),
        regex::Regex::new(r"(?i)\bon\w+\s*=").unwrap(),
        regex::Regex::new(r"(?i)data:text/html").unwrap(),
    ]
});

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    Empty,
    #[error("message exceeds maximum length of {0} characters")]
    TooLong(usize),
    #[error("message contains disallowed content")]
    Dangerous,
}

pub fn validate_message(message: &str, max_chars: usize) -> Result<(), ValidationError> {
    if message.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if message.chars().count() > max_chars {
        return Err(ValidationError::TooLong(max_chars));
    }
    if DANGEROUS_PATTERNS.iter().any(|pattern| pattern.is_match(message)) {
        return Err(ValidationError::Dangerous);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_message() {
        assert!(matches!(validate_message("   ", 100), Err(ValidationError::Empty)));
    }

    #[test]
    fn rejects_overlong_message() {
        let long = "a".repeat(101);
        assert!(matches!(validate_message(&long, 100), Err(ValidationError::TooLong(100))));
    }

    #[test]
    fn rejects_script_tags_and_javascript_scheme() {
        assert!(validate_message("<script>alert(1)</script>", 100).is_err());
        assert!(validate_message("click me: javascript:alert(1)", 100).is_err());
        assert!(validate_message("<img onerror=alert(1)>", 100).is_err());
        assert!(validate_message("<a href=data:text/html;base64,x>", 100).is_err());
    }

    #[test]
    fn accepts_ordinary_message() {
        assert!(validate_message("what's the status of my order?", 100).is_ok());
    }
}
