//! Message Content Sanitization
//!
//! Strips markup down to a small allow-list of inline formatting tags before
//! content is validated, encrypted, or persisted. Runs ahead of encryption so
//! ciphertext never hides unsafe markup.

use std::collections::HashSet;

use ammonia::Builder;
use once_cell::sync::Lazy;

use super::error::AppError;

/// Maximum message length in characters, measured after sanitization.
pub const MAX_CONTENT_LENGTH: usize = 1000;

/// Inline formatting tags clients are allowed to send.
const ALLOWED_TAGS: &[&str] = &["b", "i", "u", "em", "strong", "br"];

static CLEANER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder.tags(HashSet::from_iter(ALLOWED_TAGS.iter().copied()));
    builder
});

/// Sanitize raw message content and enforce the post-sanitize length rule.
///
/// Disallowed tags are stripped keeping their text, except script/style whose
/// contents are dropped entirely. Returns `Validation` when the result is
/// empty or longer than [`MAX_CONTENT_LENGTH`] characters.
pub fn sanitize_content(raw: &str) -> Result<String, AppError> {
    let cleaned = CLEANER.clean(raw).to_string();

    if cleaned.trim().is_empty() {
        return Err(AppError::Validation(
            "Message content is empty after sanitization".into(),
        ));
    }

    if cleaned.chars().count() > MAX_CONTENT_LENGTH {
        return Err(AppError::Validation(format!(
            "Message content exceeds {} characters",
            MAX_CONTENT_LENGTH
        )));
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn script_tags_are_dropped_with_their_contents() {
        let cleaned = sanitize_content("Hello <script>alert(1)</script> world").unwrap();
        assert_eq!(cleaned, "Hello  world");
    }

    #[test]
    fn allowed_formatting_tags_survive() {
        let cleaned = sanitize_content("<b>bold</b> and <em>emphatic</em><br>").unwrap();
        assert_eq!(cleaned, "<b>bold</b> and <em>emphatic</em><br>");
    }

    #[test]
    fn disallowed_tags_are_stripped_keeping_text() {
        let cleaned = sanitize_content("<div><span>inner</span> text</div>").unwrap();
        assert_eq!(cleaned, "inner text");
    }

    #[test]
    fn empty_after_sanitize_is_rejected() {
        let err = sanitize_content("<script>alert(1)</script>").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = sanitize_content("   ").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn over_length_content_is_rejected() {
        let long = "a".repeat(MAX_CONTENT_LENGTH + 1);
        let err = sanitize_content(&long).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let exact = "a".repeat(MAX_CONTENT_LENGTH);
        assert!(sanitize_content(&exact).is_ok());
    }
}
