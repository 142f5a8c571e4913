//! Verification-code extraction cascade.
//!
//! Stages are ordered from the most precise match to the least, and each
//! stage runs only when the previous one found nothing. The first captured
//! group wins, never the last.

use regex::Regex;

/// The content fields of one message, regardless of which backend fetched it.
/// Absent fields are empty strings.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub content: String,
    pub text: String,
    pub body: String,
    pub html: String,
}

pub struct CodeExtractor {
    code_div: Regex,
    labeled: Regex,
    fallbacks: Vec<Regex>,
    style_block: Regex,
    tag: Regex,
    bare_digits: Regex,
}

impl CodeExtractor {
    pub fn new() -> Self {
        // These patterns are fixed literals; compilation cannot fail.
        Self {
            code_div: Regex::new(r#"(?i)<div[^>]*class="code"[^>]*>(\d{6})</div>"#).unwrap(),
            labeled: Regex::new(r"[Vv]erification\s+code:+\s*(\d{6})").unwrap(),
            fallbacks: vec![
                Regex::new(r"(?i)verification\s+code:+\s*(\d{6})").unwrap(),
                Regex::new(r"(?i)code:+\s*(\d{6})").unwrap(),
                Regex::new(r"(?i)\b([A-Z0-9]{3}-[A-Z0-9]{3})\b").unwrap(),
                Regex::new(r"验证码[：:\s]+(\d{6})").unwrap(),
            ],
            style_block: Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap(),
            tag: Regex::new(r"<[^>]+>").unwrap(),
            bare_digits: Regex::new(r"\b(\d{6})\b").unwrap(),
        }
    }

    /// Runs the cascade over one message. Returns the first code found, or
    /// `None` when no stage matches.
    pub fn extract(&self, message: &MessageContent) -> Option<String> {
        // Stage 1: structural match inside the known HTML code marker.
        if !message.html.is_empty() {
            if let Some(caps) = self.code_div.captures(&message.html) {
                return Some(caps[1].to_string());
            }
        }

        // Stage 2: labeled field in the primary plain-text content.
        if !message.content.is_empty() {
            if let Some(caps) = self.labeled.captures(&message.content) {
                return Some(caps[1].to_string());
            }
        }

        // Stage 3: generic fallback patterns over all plain-text fields.
        let combined = format!("{} {} {}", message.content, message.text, message.body);
        for pattern in &self.fallbacks {
            if let Some(caps) = pattern.captures(&combined) {
                return Some(caps[1].to_string());
            }
        }

        // Stage 4: strip markup from the HTML body and take any bare 6-digit
        // run. Least precise, so it goes last; style blocks are dropped first
        // to avoid matching CSS values.
        if !message.html.is_empty() {
            let without_style = self.style_block.replace_all(&message.html, "");
            let stripped = self.tag.replace_all(&without_style, " ");
            if let Some(caps) = self.bare_digits.captures(&stripped) {
                return Some(caps[1].to_string());
            }
        }

        None
    }
}

impl Default for CodeExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html_message(html: &str) -> MessageContent {
        MessageContent {
            html: html.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_code_div_beats_generic_digits() {
        let message = MessageContent {
            html: r#"<p>Your number is 222222</p><div class="code">111111</div>"#.to_string(),
            content: "generic 222222 elsewhere".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("111111")
        );
    }

    #[test]
    fn test_labeled_field_double_colon() {
        let message = MessageContent {
            content: "Verification code:: 482913".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("482913")
        );
    }

    #[test]
    fn test_labeled_field_single_colon() {
        let message = MessageContent {
            content: "Your verification code: 654321 expires soon".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("654321")
        );
    }

    #[test]
    fn test_dashed_alphanumeric_shape() {
        let message = MessageContent {
            body: "Enter ABC-123 to continue".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("ABC-123")
        );
    }

    #[test]
    fn test_localized_label() {
        let message = MessageContent {
            text: "验证码：998877".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("998877")
        );
    }

    #[test]
    fn test_html_strip_last_resort() {
        let message = html_message(
            "<style>.x { min-width: 320px; max-width: 600999px; }</style>\
             <td><b>735128</b></td>",
        );
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("735128")
        );
    }

    #[test]
    fn test_style_block_digits_ignored() {
        // Without the markup a bare 6-digit run inside CSS would match;
        // stripping style blocks must prevent that.
        let message = html_message("<style>@media (width: 123456px) {}</style><p>no code</p>");
        assert!(CodeExtractor::new().extract(&message).is_none());
    }

    #[test]
    fn test_first_match_wins_not_last() {
        let message = MessageContent {
            content: "Verification code: 111222 ... Verification code: 333444".to_string(),
            ..Default::default()
        };
        assert_eq!(
            CodeExtractor::new().extract(&message).as_deref(),
            Some("111222")
        );
    }

    #[test]
    fn test_no_code_anywhere() {
        let message = MessageContent {
            content: "Welcome to the service".to_string(),
            html: "<p>Hello</p>".to_string(),
            ..Default::default()
        };
        assert!(CodeExtractor::new().extract(&message).is_none());
    }
}
