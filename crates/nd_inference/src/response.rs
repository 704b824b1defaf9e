//! Validated extraction of a digest from a chat-completions response.
//!
//! The response body is decoded into an untyped JSON value and walked one
//! field at a time, so an absent field becomes a `MalformedResponse` error
//! naming the field instead of a panic or a decode failure.

use nd_core::{Error, Result};
use serde_json::Value;

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedResponse(reason.into())
}

/// Returns the text of the first candidate completion.
pub fn extract_completion(body: &str) -> Result<String> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| malformed(format!("response is not JSON: {}", e)))?;

    let choices = match value.get("choices") {
        Some(choices) => choices,
        None => {
            let upstream = value
                .pointer("/error/message")
                .and_then(Value::as_str)
                .map(|m| format!(" (upstream error: {})", m))
                .unwrap_or_default();
            return Err(malformed(format!("response has no 'choices' field{}", upstream)));
        }
    };
    let first = choices
        .as_array()
        .ok_or_else(|| malformed("'choices' is not a list"))?
        .first()
        .ok_or_else(|| malformed("'choices' is empty"))?;
    let message = first
        .get("message")
        .ok_or_else(|| malformed("first choice has no 'message'"))?;
    let content = message
        .get("content")
        .ok_or_else(|| malformed("message has no 'content'"))?
        .as_str()
        .ok_or_else(|| malformed("message 'content' is not text"))?;

    if content.trim().is_empty() {
        return Err(malformed("message 'content' is empty"));
    }
    Ok(content.to_string())
}

fn clean_subject(line: &str) -> &str {
    let line = line.trim().trim_start_matches('#').trim().trim_matches('*').trim();
    let line = match line.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("subject:") => &line[8..],
        _ => line,
    };
    line.trim().trim_matches('*').trim()
}

/// Splits a completion into a subject (its first non-empty line) and a body.
pub fn split_digest(content: &str) -> Result<(String, String)> {
    let mut lines = content.lines();
    let first = lines
        .by_ref()
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| malformed("completion is blank"))?;

    let subject = clean_subject(first);
    if subject.is_empty() {
        return Err(malformed("completion has no usable subject line"));
    }

    let rest = lines.collect::<Vec<_>>().join("\n");
    let body = match rest.trim() {
        "" => content.trim().to_string(),
        body => body.to_string(),
    };
    Ok((subject.to_string(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::ErrorKind;

    fn kind(body: &str) -> ErrorKind {
        extract_completion(body).unwrap_err().kind()
    }

    #[test]
    fn test_extracts_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"first"}},{"message":{"content":"second"}}]}"#;
        assert_eq!(extract_completion(body).unwrap(), "first");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        assert_eq!(kind("not json"), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"id":"x"}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":{}}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":[]}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":[{"finish_reason":"stop"}]}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":[{"message":{"role":"assistant"}}]}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":[{"message":{"content":null}}]}"#), ErrorKind::MalformedResponse);
        assert_eq!(kind(r#"{"choices":[{"message":{"content":"  "}}]}"#), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_upstream_error_is_reported() {
        let err = extract_completion(r#"{"error":{"message":"model overloaded"}}"#).unwrap_err();
        assert!(err.to_string().contains("model overloaded"));
    }

    #[test]
    fn test_split_markdown_heading() {
        let (subject, body) = split_digest("\n# Your Weekly Tech Brief\n\n## Top stories\n1. Chips\n").unwrap();
        assert_eq!(subject, "Your Weekly Tech Brief");
        assert_eq!(body, "## Top stories\n1. Chips");
    }

    #[test]
    fn test_split_subject_label() {
        let (subject, body) = split_digest("**Subject: Markets cool off**\nRates held steady.").unwrap();
        assert_eq!(subject, "Markets cool off");
        assert_eq!(body, "Rates held steady.");

        let (subject, _) = split_digest("SUBJECT: Loud").unwrap();
        assert_eq!(subject, "Loud");
    }

    #[test]
    fn test_single_line_completion_is_its_own_body() {
        let (subject, body) = split_digest("Just one line").unwrap();
        assert_eq!(subject, "Just one line");
        assert_eq!(body, "Just one line");
    }

    #[test]
    fn test_split_rejects_empty_subject() {
        assert!(split_digest("   \n\n").is_err());
        assert!(split_digest("###\nbody").is_err());
    }
}
