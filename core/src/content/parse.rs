use serde::Deserialize;
use thiserror::Error;

use super::ContentResult;

/// Why a raw model response did not satisfy the content contract
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentError {
    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Field `{0}` is missing or empty")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct RawContent {
    insight: Option<String>,
    action: Option<String>,
    script: Option<String>,
}

/// Remove a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // drop the optional language tag, with or without a line break after it
    let tag_len = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    let body = &rest[tag_len..];
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}

/// Strictly parse a model response into a complete `ContentResult`.
pub fn parse_content(raw: &str) -> Result<ContentResult, ContentError> {
    let json = strip_code_fences(raw);
    let parsed: RawContent =
        serde_json::from_str(&json).map_err(|e| ContentError::InvalidJson(e.to_string()))?;

    Ok(ContentResult {
        insight: required(parsed.insight, "insight")?,
        action: required(parsed.action, "action")?,
        script: required(parsed.script, "script")?,
    })
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ContentError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ContentError::MissingField(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{"insight":"Langkah kecil tetap langkah.","action":"Rapikan meja 5 menit.","script":"Tarik napas dan mulai."}"#;

    #[test]
    fn strips_fence_with_language_tag() {
        let fenced = format!("```json\n{BODY}\n```");
        assert_eq!(strip_code_fences(&fenced), BODY);
        let bare_fence = format!("```\n{BODY}\n```\n");
        assert_eq!(strip_code_fences(&bare_fence), BODY);
        assert_eq!(strip_code_fences(&format!("  {BODY} ")), BODY);
        let one_line = format!("```json {BODY} ```");
        assert_eq!(strip_code_fences(&one_line), BODY);
        assert_eq!(strip_code_fences(&format!("```{BODY}```")), BODY);
        assert!(parse_content(&one_line).is_ok());
    }

    #[test]
    fn parses_fenced_response() {
        let content = parse_content(&format!("```json\n{BODY}\n```")).expect("valid content");
        assert_eq!(content.action, "Rapikan meja 5 menit.");
        assert!(content.is_complete());
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let raw = r#"{"insight":"a","action":"b","script":"c","mood":"happy"}"#;
        assert!(parse_content(raw).is_ok());
    }

    #[test]
    fn rejects_missing_or_empty_fields() {
        let missing = r#"{"insight":"a","action":"b"}"#;
        assert_eq!(
            parse_content(missing),
            Err(ContentError::MissingField("script"))
        );
        let empty = r#"{"insight":"  ","action":"b","script":"c"}"#;
        assert_eq!(
            parse_content(empty),
            Err(ContentError::MissingField("insight"))
        );
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            parse_content("Tentu! Berikut motivasinya: semangat!"),
            Err(ContentError::InvalidJson(_))
        ));
    }
}
