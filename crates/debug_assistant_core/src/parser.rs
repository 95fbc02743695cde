//! crates/debug_assistant_core/src/parser.rs
//!
//! Best-effort extraction of an `AnalysisResult` from the model's reply. The
//! model is not guaranteed to follow the JSON instruction, so a failure keeps
//! the raw reply inside the error for display.

use crate::domain::AnalysisResult;
use crate::ports::{AssistantError, AssistantResult};

pub fn parse_analysis(raw: &str) -> AssistantResult<AnalysisResult> {
    serde_json::from_str::<AnalysisResult>(strip_code_fence(raw)).map_err(|e| {
        AssistantError::Parse {
            raw: raw.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Unwraps a reply that is exactly one fenced block, e.g. ```` ```json\n{..}\n``` ````
/// or ```` ```json {..}``` ````. Anything else is returned trimmed but otherwise
/// untouched.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    else {
        return trimmed;
    };
    if body.contains("```") {
        return trimmed;
    }

    // An optional language tag is separated from the payload by whitespace.
    let body = body.trim();
    match body.split_once(char::is_whitespace) {
        Some((tag, inner)) if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()) => {
            inner.trim()
        }
        _ => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{"errorType":"syntax","language":"Python","ide":"PyCharm","suggestedFix":"1. Close the bracket on line 4"}"#;

    #[test]
    fn well_formed_reply_round_trips() {
        let parsed = parse_analysis(WELL_FORMED).unwrap();

        assert_eq!(parsed.error_type, "syntax");
        assert_eq!(parsed.language, "Python");
        assert_eq!(parsed.ide, "PyCharm");
        assert_eq!(
            parsed.suggested_fix.as_deref(),
            Some("1. Close the bracket on line 4")
        );

        let reserialized = serde_json::to_string(&parsed).unwrap();
        assert_eq!(parse_analysis(&reserialized).unwrap(), parsed);
        assert_eq!(reserialized, WELL_FORMED);
    }

    #[test]
    fn prose_reply_is_a_parse_error_that_keeps_the_raw_text() {
        let raw = r#""Error: not sure""#;
        match parse_analysis(raw) {
            Err(AssistantError::Parse { raw: kept, .. }) => assert_eq!(kept, raw),
            other => panic!("expected a parse error, got {:?}", other),
        }

        assert!(matches!(
            parse_analysis("Error: not sure"),
            Err(AssistantError::Parse { .. })
        ));
    }

    #[test]
    fn partial_json_is_a_parse_error() {
        let truncated = r#"{"errorType":"runtime","language":"Ja"#;
        assert!(matches!(
            parse_analysis(truncated),
            Err(AssistantError::Parse { .. })
        ));

        let missing_ide = r#"{"errorType":"runtime","language":"Java"}"#;
        assert!(matches!(
            parse_analysis(missing_ide),
            Err(AssistantError::Parse { .. })
        ));
    }

    #[test]
    fn json_wrapped_in_prose_is_a_parse_error() {
        let chatty = format!("Sure! Here is the analysis:\n{}", WELL_FORMED);
        assert!(matches!(
            parse_analysis(&chatty),
            Err(AssistantError::Parse { .. })
        ));
    }

    #[test]
    fn single_fenced_block_is_unwrapped() {
        let fenced = format!("```json\n{}\n```", WELL_FORMED);
        assert_eq!(parse_analysis(&fenced).unwrap().language, "Python");

        let bare_fence = format!("```\n{}\n```\n", WELL_FORMED);
        assert_eq!(parse_analysis(&bare_fence).unwrap().ide, "PyCharm");
    }

    #[test]
    fn one_line_fenced_block_is_unwrapped() {
        let inline = format!("```json {} ```", WELL_FORMED);
        assert_eq!(parse_analysis(&inline).unwrap().error_type, "syntax");

        let tight = format!("```json\t{}```", WELL_FORMED);
        assert_eq!(parse_analysis(&tight).unwrap().language, "Python");

        let untagged = format!("```{}```", WELL_FORMED);
        assert_eq!(parse_analysis(&untagged).unwrap().ide, "PyCharm");
    }

    #[test]
    fn two_fenced_blocks_are_not_unwrapped() {
        let twice = format!("```json\n{}\n```\n```json\n{}\n```", WELL_FORMED, WELL_FORMED);
        assert!(matches!(
            parse_analysis(&twice),
            Err(AssistantError::Parse { .. })
        ));
    }

    #[test]
    fn missing_or_null_fix_and_extra_keys_are_tolerated() {
        let parsed = parse_analysis(
            r#"{"errorType":"network","language":"TypeScript","ide":"unknown","suggestedFix":null,"confidence":0.4}"#,
        )
        .unwrap();
        assert_eq!(parsed.suggested_fix, None);

        let parsed =
            parse_analysis(r#"{"errorType":"other","language":"C","ide":"Vim"}"#).unwrap();
        assert_eq!(parsed.suggested_fix, None);
    }
}
