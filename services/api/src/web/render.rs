//! services/api/src/web/render.rs
//!
//! Markdown rendering of analyses and chat transcripts for the browser.

use debug_assistant_core::{AnalysisOutcome, AnalysisResult, Message, Role};

pub const EMPTY_TRANSCRIPT: &str =
    "Your conversation will appear here after you start asking questions...";

pub fn render_analysis(result: &AnalysisResult) -> String {
    let fix = result
        .suggested_fix
        .as_deref()
        .map(str::trim)
        .filter(|fix| !fix.is_empty())
        .unwrap_or("No fix suggested");

    format!(
        "## Error Analysis\n\n\
         **Type:** {} Error  \n\
         **Language:** {}  \n\
         **IDE:** {}\n\n\
         ## Suggested Fix\n\n\
         {}",
        title_case(or_default(&result.error_type, "Unknown")),
        or_default(&result.language, "Not detected"),
        or_default(&result.ide, "Not detected"),
        fix
    )
}

/// A parsed analysis is rendered field by field; anything else falls back to
/// the raw reply so the user never loses the model's answer.
pub fn render_outcome(outcome: &AnalysisOutcome) -> String {
    match outcome {
        AnalysisOutcome::Parsed { result, .. } => render_analysis(result),
        AnalysisOutcome::Unparsed { error, .. } => error.user_message(),
    }
}

pub fn render_transcript(history: &[Message]) -> String {
    if history.is_empty() {
        return EMPTY_TRANSCRIPT.to_string();
    }

    history
        .iter()
        .map(|message| {
            let speaker = match message.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            let mut line = format!("**{}:** {}", speaker, message.text());
            if message.image_count() > 0 {
                line.push_str(" [screenshot attached]");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    match value.trim() {
        "" => fallback,
        trimmed => trimmed,
    }
}

fn title_case(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
