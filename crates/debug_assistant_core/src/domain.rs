//! crates/debug_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application: conversation
//! turns and the structured analysis the model is asked to return.

use crate::encoder::EncodedImage;
use serde::{Deserialize, Serialize};

/// Who authored a turn in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One piece of a message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(EncodedImage),
}

/// A single turn in a debugging session. Messages are never edited after they
/// are appended to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// The opening turn of an analysis: the user's description followed by the screenshot.
    pub fn user_with_image(text: impl Into<String>, image: EncodedImage) -> Self {
        Self {
            role: Role::User,
            parts: vec![ContentPart::Text(text.into()), ContentPart::Image(image)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    /// All text parts joined with newlines. Image parts are skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count()
    }
}

/// The structured analysis requested from the model on the first turn.
///
/// Field names on the wire are camelCase. Anything beyond these four keys in a
/// model reply is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub error_type: String,
    pub language: String,
    pub ide: String,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}
