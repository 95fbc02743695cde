//! crates/debug_assistant_core/src/session.rs
//!
//! The in-memory state of one debugging session. Nothing here is ever written
//! to disk; dropping the value is the only way a session ends.

use crate::credentials::ApiKey;
use crate::domain::{AnalysisResult, Message};
use crate::encoder::EncodedImage;

#[derive(Debug, Clone, Default)]
pub struct Session {
    api_key: Option<ApiKey>,
    messages: Vec<Message>,
    current_image: Option<EncodedImage>,
    analysis: Option<AnalysisResult>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(api_key: ApiKey) -> Self {
        Self {
            api_key: Some(api_key),
            ..Self::default()
        }
    }

    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref()
    }

    /// Replaces the stored key. The conversation is kept.
    pub fn set_api_key(&mut self, api_key: ApiKey) {
        self.api_key = Some(api_key);
    }

    /// Appends a turn. History is append-only.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All turns in the order they were appended.
    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_image(&self) -> Option<&EncodedImage> {
        self.current_image.as_ref()
    }

    /// The last successfully parsed analysis, if any.
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    /// Discards the conversation, screenshot and analysis. Only the key survives.
    pub fn reset(&mut self) {
        *self = Self {
            api_key: self.api_key.take(),
            ..Self::default()
        };
    }

    pub(crate) fn set_current_image(&mut self, image: EncodedImage) {
        self.current_image = Some(image);
    }

    pub(crate) fn set_analysis(&mut self, analysis: AnalysisResult) {
        self.analysis = Some(analysis);
    }
}
