//! crates/debug_assistant_core/src/ports.rs
//!
//! Defines the service contract (trait) the core needs from the outside world,
//! plus the error taxonomy shared by every layer. The HTTP adapter in the `api`
//! service is the production implementation of `ModelService`.

use crate::composer::ComposedRequest;
use async_trait::async_trait;

//=========================================================================================
// Error and Result Types
//=========================================================================================

/// Every failure a user can run into while talking to the assistant.
///
/// None of these are fatal: the caller shows `user_message()` next to the input
/// that caused it and lets the user try again.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Image could not be encoded: {0}")]
    Encoding(String),

    #[error("Request could not be composed: {0}")]
    Compose(String),

    #[error("Model API rejected the credentials: {0}")]
    Auth(String),

    #[error("Model API is rate limiting requests: {0}")]
    RateLimit(String),

    #[error("Network failure talking to the model API: {0}")]
    Network(String),

    #[error("Model API returned status {status}: {message}")]
    Upstream { status: u16, message: String },

    /// The reply was not the JSON we asked for. `raw` is the untouched reply.
    #[error("Model reply is not a valid analysis: {reason}")]
    Parse { raw: String, reason: String },
}

impl AssistantError {
    /// Human-readable text for display next to the point of interaction.
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::Encoding(detail) => format!("**Image Error**: {}", detail),
            AssistantError::Compose(detail) => detail.clone(),
            AssistantError::Auth(_) => "**Connection Error**: Please check your OpenAI API key is valid and has sufficient credits.".to_string(),
            AssistantError::RateLimit(_) => {
                "**Rate Limit Error**: Too many requests. Please wait a moment and try again."
                    .to_string()
            }
            AssistantError::Network(detail) => format!(
                "**Network Error**: Could not reach the model API ({}). Please try again.",
                detail
            ),
            AssistantError::Upstream { status, message } => format!(
                "**Analysis failed** (status {}): {}. Please try again.",
                status, message
            ),
            AssistantError::Parse { raw, .. } => {
                format!("Error parsing response. Raw output:\n{}", raw)
            }
        }
    }
}

/// A convenience type alias for `Result<T, AssistantError>`.
pub type AssistantResult<T> = Result<T, AssistantError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait ModelService: Send + Sync {
    /// Sends one composed request and returns the assistant's raw reply text.
    async fn complete(&self, request: &ComposedRequest) -> AssistantResult<String>;
}
