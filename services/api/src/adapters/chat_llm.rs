//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for OpenAI's chat completions endpoint.
//! It implements the `ModelService` port from the `core` crate.
//!
//! Requests and responses use `async-openai`'s wire types. The call itself goes
//! through a plain `reqwest` client so that the HTTP status decides the error
//! kind and 429 handling stays under our control.

use crate::config::Config;
use async_openai::{
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ImageDetail, ImageUrlArgs, ResponseFormat as WireFormat,
    },
};
use async_trait::async_trait;
use debug_assistant_core::{
    AssistantError, AssistantResult, ChatRequest, ComposedRequest, ContentPart, Message,
    ModelService, ResponseFormat, Role,
};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Longest `Retry-After` we are willing to honour before retrying.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Upstream error bodies are cut to this many characters before display.
const MAX_ERROR_CHARS: usize = 500;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ModelService` against an OpenAI-compatible
/// chat completions API.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    http: Client,
    api_base: String,
    request_timeout: Duration,
    rate_limit_retries: u32,
    retry_backoff: Duration,
}

/// A failed attempt, with the server's requested wait when it sent one.
struct FailedAttempt {
    error: AssistantError,
    retry_after: Option<Duration>,
}

impl From<AssistantError> for FailedAttempt {
    fn from(error: AssistantError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter` from the service configuration.
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            http,
            api_base: config.openai_api_base.clone(),
            request_timeout: config.request_timeout,
            rate_limit_retries: config.rate_limit_retries,
            retry_backoff: config.retry_backoff,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base)
    }

    async fn send_once(
        &self,
        request: &ComposedRequest,
        wire: &CreateChatCompletionRequest,
    ) -> Result<String, FailedAttempt> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(request.credential.expose())
            .json(wire)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs).min(MAX_RETRY_AFTER));
            let body = response.text().await.unwrap_or_default();
            return Err(FailedAttempt {
                error: classify_status(status, &body),
                retry_after,
            });
        }

        let completion = response
            .json::<CreateChatCompletionResponse>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.transport_error(e)
                } else {
                    AssistantError::Upstream {
                        status: status.as_u16(),
                        message: format!("Malformed completion body: {}", e),
                    }
                    .into()
                }
            })?;

        // Extract the text content from the first choice in the response.
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                AssistantError::Upstream {
                    status: status.as_u16(),
                    message: "The model returned no text content.".to_string(),
                }
                .into()
            })
    }

    fn transport_error(&self, e: reqwest::Error) -> FailedAttempt {
        let error = if e.is_timeout() {
            AssistantError::Network(format!(
                "no response within {} seconds",
                self.request_timeout.as_secs()
            ))
        } else {
            AssistantError::Network(e.without_url().to_string())
        };
        error.into()
    }
}

//=========================================================================================
// `ModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ModelService for OpenAiChatAdapter {
    /// Sends the request, retrying a rate-limited call at most `rate_limit_retries` times.
    async fn complete(&self, request: &ComposedRequest) -> AssistantResult<String> {
        let wire = to_wire_request(&request.body)?;
        let started = Instant::now();
        let mut retries = 0;

        loop {
            match self.send_once(request, &wire).await {
                Ok(text) => {
                    info!(
                        model = %request.body.model,
                        turns = request.body.messages.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Completion received."
                    );
                    return Ok(text);
                }
                Err(FailedAttempt {
                    error: AssistantError::RateLimit(message),
                    retry_after,
                }) if retries < self.rate_limit_retries => {
                    retries += 1;
                    let wait = retry_after.unwrap_or(self.retry_backoff);
                    warn!(
                        "Rate limited ({}); retrying in {} ms.",
                        message,
                        wait.as_millis()
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(FailedAttempt { error, .. }) => {
                    error!("Completion request failed: {}", error);
                    return Err(error);
                }
            }
        }
    }
}

//=========================================================================================
// Wire Mapping
//=========================================================================================

/// Maps the transport-agnostic request onto the chat completions body. The
/// system instruction always comes first.
pub fn to_wire_request(body: &ChatRequest) -> AssistantResult<CreateChatCompletionRequest> {
    let mut messages: Vec<ChatCompletionRequestMessage> =
        Vec::with_capacity(body.messages.len() + 1);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(body.system_instruction.clone())
            .build()
            .map_err(build_error)?
            .into(),
    );
    for message in &body.messages {
        messages.push(to_wire_message(message)?);
    }

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(body.model.clone())
        .messages(messages)
        .temperature(body.temperature);
    if body.response_format == ResponseFormat::JsonObject {
        args.response_format(WireFormat::JsonObject);
    }
    args.build().map_err(build_error)
}

fn to_wire_message(message: &Message) -> AssistantResult<ChatCompletionRequestMessage> {
    let wire: ChatCompletionRequestMessage = match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.text())
            .build()
            .map_err(build_error)?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.text())
            .build()
            .map_err(build_error)?
            .into(),
        Role::User if message.image_count() == 0 => ChatCompletionRequestUserMessageArgs::default()
            .content(message.text())
            .build()
            .map_err(build_error)?
            .into(),
        Role::User => {
            let parts = message
                .parts
                .iter()
                .map(to_wire_part)
                .collect::<AssistantResult<Vec<_>>>()?;
            ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()
                .map_err(build_error)?
                .into()
        }
    };
    Ok(wire)
}

fn to_wire_part(part: &ContentPart) -> AssistantResult<ChatCompletionRequestUserMessageContentPart> {
    let wire: ChatCompletionRequestUserMessageContentPart = match part {
        ContentPart::Text(text) => ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(text.clone())
            .build()
            .map_err(build_error)?
            .into(),
        ContentPart::Image(image) => ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(image.data_url())
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(build_error)?,
            )
            .build()
            .map_err(build_error)?
            .into(),
    };
    Ok(wire)
}

fn build_error(e: OpenAIError) -> AssistantError {
    AssistantError::Compose(format!("Could not build the completion request: {}", e))
}

//=========================================================================================
// Error Classification
//=========================================================================================

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Maps a non-2xx status onto the error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> AssistantError {
    let message = upstream_message(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AssistantError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => AssistantError::RateLimit(message),
        _ => AssistantError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

fn upstream_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string();
    }
    trimmed.chars().take(MAX_ERROR_CHARS).collect()
}
