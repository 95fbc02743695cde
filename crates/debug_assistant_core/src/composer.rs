//! crates/debug_assistant_core/src/composer.rs
//!
//! Builds the request sent to the model: a system instruction, the session's
//! turns and the new user turn. The request body is transport-agnostic; the
//! adapter in the `api` service maps it onto the chat completions wire format.

use crate::credentials::{ApiKey, KEY_PREFIX};
use crate::domain::{AnalysisResult, Message};
use crate::encoder::EncodedImage;
use crate::ports::{AssistantError, AssistantResult};

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// The keys of the JSON object requested on the analysis turn.
pub const ANALYSIS_FIELDS: [&str; 4] = ["errorType", "language", "ide", "suggestedFix"];

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const FOLLOWUP_TEMPERATURE: f32 = 0.7;

/// Sent in place of the user's description when they leave it blank.
const EMPTY_DESCRIPTION: &str = "No description provided. Please analyse the screenshot.";

// The object skeleton below must stay valid JSON and must be the only braces
// in the instruction.
const ANALYSIS_INSTRUCTION: &str = r#"You are a helpful software and code debugging assistant. Analyse the screenshot and the user's description of the problem, then respond with a single JSON object with exactly these keys:

{
  "errorType": "one of syntax, runtime, compilation, network, linting, other",
  "language": "the programming language visible in the screenshot",
  "ide": "the IDE or editor if recognisable (VS Code, PyCharm, etc.), otherwise unknown",
  "suggestedFix": "step-by-step debugging advice, one numbered step per line"
}

If no description is given, look for lines of code with visible error markers (red or yellow underlines) or error output from a terminal or console. Be as specific as possible in the suggested fix. Always return valid JSON only, with no surrounding prose."#;

const FOLLOWUP_INSTRUCTION: &str = "You are a helpful software and code debugging assistant. The user is asking follow-up questions about a problem they are debugging. Provide natural, conversational responses. Be helpful and detailed but don't repeat information unnecessarily. If referring to the previous analysis, be specific about what you're referencing.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    JsonObject,
    Text,
}

/// The body of one chat completion call.
///
/// `messages` holds only session turns; the system instruction travels
/// separately and is placed first by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_instruction: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    pub fn image_part_count(&self) -> usize {
        self.messages.iter().map(Message::image_count).sum()
    }
}

/// A request body paired with the credential it must be sent with.
#[derive(Debug, Clone)]
pub struct ComposedRequest {
    pub credential: ApiKey,
    pub body: ChatRequest,
}

impl ComposedRequest {
    /// The user turn this request adds to the conversation.
    pub fn new_turn(&self) -> Option<&Message> {
        self.body.messages.last()
    }
}

#[derive(Debug, Clone)]
pub struct PromptComposer {
    model: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl PromptComposer {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The first turn of a session: one user message with the description and
    /// the screenshot, answered as a JSON object.
    pub fn compose_analysis(
        &self,
        api_key: Option<&ApiKey>,
        image: &EncodedImage,
        user_text: &str,
    ) -> AssistantResult<ComposedRequest> {
        let credential = require_key(api_key)?;

        let description = match user_text.trim() {
            "" => EMPTY_DESCRIPTION,
            text => text,
        };

        Ok(ComposedRequest {
            credential,
            body: ChatRequest {
                model: self.model.clone(),
                system_instruction: ANALYSIS_INSTRUCTION.to_string(),
                messages: vec![Message::user_with_image(description, image.clone())],
                temperature: ANALYSIS_TEMPERATURE,
                response_format: ResponseFormat::JsonObject,
            },
        })
    }

    /// A text-only turn continuing the session's history.
    pub fn compose_followup(
        &self,
        api_key: Option<&ApiKey>,
        history: &[Message],
        analysis: Option<&AnalysisResult>,
        user_text: &str,
    ) -> AssistantResult<ComposedRequest> {
        let credential = require_key(api_key)?;

        let question = user_text.trim();
        if question.is_empty() {
            return Err(AssistantError::Compose("Please ask a question.".to_string()));
        }

        let mut messages = history.to_vec();
        messages.push(Message::user(question));

        Ok(ComposedRequest {
            credential,
            body: ChatRequest {
                model: self.model.clone(),
                system_instruction: followup_instruction(analysis),
                messages,
                temperature: FOLLOWUP_TEMPERATURE,
                response_format: ResponseFormat::Text,
            },
        })
    }
}

fn require_key(api_key: Option<&ApiKey>) -> AssistantResult<ApiKey> {
    match api_key {
        None => Err(AssistantError::Compose(
            "Please enter your OpenAI API key before sending a request.".to_string(),
        )),
        Some(key) if key.is_empty() => Err(AssistantError::Compose(
            "Please enter your OpenAI API key before sending a request.".to_string(),
        )),
        Some(key) if !key.is_well_formed() => Err(AssistantError::Compose(format!(
            "**Invalid API Key**: Please enter a valid OpenAI API key starting with '{}'",
            KEY_PREFIX
        ))),
        Some(key) => Ok(key.clone()),
    }
}

fn followup_instruction(analysis: Option<&AnalysisResult>) -> String {
    let context = analysis
        .and_then(|result| serde_json::to_string_pretty(result).ok())
        .map(|json| {
            format!(
                "Previous screenshot analysis:\n\n{}\n\nReference this analysis when answering the follow-up questions.",
                json
            )
        })
        .unwrap_or_else(|| {
            "No previous screenshot analysis is available. Answer from the conversation so far."
                .to_string()
        });

    format!("{}\n\n{}", FOLLOWUP_INSTRUCTION, context)
}
