//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API
//! server.

use debug_assistant_core::{AnalysisResult, Message};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Payloads Sent FROM the Client (Browser) TO the Server
//=========================================================================================
// NOTE: The screenshot is uploaded as multipart/form-data, not as part of these types.
// `SetApiKeyRequest` has no `Debug` impl so the key cannot reach the logs.
//=========================================================================================

/// The user's OpenAI key, held in memory for the rest of the session.
#[derive(Deserialize, ToSchema)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// A follow-up question about the current analysis.
#[derive(Deserialize, ToSchema)]
pub struct AskRequest {
    pub question: String,
}

//=========================================================================================
// Payloads Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
}

/// The structured fields of an analysis, as returned by the model.
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisView {
    pub error_type: String,
    pub language: String,
    pub ide: String,
    pub suggested_fix: Option<String>,
}

impl From<&AnalysisResult> for AnalysisView {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            error_type: result.error_type.clone(),
            language: result.language.clone(),
            ide: result.ide.clone(),
            suggested_fix: result.suggested_fix.clone(),
        }
    }
}

/// Result of a screenshot analysis. When the reply was not valid JSON,
/// `analysis` is absent, `parse_error` says why, and `raw` still carries the
/// model's answer.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AnalysisResponse {
    pub analysis: Option<AnalysisView>,
    pub markdown: String,
    pub raw: String,
    pub parse_error: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct AskResponse {
    pub reply: String,
    pub transcript: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TranscriptEntry {
    pub role: String,
    pub text: String,
    pub has_image: bool,
}

impl From<&Message> for TranscriptEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            text: message.text(),
            has_image: message.image_count() > 0,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TranscriptResponse {
    pub transcript: String,
    pub messages: Vec<TranscriptEntry>,
    /// Whether the session holds the screenshot of its current analysis.
    pub has_screenshot: bool,
}

/// Body of every non-2xx response.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
