//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    protocol::{
        AnalysisResponse, AnalysisView, AskRequest, AskResponse, CreateSessionResponse,
        ErrorResponse, SetApiKeyRequest, TranscriptEntry, TranscriptResponse,
    },
    render::{render_outcome, render_transcript},
    state::{AppState, CheckoutError},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use debug_assistant_core::{AnalysisOutcome, ApiKey, AssistantError, ImageMime, Session};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        set_api_key_handler,
        analyse_handler,
        ask_handler,
        transcript_handler,
        delete_session_handler,
    ),
    components(
        schemas(
            CreateSessionResponse,
            SetApiKeyRequest,
            AnalysisView,
            AnalysisResponse,
            AskRequest,
            AskResponse,
            TranscriptEntry,
            TranscriptResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "Debug Assistant API", description = "Screenshot analysis and follow-up chat backed by a multimodal model.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Responses
//=========================================================================================

pub type HandlerError = (StatusCode, Json<ErrorResponse>);

fn reject(status: StatusCode, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Maps a domain failure onto an HTTP status with a user-facing message.
pub fn assistant_error_response(e: &AssistantError) -> HandlerError {
    let status = match e {
        AssistantError::Encoding(_) | AssistantError::Compose(_) => StatusCode::BAD_REQUEST,
        AssistantError::Auth(_) => StatusCode::UNAUTHORIZED,
        AssistantError::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
        AssistantError::Network(_) => StatusCode::GATEWAY_TIMEOUT,
        // Handlers return parse failures as an unparsed analysis, not as an error.
        AssistantError::Upstream { .. } | AssistantError::Parse { .. } => StatusCode::BAD_GATEWAY,
    };
    reject(status, e.user_message())
}

async fn checkout(
    app_state: &AppState,
    session_id: Uuid,
) -> Result<OwnedMutexGuard<Session>, HandlerError> {
    app_state
        .sessions
        .checkout(session_id)
        .await
        .map_err(|e| match e {
            CheckoutError::NotFound => reject(StatusCode::NOT_FOUND, "Session not found."),
            CheckoutError::Busy => {
                warn!(%session_id, "Rejected request while another is in flight.");
                reject(
                    StatusCode::CONFLICT,
                    "Please wait for the current request to finish.",
                )
            }
        })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start a new, empty debugging session.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created", body = CreateSessionResponse)
    )
)]
pub async fn create_session_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let session_id = app_state.sessions.create().await;
    let live_sessions = app_state.sessions.len().await;
    info!(%session_id, live_sessions, "Session created.");
    (StatusCode::CREATED, Json(CreateSessionResponse { session_id }))
}

/// Store the user's OpenAI key for this session. It is kept in memory only.
#[utoipa::path(
    put,
    path = "/sessions/{session_id}/api-key",
    request_body = SetApiKeyRequest,
    responses(
        (status = 204, description = "Key stored"),
        (status = 400, description = "Blank key", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "A request is in flight", body = ErrorResponse)
    ),
    params(("session_id" = Uuid, Path, description = "The session to update."))
)]
pub async fn set_api_key_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SetApiKeyRequest>,
) -> Result<StatusCode, HandlerError> {
    let api_key = ApiKey::new(req.api_key);
    if api_key.is_empty() {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Please enter your OpenAI API key.",
        ));
    }

    let mut session = checkout(&app_state, session_id).await?;
    session.set_api_key(api_key);
    info!(%session_id, "API key stored for session.");
    Ok(StatusCode::NO_CONTENT)
}

/// Analyse a screenshot. Starts a fresh conversation for the session.
///
/// Accepts multipart/form-data with a `screenshot` file part and an optional
/// `prompt` text part describing the problem.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/analysis",
    request_body(content_type = "multipart/form-data", description = "`screenshot` file and optional `prompt` text."),
    responses(
        (status = 200, description = "Model answered; `analysis` is absent if its reply was not valid JSON", body = AnalysisResponse),
        (status = 400, description = "Missing or unsupported screenshot, or missing API key", body = ErrorResponse),
        (status = 401, description = "The model API rejected the key", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "A request is in flight", body = ErrorResponse),
        (status = 429, description = "Rate limited by the model API", body = ErrorResponse),
        (status = 502, description = "The model API failed", body = ErrorResponse),
        (status = 504, description = "The model API could not be reached", body = ErrorResponse)
    ),
    params(("session_id" = Uuid, Path, description = "The session to analyse in."))
)]
pub async fn analyse_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResponse>, HandlerError> {
    let mut prompt = String::new();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        reject(
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => {
                prompt = field.text().await.map_err(|e| {
                    reject(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read the prompt: {}", e),
                    )
                })?;
            }
            "screenshot" => {
                let declared = declared_mime(field.content_type(), field.file_name());
                let data = field.bytes().await.map_err(|e| {
                    reject(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read the screenshot: {}", e),
                    )
                })?;
                upload = Some((declared, data.to_vec()));
            }
            other => warn!("Ignoring unexpected multipart field '{}'.", other),
        }
    }

    let (declared, bytes) = upload.ok_or_else(|| {
        reject(
            StatusCode::BAD_REQUEST,
            "Please upload a screenshot to analyse.",
        )
    })?;
    let image = app_state
        .encoder
        .encode(&bytes, &declared)
        .map_err(|e| assistant_error_response(&e))?;
    let image_bytes = image.byte_len();
    let image_mime = image.mime().as_str();

    let mut session = checkout(&app_state, session_id).await?;
    let outcome = app_state
        .assistant
        .analyse(&mut session, image, &prompt)
        .await
        .map_err(|e| {
            error!(%session_id, "Analysis failed: {}", e);
            assistant_error_response(&e)
        })?;

    let markdown = render_outcome(&outcome);
    let response = match outcome {
        AnalysisOutcome::Parsed { result, raw } => AnalysisResponse {
            analysis: Some(AnalysisView::from(&result)),
            markdown,
            raw,
            parse_error: None,
        },
        AnalysisOutcome::Unparsed { raw, error } => AnalysisResponse {
            analysis: None,
            markdown,
            raw,
            parse_error: Some(error.to_string()),
        },
    };
    info!(
        %session_id,
        image_bytes,
        image_mime,
        parsed = response.analysis.is_some(),
        "Analysis complete."
    );
    Ok(Json(response))
}

/// Ask a text-only follow-up question in the session's conversation.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/messages",
    request_body = AskRequest,
    responses(
        (status = 200, description = "The assistant's reply and the updated transcript", body = AskResponse),
        (status = 400, description = "Blank question or missing API key", body = ErrorResponse),
        (status = 401, description = "The model API rejected the key", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "A request is in flight", body = ErrorResponse),
        (status = 429, description = "Rate limited by the model API", body = ErrorResponse),
        (status = 502, description = "The model API failed", body = ErrorResponse),
        (status = 504, description = "The model API could not be reached", body = ErrorResponse)
    ),
    params(("session_id" = Uuid, Path, description = "The session to continue."))
)]
pub async fn ask_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, HandlerError> {
    let mut session = checkout(&app_state, session_id).await?;
    let reply = app_state
        .assistant
        .ask(&mut session, &req.question)
        .await
        .map_err(|e| {
            error!(%session_id, "Follow-up failed: {}", e);
            assistant_error_response(&e)
        })?;

    Ok(Json(AskResponse {
        reply,
        transcript: render_transcript(session.history()),
    }))
}

/// The session's conversation so far.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/messages",
    responses(
        (status = 200, description = "Transcript in append order", body = TranscriptResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "A request is in flight", body = ErrorResponse)
    ),
    params(("session_id" = Uuid, Path, description = "The session to read."))
)]
pub async fn transcript_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<TranscriptResponse>, HandlerError> {
    let session = checkout(&app_state, session_id).await?;
    Ok(Json(TranscriptResponse {
        transcript: render_transcript(session.history()),
        messages: session.history().iter().map(TranscriptEntry::from).collect(),
        has_screenshot: session.current_image().is_some(),
    }))
}

/// Discard a session, its conversation and its key.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    responses(
        (status = 204, description = "Session discarded"),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    ),
    params(("session_id" = Uuid, Path, description = "The session to discard."))
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    if app_state.sessions.remove(session_id).await {
        info!(%session_id, "Session discarded.");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(reject(StatusCode::NOT_FOUND, "Session not found."))
    }
}

/// Picks the content type to validate: the part's own type unless it is
/// missing or generic, then the file extension.
fn declared_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    match content_type {
        Some(declared) if !declared.is_empty() && declared != "application/octet-stream" => {
            declared.to_string()
        }
        _ => file_name
            .and_then(ImageMime::from_file_name)
            .map(|mime| mime.as_str().to_string())
            .unwrap_or_else(|| content_type.unwrap_or_default().to_string()),
    }
}
