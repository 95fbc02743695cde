//! crates/debug_assistant_core/src/assistant.rs
//!
//! Drives one turn of a debugging session: compose, call the model, then
//! record the exchange. A failed call leaves the session untouched.

use crate::composer::PromptComposer;
use crate::domain::{AnalysisResult, Message};
use crate::encoder::EncodedImage;
use crate::parser::parse_analysis;
use crate::ports::{AssistantError, AssistantResult, ModelService};
use crate::session::Session;
use std::sync::Arc;
use tracing::{debug, warn};

/// What came back from the analysis turn.
#[derive(Debug)]
pub enum AnalysisOutcome {
    Parsed { result: AnalysisResult, raw: String },
    /// The model answered but not with usable JSON. `error` is always
    /// `AssistantError::Parse` and `raw` is shown to the user instead.
    Unparsed { raw: String, error: AssistantError },
}

#[derive(Clone)]
pub struct DebugAssistant {
    model: Arc<dyn ModelService>,
    composer: PromptComposer,
}

impl DebugAssistant {
    pub fn new(model: Arc<dyn ModelService>, composer: PromptComposer) -> Self {
        Self { model, composer }
    }

    /// Runs the screenshot analysis. On success the session is restarted so the
    /// screenshot is carried by its first user turn.
    pub async fn analyse(
        &self,
        session: &mut Session,
        image: EncodedImage,
        user_text: &str,
    ) -> AssistantResult<AnalysisOutcome> {
        let request = self
            .composer
            .compose_analysis(session.api_key(), &image, user_text)?;
        let raw = self.model.complete(&request).await?;

        session.reset();
        if let Some(turn) = request.new_turn() {
            session.append(turn.clone());
        }
        session.append(Message::assistant(raw.clone()));
        session.set_current_image(image);

        match parse_analysis(&raw) {
            Ok(result) => {
                debug!(error_type = %result.error_type, "Analysis parsed.");
                session.set_analysis(result.clone());
                Ok(AnalysisOutcome::Parsed { result, raw })
            }
            Err(error) => {
                warn!("Model reply was not valid analysis JSON: {}", error);
                Ok(AnalysisOutcome::Unparsed { raw, error })
            }
        }
    }

    /// Sends a text-only follow-up and returns the assistant's reply.
    pub async fn ask(&self, session: &mut Session, question: &str) -> AssistantResult<String> {
        let request = self.composer.compose_followup(
            session.api_key(),
            session.history(),
            session.analysis(),
            question,
        )?;
        let reply = self.model.complete(&request).await?;

        if let Some(turn) = request.new_turn() {
            session.append(turn.clone());
        }
        session.append(Message::assistant(reply.clone()));
        debug!(turns = session.history().len(), "Follow-up recorded.");

        Ok(reply)
    }
}
