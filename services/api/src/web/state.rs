//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the registry of live sessions.

use crate::config::Config;
use debug_assistant_core::{DebugAssistant, ImageEncoder, ModelService, PromptComposer, Session};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub assistant: DebugAssistant,
    pub encoder: ImageEncoder,
    pub sessions: SessionRegistry,
}

impl AppState {
    pub fn new(config: Arc<Config>, model: Arc<dyn ModelService>) -> Self {
        let composer = PromptComposer::new(config.model_name.clone());
        Self {
            assistant: DebugAssistant::new(model, composer),
            encoder: ImageEncoder::new(config.max_upload_bytes),
            sessions: SessionRegistry::default(),
            config,
        }
    }
}

//=========================================================================================
// SessionRegistry (One Entry Per Browser Tab)
//=========================================================================================

/// Why a session could not be checked out.
#[derive(Debug, PartialEq, Eq)]
pub enum CheckoutError {
    NotFound,
    /// Another request for the same session is still waiting on the model.
    Busy,
}

/// A live session and the last time a request touched it.
struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: std::sync::Mutex<Instant>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::new())),
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = Instant::now();
        }
    }

    /// Idle means untouched for `idle` and not checked out right now.
    fn is_idle(&self, idle: Duration) -> bool {
        let untouched = self
            .last_used
            .lock()
            .map(|last_used| last_used.elapsed() >= idle)
            .unwrap_or(true);
        untouched && self.session.try_lock().is_ok()
    }
}

/// Live sessions, each behind its own lock. Nothing is shared between entries.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
}

impl SessionRegistry {
    pub async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.write().await.insert(id, SessionSlot::new());
        id
    }

    /// Takes exclusive use of a session without waiting. Requests are never
    /// queued behind an in-flight model call.
    pub async fn checkout(&self, id: Uuid) -> Result<OwnedMutexGuard<Session>, CheckoutError> {
        let sessions = self.sessions.read().await;
        let slot = sessions.get(&id).ok_or(CheckoutError::NotFound)?;
        slot.touch();
        slot.session
            .clone()
            .try_lock_owned()
            .map_err(|_| CheckoutError::Busy)
    }

    /// Drops a session and everything it holds, key included.
    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    /// Drops every session nobody has used for `idle`. A tab that was closed or
    /// reloaded never sends a DELETE, so this is what releases its key and
    /// screenshot. Returns how many sessions were dropped.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| !slot.is_idle(idle));
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

//=========================================================================================
// Background Tasks
//=========================================================================================

/// Longest gap between two idle sweeps.
const MAX_SWEEP_PERIOD: Duration = Duration::from_secs(60);

/// Spawns the task that periodically evicts sessions idle for longer than
/// `config.session_idle`.
pub fn spawn_session_sweeper(app_state: Arc<AppState>) -> JoinHandle<()> {
    let idle = app_state.config.session_idle;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(idle.min(MAX_SWEEP_PERIOD));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = app_state.sessions.evict_idle(idle).await;
            if evicted > 0 {
                let live_sessions = app_state.sessions.len().await;
                info!(evicted, live_sessions, "Evicted idle sessions.");
            }
        }
    })
}
