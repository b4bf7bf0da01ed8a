//! Participant session lifecycle: identity, local state, termination.

use md5::{Digest, Md5};
use shared_types::{CorrelationId, DocumentUpdate, ServerEvent, SessionTerminationRequest};

use crate::api::end_session;

/// Who this browser session is, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub correlation_id: CorrelationId,
    pub session_code: String,
    pub participant_id: String,
}

impl SessionIdentity {
    /// Generates a fresh correlation id. Call once per session activation and
    /// hand the result down; never regenerate it for the same session.
    pub fn create(session_code: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            session_code: session_code.into(),
            participant_id: participant_id.into(),
        }
    }
}

/// Local view of the session, owned by the top-level controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub code: String,
    pub participant_id: String,
    pub active: bool,
    pub ended: bool,
}

impl SessionState {
    pub fn start(&mut self, identity: &SessionIdentity) {
        self.code = identity.session_code.clone();
        self.participant_id = identity.participant_id.clone();
        self.active = true;
        self.ended = false;
    }

    /// Drop back to "no active session". The participant id is kept for the
    /// end screen.
    pub fn end_locally(&mut self) {
        self.code.clear();
        self.active = false;
        self.ended = true;
    }
}

/// Non-chat channel traffic that changes what the session screen shows.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    Document(DocumentUpdate),
    /// Backend ended the session; no `/end_session` request follows.
    Ended,
}

pub fn session_signal(event: &ServerEvent, me: &CorrelationId) -> Option<SessionSignal> {
    if !event.is_for(me) {
        return None;
    }
    match event {
        ServerEvent::Document(update) => Some(SessionSignal::Document(update.clone())),
        ServerEvent::KillSession(_) => Some(SessionSignal::Ended),
        ServerEvent::Message(_) => None,
    }
}

/// Sends the termination request without the caller waiting on it.
pub trait TerminationDispatch {
    fn dispatch(&self, request: SessionTerminationRequest);
}

/// Posts to `/end_session` on the browser event loop and logs failures.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTermination;

impl TerminationDispatch for HttpTermination {
    fn dispatch(&self, request: SessionTerminationRequest) {
        wasm_bindgen_futures::spawn_local(async move {
            // Result is discardable: the local transition already happened.
            if let Err(e) = end_session(&request).await {
                dioxus_logger::tracing::warn!("end_session request failed: {}", e);
            }
        });
    }
}

/// End the session: fire the request, then clear local state regardless of
/// how (or whether) the request completes.
pub fn terminate_session<D>(
    state: &mut SessionState,
    code: &str,
    correlation_id: &CorrelationId,
    dispatcher: &D,
) where
    D: TerminationDispatch + ?Sized,
{
    dioxus_logger::tracing::info!("Ending session {} for {}", code, correlation_id);
    dispatcher.dispatch(SessionTerminationRequest {
        code: code.to_string(),
        id: correlation_id.clone(),
    });
    state.end_locally();
}

/// Completion code shown on the end screen: `secret_` + md5(pid + pid).
pub fn secret_code(participant_id: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(participant_id.as_bytes());
    hasher.update(participant_id.as_bytes());
    format!("secret_{:x}", hasher.finalize())
}
