//! Shared types between the participant front end and the study backend
//!
//! These types are used by both:
//! - the Dioxus participant UI (WASM)
//! - the study backend, through the generated TypeScript bindings
//!
//! Serializable with serde for JSON over WebSocket/HTTP

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ============================================================================
// Core Types
// ============================================================================

/// Per-session routing key for chat traffic on the shared channel.
///
/// Generated once on the client when a session starts. It is the only thing
/// that tells one participant's messages apart from another's, so it must be
/// a random 128-bit token and never a counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Document / Sketch
// ============================================================================

/// A topic label covering sentences `start..=end` of a document.
///
/// Indices are signed so that a producer still streaming the document can
/// send positions the client cannot place yet; those are ignored downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct Span {
    #[ts(type = "number")]
    pub start: i64,
    #[ts(type = "number")]
    pub end: i64,
    pub topic: String,
}

impl Span {
    pub fn new(start: i64, end: i64, topic: impl Into<String>) -> Self {
        Self {
            start,
            end,
            topic: topic.into(),
        }
    }
}

/// Server → Client: replacement document and its sketch spans
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct DocumentUpdate {
    pub id: CorrelationId,
    #[serde(default)]
    pub document: Vec<String>,
    #[serde(default)]
    pub sketch: Vec<Span>,
}

// ============================================================================
// Chat
// ============================================================================

/// Server → Client: a chat line addressed to one correlation id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct InboundChatMessage {
    pub id: CorrelationId,
    pub message: String,
}

/// Client → Server: participant input tagged with session code and id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct OutboundChatMessage {
    pub message: String,
    pub code: String,
    pub id: CorrelationId,
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Server → Client: the backend ended this participant's session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct KillSession {
    pub id: CorrelationId,
}

/// Body of `POST /end_session`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub struct SessionTerminationRequest {
    pub code: String,
    pub id: CorrelationId,
}

// ============================================================================
// WebSocket Protocol
// ============================================================================

/// Frames the backend pushes on the shared channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub enum ServerEvent {
    /// Chat response for one participant
    Message(InboundChatMessage),

    /// Full document snapshot for one participant
    Document(DocumentUpdate),

    /// Session ended by the backend
    KillSession(KillSession),
}

impl ServerEvent {
    /// Correlation id the event is addressed to.
    pub fn target(&self) -> &CorrelationId {
        match self {
            ServerEvent::Message(msg) => &msg.id,
            ServerEvent::Document(update) => &update.id,
            ServerEvent::KillSession(kill) => &kill.id,
        }
    }

    pub fn is_for(&self, id: &CorrelationId) -> bool {
        self.target() == id
    }
}

/// Frames the participant UI sends on the shared channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[ts(export, export_to = "../../participant-ui/src/types/generated.ts")]
pub enum ClientEvent {
    ChatMessage(OutboundChatMessage),
}

// ============================================================================
// Event names
// ============================================================================

/// Values of the `event` field, for code that builds or inspects frames as
/// raw JSON.
pub const EVENT_MESSAGE: &str = "message";
pub const EVENT_DOCUMENT: &str = "document";
pub const EVENT_KILL_SESSION: &str = "kill_session";
pub const EVENT_CHAT_MESSAGE: &str = "chat_message";
