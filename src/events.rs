use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a server-side conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One entry of the conversation list, reduced to what the client shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: String,
}

/// Events decoded from a chat response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Fragment to append to the current answer
    Text { chunk: String },
    /// Status heartbeat; carries nothing the client shows
    Progress,
    /// Final image link; nothing follows it
    ImageResult { url: String },
    /// Plugin sentinel closing the answer
    EndOfPlugin,
}

impl StreamEvent {
    /// Whether decoding stops after this event
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::ImageResult { .. } | StreamEvent::EndOfPlugin)
    }
}

/// Record carried by a framed stream line
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireRecord {
    #[serde(rename = "text")]
    Text { msg: String },
    #[serde(rename = "progress")]
    Progress,
    #[serde(other)]
    Other,
}

/// Image records only need the one field
#[derive(Debug, Deserialize)]
pub(crate) struct ImageRecord {
    #[serde(rename = "imageUrlHigh")]
    pub image_url_high: String,
}
