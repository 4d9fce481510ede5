use serde_json::{Value, json};

use crate::error::{ChatError, Result};
use crate::events::{ConversationId, ConversationSummary};
use crate::transport::ApiClient;

/// Message count at which the server stops accepting a conversation
pub const CONVERSATION_CAPACITY: usize = 40;

/// Most recent conversations returned by `list_all`
pub const LIST_LIMIT: usize = 40;

/// Conversation state for one running client.
///
/// All conversation data lives server-side; the session only tracks which
/// conversation new prompts go to.
pub struct Session {
    client: ApiClient,
    active: ConversationId,
    auto_rollover: bool,
}

impl Session {
    /// Resume `resume` when given, otherwise create a fresh conversation
    pub async fn start(
        client: ApiClient,
        resume: Option<ConversationId>,
        auto_rollover: bool,
    ) -> Result<Self> {
        let active = match resume {
            Some(id) => id,
            None => request_new_id(&client).await?,
        };
        tracing::info!(chat_id = %active, "session started");

        Ok(Self {
            client,
            active,
            auto_rollover,
        })
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn active(&self) -> &ConversationId {
        &self.active
    }

    #[cfg(test)]
    pub fn set_auto_rollover(&mut self, enabled: bool) {
        self.auto_rollover = enabled;
    }

    /// Create a conversation and make it the active one
    pub async fn create_conversation(&mut self) -> Result<ConversationId> {
        let id = request_new_id(&self.client).await?;
        tracing::info!(chat_id = %id, "conversation created");
        self.active = id.clone();
        Ok(id)
    }

    /// Point the session at another conversation.
    ///
    /// The id is not checked against the server; an unknown id fails on
    /// first use.
    pub fn switch_to(&mut self, id: ConversationId) {
        tracing::info!(from = %self.active, to = %id, "conversation switched");
        self.active = id;
    }

    pub async fn rename(&self, name: &str, id: Option<&ConversationId>) -> Result<()> {
        let id = self.target(id);
        let response = self
            .client
            .post(&format!("/conv/title/{id}"), Some(&json!({ "title": name })))
            .await?;

        if !response.is_success() {
            return Err(ChatError::RenameFailed(response.status()));
        }
        Ok(())
    }

    /// Full server-side record of a conversation
    pub async fn fetch_history(&self, id: Option<&ConversationId>) -> Result<Value> {
        fetch_conversation(&self.client, self.target(id)).await
    }

    /// Most recently active conversations, newest first
    pub async fn list_all(&self) -> Result<Vec<ConversationSummary>> {
        list_conversations(&self.client).await
    }

    /// Delete every conversation on the account.
    ///
    /// The active id is left dangling; callers create a replacement.
    pub async fn clear_all(&self) -> Result<()> {
        let response = self
            .client
            .post("/convs/clear", Some(&json!({ "chatType": 0 })))
            .await?;

        if !response.is_success() {
            return Err(ChatError::ClearFailed(response.status()));
        }
        tracing::info!("all conversations cleared");
        Ok(())
    }

    /// Stop and reset the active conversation
    pub async fn restart(&self) -> Result<()> {
        let response = self
            .client
            .post(&format!("/stop/conversation/{}", self.active), None)
            .await?;

        if !response.is_success() {
            return Err(ChatError::RestartFailed(response.status()));
        }
        Ok(())
    }

    /// Roll over to a new conversation when `id` has reached capacity.
    ///
    /// Returns the new id when a rollover happened. Callers treat an error as
    /// "no rollover" and go on with the ask.
    pub async fn maybe_rollover(&mut self, id: &ConversationId) -> Result<Option<ConversationId>> {
        if !self.auto_rollover {
            return Ok(None);
        }

        let history = self.fetch_history(Some(id)).await?;
        let messages = history
            .get("convs")
            .and_then(Value::as_array)
            .ok_or_else(|| ChatError::UnexpectedPayload("conversation has no `convs` list".into()))?
            .len();

        if messages != CONVERSATION_CAPACITY {
            return Ok(None);
        }

        tracing::info!(chat_id = %id, messages, "conversation full, creating a new one");
        self.create_conversation().await.map(Some)
    }

    fn target<'a>(&'a self, id: Option<&'a ConversationId>) -> &'a ConversationId {
        id.unwrap_or(&self.active)
    }
}

/// Conversation lookups that do not depend on an active conversation
pub async fn fetch_conversation(client: &ApiClient, id: &ConversationId) -> Result<Value> {
    let response = client.get(&format!("/conv/{id}")).await?;

    if !response.is_success() {
        return Err(ChatError::FetchFailed(response.status()));
    }
    response.json().await
}

pub async fn list_conversations(client: &ApiClient) -> Result<Vec<ConversationSummary>> {
    let response = client
        .get(&format!(
            "/convs?orderBy=last&source=web&limit={LIST_LIMIT}&offset=0&chatType=0"
        ))
        .await?;

    if !response.is_success() {
        return Err(ChatError::ListFailed(response.status()));
    }

    let mut conversations: Vec<ConversationSummary> = response.json().await?;
    conversations.truncate(LIST_LIMIT);
    Ok(conversations)
}

async fn request_new_id(client: &ApiClient) -> Result<ConversationId> {
    let response = client.post("/generate/id", None).await?;
    if !response.is_success() {
        return Err(ChatError::CreateFailed(format!("status {}", response.status())));
    }

    let id = response.text().await?;
    let id = id.trim();
    if id.is_empty() {
        return Err(ChatError::CreateFailed("server returned no chat id".into()));
    }
    Ok(ConversationId::from(id))
}
