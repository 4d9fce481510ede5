use futures::future;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::json;

use crate::config::Config;
use crate::decoder::decode_events;
use crate::error::{ChatError, Result};
use crate::events::{ConversationId, StreamEvent};
use crate::session::Session;

/// Answer text, chunk by chunk, in arrival order
pub type ReplyStream = BoxStream<'static, Result<String>>;

/// Prompt prefix asking the assistant to draw instead of answer
pub const DRAW_PROMPT_PREFIX: &str = "请根据信息绘制一张图片：";

/// Issues asks against a session and turns the event stream into text
#[derive(Debug, Clone)]
pub struct ChatClient {
    model: String,
    plugin: String,
}

impl ChatClient {
    pub fn new(model: impl Into<String>, plugin: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            plugin: plugin.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.model, &config.plugin)
    }

    /// Send `prompt` and stream the answer.
    ///
    /// Targets `conversation_id` when given, the active conversation
    /// otherwise. A full conversation is rolled over first; when that check
    /// fails the ask still goes to the first target.
    pub async fn ask_stream(
        &self,
        session: &mut Session,
        prompt: &str,
        conversation_id: Option<&ConversationId>,
        skip_history: bool,
    ) -> Result<ReplyStream> {
        let mut chat_id = conversation_id.unwrap_or(session.active()).clone();

        match session.maybe_rollover(&chat_id).await {
            Ok(Some(new_id)) => chat_id = new_id,
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(%chat_id, error = %err, "rollover check failed, keeping conversation");
            }
        }

        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "display_prompt": prompt,
            "display_prompt_type": 1,
            "plugin": self.plugin,
            "is_skip_history": skip_history,
        });

        let response = session
            .client()
            .post(&format!("/chat/{chat_id}"), Some(&payload))
            .await?;

        if !response.is_success() {
            tracing::error!(url = response.url(), %payload, status = %response.status(), "ask failed");
            return Err(ChatError::RequestFailed {
                status: response.status(),
                url: response.url().to_string(),
                payload: payload.to_string(),
            });
        }

        Ok(answer_chunks(decode_events(response.lines())).boxed())
    }

    /// Send `prompt` and wait for the whole answer
    pub async fn ask(
        &self,
        session: &mut Session,
        prompt: &str,
        conversation_id: Option<&ConversationId>,
        skip_history: bool,
    ) -> Result<String> {
        self.ask_stream(session, prompt, conversation_id, skip_history)
            .await?
            .try_fold(String::new(), |mut answer, chunk| async move {
                answer.push_str(&chunk);
                Ok::<_, ChatError>(answer)
            })
            .await
    }

    /// Regenerate the last answer of the active conversation.
    ///
    /// An image result replaces any text received before it.
    pub async fn repeat_last(&self, session: &Session, prompt: Option<&str>) -> Result<String> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "plugin": self.plugin,
            "isSkipHistory": false,
        });

        let response = session
            .client()
            .post(&format!("/chat/repeat/{}", session.active()), Some(&payload))
            .await?;

        if !response.is_success() {
            return Err(ChatError::RepeatFailed(response.status()));
        }

        let mut events = std::pin::pin!(decode_events(response.lines()));
        let mut answer = String::new();
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Text { chunk } => answer.push_str(&chunk),
                StreamEvent::ImageResult { url } => answer = url,
                StreamEvent::Progress | StreamEvent::EndOfPlugin => {}
            }
        }
        Ok(answer)
    }

    /// Ask for a drawing of `description` and return the image link
    pub async fn draw_image(&self, session: &mut Session, description: &str) -> Result<String> {
        let prompt = format!("{DRAW_PROMPT_PREFIX}{description}");
        let link = self.ask(session, &prompt, None, false).await?;
        tracing::info!(%link, "image generated");
        Ok(link)
    }
}

/// Keep only what the user sees: text chunks and the image link
fn answer_chunks<S>(events: S) -> impl futures::Stream<Item = Result<String>>
where
    S: futures::Stream<Item = Result<StreamEvent>>,
{
    events.filter_map(|event| {
        future::ready(match event {
            Ok(StreamEvent::Text { chunk }) => Some(Ok(chunk)),
            Ok(StreamEvent::ImageResult { url }) => Some(Ok(url)),
            Ok(StreamEvent::Progress | StreamEvent::EndOfPlugin) => None,
            Err(err) => Some(Err(err)),
        })
    })
}
