use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by conversation and chat operations.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("create conversation failed: {0}")]
    CreateFailed(String),

    #[error("set conversation name failed (status {0})")]
    RenameFailed(StatusCode),

    #[error("get conversation failed (status {0}), please check your chat id")]
    FetchFailed(StatusCode),

    #[error("get all conversations failed (status {0})")]
    ListFailed(StatusCode),

    #[error("clear all conversations failed (status {0})")]
    ClearFailed(StatusCode),

    #[error("restart conversation failed (status {0})")]
    RestartFailed(StatusCode),

    #[error("repeat last reply failed (status {0})")]
    RepeatFailed(StatusCode),

    #[error("ask failed (status {status}) for {url} with payload {payload}")]
    RequestFailed {
        status: StatusCode,
        url: String,
        payload: String,
    },

    #[error("malformed stream event '{line}': {source}")]
    DecodeFailed {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response payload: {0}")]
    UnexpectedPayload(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
