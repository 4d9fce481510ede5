use crate::config::Config;
use crate::error::{ChatError, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Lazy sequence of raw response lines, terminators removed
pub type LineStream = BoxStream<'static, Result<String>>;

/// Cookie-authenticated client for the conversation API
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &Config, cookie: &str) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&config.http.user_agent)?);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.http.accept_language)?,
        );
        let mut cookie = HeaderValue::from_str(cookie)?;
        cookie.set_sensitive(true);
        headers.insert(COOKIE, cookie);

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = config.http.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for an API path such as `/conv/{id}`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue a request; the body, when present, is sent as JSON.
    ///
    /// The response body is not read here, so callers may either consume it
    /// whole or pull it line by line.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse> {
        let url = self.url(path);
        tracing::debug!(%method, %url, "sending request");

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        tracing::debug!(%url, status = %response.status(), "response received");

        Ok(ApiResponse { url, inner: response })
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<&serde_json::Value>) -> Result<ApiResponse> {
        self.request(Method::POST, path, body).await
    }
}

/// Response handle exposing status, whole-body decoding and line streaming
pub struct ApiResponse {
    url: String,
    inner: reqwest::Response,
}

impl ApiResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn is_success(&self) -> bool {
        self.inner.status().is_success()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn text(self) -> Result<String> {
        Ok(self.inner.text().await?)
    }

    /// Decode the body as JSON; fails on non-JSON bodies
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        Ok(self.inner.json::<T>().await?)
    }

    /// Pull the body as text lines while it is still arriving
    pub fn lines(self) -> LineStream {
        split_lines(self.inner.bytes_stream().boxed()).boxed()
    }
}

struct LineSplitter<S> {
    bytes: S,
    buffer: Vec<u8>,
    exhausted: bool,
}

/// Split a chunked byte stream into lines.
///
/// Splitting happens on raw bytes so a multi-byte character spanning two
/// chunks is decoded intact. `\n` and a preceding `\r` are removed; a final
/// unterminated line is flushed once the byte stream ends. A transport error
/// is yielded once and ends the sequence.
pub fn split_lines<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Into<ChatError>,
{
    let state = LineSplitter {
        bytes,
        buffer: Vec::new(),
        exhausted: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = state.buffer.drain(..=pos).collect();
                return Some((Ok(decode_line(&line[..pos])), state));
            }

            if state.exhausted {
                if state.buffer.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut state.buffer);
                return Some((Ok(decode_line(&line)), state));
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    state.exhausted = true;
                    state.buffer.clear();
                    return Some((Err(err.into()), state));
                }
                None => state.exhausted = true,
            }
        }
    })
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
