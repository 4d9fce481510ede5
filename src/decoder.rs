//! Decoding of the framed chat response stream.
//!
//! A response opens with a fixed preamble, then carries one frame per line:
//! a 6-character prefix followed by either the plugin sentinel or a JSON
//! record tagged by `type`. Decoding is pull-driven; a line is only read from
//! the network when the consumer asks for the next event.

use crate::error::{ChatError, Result};
use crate::events::{ImageRecord, StreamEvent, WireRecord};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

/// Leading lines of every response, skipped without inspection
pub const PREAMBLE_LINES: usize = 4;

/// Width of the frame prefix, in characters
pub const FRAME_PREFIX_CHARS: usize = 6;

/// Frame payload closing the answer
pub const PLUGIN_SENTINEL: &str = "[plugin: ]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Preamble { skipped: usize },
    Body,
    Finished,
}

struct Decoder<S> {
    lines: S,
    phase: Phase,
}

/// Turn raw response lines into stream events.
///
/// The sequence ends after the sentinel, after an image result, after the
/// first error, or when the lines run out. Lines past a terminal frame are
/// never pulled.
pub fn decode_events<S>(lines: S) -> impl Stream<Item = Result<StreamEvent>>
where
    S: Stream<Item = Result<String>> + Unpin,
{
    let decoder = Decoder {
        lines,
        phase: Phase::Preamble { skipped: 0 },
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if decoder.phase == Phase::Finished {
                return None;
            }

            let line = match decoder.lines.next().await {
                Some(Ok(line)) => line,
                Some(Err(err)) => {
                    decoder.phase = Phase::Finished;
                    return Some((Err(err), decoder));
                }
                None => {
                    tracing::debug!("response stream ended without a terminal frame");
                    return None;
                }
            };

            if let Phase::Preamble { skipped } = decoder.phase {
                decoder.phase = if skipped + 1 >= PREAMBLE_LINES {
                    Phase::Body
                } else {
                    Phase::Preamble { skipped: skipped + 1 }
                };
                continue;
            }

            if line.is_empty() {
                continue;
            }

            let event = decode_frame(&line);
            if !matches!(&event, Ok(event) if !event.is_terminal()) {
                decoder.phase = Phase::Finished;
            }
            return Some((event, decoder));
        }
    })
}

/// Decode a single non-empty frame line
pub fn decode_frame(line: &str) -> Result<StreamEvent> {
    let payload = strip_frame_prefix(line);
    if payload == PLUGIN_SENTINEL {
        return Ok(StreamEvent::EndOfPlugin);
    }

    let malformed = |source| ChatError::DecodeFailed {
        line: line.to_string(),
        source,
    };

    let value: serde_json::Value = serde_json::from_str(payload).map_err(malformed)?;
    let event = match WireRecord::deserialize(&value).map_err(malformed)? {
        WireRecord::Text { msg } => StreamEvent::Text { chunk: msg },
        WireRecord::Progress => StreamEvent::Progress,
        WireRecord::Other => {
            let image = ImageRecord::deserialize(&value).map_err(malformed)?;
            StreamEvent::ImageResult {
                url: image.image_url_high,
            }
        }
    };

    tracing::trace!(?event, "decoded frame");
    Ok(event)
}

fn strip_frame_prefix(line: &str) -> &str {
    match line.char_indices().nth(FRAME_PREFIX_CHARS) {
        Some((offset, _)) => &line[offset..],
        None => "",
    }
}
