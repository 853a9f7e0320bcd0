//! Server-sent event framing for streamed completions.
//!
//! Each chunk is one `data: <json>\n\n` frame. A clean end is marked by
//! `data: [DONE]\n\n`; a backend failure ends the body with one error frame
//! instead, so clients never mistake a truncated answer for a complete one.

use crate::router::{CompletionStream, StreamEvent};
use crate::service::dto::{completion_id, ChatCompletionChunkObject, ErrorResponse};
use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use tracing::warn;

pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// Encode one payload as an SSE data frame
pub fn data_frame<T: Serialize>(payload: &T) -> Bytes {
    match serde_json::to_string(payload) {
        Ok(json) => Bytes::from(format!("data: {}\n\n", json)),
        Err(e) => {
            warn!("Failed to serialize stream frame: {}", e);
            Bytes::from_static(b"data: {\"error\":{\"message\":\"serialization failed\",\"type\":\"internal_error\",\"code\":500}}\n\n")
        }
    }
}

/// Frame every event of a completion stream.
///
/// Dropping the returned stream drops the completion stream, which cancels the
/// backend request.
pub fn event_frames(stream: CompletionStream) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    let id = completion_id();
    let created = chrono::Utc::now().timestamp();

    stream.map(move |event| {
        let frame = match event {
            StreamEvent::Chunk(chunk) => {
                data_frame(&ChatCompletionChunkObject::from_chunk(&id, created, chunk))
            }
            StreamEvent::Error(e) => data_frame(&ErrorResponse::from(&e)),
            StreamEvent::Done => Bytes::from_static(DONE_FRAME.as_bytes()),
        };
        Ok(frame)
    })
}
