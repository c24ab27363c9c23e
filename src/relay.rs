use crate::estimate::estimate;
use axum::response::sse::Event;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// One upstream wire unit: a text fragment plus the terminal marker.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StreamEvent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

/// Reassembles newline-delimited JSON out of arbitrary read boundaries. The
/// trailing fragment of each read is retained until its newline arrives.
#[derive(Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let rest = self.buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buf, rest);
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }
}

/// Parses one complete line. Malformed JSON is recoverable: the line is
/// logged and dropped, the stream stays alive. Blank lines are ignored.
fn parse_event(line: &str) -> Option<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<StreamEvent>(line) {
        Ok(event) => Some(event),
        Err(err) => {
            metrics::counter!("agentgate_malformed_events_total").increment(1);
            tracing::warn!("skipping malformed upstream event: {}", err);
            None
        }
    }
}

/// Drives a byte stream through the line buffer, handing each decoded event
/// to `handle`. `handle` returns false to stop consuming (the `done` event);
/// remaining upstream data is discarded. A mid-stream read error is treated
/// as end-of-stream: partial output has already been delivered best effort.
async fn for_each_event<S, E, F>(mut body: S, mut handle: F)
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
    F: FnMut(StreamEvent) -> bool,
{
    let mut buffer = LineBuffer::default();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("upstream body read failed mid-stream: {}", err);
                return;
            }
        };
        for line in buffer.push(&chunk) {
            if let Some(event) = parse_event(&line) {
                if !handle(event) {
                    return;
                }
            }
        }
    }
}

pub fn completion_id() -> String {
    format!("chatcmpl-{}", uuid::Uuid::new_v4())
}

pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn chunk_json(id: &str, created: i64, model: &str, text: &str, done: bool) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{
            "index": 0,
            "delta": { "role": "assistant", "content": text },
            "finish_reason": if done { json!("stop") } else { Value::Null }
        }]
    })
}

/// Streaming mode: each upstream event becomes exactly one OpenAI chunk, in
/// wire order. The `done` event flushes its chunk, then the `[DONE]`
/// sentinel, and stops reading. Upstream EOF without `done` still emits the
/// sentinel so the client terminates cleanly.
pub async fn stream_chat<S, E>(model: String, mut body: S, tx: mpsc::Sender<Event>)
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let id = completion_id();
    let created = now_ts();
    let mut buffer = LineBuffer::default();
    'read: while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!("upstream body read failed mid-stream: {}", err);
                break;
            }
        };
        for line in buffer.push(&chunk) {
            let Some(event) = parse_event(&line) else {
                continue;
            };
            let payload = chunk_json(&id, created, &model, &event.text, event.done);
            if tx
                .send(Event::default().data(payload.to_string()))
                .await
                .is_err()
            {
                // Client disconnected; abandon the upstream body.
                return;
            }
            if event.done {
                break 'read;
            }
        }
    }
    let _ = tx.send(Event::default().data("[DONE]")).await;
}

/// Non-streaming mode: concatenate event text until `done` or EOF.
pub async fn aggregate_chat<S, E>(body: S) -> String
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut out = String::new();
    for_each_event(body, |event| {
        out.push_str(&event.text);
        !event.done
    })
    .await;
    out
}

/// Builds the complete `chat.completion` body for the non-streaming path
/// with the heuristic usage block.
pub fn completion_json(model: &str, text: &str, prompt_tokens: u64) -> Value {
    let completion_tokens = estimate(text);
    json!({
        "id": completion_id(),
        "object": "chat.completion",
        "created": now_ts(),
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": text },
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": prompt_tokens,
            "completion_tokens": completion_tokens,
            "total_tokens": prompt_tokens + completion_tokens
        }
    })
}
