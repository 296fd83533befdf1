//! Server-sent-event framing for the streaming chat-completions contract.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::{ChatCompletionChunk, ChunkChoice, ChunkDelta};

/// Terminal frame closing every response stream.
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

const DONE_SENTINEL: &str = "[DONE]";
const DATA_PREFIX: &str = "data: ";

/// Build a chunk carrying a single content delta.
pub fn content_chunk(text: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
        object: "chat.completion.chunk",
        created: now_unix_secs(),
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                content: Some(text.to_string()),
            },
            finish_reason: None,
        }],
    }
}

/// Wrap a payload in SSE framing.
pub fn frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

/// Encode a content delta as a complete SSE frame.
pub fn content_frame(text: &str) -> String {
    frame(&serde_json::to_string(&content_chunk(text)).unwrap_or_default())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Incremental decoder for an SSE byte stream.
///
/// Feeds arrive in arbitrary chunks; partial trailing lines are buffered
/// until the next push. `[DONE]` is recognized and swallowed, everything
/// else after `data: ` is yielded verbatim, valid JSON or not.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Push raw bytes, returning every complete payload they finished.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);

            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
                // event:/id: lines carry no chunk data on this contract.
                continue;
            };
            if payload == DONE_SENTINEL {
                self.done = true;
                continue;
            }
            payloads.push(payload.to_string());
        }
        payloads
    }
}
