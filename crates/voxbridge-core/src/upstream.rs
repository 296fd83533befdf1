//! Cancellable streaming client for the LLM gateway.

use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::error::UpstreamError;
use crate::sse::SseDecoder;
use crate::types::ChatCompletionRequest;

/// Appended to the last user message so the model answers like a phone call,
/// not an essay.
pub const VOICE_HINT: &str = " [Voice call: answer in 3-4 short sentences, \
plain spoken language, no filler openers, no markdown.]";

const AGENT_HEADER: &str = "x-gateway-agent-id";
const MODEL_PREFIX: &str = "gateway";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub url: String,
    pub token: String,
    pub agent: String,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

/// One decoded SSE payload from the gateway. `payload` is forwarded to the
/// client byte-for-byte; `content` is the extracted delta when the payload
/// parsed as a chunk.
#[derive(Debug, Clone)]
pub struct UpstreamEvent {
    pub payload: String,
    pub content: Option<String>,
}

impl UpstreamEvent {
    fn from_payload(payload: String) -> Self {
        let content = serde_json::from_str::<Value>(&payload)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/choices/0/delta/content")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            });
        Self { payload, content }
    }
}

impl UpstreamClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .user_agent(concat!("voxbridge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    /// Build the outbound body: vendor extension stripped, model pinned to
    /// the configured agent, streaming forced, voice hint appended to the
    /// last user message. The inbound request is left untouched.
    pub fn prepare_body(&self, request: &ChatCompletionRequest) -> Result<Value, UpstreamError> {
        let mut outbound = request.clone();
        outbound.elevenlabs_extra_body = None;
        outbound.model = Some(format!("{MODEL_PREFIX}:{}", self.config.agent));
        outbound.stream = Some(true);
        if let Some(message) = outbound.messages.iter_mut().rev().find(|m| m.role == "user") {
            message.content.push_str(VOICE_HINT);
        }
        Ok(serde_json::to_value(&outbound)?)
    }

    /// Issue the streaming POST. Dropping the returned stream closes the
    /// connection to the gateway, which is how aborted speculative turns
    /// stop consuming tokens.
    pub async fn stream(
        &self,
        body: Value,
    ) -> Result<impl Stream<Item = Result<UpstreamEvent, UpstreamError>>, UpstreamError> {
        let mut request = self
            .http
            .post(&self.config.url)
            .header(AGENT_HEADER, &self.config.agent)
            .json(&body);
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut bytes = response.bytes_stream();
        Ok(async_stream::stream! {
            let mut decoder = SseDecoder::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for payload in decoder.push(&chunk) {
                            yield Ok(UpstreamEvent::from_payload(payload));
                        }
                        if decoder.is_done() {
                            debug!("gateway stream finished");
                            break;
                        }
                    }
                    Err(err) => {
                        yield Err(UpstreamError::Transport(err));
                        break;
                    }
                }
            }
        })
    }
}
