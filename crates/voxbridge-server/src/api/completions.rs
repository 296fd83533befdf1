//! The per-turn pipeline behind `/v1/chat/completions`.
//!
//! Every POST from the voice platform runs the same gauntlet: silence gate,
//! in-flight abort, debounce, dedup, then a buffered filler phrase followed
//! by verbatim passthrough of the gateway stream. Whatever happens, the
//! client gets a syntactically valid SSE stream ending in `[DONE]`; the
//! platform treats anything else as model failure and drops the call.

use std::convert::Infallible;
use std::pin::pin;
use std::time::Instant;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, info_span, warn, Instrument};

use voxbridge_core::phrases::{self, PhraseCategory};
use voxbridge_core::sse::{self, DONE_FRAME};
use voxbridge_core::types::ChatCompletionRequest;
use voxbridge_core::{dedup, DebounceOutcome, UpstreamError};

use crate::state::AppState;

/// Spoken stand-in for gateway failures; raw errors never reach the call.
const UPSTREAM_FAILURE_TEXT: &str =
    "Sorry, I'm having trouble reaching my brain right now. Give me a second and ask again. ";
/// Transcripts shorter than this are treated as VAD noise.
const MIN_UTTERANCE_CHARS: usize = 3;

pub async fn completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => {
            warn!("unreadable completions body: {rejection}");
            return single_chunk_response(" ");
        }
    };

    let session_id = request.session_id();
    let user_text = request.last_user_text().unwrap_or("").to_string();

    if is_silence(&user_text) {
        debug!(session = %session_id, "silence ping filtered");
        return single_chunk_response(" ");
    }

    info!(session = %session_id, chars = user_text.len(), "turn received");
    state
        .conversations
        .append(&session_id, "user", &user_text)
        .await;

    // A newer transcript always wins: kill the running fetch before this
    // turn even starts waiting out its own debounce.
    state.sessions.abort_in_flight(&session_id).await;

    let outcome = state
        .sessions
        .arm_pending(&session_id, state.config.debounce)
        .await;
    if outcome == DebounceOutcome::Superseded {
        debug!(session = %session_id, "transcript superseded during debounce");
        return single_chunk_response(" ");
    }

    let dedup_key = dedup::fingerprint(&request.messages);
    if let Some(cached) = state.dedup.lookup(&dedup_key) {
        info!(session = %session_id, "replaying cached response");
        return single_chunk_response(&cached);
    }

    let upstream_body = match state.upstream.prepare_body(&request) {
        Ok(body) => body,
        Err(err) => {
            warn!(session = %session_id, "failed to build upstream body: {err}");
            return single_chunk_response(UPSTREAM_FAILURE_TEXT);
        }
    };

    let category = phrases::match_category(&user_text);
    let (turn, cancelled) = state.sessions.register_in_flight(&session_id).await;
    let (frames_tx, frames_rx) = mpsc::unbounded_channel::<String>();

    let turn_run = TurnRun {
        state,
        session_id,
        turn,
        category,
        dedup_key,
        upstream_body,
    };
    // Everything the detached task logs correlates through this span; the
    // session id is the dimension operators grep for, one span per turn.
    let span = info_span!("turn", session = %turn_run.session_id, turn);
    tokio::spawn(turn_run.run(frames_tx, cancelled).instrument(span));

    stream_response(frames_rx)
}

fn is_silence(text: &str) -> bool {
    text.is_empty() || text == "..." || text == "\u{2026}" || text.chars().count() < MIN_UTTERANCE_CHARS
}

/// One accepted turn: everything needed to speak filler and relay the
/// gateway stream, detached from the HTTP handler.
struct TurnRun {
    state: AppState,
    session_id: String,
    turn: u64,
    category: &'static PhraseCategory,
    dedup_key: String,
    upstream_body: Value,
}

impl TurnRun {
    async fn run(self, frames: mpsc::UnboundedSender<String>, cancelled: oneshot::Receiver<()>) {
        tokio::select! {
            _ = self.speak(&frames) => {}
            _ = cancelled => {
                // Expected whenever the platform re-sends a finished
                // transcript; dropping the future closes the gateway socket.
                info!("turn aborted by newer transcript");
            }
        }
        self.state
            .sessions
            .clear_in_flight(&self.session_id, self.turn)
            .await;
    }

    async fn speak(&self, frames: &mpsc::UnboundedSender<String>) {
        let initial = phrases::pick_initial(self.category);
        if frames.send(sse::content_frame(initial)).is_err() {
            return;
        }
        let buffer_sent_at = Instant::now();
        let mut last_frame_at = buffer_sent_at;
        let mut keepalive_count = 0usize;

        let period = self.state.config.keepalive_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        // The ticker must already run while we wait for the gateway's first
        // byte; a tool call can stall the connect for 20 s or more, well past
        // the platform's cascade timeout.
        let mut connect = pin!(self.state.upstream.stream(self.upstream_body.clone()));
        let connected = loop {
            tokio::select! {
                result = &mut connect => break result,
                _ = ticker.tick() => {
                    if !self.keep_alive_if_idle(frames, &mut last_frame_at, &mut keepalive_count) {
                        return;
                    }
                }
            }
        };

        let events = match connected {
            Ok(events) => events,
            Err(UpstreamError::Status { status, body }) => {
                warn!(status, "gateway rejected turn: {body}");
                let _ = frames.send(sse::content_frame(UPSTREAM_FAILURE_TEXT));
                return;
            }
            Err(err) => {
                warn!("gateway request failed: {err}");
                let _ = frames.send(sse::content_frame(UPSTREAM_FAILURE_TEXT));
                return;
            }
        };
        let mut events = pin!(events);

        let mut llm_content = String::new();
        let mut awaiting_first_content = true;
        let mut finished_cleanly = true;

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        if let Some(delta) = event.content.as_deref().filter(|d| !d.is_empty()) {
                            if awaiting_first_content {
                                awaiting_first_content = false;
                                self.hold_for_buffer_speech(buffer_sent_at).await;
                            }
                            llm_content.push_str(delta);
                        }
                        if frames.send(sse::frame(&event.payload)).is_err() {
                            debug!("client went away mid-stream");
                            return;
                        }
                        last_frame_at = Instant::now();
                    }
                    Some(Err(err)) => {
                        warn!("gateway stream broke mid-turn: {err}");
                        finished_cleanly = false;
                        break;
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !self.keep_alive_if_idle(frames, &mut last_frame_at, &mut keepalive_count) {
                        return;
                    }
                }
            }
        }

        // Only complete answers are replayable; a truncated one would replay
        // truncated. Filler never lands in the cache either way.
        if finished_cleanly {
            self.state.dedup.store(&self.dedup_key, llm_content.clone());
        }
        self.state
            .conversations
            .append(&self.session_id, "assistant", &llm_content)
            .await;
        info!(chars = llm_content.len(), "turn completed");
    }

    /// Emit the next round-robin keep-alive phrase if nothing has gone out
    /// for the configured idle gap. Returns false once the client is gone.
    fn keep_alive_if_idle(
        &self,
        frames: &mpsc::UnboundedSender<String>,
        last_frame_at: &mut Instant,
        count: &mut usize,
    ) -> bool {
        if last_frame_at.elapsed() < self.state.config.keepalive_idle {
            return true;
        }
        let phrase = phrases::pick_keep_alive(self.category, *count);
        *count += 1;
        debug!(phrase, "keep-alive filler emitted");
        if frames.send(sse::content_frame(phrase)).is_err() {
            return false;
        }
        *last_frame_at = Instant::now();
        true
    }

    /// Give the TTS time to finish the buffer phrase before real content
    /// starts, so the two never talk over each other.
    async fn hold_for_buffer_speech(&self, buffer_sent_at: Instant) {
        let speech = self.state.config.min_buffer_speech;
        let elapsed = buffer_sent_at.elapsed();
        if elapsed < speech {
            tokio::time::sleep(speech - elapsed).await;
        }
    }
}

/// Stream frames from the turn task, closing with a single `[DONE]` whether
/// the task finished, errored, or was aborted.
fn stream_response(mut frames: mpsc::UnboundedReceiver<String>) -> Response {
    let stream = async_stream::stream! {
        while let Some(frame) = frames.recv().await {
            yield Ok::<_, Infallible>(frame);
        }
        yield Ok(DONE_FRAME.to_string());
    };
    sse_response(Body::from_stream(stream))
}

/// A complete two-frame response: one content chunk, then `[DONE]`.
fn single_chunk_response(content: &str) -> Response {
    let body = format!("{}{}", sse::content_frame(content), DONE_FRAME);
    sse_response(Body::from(body))
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(body)
        .unwrap()
}
