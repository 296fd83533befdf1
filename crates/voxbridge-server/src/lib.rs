//! Voice-aware streaming proxy.
//!
//! Sits between a conversational voice platform and an LLM gateway speaking
//! the same streaming chat-completions contract, and makes a turn-based
//! model usable on a live call: speculative transcripts are debounced and
//! aborted, silence pings are filtered, contextual filler covers gateway
//! latency, and completed turns are replayable for a short window.

pub mod api;
pub mod config;
pub mod conversation_store;
pub mod error;
pub mod state;

pub use api::create_router;
pub use config::ProxyConfig;
pub use state::AppState;
