pub mod dedup;
pub mod error;
pub mod phrases;
pub mod session;
pub mod sse;
pub mod types;
pub mod upstream;

pub use dedup::ResponseCache;
pub use error::UpstreamError;
pub use phrases::PhraseCategory;
pub use session::{DebounceOutcome, SessionCoordinator};
pub use types::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage};
pub use upstream::{UpstreamClient, UpstreamConfig, UpstreamEvent};
