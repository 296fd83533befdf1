//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use voxbridge_core::{ResponseCache, SessionCoordinator, UpstreamClient};

use crate::config::ProxyConfig;
use crate::conversation_store::ConversationStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub upstream: Arc<UpstreamClient>,
    pub sessions: Arc<SessionCoordinator>,
    pub dedup: Arc<ResponseCache>,
    pub conversations: Arc<ConversationStore>,
    started_at: Instant,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> anyhow::Result<Self> {
        let upstream = UpstreamClient::new(config.upstream.clone())?;
        let dedup = ResponseCache::new(config.dedup_window);
        let conversations = ConversationStore::new(config.max_conversations);

        Ok(Self {
            config: Arc::new(config),
            upstream: Arc::new(upstream),
            sessions: Arc::new(SessionCoordinator::new()),
            dedup: Arc::new(dedup),
            conversations: Arc::new(conversations),
            started_at: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
