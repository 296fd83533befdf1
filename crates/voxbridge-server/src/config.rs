//! Environment-driven proxy configuration.

use std::time::Duration;

use tracing::warn;
use voxbridge_core::upstream::UpstreamConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8013;
const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:18789/v1/chat/completions";
const DEFAULT_UPSTREAM_AGENT: &str = "main";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
    pub upstream: UpstreamConfig,
    /// Window in which a newer transcript supersedes this one.
    pub debounce: Duration,
    /// Keep-alive timer period while the gateway is silent.
    pub keepalive_interval: Duration,
    /// Minimum chunk-free gap before a keep-alive phrase is worth emitting.
    pub keepalive_idle: Duration,
    /// Time reserved for the TTS to finish speaking the buffer phrase.
    pub min_buffer_speech: Duration,
    /// Freshness window of the response cache.
    pub dedup_window: Duration,
    /// Conversation-log session cap.
    pub max_conversations: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            upstream: UpstreamConfig {
                url: DEFAULT_UPSTREAM_URL.to_string(),
                token: String::new(),
                agent: DEFAULT_UPSTREAM_AGENT.to_string(),
            },
            debounce: Duration::from_millis(1500),
            keepalive_interval: Duration::from_secs(10),
            keepalive_idle: Duration::from_secs(9),
            min_buffer_speech: Duration::from_millis(2500),
            dedup_window: Duration::from_secs(15),
            max_conversations: 50,
        }
    }
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(host) = env_string("HOST") {
            config.host = host;
        }
        config.port = env_port("PORT").unwrap_or(DEFAULT_PORT);
        if let Some(url) = env_string("UPSTREAM_URL") {
            config.upstream.url = url;
        }
        if let Some(token) = env_string("UPSTREAM_TOKEN") {
            config.upstream.token = token;
        }
        if let Some(agent) = env_string("UPSTREAM_AGENT") {
            config.upstream.agent = agent;
        }
        config
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_port(name: &str) -> Option<u16> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<u16>() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("Invalid {name}='{raw}', falling back to {DEFAULT_PORT}");
            None
        }
    }
}
